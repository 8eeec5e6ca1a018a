use crate::domain::Measurement;
use crate::fleet::DeviceError;

#[derive(Debug)]
pub enum Event {
    Measurement(Measurement),
    Error(DeviceError),
}
