pub mod events;
mod field_value;
mod measurement;

pub use field_value::FieldValue;
pub use measurement::{Fields, MEASUREMENT_NAME, Measurement};
