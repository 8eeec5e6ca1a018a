use crate::domain::Measurement;
use crate::domain::events::Event;
use crate::fleet::DeviceError;
use async_trait::async_trait;
use tokio::sync::mpsc::Sender;
use tracing::warn;

/// Receives the outcome of every device poll, once per device per cycle.
#[async_trait]
pub trait Accumulator: Send + Sync {
    async fn add_measurement(&self, measurement: Measurement);

    async fn add_error(&self, error: DeviceError);
}

#[derive(Clone, Debug)]
pub struct ChannelAccumulator {
    tx: Sender<Event>,
}

impl ChannelAccumulator {
    pub fn new(tx: Sender<Event>) -> Self {
        ChannelAccumulator { tx }
    }
}

#[async_trait]
impl Accumulator for ChannelAccumulator {
    async fn add_measurement(&self, measurement: Measurement) {
        if self.tx.send(Event::Measurement(measurement)).await.is_err() {
            warn!("⚠️ Dropped a measurement, nobody is listening");
        }
    }

    async fn add_error(&self, error: DeviceError) {
        if let Err(e) = self.tx.send(Event::Error(error)).await {
            warn!("⚠️ Dropped an error, nobody is listening: {:?}", e.0);
        }
    }
}
