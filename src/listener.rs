use crate::domain::events::Event;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, info, instrument, warn};

/// Logs every record and poll failure until all senders are gone.
#[instrument(skip_all)]
pub async fn listen(mut rx: Receiver<Event>) -> usize {
    let mut received = 0;
    while let Some(event) = rx.recv().await {
        received += 1;
        match event {
            Event::Measurement(measurement) => match measurement.to_line() {
                Some(line) => info!(server = measurement.server().unwrap_or_default(), "📈 {}", line),
                None => debug!(server = measurement.server().unwrap_or_default(), "📭 No fields reported"),
            },
            Event::Error(error) => {
                warn!(server = %error.server, "⚠️ Unable to gather: {}", error.source);
            }
        }
    }
    received
}
