use crate::accumulator::Accumulator;
use crate::fleet::Fleet;
use std::future::Future;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, instrument, warn};

/// Gathers from the fleet every `period` until `shutdown` completes, then
/// logs every device out.
///
/// `shutdown` is awaited for the whole run, including while a gather is in
/// flight; that gather is dropped rather than waited on.
#[instrument(skip_all, fields(period = ?period))]
pub async fn run(mut fleet: Fleet, acc: &dyn Accumulator, period: Duration, shutdown: impl Future<Output = ()>) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                tokio::select! {
                    result = fleet.gather(acc) => {
                        if let Err(e) = result {
                            warn!("⚠️ Unable to set up the devices, retrying next cycle: {}", e);
                        }
                    }
                    _ = &mut shutdown => break,
                }
            }
            _ = &mut shutdown => break,
        }
    }

    info!("🛑 Shutting down...");
    fleet.close().await;
}
