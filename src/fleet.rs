use crate::accumulator::Accumulator;
use crate::app_config::BroadcastTools;
use crate::device::{Device, GatherError};
use crate::session::{Credentials, Session, SessionError};
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use reqwest::Client;
use thiserror::Error;
use tracing::{error, info, instrument};

/// All configured devices, polled together.
///
/// Sessions are set up lazily by the first `gather`. Setup is all or nothing:
/// when one device cannot log in, the ones that did are logged out again and
/// the next `gather` starts over.
#[derive(Debug)]
pub struct Fleet {
    servers: Vec<String>,
    credentials: Credentials,
    client: Client,
    rng: StdRng,
    devices: Vec<Device>,
    initialized: bool,
}

impl Fleet {
    pub fn new(config: &BroadcastTools) -> Result<Self, FleetError> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_rng(config: &BroadcastTools, rng: StdRng) -> Result<Self, FleetError> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Fleet {
            servers: config.servers().to_vec(),
            credentials: config.credentials(),
            client,
            rng,
            devices: Vec::new(),
            initialized: false,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    #[instrument(skip(self))]
    pub async fn initialize(&mut self) -> Result<(), FleetError> {
        if self.initialized {
            return Ok(());
        }

        info!("📡 Connecting to {} device(s)...", self.servers.len());
        let mut devices = Vec::with_capacity(self.servers.len());

        for server in &self.servers {
            let rng = StdRng::seed_from_u64(self.rng.next_u64());
            match dial(server, &self.credentials, &self.client, rng).await {
                Ok(device) => devices.push(device),
                Err(source) => {
                    error!(server = %server, "❌ Connecting to device... failed: {}", source);
                    close_all(&mut devices).await;
                    return Err(FleetError::Dial {
                        server: server.clone(),
                        source,
                    });
                }
            }
        }

        self.devices = devices;
        self.initialized = true;
        info!("📡 Connecting to {} device(s)... OK", self.servers.len());
        Ok(())
    }

    /// Polls every device concurrently and hands each outcome to `acc`.
    ///
    /// Returns once all devices are done. A failing device is reported
    /// through `acc` and does not affect the others; only a failed setup is
    /// returned as an error.
    #[instrument(skip_all)]
    pub async fn gather(&mut self, acc: &dyn Accumulator) -> Result<(), FleetError> {
        self.initialize().await?;

        join_all(self.devices.iter_mut().map(|device| async move {
            let server = device.server().to_string();
            match device.gather().await {
                Ok(measurement) => acc.add_measurement(measurement).await,
                Err(source) => acc.add_error(DeviceError { server, source }).await,
            }
        }))
        .await;

        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn close(mut self) {
        info!("🔒 Logging out of {} device(s)...", self.devices.len());
        close_all(&mut self.devices).await;
        info!("🔒 Logging out... OK");
    }
}

async fn dial(server: &str, credentials: &Credentials, client: &Client, rng: StdRng) -> Result<Device, SessionError> {
    let mut device = Device::new(Session::new(server, credentials.clone(), client.clone(), rng)?);
    device.dial().await?;
    Ok(device)
}

async fn close_all(devices: &mut [Device]) {
    join_all(devices.iter_mut().map(|device| device.close())).await;
}

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("unable to build the HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("unable to connect to '{server}': {source}")]
    Dial { server: String, source: SessionError },
}

/// A poll failure of a single device.
#[derive(Error, Debug)]
#[error("{server}: {source}")]
pub struct DeviceError {
    pub server: String,
    pub source: GatherError,
}
