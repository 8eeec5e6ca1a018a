use crate::session::Credentials;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};
use serde::Deserialize;
use std::fmt::Debug;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    core: Core,
    broadcast_tools: BroadcastTools,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_builder(
            Config::builder()
                .add_source(config::File::with_name("config").required(true))
                .add_source(config::File::with_name("config_local").required(false)),
        )
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder
            .add_source(
                config::Environment::with_prefix("BT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("broadcast_tools.servers")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn broadcast_tools(&self) -> &BroadcastTools {
        &self.broadcast_tools
    }
}

#[derive(Debug, Deserialize)]
pub struct Core {
    #[serde(with = "humantime_serde")]
    interval: Duration,
    event_buffer_size: usize,
}

impl Core {
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn event_buffer_size(&self) -> usize {
        self.event_buffer_size
    }
}

#[derive(Deserialize)]
pub struct BroadcastTools {
    servers: Vec<String>,
    user: String,
    password: String,
    #[serde(with = "humantime_serde", default = "default_timeout")]
    timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

impl BroadcastTools {
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.user, &self.password)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Debug for BroadcastTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastTools")
            .field("servers", &self.servers)
            .field("user", &self.user)
            .field("password", &"***")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn new() -> Self {
        AppConfigBuilder {
            config: AppConfig {
                core: Core {
                    interval: Duration::from_secs(10),
                    event_buffer_size: 16,
                },
                broadcast_tools: BroadcastTools {
                    servers: vec![],
                    user: "admin".to_string(),
                    password: "password".to_string(),
                    timeout: Duration::from_secs(5),
                },
            },
        }
    }

    pub fn servers(mut self, servers: Vec<String>) -> Self {
        self.config.broadcast_tools.servers = servers;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.broadcast_tools.timeout = timeout;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}
