//! Session configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::discovery::DiscoveryMode;

/// Session settings. Every field has a default, so an empty TOML table is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Service instance name hosts advertise and clients filter on.
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// P2P group network name (must start with `DIRECT-` on Android).
    #[serde(default = "default_network_name")]
    pub network_name: String,
    /// DNS-SD registration type of the advertised service.
    #[serde(default = "default_registration_type")]
    pub registration_type: String,
    /// Discovery mode used by `discover()`.
    #[serde(default)]
    pub discovery_mode: DiscoveryMode,
    /// Keep-alive send interval in milliseconds.
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,
    /// Link is declared lost after this long without any inbound frame.
    #[serde(default = "default_keepalive_timeout_ms")]
    pub keepalive_timeout_ms: u64,
}

fn default_service_name() -> String {
    "3-Pennies-Server".to_string()
}
fn default_network_name() -> String {
    "DIRECT-pn3-Pennies-Server".to_string()
}
fn default_registration_type() -> String {
    "_presence._tcp".to_string()
}
fn default_keepalive_interval_ms() -> u64 {
    5_000
}
fn default_keepalive_timeout_ms() -> u64 {
    6_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            network_name: default_network_name(),
            registration_type: default_registration_type(),
            discovery_mode: DiscoveryMode::default(),
            keepalive_interval_ms: default_keepalive_interval_ms(),
            keepalive_timeout_ms: default_keepalive_timeout_ms(),
        }
    }
}

impl SessionConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn keepalive_timeout(&self) -> Duration {
        Duration::from_millis(self.keepalive_timeout_ms)
    }
}
