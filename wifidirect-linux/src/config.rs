//! Load config from file and environment.

use serde::Deserialize;
use std::path::PathBuf;
use wifidirect_core::{DeviceAddress, DiscoveryMode, SessionConfig};

/// Daemon configuration. File: ~/.config/wifidirect/config.toml or /etc/wifidirect/config.toml.
/// Env overrides: WIFIDIRECT_DISCOVERY_PORT, WIFIDIRECT_LINK_PORT, WIFIDIRECT_DEVICE_NAME,
/// WIFIDIRECT_DEVICE_ADDRESS, WIFIDIRECT_DISCOVERY_MODE.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Advertisement UDP port (default 45680).
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    /// Link TCP port the host listens on (default 8888).
    #[serde(default = "default_link_port")]
    pub link_port: u16,
    /// Name shown to peers (default: hostname, else "wifidirect").
    #[serde(default = "default_device_name")]
    pub device_name: String,
    /// Stable device address. A random locally-administered one is used when absent.
    #[serde(default)]
    pub device_address: Option<DeviceAddress>,
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_discovery_port() -> u16 {
    45680
}
fn default_link_port() -> u16 {
    8888
}
fn default_device_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "wifidirect".to_string())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discovery_port: default_discovery_port(),
            link_port: default_link_port(),
            device_name: default_device_name(),
            device_address: None,
            session: SessionConfig::default(),
        }
    }
}

impl Config {
    /// Configured address, or a fresh random one.
    pub fn address(&self) -> DeviceAddress {
        self.device_address
            .clone()
            .unwrap_or_else(DeviceAddress::random_local)
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    apply_env(&mut c, |key| std::env::var(key).ok());
    c
}

fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(p) = var("WIFIDIRECT_DISCOVERY_PORT").and_then(|s| s.parse::<u16>().ok()) {
        c.discovery_port = p;
    }
    if let Some(p) = var("WIFIDIRECT_LINK_PORT").and_then(|s| s.parse::<u16>().ok()) {
        c.link_port = p;
    }
    if let Some(name) = var("WIFIDIRECT_DEVICE_NAME").filter(|s| !s.trim().is_empty()) {
        c.device_name = name;
    }
    if let Some(addr) = var("WIFIDIRECT_DEVICE_ADDRESS").and_then(|s| DeviceAddress::parse(&s).ok())
    {
        c.device_address = Some(addr);
    }
    if let Some(mode) = var("WIFIDIRECT_DISCOVERY_MODE").and_then(|s| s.parse::<DiscoveryMode>().ok())
    {
        c.session.discovery_mode = mode;
    }
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/wifidirect/config.toml"));
    }
    out.push(PathBuf::from("/etc/wifidirect/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    for p in config_paths() {
        if p.exists() {
            match std::fs::read_to_string(&p) {
                Ok(s) => match toml::from_str::<Config>(&s) {
                    Ok(c) => return Some(c),
                    Err(e) => tracing::warn!(path = %p.display(), error = %e, "invalid config, using defaults"),
                },
                Err(e) => tracing::warn!(path = %p.display(), error = %e, "unreadable config"),
            }
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let c: Config = toml::from_str("").unwrap();
        assert_eq!(c.discovery_port, 45680);
        assert_eq!(c.link_port, 8888);
        assert_eq!(c.session, SessionConfig::default());
        assert!(c.device_address.is_none());
    }

    #[test]
    fn nested_session_table() {
        let c: Config = toml::from_str(
            r#"
            link_port = 9000
            device_address = "aa-bb-cc-dd-ee-ff"

            [session]
            service_name = "Chess"
            discovery_mode = "peers"
            keepalive_timeout_ms = 10000
            "#,
        )
        .unwrap();
        assert_eq!(c.link_port, 9000);
        assert_eq!(c.address().as_str(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(c.session.service_name, "Chess");
        assert_eq!(c.session.discovery_mode, DiscoveryMode::Peers);
        assert_eq!(c.session.keepalive_timeout_ms, 10_000);
        assert_eq!(c.session.network_name, "DIRECT-pn3-Pennies-Server");
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(toml::from_str::<Config>("proxy_port = 1").is_err());
        assert!(toml::from_str::<Config>("[session]\nbogus = true").is_err());
    }

    #[test]
    fn env_overrides_apply_and_ignore_garbage() {
        let mut c = Config::default();
        apply_env(&mut c, |key| match key {
            "WIFIDIRECT_LINK_PORT" => Some("7000".into()),
            "WIFIDIRECT_DISCOVERY_PORT" => Some("not-a-port".into()),
            "WIFIDIRECT_DEVICE_NAME" => Some("Tablet".into()),
            "WIFIDIRECT_DISCOVERY_MODE" => Some("peers".into()),
            _ => None,
        });
        assert_eq!(c.link_port, 7000);
        assert_eq!(c.discovery_port, 45680);
        assert_eq!(c.device_name, "Tablet");
        assert_eq!(c.session.discovery_mode, DiscoveryMode::Peers);
    }
}
