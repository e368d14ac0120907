//! Discovery controller: start/stop of peer or service discovery and the discovered set.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use crate::device::{Device, DeviceAddress};
use crate::transport::TransportCommand;

/// How nearby devices are found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// Only devices advertising the configured service instance.
    #[default]
    Services,
    /// Every Wi-Fi Direct peer in range.
    Peers,
}

impl std::str::FromStr for DiscoveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "services" | "service" => Ok(DiscoveryMode::Services),
            "peers" | "peer" => Ok(DiscoveryMode::Peers),
            other => Err(format!("unknown discovery mode: {}", other)),
        }
    }
}

/// Discovered devices keyed by address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverySet {
    devices: BTreeMap<DeviceAddress, Device>,
}

impl DiscoverySet {
    /// Insert a device. Returns true if the set changed. An existing entry is kept
    /// as discovered; only a new address changes the set.
    pub fn insert(&mut self, device: Device) -> bool {
        if self.devices.contains_key(&device.address) {
            return false;
        }
        self.devices.insert(device.address.clone(), device);
        true
    }

    pub fn remove(&mut self, address: &DeviceAddress) -> bool {
        self.devices.remove(address).is_some()
    }

    pub fn get(&self, address: &DeviceAddress) -> Option<&Device> {
        self.devices.get(address)
    }

    pub fn contains(&self, address: &DeviceAddress) -> bool {
        self.devices.contains_key(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn to_vec(&self) -> Vec<Device> {
        self.devices.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }
}

#[derive(Debug)]
pub struct DiscoveryController {
    service_name: String,
    mode: DiscoveryMode,
    active: bool,
    found: DiscoverySet,
}

impl DiscoveryController {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            mode: DiscoveryMode::default(),
            active: false,
            found: DiscoverySet::default(),
        }
    }

    /// Begin a fresh search. Entries from an earlier search are dropped.
    pub fn start(&mut self, mode: DiscoveryMode) -> TransportCommand {
        self.found.clear();
        self.mode = mode;
        self.active = true;
        TransportCommand::StartDiscovery(mode)
    }

    /// Stop searching. Found entries are kept.
    pub fn cancel(&mut self) -> TransportCommand {
        self.active = false;
        TransportCommand::CancelDiscovery
    }

    /// The platform stopped discovery on its own.
    pub fn halt(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn mode(&self) -> DiscoveryMode {
        self.mode
    }

    pub fn found(&self) -> &DiscoverySet {
        &self.found
    }

    pub fn clear(&mut self) {
        self.found.clear();
    }

    /// Service response. Returns true if the set changed.
    pub fn on_service_found(&mut self, instance_name: &str, device: Device) -> bool {
        if !self.active || self.mode != DiscoveryMode::Services {
            debug!(address = %device.address, "dropping service response outside service discovery");
            return false;
        }
        if instance_name != self.service_name {
            debug!(instance_name, "ignoring foreign service");
            return false;
        }
        self.found.insert(device)
    }

    /// Peer batch. Returns true if the set changed.
    pub fn on_peers_found(&mut self, devices: Vec<Device>) -> bool {
        if !self.active || self.mode != DiscoveryMode::Peers {
            debug!(count = devices.len(), "dropping peer batch outside peer discovery");
            return false;
        }
        let mut changed = false;
        for device in devices {
            changed |= self.found.insert(device);
        }
        changed
    }

    /// Returns true if the set changed.
    pub fn on_peer_lost(&mut self, address: &DeviceAddress) -> bool {
        if !self.active {
            return false;
        }
        self.found.remove(address)
    }
}
