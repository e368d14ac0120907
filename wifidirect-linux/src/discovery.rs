//! LAN advertisement: UDP multicast beacons while hosting, and a listener that turns
//! beacons into discovery events and remembers where each host's link port is.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use wifidirect_core::wire::{decode_frame, encode_frame};
use wifidirect_core::{
    Beacon, Device, DeviceAddress, DiscoveryMode, EventSink, PlatformEvent, PlatformReason,
    TransportError, TransportErrorKind, PROTOCOL_VERSION,
};

const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 60, 61);
const BEACON_INTERVAL: Duration = Duration::from_secs(2);
const PEER_TIMEOUT: Duration = Duration::from_secs(8);
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Where each advertised host accepts links.
pub type Directory = Arc<Mutex<HashMap<DeviceAddress, SocketAddr>>>;

/// What the listener is looking for.
#[derive(Debug, Clone)]
pub struct DiscoveryFilter {
    pub mode: DiscoveryMode,
    pub service_name: String,
    pub own_address: DeviceAddress,
}

impl DiscoveryFilter {
    /// Whether a beacon should be reported at all.
    fn accepts(&self, beacon: &Beacon) -> bool {
        if beacon.protocol_version != PROTOCOL_VERSION || beacon.address == self.own_address {
            return false;
        }
        match self.mode {
            DiscoveryMode::Services => beacon.service_name == self.service_name,
            DiscoveryMode::Peers => true,
        }
    }

    fn event_for(&self, beacon: &Beacon) -> PlatformEvent {
        let device = Device::new(beacon.address.clone(), beacon.display_name.clone());
        match self.mode {
            DiscoveryMode::Services => PlatformEvent::ServiceFound {
                instance_name: beacon.service_name.clone(),
                device,
            },
            DiscoveryMode::Peers => PlatformEvent::PeersFound(vec![device]),
        }
    }
}

/// Last-heard times of advertising hosts.
#[derive(Debug, Default)]
struct PeerTable {
    last_seen: HashMap<DeviceAddress, Instant>,
}

impl PeerTable {
    /// Returns true when the address was not known yet.
    fn touch(&mut self, address: &DeviceAddress, now: Instant) -> bool {
        self.last_seen.insert(address.clone(), now).is_none()
    }

    fn expire(&mut self, now: Instant) -> Vec<DeviceAddress> {
        let gone: Vec<DeviceAddress> = self
            .last_seen
            .iter()
            .filter(|(_, seen)| now.saturating_duration_since(**seen) >= PEER_TIMEOUT)
            .map(|(addr, _)| addr.clone())
            .collect();
        for addr in &gone {
            self.last_seen.remove(addr);
        }
        gone
    }
}

pub async fn make_multicast_socket(discovery_port: u16) -> std::io::Result<UdpSocket> {
    let std_sock = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, discovery_port))?;
    std_sock.join_multicast_v4(&MULTICAST_GROUP, &Ipv4Addr::UNSPECIFIED)?;
    std_sock.set_multicast_ttl_v4(1)?;
    std_sock.set_nonblocking(true)?;
    UdpSocket::from_std(std_sock)
}

/// Advertise `beacon` until aborted.
pub async fn advertise(beacon: Beacon, discovery_port: u16, sink: EventSink) {
    let frame = match encode_frame(&beacon) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "cannot encode beacon");
            sink.fail(TransportError::new(
                TransportErrorKind::ServiceRegistration,
                PlatformReason::ERROR,
            ));
            return;
        }
    };
    let socket = match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!(error = %e, "cannot open beacon socket");
            sink.fail(TransportError::socket(TransportErrorKind::ServiceRegistration));
            return;
        }
    };
    let _ = socket.set_multicast_ttl_v4(1);
    let dest = SocketAddr::from((MULTICAST_GROUP, discovery_port));
    info!(service = %beacon.service_name, port = discovery_port, "advertising");
    sink.emit(PlatformEvent::ServiceRegistered);
    loop {
        if let Err(e) = socket.send_to(&frame, dest).await {
            debug!(error = %e, "beacon send failed");
        }
        tokio::time::sleep(BEACON_INTERVAL).await;
    }
}

/// Listen for beacons until aborted, reporting new and vanished hosts.
pub async fn watch(filter: DiscoveryFilter, discovery_port: u16, directory: Directory, sink: EventSink) {
    let socket = match make_multicast_socket(discovery_port).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!(error = %e, port = discovery_port, "cannot join discovery group");
            sink.fail(TransportError::new(
                TransportErrorKind::Discovery,
                PlatformReason::ERROR,
            ));
            return;
        }
    };
    sink.emit(PlatformEvent::DiscoveryStarted);
    let mut peers = PeerTable::default();
    let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
    let mut buf = vec![0u8; 65536];
    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => {
                let (n, from) = match received {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(error = %e, "discovery socket failed");
                        sink.fail(TransportError::socket(TransportErrorKind::Discovery));
                        return;
                    }
                };
                let Ok((beacon, _)) = decode_frame::<Beacon>(&buf[..n]) else {
                    continue;
                };
                if !filter.accepts(&beacon) {
                    continue;
                }
                directory
                    .lock()
                    .await
                    .insert(beacon.address.clone(), SocketAddr::new(from.ip(), beacon.link_port));
                if peers.touch(&beacon.address, Instant::now()) {
                    debug!(peer = %beacon.address, name = %beacon.display_name, "host found");
                    sink.emit(filter.event_for(&beacon));
                }
            }
            _ = sweep.tick() => {
                for address in peers.expire(Instant::now()) {
                    debug!(peer = %address, "host gone");
                    directory.lock().await.remove(&address);
                    sink.emit(PlatformEvent::PeerLost(address));
                }
            }
        }
    }
}
