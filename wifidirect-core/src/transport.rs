//! Platform transport seam: commands the session issues, events the platform raises,
//! and the inbox that carries those events to the control thread.

use std::sync::mpsc;
use std::time::Duration;

use crate::device::{Device, DeviceAddress, Passphrase};
use crate::discovery::DiscoveryMode;
use crate::error::TransportError;

/// What a host needs to create a discoverable group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostingRequest {
    pub network_name: String,
    pub service_name: String,
    pub registration_type: String,
    pub passphrase: Passphrase,
}

/// Radio/socket operation the session asks the platform to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    StartHosting(HostingRequest),
    RemoveService,
    StartDiscovery(DiscoveryMode),
    CancelDiscovery,
    Connect {
        address: DeviceAddress,
        passphrase: Passphrase,
    },
    CancelConnect,
    Disconnect,
    Send(Vec<u8>),
}

impl TransportCommand {
    pub fn apply<T: PlatformTransport + ?Sized>(self, transport: &mut T) {
        match self {
            TransportCommand::StartHosting(request) => transport.start_hosting(&request),
            TransportCommand::RemoveService => transport.remove_service(),
            TransportCommand::StartDiscovery(mode) => transport.start_discovery(mode),
            TransportCommand::CancelDiscovery => transport.cancel_discovery(),
            TransportCommand::Connect {
                address,
                passphrase,
            } => transport.connect(&address, &passphrase),
            TransportCommand::CancelConnect => transport.cancel_connect(),
            TransportCommand::Disconnect => transport.disconnect(),
            TransportCommand::Send(payload) => transport.send(&payload),
        }
    }
}

/// The radio and socket layer. Every method is fire-and-forget: it must not block
/// the control thread, and outcomes come back as [`PlatformEvent`]s through the
/// [`EventSink`] the transport was given. `disconnect` must be idempotent.
pub trait PlatformTransport {
    fn start_hosting(&mut self, request: &HostingRequest);
    fn remove_service(&mut self);
    fn start_discovery(&mut self, mode: DiscoveryMode);
    fn cancel_discovery(&mut self);
    fn connect(&mut self, address: &DeviceAddress, passphrase: &Passphrase);
    fn cancel_connect(&mut self);
    fn disconnect(&mut self);
    fn send(&mut self, payload: &[u8]);
}

impl<T: PlatformTransport + ?Sized> PlatformTransport for Box<T> {
    fn start_hosting(&mut self, request: &HostingRequest) {
        (**self).start_hosting(request)
    }
    fn remove_service(&mut self) {
        (**self).remove_service()
    }
    fn start_discovery(&mut self, mode: DiscoveryMode) {
        (**self).start_discovery(mode)
    }
    fn cancel_discovery(&mut self) {
        (**self).cancel_discovery()
    }
    fn connect(&mut self, address: &DeviceAddress, passphrase: &Passphrase) {
        (**self).connect(address, passphrase)
    }
    fn cancel_connect(&mut self) {
        (**self).cancel_connect()
    }
    fn disconnect(&mut self) {
        (**self).disconnect()
    }
    fn send(&mut self, payload: &[u8]) {
        (**self).send(payload)
    }
}

/// Asynchronous outcome raised by the platform, possibly from an I/O thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    RadioChanged { enabled: bool },
    /// The hosted service record is registered and discoverable.
    ServiceRegistered,
    ServiceRemoved,
    DiscoveryStarted,
    DiscoveryStopped,
    /// Service-discovery response (services mode).
    ServiceFound {
        instance_name: String,
        device: Device,
    },
    /// Raw peer list batch (peers mode).
    PeersFound(Vec<Device>),
    PeerLost(DeviceAddress),
    /// Link established. Hosts may not know who joined, so `peer` is optional.
    Connected { peer: Option<Device> },
    /// Remote closed the link.
    Disconnected,
    /// Keep-alive timed out.
    ConnectionLost,
    MessageReceived(Vec<u8>),
    Failed(TransportError),
}

/// Sending half handed to transports. Cheap to clone and `Send`.
#[derive(Debug, Clone)]
pub struct EventSink(mpsc::Sender<PlatformEvent>);

impl EventSink {
    /// Queue an event for the control thread. Returns false once the session is gone.
    pub fn emit(&self, event: PlatformEvent) -> bool {
        self.0.send(event).is_ok()
    }

    pub fn fail(&self, error: TransportError) -> bool {
        self.emit(PlatformEvent::Failed(error))
    }
}

/// Receiving half, owned by the control thread.
#[derive(Debug)]
pub struct EventInbox(mpsc::Receiver<PlatformEvent>);

impl EventInbox {
    /// Next queued event without blocking.
    pub fn try_next(&self) -> Option<PlatformEvent> {
        self.0.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event.
    pub fn next_timeout(&self, timeout: Duration) -> Option<PlatformEvent> {
        self.0.recv_timeout(timeout).ok()
    }
}

pub fn event_channel() -> (EventSink, EventInbox) {
    let (tx, rx) = mpsc::channel();
    (EventSink(tx), EventInbox(rx))
}
