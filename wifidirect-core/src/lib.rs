//! Wi-Fi Direct session core.
//! Host-driven: no I/O; commands return transport operations, platform events come back in.

pub mod channel;
pub mod config;
pub mod connection;
pub mod device;
pub mod discovery;
pub mod error;
pub mod events;
pub mod status;
pub mod transport;

pub use config::SessionConfig;
pub use device::{AddressError, Device, DeviceAddress, Passphrase, PassphraseError};
pub use discovery::{DiscoveryMode, DiscoverySet};
pub use error::{SessionError, TransportError};
pub use events::{DiscoveryEvent, ErrorEvent, ListenerId, ListenerRegistry, PhaseChange};
pub use status::{
    ConnectionStatus, DiscoveryStatus, ErrorReason, PlatformReason, RadioStatus,
    TransportErrorKind, WifiDirectStatus,
};
pub use transport::{
    event_channel, EventInbox, EventSink, HostingRequest, PlatformEvent, PlatformTransport,
    TransportCommand,
};
pub use session::{Commands, Role, SessionManager, SessionPhase};
pub use handle::WifiDirect;

// Framed link protocol for IP-carried transports.
pub mod keepalive;
pub mod protocol;
pub mod wire;

pub use keepalive::{Inbound, KeepAliveMonitor};
pub use protocol::{Beacon, Frame, PROTOCOL_VERSION};
pub use wire::{decode_frame, encode_frame, frame_len, FrameDecodeError, FrameEncodeError};

pub mod handle;
pub mod session;
