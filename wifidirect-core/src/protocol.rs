//! Wire messages for transports that carry the session over IP: advertisement
//! beacons and the framed link protocol.

use serde::{Deserialize, Serialize};

use crate::device::DeviceAddress;

/// Current protocol version. Used in beacon and handshake.
pub const PROTOCOL_VERSION: u8 = 1;

/// Advertisement of a hosted group, one per datagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beacon {
    pub protocol_version: u8,
    pub service_name: String,
    pub network_name: String,
    pub address: DeviceAddress,
    pub display_name: String,
    pub link_port: u16,
}

/// Link frames. Encoding is bincode; framing is length-prefix (see wire module).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    /// Host → client on accept: identify the host and challenge the passphrase.
    Challenge {
        protocol_version: u8,
        address: DeviceAddress,
        display_name: String,
        nonce: [u8; 32],
    },
    /// Client → host: identify the client and prove knowledge of the passphrase.
    Hello {
        protocol_version: u8,
        address: DeviceAddress,
        display_name: String,
        proof: [u8; 32],
    },
    Welcome,
    Rejected,
    /// Liveness only; consumed by the transport.
    KeepAlive,
    /// Application payload, opaque.
    Data(Vec<u8>),
}

impl Frame {
    pub fn is_keepalive(&self) -> bool {
        matches!(self, Frame::KeepAlive)
    }
}
