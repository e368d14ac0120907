//! Status vocabulary surfaced to the host engine.
//!
//! One closed enum per event category. Each value also maps onto the flat
//! [`WifiDirectStatus`] code space, so hosts that only pass integers across a
//! language boundary can still tell categories apart: no two categories share a code.

use serde::{Deserialize, Serialize};

/// Flat status codes. Values 0..=19 keep the ordinals existing engine bindings use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum WifiDirectStatus {
    WifiDirectEnabled = 0,
    WifiDirectDisabled = 1,
    ServiceDiscoverable = 2,
    ServiceRemoved = 3,
    StartedDiscovery = 4,
    ServiceListChanged = 5,
    StoppedDiscovery = 6,
    ConnectionSuccessful = 7,
    Disconnected = 8,
    ConnectionLost = 9,
    ErrorCreatingGroup = 10,
    ErrorAddingServiceRequest = 11,
    ErrorAddingService = 12,
    ErrorDiscoveringServices = 13,
    ErrorConnecting = 14,
    ErrorSocketConnectionFailed = 15,
    ErrorUnhandledAction = 16,
    ErrorSendingMessage = 17,
    ErrorReceivingMessage = 18,
    ErrorCreatingServerSocket = 19,
    AttemptingConnection = 20,
    ConnectionFailed = 21,
    ErrorInvalidState = 22,
    ErrorUnknownPeer = 23,
    ErrorNotConnected = 24,
    ErrorInvalidPassphrase = 25,
    ErrorSessionClosed = 26,
}

impl WifiDirectStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Wi-Fi Direct radio toggled on or off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RadioStatus {
    Enabled,
    Disabled,
}

impl RadioStatus {
    pub fn status(self) -> WifiDirectStatus {
        match self {
            RadioStatus::Enabled => WifiDirectStatus::WifiDirectEnabled,
            RadioStatus::Disabled => WifiDirectStatus::WifiDirectDisabled,
        }
    }

    pub fn code(self) -> i32 {
        self.status().code()
    }
}

/// Advertisement and discovery progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscoveryStatus {
    ServiceDiscoverable,
    ServiceRemoved,
    StartedDiscovery,
    ServiceListChanged,
    StoppedDiscovery,
}

impl DiscoveryStatus {
    pub fn status(self) -> WifiDirectStatus {
        match self {
            DiscoveryStatus::ServiceDiscoverable => WifiDirectStatus::ServiceDiscoverable,
            DiscoveryStatus::ServiceRemoved => WifiDirectStatus::ServiceRemoved,
            DiscoveryStatus::StartedDiscovery => WifiDirectStatus::StartedDiscovery,
            DiscoveryStatus::ServiceListChanged => WifiDirectStatus::ServiceListChanged,
            DiscoveryStatus::StoppedDiscovery => WifiDirectStatus::StoppedDiscovery,
        }
    }

    pub fn code(self) -> i32 {
        self.status().code()
    }
}

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionStatus {
    AttemptingConnection,
    ConnectionSuccessful,
    ConnectionFailed,
    Disconnected,
    /// Keep-alive timed out.
    ConnectionLost,
}

impl ConnectionStatus {
    pub fn status(self) -> WifiDirectStatus {
        match self {
            ConnectionStatus::AttemptingConnection => WifiDirectStatus::AttemptingConnection,
            ConnectionStatus::ConnectionSuccessful => WifiDirectStatus::ConnectionSuccessful,
            ConnectionStatus::ConnectionFailed => WifiDirectStatus::ConnectionFailed,
            ConnectionStatus::Disconnected => WifiDirectStatus::Disconnected,
            ConnectionStatus::ConnectionLost => WifiDirectStatus::ConnectionLost,
        }
    }

    pub fn code(self) -> i32 {
        self.status().code()
    }
}

/// Failure category reported by the platform transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportErrorKind {
    GroupCreation,
    ServiceRequest,
    ServiceRegistration,
    Discovery,
    Connection,
    SocketConnection,
    ServerSocket,
    Send,
    Receive,
    UnhandledAction,
}

/// Why an error event was raised. Exactly one per error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorReason {
    InvalidState,
    UnknownPeer,
    NotConnected,
    InvalidPassphrase,
    SessionClosed,
    Transport(TransportErrorKind),
}

impl ErrorReason {
    pub fn status(self) -> WifiDirectStatus {
        use TransportErrorKind as K;
        match self {
            ErrorReason::InvalidState => WifiDirectStatus::ErrorInvalidState,
            ErrorReason::UnknownPeer => WifiDirectStatus::ErrorUnknownPeer,
            ErrorReason::NotConnected => WifiDirectStatus::ErrorNotConnected,
            ErrorReason::InvalidPassphrase => WifiDirectStatus::ErrorInvalidPassphrase,
            ErrorReason::SessionClosed => WifiDirectStatus::ErrorSessionClosed,
            ErrorReason::Transport(kind) => match kind {
                K::GroupCreation => WifiDirectStatus::ErrorCreatingGroup,
                K::ServiceRequest => WifiDirectStatus::ErrorAddingServiceRequest,
                K::ServiceRegistration => WifiDirectStatus::ErrorAddingService,
                K::Discovery => WifiDirectStatus::ErrorDiscoveringServices,
                K::Connection => WifiDirectStatus::ErrorConnecting,
                K::SocketConnection => WifiDirectStatus::ErrorSocketConnectionFailed,
                K::ServerSocket => WifiDirectStatus::ErrorCreatingServerSocket,
                K::Send => WifiDirectStatus::ErrorSendingMessage,
                K::Receive => WifiDirectStatus::ErrorReceivingMessage,
                K::UnhandledAction => WifiDirectStatus::ErrorUnhandledAction,
            },
        }
    }

    pub fn code(self) -> i32 {
        self.status().code()
    }
}

/// Reason code the platform attached to a failure (Android `WifiP2pManager` codes, `-1` for socket I/O).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformReason(pub i32);

impl PlatformReason {
    pub const ERROR: PlatformReason = PlatformReason(0);
    pub const P2P_UNSUPPORTED: PlatformReason = PlatformReason(1);
    pub const BUSY: PlatformReason = PlatformReason(2);
    pub const NO_SERVICE_REQUESTS: PlatformReason = PlatformReason(3);
    pub const SOCKET: PlatformReason = PlatformReason(-1);
}

impl std::fmt::Display for PlatformReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            0 => f.write_str("internal error"),
            1 => f.write_str("p2p unsupported"),
            2 => f.write_str("busy"),
            3 => f.write_str("no service requests"),
            -1 => f.write_str("socket error"),
            n => write!(f, "unknown reason ({})", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const KINDS: [TransportErrorKind; 10] = [
        TransportErrorKind::GroupCreation,
        TransportErrorKind::ServiceRequest,
        TransportErrorKind::ServiceRegistration,
        TransportErrorKind::Discovery,
        TransportErrorKind::Connection,
        TransportErrorKind::SocketConnection,
        TransportErrorKind::ServerSocket,
        TransportErrorKind::Send,
        TransportErrorKind::Receive,
        TransportErrorKind::UnhandledAction,
    ];

    fn all_codes() -> Vec<i32> {
        let mut codes = vec![RadioStatus::Enabled.code(), RadioStatus::Disabled.code()];
        codes.extend(
            [
                DiscoveryStatus::ServiceDiscoverable,
                DiscoveryStatus::ServiceRemoved,
                DiscoveryStatus::StartedDiscovery,
                DiscoveryStatus::ServiceListChanged,
                DiscoveryStatus::StoppedDiscovery,
            ]
            .iter()
            .map(|s| s.code()),
        );
        codes.extend(
            [
                ConnectionStatus::AttemptingConnection,
                ConnectionStatus::ConnectionSuccessful,
                ConnectionStatus::ConnectionFailed,
                ConnectionStatus::Disconnected,
                ConnectionStatus::ConnectionLost,
            ]
            .iter()
            .map(|s| s.code()),
        );
        codes.extend(
            [
                ErrorReason::InvalidState,
                ErrorReason::UnknownPeer,
                ErrorReason::NotConnected,
                ErrorReason::InvalidPassphrase,
                ErrorReason::SessionClosed,
            ]
            .iter()
            .map(|r| r.code()),
        );
        codes.extend(KINDS.iter().map(|k| ErrorReason::Transport(*k).code()));
        codes
    }

    #[test]
    fn categories_never_share_a_code() {
        let codes = all_codes();
        let unique: HashSet<i32> = codes.iter().copied().collect();
        assert_eq!(unique.len(), codes.len());
        assert_eq!(codes.len(), 27);
    }

    #[test]
    fn legacy_ordinals_are_kept() {
        assert_eq!(RadioStatus::Enabled.code(), 0);
        assert_eq!(DiscoveryStatus::ServiceListChanged.code(), 5);
        assert_eq!(ConnectionStatus::ConnectionLost.code(), 9);
        assert_eq!(
            ErrorReason::Transport(TransportErrorKind::ServerSocket).code(),
            19
        );
        assert_eq!(
            ErrorReason::Transport(TransportErrorKind::UnhandledAction).code(),
            16
        );
    }

    #[test]
    fn platform_reason_display() {
        assert_eq!(PlatformReason::BUSY.to_string(), "busy");
        assert_eq!(PlatformReason(42).to_string(), "unknown reason (42)");
    }
}
