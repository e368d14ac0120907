//! Session and transport errors.

use crate::device::PassphraseError;
use crate::session::SessionPhase;
use crate::status::{ErrorReason, PlatformReason, TransportErrorKind};

/// Failure the platform reported asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("transport error {kind:?}: {reason}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub reason: PlatformReason,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, reason: PlatformReason) -> Self {
        Self { kind, reason }
    }

    /// Socket-level failure (no platform reason code).
    pub fn socket(kind: TransportErrorKind) -> Self {
        Self::new(kind, PlatformReason::SOCKET)
    }
}

/// Error returned by session commands. Local preconditions are checked before the
/// transport is contacted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("{command} is not allowed while {phase:?}")]
    InvalidState {
        command: &'static str,
        phase: SessionPhase,
    },
    #[error("unknown peer {0}")]
    UnknownPeer(String),
    #[error("not connected")]
    NotConnected,
    #[error("invalid passphrase: {0}")]
    InvalidPassphrase(#[from] PassphraseError),
    #[error("session closed")]
    Closed,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl SessionError {
    pub fn reason(&self) -> ErrorReason {
        match self {
            SessionError::InvalidState { .. } => ErrorReason::InvalidState,
            SessionError::UnknownPeer(_) => ErrorReason::UnknownPeer,
            SessionError::NotConnected => ErrorReason::NotConnected,
            SessionError::InvalidPassphrase(_) => ErrorReason::InvalidPassphrase,
            SessionError::Closed => ErrorReason::SessionClosed,
            SessionError::Transport(e) => ErrorReason::Transport(e.kind),
        }
    }
}
