//! Application message channel over an established link.

use tracing::debug;

use crate::error::SessionError;
use crate::session::SessionPhase;
use crate::transport::TransportCommand;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStats {
    pub sent: u64,
    pub received: u64,
    /// Inbound messages that arrived after the link was gone.
    pub dropped: u64,
}

#[derive(Debug, Default)]
pub struct MessageChannel {
    stats: ChannelStats,
}

impl MessageChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Legal only while connected; the payload is passed through byte-for-byte.
    pub fn send(&mut self, phase: SessionPhase, payload: &[u8]) -> Result<TransportCommand, SessionError> {
        if phase != SessionPhase::Connected {
            return Err(SessionError::NotConnected);
        }
        self.stats.sent += 1;
        Ok(TransportCommand::Send(payload.to_vec()))
    }

    /// Returns true if an inbound message should reach the application.
    pub fn accept(&mut self, phase: SessionPhase, payload: &[u8]) -> bool {
        if phase != SessionPhase::Connected {
            debug!(len = payload.len(), ?phase, "dropping late message");
            self.stats.dropped += 1;
            return false;
        }
        self.stats.received += 1;
        true
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats
    }
}
