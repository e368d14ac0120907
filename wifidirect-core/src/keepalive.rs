//! Link liveness: keep-alive cadence, timeout detection, and filtering of
//! keep-alive frames before payloads reach the session.

use std::time::{Duration, Instant};

use crate::protocol::Frame;

/// What an inbound frame means once liveness has been accounted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Keep-alive consumed here.
    Consumed,
    /// Application payload for the session.
    Message(Vec<u8>),
    /// Handshake frame on an established link.
    Unexpected(Frame),
}

#[derive(Debug, Clone)]
pub struct KeepAliveMonitor {
    interval: Duration,
    timeout: Duration,
    last_heard: Instant,
    last_sent: Instant,
}

impl KeepAliveMonitor {
    pub fn new(interval: Duration, timeout: Duration, now: Instant) -> Self {
        Self {
            interval,
            timeout,
            last_heard: now,
            last_sent: now,
        }
    }

    /// Record an inbound frame. Any frame proves the peer is alive.
    pub fn on_frame(&mut self, frame: Frame, now: Instant) -> Inbound {
        self.last_heard = now;
        match frame {
            Frame::KeepAlive => Inbound::Consumed,
            Frame::Data(payload) => Inbound::Message(payload),
            other => Inbound::Unexpected(other),
        }
    }

    pub fn on_sent(&mut self, now: Instant) {
        self.last_sent = now;
    }

    pub fn keepalive_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_sent) >= self.interval
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_heard) >= self.timeout
    }

    /// Time until the peer is declared lost if nothing arrives.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.timeout
            .saturating_sub(now.saturating_duration_since(self.last_heard))
    }

    /// Time until the next keep-alive is due.
    pub fn until_keepalive(&self, now: Instant) -> Duration {
        self.interval
            .saturating_sub(now.saturating_duration_since(self.last_sent))
    }

    /// How long a link loop may sleep before it must send or check for expiry.
    pub fn next_wake(&self, now: Instant) -> Duration {
        self.remaining(now).min(self.until_keepalive(now))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
