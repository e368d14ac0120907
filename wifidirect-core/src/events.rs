//! Typed listener registry, one list per event category.
//!
//! Listeners run synchronously on the control thread, in registration order.

use crate::device::Device;
use crate::session::SessionPhase;
use crate::status::{ConnectionStatus, DiscoveryStatus, ErrorReason, PlatformReason, RadioStatus};

/// Discovery status plus a snapshot of the discovered devices at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryEvent {
    pub status: DiscoveryStatus,
    pub devices: Vec<Device>,
}

/// Error surfaced to listeners. `platform_reason` is set for transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorEvent {
    pub reason: ErrorReason,
    pub platform_reason: Option<PlatformReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    pub from: SessionPhase,
    pub to: SessionPhase,
}

/// Handle returned on registration, used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Slot<F> = Vec<(ListenerId, F)>;

#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    radio: Slot<Box<dyn FnMut(RadioStatus)>>,
    discovery: Slot<Box<dyn FnMut(&DiscoveryEvent)>>,
    connection: Slot<Box<dyn FnMut(ConnectionStatus)>>,
    error: Slot<Box<dyn FnMut(&ErrorEvent)>>,
    message: Slot<Box<dyn FnMut(&[u8])>>,
    phase: Slot<Box<dyn FnMut(PhaseChange)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn on_radio(&mut self, f: impl FnMut(RadioStatus) + 'static) -> ListenerId {
        let id = self.allocate();
        self.radio.push((id, Box::new(f)));
        id
    }

    pub fn on_discovery(&mut self, f: impl FnMut(&DiscoveryEvent) + 'static) -> ListenerId {
        let id = self.allocate();
        self.discovery.push((id, Box::new(f)));
        id
    }

    pub fn on_connection(&mut self, f: impl FnMut(ConnectionStatus) + 'static) -> ListenerId {
        let id = self.allocate();
        self.connection.push((id, Box::new(f)));
        id
    }

    pub fn on_error(&mut self, f: impl FnMut(&ErrorEvent) + 'static) -> ListenerId {
        let id = self.allocate();
        self.error.push((id, Box::new(f)));
        id
    }

    /// Application messages only; keep-alives never reach these listeners.
    pub fn on_message(&mut self, f: impl FnMut(&[u8]) + 'static) -> ListenerId {
        let id = self.allocate();
        self.message.push((id, Box::new(f)));
        id
    }

    pub fn on_phase(&mut self, f: impl FnMut(PhaseChange) + 'static) -> ListenerId {
        let id = self.allocate();
        self.phase.push((id, Box::new(f)));
        id
    }

    /// Remove a listener from whichever category holds it. Returns false if unknown.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        fn take<F>(slot: &mut Slot<F>, id: ListenerId) -> bool {
            let before = slot.len();
            slot.retain(|(l, _)| *l != id);
            slot.len() != before
        }
        take(&mut self.radio, id)
            || take(&mut self.discovery, id)
            || take(&mut self.connection, id)
            || take(&mut self.error, id)
            || take(&mut self.message, id)
            || take(&mut self.phase, id)
    }

    pub fn len(&self) -> usize {
        self.radio.len()
            + self.discovery.len()
            + self.connection.len()
            + self.error.len()
            + self.message.len()
            + self.phase.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn emit_radio(&mut self, status: RadioStatus) {
        for (_, f) in self.radio.iter_mut() {
            f(status);
        }
    }

    pub(crate) fn emit_discovery(&mut self, event: &DiscoveryEvent) {
        for (_, f) in self.discovery.iter_mut() {
            f(event);
        }
    }

    pub(crate) fn emit_connection(&mut self, status: ConnectionStatus) {
        for (_, f) in self.connection.iter_mut() {
            f(status);
        }
    }

    pub(crate) fn emit_error(&mut self, event: &ErrorEvent) {
        for (_, f) in self.error.iter_mut() {
            f(event);
        }
    }

    pub(crate) fn emit_message(&mut self, payload: &[u8]) {
        for (_, f) in self.message.iter_mut() {
            f(payload);
        }
    }

    pub(crate) fn emit_phase(&mut self, change: PhaseChange) {
        for (_, f) in self.phase.iter_mut() {
            f(change);
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("radio", &self.radio.len())
            .field("discovery", &self.discovery.len())
            .field("connection", &self.connection.len())
            .field("error", &self.error.len())
            .field("message", &self.message.len())
            .field("phase", &self.phase.len())
            .finish()
    }
}
