//! Owned session handle: a [`SessionManager`] wired to a platform transport and
//! the inbox that marshals platform events onto the control thread.

use std::time::Duration;

use crate::config::SessionConfig;
use crate::discovery::{DiscoveryMode, DiscoverySet};
use crate::error::SessionError;
use crate::events::ListenerRegistry;
use crate::session::{Commands, SessionManager, SessionPhase};
use crate::transport::{event_channel, EventInbox, EventSink, PlatformTransport};

/// One Wi-Fi Direct session. Construct one per device; nothing is global.
///
/// Every method runs on the control thread. Platform events queued by the
/// transport are applied only when [`pump`](Self::pump) runs, so session state
/// never changes between two commands without the owner asking for it.
pub struct WifiDirect<T: PlatformTransport> {
    session: SessionManager,
    transport: T,
    inbox: EventInbox,
    sink: EventSink,
}

impl<T: PlatformTransport> WifiDirect<T> {
    /// `make_transport` receives the sink the transport must report events through.
    pub fn new(config: SessionConfig, make_transport: impl FnOnce(EventSink) -> T) -> Self {
        let (sink, inbox) = event_channel();
        let transport = make_transport(sink.clone());
        Self {
            session: SessionManager::new(config),
            transport,
            inbox,
            sink,
        }
    }

    pub fn try_new<E>(
        config: SessionConfig,
        make_transport: impl FnOnce(EventSink) -> Result<T, E>,
    ) -> Result<Self, E> {
        let (sink, inbox) = event_channel();
        let transport = make_transport(sink.clone())?;
        Ok(Self {
            session: SessionManager::new(config),
            transport,
            inbox,
            sink,
        })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase()
    }

    pub fn discovered(&self) -> &DiscoverySet {
        self.session.discovered()
    }

    pub fn listeners(&mut self) -> &mut ListenerRegistry {
        self.session.listeners()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Extra sink for code that raises platform events outside the transport.
    pub fn event_sink(&self) -> EventSink {
        self.sink.clone()
    }

    pub fn create_discoverable_server(&mut self, passphrase: &str) -> Result<(), SessionError> {
        let commands = self.session.create_discoverable_server(passphrase)?;
        self.execute(commands);
        Ok(())
    }

    pub fn remove_service(&mut self) -> Result<(), SessionError> {
        let commands = self.session.remove_service()?;
        self.execute(commands);
        Ok(())
    }

    pub fn remove_group(&mut self) -> Result<(), SessionError> {
        let commands = self.session.remove_group()?;
        self.execute(commands);
        Ok(())
    }

    pub fn discover(&mut self, mode: DiscoveryMode) -> Result<(), SessionError> {
        let commands = self.session.discover(mode)?;
        self.execute(commands);
        Ok(())
    }

    pub fn discover_services(&mut self) -> Result<(), SessionError> {
        self.discover(DiscoveryMode::Services)
    }

    pub fn discover_peers(&mut self) -> Result<(), SessionError> {
        self.discover(DiscoveryMode::Peers)
    }

    pub fn cancel_discovery(&mut self) -> Result<(), SessionError> {
        let commands = self.session.cancel_discovery()?;
        self.execute(commands);
        Ok(())
    }

    pub fn connect(&mut self, address: &str, passphrase: &str) -> Result<(), SessionError> {
        let commands = self.session.connect(address, passphrase)?;
        self.execute(commands);
        Ok(())
    }

    pub fn cancel_connect(&mut self) -> Result<(), SessionError> {
        let commands = self.session.cancel_connect()?;
        self.execute(commands);
        Ok(())
    }

    pub fn disconnect(&mut self) -> Result<(), SessionError> {
        let commands = self.session.disconnect()?;
        self.execute(commands);
        Ok(())
    }

    pub fn send(&mut self, payload: &[u8]) -> Result<(), SessionError> {
        let commands = self.session.send(payload)?;
        self.execute(commands);
        Ok(())
    }

    /// Apply every queued platform event. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.inbox.try_next() {
            let commands = self.session.handle_platform_event(event);
            self.execute(commands);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for the first event, then drain the rest.
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        match self.inbox.next_timeout(timeout) {
            Some(event) => {
                let commands = self.session.handle_platform_event(event);
                self.execute(commands);
                1 + self.pump()
            }
            None => 0,
        }
    }

    /// Release the link and stop all platform activity. Safe to call more than once;
    /// also runs on drop.
    pub fn close(&mut self) {
        let commands = self.session.close();
        self.execute(commands);
    }

    fn execute(&mut self, commands: Commands) {
        for command in commands {
            command.apply(&mut self.transport);
        }
    }
}

impl<T: PlatformTransport> Drop for WifiDirect<T> {
    fn drop(&mut self) {
        self.close();
    }
}
