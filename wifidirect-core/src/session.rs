//! Host-driven session state machine.
//!
//! `SessionManager` performs no I/O. Commands validate role and phase, update state,
//! and return the [`TransportCommand`]s the host must run against its platform
//! transport. Platform events go through [`SessionManager::handle_platform_event`],
//! which may also return commands (cleanup of stray or failed links).

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::channel::{ChannelStats, MessageChannel};
use crate::config::SessionConfig;
use crate::connection::ConnectionController;
use crate::device::{Device, DeviceAddress, Passphrase};
use crate::discovery::{DiscoveryController, DiscoveryMode, DiscoverySet};
use crate::error::{SessionError, TransportError};
use crate::events::{DiscoveryEvent, ErrorEvent, ListenerRegistry, PhaseChange};
use crate::status::{ConnectionStatus, DiscoveryStatus, RadioStatus, TransportErrorKind};
use crate::transport::{HostingRequest, PlatformEvent, TransportCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    Idle,
    Hosting,
    Discovering,
    Connecting,
    Connected,
    Disconnecting,
}

/// Fixed from the first hosting or discovery command until the session is back to idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    None,
    Server,
    Client,
}

pub type Commands = Vec<TransportCommand>;

pub struct SessionManager {
    config: SessionConfig,
    phase: SessionPhase,
    role: Role,
    closed: bool,
    discovery: DiscoveryController,
    connection: ConnectionController,
    channel: MessageChannel,
    listeners: ListenerRegistry,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        let discovery = DiscoveryController::new(config.service_name.clone());
        Self {
            config,
            phase: SessionPhase::Idle,
            role: Role::None,
            closed: false,
            discovery,
            connection: ConnectionController::new(),
            channel: MessageChannel::new(),
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_hosting(&self) -> bool {
        self.phase == SessionPhase::Hosting
    }

    pub fn is_discovering(&self) -> bool {
        self.discovery.is_active()
    }

    /// Devices found by the current or last search. Only up to date while discovering.
    pub fn discovered(&self) -> &DiscoverySet {
        self.discovery.found()
    }

    pub fn connected_peer(&self) -> Option<&Device> {
        self.connection.peer()
    }

    pub fn channel_stats(&self) -> ChannelStats {
        self.channel.stats()
    }

    pub fn listeners(&mut self) -> &mut ListenerRegistry {
        &mut self.listeners
    }

    // ── commands ────────────────────────────────────────────────────

    /// Host a group and advertise the configured service.
    pub fn create_discoverable_server(&mut self, passphrase: &str) -> Result<Commands, SessionError> {
        self.require("create_discoverable_server", &[SessionPhase::Idle])?;
        let passphrase = Passphrase::new(passphrase).map_err(|e| self.reject(e.into()))?;
        let request = HostingRequest {
            network_name: self.config.network_name.clone(),
            service_name: self.config.service_name.clone(),
            registration_type: self.config.registration_type.clone(),
            passphrase,
        };
        self.discovery.clear();
        self.role = Role::Server;
        self.set_phase(SessionPhase::Hosting);
        info!(service = %self.config.service_name, "hosting");
        Ok(vec![self.connection.host(request)])
    }

    /// Stop advertising. Connected clients stay connected.
    pub fn remove_service(&mut self) -> Result<Commands, SessionError> {
        self.require("remove_service", &[SessionPhase::Hosting])?;
        Ok(self.connection.withdraw_service().into_iter().collect())
    }

    /// Tear down the hosted group.
    pub fn remove_group(&mut self) -> Result<Commands, SessionError> {
        self.require("remove_group", &[SessionPhase::Hosting])?;
        Ok(self.shut_link(ConnectionStatus::Disconnected))
    }

    pub fn discover(&mut self, mode: DiscoveryMode) -> Result<Commands, SessionError> {
        self.require("discover", &[SessionPhase::Idle])?;
        let command = self.discovery.start(mode);
        self.role = Role::Client;
        self.set_phase(SessionPhase::Discovering);
        self.emit_discovery(DiscoveryStatus::StartedDiscovery);
        Ok(vec![command])
    }

    /// Discover using the configured mode.
    pub fn discover_default(&mut self) -> Result<Commands, SessionError> {
        self.discover(self.config.discovery_mode)
    }

    pub fn discover_services(&mut self) -> Result<Commands, SessionError> {
        self.discover(DiscoveryMode::Services)
    }

    pub fn discover_peers(&mut self) -> Result<Commands, SessionError> {
        self.discover(DiscoveryMode::Peers)
    }

    pub fn cancel_discovery(&mut self) -> Result<Commands, SessionError> {
        self.require("cancel_discovery", &[SessionPhase::Discovering])?;
        let command = self.discovery.cancel();
        self.set_phase(SessionPhase::Idle);
        self.emit_discovery(DiscoveryStatus::StoppedDiscovery);
        Ok(vec![command])
    }

    /// Connect to a discovered device. The target must be in the discovery set.
    pub fn connect(&mut self, address: &str, passphrase: &str) -> Result<Commands, SessionError> {
        self.require("connect", &[SessionPhase::Discovering])?;
        let target = DeviceAddress::parse(address)
            .ok()
            .and_then(|a| self.discovery.found().get(&a).cloned());
        let Some(target) = target else {
            return Err(self.reject(SessionError::UnknownPeer(address.to_string())));
        };
        let passphrase = Passphrase::new(passphrase).map_err(|e| self.reject(e.into()))?;
        info!(peer = %target.address, name = %target.display_name, "connecting");
        let command = self.connection.connect(target, passphrase);
        self.set_phase(SessionPhase::Connecting);
        self.listeners
            .emit_connection(ConnectionStatus::AttemptingConnection);
        Ok(vec![command])
    }

    /// Abandon a pending attempt. No terminal success/failure event follows.
    pub fn cancel_connect(&mut self) -> Result<Commands, SessionError> {
        self.require("cancel_connect", &[SessionPhase::Connecting])?;
        let commands = self.connection.cancel().into_iter().collect();
        self.return_from_connecting();
        Ok(commands)
    }

    /// Leave a hosted group or an established connection. Always succeeds locally.
    /// From idle this is a no-op that re-emits `Disconnected`.
    pub fn disconnect(&mut self) -> Result<Commands, SessionError> {
        if self.closed {
            return Err(self.reject(SessionError::Closed));
        }
        match self.phase {
            SessionPhase::Idle => {
                debug!("disconnect while idle");
                self.listeners.emit_connection(ConnectionStatus::Disconnected);
                Ok(Vec::new())
            }
            SessionPhase::Hosting | SessionPhase::Connected => {
                Ok(self.shut_link(ConnectionStatus::Disconnected))
            }
            phase => Err(self.reject(SessionError::InvalidState {
                command: "disconnect",
                phase,
            })),
        }
    }

    pub fn send(&mut self, payload: &[u8]) -> Result<Commands, SessionError> {
        if self.closed {
            return Err(self.reject(SessionError::Closed));
        }
        match self.channel.send(self.phase, payload) {
            Ok(command) => Ok(vec![command]),
            Err(e) => Err(self.reject(e)),
        }
    }

    /// Tear everything down. Idempotent; afterwards every command fails with `Closed`.
    pub fn close(&mut self) -> Commands {
        if self.closed {
            return Vec::new();
        }
        let mut commands = Vec::new();
        if self.discovery.is_active() {
            commands.push(self.discovery.cancel());
        }
        let was_linked = matches!(
            self.phase,
            SessionPhase::Hosting | SessionPhase::Connecting | SessionPhase::Connected
        );
        if self.connection.is_open() {
            self.set_phase(SessionPhase::Disconnecting);
        }
        commands.extend(self.connection.teardown());
        self.set_phase(SessionPhase::Idle);
        if was_linked {
            self.listeners.emit_connection(ConnectionStatus::Disconnected);
        }
        self.closed = true;
        info!(teardowns = self.connection.teardowns(), "session closed");
        commands
    }

    // ── platform events ─────────────────────────────────────────────

    pub fn handle_platform_event(&mut self, event: PlatformEvent) -> Commands {
        if self.closed {
            debug!(?event, "dropping event after close");
            return Vec::new();
        }
        match event {
            PlatformEvent::RadioChanged { enabled } => {
                let status = if enabled {
                    RadioStatus::Enabled
                } else {
                    RadioStatus::Disabled
                };
                self.listeners.emit_radio(status);
                Vec::new()
            }
            PlatformEvent::ServiceRegistered => {
                if self.phase == SessionPhase::Hosting && self.connection.is_advertising() {
                    self.emit_discovery(DiscoveryStatus::ServiceDiscoverable);
                } else {
                    debug!(phase = ?self.phase, "late service registration");
                }
                Vec::new()
            }
            PlatformEvent::ServiceRemoved => {
                self.emit_discovery(DiscoveryStatus::ServiceRemoved);
                Vec::new()
            }
            PlatformEvent::DiscoveryStarted => {
                debug!(active = self.discovery.is_active(), "platform discovery started");
                Vec::new()
            }
            PlatformEvent::DiscoveryStopped => {
                if !self.discovery.is_active() {
                    return Vec::new();
                }
                self.discovery.halt();
                if self.phase == SessionPhase::Discovering {
                    self.set_phase(SessionPhase::Idle);
                    self.emit_discovery(DiscoveryStatus::StoppedDiscovery);
                }
                Vec::new()
            }
            PlatformEvent::ServiceFound {
                instance_name,
                device,
            } => {
                if self.discovery.on_service_found(&instance_name, device) {
                    self.emit_discovery(DiscoveryStatus::ServiceListChanged);
                }
                Vec::new()
            }
            PlatformEvent::PeersFound(devices) => {
                if self.discovery.on_peers_found(devices) {
                    self.emit_discovery(DiscoveryStatus::ServiceListChanged);
                }
                Vec::new()
            }
            PlatformEvent::PeerLost(address) => {
                if self.discovery.on_peer_lost(&address) {
                    self.emit_discovery(DiscoveryStatus::ServiceListChanged);
                }
                Vec::new()
            }
            PlatformEvent::Connected { peer } => self.on_connected(peer),
            PlatformEvent::Disconnected => self.on_link_down(ConnectionStatus::Disconnected),
            PlatformEvent::ConnectionLost => self.on_link_down(ConnectionStatus::ConnectionLost),
            PlatformEvent::MessageReceived(payload) => {
                if self.channel.accept(self.phase, &payload) {
                    self.listeners.emit_message(&payload);
                }
                Vec::new()
            }
            PlatformEvent::Failed(error) => self.on_transport_failure(error),
        }
    }

    fn on_connected(&mut self, peer: Option<Device>) -> Commands {
        let mut commands = Vec::new();
        match self.phase {
            SessionPhase::Connecting => {
                let stale = match (&peer, self.connection.pending()) {
                    (Some(reported), Some(target)) => reported.address != target.address,
                    _ => false,
                };
                if stale {
                    warn!(
                        peer = ?peer.as_ref().map(|d| d.address.to_string()),
                        "link from an abandoned attempt, tearing it down"
                    );
                    commands.push(TransportCommand::Disconnect);
                    return commands;
                }
                let peer = self.connection.establish(peer);
                if self.discovery.is_active() {
                    commands.push(self.discovery.cancel());
                }
                self.discovery.clear();
                info!(peer = ?peer.as_ref().map(|d| d.address.to_string()), "connected");
            }
            SessionPhase::Hosting => {
                info!(peer = ?peer.as_ref().map(|d| d.address.to_string()), "client joined");
                commands.extend(self.connection.accept_client(peer));
            }
            SessionPhase::Connected => {
                debug!("duplicate connected event");
                return commands;
            }
            phase => {
                warn!(?phase, "stray link reported, tearing it down");
                commands.push(TransportCommand::Disconnect);
                return commands;
            }
        }
        self.set_phase(SessionPhase::Connected);
        self.listeners
            .emit_connection(ConnectionStatus::ConnectionSuccessful);
        commands
    }

    fn on_link_down(&mut self, status: ConnectionStatus) -> Commands {
        if self.phase != SessionPhase::Connected {
            debug!(?status, phase = ?self.phase, "link-down event ignored");
            return Vec::new();
        }
        info!(?status, "link down");
        self.shut_link(status)
    }

    fn on_transport_failure(&mut self, error: TransportError) -> Commands {
        use TransportErrorKind as K;
        warn!(kind = ?error.kind, reason = %error.reason, phase = ?self.phase, "transport failure");
        self.listeners.emit_error(&ErrorEvent {
            reason: crate::status::ErrorReason::Transport(error.kind),
            platform_reason: Some(error.reason),
        });
        match (error.kind, self.phase) {
            (K::GroupCreation | K::ServiceRegistration | K::ServerSocket, SessionPhase::Hosting) => {
                self.shut_link(ConnectionStatus::Disconnected)
            }
            (K::Discovery | K::ServiceRequest, SessionPhase::Discovering) => {
                self.discovery.halt();
                self.set_phase(SessionPhase::Idle);
                self.emit_discovery(DiscoveryStatus::StoppedDiscovery);
                Vec::new()
            }
            (K::Discovery | K::ServiceRequest, SessionPhase::Connecting) => {
                self.discovery.halt();
                Vec::new()
            }
            (K::Connection | K::SocketConnection, SessionPhase::Connecting) => {
                if let Some(target) = self.connection.fail() {
                    debug!(peer = %target.address, "connection attempt failed");
                }
                self.return_from_connecting();
                self.listeners.emit_connection(ConnectionStatus::ConnectionFailed);
                Vec::new()
            }
            (K::SocketConnection, SessionPhase::Connected) => {
                self.shut_link(ConnectionStatus::ConnectionFailed)
            }
            (K::Receive, SessionPhase::Connected) => self.shut_link(ConnectionStatus::ConnectionLost),
            _ => Vec::new(),
        }
    }

    // ── helpers ─────────────────────────────────────────────────────

    /// Walk Disconnecting → Idle, closing the link once, and report `status`.
    fn shut_link(&mut self, status: ConnectionStatus) -> Commands {
        self.set_phase(SessionPhase::Disconnecting);
        let commands = self.connection.teardown();
        self.set_phase(SessionPhase::Idle);
        self.listeners.emit_connection(status);
        commands
    }

    fn return_from_connecting(&mut self) {
        if self.discovery.is_active() {
            self.set_phase(SessionPhase::Discovering);
        } else {
            self.set_phase(SessionPhase::Idle);
        }
    }

    fn require(&mut self, command: &'static str, legal: &[SessionPhase]) -> Result<(), SessionError> {
        if self.closed {
            return Err(self.reject(SessionError::Closed));
        }
        if !legal.contains(&self.phase) {
            return Err(self.reject(SessionError::InvalidState {
                command,
                phase: self.phase,
            }));
        }
        Ok(())
    }

    /// Surface a rejected command to error listeners and hand the error back.
    fn reject(&mut self, error: SessionError) -> SessionError {
        debug!(%error, phase = ?self.phase, "command rejected");
        self.listeners.emit_error(&ErrorEvent {
            reason: error.reason(),
            platform_reason: None,
        });
        error
    }

    fn set_phase(&mut self, to: SessionPhase) {
        let from = self.phase;
        if from == to {
            return;
        }
        self.phase = to;
        if to == SessionPhase::Idle {
            self.role = Role::None;
        }
        debug!(?from, ?to, "phase");
        self.listeners.emit_phase(PhaseChange { from, to });
    }

    fn emit_discovery(&mut self, status: DiscoveryStatus) {
        let event = DiscoveryEvent {
            status,
            devices: self.discovery.found().to_vec(),
        };
        self.listeners.emit_discovery(&event);
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("phase", &self.phase)
            .field("role", &self.role)
            .field("closed", &self.closed)
            .field("discovery_mode", &self.discovery.mode())
            .field("discovered", &self.discovery.found().len())
            .field("listeners", &self.listeners)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{ErrorReason, PlatformReason};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn manager() -> SessionManager {
        SessionManager::new(SessionConfig::default())
    }

    fn device(addr: &str, name: &str) -> Device {
        Device::new(DeviceAddress::parse(addr).unwrap(), name)
    }

    fn found(m: &mut SessionManager, addr: &str, name: &str) {
        let instance_name = m.config().service_name.clone();
        m.handle_platform_event(PlatformEvent::ServiceFound {
            instance_name,
            device: device(addr, name),
        });
    }

    fn connected_client() -> SessionManager {
        let mut m = manager();
        m.discover_services().unwrap();
        found(&mut m, "AA:BB", "Phone1");
        m.connect("AA:BB", "ABCD1234").unwrap();
        m.handle_platform_event(PlatformEvent::Connected { peer: None });
        m
    }

    #[test]
    fn host_then_disconnect_twice() {
        let mut m = manager();
        let cmds = m.create_discoverable_server("ABCD1234").unwrap();
        assert!(matches!(cmds[0], TransportCommand::StartHosting(_)));
        assert_eq!(m.phase(), SessionPhase::Hosting);
        assert_eq!(m.role(), Role::Server);

        let cmds = m.disconnect().unwrap();
        assert_eq!(
            cmds,
            vec![TransportCommand::RemoveService, TransportCommand::Disconnect]
        );
        assert_eq!(m.phase(), SessionPhase::Idle);
        assert_eq!(m.role(), Role::None);

        assert_eq!(m.disconnect(), Ok(Vec::new()));
        assert_eq!(m.phase(), SessionPhase::Idle);
    }

    #[test]
    fn disconnect_walks_through_disconnecting() {
        let mut m = manager();
        let phases = Rc::new(RefCell::new(Vec::new()));
        let p = phases.clone();
        m.listeners().on_phase(move |c| p.borrow_mut().push(c.to));
        m.create_discoverable_server("ABCD1234").unwrap();
        m.disconnect().unwrap();
        assert_eq!(
            *phases.borrow(),
            vec![
                SessionPhase::Hosting,
                SessionPhase::Disconnecting,
                SessionPhase::Idle
            ]
        );
    }

    #[test]
    fn hosting_requires_idle() {
        let mut m = manager();
        m.discover_services().unwrap();
        let err = m.create_discoverable_server("ABCD1234").unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidState {
                command: "create_discoverable_server",
                phase: SessionPhase::Discovering
            }
        );
        assert_eq!(m.phase(), SessionPhase::Discovering);
        assert!(!m.is_hosting());
    }

    #[test]
    fn discovery_requires_idle() {
        let mut m = manager();
        m.create_discoverable_server("ABCD1234").unwrap();
        assert!(matches!(
            m.discover_peers(),
            Err(SessionError::InvalidState { .. })
        ));
        assert!(!m.is_discovering());
    }

    #[test]
    fn invalid_passphrase_leaves_idle() {
        let mut m = manager();
        assert!(matches!(
            m.create_discoverable_server("short"),
            Err(SessionError::InvalidPassphrase(_))
        ));
        assert_eq!(m.phase(), SessionPhase::Idle);
    }

    #[test]
    fn cancel_discovery_keeps_found_devices() {
        let mut m = manager();
        m.discover_services().unwrap();
        found(&mut m, "AA:BB", "Phone1");
        assert_eq!(m.cancel_discovery().unwrap(), vec![TransportCommand::CancelDiscovery]);
        assert_eq!(m.phase(), SessionPhase::Idle);
        assert_eq!(m.discovered().len(), 1);
    }

    #[test]
    fn unknown_peer_is_rejected_before_passphrase() {
        let mut m = manager();
        m.discover_services().unwrap();
        assert_eq!(
            m.connect("CC:DD", "pass"),
            Err(SessionError::UnknownPeer("CC:DD".into()))
        );
        assert_eq!(m.phase(), SessionPhase::Discovering);
    }

    #[test]
    fn connect_success_clears_discovery() {
        let m = connected_client();
        assert_eq!(m.phase(), SessionPhase::Connected);
        assert!(m.discovered().is_empty());
        assert!(!m.is_discovering());
        assert_eq!(m.connected_peer(), Some(&device("AA:BB", "Phone1")));
        assert_eq!(m.role(), Role::Client);
    }

    #[test]
    fn cancel_connect_returns_to_discovering_without_terminal_event() {
        let mut m = manager();
        let statuses = Rc::new(RefCell::new(Vec::new()));
        let s = statuses.clone();
        m.listeners().on_connection(move |st| s.borrow_mut().push(st));
        m.discover_services().unwrap();
        found(&mut m, "AA:BB", "Phone1");
        m.connect("AA:BB", "ABCD1234").unwrap();
        assert_eq!(m.cancel_connect().unwrap(), vec![TransportCommand::CancelConnect]);
        assert_eq!(m.phase(), SessionPhase::Discovering);
        assert_eq!(*statuses.borrow(), vec![ConnectionStatus::AttemptingConnection]);
    }

    #[test]
    fn late_connected_after_cancel_tears_link_down() {
        let mut m = manager();
        m.discover_services().unwrap();
        found(&mut m, "AA:BB", "Phone1");
        m.connect("AA:BB", "ABCD1234").unwrap();
        m.cancel_connect().unwrap();
        m.cancel_discovery().unwrap();
        let cmds = m.handle_platform_event(PlatformEvent::Connected { peer: None });
        assert_eq!(cmds, vec![TransportCommand::Disconnect]);
        assert_eq!(m.phase(), SessionPhase::Idle);
    }

    #[test]
    fn connection_failure_goes_back_to_discovering() {
        let mut m = manager();
        let errors = Rc::new(RefCell::new(Vec::new()));
        let e = errors.clone();
        m.listeners().on_error(move |ev| e.borrow_mut().push(*ev));
        m.discover_services().unwrap();
        found(&mut m, "AA:BB", "Phone1");
        m.connect("AA:BB", "ABCD1234").unwrap();
        m.handle_platform_event(PlatformEvent::Failed(TransportError::new(
            TransportErrorKind::Connection,
            PlatformReason::BUSY,
        )));
        assert_eq!(m.phase(), SessionPhase::Discovering);
        assert_eq!(
            *errors.borrow(),
            vec![ErrorEvent {
                reason: ErrorReason::Transport(TransportErrorKind::Connection),
                platform_reason: Some(PlatformReason::BUSY),
            }]
        );
    }

    #[test]
    fn group_creation_failure_returns_to_idle() {
        let mut m = manager();
        m.create_discoverable_server("ABCD1234").unwrap();
        m.handle_platform_event(PlatformEvent::Failed(TransportError::new(
            TransportErrorKind::GroupCreation,
            PlatformReason::P2P_UNSUPPORTED,
        )));
        assert_eq!(m.phase(), SessionPhase::Idle);
        assert_eq!(m.role(), Role::None);
    }

    #[test]
    fn stale_link_after_reconnect_is_torn_down() {
        let mut m = manager();
        m.discover_services().unwrap();
        found(&mut m, "AA:BB", "Old");
        found(&mut m, "CC:DD", "New");
        m.connect("AA:BB", "ABCD1234").unwrap();
        m.cancel_connect().unwrap();
        m.connect("CC:DD", "ABCD1234").unwrap();

        let cmds = m.handle_platform_event(PlatformEvent::Connected {
            peer: Some(device("AA:BB", "Old")),
        });
        assert_eq!(cmds, vec![TransportCommand::Disconnect]);
        assert_eq!(m.phase(), SessionPhase::Connecting);
        assert_eq!(m.connected_peer(), None);

        // The real attempt still completes.
        m.handle_platform_event(PlatformEvent::Connected {
            peer: Some(device("CC:DD", "New")),
        });
        assert_eq!(m.phase(), SessionPhase::Connected);
        assert_eq!(m.connected_peer(), Some(&device("CC:DD", "New")));
    }

    #[test]
    fn accept_error_while_linked_keeps_the_link() {
        let mut m = manager();
        m.create_discoverable_server("ABCD1234").unwrap();
        m.handle_platform_event(PlatformEvent::Connected {
            peer: Some(device("CC:DD", "Tablet")),
        });
        let cmds = m.handle_platform_event(PlatformEvent::Failed(TransportError::socket(
            TransportErrorKind::ServerSocket,
        )));
        assert!(cmds.is_empty());
        assert_eq!(m.phase(), SessionPhase::Connected);
        assert_eq!(m.connected_peer(), Some(&device("CC:DD", "Tablet")));
    }

    #[test]
    fn send_error_is_not_terminal() {
        let mut m = connected_client();
        m.handle_platform_event(PlatformEvent::Failed(TransportError::socket(
            TransportErrorKind::Send,
        )));
        assert_eq!(m.phase(), SessionPhase::Connected);
    }

    #[test]
    fn connection_lost_returns_to_idle() {
        let mut m = connected_client();
        let cmds = m.handle_platform_event(PlatformEvent::ConnectionLost);
        assert_eq!(cmds, vec![TransportCommand::Disconnect]);
        assert_eq!(m.phase(), SessionPhase::Idle);
        assert!(m.send(b"x").is_err());
    }

    #[test]
    fn host_accepts_client() {
        let mut m = manager();
        m.create_discoverable_server("ABCD1234").unwrap();
        let cmds = m.handle_platform_event(PlatformEvent::Connected {
            peer: Some(device("CC:DD", "Tablet")),
        });
        assert_eq!(cmds, vec![TransportCommand::RemoveService]);
        assert_eq!(m.phase(), SessionPhase::Connected);
        assert_eq!(m.role(), Role::Server);
        assert!(m.remove_service().is_err());
    }

    #[test]
    fn remove_group_only_while_hosting() {
        let mut m = manager();
        assert!(matches!(
            m.remove_group(),
            Err(SessionError::InvalidState { .. })
        ));
        m.create_discoverable_server("ABCD1234").unwrap();
        assert_eq!(
            m.remove_group().unwrap(),
            vec![TransportCommand::RemoveService, TransportCommand::Disconnect]
        );
        assert_eq!(m.phase(), SessionPhase::Idle);
    }

    #[test]
    fn close_is_idempotent_and_final() {
        let mut m = connected_client();
        assert_eq!(m.close(), vec![TransportCommand::Disconnect]);
        assert!(m.close().is_empty());
        assert_eq!(m.discover_services(), Err(SessionError::Closed));
        assert_eq!(m.send(b"x"), Err(SessionError::Closed));
        assert!(m
            .handle_platform_event(PlatformEvent::MessageReceived(b"late".to_vec()))
            .is_empty());
    }

    #[test]
    fn rejected_commands_reach_error_listeners() {
        let mut m = manager();
        let reasons = Rc::new(RefCell::new(Vec::new()));
        let r = reasons.clone();
        m.listeners().on_error(move |ev| r.borrow_mut().push(ev.reason));
        let _ = m.send(b"hello");
        let _ = m.cancel_connect();
        assert_eq!(
            *reasons.borrow(),
            vec![ErrorReason::NotConnected, ErrorReason::InvalidState]
        );
    }
}
