//! `PlatformTransport` over the LAN: multicast advertisement stands in for Wi-Fi Direct
//! service discovery and a TCP link stands in for the P2P group socket.

use std::collections::HashMap;
use std::future::Future;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wifidirect_core::{
    Beacon, Device, DeviceAddress, DiscoveryMode, EventSink, HostingRequest, KeepAliveMonitor, Passphrase,
    PlatformEvent, PlatformReason, PlatformTransport, TransportError, TransportErrorKind,
    PROTOCOL_VERSION,
};

use crate::config::Config;
use crate::discovery::{self, Directory, DiscoveryFilter};
use crate::link::{self, LinkError, LocalIdentity};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The one open link, if any. A new link replaces nothing: hosts turn extra clients away.
struct ActiveLink {
    id: u64,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

#[derive(Default)]
struct LinkSlot {
    next_id: u64,
    active: Option<ActiveLink>,
}

type SharedSlot = Arc<Mutex<LinkSlot>>;

impl LinkSlot {
    /// Claim the slot for a new link. None when a link is already open.
    fn claim(&mut self) -> Option<(u64, mpsc::UnboundedReceiver<Vec<u8>>)> {
        if self.active.is_some() {
            return None;
        }
        self.next_id += 1;
        let (outbound, rx) = mpsc::unbounded_channel();
        self.active = Some(ActiveLink {
            id: self.next_id,
            outbound,
        });
        Some((self.next_id, rx))
    }

    /// Release the slot if it still belongs to link `id`.
    fn release(&mut self, id: u64) {
        if self.active.as_ref().is_some_and(|l| l.id == id) {
            self.active = None;
        }
    }
}

/// Everything a link task needs, cloned into each spawned task.
#[derive(Clone)]
struct LinkContext {
    identity: LocalIdentity,
    slot: SharedSlot,
    sink: EventSink,
    keepalive_interval: Duration,
    keepalive_timeout: Duration,
}

impl LinkContext {
    fn monitor(&self) -> KeepAliveMonitor {
        KeepAliveMonitor::new(self.keepalive_interval, self.keepalive_timeout, Instant::now())
    }

    /// Run a handshaken stream as the session's link, then free the slot.
    async fn carry(&self, stream: TcpStream, id: u64, rx: mpsc::UnboundedReceiver<Vec<u8>>) {
        link::run_link(stream, rx, self.sink.clone(), self.monitor()).await;
        self.slot.lock().await.release(id);
    }
}

pub struct LanTransport {
    runtime: Runtime,
    sink: EventSink,
    ctx: LinkContext,
    service_name: String,
    discovery_port: u16,
    link_port: u16,
    directory: Directory,
    beacon: Option<JoinHandle<()>>,
    listener: Option<JoinHandle<()>>,
    watcher: Option<JoinHandle<()>>,
    connector: Option<JoinHandle<()>>,
}

impl LanTransport {
    pub fn new(cfg: &Config, sink: EventSink) -> std::io::Result<Self> {
        let runtime = Runtime::new()?;
        let identity = LocalIdentity {
            address: cfg.address(),
            display_name: cfg.device_name.clone(),
        };
        info!(address = %identity.address, name = %identity.display_name, "lan transport ready");
        // No radio to toggle: the LAN is always "enabled".
        sink.emit(PlatformEvent::RadioChanged { enabled: true });
        Ok(Self {
            runtime,
            ctx: LinkContext {
                identity,
                slot: SharedSlot::default(),
                sink: sink.clone(),
                keepalive_interval: cfg.session.keepalive_interval(),
                keepalive_timeout: cfg.session.keepalive_timeout(),
            },
            sink,
            service_name: cfg.session.service_name.clone(),
            discovery_port: cfg.discovery_port,
            link_port: cfg.link_port,
            directory: Arc::new(Mutex::new(HashMap::new())),
            beacon: None,
            listener: None,
            watcher: None,
            connector: None,
        })
    }

    /// This device as peers see it.
    pub fn local_device(&self) -> Device {
        self.ctx.identity.device()
    }

    /// Run a future on the transport's runtime.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.runtime.spawn(future)
    }

    fn stop(task: &mut Option<JoinHandle<()>>) -> bool {
        match task.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

async fn serve(listener: TcpListener, ctx: LinkContext, passphrase: Passphrase) {
    loop {
        let (mut stream, from) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "link listener failed");
                ctx.sink
                    .fail(TransportError::socket(TransportErrorKind::ServerSocket));
                return;
            }
        };
        let ctx = ctx.clone();
        let passphrase = passphrase.clone();
        tokio::spawn(async move {
            let claimed = ctx.slot.lock().await.claim();
            let Some((id, rx)) = claimed else {
                debug!(%from, "already linked, turning client away");
                return;
            };
            match link::handshake_accept(&mut stream, &ctx.identity, &passphrase).await {
                Ok(peer) => {
                    info!(%from, peer = %peer.address, "client joined");
                    ctx.sink.emit(PlatformEvent::Connected { peer: Some(peer) });
                    ctx.carry(stream, id, rx).await;
                }
                Err(e) => {
                    ctx.slot.lock().await.release(id);
                    match e {
                        LinkError::Rejected => info!(%from, "client rejected: wrong passphrase"),
                        e => debug!(%from, error = %e, "client handshake failed"),
                    }
                }
            }
        });
    }
}

async fn dial(
    ctx: LinkContext,
    directory: Directory,
    address: DeviceAddress,
    passphrase: Passphrase,
) {
    let target = directory.lock().await.get(&address).copied();
    let Some(target) = target else {
        warn!(peer = %address, "no route to peer");
        ctx.sink.fail(TransportError::new(
            TransportErrorKind::Connection,
            PlatformReason::ERROR,
        ));
        return;
    };
    let mut stream = match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(target)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            warn!(%target, error = %e, "connect failed");
            ctx.sink
                .fail(TransportError::socket(TransportErrorKind::SocketConnection));
            return;
        }
        Err(_) => {
            warn!(%target, "connect timed out");
            ctx.sink
                .fail(TransportError::socket(TransportErrorKind::SocketConnection));
            return;
        }
    };
    let host = match link::handshake_connect(&mut stream, &ctx.identity, &passphrase).await {
        Ok(host) => host,
        Err(LinkError::Rejected) => {
            info!(peer = %address, "passphrase rejected by host");
            ctx.sink.fail(TransportError::new(
                TransportErrorKind::Connection,
                PlatformReason::ERROR,
            ));
            return;
        }
        Err(e) => {
            warn!(peer = %address, error = %e, "handshake failed");
            ctx.sink
                .fail(TransportError::socket(TransportErrorKind::SocketConnection));
            return;
        }
    };
    let claimed = ctx.slot.lock().await.claim();
    let Some((id, rx)) = claimed else {
        warn!(peer = %address, "another link is still open, dropping this one");
        ctx.sink.fail(TransportError::new(
            TransportErrorKind::Connection,
            PlatformReason::BUSY,
        ));
        return;
    };
    info!(peer = %host.address, name = %host.display_name, "linked to host");
    ctx.sink.emit(PlatformEvent::Connected { peer: Some(host) });
    // Detached so cancelling the attempt never cuts an established link.
    tokio::spawn(async move { ctx.carry(stream, id, rx).await });
}

impl PlatformTransport for LanTransport {
    fn start_hosting(&mut self, request: &HostingRequest) {
        Self::stop(&mut self.listener);
        Self::stop(&mut self.beacon);
        let beacon = Beacon {
            protocol_version: PROTOCOL_VERSION,
            service_name: request.service_name.clone(),
            network_name: request.network_name.clone(),
            address: self.ctx.identity.address.clone(),
            display_name: self.ctx.identity.display_name.clone(),
            link_port: self.link_port,
        };
        let ctx = self.ctx.clone();
        let passphrase = request.passphrase.clone();
        let link_port = self.link_port;
        let discovery_port = self.discovery_port;
        let sink = self.sink.clone();
        // Bind first so nothing is advertised that cannot be joined.
        let (bound_tx, bound_rx) = tokio::sync::oneshot::channel();
        self.listener = Some(self.runtime.spawn(async move {
            match TcpListener::bind((Ipv4Addr::UNSPECIFIED, link_port)).await {
                Ok(listener) => {
                    info!(port = link_port, "link listener up");
                    let _ = bound_tx.send(());
                    serve(listener, ctx, passphrase).await;
                }
                Err(e) => {
                    warn!(port = link_port, error = %e, "cannot bind link port");
                    ctx.sink
                        .fail(TransportError::socket(TransportErrorKind::GroupCreation));
                }
            }
        }));
        self.beacon = Some(self.runtime.spawn(async move {
            if bound_rx.await.is_ok() {
                discovery::advertise(beacon, discovery_port, sink).await;
            }
        }));
    }

    fn remove_service(&mut self) {
        if Self::stop(&mut self.beacon) {
            self.sink.emit(PlatformEvent::ServiceRemoved);
        }
    }

    fn start_discovery(&mut self, mode: DiscoveryMode) {
        Self::stop(&mut self.watcher);
        let filter = DiscoveryFilter {
            mode,
            service_name: self.service_name.clone(),
            own_address: self.ctx.identity.address.clone(),
        };
        let directory = self.directory.clone();
        let sink = self.sink.clone();
        let port = self.discovery_port;
        self.watcher = Some(
            self.runtime
                .spawn(discovery::watch(filter, port, directory, sink)),
        );
    }

    fn cancel_discovery(&mut self) {
        Self::stop(&mut self.watcher);
    }

    fn connect(&mut self, address: &DeviceAddress, passphrase: &Passphrase) {
        Self::stop(&mut self.connector);
        self.connector = Some(self.runtime.spawn(dial(
            self.ctx.clone(),
            self.directory.clone(),
            address.clone(),
            passphrase.clone(),
        )));
    }

    fn cancel_connect(&mut self) {
        Self::stop(&mut self.connector);
    }

    fn disconnect(&mut self) {
        Self::stop(&mut self.beacon);
        Self::stop(&mut self.listener);
        // Pending attempts are stopped by cancel_connect, not here.
        // Dropping the sender ends the link loop, which closes the socket.
        if let Some(active) = self.ctx.slot.blocking_lock().active.take() {
            debug!(link = active.id, "closing link");
        }
    }

    fn send(&mut self, payload: &[u8]) {
        let slot = self.ctx.slot.blocking_lock();
        let delivered = slot
            .active
            .as_ref()
            .is_some_and(|link| link.outbound.send(payload.to_vec()).is_ok());
        if !delivered {
            self.sink
                .fail(TransportError::socket(TransportErrorKind::Send));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wifidirect_core::event_channel;

    fn context(addr: &str, sink: EventSink) -> LinkContext {
        LinkContext {
            identity: LocalIdentity {
                address: DeviceAddress::parse(addr).unwrap(),
                display_name: "dev".into(),
            },
            slot: SharedSlot::default(),
            sink,
            keepalive_interval: Duration::from_secs(5),
            keepalive_timeout: Duration::from_secs(6),
        }
    }

    #[test]
    fn slot_holds_one_link() {
        let mut slot = LinkSlot::default();
        let (first, _rx) = slot.claim().unwrap();
        assert!(slot.claim().is_none());
        slot.release(first + 1);
        assert!(slot.claim().is_none());
        slot.release(first);
        assert!(slot.claim().is_some());
    }

    #[tokio::test]
    async fn dial_fails_when_a_link_is_already_open() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let pass = Passphrase::new("ABCD1234").unwrap();
        let (host_sink, _host_inbox) = event_channel();
        tokio::spawn(serve(listener, context("AA:BB", host_sink), pass.clone()));

        let (sink, inbox) = event_channel();
        let client = context("CC:DD", sink);
        let _held = client.slot.lock().await.claim();
        let directory: Directory = Arc::default();
        let host = DeviceAddress::parse("AA:BB").unwrap();
        directory.lock().await.insert(host.clone(), addr);

        dial(client, directory, host, pass).await;
        assert!(matches!(
            inbox.try_next(),
            Some(PlatformEvent::Failed(e)) if e.kind == TransportErrorKind::Connection
        ));
        assert_eq!(inbox.try_next(), None);
    }

    #[tokio::test]
    async fn dial_without_route_fails() {
        let (sink, inbox) = event_channel();
        let directory: Directory = Arc::default();
        let host = DeviceAddress::parse("AA:BB").unwrap();
        dial(context("CC:DD", sink), directory, host, Passphrase::new("ABCD1234").unwrap()).await;
        assert!(matches!(
            inbox.try_next(),
            Some(PlatformEvent::Failed(e)) if e.kind == TransportErrorKind::Connection
        ));
    }
}
