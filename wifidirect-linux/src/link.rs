//! TCP link: passphrase handshake (host accepts, client connects) and the framed
//! message loop with keep-alive.

use std::io;
use std::time::Instant;

use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wifidirect_core::wire::{decode_frame, encode_frame, frame_len, HEADER_LEN};
use wifidirect_core::{
    Device, DeviceAddress, EventSink, Frame, FrameDecodeError, FrameEncodeError, Inbound,
    KeepAliveMonitor, Passphrase, PlatformEvent, TransportError, TransportErrorKind,
    PROTOCOL_VERSION,
};

/// Who this end of the link claims to be.
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    pub address: DeviceAddress,
    pub display_name: String,
}

impl LocalIdentity {
    pub fn device(&self) -> Device {
        Device::new(self.address.clone(), self.display_name.clone())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("i/o: {0}")]
    Io(#[from] io::Error),
    #[error("encode: {0}")]
    Encode(#[from] FrameEncodeError),
    #[error("decode: {0}")]
    Decode(#[from] FrameDecodeError),
    #[error("unsupported protocol version {0}")]
    Version(u8),
    #[error("passphrase rejected")]
    Rejected,
    #[error("unexpected frame during handshake")]
    Unexpected,
}

impl LinkError {
    /// Remote closed the stream cleanly between frames.
    pub fn is_eof(&self) -> bool {
        matches!(self, LinkError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

/// SHA-256(nonce || passphrase). Proves the passphrase without sending it.
pub fn passphrase_proof(nonce: &[u8; 32], passphrase: &Passphrase) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(passphrase.as_str().as_bytes());
    hasher.finalize().into()
}

pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame, LinkError> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await?;
    let len = frame_len(&header)?.unwrap_or(0);
    let mut buf = vec![0u8; HEADER_LEN + len];
    buf[..HEADER_LEN].copy_from_slice(&header);
    reader.read_exact(&mut buf[HEADER_LEN..]).await?;
    let (frame, _) = decode_frame(&buf)?;
    Ok(frame)
}

pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &Frame,
) -> Result<(), LinkError> {
    let bytes = encode_frame(frame)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Host side: challenge the client and check its proof. Returns the client's identity.
pub async fn handshake_accept(
    stream: &mut TcpStream,
    local: &LocalIdentity,
    passphrase: &Passphrase,
) -> Result<Device, LinkError> {
    let mut nonce = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut nonce);
    write_frame(
        stream,
        &Frame::Challenge {
            protocol_version: PROTOCOL_VERSION,
            address: local.address.clone(),
            display_name: local.display_name.clone(),
            nonce,
        },
    )
    .await?;
    let (version, address, display_name, proof) = match read_frame(stream).await? {
        Frame::Hello {
            protocol_version,
            address,
            display_name,
            proof,
        } => (protocol_version, address, display_name, proof),
        _ => return Err(LinkError::Unexpected),
    };
    if version != PROTOCOL_VERSION {
        write_frame(stream, &Frame::Rejected).await?;
        return Err(LinkError::Version(version));
    }
    if proof != passphrase_proof(&nonce, passphrase) {
        write_frame(stream, &Frame::Rejected).await?;
        return Err(LinkError::Rejected);
    }
    write_frame(stream, &Frame::Welcome).await?;
    Ok(Device::new(address, display_name))
}

/// Client side: answer the host's challenge. Returns the host's identity.
pub async fn handshake_connect(
    stream: &mut TcpStream,
    local: &LocalIdentity,
    passphrase: &Passphrase,
) -> Result<Device, LinkError> {
    let (version, address, display_name, nonce) = match read_frame(stream).await? {
        Frame::Challenge {
            protocol_version,
            address,
            display_name,
            nonce,
        } => (protocol_version, address, display_name, nonce),
        _ => return Err(LinkError::Unexpected),
    };
    if version != PROTOCOL_VERSION {
        return Err(LinkError::Version(version));
    }
    write_frame(
        stream,
        &Frame::Hello {
            protocol_version: PROTOCOL_VERSION,
            address: local.address.clone(),
            display_name: local.display_name.clone(),
            proof: passphrase_proof(&nonce, passphrase),
        },
    )
    .await?;
    match read_frame(stream).await? {
        Frame::Welcome => Ok(Device::new(address, display_name)),
        Frame::Rejected => Err(LinkError::Rejected),
        _ => Err(LinkError::Unexpected),
    }
}

/// Carry payloads over an established link until either side closes it.
///
/// Ends silently when `outbound` is closed (local disconnect). Remote close raises
/// `Disconnected`, silence past the keep-alive timeout raises `ConnectionLost`, and
/// read failures raise `Failed(Receive)`. Write failures raise `Failed(Send)` but do
/// not end the loop on their own.
pub async fn run_link(
    stream: TcpStream,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    sink: EventSink,
    mut monitor: KeepAliveMonitor,
) {
    let (mut reader, mut writer) = stream.into_split();
    let (inbound_tx, mut inbound) = mpsc::unbounded_channel::<Result<Frame, LinkError>>();
    let read_task = tokio::spawn(async move {
        loop {
            let result = read_frame(&mut reader).await;
            let failed = result.is_err();
            if inbound_tx.send(result).is_err() || failed {
                break;
            }
        }
    });

    loop {
        let now = Instant::now();
        if monitor.is_expired(now) {
            info!("keep-alive timed out");
            sink.emit(PlatformEvent::ConnectionLost);
            break;
        }
        let wake = monitor.next_wake(now);
        tokio::select! {
            received = inbound.recv() => match received {
                Some(Ok(frame)) => match monitor.on_frame(frame, Instant::now()) {
                    Inbound::Consumed => {}
                    Inbound::Message(payload) => {
                        sink.emit(PlatformEvent::MessageReceived(payload));
                    }
                    Inbound::Unexpected(frame) => debug!(?frame, "ignoring handshake frame on open link"),
                },
                Some(Err(e)) if e.is_eof() => {
                    info!("peer closed link");
                    sink.emit(PlatformEvent::Disconnected);
                    break;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "link read failed");
                    sink.fail(TransportError::socket(TransportErrorKind::Receive));
                    break;
                }
                None => {
                    sink.emit(PlatformEvent::Disconnected);
                    break;
                }
            },
            payload = outbound.recv() => match payload {
                Some(payload) => {
                    if let Err(e) = write_frame(&mut writer, &Frame::Data(payload)).await {
                        warn!(error = %e, "link write failed");
                        sink.fail(TransportError::socket(TransportErrorKind::Send));
                    }
                    monitor.on_sent(Instant::now());
                }
                None => {
                    debug!("link closed locally");
                    let _ = writer.shutdown().await;
                    break;
                }
            },
            _ = tokio::time::sleep(wake) => {
                if monitor.keepalive_due(Instant::now()) {
                    if let Err(e) = write_frame(&mut writer, &Frame::KeepAlive).await {
                        debug!(error = %e, "keep-alive write failed");
                    }
                    monitor.on_sent(Instant::now());
                }
            }
        }
    }
    read_task.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use wifidirect_core::event_channel;

    fn identity(addr: &str, name: &str) -> LocalIdentity {
        LocalIdentity {
            address: DeviceAddress::parse(addr).unwrap(),
            display_name: name.into(),
        }
    }

    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (accepted.unwrap().0, client.unwrap())
    }

    #[test]
    fn proof_depends_on_nonce_and_passphrase() {
        let p = Passphrase::new("ABCD1234").unwrap();
        let q = Passphrase::new("ABCD1235").unwrap();
        assert_eq!(passphrase_proof(&[1; 32], &p), passphrase_proof(&[1; 32], &p));
        assert_ne!(passphrase_proof(&[1; 32], &p), passphrase_proof(&[2; 32], &p));
        assert_ne!(passphrase_proof(&[1; 32], &p), passphrase_proof(&[1; 32], &q));
    }

    #[tokio::test]
    async fn handshake_exchanges_identities() {
        let (mut host_stream, mut client_stream) = socket_pair().await;
        let host = identity("AA:BB", "Phone1");
        let client = identity("CC:DD", "Tablet");
        let pass = Passphrase::new("ABCD1234").unwrap();
        let (h, c) = tokio::join!(
            handshake_accept(&mut host_stream, &host, &pass),
            handshake_connect(&mut client_stream, &client, &pass)
        );
        assert_eq!(h.unwrap(), client.device());
        assert_eq!(c.unwrap(), host.device());
    }

    #[tokio::test]
    async fn wrong_passphrase_is_rejected_on_both_sides() {
        let (mut host_stream, mut client_stream) = socket_pair().await;
        let host = identity("AA:BB", "Phone1");
        let client = identity("CC:DD", "Tablet");
        let host_pass = Passphrase::new("ABCD1234").unwrap();
        let client_pass = Passphrase::new("WRONGPASS").unwrap();
        let (h, c) = tokio::join!(
            handshake_accept(&mut host_stream, &host, &host_pass),
            handshake_connect(&mut client_stream, &client, &client_pass)
        );
        assert!(matches!(h, Err(LinkError::Rejected)));
        assert!(matches!(c, Err(LinkError::Rejected)));
    }

    #[tokio::test]
    async fn payload_crosses_link_and_close_reports_disconnect() {
        let (host_stream, client_stream) = socket_pair().await;
        let (host_sink, host_inbox) = event_channel();
        let (client_sink, _client_inbox) = event_channel();
        let monitor = || {
            KeepAliveMonitor::new(Duration::from_secs(5), Duration::from_secs(6), Instant::now())
        };
        let (host_tx, host_rx) = mpsc::unbounded_channel();
        let (client_tx, client_rx) = mpsc::unbounded_channel();
        let host_link = tokio::spawn(run_link(host_stream, host_rx, host_sink, monitor()));
        let client_link = tokio::spawn(run_link(client_stream, client_rx, client_sink, monitor()));

        client_tx.send(vec![0, 1, 2, 255]).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            host_inbox.try_next(),
            Some(PlatformEvent::MessageReceived(vec![0, 1, 2, 255]))
        );

        drop(client_tx);
        client_link.await.unwrap();
        host_link.await.unwrap();
        assert_eq!(host_inbox.try_next(), Some(PlatformEvent::Disconnected));
        assert_eq!(host_inbox.try_next(), None);
        drop(host_tx);
    }

    #[tokio::test]
    async fn silent_peer_is_reported_lost() {
        let (host_stream, _client_stream) = socket_pair().await;
        let (sink, inbox) = event_channel();
        let (_tx, rx) = mpsc::unbounded_channel();
        let monitor = KeepAliveMonitor::new(
            Duration::from_millis(50),
            Duration::from_millis(150),
            Instant::now(),
        );
        // The other end never runs a link loop, so it never answers keep-alives.
        tokio::time::timeout(Duration::from_secs(2), run_link(host_stream, rx, sink, monitor))
            .await
            .unwrap();
        assert_eq!(inbox.try_next(), Some(PlatformEvent::ConnectionLost));
    }
}
