//! Stream transport over TCP or unix domain sockets.
//!
//! One session is one socket. A connect attempt opens the socket, sends a
//! `login` frame and waits for the `login_reply`, all within the connect
//! timeout. Once established, a reader task forwards `data` frames to the
//! delegate while the session task drains the outbound queue into the socket.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use hublink_core::{ConnectionError, ConnectionStatus, Endpoint};
use hublink_protocol::{Envelope, Frame, PREFIX_LEN, decode_payload, encode_message, frame_len};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::{Transport, TransportDelegate, TransportKind, TransportOptions};
use crate::error::ClientResult;

trait Io: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> Io for T {}

type BoxedIo = Box<dyn Io>;

enum Outbound {
    /// An encoded `data` frame, prefix included.
    Data(Vec<u8>),
    Logout,
}

struct Link {
    id: u64,
    outbound: mpsc::UnboundedSender<Outbound>,
}

/// Transport exchanging length-prefixed JSON frames over a socket.
pub struct StreamTransport {
    kind: TransportKind,
    runtime: Handle,
    link: Arc<Mutex<Option<Link>>>,
    next_id: AtomicU64,
}

impl StreamTransport {
    /// Creates a transport of the given kind; tasks are spawned on `runtime`.
    pub fn new(kind: TransportKind, runtime: Handle) -> Self {
        Self {
            kind,
            runtime,
            link: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the transport kind.
    pub fn kind(&self) -> TransportKind {
        self.kind
    }
}

impl Transport for StreamTransport {
    fn connect(&self, delegate: Arc<dyn TransportDelegate>, options: TransportOptions) {
        if !self.kind.supports(&options.endpoint) {
            let message = format!(
                "{:?} transport cannot reach {}",
                self.kind, options.endpoint
            );
            warn!(%message, "rejecting endpoint");
            delegate.on_status(
                ConnectionStatus::Disconnected,
                ConnectionError::EndpointMalformat,
                Some(message),
            );
            return;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (outbound, queue) = mpsc::unbounded_channel();
        let previous = self
            .link
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Link { id, outbound });
        if let Some(previous) = previous {
            debug!(session = previous.id, "replacing previous session");
            let _ = previous.outbound.send(Outbound::Logout);
        }

        let link = Arc::clone(&self.link);
        self.runtime.spawn(async move {
            run_session(delegate, options, queue).await;

            let mut current = link.lock().unwrap_or_else(PoisonError::into_inner);
            if current.as_ref().is_some_and(|l| l.id == id) {
                *current = None;
            }
        });
    }

    fn disconnect(&self) {
        let link = self
            .link
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match link {
            Some(link) => {
                if link.outbound.send(Outbound::Logout).is_err() {
                    debug!(session = link.id, "session already closed");
                }
            }
            None => debug!("disconnect without an active session"),
        }
    }

    fn send_envelope(&self, envelope: Envelope) {
        let bytes = match Frame::data(&envelope).and_then(|frame| encode_message(&frame)) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(msgid = %envelope.msgid, error = %e, "cannot encode envelope, dropping it");
                return;
            }
        };

        let link = self.link.lock().unwrap_or_else(PoisonError::into_inner);
        match link.as_ref() {
            Some(link) => {
                if link.outbound.send(Outbound::Data(bytes)).is_err() {
                    warn!(msgid = %envelope.msgid, "session closed, dropping envelope");
                }
            }
            None => warn!(msgid = %envelope.msgid, "no session, dropping envelope"),
        }
    }
}

async fn run_session(
    delegate: Arc<dyn TransportDelegate>,
    options: TransportOptions,
    mut queue: mpsc::UnboundedReceiver<Outbound>,
) {
    let endpoint = options.endpoint.clone();
    debug!(%endpoint, identity = %options.identity, "opening session");

    let stream = match tokio::time::timeout(options.connect_timeout, establish(&options)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err((error, message))) => {
            warn!(%endpoint, error = ?error, %message, "login failed");
            delegate.on_status(ConnectionStatus::Disconnected, error, Some(message));
            return;
        }
        Err(_) => {
            let message = format!(
                "no login reply from {endpoint} within {}ms",
                options.connect_timeout.as_millis()
            );
            warn!(%endpoint, %message, "login timed out");
            delegate.on_status(
                ConnectionStatus::Disconnected,
                ConnectionError::ConnTimeout,
                Some(message),
            );
            return;
        }
    };

    info!(%endpoint, identity = %options.identity, "session established");
    delegate.on_status(ConnectionStatus::Connected, ConnectionError::NoError, None);

    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader_task = tokio::spawn(read_loop(reader, Arc::clone(&delegate)));

    let outcome = loop {
        tokio::select! {
            ended = &mut reader_task => {
                break match ended {
                    Ok(result) => result,
                    Err(e) => Err(format!("reader task failed: {e}")),
                };
            }
            next = queue.recv() => match next {
                Some(Outbound::Data(bytes)) => {
                    if let Err(e) = write_bytes(&mut writer, &bytes).await {
                        reader_task.abort();
                        break Err(format!("write failed: {e}"));
                    }
                }
                Some(Outbound::Logout) | None => {
                    if let Err(e) = write_frame(&mut writer, &Frame::Logout).await {
                        debug!(error = %e, "failed to send logout");
                    }
                    let _ = writer.shutdown().await;
                    reader_task.abort();
                    break Ok(());
                }
            }
        }
    };

    match outcome {
        Ok(()) => {
            info!(%endpoint, "session closed");
            delegate.on_status(ConnectionStatus::Disconnected, ConnectionError::NoError, None);
        }
        Err(message) => {
            warn!(%endpoint, %message, "session lost");
            delegate.on_status(
                ConnectionStatus::Disconnected,
                ConnectionError::TechError,
                Some(message),
            );
        }
    }
}

async fn establish(options: &TransportOptions) -> Result<BoxedIo, (ConnectionError, String)> {
    let mut stream = open(&options.endpoint).await.map_err(|e| {
        (
            ConnectionError::TechError,
            format!("failed to connect to {}: {e}", options.endpoint),
        )
    })?;

    let login = Frame::login(options.identity.to_string(), options.password.clone());
    write_frame(&mut stream, &login).await.map_err(tech_error)?;

    match read_frame(&mut stream).await.map_err(tech_error)? {
        Some(Frame::LoginReply {
            error: ConnectionError::NoError,
            ..
        }) => Ok(stream),
        Some(Frame::LoginReply { error, message }) => Err((
            error,
            message.unwrap_or_else(|| error.description().to_string()),
        )),
        Some(other) => Err((
            ConnectionError::TechError,
            format!("unexpected frame during login: {other:?}"),
        )),
        None => Err((
            ConnectionError::TechError,
            "connection closed during login".to_string(),
        )),
    }
}

fn tech_error(e: impl std::fmt::Display) -> (ConnectionError, String) {
    (ConnectionError::TechError, e.to_string())
}

async fn open(endpoint: &Endpoint) -> io::Result<BoxedIo> {
    match endpoint {
        Endpoint::Stream { host, port, .. } => {
            let stream = TcpStream::connect((host.as_str(), *port)).await?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream))
        }
        #[cfg(unix)]
        Endpoint::Unix { path } => Ok(Box::new(tokio::net::UnixStream::connect(path).await?)),
        #[cfg(not(unix))]
        Endpoint::Unix { path } => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("unix sockets are unavailable: {}", path.display()),
        )),
    }
}

async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    delegate: Arc<dyn TransportDelegate>,
) -> Result<(), String> {
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(Frame::Data { kind, data })) => {
                trace!(%kind, "inbound data");
                delegate.on_data(&kind, data);
            }
            Ok(Some(Frame::Logout)) => {
                debug!("server closed the session");
                return Ok(());
            }
            Ok(Some(other)) => debug!(frame = ?other, "ignoring unexpected frame"),
            Ok(None) => return Err("connection closed by peer".to_string()),
            Err(e) => return Err(format!("read failed: {e}")),
        }
    }
}

/// Reads one frame. Returns `Ok(None)` on a clean end of stream.
pub(crate) async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> ClientResult<Option<Frame>> {
    let mut prefix = [0u8; PREFIX_LEN];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = frame_len(prefix)?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    Ok(Some(decode_payload(&body)?))
}

/// Writes and flushes one frame.
pub(crate) async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> ClientResult<()> {
    let bytes = encode_message(frame)?;
    write_bytes(writer, &bytes).await?;
    Ok(())
}

async fn write_bytes<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await
}
