//! Duplex WebSocket session to the TV's remote-control channel.
//!
//! This module is responsible for:
//!
//! 1. Opening the WebSocket (plain on 8001 or TLS on 8002) with the client
//!    name and the stored session token in the URL.
//! 2. Running two concurrent tasks for the lifetime of the link:
//!    - **Inbound loop**: reads frames, drops unsolicited notifications, and
//!      hands everything else to the single response slot.
//!    - **Outbound loop**: writes queued frames in order and sends a
//!      WebSocket ping whenever the keepalive interval elapses.
//! 3. Waiting for the `ms.channel.connect` handshake event, which carries
//!    the (possibly new) session token.
//! 4. Stopping both loops on [`DuplexSession::close`].
//!
//! # Request/response correlation (for beginners)
//!
//! The TV protocol has no request ids.  A reply is simply "the next frame
//! that is not a notification".  The session therefore keeps exactly one
//! response slot (an `mpsc` channel of capacity 1) and assumes callers send
//! one awaited request at a time.  [`DuplexSession::send_and_await`] holds a
//! lock on the slot for the whole exchange and empties it before sending, so
//! a stale frame from an earlier fire-and-forget command is never mistaken
//! for the answer.
//!
//! If nobody is waiting and the slot is full, further frames are dropped.
//!
//! # Keepalive
//!
//! The inbound loop fails the link if no frame arrives for one read timeout.
//! The outbound loop pings every 90 % of that timeout, and the TV's pong
//! counts as a frame, so an idle but healthy link never times out.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──handshake──▶ Connected
//!      ▲                        │                         │
//!      └────── failure ─────────┘        close ──▶ Closing ─┘
//! ```
//!
//! A session whose loops have died on their own (the TV went to sleep)
//! reports `is_connected() == false` and accepts a new `connect`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tizen_core::protocol::{
    classify_frame, control_url, decode_connect_event, ChannelClient, ConnectEvent, Frame,
    ProtocolError, EVENT_CHANNEL_UNAUTHORIZED,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tokio::time::{interval_at, sleep, timeout, timeout_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{client_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::infrastructure::tls::relaxed_connector;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const PLAIN_PORT: u16 = 8001;
pub const SECURE_PORT: u16 = 8002;
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CLIENT_NAME: &str = "TizenRemote";
pub const DEFAULT_CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_CLOSE_POLL_ATTEMPTS: u32 = 50;

/// Error type for control-channel operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is already connected")]
    AlreadyConnected,

    #[error("session is not connected")]
    NotConnected,

    #[error("could not reach {addr} within {timeout:?}")]
    DialTimeout { addr: String, timeout: Duration },

    #[error("no handshake from the TV within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("no response within {0:?}")]
    ReadTimeout(Duration),

    #[error("outbound queue did not accept the frame within {0:?}")]
    WriteTimeout(Duration),

    #[error("session loops did not stop after close")]
    CloseTimeout,

    /// The user rejected this client on the TV's authorization prompt.
    #[error("client was not authorized by the TV")]
    Unauthorized,

    #[error("connection closed by the TV")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    Transport(#[from] WsError),

    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Lifecycle state of a [`DuplexSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

/// Plain `ws://` or TLS `wss://`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Plain,
    Secure,
}

impl Transport {
    pub fn default_port(self) -> u16 {
        match self {
            Transport::Plain => PLAIN_PORT,
            Transport::Secure => SECURE_PORT,
        }
    }
}

// ── Configuration ─────────────────────────────────────────────────────────────

/// Session settings.
///
/// Construction picks the transport first ([`SessionConfig::plain`] or
/// [`SessionConfig::secure`]), which fixes the default port.  The `with_*`
/// methods then adjust options that depend on it; there is no way to change
/// the transport afterwards.
///
/// ```rust
/// use std::time::Duration;
/// use tizen_remote::infrastructure::session::SessionConfig;
///
/// let config = SessionConfig::secure("192.168.1.20")
///     .with_read_timeout(Duration::from_secs(10))
///     .with_client_name("Living Room Remote");
/// assert_eq!(config.port(), 8002);
/// assert_eq!(config.keepalive_interval(), Duration::from_secs(9));
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    host: String,
    transport: Transport,
    port: u16,
    dial_timeout: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
    client_name: String,
    close_poll_interval: Duration,
    close_poll_attempts: u32,
}

impl SessionConfig {
    pub fn plain(host: impl Into<String>) -> Self {
        Self::with_transport(host, Transport::Plain)
    }

    pub fn secure(host: impl Into<String>) -> Self {
        Self::with_transport(host, Transport::Secure)
    }

    pub fn with_transport(host: impl Into<String>, transport: Transport) -> Self {
        Self {
            host: host.into(),
            transport,
            port: transport.default_port(),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            close_poll_interval: DEFAULT_CLOSE_POLL_INTERVAL,
            close_poll_attempts: DEFAULT_CLOSE_POLL_ATTEMPTS,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Name shown on the TV's authorization prompt.
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// How often and how many times `close` checks that the loops stopped.
    pub fn with_close_poll(mut self, interval: Duration, attempts: u32) -> Self {
        self.close_poll_interval = interval;
        self.close_poll_attempts = attempts;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn is_secure(&self) -> bool {
        self.transport == Transport::Secure
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn dial_timeout(&self) -> Duration {
        self.dial_timeout
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// 90 % of the read timeout, never zero.
    pub fn keepalive_interval(&self) -> Duration {
        (self.read_timeout * 9 / 10).max(Duration::from_millis(1))
    }

    /// The control-channel URL for `token`.
    pub fn url(&self, token: &str) -> String {
        control_url(self.is_secure(), &self.host, self.port, &self.client_name, token)
    }
}

/// What the TV told us in the handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub event: String,
    pub id: String,
    /// Empty when the TV did not issue a new token.
    pub token: String,
    pub clients: Vec<ChannelClient>,
}

impl From<ConnectEvent> for SessionInfo {
    fn from(event: ConnectEvent) -> Self {
        Self {
            event: event.event,
            id: event.data.id,
            token: event.data.token,
            clients: event.data.clients,
        }
    }
}

// ── Trait seam ────────────────────────────────────────────────────────────────

/// The operations the device facade needs from a control channel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Opens the link and waits for the handshake.
    async fn connect(&self, token: &str) -> Result<SessionInfo, SessionError>;

    /// `true` while either session loop is running.
    fn is_connected(&self) -> bool;

    /// Queues a frame without waiting for a reply.
    async fn send_command(&self, frame: String) -> Result<(), SessionError>;

    /// Queues a frame and returns the next response frame.
    async fn send_and_await(&self, frame: String) -> Result<String, SessionError>;

    /// Stops the loops; a no-op when not connected.
    async fn close(&self) -> Result<(), SessionError>;
}

// ── Session ───────────────────────────────────────────────────────────────────

/// Handles to one live link.  Cloned out of the session lock so no lock is
/// held across an `.await`.
#[derive(Clone)]
struct Link {
    outbound: mpsc::Sender<WsMessage>,
    responses: Arc<tokio::sync::Mutex<mpsc::Receiver<String>>>,
    cancel: CancellationToken,
    reader_running: Arc<AtomicBool>,
    writer_running: Arc<AtomicBool>,
}

impl Link {
    fn is_alive(&self) -> bool {
        self.reader_running.load(Ordering::Acquire) || self.writer_running.load(Ordering::Acquire)
    }

    fn same_as(&self, other: &Link) -> bool {
        Arc::ptr_eq(&self.reader_running, &other.reader_running)
    }
}

struct Inner {
    state: SessionState,
    link: Option<Link>,
    token: String,
}

/// One control connection to one TV.
pub struct DuplexSession {
    id: Uuid,
    config: SessionConfig,
    inner: Mutex<Inner>,
}

impl DuplexSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            inner: Mutex::new(Inner {
                state: SessionState::Disconnected,
                link: None,
                token: String::new(),
            }),
        }
    }

    /// Identifier used in log messages.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// The token used by, or issued during, the last successful connect.
    pub fn token(&self) -> String {
        self.lock().token.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().link.as_ref().is_some_and(Link::is_alive)
    }

    /// Opens the link with `token` (empty on first use) and waits for the
    /// handshake event.
    ///
    /// # Errors
    ///
    /// - [`SessionError::AlreadyConnected`] while another link is live or a
    ///   connect is in flight.
    /// - [`SessionError::DialTimeout`] / [`SessionError::HandshakeTimeout`]
    ///   when the TV does not answer in time.  The session returns to
    ///   `Disconnected` and may be retried.
    /// - [`SessionError::Unauthorized`] if the user denied the client.
    pub async fn connect(&self, token: &str) -> Result<SessionInfo, SessionError> {
        {
            let mut inner = self.lock();
            let alive = inner.link.as_ref().is_some_and(Link::is_alive);
            match inner.state {
                SessionState::Disconnected => {}
                SessionState::Connecting => return Err(SessionError::AlreadyConnected),
                SessionState::Connected | SessionState::Closing if alive => {
                    return Err(SessionError::AlreadyConnected)
                }
                SessionState::Connected | SessionState::Closing => {
                    debug!("session {}: discarding dead link before reconnect", self.id);
                    if let Some(stale) = inner.link.take() {
                        stale.cancel.cancel();
                    }
                }
            }
            inner.state = SessionState::Connecting;
        }

        let attempt = ConnectAttempt(&self.inner);
        let result = self.establish(token).await;

        let mut inner = self.lock();
        let outcome = match result {
            Ok((link, info)) => {
                inner.token = if info.token.is_empty() {
                    token.to_string()
                } else {
                    info.token.clone()
                };
                inner.link = Some(link);
                inner.state = SessionState::Connected;
                info!(
                    "session {}: connected to {}:{} ({} client(s) on channel)",
                    self.id,
                    self.config.host,
                    self.config.port,
                    info.clients.len()
                );
                Ok(info)
            }
            Err(e) => {
                inner.state = SessionState::Disconnected;
                warn!("session {}: connect to {} failed: {e}", self.id, self.config.host);
                Err(e)
            }
        };
        drop(inner);
        drop(attempt);
        outcome
    }

    /// Queues `frame` for the outbound loop.
    ///
    /// # Errors
    ///
    /// [`SessionError::WriteTimeout`] if the loop does not accept the frame
    /// within the write timeout; [`SessionError::NotConnected`] if there is
    /// no live link.
    pub async fn send_command(&self, frame: String) -> Result<(), SessionError> {
        let link = self.live_link()?;
        self.enqueue(&link, frame).await
    }

    /// Sends `frame` and waits for the next response frame.
    ///
    /// Only one exchange runs at a time; concurrent callers queue on the
    /// response slot.  Unsolicited notifications are skipped.
    ///
    /// # Errors
    ///
    /// [`SessionError::ReadTimeout`] if no response arrives within the read
    /// timeout, plus every error of [`DuplexSession::send_command`].
    pub async fn send_and_await(&self, frame: String) -> Result<String, SessionError> {
        let link = self.live_link()?;
        let mut responses = link.responses.lock().await;
        while responses.try_recv().is_ok() {
            trace!("session {}: discarding stale frame", self.id);
        }
        self.enqueue(&link, frame).await?;
        self.next_response(&mut responses).await
    }

    /// Stops both loops and waits for them to finish.
    ///
    /// Closing a session without a link succeeds immediately.
    ///
    /// # Errors
    ///
    /// [`SessionError::CloseTimeout`] if the loops are still running after
    /// the configured number of polls.
    pub async fn close(&self) -> Result<(), SessionError> {
        let link = {
            let mut inner = self.lock();
            match inner.link.clone() {
                Some(link) => {
                    inner.state = SessionState::Closing;
                    link
                }
                None => return Ok(()),
            }
        };

        debug!("session {}: closing", self.id);
        link.cancel.cancel();

        for _ in 0..self.config.close_poll_attempts {
            if !link.is_alive() {
                self.finish_close(&link);
                return Ok(());
            }
            sleep(self.config.close_poll_interval).await;
        }
        if !link.is_alive() {
            self.finish_close(&link);
            return Ok(());
        }

        warn!("session {}: loops still running after close", self.id);
        Err(SessionError::CloseTimeout)
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live_link(&self) -> Result<Link, SessionError> {
        let inner = self.lock();
        match &inner.link {
            Some(link) if inner.state == SessionState::Connected && link.is_alive() => {
                Ok(link.clone())
            }
            _ => Err(SessionError::NotConnected),
        }
    }

    fn finish_close(&self, link: &Link) {
        let mut inner = self.lock();
        if inner.link.as_ref().is_some_and(|current| current.same_as(link)) {
            inner.link = None;
            inner.state = SessionState::Disconnected;
        }
        info!("session {}: closed", self.id);
    }

    async fn enqueue(&self, link: &Link, frame: String) -> Result<(), SessionError> {
        let write_timeout = self.config.write_timeout;
        link.outbound
            .send_timeout(WsMessage::Text(frame), write_timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => SessionError::WriteTimeout(write_timeout),
                SendTimeoutError::Closed(_) => SessionError::NotConnected,
            })
    }

    async fn next_response(
        &self,
        responses: &mut mpsc::Receiver<String>,
    ) -> Result<String, SessionError> {
        let read_timeout = self.config.read_timeout;
        let deadline = Instant::now() + read_timeout;
        loop {
            let frame = match timeout_at(deadline, responses.recv()).await {
                Err(_) => return Err(SessionError::ReadTimeout(read_timeout)),
                Ok(None) => return Err(SessionError::ConnectionClosed),
                Ok(Some(frame)) => frame,
            };
            match classify_frame(&frame) {
                Frame::Response => return Ok(frame),
                Frame::Ignorable(marker) => {
                    debug!("session {}: skipping {marker} while waiting", self.id)
                }
            }
        }
    }

    async fn establish(&self, token: &str) -> Result<(Link, SessionInfo), SessionError> {
        let config = &self.config;
        let addr = format!("{}:{}", config.host, config.port);
        debug!(
            "session {}: dialing {} ({})",
            self.id,
            addr,
            if config.is_secure() { "wss" } else { "ws" }
        );

        let tcp = timeout(config.dial_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| SessionError::DialTimeout {
                addr: addr.clone(),
                timeout: config.dial_timeout,
            })??;
        tcp.set_nodelay(true)?;

        let connector = match config.transport {
            Transport::Plain => Connector::Plain,
            Transport::Secure => relaxed_connector()?,
        };
        let (ws, _response) = timeout(
            config.read_timeout,
            client_async_tls_with_config(config.url(token), tcp, None, Some(connector)),
        )
        .await
        .map_err(|_| SessionError::HandshakeTimeout(config.read_timeout))??;

        let link = self.spawn_loops(ws);

        let handshake = {
            let mut responses = link.responses.lock().await;
            self.next_response(&mut responses).await
        };
        let frame = match handshake {
            Ok(frame) => frame,
            Err(SessionError::ReadTimeout(waited)) => {
                link.cancel.cancel();
                return Err(SessionError::HandshakeTimeout(waited));
            }
            Err(e) => {
                link.cancel.cancel();
                return Err(e);
            }
        };

        let event = match decode_connect_event(&frame) {
            Ok(event) => event,
            Err(e) => {
                link.cancel.cancel();
                return Err(e.into());
            }
        };
        if event.event == EVENT_CHANNEL_UNAUTHORIZED {
            link.cancel.cancel();
            return Err(SessionError::Unauthorized);
        }

        Ok((link, SessionInfo::from(event)))
    }

    fn spawn_loops(&self, ws: WsStream) -> Link {
        let (sink, stream) = ws.split();
        let (outbound_tx, outbound_rx) = mpsc::channel::<WsMessage>(1);
        let (responses_tx, responses_rx) = mpsc::channel::<String>(1);
        let cancel = CancellationToken::new();
        let reader_running = Arc::new(AtomicBool::new(true));
        let writer_running = Arc::new(AtomicBool::new(true));

        let session = self.id;
        let read_timeout = self.config.read_timeout;
        let write_timeout = self.config.write_timeout;
        let keepalive = self.config.keepalive_interval();

        // ── Inbound loop ──────────────────────────────────────────────────────
        let reader_flag = RunningFlag(Arc::clone(&reader_running));
        let reader_cancel = cancel.clone();
        tokio::spawn(async move {
            let _running = reader_flag;
            let result = inbound_loop(stream, responses_tx, &reader_cancel, read_timeout, session).await;
            // Either loop ending takes the other one down with it.
            reader_cancel.cancel();
            match result {
                Ok(()) => debug!("session {session}: inbound loop finished"),
                Err(e) => warn!("session {session}: inbound loop failed: {e}"),
            }
        });

        // ── Outbound loop ─────────────────────────────────────────────────────
        let writer_flag = RunningFlag(Arc::clone(&writer_running));
        let writer_cancel = cancel.clone();
        tokio::spawn(async move {
            let _running = writer_flag;
            let result = outbound_loop(
                sink,
                outbound_rx,
                &writer_cancel,
                keepalive,
                write_timeout,
                session,
            )
            .await;
            writer_cancel.cancel();
            match result {
                Ok(()) => debug!("session {session}: outbound loop finished"),
                Err(e) => warn!("session {session}: outbound loop failed: {e}"),
            }
        });

        Link {
            outbound: outbound_tx,
            responses: Arc::new(tokio::sync::Mutex::new(responses_rx)),
            cancel,
            reader_running,
            writer_running,
        }
    }
}

impl Drop for DuplexSession {
    fn drop(&mut self) {
        if let Some(link) = self.lock().link.take() {
            link.cancel.cancel();
        }
    }
}

#[async_trait]
impl ControlChannel for DuplexSession {
    async fn connect(&self, token: &str) -> Result<SessionInfo, SessionError> {
        DuplexSession::connect(self, token).await
    }

    fn is_connected(&self) -> bool {
        DuplexSession::is_connected(self)
    }

    async fn send_command(&self, frame: String) -> Result<(), SessionError> {
        DuplexSession::send_command(self, frame).await
    }

    async fn send_and_await(&self, frame: String) -> Result<String, SessionError> {
        DuplexSession::send_and_await(self, frame).await
    }

    async fn close(&self) -> Result<(), SessionError> {
        DuplexSession::close(self).await
    }
}

/// Clears the running flag when the owning task ends, however it ends.
struct RunningFlag(Arc<AtomicBool>);

impl Drop for RunningFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Returns a session stuck in `Connecting` to `Disconnected` if the connect
/// future is dropped before it completes.
struct ConnectAttempt<'a>(&'a Mutex<Inner>);

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        let mut inner = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.state == SessionState::Connecting {
            inner.state = SessionState::Disconnected;
        }
    }
}

// ── Loops ─────────────────────────────────────────────────────────────────────

/// Reads frames until the link closes, fails, or is cancelled.
///
/// Every received frame, pongs included, restarts the read timeout.
async fn inbound_loop(
    mut stream: SplitStream<WsStream>,
    responses: mpsc::Sender<String>,
    cancel: &CancellationToken,
    read_timeout: Duration,
    session: Uuid,
) -> Result<(), SessionError> {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            next = timeout(read_timeout, stream.next()) => next,
        };

        let message = match next {
            Err(_) => return Err(SessionError::ReadTimeout(read_timeout)),
            Ok(None) => return Ok(()),
            Ok(Some(Ok(message))) => message,
            Ok(Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed))) => return Ok(()),
            Ok(Some(Err(e))) => return Err(e.into()),
        };

        match message {
            WsMessage::Text(text) => match classify_frame(&text) {
                Frame::Ignorable(marker) => debug!("session {session}: ignoring {marker}"),
                Frame::Response => {
                    trace!("session {session}: ← {text}");
                    if responses.try_send(text).is_err() {
                        debug!("session {session}: response slot full, frame dropped");
                    }
                }
            },
            WsMessage::Close(frame) => {
                debug!("session {session}: close frame received: {frame:?}");
                return Ok(());
            }
            WsMessage::Pong(_) => trace!("session {session}: pong"),
            WsMessage::Ping(_) | WsMessage::Binary(_) | WsMessage::Frame(_) => {}
        }
    }
}

/// Writes queued frames in order and pings on every keepalive tick.
async fn outbound_loop(
    mut sink: SplitSink<WsStream, WsMessage>,
    mut outbound: mpsc::Receiver<WsMessage>,
    cancel: &CancellationToken,
    keepalive: Duration,
    write_timeout: Duration,
    session: Uuid,
) -> Result<(), SessionError> {
    let mut ticker = interval_at(Instant::now() + keepalive, keepalive);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                flush_queued(&mut sink, &mut outbound, write_timeout, session).await;
                // The TV may already be gone; the close frame is best effort.
                let _ = timeout(write_timeout, sink.send(WsMessage::Close(None))).await;
                return Ok(());
            }
            next = outbound.recv() => {
                let Some(message) = next else { return Ok(()) };
                trace!("session {session}: → {message}");
                write_frame(&mut sink, message, write_timeout).await?;
            }
            _ = ticker.tick() => {
                trace!("session {session}: keepalive ping");
                write_frame(&mut sink, WsMessage::Ping(Vec::new()), write_timeout).await?;
            }
        }
    }
}

/// Writes every frame already accepted by `send_command` before the link
/// goes down.  New sends are refused from here on.
async fn flush_queued(
    sink: &mut SplitSink<WsStream, WsMessage>,
    outbound: &mut mpsc::Receiver<WsMessage>,
    write_timeout: Duration,
    session: Uuid,
) {
    outbound.close();
    while let Ok(message) = outbound.try_recv() {
        trace!("session {session}: → {message} (flush)");
        if let Err(e) = write_frame(sink, message, write_timeout).await {
            debug!("session {session}: queued frame lost on close: {e}");
            return;
        }
    }
}

async fn write_frame(
    sink: &mut SplitSink<WsStream, WsMessage>,
    message: WsMessage,
    write_timeout: Duration,
) -> Result<(), SessionError> {
    timeout(write_timeout, sink.send(message))
        .await
        .map_err(|_| SessionError::WriteTimeout(write_timeout))??;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_config_defaults() {
        // Arrange / Act
        let config = SessionConfig::plain("10.0.0.2");

        // Assert
        assert_eq!(config.port(), 8001);
        assert!(!config.is_secure());
        assert_eq!(config.dial_timeout(), Duration::from_secs(1));
        assert_eq!(config.read_timeout(), Duration::from_secs(5));
        assert_eq!(config.write_timeout(), Duration::from_secs(5));
        assert_eq!(config.client_name(), "TizenRemote");
    }

    #[test]
    fn test_secure_config_uses_tls_port() {
        let config = SessionConfig::secure("10.0.0.2");
        assert_eq!(config.port(), 8002);
        assert_eq!(config.transport(), Transport::Secure);
    }

    #[test]
    fn test_dependent_options_apply_after_mode() {
        let config = SessionConfig::secure("tv")
            .with_port(9000)
            .with_client_name("Kitchen")
            .with_read_timeout(Duration::from_secs(10));

        assert!(config.is_secure());
        assert_eq!(config.port(), 9000);
        assert!(config.url("").starts_with("wss://tv:9000/"));
    }

    #[test]
    fn test_keepalive_is_ninety_percent_of_read_timeout() {
        let config = SessionConfig::plain("tv").with_read_timeout(Duration::from_secs(5));
        assert_eq!(config.keepalive_interval(), Duration::from_millis(4500));
    }

    #[test]
    fn test_keepalive_never_zero() {
        let config = SessionConfig::plain("tv").with_read_timeout(Duration::ZERO);
        assert!(config.keepalive_interval() > Duration::ZERO);
    }

    #[test]
    fn test_new_session_is_disconnected() {
        let session = DuplexSession::new(SessionConfig::plain("127.0.0.1"));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_connected());
        assert_eq!(session.token(), "");
    }

    #[tokio::test]
    async fn test_send_without_link_is_not_connected() {
        let session = DuplexSession::new(SessionConfig::plain("127.0.0.1"));

        let result = session.send_command("{}".to_string()).await;

        assert!(matches!(result, Err(SessionError::NotConnected)));
    }

    #[tokio::test]
    async fn test_close_without_link_is_noop() {
        let session = DuplexSession::new(SessionConfig::plain("127.0.0.1"));
        session.close().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_returns_to_disconnected() {
        // Arrange: a port nobody listens on
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let session = DuplexSession::new(SessionConfig::plain("127.0.0.1").with_port(port));

        // Act
        let result = session.connect("").await;

        // Assert
        assert!(result.is_err());
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_session_info_from_connect_event() {
        let event = decode_connect_event(
            r#"{"event":"ms.channel.connect","data":{"id":"c1","token":"77","clients":[]}}"#,
        )
        .unwrap();

        let info = SessionInfo::from(event);

        assert_eq!(info.id, "c1");
        assert_eq!(info.token, "77");
        assert!(info.clients.is_empty());
    }
}
