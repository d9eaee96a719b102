//! gRPC channel to a CSI driver endpoint.
//!
//! [`DriverChannel::open`] starts dialling immediately in a background
//! supervisor task and waits, at most `connect_timeout`, for the channel to
//! become ready.  A channel that is not ready by then is still returned:
//! the first real call on it dials once more itself and reports the genuine
//! connection error.
//!
//! Dials are serialized and the first one to succeed is kept for the life
//! of the channel, so a `DriverChannel` holds a single HTTP/2 connection.
//! When that connection drops, tonic re-dials through the same connector on
//! the next call.
//!
//! Connectivity moves through [`ConnectivityState`]:
//!
//! ```text
//! Idle -> Connecting -> Ready
//!             ^   |       |
//!             |   v       v connection lost
//!         TransientFailure        (any) -> Shutdown on close()
//! ```

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::task::{Context, Poll};
use std::time::Duration;

use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;
use tracing::{debug, info, instrument};

use crate::error::CsiError;

/// First retry delay after a failed dial.
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
/// Upper bound on the retry delay between dials.
const MAX_BACKOFF: Duration = Duration::from_secs(1);
/// Upper bound on a single dial.
const DIAL_TIMEOUT: Duration = Duration::from_secs(30);
/// Placeholder authority for local sockets; the connector ignores it.
const UNIX_PLACEHOLDER_URI: &str = "http://[::]:50051";

/// Connectivity of a [`DriverChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectivityState {
    /// Nothing attempted yet.
    Idle,
    /// A dial is in progress.
    Connecting,
    /// The channel is connected.
    Ready,
    /// The last dial failed or the established connection was lost.
    TransientFailure,
    /// The channel was closed.
    Shutdown,
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "IDLE",
            Self::Connecting => "CONNECTING",
            Self::Ready => "READY",
            Self::TransientFailure => "TRANSIENT_FAILURE",
            Self::Shutdown => "SHUTDOWN",
        })
    }
}

/// Where a driver listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverAddress {
    /// A local socket path, dialled without the network stack.
    Unix(PathBuf),
    /// A network URI, e.g. `http://10.0.0.1:9000`.
    Network(String),
}

impl DriverAddress {
    /// Classify an endpoint address.
    ///
    /// A leading `/` or a `unix://` scheme selects a local socket; anything
    /// with an `http://`/`https://` scheme is used as-is; a bare
    /// `host:port` is assumed to be plain-text HTTP/2.
    pub fn parse(address: &str) -> Result<Self, CsiError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(CsiError::invalid_endpoint(address, "address is empty"));
        }
        if address.starts_with('/') {
            return Ok(Self::Unix(PathBuf::from(address)));
        }
        if let Some(path) = address.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(CsiError::invalid_endpoint(address, "socket path is empty"));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        if address.starts_with("http://") || address.starts_with("https://") {
            return Ok(Self::Network(address.to_owned()));
        }
        Ok(Self::Network(format!("http://{address}")))
    }
}

impl fmt::Display for DriverAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
            Self::Network(uri) => f.write_str(uri),
        }
    }
}

/// Dialling recipe for one driver address.
struct DriverTarget {
    address: DriverAddress,
    endpoint: Endpoint,
}

impl DriverTarget {
    fn new(address: DriverAddress) -> Result<Self, CsiError> {
        let uri = match &address {
            DriverAddress::Unix(_) => UNIX_PLACEHOLDER_URI.to_owned(),
            DriverAddress::Network(uri) => uri.clone(),
        };
        let endpoint = Endpoint::from_shared(uri)
            .map_err(|e| CsiError::invalid_endpoint(&address.to_string(), e))?;
        Ok(Self { address, endpoint })
    }

    /// Dial and complete the HTTP/2 handshake.  The channel keeps the
    /// connector, so re-dials after a lost connection publish to `state`
    /// as well.
    async fn connect(
        &self,
        state: &Arc<watch::Sender<ConnectivityState>>,
    ) -> Result<Channel, tonic::transport::Error> {
        let state = Arc::clone(state);
        match &self.address {
            DriverAddress::Unix(path) => {
                let path = path.clone();
                self.endpoint
                    .connect_with_connector(service_fn(move |_: Uri| {
                        tracked(Arc::clone(&state), UnixStream::connect(path.clone()))
                    }))
                    .await
            }
            DriverAddress::Network(_) => {
                self.endpoint
                    .connect_with_connector(service_fn(move |uri: Uri| {
                        tracked(Arc::clone(&state), dial_tcp(uri))
                    }))
                    .await
            }
        }
    }
}

async fn dial_tcp(uri: Uri) -> io::Result<TcpStream> {
    if uri.scheme_str() == Some("https") {
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "TLS endpoints are not supported",
        ));
    }
    let authority = uri
        .authority()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "endpoint has no host"))?;
    let host = authority.host().trim_start_matches('[').trim_end_matches(']');
    let stream = TcpStream::connect((host, authority.port_u16().unwrap_or(80))).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Run one dial, publishing its progress to `state`.
async fn tracked<S, F>(
    state: Arc<watch::Sender<ConnectivityState>>,
    dial: F,
) -> io::Result<TokioIo<Tracked<S>>>
where
    F: Future<Output = io::Result<S>>,
{
    advance(&state, ConnectivityState::Connecting);
    let dialled = match tokio::time::timeout(DIAL_TIMEOUT, dial).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "dial timed out")),
    };
    match dialled {
        Ok(io) => {
            advance(&state, ConnectivityState::Ready);
            Ok(TokioIo::new(Tracked { io, state }))
        }
        Err(e) => {
            advance(&state, ConnectivityState::TransientFailure);
            Err(e)
        }
    }
}

/// Driver socket that reports a lost connection as `TransientFailure`.
struct Tracked<S> {
    io: S,
    state: Arc<watch::Sender<ConnectivityState>>,
}

impl<S> Tracked<S> {
    fn lost(&self) {
        advance(&self.state, ConnectivityState::TransientFailure);
    }

    fn check<T>(&self, poll: &Poll<io::Result<T>>) {
        if let Poll::Ready(Err(e)) = poll {
            debug!(error = %e, "driver connection failed");
            self.lost();
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for Tracked<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.io).poll_read(cx, buf);
        if matches!(poll, Poll::Ready(Ok(()))) && buf.filled().len() == before && buf.remaining() > 0 {
            debug!("driver closed the connection");
            self.lost();
        }
        self.check(&poll);
        poll
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for Tracked<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let poll = Pin::new(&mut self.io).poll_write(cx, buf);
        self.check(&poll);
        poll
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let poll = Pin::new(&mut self.io).poll_write_vectored(cx, bufs);
        self.check(&poll);
        poll
    }

    fn is_write_vectored(&self) -> bool {
        self.io.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let poll = Pin::new(&mut self.io).poll_flush(cx);
        self.check(&poll);
        poll
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_shutdown(cx)
    }
}

/// The one connection to the driver, once some dial has succeeded.
struct Link {
    target: DriverTarget,
    established: OnceLock<Channel>,
    dial: tokio::sync::Mutex<()>,
}

impl Link {
    /// The established channel, dialling first if there is none yet.
    async fn connect(
        &self,
        state: &Arc<watch::Sender<ConnectivityState>>,
    ) -> Result<Channel, tonic::transport::Error> {
        let _dialling = self.dial.lock().await;
        if let Some(channel) = self.established.get() {
            return Ok(channel.clone());
        }
        match self.target.connect(state).await {
            Ok(channel) => Ok(self.established.get_or_init(|| channel).clone()),
            Err(e) => {
                // A completed dial whose handshake failed still counts.
                advance(state, ConnectivityState::TransientFailure);
                Err(e)
            }
        }
    }
}

/// The single long-lived channel to a CSI driver.
///
/// Cloning the inner [`Channel`] is cheap and every clone multiplexes over
/// the same connection, so one `DriverChannel` serves any number of
/// concurrent calls.
pub struct DriverChannel {
    address: DriverAddress,
    link: RwLock<Option<Arc<Link>>>,
    state: Arc<watch::Sender<ConnectivityState>>,
    shutdown: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for DriverChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverChannel")
            .field("address", &self.address)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl DriverChannel {
    /// Open a channel to `address`, waiting up to `connect_timeout` for it
    /// to become ready.
    ///
    /// Only a malformed address is an error here.  An unreachable driver
    /// yields a channel that is not ready; see the module docs.
    #[instrument(skip(connect_timeout), fields(timeout = ?connect_timeout))]
    pub async fn open(address: &str, connect_timeout: Duration) -> Result<Self, CsiError> {
        debug!("Connecting to {address}");
        let target = DriverTarget::new(DriverAddress::parse(address)?)?;
        let address = target.address.clone();

        let (state, mut state_rx) = watch::channel(ConnectivityState::Idle);
        let state = Arc::new(state);
        let shutdown = CancellationToken::new();
        let link = Arc::new(Link {
            target,
            established: OnceLock::new(),
            dial: tokio::sync::Mutex::new(()),
        });

        let supervisor = tokio::spawn(supervise(
            Arc::clone(&link),
            Arc::clone(&state),
            shutdown.clone(),
        ));

        let channel = Self {
            address,
            link: RwLock::new(Some(link)),
            state,
            shutdown,
            supervisor: Mutex::new(Some(supervisor)),
        };

        wait_for_ready(&mut state_rx, Instant::now() + connect_timeout).await;
        Ok(channel)
    }

    /// The address this channel dials.
    pub fn address(&self) -> &DriverAddress {
        &self.address
    }

    /// Current connectivity.
    pub fn state(&self) -> ConnectivityState {
        *self.state.borrow()
    }

    /// Watch connectivity transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }

    /// Whether `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.link
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }

    /// A handle for issuing calls over the established connection.
    ///
    /// Before any dial has succeeded this dials once, waiting for a dial
    /// already in flight, and a failure comes back as `UNAVAILABLE`.
    pub async fn channel(&self) -> Result<Channel, CsiError> {
        let link = self
            .link
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(CsiError::ChannelClosed)?;
        if let Some(channel) = link.established.get() {
            return Ok(channel.clone());
        }
        link.connect(&self.state).await.map_err(|e| {
            CsiError::Rpc(Status::unavailable(format!(
                "failed to connect to {}: {}",
                self.address,
                error_chain(&e)
            )))
        })
    }

    /// Release the channel, stop the supervisor and drop the connection
    /// held here.  Calls already in flight keep their own clones.
    pub fn close(&self) -> Result<(), CsiError> {
        let link = self
            .link
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if link.is_none() {
            return Err(CsiError::ChannelClosed);
        }

        self.shutdown.cancel();
        if let Some(supervisor) = self
            .supervisor
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            supervisor.abort();
        }
        self.state.send_replace(ConnectivityState::Shutdown);
        debug!(address = %self.address, "channel closed");
        Ok(())
    }
}

impl Drop for DriverChannel {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut text = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Wait until `state` reports ready or `deadline` passes, whichever is
/// first.  Returns whether the channel became ready.
async fn wait_for_ready(state: &mut watch::Receiver<ConnectivityState>, deadline: Instant) -> bool {
    loop {
        let current = *state.borrow_and_update();
        if current == ConnectivityState::Ready {
            info!("Connected");
            return true;
        }
        debug!("Still trying, connection is {current}");

        match tokio::time::timeout_at(deadline, state.changed()).await {
            Ok(Ok(())) => continue,
            Ok(Err(_)) => {
                // Sender gone: nothing will change any more.
                return false;
            }
            Err(_) => {
                // The first call on the channel will show the real error.
                debug!("Connection timed out");
                return false;
            }
        }
    }
}

/// Publish `next` unless the channel has already been shut down.
fn advance(state: &watch::Sender<ConnectivityState>, next: ConnectivityState) {
    state.send_if_modified(|current| {
        if *current == ConnectivityState::Shutdown || *current == next {
            return false;
        }
        *current = next;
        true
    });
}

/// Dial until some dial succeeds or the channel is shut down.  Later state
/// changes come from the connector and the connection itself.
async fn supervise(
    link: Arc<Link>,
    state: Arc<watch::Sender<ConnectivityState>>,
    shutdown: CancellationToken,
) {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        let attempt = tokio::select! {
            _ = shutdown.cancelled() => return,
            attempt = link.connect(&state) => attempt,
        };

        match attempt {
            Ok(_) => {
                debug!(address = %link.target.address, "connection established");
                return;
            }
            Err(e) => {
                debug!(
                    address = %link.target.address,
                    error = %error_chain(&e),
                    ?backoff,
                    "dial failed"
                );
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}
