//! Host end of the boundary protocol.
//!
//! Any number of threads may call through one [`ProxyClient`]. Each call
//! takes a sequence number, parks a one-shot reply slot under it and
//! writes the request; a single reader thread matches responses to slots
//! by sequence number. When the module goes away the reader empties the
//! slot table, so every pending and later call returns
//! [`CallError::Disconnected`].

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::io::{self, BufReader, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use charlie_core::{ConfigMap, FrameBuffer, PluginFailure};
use charlie_wire::{Envelope, Rejection, Request, Response, WireError};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

/// A call through the boundary that did not produce a result.
#[derive(Debug)]
pub enum CallError {
    /// Plugin code returned an error or panicked.
    Plugin(PluginFailure),
    /// The proxy refused the request.
    Rejected(Rejection),
    /// The request or its response could not be encoded.
    Wire(WireError),
    /// The module is gone: unloaded, crashed or closed its output.
    Disconnected,
    /// The proxy answered with a response of the wrong kind.
    UnexpectedResponse {
        /// Name of the request that got the wrong answer.
        request: &'static str,
    },
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plugin(failure) => write!(f, "{failure}"),
            Self::Rejected(r) => write!(f, "request rejected: {r}"),
            Self::Wire(e) => write!(f, "protocol error: {e}"),
            Self::Disconnected => write!(f, "plugin module disconnected"),
            Self::UnexpectedResponse { request } => {
                write!(f, "unexpected response to {request}")
            }
        }
    }
}

impl Error for CallError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Plugin(failure) => Some(failure),
            Self::Rejected(r) => Some(r),
            Self::Wire(e) => Some(e),
            Self::Disconnected | Self::UnexpectedResponse { .. } => None,
        }
    }
}

impl From<WireError> for CallError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::Io(_) => Self::Disconnected,
            other => Self::Wire(other),
        }
    }
}

impl From<PluginFailure> for CallError {
    fn from(failure: PluginFailure) -> Self {
        Self::Plugin(failure)
    }
}

/// Reduce a call failure to the text the run log records: the plugin's own
/// message and causes, one trimmed line each, without transport wrapping.
pub fn simplify(err: &CallError) -> String {
    match err {
        CallError::Plugin(failure) => failure.summary(),
        other => other
            .to_string()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

type Pending = HashMap<u64, Sender<Response>>;

struct Routes {
    pending: Pending,
    open: bool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Multiplexed request/response channel to one plugin proxy.
pub struct ProxyClient {
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    routes: Arc<Mutex<Routes>>,
    next_seq: AtomicU64,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl ProxyClient {
    /// Start a client over a module's output and input streams.
    ///
    /// Waits up to `handshake` for the module's protocol announcement.
    pub fn connect<R, W>(reader: R, writer: W, handshake: Duration) -> Result<Self, WireError>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let routes = Arc::new(Mutex::new(Routes {
            pending: HashMap::new(),
            open: true,
        }));
        let (hello_tx, hello_rx) = crossbeam_channel::bounded(1);
        let thread_routes = Arc::clone(&routes);
        let reader_thread = thread::Builder::new()
            .name("charlie-proxy-reader".into())
            .spawn(move || read_loop(BufReader::new(reader), hello_tx, thread_routes))?;

        match hello_rx.recv_timeout(handshake) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(RecvTimeoutError::Timeout) => {
                return Err(WireError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "module did not announce the protocol in time",
                )))
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(WireError::Io(io::Error::other("proxy reader exited")))
            }
        }

        Ok(Self {
            writer: Mutex::new(Some(Box::new(writer))),
            routes,
            next_seq: AtomicU64::new(0),
            reader: Mutex::new(Some(reader_thread)),
        })
    }

    /// Whether the module can still be reached.
    pub fn is_connected(&self) -> bool {
        lock(&self.routes).open && lock(&self.writer).is_some()
    }

    /// Send one request and wait for its response.
    pub fn call(&self, request: Request) -> Result<Response, CallError> {
        let (_, reply_rx) = self.submit(request)?;
        reply_rx.recv().map_err(|_| CallError::Disconnected)
    }

    /// Send one request and return its sequence number and reply slot.
    fn submit(&self, request: Request) -> Result<(u64, Receiver<Response>), CallError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        {
            let mut routes = lock(&self.routes);
            if !routes.open {
                return Err(CallError::Disconnected);
            }
            routes.pending.insert(seq, reply_tx);
        }

        if let Err(e) = self.send(Envelope::new(seq, request)) {
            lock(&self.routes).pending.remove(&seq);
            return Err(e);
        }
        Ok((seq, reply_rx))
    }

    fn send(&self, env: Envelope<Request>) -> Result<(), CallError> {
        let mut writer = lock(&self.writer);
        let Some(w) = writer.as_mut() else {
            return Err(CallError::Disconnected);
        };
        charlie_wire::write_request(w.as_mut(), &env).map_err(CallError::from)
    }

    /// Ask the proxy to drop every instance, then close the request stream.
    ///
    /// Waits at most `wait` for the acknowledgement: a plugin call that never
    /// returns keeps the proxy from answering, and the stream is closed
    /// regardless. Later calls fail with [`CallError::Disconnected`].
    pub fn shutdown(&self, wait: Duration) {
        match self.submit(Request::Shutdown) {
            Ok((seq, reply_rx)) => match reply_rx.recv_timeout(wait) {
                Ok(_) | Err(RecvTimeoutError::Disconnected) => {}
                Err(RecvTimeoutError::Timeout) => {
                    lock(&self.routes).pending.remove(&seq);
                    warn!(?wait, "proxy did not acknowledge shutdown");
                }
            },
            Err(CallError::Disconnected) => {}
            Err(e) => warn!(error = %e, "proxy shutdown failed"),
        }
        lock(&self.writer).take();
    }

    /// Wait for the reader thread to see the end of the module's output.
    pub(crate) fn join_reader(&self) {
        if let Some(handle) = lock(&self.reader).take() {
            if handle.join().is_err() {
                warn!("proxy reader thread panicked");
            }
        }
    }

    /// Type ids the module registers.
    pub fn manifest(&self) -> Result<Vec<String>, CallError> {
        match self.call(Request::Manifest)? {
            Response::Types(types) => Ok(types),
            other => Err(unexpected("manifest", other)),
        }
    }

    /// Bind the proxy to `type_id`.
    pub fn bind(&self, type_id: &str) -> Result<(), CallError> {
        self.expect_done(
            "bind",
            Request::Bind {
                type_id: type_id.to_string(),
            },
        )
    }

    /// Construct a new instance of the bound type.
    pub fn spawn(&self) -> Result<u32, CallError> {
        match self.call(Request::Spawn)? {
            Response::Spawned { instance } => Ok(instance),
            other => Err(unexpected("spawn", other)),
        }
    }

    /// Drop instance `id`.
    pub fn remove(&self, id: u32) -> Result<(), CallError> {
        self.expect_done("remove", Request::Remove { instance: id })
    }

    /// The instance's title.
    pub fn title(&self, id: u32) -> Result<Option<String>, CallError> {
        self.expect_text("title", Request::Title { instance: id })
    }

    /// The instance's description.
    pub fn descr(&self, id: u32) -> Result<Option<String>, CallError> {
        self.expect_text("descr", Request::Descr { instance: id })
    }

    /// The instance's default configuration text.
    pub fn config(&self, id: u32) -> Result<Option<String>, CallError> {
        self.expect_text("config", Request::Config { instance: id })
    }

    /// The instance's metadata.
    pub fn meta(&self, id: u32) -> Result<Option<String>, CallError> {
        self.expect_text("meta", Request::Meta { instance: id })
    }

    /// (Re)initialise the instance.
    pub fn init(&self, id: u32, config: &ConfigMap) -> Result<(), CallError> {
        self.expect_done(
            "init",
            Request::Init {
                instance: id,
                config: config.clone(),
            },
        )
    }

    /// Advance the instance by one step.
    pub fn update(&self, id: u32, delta_ms: i64) -> Result<(), CallError> {
        self.expect_done(
            "update",
            Request::Update {
                instance: id,
                delta_ms,
            },
        )
    }

    /// Render the instance's current state.
    pub fn render(&self, id: u32, width: u32, height: u32) -> Result<Option<FrameBuffer>, CallError> {
        match self.call(Request::Render {
            instance: id,
            width,
            height,
        })? {
            Response::Frame(frame) => Ok(frame),
            other => Err(unexpected("render", other)),
        }
    }

    /// One log entry for the current iteration.
    pub fn log(&self, id: u32) -> Result<Option<String>, CallError> {
        self.expect_text("log", Request::Log { instance: id })
    }

    /// Finalise the instance.
    pub fn end(&self, id: u32) -> Result<(), CallError> {
        self.expect_done("end", Request::End { instance: id })
    }

    fn expect_done(&self, name: &'static str, request: Request) -> Result<(), CallError> {
        match self.call(request)? {
            Response::Done => Ok(()),
            other => Err(unexpected(name, other)),
        }
    }

    fn expect_text(&self, name: &'static str, request: Request) -> Result<Option<String>, CallError> {
        match self.call(request)? {
            Response::Text(text) => Ok(text),
            other => Err(unexpected(name, other)),
        }
    }
}

impl fmt::Debug for ProxyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routes = lock(&self.routes);
        f.debug_struct("ProxyClient")
            .field("open", &routes.open)
            .field("pending", &routes.pending.len())
            .finish()
    }
}

fn unexpected(request: &'static str, response: Response) -> CallError {
    match response {
        Response::Failed(failure) => CallError::Plugin(failure),
        Response::Rejected(r) => CallError::Rejected(r),
        _ => CallError::UnexpectedResponse { request },
    }
}

fn read_loop<R: Read>(
    mut reader: R,
    hello: Sender<Result<(), WireError>>,
    routes: Arc<Mutex<Routes>>,
) {
    let greeted = charlie_wire::read_hello(&mut reader);
    let ok = greeted.is_ok();
    let _ = hello.send(greeted);
    if ok {
        loop {
            match charlie_wire::read_response(&mut reader) {
                Ok(Some(env)) => {
                    let slot = lock(&routes).pending.remove(&env.seq);
                    match slot {
                        Some(reply) => {
                            let _ = reply.send(env.body);
                        }
                        None => warn!(seq = env.seq, "response for an unknown request"),
                    }
                }
                Ok(None) => {
                    debug!("module closed its output");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "unreadable response from module");
                    break;
                }
            }
        }
    }

    // Dropping the reply senders wakes every waiting caller.
    let mut routes = lock(&routes);
    routes.open = false;
    routes.pending.clear();
}
