//! The proxy that owns every plugin instance of a module.
//!
//! The proxy binds once to a registered type, then serves requests by
//! instance id. Each instance lives on its own worker thread, built there
//! by the type's factory and never moved: the worker is the only thread
//! that ever touches the instance, so calls into one instance run strictly
//! in arrival order while separate instances proceed independently.
//!
//! ```text
//! Host                  Reader (serve)            Instance workers         Reply writer
//!   |--request--------->| read_request()            |                        |
//!   |                   | Manifest/Bind/Spawn ------------------------------>| replies_tx
//!   |                   | per-instance ------------>| mailbox.recv()          |
//!   |                   |                           | catch_unwind(call)      |
//!   |                   |                           |------------------------>| write_response()
//!   |<---------------------------------------------------------------response-|
//! ```

use std::io::{self, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use charlie_core::{PluginFailure, SimError, Simulation};
use charlie_wire::{Envelope, Rejection, Request, Response, WireError};
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, warn};

use crate::registry::{Factory, Registry};
use crate::table::InstanceTable;

/// A live instance: its mailbox and the thread that owns it.
struct InstanceWorker {
    mailbox: Sender<Envelope<Request>>,
    thread: JoinHandle<()>,
}

/// Binds the capability contract to one registered type and dispatches
/// requests to instances of it.
pub struct PluginProxy {
    registry: Registry,
    bound: Option<(String, Factory)>,
    instances: InstanceTable<InstanceWorker>,
    replies: Sender<Envelope<Response>>,
}

impl PluginProxy {
    /// A proxy serving types from `registry`, sending every response to
    /// `replies`.
    pub fn new(registry: Registry, replies: Sender<Envelope<Response>>) -> Self {
        Self {
            registry,
            bound: None,
            instances: InstanceTable::new(),
            replies,
        }
    }

    /// The type id the proxy is bound to.
    pub fn bound_type(&self) -> Option<&str> {
        self.bound.as_ref().map(|(id, _)| id.as_str())
    }

    /// Number of live instances.
    pub fn live_instances(&self) -> usize {
        self.instances.len()
    }

    /// Handle one request. Returns `false` once the host asked to shut down.
    ///
    /// Per-instance requests are queued on the instance's worker and
    /// answered from there; everything else is answered before returning.
    pub fn handle(&mut self, env: Envelope<Request>) -> bool {
        let Envelope { seq, body } = env;
        match body {
            Request::Manifest => {
                let types = self.registry.type_ids();
                self.reply(seq, Response::Types(types));
            }
            Request::Bind { type_id } => {
                let response = self.bind(type_id);
                self.reply(seq, response);
            }
            Request::Spawn => {
                let response = self.spawn();
                self.reply(seq, response);
            }
            Request::Remove { instance } => {
                let response = self.remove(instance);
                self.reply(seq, response);
            }
            Request::Shutdown => {
                self.shutdown();
                self.reply(seq, Response::Done);
                return false;
            }
            other => self.forward(seq, other),
        }
        true
    }

    /// Drop every instance, waiting for each worker to finish its queue.
    pub fn shutdown(&mut self) {
        for (id, worker) in self.instances.drain() {
            join_worker(id, worker);
        }
    }

    fn reply(&self, seq: u64, body: Response) {
        // The writer only disappears when the host is gone.
        let _ = self.replies.send(Envelope::new(seq, body));
    }

    fn bind(&mut self, type_id: String) -> Response {
        if let Some((bound, _)) = &self.bound {
            return Response::Rejected(Rejection::AlreadyBound {
                type_id: bound.clone(),
            });
        }
        match self.registry.factory(&type_id) {
            Some(factory) => {
                debug!(type_id = %type_id, "proxy bound");
                self.bound = Some((type_id, factory));
                Response::Done
            }
            None => Response::Rejected(Rejection::TypeNotFound { type_id }),
        }
    }

    fn spawn(&mut self) -> Response {
        let factory = match &self.bound {
            Some((_, factory)) => *factory,
            None => return Response::Rejected(Rejection::NotBound),
        };
        let Some(id) = self.instances.next_id() else {
            return Response::Rejected(Rejection::SpawnFailed {
                reason: "instance ids exhausted".into(),
            });
        };

        let (mailbox, inbox) = crossbeam_channel::unbounded();
        let replies = self.replies.clone();
        let spawned = thread::Builder::new()
            .name(format!("charlie-instance-{id}"))
            .spawn(move || instance_loop(factory, inbox, replies));

        match spawned {
            Ok(thread) => {
                self.instances.insert(InstanceWorker { mailbox, thread });
                debug!(instance = id, "instance spawned");
                Response::Spawned { instance: id }
            }
            Err(e) => Response::Rejected(Rejection::SpawnFailed {
                reason: e.to_string(),
            }),
        }
    }

    fn remove(&mut self, instance: u32) -> Response {
        match self.instances.remove(instance) {
            Some(worker) => {
                join_worker(instance, worker);
                debug!(instance, "instance removed");
                Response::Done
            }
            None => Response::Rejected(Rejection::UnknownInstance { instance }),
        }
    }

    fn forward(&mut self, seq: u64, request: Request) {
        let Some(instance) = request.instance() else {
            self.reply(
                seq,
                Response::Failed(PluginFailure::new(format!(
                    "{} is not an instance operation",
                    request.name()
                ))),
            );
            return;
        };
        if self.bound.is_none() {
            self.reply(seq, Response::Rejected(Rejection::NotBound));
            return;
        }
        match self.instances.get(instance) {
            Some(worker) => {
                if worker.mailbox.send(Envelope::new(seq, request)).is_err() {
                    self.reply(
                        seq,
                        Response::Failed(PluginFailure::new(format!(
                            "instance {instance} worker has exited"
                        ))),
                    );
                }
            }
            None => self.reply(
                seq,
                Response::Rejected(Rejection::UnknownInstance { instance }),
            ),
        }
    }
}

impl Drop for PluginProxy {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn join_worker(id: u32, worker: InstanceWorker) {
    let InstanceWorker { mailbox, thread } = worker;
    drop(mailbox);
    if thread.join().is_err() {
        warn!(instance = id, "instance worker panicked outside a plugin call");
    }
}

/// Owns one instance for its whole life.
fn instance_loop(
    factory: Factory,
    inbox: Receiver<Envelope<Request>>,
    replies: Sender<Envelope<Response>>,
) {
    // A constructor that panics leaves a dead instance: every call on it
    // reports the construction failure.
    let mut sim = panic::catch_unwind(factory).map_err(|p| PluginFailure::from_panic(p.as_ref()));

    for Envelope { seq, body } in inbox.iter() {
        let response = match &mut sim {
            Ok(sim) => dispatch(sim.as_mut(), body),
            Err(failure) => Response::Failed(failure.clone()),
        };
        if replies.send(Envelope::new(seq, response)).is_err() {
            break;
        }
    }
}

/// Call into plugin code, containing panics.
fn dispatch(sim: &mut dyn Simulation, request: Request) -> Response {
    match panic::catch_unwind(AssertUnwindSafe(|| call(sim, request))) {
        Ok(response) => response,
        Err(payload) => Response::Failed(PluginFailure::from_panic(payload.as_ref())),
    }
}

fn done(result: Result<(), SimError>) -> Response {
    match result {
        Ok(()) => Response::Done,
        Err(e) => Response::Failed(PluginFailure::from(e)),
    }
}

fn call(sim: &mut dyn Simulation, request: Request) -> Response {
    match request {
        Request::Title { .. } => Response::Text(sim.title()),
        Request::Descr { .. } => Response::Text(sim.descr()),
        Request::Config { .. } => Response::Text(sim.config()),
        Request::Meta { .. } => Response::Text(sim.meta()),
        Request::Init { config, .. } => done(sim.init(&config)),
        Request::Update { delta_ms, .. } => done(sim.update(delta_ms)),
        Request::Render { width, height, .. } => match sim.render(width, height) {
            Ok(frame) => Response::Frame(frame),
            Err(e) => Response::Failed(PluginFailure::from(e)),
        },
        Request::Log { .. } => match sim.log() {
            Ok(text) => Response::Text(text),
            Err(e) => Response::Failed(PluginFailure::from(e)),
        },
        Request::End { .. } => done(sim.end()),
        other => Response::Failed(PluginFailure::new(format!(
            "{} is not an instance operation",
            other.name()
        ))),
    }
}

/// Serve requests from `reader` until the host closes the stream or asks
/// to shut down, writing responses to `writer`.
///
/// Writes the protocol announcement first. On return every instance has
/// been dropped and every queued response written.
pub fn serve<R, W>(registry: Registry, mut reader: R, mut writer: W) -> Result<(), WireError>
where
    R: Read,
    W: Write + Send + 'static,
{
    charlie_wire::write_hello(&mut writer)?;

    let (replies, outgoing) = crossbeam_channel::unbounded();
    let writer_thread = thread::Builder::new()
        .name("charlie-replies".into())
        .spawn(move || reply_loop(writer, outgoing))?;

    let mut proxy = PluginProxy::new(registry, replies);
    let result = loop {
        match charlie_wire::read_request(&mut reader) {
            Ok(Some(env)) => {
                if !proxy.handle(env) {
                    debug!("shutdown requested");
                    break Ok(());
                }
            }
            Ok(None) => {
                debug!("host closed the request stream");
                break Ok(());
            }
            Err(e) => {
                error!(error = %e, "unreadable request");
                break Err(e);
            }
        }
    };

    // Dropping the proxy joins the workers and releases the last reply
    // sender, which ends the writer loop.
    drop(proxy);
    let written = writer_thread
        .join()
        .unwrap_or_else(|_| Err(WireError::Io(io::Error::other("reply writer panicked"))));
    result.and(written)
}

fn reply_loop<W: Write>(mut writer: W, outgoing: Receiver<Envelope<Response>>) -> Result<(), WireError> {
    for env in outgoing.iter() {
        match charlie_wire::write_response(&mut writer, &env) {
            Ok(()) => {}
            // Nothing reached the stream; answer the call with the reason instead.
            Err(e @ WireError::MessageTooLarge { .. }) => {
                warn!(seq = env.seq, error = %e, "response too large");
                let failed = Envelope::new(env.seq, Response::Failed(PluginFailure::new(e.to_string())));
                charlie_wire::write_response(&mut writer, &failed)?;
            }
            Err(e) => {
                warn!(error = %e, "host stopped reading responses");
                return Err(e);
            }
        }
    }
    Ok(())
}
