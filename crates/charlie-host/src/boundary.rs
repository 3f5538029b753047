//! Isolation boundaries: where a module's code and instances live.
//!
//! A module is normally a child process speaking the protocol on its
//! stdin/stdout; tearing the process down unloads every instance it held.
//! A registry can also be served on a thread inside the host over
//! in-memory pipes, which keeps the protocol identical for embedding and
//! tests but shares the host's address space.

use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use charlie_plugin::Registry;
use charlie_wire::WireError;
use tracing::{debug, warn};

/// Byte streams to and from a module.
pub(crate) struct Streams {
    pub(crate) from_module: Box<dyn Read + Send>,
    pub(crate) to_module: Box<dyn Write + Send>,
}

/// Owner of a module's execution context.
pub(crate) enum Boundary {
    Process(Child),
    InProcess(JoinHandle<Result<(), WireError>>),
}

impl Boundary {
    /// Launch the module executable at `path`.
    pub(crate) fn launch(path: &Path) -> io::Result<(Self, Streams)> {
        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(io::Error::other("module stdio was not captured"));
        };
        debug!(pid = child.id(), path = %path.display(), "module process started");
        let streams = Streams {
            from_module: Box::new(stdout),
            to_module: Box::new(stdin),
        };
        Ok((Self::Process(child), streams))
    }

    /// Serve `registry` on a thread of this process.
    pub(crate) fn in_process(registry: Registry) -> io::Result<(Self, Streams)> {
        let (request_reader, request_writer) = io::pipe()?;
        let (response_reader, response_writer) = io::pipe()?;
        let server = thread::Builder::new()
            .name("charlie-module".into())
            .spawn(move || {
                charlie_plugin::serve(registry, BufReader::new(request_reader), response_writer)
            })?;
        let streams = Streams {
            from_module: Box::new(response_reader),
            to_module: Box::new(request_writer),
        };
        Ok((Self::InProcess(server), streams))
    }

    /// Wait for the module to exit after its request stream was closed,
    /// killing a process that outlives `grace`. An in-process module still
    /// busy after `grace` is detached.
    pub(crate) fn close(self, grace: Duration) {
        match self {
            Self::Process(mut child) => {
                let deadline = Instant::now() + grace;
                loop {
                    match child.try_wait() {
                        Ok(Some(status)) => {
                            debug!(%status, "module process exited");
                            return;
                        }
                        Ok(None) if Instant::now() < deadline => {
                            thread::sleep(Duration::from_millis(10));
                        }
                        Ok(None) => {
                            warn!(pid = child.id(), "module did not exit, killing it");
                            kill(child);
                            return;
                        }
                        Err(e) => {
                            warn!(error = %e, "could not poll module process");
                            kill(child);
                            return;
                        }
                    }
                }
            }
            Self::InProcess(server) => {
                let deadline = Instant::now() + grace;
                while !server.is_finished() && Instant::now() < deadline {
                    thread::sleep(Duration::from_millis(10));
                }
                if !server.is_finished() {
                    warn!("in-process module still busy, detaching it");
                    return;
                }
                match server.join() {
                    Ok(Ok(())) => debug!("in-process module stopped"),
                    Ok(Err(e)) => warn!(error = %e, "in-process module stopped with an error"),
                    Err(_) => warn!("in-process module thread panicked"),
                }
            }
        }
    }

    /// Tear down a module that never finished loading.
    ///
    /// The caller must already have dropped its streams.
    pub(crate) fn abandon(self) {
        match self {
            Self::Process(child) => kill(child),
            in_process @ Self::InProcess(_) => in_process.close(Duration::ZERO),
        }
    }
}

fn kill(mut child: Child) {
    let _ = child.kill();
    let _ = child.wait();
}
