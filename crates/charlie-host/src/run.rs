//! Run control for one plugin instance.
//!
//! [`SimRun`] drives an [`InstanceHandle`] through `init`, the three
//! execution modes and `end`, keeping timing statistics, the latest frame
//! and a structured run log.
//!
//! ```text
//! Uninitialized --init--> Idle --update / update_steps--> Running
//!                         ^  |                               |
//!                         |  +--end--> Ended                 | stop / steps done
//!                         |             |                    v
//!                         +----init-----+---------------- Idle
//! ```
//!
//! Two flags carry the running state. `started` is the cooperative
//! cancellation flag: [`SimRun::stop`] clears it and the background loop
//! checks it every iteration. `running` is true exactly while a loop owns
//! the instance; it drops only after the loop's last log entry is
//! buffered. `started == false && running == true` means a stop was
//! requested and not yet observed.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use charlie_core::{parse_config, FrameBuffer};
use chrono::{SecondsFormat, Utc};
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use crate::client::{simplify, CallError};
use crate::config::{ConfigError, RunConfig};
use crate::instance::InstanceHandle;
use crate::logger::DataLogger;
use crate::png::save_png;

const SOFTWARE: &str = concat!("charlie-host ", env!("CARGO_PKG_VERSION"));

// ── Public types ────────────────────────────────────────────────

/// Notification raised by a run.
#[derive(Clone, Debug, PartialEq)]
pub enum RunEvent {
    /// An iteration (continuous mode) or a fixed-step segment finished.
    Updated {
        /// Iteration count at the time of the event.
        iteration: i64,
    },
    /// The run was ended and its log closed.
    Ended {
        /// Total iterations of the run.
        iterations: i64,
    },
}

/// Snapshot of a run's counters.
#[derive(Clone, Debug, PartialEq)]
pub struct RunStats {
    /// Iterations since the last `init`.
    pub iteration: i64,
    /// Number of `init` calls so far.
    pub initializations: i64,
    /// Time spent in iterations since the last `init`.
    pub elapsed_ms: i64,
    /// `elapsed / iteration`, or 0 before the first iteration.
    pub average_iteration_ms: f64,
    /// Cancellation flag.
    pub started: bool,
    /// Whether a loop currently owns the instance.
    pub running: bool,
}

/// Lifecycle position of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    /// Never initialised.
    Uninitialized,
    /// Initialised and not running.
    Idle,
    /// A loop owns the instance.
    Running,
    /// Ended; `init` starts a fresh run.
    Ended,
}

/// Run operations that cannot be carried out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunError {
    /// The operation exists but has no implementation.
    NotImplemented {
        /// Name of the operation.
        operation: &'static str,
    },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotImplemented { operation } => write!(f, "{operation} is not implemented"),
        }
    }
}

impl Error for RunError {}

// ── Shared state ────────────────────────────────────────────────

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the controller and its background loop.
struct Shared {
    instance: InstanceHandle,
    config: RunConfig,
    started: AtomicBool,
    running: AtomicBool,
    iteration: AtomicI64,
    initializations: AtomicI64,
    elapsed_nanos: AtomicU64,
    /// Serialises `init`, `end` and loop starts. Never held by a loop.
    phase: Mutex<RunPhase>,
    frame: Mutex<Option<FrameBuffer>>,
    log: Mutex<Option<DataLogger>>,
    run_dir: Mutex<Option<PathBuf>>,
    title: Mutex<Option<String>>,
    subscribers: Mutex<Vec<Sender<RunEvent>>>,
}

impl Shared {
    fn next_iteration(&self) -> i64 {
        self.iteration.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn record(&self, cycle: Duration) {
        let nanos = u64::try_from(cycle.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_nanos.fetch_add(nanos, Ordering::AcqRel);
    }

    fn stats(&self) -> RunStats {
        let iteration = self.iteration.load(Ordering::Acquire);
        let nanos = self.elapsed_nanos.load(Ordering::Acquire);
        let elapsed_ms = nanos as f64 / 1_000_000.0;
        RunStats {
            iteration,
            initializations: self.initializations.load(Ordering::Acquire),
            elapsed_ms: (nanos / 1_000_000) as i64,
            average_iteration_ms: if iteration > 0 {
                elapsed_ms / iteration as f64
            } else {
                0.0
            },
            started: self.started.load(Ordering::Acquire),
            running: self.running.load(Ordering::Acquire),
        }
    }

    fn notify(&self, event: RunEvent) {
        lock(&self.subscribers).retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn write(&self, text: &str) {
        if let Some(logger) = lock(&self.log).as_mut() {
            if let Err(e) = logger.log(text) {
                warn!(error = %e, "run log write failed");
            }
        }
    }

    fn log_error(&self, iteration: i64, err: &CallError) {
        let text = simplify(err);
        self.write(&format!(
            "<error iteration=\"{iteration}\">{}</error>\n",
            escape(&text)
        ));
    }

    fn log_iteration(&self, iteration: i64) {
        match self.instance.log() {
            Ok(Some(text)) => self.write(&format!(
                "<iteration n=\"{iteration}\">{}</iteration>\n",
                escape(&text)
            )),
            Ok(None) => {}
            Err(e) => self.log_error(iteration, &e),
        }
    }

    fn capture_frame(&self, iteration: i64) {
        match self
            .instance
            .render(self.config.render_width, self.config.render_height)
        {
            Ok(Some(frame)) => *lock(&self.frame) = Some(frame),
            Ok(None) => {}
            Err(e) => self.log_error(iteration, &e),
        }
    }

    fn finish_segment(&self) {
        self.started.store(false, Ordering::Release);
        self.running.store(false, Ordering::Release);
    }

    /// The continuous loop: runs until `started` is cleared.
    fn run_continuous(&self) {
        let mut last_cycle_ms = 0;
        while self.started.load(Ordering::Acquire) {
            let iteration = self.next_iteration();
            let cycle = Instant::now();

            let updated = self.instance.update(last_cycle_ms);
            if let Err(e) = &updated {
                self.log_error(iteration, e);
            }
            if self.config.render {
                self.capture_frame(iteration);
            }
            self.log_iteration(iteration);
            if self.config.render {
                thread::sleep(self.config.frame_delay);
            }

            let took = cycle.elapsed();
            last_cycle_ms = i64::try_from(took.as_millis()).unwrap_or(i64::MAX);
            self.record(took);
            self.notify(RunEvent::Updated { iteration });

            if matches!(updated, Err(CallError::Disconnected)) {
                warn!(iteration, "plugin module gone, stopping continuous run");
                break;
            }
        }
        self.finish_segment();
        debug!(iteration = self.iteration.load(Ordering::Acquire), "continuous run stopped");
    }

    /// Up to `steps` fixed-delta iterations, then one frame and log entry.
    fn run_steps(&self, steps: u64) {
        let delta = self.config.step_delta_ms;
        for _ in 0..steps {
            if !self.started.load(Ordering::Acquire) {
                break;
            }
            let iteration = self.next_iteration();
            let cycle = Instant::now();
            let updated = self.instance.update(delta);
            self.record(cycle.elapsed());
            if let Err(e) = updated {
                warn!(iteration, error = %simplify(&e), "plugin update failed");
                self.log_error(iteration, &e);
                if matches!(e, CallError::Disconnected) {
                    break;
                }
            }
        }

        let iteration = self.iteration.load(Ordering::Acquire);
        self.capture_frame(iteration);
        self.log_iteration(iteration);
        self.finish_segment();
        self.notify(RunEvent::Updated { iteration });
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

fn header(title: Option<&str>, meta: Option<&str>, config_text: &str) -> String {
    let mut out = String::from("<run>\n<header>\n");
    out.push_str(&format!("  <software>{SOFTWARE}</software>\n"));
    out.push_str(&format!(
        "  <platform>{} {}</platform>\n",
        std::env::consts::OS,
        std::env::consts::ARCH
    ));
    out.push_str(&format!(
        "  <datetime>{}</datetime>\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    out.push_str(&format!("  <title>{}</title>\n", escape(title.unwrap_or(""))));
    out.push_str(&format!("  <meta>{}</meta>\n", escape(meta.unwrap_or(""))));
    out.push_str("  <config>\n");
    for line in config_text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        out.push_str(&format!("    {}\n", escape(line)));
    }
    out.push_str("  </config>\n</header>\n");
    out
}

fn footer(stats: &RunStats) -> String {
    format!(
        "<footer>\n  <iterations>{}</iterations>\n  <elapsed_ms>{}</elapsed_ms>\n  \
         <average_ms>{:.3}</average_ms>\n</footer>\n</run>\n",
        stats.iteration, stats.elapsed_ms, stats.average_iteration_ms
    )
}

fn file_safe(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}

// ── SimRun ──────────────────────────────────────────────────────

/// Controller for one instance's lifecycle.
///
/// Methods take `&self`, so a run can be shared with a thread that polls
/// or stops it. Usage errors (running twice, ending before init) are
/// no-ops reported through `tracing` and the returned `bool`/`Option`.
pub struct SimRun {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SimRun {
    /// A run over `instance`.
    pub fn new(instance: InstanceHandle, config: RunConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                instance,
                config,
                started: AtomicBool::new(false),
                running: AtomicBool::new(false),
                iteration: AtomicI64::new(0),
                initializations: AtomicI64::new(0),
                elapsed_nanos: AtomicU64::new(0),
                phase: Mutex::new(RunPhase::Uninitialized),
                frame: Mutex::new(None),
                log: Mutex::new(None),
                run_dir: Mutex::new(None),
                title: Mutex::new(None),
                subscribers: Mutex::new(Vec::new()),
            }),
            worker: Mutex::new(None),
        })
    }

    /// (Re)initialise the instance from ConfigText and open a new run log.
    ///
    /// Plugin failures are written to the log, never returned; the run is
    /// Idle afterwards either way. Returns `false` if a loop is running.
    pub fn init(&self, config_text: &str) -> bool {
        let shared = &self.shared;
        let mut phase = lock(&shared.phase);
        if shared.running.load(Ordering::Acquire) || shared.started.load(Ordering::Acquire) {
            warn!("init ignored: run is in progress");
            return false;
        }
        self.join_worker();

        if let Some(mut previous) = lock(&shared.log).take() {
            if let Err(e) = previous.write_buffer() {
                warn!(error = %e, "could not flush the previous run log");
            }
        }
        shared.iteration.store(0, Ordering::Release);
        shared.elapsed_nanos.store(0, Ordering::Release);
        let run = shared.initializations.fetch_add(1, Ordering::AcqRel) + 1;
        *lock(&shared.frame) = None;

        let logger = match shared.config.resolved_data_root() {
            Some(root) => DataLogger::with_root(
                root,
                shared.instance.type_id(),
                &shared.config.log_subdir,
            )
            .map(|l| {
                l.with_limits(shared.config.max_file_len, shared.config.max_buffer_len)
            }),
            None => DataLogger::new(shared.instance.type_id(), &shared.config.log_subdir),
        };
        match logger {
            Ok(logger) => {
                *lock(&shared.run_dir) = Some(logger.dir().to_path_buf());
                *lock(&shared.log) = Some(logger);
            }
            Err(e) => warn!(error = %e, "run log unavailable, continuing without it"),
        }

        let title = shared.instance.title().unwrap_or_else(|e| {
            warn!(error = %simplify(&e), "could not read plugin title");
            None
        });
        let meta = shared.instance.meta().unwrap_or_else(|e| {
            warn!(error = %simplify(&e), "could not read plugin meta");
            None
        });
        shared.write(&header(title.as_deref(), meta.as_deref(), config_text));
        *lock(&shared.title) = title;

        match shared.instance.init(&parse_config(config_text)) {
            Ok(()) => {
                shared.capture_frame(0);
                shared.log_iteration(0);
            }
            Err(e) => shared.log_error(0, &e),
        }

        *phase = RunPhase::Idle;
        info!(
            type_id = shared.instance.type_id(),
            instance = shared.instance.id(),
            run,
            "run initialised"
        );
        true
    }

    /// Start the continuous loop on a background thread.
    pub fn update(&self) -> bool {
        if !self.begin("update") {
            return false;
        }
        self.spawn_worker(|shared| shared.run_continuous())
    }

    /// Run `steps` fixed-delta iterations on a background thread.
    pub fn update_steps(&self, steps: u64) -> bool {
        if !self.begin("update_steps") {
            return false;
        }
        self.spawn_worker(move |shared| shared.run_steps(steps))
    }

    /// Run `steps` fixed-delta iterations on this thread.
    pub fn update_sync(&self, steps: u64) -> bool {
        if !self.begin("update_sync") {
            return false;
        }
        self.shared.run_steps(steps);
        true
    }

    /// Ask the running loop to stop after its current iteration.
    pub fn stop(&self) {
        self.shared.started.store(false, Ordering::Release);
    }

    /// Forced termination is not supported; use [`stop`](Self::stop).
    pub fn abort(&self) -> Result<(), RunError> {
        Err(RunError::NotImplemented { operation: "abort" })
    }

    /// Block until the background loop (if any) has exited.
    pub fn join(&self) {
        self.join_worker();
    }

    /// Write the latest frame as `render-<title>-<n>.png` in the run
    /// directory. `None` while running or without a frame.
    pub fn save_image(&self) -> Option<PathBuf> {
        if self.shared.running.load(Ordering::Acquire) {
            warn!("save_image ignored: run is in progress");
            return None;
        }
        let Some(frame) = lock(&self.shared.frame).clone() else {
            warn!("save_image ignored: no frame captured");
            return None;
        };
        let Some(dir) = lock(&self.shared.run_dir).clone() else {
            warn!("save_image ignored: no run directory");
            return None;
        };
        let title = lock(&self.shared.title)
            .clone()
            .unwrap_or_else(|| self.shared.instance.type_id().to_string());
        let path = dir.join(format!(
            "render-{}-{}.png",
            file_safe(&title),
            rand::random::<u32>()
        ));
        match save_png(&frame, &path) {
            Ok(()) => {
                debug!(path = %path.display(), "frame saved");
                Some(path)
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "could not save frame");
                None
            }
        }
    }

    /// End the instance, write the footer and close the run log.
    pub fn end(&self) -> bool {
        let shared = &self.shared;
        let mut phase = lock(&shared.phase);
        if shared.running.load(Ordering::Acquire) || shared.started.load(Ordering::Acquire) {
            warn!("end ignored: run is in progress");
            return false;
        }
        if *phase != RunPhase::Idle {
            warn!(phase = ?*phase, "end ignored: run is not initialised");
            return false;
        }
        self.join_worker();

        let iteration = shared.iteration.load(Ordering::Acquire);
        if let Err(e) = shared.instance.end() {
            shared.log_error(iteration, &e);
        }
        let stats = shared.stats();
        shared.write(&footer(&stats));
        if let Some(mut logger) = lock(&shared.log).take() {
            if let Err(e) = logger.write_buffer() {
                warn!(error = %e, "could not flush the run log");
            }
        }

        *phase = RunPhase::Ended;
        shared.notify(RunEvent::Ended {
            iterations: stats.iteration,
        });
        info!(iterations = stats.iteration, "run ended");
        true
    }

    /// Run `runs` batch cycles of init, `steps` synchronous iterations,
    /// image capture and end. Returns the saved image paths.
    pub fn run_batch(&self, config_text: &str, runs: u32, steps: u64) -> Vec<PathBuf> {
        let mut images = Vec::new();
        for run in 0..runs {
            if !self.init(config_text) {
                warn!(run, "batch stopped: run is in progress");
                break;
            }
            self.update_sync(steps);
            images.extend(self.save_image());
            self.end();
        }
        images
    }

    /// Receive notifications from now on.
    pub fn subscribe(&self) -> Receiver<RunEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        lock(&self.shared.subscribers).push(tx);
        rx
    }

    /// Counter snapshot.
    pub fn stats(&self) -> RunStats {
        self.shared.stats()
    }

    /// Current lifecycle position.
    pub fn phase(&self) -> RunPhase {
        if self.shared.running.load(Ordering::Acquire) {
            RunPhase::Running
        } else {
            *lock(&self.shared.phase)
        }
    }

    /// Cancellation flag.
    pub fn is_started(&self) -> bool {
        self.shared.started.load(Ordering::Acquire)
    }

    /// Whether a loop currently owns the instance.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Iterations since the last `init`.
    pub fn iteration(&self) -> i64 {
        self.shared.iteration.load(Ordering::Acquire)
    }

    /// Number of `init` calls so far.
    pub fn initializations(&self) -> i64 {
        self.shared.initializations.load(Ordering::Acquire)
    }

    /// Time spent iterating since the last `init`.
    pub fn elapsed_ms(&self) -> i64 {
        self.stats().elapsed_ms
    }

    /// Average iteration time since the last `init`.
    pub fn average_iteration_ms(&self) -> f64 {
        self.stats().average_iteration_ms
    }

    /// The latest captured frame.
    pub fn frame(&self) -> Option<FrameBuffer> {
        lock(&self.shared.frame).clone()
    }

    /// Directory of the current (or last) run log.
    pub fn log_dir(&self) -> Option<PathBuf> {
        lock(&self.shared.run_dir).clone()
    }

    /// The instance this run drives.
    pub fn instance(&self) -> &InstanceHandle {
        &self.shared.instance
    }

    /// The run's settings.
    pub fn config(&self) -> &RunConfig {
        &self.shared.config
    }

    fn begin(&self, mode: &'static str) -> bool {
        let shared = &self.shared;
        let phase = lock(&shared.phase);
        if *phase != RunPhase::Idle {
            warn!(mode, phase = ?*phase, "ignored: run is not initialised");
            return false;
        }
        if shared.running.load(Ordering::Acquire)
            || shared
                .started
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            warn!(mode, "ignored: run is in progress");
            return false;
        }
        shared.running.store(true, Ordering::Release);
        true
    }

    fn spawn_worker<F>(&self, body: F) -> bool
    where
        F: FnOnce(&Shared) + Send + 'static,
    {
        let mut worker = lock(&self.worker);
        if let Some(previous) = worker.take() {
            let _ = previous.join();
        }
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("charlie-run-{}", self.shared.instance.id()))
            .spawn(move || body(&shared));
        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                true
            }
            Err(e) => {
                warn!(error = %e, "could not start run thread");
                self.shared.finish_segment();
                false
            }
        }
    }

    fn join_worker(&self) {
        let handle = lock(&self.worker).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("run thread panicked");
                self.shared.finish_segment();
            }
        }
    }
}

impl Drop for SimRun {
    fn drop(&mut self) {
        self.stop();
        self.join_worker();
        if let Some(logger) = lock(&self.shared.log).as_mut() {
            if let Err(e) = logger.write_buffer() {
                warn!(error = %e, "could not flush the run log");
            }
        }
    }
}

impl fmt::Debug for SimRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimRun")
            .field("instance", &self.shared.instance)
            .field("phase", &self.phase())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_neutralises_markup() {
        assert_eq!(escape("a<b> & c"), "a&lt;b&gt; &amp; c");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn header_echoes_config_lines() {
        let text = header(Some("Walk"), None, "# comment\nX=1\n\n  Y = 2  \n");
        assert!(text.starts_with("<run>\n<header>\n"));
        assert!(text.contains("  <title>Walk</title>\n"));
        assert!(text.contains("  <meta></meta>\n"));
        assert!(text.contains("  <config>\n    # comment\n    X=1\n    Y = 2\n  </config>\n"));
        assert!(text.contains(&format!("<software>{SOFTWARE}</software>")));
        assert!(text.ends_with("</header>\n"));
    }

    #[test]
    fn footer_closes_the_document() {
        let stats = RunStats {
            iteration: 10,
            initializations: 1,
            elapsed_ms: 123,
            average_iteration_ms: 12.3,
            started: false,
            running: false,
        };
        assert_eq!(
            footer(&stats),
            "<footer>\n  <iterations>10</iterations>\n  <elapsed_ms>123</elapsed_ms>\n  \
             <average_ms>12.300</average_ms>\n</footer>\n</run>\n"
        );
    }

    #[test]
    fn titles_become_file_safe() {
        assert_eq!(file_safe("Game of Life"), "Game_of_Life");
        assert_eq!(file_safe("random-walk"), "random-walk");
        assert_eq!(file_safe(""), "untitled");
        assert_eq!(file_safe("../x"), "___x");
    }

    #[test]
    fn run_error_names_the_operation() {
        let err = RunError::NotImplemented { operation: "abort" };
        assert_eq!(err.to_string(), "abort is not implemented");
    }
}
