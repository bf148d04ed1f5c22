//! Compute backends that run the transform set for one frame.
//!
//! The inline backend runs on the caller's thread. The worker backend owns
//! the transform set on a dedicated thread and talks to the driver over
//! channels; every job carries a ticket so results from a job the driver has
//! since abandoned can be recognized and discarded.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use motionscope_core::{FrameHistory, MotionScopeError, Result};
use motionscope_effects::{FrameContext, TransformKind, TransformOutcome, TransformSet};
use tracing::{debug, error, info, warn};

use crate::compositor::EffectList;
use crate::config::BackendKind;

/// Work for one frame: a snapshot of the history whose newest frame is current.
#[derive(Debug, Clone)]
pub struct FrameJob {
    /// Monotonic job id, unique for the lifetime of a pipeline.
    pub ticket: u64,
    /// Index of the current frame.
    pub index: u64,
    pub history: FrameHistory,
}

/// Effects produced for one frame.
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    pub ticket: u64,
    pub index: u64,
    pub effects: EffectList,
    pub applied: Vec<TransformKind>,
    pub failed: usize,
    /// Time spent inside the transforms.
    pub elapsed: Duration,
}

/// Run every enabled transform on the newest frame of `history`.
pub fn process_job(set: &mut TransformSet, job: FrameJob, parallel: bool) -> ProcessedFrame {
    let started = Instant::now();
    let mut effects = EffectList::new();
    let mut applied = Vec::new();
    let mut failed = 0;

    if let Some(ctx) = FrameContext::from_history(&job.history) {
        for outcome in set.apply_all(&ctx, parallel) {
            match outcome {
                TransformOutcome::Applied { kind, buffer } => {
                    applied.push(kind);
                    effects.push(buffer);
                }
                TransformOutcome::Skipped { .. } => {}
                TransformOutcome::Failed { .. } => failed += 1,
            }
        }
    }

    ProcessedFrame {
        ticket: job.ticket,
        index: job.index,
        effects,
        applied,
        failed,
        elapsed: started.elapsed(),
    }
}

/// A place transforms can run.
pub trait ComputeBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Start processing a frame. Inline backends finish before returning.
    fn submit(&mut self, job: FrameJob) -> Result<()>;

    /// Next finished result, without blocking.
    fn poll(&mut self) -> Option<ProcessedFrame>;

    /// Next finished result, blocking up to `timeout`.
    fn wait(&mut self, timeout: Duration) -> Option<ProcessedFrame>;

    /// Toggle a transform. Returns false if it is not configured.
    fn set_enabled(&mut self, kind: TransformKind, enabled: bool) -> bool;

    fn active_kinds(&self) -> Vec<TransformKind>;

    /// Clear persistent transform state.
    fn reset(&mut self);
}

/// Runs transforms synchronously on the driver thread.
#[derive(Debug)]
pub struct InlineExecutor {
    set: TransformSet,
    parallel: bool,
    ready: Option<ProcessedFrame>,
}

impl InlineExecutor {
    pub fn new(set: TransformSet, parallel: bool) -> Self {
        Self {
            set,
            parallel,
            ready: None,
        }
    }
}

impl ComputeBackend for InlineExecutor {
    fn kind(&self) -> BackendKind {
        BackendKind::Inline
    }

    fn submit(&mut self, job: FrameJob) -> Result<()> {
        self.ready = Some(process_job(&mut self.set, job, self.parallel));
        Ok(())
    }

    fn poll(&mut self) -> Option<ProcessedFrame> {
        self.ready.take()
    }

    fn wait(&mut self, _timeout: Duration) -> Option<ProcessedFrame> {
        self.ready.take()
    }

    fn set_enabled(&mut self, kind: TransformKind, enabled: bool) -> bool {
        self.set.set_enabled(kind, enabled)
    }

    fn active_kinds(&self) -> Vec<TransformKind> {
        self.set.active_kinds()
    }

    fn reset(&mut self) {
        self.set.reset_state();
        self.ready = None;
    }
}

enum Command {
    Process(FrameJob),
    SetEnabled(TransformKind, bool),
    Reset,
    Shutdown,
}

/// Runs transforms on a dedicated thread that owns the transform set.
pub struct WorkerExecutor {
    commands: Sender<Command>,
    results: Receiver<ProcessedFrame>,
    handle: Option<JoinHandle<()>>,
    /// Mirror of the worker's enabled flags.
    mirror: TransformSet,
}

impl WorkerExecutor {
    /// Move `set` onto a new worker thread.
    pub fn spawn(set: TransformSet, parallel: bool) -> Result<Self> {
        let (cmd_tx, cmd_rx) = unbounded::<Command>();
        let (res_tx, res_rx) = unbounded::<ProcessedFrame>();
        let mirror = set.clone();

        let handle = thread::Builder::new()
            .name("motionscope-worker".into())
            .spawn(move || worker_loop(set, parallel, cmd_rx, res_tx))
            .map_err(|e| MotionScopeError::BackendUnavailable(format!("worker thread: {e}")))?;

        info!(transforms = mirror.len(), "worker executor started");
        Ok(Self {
            commands: cmd_tx,
            results: res_rx,
            handle: Some(handle),
            mirror,
        })
    }

    /// Whether the worker thread is still running.
    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| MotionScopeError::BackendUnavailable("worker thread has exited".into()))
    }
}

fn worker_loop(
    mut set: TransformSet,
    parallel: bool,
    commands: Receiver<Command>,
    results: Sender<ProcessedFrame>,
) {
    for command in commands.iter() {
        match command {
            Command::Process(job) => {
                let index = job.index;
                let processed = process_job(&mut set, job, parallel);
                if results.send(processed).is_err() {
                    debug!(frame = index, "result receiver gone, worker stopping");
                    break;
                }
            }
            Command::SetEnabled(kind, enabled) => {
                set.set_enabled(kind, enabled);
            }
            Command::Reset => set.reset_state(),
            Command::Shutdown => break,
        }
    }
    debug!("worker executor stopped");
}

impl ComputeBackend for WorkerExecutor {
    fn kind(&self) -> BackendKind {
        BackendKind::Worker
    }

    fn submit(&mut self, job: FrameJob) -> Result<()> {
        self.send(Command::Process(job))
    }

    fn poll(&mut self) -> Option<ProcessedFrame> {
        match self.results.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                error!("worker result channel disconnected");
                None
            }
        }
    }

    fn wait(&mut self, timeout: Duration) -> Option<ProcessedFrame> {
        match self.results.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => {
                warn!(?timeout, "timed out waiting for worker result");
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!("worker result channel disconnected");
                None
            }
        }
    }

    fn set_enabled(&mut self, kind: TransformKind, enabled: bool) -> bool {
        if !self.mirror.set_enabled(kind, enabled) {
            return false;
        }
        if let Err(e) = self.send(Command::SetEnabled(kind, enabled)) {
            warn!(error = %e, transform = kind.name(), "could not toggle transform on worker");
        }
        true
    }

    fn active_kinds(&self) -> Vec<TransformKind> {
        self.mirror.active_kinds()
    }

    fn reset(&mut self) {
        if let Err(e) = self.send(Command::Reset) {
            warn!(error = %e, "could not reset worker state");
        }
    }
}

impl Drop for WorkerExecutor {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
    }
}

/// Build the requested backend, falling back to inline if the worker cannot start.
pub fn build_backend(
    kind: BackendKind,
    set: TransformSet,
    parallel: bool,
) -> Box<dyn ComputeBackend> {
    match kind {
        BackendKind::Inline => Box::new(InlineExecutor::new(set, parallel)),
        BackendKind::Worker => {
            let fallback = set.clone();
            match WorkerExecutor::spawn(set, parallel) {
                Ok(worker) => Box::new(worker),
                Err(e) => {
                    warn!(error = %e, "worker unavailable, falling back to inline execution");
                    Box::new(InlineExecutor::new(fallback, parallel))
                }
            }
        }
    }
}
