//! Queue & worker core shared by the four codec pipelines
//!
//! Each pipeline owns a bounded submission queue and a dedicated worker
//! thread that drives its codec engine. Host methods stay non-blocking:
//! they enqueue generation-tagged commands over a crossbeam channel and
//! return. The worker pushes inputs into the engine, drains outputs, and
//! invokes the pipeline's output/error callbacks - never re-entrantly
//! from inside a host-called method.
//!
//! Cancellation is serialized through a generation counter guarded by the
//! queue mutex: `reset`/`configure` bump the generation, zero the size and
//! reject pending flush futures before the engine sees anything, and the
//! worker re-checks the generation immediately before every callback, so
//! a user-initiated abort never surfaces an error callback.

use crate::codec::{CodecEngine, Configured, PushError};
use crate::webcodecs::error::{abort_error, encoding_error, Result, WebCodecsError};
use crossbeam::channel::{unbounded, Receiver, Sender};
use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Codec pipeline state (WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecState {
  /// Pipeline not configured
  #[default]
  Unconfigured,
  /// Pipeline configured and accepting input
  Configured,
  /// Pipeline closed
  Closed,
}

impl CodecState {
  pub fn as_str(&self) -> &'static str {
    match self {
      CodecState::Unconfigured => "unconfigured",
      CodecState::Configured => "configured",
      CodecState::Closed => "closed",
    }
  }
}

impl std::fmt::Display for CodecState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Handle returned by `add_event_listener` for later removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventListenerId(u64);

/// Submission queue watermarks
#[derive(Debug, Clone, Copy)]
pub(crate) struct QueueLimits {
  /// Below this size, downward transitions post a dequeue event
  pub target: u32,
  /// Hard cap; enqueue beyond it fails with QuotaExceededError
  pub max: u32,
}

impl Default for QueueLimits {
  fn default() -> Self {
    Self {
      target: 32,
      max: 64,
    }
  }
}

/// Callbacks a pipeline installs on its worker.
///
/// All methods run on the worker thread; the hooks own the pipeline's
/// output/error callbacks and any per-stream shaping state (chunk
/// counters, pending decoder configs), which therefore needs no locking.
pub(crate) trait WorkerHooks<E: CodecEngine>: Send + 'static {
  /// A configure command was applied successfully
  fn on_configured(&mut self, config: &E::Config, configured: &Configured);

  /// Inspect an input before it reaches the engine. Returning Err drops
  /// the input and reports the error instead.
  fn filter_input(&mut self, item: E::Input) -> Result<E::Input> {
    Ok(item)
  }

  /// An output is ready for delivery to the host
  fn on_output(&mut self, output: E::Output);

  /// An engine-origin failure to deliver through the error callback
  fn on_error(&mut self, error: WebCodecsError);
}

type EventCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct DequeueListeners {
  ondequeue: Option<EventCallback>,
  entries: Vec<(u64, String, EventCallback)>,
  next_id: u64,
}

struct SharedState {
  size: u32,
  generation: u64,
  next_flush_id: u64,
  pending_flushes: HashMap<u64, oneshot::Sender<Result<()>>>,
}

struct QueueShared {
  state: Mutex<SharedState>,
  limits: QueueLimits,
  listeners: Mutex<DequeueListeners>,
}

impl QueueShared {
  fn is_stale(&self, generation: u64) -> bool {
    self.state.lock().generation != generation
  }

  /// Account for one input leaving the queue; post a dequeue event on a
  /// downward transition below the target watermark.
  fn finish_input(&self, generation: u64) {
    let fire = {
      let mut state = self.state.lock();
      if state.generation != generation || state.size == 0 {
        return;
      }
      state.size -= 1;
      state.size < self.limits.target
    };
    if fire {
      self.fire_event("dequeue");
    }
  }

  fn fire_event(&self, event_type: &str) {
    let callbacks: Vec<EventCallback> = {
      let listeners = self.listeners.lock();
      listeners
        .ondequeue
        .iter()
        .filter(|_| event_type == "dequeue")
        .cloned()
        .chain(
          listeners
            .entries
            .iter()
            .filter(|(_, ty, _)| ty == event_type)
            .map(|(_, _, cb)| cb.clone()),
        )
        .collect()
    };
    for callback in callbacks {
      callback();
    }
  }

  fn resolve_flush(&self, id: u64, result: Result<()>) {
    let sender = self.state.lock().pending_flushes.remove(&id);
    if let Some(sender) = sender {
      let _ = sender.send(result);
    }
  }
}

enum Command<E: CodecEngine> {
  Configure { config: E::Config, generation: u64 },
  Input { item: E::Input, generation: u64 },
  Flush { id: u64, generation: u64 },
  Close,
}

/// Bounded FIFO submission queue plus the worker thread driving an engine
pub(crate) struct CodecQueue<E: CodecEngine> {
  tx: Sender<Command<E>>,
  shared: Arc<QueueShared>,
}

impl<E: CodecEngine> CodecQueue<E> {
  pub fn new(engine: E, hooks: impl WorkerHooks<E>, limits: QueueLimits) -> Self {
    let shared = Arc::new(QueueShared {
      state: Mutex::new(SharedState {
        size: 0,
        generation: 0,
        next_flush_id: 0,
        pending_flushes: HashMap::new(),
      }),
      limits,
      listeners: Mutex::new(DequeueListeners::default()),
    });

    let (tx, rx) = unbounded();
    let worker_shared = shared.clone();
    std::thread::Builder::new()
      .name("webcodec-worker".to_string())
      .spawn(move || worker_loop(engine, hooks, rx, worker_shared))
      .expect("failed to spawn codec worker thread");

    Self { tx, shared }
  }

  /// Number of submitted inputs not yet handed to the engine
  pub fn size(&self) -> u32 {
    self.shared.state.lock().size
  }

  /// Reserve a queue slot, build the input under the reservation, and
  /// submit it. `make` typically detaches the submitted media object;
  /// running it under the queue mutex keeps the capacity check and the
  /// detach atomic.
  pub fn enqueue_with(&self, make: impl FnOnce() -> Result<E::Input>) -> Result<()> {
    let (item, generation) = {
      let mut state = self.shared.state.lock();
      if state.size >= self.shared.limits.max {
        return Err(crate::webcodecs::error::quota_exceeded_error(
          state.size,
          self.shared.limits.max,
        ));
      }
      let item = make()?;
      state.size += 1;
      (item, state.generation)
    };
    let _ = self.tx.send(Command::Input { item, generation });
    Ok(())
  }

  /// Apply a new configuration. Resets the queue: queued inputs are
  /// discarded and pending flushes reject with AbortError.
  pub fn configure(&self, config: E::Config) {
    let (generation, aborted) = self.bump_generation();
    for sender in aborted {
      let _ = sender.send(Err(abort_error("flush aborted by configure")));
    }
    let _ = self.tx.send(Command::Configure { config, generation });
  }

  /// Register a flush and return the future's receiving half. Resolves
  /// once the engine has drained; rejects with AbortError if a reset,
  /// configure or close lands first.
  pub fn begin_flush(&self) -> oneshot::Receiver<Result<()>> {
    let (sender, receiver) = oneshot::channel();
    let (id, generation) = {
      let mut state = self.shared.state.lock();
      let id = state.next_flush_id;
      state.next_flush_id += 1;
      state.pending_flushes.insert(id, sender);
      (id, state.generation)
    };
    let _ = self.tx.send(Command::Flush { id, generation });
    receiver
  }

  /// Discard queued inputs and reject pending flushes with AbortError.
  /// The error callback is never invoked for this.
  pub fn cancel(&self) {
    let (_, aborted) = self.bump_generation();
    for sender in aborted {
      let _ = sender.send(Err(abort_error("flush aborted by reset")));
    }
  }

  /// Cancel all pending work and shut the worker down
  pub fn close(&self) {
    self.cancel();
    let _ = self.tx.send(Command::Close);
  }

  fn bump_generation(&self) -> (u64, Vec<oneshot::Sender<Result<()>>>) {
    let mut state = self.shared.state.lock();
    state.generation += 1;
    state.size = 0;
    let aborted = state.pending_flushes.drain().map(|(_, s)| s).collect();
    (state.generation, aborted)
  }

  // ======================================================================
  // dequeue event surface
  // ======================================================================

  pub fn set_ondequeue(&self, callback: Option<EventCallback>) {
    self.shared.listeners.lock().ondequeue = callback;
  }

  pub fn add_event_listener(
    &self,
    event_type: &str,
    callback: impl Fn() + Send + Sync + 'static,
  ) -> EventListenerId {
    let mut listeners = self.shared.listeners.lock();
    let id = listeners.next_id;
    listeners.next_id += 1;
    listeners
      .entries
      .push((id, event_type.to_string(), Arc::new(callback)));
    EventListenerId(id)
  }

  pub fn remove_event_listener(&self, id: EventListenerId) {
    self
      .shared
      .listeners
      .lock()
      .entries
      .retain(|(entry_id, _, _)| *entry_id != id.0);
  }

  pub fn dispatch_event(&self, event_type: &str) {
    self.shared.fire_event(event_type);
  }
}

impl<E: CodecEngine> Drop for CodecQueue<E> {
  fn drop(&mut self) {
    self.close();
  }
}

fn worker_loop<E: CodecEngine>(
  mut engine: E,
  mut hooks: impl WorkerHooks<E>,
  rx: Receiver<Command<E>>,
  shared: Arc<QueueShared>,
) {
  while let Ok(command) = rx.recv() {
    match command {
      Command::Configure { config, generation } => {
        if shared.is_stale(generation) {
          continue;
        }
        trace!("worker: applying configure");
        engine.reset();
        match engine.configure(&config) {
          Ok(configured) => hooks.on_configured(&config, &configured),
          Err(error) => {
            if !shared.is_stale(generation) {
              hooks.on_error(error.into());
            }
          }
        }
      }
      Command::Input { item, generation } => {
        if shared.is_stale(generation) {
          continue;
        }
        match hooks.filter_input(item) {
          Ok(item) => push_and_drain(&mut engine, &mut hooks, &shared, generation, item),
          Err(error) => {
            if !shared.is_stale(generation) {
              hooks.on_error(error);
            }
          }
        }
        shared.finish_input(generation);
      }
      Command::Flush { id, generation } => {
        if shared.is_stale(generation) {
          continue;
        }
        debug!("worker: flushing engine");
        match engine.flush() {
          Ok(()) => {
            drain_outputs(&mut engine, &mut hooks, &shared, generation);
            shared.resolve_flush(id, Ok(()));
          }
          Err(error) => {
            let error: WebCodecsError = error.into();
            if !shared.is_stale(generation) {
              hooks.on_error(error.clone());
            }
            shared.resolve_flush(id, Err(error));
          }
        }
      }
      Command::Close => {
        debug!("worker: closing");
        break;
      }
    }
  }
}

fn push_and_drain<E: CodecEngine>(
  engine: &mut E,
  hooks: &mut impl WorkerHooks<E>,
  shared: &QueueShared,
  generation: u64,
  item: E::Input,
) {
  let mut item = item;
  loop {
    match engine.push_input(item) {
      Ok(()) => break,
      Err(PushError::Saturated(returned)) => {
        item = returned;
        if !drain_outputs(engine, hooks, shared, generation) {
          // Saturated with nothing retrievable: the engine is wedged
          if !shared.is_stale(generation) {
            hooks.on_error(encoding_error("engine saturated without retrievable output"));
          }
          return;
        }
      }
      Err(PushError::Fatal(error)) => {
        if !shared.is_stale(generation) {
          hooks.on_error(error.into());
        }
        return;
      }
    }
  }
  drain_outputs(engine, hooks, shared, generation);
}

/// Pull every ready output and deliver it; returns whether any was pulled
fn drain_outputs<E: CodecEngine>(
  engine: &mut E,
  hooks: &mut impl WorkerHooks<E>,
  shared: &QueueShared,
  generation: u64,
) -> bool {
  let mut any = false;
  while let Some(output) = engine.pull_output() {
    any = true;
    if !shared.is_stale(generation) {
      hooks.on_output(output);
    }
  }
  any
}
