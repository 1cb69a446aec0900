//! Playback engine
//!
//! Drives a [`PropertySet`] with a [`Playhead`] on a fixed-period tokio
//! interval. One run is active at a time; starting another invalidates the
//! first before the new tick loop is spawned, and `play` returns only once
//! the old loop has gone quiet.
//!
//! Each tick evaluates and applies every property while holding the property
//! lock, so sink calls for one tick are ordered and never interleave with
//! another tick. Cancellation aborts the task, bumps the run generation and
//! then waits for any in-flight tick to release the lock. Once `play` or
//! `stop(StopMode::Immediate)` returns, sinks of the cancelled run stay
//! silent.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use smallvec::SmallVec;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::clock::{Clock, TokioClock};
use crate::config::EngineConfig;
use crate::curve::Curve;
use crate::error::{AnimatorError, Result};
use crate::playhead::{Boundary, PlayMode, Playhead, StopMode, StopSignal};
use crate::property::{PropertyId, PropertySet};
use crate::registry::{LabelRegistry, LabelSlot};

/// Invoked at reported leg boundaries and when a run completes.
pub type RunCallback = Arc<dyn Fn() + Send + Sync>;

thread_local! {
    /// Engines whose tick body is running on this thread.
    static TICKING: RefCell<SmallVec<[usize; 4]>> = RefCell::new(SmallVec::new());
}

/// Marks the current thread as inside an engine's tick body.
struct TickScope(usize);

impl TickScope {
    fn enter(engine: usize) -> Self {
        TICKING.with(|ticking| ticking.borrow_mut().push(engine));
        Self(engine)
    }

    fn contains(engine: usize) -> bool {
        TICKING.with(|ticking| ticking.borrow().contains(&engine))
    }
}

impl Drop for TickScope {
    fn drop(&mut self) {
        TICKING.with(|ticking| {
            let mut ticking = ticking.borrow_mut();
            if let Some(pos) = ticking.iter().rposition(|&e| e == self.0) {
                ticking.remove(pos);
            }
        });
    }
}

struct ActiveRun {
    generation: u64,
    task: JoinHandle<()>,
}

struct Shared {
    duration_ms: f64,
    period: Duration,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    label: Option<LabelSlot>,
    properties: Mutex<PropertySet>,
    property_count: AtomicUsize,
    stop: StopSignal,
    generation: AtomicU64,
    playing: AtomicBool,
    active: Mutex<Option<ActiveRun>>,
}

impl Shared {
    fn id(&self) -> usize {
        self as *const Self as usize
    }

    fn lock_properties(&self) -> MutexGuard<'_, PropertySet> {
        self.properties.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        self.active.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    fn label(&self) -> Option<&str> {
        self.label.as_ref().map(LabelSlot::label)
    }

    /// Cancel the active run without invoking its callback.
    fn cancel(&self) -> bool {
        let previous = {
            let mut active = self.lock_active();
            let previous = active.take();
            if previous.is_some() {
                self.generation.fetch_add(1, Ordering::AcqRel);
                self.release();
            }
            previous
        };
        // A run that completed just before this call may still be inside
        // its callback.
        self.settle(previous)
    }

    /// Abort a superseded run and wait out any tick still applying values
    /// on another thread.
    fn settle(&self, previous: Option<ActiveRun>) -> bool {
        if let Some(run) = &previous {
            run.task.abort();
        }
        if !TickScope::contains(self.id()) {
            drop(self.lock_properties());
        }
        match previous {
            Some(run) => {
                debug!(label = self.label(), generation = run.generation, "run cancelled");
                true
            }
            None => false,
        }
    }

    /// Clear the active slot if it still belongs to `generation`.
    fn retire(&self, generation: u64) -> bool {
        let mut active = self.lock_active();
        match active.as_ref() {
            Some(run) if run.generation == generation => {
                active.take();
                self.release();
                true
            }
            _ => false,
        }
    }

    fn release(&self) {
        self.playing.store(false, Ordering::Release);
        if let Some(slot) = &self.label {
            slot.release();
        }
    }

    /// Evaluate one tick. Returns false once the run is over.
    fn step(
        &self,
        playhead: &mut Playhead,
        generation: u64,
        callback: Option<&RunCallback>,
    ) -> bool {
        let mut properties = self.lock_properties();
        if !self.is_current(generation) {
            return false;
        }
        let _scope = TickScope::enter(self.id());

        let tick = playhead.tick(self.clock.now_ms(), &self.stop);
        trace!(normalized = tick.normalized, sample = ?tick.sample, "tick");

        for property in properties.iter_mut() {
            if !self.is_current(generation) {
                return false;
            }
            property.apply(tick.sample);
        }

        match tick.boundary {
            Boundary::None => true,
            Boundary::Continue { notify } => {
                debug!(
                    label = self.label(),
                    legs = playhead.legs_completed(),
                    forward = playhead.is_forward(),
                    "leg boundary"
                );
                if notify && self.is_current(generation) {
                    if let Some(callback) = callback {
                        callback();
                    }
                }
                true
            }
            Boundary::Finished => {
                if self.retire(generation) {
                    info!(
                        label = self.label(),
                        mode = ?playhead.mode(),
                        legs = playhead.legs_completed(),
                        "run complete"
                    );
                    if let Some(callback) = callback {
                        callback();
                    }
                }
                false
            }
        }
    }
}

async fn run_loop(
    shared: Arc<Shared>,
    mut playhead: Playhead,
    generation: u64,
    callback: Option<RunCallback>,
) {
    let mut ticker = time::interval_at(time::Instant::now() + shared.period, shared.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !shared.step(&mut playhead, generation, callback.as_ref()) {
            return;
        }
    }
}

/// Plays a set of curve-shaped properties over a fixed duration.
///
/// Cloning yields another handle to the same engine. A run keeps the engine
/// alive until it completes or is stopped.
#[derive(Clone)]
pub struct PlaybackEngine {
    shared: Arc<Shared>,
}

impl PlaybackEngine {
    /// Engine on the current tokio runtime with no label.
    pub fn new(duration_secs: f64, frequency_hz: f64) -> Result<Self> {
        Self::builder(duration_secs, frequency_hz).build()
    }

    pub fn builder(duration_secs: f64, frequency_hz: f64) -> PlaybackEngineBuilder {
        PlaybackEngineBuilder::new(EngineConfig::new(duration_secs, frequency_hz))
    }

    /// Build from config. A configured label is resolved in `registry`.
    pub fn from_config(config: &EngineConfig, registry: &LabelRegistry) -> Result<Self> {
        let mut builder = PlaybackEngineBuilder::new(config.clone());
        if let Some(label) = &config.label {
            builder = builder.label(registry, label);
        }
        builder.build()
    }

    /// Register a property. Rejected while a run is active.
    pub fn add_property<C, S>(&self, curve: C, start: f32, end: f32, sink: S) -> Result<PropertyId>
    where
        C: Curve + 'static,
        S: FnMut(f32) + Send + 'static,
    {
        // A completion callback runs inside the tick body with the set locked.
        if self.is_playing() || TickScope::contains(self.shared.id()) {
            return Err(AnimatorError::AlreadyPlaying);
        }
        let mut properties = self.shared.lock_properties();
        if self.is_playing() {
            return Err(AnimatorError::AlreadyPlaying);
        }
        let id = properties.add(curve, start, end, sink);
        self.shared.property_count.fetch_add(1, Ordering::AcqRel);
        Ok(id)
    }

    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Acquire)
    }

    /// Start a run without a callback. See [`play_with`](Self::play_with).
    pub fn play(&self, mode: PlayMode) -> Result<bool> {
        self.start(mode, None)
    }

    /// Start a run, replacing any active one.
    ///
    /// `callback` fires at looping boundaries and once when the run
    /// completes; it never fires for a cancelled run. Returns `Ok(false)` if
    /// another engine holds this engine's label.
    pub fn play_with<F>(&self, mode: PlayMode, callback: F) -> Result<bool>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.start(mode, Some(Arc::new(callback)))
    }

    fn start(&self, mode: PlayMode, callback: Option<RunCallback>) -> Result<bool> {
        let shared = &self.shared;
        if shared.property_count.load(Ordering::Acquire) == 0 {
            return Err(AnimatorError::EmptyAnimator);
        }

        // The label is held exactly while `active` is occupied, and both
        // change under the `active` lock. A run being replaced hands its
        // label straight to the new one.
        let previous = {
            let mut active = shared.lock_active();
            let previous = active.take();

            if previous.is_none() {
                if let Some(slot) = &shared.label {
                    if !slot.try_acquire() {
                        debug!(label = slot.label(), "label held by another engine");
                        return Ok(false);
                    }
                }
            }

            shared.stop.clear();
            let generation = shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
            let playhead = Playhead::new(mode, shared.duration_ms, shared.clock.now_ms());
            shared.playing.store(true, Ordering::Release);

            let task = shared.runtime.spawn(run_loop(
                Arc::clone(shared),
                playhead,
                generation,
                callback,
            ));
            *active = Some(ActiveRun { generation, task });

            debug!(label = shared.label(), ?mode, generation, "run started");
            previous
        };

        if shared.settle(previous) {
            debug!(label = shared.label(), "replaced active run");
        }
        Ok(true)
    }

    /// Request the active run to stop.
    ///
    /// `Immediate` cancels the tick loop before returning and skips the
    /// callback. The other modes are honoured at the next tick.
    pub fn stop(&self, mode: StopMode) {
        match mode {
            StopMode::Immediate => {
                if !self.shared.cancel() {
                    trace!("immediate stop with no active run");
                }
            }
            StopMode::FinishCycle | StopMode::FinishCycleReverse => {
                if !self.is_playing() {
                    trace!(?mode, "stop ignored, not playing");
                    return;
                }
                self.shared.stop.request(mode);
                debug!(label = self.shared.label(), ?mode, "stop requested");
            }
        }
    }

    /// Stop request not yet consumed by the tick loop.
    pub fn pending_stop(&self) -> Option<StopMode> {
        self.shared.stop.pending()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.shared.duration_ms / 1000.0)
    }

    pub fn tick_period(&self) -> Duration {
        self.shared.period
    }

    pub fn label(&self) -> Option<&str> {
        self.shared.label()
    }

    pub fn property_count(&self) -> usize {
        self.shared.property_count.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("duration_ms", &self.shared.duration_ms)
            .field("period", &self.shared.period)
            .field("label", &self.label())
            .field("properties", &self.property_count())
            .field("playing", &self.is_playing())
            .finish()
    }
}

/// Builder for [`PlaybackEngine`]
pub struct PlaybackEngineBuilder {
    config: EngineConfig,
    registry: Option<LabelRegistry>,
    clock: Option<Arc<dyn Clock>>,
    runtime: Option<Handle>,
}

impl PlaybackEngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            registry: None,
            clock: None,
            runtime: None,
        }
    }

    /// Share exclusion with every engine using `label` in `registry`.
    pub fn label(mut self, registry: &LabelRegistry, label: impl Into<String>) -> Self {
        self.config.label = Some(label.into());
        self.registry = Some(registry.clone());
        self
    }

    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Runtime that hosts the tick loop. Defaults to the current one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<PlaybackEngine> {
        self.config.validate()?;
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| AnimatorError::NoRuntime)?,
        };
        let registry = self.registry.unwrap_or_default();
        let label = self.config.label.as_deref().map(|l| registry.slot(l));
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(TokioClock::new()) as Arc<dyn Clock>);

        Ok(PlaybackEngine {
            shared: Arc::new(Shared {
                duration_ms: self.config.duration_ms(),
                period: self.config.tick_period(),
                clock,
                runtime,
                label,
                properties: Mutex::new(PropertySet::new()),
                property_count: AtomicUsize::new(0),
                stop: StopSignal::new(),
                generation: AtomicU64::new(0),
                playing: AtomicBool::new(false),
                active: Mutex::new(None),
            }),
        })
    }
}
