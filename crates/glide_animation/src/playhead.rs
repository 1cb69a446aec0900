//! Playhead state machine
//!
//! Tracks normalized time, direction and loop state for a single run. The
//! playhead is clock-agnostic: callers feed it monotonic millisecond readings
//! and it reports what to sample and whether the leg boundary ended the run.
//!
//! A run is a sequence of legs. Each leg sweeps normalized time from 0 to 1
//! over the configured duration, either forward (`t`) or backward (`1 - t`).
//! When normalized time passes 1 the leg is over: every property receives its
//! exact terminal value and the mode decides whether another leg follows.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// How a run sequences its legs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayMode {
    /// One forward leg.
    #[default]
    Forward,
    /// One backward leg.
    Reverse,
    /// A forward leg followed by one backward leg.
    ForwardReverse,
    /// Forward legs until stopped.
    LoopForward,
    /// Alternating forward and backward legs until stopped.
    LoopForwardReverse,
}

impl PlayMode {
    pub fn starts_forward(self) -> bool {
        !matches!(self, PlayMode::Reverse)
    }

    pub fn is_looping(self) -> bool {
        matches!(self, PlayMode::LoopForward | PlayMode::LoopForwardReverse)
    }
}

/// How a stop request ends the run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopMode {
    /// Cancel the tick loop now; no completion callback.
    Immediate,
    /// Let the current leg reach its end, then stop.
    FinishCycle,
    /// Turn around and play back to the leg's start, then stop.
    FinishCycleReverse,
}

impl PlayMode {
    pub const ALL: [PlayMode; 5] = [
        PlayMode::Forward,
        PlayMode::Reverse,
        PlayMode::ForwardReverse,
        PlayMode::LoopForward,
        PlayMode::LoopForwardReverse,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PlayMode::Forward => "forward",
            PlayMode::Reverse => "reverse",
            PlayMode::ForwardReverse => "forward-reverse",
            PlayMode::LoopForward => "loop-forward",
            PlayMode::LoopForwardReverse => "loop-forward-reverse",
        }
    }
}

impl StopMode {
    pub const ALL: [StopMode; 3] = [
        StopMode::Immediate,
        StopMode::FinishCycle,
        StopMode::FinishCycleReverse,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StopMode::Immediate => "immediate",
            StopMode::FinishCycle => "finish-cycle",
            StopMode::FinishCycleReverse => "finish-cycle-reverse",
        }
    }
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for StopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a mode name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mode `{0}`")]
pub struct UnknownMode(pub String);

impl FromStr for PlayMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlayMode::ALL
            .into_iter()
            .find(|mode| mode.name() == s.trim())
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

impl FromStr for StopMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StopMode::ALL
            .into_iter()
            .find(|mode| mode.name() == s.trim())
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

const STOP_NONE: u8 = 0;
const STOP_FINISH_CYCLE: u8 = 1;
const STOP_FINISH_CYCLE_REVERSE: u8 = 2;

/// Deferred stop request shared between the tick loop and its controllers.
///
/// Only the modes honoured at a tick are stored. `Immediate` is carried out
/// by cancelling the run, so the tick loop never observes it.
#[derive(Debug, Default)]
pub struct StopSignal(AtomicU8);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a deferred stop. `Immediate` is ignored.
    pub fn request(&self, mode: StopMode) {
        let raw = match mode {
            StopMode::Immediate => return,
            StopMode::FinishCycle => STOP_FINISH_CYCLE,
            StopMode::FinishCycleReverse => STOP_FINISH_CYCLE_REVERSE,
        };
        self.0.store(raw, Ordering::Release);
    }

    pub fn pending(&self) -> Option<StopMode> {
        match self.0.load(Ordering::Acquire) {
            STOP_FINISH_CYCLE => Some(StopMode::FinishCycle),
            STOP_FINISH_CYCLE_REVERSE => Some(StopMode::FinishCycleReverse),
            _ => None,
        }
    }

    pub fn clear(&self) {
        self.0.store(STOP_NONE, Ordering::Release);
    }

    /// Consume a pending backtrack request.
    fn take_reverse(&self) -> bool {
        self.0
            .compare_exchange(
                STOP_FINISH_CYCLE_REVERSE,
                STOP_NONE,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// Where properties should be sampled this tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sample {
    /// Curve time inside `[0, 1]`.
    At(f32),
    /// The leg is over; use the exact endpoint for the direction it ran in.
    Terminal { forward: bool },
}

/// What happened at the end of a tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boundary {
    /// Still inside the current leg.
    None,
    /// The leg ended and another one started. `notify` marks boundaries
    /// reported to the run's callback.
    Continue { notify: bool },
    /// The run is over.
    Finished,
}

/// Result of advancing the playhead once
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tick {
    pub sample: Sample,
    pub boundary: Boundary,
    /// Unclamped normalized time of the leg at this tick.
    pub normalized: f64,
}

/// Playhead for a single run
#[derive(Clone, Debug)]
pub struct Playhead {
    mode: PlayMode,
    duration_ms: f64,
    forward: bool,
    looping: bool,
    leg_start_ms: f64,
    legs_completed: u64,
}

impl Playhead {
    /// Start a run at `now_ms`. `duration_ms` must be positive.
    pub fn new(mode: PlayMode, duration_ms: f64, now_ms: f64) -> Self {
        debug_assert!(duration_ms > 0.0);
        Self {
            mode,
            duration_ms,
            forward: mode.starts_forward(),
            looping: !matches!(mode, PlayMode::Forward | PlayMode::Reverse),
            leg_start_ms: now_ms,
            legs_completed: 0,
        }
    }

    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    pub fn is_forward(&self) -> bool {
        self.forward
    }

    /// False once a backtrack request has pinned the run to its current leg.
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn leg_start_ms(&self) -> f64 {
        self.leg_start_ms
    }

    pub fn legs_completed(&self) -> u64 {
        self.legs_completed
    }

    pub fn normalized(&self, now_ms: f64) -> f64 {
        ((now_ms - self.leg_start_ms) / self.duration_ms).max(0.0)
    }

    /// Advance to `now_ms`, consuming a pending backtrack request.
    pub fn tick(&mut self, now_ms: f64, stop: &StopSignal) -> Tick {
        if stop.take_reverse() {
            self.backtrack(now_ms);
        }

        let normalized = self.normalized(now_ms);
        if normalized > 1.0 {
            let sample = Sample::Terminal {
                forward: self.forward,
            };
            let boundary = self.end_leg(now_ms, stop.pending());
            return Tick {
                sample,
                boundary,
                normalized,
            };
        }

        let t = if self.forward {
            normalized
        } else {
            1.0 - normalized
        };
        Tick {
            sample: Sample::At(t.clamp(0.0, 1.0) as f32),
            boundary: Boundary::None,
            normalized,
        }
    }

    /// Mirror the remaining progress so a forward leg retraces its path.
    fn backtrack(&mut self, now_ms: f64) {
        self.looping = false;
        if self.forward {
            self.forward = false;
            let elapsed = (now_ms - self.leg_start_ms).clamp(0.0, self.duration_ms);
            self.leg_start_ms = now_ms - (self.duration_ms - elapsed);
        }
    }

    fn end_leg(&mut self, now_ms: f64, pending: Option<StopMode>) -> Boundary {
        self.legs_completed += 1;

        let boundary = if !self.looping {
            Boundary::Finished
        } else {
            match (self.mode, pending) {
                (PlayMode::Forward | PlayMode::Reverse, _) => Boundary::Finished,
                (PlayMode::ForwardReverse, None) if self.forward => {
                    self.forward = false;
                    Boundary::Continue { notify: false }
                }
                (PlayMode::ForwardReverse, _) => Boundary::Finished,
                (PlayMode::LoopForward, Some(StopMode::FinishCycle)) => Boundary::Finished,
                (PlayMode::LoopForward, _) => Boundary::Continue { notify: true },
                (PlayMode::LoopForwardReverse, Some(StopMode::FinishCycle)) if self.forward => {
                    Boundary::Finished
                }
                (PlayMode::LoopForwardReverse, _) => {
                    self.forward = !self.forward;
                    Boundary::Continue {
                        notify: self.forward,
                    }
                }
            }
        };

        if let Boundary::Continue { .. } = boundary {
            self.leg_start_ms = now_ms;
        }
        boundary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DURATION: f64 = 1000.0;

    fn sample_at(tick: &Tick) -> f32 {
        match tick.sample {
            Sample::At(t) => t,
            Sample::Terminal { .. } => panic!("expected in-leg sample, got {tick:?}"),
        }
    }

    /// Run ticks every `step` ms until the run finishes, returning the
    /// boundaries seen along the way.
    fn run_to_end(head: &mut Playhead, stop: &StopSignal, start: f64, step: f64) -> Vec<Boundary> {
        let mut now = start;
        let mut seen = Vec::new();
        for _ in 0..10_000 {
            now += step;
            let tick = head.tick(now, stop);
            if tick.boundary != Boundary::None {
                seen.push(tick.boundary);
            }
            if tick.boundary == Boundary::Finished {
                return seen;
            }
        }
        panic!("run never finished");
    }

    #[test]
    fn test_forward_samples_track_elapsed_time() {
        let stop = StopSignal::new();
        let mut head = Playhead::new(PlayMode::Forward, DURATION, 0.0);
        assert_eq!(sample_at(&head.tick(250.0, &stop)), 0.25);
        assert_eq!(sample_at(&head.tick(1000.0, &stop)), 1.0);

        let tick = head.tick(1100.0, &stop);
        assert_eq!(tick.sample, Sample::Terminal { forward: true });
        assert_eq!(tick.boundary, Boundary::Finished);
    }

    #[test]
    fn test_reverse_runs_backward_once() {
        let stop = StopSignal::new();
        let mut head = Playhead::new(PlayMode::Reverse, DURATION, 0.0);
        assert!(!head.is_forward());
        assert_eq!(sample_at(&head.tick(250.0, &stop)), 0.75);

        let tick = head.tick(1001.0, &stop);
        assert_eq!(tick.sample, Sample::Terminal { forward: false });
        assert_eq!(tick.boundary, Boundary::Finished);
    }

    #[test]
    fn test_forward_reverse_plays_two_legs() {
        let stop = StopSignal::new();
        let mut head = Playhead::new(PlayMode::ForwardReverse, DURATION, 0.0);

        let tick = head.tick(1050.0, &stop);
        assert_eq!(tick.sample, Sample::Terminal { forward: true });
        assert_eq!(tick.boundary, Boundary::Continue { notify: false });
        assert_eq!(head.leg_start_ms(), 1050.0);

        assert_eq!(sample_at(&head.tick(1300.0, &stop)), 0.75);

        let tick = head.tick(2100.0, &stop);
        assert_eq!(tick.sample, Sample::Terminal { forward: false });
        assert_eq!(tick.boundary, Boundary::Finished);
        assert_eq!(head.legs_completed(), 2);
    }

    #[test]
    fn test_forward_reverse_stop_during_first_leg_ends_at_end() {
        let stop = StopSignal::new();
        let mut head = Playhead::new(PlayMode::ForwardReverse, DURATION, 0.0);
        head.tick(400.0, &stop);
        stop.request(StopMode::FinishCycle);

        let tick = head.tick(1001.0, &stop);
        assert_eq!(tick.sample, Sample::Terminal { forward: true });
        assert_eq!(tick.boundary, Boundary::Finished);
    }

    #[test]
    fn test_loop_forward_until_stopped() {
        let stop = StopSignal::new();
        let mut head = Playhead::new(PlayMode::LoopForward, DURATION, 0.0);

        for leg in 1..=5 {
            let end = leg as f64 * 1001.0;
            let tick = head.tick(end, &stop);
            assert_eq!(tick.sample, Sample::Terminal { forward: true });
            assert_eq!(tick.boundary, Boundary::Continue { notify: true });
        }

        stop.request(StopMode::FinishCycle);
        assert_eq!(sample_at(&head.tick(5005.0 + 500.0, &stop)), 0.5);
        let tick = head.tick(5005.0 + 1001.0, &stop);
        assert_eq!(tick.sample, Sample::Terminal { forward: true });
        assert_eq!(tick.boundary, Boundary::Finished);
    }

    #[test]
    fn test_loop_forward_reverse_notifies_only_forward_legs() {
        let stop = StopSignal::new();
        let mut head = Playhead::new(PlayMode::LoopForwardReverse, DURATION, 0.0);

        let first = head.tick(1001.0, &stop);
        assert_eq!(first.boundary, Boundary::Continue { notify: false });
        assert!(!head.is_forward());

        let second = head.tick(2002.0, &stop);
        assert_eq!(second.sample, Sample::Terminal { forward: false });
        assert_eq!(second.boundary, Boundary::Continue { notify: true });
        assert!(head.is_forward());
    }

    #[test]
    fn test_loop_forward_reverse_stop_mid_reverse_finishes_forward() {
        let stop = StopSignal::new();
        let mut head = Playhead::new(PlayMode::LoopForwardReverse, DURATION, 0.0);
        head.tick(1001.0, &stop);
        assert!(!head.is_forward());

        head.tick(1500.0, &stop);
        stop.request(StopMode::FinishCycle);

        // The reverse leg completes and a forward leg follows.
        let reverse_end = head.tick(2002.0, &stop);
        assert_eq!(reverse_end.sample, Sample::Terminal { forward: false });
        assert_eq!(reverse_end.boundary, Boundary::Continue { notify: true });

        let boundaries = run_to_end(&mut head, &stop, 2002.0, 100.0);
        assert_eq!(boundaries, vec![Boundary::Finished]);
        assert!(head.is_forward());
        assert_eq!(head.legs_completed(), 3);
    }

    #[test]
    fn test_loop_forward_reverse_stop_mid_forward_ends_at_leg_end() {
        let stop = StopSignal::new();
        let mut head = Playhead::new(PlayMode::LoopForwardReverse, DURATION, 0.0);
        head.tick(300.0, &stop);
        stop.request(StopMode::FinishCycle);

        let tick = head.tick(1001.0, &stop);
        assert_eq!(tick.sample, Sample::Terminal { forward: true });
        assert_eq!(tick.boundary, Boundary::Finished);
    }

    #[test]
    fn test_backtrack_mirrors_progress() {
        let stop = StopSignal::new();
        let mut head = Playhead::new(PlayMode::Forward, DURATION, 0.0);
        assert_eq!(sample_at(&head.tick(300.0, &stop)), 0.3);

        stop.request(StopMode::FinishCycleReverse);
        let tick = head.tick(400.0, &stop);
        assert_eq!(stop.pending(), None);
        assert!(!head.is_forward());
        // Backtracking starts from where the leg was, not from an endpoint.
        assert!((sample_at(&tick) - 0.4).abs() < 1e-6);

        assert!((sample_at(&head.tick(700.0, &stop)) - 0.1).abs() < 1e-6);
        let tick = head.tick(801.0, &stop);
        assert_eq!(tick.sample, Sample::Terminal { forward: false });
        assert_eq!(tick.boundary, Boundary::Finished);
    }

    #[test]
    fn test_backtrack_disables_looping() {
        let stop = StopSignal::new();
        let mut head = Playhead::new(PlayMode::LoopForward, DURATION, 0.0);
        head.tick(1001.0, &stop);
        stop.request(StopMode::FinishCycleReverse);

        head.tick(1501.0, &stop);
        assert!(!head.is_looping());
        let boundaries = run_to_end(&mut head, &stop, 1501.0, 50.0);
        assert_eq!(boundaries, vec![Boundary::Finished]);
    }

    #[test]
    fn test_backtrack_during_reverse_leg_keeps_direction() {
        let stop = StopSignal::new();
        let mut head = Playhead::new(PlayMode::LoopForwardReverse, DURATION, 0.0);
        head.tick(1001.0, &stop);
        stop.request(StopMode::FinishCycleReverse);

        let tick = head.tick(1201.0, &stop);
        assert!(!head.is_forward());
        assert!((sample_at(&tick) - 0.8).abs() < 1e-6);

        let tick = head.tick(2002.0, &stop);
        assert_eq!(tick.sample, Sample::Terminal { forward: false });
        assert_eq!(tick.boundary, Boundary::Finished);
    }

    #[test]
    fn test_backtrack_after_overshoot_never_leaves_unit_range() {
        let stop = StopSignal::new();
        let mut head = Playhead::new(PlayMode::Forward, DURATION, 0.0);
        stop.request(StopMode::FinishCycleReverse);

        let tick = head.tick(1200.0, &stop);
        assert_eq!(tick.sample, Sample::At(1.0));
    }

    #[test]
    fn test_mode_names_parse() {
        for mode in PlayMode::ALL {
            assert_eq!(mode.to_string().parse::<PlayMode>(), Ok(mode));
        }
        for mode in StopMode::ALL {
            assert_eq!(mode.to_string().parse::<StopMode>(), Ok(mode));
        }
        assert_eq!(
            "ping-pong".parse::<PlayMode>(),
            Err(UnknownMode("ping-pong".to_string()))
        );
    }

    #[test]
    fn test_stop_signal_holds_deferred_modes_only() {
        let stop = StopSignal::new();
        assert_eq!(stop.pending(), None);
        for mode in [StopMode::FinishCycle, StopMode::FinishCycleReverse] {
            stop.request(mode);
            assert_eq!(stop.pending(), Some(mode));
        }

        stop.request(StopMode::Immediate);
        assert_eq!(stop.pending(), Some(StopMode::FinishCycleReverse));
        stop.clear();
        stop.request(StopMode::Immediate);
        assert_eq!(stop.pending(), None);
    }

    #[test]
    fn test_immediate_request_never_completes_a_leg() {
        let stop = StopSignal::new();
        stop.request(StopMode::Immediate);

        let mut looping = Playhead::new(PlayMode::LoopForward, DURATION, 0.0);
        let tick = looping.tick(1001.0, &stop);
        assert_eq!(tick.boundary, Boundary::Continue { notify: true });

        let mut bouncing = Playhead::new(PlayMode::LoopForwardReverse, DURATION, 0.0);
        let tick = bouncing.tick(1001.0, &stop);
        assert_eq!(tick.boundary, Boundary::Continue { notify: false });

        let mut there_and_back = Playhead::new(PlayMode::ForwardReverse, DURATION, 0.0);
        let tick = there_and_back.tick(1001.0, &stop);
        assert_eq!(tick.boundary, Boundary::Continue { notify: false });
    }
}
