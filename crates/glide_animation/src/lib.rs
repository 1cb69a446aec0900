//! Glide Animation Engine
//!
//! Time-driven interpolation of numeric properties.
//!
//! # Features
//!
//! - **Curves**: easing library plus any `Fn(f32) -> f32`
//! - **Playback modes**: forward, reverse, forward-reverse and two looping modes
//! - **Stop semantics**: immediate, finish the leg, or backtrack to its start
//! - **Exclusion**: engines sharing a label never play at the same time
//!
//! # Example
//!
//! ```rust,no_run
//! use glide_animation::{Easing, PlayMode, PlaybackEngine};
//!
//! # async fn demo() -> glide_animation::Result<()> {
//! let engine = PlaybackEngine::new(0.5, 60.0)?;
//! engine.add_property(Easing::EaseOutCubic, 0.0, 1.0, |opacity| {
//!     println!("opacity = {opacity}");
//! })?;
//! engine.play_with(PlayMode::ForwardReverse, || println!("done"))?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod curve;
pub mod easing;
pub mod engine;
pub mod error;
pub mod playhead;
pub mod property;
pub mod registry;

pub use clock::{Clock, ManualClock, TokioClock};
pub use config::EngineConfig;
pub use curve::Curve;
pub use easing::{Easing, UnknownEasing, EASING_NAMES};
pub use engine::{PlaybackEngine, PlaybackEngineBuilder, RunCallback};
pub use error::{AnimatorError, Result};
pub use playhead::{
    Boundary, PlayMode, Playhead, Sample, StopMode, StopSignal, Tick, UnknownMode,
};
pub use property::{Property, PropertyId, PropertySet, Sink};
pub use registry::{LabelRegistry, LabelSlot};
