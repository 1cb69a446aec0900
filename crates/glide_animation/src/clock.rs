//! Monotonic time sources

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic millisecond clock read once per tick.
///
/// Readings must never go backward during a run.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> f64;
}

/// Clock backed by `tokio::time::Instant`.
///
/// Follows tokio's paused test time, so runs driven under
/// `#[tokio::test(start_paused = true)]` are deterministic.
#[derive(Clone, Copy, Debug)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Manually advanced clock shared between clones
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ms(&self, ms: f64) {
        self.micros
            .store((ms.max(0.0) * 1000.0).round() as u64, Ordering::Release);
    }

    pub fn advance_ms(&self, ms: f64) {
        let delta = (ms.max(0.0) * 1000.0).round() as u64;
        self.micros.fetch_add(delta, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.micros.load(Ordering::Acquire) as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_shared() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance_ms(12.5);
        assert_eq!(clock.now_ms(), 12.5);
        handle.set_ms(100.0);
        assert_eq!(clock.now_ms(), 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let clock = TokioClock::new();
        tokio::time::advance(std::time::Duration::from_millis(250)).await;
        assert!((clock.now_ms() - 250.0).abs() < 1e-6);
    }
}
