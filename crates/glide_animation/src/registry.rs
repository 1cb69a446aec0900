//! Label-based mutual exclusion between engines
//!
//! Engines constructed with the same label and the same registry never run
//! at the same time. The registry is an ordinary value: whoever builds the
//! engines owns it and hands out clones.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

/// Shared label-to-running map
#[derive(Clone, Debug, Default)]
pub struct LabelRegistry {
    slots: Arc<Mutex<FxHashMap<String, Arc<AtomicBool>>>>,
}

impl LabelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the slot for `label`.
    pub fn slot(&self, label: &str) -> LabelSlot {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        let flag = slots
            .entry(label.to_string())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone();
        LabelSlot {
            label: label.to_string(),
            flag,
        }
    }

    /// Whether some engine currently holds `label`.
    pub fn is_active(&self, label: &str) -> bool {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots
            .get(label)
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle to one label's running flag
#[derive(Clone, Debug)]
pub struct LabelSlot {
    label: String,
    flag: Arc<AtomicBool>,
}

impl LabelSlot {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Claim the label. Returns false if another holder is active.
    pub fn try_acquire(&self) -> bool {
        self.flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_share_state_per_label() {
        let registry = LabelRegistry::new();
        let a = registry.slot("fade");
        let b = registry.slot("fade");
        let other = registry.slot("slide");
        assert_eq!(registry.len(), 2);

        assert!(a.try_acquire());
        assert!(!b.try_acquire());
        assert!(other.try_acquire());
        assert!(registry.is_active("fade"));

        a.release();
        assert!(!registry.is_active("fade"));
        assert!(b.try_acquire());
    }

    #[test]
    fn test_unknown_label_is_inactive() {
        let registry = LabelRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.is_active("missing"));
    }

    #[test]
    fn test_contended_acquire_has_single_winner() {
        let registry = LabelRegistry::new();
        let winners: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let slot = registry.slot("race");
                    scope.spawn(move || slot.try_acquire() as usize)
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(winners, 1);
    }
}
