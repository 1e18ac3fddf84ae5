//! Read stabilization
//!
//! A single-frame read is not trusted. Each value keeps its own run counter:
//! a read of the same value as the previous read extends that value's run,
//! any other read starts a fresh run of 1 for the value read. Counters of
//! values not read in this frame are left alone. The first value whose run
//! reaches the threshold is confirmed, once; after that every read is ignored
//! until [`Stabilizer::reset`].

use std::collections::HashMap;

/// Per-session read debouncer with a confirmation latch
#[derive(Debug, Clone)]
pub struct Stabilizer {
    threshold: u32,
    counts: HashMap<String, u32>,
    last_read: Option<String>,
    confirmed: Option<String>,
}

impl Stabilizer {
    /// Create a stabilizer; a threshold of 0 is treated as 1
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            counts: HashMap::new(),
            last_read: None,
            confirmed: None,
        }
    }

    /// Record one successful read.
    ///
    /// Returns the value exactly once, on the read that confirms it.
    pub fn observe(&mut self, value: &str) -> Option<String> {
        if self.confirmed.is_some() {
            return None;
        }

        let extends_run = self.last_read.as_deref() == Some(value);
        let count = self.counts.entry(value.to_string()).or_insert(0);
        *count = if extends_run { count.saturating_add(1) } else { 1 };
        let reached = *count >= self.threshold;
        self.last_read = Some(value.to_string());

        if reached {
            self.counts.clear();
            self.last_read = None;
            self.confirmed = Some(value.to_string());
            return self.confirmed.clone();
        }
        None
    }

    /// Current run length for a value
    #[must_use]
    pub fn count(&self, value: &str) -> u32 {
        self.counts.get(value).copied().unwrap_or(0)
    }

    /// The latched value, if any
    #[must_use]
    pub fn confirmed(&self) -> Option<&str> {
        self.confirmed.as_deref()
    }

    /// True once a value has been confirmed
    #[must_use]
    pub fn is_latched(&self) -> bool {
        self.confirmed.is_some()
    }

    /// Reads required for confirmation
    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Clear counters and the latch
    pub fn reset(&mut self) {
        self.counts.clear();
        self.last_read = None;
        self.confirmed = None;
    }
}

impl Default for Stabilizer {
    fn default() -> Self {
        Self::new(3)
    }
}
