//! Reset-compensated cumulative accounting.
//!
//! The monitored parameter is backed by a hardware counter that may
//! reset (reboot, explicit reset command) or wrap between two polls.
//! [`CumulativeState`] keeps a best-effort monotonic total across such
//! events: each poll folds the newest raw sample into a corrected
//! cumulative value.

use crate::types::SampleValue;

/// Corrected cumulative value plus the baseline captured at monitor
/// start.
///
/// Owned exclusively by one monitor task and mutated once per poll
/// cycle — never shared, never locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CumulativeState {
    corrected: SampleValue,
    baseline: SampleValue,
}

impl CumulativeState {
    /// Start accounting from the given baseline sample.
    pub fn new(baseline: SampleValue) -> Self {
        Self {
            corrected: 0,
            baseline,
        }
    }

    /// The corrected cumulative value as of the last poll.
    pub fn corrected(&self) -> SampleValue {
        self.corrected
    }

    /// The baseline sample captured at monitor start.
    pub fn baseline(&self) -> SampleValue {
        self.baseline
    }

    /// Fold one raw sample into the corrected cumulative value and
    /// return the new total.
    ///
    /// The delta since the baseline (floored at 0) is compared against
    /// the previous total. A delta that went *backwards* means the
    /// underlying counter reset or wrapped since the last poll, so the
    /// new delta is added on top of what was already accounted;
    /// otherwise the delta simply replaces the total. Additions clamp
    /// at `u64::MAX`, so the total is monotonically non-decreasing up
    /// to saturation.
    ///
    /// Known limitation: this assumes at most one counter reset between
    /// consecutive polls, and that a reset always lands on a delta
    /// smaller than the previous total. A reset that coincides with a
    /// larger raw value is indistinguishable from normal growth and is
    /// treated as such.
    pub fn apply(&mut self, raw: SampleValue) -> SampleValue {
        let delta = raw.saturating_sub(self.baseline);
        self.corrected = if delta < self.corrected {
            // Counter reset or wrap since the last poll: accumulate.
            self.corrected.saturating_add(delta)
        } else {
            // Normal monotonic growth: replace.
            delta
        };
        self.corrected
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
