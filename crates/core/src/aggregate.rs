//! Aggregation policies for multi-instance samples.
//!
//! A wildcard query target can expand to any number of indexed
//! instances, each reporting its own counter value. The policy chosen
//! at monitor construction reduces that set to the single scalar the
//! drift tracker and threshold comparison operate on. Pure logic — the
//! caller parses raw values first (see [`crate::sample`]).

use serde::{Deserialize, Serialize};

use crate::types::SampleValue;

/// How a set of per-instance sample values is reduced to one scalar.
///
/// Fixed per monitor instance; there is no reconfiguration mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// The greatest single value; `0` over an empty set.
    Max,
    /// Saturating sum of all values.
    Sum,
    /// Integer mean of all values; `0` over an empty set.
    #[default]
    Average,
}

impl Aggregation {
    /// Reduce a set of parsed samples to one scalar.
    ///
    /// Never overflows: sums clamp at `u64::MAX` instead of wrapping,
    /// and the empty set reduces to `0` for every policy (the average
    /// case is defined, not a division-by-zero error).
    pub fn reduce(&self, samples: &[SampleValue]) -> SampleValue {
        match self {
            Aggregation::Max => samples.iter().copied().max().unwrap_or(0),
            Aggregation::Sum => saturating_sum(samples),
            Aggregation::Average => {
                if samples.is_empty() {
                    0
                } else {
                    saturating_sum(samples) / samples.len() as SampleValue
                }
            }
        }
    }
}

/// Sum that clamps at `u64::MAX` instead of wrapping.
///
/// Accumulation stops at the first addition that saturates — once the
/// ceiling is reached no later sample can change the result.
fn saturating_sum(samples: &[SampleValue]) -> SampleValue {
    let mut total: SampleValue = 0;
    for &value in samples {
        total = total.saturating_add(value);
        if total == SampleValue::MAX {
            break;
        }
    }
    total
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
