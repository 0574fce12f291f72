//! Global reward-rate history.

use crate::error::RewardsError;
use serde::{Deserialize, Serialize};
use stakepool_types::Timestamp;

/// A span of time during which one reward rate applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSegment {
    /// Reward units per staked unit per second, scaled by the engine's rate scale.
    pub rate: u128,
    pub start: Timestamp,
    /// `None` while the segment is still active.
    pub end: Option<Timestamp>,
}

/// Rate segments shared by every participant.
///
/// A rate change closes the current segment and appends a new one, O(1).
/// A change at the instant the current segment began replaces its rate.
/// Settling a participant intersects this history with the window since their
/// last checkpoint, O(k) in the number of rate changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateHistory {
    pub segments: Vec<RateSegment>,
}

impl RateHistory {
    pub fn new(initial_rate: u128, genesis: Timestamp) -> Self {
        Self {
            segments: vec![RateSegment {
                rate: initial_rate,
                start: genesis,
                end: None,
            }],
        }
    }

    pub fn apply_rate_change(
        &mut self,
        new_rate: u128,
        change_at: Timestamp,
    ) -> Result<(), RewardsError> {
        if let Some(current) = self.segments.last_mut() {
            if change_at < current.start {
                return Err(RewardsError::InvalidTimestamp);
            }
            if change_at == current.start {
                // Nothing accrued under the current rate yet.
                current.rate = new_rate;
                return Ok(());
            }
            current.end = Some(change_at);
        }
        self.segments.push(RateSegment {
            rate: new_rate,
            start: change_at,
            end: None,
        });
        Ok(())
    }

    pub fn current_rate(&self) -> u128 {
        self.segments.last().map(|s| s.rate).unwrap_or(0)
    }

    /// Start of the active segment.
    pub fn current_start(&self) -> Timestamp {
        self.segments.last().map(|s| s.start).unwrap_or_default()
    }

    /// Scaled reward earned by one staked unit over `[from, now]`.
    ///
    /// Saturates at `u128::MAX`; payouts are capped by the funded pool anyway.
    pub fn accrued_per_unit(&self, from: Timestamp, now: Timestamp) -> u128 {
        let mut total: u128 = 0;
        for seg in &self.segments {
            let start = seg.start.max(from);
            let end = seg.end.unwrap_or(now).min(now);
            if start >= end {
                continue;
            }
            let duration = start.elapsed_since(end) as u128;
            total = total.saturating_add(seg.rate.saturating_mul(duration));
        }
        total
    }
}

impl Default for RateHistory {
    fn default() -> Self {
        Self::new(0, Timestamp::EPOCH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: u64) -> Timestamp {
        Timestamp::new(secs)
    }

    #[test]
    fn single_segment_accrual() {
        let h = RateHistory::new(100, ts(0));
        assert_eq!(h.current_rate(), 100);
        assert_eq!(h.accrued_per_unit(ts(0), ts(10)), 1000);
    }

    #[test]
    fn window_starting_after_genesis() {
        let h = RateHistory::new(50, ts(0));
        assert_eq!(h.accrued_per_unit(ts(500), ts(1000)), 25_000);
    }

    #[test]
    fn window_spans_partial_segments() {
        let mut h = RateHistory::new(10, ts(0));
        h.apply_rate_change(20, ts(100)).unwrap();
        h.apply_rate_change(30, ts(200)).unwrap();

        // 50s at 10 + 100s at 20 + 50s at 30
        assert_eq!(h.accrued_per_unit(ts(50), ts(250)), 4000);
    }

    #[test]
    fn window_entirely_inside_closed_segment() {
        let mut h = RateHistory::new(10, ts(0));
        h.apply_rate_change(1000, ts(100)).unwrap();
        assert_eq!(h.accrued_per_unit(ts(20), ts(60)), 400);
    }

    #[test]
    fn zero_elapsed_returns_zero() {
        let h = RateHistory::new(100, ts(0));
        assert_eq!(h.accrued_per_unit(ts(500), ts(500)), 0);
    }

    #[test]
    fn reject_backwards_rate_change() {
        let mut h = RateHistory::new(100, ts(1000));
        assert_eq!(
            h.apply_rate_change(200, ts(500)),
            Err(RewardsError::InvalidTimestamp)
        );
        assert_eq!(h.segments.len(), 1);
    }

    #[test]
    fn changes_at_same_instant_replace_rate() {
        let mut h = RateHistory::new(10, ts(0));
        h.apply_rate_change(20, ts(100)).unwrap();
        h.apply_rate_change(30, ts(100)).unwrap();
        h.apply_rate_change(40, ts(100)).unwrap();

        assert_eq!(h.segments.len(), 2);
        assert_eq!(h.current_rate(), 40);
        assert_eq!(h.accrued_per_unit(ts(0), ts(110)), 1000 + 400);
    }

    #[test]
    fn change_at_genesis_replaces_initial_rate() {
        let mut h = RateHistory::new(10, ts(5));
        h.apply_rate_change(7, ts(5)).unwrap();
        assert_eq!(h.segments.len(), 1);
        assert_eq!(h.accrued_per_unit(ts(5), ts(15)), 70);
    }

    #[test]
    fn overflow_saturates() {
        let h = RateHistory::new(u128::MAX, ts(0));
        assert_eq!(h.accrued_per_unit(ts(0), ts(2)), u128::MAX);
    }

    #[test]
    fn default_is_zero_rate() {
        let h = RateHistory::default();
        assert_eq!(h.current_rate(), 0);
        assert_eq!(h.accrued_per_unit(ts(0), ts(1000)), 0);
    }
}
