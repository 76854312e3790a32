// market/src/reward.rs

//! Reward engine: rank and payout-multiplier mapping.
//!
//! Both mappings are pure functions of the completed-task count. Thresholds
//! are evaluated highest-first, so the first matching tier wins. The ledger
//! is the only caller that mutates worker state, and it always goes through
//! these functions, which keeps rank and multiplier from desynchronizing.

use crate::types::Rank;

/// Rank thresholds, highest tier first: `(minimum completions, rank)`.
const RANK_THRESHOLDS: [(u64, Rank); 5] = [
    (2000, Rank::S),
    (500, Rank::A),
    (100, Rank::B),
    (50, Rank::C),
    (0, Rank::D),
];

/// Returns the rank earned at a given completed-task count.
pub fn rank_for(tasks_completed: u64) -> Rank {
    for (threshold, rank) in RANK_THRESHOLDS {
        if tasks_completed >= threshold {
            return rank;
        }
    }
    Rank::D
}

/// Returns the payout multiplier for a rank.
///
/// The multiplier is determined solely by rank and is never settable
/// independently outside non-production tooling.
pub fn multiplier_for(rank: Rank) -> f64 {
    match rank {
        Rank::D => 0.8,
        Rank::C => 1.0,
        Rank::B => 1.2,
        Rank::A => 1.5,
        Rank::S => 2.0,
    }
}

/// Computes the final payout for a base reward under a multiplier.
///
/// The multiplier must be the worker's multiplier at completion time, not
/// at task creation time; rewards scale with the rank held at the moment
/// the task settles.
pub fn payout(reward: f64, multiplier: f64) -> f64 {
    reward * multiplier
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_table_edges() {
        assert_eq!(rank_for(0), Rank::D);
        assert_eq!(rank_for(49), Rank::D);
        assert_eq!(rank_for(50), Rank::C);
        assert_eq!(rank_for(99), Rank::C);
        assert_eq!(rank_for(100), Rank::B);
        assert_eq!(rank_for(499), Rank::B);
        assert_eq!(rank_for(500), Rank::A);
        assert_eq!(rank_for(1999), Rank::A);
        assert_eq!(rank_for(2000), Rank::S);
        assert_eq!(rank_for(1_000_000), Rank::S);
    }

    #[test]
    fn rank_is_monotonic_in_completions() {
        let mut prev = rank_for(0);
        for count in 0..2500u64 {
            let rank = rank_for(count);
            assert!(rank >= prev, "rank regressed at count={count}");
            prev = rank;
        }
    }

    #[test]
    fn multiplier_follows_rank() {
        assert_eq!(multiplier_for(Rank::D), 0.8);
        assert_eq!(multiplier_for(Rank::C), 1.0);
        assert_eq!(multiplier_for(Rank::B), 1.2);
        assert_eq!(multiplier_for(Rank::A), 1.5);
        assert_eq!(multiplier_for(Rank::S), 2.0);
    }

    #[test]
    fn payout_is_exact_product() {
        assert_eq!(payout(1.0, 0.8), 0.8);
        assert_eq!(payout(2.5, 1.2), 3.0);
        assert_eq!(payout(0.0, 2.0), 0.0);
    }
}
