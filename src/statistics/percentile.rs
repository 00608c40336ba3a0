//! Rank-interpolated percentiles.
//!
//! For `count` non-null values and a fraction `f`, the target rank is
//! `ceil(count * f)`. When `count * f` is a whole number the percentile is the
//! midpoint of the values at ranks `target` and `target + 1`; otherwise it is
//! the value at `target`.

use std::collections::HashMap;

use crate::error::Error;
use crate::storage::RankedValue;

/// Fractions reported as p25, p50 and p75
pub const QUARTILES: [f64; 3] = [0.25, 0.50, 0.75];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankTarget {
    pub fraction: f64,
    pub target: u64,
    pub is_whole: bool,
}

impl RankTarget {
    pub fn new(count: u64, fraction: f64) -> Self {
        let exact = count as f64 * fraction;
        let target = exact.ceil() as u64;
        Self {
            fraction,
            target,
            is_whole: target as f64 == exact,
        }
    }

    /// Ranks whose values this percentile reads
    pub fn ranks(&self) -> impl Iterator<Item = u64> {
        let upper = if self.is_whole { Some(self.target + 1) } else { None };
        std::iter::once(self.target).chain(upper)
    }

    pub fn resolve(&self, values: &HashMap<u64, f64>) -> Result<f64, Error> {
        let lookup = |rank: u64| {
            values.get(&rank).copied().ok_or_else(|| {
                Error::QueryFailed(format!(
                    "no value at rank {} for percentile {}; table changed during summary?",
                    rank, self.fraction
                ))
            })
        };

        let lower = lookup(self.target)?;
        if self.is_whole {
            let upper = lookup(self.target + 1)?;
            Ok((lower + upper) / 2.0)
        } else {
            Ok(lower)
        }
    }
}

/// Rank targets for every quartile of a column with `count` values.
/// Empty columns have none.
pub fn quartile_targets(count: u64) -> Vec<RankTarget> {
    if count == 0 {
        return Vec::new();
    }
    QUARTILES.iter().map(|&f| RankTarget::new(count, f)).collect()
}

/// Distinct ranks to fetch for a set of targets, ascending
pub fn ranks_to_fetch(targets: &[RankTarget]) -> Vec<u64> {
    let mut ranks: Vec<u64> = targets.iter().flat_map(|t| t.ranks()).collect();
    ranks.sort_unstable();
    ranks.dedup();
    ranks
}

pub fn resolve_all(targets: &[RankTarget], fetched: &[RankedValue]) -> Result<Vec<f64>, Error> {
    let values: HashMap<u64, f64> = fetched.iter().map(|rv| (rv.rank, rv.value)).collect();
    targets.iter().map(|t| t.resolve(&values)).collect()
}

/// Percentiles computed in memory with the same rule; `sorted` must be
/// ascending.
pub fn from_sorted(sorted: &[f64], fraction: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let target = RankTarget::new(sorted.len() as u64, fraction);
    let values: HashMap<u64, f64> = sorted
        .iter()
        .enumerate()
        .map(|(idx, v)| (idx as u64 + 1, *v))
        .collect();
    target.resolve(&values).ok()
}
