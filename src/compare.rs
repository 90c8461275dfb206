//! Energy regression detection between two runs
//!
//! Compares per-call-site total energy across the union of keys in an old
//! and a new results document. A key missing from one side counts as zero
//! energy there, so removed functions show -100% and new functions with a
//! nonzero cost show +inf. The overall change is 0 when the old total is 0.

use crate::results::{ProfileResults, Summary};
use std::collections::{BTreeMap, BTreeSet};

/// Percent change beyond which a function counts as regressed or improved
pub const REGRESSION_THRESHOLD_PERCENT: f64 = 10.0;

/// Percent change from `old` to `new`
///
/// A zero baseline gives 0 when `new` is also zero, otherwise +inf.
pub fn change_percent(old: f64, new: f64) -> f64 {
    if old > 0.0 {
        ((new - old) / old) * 100.0
    } else if new == 0.0 {
        0.0
    } else {
        f64::INFINITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Regression,
    Improvement,
    Neutral,
}

impl ChangeKind {
    pub fn classify(change_percent: f64, threshold_percent: f64) -> Self {
        if change_percent > threshold_percent {
            ChangeKind::Regression
        } else if change_percent < -threshold_percent {
            ChangeKind::Improvement
        } else {
            ChangeKind::Neutral
        }
    }
}

/// One call-site's change between runs
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDelta {
    pub old_energy_mj: f64,
    pub new_energy_mj: f64,
    pub change_percent: f64,
    pub old_calls: u64,
    pub new_calls: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub old_summary: Summary,
    pub new_summary: Summary,
    pub total_change_percent: f64,
    pub threshold_percent: f64,
    pub changes: BTreeMap<String, FunctionDelta>,
    /// Regressed keys, largest increase first
    pub regressions: Vec<String>,
    /// Improved keys, largest decrease first
    pub improvements: Vec<String>,
}

/// Compare two runs with the default 10% threshold
pub fn compare(old: &ProfileResults, new: &ProfileResults) -> Comparison {
    compare_with_threshold(old, new, REGRESSION_THRESHOLD_PERCENT)
}

pub fn compare_with_threshold(
    old: &ProfileResults,
    new: &ProfileResults,
    threshold_percent: f64,
) -> Comparison {
    let keys: BTreeSet<&String> = old.functions.keys().chain(new.functions.keys()).collect();

    let mut changes = BTreeMap::new();
    for key in keys {
        let before = old.functions.get(key);
        let after = new.functions.get(key);
        let old_energy_mj = before.map_or(0.0, |f| f.total_energy_mj);
        let new_energy_mj = after.map_or(0.0, |f| f.total_energy_mj);

        changes.insert(
            key.clone(),
            FunctionDelta {
                old_energy_mj,
                new_energy_mj,
                change_percent: change_percent(old_energy_mj, new_energy_mj),
                old_calls: before.map_or(0, |f| f.calls),
                new_calls: after.map_or(0, |f| f.calls),
            },
        );
    }

    let mut regressions = keys_of_kind(&changes, ChangeKind::Regression, threshold_percent);
    regressions.sort_by(|a, b| changes[b].change_percent.total_cmp(&changes[a].change_percent));
    let mut improvements = keys_of_kind(&changes, ChangeKind::Improvement, threshold_percent);
    improvements.sort_by(|a, b| changes[a].change_percent.total_cmp(&changes[b].change_percent));

    Comparison {
        total_change_percent: total_change_percent(
            old.summary.total_energy_mj,
            new.summary.total_energy_mj,
        ),
        old_summary: old.summary.clone(),
        new_summary: new.summary.clone(),
        threshold_percent,
        changes,
        regressions,
        improvements,
    }
}

/// Overall change between run totals; 0 against an empty baseline
fn total_change_percent(old_total: f64, new_total: f64) -> f64 {
    if old_total > 0.0 {
        ((new_total - old_total) / old_total) * 100.0
    } else {
        0.0
    }
}

fn keys_of_kind(
    changes: &BTreeMap<String, FunctionDelta>,
    kind: ChangeKind,
    threshold_percent: f64,
) -> Vec<String> {
    changes
        .iter()
        .filter(|(_, d)| ChangeKind::classify(d.change_percent, threshold_percent) == kind)
        .map(|(key, _)| key.clone())
        .collect()
}

impl Comparison {
    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }

    pub fn kind_of(&self, key: &str) -> Option<ChangeKind> {
        self.changes
            .get(key)
            .map(|d| ChangeKind::classify(d.change_percent, self.threshold_percent))
    }
}

/// Signed percentage, `new` for an unbounded increase
pub fn format_change(change_percent: f64) -> String {
    if change_percent.is_infinite() {
        "new".to_string()
    } else {
        format!("{:+.1}%", change_percent)
    }
}
