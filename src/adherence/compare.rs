use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::adherence::aggregate::LabelMultiset;

/// Outcome of reconciling a planogram multiset against a shelf multiset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Percentage in [0, 100]; exactly 0 when the planogram expects nothing
    pub adherence_score: f64,
    pub total_expected: usize,
    pub total_matched: usize,
    pub planogram_counts: BTreeMap<String, usize>,
    pub shelf_counts: BTreeMap<String, usize>,
    /// Per-label deficit where the shelf has fewer than the planogram
    pub missing_items: BTreeMap<String, usize>,
    /// Per-label surplus where the shelf has more than the planogram
    pub extra_items: BTreeMap<String, usize>,
}

impl ComparisonResult {
    pub fn is_full_adherence(&self) -> bool {
        self.total_expected > 0 && self.total_matched == self.total_expected
    }
}

/// Per-label multiset intersection of `planogram` and `shelf`.
pub fn compare(planogram: &LabelMultiset, shelf: &LabelMultiset) -> ComparisonResult {
    let planogram_counts = planogram.counts().clone();
    let shelf_counts = shelf.counts().clone();

    let total_expected: usize = planogram_counts.values().sum();
    let mut total_matched = 0;
    let mut missing_items = BTreeMap::new();

    for (label, &expected) in &planogram_counts {
        let found = shelf_counts.get(label).copied().unwrap_or(0);
        total_matched += expected.min(found);
        if found < expected {
            missing_items.insert(label.clone(), expected - found);
        }
    }

    let extra_items = shelf_counts
        .iter()
        .filter_map(|(label, &found)| {
            let expected = planogram_counts.get(label).copied().unwrap_or(0);
            (found > expected).then(|| (label.clone(), found - expected))
        })
        .collect();

    // An empty planogram scores 0, not 100.
    let adherence_score = if total_expected > 0 {
        total_matched as f64 * 100.0 / total_expected as f64
    } else {
        0.0
    };

    ComparisonResult {
        adherence_score,
        total_expected,
        total_matched,
        planogram_counts,
        shelf_counts,
        missing_items,
        extra_items,
    }
}
