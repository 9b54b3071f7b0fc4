use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::Detection;

/// Per-label counts for one image, plus the detections they were built from.
///
/// `counts[label]` always equals the number of `details` carrying that label.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelMultiset {
    counts: BTreeMap<String, usize>,
    details: Vec<Detection>,
}

impl LabelMultiset {
    /// Build a multiset from every detection, without any threshold.
    pub fn from_detections(detections: Vec<Detection>) -> Self {
        let mut counts = BTreeMap::new();
        for detection in &detections {
            *counts.entry(detection.label().to_string()).or_insert(0) += 1;
        }
        Self {
            counts,
            details: detections,
        }
    }

    pub fn counts(&self) -> &BTreeMap<String, usize> {
        &self.counts
    }

    /// Detections in the order the model returned them
    pub fn details(&self) -> &[Detection] {
        &self.details
    }

    pub fn count(&self, label: &str) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.details.len()
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }
}

/// Keep detections with `confidence >= confidence_threshold` and count them by label.
///
/// Input order is preserved in `details`. An empty input yields an empty multiset.
pub fn aggregate<I>(raw_detections: I, confidence_threshold: f32) -> LabelMultiset
where
    I: IntoIterator<Item = Detection>,
{
    let kept = raw_detections
        .into_iter()
        .filter(|d| d.confidence() >= confidence_threshold)
        .collect();
    LabelMultiset::from_detections(kept)
}
