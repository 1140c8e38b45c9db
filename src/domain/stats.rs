use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::detection::Detection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_detections: usize,
    /// Class names in order of first occurrence.
    pub unique_classes: Vec<String>,
    pub counts: BTreeMap<String, usize>,
    pub avg_confidence: f32,
    pub max_confidence: f32,
    pub min_confidence: f32,
    /// Seconds.
    pub processing_time: f64,
}

/// Summarises a batch of detections. An empty batch yields zeroed
/// confidence figures rather than NaN.
pub fn aggregate(detections: &[Detection], elapsed: Duration) -> Statistics {
    let mut unique_classes: Vec<String> = Vec::new();
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut sum = 0.0f64;
    let mut max = f32::MIN;
    let mut min = f32::MAX;

    for det in detections {
        let name = det.class_name();
        if !counts.contains_key(name) {
            unique_classes.push(name.to_string());
        }
        *counts.entry(name.to_string()).or_insert(0) += 1;
        sum += det.confidence() as f64;
        max = max.max(det.confidence());
        min = min.min(det.confidence());
    }

    let (avg_confidence, max_confidence, min_confidence) = if detections.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        ((sum / detections.len() as f64) as f32, max, min)
    };

    Statistics {
        total_detections: detections.len(),
        unique_classes,
        counts,
        avg_confidence,
        max_confidence,
        min_confidence,
        processing_time: elapsed.as_secs_f64(),
    }
}

impl Statistics {
    /// `"2 plastic, 1 metal"`, in first-seen class order.
    pub fn summary(&self) -> String {
        self.unique_classes
            .iter()
            .map(|label| format!("{} {}", self.counts.get(label).copied().unwrap_or(0), label))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::detection::BoundingBox;

    fn det(class_id: u32, confidence: f32) -> Detection {
        Detection::new(class_id, confidence, BoundingBox::new(0.0, 0.0, 10.0, 10.0), (100, 100))
    }

    #[test]
    fn empty_batch_is_all_zero() {
        let stats = aggregate(&[], Duration::from_millis(5));
        assert_eq!(stats.total_detections, 0);
        assert!(stats.unique_classes.is_empty());
        assert!(stats.counts.is_empty());
        assert_eq!(stats.avg_confidence, 0.0);
        assert_eq!(stats.max_confidence, 0.0);
        assert_eq!(stats.min_confidence, 0.0);
        assert_eq!(stats.summary(), "");
    }

    #[test]
    fn plastic_plastic_metal() {
        let dets = [det(0, 0.9), det(0, 0.6), det(1, 0.8)];
        let stats = aggregate(&dets, Duration::from_millis(120));
        assert_eq!(stats.total_detections, 3);
        assert_eq!(stats.counts.get("plastic"), Some(&2));
        assert_eq!(stats.counts.get("metal"), Some(&1));
        assert_eq!(stats.unique_classes, vec!["plastic", "metal"]);
        assert!((stats.avg_confidence - 0.7667).abs() < 1e-3);
        assert_eq!(stats.max_confidence, 0.9);
        assert_eq!(stats.min_confidence, 0.6);
        assert!((stats.processing_time - 0.12).abs() < 1e-9);
        assert_eq!(stats.summary(), "2 plastic, 1 metal");
    }

    #[test]
    fn unique_classes_follow_first_occurrence() {
        let dets = [det(3, 0.5), det(1, 0.5), det(3, 0.5), det(9, 0.4)];
        let stats = aggregate(&dets, Duration::ZERO);
        assert_eq!(stats.unique_classes, vec!["glass", "metal", "unknown"]);
    }
}
