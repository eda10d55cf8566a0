use recon_core::Real;
use serde::{Deserialize, Serialize};

use super::{CollisionError, Severity};

/// Space in which box-centre distances are measured.
///
/// All distances of one run use the same space; thresholds are pixels or
/// metres accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceSpace {
    #[default]
    Pixel,
    /// World-plane metres from `world_x`/`world_y`; shared frames where
    /// either detection is unmapped are skipped.
    World,
}

/// IoU cutoffs for the severity labels.
///
/// Labels use strict comparisons: `max_iou > severe_iou` is severe,
/// `max_iou > moderate_iou` moderate, anything else minor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityThresholds {
    pub moderate_iou: Real,
    pub severe_iou: Real,
    /// Raise the label one level for contacts lasting at least this many frames.
    pub escalate_after_frames: Option<usize>,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            moderate_iou: 0.15,
            severe_iou: 0.3,
            escalate_after_frames: None,
        }
    }
}

impl SeverityThresholds {
    /// Total, monotonic in `max_iou` for a fixed duration.
    pub fn classify(&self, max_iou: Real, duration_frames: usize) -> Severity {
        let base = if max_iou > self.severe_iou {
            Severity::Severe
        } else if max_iou > self.moderate_iou {
            Severity::Moderate
        } else {
            Severity::Minor
        };
        match self.escalate_after_frames {
            Some(n) if duration_frames >= n => base.escalated(),
            _ => base,
        }
    }
}

/// Thresholds and windows for [`detect_all`](super::detect_all).
///
/// The defaults are tuning policy, not physical constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// A frame overlaps when `iou >= iou_threshold` (in `(0, 1]`) ...
    pub iou_threshold: Real,
    /// ... or `center_distance <= distance_threshold`.
    pub distance_threshold: Real,
    /// Largest frame step that still continues a contact run (1 = consecutive).
    pub persistence_frames: u32,
    /// Overlapping frames a run needs to count as a collision.
    pub min_collision_frames: usize,
    /// Centre distance under which a frame counts towards a near miss.
    pub near_miss_distance: Real,
    pub min_near_miss_frames: usize,
    /// Frames before contact searched for the start of the approach.
    pub approach_window: u32,
    pub distance_space: DistanceSpace,
    pub severity: SeverityThresholds,
    /// Evaluate candidate pairs on the rayon thread pool.
    pub parallel: bool,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.1,
            distance_threshold: 50.0,
            persistence_frames: 3,
            min_collision_frames: 2,
            near_miss_distance: 100.0,
            min_near_miss_frames: 2,
            approach_window: 50,
            distance_space: DistanceSpace::Pixel,
            severity: SeverityThresholds::default(),
            parallel: true,
        }
    }
}

impl CollisionConfig {
    pub fn validate(&self) -> Result<(), CollisionError> {
        let invalid = |msg: String| Err(CollisionError::InvalidConfig(msg));
        if !(self.iou_threshold > 0.0 && self.iou_threshold <= 1.0) {
            return invalid(format!(
                "iou_threshold must lie in (0, 1], got {}",
                self.iou_threshold
            ));
        }
        if !(self.distance_threshold >= 0.0) || !(self.near_miss_distance >= 0.0) {
            return invalid(format!(
                "distances must be non-negative, got distance_threshold {} and near_miss_distance {}",
                self.distance_threshold, self.near_miss_distance
            ));
        }
        if self.persistence_frames == 0 {
            return invalid("persistence_frames must be at least 1".to_string());
        }
        if self.min_collision_frames == 0 || self.min_near_miss_frames == 0 {
            return invalid("minimum frame counts must be at least 1".to_string());
        }
        let s = &self.severity;
        if !(0.0..=1.0).contains(&s.moderate_iou)
            || !(0.0..=1.0).contains(&s.severe_iou)
            || s.moderate_iou > s.severe_iou
        {
            return invalid(format!(
                "severity thresholds must satisfy 0 <= moderate ({}) <= severe ({}) <= 1",
                s.moderate_iou, s.severe_iou
            ));
        }
        Ok(())
    }

    /// Margin by which track extents are grown in the candidate pre-filter.
    pub(crate) fn proximity_margin(&self) -> Real {
        self.distance_threshold.max(self.near_miss_distance)
    }
}
