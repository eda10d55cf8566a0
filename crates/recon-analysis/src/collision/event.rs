use recon_core::Real;
use serde::{Deserialize, Serialize};

/// Ordered severity label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Moderate,
    Severe,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Minor => "minor",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        }
    }

    /// One level up, saturating at [`Severity::Severe`].
    pub fn escalated(self) -> Self {
        match self {
            Severity::Minor => Severity::Moderate,
            Severity::Moderate | Severity::Severe => Severity::Severe,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Temporal phases of a contact.
///
/// When present, `approach < contact <= peak <= separation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyFrames {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approach: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separation: Option<u32>,
}

impl KeyFrames {
    pub fn is_ordered(&self) -> bool {
        let frames: Vec<u32> = [self.approach, self.contact, self.peak, self.separation]
            .into_iter()
            .flatten()
            .collect();
        frames.windows(2).all(|w| w[0] <= w[1])
    }
}

/// One contact run between two tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionEvent {
    pub track_id_1: u32,
    pub track_id_2: u32,
    pub first_contact_frame: u32,
    pub last_overlap_frame: u32,
    pub peak_overlap_frame: u32,
    pub max_iou: Real,
    pub min_distance: Real,
    /// Number of overlapping frames in the run.
    pub duration_frames: usize,
    pub collision_frames: Vec<u32>,
    pub severity: Severity,
    pub key_frames: KeyFrames,
}

impl CollisionEvent {
    pub fn involves(&self, track_id: u32) -> bool {
        self.track_id_1 == track_id || self.track_id_2 == track_id
    }
}

/// Pair-level proximity that never formed a qualifying contact run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearMiss {
    pub track_id_1: u32,
    pub track_id_2: u32,
    /// Frame of the smallest centre distance.
    pub closest_frame: u32,
    pub first_frame: u32,
    pub last_frame: u32,
    pub min_distance: Real,
    pub max_iou: Real,
    /// Frames meeting the collision overlap condition.
    pub total_overlap_frames: usize,
    /// Frames within the near-miss distance.
    pub proximity_frames: usize,
}
