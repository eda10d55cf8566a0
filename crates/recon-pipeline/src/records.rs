//! Response records consumed by the UI and report generation.
//!
//! Field names are part of the external contract and must not change.

use recon_analysis::collision::{CollisionConfig, CollisionEvent, NearMiss};
use recon_core::{CalibrationPoint, Detection, Real};
use serde::{Deserialize, Serialize};

use crate::session::SessionStatus;

/// Row-major 3×3 matrix as nested arrays.
pub type MatrixRows = [[Real; 3]; 3];

/// Outcome of a solve request. Failures are reported here, not raised.
///
/// Absent fields are omitted from the JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<MatrixRows>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reprojection_error: Option<Real>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SolveResponse {
    pub fn solved(matrix: MatrixRows, reprojection_error: Real) -> Self {
        Self {
            success: true,
            matrix: Some(matrix),
            reprojection_error: Some(reprojection_error),
            error_message: None,
        }
    }

    pub fn failed(error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            matrix: None,
            reprojection_error: None,
            error_message: Some(error_message.into()),
        }
    }
}

/// Wire view of a calibration session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomographySessionRecord {
    pub id: String,
    pub project_id: String,
    pub status: SessionStatus,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solved_at: Option<u64>,
    pub pairs: Vec<CalibrationPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<MatrixRows>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reprojection_error: Option<Real>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// A detection with the world position and speed the batch pass attached.
///
/// Fields that could not be computed are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedDetection {
    #[serde(flatten)]
    pub detection: Detection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_lat: Option<Real>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_lng: Option<Real>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mps: Option<Real>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mph: Option<Real>,
}

impl EnrichedDetection {
    pub fn unmapped(detection: Detection) -> Self {
        Self {
            detection,
            world_lat: None,
            world_lng: None,
            speed_mps: None,
            speed_mph: None,
        }
    }
}

/// Why one detection was left without world data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionIssue {
    /// Position in the input list.
    pub index: usize,
    pub frame_idx: u32,
    pub track_id: Option<u32>,
    pub message: String,
}

pub type CollisionResponse = CollisionEvent;

/// Counters and parameters of one collision analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_detections: usize,
    pub total_frames: usize,
    pub unique_tracks: usize,
    pub candidate_pairs: usize,
    pub pruned_pairs: usize,
    pub collision_pairs: usize,
    pub speed_annotated: usize,
    pub calibrated: bool,
    pub parameters: CollisionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionsListResponse {
    pub collisions: Vec<CollisionResponse>,
    pub near_misses: Vec<NearMiss>,
    pub total_collisions: usize,
    pub total_near_misses: usize,
    pub analysis_summary: AnalysisSummary,
}

/// One point of a track's trajectory for plotting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub frame: u32,
    pub center_x: Real,
    pub center_y: Real,
    pub world_x: Option<Real>,
    pub world_y: Option<Real>,
    pub speed_mph: Option<Real>,
}
