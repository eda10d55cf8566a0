//! Per-project reconstruction pass: enrich, group, detect.

use std::collections::BTreeSet;

use anyhow::{Context, Result, bail, ensure};
use log::info;
use recon_analysis::collision::{DistanceSpace, detect_all};
use recon_analysis::group_tracks;
use recon_core::{Detection, FrameSize, Real};
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::enrich::{EnrichmentInput, enrich_detections};
use crate::records::{
    AnalysisSummary, CollisionResponse, CollisionsListResponse, DetectionIssue, EnrichedDetection,
    TrajectoryPoint,
};
use crate::session::{HomographySession, SessionStatus};

/// Detector/tracker output of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInput {
    pub project_id: String,
    pub fps: Real,
    pub frame_width: u32,
    pub frame_height: u32,
    pub detections: Vec<Detection>,
}

impl ProjectInput {
    pub fn frame_size(&self) -> FrameSize {
        FrameSize::new(self.frame_width, self.frame_height)
    }
}

/// Everything one analysis run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectReport {
    pub project_id: String,
    /// Status of the calibration session, `None` when the project has none.
    pub calibration_status: Option<SessionStatus>,
    pub detections: Vec<EnrichedDetection>,
    pub issues: Vec<DetectionIssue>,
    pub collisions: CollisionsListResponse,
    /// Most significant collision, if any.
    pub primary_collision: Option<CollisionResponse>,
}

/// Run the full batch pass over one project.
///
/// Speeds and world positions are attached only when `session` is solved.
/// Collision detection runs regardless; world-space distances, however,
/// need a solved calibration.
///
/// # Errors
///
/// Fails on invalid configuration, an empty detection set, invalid video
/// properties, or world-space collision analysis without a complete mapping.
pub fn analyze_project(
    input: &ProjectInput,
    session: Option<&HomographySession>,
    config: &AnalysisConfig,
) -> Result<ProjectReport> {
    config.validate()?;
    ensure!(
        !input.detections.is_empty(),
        "project {} has no detections",
        input.project_id
    );

    let calibration = session.and_then(HomographySession::solved);
    if config.collision.distance_space == DistanceSpace::World && calibration.is_none() {
        bail!(
            "world-space collision analysis for project {} needs a solved calibration",
            input.project_id
        );
    }

    let enrichment = enrich_detections(
        &input.detections,
        calibration,
        &EnrichmentInput {
            frame_size: input.frame_size(),
            fps: input.fps,
        },
        config,
    )
    .with_context(|| format!("enrich detections of project {}", input.project_id))?;

    let mapped: Vec<Detection> = enrichment
        .detections
        .iter()
        .map(|d| d.detection.clone())
        .collect();
    let tracks = group_tracks(&mapped)?;
    let analysis = detect_all(&tracks, &config.collision)
        .with_context(|| format!("collision analysis of project {}", input.project_id))?;

    let total_frames = input
        .detections
        .iter()
        .map(|d| d.frame_idx)
        .collect::<BTreeSet<_>>()
        .len();
    let summary = AnalysisSummary {
        total_detections: input.detections.len(),
        total_frames,
        unique_tracks: tracks.len(),
        candidate_pairs: analysis.candidate_pairs,
        pruned_pairs: analysis.pruned_pairs,
        collision_pairs: analysis.collision_pairs(),
        speed_annotated: enrichment.with_speed,
        calibrated: calibration.is_some(),
        parameters: config.collision,
    };
    let primary_collision = analysis.primary().cloned();

    info!(
        "project {}: {} collisions, {} near misses over {} tracks",
        input.project_id,
        analysis.collisions.len(),
        analysis.near_misses.len(),
        tracks.len()
    );

    Ok(ProjectReport {
        project_id: input.project_id.clone(),
        calibration_status: session.map(HomographySession::status),
        detections: enrichment.detections,
        issues: enrichment.issues,
        collisions: CollisionsListResponse {
            total_collisions: analysis.collisions.len(),
            total_near_misses: analysis.near_misses.len(),
            collisions: analysis.collisions,
            near_misses: analysis.near_misses,
            analysis_summary: summary,
        },
        primary_collision,
    })
}

/// Frame-ordered positions of one track for plotting.
pub fn track_trajectory(detections: &[EnrichedDetection], track_id: u32) -> Vec<TrajectoryPoint> {
    let mut points: Vec<TrajectoryPoint> = detections
        .iter()
        .filter(|d| d.detection.track_id == Some(track_id))
        .map(|d| {
            let c = d.detection.bbox().center();
            TrajectoryPoint {
                frame: d.detection.frame_idx,
                center_x: c.x,
                center_y: c.y,
                world_x: d.detection.world_x,
                world_y: d.detection.world_y,
                speed_mph: d.speed_mph,
            }
        })
        .collect();
    points.sort_by_key(|p| p.frame);
    points
}
