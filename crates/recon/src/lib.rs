//! High-level entry crate for accident reconstruction from traffic video.
//!
//! The library turns detector/tracker output into a physical account of
//! what happened:
//! - Ground-plane calibration from user-marked image↔map correspondences
//! - Mapping of detection boxes onto the ground plane (metres and lat/lng)
//! - Per-track ground speeds
//! - Pairwise collision and near-miss detection with key frames and severity
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! # let points = unimplemented!();
//! # let input = unimplemented!();
//! use recon::prelude::*;
//!
//! // Calibrate the camera from marked points
//! let mut session = HomographySession::new("session-1", "project-1");
//! session.replace_points(points)?;
//! let response = session.solve(&HomographyOptions::default())?;
//! assert!(response.success);
//!
//! // Run the batch pass over the project's detections
//! let report = analyze_project(&input, Some(&session), &AnalysisConfig::default())?;
//! println!("{} collisions", report.collisions.total_collisions);
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! ## Workflows
//!
//! - [`session`] - Calibration session lifecycle (`HomographySession`)
//! - [`pipeline`] - Per-project enrichment and collision analysis
//! - [`records`] - Response records exchanged with the UI
//!
//! ## Foundation Crates (Advanced Users)
//!
//! - [`core`] - Math types, geodetic projection, detections
//! - [`linear`] - Homography DLT and coordinate mapping
//! - [`analysis`] - Tracks, speeds and collision detection
//! - [`synthetic`] - Synthetic scenes for testing
//!
//! # Calibration lifecycle
//!
//! | Status    | Points editable | Matrix available |
//! |-----------|-----------------|------------------|
//! | `draft`   | yes             | no               |
//! | `solving` | no              | no               |
//! | `solved`  | yes             | yes              |
//! | `failed`  | yes             | no               |
//!
//! Editing the points of a solved session drops it back to `draft`.
//! Degenerate or insufficient point sets also leave the session in `draft`
//! with an error message the user can act on.

// ═══════════════════════════════════════════════════════════════════════════════
// Workflows
// ═══════════════════════════════════════════════════════════════════════════════

/// Calibration session framework.
pub mod session {
    pub use recon_pipeline::session::{
        HomographySession, LogEntry, PointEditReport, RejectedPoint, SESSION_SCHEMA_VERSION,
        SessionError, SessionMetadata, SessionState, SessionStatus, SharedSession,
        SolveTicket, SolvedCalibration,
    };
}

/// Per-project batch pass.
pub mod pipeline {
    pub use recon_pipeline::{
        AnalysisConfig, Enrichment, EnrichmentInput, ProjectInput, ProjectReport,
        analyze_project, enrich_detections, track_trajectory,
    };
}

/// Wire records.
pub mod records {
    pub use recon_pipeline::records::*;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Foundation crates
// ═══════════════════════════════════════════════════════════════════════════════

/// Core math types, geodetic projection and detector data.
pub mod core {
    pub use recon_core::*;
}

/// Homography estimation and coordinate mapping.
pub mod linear {
    pub use recon_linear::*;
}

/// Track grouping, speed estimation and collision detection.
pub mod analysis {
    pub use recon_analysis::*;
}

/// Synthetic calibration scenes and tracks.
pub mod synthetic {
    pub use recon_core::synthetic::*;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════════════════════════════════════════

/// Convenient re-exports for common use.
pub mod prelude {
    pub use crate::core::{
        BBox, BoxAnchor, CalibrationPoint, Detection, FrameSize, GeoPoint, GeoProjector, Mat3,
        Pt2, Real,
    };
    pub use crate::linear::{
        CoordinateMapper, HomographyError, HomographyOptions, HomographySolver, MappingOptions,
    };
    pub use crate::analysis::collision::{
        CollisionConfig, CollisionEvent, DistanceSpace, NearMiss, Severity,
    };
    pub use crate::analysis::{SpeedOptions, Track, TrackSpeedEstimator};
    pub use crate::pipeline::{AnalysisConfig, ProjectInput, ProjectReport, analyze_project};
    pub use crate::session::{HomographySession, SessionStatus};
}
