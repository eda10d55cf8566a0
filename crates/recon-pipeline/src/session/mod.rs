//! Calibration session framework.
//!
//! A [`HomographySession`] owns the user-marked calibration points of one
//! project and its solve lifecycle (`draft → solving → solved | failed`).
//! The solved transform lives inside [`SessionState::Solved`], so a matrix
//! can only be observed on a solved session.
//!
//! ```
//! use recon_core::GeoPoint;
//! use recon_core::synthetic::scene::{CalibrationScene, image_grid, street_camera_homography};
//! use recon_linear::HomographyOptions;
//! use recon_pipeline::session::{HomographySession, SessionStatus};
//!
//! let scene = CalibrationScene::new(street_camera_homography(), GeoPoint::new(51.5, -0.12)).unwrap();
//! let mut session = HomographySession::new("session-1", "project-1");
//! session.replace_points(scene.points(&image_grid(2, 2))).unwrap();
//!
//! let response = session.solve(&HomographyOptions::default()).unwrap();
//! assert!(response.success);
//! assert_eq!(session.status(), SessionStatus::Solved);
//! ```

mod homography_session;
mod shared;
mod types;

pub use homography_session::{
    HomographySession, PointEditReport, RejectedPoint, SessionError, SolveTicket,
};
pub use shared::SharedSession;
pub use types::{
    LogEntry, SESSION_SCHEMA_VERSION, SessionMetadata, SessionState, SessionStatus,
    SolvedCalibration, current_timestamp,
};
