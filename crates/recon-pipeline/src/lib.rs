//! Calibration sessions and the per-project reconstruction pass.
//!
//! - [`session`]: the [`HomographySession`](session::HomographySession)
//!   lifecycle and a lock-guarded [`SharedSession`](session::SharedSession).
//! - [`enrich_detections`]: world positions and speeds for a detection batch.
//! - [`analyze_project`]: enrichment followed by collision analysis, producing
//!   the report records in [`records`].
//!
//! Configuration for a run is one explicit [`AnalysisConfig`].

mod analysis;
mod config;
mod enrich;
pub mod records;
pub mod session;

pub use analysis::{ProjectInput, ProjectReport, analyze_project, track_trajectory};
pub use config::AnalysisConfig;
pub use enrich::{Enrichment, EnrichmentInput, enrich_detections};
