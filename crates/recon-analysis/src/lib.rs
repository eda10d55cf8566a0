//! Track-level analysis of detector output.
//!
//! - [`TrackSpeedEstimator`]: smoothed ground speeds from world-mapped positions.
//! - [`group_tracks`]: per-frame detections into frame-ordered [`Track`]s.
//! - [`collision`]: IoU/distance contact runs between track pairs, with
//!   key frames, severity and near misses.
//!
//! Collision detection only needs pixel boxes and works without a
//! calibration; speeds need world positions.
//!
//! ```
//! use recon_analysis::collision::{CollisionConfig, detect_all};
//! use recon_analysis::group_tracks;
//! use recon_core::synthetic::scene::linear_track;
//! use recon_core::{BBox, Vec2};
//!
//! let mut detections = linear_track(1, 0..30, BBox::new(0.0, 100.0, 40.0, 40.0), Vec2::new(10.0, 0.0));
//! detections.extend(linear_track(2, 0..30, BBox::new(300.0, 100.0, 40.0, 40.0), Vec2::new(-5.0, 0.0)));
//!
//! let tracks = group_tracks(&detections).unwrap();
//! let analysis = detect_all(&tracks, &CollisionConfig::default()).unwrap();
//! assert_eq!(analysis.collisions.len(), 1);
//! ```

pub mod collision;
mod speed;
mod track;

pub use speed::*;
pub use track::*;
