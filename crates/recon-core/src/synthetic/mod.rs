//! Deterministic synthetic data generation helpers.
//!
//! Small building blocks for constructing synthetic calibration scenes and
//! object trajectories used in tests and examples:
//! - ground-plane homographies and the calibration points they induce,
//! - constant-velocity box trajectories,
//! - deterministic pseudo-random noise utilities.
//!
//! The helpers are intentionally lightweight (no RNG dependency) and
//! deterministic (explicit seeds; stable point ordering).
//!
//! # Example
//!
//! ```
//! use recon_core::GeoPoint;
//! use recon_core::synthetic::scene::{CalibrationScene, image_grid, street_camera_homography};
//!
//! let scene = CalibrationScene::new(street_camera_homography(), GeoPoint::new(48.8566, 2.3522)).unwrap();
//! let points = scene.points(&image_grid(3, 2));
//! assert_eq!(points.len(), 6);
//! assert!(points.iter().all(|p| p.validate().is_ok()));
//! ```

pub mod noise;
pub mod scene;
