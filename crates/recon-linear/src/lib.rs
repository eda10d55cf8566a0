//! Linear ground-plane calibration.
//!
//! - [`HomographySolver`]: normalized DLT from user-marked image↔map
//!   correspondences, with degeneracy detection and reprojection statistics.
//! - [`CoordinateMapper`]: applies a solved homography to image points and
//!   detection boxes.
//! - [`math`]: Hartley normalization and point-spread diagnostics.
//!
//! ```
//! use recon_core::GeoPoint;
//! use recon_core::synthetic::scene::{CalibrationScene, image_grid, street_camera_homography};
//! use recon_linear::{CoordinateMapper, HomographyOptions, HomographySolver, MappingOptions};
//!
//! let scene = CalibrationScene::new(street_camera_homography(), GeoPoint::new(45.0, 7.0)).unwrap();
//! let est = HomographySolver::solve(&scene.points(&image_grid(2, 2)), &HomographyOptions::default()).unwrap();
//! assert!(est.reprojection_error() < 1e-6);
//!
//! let mapper = CoordinateMapper::new(est.matrix, MappingOptions::default());
//! let world = mapper.map_normalized(0.5, 0.5).unwrap();
//! assert!(world.x.is_finite() && world.y.is_finite());
//! ```

mod homography;
mod mapping;
pub mod math;

pub use homography::*;
pub use mapping::*;
