//! Core geometry primitives for `recon`.
//!
//! This crate provides the foundational building blocks used by all other
//! crates in the workspace:
//!
//! - linear algebra type aliases (`Real`, `Pt2`, `Mat3`, and friends),
//! - a local equirectangular projection from latitude/longitude to metres,
//! - bounding boxes, detections and calibration points as exchanged with the
//!   upstream detector/tracker and the calibration UI.
//!
//! Coordinate model (conceptually):
//! `world_m = H · image_norm`, `world_m = project(lat, lng)`
//!
//! where `image_norm` are image coordinates divided by the frame size and
//! `world_m` is a planar frame in metres anchored at the centroid of the
//! calibration points (x east, y north).
//!
//! # Modules
//!
//! - \[`math`\]: basic type aliases and homogeneous helpers.
//! - \[`geo`\]: geodetic points and the local planar projector.
//! - \[`types`\]: boxes, detections and calibration points.
//! - \[`synthetic`\]: deterministic synthetic data helpers (tests/examples/benchmarks).
//!
//! # Example
//!
//! ```
//! use recon_core::{GeoPoint, GeoProjector};
//!
//! let reference = GeoPoint::new(37.7749, -122.4194);
//! let projector = GeoProjector::new(reference).unwrap();
//! let p = projector.project(GeoPoint::new(37.7750, -122.4194)).unwrap();
//! assert!((p.y - 11.12).abs() < 0.01);
//! ```

/// Geodetic points and local planar projection.
mod geo;
/// Linear algebra type aliases and helpers.
mod math;
/// Deterministic synthetic data generation helpers.
///
/// Small, reusable building blocks for constructing synthetic calibration
/// scenes and box trajectories. Used in workspace tests and handy for
/// regression testing.
pub mod synthetic;
/// Boxes, detections and calibration points.
mod types;

pub use geo::*;
pub use math::*;
pub use types::*;
