//! Image → ground-plane mapping with a solved homography.

use recon_core::{BBox, BoxAnchor, FrameSize, Mat3, Pt2, Real, to_homogeneous};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum MappingError {
    #[error("image point ({x}, {y}) maps to infinity (w = {w:.3e})")]
    PointAtInfinity { x: Real, y: Real, w: Real },
    #[error("image point ({x}, {y}) is not finite")]
    NonFinite { x: Real, y: Real },
    #[error("frame size must be positive")]
    InvalidFrameSize,
    #[error("bounding box is not finite or has negative size")]
    InvalidBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingOptions {
    /// Homogeneous `|w|` at or below which a point is treated as at infinity.
    pub w_epsilon: Real,
    /// Box point used as the object position.
    pub anchor: BoxAnchor,
}

impl Default for MappingOptions {
    fn default() -> Self {
        Self {
            w_epsilon: 1e-9,
            anchor: BoxAnchor::Center,
        }
    }
}

/// Apply `h` to a normalized image point.
///
/// Fails instead of returning infinite or NaN coordinates when the point
/// lies on (or near) the homography's line at infinity.
pub fn map_point(h: &Mat3, p: &Pt2, w_epsilon: Real) -> Result<Pt2, MappingError> {
    if !(p.x.is_finite() && p.y.is_finite()) {
        return Err(MappingError::NonFinite { x: p.x, y: p.y });
    }
    let v = h * to_homogeneous(p);
    if !v.z.is_finite() || v.z.abs() <= w_epsilon {
        return Err(MappingError::PointAtInfinity {
            x: p.x,
            y: p.y,
            w: v.z,
        });
    }
    let out = Pt2::new(v.x / v.z, v.y / v.z);
    if !(out.x.is_finite() && out.y.is_finite()) {
        return Err(MappingError::NonFinite { x: p.x, y: p.y });
    }
    Ok(out)
}

/// Maps normalized image coordinates to local ground-plane metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateMapper {
    matrix: Mat3,
    options: MappingOptions,
}

impl CoordinateMapper {
    pub fn new(matrix: Mat3, options: MappingOptions) -> Self {
        Self { matrix, options }
    }

    pub fn matrix(&self) -> &Mat3 {
        &self.matrix
    }

    pub fn options(&self) -> &MappingOptions {
        &self.options
    }

    pub fn map(&self, image: &Pt2) -> Result<Pt2, MappingError> {
        map_point(&self.matrix, image, self.options.w_epsilon)
    }

    pub fn map_normalized(&self, x: Real, y: Real) -> Result<Pt2, MappingError> {
        self.map(&Pt2::new(x, y))
    }

    /// World position of a pixel-space box in a frame of the given size.
    ///
    /// The box is reduced to its configured anchor point and normalized by
    /// the frame dimensions before mapping.
    pub fn map_box(&self, bbox: &BBox, frame: FrameSize) -> Result<Pt2, MappingError> {
        if !frame.is_valid() {
            return Err(MappingError::InvalidFrameSize);
        }
        if !bbox.is_valid() {
            return Err(MappingError::InvalidBox);
        }
        self.map(&frame.normalize(&bbox.anchor(self.options.anchor)))
    }
}
