//! Geodetic points and a local planar projection.
//!
//! Calibration points are marked on a map as latitude/longitude. Homography
//! estimation and speed computation need a Euclidean frame, so positions are
//! projected into a local tangent plane in metres using the equirectangular
//! approximation:
//!
//! ```text
//! x = R · Δλ · cos(φ₀)      (east)
//! y = R · Δφ                (north)
//! ```
//!
//! with `R` the mean Earth radius and `φ₀` the reference latitude. For the
//! extents of a single intersection (tens to hundreds of metres) the error
//! against the great-circle distance is far below detector noise.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Pt2, Real};

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: Real = 6_371_000.0;

/// Smallest `cos(φ₀)` accepted for a projection reference.
const MIN_REFERENCE_COS: Real = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeoError {
    #[error(
        "invalid coordinate (lat {lat}, lng {lng}): latitude must lie in [-90, 90] and longitude in [-180, 180]"
    )]
    InvalidCoordinate { lat: Real, lng: Real },
    #[error("invalid image coordinate ({x}, {y}): normalized coordinates must lie in [0, 1]")]
    InvalidImageCoordinate { x: Real, y: Real },
    #[error("reference latitude {lat} is too close to a pole for a planar projection")]
    PolarReference { lat: Real },
    #[error("no points to anchor the local frame")]
    NoReferencePoints,
}

/// A WGS84 latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: Real,
    pub lng: Real,
}

impl GeoPoint {
    pub fn new(lat: Real, lng: Real) -> Self {
        Self { lat, lng }
    }

    /// Reject non-finite or out-of-range coordinates.
    pub fn validate(&self) -> Result<(), GeoError> {
        let finite = self.lat.is_finite() && self.lng.is_finite();
        if !finite || self.lat.abs() > 90.0 || self.lng.abs() > 180.0 {
            return Err(GeoError::InvalidCoordinate {
                lat: self.lat,
                lng: self.lng,
            });
        }
        Ok(())
    }

    /// Great-circle distance in metres (haversine formula).
    pub fn haversine_distance(&self, other: &GeoPoint) -> Real {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = lat2 - lat1;
        let dlng = (other.lng - self.lng).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
    }
}

/// Wrap a longitude difference into `[-180, 180)`.
fn wrap_degrees(d: Real) -> Real {
    (d + 180.0).rem_euclid(360.0) - 180.0
}

/// Local equirectangular projection anchored at a reference point.
///
/// Serialized as its reference point; the cached scale is recomputed on load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeoPoint", into = "GeoPoint")]
pub struct GeoProjector {
    reference: GeoPoint,
    cos_ref: Real,
}

impl GeoProjector {
    /// Create a projector anchored at `reference`.
    ///
    /// # Errors
    ///
    /// [`GeoError::InvalidCoordinate`] for malformed input and
    /// [`GeoError::PolarReference`] when the reference sits on a pole.
    pub fn new(reference: GeoPoint) -> Result<Self, GeoError> {
        reference.validate()?;
        let cos_ref = reference.lat.to_radians().cos();
        if cos_ref < MIN_REFERENCE_COS {
            return Err(GeoError::PolarReference { lat: reference.lat });
        }
        Ok(Self { reference, cos_ref })
    }

    /// Create a projector anchored at the centroid of `points`.
    ///
    /// Longitudes are averaged as offsets from the first point so that sets
    /// straddling the antimeridian get a sensible centroid.
    pub fn from_centroid(points: &[GeoPoint]) -> Result<Self, GeoError> {
        let first = points.first().ok_or(GeoError::NoReferencePoints)?;
        for p in points {
            p.validate()?;
        }

        let n = points.len() as Real;
        let lat = points.iter().map(|p| p.lat).sum::<Real>() / n;
        let dlng = points
            .iter()
            .map(|p| wrap_degrees(p.lng - first.lng))
            .sum::<Real>()
            / n;

        Self::new(GeoPoint::new(lat, wrap_degrees(first.lng + dlng)))
    }

    pub fn reference(&self) -> GeoPoint {
        self.reference
    }

    /// Project a geodetic point into the local frame (metres, x east, y north).
    pub fn project(&self, p: GeoPoint) -> Result<Pt2, GeoError> {
        p.validate()?;
        let dlat = (p.lat - self.reference.lat).to_radians();
        let dlng = wrap_degrees(p.lng - self.reference.lng).to_radians();
        Ok(Pt2::new(
            EARTH_RADIUS_M * dlng * self.cos_ref,
            EARTH_RADIUS_M * dlat,
        ))
    }

    /// Inverse of [`project`](Self::project).
    pub fn unproject(&self, p: &Pt2) -> GeoPoint {
        let lat = self.reference.lat + (p.y / EARTH_RADIUS_M).to_degrees();
        let lng = self.reference.lng + (p.x / (EARTH_RADIUS_M * self.cos_ref)).to_degrees();
        GeoPoint::new(lat, wrap_degrees(lng))
    }
}

impl TryFrom<GeoPoint> for GeoProjector {
    type Error = GeoError;

    fn try_from(reference: GeoPoint) -> Result<Self, Self::Error> {
        Self::new(reference)
    }
}

impl From<GeoProjector> for GeoPoint {
    fn from(projector: GeoProjector) -> Self {
        projector.reference
    }
}
