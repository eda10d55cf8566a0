//! Synthetic calibration scenes and object trajectories.

use std::ops::Range;

use super::noise::UniformNoise;
use crate::{
    BBox, CalibrationPoint, Detection, GeoError, GeoPoint, GeoProjector, Mat3, Pt2, Real, Vec2,
    from_homogeneous, to_homogeneous,
};

/// Ground-plane homography of an elevated street camera (normalized image → metres).
///
/// The projective row keeps `w ≥ 1` over the whole unit square, so every
/// in-frame point maps to a finite world position.
pub fn street_camera_homography() -> Mat3 {
    Mat3::new(40.0, 8.0, -20.0, 2.0, -60.0, 45.0, 0.05, 0.9, 1.0)
}

/// Regular `nx × ny` grid of normalized image points spanning `[0.1, 0.9]²`.
///
/// Points are ordered row-major (y major).
pub fn image_grid(nx: usize, ny: usize) -> Vec<Pt2> {
    let step = |n: usize, i: usize| {
        if n <= 1 {
            0.5
        } else {
            0.1 + 0.8 * i as Real / (n - 1) as Real
        }
    };
    let mut points = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            points.push(Pt2::new(step(nx, i), step(ny, j)));
        }
    }
    points
}

/// A known ground-plane homography placed on the map at `reference`.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationScene {
    pub homography: Mat3,
    pub projector: GeoProjector,
}

impl CalibrationScene {
    pub fn new(homography: Mat3, reference: GeoPoint) -> Result<Self, GeoError> {
        Ok(Self {
            homography,
            projector: GeoProjector::new(reference)?,
        })
    }

    /// Ground-truth world position (metres, scene frame) of an image point.
    pub fn world_of(&self, image: &Pt2) -> Pt2 {
        from_homogeneous(&(self.homography * to_homogeneous(image)))
    }

    /// Ground-truth map position of an image point.
    pub fn geo_of(&self, image: &Pt2) -> GeoPoint {
        self.projector.unproject(&self.world_of(image))
    }

    /// Exact correspondences for the given image points.
    pub fn points(&self, image: &[Pt2]) -> Vec<CalibrationPoint> {
        self.noisy_points(image, &UniformNoise::default())
    }

    /// Correspondences whose map positions are perturbed by `noise` (metres).
    pub fn noisy_points(&self, image: &[Pt2], noise: &UniformNoise) -> Vec<CalibrationPoint> {
        image
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let world = Pt2::from(noise.apply(0, i, self.world_of(p).coords));
                let geo = self.projector.unproject(&world);
                CalibrationPoint::new(p.x, p.y, geo.lat, geo.lng, i as u32)
            })
            .collect()
    }
}

/// Detections of one object moving at constant pixel velocity.
///
/// The box at frame `f` is `start` shifted by `velocity_px · (f - frames.start)`.
pub fn linear_track(track_id: u32, frames: Range<u32>, start: BBox, velocity_px: Vec2) -> Vec<Detection> {
    let first = frames.start;
    frames
        .map(|f| {
            let t = (f - first) as Real;
            let bbox = BBox::new(
                start.x + velocity_px.x * t,
                start.y + velocity_px.y * t,
                start.w,
                start.h,
            );
            Detection::new(f, Some(track_id), "car", 0.9, bbox)
        })
        .collect()
}
