//! Numerical conditioning helpers for the linear solvers.
//!
//! Calibration points arrive in two unrelated unit systems: normalized image
//! units around `0.5` and metres spanning tens of metres. The DLT is solved
//! on similarity-normalized copies of both sets (centroid at the origin, mean
//! distance `√2`) and the result is mapped back with the stored transforms.
//!
//! ```
//! use recon_core::Pt2;
//! use recon_linear::math::NormalizedPoints;
//!
//! let set = NormalizedPoints::new(&[
//!     Pt2::new(100.0, 200.0),
//!     Pt2::new(150.0, 250.0),
//!     Pt2::new(120.0, 220.0),
//! ])
//! .unwrap();
//! let centroid = set.points.iter().fold(Pt2::origin(), |c, p| c + p.coords / 3.0);
//! assert!(centroid.coords.norm() < 1e-12);
//! ```

use recon_core::{Mat3, Pt2, Real, Vec2};

/// A point set moved to a well-conditioned similarity frame.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPoints {
    pub points: Vec<Pt2>,
    /// `p_norm = transform · p` in homogeneous coordinates.
    pub transform: Mat3,
    /// Inverse of `transform`.
    pub inverse: Mat3,
}

impl NormalizedPoints {
    /// `None` for an empty set or when every point coincides.
    pub fn new(points: &[Pt2]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as Real;
        let centroid: Vec2 = points.iter().map(|p| p.coords).sum::<Vec2>() / n;
        let mean_dist = points.iter().map(|p| (p.coords - centroid).norm()).sum::<Real>() / n;
        if !mean_dist.is_finite() || mean_dist <= Real::EPSILON {
            return None;
        }

        let s = std::f64::consts::SQRT_2 / mean_dist;
        let transform = Mat3::new(
            s, 0.0, -s * centroid.x, //
            0.0, s, -s * centroid.y, //
            0.0, 0.0, 1.0,
        );
        let inverse = Mat3::new(
            1.0 / s, 0.0, centroid.x, //
            0.0, 1.0 / s, centroid.y, //
            0.0, 0.0, 1.0,
        );
        let points = points
            .iter()
            .map(|p| Pt2::from((p.coords - centroid) * s))
            .collect();
        Some(Self {
            points,
            transform,
            inverse,
        })
    }
}

/// Ratio of the minor to the major principal variance of a point set.
///
/// `0` for collinear sets, `1` for isotropic ones. Scale invariant, so it can
/// be applied to raw or normalized points alike. Returns `0` for fewer than
/// two distinct points.
pub fn spread_ratio(points: &[Pt2]) -> Real {
    if points.len() < 2 {
        return 0.0;
    }
    let n = points.len() as Real;
    let cx = points.iter().map(|p| p.x).sum::<Real>() / n;
    let cy = points.iter().map(|p| p.y).sum::<Real>() / n;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for p in points {
        let dx = p.x - cx;
        let dy = p.y - cy;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    // Closed-form eigenvalues of the symmetric 2x2 scatter matrix.
    let mean = 0.5 * (sxx + syy);
    let radius = (0.25 * (sxx - syy).powi(2) + sxy * sxy).sqrt();
    let major = mean + radius;
    let minor = (mean - radius).max(0.0);

    if !(major > 0.0) {
        return 0.0;
    }
    minor / major
}

/// Flatness of a triangle: twice its area over its squared longest side.
///
/// `0` for collinear or coincident corners, `√3/2` for an equilateral one.
/// Scale invariant.
pub fn triangle_ratio(a: &Pt2, b: &Pt2, c: &Pt2) -> Real {
    let (ab, ac, bc) = (b - a, c - a, c - b);
    let longest = ab
        .norm_squared()
        .max(ac.norm_squared())
        .max(bc.norm_squared());
    if !(longest > 0.0) {
        return 0.0;
    }
    let r = ab.perp(&ac).abs() / longest;
    if r.is_finite() { r } else { 0.0 }
}

/// Flattest of the four triangles a quadruple of points spans.
fn quad_ratio(pts: &[Pt2], [i, j, k, l]: [usize; 4]) -> Real {
    [(i, j, k), (i, j, l), (i, k, l), (j, k, l)]
        .into_iter()
        .map(|(a, b, c)| triangle_ratio(&pts[a], &pts[b], &pts[c]))
        .fold(Real::INFINITY, Real::min)
}

/// Best [`triangle_ratio`] of a four-point subset with no flat triangle.
///
/// A homography is pinned down by four correspondences of which no three
/// are collinear on either side. `joint` scores the same indices in both
/// sets; `image`/`world` score each set alone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadSearch {
    pub image: Real,
    pub world: Real,
    pub joint: Real,
}

/// Search the index quadruples of `src`/`dst` for one in general position.
///
/// Stops at the first quadruple whose joint score reaches `min_ratio`; the
/// per-set scores are exhaustive only when none does.
pub fn general_position_quad(src: &[Pt2], dst: &[Pt2], min_ratio: Real) -> QuadSearch {
    let n = src.len().min(dst.len());
    let mut best = QuadSearch {
        image: 0.0,
        world: 0.0,
        joint: 0.0,
    };
    for i in 0..n {
        for j in i + 1..n {
            for k in j + 1..n {
                for l in k + 1..n {
                    let image = quad_ratio(src, [i, j, k, l]);
                    let world = quad_ratio(dst, [i, j, k, l]);
                    best.image = best.image.max(image);
                    best.world = best.world.max(world);
                    best.joint = best.joint.max(image.min(world));
                    if best.joint >= min_ratio {
                        return best;
                    }
                }
            }
        }
    }
    best
}

/// `|det M| / ‖M‖³` (Frobenius norm): `0` for singular matrices, `3^-1.5`
/// for a scaled identity.
pub fn singular_ratio(m: &Mat3) -> Real {
    let norm = m.norm();
    if !(norm > 0.0) {
        return 0.0;
    }
    let r = m.determinant().abs() / norm.powi(3);
    if r.is_finite() { r } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_set_is_centred_at_unit_scale() {
        let pts = vec![
            Pt2::new(10.0, 10.0),
            Pt2::new(30.0, 10.0),
            Pt2::new(30.0, 50.0),
            Pt2::new(10.0, 50.0),
        ];
        let set = NormalizedPoints::new(&pts).unwrap();

        let centroid: Vec2 = set.points.iter().map(|p| p.coords).sum::<Vec2>() / 4.0;
        assert!(centroid.norm() < 1e-12);
        let mean_dist: Real = set.points.iter().map(|p| p.coords.norm()).sum::<Real>() / 4.0;
        assert!((mean_dist - 2f64.sqrt()).abs() < 1e-12);

        let mapped = set.transform * recon_core::to_homogeneous(&pts[2]);
        assert!((mapped.xy() - set.points[2].coords).norm() < 1e-12);
        assert!((set.inverse * set.transform - Mat3::identity()).norm() < 1e-12);
    }

    #[test]
    fn coincident_or_empty_sets_cannot_be_normalized() {
        assert!(NormalizedPoints::new(&[Pt2::new(1.0, 1.0); 4]).is_none());
        assert!(NormalizedPoints::new(&[]).is_none());
    }

    #[test]
    fn spread_ratio_detects_lines() {
        let line: Vec<Pt2> = (0..5).map(|i| Pt2::new(i as Real, 2.0 * i as Real + 1.0)).collect();
        assert!(spread_ratio(&line) < 1e-12);

        let square = vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(1.0, 0.0),
            Pt2::new(1.0, 1.0),
            Pt2::new(0.0, 1.0),
        ];
        assert!((spread_ratio(&square) - 1.0).abs() < 1e-12);

        assert_eq!(spread_ratio(&[Pt2::new(3.0, 3.0); 3]), 0.0);
    }

    #[test]
    fn flat_triangles_score_zero() {
        let a = Pt2::new(0.0, 0.0);
        let b = Pt2::new(2.0, 0.0);
        assert_eq!(triangle_ratio(&a, &b, &Pt2::new(5.0, 0.0)), 0.0);
        assert_eq!(triangle_ratio(&a, &a, &a), 0.0);
        let equilateral = triangle_ratio(&a, &b, &Pt2::new(1.0, 3f64.sqrt()));
        assert!((equilateral - 3f64.sqrt() / 2.0).abs() < 1e-12);
        // Same shape, different scale.
        let big = triangle_ratio(&Pt2::origin(), &Pt2::new(200.0, 0.0), &Pt2::new(100.0, 1.0));
        let small = triangle_ratio(&Pt2::origin(), &Pt2::new(2.0, 0.0), &Pt2::new(1.0, 0.01));
        assert!((big - small).abs() < 1e-12);
    }

    #[test]
    fn quad_search_needs_no_three_collinear() {
        let square = vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(1.0, 0.0),
            Pt2::new(1.0, 1.0),
            Pt2::new(0.0, 1.0),
        ];
        let three_on_a_line = vec![
            Pt2::new(0.1, 0.5),
            Pt2::new(0.5, 0.5),
            Pt2::new(0.9, 0.5),
            Pt2::new(0.5, 0.9),
        ];
        let found = general_position_quad(&square, &square, 1e-3);
        assert!(found.joint >= 1e-3);

        let flat = general_position_quad(&three_on_a_line, &square, 1e-3);
        assert_eq!(flat.image, 0.0);
        assert!(flat.world > 0.4);
        assert_eq!(flat.joint, 0.0);

        // A fifth point off the line rescues the image set.
        let mut five = three_on_a_line.clone();
        five.push(Pt2::new(0.2, 0.1));
        let mut square5 = square.clone();
        square5.push(Pt2::new(0.3, 0.6));
        assert!(general_position_quad(&five, &square5, 1e-3).joint >= 1e-3);
    }

    #[test]
    fn singular_matrices_are_flagged() {
        assert!((singular_ratio(&Mat3::identity()) - 3f64.powf(-1.5)).abs() < 1e-12);
        let rank_two = Mat3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 1.0, 1.0);
        assert!(singular_ratio(&rank_two) < 1e-12);
        assert_eq!(singular_ratio(&Mat3::zeros()), 0.0);
    }
}
