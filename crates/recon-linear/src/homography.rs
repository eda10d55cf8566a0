//! Ground-plane homography estimation.
//!
//! Implements the normalized Direct Linear Transform (DLT). The homography `H`
//! maps **normalized image points** to **local ground-plane metres**:
//! `x_world ~ H x_image`.
//!
//! Map positions are first projected into a local planar frame anchored at
//! the centroid of the calibration points (see [`GeoProjector`]), so that the
//! linear algebra and the reprojection error are expressed in metres.
//!
//! Degenerate configurations are rejected instead of producing a meaningless
//! transform: coincident or collinear points on either side, no four
//! corresponding points free of collinear triples, a design matrix with more
//! than a one-dimensional null space, or a singular solution.

use log::debug;
use nalgebra::DMatrix;
use recon_core::{
    CalibrationPoint, GeoError, GeoPoint, GeoProjector, Mat3, Pt2, Real, to_homogeneous,
    try_from_homogeneous,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::{NormalizedPoints, general_position_quad, singular_ratio, spread_ratio};

/// Why a point configuration cannot determine a homography.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Degeneracy {
    #[error("all {set} points coincide")]
    CoincidentPoints { set: &'static str },
    #[error("{set} points are (nearly) collinear (spread ratio {ratio:.3e})")]
    Collinear { set: &'static str, ratio: Real },
    #[error("no four {set} points are free of collinear triples (best triangle ratio {ratio:.3e})")]
    CollinearTriples { set: &'static str, ratio: Real },
    #[error("linear system is rank deficient (singular value ratio {ratio:.3e})")]
    RankDeficient { ratio: Real },
    #[error("estimated transform is singular (determinant ratio {ratio:.3e})")]
    SingularTransform { ratio: Real },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HomographyError {
    #[error("need at least 4 point correspondences, got {0}")]
    InsufficientPoints(usize),
    #[error("correspondence count mismatch: {src} source vs {dst} destination points")]
    LengthMismatch { src: usize, dst: usize },
    #[error("calibration point {order_index} rejected: {source}")]
    InvalidPoint {
        order_index: u32,
        #[source]
        source: GeoError,
    },
    #[error(transparent)]
    Geo(#[from] GeoError),
    #[error("degenerate point configuration: {0}; spread the points out so that no three are collinear")]
    DegenerateConfiguration(#[from] Degeneracy),
    #[error("svd failed")]
    SvdFailed,
    #[error("estimated homography is not finite")]
    NonFinite,
    #[error("reprojection error {rms:.3} m exceeds tolerance {tolerance:.3} m")]
    ReprojectionTooLarge { rms: Real, tolerance: Real },
    #[error("invalid homography options: {0}")]
    InvalidOptions(String),
}

impl HomographyError {
    /// Errors the user fixes by editing the calibration points.
    ///
    /// The remaining variants are numerical solve failures.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            HomographyError::InsufficientPoints(_)
                | HomographyError::LengthMismatch { .. }
                | HomographyError::InvalidPoint { .. }
                | HomographyError::Geo(_)
                | HomographyError::DegenerateConfiguration(_)
        )
    }
}

/// Tolerances for [`HomographySolver`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomographyOptions {
    /// Minimum minor/major principal variance ratio of each point set.
    pub min_spread_ratio: Real,
    /// Minimum flatness score (twice the area over the squared longest side)
    /// every triangle of some four corresponding points must reach.
    pub min_triangle_ratio: Real,
    /// Minimum ratio of the second-smallest to the largest singular value of
    /// the normalized design matrix.
    pub rank_tolerance: Real,
    /// Minimum `|det H| / ‖H‖³` of the normalized solution.
    pub min_det_ratio: Real,
    /// Reject solutions whose RMS reprojection error (metres) exceeds this.
    pub max_reprojection_error_m: Option<Real>,
}

impl Default for HomographyOptions {
    fn default() -> Self {
        Self {
            min_spread_ratio: 1e-6,
            min_triangle_ratio: 1e-3,
            rank_tolerance: 1e-9,
            min_det_ratio: 1e-8,
            max_reprojection_error_m: Some(10.0),
        }
    }
}

impl HomographyOptions {
    pub fn validate(&self) -> Result<(), HomographyError> {
        for (name, value) in [
            ("min_spread_ratio", self.min_spread_ratio),
            ("min_triangle_ratio", self.min_triangle_ratio),
            ("rank_tolerance", self.rank_tolerance),
            ("min_det_ratio", self.min_det_ratio),
        ] {
            if !(value >= 0.0 && value < 1.0) {
                return Err(HomographyError::InvalidOptions(format!(
                    "{name} must lie in [0, 1), got {value}"
                )));
            }
        }
        match self.max_reprojection_error_m {
            Some(tol) if !(tol > 0.0) => Err(HomographyError::InvalidOptions(format!(
                "max_reprojection_error_m must be positive, got {tol}"
            ))),
            _ => Ok(()),
        }
    }
}

/// Summary of per-point reprojection residuals.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReprojectionStats {
    pub mean: Real,
    pub rms: Real,
    pub max: Real,
    pub count: usize,
}

impl ReprojectionStats {
    pub fn from_residuals(residuals: &[Real]) -> Self {
        if residuals.is_empty() {
            return Self::default();
        }
        let n = residuals.len() as Real;
        Self {
            mean: residuals.iter().sum::<Real>() / n,
            rms: (residuals.iter().map(|r| r * r).sum::<Real>() / n).sqrt(),
            max: residuals.iter().cloned().fold(0.0, Real::max),
            count: residuals.len(),
        }
    }
}

/// A solved ground-plane homography.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomographyEstimate {
    /// Normalized image → local metres, scaled so `H[2,2] == 1`.
    pub matrix: Mat3,
    /// Local frame the metres are expressed in.
    pub projector: GeoProjector,
    pub reprojection: ReprojectionStats,
    /// Per-point residuals in metres, in input order.
    pub residuals: Vec<Real>,
}

impl HomographyEstimate {
    /// RMS reprojection error in metres.
    pub fn reprojection_error(&self) -> Real {
        self.reprojection.rms
    }
}

/// Normalized DLT solver for image → ground-plane homographies.
#[derive(Debug, Clone, Copy)]
pub struct HomographySolver;

/// Estimate `H` such that `dst ~ H src` using the normalized DLT with default tolerances.
pub fn dlt_homography(src: &[Pt2], dst: &[Pt2]) -> Result<Mat3, HomographyError> {
    HomographySolver::dlt(src, dst, &HomographyOptions::default())
}

/// Residuals `|H src_i - dst_i|`; points mapped to infinity get `+inf`.
pub fn reprojection_residuals(h: &Mat3, src: &[Pt2], dst: &[Pt2]) -> Vec<Real> {
    src.iter()
        .zip(dst)
        .map(|(s, d)| match try_from_homogeneous(&(h * to_homogeneous(s)), 0.0) {
            Some(p) => (p - d).norm(),
            None => Real::INFINITY,
        })
        .collect()
}

impl HomographySolver {
    /// Solve the calibration of a session's points.
    ///
    /// Projects each map position through a [`GeoProjector`] anchored at the
    /// centroid of the points, runs the normalized DLT and scores the result
    /// by RMS reprojection error in metres.
    ///
    /// # Errors
    ///
    /// - [`HomographyError::InsufficientPoints`] for fewer than 4 points,
    /// - [`HomographyError::InvalidPoint`] for malformed coordinates,
    /// - [`HomographyError::DegenerateConfiguration`] for coincident or
    ///   collinear sets, sets without four points free of collinear triples,
    ///   and singular solutions,
    /// - [`HomographyError::NonFinite`] / [`HomographyError::ReprojectionTooLarge`]
    ///   for numerically unusable solutions.
    pub fn solve(
        points: &[CalibrationPoint],
        opts: &HomographyOptions,
    ) -> Result<HomographyEstimate, HomographyError> {
        opts.validate()?;
        if points.len() < 4 {
            return Err(HomographyError::InsufficientPoints(points.len()));
        }
        for p in points {
            p.validate().map_err(|source| HomographyError::InvalidPoint {
                order_index: p.order_index,
                source,
            })?;
        }

        let geo: Vec<GeoPoint> = points.iter().map(CalibrationPoint::world).collect();
        let projector = GeoProjector::from_centroid(&geo)?;
        let image: Vec<Pt2> = points.iter().map(CalibrationPoint::image).collect();
        let world = geo
            .iter()
            .map(|g| projector.project(*g))
            .collect::<Result<Vec<_>, _>>()?;

        let matrix = Self::dlt(&image, &world, opts)?;
        let residuals = reprojection_residuals(&matrix, &image, &world);
        let reprojection = ReprojectionStats::from_residuals(&residuals);

        if !reprojection.rms.is_finite() {
            return Err(HomographyError::NonFinite);
        }
        if let Some(tolerance) = opts.max_reprojection_error_m {
            if reprojection.rms > tolerance {
                return Err(HomographyError::ReprojectionTooLarge {
                    rms: reprojection.rms,
                    tolerance,
                });
            }
        }

        debug!(
            "homography solved from {} points: rms {:.4} m, max {:.4} m",
            points.len(),
            reprojection.rms,
            reprojection.max
        );

        Ok(HomographyEstimate {
            matrix,
            projector,
            reprojection,
            residuals,
        })
    }

    /// Estimate a homography `H` such that `dst ~ H src` using the normalized DLT.
    ///
    /// Uses Hartley normalization (zero-mean, average distance `√2`) on both
    /// sets and solves `A h = 0` via SVD on the design matrix `A`, taking the
    /// right singular vector of the smallest singular value. With exactly four
    /// points `A` is zero-padded to a square matrix. The result is scaled so
    /// that `H[2,2] == 1` when possible.
    pub fn dlt(src: &[Pt2], dst: &[Pt2], opts: &HomographyOptions) -> Result<Mat3, HomographyError> {
        let n = src.len();
        if dst.len() != n {
            return Err(HomographyError::LengthMismatch {
                src: n,
                dst: dst.len(),
            });
        }
        if n < 4 {
            return Err(HomographyError::InsufficientPoints(n));
        }

        let src_n = NormalizedPoints::new(src)
            .ok_or(Degeneracy::CoincidentPoints { set: "image" })?;
        let dst_n = NormalizedPoints::new(dst)
            .ok_or(Degeneracy::CoincidentPoints { set: "world" })?;

        for (set, pts) in [("image", &src_n.points), ("world", &dst_n.points)] {
            let ratio = spread_ratio(pts);
            if ratio < opts.min_spread_ratio {
                debug!("{set} points rejected as collinear: spread ratio {ratio:.3e}");
                return Err(Degeneracy::Collinear { set, ratio }.into());
            }
        }

        let tol = opts.min_triangle_ratio;
        let quad = general_position_quad(&src_n.points, &dst_n.points, tol);
        if quad.joint < tol {
            let set = if quad.image < tol {
                "image"
            } else if quad.world < tol {
                "world"
            } else {
                "paired"
            };
            debug!("{set} points rejected: best triangle ratio {:.3e}", quad.joint);
            return Err(Degeneracy::CollinearTriples {
                set,
                ratio: quad.joint,
            }
            .into());
        }

        // Exactly four points give 8 equations; zero rows pad the system to
        // square so the thin SVD still yields all nine right singular vectors.
        let mut a = DMatrix::<Real>::zeros((2 * n).max(9), 9);
        for (i, (s, d)) in src_n.points.iter().zip(&dst_n.points).enumerate() {
            let sh = [s.x, s.y, 1.0];
            for (row, target, block) in [(2 * i, d.x, 0), (2 * i + 1, d.y, 3)] {
                for k in 0..3 {
                    a[(row, block + k)] = -sh[k];
                    a[(row, 6 + k)] = target * sh[k];
                }
            }
        }

        let svd = a.svd(false, true);
        let v_t = svd.v_t.ok_or(HomographyError::SvdFailed)?;
        let sv = &svd.singular_values;

        let mut order: Vec<usize> = (0..sv.len()).collect();
        order.sort_by(|&i, &j| sv[i].total_cmp(&sv[j]));
        let smallest = order[0];
        let second = sv[order[1]];
        let largest = sv[order[order.len() - 1]];

        let ratio = if largest > 0.0 { second / largest } else { 0.0 };
        if !ratio.is_finite() || ratio < opts.rank_tolerance {
            debug!("design matrix rank deficient: singular value ratio {ratio:.3e}");
            return Err(Degeneracy::RankDeficient { ratio }.into());
        }

        let h = v_t.row(smallest);
        let h_norm = Mat3::from_fn(|r, c| h[3 * r + c]);
        let det_ratio = singular_ratio(&h_norm);
        if det_ratio < opts.min_det_ratio {
            debug!("normalized homography singular: determinant ratio {det_ratio:.3e}");
            return Err(Degeneracy::SingularTransform { ratio: det_ratio }.into());
        }
        let mut h_mat = dst_n.inverse * h_norm * src_n.transform;

        // normalise such that H[2,2] = 1
        let scale = h_mat[(2, 2)];
        if scale.abs() > Real::EPSILON {
            h_mat /= scale;
        }

        if h_mat.iter().any(|v| !v.is_finite()) {
            return Err(HomographyError::NonFinite);
        }
        Ok(h_mat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recon_core::from_homogeneous;

    fn apply(h: &Mat3, p: &Pt2) -> Pt2 {
        from_homogeneous(&(h * to_homogeneous(p)))
    }

    #[test]
    fn basic_homography() {
        let src = vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(1.0, 0.0),
            Pt2::new(1.0, 1.0),
            Pt2::new(0.0, 1.0),
        ];
        let dst = vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(2.0, 0.0),
            Pt2::new(2.0, 2.0),
            Pt2::new(0.0, 2.0),
        ];

        let h = dlt_homography(&src, &dst).unwrap();
        assert!((h[(0, 0)] - 2.0).abs() < 1e-9);
        assert!((h[(2, 2)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn recovers_projective_map_from_four_points() {
        let truth = Mat3::new(30.0, 5.0, -10.0, 1.0, -45.0, 20.0, 0.1, 0.6, 1.0);
        let src = vec![
            Pt2::new(0.1, 0.2),
            Pt2::new(0.9, 0.15),
            Pt2::new(0.85, 0.9),
            Pt2::new(0.2, 0.8),
        ];
        let dst: Vec<Pt2> = src.iter().map(|p| apply(&truth, p)).collect();

        let h = dlt_homography(&src, &dst).unwrap();
        for r in 0..3 {
            for c in 0..3 {
                assert!((h[(r, c)] - truth[(r, c)]).abs() < 1e-6, "H[{r},{c}]");
            }
        }
        let residuals = reprojection_residuals(&h, &src, &dst);
        assert!(residuals.iter().all(|r| *r < 1e-9));
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let src: Vec<Pt2> = (0..4).map(|i| Pt2::new(0.1 + 0.2 * i as Real, 0.5)).collect();
        let dst: Vec<Pt2> = (0..4).map(|i| Pt2::new(5.0 * i as Real, 1.0)).collect();
        let err = dlt_homography(&src, &dst).unwrap_err();
        assert!(matches!(
            err,
            HomographyError::DegenerateConfiguration(Degeneracy::Collinear { set: "image", .. })
        ));
        assert!(err.is_user_correctable());
    }

    #[test]
    fn duplicated_corner_leaves_no_general_quad() {
        let src = vec![
            Pt2::new(0.1, 0.1),
            Pt2::new(0.9, 0.1),
            Pt2::new(0.5, 0.9),
            Pt2::new(0.5, 0.9),
        ];
        let dst = vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(20.0, 0.0),
            Pt2::new(10.0, 30.0),
            Pt2::new(10.0, 30.0),
        ];
        let err = dlt_homography(&src, &dst).unwrap_err();
        assert!(
            matches!(
                err,
                HomographyError::DegenerateConfiguration(Degeneracy::CollinearTriples {
                    set: "image",
                    ..
                })
            ),
            "{err}"
        );
    }

    #[test]
    fn three_collinear_image_points_are_rejected_at_any_scale() {
        let src = vec![
            Pt2::new(0.1, 0.5),
            Pt2::new(0.5, 0.5),
            Pt2::new(0.9, 0.5),
            Pt2::new(0.5, 0.9),
        ];
        for side in [2.0, 5.0, 8.0, 12.0, 30.0, 60.0] {
            let dst = vec![
                Pt2::new(0.0, 0.0),
                Pt2::new(side, 0.0),
                Pt2::new(side, side),
                Pt2::new(0.0, side),
            ];
            let err = dlt_homography(&src, &dst).unwrap_err();
            assert!(
                matches!(
                    err,
                    HomographyError::DegenerateConfiguration(Degeneracy::CollinearTriples {
                        set: "image",
                        ..
                    })
                ),
                "side {side}: {err}"
            );
            assert!(err.is_user_correctable());
        }
    }

    #[test]
    fn collinear_world_triple_is_rejected() {
        let src = vec![
            Pt2::new(0.1, 0.1),
            Pt2::new(0.9, 0.1),
            Pt2::new(0.9, 0.9),
            Pt2::new(0.1, 0.9),
        ];
        let dst = vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(10.0, 5.0),
            Pt2::new(20.0, 10.0),
            Pt2::new(0.0, 20.0),
        ];
        let err = dlt_homography(&src, &dst).unwrap_err();
        assert!(
            matches!(
                err,
                HomographyError::DegenerateConfiguration(Degeneracy::CollinearTriples {
                    set: "world",
                    ..
                })
            ),
            "{err}"
        );
    }

    #[test]
    fn grid_rows_do_not_count_as_degenerate() {
        // Rows of a 3x3 grid are collinear triples, but corners are not.
        let src: Vec<Pt2> = (0..9)
            .map(|i| Pt2::new(0.1 + 0.4 * (i % 3) as Real, 0.1 + 0.4 * (i / 3) as Real))
            .collect();
        let h = Mat3::new(30.0, 4.0, -5.0, 1.0, -40.0, 25.0, 0.02, 0.6, 1.0);
        let dst: Vec<Pt2> = src.iter().map(|p| apply(&h, p)).collect();
        let est = dlt_homography(&src, &dst).unwrap();
        assert!((est - h).norm() < 1e-6);
    }

    #[test]
    fn coincident_points_are_degenerate() {
        let src = vec![Pt2::new(0.5, 0.5); 4];
        let dst = vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(1.0, 0.0),
            Pt2::new(1.0, 1.0),
            Pt2::new(0.0, 1.0),
        ];
        let err = dlt_homography(&src, &dst).unwrap_err();
        assert_eq!(
            err,
            HomographyError::DegenerateConfiguration(Degeneracy::CoincidentPoints { set: "image" })
        );
    }

    #[test]
    fn too_few_points() {
        let pts = vec![Pt2::new(0.0, 0.0); 3];
        assert_eq!(
            dlt_homography(&pts, &pts).unwrap_err(),
            HomographyError::InsufficientPoints(3)
        );
        assert_eq!(
            dlt_homography(&pts, &pts[..2]).unwrap_err(),
            HomographyError::LengthMismatch { src: 3, dst: 2 }
        );
    }

    #[test]
    fn options_validation() {
        assert!(HomographyOptions::default().validate().is_ok());
        let bad = HomographyOptions {
            max_reprojection_error_m: Some(0.0),
            ..HomographyOptions::default()
        };
        assert!(matches!(bad.validate(), Err(HomographyError::InvalidOptions(_))));
        let bad = HomographyOptions {
            min_triangle_ratio: 1.5,
            ..HomographyOptions::default()
        };
        assert!(matches!(bad.validate(), Err(HomographyError::InvalidOptions(m)) if m.contains("min_triangle_ratio")));
    }

    #[test]
    fn stats_from_residuals() {
        let s = ReprojectionStats::from_residuals(&[3.0, 4.0]);
        assert_eq!(s.count, 2);
        assert!((s.mean - 3.5).abs() < 1e-12);
        assert!((s.rms - 12.5f64.sqrt()).abs() < 1e-12);
        assert_eq!(s.max, 4.0);
        assert_eq!(ReprojectionStats::from_residuals(&[]), ReprojectionStats::default());
    }
}
