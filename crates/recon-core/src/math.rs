use nalgebra::{Matrix3, Point2, Vector2, Vector3};

/// Scalar type used throughout the workspace (currently `f64`).
pub type Real = f64;

/// 2D vector with [`Real`] components.
pub type Vec2 = Vector2<Real>;
/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 2D point with [`Real`] coordinates.
pub type Pt2 = Point2<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;

/// Convert a 2D point in Euclidean coordinates into homogeneous coordinates.
///
/// Given a point `p = (x, y)`, returns the homogeneous vector `(x, y, 1)`.
pub fn to_homogeneous(p: &Pt2) -> Vec3 {
    Vec3::new(p.x, p.y, 1.0)
}

/// Convert a 3D homogeneous vector back to a 2D point.
///
/// The input is interpreted as `(x, y, w)` and the result is `(x / w, y / w)`.
/// The caller is responsible for ensuring that `w != 0`; see
/// [`try_from_homogeneous`] for the checked variant.
pub fn from_homogeneous(v: &Vec3) -> Pt2 {
    Pt2::new(v.x / v.z, v.y / v.z)
}

/// Checked dehomogenisation.
///
/// Returns `None` when `|w| <= eps` (the point lies at or near infinity) or
/// when the result is not finite.
pub fn try_from_homogeneous(v: &Vec3, eps: Real) -> Option<Pt2> {
    if !v.z.is_finite() || v.z.abs() <= eps {
        return None;
    }
    let p = from_homogeneous(v);
    (p.x.is_finite() && p.y.is_finite()).then_some(p)
}

/// Row-major nested array view of a 3×3 matrix (the JSON wire shape).
pub fn mat3_to_rows(m: &Mat3) -> [[Real; 3]; 3] {
    let mut rows = [[0.0; 3]; 3];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = m[(r, c)];
        }
    }
    rows
}

/// Build a 3×3 matrix from row-major nested arrays.
pub fn mat3_from_rows(rows: &[[Real; 3]; 3]) -> Mat3 {
    let mut m = Mat3::zeros();
    for (r, row) in rows.iter().enumerate() {
        for (c, v) in row.iter().enumerate() {
            m[(r, c)] = *v;
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn homogeneous_roundtrip() {
        let p = Pt2::new(3.5, -2.0);
        let h = to_homogeneous(&p) * 4.0;
        let back = from_homogeneous(&h);
        assert!((back - p).norm() < 1e-12);
    }

    #[test]
    fn checked_dehomogenisation_rejects_points_at_infinity() {
        assert!(try_from_homogeneous(&Vec3::new(1.0, 2.0, 0.0), 1e-12).is_none());
        assert!(try_from_homogeneous(&Vec3::new(1.0, 2.0, 1e-15), 1e-12).is_none());
        assert!(try_from_homogeneous(&Vec3::new(1.0, 2.0, Real::NAN), 1e-12).is_none());
        let p = try_from_homogeneous(&Vec3::new(2.0, 4.0, 2.0), 1e-12).unwrap();
        assert_eq!(p, Pt2::new(1.0, 2.0));
    }

    #[test]
    fn rows_match_matrix_indexing() {
        let m = Mat3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        let rows = mat3_to_rows(&m);
        assert_eq!(rows[0], [1.0, 2.0, 3.0]);
        assert_eq!(rows[2], [7.0, 8.0, 9.0]);
        assert_eq!(mat3_from_rows(&rows), m);
    }
}
