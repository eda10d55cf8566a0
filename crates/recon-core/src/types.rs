//! Data exchanged with the upstream detector/tracker and the calibration UI.

use serde::{Deserialize, Serialize};

use crate::{GeoError, GeoPoint, Pt2, Real};

/// Axis-aligned bounding box in pixels: top-left corner plus size.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x: Real,
    pub y: Real,
    pub w: Real,
    pub h: Real,
}

/// Which point of a box stands for the object's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxAnchor {
    /// Geometric centre of the box.
    #[default]
    Center,
    /// Middle of the bottom edge (ground contact for upright boxes).
    BottomCenter,
}

impl BBox {
    pub fn new(x: Real, y: Real, w: Real, h: Real) -> Self {
        Self { x, y, w, h }
    }

    pub fn x2(&self) -> Real {
        self.x + self.w
    }

    pub fn y2(&self) -> Real {
        self.y + self.h
    }

    /// Finite coordinates and non-negative size.
    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.w, self.h].iter().all(|v| v.is_finite())
            && self.w >= 0.0
            && self.h >= 0.0
    }

    #[inline]
    pub fn area(&self) -> Real {
        self.w.max(0.0) * self.h.max(0.0)
    }

    pub fn center(&self) -> Pt2 {
        Pt2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn anchor(&self, anchor: BoxAnchor) -> Pt2 {
        match anchor {
            BoxAnchor::Center => self.center(),
            BoxAnchor::BottomCenter => Pt2::new(self.x + self.w / 2.0, self.y2()),
        }
    }

    /// Intersection over union, always in `[0, 1]`.
    ///
    /// Symmetric; `1.0` for identical non-empty boxes, `0.0` for boxes that
    /// are disjoint or only touch, and `0.0` for degenerate or non-finite input.
    #[inline]
    pub fn iou(&self, other: &BBox) -> Real {
        let iw = (self.x2().min(other.x2()) - self.x.max(other.x)).max(0.0);
        let ih = (self.y2().min(other.y2()) - self.y.max(other.y)).max(0.0);
        let inter = iw * ih;
        let union = self.area() + other.area() - inter;

        if !(union > 0.0) {
            return 0.0;
        }
        let iou = inter / union;
        if iou.is_finite() { iou.clamp(0.0, 1.0) } else { 0.0 }
    }

    /// Closed-interval intersection test (touching boxes intersect).
    pub fn intersects(&self, other: &BBox) -> bool {
        self.x <= other.x2() && other.x <= self.x2() && self.y <= other.y2() && other.y <= self.y2()
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BBox) -> BBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        BBox::new(
            x,
            y,
            self.x2().max(other.x2()) - x,
            self.y2().max(other.y2()) - y,
        )
    }

    /// Grow by `margin` on every side.
    pub fn expanded(&self, margin: Real) -> BBox {
        BBox::new(
            self.x - margin,
            self.y - margin,
            self.w + 2.0 * margin,
            self.h + 2.0 * margin,
        )
    }
}

/// Pixel dimensions of the analysed video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Pixel position to normalized `[0, 1]` image coordinates.
    pub fn normalize(&self, p: &Pt2) -> Pt2 {
        Pt2::new(p.x / self.width as Real, p.y / self.height as Real)
    }
}

/// One per-frame detection as produced by the detector/tracker.
///
/// The bounding box travels flat (`bbox_x`, …) on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub frame_idx: u32,
    /// Tracker identity; untracked detections carry `None` and are ignored
    /// by track-level analysis.
    #[serde(default)]
    pub track_id: Option<u32>,
    #[serde(alias = "class_label")]
    pub class_name: String,
    pub confidence: Real,
    pub bbox_x: Real,
    pub bbox_y: Real,
    pub bbox_w: Real,
    pub bbox_h: Real,
    /// World position in metres, present once the detection has been mapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_x: Option<Real>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_y: Option<Real>,
}

impl Detection {
    pub fn new(
        frame_idx: u32,
        track_id: Option<u32>,
        class_name: impl Into<String>,
        confidence: Real,
        bbox: BBox,
    ) -> Self {
        Self {
            frame_idx,
            track_id,
            class_name: class_name.into(),
            confidence,
            bbox_x: bbox.x,
            bbox_y: bbox.y,
            bbox_w: bbox.w,
            bbox_h: bbox.h,
            world_x: None,
            world_y: None,
        }
    }

    pub fn bbox(&self) -> BBox {
        BBox::new(self.bbox_x, self.bbox_y, self.bbox_w, self.bbox_h)
    }

    pub fn world(&self) -> Option<Pt2> {
        Some(Pt2::new(self.world_x?, self.world_y?))
    }

    pub fn with_world(mut self, world: Pt2) -> Self {
        self.world_x = Some(world.x);
        self.world_y = Some(world.y);
        self
    }
}

/// A user-marked correspondence between an image position and a map position.
///
/// Field names on the wire follow the calibration UI (`map_lat`, `map_lng`,
/// `order_idx`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub image_x_norm: Real,
    pub image_y_norm: Real,
    #[serde(rename = "map_lat", alias = "world_lat")]
    pub world_lat: Real,
    #[serde(rename = "map_lng", alias = "world_lng")]
    pub world_lng: Real,
    #[serde(rename = "order_idx", alias = "order_index", default)]
    pub order_index: u32,
}

impl CalibrationPoint {
    pub fn new(
        image_x_norm: Real,
        image_y_norm: Real,
        world_lat: Real,
        world_lng: Real,
        order_index: u32,
    ) -> Self {
        Self {
            image_x_norm,
            image_y_norm,
            world_lat,
            world_lng,
            order_index,
        }
    }

    pub fn image(&self) -> Pt2 {
        Pt2::new(self.image_x_norm, self.image_y_norm)
    }

    pub fn world(&self) -> GeoPoint {
        GeoPoint::new(self.world_lat, self.world_lng)
    }

    /// Image coordinates must be normalized; map coordinates must be valid lat/lng.
    pub fn validate(&self) -> Result<(), GeoError> {
        let in_unit = |v: Real| (0.0..=1.0).contains(&v);
        if !in_unit(self.image_x_norm) || !in_unit(self.image_y_norm) {
            return Err(GeoError::InvalidImageCoordinate {
                x: self.image_x_norm,
                y: self.image_y_norm,
            });
        }
        self.world().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_matches_hand_computed_overlap() {
        let a = BBox::new(600.0, 400.0, 100.0, 80.0);
        let b = BBox::new(650.0, 420.0, 100.0, 80.0);
        // 50 x 60 overlap, union 8000 + 8000 - 3000.
        let expected = 3000.0 / 13000.0;
        assert!((a.iou(&b) - expected).abs() < 1e-12);
        assert_eq!(a.iou(&b), b.iou(&a));
    }

    #[test]
    fn iou_edge_cases() {
        let a = BBox::new(10.0, 10.0, 20.0, 20.0);
        assert_eq!(a.iou(&a), 1.0);

        let far = BBox::new(100.0, 100.0, 5.0, 5.0);
        assert_eq!(a.iou(&far), 0.0);

        let touching = BBox::new(30.0, 10.0, 20.0, 20.0);
        assert_eq!(a.iou(&touching), 0.0);
        assert!(a.intersects(&touching));

        let empty = BBox::new(15.0, 15.0, 0.0, 0.0);
        assert_eq!(empty.iou(&empty), 0.0);

        let negative = BBox::new(15.0, 15.0, -5.0, 10.0);
        assert_eq!(a.iou(&negative), 0.0);

        let nan = BBox::new(Real::NAN, 0.0, 1.0, 1.0);
        assert_eq!(a.iou(&nan), 0.0);
    }

    #[test]
    fn iou_stays_in_unit_interval() {
        let boxes = [
            BBox::new(0.0, 0.0, 10.0, 10.0),
            BBox::new(5.0, 5.0, 10.0, 10.0),
            BBox::new(2.0, 2.0, 3.0, 3.0),
            BBox::new(-4.0, 1.0, 30.0, 2.0),
            BBox::new(1e9, 1e9, 1e-9, 1e-9),
        ];
        for a in &boxes {
            for b in &boxes {
                let v = a.iou(b);
                assert!((0.0..=1.0).contains(&v), "{a:?} {b:?} -> {v}");
                assert_eq!(v, b.iou(a));
            }
        }
    }

    #[test]
    fn union_and_expansion() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(20.0, -5.0, 5.0, 5.0);
        assert_eq!(a.union(&b), BBox::new(0.0, -5.0, 25.0, 15.0));
        assert!(!a.intersects(&b));
        assert!(a.expanded(10.0).intersects(&b));
    }

    #[test]
    fn anchors() {
        let b = BBox::new(10.0, 20.0, 40.0, 30.0);
        assert_eq!(b.anchor(BoxAnchor::Center), Pt2::new(30.0, 35.0));
        assert_eq!(b.anchor(BoxAnchor::BottomCenter), Pt2::new(30.0, 50.0));
    }

    #[test]
    fn calibration_point_wire_names() {
        let json = r#"{"image_x_norm":0.25,"image_y_norm":0.5,"map_lat":37.1,"map_lng":-122.2,"order_idx":3}"#;
        let p: CalibrationPoint = serde_json::from_str(json).unwrap();
        assert_eq!(p, CalibrationPoint::new(0.25, 0.5, 37.1, -122.2, 3));
        assert_eq!(serde_json::to_string(&p).unwrap(), json);
    }

    #[test]
    fn calibration_point_validation() {
        assert!(CalibrationPoint::new(0.5, 0.5, 10.0, 10.0, 0).validate().is_ok());
        assert!(matches!(
            CalibrationPoint::new(1.5, 0.5, 10.0, 10.0, 0).validate(),
            Err(GeoError::InvalidImageCoordinate { .. })
        ));
        assert!(matches!(
            CalibrationPoint::new(0.5, 0.5, 100.0, 10.0, 0).validate(),
            Err(GeoError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn detection_wire_shape() {
        let json = r#"{"frame_idx":7,"track_id":2,"class_name":"car","confidence":0.9,
            "bbox_x":1.0,"bbox_y":2.0,"bbox_w":3.0,"bbox_h":4.0}"#;
        let d: Detection = serde_json::from_str(json).unwrap();
        assert_eq!(d.bbox(), BBox::new(1.0, 2.0, 3.0, 4.0));
        assert!(d.world().is_none());

        let untracked: Detection = serde_json::from_str(
            r#"{"frame_idx":1,"class_label":"truck","confidence":0.5,
            "bbox_x":0.0,"bbox_y":0.0,"bbox_w":1.0,"bbox_h":1.0}"#,
        )
        .unwrap();
        assert_eq!(untracked.track_id, None);
        assert_eq!(untracked.class_name, "truck");
    }
}
