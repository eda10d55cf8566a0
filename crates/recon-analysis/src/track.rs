//! Grouping of per-frame detections into tracks.

use std::collections::BTreeMap;

use log::{debug, warn};
use recon_core::{BBox, Detection, Pt2};
use thiserror::Error;

use crate::TrackSample;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackError {
    #[error("no detections to analyse")]
    Empty,
}

/// The detections of one tracker identity, sorted by frame, one per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub track_id: u32,
    pub detections: Vec<Detection>,
}

impl Track {
    /// Build a track, sorting by frame and keeping the most confident
    /// detection where a frame repeats.
    pub fn new(track_id: u32, mut detections: Vec<Detection>) -> Self {
        detections.sort_by(|a, b| {
            a.frame_idx
                .cmp(&b.frame_idx)
                .then(b.confidence.total_cmp(&a.confidence))
        });
        detections.dedup_by_key(|d| d.frame_idx);
        Self {
            track_id,
            detections,
        }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn first_frame(&self) -> Option<u32> {
        self.detections.first().map(|d| d.frame_idx)
    }

    pub fn last_frame(&self) -> Option<u32> {
        self.detections.last().map(|d| d.frame_idx)
    }

    /// Most frequent class label (ties resolved alphabetically).
    pub fn class_name(&self) -> Option<&str> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for d in &self.detections {
            *counts.entry(d.class_name.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(a.0)))
            .map(|(name, _)| name)
    }

    pub fn detection_at(&self, frame_idx: u32) -> Option<&Detection> {
        self.detections
            .binary_search_by_key(&frame_idx, |d| d.frame_idx)
            .ok()
            .map(|i| &self.detections[i])
    }

    /// Smallest box containing every pixel box of the track.
    pub fn pixel_extent(&self) -> Option<BBox> {
        self.detections
            .iter()
            .map(Detection::bbox)
            .reduce(|acc, b| acc.union(&b))
    }

    /// Bounding rectangle of the mapped world positions; `None` when no
    /// detection is mapped.
    pub fn world_extent(&self) -> Option<BBox> {
        self.detections
            .iter()
            .filter_map(Detection::world)
            .map(|p| BBox::new(p.x, p.y, 0.0, 0.0))
            .reduce(|acc, b| acc.union(&b))
    }

    /// Frame/world-position pairs for speed estimation.
    pub fn samples(&self) -> Vec<TrackSample> {
        self.detections
            .iter()
            .map(|d| TrackSample::new(d.frame_idx, d.world()))
            .collect()
    }

    /// Pixel-space box centres over time.
    pub fn centers(&self) -> Vec<(u32, Pt2)> {
        self.detections
            .iter()
            .map(|d| (d.frame_idx, d.bbox().center()))
            .collect()
    }
}

/// Group detections by `track_id`, ordered by track id.
///
/// Detections without a track id, or with a malformed box, are skipped.
pub fn group_tracks(detections: &[Detection]) -> Result<Vec<Track>, TrackError> {
    if detections.is_empty() {
        return Err(TrackError::Empty);
    }

    let mut grouped: BTreeMap<u32, Vec<Detection>> = BTreeMap::new();
    let mut untracked = 0usize;
    for d in detections {
        let Some(track_id) = d.track_id else {
            untracked += 1;
            continue;
        };
        if !d.bbox().is_valid() {
            warn!(
                "skipping detection of track {track_id} at frame {}: invalid box",
                d.frame_idx
            );
            continue;
        }
        grouped.entry(track_id).or_default().push(d.clone());
    }

    if untracked > 0 {
        debug!("{untracked} untracked detections ignored");
    }
    Ok(grouped
        .into_iter()
        .map(|(track_id, dets)| Track::new(track_id, dets))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(frame: u32, track: Option<u32>, conf: f64, x: f64) -> Detection {
        Detection::new(frame, track, "car", conf, BBox::new(x, 0.0, 10.0, 10.0))
    }

    #[test]
    fn groups_and_sorts() {
        let dets = vec![
            det(3, Some(2), 0.9, 0.0),
            det(1, Some(1), 0.9, 0.0),
            det(1, Some(2), 0.9, 0.0),
            det(2, None, 0.9, 0.0),
            det(0, Some(1), 0.9, 0.0),
        ];
        let tracks = group_tracks(&dets).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].track_id, 1);
        assert_eq!(tracks[0].first_frame(), Some(0));
        assert_eq!(tracks[1].last_frame(), Some(3));
        assert!(tracks[1].detection_at(2).is_none());
        assert!(tracks[1].detection_at(3).is_some());
    }

    #[test]
    fn duplicate_frames_keep_highest_confidence() {
        let track = Track::new(
            5,
            vec![det(4, Some(5), 0.4, 1.0), det(4, Some(5), 0.8, 2.0), det(4, Some(5), 0.6, 3.0)],
        );
        assert_eq!(track.len(), 1);
        assert_eq!(track.detections[0].bbox_x, 2.0);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert_eq!(group_tracks(&[]).unwrap_err(), TrackError::Empty);
        assert!(group_tracks(&[det(0, None, 0.5, 0.0)]).unwrap().is_empty());
    }

    #[test]
    fn invalid_boxes_are_skipped() {
        let mut bad = det(1, Some(1), 0.9, 0.0);
        bad.bbox_w = f64::NAN;
        let tracks = group_tracks(&[bad, det(2, Some(1), 0.9, 0.0)]).unwrap();
        assert_eq!(tracks[0].len(), 1);
    }

    #[test]
    fn extents() {
        let track = Track::new(1, vec![det(0, Some(1), 0.9, 0.0), det(1, Some(1), 0.9, 20.0)]);
        assert_eq!(track.pixel_extent(), Some(BBox::new(0.0, 0.0, 30.0, 10.0)));
        assert_eq!(track.world_extent(), None);

        let mapped = Track::new(
            1,
            vec![
                det(0, Some(1), 0.9, 0.0).with_world(Pt2::new(1.0, 2.0)),
                det(1, Some(1), 0.9, 0.0).with_world(Pt2::new(-1.0, 5.0)),
            ],
        );
        assert_eq!(mapped.world_extent(), Some(BBox::new(-1.0, 2.0, 2.0, 3.0)));

        let partly = Track::new(
            1,
            vec![
                det(0, Some(1), 0.9, 0.0).with_world(Pt2::new(1.0, 2.0)),
                det(1, Some(1), 0.9, 0.0),
                det(2, Some(1), 0.9, 0.0).with_world(Pt2::new(3.0, 2.0)),
            ],
        );
        assert_eq!(partly.world_extent(), Some(BBox::new(1.0, 2.0, 2.0, 0.0)));
        assert_eq!(mapped.class_name(), Some("car"));
    }
}
