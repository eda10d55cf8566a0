//! Per-pair evaluation: shared-frame metrics, contact runs and phases.

use std::ops::Range;

use log::debug;
use recon_core::{Detection, Real};

use super::{CollisionConfig, CollisionError, CollisionEvent, DistanceSpace, KeyFrames, NearMiss};
use crate::Track;

/// Proximity of two tracks in one shared frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMetrics {
    pub frame_idx: u32,
    pub iou: Real,
    pub distance: Real,
    /// Meets the collision overlap condition.
    pub overlapping: bool,
}

/// Everything found for one pair of tracks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PairOutcome {
    pub collisions: Vec<CollisionEvent>,
    pub near_miss: Option<NearMiss>,
}

/// `None` in world space when either detection is unmapped.
fn center_distance(a: &Detection, b: &Detection, space: DistanceSpace) -> Option<Real> {
    match space {
        DistanceSpace::Pixel => Some((a.bbox().center() - b.bbox().center()).norm()),
        DistanceSpace::World => Some((a.world()? - b.world()?).norm()),
    }
}

/// Metrics for every frame present in both tracks, in frame order.
///
/// In world space, shared frames where either detection has no world
/// position are left out.
pub fn frame_metrics(a: &Track, b: &Track, cfg: &CollisionConfig) -> Vec<FrameMetrics> {
    let mut out = Vec::new();
    let mut unmapped = 0usize;
    let (mut i, mut j) = (0, 0);
    while i < a.detections.len() && j < b.detections.len() {
        let (da, db) = (&a.detections[i], &b.detections[j]);
        match da.frame_idx.cmp(&db.frame_idx) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                match center_distance(da, db, cfg.distance_space) {
                    Some(distance) => {
                        let iou = da.bbox().iou(&db.bbox());
                        out.push(FrameMetrics {
                            frame_idx: da.frame_idx,
                            iou,
                            distance,
                            overlapping: iou >= cfg.iou_threshold
                                || distance <= cfg.distance_threshold,
                        });
                    }
                    None => unmapped += 1,
                }
                i += 1;
                j += 1;
            }
        }
    }
    if unmapped > 0 {
        debug!(
            "tracks {} and {}: {unmapped} shared frames without world positions skipped",
            a.track_id, b.track_id
        );
    }
    out
}

/// Index ranges of maximal contact runs.
///
/// A run starts and ends on overlapping frames; consecutive overlapping
/// frames stay in one run while their frame step is at most `persistence`.
pub fn overlap_runs(metrics: &[FrameMetrics], persistence: u32) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut current: Option<(usize, usize)> = None;
    for (k, m) in metrics.iter().enumerate().filter(|(_, m)| m.overlapping) {
        current = match current {
            Some((start, end)) if m.frame_idx - metrics[end].frame_idx <= persistence => {
                Some((start, k))
            }
            Some((start, end)) => {
                runs.push(start..end + 1);
                Some((k, k))
            }
            None => Some((k, k)),
        };
    }
    if let Some((start, end)) = current {
        runs.push(start..end + 1);
    }
    runs
}

/// Earliest frame of the monotone approach leading into `metrics[contact]`.
fn approach_frame(metrics: &[FrameMetrics], contact: usize, window: u32) -> Option<u32> {
    let contact_frame = metrics[contact].frame_idx;
    let earliest = contact_frame.saturating_sub(window);
    let mut closer = metrics[contact].distance;
    let mut approach = None;
    for m in metrics[..contact].iter().rev() {
        if m.frame_idx < earliest || m.overlapping || !(m.distance > closer) {
            break;
        }
        closer = m.distance;
        approach = Some(m.frame_idx);
    }
    approach
}

fn collision_event(
    ids: (u32, u32),
    metrics: &[FrameMetrics],
    run: Range<usize>,
    cfg: &CollisionConfig,
) -> CollisionEvent {
    let span = &metrics[run.clone()];
    let hits: Vec<&FrameMetrics> = span.iter().filter(|m| m.overlapping).collect();

    // Earliest frame wins ties.
    let (peak_idx, peak) = span
        .iter()
        .enumerate()
        .filter(|(_, m)| m.overlapping)
        .fold(None::<(usize, &FrameMetrics)>, |best, (k, m)| match best {
            Some((_, b)) if b.iou >= m.iou => best,
            _ => Some((k, m)),
        })
        .unwrap_or((0, &span[0]));
    let min_distance = hits.iter().map(|m| m.distance).fold(Real::INFINITY, Real::min);

    let first = span[0].frame_idx;
    let last = span[span.len() - 1].frame_idx;
    let separation = span[peak_idx + 1..]
        .iter()
        .find(|m| !m.overlapping)
        .map_or(last, |m| m.frame_idx);

    let key_frames = KeyFrames {
        approach: approach_frame(metrics, run.start, cfg.approach_window),
        contact: Some(first),
        peak: Some(peak.frame_idx),
        separation: Some(separation),
    };

    CollisionEvent {
        track_id_1: ids.0,
        track_id_2: ids.1,
        first_contact_frame: first,
        last_overlap_frame: last,
        peak_overlap_frame: peak.frame_idx,
        max_iou: peak.iou,
        min_distance,
        duration_frames: hits.len(),
        collision_frames: hits.iter().map(|m| m.frame_idx).collect(),
        severity: cfg.severity.classify(peak.iou, hits.len()),
        key_frames,
    }
}

fn near_miss(ids: (u32, u32), metrics: &[FrameMetrics], cfg: &CollisionConfig) -> Option<NearMiss> {
    let close: Vec<&FrameMetrics> = metrics
        .iter()
        .filter(|m| m.overlapping || m.distance <= cfg.near_miss_distance)
        .collect();
    if close.len() < cfg.min_near_miss_frames {
        return None;
    }
    let closest = close
        .iter()
        .copied()
        .reduce(|best, m| if m.distance < best.distance { m } else { best })?;
    Some(NearMiss {
        track_id_1: ids.0,
        track_id_2: ids.1,
        closest_frame: closest.frame_idx,
        first_frame: close[0].frame_idx,
        last_frame: close[close.len() - 1].frame_idx,
        min_distance: closest.distance,
        max_iou: close.iter().map(|m| m.iou).fold(0.0, Real::max),
        total_overlap_frames: close.iter().filter(|m| m.overlapping).count(),
        proximity_frames: close.len(),
    })
}

/// Evaluate one pair of tracks.
///
/// Events are reported with `track_id_1 <= track_id_2` regardless of
/// argument order. Each qualifying run becomes its own event; a near miss
/// is reported only for pairs without any collision.
pub fn detect_pair(a: &Track, b: &Track, cfg: &CollisionConfig) -> Result<PairOutcome, CollisionError> {
    let (a, b) = if a.track_id <= b.track_id { (a, b) } else { (b, a) };
    cfg.validate()?;
    let ids = (a.track_id, b.track_id);
    let metrics = frame_metrics(a, b, cfg);

    let collisions: Vec<CollisionEvent> = overlap_runs(&metrics, cfg.persistence_frames)
        .into_iter()
        .filter(|run| {
            metrics[run.clone()].iter().filter(|m| m.overlapping).count() >= cfg.min_collision_frames
        })
        .map(|run| collision_event(ids, &metrics, run, cfg))
        .collect();

    let near_miss = if collisions.is_empty() {
        near_miss(ids, &metrics, cfg)
    } else {
        None
    };

    Ok(PairOutcome {
        collisions,
        near_miss,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use recon_core::{BBox, Vec2};
    use recon_core::synthetic::scene::linear_track;

    fn metric(frame_idx: u32, distance: Real, overlapping: bool) -> FrameMetrics {
        FrameMetrics {
            frame_idx,
            iou: if overlapping { 0.5 } else { 0.0 },
            distance,
            overlapping,
        }
    }

    #[test]
    fn runs_bridge_short_gaps() {
        let metrics: Vec<FrameMetrics> = [1, 2, 3, 6, 7, 11, 12]
            .iter()
            .zip([true, true, false, true, false, true, true])
            .map(|(&f, o)| metric(f, 0.0, o))
            .collect();
        // 2 -> 6 is a step of 4, 6 -> 11 a step of 5.
        assert_eq!(overlap_runs(&metrics, 3), vec![0..2, 3..4, 5..7]);
        assert_eq!(overlap_runs(&metrics, 4), vec![0..4, 5..7]);
        assert_eq!(overlap_runs(&metrics, 5), vec![0..7]);
        assert!(overlap_runs(&metrics[2..3], 3).is_empty());
    }

    #[test]
    fn approach_needs_monotone_distances() {
        let metrics = vec![
            metric(0, 90.0, false),
            metric(1, 100.0, false),
            metric(2, 80.0, false),
            metric(3, 60.0, false),
            metric(4, 10.0, true),
        ];
        assert_eq!(approach_frame(&metrics, 4, 50), Some(1));
        assert_eq!(approach_frame(&metrics, 4, 2), Some(2));

        let receding = vec![metric(0, 5.0, false), metric(1, 10.0, true)];
        assert_eq!(approach_frame(&receding, 1, 50), None);
        assert_eq!(approach_frame(&receding, 0, 50), None);
    }

    #[test]
    fn single_frame_contact_is_a_near_miss() {
        let cfg = CollisionConfig::default();
        // Drive past with a single frame inside the contact distance.
        let a = Track::new(
            1,
            linear_track(1, 0..10, BBox::new(0.0, 0.0, 20.0, 20.0), Vec2::new(40.0, 0.0)),
        );
        let b = Track::new(2, linear_track(2, 0..10, BBox::new(135.0, 45.0, 20.0, 20.0), Vec2::zeros()));
        let outcome = detect_pair(&a, &b, &cfg).unwrap();
        assert!(outcome.collisions.is_empty());
        let nm = outcome.near_miss.unwrap();
        assert_eq!((nm.track_id_1, nm.track_id_2), (1, 2));
        assert!(nm.min_distance <= cfg.near_miss_distance);
        assert_eq!(nm.total_overlap_frames, 1);
        assert_eq!(nm.closest_frame, 3);
        assert_eq!(nm.proximity_frames, 4);
        assert!(nm.first_frame <= nm.closest_frame && nm.closest_frame <= nm.last_frame);
    }

    #[test]
    fn pair_order_is_normalised() {
        let cfg = CollisionConfig::default();
        let a = Track::new(9, linear_track(9, 0..5, BBox::new(0.0, 0.0, 50.0, 50.0), Vec2::zeros()));
        let b = Track::new(3, linear_track(3, 0..5, BBox::new(10.0, 10.0, 50.0, 50.0), Vec2::zeros()));
        let outcome = detect_pair(&a, &b, &cfg).unwrap();
        assert_eq!(outcome.collisions.len(), 1);
        let ev = &outcome.collisions[0];
        assert_eq!((ev.track_id_1, ev.track_id_2), (3, 9));
        assert_eq!(ev.collision_frames, vec![0, 1, 2, 3, 4]);
        assert_eq!(ev.peak_overlap_frame, 0);
    }
}
