//! Batch enrichment of detections with world positions and speeds.

use std::collections::BTreeMap;

use anyhow::{Result, ensure};
use log::{debug, info};
use recon_analysis::{MPS_TO_MPH, TrackSample, TrackSpeedEstimator};
use recon_core::{Detection, FrameSize, Real};
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::records::{DetectionIssue, EnrichedDetection};
use crate::session::SolvedCalibration;

/// Video properties the enrichment needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentInput {
    pub frame_size: FrameSize,
    pub fps: Real,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Enrichment {
    /// Same order as the input detections.
    pub detections: Vec<EnrichedDetection>,
    pub issues: Vec<DetectionIssue>,
    pub mapped: usize,
    pub with_speed: usize,
}

/// Map every detection through the calibration and estimate track speeds.
///
/// Without a calibration the detections pass through unchanged. A detection
/// that cannot be mapped gets a [`DetectionIssue`] and no world data; the
/// rest of the batch is unaffected.
pub fn enrich_detections(
    detections: &[Detection],
    calibration: Option<&SolvedCalibration>,
    input: &EnrichmentInput,
    config: &AnalysisConfig,
) -> Result<Enrichment> {
    ensure!(
        input.fps.is_finite() && input.fps > 0.0,
        "fps must be positive, got {}",
        input.fps
    );
    ensure!(
        input.frame_size.is_valid(),
        "frame size must be positive, got {}x{}",
        input.frame_size.width,
        input.frame_size.height
    );

    let Some(calibration) = calibration else {
        info!(
            "no solved calibration; {} detections left without world positions",
            detections.len()
        );
        return Ok(Enrichment {
            detections: detections.iter().cloned().map(EnrichedDetection::unmapped).collect(),
            ..Enrichment::default()
        });
    };

    let mapper = calibration.mapper(config.mapping);
    let mut out = Enrichment::default();
    for (index, det) in detections.iter().enumerate() {
        let mut detection = det.clone();
        detection.world_x = None;
        detection.world_y = None;
        let enriched = match mapper.map_box(&det.bbox(), input.frame_size) {
            Ok(world) => {
                let geo = calibration.projector.unproject(&world);
                out.mapped += 1;
                EnrichedDetection {
                    world_lat: Some(geo.lat),
                    world_lng: Some(geo.lng),
                    ..EnrichedDetection::unmapped(detection.with_world(world))
                }
            }
            Err(e) => {
                debug!("detection {index} (frame {}) not mapped: {e}", det.frame_idx);
                out.issues.push(DetectionIssue {
                    index,
                    frame_idx: det.frame_idx,
                    track_id: det.track_id,
                    message: e.to_string(),
                });
                EnrichedDetection::unmapped(detection)
            }
        };
        out.detections.push(enriched);
    }

    let estimator = TrackSpeedEstimator::new(config.speed)?;
    let mut by_track: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, d) in out.detections.iter().enumerate() {
        if let Some(track_id) = d.detection.track_id {
            by_track.entry(track_id).or_default().push(i);
        }
    }
    for indices in by_track.values() {
        let samples: Vec<TrackSample> = indices
            .iter()
            .map(|&i| {
                let d = &out.detections[i].detection;
                TrackSample::new(d.frame_idx, d.world())
            })
            .collect();
        let speeds = estimator.estimate(&samples, input.fps)?;
        for (&i, speed) in indices.iter().zip(speeds) {
            if let Some(mps) = speed {
                let d = &mut out.detections[i];
                d.speed_mps = Some(mps);
                d.speed_mph = Some(mps * MPS_TO_MPH);
                out.with_speed += 1;
            }
        }
    }

    info!(
        "enriched {} detections: {} mapped, {} with speed, {} issues, {} tracks",
        detections.len(),
        out.mapped,
        out.with_speed,
        out.issues.len(),
        by_track.len()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use recon_core::synthetic::scene::linear_track;
    use recon_core::{BBox, GeoPoint, GeoProjector, Mat3, Vec2};
    use recon_linear::ReprojectionStats;

    /// 1 normalized unit = 100 m on both axes.
    fn calibration() -> SolvedCalibration {
        SolvedCalibration {
            matrix: Mat3::new(100.0, 0.0, 0.0, 0.0, 100.0, 0.0, 0.0, 0.0, 1.0),
            reprojection_error: 0.0,
            reprojection: ReprojectionStats::default(),
            projector: GeoProjector::new(GeoPoint::new(0.0, 0.0)).unwrap(),
            solved_at: 0,
        }
    }

    fn input() -> EnrichmentInput {
        EnrichmentInput {
            frame_size: FrameSize::new(1000, 1000),
            fps: 10.0,
        }
    }

    #[test]
    fn maps_and_annotates_speeds() {
        // 10 px per frame = 1 m per frame = 10 m/s at 10 fps.
        let dets = linear_track(1, 0..12, BBox::new(0.0, 500.0, 20.0, 20.0), Vec2::new(10.0, 0.0));
        let out = enrich_detections(&dets, Some(&calibration()), &input(), &AnalysisConfig::default())
            .unwrap();

        assert_eq!(out.mapped, 12);
        assert_eq!(out.with_speed, 7);
        assert!(out.issues.is_empty());
        let first = &out.detections[0];
        let world = first.detection.world().unwrap();
        assert!((world.x - 1.0).abs() < 1e-9 && (world.y - 51.0).abs() < 1e-9);
        assert!(first.world_lat.is_some());
        assert!(first.speed_mph.is_none());

        let last = &out.detections[11];
        assert!((last.speed_mps.unwrap() - 10.0).abs() < 1e-9);
        assert!((last.speed_mph.unwrap() - 22.3694).abs() < 1e-9);
    }

    #[test]
    fn without_calibration_nothing_is_added() {
        let dets = linear_track(1, 0..12, BBox::new(0.0, 0.0, 20.0, 20.0), Vec2::new(10.0, 0.0));
        let out = enrich_detections(&dets, None, &input(), &AnalysisConfig::default()).unwrap();
        assert_eq!(out.detections.len(), 12);
        assert_eq!(out.mapped, 0);
        assert!(out.detections.iter().all(|d| d.speed_mph.is_none() && d.world_lat.is_none()));
    }

    #[test]
    fn unmappable_detections_are_reported_not_fatal() {
        // w = 1 - 2y vanishes on the middle row of the image.
        let mut cal = calibration();
        cal.matrix = Mat3::new(100.0, 0.0, 0.0, 0.0, 100.0, 0.0, 0.0, -2.0, 1.0);
        let dets = vec![
            Detection::new(0, Some(1), "car", 0.9, BBox::new(100.0, 490.0, 20.0, 20.0)),
            Detection::new(0, Some(2), "car", 0.9, BBox::new(100.0, 90.0, 20.0, 20.0)),
        ];
        let out = enrich_detections(&dets, Some(&cal), &input(), &AnalysisConfig::default()).unwrap();
        assert_eq!(out.mapped, 1);
        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].index, 0);
        assert!(out.detections[0].detection.world().is_none());
        assert!(out.detections[1].detection.world().is_some());
    }

    #[test]
    fn rejects_bad_video_properties() {
        let dets = linear_track(1, 0..2, BBox::new(0.0, 0.0, 1.0, 1.0), Vec2::zeros());
        let bad_fps = EnrichmentInput { fps: 0.0, ..input() };
        assert!(enrich_detections(&dets, None, &bad_fps, &AnalysisConfig::default()).is_err());
    }
}
