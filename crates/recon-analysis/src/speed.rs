//! Per-detection ground speed from world-mapped track positions.
//!
//! Raw speeds compare each sample with the nearest earlier mapped sample that
//! is at least [`SpeedOptions::min_frame_gap`] frames back, then pass through
//! a [`Smoothing`] filter and an optional plausibility clamp. Samples that
//! have no world position, or no earlier partner, get no speed at all:
//! `None` is never reported as zero.

use log::debug;
use recon_core::{Pt2, Real};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metres per second to miles per hour.
pub const MPS_TO_MPH: Real = 2.23694;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpeedError {
    #[error("frame rate must be positive and finite, got {0}")]
    InvalidFrameRate(Real),
    #[error("invalid speed options: {0}")]
    InvalidOptions(String),
}

/// Filter applied to raw per-interval speeds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Smoothing {
    None,
    /// Trailing mean over the last `window` raw speeds of the track.
    MovingAverage { window: usize },
    /// Scalar constant-velocity Kalman filter over the speed signal.
    Kalman {
        process_noise: Real,
        measurement_noise: Real,
    },
}

impl Default for Smoothing {
    fn default() -> Self {
        Smoothing::MovingAverage { window: 5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedOptions {
    /// Minimum frame distance between the two positions of one estimate.
    pub min_frame_gap: u32,
    pub smoothing: Smoothing,
    /// Upper clamp in m/s; the default corresponds to 150 mph.
    pub max_speed_mps: Option<Real>,
}

impl Default for SpeedOptions {
    fn default() -> Self {
        Self {
            min_frame_gap: 5,
            smoothing: Smoothing::default(),
            max_speed_mps: Some(150.0 / MPS_TO_MPH),
        }
    }
}

impl SpeedOptions {
    pub fn validate(&self) -> Result<(), SpeedError> {
        if self.min_frame_gap == 0 {
            return Err(SpeedError::InvalidOptions(
                "min_frame_gap must be at least 1".to_string(),
            ));
        }
        match self.smoothing {
            Smoothing::MovingAverage { window: 0 } => {
                return Err(SpeedError::InvalidOptions(
                    "moving average window must be at least 1".to_string(),
                ));
            }
            Smoothing::Kalman {
                process_noise,
                measurement_noise,
            } if !(process_noise >= 0.0 && measurement_noise > 0.0) => {
                return Err(SpeedError::InvalidOptions(format!(
                    "kalman noise must satisfy q >= 0 and r > 0, got q = {process_noise}, r = {measurement_noise}"
                )));
            }
            _ => {}
        }
        match self.max_speed_mps {
            Some(max) if !(max > 0.0) => Err(SpeedError::InvalidOptions(format!(
                "max_speed_mps must be positive, got {max}"
            ))),
            _ => Ok(()),
        }
    }
}

/// One position of a track; `world` is `None` when the detection could not be mapped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSample {
    pub frame_idx: u32,
    pub world: Option<Pt2>,
}

impl TrackSample {
    pub fn new(frame_idx: u32, world: Option<Pt2>) -> Self {
        Self { frame_idx, world }
    }
}

/// Estimates smoothed ground speeds along a single track.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackSpeedEstimator {
    options: SpeedOptions,
}

impl TrackSpeedEstimator {
    pub fn new(options: SpeedOptions) -> Result<Self, SpeedError> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &SpeedOptions {
        &self.options
    }

    /// Speed in m/s for every sample, aligned with the input order.
    ///
    /// Samples are processed in frame order regardless of input order.
    pub fn estimate(&self, samples: &[TrackSample], fps: Real) -> Result<Vec<Option<Real>>, SpeedError> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(SpeedError::InvalidFrameRate(fps));
        }

        let mut speeds = vec![None; samples.len()];
        let mut mapped: Vec<(usize, u32, Pt2)> = samples
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.world.map(|w| (i, s.frame_idx, w)))
            .filter(|(_, _, w)| w.x.is_finite() && w.y.is_finite())
            .collect();
        if mapped.len() < 2 {
            return Ok(speeds);
        }
        mapped.sort_by_key(|&(_, frame, _)| frame);

        let mut raw: Vec<(usize, Real)> = Vec::with_capacity(mapped.len());
        for (k, &(idx, frame, pos)) in mapped.iter().enumerate() {
            let partner = mapped[..k]
                .iter()
                .rev()
                .find(|(_, f, _)| frame - f >= self.options.min_frame_gap);
            if let Some(&(_, prev_frame, prev_pos)) = partner {
                let dt = (frame - prev_frame) as Real / fps;
                raw.push((idx, (pos - prev_pos).norm() / dt));
            }
        }

        let smoothed = smooth(&raw.iter().map(|(_, v)| *v).collect::<Vec<_>>(), self.options.smoothing);
        for ((idx, _), v) in raw.iter().zip(smoothed) {
            let v = match self.options.max_speed_mps {
                Some(max) => v.clamp(0.0, max),
                None => v.max(0.0),
            };
            speeds[*idx] = Some(v);
        }

        debug!(
            "speed estimated for {}/{} samples ({} mapped)",
            raw.len(),
            samples.len(),
            mapped.len()
        );
        Ok(speeds)
    }
}

/// Apply a smoothing filter to a speed series.
pub fn smooth(values: &[Real], smoothing: Smoothing) -> Vec<Real> {
    match smoothing {
        Smoothing::None => values.to_vec(),
        Smoothing::MovingAverage { window } => {
            let window = window.max(1);
            let mut out = Vec::with_capacity(values.len());
            let mut sum = 0.0;
            for (i, v) in values.iter().enumerate() {
                sum += v;
                if i >= window {
                    sum -= values[i - window];
                }
                out.push(sum / (i + 1).min(window) as Real);
            }
            out
        }
        Smoothing::Kalman {
            process_noise,
            measurement_noise,
        } => {
            let mut out = Vec::with_capacity(values.len());
            let mut state: Option<(Real, Real)> = None;
            for &z in values {
                let (x, p) = match state {
                    None => (z, measurement_noise),
                    Some((x, p)) => {
                        let p = p + process_noise;
                        let k = p / (p + measurement_noise);
                        (x + k * (z - x), (1.0 - k) * p)
                    }
                };
                state = Some((x, p));
                out.push(x);
            }
            out
        }
    }
}
