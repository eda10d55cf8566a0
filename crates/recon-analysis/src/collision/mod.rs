//! Pairwise collision and near-miss detection over tracked boxes.
//!
//! For every unordered pair of tracks the detector compares the boxes in the
//! frames both tracks share:
//!
//! 1. per-frame IoU and centre distance ([`frame_metrics`]),
//! 2. overlapping frames collapsed into gap-tolerant runs ([`overlap_runs`]),
//! 3. runs with enough overlapping frames become [`CollisionEvent`]s with
//!    key frames and a [`Severity`]; pairs that only come close become
//!    [`NearMiss`]es.
//!
//! Pairs whose lifetimes or spatial extents never meet are pruned before the
//! per-frame pass, and the remaining pairs are evaluated in parallel.

mod config;
mod event;
mod pair;

pub use config::*;
pub use event::*;
pub use pair::*;

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Track;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollisionError {
    #[error("invalid collision config: {0}")]
    InvalidConfig(String),
}

/// Result of [`detect_all`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CollisionAnalysis {
    /// Ordered by contact frame, then descending `max_iou`, then track ids.
    pub collisions: Vec<CollisionEvent>,
    /// Ordered by closest frame, then track ids.
    pub near_misses: Vec<NearMiss>,
    /// Pairs evaluated frame by frame.
    pub candidate_pairs: usize,
    /// Pairs discarded by the pre-filter.
    pub pruned_pairs: usize,
}

impl CollisionAnalysis {
    /// The most significant collision: highest `max_iou`, then longest.
    pub fn primary(&self) -> Option<&CollisionEvent> {
        self.collisions.iter().reduce(|best, c| {
            let better = c.max_iou > best.max_iou
                || (c.max_iou == best.max_iou && c.duration_frames > best.duration_frames);
            if better { c } else { best }
        })
    }

    /// Distinct track pairs with at least one collision.
    pub fn collision_pairs(&self) -> usize {
        let mut pairs: Vec<(u32, u32)> = self
            .collisions
            .iter()
            .map(|c| (c.track_id_1, c.track_id_2))
            .collect();
        pairs.sort_unstable();
        pairs.dedup();
        pairs.len()
    }
}

/// Whether two tracks can possibly interact.
///
/// Requires overlapping lifetimes and, in pixel space, intersecting
/// lifetime boxes once one is grown by the largest proximity threshold. In
/// world space the extents of the mapped positions are compared the same
/// way, and pixel intersection alone still keeps a pair (IoU is always
/// measured in pixels). A track with no mapped position at all has no world
/// distances, so only the pixel check applies to it.
pub fn may_interact(a: &Track, b: &Track, cfg: &CollisionConfig) -> bool {
    let (Some(a0), Some(a1), Some(b0), Some(b1)) =
        (a.first_frame(), a.last_frame(), b.first_frame(), b.last_frame())
    else {
        return false;
    };
    if a1 < b0 || b1 < a0 {
        return false;
    }

    let margin = cfg.proximity_margin();
    let (Some(pa), Some(pb)) = (a.pixel_extent(), b.pixel_extent()) else {
        return false;
    };
    match cfg.distance_space {
        DistanceSpace::Pixel => pa.expanded(margin).intersects(&pb),
        DistanceSpace::World => {
            pa.intersects(&pb)
                || match (a.world_extent(), b.world_extent()) {
                    (Some(wa), Some(wb)) => wa.expanded(margin).intersects(&wb),
                    _ => false,
                }
        }
    }
}

/// Evaluate every unordered pair of `tracks`.
///
/// Output is deterministic and independent of [`CollisionConfig::parallel`].
pub fn detect_all(tracks: &[Track], cfg: &CollisionConfig) -> Result<CollisionAnalysis, CollisionError> {
    cfg.validate()?;

    let n = tracks.len();
    let total_pairs = n * n.saturating_sub(1) / 2;
    let candidates: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
        .filter(|&(i, j)| may_interact(&tracks[i], &tracks[j], cfg))
        .collect();

    let evaluate = |&(i, j): &(usize, usize)| detect_pair(&tracks[i], &tracks[j], cfg);
    let outcomes: Vec<PairOutcome> = if cfg.parallel {
        candidates.par_iter().map(evaluate).collect::<Result<_, _>>()?
    } else {
        candidates.iter().map(evaluate).collect::<Result<_, _>>()?
    };

    let mut analysis = CollisionAnalysis {
        candidate_pairs: candidates.len(),
        pruned_pairs: total_pairs - candidates.len(),
        ..CollisionAnalysis::default()
    };
    for outcome in outcomes {
        analysis.collisions.extend(outcome.collisions);
        analysis.near_misses.extend(outcome.near_miss);
    }

    analysis.collisions.sort_by(|a, b| {
        a.first_contact_frame
            .cmp(&b.first_contact_frame)
            .then(b.max_iou.total_cmp(&a.max_iou))
            .then((a.track_id_1, a.track_id_2).cmp(&(b.track_id_1, b.track_id_2)))
    });
    analysis.near_misses.sort_by_key(|m| (m.closest_frame, m.track_id_1, m.track_id_2));

    debug!(
        "collision pass over {n} tracks: {} candidate pairs, {} pruned, {} collisions, {} near misses",
        analysis.candidate_pairs,
        analysis.pruned_pairs,
        analysis.collisions.len(),
        analysis.near_misses.len()
    );
    Ok(analysis)
}
