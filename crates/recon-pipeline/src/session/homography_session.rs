//! Calibration session: point editing and the solve lifecycle.
//!
//! ```text
//! draft ──begin_solve──▶ solving ──complete_solve──▶ solved | failed | draft
//!   ▲                                                   │
//!   └───────────────────── point edit ──────────────────┘
//! ```
//!
//! Solving is split into [`HomographySession::begin_solve`] and
//! [`HomographySession::complete_solve`] so that the numerical work can run
//! without holding a lock on the session (see [`SharedSession`](super::SharedSession)).
//! While a solve is in flight every edit and every further solve request is
//! rejected with [`SessionError::SolveInProgress`].

use anyhow::{Result, bail};
use log::{debug, info, warn};
use recon_core::{CalibrationPoint, GeoError, Mat3, Real, mat3_to_rows};
use recon_linear::{HomographyError, HomographyEstimate, HomographyOptions, HomographySolver};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{
    LogEntry, SESSION_SCHEMA_VERSION, SessionMetadata, SessionState, SessionStatus,
    SolvedCalibration, current_timestamp,
};
use crate::records::{HomographySessionRecord, SolveResponse};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("a solve is in progress; edits and further solves are rejected until it completes")]
    SolveInProgress,
    #[error("solve ticket does not belong to the current solve")]
    StaleTicket,
    #[error("calibration point {order_index} rejected: {source}")]
    InvalidPoint {
        order_index: u32,
        #[source]
        source: GeoError,
    },
    #[error("a calibration point with order index {0} already exists")]
    DuplicateOrderIndex(u32),
    #[error("no calibration point with order index {0}")]
    PointNotFound(u32),
}

/// Handle for one in-flight solve, carrying the point snapshot to solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveTicket {
    generation: u64,
    points: Vec<CalibrationPoint>,
}

impl SolveTicket {
    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }
}

/// A point rejected by [`HomographySession::replace_points`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedPoint {
    pub order_index: u32,
    pub reason: String,
}

/// Result of a bulk point replacement; valid points are kept.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointEditReport {
    pub accepted: usize,
    pub rejected: Vec<RejectedPoint>,
}

/// Calibration session of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomographySession {
    pub id: String,
    pub project_id: String,
    pub metadata: SessionMetadata,
    /// Sorted by `order_index`, indices unique.
    points: Vec<CalibrationPoint>,
    state: SessionState,
    #[serde(default)]
    solve_generation: u64,
    /// Operation log (lightweight audit trail).
    #[serde(default)]
    pub log: Vec<LogEntry>,
}

impl HomographySession {
    pub fn new(id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            metadata: SessionMetadata::new(),
            points: Vec::new(),
            state: SessionState::default(),
            solve_generation: 0,
            log: Vec::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status()
    }

    pub fn solved(&self) -> Option<&SolvedCalibration> {
        match &self.state {
            SessionState::Solved(solved) => Some(solved),
            _ => None,
        }
    }

    pub fn matrix(&self) -> Option<&Mat3> {
        self.solved().map(|s| &s.matrix)
    }

    pub fn reprojection_error(&self) -> Option<Real> {
        self.solved().map(|s| s.reprojection_error)
    }

    /// Failure message of a failed session, or the reason the last solve of
    /// a draft was rejected.
    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            SessionState::Failed { error_message } => Some(error_message),
            SessionState::Draft { last_error } => last_error.as_deref(),
            _ => None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Point editing
    // ─────────────────────────────────────────────────────────────────────────

    fn ensure_editable(&self) -> Result<(), SessionError> {
        if matches!(self.state, SessionState::Solving { .. }) {
            return Err(SessionError::SolveInProgress);
        }
        Ok(())
    }

    /// Any edit invalidates a previous result.
    fn after_edit(&mut self, operation: &str, notes: String) {
        if self.status() != SessionStatus::Draft {
            debug!(
                "session {}: {} reverts status {} to draft",
                self.id,
                operation,
                self.status()
            );
        }
        self.state = SessionState::Draft { last_error: None };
        self.metadata.touch();
        self.log.push(LogEntry::success_with_notes(operation, notes));
    }

    fn validated(point: &CalibrationPoint) -> Result<(), SessionError> {
        point.validate().map_err(|source| SessionError::InvalidPoint {
            order_index: point.order_index,
            source,
        })
    }

    fn position(&self, order_index: u32) -> Result<usize, usize> {
        self.points
            .binary_search_by_key(&order_index, |p| p.order_index)
    }

    pub fn add_point(&mut self, point: CalibrationPoint) -> Result<(), SessionError> {
        self.ensure_editable()?;
        Self::validated(&point)?;
        let slot = match self.position(point.order_index) {
            Ok(_) => return Err(SessionError::DuplicateOrderIndex(point.order_index)),
            Err(slot) => slot,
        };
        self.points.insert(slot, point);
        self.after_edit("add_point", format!("order index {}", point.order_index));
        Ok(())
    }

    /// Replace the point at `order_index`; the slot keeps its index.
    pub fn update_point(
        &mut self,
        order_index: u32,
        mut point: CalibrationPoint,
    ) -> Result<(), SessionError> {
        self.ensure_editable()?;
        point.order_index = order_index;
        Self::validated(&point)?;
        let slot = self
            .position(order_index)
            .map_err(|_| SessionError::PointNotFound(order_index))?;
        self.points[slot] = point;
        self.after_edit("update_point", format!("order index {order_index}"));
        Ok(())
    }

    pub fn remove_point(&mut self, order_index: u32) -> Result<CalibrationPoint, SessionError> {
        self.ensure_editable()?;
        let slot = self
            .position(order_index)
            .map_err(|_| SessionError::PointNotFound(order_index))?;
        let removed = self.points.remove(slot);
        self.after_edit("remove_point", format!("order index {order_index}"));
        Ok(removed)
    }

    /// Replace the whole point set.
    ///
    /// Invalid points and repeated order indices are reported and skipped;
    /// the remaining points replace the previous set.
    pub fn replace_points(
        &mut self,
        points: Vec<CalibrationPoint>,
    ) -> Result<PointEditReport, SessionError> {
        self.ensure_editable()?;
        let mut report = PointEditReport::default();
        let mut kept: Vec<CalibrationPoint> = Vec::with_capacity(points.len());
        for p in points {
            if let Err(e) = Self::validated(&p) {
                warn!("session {}: {e}", self.id);
                report.rejected.push(RejectedPoint {
                    order_index: p.order_index,
                    reason: e.to_string(),
                });
            } else if kept.iter().any(|k| k.order_index == p.order_index) {
                report.rejected.push(RejectedPoint {
                    order_index: p.order_index,
                    reason: SessionError::DuplicateOrderIndex(p.order_index).to_string(),
                });
            } else {
                kept.push(p);
            }
        }
        kept.sort_by_key(|p| p.order_index);
        report.accepted = kept.len();
        self.points = kept;
        self.after_edit(
            "replace_points",
            format!(
                "{} accepted, {} rejected",
                report.accepted,
                report.rejected.len()
            ),
        );
        Ok(report)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Solving
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter `solving` and hand out the point snapshot to solve.
    pub fn begin_solve(&mut self) -> Result<SolveTicket, SessionError> {
        self.ensure_editable()?;
        self.solve_generation += 1;
        self.state = SessionState::Solving {
            started_at: current_timestamp(),
        };
        self.metadata.touch();
        debug!(
            "session {}: solving with {} points",
            self.id,
            self.points.len()
        );
        Ok(SolveTicket {
            generation: self.solve_generation,
            points: self.points.clone(),
        })
    }

    /// Leave `solving` with the outcome of the ticket's solve.
    ///
    /// Problems the user fixes by editing points (too few, collinear,
    /// malformed) return the session to `draft`; numerical failures move it
    /// to `failed`.
    pub fn complete_solve(
        &mut self,
        ticket: SolveTicket,
        result: Result<HomographyEstimate, HomographyError>,
    ) -> Result<SolveResponse, SessionError> {
        let in_flight = matches!(self.state, SessionState::Solving { .. });
        if !in_flight || ticket.generation != self.solve_generation {
            return Err(SessionError::StaleTicket);
        }

        let response = match result {
            Ok(estimate) => {
                let solved = SolvedCalibration::from_estimate(estimate);
                let response =
                    SolveResponse::solved(mat3_to_rows(&solved.matrix), solved.reprojection_error);
                info!(
                    "session {}: solved, reprojection error {:.4} m",
                    self.id, solved.reprojection_error
                );
                self.log.push(LogEntry::success_with_notes(
                    "solve",
                    format!("rms {:.4} m", solved.reprojection_error),
                ));
                self.state = SessionState::Solved(solved);
                response
            }
            Err(e) if e.is_user_correctable() => {
                let message = e.to_string();
                info!("session {}: solve rejected: {message}", self.id);
                self.log.push(LogEntry::failure("solve", message.clone()));
                self.state = SessionState::Draft {
                    last_error: Some(message.clone()),
                };
                SolveResponse::failed(message)
            }
            Err(e) => {
                let message = e.to_string();
                warn!("session {}: solve failed: {message}", self.id);
                self.log.push(LogEntry::failure("solve", message.clone()));
                self.state = SessionState::Failed {
                    error_message: message.clone(),
                };
                SolveResponse::failed(message)
            }
        };
        self.metadata.touch();
        Ok(response)
    }

    /// Solve in place.
    pub fn solve(&mut self, opts: &HomographyOptions) -> Result<SolveResponse, SessionError> {
        let ticket = self.begin_solve()?;
        let result = HomographySolver::solve(ticket.points(), opts);
        self.complete_solve(ticket, result)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Views and serialization
    // ─────────────────────────────────────────────────────────────────────────

    pub fn view(&self) -> HomographySessionRecord {
        let solved = self.solved();
        HomographySessionRecord {
            id: self.id.clone(),
            project_id: self.project_id.clone(),
            status: self.status(),
            created_at: self.metadata.created_at,
            solved_at: solved.map(|s| s.solved_at),
            pairs: self.points.clone(),
            matrix: solved.map(|s| mat3_to_rows(&s.matrix)),
            reprojection_error: solved.map(|s| s.reprojection_error),
            error_message: self.error_message().map(str::to_owned),
        }
    }

    /// Serialize session to JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    /// Deserialize session from JSON string.
    ///
    /// A snapshot taken mid-solve cannot complete any more; it is restored
    /// as a draft.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or the schema version is
    /// newer than supported.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut session: Self = serde_json::from_str(json)?;

        if session.metadata.schema_version > SESSION_SCHEMA_VERSION {
            bail!(
                "session schema version {} is newer than supported version {}",
                session.metadata.schema_version,
                SESSION_SCHEMA_VERSION
            );
        }
        if session.points.windows(2).any(|w| w[0].order_index >= w[1].order_index) {
            bail!("session points must have unique, ascending order indices");
        }
        if matches!(session.state, SessionState::Solving { .. }) {
            warn!("session {}: restored mid-solve, reverting to draft", session.id);
            session.state = SessionState::Draft {
                last_error: Some("solve interrupted".to_string()),
            };
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recon_core::GeoPoint;
    use recon_core::synthetic::scene::{CalibrationScene, image_grid, street_camera_homography};

    fn scene() -> CalibrationScene {
        CalibrationScene::new(street_camera_homography(), GeoPoint::new(35.6762, 139.6503)).unwrap()
    }

    fn solved_session() -> HomographySession {
        let mut session = HomographySession::new("s1", "p1");
        session.replace_points(scene().points(&image_grid(3, 2))).unwrap();
        let response = session.solve(&HomographyOptions::default()).unwrap();
        assert!(response.success);
        session
    }

    #[test]
    fn new_session_is_draft() {
        let session = HomographySession::new("s1", "p1");
        assert_eq!(session.status(), SessionStatus::Draft);
        assert!(session.matrix().is_none());
        assert!(session.error_message().is_none());
    }

    #[test]
    fn solve_sets_matrix_only_when_solved() {
        let session = solved_session();
        assert_eq!(session.status(), SessionStatus::Solved);
        assert!(session.matrix().is_some());
        assert!(session.reprojection_error().unwrap() < 1e-6);

        let view = session.view();
        assert_eq!(view.status, SessionStatus::Solved);
        assert!(view.matrix.is_some() && view.solved_at.is_some());
        assert_eq!(view.pairs.len(), 6);
    }

    #[test]
    fn edits_revert_solved_to_draft() {
        let mut session = solved_session();
        let p = session.points()[0];
        session
            .update_point(p.order_index, CalibrationPoint { image_x_norm: 0.11, ..p })
            .unwrap();
        assert_eq!(session.status(), SessionStatus::Draft);
        assert!(session.matrix().is_none());

        let mut session = solved_session();
        session.remove_point(5).unwrap();
        assert_eq!(session.status(), SessionStatus::Draft);
        assert_eq!(session.points().len(), 5);
    }

    #[test]
    fn too_few_points_stay_draft() {
        let mut session = HomographySession::new("s1", "p1");
        session.replace_points(scene().points(&image_grid(3, 1))).unwrap();
        let response = session.solve(&HomographyOptions::default()).unwrap();
        assert!(!response.success);
        assert!(response.matrix.is_none());
        assert_eq!(session.status(), SessionStatus::Draft);
        assert!(session.error_message().unwrap().contains("at least 4"));
    }

    #[test]
    fn collinear_triples_stay_draft_with_message() {
        use recon_core::Pt2;

        for middle_y in [0.5, 0.5005] {
            let image = [
                Pt2::new(0.1, 0.5),
                Pt2::new(0.5, middle_y),
                Pt2::new(0.9, 0.5),
                Pt2::new(0.5, 0.9),
            ];
            let mut session = HomographySession::new("s1", "p1");
            session.replace_points(scene().points(&image)).unwrap();
            let response = session.solve(&HomographyOptions::default()).unwrap();

            assert!(!response.success, "middle y {middle_y}");
            assert!(response.matrix.is_none());
            assert_eq!(session.status(), SessionStatus::Draft);
            assert!(session.matrix().is_none());
            assert!(session.error_message().unwrap().contains("collinear"));
        }
    }

    #[test]
    fn numerical_failure_is_failed_and_recoverable() {
        let mut session = HomographySession::new("s1", "p1");
        let noisy = scene().noisy_points(
            &image_grid(4, 4),
            &recon_core::synthetic::noise::UniformNoise::new(1, 3.0),
        );
        session.replace_points(noisy).unwrap();
        let opts = HomographyOptions {
            max_reprojection_error_m: Some(1e-4),
            ..HomographyOptions::default()
        };
        let response = session.solve(&opts).unwrap();
        assert!(!response.success);
        assert_eq!(session.status(), SessionStatus::Failed);
        assert!(session.matrix().is_none());
        assert!(session.view().error_message.is_some());

        // failed -> draft on edit, then solvable again
        session.replace_points(scene().points(&image_grid(2, 2))).unwrap();
        assert_eq!(session.status(), SessionStatus::Draft);
        assert!(session.solve(&HomographyOptions::default()).unwrap().success);
    }

    #[test]
    fn solving_rejects_edits_and_second_solve() {
        let mut session = HomographySession::new("s1", "p1");
        session.replace_points(scene().points(&image_grid(2, 2))).unwrap();

        let ticket = session.begin_solve().unwrap();
        assert_eq!(session.status(), SessionStatus::Solving);
        assert_eq!(session.begin_solve().unwrap_err(), SessionError::SolveInProgress);
        assert_eq!(
            session.remove_point(0).unwrap_err(),
            SessionError::SolveInProgress
        );
        assert_eq!(
            session.replace_points(Vec::new()).unwrap_err(),
            SessionError::SolveInProgress
        );

        let result = HomographySolver::solve(ticket.points(), &HomographyOptions::default());
        let stale = ticket.clone();
        session.complete_solve(ticket, result.clone()).unwrap();
        assert_eq!(session.status(), SessionStatus::Solved);
        assert_eq!(
            session.complete_solve(stale, result).unwrap_err(),
            SessionError::StaleTicket
        );
    }

    #[test]
    fn point_edits_validate() {
        let mut session = HomographySession::new("s1", "p1");
        session
            .add_point(CalibrationPoint::new(0.2, 0.2, 10.0, 10.0, 1))
            .unwrap();
        assert_eq!(
            session
                .add_point(CalibrationPoint::new(0.3, 0.3, 10.0, 10.0, 1))
                .unwrap_err(),
            SessionError::DuplicateOrderIndex(1)
        );
        assert!(matches!(
            session.add_point(CalibrationPoint::new(0.3, 0.3, 91.0, 10.0, 2)),
            Err(SessionError::InvalidPoint { order_index: 2, .. })
        ));
        assert_eq!(
            session.remove_point(7).unwrap_err(),
            SessionError::PointNotFound(7)
        );

        let report = session
            .replace_points(vec![
                CalibrationPoint::new(0.1, 0.1, 10.0, 10.0, 3),
                CalibrationPoint::new(0.2, 0.1, 10.0, 10.0, 3),
                CalibrationPoint::new(1.2, 0.1, 10.0, 10.0, 4),
                CalibrationPoint::new(0.3, 0.1, 10.0, 10.0, 0),
            ])
            .unwrap();
        assert_eq!(report.accepted, 2);
        assert_eq!(report.rejected.len(), 2);
        let order: Vec<u32> = session.points().iter().map(|p| p.order_index).collect();
        assert_eq!(order, vec![0, 3]);
    }

    #[test]
    fn json_roundtrip_and_schema_check() {
        let session = solved_session();
        let json = session.to_json().unwrap();
        let restored = HomographySession::from_json(&json).unwrap();
        assert_eq!(restored.status(), SessionStatus::Solved);
        assert_eq!(restored.points(), session.points());
        assert_eq!(restored.log.len(), session.log.len());

        let bumped = json.replace("\"schema_version\": 1", "\"schema_version\": 999");
        let err = HomographySession::from_json(&bumped).unwrap_err();
        assert!(err.to_string().contains("schema version"));
    }

    #[test]
    fn mid_solve_snapshot_restores_as_draft() {
        let mut session = HomographySession::new("s1", "p1");
        session.replace_points(scene().points(&image_grid(2, 2))).unwrap();
        let _ticket = session.begin_solve().unwrap();
        let restored = HomographySession::from_json(&session.to_json().unwrap()).unwrap();
        assert_eq!(restored.status(), SessionStatus::Draft);
        assert_eq!(restored.error_message(), Some("solve interrupted"));
    }
}
