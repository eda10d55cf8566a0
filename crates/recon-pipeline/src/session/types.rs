//! Session bookkeeping: metadata, audit log, lifecycle status.

use recon_core::{GeoProjector, Mat3, Real};
use recon_linear::{CoordinateMapper, HomographyEstimate, MappingOptions, ReprojectionStats};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Version of the serialized session layout.
pub const SESSION_SCHEMA_VERSION: u32 = 1;

/// Metadata about a calibration session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub schema_version: u32,

    /// Unix timestamp when session was created (seconds since epoch).
    pub created_at: u64,

    /// Unix timestamp when session was last modified (seconds since epoch).
    pub last_modified: u64,

    /// Optional user-provided description.
    #[serde(default)]
    pub description: Option<String>,
}

impl SessionMetadata {
    pub fn new() -> Self {
        let now = current_timestamp();
        Self {
            schema_version: SESSION_SCHEMA_VERSION,
            created_at: now,
            last_modified: now,
            description: None,
        }
    }

    /// Update the last_modified timestamp to now.
    pub fn touch(&mut self) {
        self.last_modified = current_timestamp();
    }
}

impl Default for SessionMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Lightweight operation log entry.
///
/// Intended for debugging and audit trail, not for replay/undo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unix timestamp of the operation (seconds since epoch).
    pub timestamp: u64,

    /// Operation name (e.g., "add_point", "solve").
    pub operation: String,

    pub success: bool,

    /// Optional notes or error message.
    pub notes: Option<String>,
}

impl LogEntry {
    pub fn success(operation: impl Into<String>) -> Self {
        Self {
            timestamp: current_timestamp(),
            operation: operation.into(),
            success: true,
            notes: None,
        }
    }

    pub fn success_with_notes(operation: impl Into<String>, notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            ..Self::success(operation)
        }
    }

    pub fn failure(operation: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            timestamp: current_timestamp(),
            operation: operation.into(),
            success: false,
            notes: Some(error.into()),
        }
    }
}

/// Externally visible lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Draft,
    Solving,
    Solved,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Draft => "draft",
            SessionStatus::Solving => "solving",
            SessionStatus::Solved => "solved",
            SessionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful solve: the transform and its quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolvedCalibration {
    /// Normalized image → local metres.
    pub matrix: Mat3,
    /// RMS reprojection error in metres.
    pub reprojection_error: Real,
    pub reprojection: ReprojectionStats,
    /// Local frame of the metres; converts mapped points back to lat/lng.
    pub projector: GeoProjector,
    pub solved_at: u64,
}

impl SolvedCalibration {
    pub fn from_estimate(estimate: HomographyEstimate) -> Self {
        Self {
            matrix: estimate.matrix,
            reprojection_error: estimate.reprojection_error(),
            reprojection: estimate.reprojection,
            projector: estimate.projector,
            solved_at: current_timestamp(),
        }
    }

    pub fn mapper(&self, options: MappingOptions) -> CoordinateMapper {
        CoordinateMapper::new(self.matrix, options)
    }
}

/// Lifecycle state; the transform exists only in `Solved`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SessionState {
    Draft {
        /// Why the last solve was rejected, if it was.
        #[serde(default)]
        last_error: Option<String>,
    },
    Solving {
        started_at: u64,
    },
    Solved(SolvedCalibration),
    Failed {
        error_message: String,
    },
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Draft { last_error: None }
    }
}

impl SessionState {
    pub fn status(&self) -> SessionStatus {
        match self {
            SessionState::Draft { .. } => SessionStatus::Draft,
            SessionState::Solving { .. } => SessionStatus::Solving,
            SessionState::Solved(_) => SessionStatus::Solved,
            SessionState::Failed { .. } => SessionStatus::Failed,
        }
    }
}

/// Get the current Unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
