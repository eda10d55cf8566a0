use std::sync::Arc;

use parking_lot::Mutex;
use recon_linear::{HomographyOptions, HomographySolver};

use super::{HomographySession, SessionError};
use crate::records::{HomographySessionRecord, SolveResponse};

/// A session shared between request handlers.
///
/// The lock is held only for state transitions; the solve itself runs
/// unlocked on the ticket's point snapshot. Concurrent edits during a solve
/// see the `solving` status and are rejected.
#[derive(Debug, Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<HomographySession>>,
}

impl SharedSession {
    pub fn new(session: HomographySession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Run `f` with shared access to the session.
    pub fn read<R>(&self, f: impl FnOnce(&HomographySession) -> R) -> R {
        f(&self.inner.lock())
    }

    /// Run `f` with exclusive access to the session.
    pub fn edit<R>(&self, f: impl FnOnce(&mut HomographySession) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn view(&self) -> HomographySessionRecord {
        self.read(HomographySession::view)
    }

    pub fn solve(&self, opts: &HomographyOptions) -> Result<SolveResponse, SessionError> {
        let ticket = self.edit(HomographySession::begin_solve)?;
        let result = HomographySolver::solve(ticket.points(), opts);
        self.edit(|s| s.complete_solve(ticket, result))
    }

    /// Snapshot of the current session.
    pub fn snapshot(&self) -> HomographySession {
        self.read(Clone::clone)
    }
}
