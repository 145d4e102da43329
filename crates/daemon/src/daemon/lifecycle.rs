//! Daemon lifecycle states

use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::DaemonError;

/// Daemon status
///
/// ```text
/// Created ──start──► Starting ──► Running ──stop──► Stopping ──► Stopped
///    │                                                              ▲
///    └───────────────────────────stop───────────────────────────────┘
/// ```
///
/// `Stopped` is terminal. A daemon is not restartable; build a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonStatus {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl DaemonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }

    /// True once `stop` has been requested or all contexts have exited
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopping | Self::Stopped)
    }
}

impl fmt::Display for DaemonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared status with checked transitions
#[derive(Debug)]
pub(crate) struct StatusCell {
    status: RwLock<DaemonStatus>,
}

impl StatusCell {
    pub(crate) fn new() -> Self {
        Self {
            status: RwLock::new(DaemonStatus::Created),
        }
    }

    pub(crate) fn get(&self) -> DaemonStatus {
        *self.status.read()
    }

    /// Move `from -> to`, failing with `InvalidState` from any other state
    pub(crate) fn transition(
        &self,
        from: DaemonStatus,
        to: DaemonStatus,
        action: &'static str,
    ) -> Result<(), DaemonError> {
        let mut status = self.status.write();
        if *status != from {
            return Err(DaemonError::InvalidState {
                action,
                status: *status,
            });
        }
        *status = to;
        Ok(())
    }

    /// Move `from -> to` if currently in `from`; returns whether it moved
    pub(crate) fn advance(&self, from: DaemonStatus, to: DaemonStatus) -> bool {
        let mut status = self.status.write();
        if *status == from {
            *status = to;
            true
        } else {
            false
        }
    }

    /// Unconditionally set the status, returning the previous one
    pub(crate) fn replace(&self, to: DaemonStatus) -> DaemonStatus {
        std::mem::replace(&mut *self.status.write(), to)
    }
}
