//! Exit codes exchanged between the worker and the launcher.
//!
//! The process exit status is the only control channel between the two, so
//! the set of values is closed: anything else is an unrecognised failure.

use std::process::{ExitCode, ExitStatus};

/// Exit status a worker reports to its launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerExit {
    /// Normal shutdown.
    Ok,
    /// Unrecoverable error.
    Fatal,
    /// A verified replacement is staged in the session directory.
    UpdateReady,
}

impl WorkerExit {
    pub const OK_CODE: i32 = 0;
    pub const FATAL_CODE: i32 = 1;
    pub const UPDATE_READY_CODE: i32 = 70;

    pub const fn code(self) -> i32 {
        match self {
            Self::Ok => Self::OK_CODE,
            Self::Fatal => Self::FATAL_CODE,
            Self::UpdateReady => Self::UPDATE_READY_CODE,
        }
    }

    /// Parse a raw exit code; `None` for anything outside the contract.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            Self::OK_CODE => Some(Self::Ok),
            Self::FATAL_CODE => Some(Self::Fatal),
            Self::UPDATE_READY_CODE => Some(Self::UpdateReady),
            _ => None,
        }
    }

    /// Children killed by a signal carry no code and are never recognised.
    pub fn from_status(status: ExitStatus) -> Option<Self> {
        status.code().and_then(Self::from_code)
    }
}

impl From<WorkerExit> for ExitCode {
    fn from(exit: WorkerExit) -> Self {
        // All contract codes fit in a u8.
        ExitCode::from(exit.code() as u8)
    }
}
