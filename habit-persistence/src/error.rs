use std::fmt;

use sea_orm::{DbErr, TransactionError};
use thiserror::Error;

use habit_types::SyncErrorCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Task,
    Reward,
    Activity,
    Score,
    Invitation,
    Profile,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Task => "task",
            RecordKind::Reward => "reward",
            RecordKind::Activity => "activity",
            RecordKind::Score => "score",
            RecordKind::Invitation => "invitation",
            RecordKind::Profile => "profile",
        };
        write!(f, "{}", name)
    }
}

/// Typed failures of the gateway and the transactional mutators. Nothing
/// is swallowed: every rejected operation surfaces one of these.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("{0} not found")]
    NotFound(RecordKind),
    #[error("insufficient score: need {required}, have {available}")]
    InsufficientScore { required: i32, available: i32 },
    #[error("score record has not been initialized")]
    NoScoreRecord,
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl DataError {
    pub fn code(&self) -> SyncErrorCode {
        match self {
            DataError::NotFound(_) => SyncErrorCode::NotFound,
            DataError::InsufficientScore { .. } => SyncErrorCode::InsufficientScore,
            DataError::NoScoreRecord => SyncErrorCode::NoScoreRecord,
            DataError::PermissionDenied(_) => SyncErrorCode::PermissionDenied,
            // Engine-level failures are retryable I/O as far as callers
            // are concerned.
            DataError::Database(_) => SyncErrorCode::TransientNetwork,
        }
    }

    pub(crate) fn from_txn(err: TransactionError<DataError>) -> DataError {
        match err {
            TransactionError::Connection(db) => DataError::Database(db),
            TransactionError::Transaction(data) => data,
        }
    }
}
