use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Wire-safe failure codes for rejected mutations. The persistence layer
/// maps its typed errors onto these; clients map them to messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SyncErrorCode {
    NotFound,
    InsufficientScore,
    NoScoreRecord,
    PermissionDenied,
    TransientNetwork,
    Unauthenticated,
}
