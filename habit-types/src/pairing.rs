use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{RecordId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for InvitationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvitationStatus::Pending),
            "accepted" => Ok(InvitationStatus::Accepted),
            "rejected" => Ok(InvitationStatus::Rejected),
            other => Err(format!("unknown invitation status: {}", other)),
        }
    }
}

/// Invitation from one user to another, addressed by email. `pending` is
/// the only non-terminal state: accepting creates the symmetric pair
/// links, rejecting just flips the status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PairInvitation {
    pub id: RecordId,
    pub from_user_id: UserId,
    pub from_user_name: String,
    pub to_email: String,
    pub status: InvitationStatus,
    pub created_at: String,
    pub updated_at: String,
    pub accepted_at: Option<String>,
    pub rejected_at: Option<String>,
}

/// One direction of a partner link. A pairing always consists of two of
/// these, created and deleted together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserPair {
    pub user_id: UserId,
    pub partner_id: UserId,
    pub created_at: String,
}
