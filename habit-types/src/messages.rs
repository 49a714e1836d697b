use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    AccountInfo, ActiveTab, RewardDraft, RewardPatch, SessionState, SyncErrorCode, TaskDraft,
    TaskPatch, UserProfile, ViewedUser,
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ClientMessage {
    Authenticate { token: String },
    SetupProfile { username: String },
    SetActiveTab { tab: ActiveTab },
    SetViewingUser { view: ViewedUser },
    SetTaskModal { visible: bool },
    SetRewardModal { visible: bool },
    CreateTask { draft: TaskDraft },
    UpdateTask { task_id: Uuid, patch: TaskPatch },
    DeleteTask { task_id: Uuid },
    CompleteTask { task_id: Uuid },
    CreateReward { draft: RewardDraft },
    UpdateReward { reward_id: Uuid, patch: RewardPatch },
    DeleteReward { reward_id: Uuid },
    ClaimReward { reward_id: Uuid },
    UndoActivity { activity_id: Uuid },
    SendInvitation { to_email: String },
    AcceptInvitation { invitation_id: Uuid },
    RejectInvitation { invitation_id: Uuid },
    Unpair,
    Heartbeat,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ServerMessage {
    AuthenticationSuccess {
        user: AccountInfo,
        profile: Option<UserProfile>,
    },
    AuthenticationFailed {
        reason: String,
    },
    StateChanged {
        state: SessionState,
    },
    MutationFailed {
        code: SyncErrorCode,
        message: String,
    },
    Notice {
        notice: Notice,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A user-facing toast delivered out of band with state updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}
