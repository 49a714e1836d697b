use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{ActivityRecord, PairInvitation, Reward, Task, UserId, UserProfile, UserScore};

/// Which of the two synchronized users a payload belongs to. Snapshots
/// are routed to a slice by resolving their owning user id against the
/// session, never by arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum UserSlice {
    Current,
    Partner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ActiveTab {
    Tasks,
    Rewards,
    Activity,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ViewedUser {
    Current,
    Partner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Collection {
    Tasks,
    Rewards,
    Activities,
    Score,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CollectionFlags {
    pub tasks: bool,
    pub rewards: bool,
    pub activities: bool,
    pub score: bool,
}

impl CollectionFlags {
    pub fn get(&self, collection: Collection) -> bool {
        match collection {
            Collection::Tasks => self.tasks,
            Collection::Rewards => self.rewards,
            Collection::Activities => self.activities,
            Collection::Score => self.score,
        }
    }

    pub fn set(&mut self, collection: Collection, value: bool) {
        match collection {
            Collection::Tasks => self.tasks = value,
            Collection::Rewards => self.rewards = value,
            Collection::Activities => self.activities = value,
            Collection::Score => self.score = value,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CollectionErrors {
    pub tasks: Option<String>,
    pub rewards: Option<String>,
    pub activities: Option<String>,
    pub score: Option<String>,
}

impl CollectionErrors {
    pub fn get(&self, collection: Collection) -> Option<&String> {
        match collection {
            Collection::Tasks => self.tasks.as_ref(),
            Collection::Rewards => self.rewards.as_ref(),
            Collection::Activities => self.activities.as_ref(),
            Collection::Score => self.score.as_ref(),
        }
    }

    pub fn set(&mut self, collection: Collection, message: Option<String>) {
        match collection {
            Collection::Tasks => self.tasks = message,
            Collection::Rewards => self.rewards = message,
            Collection::Activities => self.activities = message,
            Collection::Score => self.score = message,
        }
    }
}

/// Cached mirror of one user's remote collections. `pending_score` is the
/// optimistic overlay installed after a successful mutation; the next
/// authoritative score snapshot discards it wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserData {
    pub score: Option<UserScore>,
    pub pending_score: Option<UserScore>,
    pub tasks: Vec<Task>,
    pub rewards: Vec<Reward>,
    pub activities: Vec<ActivityRecord>,
    pub loading: CollectionFlags,
    pub errors: CollectionErrors,
}

impl UserData {
    /// The score to display: the pending overlay wins until the next
    /// canonical snapshot replaces it.
    pub fn effective_score(&self) -> Option<&UserScore> {
        self.pending_score.as_ref().or(self.score.as_ref())
    }
}

/// Whole client-visible state for one connection: two per-user data
/// slices plus UI-only fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionState {
    pub active_tab: ActiveTab,
    pub viewing_user: ViewedUser,
    pub current_user_id: UserId,
    pub partner_user_id: Option<UserId>,
    pub current_user: UserData,
    pub partner_user: UserData,
    pub current_profile: Option<UserProfile>,
    pub partner_profile: Option<UserProfile>,
    pub pending_invitations: Vec<PairInvitation>,
    pub show_task_modal: bool,
    pub show_reward_modal: bool,
}

impl SessionState {
    pub fn new(current_user_id: UserId) -> Self {
        Self {
            active_tab: ActiveTab::Tasks,
            viewing_user: ViewedUser::Current,
            current_user_id,
            partner_user_id: None,
            current_user: UserData::default(),
            partner_user: UserData::default(),
            current_profile: None,
            partner_profile: None,
            pending_invitations: Vec::new(),
            show_task_modal: false,
            show_reward_modal: false,
        }
    }

    /// Resolve which slice a payload owned by `user_id` belongs to.
    /// Returns `None` for ids that are neither user; such payloads must
    /// be dropped, not guessed at.
    pub fn slice_for(&self, user_id: UserId) -> Option<UserSlice> {
        if user_id == self.current_user_id {
            Some(UserSlice::Current)
        } else if self.partner_user_id == Some(user_id) {
            Some(UserSlice::Partner)
        } else {
            None
        }
    }

    pub fn data(&self, slice: UserSlice) -> &UserData {
        match slice {
            UserSlice::Current => &self.current_user,
            UserSlice::Partner => &self.partner_user,
        }
    }

    pub fn data_mut(&mut self, slice: UserSlice) -> &mut UserData {
        match slice {
            UserSlice::Current => &mut self.current_user,
            UserSlice::Partner => &mut self.partner_user,
        }
    }

    /// Data slice for whichever user is currently being viewed.
    pub fn viewed_data(&self) -> &UserData {
        match self.viewing_user {
            ViewedUser::Current => &self.current_user,
            ViewedUser::Partner => &self.partner_user,
        }
    }
}
