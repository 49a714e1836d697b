use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{RecordId, UserId};

/// Suggested point values offered by task forms.
pub const DEFAULT_DAILY_POINTS: i32 = 25;
pub const DEFAULT_ACHIEVEMENT_POINTS: i32 = 100;
pub const DEFAULT_BAD_HABIT_POINTS: i32 = -30;

/// Activity feeds are capped to the most recent entries.
pub const DEFAULT_ACTIVITY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TaskType {
    Daily,
    Achievement,
    BadHabit,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Daily => "daily",
            TaskType::Achievement => "achievement",
            TaskType::BadHabit => "bad_habit",
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(TaskType::Daily),
            "achievement" => Ok(TaskType::Achievement),
            "bad_habit" => Ok(TaskType::BadHabit),
            other => Err(format!("unknown task type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ActivityType {
    TaskCompleted,
    RewardClaimed,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::TaskCompleted => "task_completed",
            ActivityType::RewardClaimed => "reward_claimed",
        }
    }
}

impl std::str::FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task_completed" => Ok(ActivityType::TaskCompleted),
            "reward_claimed" => Ok(ActivityType::RewardClaimed),
            other => Err(format!("unknown activity type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Task {
    pub id: RecordId,
    pub user_id: UserId,
    pub name: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub point_value: i32,
    pub is_achieved: bool,
    pub is_active: bool,
    pub created_at: String, // ISO 8601 string
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Reward {
    pub id: RecordId,
    pub user_id: UserId,
    pub name: String,
    pub description: String,
    pub point_cost: i32,
    pub is_claimed: bool,
    pub claimed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Ledger entry pairing a point delta with the action that caused it.
/// `task_name` is a display label captured at write time, so history
/// survives renames and deletions of the source record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ActivityRecord {
    pub id: RecordId,
    pub user_id: UserId,
    pub task_name: String,
    pub points_earned: i32,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub timestamp: String, // ISO 8601 string
    pub related_id: Option<RecordId>,
    pub previous_score: Option<i32>,
    pub new_score: Option<i32>,
    pub metadata: Option<ActivityMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ActivityMetadata {
    pub task_type: Option<TaskType>,
    pub category: Option<String>,
}

/// Per-user score ledger. Only the transactional mutators may change it;
/// `current_score` always equals the signed sum of the user's activity
/// records when no mutation is in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserScore {
    pub user_id: UserId,
    pub current_score: i32,
    pub total_earned: i32,
    pub total_spent: i32,
    pub tasks_completed: i32,
    pub rewards_claimed: i32,
    pub last_updated: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Identity established by the auth provider, before any profile exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AccountInfo {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TaskDraft {
    pub name: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub point_value: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub point_value: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RewardDraft {
    pub name: String,
    pub description: String,
    pub point_cost: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RewardPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub point_cost: Option<i32>,
}
