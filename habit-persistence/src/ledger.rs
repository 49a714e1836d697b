use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait, IntoActiveModel,
    TransactionTrait, prelude::DateTimeWithTimeZone,
};
use uuid::Uuid;

use habit_types::{ActivityRecord, ActivityType, Collection, Reward, Task, TaskType, UserScore};

use crate::entities::{activities, prelude::*, user_scores};
use crate::error::{DataError, RecordKind};
use crate::watch::{ChangeBus, ChangeEvent};

#[derive(Debug, Clone)]
pub struct TaskCompletion {
    pub task: Task,
    pub activity: ActivityRecord,
    pub score: UserScore,
}

#[derive(Debug, Clone)]
pub struct RewardClaim {
    pub reward: Reward,
    pub activity: ActivityRecord,
    pub score: UserScore,
}

#[derive(Debug, Clone)]
pub struct ActivityReversal {
    pub activity: ActivityRecord,
    /// Absent when the user never had a score row to roll back.
    pub score: Option<UserScore>,
}

/// Transactional mutators over the score ledger. Every operation runs as
/// one transaction with all reads completed before any write, so the
/// activity feed and the score row always move together: at any quiescent
/// point the current score equals the signed sum of activity deltas.
///
/// Conflict retries are the storage engine's concern; the ledger adds no
/// retry loop of its own and surfaces every failure to the caller.
pub struct Ledger {
    db: DatabaseConnection,
    bus: ChangeBus,
}

impl Ledger {
    pub fn new(db: DatabaseConnection, bus: ChangeBus) -> Self {
        Self { db, bus }
    }

    /// Apply a task's point value to the owner's ledger. Achievement
    /// tasks are additionally marked achieved. Not idempotent: daily and
    /// bad-habit tasks are repeatable by design, and re-completing an
    /// achievement is the caller's job to prevent via `is_achieved`.
    pub async fn complete_task(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> Result<TaskCompletion, DataError> {
        let outcome = self
            .db
            .transaction::<_, TaskCompletion, DataError>(|txn| {
                Box::pin(async move {
                    // Reads first.
                    let task = Tasks::find_by_id(task_id)
                        .one(txn)
                        .await?
                        .ok_or(DataError::NotFound(RecordKind::Task))?;
                    if task.user_id != user_id {
                        return Err(DataError::PermissionDenied(
                            "task belongs to another user".to_string(),
                        ));
                    }
                    let score = UserScores::find_by_id(user_id).one(txn).await?;

                    let now: DateTimeWithTimeZone = chrono::Utc::now().into();
                    let earned = task.point_value;

                    let task_model = if task.task_type == TaskType::Achievement.as_str() {
                        let mut active = task.clone().into_active_model();
                        active.is_achieved = Set(true);
                        active.updated_at = Set(now);
                        active.update(txn).await?
                    } else {
                        task.clone()
                    };

                    let activity = activities::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        user_id: Set(user_id),
                        task_name: Set(task.name.clone()),
                        points_earned: Set(earned),
                        activity_type: Set(ActivityType::TaskCompleted.as_str().to_string()),
                        timestamp: Set(now),
                        related_id: Set(Some(task_id)),
                        previous_score: Set(None),
                        new_score: Set(None),
                        metadata_task_type: Set(Some(task.task_type.clone())),
                        metadata_category: Set(Some("general".to_string())),
                    }
                    .insert(txn)
                    .await?;

                    // Negative completions (bad habits) lower the score
                    // but never count toward earnings or the tally.
                    let score_model = match score {
                        Some(model) => {
                            let mut active = model.clone().into_active_model();
                            active.current_score = Set(model.current_score + earned);
                            if earned > 0 {
                                active.total_earned = Set(model.total_earned + earned);
                                active.tasks_completed = Set(model.tasks_completed + 1);
                            }
                            active.last_updated = Set(now);
                            active.update(txn).await?
                        }
                        None => {
                            user_scores::ActiveModel {
                                user_id: Set(user_id),
                                current_score: Set(earned),
                                total_earned: Set(earned.max(0)),
                                total_spent: Set(0),
                                tasks_completed: Set(if earned > 0 { 1 } else { 0 }),
                                rewards_claimed: Set(0),
                                created_at: Set(now),
                                last_updated: Set(now),
                            }
                            .insert(txn)
                            .await?
                        }
                    };

                    Ok(TaskCompletion {
                        task: task_model.into(),
                        activity: activity.into(),
                        score: score_model.into(),
                    })
                })
            })
            .await
            .map_err(DataError::from_txn)?;

        self.publish_data(user_id, Collection::Activities);
        self.publish_data(user_id, Collection::Score);
        if outcome.task.task_type == TaskType::Achievement {
            self.publish_data(user_id, Collection::Tasks);
        }
        Ok(outcome)
    }

    /// Spend points on a reward. Requires an initialized score row and
    /// enough points; a failed claim leaves every record untouched.
    pub async fn claim_reward(
        &self,
        user_id: Uuid,
        reward_id: Uuid,
    ) -> Result<RewardClaim, DataError> {
        let outcome = self
            .db
            .transaction::<_, RewardClaim, DataError>(|txn| {
                Box::pin(async move {
                    let reward = Rewards::find_by_id(reward_id)
                        .one(txn)
                        .await?
                        .ok_or(DataError::NotFound(RecordKind::Reward))?;
                    if reward.user_id != user_id {
                        return Err(DataError::PermissionDenied(
                            "reward belongs to another user".to_string(),
                        ));
                    }
                    let score = UserScores::find_by_id(user_id)
                        .one(txn)
                        .await?
                        .ok_or(DataError::NoScoreRecord)?;

                    if score.current_score < reward.point_cost {
                        return Err(DataError::InsufficientScore {
                            required: reward.point_cost,
                            available: score.current_score,
                        });
                    }

                    let now: DateTimeWithTimeZone = chrono::Utc::now().into();
                    let cost = reward.point_cost;

                    let mut active = reward.clone().into_active_model();
                    active.is_claimed = Set(true);
                    active.claimed_at = Set(Some(now));
                    active.updated_at = Set(now);
                    let reward_model = active.update(txn).await?;

                    let activity = activities::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        user_id: Set(user_id),
                        task_name: Set(reward.name.clone()),
                        points_earned: Set(-cost),
                        activity_type: Set(ActivityType::RewardClaimed.as_str().to_string()),
                        timestamp: Set(now),
                        related_id: Set(Some(reward_id)),
                        previous_score: Set(Some(score.current_score)),
                        new_score: Set(Some(score.current_score - cost)),
                        metadata_task_type: Set(None),
                        metadata_category: Set(Some("general".to_string())),
                    }
                    .insert(txn)
                    .await?;

                    let mut active = score.clone().into_active_model();
                    active.current_score = Set(score.current_score - cost);
                    active.total_spent = Set(score.total_spent + cost);
                    active.rewards_claimed = Set(score.rewards_claimed + 1);
                    active.last_updated = Set(now);
                    let score_model = active.update(txn).await?;

                    Ok(RewardClaim {
                        reward: reward_model.into(),
                        activity: activity.into(),
                        score: score_model.into(),
                    })
                })
            })
            .await
            .map_err(DataError::from_txn)?;

        self.publish_data(user_id, Collection::Rewards);
        self.publish_data(user_id, Collection::Activities);
        self.publish_data(user_id, Collection::Score);
        Ok(outcome)
    }

    /// Undo: delete an activity record and reverse its exact point delta.
    /// The related task/reward flag is reset when that record still
    /// exists; if it was deleted in the meantime the reset is a silent
    /// no-op while the score reversal still applies.
    pub async fn delete_activity(
        &self,
        user_id: Uuid,
        activity_id: Uuid,
    ) -> Result<ActivityReversal, DataError> {
        let (outcome, reward_reset, task_reset) = self
            .db
            .transaction::<_, (ActivityReversal, bool, bool), DataError>(|txn| {
                Box::pin(async move {
                    let activity = Activities::find_by_id(activity_id)
                        .one(txn)
                        .await?
                        .ok_or(DataError::NotFound(RecordKind::Activity))?;
                    if activity.user_id != user_id {
                        return Err(DataError::PermissionDenied(
                            "activity belongs to another user".to_string(),
                        ));
                    }
                    let score = UserScores::find_by_id(user_id).one(txn).await?;

                    let activity_type: ActivityType = activity
                        .activity_type
                        .parse()
                        .unwrap_or(ActivityType::TaskCompleted);
                    let related_reward = match (activity_type, activity.related_id) {
                        (ActivityType::RewardClaimed, Some(related_id)) => {
                            Rewards::find_by_id(related_id).one(txn).await?
                        }
                        _ => None,
                    };
                    let related_task = match (activity_type, activity.related_id) {
                        (ActivityType::TaskCompleted, Some(related_id)) => {
                            Tasks::find_by_id(related_id).one(txn).await?
                        }
                        _ => None,
                    };

                    let now: DateTimeWithTimeZone = chrono::Utc::now().into();

                    Activities::delete_by_id(activity_id).exec(txn).await?;

                    let mut reward_reset = false;
                    if let Some(reward) = related_reward {
                        let mut active = reward.into_active_model();
                        active.is_claimed = Set(false);
                        active.claimed_at = Set(None);
                        active.updated_at = Set(now);
                        active.update(txn).await?;
                        reward_reset = true;
                    }

                    let mut task_reset = false;
                    if let Some(task) = related_task {
                        if task.task_type == TaskType::Achievement.as_str() {
                            let mut active = task.into_active_model();
                            active.is_achieved = Set(false);
                            active.updated_at = Set(now);
                            active.update(txn).await?;
                            task_reset = true;
                        }
                    }

                    // Exact inverse, no clamp on the score itself; only
                    // the spend statistics are floored at zero.
                    let score_model = match score {
                        Some(model) => {
                            let mut active = model.clone().into_active_model();
                            active.current_score =
                                Set(model.current_score - activity.points_earned);
                            if activity_type == ActivityType::RewardClaimed {
                                let cost = activity.points_earned.abs();
                                active.total_spent = Set((model.total_spent - cost).max(0));
                                active.rewards_claimed = Set((model.rewards_claimed - 1).max(0));
                            }
                            active.last_updated = Set(now);
                            Some(active.update(txn).await?)
                        }
                        None => None,
                    };

                    Ok((
                        ActivityReversal {
                            activity: activity.into(),
                            score: score_model.map(Into::into),
                        },
                        reward_reset,
                        task_reset,
                    ))
                })
            })
            .await
            .map_err(DataError::from_txn)?;

        self.publish_data(user_id, Collection::Activities);
        self.publish_data(user_id, Collection::Score);
        if reward_reset {
            self.publish_data(user_id, Collection::Rewards);
        }
        if task_reset {
            self.publish_data(user_id, Collection::Tasks);
        }
        Ok(outcome)
    }

    fn publish_data(&self, user_id: Uuid, collection: Collection) {
        self.bus.publish(ChangeEvent::Data {
            user_id,
            collection,
        });
    }
}
