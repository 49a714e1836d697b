use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait, IntoActiveModel,
    prelude::DateTimeWithTimeZone,
};
use uuid::Uuid;

use habit_types::{Collection, UserScore};

use crate::entities::{prelude::*, user_scores};
use crate::error::DataError;
use crate::watch::{ChangeBus, ChangeEvent, Subscription, spawn_watch};

pub struct ScoreRepository {
    db: DatabaseConnection,
    bus: ChangeBus,
}

impl ScoreRepository {
    pub fn new(db: DatabaseConnection, bus: ChangeBus) -> Self {
        Self { db, bus }
    }

    pub async fn get(&self, user_id: Uuid) -> Result<Option<UserScore>, DataError> {
        let model = UserScores::find_by_id(user_id).one(&self.db).await?;
        Ok(model.map(UserScore::from))
    }

    /// Reads the score row, creating a zeroed one on first access.
    pub async fn get_or_init(&self, user_id: Uuid) -> Result<UserScore, DataError> {
        let (score, created) = load_or_init(&self.db, user_id).await?;
        if created {
            self.publish(user_id);
        }
        Ok(score)
    }

    /// Unconditional adjustment for administrative correction only. This
    /// bypasses the activity ledger, so after a call the current score no
    /// longer equals the sum of activity deltas.
    pub async fn adjust(&self, user_id: Uuid, delta: i32) -> Result<UserScore, DataError> {
        let now: DateTimeWithTimeZone = chrono::Utc::now().into();

        let model = match UserScores::find_by_id(user_id).one(&self.db).await? {
            Some(model) => {
                let current = model.current_score;
                let mut active = model.into_active_model();
                active.current_score = Set(current + delta);
                active.last_updated = Set(now);
                active.update(&self.db).await?
            }
            None => {
                user_scores::ActiveModel {
                    user_id: Set(user_id),
                    current_score: Set(delta.max(0)),
                    total_earned: Set(delta.max(0)),
                    total_spent: Set(0),
                    tasks_completed: Set(0),
                    rewards_claimed: Set(0),
                    created_at: Set(now),
                    last_updated: Set(now),
                }
                .insert(&self.db)
                .await?
            }
        };

        self.publish(user_id);
        Ok(model.into())
    }

    pub fn subscribe(&self, user_id: Uuid) -> Subscription<UserScore> {
        let db = self.db.clone();
        spawn_watch(
            self.bus.subscribe(),
            move |event| {
                matches!(
                    event,
                    ChangeEvent::Data { user_id: owner, collection: Collection::Score }
                        if *owner == user_id
                )
            },
            move || {
                let db = db.clone();
                async move { load_or_init(&db, user_id).await.map(|(score, _)| score) }
            },
        )
    }

    fn publish(&self, user_id: Uuid) {
        self.bus.publish(ChangeEvent::Data {
            user_id,
            collection: Collection::Score,
        });
    }
}

async fn load_or_init(
    db: &DatabaseConnection,
    user_id: Uuid,
) -> Result<(UserScore, bool), DataError> {
    if let Some(model) = UserScores::find_by_id(user_id).one(db).await? {
        return Ok((model.into(), false));
    }

    let now: DateTimeWithTimeZone = chrono::Utc::now().into();
    let inserted = user_scores::ActiveModel {
        user_id: Set(user_id),
        current_score: Set(0),
        total_earned: Set(0),
        total_spent: Set(0),
        tasks_completed: Set(0),
        rewards_claimed: Set(0),
        created_at: Set(now),
        last_updated: Set(now),
    }
    .insert(db)
    .await;

    match inserted {
        Ok(model) => Ok((model.into(), true)),
        // Lost the init race; the winner's row is authoritative.
        Err(err) => match UserScores::find_by_id(user_id).one(db).await? {
            Some(model) => Ok((model.into(), false)),
            None => Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_to_memory_database;
    use migration::{Migrator, MigratorTrait};

    async fn setup_test_repo() -> ScoreRepository {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        ScoreRepository::new(db, ChangeBus::new(16))
    }

    #[tokio::test]
    async fn test_get_or_init_creates_zeroed_row_once() {
        let repo = setup_test_repo().await;
        let user_id = Uuid::new_v4();

        assert!(repo.get(user_id).await.unwrap().is_none());

        let score = repo.get_or_init(user_id).await.unwrap();
        assert_eq!(score.current_score, 0);
        assert_eq!(score.tasks_completed, 0);

        let again = repo.get_or_init(user_id).await.unwrap();
        assert_eq!(again.current_score, 0);
        assert!(repo.get(user_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_adjust_existing_row_changes_score_only() {
        let repo = setup_test_repo().await;
        let user_id = Uuid::new_v4();

        repo.get_or_init(user_id).await.unwrap();
        let score = repo.adjust(user_id, -15).await.unwrap();

        assert_eq!(score.current_score, -15);
        assert_eq!(score.total_earned, 0);
        assert_eq!(score.total_spent, 0);
    }

    #[tokio::test]
    async fn test_adjust_seeds_missing_row_with_floor() {
        let repo = setup_test_repo().await;
        let user_id = Uuid::new_v4();

        let score = repo.adjust(user_id, -10).await.unwrap();
        assert_eq!(score.current_score, 0);

        let other = Uuid::new_v4();
        let score = repo.adjust(other, 30).await.unwrap();
        assert_eq!(score.current_score, 30);
        assert_eq!(score.total_earned, 30);
    }
}
