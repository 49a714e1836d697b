use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, prelude::DateTimeWithTimeZone,
};
use uuid::Uuid;

use habit_types::{Collection, Reward, RewardDraft, RewardPatch};

use crate::entities::{prelude::*, rewards};
use crate::error::{DataError, RecordKind};
use crate::watch::{ChangeBus, ChangeEvent, Subscription, spawn_watch};

pub struct RewardRepository {
    db: DatabaseConnection,
    bus: ChangeBus,
}

impl RewardRepository {
    pub fn new(db: DatabaseConnection, bus: ChangeBus) -> Self {
        Self { db, bus }
    }

    pub async fn create(&self, user_id: Uuid, draft: RewardDraft) -> Result<Reward, DataError> {
        let now: DateTimeWithTimeZone = chrono::Utc::now().into();

        let model = rewards::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            name: Set(draft.name),
            description: Set(draft.description),
            point_cost: Set(draft.point_cost),
            is_claimed: Set(false),
            claimed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        self.publish(user_id);
        Ok(model.into())
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        reward_id: Uuid,
        patch: RewardPatch,
    ) -> Result<Reward, DataError> {
        let model = Rewards::find_by_id(reward_id)
            .one(&self.db)
            .await?
            .ok_or(DataError::NotFound(RecordKind::Reward))?;
        if model.user_id != user_id {
            return Err(DataError::PermissionDenied(
                "reward belongs to another user".to_string(),
            ));
        }

        let mut active = model.into_active_model();
        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(description) = patch.description {
            active.description = Set(description);
        }
        if let Some(point_cost) = patch.point_cost {
            active.point_cost = Set(point_cost);
        }
        active.updated_at = Set(chrono::Utc::now().into());
        let model = active.update(&self.db).await?;

        self.publish(user_id);
        Ok(model.into())
    }

    pub async fn delete(&self, user_id: Uuid, reward_id: Uuid) -> Result<(), DataError> {
        let model = Rewards::find_by_id(reward_id)
            .one(&self.db)
            .await?
            .ok_or(DataError::NotFound(RecordKind::Reward))?;
        if model.user_id != user_id {
            return Err(DataError::PermissionDenied(
                "reward belongs to another user".to_string(),
            ));
        }

        Rewards::delete_by_id(reward_id).exec(&self.db).await?;
        self.publish(user_id);
        Ok(())
    }

    pub async fn get_all(&self, user_id: Uuid) -> Result<Vec<Reward>, DataError> {
        load_all(&self.db, user_id).await
    }

    pub fn subscribe(&self, user_id: Uuid) -> Subscription<Vec<Reward>> {
        let db = self.db.clone();
        spawn_watch(
            self.bus.subscribe(),
            move |event| {
                matches!(
                    event,
                    ChangeEvent::Data { user_id: owner, collection: Collection::Rewards }
                        if *owner == user_id
                )
            },
            move || {
                let db = db.clone();
                async move { load_all(&db, user_id).await }
            },
        )
    }

    fn publish(&self, user_id: Uuid) {
        self.bus.publish(ChangeEvent::Data {
            user_id,
            collection: Collection::Rewards,
        });
    }
}

async fn load_all(db: &DatabaseConnection, user_id: Uuid) -> Result<Vec<Reward>, DataError> {
    let mut models = Rewards::find()
        .filter(rewards::Column::UserId.eq(user_id))
        .all(db)
        .await?;

    models.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(models.into_iter().map(Reward::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_to_memory_database;
    use migration::{Migrator, MigratorTrait};

    async fn setup_test_repo() -> RewardRepository {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        RewardRepository::new(db, ChangeBus::new(16))
    }

    fn draft(name: &str, cost: i32) -> RewardDraft {
        RewardDraft {
            name: name.to_string(),
            description: String::new(),
            point_cost: cost,
        }
    }

    #[tokio::test]
    async fn test_create_and_update() {
        let repo = setup_test_repo().await;
        let user_id = Uuid::new_v4();

        let reward = repo.create(user_id, draft("Movie night", 90)).await.unwrap();
        assert!(!reward.is_claimed);
        assert!(reward.claimed_at.is_none());

        let updated = repo
            .update(
                user_id,
                reward.id,
                RewardPatch {
                    point_cost: Some(120),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.point_cost, 120);
        assert_eq!(updated.name, "Movie night");
    }

    #[tokio::test]
    async fn test_foreign_reward_writes_are_denied() {
        let repo = setup_test_repo().await;
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let reward = repo.create(owner, draft("Spa day", 200)).await.unwrap();
        let result = repo.delete(stranger, reward.id).await;
        assert!(matches!(result, Err(DataError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_delete_missing_reward_is_not_found() {
        let repo = setup_test_repo().await;
        let result = repo.delete(Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(matches!(
            result,
            Err(DataError::NotFound(RecordKind::Reward))
        ));
    }
}
