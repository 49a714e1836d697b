use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, prelude::DateTimeWithTimeZone,
};
use uuid::Uuid;

use habit_types::{Collection, Task, TaskDraft, TaskPatch};

use crate::entities::{prelude::*, tasks};
use crate::error::{DataError, RecordKind};
use crate::watch::{ChangeBus, ChangeEvent, Subscription, spawn_watch};

pub struct TaskRepository {
    db: DatabaseConnection,
    bus: ChangeBus,
}

impl TaskRepository {
    pub fn new(db: DatabaseConnection, bus: ChangeBus) -> Self {
        Self { db, bus }
    }

    pub async fn create(&self, user_id: Uuid, draft: TaskDraft) -> Result<Task, DataError> {
        let now: DateTimeWithTimeZone = chrono::Utc::now().into();

        let model = tasks::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            name: Set(draft.name),
            task_type: Set(draft.task_type.as_str().to_string()),
            point_value: Set(draft.point_value),
            is_achieved: Set(false),
            is_active: Set(true),
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
        task_id: Uuid,
        patch: TaskPatch,
    ) -> Result<Task, DataError> {
        let model = Tasks::find_by_id(task_id)
            .one(&self.db)
            .await?
            .ok_or(DataError::NotFound(RecordKind::Task))?;
        if model.user_id != user_id {
            return Err(DataError::PermissionDenied(
                "task belongs to another user".to_string(),
            ));
        }

        let mut active = model.into_active_model();
        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(point_value) = patch.point_value {
            active.point_value = Set(point_value);
        }
        if let Some(is_active) = patch.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(chrono::Utc::now().into());
        let model = active.update(&self.db).await?;

        self.publish(user_id);
        Ok(model.into())
    }

    pub async fn delete(&self, user_id: Uuid, task_id: Uuid) -> Result<(), DataError> {
        let model = Tasks::find_by_id(task_id)
            .one(&self.db)
            .await?
            .ok_or(DataError::NotFound(RecordKind::Task))?;
        if model.user_id != user_id {
            return Err(DataError::PermissionDenied(
                "task belongs to another user".to_string(),
            ));
        }

        Tasks::delete_by_id(task_id).exec(&self.db).await?;
        self.publish(user_id);
        Ok(())
    }

    pub async fn get_all(&self, user_id: Uuid) -> Result<Vec<Task>, DataError> {
        load_all(&self.db, user_id).await
    }

    /// Initial snapshot immediately, a fresh one after every change to
    /// this user's tasks. Drop the handle to unsubscribe.
    pub fn subscribe(&self, user_id: Uuid) -> Subscription<Vec<Task>> {
        let db = self.db.clone();
        spawn_watch(
            self.bus.subscribe(),
            move |event| {
                matches!(
                    event,
                    ChangeEvent::Data { user_id: owner, collection: Collection::Tasks }
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
            collection: Collection::Tasks,
        });
    }
}

// Fetched unordered and sorted here; no composite index backs these reads.
async fn load_all(db: &DatabaseConnection, user_id: Uuid) -> Result<Vec<Task>, DataError> {
    let mut models = Tasks::find()
        .filter(tasks::Column::UserId.eq(user_id))
        .all(db)
        .await?;

    models.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(models.into_iter().map(Task::from).collect())
}
