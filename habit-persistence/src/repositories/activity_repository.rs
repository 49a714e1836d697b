use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

use habit_types::{ActivityRecord, Collection};

use crate::entities::{activities, prelude::*};
use crate::error::DataError;
use crate::watch::{ChangeBus, ChangeEvent, Subscription, spawn_watch};

/// Read-only access to the activity feed. Records are only ever written
/// and deleted by the ledger, inside its transactions.
pub struct ActivityRepository {
    db: DatabaseConnection,
    bus: ChangeBus,
}

impl ActivityRepository {
    pub fn new(db: DatabaseConnection, bus: ChangeBus) -> Self {
        Self { db, bus }
    }

    pub async fn get_recent(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ActivityRecord>, DataError> {
        load_recent(&self.db, user_id, limit).await
    }

    pub fn subscribe(&self, user_id: Uuid, limit: usize) -> Subscription<Vec<ActivityRecord>> {
        let db = self.db.clone();
        spawn_watch(
            self.bus.subscribe(),
            move |event| {
                matches!(
                    event,
                    ChangeEvent::Data { user_id: owner, collection: Collection::Activities }
                        if *owner == user_id
                )
            },
            move || {
                let db = db.clone();
                async move { load_recent(&db, user_id, limit).await }
            },
        )
    }
}

async fn load_recent(
    db: &DatabaseConnection,
    user_id: Uuid,
    limit: usize,
) -> Result<Vec<ActivityRecord>, DataError> {
    let mut models = Activities::find()
        .filter(activities::Column::UserId.eq(user_id))
        .all(db)
        .await?;

    models.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    models.truncate(limit);
    Ok(models.into_iter().map(ActivityRecord::from).collect())
}
