use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, prelude::DateTimeWithTimeZone,
};
use uuid::Uuid;

use habit_types::UserProfile;

use crate::entities::{prelude::*, user_profiles};
use crate::error::DataError;
use crate::watch::{ChangeBus, ChangeEvent, Subscription, spawn_watch};

pub struct ProfileRepository {
    db: DatabaseConnection,
    bus: ChangeBus,
}

impl ProfileRepository {
    pub fn new(db: DatabaseConnection, bus: ChangeBus) -> Self {
        Self { db, bus }
    }

    /// Create-or-update. Emails are stored lowercased so pairing lookups
    /// stay case-insensitive.
    pub async fn upsert(
        &self,
        user_id: Uuid,
        username: &str,
        email: &str,
    ) -> Result<UserProfile, DataError> {
        let email = email.to_lowercase();
        let now: DateTimeWithTimeZone = chrono::Utc::now().into();

        let model = match UserProfiles::find_by_id(user_id).one(&self.db).await? {
            Some(model) => {
                let mut active = model.into_active_model();
                active.username = Set(username.to_string());
                active.email = Set(email);
                active.updated_at = Set(now);
                active.update(&self.db).await?
            }
            None => {
                user_profiles::ActiveModel {
                    user_id: Set(user_id),
                    username: Set(username.to_string()),
                    email: Set(email),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&self.db)
                .await?
            }
        };

        self.bus.publish(ChangeEvent::Profile { user_id });
        Ok(model.into())
    }

    pub async fn get(&self, user_id: Uuid) -> Result<Option<UserProfile>, DataError> {
        load(&self.db, user_id).await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>, DataError> {
        let model = UserProfiles::find()
            .filter(user_profiles::Column::Email.eq(email.to_lowercase()))
            .one(&self.db)
            .await?;
        Ok(model.map(UserProfile::from))
    }

    pub async fn exists_by_email(&self, email: &str) -> Result<bool, DataError> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    pub fn subscribe(&self, user_id: Uuid) -> Subscription<Option<UserProfile>> {
        let db = self.db.clone();
        spawn_watch(
            self.bus.subscribe(),
            move |event| matches!(event, ChangeEvent::Profile { user_id: owner } if *owner == user_id),
            move || {
                let db = db.clone();
                async move { load(&db, user_id).await }
            },
        )
    }
}

async fn load(db: &DatabaseConnection, user_id: Uuid) -> Result<Option<UserProfile>, DataError> {
    let model = UserProfiles::find_by_id(user_id).one(db).await?;
    Ok(model.map(UserProfile::from))
}
