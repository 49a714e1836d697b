use sea_orm::entity::prelude::*;

use habit_types::{ActivityMetadata, ActivityRecord, ActivityType};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "activities")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_name: String,
    pub points_earned: i32,
    pub activity_type: String,
    pub timestamp: DateTimeWithTimeZone,
    pub related_id: Option<Uuid>,
    pub previous_score: Option<i32>,
    pub new_score: Option<i32>,
    pub metadata_task_type: Option<String>,
    pub metadata_category: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ActivityRecord {
    fn from(model: Model) -> Self {
        let metadata =
            if model.metadata_task_type.is_some() || model.metadata_category.is_some() {
                Some(ActivityMetadata {
                    task_type: model
                        .metadata_task_type
                        .as_deref()
                        .and_then(|raw| raw.parse().ok()),
                    category: model.metadata_category.clone(),
                })
            } else {
                None
            };

        ActivityRecord {
            id: model.id,
            user_id: model.user_id,
            task_name: model.task_name,
            points_earned: model.points_earned,
            activity_type: model
                .activity_type
                .parse()
                .unwrap_or(ActivityType::TaskCompleted),
            timestamp: model.timestamp.to_rfc3339(),
            related_id: model.related_id,
            previous_score: model.previous_score,
            new_score: model.new_score,
            metadata,
        }
    }
}
