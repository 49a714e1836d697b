use sea_orm::entity::prelude::*;

use habit_types::UserScore;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "user_scores")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,
    pub current_score: i32,
    pub total_earned: i32,
    pub total_spent: i32,
    pub tasks_completed: i32,
    pub rewards_claimed: i32,
    pub created_at: DateTimeWithTimeZone,
    pub last_updated: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for UserScore {
    fn from(model: Model) -> Self {
        UserScore {
            user_id: model.user_id,
            current_score: model.current_score,
            total_earned: model.total_earned,
            total_spent: model.total_spent,
            tasks_completed: model.tasks_completed,
            rewards_claimed: model.rewards_claimed,
            last_updated: model.last_updated.to_rfc3339(),
        }
    }
}
