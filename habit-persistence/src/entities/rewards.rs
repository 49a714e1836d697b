use sea_orm::entity::prelude::*;

use habit_types::Reward;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "rewards")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub point_cost: i32,
    pub is_claimed: bool,
    pub claimed_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Reward {
    fn from(model: Model) -> Self {
        Reward {
            id: model.id,
            user_id: model.user_id,
            name: model.name,
            description: model.description,
            point_cost: model.point_cost,
            is_claimed: model.is_claimed,
            claimed_at: model.claimed_at.map(|at| at.to_rfc3339()),
            created_at: model.created_at.to_rfc3339(),
            updated_at: model.updated_at.to_rfc3339(),
        }
    }
}
