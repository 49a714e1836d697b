use sea_orm::entity::prelude::*;

use habit_types::UserPair;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "user_pairs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,
    pub partner_id: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for UserPair {
    fn from(model: Model) -> Self {
        UserPair {
            user_id: model.user_id,
            partner_id: model.partner_id,
            created_at: model.created_at.to_rfc3339(),
        }
    }
}
