use sea_orm::entity::prelude::*;

use habit_types::{InvitationStatus, PairInvitation};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pair_invitations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub from_user_name: String,
    pub to_email: String,
    pub status: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub accepted_at: Option<DateTimeWithTimeZone>,
    pub rejected_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for PairInvitation {
    fn from(model: Model) -> Self {
        PairInvitation {
            id: model.id,
            from_user_id: model.from_user_id,
            from_user_name: model.from_user_name,
            to_email: model.to_email,
            status: model.status.parse().unwrap_or(InvitationStatus::Pending),
            created_at: model.created_at.to_rfc3339(),
            updated_at: model.updated_at.to_rfc3339(),
            accepted_at: model.accepted_at.map(|at| at.to_rfc3339()),
            rejected_at: model.rejected_at.map(|at| at.to_rfc3339()),
        }
    }
}
