use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserProfiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserProfiles::UserId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserProfiles::Username).string().not_null())
                    .col(
                        ColumnDef::new(UserProfiles::Email)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(UserProfiles::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(UserProfiles::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PairInvitations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PairInvitations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PairInvitations::FromUserId).uuid().not_null())
                    .col(
                        ColumnDef::new(PairInvitations::FromUserName)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PairInvitations::ToEmail).string().not_null())
                    .col(ColumnDef::new(PairInvitations::Status).string().not_null())
                    .col(
                        ColumnDef::new(PairInvitations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(PairInvitations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(PairInvitations::AcceptedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(PairInvitations::RejectedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserPairs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserPairs::UserId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserPairs::PartnerId).uuid().not_null())
                    .col(
                        ColumnDef::new(UserPairs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(UserPairs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Invitation lookups are by invitee address.
        manager
            .create_index(
                Index::create()
                    .name("idx_pair_invitations_to_email")
                    .table(PairInvitations::Table)
                    .col(PairInvitations::ToEmail)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserPairs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PairInvitations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserProfiles::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserProfiles {
    Table,
    UserId,
    Username,
    Email,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PairInvitations {
    Table,
    Id,
    FromUserId,
    FromUserName,
    ToEmail,
    Status,
    CreatedAt,
    UpdatedAt,
    AcceptedAt,
    RejectedAt,
}

#[derive(DeriveIden)]
enum UserPairs {
    Table,
    UserId,
    PartnerId,
    CreatedAt,
    UpdatedAt,
}
