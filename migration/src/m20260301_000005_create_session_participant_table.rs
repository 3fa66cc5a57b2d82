use sea_orm_migration::prelude::*;

/// Creates the `session_participant` table mirroring live roster entries.
/// Rows are deactivated (not deleted) when a participant leaves.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum SessionParticipant {
    Table,
    Id,
    SessionId,
    UserId,
    Username,
    Score,
    Active,
    JoinedAt,
    LeftAt,
}

#[derive(DeriveIden)]
enum Session {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SessionParticipant::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SessionParticipant::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SessionParticipant::SessionId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SessionParticipant::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SessionParticipant::Username)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SessionParticipant::Score)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SessionParticipant::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(SessionParticipant::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SessionParticipant::LeftAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_session_participant_session_id")
                            .from(SessionParticipant::Table, SessionParticipant::SessionId)
                            .to(Session::Table, Session::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SessionParticipant::Table).to_owned())
            .await
    }
}
