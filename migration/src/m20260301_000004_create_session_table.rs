use sea_orm_migration::prelude::*;

/// Creates the `session` table, the best-effort mirror of live quiz
/// sessions. `host_id` is the external-auth identity of the host; no user
/// table exists in this store.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Session {
    Table,
    Id,
    CreatedAt,
    UpdatedAt,
    EndedAt,
    HostId,
    QuizId,
    Status,
}

#[derive(DeriveIden)]
enum Quiz {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Session::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Session::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Session::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Session::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Session::EndedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Session::HostId).big_integer().not_null())
                    .col(ColumnDef::new(Session::QuizId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Session::Status)
                            .string_len(20)
                            .not_null()
                            .default("lobby"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_session_quiz_id")
                            .from(Session::Table, Session::QuizId)
                            .to(Quiz::Table, Quiz::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Session::Table).to_owned())
            .await
    }
}
