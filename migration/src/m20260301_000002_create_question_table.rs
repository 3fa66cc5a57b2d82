use sea_orm_migration::prelude::*;

/// Creates the `question` table. `position` is the 1-based index shown to
/// clients during a live session.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Question {
    Table,
    Id,
    QuizId,
    Position,
    QuestionText,
    DurationSecs,
    Points,
    MediaUrl,
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
                    .table(Question::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Question::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Question::QuizId).big_integer().not_null())
                    .col(ColumnDef::new(Question::Position).integer().not_null())
                    .col(ColumnDef::new(Question::QuestionText).text().not_null())
                    .col(
                        ColumnDef::new(Question::DurationSecs)
                            .integer()
                            .not_null()
                            .default(20),
                    )
                    .col(
                        ColumnDef::new(Question::Points)
                            .integer()
                            .not_null()
                            .default(10),
                    )
                    .col(ColumnDef::new(Question::MediaUrl).string_len(512).null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_question_quiz_id")
                            .from(Question::Table, Question::QuizId)
                            .to(Quiz::Table, Quiz::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Question::Table).to_owned())
            .await
    }
}
