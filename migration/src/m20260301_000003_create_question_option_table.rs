use sea_orm_migration::prelude::*;

/// Creates the `question_option` table. The option(s) flagged `is_correct`
/// determine answer correctness during a live session.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum QuestionOption {
    Table,
    Id,
    QuestionId,
    Position,
    OptionText,
    IsCorrect,
}

#[derive(DeriveIden)]
enum Question {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(QuestionOption::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QuestionOption::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(QuestionOption::QuestionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuestionOption::Position)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuestionOption::OptionText)
                            .string_len(512)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuestionOption::IsCorrect)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_question_option_question_id")
                            .from(QuestionOption::Table, QuestionOption::QuestionId)
                            .to(Question::Table, Question::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QuestionOption::Table).to_owned())
            .await
    }
}
