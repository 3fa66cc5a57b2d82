use sea_orm_migration::prelude::*;

/// Seeds a two-question demo quiz (quiz id 1) owned by a synthetic host
/// identity. Integration tests start live sessions against this quiz.
#[derive(DeriveMigrationName)]
pub struct Migration;

const DEMO_QUIZ_ID: i64 = 1;
const DEMO_OWNER_ID: i64 = 1;
const SEED_TS: &str = "2026-03-01T00:00:00+00:00";

fn quiz_sql(backend: sea_orm::DatabaseBackend) -> String {
    let prefix = insert_prefix(backend);
    format!(
        "{prefix} INTO quiz (id, created_at, updated_at, owner_id, title) \
         VALUES ({DEMO_QUIZ_ID}, '{SEED_TS}', '{SEED_TS}', {DEMO_OWNER_ID}, \
         'General Knowledge Demo'){suffix}",
        suffix = insert_suffix(backend),
    )
}

fn question_sql(
    backend: sea_orm::DatabaseBackend,
    id: i64,
    position: i32,
    text: &str,
    duration_secs: i32,
) -> String {
    let prefix = insert_prefix(backend);
    format!(
        "{prefix} INTO question (id, quiz_id, position, question_text, duration_secs, points) \
         VALUES ({id}, {DEMO_QUIZ_ID}, {position}, '{text}', {duration_secs}, 10){suffix}",
        suffix = insert_suffix(backend),
    )
}

fn option_sql(
    backend: sea_orm::DatabaseBackend,
    id: i64,
    question_id: i64,
    position: i32,
    text: &str,
    is_correct: bool,
) -> String {
    let prefix = insert_prefix(backend);
    let correct = if backend == sea_orm::DatabaseBackend::Postgres {
        if is_correct { "true" } else { "false" }
    } else if is_correct {
        "1"
    } else {
        "0"
    };
    format!(
        "{prefix} INTO question_option (id, question_id, position, option_text, is_correct) \
         VALUES ({id}, {question_id}, {position}, '{text}', {correct}){suffix}",
        suffix = insert_suffix(backend),
    )
}

const fn insert_prefix(backend: sea_orm::DatabaseBackend) -> &'static str {
    if matches!(backend, sea_orm::DatabaseBackend::Postgres) {
        "INSERT"
    } else {
        "INSERT OR IGNORE"
    }
}

const fn insert_suffix(backend: sea_orm::DatabaseBackend) -> &'static str {
    if matches!(backend, sea_orm::DatabaseBackend::Postgres) {
        " ON CONFLICT (id) DO NOTHING"
    } else {
        ""
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let conn = manager.get_connection();

        conn.execute_unprepared(&quiz_sql(backend)).await?;

        conn.execute_unprepared(&question_sql(
            backend,
            1,
            1,
            "What is the capital of France?",
            20,
        ))
        .await?;
        conn.execute_unprepared(&question_sql(
            backend,
            2,
            2,
            "Which planet is known as the Red Planet?",
            15,
        ))
        .await?;

        let options = [
            (1_i64, 1_i64, 1, "Paris", true),
            (2, 1, 2, "London", false),
            (3, 1, 3, "Berlin", false),
            (4, 1, 4, "Madrid", false),
            (5, 2, 1, "Venus", false),
            (6, 2, 2, "Mars", true),
            (7, 2, 3, "Jupiter", false),
            (8, 2, 4, "Saturn", false),
        ];
        for (id, question_id, position, text, correct) in options {
            conn.execute_unprepared(&option_sql(backend, id, question_id, position, text, correct))
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();

        conn.execute_unprepared(&format!(
            "DELETE FROM question_option WHERE question_id IN \
             (SELECT id FROM question WHERE quiz_id = {DEMO_QUIZ_ID})"
        ))
        .await?;
        conn.execute_unprepared(&format!(
            "DELETE FROM question WHERE quiz_id = {DEMO_QUIZ_ID}"
        ))
        .await?;
        conn.execute_unprepared(&format!("DELETE FROM quiz WHERE id = {DEMO_QUIZ_ID}"))
            .await?;

        Ok(())
    }
}
