pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_quiz_table;
mod m20260301_000002_create_question_table;
mod m20260301_000003_create_question_option_table;
mod m20260301_000004_create_session_table;
mod m20260301_000005_create_session_participant_table;
mod m20260301_000006_seed_demo_quiz;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_quiz_table::Migration),
            Box::new(m20260301_000002_create_question_table::Migration),
            Box::new(m20260301_000003_create_question_option_table::Migration),
            Box::new(m20260301_000004_create_session_table::Migration),
            Box::new(m20260301_000005_create_session_participant_table::Migration),
            Box::new(m20260301_000006_seed_demo_quiz::Migration),
        ]
    }
}
