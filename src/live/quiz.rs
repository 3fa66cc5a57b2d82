use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

use crate::entities::{question, question_option, quiz};

/// Read-only quiz content loaded once when a session starts.
///
/// The live core never mutates content; authoring happens elsewhere.
#[derive(Debug, Clone)]
pub struct QuizContent {
    pub id: i64,
    pub title: String,
    pub questions: Vec<QuestionContent>,
}

/// One question of a loaded quiz.
#[derive(Debug, Clone)]
pub struct QuestionContent {
    pub id: i64,
    /// 1-based position shown to clients.
    pub index: u32,
    pub question_text: String,
    pub duration_secs: u32,
    pub points: i64,
    pub media_url: Option<String>,
    pub options: Vec<OptionContent>,
}

/// One answer option of a question.
#[derive(Debug, Clone)]
pub struct OptionContent {
    pub id: i64,
    pub option_text: String,
    pub is_correct: bool,
}

impl QuestionContent {
    /// The option the submitted index refers to, if in range.
    #[must_use]
    pub fn option_at(&self, answer_index: usize) -> Option<&OptionContent> {
        self.options.get(answer_index)
    }
}

/// Fetch a quiz with its questions and options, ordered by position.
///
/// Returns `Ok(None)` when no quiz with the given id exists.
///
/// # Errors
///
/// Returns an error if a database query fails.
pub async fn load_quiz_content(
    db: &DatabaseConnection,
    quiz_id: i64,
) -> anyhow::Result<Option<QuizContent>> {
    let Some(quiz_row) = quiz::Entity::find_by_id(quiz_id).one(db).await? else {
        return Ok(None);
    };

    let question_rows = question::Entity::find()
        .filter(question::Column::QuizId.eq(quiz_id))
        .order_by_asc(question::Column::Position)
        .all(db)
        .await?;

    let mut questions = Vec::with_capacity(question_rows.len());
    for row in question_rows {
        let option_rows = question_option::Entity::find()
            .filter(question_option::Column::QuestionId.eq(row.id))
            .order_by_asc(question_option::Column::Position)
            .all(db)
            .await?;

        questions.push(QuestionContent {
            id: row.id,
            index: u32::try_from(row.position).unwrap_or(0),
            question_text: row.question_text,
            duration_secs: u32::try_from(row.duration_secs).unwrap_or(0),
            points: i64::from(row.points),
            media_url: row.media_url,
            options: option_rows
                .into_iter()
                .map(|o| OptionContent {
                    id: o.id,
                    option_text: o.option_text,
                    is_correct: o.is_correct,
                })
                .collect(),
        });
    }

    Ok(Some(QuizContent {
        id: quiz_row.id,
        title: quiz_row.title,
        questions,
    }))
}
