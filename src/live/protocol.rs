//! Wire protocol for the live `WebSocket` endpoint.
//!
//! Inbound messages are `{"type": ..., "payload": ...}` envelopes parsed into
//! [`ClientEvent`]; outbound messages are built here so that every audience
//! gets a consistently shaped payload. Correct-answer flags are only included
//! once the session has moved past the answering window.

use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::live::phase::SessionPhase;
use crate::live::quiz::QuestionContent;
use crate::live::session::{LiveSession, Participant};

// ─────────────────────────────────────────────────────────────────────────────
// Inbound events
// ─────────────────────────────────────────────────────────────────────────────

/// A client-to-server event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Host creates a session for one of their quizzes.
    #[serde(rename_all = "camelCase")]
    StartSession { token: String, quiz_id: i64 },
    /// Host (re)attaches to an existing session's host seat.
    #[serde(rename_all = "camelCase")]
    HostJoinSession { session_id: Uuid, token: String },
    /// Participant joins the session roster.
    #[serde(rename_all = "camelCase")]
    JoinSession {
        session_id: Uuid,
        user_id: i64,
        username: String,
    },
    /// Host starts the game (`lobby → starting`).
    #[serde(rename_all = "camelCase")]
    StartQuiz { session_id: Uuid },
    /// Host puts a question on screen; omitted index means "the next one".
    #[serde(rename_all = "camelCase")]
    ShowQuestion {
        session_id: Uuid,
        question_index: Option<u32>,
    },
    /// Participant answers the active question.
    #[serde(rename_all = "camelCase")]
    SubmitAnswer {
        session_id: Uuid,
        user_id: i64,
        answer_index: u32,
        #[serde(default)]
        option_id: Option<i64>,
    },
    /// Host reveals the correct answer.
    #[serde(rename_all = "camelCase")]
    ShowCorrectAnswer { session_id: Uuid },
    /// Host forces an arbitrary phase.
    #[serde(rename_all = "camelCase")]
    SetPhase {
        session_id: Uuid,
        phase: SessionPhase,
    },
    /// Host restarts the game back to the lobby with zeroed scores.
    #[serde(rename_all = "camelCase")]
    RestartGame { session_id: Uuid },
    /// Host ends the quiz and shows final standings.
    #[serde(rename_all = "camelCase")]
    FinishGame { session_id: Uuid },
    /// Participant leaves the session voluntarily.
    #[serde(rename_all = "camelCase")]
    LeaveSession {
        session_id: Uuid,
        #[serde(default)]
        user_id: Option<i64>,
        #[serde(default)]
        username: Option<String>,
    },
    /// Host tears the session down for everyone.
    #[serde(rename_all = "camelCase")]
    EndSession { session_id: Uuid },
    /// Any client requests a full state snapshot (reconnect resync).
    #[serde(rename_all = "camelCase")]
    GetSessionState { session_id: Uuid },
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound envelopes
// ─────────────────────────────────────────────────────────────────────────────

/// Wrap a payload in the standard outbound envelope.
#[must_use]
pub fn envelope(event_type: &str, payload: Value) -> String {
    json!({
        "type": event_type,
        "payload": payload,
    })
    .to_string()
}

/// An `error` ack for the client whose request could not be served.
#[must_use]
pub fn error_event(code: &str, message: &str) -> String {
    envelope(
        "error",
        json!({
            "code": code,
            "message": message,
        }),
    )
}

/// Shape a question for the wire. `include_correct` must stay `false` while
/// the question is answerable so clients cannot read the solution early.
#[must_use]
pub fn question_view(question: &QuestionContent, include_correct: bool) -> Value {
    let options: Vec<Value> = question
        .options
        .iter()
        .map(|o| {
            if include_correct {
                json!({
                    "id": o.id,
                    "optionText": o.option_text,
                    "isCorrect": o.is_correct,
                })
            } else {
                json!({
                    "id": o.id,
                    "optionText": o.option_text,
                })
            }
        })
        .collect();

    json!({
        "id": question.id,
        "index": question.index,
        "questionText": question.question_text,
        "durationSecs": question.duration_secs,
        "points": question.points,
        "mediaUrl": question.media_url,
        "options": options,
    })
}

fn participant_view(participant: &Participant) -> Value {
    json!({
        "userId": participant.user_id,
        "username": participant.username,
        "score": participant.score,
    })
}

/// Standings with 1-based ranks, already sorted by the session.
#[must_use]
pub fn leaderboard_view(session: &LiveSession) -> Value {
    let rows: Vec<Value> = session
        .leaderboard()
        .iter()
        .enumerate()
        .map(|(i, p)| {
            json!({
                "rank": i + 1,
                "userId": p.user_id,
                "username": p.username,
                "score": p.score,
            })
        })
        .collect();
    Value::Array(rows)
}

/// Full session snapshot for `sessionStateUpdate`/`sessionState` events.
///
/// The embedded question only carries correctness flags once the phase has
/// moved past `question`.
#[must_use]
pub fn session_snapshot(session: &LiveSession) -> Value {
    let include_correct = matches!(
        session.phase,
        SessionPhase::ShowingAnswer | SessionPhase::Leaderboard | SessionPhase::Finished
    );
    let question = session
        .active_question()
        .map(|q| question_view(q, include_correct));

    json!({
        "sessionId": session.id,
        "quizId": session.quiz.id,
        "quizTitle": session.quiz.title,
        "phase": session.phase,
        "participants": session.participants().iter().map(participant_view).collect::<Vec<_>>(),
        "participantCount": session.participants().len(),
        "leaderboard": leaderboard_view(session),
        "question": question,
        "answeredCount": session.answered_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::quiz::{OptionContent, QuizContent};

    fn sample_question() -> QuestionContent {
        QuestionContent {
            id: 10,
            index: 1,
            question_text: "What is the capital of France?".to_string(),
            duration_secs: 20,
            points: 10,
            media_url: None,
            options: vec![
                OptionContent {
                    id: 100,
                    option_text: "Paris".to_string(),
                    is_correct: true,
                },
                OptionContent {
                    id: 101,
                    option_text: "London".to_string(),
                    is_correct: false,
                },
            ],
        }
    }

    #[test]
    fn submit_answer_event_parses() {
        let session_id = Uuid::new_v4();
        let raw = format!(
            r#"{{"type":"submitAnswer","payload":{{"sessionId":"{session_id}","userId":42,"answerIndex":2}}}}"#
        );
        let event: Option<ClientEvent> = serde_json::from_str(&raw).ok();
        match event {
            Some(ClientEvent::SubmitAnswer {
                session_id: sid,
                user_id,
                answer_index,
                option_id,
            }) => {
                assert_eq!(sid, session_id);
                assert_eq!(user_id, 42);
                assert_eq!(answer_index, 2);
                assert_eq!(option_id, None);
            }
            other => assert!(other.is_none(), "parsed into the wrong variant"),
        }
    }

    #[test]
    fn show_question_index_is_optional() {
        let session_id = Uuid::new_v4();
        let raw = format!(
            r#"{{"type":"showQuestion","payload":{{"sessionId":"{session_id}"}}}}"#
        );
        let event: Option<ClientEvent> = serde_json::from_str(&raw).ok();
        assert!(matches!(
            event,
            Some(ClientEvent::ShowQuestion {
                question_index: None,
                ..
            })
        ));
    }

    #[test]
    fn unknown_event_type_fails_to_parse() {
        let raw = r#"{"type":"hijackSession","payload":{}}"#;
        assert!(serde_json::from_str::<ClientEvent>(raw).is_err());
    }

    #[test]
    fn question_view_hides_correctness_before_reveal() {
        let question = sample_question();

        let hidden = question_view(&question, false);
        let shown = question_view(&question, true);

        assert_eq!(hidden["options"][0].get("isCorrect"), None);
        assert_eq!(shown["options"][0]["isCorrect"], json!(true));
        assert_eq!(hidden["options"][0]["optionText"], json!("Paris"));
    }

    #[test]
    fn snapshot_reflects_phase_and_tallies() {
        let quiz = QuizContent {
            id: 1,
            title: "Demo".to_string(),
            questions: vec![sample_question()],
        };
        let mut session = LiveSession::new(Uuid::new_v4(), 1, quiz);
        session.join(2, "alice", Uuid::new_v4());
        session.join(3, "bob", Uuid::new_v4());
        let t0 = std::time::Instant::now();
        session.show_question(0, t0);
        session.submit_answer(2, 0, 100, t0 + std::time::Duration::from_secs(1));

        let snapshot = session_snapshot(&session);
        assert_eq!(snapshot["phase"], json!("question"));
        assert_eq!(snapshot["participantCount"], json!(2));
        assert_eq!(snapshot["answeredCount"], json!(1));
        // answering phase: the embedded question must not leak the solution
        assert_eq!(snapshot["question"]["options"][0].get("isCorrect"), None);

        session.reveal();
        let revealed = session_snapshot(&session);
        assert_eq!(revealed["question"]["options"][0]["isCorrect"], json!(true));
        assert_eq!(revealed["leaderboard"][0]["userId"], json!(2));
        assert_eq!(revealed["leaderboard"][0]["rank"], json!(1));
    }
}
