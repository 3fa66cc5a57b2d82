//! Orchestration layer for live sessions.
//!
//! Every inbound client event lands here. State mutation happens under the
//! registry's shard guard; outbound payloads are built inside the guard and
//! broadcast only after it is released, and database writes are fired off on
//! separate tasks so a slow database never stalls the game.
//!
//! Gameplay operations on a session that is no longer running are silent
//! no-ops (logged at debug): a stale host UI or a racing timer must not spray
//! error acks. Only the explicit request events (create, join, state fetch)
//! report failures back to the caller.

use std::time::{Duration, Instant};

use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::auth::verify_credential;
use crate::config::Config;
use crate::entities::{session, session_participant};
use crate::live::phase::SessionPhase;
use crate::live::protocol::{self, envelope};
use crate::live::quiz::load_quiz_content;
use crate::live::registry::SessionRegistry;
use crate::live::rooms::{ClientRole, RoomManager, WsTx};
use crate::live::session::LiveSession;
use crate::live::timers::TimerRegistry;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Error surfaced to a live client as an `error` ack event.
#[derive(Debug)]
pub enum LiveError {
    /// The request was well-formed but semantically invalid.
    Validation(String),
    /// The presented credential was missing, invalid, or not the host's.
    Unauthorized(String),
    /// The referenced session or quiz does not exist.
    NotFound(String),
    /// Unexpected failure; details are logged, clients get a generic message.
    Internal(anyhow::Error),
}

impl LiveError {
    /// Serialize into the outbound `error` event, logging internals.
    #[must_use]
    pub fn to_event(&self) -> String {
        let (code, message) = match self {
            Self::Validation(msg) => ("VALIDATION", msg.as_str()),
            Self::Unauthorized(msg) => ("UNAUTHORIZED", msg.as_str()),
            Self::NotFound(msg) => ("NOT_FOUND", msg.as_str()),
            Self::Internal(err) => {
                tracing::error!("Live session error: {err:#}");
                ("INTERNAL_ERROR", "An internal error occurred")
            }
        };
        protocol::error_event(code, message)
    }
}

impl<E> From<E> for LiveError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

/// Shared handle to the live session engine. Cheap to clone; all fields are
/// reference-counted internally.
#[derive(Debug, Clone)]
pub struct LiveQuizService {
    db: DatabaseConnection,
    jwt_secret: String,
    reveal_window: Duration,
    registry: SessionRegistry,
    rooms: RoomManager,
    timers: TimerRegistry,
}

impl LiveQuizService {
    #[must_use]
    pub fn new(db: DatabaseConnection, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt_secret.clone(),
            reveal_window: Duration::from_secs(config.reveal_window_secs),
            registry: SessionRegistry::new(),
            rooms: RoomManager::new(),
            timers: TimerRegistry::new(),
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    // ─── Session lifecycle ───────────────────────────────────────────────────

    /// Create a session for a quiz owned by the credential holder and seat
    /// the caller as host. Returns the new session id.
    ///
    /// # Errors
    ///
    /// Fails when the credential is invalid, the quiz does not exist or has
    /// no questions, or the session row cannot be written.
    pub async fn start_session(
        &self,
        token: &str,
        quiz_id: i64,
        tx: WsTx,
    ) -> Result<Uuid, LiveError> {
        let host = verify_credential(token, &self.jwt_secret)
            .map_err(|_| LiveError::Unauthorized("Invalid or expired credential.".to_string()))?;

        let quiz = load_quiz_content(&self.db, quiz_id)
            .await?
            .ok_or_else(|| LiveError::NotFound("Quiz not found.".to_string()))?;
        if quiz.questions.is_empty() {
            return Err(LiveError::Validation(
                "Quiz has no questions and cannot be played.".to_string(),
            ));
        }

        let session_id = Uuid::new_v4();
        self.persist_new_session(session_id, host.id, quiz_id)
            .await?;

        let live = LiveSession::new(session_id, host.id, quiz);
        let snapshot = protocol::session_snapshot(&live);
        self.registry.insert(live);
        self.rooms.register(session_id, ClientRole::Host, tx);

        self.rooms.send_to_host(
            session_id,
            &envelope(
                "sessionCreated",
                json!({ "sessionId": session_id, "state": snapshot }),
            ),
        );

        tracing::info!(%session_id, host_id = host.id, quiz_id, "session created");
        Ok(session_id)
    }

    /// Re-seat a host connection on an existing session.
    ///
    /// # Errors
    ///
    /// Fails when the credential is invalid, the session is not running, or
    /// the credential holder is not the session's host.
    pub fn host_join(&self, session_id: Uuid, token: &str, tx: WsTx) -> Result<(), LiveError> {
        let identity = verify_credential(token, &self.jwt_secret)
            .map_err(|_| LiveError::Unauthorized("Invalid or expired credential.".to_string()))?;

        let snapshot = self
            .registry
            .with(session_id, |s| {
                if s.host_id == identity.id {
                    Ok(protocol::session_snapshot(s))
                } else {
                    Err(LiveError::Unauthorized(
                        "Only the session host can connect as host.".to_string(),
                    ))
                }
            })
            .ok_or_else(|| LiveError::NotFound("Session not found.".to_string()))??;

        self.rooms.register(session_id, ClientRole::Host, tx);
        self.rooms
            .send_to_host(session_id, &envelope("sessionState", snapshot));
        Ok(())
    }

    /// Add a participant to the roster, replacing any duplicate entry and
    /// carrying their score across reconnects.
    ///
    /// # Errors
    ///
    /// Fails when the username is empty or too long, or the session is not
    /// running.
    pub fn join(
        &self,
        session_id: Uuid,
        user_id: i64,
        username: &str,
        socket_id: Uuid,
        tx: WsTx,
    ) -> Result<(), LiveError> {
        let username = username.trim();
        if username.is_empty() || username.len() > 100 {
            return Err(LiveError::Validation(
                "Username must be between 1 and 100 characters.".to_string(),
            ));
        }

        let (joined, snapshot, score) = self
            .registry
            .with_mut(session_id, |s| {
                let p = s.join(user_id, username, socket_id);
                let joined = json!({
                    "userId": p.user_id,
                    "username": p.username,
                    "score": p.score,
                });
                let score = p.score;
                (joined, protocol::session_snapshot(s), score)
            })
            .ok_or_else(|| LiveError::NotFound("Session not found.".to_string()))?;

        self.rooms
            .register(session_id, ClientRole::Participant(socket_id), tx);

        self.rooms.broadcast(
            session_id,
            &envelope("userJoined", json!({ "user": joined })),
        );
        self.rooms.broadcast(
            session_id,
            &envelope("sessionStateUpdate", snapshot.clone()),
        );
        self.rooms.send_to_participant(
            session_id,
            socket_id,
            &envelope("sessionState", snapshot),
        );

        self.spawn_upsert_participant(session_id, user_id, username.to_string(), score);
        Ok(())
    }

    /// `lobby → starting`; the intro plays before the first question.
    /// Ignored when the session is not running.
    pub fn start_quiz(&self, session_id: Uuid) {
        let Some(snapshot) = self.registry.with_mut(session_id, |s| {
            s.start();
            protocol::session_snapshot(s)
        }) else {
            tracing::debug!(%session_id, "ignoring startQuiz for unknown session");
            return;
        };

        self.rooms
            .broadcast(session_id, &envelope("gameStarted", json!({})));
        self.rooms.broadcast(
            session_id,
            &envelope("playSound", json!({ "sound": "gameStart" })),
        );
        self.rooms
            .broadcast(session_id, &envelope("sessionStateUpdate", snapshot));

        self.spawn_persist_status(session_id, SessionPhase::Starting, false);
    }

    /// Put a question on screen. An omitted index advances to the next
    /// question; walking past the last question finishes the quiz instead.
    /// Ignored when the session is not running.
    ///
    /// # Errors
    ///
    /// Fails when an explicit index is out of range.
    pub fn show_question(
        &self,
        session_id: Uuid,
        question_index: Option<u32>,
    ) -> Result<(), LiveError> {
        self.show_question_guarded(session_id, question_index, None)
    }

    /// The mutation behind [`Self::show_question`], shared with the timer
    /// chain. `expected_epoch` makes the phase check and the mutation atomic:
    /// the closure bails out without touching the session when the epoch has
    /// moved on, so a superseded timer cannot re-ask or re-finish anything.
    fn show_question_guarded(
        &self,
        session_id: Uuid,
        question_index: Option<u32>,
        expected_epoch: Option<u64>,
    ) -> Result<(), LiveError> {
        enum Outcome {
            Asked {
                epoch: u64,
                duration: Duration,
                host_view: Value,
                participant_view: Value,
                snapshot: Value,
            },
            Finished {
                leaderboard: Value,
                snapshot: Value,
            },
            BadIndex,
            Superseded,
        }

        let Some(outcome) = self.registry.with_mut(session_id, |s| {
            if expected_epoch.is_some_and(|e| s.epoch() != e) {
                return Outcome::Superseded;
            }
            let index = match question_index {
                Some(i) => Some(usize::try_from(i).unwrap_or(usize::MAX)),
                None => s.next_question_index(),
            };
            let Some(index) = index else {
                // quiz exhausted: the advance becomes the finish
                s.finish();
                return Outcome::Finished {
                    leaderboard: protocol::leaderboard_view(s),
                    snapshot: protocol::session_snapshot(s),
                };
            };
            let now = Instant::now();
            let Some(question) = s.show_question(index, now) else {
                return Outcome::BadIndex;
            };
            let duration = Duration::from_secs(u64::from(question.duration_secs));
            let host_view = protocol::question_view(question, true);
            let participant_view = protocol::question_view(question, false);
            Outcome::Asked {
                epoch: s.epoch(),
                duration,
                host_view,
                participant_view,
                snapshot: protocol::session_snapshot(s),
            }
        }) else {
            tracing::debug!(%session_id, "ignoring showQuestion for unknown session");
            return Ok(());
        };

        match outcome {
            Outcome::Asked {
                epoch,
                duration,
                host_view,
                participant_view,
                snapshot,
            } => {
                self.rooms.broadcast_shaped(
                    session_id,
                    &envelope("showQuestion", json!({ "question": host_view })),
                    &envelope("showQuestion", json!({ "question": participant_view })),
                );
                self.rooms
                    .broadcast(session_id, &envelope("sessionStateUpdate", snapshot));

                self.schedule_reveal(session_id, epoch, duration);
                self.spawn_persist_status(session_id, SessionPhase::Question, false);
            }
            Outcome::Finished {
                leaderboard,
                snapshot,
            } => self.broadcast_finish(session_id, &leaderboard, snapshot),
            Outcome::BadIndex => {
                return Err(LiveError::Validation(
                    "Question index is out of range.".to_string(),
                ));
            }
            Outcome::Superseded => {}
        }
        Ok(())
    }

    /// Score an answer for the active question and broadcast the updated
    /// standings. Late, duplicate, and out-of-phase submissions are dropped
    /// without an error ack; so is a submission to an unknown session.
    pub fn submit_answer(
        &self,
        session_id: Uuid,
        user_id: i64,
        answer_index: u32,
        option_id: Option<i64>,
    ) {
        let answer_index = usize::try_from(answer_index).unwrap_or(usize::MAX);

        let Some(result) = self.registry.with_mut(session_id, |s| {
            let resolved_option = option_id.or_else(|| {
                s.active_question()
                    .and_then(|q| q.option_at(answer_index))
                    .map(|o| o.id)
            });
            let tally = s.submit_answer(
                user_id,
                answer_index,
                resolved_option.unwrap_or(-1),
                Instant::now(),
            )?;
            let entry = s.participants().iter().find(|p| p.user_id == user_id);
            let socket_id = entry.map(|p| p.socket_id);
            let score = entry.map_or(0, |p| p.score);
            let username = entry.map(|p| p.username.clone()).unwrap_or_default();
            Some((tally, socket_id, score, username, protocol::session_snapshot(s)))
        }) else {
            tracing::debug!(%session_id, user_id, "ignoring answer for unknown session");
            return;
        };

        let Some((tally, socket_id, score, username, snapshot)) = result else {
            tracing::debug!(%session_id, user_id, "answer dropped (late, duplicate, or out of phase)");
            return;
        };

        if let Some(socket_id) = socket_id {
            self.rooms.send_to_participant(
                session_id,
                socket_id,
                &envelope(
                    "answerSubmitted",
                    json!({
                        "userId": user_id,
                        "accepted": true,
                    }),
                ),
            );
        }
        self.rooms.send_to_host(
            session_id,
            &envelope(
                "answerSubmitted",
                json!({
                    "userId": user_id,
                    "correct": tally.correct,
                    "points": tally.points,
                    "answeredCount": tally.answered,
                    "participantCount": tally.total,
                }),
            ),
        );
        // everyone sees the standings move as answers land
        self.rooms
            .broadcast(session_id, &envelope("sessionStateUpdate", snapshot));

        self.spawn_upsert_participant(session_id, user_id, username, score);
    }

    /// Reveal the correct answer and schedule the auto-advance to the
    /// leaderboard after the reveal window. Ignored when the session is not
    /// running.
    pub fn show_correct_answer(&self, session_id: Uuid) {
        self.reveal_guarded(session_id, None);
    }

    /// The mutation behind [`Self::show_correct_answer`], shared with the
    /// question-deadline timer. The epoch comparison happens inside the
    /// mutating closure, so a question shown between the timer firing and
    /// this call can never be revealed by the stale timer.
    fn reveal_guarded(&self, session_id: Uuid, expected_epoch: Option<u64>) {
        let Some(result) = self.registry.with_mut(session_id, |s| {
            if expected_epoch.is_some_and(|e| s.epoch() != e) {
                return None;
            }
            s.reveal();
            let question = s.active_question().map(|q| protocol::question_view(q, true));
            Some((s.epoch(), question, protocol::session_snapshot(s)))
        }) else {
            tracing::debug!(%session_id, "ignoring reveal for unknown session");
            return;
        };
        let Some((epoch, question, snapshot)) = result else {
            return;
        };

        self.rooms.broadcast(
            session_id,
            &envelope("showCorrectAnswer", json!({ "question": question })),
        );
        self.rooms.broadcast(
            session_id,
            &envelope("playSound", json!({ "sound": "reveal" })),
        );
        self.rooms
            .broadcast(session_id, &envelope("sessionStateUpdate", snapshot));

        self.schedule_leaderboard(session_id, epoch);
        self.spawn_persist_status(session_id, SessionPhase::ShowingAnswer, false);
    }

    /// Host escape hatch: jump to an arbitrary phase. Cancels any pending
    /// timer so a stale reveal cannot fire afterwards. Ignored when the
    /// session is not running.
    pub fn set_phase(&self, session_id: Uuid, phase: SessionPhase) {
        let Some(snapshot) = self.registry.with_mut(session_id, |s| {
            s.set_phase(phase);
            protocol::session_snapshot(s)
        }) else {
            tracing::debug!(%session_id, "ignoring setPhase for unknown session");
            return;
        };

        self.timers.cancel(session_id);
        self.rooms.broadcast(
            session_id,
            &envelope("phaseChanged", json!({ "phase": phase })),
        );
        self.rooms
            .broadcast(session_id, &envelope("sessionStateUpdate", snapshot));

        self.spawn_persist_status(session_id, phase, false);
    }

    /// Back to the lobby with zeroed scores; the roster stays. Ignored when
    /// the session is not running.
    pub fn restart_game(&self, session_id: Uuid) {
        let Some(snapshot) = self.registry.with_mut(session_id, |s| {
            s.restart();
            protocol::session_snapshot(s)
        }) else {
            tracing::debug!(%session_id, "ignoring restart for unknown session");
            return;
        };

        self.timers.cancel(session_id);
        self.rooms
            .broadcast(session_id, &envelope("gameRestarted", json!({})));
        self.rooms
            .broadcast(session_id, &envelope("sessionStateUpdate", snapshot));

        self.spawn_persist_status(session_id, SessionPhase::Lobby, false);
        self.spawn_reset_scores(session_id);
    }

    /// End the quiz and publish the final standings. Ignored when the
    /// session is not running.
    pub fn finish_game(&self, session_id: Uuid) {
        let Some((leaderboard, snapshot)) = self.registry.with_mut(session_id, |s| {
            s.finish();
            (protocol::leaderboard_view(s), protocol::session_snapshot(s))
        }) else {
            tracing::debug!(%session_id, "ignoring finish for unknown session");
            return;
        };

        self.broadcast_finish(session_id, &leaderboard, snapshot);
    }

    fn broadcast_finish(&self, session_id: Uuid, leaderboard: &Value, snapshot: Value) {
        self.timers.cancel(session_id);
        self.rooms
            .broadcast(session_id, &envelope("quizCompleted", json!({})));
        self.rooms.broadcast(
            session_id,
            &envelope("showFinalLeaderboard", json!({ "leaderboard": leaderboard })),
        );
        self.rooms
            .broadcast(session_id, &envelope("sessionStateUpdate", snapshot));

        self.spawn_persist_status(session_id, SessionPhase::Finished, false);
    }

    /// Remove participants matching a voluntary leave request. Ignored when
    /// the session is not running.
    pub fn leave(&self, session_id: Uuid, user_id: Option<i64>, username: Option<&str>) {
        let Some((removed, snapshot)) = self.registry.with_mut(session_id, |s| {
            let removed = s.remove_by_identity(user_id, username);
            (removed, protocol::session_snapshot(s))
        }) else {
            tracing::debug!(%session_id, "ignoring leave for unknown session");
            return;
        };

        for participant in &removed {
            self.rooms.unregister(
                session_id,
                &ClientRole::Participant(participant.socket_id),
            );
            self.rooms.broadcast(
                session_id,
                &envelope(
                    "userLeft",
                    json!({
                        "userId": participant.user_id,
                        "username": participant.username,
                        "reason": "left",
                    }),
                ),
            );
            self.spawn_deactivate_participant(session_id, participant.user_id);
        }
        if !removed.is_empty() {
            self.rooms
                .broadcast(session_id, &envelope("sessionStateUpdate", snapshot));
        }
    }

    /// Connection-drop cleanup. A lost participant leaves the roster; a lost
    /// host tears the whole session down.
    pub fn handle_disconnect(&self, session_id: Uuid, role: &ClientRole) {
        match role {
            ClientRole::Host => {
                self.rooms.unregister(session_id, role);
                self.end_session(session_id, "host disconnected");
            }
            ClientRole::Participant(socket_id) => {
                let removed = self
                    .registry
                    .with_mut(session_id, |s| {
                        let removed = s.remove_by_socket(*socket_id);
                        removed.map(|p| (p, protocol::session_snapshot(s)))
                    })
                    .flatten();
                self.rooms.unregister(session_id, role);

                if let Some((participant, snapshot)) = removed {
                    self.rooms.broadcast(
                        session_id,
                        &envelope(
                            "userLeft",
                            json!({
                                "userId": participant.user_id,
                                "username": participant.username,
                                "reason": "disconnected",
                            }),
                        ),
                    );
                    self.rooms
                        .broadcast(session_id, &envelope("sessionStateUpdate", snapshot));
                    self.spawn_deactivate_participant(session_id, participant.user_id);
                }
            }
        }
    }

    /// Tear a session down for everyone: notify, drop connections, and
    /// persist the terminal status. Ending a missing session is a no-op.
    pub fn end_session(&self, session_id: Uuid, reason: &str) {
        self.timers.cancel(session_id);
        if self.registry.remove(session_id).is_none() {
            tracing::debug!(%session_id, "end requested for unknown session");
            return;
        }

        self.rooms.broadcast(
            session_id,
            &envelope("sessionEnded", json!({ "reason": reason })),
        );
        self.rooms.remove_session(session_id);
        self.spawn_persist_status(session_id, SessionPhase::Finished, true);
        tracing::info!(%session_id, reason, "session ended");
    }

    /// Full state snapshot for a session, preferring live state and falling
    /// back to the persisted record for sessions no longer in memory.
    ///
    /// # Errors
    ///
    /// Fails when the session exists in neither memory nor the database.
    pub async fn snapshot(&self, session_id: Uuid) -> Result<Value, LiveError> {
        if let Some(snapshot) = self.registry.with(session_id, protocol::session_snapshot) {
            return Ok(snapshot);
        }

        let row = session::Entity::find_by_id(session_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| LiveError::NotFound("Session not found.".to_string()))?;

        let participants = session_participant::Entity::find()
            .filter(session_participant::Column::SessionId.eq(session_id))
            .all(&self.db)
            .await?;

        let mut rows: Vec<&session_participant::Model> = participants.iter().collect();
        rows.sort_by_key(|p| std::cmp::Reverse(p.score));
        let leaderboard: Vec<Value> = rows
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

        Ok(json!({
            "sessionId": row.id,
            "quizId": row.quiz_id,
            "phase": SessionPhase::from_status(&row.status),
            "endedAt": row.ended_at.map(|t| t.to_rfc3339()),
            "participants": participants
                .iter()
                .filter(|p| p.active)
                .map(|p| json!({
                    "userId": p.user_id,
                    "username": p.username,
                    "score": p.score,
                }))
                .collect::<Vec<_>>(),
            "participantCount": participants.iter().filter(|p| p.active).count(),
            "leaderboard": leaderboard,
            "question": Value::Null,
            "answeredCount": 0,
        }))
    }

    // ─── Timers ──────────────────────────────────────────────────────────────

    /// When the answer window closes, reveal automatically. The epoch is
    /// re-checked inside the mutating closure, so a question change between
    /// the sleep elapsing and the lock being taken still wins.
    fn schedule_reveal(&self, session_id: Uuid, epoch: u64, delay: Duration) {
        let service = self.clone();
        self.timers.set(
            session_id,
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                service.reveal_guarded(session_id, Some(epoch));
            }),
        );
    }

    /// After the reveal window, show the between-questions leaderboard, then
    /// walk on to the next question (or the finish) one window later.
    fn schedule_leaderboard(&self, session_id: Uuid, epoch: u64) {
        let service = self.clone();
        let delay = self.reveal_window;
        self.timers.set(
            session_id,
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let payload = service
                    .registry
                    .with_mut(session_id, |s| {
                        if s.epoch() != epoch {
                            return None;
                        }
                        s.set_phase(SessionPhase::Leaderboard);
                        Some((
                            s.epoch(),
                            protocol::leaderboard_view(s),
                            protocol::session_snapshot(s),
                        ))
                    })
                    .flatten();
                let Some((next_epoch, leaderboard, snapshot)) = payload else {
                    return;
                };
                service.rooms.broadcast(
                    session_id,
                    &envelope("showLeaderboard", json!({ "leaderboard": leaderboard })),
                );
                service
                    .rooms
                    .broadcast(session_id, &envelope("sessionStateUpdate", snapshot));
                service.spawn_persist_status(session_id, SessionPhase::Leaderboard, false);
                service.schedule_advance(session_id, next_epoch);
            }),
        );
    }

    /// After the leaderboard interlude, show the next question; exhaustion
    /// finishes the game inside the same guarded mutation.
    fn schedule_advance(&self, session_id: Uuid, epoch: u64) {
        let service = self.clone();
        let delay = self.reveal_window;
        self.timers.set(
            session_id,
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                // None is passed for the index, so no validation error can occur
                if let Err(err) = service.show_question_guarded(session_id, None, Some(epoch)) {
                    tracing::debug!(%session_id, "auto-advance skipped: {}", err.to_event());
                }
            }),
        );
    }

    // ─── Persistence (fire-and-forget) ───────────────────────────────────────

    async fn persist_new_session(
        &self,
        session_id: Uuid,
        host_id: i64,
        quiz_id: i64,
    ) -> Result<(), LiveError> {
        let now = Utc::now().fixed_offset();
        let row = session::ActiveModel {
            id: Set(session_id),
            created_at: Set(now),
            updated_at: Set(now),
            ended_at: Set(None),
            host_id: Set(host_id),
            quiz_id: Set(quiz_id),
            status: Set(SessionPhase::Lobby.as_str().to_string()),
        };
        row.insert(&self.db).await?;
        Ok(())
    }

    fn spawn_persist_status(&self, session_id: Uuid, phase: SessionPhase, ended: bool) {
        let db = self.db.clone();
        tokio::spawn(async move {
            let result = async {
                let Some(row) = session::Entity::find_by_id(session_id).one(&db).await? else {
                    return Ok::<_, sea_orm::DbErr>(());
                };
                let now = Utc::now().fixed_offset();
                let mut active: session::ActiveModel = row.into();
                active.status = Set(phase.as_str().to_string());
                active.updated_at = Set(now);
                if ended {
                    active.ended_at = Set(Some(now));
                }
                active.update(&db).await?;
                Ok(())
            }
            .await;
            if let Err(err) = result {
                tracing::warn!(%session_id, "failed to persist session status: {err}");
            }
        });
    }

    fn spawn_upsert_participant(
        &self,
        session_id: Uuid,
        user_id: i64,
        username: String,
        score: i64,
    ) {
        let db = self.db.clone();
        tokio::spawn(async move {
            let result = async {
                let existing = session_participant::Entity::find()
                    .filter(session_participant::Column::SessionId.eq(session_id))
                    .filter(session_participant::Column::UserId.eq(user_id))
                    .one(&db)
                    .await?;

                let now = Utc::now().fixed_offset();
                if let Some(row) = existing {
                    let mut active: session_participant::ActiveModel = row.into();
                    active.username = Set(username);
                    active.score = Set(score);
                    active.active = Set(true);
                    active.left_at = Set(None);
                    active.update(&db).await?;
                } else {
                    let row = session_participant::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        session_id: Set(session_id),
                        user_id: Set(user_id),
                        username: Set(username),
                        score: Set(score),
                        active: Set(true),
                        joined_at: Set(now),
                        left_at: Set(None),
                    };
                    row.insert(&db).await?;
                }
                Ok::<_, sea_orm::DbErr>(())
            }
            .await;
            if let Err(err) = result {
                tracing::warn!(%session_id, user_id, "failed to persist participant: {err}");
            }
        });
    }

    fn spawn_deactivate_participant(&self, session_id: Uuid, user_id: i64) {
        let db = self.db.clone();
        tokio::spawn(async move {
            let result = async {
                let Some(row) = session_participant::Entity::find()
                    .filter(session_participant::Column::SessionId.eq(session_id))
                    .filter(session_participant::Column::UserId.eq(user_id))
                    .one(&db)
                    .await?
                else {
                    return Ok::<_, sea_orm::DbErr>(());
                };
                let mut active: session_participant::ActiveModel = row.into();
                active.active = Set(false);
                active.left_at = Set(Some(Utc::now().fixed_offset()));
                active.update(&db).await?;
                Ok(())
            }
            .await;
            if let Err(err) = result {
                tracing::warn!(%session_id, user_id, "failed to deactivate participant: {err}");
            }
        });
    }

    fn spawn_reset_scores(&self, session_id: Uuid) {
        let db = self.db.clone();
        tokio::spawn(async move {
            let result = session_participant::Entity::update_many()
                .col_expr(
                    session_participant::Column::Score,
                    sea_orm::sea_query::Expr::value(0_i64),
                )
                .filter(session_participant::Column::SessionId.eq(session_id))
                .exec(&db)
                .await;
            if let Err(err) = result {
                tracing::warn!(%session_id, "failed to reset participant scores: {err}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use tokio::sync::mpsc;

    use crate::auth::issue_host_token;
    use crate::config::Environment;

    const SECRET: &str = "test-secret-key-for-testing-only-32chars";

    async fn test_service() -> LiveQuizService {
        let db = sea_orm::Database::connect("sqlite::memory:")
            .await
            .unwrap_or_default();
        Migrator::up(&db, None).await.unwrap_or_default();

        let config = Config {
            database_url: String::new(),
            server_host: std::net::IpAddr::from([127, 0, 0, 1]),
            server_port: 0,
            environment: Environment::Development,
            log_level: "warn".to_string(),
            jwt_secret: SECRET.to_string(),
            frontend_url: "http://localhost:3001".to_string(),
            reveal_window_secs: 5,
        };
        LiveQuizService::new(db, &config)
    }

    async fn seeded_session(service: &LiveQuizService) -> Uuid {
        let token = issue_host_token(1, "quizmaster", SECRET, 900).unwrap_or_default();
        let (host_tx, _host_rx) = mpsc::unbounded_channel();
        service
            .start_session(&token, 1, host_tx)
            .await
            .unwrap_or_else(|_| Uuid::nil())
    }

    #[tokio::test]
    async fn stale_epoch_reveal_leaves_the_new_question_untouched() {
        let service = test_service().await;
        let session_id = seeded_session(&service).await;

        assert!(service.show_question(session_id, Some(0)).is_ok());
        let stale_epoch = service
            .registry
            .with(session_id, LiveSession::epoch)
            .unwrap_or_default();

        // host moves on before the stale timer's reveal lands
        assert!(service.show_question(session_id, Some(1)).is_ok());
        service.reveal_guarded(session_id, Some(stale_epoch));

        let phase = service.registry.with(session_id, |s| s.phase);
        assert_eq!(phase, Some(SessionPhase::Question));
    }

    #[tokio::test]
    async fn current_epoch_reveal_goes_through() {
        let service = test_service().await;
        let session_id = seeded_session(&service).await;

        assert!(service.show_question(session_id, Some(0)).is_ok());
        let epoch = service
            .registry
            .with(session_id, LiveSession::epoch)
            .unwrap_or_default();
        service.reveal_guarded(session_id, Some(epoch));

        let phase = service.registry.with(session_id, |s| s.phase);
        assert_eq!(phase, Some(SessionPhase::ShowingAnswer));
    }

    #[tokio::test]
    async fn stale_epoch_advance_does_not_override_a_restart() {
        let service = test_service().await;
        let session_id = seeded_session(&service).await;

        assert!(service.show_question(session_id, Some(0)).is_ok());
        let stale_epoch = service
            .registry
            .with(session_id, LiveSession::epoch)
            .unwrap_or_default();

        service.restart_game(session_id);
        assert!(
            service
                .show_question_guarded(session_id, None, Some(stale_epoch))
                .is_ok()
        );

        let phase = service.registry.with(session_id, |s| s.phase);
        assert_eq!(phase, Some(SessionPhase::Lobby));
    }
}
