use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::live::phase::SessionPhase;
use crate::live::quiz::{QuestionContent, QuizContent};

/// Base points awarded for a correct answer when the question carries none.
pub const DEFAULT_BASE_POINTS: i64 = 10;

/// Maximum speed bonus; decays by one point per full second of response time.
pub const MAX_SPEED_BONUS: i64 = 5;

/// A non-host player in a session. The host's connection is tracked in the
/// room manager only and never appears here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user_id: i64,
    pub username: String,
    /// Transient connection handle; replaced on reconnect.
    pub socket_id: Uuid,
    pub score: i64,
}

/// A scored submission for the active question. Immutable once recorded;
/// cleared en masse when a new question starts or the game restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub user_id: i64,
    pub answer_index: usize,
    pub option_id: i64,
    pub correct: bool,
    pub points: i64,
    /// Response time, floored to whole seconds for the bonus computation.
    pub elapsed: Duration,
}

/// Result of accepting an answer, used for the host-facing tally broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerTally {
    pub correct: bool,
    pub points: i64,
    pub answered: usize,
    pub total: usize,
}

/// Speed bonus for a response: `max(0, 5 - floor(elapsed_secs))`.
#[must_use]
pub fn speed_bonus(elapsed: Duration) -> i64 {
    let secs = i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX);
    (MAX_SPEED_BONUS - secs).max(0)
}

/// In-memory state of one live quiz session.
///
/// All mutation happens under the registry's shard guard; methods take
/// explicit `Instant`s so timing behavior stays deterministic under test.
#[derive(Debug)]
pub struct LiveSession {
    pub id: Uuid,
    pub host_id: i64,
    pub quiz: QuizContent,
    pub phase: SessionPhase,
    participants: Vec<Participant>,
    answers: HashMap<i64, AnswerRecord>,
    current_question_index: Option<usize>,
    question_started_at: Option<Instant>,
    question_duration: Duration,
    epoch: u64,
}

impl LiveSession {
    #[must_use]
    pub fn new(id: Uuid, host_id: i64, quiz: QuizContent) -> Self {
        Self {
            id,
            host_id,
            quiz,
            phase: SessionPhase::Lobby,
            participants: Vec::new(),
            answers: HashMap::new(),
            current_question_index: None,
            question_started_at: None,
            question_duration: Duration::ZERO,
            epoch: 0,
        }
    }

    /// Join order roster. Leaderboards re-sort a copy; this list never does.
    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    #[must_use]
    pub fn answers(&self) -> &HashMap<i64, AnswerRecord> {
        &self.answers
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// Monotonic counter superseding scheduled timers: any phase change that
    /// invalidates a pending reveal/advance bumps it, and a firing timer
    /// whose captured epoch no longer matches must do nothing.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub const fn current_question_index(&self) -> Option<usize> {
        self.current_question_index
    }

    /// The question currently on screen (asking or revealing), if any.
    #[must_use]
    pub fn active_question(&self) -> Option<&QuestionContent> {
        self.current_question_index
            .and_then(|i| self.quiz.questions.get(i))
    }

    /// Index of the question that would follow the current one, or `None`
    /// when the quiz is exhausted.
    #[must_use]
    pub fn next_question_index(&self) -> Option<usize> {
        let next = self.current_question_index.map_or(0, |i| i + 1);
        (next < self.quiz.questions.len()).then_some(next)
    }

    /// Add a participant, replacing any prior entry that shares the user id,
    /// username, or socket id. Score carries over when the replaced entry
    /// matched on identity (user id or username); a socket-only collision
    /// starts fresh at zero. Returns the resulting roster entry.
    pub fn join(&mut self, user_id: i64, username: &str, socket_id: Uuid) -> Participant {
        let mut carried_score = None;
        self.participants.retain(|p| {
            let duplicate =
                p.user_id == user_id || p.username == username || p.socket_id == socket_id;
            if duplicate && (p.user_id == user_id || p.username == username) {
                carried_score = Some(p.score);
            }
            !duplicate
        });

        let entry = Participant {
            user_id,
            username: username.to_string(),
            socket_id,
            score: carried_score.unwrap_or(0),
        };
        self.participants.push(entry.clone());
        entry
    }

    /// Remove the participant bound to a socket (disconnect path).
    pub fn remove_by_socket(&mut self, socket_id: Uuid) -> Option<Participant> {
        let idx = self.participants.iter().position(|p| p.socket_id == socket_id)?;
        Some(self.participants.remove(idx))
    }

    /// Remove participants matching an explicit leave request.
    pub fn remove_by_identity(
        &mut self,
        user_id: Option<i64>,
        username: Option<&str>,
    ) -> Vec<Participant> {
        let mut removed = Vec::new();
        self.participants.retain(|p| {
            let matches = user_id.is_some_and(|id| p.user_id == id)
                || username.is_some_and(|name| p.username == name);
            if matches {
                removed.push(p.clone());
            }
            !matches
        });
        removed
    }

    /// `lobby → starting`: the game begins, no question is up yet.
    pub fn start(&mut self) {
        self.phase = SessionPhase::Starting;
        self.epoch += 1;
    }

    /// Put a question on screen: sets the answer window, clears previous
    /// answers, and supersedes any pending timer.
    pub fn show_question(&mut self, index: usize, now: Instant) -> Option<&QuestionContent> {
        let duration_secs = u64::from(self.quiz.questions.get(index)?.duration_secs);
        self.phase = SessionPhase::Question;
        self.current_question_index = Some(index);
        self.question_started_at = Some(now);
        self.question_duration = Duration::from_secs(duration_secs);
        self.answers.clear();
        self.epoch += 1;
        self.quiz.questions.get(index)
    }

    /// Accept an answer for the active question, or silently reject it.
    ///
    /// Rejection cases (all return `None`, no state change): the phase is
    /// not `question`; the submitter is not in the roster; the submitter
    /// already answered; or the answer window has closed. A late answer is
    /// dropped entirely rather than scored as zero.
    pub fn submit_answer(
        &mut self,
        user_id: i64,
        answer_index: usize,
        option_id: i64,
        now: Instant,
    ) -> Option<AnswerTally> {
        if self.phase != SessionPhase::Question {
            return None;
        }
        if self.answers.contains_key(&user_id) {
            return None;
        }
        let started_at = self.question_started_at?;
        let elapsed = now.saturating_duration_since(started_at);
        if elapsed > self.question_duration {
            return None;
        }

        let question = self.active_question()?;
        let option = question
            .options
            .iter()
            .find(|o| o.id == option_id)
            .or_else(|| question.option_at(answer_index));
        let correct = option.is_some_and(|o| o.is_correct);

        let base = if question.points > 0 {
            question.points
        } else {
            DEFAULT_BASE_POINTS
        };
        let points = if correct { base + speed_bonus(elapsed) } else { 0 };

        let participant = self.participants.iter_mut().find(|p| p.user_id == user_id)?;
        participant.score += points;

        self.answers.insert(
            user_id,
            AnswerRecord {
                user_id,
                answer_index,
                option_id,
                correct,
                points,
                elapsed,
            },
        );

        Some(AnswerTally {
            correct,
            points,
            answered: self.answers.len(),
            total: self.participants.len(),
        })
    }

    /// `question → showingAnswer`: close the answer window and reveal.
    pub fn reveal(&mut self) {
        self.phase = SessionPhase::ShowingAnswer;
        self.epoch += 1;
    }

    /// End of the quiz; final standings are displayed.
    pub fn finish(&mut self) {
        self.phase = SessionPhase::Finished;
        self.epoch += 1;
    }

    /// Host escape hatch: set an arbitrary phase without ordering checks.
    pub fn set_phase(&mut self, phase: SessionPhase) {
        self.phase = phase;
        self.epoch += 1;
    }

    /// Back to the lobby: scores zeroed, question state cleared, roster
    /// membership and order preserved.
    pub fn restart(&mut self) {
        self.phase = SessionPhase::Lobby;
        self.answers.clear();
        self.current_question_index = None;
        self.question_started_at = None;
        self.question_duration = Duration::ZERO;
        self.epoch += 1;
        for p in &mut self.participants {
            p.score = 0;
        }
    }

    /// Standings sorted by score descending. The sort is stable, so equal
    /// scores keep join order and repeated recomputation never jitters.
    #[must_use]
    pub fn leaderboard(&self) -> Vec<&Participant> {
        let mut standings: Vec<&Participant> = self.participants.iter().collect();
        standings.sort_by_key(|p| std::cmp::Reverse(p.score));
        standings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::quiz::OptionContent;

    fn two_question_quiz() -> QuizContent {
        QuizContent {
            id: 1,
            title: "General Knowledge Demo".to_string(),
            questions: vec![
                QuestionContent {
                    id: 10,
                    index: 1,
                    question_text: "What is the capital of France?".to_string(),
                    duration_secs: 10,
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
                },
                QuestionContent {
                    id: 11,
                    index: 2,
                    question_text: "Which planet is the Red Planet?".to_string(),
                    duration_secs: 15,
                    points: 10,
                    media_url: None,
                    options: vec![
                        OptionContent {
                            id: 110,
                            option_text: "Venus".to_string(),
                            is_correct: false,
                        },
                        OptionContent {
                            id: 111,
                            option_text: "Mars".to_string(),
                            is_correct: true,
                        },
                    ],
                },
            ],
        }
    }

    fn session_with_participants(names: &[(i64, &str)]) -> LiveSession {
        let mut session = LiveSession::new(Uuid::new_v4(), 1, two_question_quiz());
        for (user_id, name) in names {
            session.join(*user_id, name, Uuid::new_v4());
        }
        session
    }

    fn at(t0: Instant, secs: u64) -> Instant {
        t0 + Duration::from_secs(secs)
    }

    #[test]
    fn speed_bonus_decays_to_zero() {
        assert_eq!(speed_bonus(Duration::ZERO), 5);
        assert_eq!(speed_bonus(Duration::from_millis(900)), 5);
        assert_eq!(speed_bonus(Duration::from_secs(2)), 3);
        assert_eq!(speed_bonus(Duration::from_secs(5)), 0);
        assert_eq!(speed_bonus(Duration::from_secs(60)), 0);
    }

    #[test]
    fn double_answer_only_first_counts() {
        let mut session = session_with_participants(&[(2, "alice")]);
        let t0 = Instant::now();
        session.show_question(0, t0);

        let first = session.submit_answer(2, 0, 100, at(t0, 1));
        let second = session.submit_answer(2, 1, 101, at(t0, 2));

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(session.answered_count(), 1);
        assert_eq!(session.participants()[0].score, 14);
        assert_eq!(
            session.answers().get(&2).map(|a| a.option_id),
            Some(100)
        );
    }

    #[test]
    fn late_answer_is_dropped_not_zero_scored() {
        let mut session = session_with_participants(&[(2, "alice")]);
        let t0 = Instant::now();
        session.show_question(0, t0);

        let late = session.submit_answer(2, 0, 100, at(t0, 10) + Duration::from_millis(1));
        assert!(late.is_none());
        assert!(session.answers().is_empty());
        assert_eq!(session.participants()[0].score, 0);
    }

    #[test]
    fn answer_just_inside_window_is_accepted() {
        let mut session = session_with_participants(&[(2, "alice")]);
        let t0 = Instant::now();
        session.show_question(0, t0);

        let in_time = session.submit_answer(2, 0, 100, at(t0, 10) - Duration::from_millis(1));
        assert!(in_time.is_some());
    }

    #[test]
    fn earlier_correct_answer_never_scores_less() {
        let mut scores = Vec::new();
        for secs in 0..8 {
            let mut session = session_with_participants(&[(2, "alice")]);
            let t0 = Instant::now();
            session.show_question(0, t0);
            session.submit_answer(2, 0, 100, at(t0, secs));
            scores.push(session.participants()[0].score);
        }
        for pair in scores.windows(2) {
            assert!(pair[0] >= pair[1], "score increased with response time");
        }
        assert_eq!(scores[0], 15);
        assert_eq!(*scores.last().unwrap_or(&0), 10);
    }

    #[test]
    fn incorrect_answer_scores_zero_but_is_recorded() {
        let mut session = session_with_participants(&[(2, "alice")]);
        let t0 = Instant::now();
        session.show_question(0, t0);

        let tally = session.submit_answer(2, 1, 101, at(t0, 1));
        assert_eq!(tally.map(|t| t.points), Some(0));
        assert_eq!(session.answers().get(&2).map(|a| a.correct), Some(false));
        assert_eq!(session.participants()[0].score, 0);
    }

    #[test]
    fn rejoining_keeps_one_entry_with_latest_socket() {
        let mut session = session_with_participants(&[]);
        let first_socket = Uuid::new_v4();
        let second_socket = Uuid::new_v4();

        session.join(2, "alice", first_socket);
        session.join(2, "alice", second_socket);

        assert_eq!(session.participants().len(), 1);
        assert_eq!(session.participants()[0].socket_id, second_socket);
    }

    #[test]
    fn reconnect_carries_score() {
        let mut session = session_with_participants(&[(2, "alice")]);
        let t0 = Instant::now();
        session.show_question(0, t0);
        session.submit_answer(2, 0, 100, at(t0, 0));
        assert_eq!(session.participants()[0].score, 15);

        session.join(2, "alice", Uuid::new_v4());
        assert_eq!(session.participants()[0].score, 15);
    }

    #[test]
    fn socket_only_collision_starts_at_zero() {
        let mut session = session_with_participants(&[]);
        let socket = Uuid::new_v4();
        session.join(2, "alice", socket);
        let t0 = Instant::now();
        session.show_question(0, t0);
        session.submit_answer(2, 0, 100, at(t0, 0));

        // Different identity claiming the same socket replaces the entry
        session.join(3, "bob", socket);
        assert_eq!(session.participants().len(), 1);
        assert_eq!(session.participants()[0].score, 0);
    }

    #[test]
    fn host_is_never_scored() {
        let mut session = session_with_participants(&[(2, "alice")]);
        let t0 = Instant::now();
        session.show_question(0, t0);

        // host_id is 1 and the host is not in the roster
        let tally = session.submit_answer(1, 0, 100, at(t0, 0));
        assert!(tally.is_none());
        assert!(session.answers().is_empty());
        assert!(session.participants().iter().all(|p| p.user_id != 1));
        assert!(session.leaderboard().iter().all(|p| p.user_id != 1));
    }

    #[test]
    fn leaderboard_is_stable_under_ties() {
        let mut session = session_with_participants(&[(2, "alice"), (3, "bob"), (4, "carol")]);
        let t0 = Instant::now();
        session.show_question(0, t0);
        session.submit_answer(3, 0, 100, at(t0, 1));

        let first: Vec<i64> = session.leaderboard().iter().map(|p| p.user_id).collect();
        let second: Vec<i64> = session.leaderboard().iter().map(|p| p.user_id).collect();
        assert_eq!(first, vec![3, 2, 4]);
        assert_eq!(first, second);
    }

    #[test]
    fn restart_zeroes_scores_and_keeps_roster_order() {
        let mut session = session_with_participants(&[(2, "alice"), (3, "bob")]);
        let t0 = Instant::now();
        session.show_question(0, t0);
        session.submit_answer(2, 0, 100, at(t0, 0));
        session.reveal();

        session.restart();

        assert_eq!(session.phase, SessionPhase::Lobby);
        assert!(session.answers().is_empty());
        assert!(session.active_question().is_none());
        assert_eq!(session.current_question_index(), None);
        let roster: Vec<(i64, i64)> = session
            .participants()
            .iter()
            .map(|p| (p.user_id, p.score))
            .collect();
        assert_eq!(roster, vec![(2, 0), (3, 0)]);
    }

    #[test]
    fn answer_outside_question_phase_is_ignored() {
        let mut session = session_with_participants(&[(2, "alice")]);

        // lobby
        assert!(session.submit_answer(2, 0, 100, Instant::now()).is_none());

        let t0 = Instant::now();
        session.show_question(0, t0);
        session.reveal();
        assert!(session.submit_answer(2, 0, 100, at(t0, 1)).is_none());
        assert!(session.answers().is_empty());
        assert_eq!(session.participants()[0].score, 0);
    }

    #[test]
    fn new_question_clears_answers_and_bumps_epoch() {
        let mut session = session_with_participants(&[(2, "alice")]);
        let t0 = Instant::now();
        session.show_question(0, t0);
        session.submit_answer(2, 0, 100, at(t0, 0));
        let epoch_before = session.epoch();

        session.show_question(1, at(t0, 20));

        assert!(session.answers().is_empty());
        assert!(session.epoch() > epoch_before);
        assert_eq!(session.active_question().map(|q| q.id), Some(11));

        // score from the previous question is cumulative
        assert_eq!(session.participants()[0].score, 15);
    }

    #[test]
    fn next_question_index_walks_the_quiz() {
        let mut session = session_with_participants(&[]);
        assert_eq!(session.next_question_index(), Some(0));
        session.show_question(0, Instant::now());
        assert_eq!(session.next_question_index(), Some(1));
        session.show_question(1, Instant::now());
        assert_eq!(session.next_question_index(), None);
    }

    #[test]
    fn two_question_game_matches_expected_scores() {
        let mut session = session_with_participants(&[(2, "alice"), (3, "bob"), (4, "carol")]);
        session.start();
        let t0 = Instant::now();
        session.show_question(0, t0);

        // alice correct at t=2s: 10 + max(0, 5-2) = 13
        assert_eq!(
            session.submit_answer(2, 0, 100, at(t0, 2)).map(|t| t.points),
            Some(13)
        );
        // bob incorrect at t=5s: 0
        assert_eq!(
            session.submit_answer(3, 1, 101, at(t0, 5)).map(|t| t.points),
            Some(0)
        );
        // carol never answers
        session.reveal();

        let standings: Vec<(i64, i64)> = session
            .leaderboard()
            .iter()
            .map(|p| (p.user_id, p.score))
            .collect();
        assert_eq!(standings, vec![(2, 13), (3, 0), (4, 0)]);
    }
}
