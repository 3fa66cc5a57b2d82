use serde::{Deserialize, Serialize};

/// Lifecycle phase of a live quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    /// Participants gather; nothing is being asked yet.
    Lobby,
    /// Host pressed start; intro plays before the first question.
    Starting,
    /// A question is on screen and answerable.
    Question,
    /// The correct answer is revealed; answers are closed.
    ShowingAnswer,
    /// Standings are on screen between questions.
    Leaderboard,
    /// The quiz is over; final standings are displayed.
    Finished,
}

impl SessionPhase {
    /// Wire/database representation of the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::Starting => "starting",
            Self::Question => "question",
            Self::ShowingAnswer => "showingAnswer",
            Self::Leaderboard => "leaderboard",
            Self::Finished => "finished",
        }
    }

    /// Parse a persisted status string; unknown values fall back to lobby.
    #[must_use]
    pub fn from_status(status: &str) -> Self {
        match status {
            "starting" => Self::Starting,
            "question" => Self::Question,
            "showingAnswer" => Self::ShowingAnswer,
            "leaderboard" => Self::Leaderboard,
            "finished" => Self::Finished,
            _ => Self::Lobby,
        }
    }
}
