//! The live session engine: in-memory state for running quiz sessions,
//! phase transitions, roster management, answer scoring, timers, and the
//! room-scoped broadcast protocol.

pub mod phase;
pub mod protocol;
pub mod quiz;
pub mod registry;
pub mod rooms;
pub mod service;
pub mod session;
pub mod timers;

pub use phase::SessionPhase;
pub use quiz::{OptionContent, QuestionContent, QuizContent};
pub use registry::SessionRegistry;
pub use rooms::{ClientRole, RoomManager};
pub use service::{LiveError, LiveQuizService};
pub use session::{LiveSession, Participant};
