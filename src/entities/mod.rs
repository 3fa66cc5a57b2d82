pub mod question;
pub mod question_option;
pub mod quiz;
pub mod session;
pub mod session_participant;
