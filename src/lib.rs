//! QuizCast API - Backend for real-time multiplayer quizzes
//!
//! This crate provides the live session engine for QuizCast, enabling:
//! - Session creation and host-driven phase control
//! - Participant joining, answering, and live scoring
//! - Room-scoped WebSocket broadcasts with per-audience payload shaping

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod live;
pub mod routes;
pub mod state;
