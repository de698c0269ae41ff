//! HTTP API server for the learning app front end
//!
//! This module provides a REST API for the four learning modes:
//! - GET /health - Health check
//! - GET /modes - Learning modes, flashcard topics and practice characters
//! - POST /speaking/start - Open a live speaking session with Panda Laoshi
//! - POST /speaking/stop - Disconnect the speaking session
//! - GET /speaking/status - Connection state, volume and speaking flag
//! - POST /reading/flashcard - Illustrated flashcard for a topic
//! - POST /reading/illustration - Illustration for a word
//! - POST /listening/story - Short story with a quiz question
//! - POST /writing/check - Grade a handwriting attempt

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, AudioDevices, SpeakingSession};
