//! Generated lesson content
//!
//! Non-streaming Gemini calls behind the listening, reading and writing
//! modes: flashcards with illustrations, short stories with a quiz question,
//! and handwriting grading.

pub mod client;
pub mod json;
pub mod lessons;
pub mod types;

pub use client::{ContentModel, GeminiClient, GenerateContentRequest, GenerateContentResponse};
pub use lessons::LessonService;
pub use types::{AppMode, Flashcard, Story, WritingResult, FLASHCARD_TOPICS, PRACTICE_CHARACTERS};
