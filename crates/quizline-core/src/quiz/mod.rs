//! Client-side quiz state.
//!
//! - `QuizRun`: stepping through one level's questions and collecting answers
//! - `LevelEditor`: pending level changes for the question catalog

pub mod editor;
pub mod run;

pub use editor::LevelEditor;
pub use run::{QuizRun, Step};
