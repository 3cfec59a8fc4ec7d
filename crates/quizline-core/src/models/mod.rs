//! Data models for the quiz service.
//!
//! - `Level`: difficulty tier 1-3 and the pass threshold
//! - `Question`, `QuestionSet`, `QuestionCatalog`: question listings
//! - `SubmissionResult`: graded quiz submission
//! - `QuizAttempt`, `AnswerDetail`: attempt history
//! - `UserProgress`, `LevelProgress`: per-level unlock progress

pub mod history;
pub mod level;
pub mod progress;
pub mod question;
pub mod submission;

pub use history::{AnswerDetail, QuizAttempt, ScoreClass};
pub use level::{Level, PASS_THRESHOLD_PERCENT};
pub use progress::{LevelProgress, UserProgress};
pub use question::{LevelInfo, LevelUpdate, Question, QuestionCatalog, QuestionSet};
pub use submission::{Answers, SubmissionResult};
