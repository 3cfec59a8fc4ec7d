use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::Level;

/// Timestamp format used by the history endpoint
const SUBMITTED_AT_FORMAT: &str = "%Y-%m-%d %H:%M";

/// One answered question inside a past attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerDetail {
    pub question_id: i64,
    pub question_text: String,
    #[serde(default)]
    pub selected_option: Option<String>,
    #[serde(default)]
    pub correct_answer: String,
    #[serde(default)]
    pub is_correct: bool,
    #[serde(default)]
    pub level: Level,
}

/// A past quiz attempt, as returned by `GET /api/quiz-history`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub quiz_id: i64,
    pub score: u32,
    #[serde(default)]
    pub total_questions: u32,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub level: Level,
    #[serde(default)]
    pub level_passed: bool,
    pub submitted_at: String,
    #[serde(default)]
    pub answers: Vec<AnswerDetail>,
}

impl QuizAttempt {
    pub fn submitted_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.submitted_at, SUBMITTED_AT_FORMAT).ok()
    }

    pub fn score_class(&self) -> ScoreClass {
        ScoreClass::from_score(self.score, self.total_questions)
    }

    pub fn wrong_answers(&self) -> impl Iterator<Item = &AnswerDetail> {
        self.answers.iter().filter(|a| !a.is_correct)
    }
}

/// Rating bucket used when listing attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreClass {
    Excellent,
    Good,
    Average,
    Poor,
}

impl ScoreClass {
    pub fn from_score(score: u32, total: u32) -> Self {
        if total == 0 {
            return ScoreClass::Poor;
        }
        let percentage = f64::from(score) / f64::from(total) * 100.0;
        if percentage >= 90.0 {
            ScoreClass::Excellent
        } else if percentage >= 70.0 {
            ScoreClass::Good
        } else if percentage >= 50.0 {
            ScoreClass::Average
        } else {
            ScoreClass::Poor
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoreClass::Excellent => "excellent",
            ScoreClass::Good => "good",
            ScoreClass::Average => "average",
            ScoreClass::Poor => "poor",
        }
    }
}
