use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::Level;

/// Selected option text keyed by question id
pub type Answers = BTreeMap<i64, String>;

/// Body of `POST /api/submit`
#[derive(Debug, Serialize)]
pub(crate) struct SubmitRequest<'a> {
    pub answers: BTreeMap<String, &'a str>,
}

impl<'a> SubmitRequest<'a> {
    pub fn new(answers: &'a Answers) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(id, option)| (id.to_string(), option.as_str()))
                .collect(),
        }
    }
}

/// Graded result of a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub score: u32,
    #[serde(default)]
    pub total_questions: u32,
    /// Correct option text keyed by question id (as a string)
    #[serde(default)]
    pub correct_answers: HashMap<String, String>,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub level_passed: bool,
    #[serde(default)]
    pub current_level: Option<Level>,
    #[serde(default)]
    pub next_level_unlocked: bool,
    #[serde(default)]
    pub is_perfect: bool,
}

impl SubmissionResult {
    pub fn correct_answer(&self, question_id: i64) -> Option<&str> {
        self.correct_answers
            .get(&question_id.to_string())
            .map(String::as_str)
    }
}
