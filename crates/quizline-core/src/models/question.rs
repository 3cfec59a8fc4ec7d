use serde::{Deserialize, Deserializer, Serialize};

use super::Level;

/// Number of levels the backend serves
const DEFAULT_TOTAL_LEVELS: u8 = 3;

fn default_total_levels() -> u8 {
    DEFAULT_TOTAL_LEVELS
}

/// Options can be null for questions with fewer than four choices
fn null_options_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let options: Vec<Option<String>> = Deserialize::deserialize(deserializer)?;
    Ok(options.into_iter().map(Option::unwrap_or_default).collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub question: String,
    #[serde(default, deserialize_with = "null_options_as_empty")]
    pub options: Vec<String>,
    /// Text of the correct option
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub level: Level,
}

impl Question {
    /// Options with their display letters (A, B, C, D), skipping blanks
    pub fn lettered_options(&self) -> impl Iterator<Item = (char, &str)> {
        ('A'..='Z')
            .zip(self.options.iter())
            .filter(|(_, text)| !text.is_empty())
            .map(|(letter, text)| (letter, text.as_str()))
    }

    /// Resolve a letter (case-insensitive) to the option text
    pub fn option_by_letter(&self, letter: char) -> Option<&str> {
        let letter = letter.to_ascii_uppercase();
        self.lettered_options()
            .find(|(l, _)| *l == letter)
            .map(|(_, text)| text)
    }

    pub fn has_option(&self, option: &str) -> bool {
        !option.is_empty() && self.options.iter().any(|o| o == option)
    }
}

/// Progress on the level the user is currently playing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LevelInfo {
    #[serde(default)]
    pub total_questions: u32,
    #[serde(default)]
    pub best_score: u32,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub passed: bool,
}

/// Response of `GET /api/questions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSet {
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub current_level: Level,
    #[serde(default = "default_total_levels")]
    pub total_levels: u8,
    #[serde(default)]
    pub level_info: Option<LevelInfo>,
    #[serde(default)]
    pub message: Option<String>,
}

impl QuestionSet {
    /// Message to show when there is nothing to play
    pub fn empty_message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "No questions available for your current level".to_string())
    }
}

/// Response of `GET /api/all-questions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QuestionCatalog {
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub total_questions: usize,
}

impl QuestionCatalog {
    pub fn by_level(&self, level: Level) -> impl Iterator<Item = &Question> {
        self.questions.iter().filter(move |q| q.level == level)
    }

    pub fn find(&self, id: i64) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

/// Response of `PUT /api/update-question-level`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelUpdate {
    #[serde(default)]
    pub message: String,
    pub question_id: i64,
    pub new_level: Level,
}
