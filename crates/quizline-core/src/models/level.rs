use std::fmt;

use serde::{Deserialize, Serialize};

/// Percentage of correct answers needed to pass a level and unlock the next.
pub const PASS_THRESHOLD_PERCENT: f64 = 80.0;

/// Difficulty tier of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Level(u8);

impl Level {
    pub const BEGINNER: Level = Level(1);
    pub const INTERMEDIATE: Level = Level(2);
    pub const ADVANCED: Level = Level(3);

    pub const ALL: [Level; 3] = [Level::BEGINNER, Level::INTERMEDIATE, Level::ADVANCED];

    pub fn new(value: u8) -> Option<Self> {
        (1..=3).contains(&value).then_some(Level(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            1 => "Beginner",
            2 => "Intermediate",
            _ => "Advanced",
        }
    }

    /// The level unlocked by passing this one
    pub fn next(self) -> Option<Level> {
        Level::new(self.0 + 1)
    }

    /// Whether a percentage score passes a level
    pub fn is_passing(percentage: f64) -> bool {
        percentage >= PASS_THRESHOLD_PERCENT
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::BEGINNER
    }
}

impl TryFrom<u8> for Level {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Level::new(value).ok_or_else(|| "Level must be 1, 2, or 3".to_string())
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> u8 {
        level.0
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Level {} ({})", self.0, self.name())
    }
}
