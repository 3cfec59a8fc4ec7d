use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Level;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LevelProgress {
    #[serde(default)]
    pub total_questions: u32,
    #[serde(default)]
    pub best_score: u32,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub unlocked: bool,
    #[serde(default)]
    pub passed: bool,
}

/// Response of `GET /api/user-progress`, keyed `level_1`..`level_3`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProgress {
    #[serde(default)]
    pub progress: BTreeMap<String, LevelProgress>,
    #[serde(default)]
    pub current_level: Level,
}

impl UserProgress {
    pub fn level(&self, level: Level) -> Option<&LevelProgress> {
        self.progress.get(&format!("level_{}", level.value()))
    }

    /// Levels in order with their progress, skipping ones the server omitted
    pub fn levels(&self) -> impl Iterator<Item = (Level, &LevelProgress)> {
        Level::ALL
            .into_iter()
            .filter_map(move |level| self.level(level).map(|p| (level, p)))
    }

    /// Highest unlocked level
    pub fn highest_unlocked(&self) -> Level {
        self.levels()
            .filter(|(_, p)| p.unlocked)
            .map(|(level, _)| level)
            .max()
            .unwrap_or_default()
    }
}
