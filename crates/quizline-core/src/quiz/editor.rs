use std::collections::BTreeMap;

use crate::models::{Level, Question, QuestionCatalog};

/// Pending level changes against the catalog as last loaded or saved.
#[derive(Debug, Clone, Default)]
pub struct LevelEditor {
    original: Vec<Question>,
    edited: Vec<Question>,
}

impl LevelEditor {
    pub fn new(catalog: QuestionCatalog) -> Self {
        Self {
            original: catalog.questions.clone(),
            edited: catalog.questions,
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.edited
    }

    /// Change a question's level. Returns false for an unknown id.
    pub fn set_level(&mut self, question_id: i64, level: Level) -> bool {
        match self.edited.iter_mut().find(|q| q.id == question_id) {
            Some(question) => {
                question.level = level;
                true
            }
            None => false,
        }
    }

    /// Questions whose level differs from the original, as (id, new level)
    pub fn changes(&self) -> Vec<(i64, Level)> {
        self.edited
            .iter()
            .filter(|q| {
                self.original
                    .iter()
                    .find(|orig| orig.id == q.id)
                    .is_some_and(|orig| orig.level != q.level)
            })
            .map(|q| (q.id, q.level))
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        !self.changes().is_empty()
    }

    /// Discard pending changes
    pub fn reset(&mut self) {
        self.edited = self.original.clone();
    }

    /// Accept the edited levels as the new baseline after a save
    pub fn commit(&mut self) {
        self.original = self.edited.clone();
    }

    pub fn count_by_level(&self) -> BTreeMap<Level, usize> {
        let mut counts: BTreeMap<Level, usize> = Level::ALL.iter().map(|l| (*l, 0)).collect();
        for question in &self.edited {
            *counts.entry(question.level).or_insert(0) += 1;
        }
        counts
    }
}
