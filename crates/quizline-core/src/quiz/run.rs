use crate::models::{Answers, Question, SubmissionResult};

/// Outcome of `QuizRun::advance`
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// No option is selected for the current question
    NothingSelected,
    /// Moved on to the next question
    Next,
    /// The last question was answered; these are ready to submit
    Finished(Answers),
}

/// State of one pass through a level's questions.
#[derive(Debug, Clone)]
pub struct QuizRun {
    questions: Vec<Question>,
    index: usize,
    selected: Option<String>,
    answers: Answers,
}

impl QuizRun {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            index: 0,
            selected: None,
            answers: Answers::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current(&self) -> Option<&Question> {
        self.questions.get(self.index)
    }

    /// 1-based position of the current question
    pub fn position(&self) -> usize {
        self.index + 1
    }

    pub fn is_last(&self) -> bool {
        !self.questions.is_empty() && self.index == self.questions.len() - 1
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    /// Select an option of the current question. Returns false, leaving the
    /// selection unchanged, when `option` is not one of its choices.
    pub fn select(&mut self, option: &str) -> bool {
        match self.current() {
            Some(question) if question.has_option(option) => {
                self.selected = Some(option.to_string());
                true
            }
            _ => false,
        }
    }

    /// Record the selection and move on
    pub fn advance(&mut self) -> Step {
        let (Some(question), Some(selected)) = (self.current(), self.selected.clone()) else {
            return Step::NothingSelected;
        };
        let id = question.id;
        self.answers.insert(id, selected);

        if self.is_last() {
            Step::Finished(self.answers.clone())
        } else {
            self.index += 1;
            self.selected = None;
            Step::Next
        }
    }

    /// Start over with the same questions
    pub fn reset(&mut self) {
        self.index = 0;
        self.selected = None;
        self.answers.clear();
    }

    /// A perfect run, either as graded by the server or by the raw count
    pub fn is_perfect(&self, result: &SubmissionResult) -> bool {
        result.is_perfect || result.score as usize == self.questions.len()
    }
}
