use rand::Rng;
use thiserror::Error;

use super::{QuizBook, Stage, SUCCESS_MESSAGE, WRAP_MESSAGE};

/// One player's progress through the quiz book. Lives only as long as the
/// process does.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Session {
    pub current_stage_index: usize,
    pub draft_answers: Vec<String>,
    pub feedback_message: String,
    pub stage_just_completed: bool,
    /// Bumped by every submission so older advance tickets go stale.
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Answering(usize),
    Advancing(usize),
    /// Modelled but never entered: finishing the last stage wraps to 0.
    AllComplete,
}

/// Stamp handed out by a successful submission. The advance it stands for
/// only happens if the session has not moved on since.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceTicket {
    pub stage_index: usize,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Correct,
    Incorrect { reply: String },
    /// Blank submission while an advance is pending. Nothing changed.
    StillAdvancing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub outcome: Outcome,
    pub ticket: Option<AdvanceTicket>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Advanced(usize),
    Wrapped,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("question {index} does not exist, this stage has {count} questions")]
    QuestionOutOfRange { index: usize, count: usize },
}

impl Session {
    pub fn new(book: &QuizBook) -> Self {
        Self {
            draft_answers: vec![String::new(); book.questions_per_stage()],
            ..Self::default()
        }
    }

    pub fn current_stage<'a>(&self, book: &'a QuizBook) -> Option<&'a Stage> {
        book.stage(self.current_stage_index)
    }

    pub fn phase(&self, book: &QuizBook) -> Phase {
        if self.current_stage_index >= book.stages.len() {
            Phase::AllComplete
        } else if self.stage_just_completed {
            Phase::Advancing(self.current_stage_index)
        } else {
            Phase::Answering(self.current_stage_index)
        }
    }

    pub fn update_draft_answer(&mut self, index: usize, text: &str) -> Result<(), SessionError> {
        let count = self.draft_answers.len();
        let draft = self
            .draft_answers
            .get_mut(index)
            .ok_or(SessionError::QuestionOutOfRange { index, count })?;
        *draft = text.to_string();
        Ok(())
    }

    pub fn next_empty_draft(&self) -> Option<usize> {
        self.draft_answers.iter().position(|d| d.trim().is_empty())
    }

    fn all_drafts_blank(&self) -> bool {
        self.draft_answers.iter().all(|d| d.trim().is_empty())
    }

    pub fn clear_drafts(&mut self) {
        self.draft_answers.iter_mut().for_each(String::clear);
    }

    /// Checks the current drafts against the stage. Drafts are cleared
    /// whatever the outcome. A blank submission during a pending advance is
    /// ignored so it cannot cancel the stage already solved.
    pub fn submit_answers<R: Rng + ?Sized>(&mut self, book: &QuizBook, rng: &mut R) -> Submission {
        if self.stage_just_completed && self.all_drafts_blank() {
            return Submission {
                outcome: Outcome::StillAdvancing,
                ticket: None,
            };
        }
        self.generation += 1;

        let solved = self
            .current_stage(book)
            .map(|stage| stage.is_solved_by(&self.draft_answers))
            .unwrap_or(false);
        self.clear_drafts();

        if solved {
            self.feedback_message = SUCCESS_MESSAGE.to_string();
            self.stage_just_completed = true;
            return Submission {
                outcome: Outcome::Correct,
                ticket: Some(AdvanceTicket {
                    stage_index: self.current_stage_index,
                    generation: self.generation,
                }),
            };
        }

        let reply = book.random_quirky(rng).to_string();
        self.feedback_message = reply.clone();
        self.stage_just_completed = false;
        Submission {
            outcome: Outcome::Incorrect { reply },
            ticket: None,
        }
    }

    /// The delayed follow-up to a correct submission. A ticket issued
    /// before the latest submission, or for another stage, does nothing.
    pub fn apply_advance(&mut self, book: &QuizBook, ticket: AdvanceTicket) -> Option<Transition> {
        if !self.stage_just_completed
            || ticket.generation != self.generation
            || ticket.stage_index != self.current_stage_index
        {
            return None;
        }

        self.stage_just_completed = false;
        let next = self.current_stage_index + 1;
        if next < book.stages.len() {
            self.current_stage_index = next;
            self.feedback_message.clear();
            Some(Transition::Advanced(next))
        } else {
            self.current_stage_index = 0;
            self.feedback_message = WRAP_MESSAGE.to_string();
            Some(Transition::Wrapped)
        }
    }
}
