pub mod session;
pub mod view;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

pub const SUCCESS_MESSAGE: &str = "Great job! You're correct! Moving to the next stage.";
pub const WRAP_MESSAGE: &str = "All stages complete! Resetting to Stage 1.";
pub const CONGRATULATIONS_MESSAGE: &str = "Congratulations! You've completed all the stages!";

/// The static answer key: every stage, in play order, plus the pool of
/// replies used when a submission is wrong.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QuizBook {
    pub stages: Vec<Stage>,
    pub quirky_responses: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Stage {
    pub title: String,
    pub questions: Vec<QuestionAnswer>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QuestionAnswer {
    pub prompt: String,
    #[serde(rename = "answer")]
    pub canonical_answer: String,
}

impl QuestionAnswer {
    pub fn new(prompt: &str, canonical_answer: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            canonical_answer: canonical_answer.to_string(),
        }
    }

    /// Whole-string comparison, ignoring letter case and surrounding whitespace.
    pub fn is_answered_by(&self, draft: &str) -> bool {
        normalize(draft) == normalize(&self.canonical_answer)
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

impl Stage {
    pub fn new(title: &str, questions: Vec<QuestionAnswer>) -> Self {
        Self {
            title: title.to_string(),
            questions,
        }
    }

    /// Every draft must match its question, in order.
    pub fn is_solved_by(&self, drafts: &[String]) -> bool {
        drafts.len() == self.questions.len()
            && self
                .questions
                .iter()
                .zip(drafts)
                .all(|(question, draft)| question.is_answered_by(draft))
    }
}

#[derive(Debug, Error)]
pub enum BookError {
    #[error("failed to read quiz book: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse quiz book: {0}")]
    Json(#[from] serde_json::Error),
    #[error("quiz book has no stages")]
    NoStages,
    #[error("stage {stage} ({title:?}) has no questions")]
    EmptyStage { stage: usize, title: String },
    #[error("stage {stage} has {found} questions, expected {expected} like the first stage")]
    UnevenStage {
        stage: usize,
        expected: usize,
        found: usize,
    },
    #[error("quiz book has no quirky responses")]
    NoQuirkyResponses,
}

impl QuizBook {
    pub fn builtin() -> Self {
        let stages = vec![
            Stage::new(
                "Stage 1: The Basics",
                vec![
                    QuestionAnswer::new("What is the color of the sky?", "blue"),
                    QuestionAnswer::new("What sound does a dog make?", "bark"),
                    QuestionAnswer::new("What is the capital of France?", "paris"),
                ],
            ),
            Stage::new(
                "Stage 2: The Paradox",
                vec![
                    QuestionAnswer::new("What is 2 + 2?", "4"),
                    QuestionAnswer::new("What is the sound of one hand clapping?", "silence"),
                    QuestionAnswer::new("What is the meaning of life?", "connections"),
                ],
            ),
            Stage::new(
                "Stage 3: The Absurdity",
                vec![
                    QuestionAnswer::new("What is the square root of 144?", "12"),
                    QuestionAnswer::new("Can a cat play the piano?", "no"),
                    QuestionAnswer::new("What is the answer to the ultimate question?", "42"),
                ],
            ),
        ];

        let quirky_responses = [
            "Nice try! But you'll need to think outside the universe for this one.",
            "Hmm, not quite! Try channeling the energy of a quantum hamster.",
            "Not bad, but the answer is closer to the sound of a rainbow singing.",
            "Almost there! But the true answer lies beneath the surface of a moonlit lake.",
            "You’re close! Think of a cactus doing a salsa dance under the stars.",
        ]
        .iter()
        .map(|r| r.to_string())
        .collect();

        Self {
            stages,
            quirky_responses,
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, BookError> {
        let reader = BufReader::new(File::open(path)?);
        let book: QuizBook = serde_json::from_reader(reader)?;
        book.validate()?;
        Ok(book)
    }

    pub fn validate(&self) -> Result<(), BookError> {
        let first = self.stages.first().ok_or(BookError::NoStages)?;
        let expected = first.questions.len();

        for (stage, s) in self.stages.iter().enumerate() {
            if s.questions.is_empty() {
                return Err(BookError::EmptyStage {
                    stage: stage + 1,
                    title: s.title.clone(),
                });
            }
            if s.questions.len() != expected {
                return Err(BookError::UnevenStage {
                    stage: stage + 1,
                    expected,
                    found: s.questions.len(),
                });
            }
        }

        if self.quirky_responses.is_empty() {
            return Err(BookError::NoQuirkyResponses);
        }
        Ok(())
    }

    /// Number of questions in every stage. Books are validated to be uniform.
    pub fn questions_per_stage(&self) -> usize {
        self.stages.first().map(|s| s.questions.len()).unwrap_or(0)
    }

    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    pub fn random_quirky<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        self.quirky_responses
            .choose(rng)
            .map(String::as_str)
            .unwrap_or("Not quite!")
    }
}
