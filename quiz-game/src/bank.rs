//! In-memory question bank and the reference question provider.
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::convert::Infallible;
use thiserror::Error;

use crate::QuestionProvider;
use crate::constants::TOTAL_QUESTIONS;
use crate::question::{Category, Question, QuestionError};
use crate::rng::RandomSource;

#[derive(Debug, Error)]
pub enum BankError {
    #[error("question bank is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] QuestionError),
    #[error("question id {0} appears more than once")]
    DuplicateId(String),
}

/// Container for all playable questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Create an empty bank (useful for tests)
    #[must_use]
    pub fn empty() -> Self {
        Self {
            questions: Vec::new(),
        }
    }

    /// Build a bank, validating every question and rejecting duplicate ids.
    ///
    /// # Errors
    ///
    /// Returns the first invalid question or duplicated id.
    pub fn from_questions(questions: Vec<Question>) -> Result<Self, BankError> {
        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            question.validate()?;
            if !seen.insert(question.id.as_str()) {
                return Err(BankError::DuplicateId(question.id.clone()));
            }
        }
        Ok(Self { questions })
    }

    /// Load a bank from a JSON document of the form `{"questions": [...]}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed or a question is invalid.
    pub fn from_json(json: &str) -> Result<Self, BankError> {
        let raw: Self = serde_json::from_str(json)?;
        Self::from_questions(raw.questions)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

/// Difficulty aimed for at a 1-indexed question number, spread over 1..=12.
#[must_use]
pub fn target_difficulty(question_number: usize) -> u8 {
    let total = TOTAL_QUESTIONS;
    let scaled = (question_number * usize::from(Question::MAX_DIFFICULTY) + total - 1) / total;
    u8::try_from(scaled)
        .unwrap_or(Question::MAX_DIFFICULTY)
        .clamp(Question::MIN_DIFFICULTY, Question::MAX_DIFFICULTY)
}

/// Serves unused questions closest to the target difficulty, breaking ties
/// at random.
#[derive(Debug, Clone)]
pub struct BankProvider<R> {
    bank: QuestionBank,
    rng: R,
}

impl BankProvider<ChaCha20Rng> {
    #[must_use]
    pub fn seeded(bank: QuestionBank, seed: u64) -> Self {
        Self::new(bank, ChaCha20Rng::seed_from_u64(seed))
    }
}

impl<R: RandomSource> BankProvider<R> {
    #[must_use]
    pub const fn new(bank: QuestionBank, rng: R) -> Self {
        Self { bank, rng }
    }

    #[must_use]
    pub const fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    fn pick(
        &mut self,
        question_number: usize,
        category: Option<Category>,
        exclude: &HashSet<String>,
    ) -> Option<Question> {
        let target = target_difficulty(question_number);
        let candidates: Vec<&Question> = self
            .bank
            .questions
            .iter()
            .filter(|q| !exclude.contains(&q.id))
            .filter(|q| category.is_none_or(|wanted| q.category == wanted))
            .collect();
        let best = candidates
            .iter()
            .map(|q| q.difficulty.abs_diff(target))
            .min()?;
        let closest: Vec<&Question> = candidates
            .into_iter()
            .filter(|q| q.difficulty.abs_diff(target) == best)
            .collect();
        let upper = u32::try_from(closest.len()).unwrap_or(u32::MAX);
        let pick = self.rng.below(upper) as usize;
        closest.get(pick).map(|q| (*q).clone())
    }
}

impl<R: RandomSource> QuestionProvider for BankProvider<R> {
    type Error = Infallible;

    fn fetch_question(
        &mut self,
        question_number: usize,
        category: Option<Category>,
        exclude: &HashSet<String>,
    ) -> Result<Option<Question>, Self::Error> {
        if let Some(question) = self.pick(question_number, category, exclude) {
            return Ok(Some(question));
        }
        if let Some(wanted) = category {
            log::warn!(
                "no unused {wanted} question for Q{question_number}; widening to all categories"
            );
            return Ok(self.pick(question_number, None, exclude));
        }
        Ok(None)
    }
}
