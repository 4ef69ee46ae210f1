//! Question content types.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Label of one of the five answer options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OptionKey {
    A,
    B,
    C,
    D,
    E,
}

impl OptionKey {
    /// Every option in display order.
    pub const ALL: [Self; 5] = [Self::A, Self::B, Self::C, Self::D, Self::E];
    /// Options the audience is polled on.
    pub const POLLED: [Self; 4] = [Self::A, Self::B, Self::C, Self::D];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
            Self::E => 4,
        }
    }

    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
            Self::D => 'D',
            Self::E => 'E',
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Topic a question belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Sports,
    History,
    Politics,
    Arts,
    Geography,
    Culture,
    General,
}

impl Category {
    /// Categories mixed together in random mode.
    pub const RANDOM_POOL: [Self; 5] = [
        Self::Sports,
        Self::History,
        Self::Geography,
        Self::Culture,
        Self::General,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sports => "Sports",
            Self::History => "History",
            Self::Politics => "Politics",
            Self::Arts => "Arts",
            Self::Geography => "Geography",
            Self::Culture => "Culture",
            Self::General => "General",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The five answer texts, keyed `A`..`E` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSet {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
    #[serde(rename = "D")]
    pub d: String,
    #[serde(rename = "E")]
    pub e: String,
}

impl OptionSet {
    #[must_use]
    pub fn get(&self, key: OptionKey) -> &str {
        match key {
            OptionKey::A => &self.a,
            OptionKey::B => &self.b,
            OptionKey::C => &self.c,
            OptionKey::D => &self.d,
            OptionKey::E => &self.e,
        }
    }

    /// Iterate `(key, text)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (OptionKey, &str)> {
        OptionKey::ALL.into_iter().map(move |key| (key, self.get(key)))
    }
}

/// Reasons a question is rejected before play.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuestionError {
    #[error("question id is empty")]
    EmptyId,
    #[error("question {id} has no prompt text")]
    EmptyPrompt { id: String },
    #[error("question {id} has an empty option {key}")]
    EmptyOption { id: String, key: OptionKey },
    #[error("question {id} difficulty {difficulty} is outside 1..=12")]
    DifficultyOutOfRange { id: String, difficulty: u8 },
}

/// A single multiple-choice question. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub category: Category,
    /// 1 (easiest) to 12 (hardest).
    pub difficulty: u8,
    #[serde(rename = "question_text")]
    pub prompt: String,
    #[serde(default)]
    pub hint: Option<String>,
    pub options: OptionSet,
    pub correct_option: OptionKey,
    #[serde(default)]
    pub explanation: String,
}

impl Question {
    pub const MIN_DIFFICULTY: u8 = 1;
    pub const MAX_DIFFICULTY: u8 = 12;

    /// Check the invariants the run engine relies on.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), QuestionError> {
        if self.id.trim().is_empty() {
            return Err(QuestionError::EmptyId);
        }
        if self.prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt {
                id: self.id.clone(),
            });
        }
        if let Some((key, _)) = self.options.iter().find(|(_, text)| text.trim().is_empty()) {
            return Err(QuestionError::EmptyOption {
                id: self.id.clone(),
                key,
            });
        }
        if !(Self::MIN_DIFFICULTY..=Self::MAX_DIFFICULTY).contains(&self.difficulty) {
            return Err(QuestionError::DifficultyOutOfRange {
                id: self.id.clone(),
                difficulty: self.difficulty,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn option_text(&self, key: OptionKey) -> &str {
        self.options.get(key)
    }

    #[must_use]
    pub fn is_correct(&self, key: OptionKey) -> bool {
        self.correct_option == key
    }

    /// The four options that are not the answer, in display order.
    #[must_use]
    pub fn wrong_options(&self) -> [OptionKey; 4] {
        let mut wrong = [OptionKey::A; 4];
        let mut next = 0;
        for key in OptionKey::ALL {
            if key != self.correct_option {
                wrong[next] = key;
                next += 1;
            }
        }
        wrong
    }
}
