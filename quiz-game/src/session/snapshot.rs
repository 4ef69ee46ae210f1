//! Serialisable view of a session for presentation layers.
use serde::{Deserialize, Serialize};

use super::phase::{Phase, PhaseKind};
use super::QuizSession;
use crate::QuestionProvider;
use crate::constants::TOTAL_QUESTIONS;
use crate::jokers::{Advisory, AudiencePoll, JokerFlags};
use crate::question::{Category, OptionKey};
use crate::rewards::{earned_so_far, reward_at, safety_floor};
use crate::rng::RandomSource;
use crate::run::RunSummary;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionView {
    pub key: OptionKey,
    pub text: String,
    /// Hidden by 50/50 or not selectable in the current phase.
    pub disabled: bool,
    pub selected: bool,
    /// After a reveal: `Some(true)` on the answer, `Some(false)` on a wrong pick.
    pub reveal: Option<bool>,
}

/// The question in play without its answer key until the reveal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: String,
    pub category: Category,
    pub difficulty: u8,
    pub prompt: String,
    pub options: Vec<OptionView>,
    pub correct_option: Option<OptionKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub run_id: String,
    pub phase: PhaseKind,
    /// 1-indexed.
    pub question_number: usize,
    pub total_questions: usize,
    pub current_prize: u32,
    pub earned_so_far: u32,
    pub safety_floor: u32,
    pub question: Option<QuestionView>,
    pub jokers: JokerFlags,
    pub second_chance_armed: bool,
    /// `None` for untimed questions.
    pub time_left_secs: Option<u32>,
    pub advisory: Option<Advisory>,
    pub audience: Option<AudiencePoll>,
    pub authority_pending: bool,
    /// Verdict of the answer being revealed.
    pub answer_correct: Option<bool>,
    pub summary: Option<RunSummary>,
}

impl<P: QuestionProvider, R: RandomSource> QuizSession<P, R> {
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let phase = &self.phase;
        let selection = phase.selection();
        let (revealed, answer_correct) = match phase {
            Phase::Revealed { correct, .. } => (true, Some(*correct)),
            _ => (false, None),
        };
        let selectable = matches!(phase, Phase::AwaitingSelection { .. });

        let question = self.question.as_ref().map(|question| QuestionView {
            id: question.id.clone(),
            category: question.category,
            difficulty: question.difficulty,
            prompt: question.prompt.clone(),
            options: question
                .options
                .iter()
                .map(|(key, text)| {
                    let selected = selection == Some(key);
                    let reveal = if !revealed {
                        None
                    } else if question.is_correct(key) {
                        Some(true)
                    } else if selected {
                        Some(false)
                    } else {
                        None
                    };
                    OptionView {
                        key,
                        text: text.to_string(),
                        disabled: !selectable || self.board.hidden.contains(&key),
                        selected,
                        reveal,
                    }
                })
                .collect(),
            correct_option: revealed.then_some(question.correct_option),
        });

        let summary = match phase {
            Phase::Finished(summary) => Some(summary.as_ref().clone()),
            _ => None,
        };

        SessionSnapshot {
            run_id: self.run.id.clone(),
            phase: phase.kind(),
            question_number: self.slot + 1,
            total_questions: TOTAL_QUESTIONS,
            current_prize: reward_at(self.slot),
            earned_so_far: earned_so_far(self.slot),
            safety_floor: safety_floor(self.slot),
            question,
            jokers: self.jokers,
            second_chance_armed: self.board.second_chance_armed,
            time_left_secs: phase.countdown().map(crate::timer::Countdown::remaining_secs),
            advisory: self.board.advisory.clone(),
            audience: self.board.audience,
            authority_pending: self.authority.is_some(),
            answer_correct,
            summary,
        }
    }
}
