//! Append-only audit records emitted during a run.
use serde::{Deserialize, Serialize};

use crate::jokers::{AudiencePoll, HiddenOptions, JokerKind};
use crate::question::{Category, OptionKey};

/// What happened in a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum StepKind {
    /// A locked-in answer or a timer expiry (no selection).
    Answer {
        #[serde(default)]
        selected_option: Option<OptionKey>,
        is_correct: bool,
    },
    Joker {
        used_joker: JokerKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audience_result: Option<AudiencePoll>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hidden_options: Option<HiddenOptions>,
    },
    CategorySwitch { category_switch_to: Category },
}

/// One observable action, tied to the question that was in play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEvent {
    pub run_id: String,
    /// 1-indexed.
    pub question_number: usize,
    pub question_id: String,
    pub category: Category,
    pub difficulty: u8,
    /// Amount the player would walk away with after this event.
    pub earnings_after: u32,
    #[serde(flatten)]
    pub kind: StepKind,
}

impl StepEvent {
    #[must_use]
    pub const fn is_answer(&self) -> bool {
        matches!(self.kind, StepKind::Answer { .. })
    }

    #[must_use]
    pub const fn joker(&self) -> Option<JokerKind> {
        match self.kind {
            StepKind::Joker { used_joker, .. } => Some(used_joker),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_category_switch(&self) -> bool {
        matches!(self.kind, StepKind::CategorySwitch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_event_type_tag() {
        let step = StepEvent {
            run_id: "run-1".to_string(),
            question_number: 3,
            question_id: "q3".to_string(),
            category: Category::Arts,
            difficulty: 2,
            earnings_after: 20,
            kind: StepKind::Answer {
                selected_option: Some(OptionKey::B),
                is_correct: true,
            },
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["event_type"], "answer");
        assert_eq!(json["selected_option"], "B");
        assert_eq!(json["is_correct"], true);
        assert!(step.is_answer());
        assert_eq!(step.joker(), None);

        let back: StepEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, step);
    }

    #[test]
    fn joker_step_omits_empty_payloads() {
        let step = StepEvent {
            run_id: "run-1".to_string(),
            question_number: 1,
            question_id: "q1".to_string(),
            category: Category::General,
            difficulty: 1,
            earnings_after: 0,
            kind: StepKind::Joker {
                used_joker: JokerKind::Hint,
                audience_result: None,
                hidden_options: None,
            },
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["event_type"], "joker");
        assert_eq!(json["used_joker"], "hint");
        assert!(json.get("audience_result").is_none());
        assert_eq!(step.joker(), Some(JokerKind::Hint));
    }
}
