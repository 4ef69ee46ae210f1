//! One-shot assistance tools ("jokers") and their effects.
//!
//! The functions here are pure apart from the random draws they take; the
//! session owns the guards, the flags, and the step bookkeeping.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::constants::{
    AUDIENCE_LEAD_ACCURACY, AUDIENCE_LEAD_MIN, AUDIENCE_LEAD_SPAN, AUTHORITY_EMPTY_TEXT,
    AUTHORITY_FALLBACK_TEXT, EXPERT_ACCURACY, FIFTY_FIFTY_REMOVALS,
};
use crate::question::{OptionKey, Question};
use crate::rng::RandomSource;

/// Options removed by 50/50; always two wrong answers.
pub type HiddenOptions = SmallVec<[OptionKey; 2]>;

/// The six jokers available once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JokerKind {
    Expert,
    Hint,
    SecondChance,
    FiftyFifty,
    Authority,
    Audience,
}

impl JokerKind {
    pub const ALL: [Self; 6] = [
        Self::Expert,
        Self::Hint,
        Self::SecondChance,
        Self::FiftyFifty,
        Self::Authority,
        Self::Audience,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Expert => "expert",
            Self::Hint => "hint",
            Self::SecondChance => "second_chance",
            Self::FiftyFifty => "fifty_fifty",
            Self::Authority => "authority",
            Self::Audience => "audience",
        }
    }
}

impl fmt::Display for JokerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Per-run joker usage. Flags only ever move from unused to used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JokerFlags {
    #[serde(rename = "used_expert", default)]
    expert: bool,
    #[serde(rename = "used_hint", default)]
    hint: bool,
    #[serde(rename = "used_second_chance", default)]
    second_chance: bool,
    #[serde(rename = "used_fifty_fifty", default)]
    fifty_fifty: bool,
    #[serde(rename = "used_authority", default)]
    authority: bool,
    #[serde(rename = "used_audience", default)]
    audience: bool,
}

impl JokerFlags {
    #[must_use]
    pub const fn is_used(&self, kind: JokerKind) -> bool {
        match kind {
            JokerKind::Expert => self.expert,
            JokerKind::Hint => self.hint,
            JokerKind::SecondChance => self.second_chance,
            JokerKind::FiftyFifty => self.fifty_fifty,
            JokerKind::Authority => self.authority,
            JokerKind::Audience => self.audience,
        }
    }

    /// Mark `kind` used. Returns `false` when it was already spent.
    pub fn consume(&mut self, kind: JokerKind) -> bool {
        let slot = match kind {
            JokerKind::Expert => &mut self.expert,
            JokerKind::Hint => &mut self.hint,
            JokerKind::SecondChance => &mut self.second_chance,
            JokerKind::FiftyFifty => &mut self.fifty_fifty,
            JokerKind::Authority => &mut self.authority,
            JokerKind::Audience => &mut self.audience,
        };
        if *slot {
            return false;
        }
        *slot = true;
        true
    }

    #[must_use]
    pub fn used_count(&self) -> usize {
        JokerKind::ALL
            .iter()
            .filter(|kind| self.is_used(**kind))
            .count()
    }

    #[must_use]
    pub fn all_used(&self) -> bool {
        self.used_count() == JokerKind::ALL.len()
    }
}

/// Text panel shown to the player after a joker or a second-chance retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub title: String,
    pub text: String,
}

impl Advisory {
    #[must_use]
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }
}

/// Expert persona picked by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpertPersona {
    Historian,
    Technologist,
    PopCulture,
}

impl ExpertPersona {
    pub const ALL: [Self; 3] = [Self::Historian, Self::Technologist, Self::PopCulture];

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Historian => "The Historian",
            Self::Technologist => "The Tech Enthusiast",
            Self::PopCulture => "The Pop Culture Fan",
        }
    }
}

/// Recommend the answer with 70% probability, otherwise a uniformly random
/// wrong option.
pub fn expert_recommendation<R: RandomSource>(rng: &mut R, question: &Question) -> OptionKey {
    if rng.chance(EXPERT_ACCURACY) {
        return question.correct_option;
    }
    let wrong = question.wrong_options();
    wrong[rng.below(4) as usize]
}

#[must_use]
pub fn expert_advice(
    persona: ExpertPersona,
    question: &Question,
    recommended: OptionKey,
) -> Advisory {
    let option_text = question.option_text(recommended);
    let text = match persona {
        ExpertPersona::Historian => format!(
            "I am certain of this one: {recommended} ({option_text}). The context all points that way."
        ),
        ExpertPersona::Technologist => format!(
            "I won't swear to it, but {recommended} ({option_text}) looks most likely. The final call is yours."
        ),
        ExpertPersona::PopCulture => format!(
            "Take it as a nudge, not an answer: keep your eye on {recommended} ({option_text})."
        ),
    };
    Advisory::new(persona.title(), text)
}

/// The authored hint, or a generic nudge built from the category.
#[must_use]
pub fn hint_advisory(question: &Question) -> Advisory {
    let text = match question.hint.as_deref().map(str::trim) {
        Some(hint) if !hint.is_empty() => hint.to_string(),
        _ => format!(
            "Topic: {}. Compare the key words and any differences in size or date carefully.",
            question.category
        ),
    };
    Advisory::new("Hint", text)
}

/// Remove two of the four wrong options, chosen uniformly.
pub fn fifty_fifty<R: RandomSource>(rng: &mut R, question: &Question) -> HiddenOptions {
    let mut pool: SmallVec<[OptionKey; 4]> = SmallVec::from_buf(question.wrong_options());
    let mut hidden = HiddenOptions::new();
    while hidden.len() < FIFTY_FIFTY_REMOVALS {
        let upper = u32::try_from(pool.len()).unwrap_or(1);
        let pick = rng.below(upper) as usize;
        hidden.push(pool.remove(pick));
    }
    hidden.sort_unstable();
    hidden
}

/// Audience percentages for options A to D.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudiencePoll {
    shares: [u32; 4],
}

impl AudiencePoll {
    /// Share for `key`; `None` for the unpolled option E.
    #[must_use]
    pub fn share(&self, key: OptionKey) -> Option<u32> {
        self.shares.get(key.index()).copied()
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.shares.iter().sum()
    }

    /// The option with the largest share.
    #[must_use]
    pub fn leader(&self) -> OptionKey {
        OptionKey::POLLED
            .into_iter()
            .max_by_key(|key| self.shares[key.index()])
            .unwrap_or(OptionKey::A)
    }

    pub fn iter(&self) -> impl Iterator<Item = (OptionKey, u32)> + '_ {
        OptionKey::POLLED
            .into_iter()
            .map(move |key| (key, self.shares[key.index()]))
    }
}

/// Build the audience distribution.
///
/// A leading option takes 55..=64 percent: the answer with 70% probability,
/// else a random wrong polled option. When the answer is E (not polled) the
/// lead is any polled option. The other three split the remainder left to
/// right, the last one absorbing what is left so the total is exactly 100.
pub fn audience_poll<R: RandomSource>(rng: &mut R, question: &Question) -> AudiencePoll {
    let correct = question.correct_option;
    let wrong: SmallVec<[OptionKey; 4]> = OptionKey::POLLED
        .into_iter()
        .filter(|key| *key != correct)
        .collect();
    let wrong_len = u32::try_from(wrong.len()).unwrap_or(1);

    let lead = if wrong.len() == OptionKey::POLLED.len() {
        wrong[rng.below(wrong_len) as usize]
    } else if rng.chance(AUDIENCE_LEAD_ACCURACY) {
        correct
    } else {
        wrong[rng.below(wrong_len) as usize]
    };

    let mut shares = [0u32; 4];
    let top = AUDIENCE_LEAD_MIN + rng.below(AUDIENCE_LEAD_SPAN);
    shares[lead.index()] = top;

    let mut remaining = 100 - top;
    let rest: SmallVec<[OptionKey; 3]> = OptionKey::POLLED
        .into_iter()
        .filter(|key| *key != lead)
        .collect();
    let last = rest.len() - 1;
    for (idx, key) in rest.iter().enumerate() {
        if idx == last {
            shares[key.index()] = remaining;
            break;
        }
        let later = u32::try_from(last - idx).unwrap_or(0);
        let max = remaining.saturating_sub(later);
        let value = if max > 0 { rng.below(max) } else { 0 };
        shares[key.index()] = value;
        remaining -= value;
    }

    AudiencePoll { shares }
}

/// Panel for the authority joker: provider text, or a fallback when the
/// provider failed or answered with nothing.
#[must_use]
pub fn authority_advisory<E>(reply: Result<String, E>) -> Advisory {
    let text = match reply {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => AUTHORITY_EMPTY_TEXT.to_string(),
        Err(_) => AUTHORITY_FALLBACK_TEXT.to_string(),
    };
    Advisory::new("Ask an Authority", text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::fixtures::question;
    use crate::rng::{JokerRng, ScriptedRandom};

    #[test]
    fn flags_are_one_shot() {
        let mut flags = JokerFlags::default();
        assert!(flags.consume(JokerKind::Hint));
        assert!(!flags.consume(JokerKind::Hint));
        assert!(flags.is_used(JokerKind::Hint));
        assert_eq!(flags.used_count(), 1);
        for kind in JokerKind::ALL {
            flags.consume(kind);
        }
        assert!(flags.all_used());
    }

    #[test]
    fn flags_serialize_with_used_prefix() {
        let mut flags = JokerFlags::default();
        flags.consume(JokerKind::FiftyFifty);
        let json = serde_json::to_value(flags).unwrap();
        assert_eq!(json["used_fifty_fifty"], true);
        assert_eq!(json["used_expert"], false);
    }

    #[test]
    fn expert_follows_scripted_draws() {
        let q = question("q", OptionKey::B);
        let mut rng = ScriptedRandom::new([10]);
        assert_eq!(expert_recommendation(&mut rng, &q), OptionKey::B);

        // Miss the 70% roll, then pick wrong option index 2 of [A, C, D, E].
        let mut rng = ScriptedRandom::new([85, 2]);
        assert_eq!(expert_recommendation(&mut rng, &q), OptionKey::D);

        let advice = expert_advice(ExpertPersona::Historian, &q, OptionKey::D);
        assert_eq!(advice.title, "The Historian");
        assert!(advice.text.contains("D (Delta)"));
    }

    #[test]
    fn hint_falls_back_to_category() {
        let mut q = question("q", OptionKey::A);
        assert!(hint_advisory(&q).text.contains("General"));
        q.hint = Some("Think about the alphabet.".to_string());
        assert_eq!(hint_advisory(&q).text, "Think about the alphabet.");
    }

    #[test]
    fn fifty_fifty_never_hides_the_answer() {
        for seed in 0..200 {
            let mut rng = JokerRng::from_seed(seed);
            for correct in OptionKey::ALL {
                let q = question("q", correct);
                let hidden = fifty_fifty(rng.fifty_fifty(), &q);
                assert_eq!(hidden.len(), 2);
                assert_ne!(hidden[0], hidden[1]);
                assert!(!hidden.contains(&correct));
            }
        }
    }

    #[test]
    fn fifty_fifty_scripted_pair() {
        let q = question("q", OptionKey::A);
        // Pool [B, C, D, E]: take index 3 (E), then index 0 of [B, C, D] (B).
        let mut rng = ScriptedRandom::new([3, 0]);
        let hidden = fifty_fifty(&mut rng, &q);
        assert_eq!(hidden.as_slice(), &[OptionKey::B, OptionKey::E]);
    }

    #[test]
    fn audience_scripted_distribution() {
        let q = question("q", OptionKey::A);
        let mut rng = ScriptedRandom::new([0, 4, 10, 5]);
        let poll = audience_poll(&mut rng, &q);
        assert_eq!(poll.share(OptionKey::A), Some(59));
        assert_eq!(poll.share(OptionKey::B), Some(10));
        assert_eq!(poll.share(OptionKey::C), Some(5));
        assert_eq!(poll.share(OptionKey::D), Some(26));
        assert_eq!(poll.share(OptionKey::E), None);
        assert_eq!(poll.leader(), OptionKey::A);
    }

    #[test]
    fn audience_always_sums_to_one_hundred() {
        for seed in 0..300 {
            let mut rng = JokerRng::from_seed(seed);
            for correct in OptionKey::ALL {
                let q = question("q", correct);
                let poll = audience_poll(rng.audience(), &q);
                assert_eq!(poll.total(), 100);
                assert!(poll.iter().all(|(_, share)| share <= 100));
                let (_, lead) = poll.iter().max_by_key(|(_, share)| *share).unwrap();
                assert!((55..=64).contains(&lead));
            }
        }
    }

    #[test]
    fn authority_falls_back() {
        let ok: Result<String, ()> = Ok("Go with B.".to_string());
        assert_eq!(authority_advisory(ok).text, "Go with B.");
        let failed: Result<String, ()> = Err(());
        assert_eq!(authority_advisory(failed).text, AUTHORITY_FALLBACK_TEXT);
        let blank: Result<String, ()> = Ok("   ".to_string());
        assert_eq!(authority_advisory(blank).text, AUTHORITY_EMPTY_TEXT);
    }
}
