use std::fmt;

use quiz_game::{Category, ExpertPersona, JokerFlags, JokerKind, JokerRequest, Question};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Which answer the bot locks in. Resolved against the live board so a
/// wrong pick never lands on an option hidden by 50/50.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Correct,
    Wrong,
}

/// How the bot leaves the question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Answer(Choice),
    CashOut,
    /// Let the countdown run out.
    Expire,
}

/// One joker-panel interaction before the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JokerPlay {
    Use(JokerRequest),
    /// Goes through the async authority line.
    Authority,
    SwitchCategory(Category),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub plays: Vec<JokerPlay>,
    pub action: Action,
}

impl Turn {
    #[must_use]
    pub const fn answer(choice: Choice) -> Self {
        Self {
            plays: Vec::new(),
            action: Action::Answer(choice),
        }
    }

    #[must_use]
    pub fn with_play(mut self, play: JokerPlay) -> Self {
        self.plays.push(play);
        self
    }
}

/// What a policy sees when a question is in play.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    pub question_number: usize,
    pub question: &'a Question,
    pub jokers: JokerFlags,
    pub timed: bool,
}

/// Policy interface for automated play strategies.
pub trait PlayerPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    fn plan_turn(&mut self, ctx: &TurnContext<'_>) -> Turn;

    /// Second attempt after an armed second chance absorbed a wrong answer.
    fn retry(&mut self, _ctx: &TurnContext<'_>) -> Choice {
        Choice::Correct
    }
}

/// Built-in gameplay strategies for automated runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Strategy {
    Perfect,
    CashOutAt(usize),
    WrongAt(usize),
    TimeoutAt(usize),
    SecondChanceRecovery(usize),
    JokerSweep,
    Random,
}

impl Strategy {
    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::Perfect => "Perfect".to_string(),
            Self::CashOutAt(n) => format!("Cash out at Q{n}"),
            Self::WrongAt(n) => format!("Wrong at Q{n}"),
            Self::TimeoutAt(n) => format!("Timeout at Q{n}"),
            Self::SecondChanceRecovery(n) => format!("Second chance at Q{n}"),
            Self::JokerSweep => "Joker sweep".to_string(),
            Self::Random => "Random".to_string(),
        }
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn PlayerPolicy + Send> {
        match self {
            Self::Perfect => Box::new(ScriptedPolicy::new("perfect", None)),
            Self::CashOutAt(n) => {
                Box::new(ScriptedPolicy::new("cash-out", Some((n, Stop::CashOut))))
            }
            Self::WrongAt(n) => Box::new(ScriptedPolicy::new("wrong", Some((n, Stop::Wrong)))),
            Self::TimeoutAt(n) => {
                Box::new(ScriptedPolicy::new("timeout", Some((n, Stop::Expire))))
            }
            Self::SecondChanceRecovery(n) => Box::new(RecoveryPolicy { at: n }),
            Self::JokerSweep => Box::new(SweepPolicy),
            Self::Random => Box::new(RandomPolicy::new(seed)),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    CashOut,
    Wrong,
    Expire,
}

/// Answers correctly until a fixed question, then stops the way it was told.
#[derive(Debug)]
struct ScriptedPolicy {
    name: &'static str,
    stop: Option<(usize, Stop)>,
}

impl ScriptedPolicy {
    const fn new(name: &'static str, stop: Option<(usize, Stop)>) -> Self {
        Self { name, stop }
    }
}

impl PlayerPolicy for ScriptedPolicy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn plan_turn(&mut self, ctx: &TurnContext<'_>) -> Turn {
        let action = match self.stop {
            Some((at, stop)) if at == ctx.question_number => match stop {
                Stop::CashOut => Action::CashOut,
                Stop::Wrong => Action::Answer(Choice::Wrong),
                Stop::Expire => Action::Expire,
            },
            _ => Action::Answer(Choice::Correct),
        };
        Turn {
            plays: Vec::new(),
            action,
        }
    }
}

/// Arms second chance at one question and answers wrong once there.
#[derive(Debug)]
struct RecoveryPolicy {
    at: usize,
}

impl PlayerPolicy for RecoveryPolicy {
    fn name(&self) -> &'static str {
        "second-chance"
    }

    fn plan_turn(&mut self, ctx: &TurnContext<'_>) -> Turn {
        if ctx.question_number == self.at {
            Turn::answer(Choice::Wrong).with_play(JokerPlay::Use(JokerRequest::SecondChance))
        } else {
            Turn::answer(Choice::Correct)
        }
    }
}

/// Spends one joker per question, in a fixed order, and answers correctly.
#[derive(Debug)]
struct SweepPolicy;

impl SweepPolicy {
    const ORDER: [JokerKind; 6] = [
        JokerKind::FiftyFifty,
        JokerKind::Audience,
        JokerKind::Expert,
        JokerKind::Hint,
        JokerKind::Authority,
        JokerKind::SecondChance,
    ];
}

impl PlayerPolicy for SweepPolicy {
    fn name(&self) -> &'static str {
        "joker-sweep"
    }

    fn plan_turn(&mut self, ctx: &TurnContext<'_>) -> Turn {
        let turn = Turn::answer(Choice::Correct);
        match Self::ORDER.into_iter().find(|kind| !ctx.jokers.is_used(*kind)) {
            Some(kind) => turn.with_play(joker_play(kind, ExpertPersona::Historian)),
            None => turn,
        }
    }
}

/// Seeded play: mostly right answers, occasional jokers, switches and
/// cash-outs.
#[derive(Debug)]
struct RandomPolicy {
    rng: ChaCha20Rng,
}

impl RandomPolicy {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl PlayerPolicy for RandomPolicy {
    fn name(&self) -> &'static str {
        "random"
    }

    fn plan_turn(&mut self, ctx: &TurnContext<'_>) -> Turn {
        let mut plays = Vec::new();
        if self.rng.gen_bool(0.35) {
            let kind = JokerKind::ALL[self.rng.gen_range(0..JokerKind::ALL.len())];
            if !ctx.jokers.is_used(kind) {
                let persona = ExpertPersona::ALL[self.rng.gen_range(0..ExpertPersona::ALL.len())];
                plays.push(joker_play(kind, persona));
            }
        }
        if self.rng.gen_bool(0.1) {
            let target = Category::RANDOM_POOL[self.rng.gen_range(0..Category::RANDOM_POOL.len())];
            plays.push(JokerPlay::SwitchCategory(target));
        }

        // Harder questions go wrong more often.
        let wrong_pct = 4 + u32::from(ctx.question.difficulty);
        let roll: u32 = self.rng.gen_range(0..100);
        let action = if roll < 6 {
            Action::CashOut
        } else if roll < 6 + wrong_pct {
            Action::Answer(Choice::Wrong)
        } else if roll < 10 + wrong_pct && ctx.timed {
            Action::Expire
        } else {
            Action::Answer(Choice::Correct)
        };
        Turn { plays, action }
    }

    fn retry(&mut self, _ctx: &TurnContext<'_>) -> Choice {
        if self.rng.gen_bool(0.5) {
            Choice::Correct
        } else {
            Choice::Wrong
        }
    }
}

fn joker_play(kind: JokerKind, persona: ExpertPersona) -> JokerPlay {
    match kind {
        JokerKind::Expert => JokerPlay::Use(JokerRequest::Expert { persona }),
        JokerKind::Hint => JokerPlay::Use(JokerRequest::Hint),
        JokerKind::SecondChance => JokerPlay::Use(JokerRequest::SecondChance),
        JokerKind::FiftyFifty => JokerPlay::Use(JokerRequest::FiftyFifty),
        JokerKind::Audience => JokerPlay::Use(JokerRequest::Audience),
        JokerKind::Authority => JokerPlay::Authority,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_game::{OptionKey, OptionSet};

    fn question() -> Question {
        Question {
            id: "q".to_string(),
            category: Category::General,
            difficulty: 1,
            prompt: "Pick B".to_string(),
            hint: None,
            options: OptionSet {
                a: "a".to_string(),
                b: "b".to_string(),
                c: "c".to_string(),
                d: "d".to_string(),
                e: "e".to_string(),
            },
            correct_option: OptionKey::B,
            explanation: String::new(),
        }
    }

    fn ctx(question: &Question, question_number: usize, jokers: JokerFlags) -> TurnContext<'_> {
        TurnContext {
            question_number,
            question,
            jokers,
            timed: question_number > 5,
        }
    }

    #[test]
    fn scripted_policies_stop_at_their_question() {
        let q = question();
        let mut cash = Strategy::CashOutAt(5).create_policy(1);
        let flags = JokerFlags::default();
        assert_eq!(
            cash.plan_turn(&ctx(&q, 4, flags)).action,
            Action::Answer(Choice::Correct)
        );
        assert_eq!(cash.plan_turn(&ctx(&q, 5, flags)).action, Action::CashOut);

        let mut timeout = Strategy::TimeoutAt(11).create_policy(1);
        assert_eq!(
            timeout.plan_turn(&ctx(&q, 11, flags)).action,
            Action::Expire
        );
    }

    #[test]
    fn recovery_arms_second_chance_then_answers_wrong() {
        let q = question();
        let mut policy = Strategy::SecondChanceRecovery(3).create_policy(1);
        let turn = policy.plan_turn(&ctx(&q, 3, JokerFlags::default()));
        assert_eq!(turn.plays, vec![JokerPlay::Use(JokerRequest::SecondChance)]);
        assert_eq!(turn.action, Action::Answer(Choice::Wrong));
        assert_eq!(policy.retry(&ctx(&q, 3, JokerFlags::default())), Choice::Correct);
    }

    #[test]
    fn sweep_walks_every_joker_once() {
        let q = question();
        let mut policy = Strategy::JokerSweep.create_policy(1);
        let mut flags = JokerFlags::default();
        let mut seen = Vec::new();
        for n in 1..=7 {
            let turn = policy.plan_turn(&ctx(&q, n, flags));
            for play in turn.plays {
                let kind = match play {
                    JokerPlay::Use(request) => request.kind(),
                    JokerPlay::Authority => JokerKind::Authority,
                    JokerPlay::SwitchCategory(_) => unreachable!(),
                };
                assert!(flags.consume(kind));
                seen.push(kind);
            }
        }
        assert_eq!(seen.len(), 6);
        assert!(flags.all_used());
    }

    #[test]
    fn random_policy_is_seed_stable_and_never_expires_untimed() {
        let q = question();
        let plan = |seed| {
            let mut policy = Strategy::Random.create_policy(seed);
            (1..=5)
                .map(|n| policy.plan_turn(&ctx(&q, n, JokerFlags::default())))
                .collect::<Vec<_>>()
        };
        assert_eq!(plan(9), plan(9));
        for seed in 0..50 {
            assert!(plan(seed).iter().all(|turn| turn.action != Action::Expire));
        }
    }
}
