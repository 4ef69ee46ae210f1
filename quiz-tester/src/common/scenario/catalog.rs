use anyhow::{Result, ensure};
use quiz_game::constants::TOTAL_QUESTIONS;
use quiz_game::{
    Category, JokerKind, PersistOp, RunOutcome, StepKind, earned_so_far, reward_at, safety_floor,
    top_reward,
};
use std::collections::HashSet;

use super::TestScenario;
use crate::logic::runner::{PlaySummary, RunSetup};
use crate::logic::{PlayPlan, Strategy};

pub fn catalog_scenarios() -> Vec<TestScenario> {
    vec![
        TestScenario::new(
            "cash-out",
            "Cash Out After Four",
            plan(Strategy::CashOutAt(5))
                .with_expectation(cash_out_expectation)
                .with_expectation(audit_trail_expectation),
        ),
        TestScenario::new(
            "wrong-answer",
            "Wrong Answer Pays First Floor",
            plan(Strategy::WrongAt(6))
                .with_expectation(wrong_answer_expectation)
                .with_expectation(audit_trail_expectation),
        ),
        TestScenario::new(
            "timeout",
            "Timeout Pays Second Floor",
            plan(Strategy::TimeoutAt(11))
                .with_expectation(timeout_expectation)
                .with_expectation(audit_trail_expectation),
        ),
        TestScenario::new(
            "second-chance",
            "Second Chance Recovery",
            plan(Strategy::SecondChanceRecovery(3))
                .with_expectation(second_chance_expectation)
                .with_expectation(audit_trail_expectation),
        ),
        TestScenario::new(
            "perfect",
            "Perfect Run",
            plan(Strategy::Perfect)
                .with_expectation(perfect_expectation)
                .with_expectation(audit_trail_expectation),
        ),
        TestScenario::new(
            "joker-sweep",
            "Every Joker Once",
            plan(Strategy::JokerSweep)
                .with_expectation(joker_sweep_expectation)
                .with_expectation(audit_trail_expectation),
        ),
        TestScenario::new(
            "chosen-category",
            "Chosen Category Run",
            PlayPlan::new(RunSetup::chosen(Strategy::Perfect, Category::History))
                .with_expectation(chosen_category_expectation)
                .with_expectation(perfect_expectation),
        ),
        TestScenario::new(
            "random-invariants",
            "Randomized Play Invariants",
            plan(Strategy::Random)
                .with_expectation(audit_trail_expectation)
                .with_expectation(earnings_rule_expectation)
                .with_expectation(joker_once_expectation),
        ),
    ]
}

fn plan(strategy: Strategy) -> PlayPlan {
    PlayPlan::new(RunSetup::random(strategy))
}

fn answer_steps(summary: &PlaySummary) -> Vec<(usize, Option<bool>, u32)> {
    summary
        .steps()
        .filter_map(|step| match step.kind {
            StepKind::Answer {
                selected_option,
                is_correct,
            } => Some((
                step.question_number,
                selected_option.map(|_| is_correct),
                step.earnings_after,
            )),
            _ => None,
        })
        .collect()
}

fn cash_out_expectation(summary: &PlaySummary) -> Result<()> {
    ensure!(
        summary.outcome == RunOutcome::CashedOut,
        "expected a cash-out, got {}",
        summary.outcome
    );
    ensure!(summary.correct_count == 4, "correct count {}", summary.correct_count);
    ensure!(
        summary.final_earnings == reward_at(3),
        "cashed out {} instead of {}",
        summary.final_earnings,
        reward_at(3)
    );
    Ok(())
}

fn wrong_answer_expectation(summary: &PlaySummary) -> Result<()> {
    ensure!(summary.outcome == RunOutcome::WrongAnswer, "outcome {}", summary.outcome);
    ensure!(summary.correct_count == 5, "correct count {}", summary.correct_count);
    ensure!(summary.final_earnings == 50, "earnings {}", summary.final_earnings);
    ensure!(
        !summary.jokers.is_used(JokerKind::SecondChance),
        "second chance should be unused"
    );
    Ok(())
}

fn timeout_expectation(summary: &PlaySummary) -> Result<()> {
    ensure!(summary.outcome == RunOutcome::TimedOut, "outcome {}", summary.outcome);
    ensure!(summary.correct_count == 10, "correct count {}", summary.correct_count);
    ensure!(summary.final_earnings == 400, "earnings {}", summary.final_earnings);

    let Some(last) = answer_steps(summary).pop() else {
        anyhow::bail!("no answer steps recorded");
    };
    ensure!(
        last == (11, None, 400),
        "timeout step should carry no selection, got {last:?}"
    );
    let tail = &summary.ops[summary.ops.len().saturating_sub(2)..];
    ensure!(
        matches!(
            tail,
            [PersistOp::RecordStep(step), PersistOp::FinishRun(_)] if step.is_answer()
        ),
        "timeout answer must be recorded right before the finish"
    );
    Ok(())
}

fn second_chance_expectation(summary: &PlaySummary) -> Result<()> {
    let third: Vec<_> = answer_steps(summary)
        .into_iter()
        .filter(|(number, _, _)| *number == 3)
        .collect();
    ensure!(
        third == vec![(3, Some(true), reward_at(2))],
        "expected one correct answer step on Q3, got {third:?}"
    );
    ensure!(
        summary.jokers.is_used(JokerKind::SecondChance),
        "second chance should be spent"
    );
    ensure!(summary.outcome == RunOutcome::Completed, "outcome {}", summary.outcome);
    Ok(())
}

fn perfect_expectation(summary: &PlaySummary) -> Result<()> {
    ensure!(summary.outcome == RunOutcome::Completed, "outcome {}", summary.outcome);
    ensure!(
        summary.final_earnings == top_reward(),
        "earnings {}",
        summary.final_earnings
    );
    ensure!(
        summary.correct_count == TOTAL_QUESTIONS,
        "correct count {}",
        summary.correct_count
    );
    Ok(())
}

fn joker_sweep_expectation(summary: &PlaySummary) -> Result<()> {
    let used: Vec<JokerKind> = summary.steps().filter_map(|step| step.joker()).collect();
    let distinct: HashSet<JokerKind> = used.iter().copied().collect();
    ensure!(used.len() == 6, "expected six joker steps, got {}", used.len());
    ensure!(distinct.len() == 6, "joker repeated: {used:?}");
    ensure!(summary.jokers.all_used(), "summary flags {:?}", summary.jokers);
    Ok(())
}

fn chosen_category_expectation(summary: &PlaySummary) -> Result<()> {
    let first = summary
        .steps()
        .next()
        .map(|step| step.category);
    ensure!(
        first == Some(Category::History),
        "first question came from {first:?}"
    );
    ensure!(
        summary.steps().all(|step| !step.is_category_switch()),
        "no switches were requested"
    );
    Ok(())
}

fn audit_trail_expectation(summary: &PlaySummary) -> Result<()> {
    ensure!(
        summary.finish_count() == 1,
        "{} finish records",
        summary.finish_count()
    );
    ensure!(
        matches!(summary.ops.last(), Some(PersistOp::FinishRun(_))),
        "finish must be the last operation"
    );
    if let Some(PersistOp::FinishRun(completion)) = summary.ops.last() {
        ensure!(
            completion.final_earnings == summary.final_earnings
                && completion.correct_count == summary.correct_count
                && completion.jokers == summary.jokers,
            "completion record disagrees with the summary"
        );
    }
    ensure!(
        summary.ops.iter().all(|op| op.run_id() == summary.run_id),
        "operation for a foreign run"
    );
    ensure!(
        summary.earned_trace.windows(2).all(|pair| pair[0] <= pair[1]),
        "earned amount went down: {:?}",
        summary.earned_trace
    );
    let answers = answer_steps(summary);
    let correct = answers
        .iter()
        .filter(|(_, verdict, _)| *verdict == Some(true))
        .count();
    ensure!(
        correct == summary.correct_count,
        "{correct} correct answer steps for {} correct answers",
        summary.correct_count
    );
    Ok(())
}

fn earnings_rule_expectation(summary: &PlaySummary) -> Result<()> {
    let slot = summary.correct_count;
    let expected = match summary.outcome {
        RunOutcome::Completed => top_reward(),
        RunOutcome::CashedOut => earned_so_far(slot),
        RunOutcome::WrongAnswer | RunOutcome::TimedOut => safety_floor(slot),
    };
    ensure!(
        summary.final_earnings == expected,
        "{} at slot {slot} paid {} instead of {expected}",
        summary.outcome,
        summary.final_earnings
    );
    Ok(())
}

fn joker_once_expectation(summary: &PlaySummary) -> Result<()> {
    let mut seen = HashSet::new();
    for kind in summary.steps().filter_map(|step| step.joker()) {
        ensure!(seen.insert(kind), "{kind:?} used twice");
        ensure!(summary.jokers.is_used(kind), "{kind:?} step without flag");
    }
    ensure!(
        seen.len() == summary.jokers.used_count(),
        "{} joker steps for {} flags",
        seen.len(),
        summary.jokers.used_count()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_every_strategy() {
        let strategies: Vec<String> = catalog_scenarios()
            .iter()
            .map(|scenario| scenario.plan.setup.strategy.label())
            .collect();
        for expected in ["Perfect", "Random", "Joker sweep", "Timeout at Q11"] {
            assert!(strategies.iter().any(|label| label == expected), "{expected}");
        }
        assert!(
            catalog_scenarios()
                .iter()
                .all(|scenario| !scenario.plan.expectations.is_empty())
        );
    }
}
