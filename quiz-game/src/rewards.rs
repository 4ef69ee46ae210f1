//! Prize ladder lookups and safety-net math.
//!
//! Slots are zero-based indices of the question about to be played; the
//! player-facing question number is `slot + 1`.

use crate::constants::{
    FIRST_SAFETY_AMOUNT, REWARDS, SAFETY_SLOTS, SECOND_SAFETY_AMOUNT, TOTAL_QUESTIONS,
};

/// Prize paid for answering the question at `slot` correctly.
///
/// Slots past the end of the ladder resolve to the top prize.
#[must_use]
pub fn reward_at(slot: usize) -> u32 {
    REWARDS[slot.min(TOTAL_QUESTIONS - 1)]
}

/// Top prize of the ladder.
#[must_use]
pub const fn top_reward() -> u32 {
    REWARDS[TOTAL_QUESTIONS - 1]
}

/// Amount banked before playing `slot`: the prize of the last question
/// answered correctly, never the one in play.
#[must_use]
pub fn earned_so_far(slot: usize) -> u32 {
    if slot == 0 { 0 } else { reward_at(slot - 1) }
}

/// Guaranteed payout when the question at `slot` is lost.
///
/// The amounts are fixed and independent of the ladder values.
#[must_use]
pub const fn safety_floor(slot: usize) -> u32 {
    if slot >= SAFETY_SLOTS[1] {
        SECOND_SAFETY_AMOUNT
    } else if slot >= SAFETY_SLOTS[0] {
        FIRST_SAFETY_AMOUNT
    } else {
        0
    }
}

/// Whether `slot` is the last question of the ladder.
#[must_use]
pub const fn is_final_slot(slot: usize) -> bool {
    slot + 1 >= TOTAL_QUESTIONS
}

/// Whether the question at `slot` is one of the safety thresholds.
#[must_use]
pub fn is_safety_slot(slot: usize) -> bool {
    SAFETY_SLOTS.contains(&slot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_is_strictly_increasing() {
        assert!(REWARDS.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(REWARDS.iter().all(|&amount| amount > 0));
        assert_eq!(top_reward(), 1000);
    }

    #[test]
    fn earned_tracks_previous_slot() {
        assert_eq!(earned_so_far(0), 0);
        for slot in 1..TOTAL_QUESTIONS {
            assert_eq!(earned_so_far(slot), reward_at(slot - 1));
        }
    }

    #[test]
    fn floor_steps_at_safety_slots() {
        let floors: Vec<u32> = (0..TOTAL_QUESTIONS).map(safety_floor).collect();
        assert!(floors.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(&floors[..4], &[0, 0, 0, 0]);
        assert_eq!(&floors[4..9], &[50; 5]);
        assert_eq!(&floors[9..], &[400; 6]);
    }

    #[test]
    fn slot_helpers() {
        assert!(is_final_slot(14));
        assert!(!is_final_slot(13));
        assert!(is_safety_slot(4));
        assert!(is_safety_slot(9));
        assert!(!is_safety_slot(10));
        assert_eq!(reward_at(99), 1000);
    }
}
