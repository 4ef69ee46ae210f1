//! Centralized ladder, timing, and joker tuning constants.
//!
//! These values define the deterministic math for a run. Keeping them
//! together ensures that gameplay can only be adjusted via code changes
//! reviewed in version control, rather than through external JSON assets.

// Ladder -------------------------------------------------------------------
/// Number of questions in a full run.
pub const TOTAL_QUESTIONS: usize = 15;
/// Prize for each slot, index 0 is question 1.
pub const REWARDS: [u32; TOTAL_QUESTIONS] = [
    5, 10, 20, 30, 50, 75, 100, 150, 250, 400, 500, 650, 800, 900, 1000,
];
/// Slots whose completion upgrades the guaranteed floor (questions 5 and 10).
pub const SAFETY_SLOTS: [usize; 2] = [4, 9];
/// Floor once the first safety slot is reached.
pub const FIRST_SAFETY_AMOUNT: u32 = 50;
/// Floor once the second safety slot is reached.
pub const SECOND_SAFETY_AMOUNT: u32 = 400;

// Timer bands --------------------------------------------------------------
pub(crate) const UNTIMED_UNTIL_QUESTION: usize = 5;
pub(crate) const MIDDLE_BAND_UNTIL_QUESTION: usize = 10;
pub(crate) const MIDDLE_BAND_SECONDS: u32 = 60;
pub(crate) const FINAL_BAND_SECONDS: u32 = 30;

// Session delays (defaults for `SessionConfig`) -----------------------------
pub(crate) const DEFAULT_LOCK_DELAY_MS: u64 = 700;
pub(crate) const DEFAULT_REVEAL_DELAY_MS: u64 = 1_000;
pub(crate) const DEFAULT_TIMEOUT_DELAY_MS: u64 = 1_200;
pub(crate) const MAX_DELAY_MS: u64 = 60_000;

// Joker tuning -------------------------------------------------------------
pub(crate) const EXPERT_ACCURACY: f64 = 0.7;
pub(crate) const AUDIENCE_LEAD_ACCURACY: f64 = 0.7;
pub(crate) const AUDIENCE_LEAD_MIN: u32 = 55;
pub(crate) const AUDIENCE_LEAD_SPAN: u32 = 10;
pub(crate) const FIFTY_FIFTY_REMOVALS: usize = 2;

// Runs ---------------------------------------------------------------------
pub const DISPLAY_NAME_MAX_CHARS: usize = 24;

// Advisory copy ------------------------------------------------------------
pub(crate) const AUTHORITY_FALLBACK_TEXT: &str = "The line is weak. Trust your instincts.";
pub(crate) const AUTHORITY_EMPTY_TEXT: &str =
    "The line keeps cutting out, but C sounds reasonable to me...";
pub(crate) const SECOND_CHANCE_ARMED_TEXT: &str =
    "If your first answer on this question is wrong, you may pick again once.";
pub(crate) const SECOND_CHANCE_RETRY_TEXT: &str =
    "That first answer was wrong. Choose again and lock it in.";
