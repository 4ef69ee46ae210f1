//! Random sources for joker effects.
use hmac::{Hmac, Mac};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use sha2::Sha256;
use std::collections::VecDeque;

/// Draw interface used by every random joker effect.
pub trait RandomSource {
    /// Uniform draw in `0..upper`; `upper` of zero or one yields zero.
    fn below(&mut self, upper: u32) -> u32;

    /// Bernoulli draw succeeding with probability `p`.
    fn chance(&mut self, p: f64) -> bool;
}

impl<R: rand::RngCore> RandomSource for R {
    fn below(&mut self, upper: u32) -> u32 {
        if upper <= 1 {
            0
        } else {
            self.gen_range(0..upper)
        }
    }

    fn chance(&mut self, p: f64) -> bool {
        self.gen_bool(p.clamp(0.0, 1.0))
    }
}

/// Deterministic draw queue for tests and replays.
///
/// Each call pops one value: `below(n)` yields `value % n`, and `chance(p)`
/// succeeds when `value % 100` is under `p * 100`. An empty queue yields zero.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandom {
    draws: VecDeque<u32>,
    consumed: usize,
}

impl ScriptedRandom {
    #[must_use]
    pub fn new(draws: impl IntoIterator<Item = u32>) -> Self {
        Self {
            draws: draws.into_iter().collect(),
            consumed: 0,
        }
    }

    /// Number of values popped so far.
    #[must_use]
    pub const fn consumed(&self) -> usize {
        self.consumed
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.draws.len()
    }

    fn next_value(&mut self) -> u32 {
        self.consumed += 1;
        self.draws.pop_front().unwrap_or(0)
    }
}

impl RandomSource for ScriptedRandom {
    fn below(&mut self, upper: u32) -> u32 {
        let value = self.next_value();
        if upper <= 1 { 0 } else { value % upper }
    }

    fn chance(&mut self, p: f64) -> bool {
        let value = self.next_value();
        f64::from(value % 100) < p * 100.0
    }
}

/// Counting wrapper for RNG streams providing instrumentation.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl CountingRng<SmallRng> {
    fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            draws: 0,
        }
    }
}

impl<R: rand::RngCore> CountingRng<R> {
    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl<R: rand::RngCore> rand::RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.draws = self.draws.saturating_add(1);
        self.rng.try_fill_bytes(dest)
    }
}

/// Seeded stream type used outside of tests.
pub type SeededStream = CountingRng<SmallRng>;

/// One independent stream per random joker, so consuming one joker never
/// shifts the draws another joker sees.
#[derive(Debug, Clone)]
pub struct JokerRng<R> {
    expert: R,
    fifty_fifty: R,
    audience: R,
}

impl JokerRng<SeededStream> {
    /// Construct the bundle from a run seed.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            expert: CountingRng::new(derive_stream_seed(seed, b"expert")),
            fifty_fifty: CountingRng::new(derive_stream_seed(seed, b"fifty-fifty")),
            audience: CountingRng::new(derive_stream_seed(seed, b"audience")),
        }
    }

    /// Total draws across all streams.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.expert
            .draws()
            .saturating_add(self.fifty_fifty.draws())
            .saturating_add(self.audience.draws())
    }
}

impl<R: RandomSource> JokerRng<R> {
    /// Bundle caller-supplied sources, e.g. scripted draws in tests.
    #[must_use]
    pub const fn from_sources(expert: R, fifty_fifty: R, audience: R) -> Self {
        Self {
            expert,
            fifty_fifty,
            audience,
        }
    }

    pub fn expert(&mut self) -> &mut R {
        &mut self.expert
    }

    pub fn fifty_fifty(&mut self) -> &mut R {
        &mut self.fifty_fifty
    }

    pub fn audience(&mut self) -> &mut R {
        &mut self.audience
    }
}

fn derive_stream_seed(run_seed: u64, domain_tag: &[u8]) -> u64 {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(&run_seed.to_le_bytes()) else {
        return run_seed;
    };
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_draws_are_reduced_into_range() {
        let mut rng = ScriptedRandom::new([7, 69, 70]);
        assert_eq!(rng.below(4), 3);
        assert!(rng.chance(0.7));
        assert!(!rng.chance(0.7));
        assert_eq!(rng.below(10), 0);
        assert_eq!(rng.consumed(), 4);
        assert_eq!(rng.remaining(), 0);
    }

    #[test]
    fn seeded_streams_are_reproducible_and_independent() {
        let mut first = JokerRng::from_seed(42);
        let mut second = JokerRng::from_seed(42);
        let a: Vec<u32> = (0..8).map(|_| first.expert().below(1_000)).collect();
        let b: Vec<u32> = (0..8).map(|_| second.expert().below(1_000)).collect();
        assert_eq!(a, b);
        assert_eq!(first.draws(), 8);

        assert_ne!(
            derive_stream_seed(42, b"expert"),
            derive_stream_seed(42, b"audience")
        );
        assert_ne!(
            derive_stream_seed(42, b"expert"),
            derive_stream_seed(43, b"expert")
        );
    }

    #[test]
    fn below_handles_degenerate_bounds() {
        let mut rng = JokerRng::from_seed(1);
        assert_eq!(rng.audience().below(0), 0);
        assert_eq!(rng.audience().below(1), 0);
    }
}
