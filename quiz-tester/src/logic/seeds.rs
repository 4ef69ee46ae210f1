use anyhow::{Result, bail};
use sha2::{Digest, Sha256};

/// A resolved CLI seed and how it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInfo {
    pub seed: u64,
    pub label: String,
}

impl SeedInfo {
    #[must_use]
    pub fn from_numeric(seed: u64) -> Self {
        Self {
            seed,
            label: seed.to_string(),
        }
    }

    /// Seed derived from a memorable phrase, e.g. `phrase:friday-night`.
    #[must_use]
    pub fn from_phrase(phrase: &str) -> Self {
        let digest = Sha256::digest(phrase.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        Self {
            seed: u64::from_le_bytes(bytes),
            label: format!("phrase:{phrase}"),
        }
    }
}

/// Resolve CLI seed tokens. Accepts integers and `phrase:<text>`; duplicate
/// seeds are dropped.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<SeedInfo>> {
    let mut resolved: Vec<SeedInfo> = Vec::new();

    for token in tokens {
        if token.is_empty() {
            continue;
        }

        let info = if let Ok(value) = token.parse::<u64>() {
            SeedInfo::from_numeric(value)
        } else if let Ok(value) = token.parse::<i64>() {
            SeedInfo::from_numeric(value.unsigned_abs())
        } else if let Some(phrase) = token.strip_prefix("phrase:")
            && !phrase.is_empty()
        {
            SeedInfo::from_phrase(phrase)
        } else {
            bail!("Unrecognized seed value: {token}");
        };

        if !resolved.iter().any(|existing| existing.seed == info.seed) {
            resolved.push(info);
        }
    }

    if resolved.is_empty() {
        bail!("No seeds given");
    }
    Ok(resolved)
}
