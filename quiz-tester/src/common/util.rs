use anyhow::{Context, Result};
use quiz_game::{QuestionBank, SessionConfig};
use std::path::Path;

const BUNDLED_QUESTIONS: &str = include_str!("../../assets/questions.json");

/// Split a comma-separated CLI value, dropping blanks.
pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Load the question bank from `path`, or the bundled one.
pub fn load_bank(path: Option<&Path>) -> Result<QuestionBank> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            QuestionBank::from_json(&json)
                .with_context(|| format!("invalid question bank in {}", path.display()))
        }
        None => QuestionBank::from_json(BUNDLED_QUESTIONS).context("bundled question bank"),
    }
}

/// Load session timing from `path`; without one the harness plays on
/// instant delays.
pub fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            SessionConfig::from_json(&json)
                .with_context(|| format!("invalid session config in {}", path.display()))
        }
        None => Ok(SessionConfig::instant()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(label: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "quiz-tester-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        std::fs::write(&path, contents).expect("write temp file");
        path
    }

    #[test]
    fn split_csv_trims_and_filters() {
        let parts = split_csv(" alpha, ,beta,  gamma ");
        assert_eq!(parts, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn bundled_bank_loads() {
        let bank = load_bank(None).expect("bundled bank");
        assert!(bank.len() >= 15);
    }

    #[test]
    fn config_file_overrides_instant_defaults() {
        assert_eq!(load_config(None).unwrap(), SessionConfig::instant());

        let path = temp_file("config", r#"{ "lock_delay_ms": 300 }"#);
        let cfg = load_config(Some(&path)).expect("config");
        assert_eq!(cfg.lock_delay_ms, 300);
        assert_eq!(cfg.reveal_delay_ms, 1_000);

        let bad = temp_file("config-bad", r#"{ "reveal_delay_ms": 90000 }"#);
        let err = load_config(Some(&bad)).unwrap_err();
        assert!(format!("{err:#}").contains("reveal_delay_ms"));
    }

    #[test]
    fn missing_bank_file_reports_path() {
        let err = load_bank(Some(Path::new("/nonexistent/questions.json"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/questions.json"));
    }
}
