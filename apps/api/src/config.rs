use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Utc};

use crate::training::forest::ForestParams;
use crate::training::pipeline::TrainingConfig;

/// Application configuration loaded from environment variables.
/// Every variable has a default; invalid values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub model_dir: PathBuf,
    pub dataset_path: Option<PathBuf>,
    pub training_seed: u64,
    pub test_fraction: f64,
    pub n_estimators: usize,
    /// `None` means unlimited.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Year `years_since_graduation` is computed against.
    pub reference_year: i32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            model_dir: std::env::var("MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("ml_model/saved_model")),
            dataset_path: optional_env("DATASET_PATH").map(PathBuf::from),
            training_seed: parse_env("TRAINING_SEED", 42)?,
            test_fraction: parse_env("TEST_FRACTION", 0.2)?,
            n_estimators: parse_env("RF_N_ESTIMATORS", 200)?,
            max_depth: parse_max_depth(optional_env("RF_MAX_DEPTH").as_deref())?,
            min_samples_split: parse_env("RF_MIN_SAMPLES_SPLIT", 5)?,
            min_samples_leaf: parse_env("RF_MIN_SAMPLES_LEAF", 2)?,
            reference_year: parse_env("REFERENCE_YEAR", Utc::now().year())?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            bail!("TEST_FRACTION must be in (0, 1), got {}", self.test_fraction);
        }
        if self.n_estimators == 0 {
            bail!("RF_N_ESTIMATORS must be positive");
        }
        if self.min_samples_split < 2 {
            bail!("RF_MIN_SAMPLES_SPLIT must be at least 2");
        }
        if self.min_samples_leaf == 0 {
            bail!("RF_MIN_SAMPLES_LEAF must be positive");
        }
        Ok(())
    }

    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            test_fraction: self.test_fraction,
            forest: ForestParams {
                n_estimators: self.n_estimators,
                max_depth: self.max_depth,
                min_samples_split: self.min_samples_split,
                min_samples_leaf: self.min_samples_leaf,
                seed: self.training_seed,
                ..ForestParams::default()
            },
            ..TrainingConfig::default()
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'")),
        None => Ok(default),
    }
}

/// `0` or `none` mean unlimited; unset means 20.
fn parse_max_depth(raw: Option<&str>) -> Result<Option<usize>> {
    let Some(raw) = raw else {
        return Ok(Some(20));
    };
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let depth: usize = raw
        .parse()
        .with_context(|| format!("RF_MAX_DEPTH must be a number or 'none', got '{raw}'"))?;
    Ok((depth > 0).then_some(depth))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_max_depth() {
        assert_eq!(parse_max_depth(None).unwrap(), Some(20));
        assert_eq!(parse_max_depth(Some("12")).unwrap(), Some(12));
        assert_eq!(parse_max_depth(Some("0")).unwrap(), None);
        assert_eq!(parse_max_depth(Some("None")).unwrap(), None);
        assert!(parse_max_depth(Some("deep")).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_fraction() {
        let config = Config {
            port: 8080,
            rust_log: "info".to_string(),
            model_dir: PathBuf::from("models"),
            dataset_path: None,
            training_seed: 42,
            test_fraction: 1.5,
            n_estimators: 200,
            max_depth: Some(20),
            min_samples_split: 5,
            min_samples_leaf: 2,
            reference_year: 2024,
        };
        assert!(config.validate().is_err());

        let ok = Config {
            test_fraction: 0.25,
            ..config
        };
        assert!(ok.validate().is_ok());
        let training = ok.training_config();
        assert_eq!(training.forest.n_estimators, 200);
        assert_eq!(training.forest.seed, 42);
        assert_eq!(training.test_fraction, 0.25);
    }
}
