//! Configuration persistence for vocaboost.

use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::scheduler::{
    Algorithm, FsrsParameters, FsrsScheduler, MultiplicativeScheduler, Scheduler,
    DEFAULT_MAXIMUM_INTERVAL, DEFAULT_RETENTION, DEFAULT_WEIGHTS, MAX_FAIL_INTERVAL_DAYS,
    WEIGHT_RANGES,
};
use crate::storage::{JsonFileStore, StorageBackend};

const MINUTES_PER_DAY: f64 = 1440.0;

/// Application configuration that persists between sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub algorithm: Algorithm,
    pub request_retention: f64,
    pub maximum_interval: u32,
    pub enable_fuzz: bool,
    pub learning_steps_minutes: Vec<f64>,
    pub relearning_steps_minutes: Vec<f64>,
    /// FSRS weights; the built-in defaults when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            request_retention: DEFAULT_RETENTION,
            maximum_interval: DEFAULT_MAXIMUM_INTERVAL,
            enable_fuzz: true,
            learning_steps_minutes: vec![10.0, MINUTES_PER_DAY],
            relearning_steps_minutes: vec![MINUTES_PER_DAY],
            weights: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Most words per review session; unlimited when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_reviews: Option<usize>,
}

impl Config {
    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vocaboost")
            .join("config.toml")
    }

    /// Load config from disk, returning default if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {:?}", path))?;
        Ok(config)
    }

    /// Save config to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize config")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        if let Some(max) = self.session.max_reviews {
            ensure!(max > 0, "session.max_reviews must be at least 1");
        }
        Ok(())
    }

    /// Where course data lives: the configured directory or the platform default.
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(JsonFileStore::default_path)
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        let retention = self.request_retention;
        ensure!(
            retention > 0.0 && retention < 1.0,
            "scheduler.request_retention must be between 0 and 1 (exclusive), got {}",
            retention
        );
        ensure!(
            self.maximum_interval >= 1,
            "scheduler.maximum_interval must be at least 1 day"
        );
        check_steps("scheduler.learning_steps_minutes", &self.learning_steps_minutes)?;
        check_steps("scheduler.relearning_steps_minutes", &self.relearning_steps_minutes)?;

        if let Some(weights) = &self.weights {
            if weights.len() != DEFAULT_WEIGHTS.len() {
                bail!(
                    "scheduler.weights must have {} values, got {}",
                    DEFAULT_WEIGHTS.len(),
                    weights.len()
                );
            }
            for (i, (&w, &(low, high))) in weights.iter().zip(WEIGHT_RANGES.iter()).enumerate() {
                ensure!(
                    w.is_finite() && (low..=high).contains(&w),
                    "scheduler.weights[{}] must be within {}..={}, got {}",
                    i,
                    low,
                    high,
                    w
                );
            }
        }
        Ok(())
    }

    pub fn fsrs_parameters(&self) -> Result<FsrsParameters> {
        self.validate()?;
        let weights = match &self.weights {
            Some(values) => {
                let mut weights = DEFAULT_WEIGHTS;
                weights.copy_from_slice(values);
                weights
            }
            None => DEFAULT_WEIGHTS,
        };

        Ok(FsrsParameters {
            weights,
            request_retention: self.request_retention,
            maximum_interval: self.maximum_interval,
            enable_fuzz: self.enable_fuzz,
            learning_steps: minutes_to_days(&self.learning_steps_minutes),
            relearning_steps: minutes_to_days(&self.relearning_steps_minutes),
        })
    }

    /// Build the configured scheduler.
    pub fn build(&self) -> Result<Box<dyn Scheduler>> {
        Ok(match self.algorithm {
            Algorithm::Fsrs => Box::new(FsrsScheduler::new(self.fsrs_parameters()?)),
            Algorithm::Multiplicative => {
                self.validate()?;
                Box::new(MultiplicativeScheduler::new(
                    self.maximum_interval,
                    self.enable_fuzz,
                ))
            }
        })
    }
}

fn check_steps(name: &str, steps: &[f64]) -> Result<()> {
    ensure!(!steps.is_empty(), "{} must not be empty", name);
    ensure!(
        steps.iter().all(|s| s.is_finite() && *s > 0.0),
        "{} must contain only positive numbers",
        name
    );
    let limit = MAX_FAIL_INTERVAL_DAYS * MINUTES_PER_DAY;
    ensure!(
        steps[0] <= limit,
        "{} must start with a step of at most {} minutes, got {}",
        name,
        limit,
        steps[0]
    );
    Ok(())
}

fn minutes_to_days(minutes: &[f64]) -> Vec<f64> {
    minutes.iter().map(|m| m / MINUTES_PER_DAY).collect()
}
