//! Run configuration.
//!
//! Merges built-in defaults, an optional TOML file and `CHAIN_*` environment
//! variables (nested keys separated by `__`, e.g.
//! `CHAIN_ELIGIBILITY__MIN_YEAR=2014`).

use std::io;
use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::contract::EligibilityRule;
use crate::error::{ChainError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Characters per n-gram feature.
    pub ngram_size: usize,
    /// Similarity entries kept per corpus row, the row's self-match included.
    pub ntop: usize,
    /// Scores at or below this are never kept.
    pub lower_bound: f64,
    /// Scores strictly above this mark a chain record as valid.
    pub threshold: f64,
    /// Result-size cap passed to the contract source.
    pub fetch_limit: usize,
    /// Per-fetch deadline; `None` waits indefinitely.
    pub fetch_timeout_secs: Option<u64>,
    /// Targets processed concurrently; `1` is sequential.
    pub workers: usize,
    pub eligibility: EligibilityRule,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            ngram_size: 3,
            ntop: 3,
            lower_bound: 0.0,
            threshold: 0.8,
            fetch_limit: 1_000_000,
            fetch_timeout_secs: None,
            workers: 1,
            eligibility: EligibilityRule::default(),
        }
    }
}

impl ChainConfig {
    /// Load defaults, then `path` if given, then the environment.
    ///
    /// # Errors
    /// An IO error if `path` does not exist, a configuration error if a
    /// value has the wrong type, or [`ChainError::InvalidParameter`] if the
    /// merged values fail [`ChainConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.exists() {
                return Err(ChainError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("config file {} not found", path.display()),
                )));
            }
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("CHAIN_").split("__"));
        Self::extract(&figment)
    }

    /// Defaults overridden by an inline TOML document.
    ///
    /// # Errors
    /// As for [`ChainConfig::load`], minus the IO case.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let figment =
            Figment::from(Serialized::defaults(Self::default())).merge(Toml::string(toml));
        Self::extract(&figment)
    }

    fn extract(figment: &Figment) -> Result<Self> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// [`ChainError::InvalidParameter`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.ngram_size == 0 {
            return Err(ChainError::invalid("ngram_size", "must be at least 1"));
        }
        if self.ntop == 0 {
            return Err(ChainError::invalid("ntop", "must be at least 1"));
        }
        if self.workers == 0 {
            return Err(ChainError::invalid("workers", "must be at least 1"));
        }
        if self.fetch_limit == 0 {
            return Err(ChainError::invalid("fetch_limit", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ChainError::invalid(
                "threshold",
                format!("{} is outside [0, 1]", self.threshold),
            ));
        }
        if !(0.0..1.0).contains(&self.lower_bound) {
            return Err(ChainError::invalid(
                "lower_bound",
                format!("{} is outside [0, 1)", self.lower_bound),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    pub fn log_config(&self) {
        log::info!(
            "matching: ngram_size={}, ntop={}, lower_bound={}, threshold={}",
            self.ngram_size,
            self.ntop,
            self.lower_bound,
            self.threshold
        );
        log::info!(
            "fetching: limit={}, timeout={:?}, workers={}",
            self.fetch_limit,
            self.fetch_timeout(),
            self.workers
        );
        log::debug!("eligibility: {:?}", self.eligibility);
    }
}
