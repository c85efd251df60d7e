//! Encounter configuration.

use crate::dice::Dice;
use std::str::FromStr;
use thiserror::Error;

/// Environment variable holding the dice seed.
pub const SEED_VAR: &str = "PF2E_SEED";
/// Environment variable holding the round limit. `0` disables the limit.
pub const MAX_ROUNDS_VAR: &str = "PF2E_MAX_ROUNDS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Configuration for running an encounter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatConfig {
    /// Seed for every roll in the encounter. Random when unset.
    pub seed: Option<u64>,

    /// Rounds before the encounter is called off.
    pub max_rounds: Option<u32>,

    /// How far behind a step-feed subscriber may fall before it lags.
    pub feed_capacity: usize,

    /// Stride distance for templates that don't set one.
    pub default_speed: i32,
}

impl CombatConfig {
    pub fn new() -> Self {
        Self {
            seed: None,
            max_rounds: Some(100),
            feed_capacity: 256,
            default_speed: 5,
        }
    }

    /// Read overrides from the environment on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();
        if let Some(seed) = read_var::<u64>(SEED_VAR)? {
            config.seed = Some(seed);
        }
        if let Some(rounds) = read_var::<u32>(MAX_ROUNDS_VAR)? {
            config.max_rounds = (rounds > 0).then_some(rounds);
        }
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: Option<u32>) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_feed_capacity(mut self, capacity: usize) -> Self {
        self.feed_capacity = capacity.max(1);
        self
    }

    pub fn with_default_speed(mut self, speed: i32) -> Self {
        self.default_speed = speed.max(0);
        self
    }

    /// Fresh dice for one encounter.
    pub fn dice(&self) -> Dice {
        match self.seed {
            Some(seed) => Dice::seeded(seed),
            None => Dice::from_entropy(),
        }
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn read_var<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => parse_value(var, &value).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_value<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        })
}
