use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// A named lower bound on a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub name: String,
    pub min_score: f64,
}

impl Threshold {
    pub fn new(name: impl Into<String>, min_score: f64) -> Self {
        Self {
            name: name.into(),
            min_score,
        }
    }
}

/// Ordered thresholds mapping a [0, 1] score onto a label.
///
/// Levels are checked top-down; the first one whose minimum the score meets
/// wins. Scores below every level get the floor label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierLadder {
    pub levels: Vec<Threshold>,
    pub floor: String,
}

impl TierLadder {
    pub fn new(levels: Vec<Threshold>, floor: impl Into<String>) -> Self {
        Self {
            levels,
            floor: floor.into(),
        }
    }

    pub fn tier_for(&self, score: f64) -> &str {
        self.levels
            .iter()
            .find(|level| score >= level.min_score)
            .map(|level| level.name.as_str())
            .unwrap_or(self.floor.as_str())
    }

    /// All labels, top tier first, floor last.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.levels
            .iter()
            .map(|l| l.name.as_str())
            .chain(std::iter::once(self.floor.as_str()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.floor.trim().is_empty() {
            return Err(ConfigError::InvalidLadder("floor tier needs a name".into()));
        }
        for level in &self.levels {
            if level.name.trim().is_empty() {
                return Err(ConfigError::InvalidLadder("tier names must not be empty".into()));
            }
            if !(0.0..=1.0).contains(&level.min_score) {
                return Err(ConfigError::InvalidLadder(format!(
                    "tier '{}' has min_score {} outside [0, 1]",
                    level.name, level.min_score
                )));
            }
        }
        if let Some(pair) = self
            .levels
            .windows(2)
            .find(|w| w[0].min_score <= w[1].min_score)
        {
            return Err(ConfigError::InvalidLadder(format!(
                "tiers must be ordered by strictly decreasing min_score ('{}' then '{}')",
                pair[0].name, pair[1].name
            )));
        }
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        if let Some(dup) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(ConfigError::InvalidLadder(format!(
                "tier '{}' is defined twice",
                dup[0]
            )));
        }
        Ok(())
    }
}
