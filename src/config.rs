//! Run configuration.
//!
//! Configuration is read from a TOML file and validated once at load time.
//! Every section has defaults, so an empty file is a valid configuration.
//!
//! ```toml
//! [weights]
//! quality = 0.3
//! productivity = 0.25
//! collaboration = 0.2
//! innovation = 0.15
//! maintenance = 0.1
//!
//! [[repositories]]
//! name = "api"
//! path = "../api"
//! weight = 1.0
//!
//! [employees]
//! "Ada Lovelace" = ["ada@example.com", "ada@users.noreply.github.com"]
//! ```
//!
//! AI backend and model can additionally be overridden from the environment
//! and the command line, see [`crate::llm::LlmConfig`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::normalize::Normalization;
use crate::engine::tier::{Threshold, TierLadder};
use crate::identity::IdentityResolver;
use crate::llm::LlmProvider;
use crate::models::{Complexity, Period, MAX_WINDOW_DAYS};

/// Tolerance for blend weights that must sum to one.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Upper bound for `base_delay` and `request_interval`, in seconds.
pub const MAX_DELAY_SECS: f64 = 3600.0;

/// Errors raised while loading or validating configuration. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{what} weights must sum to 1.0 (got {sum:.6})")]
    WeightSum { what: &'static str, sum: f64 },
    #[error("{what} weight '{name}' must be within [0, 1] (got {value})")]
    WeightRange {
        what: &'static str,
        name: String,
        value: f64,
    },
    #[error("Email '{email}' is mapped to both '{first}' and '{second}'")]
    DuplicateEmail {
        email: String,
        first: String,
        second: String,
    },
    #[error("Contributor '{0}' has no email addresses")]
    NoEmails(String),
    #[error("Invalid threshold ladder: {0}")]
    InvalidLadder(String),
    #[error("Multiplier '{name}' must be positive (got {value})")]
    InvalidMultiplier { name: String, value: f64 },
    #[error("Unknown evaluation period '{0}'")]
    UnknownPeriod(String),
    #[error("Invalid AI settings: {0}")]
    InvalidAi(String),
    #[error("Invalid repository '{name}': {reason}")]
    InvalidRepository { name: String, reason: String },
}

/// The five weighted evaluation dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionWeights {
    pub quality: f64,
    pub productivity: f64,
    pub collaboration: f64,
    pub innovation: f64,
    pub maintenance: f64,
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            quality: 0.3,
            productivity: 0.25,
            collaboration: 0.2,
            innovation: 0.15,
            maintenance: 0.1,
        }
    }
}

impl DimensionWeights {
    fn entries(&self) -> [(&'static str, f64); 5] {
        [
            ("quality", self.quality),
            ("productivity", self.productivity),
            ("collaboration", self.collaboration),
            ("innovation", self.innovation),
            ("maintenance", self.maintenance),
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_blend("Dimension", &self.entries())
    }
}

/// How the engine treats commits whose AI verdict is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingVerdictPolicy {
    /// Missing verdicts add 0 to the numerator but still count in the denominator.
    #[default]
    CountAsZero,
    /// Missing verdicts are left out of the average entirely.
    Exclude,
}

/// What to do when a repository cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryErrorPolicy {
    #[default]
    Skip,
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    /// Set to false to score without AI verdicts.
    pub enabled: bool,
    pub backend: LlmProvider,
    pub model: Option<String>,
    /// Total attempts per request, including the first.
    pub max_retries: u32,
    /// Seconds; backoff before attempt n+1 is `base_delay * 2^(n-1)`.
    pub base_delay: f64,
    /// Minimum seconds between two requests from this process.
    pub request_interval: f64,
    pub max_parallel: usize,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout: u64,
    pub max_diff_chars: usize,
    pub cache_dir: PathBuf,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: LlmProvider::default(),
            model: None,
            max_retries: 6,
            base_delay: 1.0,
            request_interval: 3.0,
            max_parallel: 4,
            request_timeout: 120,
            max_diff_chars: 3000,
            cache_dir: PathBuf::from(".git-efficiency/cache"),
        }
    }
}

impl AiSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidAi("max_retries must be at least 1".into()));
        }
        if self.max_parallel == 0 {
            return Err(ConfigError::InvalidAi("max_parallel must be at least 1".into()));
        }
        for (name, value) in [
            ("base_delay", self.base_delay),
            ("request_interval", self.request_interval),
        ] {
            if !value.is_finite() || !(0.0..=MAX_DELAY_SECS).contains(&value) {
                return Err(ConfigError::InvalidAi(format!(
                    "{} must be between 0 and {} seconds (got {})",
                    name, MAX_DELAY_SECS, value
                )));
            }
        }
        Ok(())
    }

    pub fn base_delay_duration(&self) -> Duration {
        seconds(self.base_delay)
    }

    pub fn request_interval_duration(&self) -> Duration {
        seconds(self.request_interval)
    }
}

/// Clamp to `[0, MAX_DELAY_SECS]`; NaN becomes zero.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.clamp(0.0, MAX_DELAY_SECS)).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSettings {
    pub exclude_merge_commits: bool,
    pub exclude_empty_commits: bool,
    /// Keep at most this many (newest) commits per repository.
    pub max_commits: Option<usize>,
    pub on_repository_error: RepositoryErrorPolicy,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            exclude_merge_commits: true,
            exclude_empty_commits: true,
            max_commits: None,
            on_repository_error: RepositoryErrorPolicy::Skip,
        }
    }
}

/// One step of the commit cadence ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadenceStep {
    pub name: String,
    pub min_commits_per_day: f64,
    pub multiplier: f64,
}

impl CadenceStep {
    fn new(name: &str, min_commits_per_day: f64, multiplier: f64) -> Self {
        Self {
            name: name.to_string(),
            min_commits_per_day,
            multiplier,
        }
    }
}

/// Productivity multiplier per AI complexity tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityMultipliers {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for ComplexityMultipliers {
    fn default() -> Self {
        Self {
            low: 0.8,
            medium: 1.0,
            high: 1.3,
        }
    }
}

impl ComplexityMultipliers {
    pub fn for_tier(&self, tier: Complexity) -> f64 {
        match tier {
            Complexity::Low => self.low,
            Complexity::Medium => self.medium,
            Complexity::High => self.high,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductivitySettings {
    /// Evaluated top-down; the first step whose minimum is met applies.
    pub cadence: Vec<CadenceStep>,
    /// Multiplier below the lowest cadence step.
    pub cadence_floor: f64,
    pub complexity: ComplexityMultipliers,
    /// Multiplier per tech-stack label; unknown stacks use 1.0.
    pub tech_stacks: BTreeMap<String, f64>,
}

impl Default for ProductivitySettings {
    fn default() -> Self {
        let tech_stacks = [("java", 1.0), ("javascript", 0.8), ("cpp", 1.3), ("go", 1.1)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Self {
            cadence: vec![
                CadenceStep::new("high", 3.0, 1.2),
                CadenceStep::new("medium", 1.0, 1.0),
                CadenceStep::new("low", 0.2, 0.8),
            ],
            cadence_floor: 0.6,
            complexity: ComplexityMultipliers::default(),
            tech_stacks,
        }
    }
}

impl ProductivitySettings {
    pub fn cadence_multiplier(&self, commits_per_day: f64) -> f64 {
        self.cadence
            .iter()
            .find(|step| commits_per_day >= step.min_commits_per_day)
            .map(|step| step.multiplier)
            .unwrap_or(self.cadence_floor)
    }

    pub fn tech_multiplier(&self, stack: &str) -> f64 {
        self.tech_stacks.get(stack).copied().unwrap_or(1.0)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self
            .cadence
            .windows(2)
            .any(|w| w[0].min_commits_per_day <= w[1].min_commits_per_day)
        {
            return Err(ConfigError::InvalidLadder(
                "cadence steps must be ordered by strictly decreasing min_commits_per_day".into(),
            ));
        }
        let multipliers = self
            .cadence
            .iter()
            .map(|s| (format!("cadence.{}", s.name), s.multiplier))
            .chain([("cadence_floor".to_string(), self.cadence_floor)])
            .chain([
                ("complexity.low".to_string(), self.complexity.low),
                ("complexity.medium".to_string(), self.complexity.medium),
                ("complexity.high".to_string(), self.complexity.high),
            ])
            .chain(
                self.tech_stacks
                    .iter()
                    .map(|(k, v)| (format!("tech_stacks.{}", k), *v)),
            );
        for (name, value) in multipliers {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidMultiplier { name, value });
            }
        }
        let c = &self.complexity;
        if !(c.low < c.medium && c.medium < c.high) {
            return Err(ConfigError::InvalidLadder(
                "complexity multipliers must increase from low to high".into(),
            ));
        }
        Ok(())
    }
}

/// Blend of the collaboration signals. Absent external signals contribute 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaborationWeights {
    pub bugfix_ratio: f64,
    pub review_participation: f64,
    pub merge_conflicts: f64,
}

impl Default for CollaborationWeights {
    fn default() -> Self {
        Self {
            bugfix_ratio: 0.6,
            review_participation: 0.25,
            merge_conflicts: 0.15,
        }
    }
}

/// Blend of the maintenance signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceWeights {
    pub maintenance_ratio: f64,
    pub documentation: f64,
}

impl Default for MaintenanceWeights {
    fn default() -> Self {
        Self {
            maintenance_ratio: 0.8,
            documentation: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSettings {
    pub missing_verdicts: MissingVerdictPolicy,
    pub normalization: Normalization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    pub path: PathBuf,
    /// Weight 0 disables the repository.
    #[serde(default = "default_repository_weight")]
    pub weight: f64,
    #[serde(default)]
    pub description: String,
}

fn default_repository_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodConfig {
    pub name: String,
    pub days: u32,
    #[serde(default)]
    pub description: String,
}

fn default_tiers() -> TierLadder {
    TierLadder::new(
        vec![
            Threshold::new("excellent", 0.9),
            Threshold::new("good", 0.7),
            Threshold::new("medium", 0.5),
            Threshold::new("poor", 0.3),
        ],
        "below",
    )
}

fn default_quality_levels() -> TierLadder {
    TierLadder::new(
        vec![
            Threshold::new("excellent", 0.85),
            Threshold::new("good", 0.7),
            Threshold::new("medium", 0.5),
        ],
        "poor",
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ai: AiSettings,
    pub git: GitSettings,
    pub weights: DimensionWeights,
    /// Performance tiers for composite scores.
    pub tiers: TierLadder,
    /// Labels for the quality dimension.
    pub quality_levels: TierLadder,
    pub productivity: ProductivitySettings,
    pub collaboration: CollaborationWeights,
    pub maintenance: MaintenanceWeights,
    pub scoring: ScoringSettings,
    pub repositories: Vec<RepositoryConfig>,
    /// Display name to email addresses.
    pub employees: BTreeMap<String, Vec<String>>,
    pub periods: Vec<PeriodConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ai: AiSettings::default(),
            git: GitSettings::default(),
            weights: DimensionWeights::default(),
            tiers: default_tiers(),
            quality_levels: default_quality_levels(),
            productivity: ProductivitySettings::default(),
            collaboration: CollaborationWeights::default(),
            maintenance: MaintenanceWeights::default(),
            scoring: ScoringSettings::default(),
            repositories: Vec::new(),
            employees: BTreeMap::new(),
            periods: Vec::new(),
        }
    }
}

impl Config {
    /// Read and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;

        // Relative repository and cache paths are resolved against the config file.
        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            for repo in &mut config.repositories {
                if repo.path.is_relative() {
                    repo.path = base.join(&repo.path);
                }
            }
            if config.ai.cache_dir.is_relative() {
                config.ai.cache_dir = base.join(&config.ai.cache_dir);
            }
        }
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        validate_blend(
            "Collaboration",
            &[
                ("bugfix_ratio", self.collaboration.bugfix_ratio),
                ("review_participation", self.collaboration.review_participation),
                ("merge_conflicts", self.collaboration.merge_conflicts),
            ],
        )?;
        validate_blend(
            "Maintenance",
            &[
                ("maintenance_ratio", self.maintenance.maintenance_ratio),
                ("documentation", self.maintenance.documentation),
            ],
        )?;
        self.tiers.validate()?;
        self.quality_levels.validate()?;
        self.productivity.validate()?;
        self.ai.validate()?;

        for repo in &self.repositories {
            if !repo.weight.is_finite() || repo.weight < 0.0 {
                return Err(ConfigError::InvalidRepository {
                    name: repo.name.clone(),
                    reason: format!("weight must be non-negative (got {})", repo.weight),
                });
            }
        }
        for period in &self.periods {
            if period.days == 0 || period.days > MAX_WINDOW_DAYS {
                return Err(ConfigError::UnknownPeriod(format!(
                    "{} (period must span 1 to {} days, got {})",
                    period.name, MAX_WINDOW_DAYS, period.days
                )));
            }
        }

        IdentityResolver::new(&self.employees)?;
        Ok(())
    }

    /// Number of days for a named period. Configured periods shadow the built-in ones.
    pub fn period_days(&self, name: &str) -> Result<u32, ConfigError> {
        if let Some(period) = self.periods.iter().find(|p| p.name.eq_ignore_ascii_case(name)) {
            return Ok(period.days);
        }
        [Period::Weekly, Period::Monthly, Period::Quarterly]
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .map(|p| p.days())
            .ok_or_else(|| ConfigError::UnknownPeriod(name.to_string()))
    }

    /// Repositories with a non-zero weight.
    pub fn active_repositories(&self) -> impl Iterator<Item = &RepositoryConfig> {
        self.repositories.iter().filter(|r| r.weight > 0.0)
    }

    pub fn repository_weights(&self) -> BTreeMap<String, f64> {
        self.repositories
            .iter()
            .map(|r| (r.name.clone(), r.weight))
            .collect()
    }
}

fn validate_blend(what: &'static str, entries: &[(&str, f64)]) -> Result<(), ConfigError> {
    for (name, value) in entries {
        if !value.is_finite() || *value < 0.0 || *value > 1.0 {
            return Err(ConfigError::WeightRange {
                what,
                name: name.to_string(),
                value: *value,
            });
        }
    }
    let sum: f64 = entries.iter().map(|(_, v)| v).sum();
    if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(ConfigError::WeightSum { what, sum });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.ai.max_retries, 6);
        assert_eq!(config.ai.request_interval, 3.0);
    }

    #[test]
    fn weights_within_tolerance_are_accepted() {
        let weights = DimensionWeights {
            quality: 0.3 + 5e-7,
            ..DimensionWeights::default()
        };
        weights.validate().unwrap();
    }

    #[test]
    fn weights_off_by_more_than_tolerance_are_rejected() {
        let text = r#"
[weights]
quality = 0.4
productivity = 0.25
collaboration = 0.2
innovation = 0.15
maintenance = 0.1
"#;
        let err = Config::from_toml_str(text).unwrap_err();
        assert!(matches!(err, ConfigError::WeightSum { what: "Dimension", .. }));
    }

    #[test]
    fn negative_weight_is_rejected() {
        let weights = DimensionWeights {
            quality: -0.1,
            productivity: 0.65,
            ..DimensionWeights::default()
        };
        assert!(matches!(
            weights.validate(),
            Err(ConfigError::WeightRange { .. })
        ));
    }

    #[test]
    fn duplicate_email_is_rejected_at_load() {
        let text = r#"
[employees]
"Alice" = ["shared@example.com"]
"Bob" = ["SHARED@example.com"]
"#;
        let err = Config::from_toml_str(text).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateEmail { .. }));
    }

    #[test]
    fn parses_full_config() {
        let text = r#"
[ai]
backend = "openrouter"
model = "anthropic/claude-sonnet-4"
max_retries = 3
base_delay = 0.5

[git]
exclude_merge_commits = false
on_repository_error = "abort"

[scoring]
missing_verdicts = "exclude"
normalization = "sigmoid"

[tiers]
floor = "needs-attention"
[[tiers.levels]]
name = "top"
min_score = 0.8
[[tiers.levels]]
name = "ok"
min_score = 0.4

[productivity.tech_stacks]
rust = 1.2

[[repositories]]
name = "api"
path = "/srv/api"
weight = 0.5

[[repositories]]
name = "legacy"
path = "/srv/legacy"
weight = 0.0

[[periods]]
name = "sprint"
days = 14
"#;
        let config = Config::from_toml_str(text).unwrap();
        assert_eq!(config.ai.backend, LlmProvider::OpenRouter);
        assert_eq!(config.ai.max_retries, 3);
        assert_eq!(config.git.on_repository_error, RepositoryErrorPolicy::Abort);
        assert_eq!(config.scoring.missing_verdicts, MissingVerdictPolicy::Exclude);
        assert_eq!(config.scoring.normalization, Normalization::Sigmoid);
        assert_eq!(config.tiers.tier_for(0.5), "ok");
        assert_eq!(config.tiers.tier_for(0.1), "needs-attention");
        assert_eq!(config.productivity.tech_multiplier("rust"), 1.2);
        assert_eq!(config.productivity.tech_multiplier("cobol"), 1.0);
        assert_eq!(config.active_repositories().count(), 1);
        assert_eq!(config.period_days("sprint").unwrap(), 14);
        assert_eq!(config.period_days("Quarterly").unwrap(), 90);
        assert!(matches!(
            config.period_days("yearly"),
            Err(ConfigError::UnknownPeriod(_))
        ));
    }

    #[test]
    fn cadence_multiplier_uses_first_matching_step() {
        let p = ProductivitySettings::default();
        assert_eq!(p.cadence_multiplier(5.0), 1.2);
        assert_eq!(p.cadence_multiplier(1.0), 1.0);
        assert_eq!(p.cadence_multiplier(0.5), 0.8);
        assert_eq!(p.cadence_multiplier(0.1), 0.6);
    }

    #[test]
    fn non_monotonic_complexity_is_rejected() {
        let mut config = Config::default();
        config.productivity.complexity.high = 0.9;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLadder(_))
        ));
    }

    #[test]
    fn oversized_period_is_rejected() {
        let mut config = Config::default();
        config.periods.push(PeriodConfig {
            name: "forever".into(),
            days: 100_000_000,
            description: String::new(),
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownPeriod(_))
        ));
    }

    #[test]
    fn huge_delays_are_rejected() {
        let mut config = Config::default();
        config.ai.base_delay = 1e30;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidAi(_))));

        let mut config = Config::default();
        config.ai.request_interval = MAX_DELAY_SECS + 1.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidAi(_))));
    }

    #[test]
    fn delay_durations_never_panic() {
        let settings = AiSettings {
            base_delay: 1e30,
            request_interval: f64::NAN,
            ..AiSettings::default()
        };
        assert_eq!(settings.base_delay_duration(), Duration::from_secs_f64(MAX_DELAY_SECS));
        assert_eq!(settings.request_interval_duration(), Duration::ZERO);
    }

    #[test]
    fn zero_retries_is_rejected() {
        let mut config = Config::default();
        config.ai.max_retries = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidAi(_))));
    }

    #[test]
    fn relative_paths_resolve_against_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("efficiency.toml");
        fs::write(
            &path,
            "[[repositories]]\nname = \"web\"\npath = \"repos/web\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.repositories[0].path, dir.path().join("repos/web"));
        assert_eq!(config.ai.cache_dir, dir.path().join(".git-efficiency/cache"));
    }
}
