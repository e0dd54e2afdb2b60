use std::fmt::{Display, Formatter};

use chrono::{DateTime, Duration, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Commit category derived from the commit message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitType {
    Feature,
    Bugfix,
    Refactor,
    Docs,
    Test,
    Other,
}

impl CommitType {
    pub fn all() -> &'static [CommitType] {
        &[
            CommitType::Feature,
            CommitType::Bugfix,
            CommitType::Refactor,
            CommitType::Docs,
            CommitType::Test,
            CommitType::Other,
        ]
    }

    /// Bugfix and refactor commits count as maintenance work.
    pub fn is_maintenance(&self) -> bool {
        matches!(self, CommitType::Bugfix | CommitType::Refactor)
    }
}

impl Display for CommitType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Feature => "feature",
            Self::Bugfix => "bugfix",
            Self::Refactor => "refactor",
            Self::Docs => "docs",
            Self::Test => "test",
            Self::Other => "other",
        };
        write!(f, "{}", name)
    }
}

/// A single commit as read from a repository, normalized for scoring.
///
/// Records are created once by the extractor and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Name of the repository the commit was read from.
    pub repository: String,
    pub hash: String,
    pub author_email: String,
    pub author_name: String,
    pub timestamp: DateTime<Utc>,
    /// First line of the commit message
    pub subject: String,
    /// Full commit message
    pub message: String,
    pub lines_added: u64,
    pub lines_removed: u64,
    /// Paths touched by the commit
    pub files: Vec<String>,
    pub commit_type: CommitType,
    pub is_merge: bool,
    pub is_empty: bool,
}

impl CommitRecord {
    pub fn files_changed(&self) -> usize {
        self.files.len()
    }

    /// Lines added minus lines removed.
    pub fn net_lines(&self) -> i64 {
        self.lines_added as i64 - self.lines_removed as i64
    }
}

/// Complexity tier reported by the AI assessor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    /// Map a 0-100 complexity score onto a tier.
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Complexity::High
        } else if score >= 40.0 {
            Complexity::Medium
        } else {
            Complexity::Low
        }
    }
}

impl Display for Complexity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Unknown complexity tier: '{}'", s)),
        }
    }
}

/// AI judgment about a single commit.
///
/// At most one verdict exists per (content hash, model) pair; once cached it is
/// never replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityVerdict {
    pub commit_hash: String,
    pub content_hash: String,
    pub model: String,
    /// Quality in [0, 1]
    pub quality_score: f64,
    pub complexity: Complexity,
    pub rationale: String,
    pub tech_stack: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Canonical identity of a person contributing commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub name: String,
    /// Lowercased email addresses, sorted
    pub emails: Vec<String>,
    /// False for identities synthesized from an unknown email
    pub mapped: bool,
}

impl Contributor {
    pub fn unmapped(email: &str) -> Self {
        let email = email.trim().to_lowercase();
        Self {
            name: email.clone(),
            emails: vec![email],
            mapped: false,
        }
    }
}

/// Named evaluation period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Weekly,
    Monthly,
    Quarterly,
}

impl Period {
    pub fn days(&self) -> u32 {
        match self {
            Period::Weekly => 7,
            Period::Monthly => 30,
            Period::Quarterly => 90,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
            Period::Quarterly => "quarterly",
        }
    }
}

/// Longest evaluation window accepted from users, about a century.
pub const MAX_WINDOW_DAYS: u32 = 36_525;

/// Inclusive time range commits are aggregated over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl EvaluationWindow {
    /// Window of `days` days ending at `end`. The start saturates at the
    /// earliest representable time.
    pub fn ending_at(end: DateTime<Utc>, days: u32) -> Self {
        let start = end
            .checked_sub_signed(Duration::days(i64::from(days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { start, end }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Length of the window in (fractional) days, never below one second.
    pub fn days(&self) -> f64 {
        let seconds = (self.end - self.start).num_seconds().max(1) as f64;
        seconds / 86_400.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_from_days() {
        let end = Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap();
        let window = EvaluationWindow::ending_at(end, 7);
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert!((window.days() - 7.0).abs() < 1e-9);
        assert!(window.contains(window.start));
        assert!(window.contains(end));
        assert!(!window.contains(end + Duration::seconds(1)));
    }

    #[test]
    fn oversized_window_saturates() {
        let end = Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap();
        let window = EvaluationWindow::ending_at(end, u32::MAX);
        assert_eq!(window.start, DateTime::<Utc>::MIN_UTC);
        assert!(window.contains(end));
        assert!(window.days() > f64::from(MAX_WINDOW_DAYS));
    }

    #[test]
    fn period_days() {
        assert_eq!(Period::Weekly.days(), 7);
        assert_eq!(Period::Monthly.days(), 30);
        assert_eq!(Period::Quarterly.days(), 90);
    }

    #[test]
    fn complexity_from_score() {
        assert_eq!(Complexity::from_score(10.0), Complexity::Low);
        assert_eq!(Complexity::from_score(40.0), Complexity::Medium);
        assert_eq!(Complexity::from_score(85.0), Complexity::High);
        assert_eq!("HIGH".parse::<Complexity>().unwrap(), Complexity::High);
        assert!("huge".parse::<Complexity>().is_err());
    }

    #[test]
    fn unmapped_contributor_uses_lowercased_email() {
        let c = Contributor::unmapped("  Dev@Example.COM ");
        assert_eq!(c.name, "dev@example.com");
        assert_eq!(c.emails, vec!["dev@example.com".to_string()]);
        assert!(!c.mapped);
    }

    #[test]
    fn commit_type_display() {
        assert_eq!(CommitType::Bugfix.to_string(), "bugfix");
        assert!(CommitType::Refactor.is_maintenance());
        assert!(!CommitType::Docs.is_maintenance());
    }
}
