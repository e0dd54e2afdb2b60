//! Shared test utilities for creating test fixtures.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};

use crate::git::{FileStat, GitError, GitOps, RawCommit};
use crate::models::{CommitRecord, CommitType, Complexity, EvaluationWindow, QualityVerdict};

/// End of the window returned by [`window_days`].
pub fn window_end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap()
}

pub fn window_days(days: u32) -> EvaluationWindow {
    EvaluationWindow::ending_at(window_end(), days)
}

/// A one-file commit in repository `api`, inside a 7-day window ending at [`window_end`].
pub fn record(hash: &str, email: &str, commit_type: CommitType) -> CommitRecord {
    let message = format!("{}: change {}", commit_type, hash);
    CommitRecord {
        repository: "api".to_string(),
        hash: hash.to_string(),
        author_email: email.to_string(),
        author_name: email.split('@').next().unwrap_or(email).to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap(),
        subject: message.clone(),
        message,
        lines_added: 10,
        lines_removed: 2,
        files: vec!["src/lib.rs".to_string()],
        commit_type,
        is_merge: false,
        is_empty: false,
    }
}

pub fn verdict(hash: &str, quality_score: f64, complexity: Complexity) -> QualityVerdict {
    QualityVerdict {
        commit_hash: hash.to_string(),
        content_hash: format!("content-{}", hash),
        model: "test-model".to_string(),
        quality_score,
        complexity,
        rationale: "fixture".to_string(),
        tech_stack: "rust".to_string(),
        suggestions: Vec::new(),
    }
}

/// A single-parent commit touching `src/lib.rs` (+10/-2).
pub fn raw_commit(sha: &str, timestamp: DateTime<Utc>, message: &str) -> RawCommit {
    RawCommit {
        sha: sha.to_string(),
        parents: vec!["0000000".to_string()],
        author_name: "Dev".to_string(),
        author_email: "dev@example.com".to_string(),
        timestamp,
        message: message.to_string(),
        files: vec![FileStat {
            path: "src/lib.rs".to_string(),
            added: 10,
            removed: 2,
        }],
    }
}

/// In-memory [`GitOps`] returning fixed commits and diffs.
pub struct MockGit {
    commits: Vec<RawCommit>,
    diffs: HashMap<String, String>,
    broken: bool,
}

impl MockGit {
    pub fn new(commits: Vec<RawCommit>) -> Self {
        Self {
            commits,
            diffs: HashMap::new(),
            broken: false,
        }
    }

    /// A repository that cannot be opened.
    pub fn failing() -> Self {
        Self {
            broken: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn with_diff(mut self, sha: &str, diff: &str) -> Self {
        self.diffs.insert(sha.to_string(), diff.to_string());
        self
    }
}

impl GitOps for MockGit {
    fn verify(&self) -> Result<(), GitError> {
        if self.broken {
            Err(GitError::NotARepository("mock".to_string()))
        } else {
            Ok(())
        }
    }

    fn read_commits(
        &self,
        _since: DateTime<Utc>,
        _until: DateTime<Utc>,
    ) -> Result<Vec<RawCommit>, GitError> {
        self.verify()?;
        Ok(self.commits.clone())
    }

    fn commit_diff(&self, sha: &str) -> Result<String, GitError> {
        self.diffs
            .get(sha)
            .cloned()
            .ok_or_else(|| GitError::CommandFailed(format!("unknown revision {}", sha)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_falls_inside_fixture_window() {
        let r = record("abc", "dev@example.com", CommitType::Bugfix);
        assert!(window_days(7).contains(r.timestamp));
        assert_eq!(r.author_name, "dev");
        assert_eq!(r.message, "bugfix: change abc");
    }

    #[test]
    fn mock_git_serves_diffs() {
        let git = MockGit::new(Vec::new()).with_diff("abc", "+x");
        assert_eq!(git.commit_diff("abc").unwrap(), "+x");
        assert!(git.commit_diff("zzz").is_err());
        assert!(MockGit::failing().verify().is_err());
    }
}
