use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, TimeZone, Utc};
use log::trace;

/// Errors from git operations
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("Git command failed: {0}")]
    CommandFailed(String),
    #[error("Failed to execute git: {0}")]
    ExecutionFailed(#[from] std::io::Error),
    #[error("Failed to parse git output: {0}")]
    ParseError(String),
    #[error("Not a git repository: {0}")]
    NotARepository(String),
}

const RECORD_SEP: char = '\x1e';
const FIELD_SEP: char = '\x1f';
const HEADER_END: char = '\x1d';
const LOG_FORMAT: &str = "--format=%x1e%H%x1f%P%x1f%an%x1f%ae%x1f%ct%x1f%B%x1d";

/// Lines changed in one file by one commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub path: String,
    pub added: u64,
    pub removed: u64,
}

/// A commit exactly as git reports it, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCommit {
    pub sha: String,
    pub parents: Vec<String>,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub files: Vec<FileStat>,
}

/// Trait for git operations - allows mocking in tests
pub trait GitOps {
    /// Check that the location is a readable repository
    fn verify(&self) -> Result<(), GitError>;

    /// Read commits reachable from HEAD with a commit time in [since, until]
    fn read_commits(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<RawCommit>, GitError>;

    /// Get the patch text of a single commit
    fn commit_diff(&self, sha: &str) -> Result<String, GitError>;
}

/// Real implementation of GitOps that calls git commands
pub struct Git {
    /// Working directory for git commands
    work_dir: Option<PathBuf>,
}

impl Git {
    pub fn new() -> Self {
        Self { work_dir: None }
    }

    pub fn with_work_dir(work_dir: impl AsRef<Path>) -> Self {
        Self {
            work_dir: Some(work_dir.as_ref().to_path_buf()),
        }
    }

    fn location(&self) -> String {
        self.work_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ".".to_string())
    }

    fn run_git(&self, args: &[&str]) -> Result<String, GitError> {
        let mut cmd = Command::new("git");
        if let Some(ref dir) = self.work_dir {
            cmd.current_dir(dir);
        }
        cmd.args(args);
        trace!("git {}", args.join(" "));

        let output = cmd.output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::CommandFailed(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Numstat of a merge commit against its first parent.
    fn first_parent_stats(&self, parent: &str, sha: &str) -> Result<Vec<FileStat>, GitError> {
        let output = self.run_git(&["diff", "--numstat", "--no-renames", parent, sha])?;
        Ok(output.lines().filter_map(parse_numstat_line).collect())
    }
}

impl Default for Git {
    fn default() -> Self {
        Self::new()
    }
}

impl GitOps for Git {
    fn verify(&self) -> Result<(), GitError> {
        if let Some(ref dir) = self.work_dir {
            if !dir.is_dir() {
                return Err(GitError::NotARepository(self.location()));
            }
        }
        self.run_git(&["rev-parse", "--git-dir"])
            .map(|_| ())
            .map_err(|_| GitError::NotARepository(self.location()))
    }

    fn read_commits(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<RawCommit>, GitError> {
        self.verify()?;

        // An empty repository has no HEAD and therefore no history to read.
        if self.run_git(&["rev-parse", "--verify", "HEAD"]).is_err() {
            return Ok(Vec::new());
        }

        let since_arg = format!("--since={}", since.to_rfc3339());
        let until_arg = format!("--until={}", until.to_rfc3339());
        let output = self.run_git(&[
            "log",
            "--no-color",
            "--numstat",
            "--no-renames",
            LOG_FORMAT,
            &since_arg,
            &until_arg,
            "HEAD",
        ])?;

        let mut commits = parse_log(&output)?;

        // git log does not report file stats for merges; diff them against the first parent.
        for commit in commits.iter_mut().filter(|c| c.parents.len() > 1) {
            commit.files = self.first_parent_stats(&commit.parents[0], &commit.sha)?;
        }

        Ok(commits)
    }

    fn commit_diff(&self, sha: &str) -> Result<String, GitError> {
        self.run_git(&["show", "--format=", "--patch", "--no-color", sha])
    }
}

/// Parse the output of `git log --numstat` produced with [`LOG_FORMAT`].
fn parse_log(output: &str) -> Result<Vec<RawCommit>, GitError> {
    let mut commits = Vec::new();

    for record in output.split(RECORD_SEP).filter(|r| !r.trim().is_empty()) {
        let (header, stats) = record
            .split_once(HEADER_END)
            .ok_or_else(|| GitError::ParseError("unterminated commit header".to_string()))?;

        let fields: Vec<&str> = header.splitn(6, FIELD_SEP).collect();
        if fields.len() != 6 {
            return Err(GitError::ParseError(format!(
                "expected 6 header fields, got {}",
                fields.len()
            )));
        }

        let seconds: i64 = fields[4]
            .trim()
            .parse()
            .map_err(|_| GitError::ParseError(format!("bad commit time '{}'", fields[4])))?;
        let timestamp = Utc
            .timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(|| GitError::ParseError(format!("commit time out of range: {}", seconds)))?;

        commits.push(RawCommit {
            sha: fields[0].trim().to_string(),
            parents: fields[1].split_whitespace().map(String::from).collect(),
            author_name: fields[2].to_string(),
            author_email: fields[3].to_string(),
            timestamp,
            message: fields[5].trim().to_string(),
            files: stats.lines().filter_map(parse_numstat_line).collect(),
        });
    }

    Ok(commits)
}

/// Parse `<added>\t<removed>\t<path>`; binary files report `-` and count as zero.
fn parse_numstat_line(line: &str) -> Option<FileStat> {
    let mut parts = line.splitn(3, '\t');
    let added = parts.next()?.trim();
    let removed = parts.next()?;
    let path = parts.next()?.trim();
    if path.is_empty() {
        return None;
    }
    Some(FileStat {
        path: rename_target(path),
        added: added.parse().unwrap_or(0),
        removed: removed.trim().parse().unwrap_or(0),
    })
}

/// Destination path of a rename entry (`src/{old.rs => new.rs}` or `a.rs => b.rs`).
fn rename_target(path: &str) -> String {
    if let (Some(open), Some(close)) = (path.find('{'), path.rfind('}')) {
        if let Some((_, new)) = path[open + 1..close].split_once(" => ") {
            let joined = format!("{}{}{}", &path[..open], new, &path[close + 1..]);
            return joined.replace("//", "/").trim_start_matches('/').to_string();
        }
    }
    match path.split_once(" => ") {
        Some((_, new)) => new.to_string(),
        None => path.to_string(),
    }
}
