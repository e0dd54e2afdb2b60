//! AI quality assessment of individual commits.
//!
//! The [`Assessor`] turns a commit and its diff into a [`QualityVerdict`]:
//! cache lookup by content hash and model, then a rate-limited, retried
//! request to the configured backend, then a write-once cache insert.

pub mod cache;
pub mod parser;
pub mod prompt;
pub mod rate_limit;
pub mod retry;

pub use cache::{content_hash, CacheKey, FileVerdictStore, MemoryVerdictStore, VerdictStore};
pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use log::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::AiSettings;
use crate::extract::stack::dominant_stack;
use crate::git::GitOps;
use crate::llm::{LlmClient, LlmError};
use crate::models::{CommitRecord, QualityVerdict};
use crate::utils::short_sha;

use cache::InsertOutcome;
use parser::ParseError;
use retry::{Attempt, RetryError};

/// Why a commit ended up without a verdict.
#[derive(Debug, thiserror::Error)]
pub enum AssessError {
    #[error("AI unavailable after {attempts} attempt(s): {last_error}")]
    Unavailable { attempts: u32, last_error: String },
    #[error("Malformed AI response: {0}")]
    ResponseFormat(String),
    #[error("Assessment cancelled")]
    Cancelled,
    #[error("Could not read diff: {0}")]
    Diff(String),
}

enum AttemptError {
    Llm(LlmError),
    Format(ParseError),
    Cancelled,
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Llm(e) => write!(f, "{}", e),
            Self::Format(e) => write!(f, "{}", e),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Verdicts and failures for a batch of commits.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Keyed by commit hash.
    pub verdicts: HashMap<String, QualityVerdict>,
    /// Commit hash and cause, ordered by hash.
    pub failures: Vec<(String, AssessError)>,
    pub cache_hits: usize,
}

/// Produces quality verdicts for commits.
pub struct Assessor {
    client: Arc<dyn LlmClient>,
    store: Arc<dyn VerdictStore>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    model: String,
    max_diff_chars: usize,
    max_parallel: usize,
    cancel: CancelToken,
}

impl Assessor {
    pub fn new(
        client: Arc<dyn LlmClient>,
        store: Arc<dyn VerdictStore>,
        model: impl Into<String>,
        settings: &AiSettings,
    ) -> Self {
        Self {
            client,
            store,
            limiter: Arc::new(RateLimiter::new(settings.request_interval_duration())),
            retry: RetryPolicy::from_settings(settings),
            model: model.into(),
            max_diff_chars: settings.max_diff_chars,
            max_parallel: settings.max_parallel.max(1),
            cancel: CancelToken::new(),
        }
    }

    /// Share a rate limiter with other assessors in the process.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Set maximum parallel commit assessments.
    pub fn with_parallelism(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Assess one commit. Served from the cache when possible.
    pub fn assess(&self, commit: &CommitRecord, diff: &str) -> Result<QualityVerdict, AssessError> {
        self.assess_tracked(commit, diff).map(|(verdict, _)| verdict)
    }

    /// Like [`Assessor::assess`], also reporting whether the cache answered.
    fn assess_tracked(
        &self,
        commit: &CommitRecord,
        diff: &str,
    ) -> Result<(QualityVerdict, bool), AssessError> {
        let key = CacheKey::new(content_hash(&commit.hash, &commit.message, diff), &self.model);

        if let Some(verdict) = self.store.get(&key) {
            debug!("{}: cache hit", short_sha(&commit.hash));
            return Ok((verdict, true));
        }
        if self.cancel.is_cancelled() {
            return Err(AssessError::Cancelled);
        }

        let tech_stack = dominant_stack(commit.files.iter().map(String::as_str));
        let prompt = prompt::build_quality_prompt(commit, diff, tech_stack, self.max_diff_chars);

        let parsed = self
            .retry
            .run(|attempt| self.attempt(&prompt, attempt), |d| self.cancel.sleep(d))
            .map_err(|e| self.classify_failure(commit, e))?;

        let verdict = QualityVerdict {
            commit_hash: commit.hash.clone(),
            content_hash: key.content_hash.clone(),
            model: self.model.clone(),
            quality_score: parsed.quality_score,
            complexity: parsed.complexity,
            rationale: parsed.rationale,
            tech_stack: tech_stack.to_string(),
            suggestions: parsed.suggestions,
        };

        match self.store.insert(&key, &verdict) {
            Ok(InsertOutcome::Inserted) => Ok((verdict, false)),
            // Another worker got there first; the stored verdict wins.
            Ok(InsertOutcome::AlreadyPresent) => {
                Ok((self.store.get(&key).unwrap_or(verdict), false))
            }
            Err(e) => {
                warn!("{}: failed to cache verdict: {}", short_sha(&commit.hash), e);
                Ok((verdict, false))
            }
        }
    }

    fn attempt(&self, prompt: &str, attempt: u32) -> Attempt<parser::ParsedAssessment, AttemptError> {
        if !self.limiter.acquire(&self.cancel) {
            return Attempt::Fatal(AttemptError::Cancelled);
        }
        match self.client.complete(prompt) {
            Ok(response) => match parser::parse_quality_response(&response) {
                Ok(parsed) => Attempt::Success(parsed),
                Err(e) => Attempt::Fatal(AttemptError::Format(e)),
            },
            Err(e) if e.is_transient() => {
                debug!("Transient AI error on attempt {}: {}", attempt, e);
                Attempt::Transient(AttemptError::Llm(e))
            }
            Err(e) => Attempt::Fatal(AttemptError::Llm(e)),
        }
    }

    fn classify_failure(&self, commit: &CommitRecord, error: RetryError<AttemptError>) -> AssessError {
        let sha = short_sha(&commit.hash);
        let error = match error {
            RetryError::Exhausted { attempts, last } => AssessError::Unavailable {
                attempts,
                last_error: last.to_string(),
            },
            RetryError::Aborted {
                error: AttemptError::Cancelled,
                ..
            } => AssessError::Cancelled,
            RetryError::Aborted {
                error: AttemptError::Format(e),
                ..
            } => AssessError::ResponseFormat(e.to_string()),
            // The backend answered, but not with a usable completion.
            RetryError::Aborted {
                error: AttemptError::Llm(e @ LlmError::InvalidResponse(_)),
                ..
            } => AssessError::ResponseFormat(e.to_string()),
            RetryError::Aborted {
                attempts,
                error: AttemptError::Llm(e),
            } => AssessError::Unavailable {
                attempts,
                last_error: e.to_string(),
            },
        };
        if !matches!(error, AssessError::Cancelled) {
            warn!("{}: {}", sha, error);
        }
        error
    }

    /// Assess every commit, running up to `max_parallel` requests at once.
    ///
    /// Diffs are read up front on the calling thread. Failures never abort the
    /// batch; each failed commit is reported with its cause.
    pub fn assess_all(&self, git: &dyn GitOps, commits: &[CommitRecord]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        let mut work: Vec<(&CommitRecord, String)> = Vec::with_capacity(commits.len());
        for commit in commits {
            match git.commit_diff(&commit.hash) {
                Ok(diff) => work.push((commit, diff)),
                Err(e) => {
                    warn!("{}: could not read diff: {}", short_sha(&commit.hash), e);
                    outcome
                        .failures
                        .push((commit.hash.clone(), AssessError::Diff(e.to_string())));
                }
            }
        }

        let total = work.len();
        info!(
            "Assessing {} commits with {} ({} parallel)...",
            total, self.model, self.max_parallel
        );

        let next = AtomicUsize::new(0);
        let results = Mutex::new(Vec::with_capacity(total));
        let workers = self.max_parallel.min(total.max(1));

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some((commit, diff)) = work.get(index) else {
                        break;
                    };
                    debug!(
                        "  [{}/{}] {} {}",
                        index + 1,
                        total,
                        short_sha(&commit.hash),
                        commit.subject
                    );
                    let result = self.assess_tracked(commit, diff);
                    results
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push((commit.hash.clone(), result));
                });
            }
        });

        for (hash, result) in results.into_inner().unwrap_or_else(|e| e.into_inner()) {
            match result {
                Ok((verdict, hit)) => {
                    if hit {
                        outcome.cache_hits += 1;
                    }
                    outcome.verdicts.insert(hash, verdict);
                }
                Err(e) => outcome.failures.push((hash, e)),
            }
        }
        outcome.failures.sort_by(|a, b| a.0.cmp(&b.0));
        outcome
    }
}
