//! One evaluation run: extract, assess, score, report.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::assess::{AssessError, Assessor, FileVerdictStore};
use crate::cancel::CancelToken;
use crate::cli::{Command, EvaluateArgs};
use crate::config::{Config, ConfigError, RepositoryConfig, RepositoryErrorPolicy};
use crate::engine::{CollaborationSignals, Engine, EngineInput};
use crate::extract::Extractor;
use crate::git::{Git, GitError, GitOps};
use crate::identity::IdentityResolver;
use crate::llm::{LlmConfig, LlmError};
use crate::models::{CommitRecord, EvaluationWindow, Period, MAX_WINDOW_DAYS};
use crate::report::{self, Degradation, EvaluationReport, SkippedRepository};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    User(String),
}

/// Opens configured repositories.
pub trait RepositoryProvider {
    fn open(&self, repository: &RepositoryConfig) -> Box<dyn GitOps>;
}

/// Repositories on the local filesystem, read with the `git` CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCli;

impl RepositoryProvider for GitCli {
    fn open(&self, repository: &RepositoryConfig) -> Box<dyn GitOps> {
        Box::new(Git::with_work_dir(&repository.path))
    }
}

impl<F> RepositoryProvider for F
where
    F: Fn(&RepositoryConfig) -> Box<dyn GitOps>,
{
    fn open(&self, repository: &RepositoryConfig) -> Box<dyn GitOps> {
        self(repository)
    }
}

pub struct App<R: RepositoryProvider> {
    config: Config,
    resolver: IdentityResolver,
    repositories: R,
}

impl App<GitCli> {
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        Self::new(config, GitCli)
    }
}

impl<R: RepositoryProvider> App<R> {
    pub fn new(config: Config, repositories: R) -> Result<Self, AppError> {
        let resolver = IdentityResolver::new(&config.employees)?;
        Ok(Self {
            config,
            resolver,
            repositories,
        })
    }

    pub fn run(&self, command: Command) -> Result<(), AppError> {
        match command {
            Command::Evaluate(args) => self.handle_evaluate(args),
            Command::Repos => self.handle_repos(),
            Command::Employees => self.handle_employees(),
            Command::Check => self.handle_check(),
        }
    }

    fn handle_evaluate(&self, args: EvaluateArgs) -> Result<(), AppError> {
        if self.config.active_repositories().next().is_none() {
            return Err(AppError::User(
                "No active repositories configured; add a [[repositories]] entry".to_string(),
            ));
        }

        let (label, window) = self.resolve_window(&args, Utc::now())?;
        let signals = match &args.signals {
            Some(path) => load_signals(path)?,
            None => BTreeMap::new(),
        };

        let mut cancel = CancelToken::new();
        if let Some(secs) = args.timeout {
            cancel = cancel.with_timeout(Duration::from_secs(secs));
        }
        cancel.register_ctrlc();

        let assessor = if args.no_ai || !self.config.ai.enabled {
            info!("AI assessment disabled; scoring without verdicts");
            None
        } else {
            Some(self.build_assessor(&args, cancel)?)
        };

        info!(
            "Evaluating {} ({} .. {})",
            label,
            window.start.format("%Y-%m-%d"),
            window.end.format("%Y-%m-%d")
        );
        let report = self.evaluate(&label, window, assessor.as_ref(), &signals)?;
        let text = report::render(&report, args.format)?;

        match &args.output {
            Some(path) => {
                fs::write(path, format!("{}\n", text)).map_err(|source| AppError::Io {
                    path: path.clone(),
                    source,
                })?;
                info!("Report written to {}", path.display());
            }
            None => println!("{}", text),
        }

        if report.degradation.is_degraded() {
            warn!(
                "{} of {} commits scored without a verdict",
                report.degradation.missing_verdicts, report.degradation.total_commits
            );
        }
        Ok(())
    }

    /// Period label and window for the requested run. Defaults to weekly.
    pub fn resolve_window(
        &self,
        args: &EvaluateArgs,
        now: DateTime<Utc>,
    ) -> Result<(String, EvaluationWindow), AppError> {
        let (label, days) = match (&args.period, args.days) {
            (_, Some(days)) if days == 0 || days > MAX_WINDOW_DAYS => {
                return Err(AppError::User(format!(
                    "--days must be between 1 and {} (got {})",
                    MAX_WINDOW_DAYS, days
                )));
            }
            (_, Some(days)) => (format!("{} days", days), days),
            (Some(name), None) => (name.to_lowercase(), self.config.period_days(name)?),
            (None, None) => (Period::Weekly.name().to_string(), Period::Weekly.days()),
        };
        Ok((label, EvaluationWindow::ending_at(now, days)))
    }

    fn build_assessor(&self, args: &EvaluateArgs, cancel: CancelToken) -> Result<Assessor, AppError> {
        let llm = LlmConfig::from_settings(&self.config.ai)
            .with_env()
            .with_overrides(args.backend, args.model.clone());
        let client = llm.create_client()?;
        let cache_dir = args
            .cache_dir
            .clone()
            .unwrap_or_else(|| self.config.ai.cache_dir.clone());
        info!(
            "AI backend: {} ({}), cache: {}",
            llm.provider,
            llm.model_name(),
            cache_dir.display()
        );

        let store = Arc::new(FileVerdictStore::new(cache_dir));
        Ok(Assessor::new(client, store, llm.model_name(), &self.config.ai).with_cancel_token(cancel))
    }

    /// Run the pipeline over every active repository.
    ///
    /// Without an assessor every commit is scored as a missing verdict.
    pub fn evaluate(
        &self,
        period: &str,
        window: EvaluationWindow,
        assessor: Option<&Assessor>,
        signals: &BTreeMap<String, CollaborationSignals>,
    ) -> Result<EvaluationReport, AppError> {
        let extractor = Extractor::new(&self.config.git);
        let mut degradation = Degradation::default();
        let mut commits: Vec<CommitRecord> = Vec::new();
        let mut verdicts = HashMap::new();
        let mut cache_hits = 0;

        for repo in self.config.active_repositories() {
            let git = self.repositories.open(repo);
            let extracted = git
                .verify()
                .and_then(|_| extractor.extract(&repo.name, git.as_ref(), &window));
            let records = match extracted {
                Ok(records) => records,
                Err(e) => match self.config.git.on_repository_error {
                    RepositoryErrorPolicy::Abort => return Err(e.into()),
                    RepositoryErrorPolicy::Skip => {
                        warn!("Skipping repository {}: {}", repo.name, e);
                        degradation.skipped_repositories.push(SkippedRepository {
                            name: repo.name.clone(),
                            reason: e.to_string(),
                        });
                        continue;
                    }
                },
            };
            info!("{}: {} commits in window", repo.name, records.len());
            let records: Vec<CommitRecord> = records.iter().collect();

            match assessor {
                Some(assessor) => {
                    let outcome = assessor.assess_all(git.as_ref(), &records);
                    cache_hits += outcome.cache_hits;
                    for (_, error) in &outcome.failures {
                        match error {
                            AssessError::Unavailable { .. } | AssessError::Diff(_) => {
                                degradation.unavailable += 1
                            }
                            AssessError::ResponseFormat(_) => degradation.malformed += 1,
                            AssessError::Cancelled => degradation.cancelled += 1,
                        }
                    }
                    verdicts.extend(outcome.verdicts);
                }
                None => degradation.ai_disabled += records.len(),
            }
            commits.extend(records);
        }

        if assessor.is_some() {
            info!("{} verdict(s) served from cache", cache_hits);
        }

        let evaluation = Engine::new(&self.config, &self.resolver).evaluate(&EngineInput {
            window,
            commits: &commits,
            verdicts: &verdicts,
            signals,
        });

        degradation.total_commits = commits.len();
        degradation.assessed_commits = commits
            .iter()
            .filter(|c| verdicts.contains_key(&c.hash))
            .count();
        degradation.missing_verdicts = degradation.total_commits - degradation.assessed_commits;
        degradation.degraded_contributors = evaluation
            .contributors
            .iter()
            .filter(|c| c.raw.missing_verdicts > 0)
            .map(|c| c.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Ok(EvaluationReport::new(
            period,
            assessor.map(|a| a.model().to_string()),
            evaluation,
            &self.config.tiers,
            degradation,
        ))
    }

    fn handle_repos(&self) -> Result<(), AppError> {
        if self.config.repositories.is_empty() {
            println!("No repositories configured.");
            return Ok(());
        }
        for repo in &self.config.repositories {
            let status = if repo.weight > 0.0 { "" } else { " (disabled)" };
            println!(
                "{}  weight {:.2}  {}{}",
                repo.name,
                repo.weight,
                repo.path.display(),
                status
            );
            if !repo.description.is_empty() {
                println!("    {}", repo.description);
            }
        }
        Ok(())
    }

    fn handle_employees(&self) -> Result<(), AppError> {
        let contributors = self.resolver.contributors();
        if contributors.is_empty() {
            println!("No employees configured; contributors will be identified by email.");
            return Ok(());
        }
        for contributor in contributors {
            println!("{}: {}", contributor.name, contributor.emails.join(", "));
        }
        Ok(())
    }

    fn handle_check(&self) -> Result<(), AppError> {
        println!(
            "Configuration OK: {} repositories ({} active), {} employees",
            self.config.repositories.len(),
            self.config.active_repositories().count(),
            self.resolver.contributors().len()
        );

        let mut failed = 0;
        for repo in self.config.active_repositories() {
            match self.repositories.open(repo).verify() {
                Ok(()) => println!("  {}: ok", repo.name),
                Err(e) => {
                    failed += 1;
                    println!("  {}: {}", repo.name, e);
                }
            }
        }

        if self.config.ai.enabled {
            let llm = LlmConfig::from_settings(&self.config.ai).with_env();
            let key = if llm.api_key.is_some() {
                "found".to_string()
            } else {
                format!("missing (set {})", llm.provider.api_key_var())
            };
            println!("AI: {} ({}), API key {}", llm.provider, llm.model_name(), key);
        } else {
            println!("AI: disabled");
        }

        if failed > 0 {
            return Err(AppError::User(format!(
                "{} repository check(s) failed",
                failed
            )));
        }
        Ok(())
    }
}

/// Read per-contributor collaboration signals from a JSON object keyed by
/// contributor display name.
pub fn load_signals(path: &Path) -> Result<BTreeMap<String, CollaborationSignals>, AppError> {
    let text = fs::read_to_string(path).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}
