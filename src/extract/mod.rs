//! Commit extraction: raw git history to normalized [`CommitRecord`]s.

pub mod classify;
pub mod stack;

use std::sync::Arc;

use log::debug;

use crate::config::GitSettings;
use crate::git::{GitError, GitOps, RawCommit};
use crate::models::{CommitRecord, EvaluationWindow};

pub use classify::{CommitClassifier, KeywordClassifier};

/// Reads commit facts from a repository for one evaluation window.
#[derive(Clone)]
pub struct Extractor {
    classifier: Arc<dyn CommitClassifier>,
    exclude_merges: bool,
    exclude_empty: bool,
    max_commits: Option<usize>,
}

impl Extractor {
    pub fn new(settings: &GitSettings) -> Self {
        Self {
            classifier: Arc::new(KeywordClassifier::new()),
            exclude_merges: settings.exclude_merge_commits,
            exclude_empty: settings.exclude_empty_commits,
            max_commits: settings.max_commits,
        }
    }

    /// Replace the default keyword classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn CommitClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Read the commits of `repository` inside `window`.
    ///
    /// The history is read once; the returned [`CommitRecords`] can be iterated
    /// any number of times and always yields the same sequence.
    pub fn extract(
        &self,
        repository: &str,
        git: &dyn GitOps,
        window: &EvaluationWindow,
    ) -> Result<CommitRecords, GitError> {
        let mut raw: Vec<RawCommit> = git
            .read_commits(window.start, window.end)?
            .into_iter()
            .filter(|c| window.contains(c.timestamp))
            .filter(|c| !(self.exclude_merges && c.parents.len() > 1))
            .filter(|c| !(self.exclude_empty && c.files.is_empty()))
            .collect();

        raw.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.sha.cmp(&b.sha)));

        if let Some(max) = self.max_commits {
            if raw.len() > max {
                let dropped = raw.len() - max;
                debug!(
                    "{}: keeping newest {} of {} commits",
                    repository,
                    max,
                    raw.len()
                );
                raw.drain(..dropped);
            }
        }

        debug!("{}: {} commits in window", repository, raw.len());

        Ok(CommitRecords {
            repository: repository.to_string(),
            raw,
            classifier: Arc::clone(&self.classifier),
        })
    }
}

/// Commits of one repository, ordered by timestamp then hash.
pub struct CommitRecords {
    repository: String,
    raw: Vec<RawCommit>,
    classifier: Arc<dyn CommitClassifier>,
}

impl CommitRecords {
    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Lazily build records. Each call starts from the oldest commit.
    pub fn iter(&self) -> impl Iterator<Item = CommitRecord> + '_ {
        self.raw.iter().map(move |c| self.to_record(c))
    }

    fn to_record(&self, raw: &RawCommit) -> CommitRecord {
        CommitRecord {
            repository: self.repository.clone(),
            hash: raw.sha.clone(),
            author_email: raw.author_email.clone(),
            author_name: raw.author_name.clone(),
            timestamp: raw.timestamp,
            subject: raw.message.lines().next().unwrap_or("").to_string(),
            message: raw.message.clone(),
            lines_added: raw.files.iter().map(|f| f.added).sum(),
            lines_removed: raw.files.iter().map(|f| f.removed).sum(),
            files: raw.files.iter().map(|f| f.path.clone()).collect(),
            commit_type: self.classifier.classify(&raw.message),
            is_merge: raw.parents.len() > 1,
            is_empty: raw.files.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CommitType;
    use crate::test_utils::{raw_commit, MockGit};
    use chrono::{Duration, TimeZone, Utc};

    fn window() -> EvaluationWindow {
        EvaluationWindow::ending_at(Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap(), 7)
    }

    fn at(hours: i64) -> chrono::DateTime<Utc> {
        window().start + Duration::hours(hours)
    }

    #[test]
    fn yields_commits_in_timestamp_then_hash_order() {
        let git = MockGit::new(vec![
            raw_commit("ccc", at(5), "fix: later"),
            raw_commit("bbb", at(1), "feat: tie b"),
            raw_commit("aaa", at(1), "feat: tie a"),
        ]);
        let records = Extractor::new(&GitSettings::default())
            .extract("api", &git, &window())
            .unwrap();

        let hashes: Vec<String> = records.iter().map(|r| r.hash).collect();
        assert_eq!(hashes, vec!["aaa", "bbb", "ccc"]);
    }

    #[test]
    fn iteration_is_restartable() {
        let git = MockGit::new(vec![
            raw_commit("aaa", at(1), "feat: one"),
            raw_commit("bbb", at(2), "fix: two"),
        ]);
        let records = Extractor::new(&GitSettings::default())
            .extract("api", &git, &window())
            .unwrap();

        let first: Vec<CommitRecord> = records.iter().collect();
        let second: Vec<CommitRecord> = records.iter().collect();
        assert_eq!(first, second);
        assert_eq!(first[1].commit_type, CommitType::Bugfix);
        assert_eq!(first[0].repository, "api");
    }

    #[test]
    fn drops_commits_outside_window() {
        let git = MockGit::new(vec![
            raw_commit("old", window().start - Duration::seconds(1), "feat: old"),
            raw_commit("new", at(3), "feat: new"),
            raw_commit("future", window().end + Duration::hours(1), "feat: future"),
        ]);
        let records = Extractor::new(&GitSettings::default())
            .extract("api", &git, &window())
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn merge_and_empty_filters_are_independent() {
        let mut merge = raw_commit("merge", at(1), "Merge branch 'x'");
        merge.parents = vec!["p1".into(), "p2".into()];
        let mut empty = raw_commit("empty", at(2), "chore: empty");
        empty.files.clear();
        let commits = vec![merge, empty, raw_commit("normal", at(3), "feat: normal")];

        let count = |merges: bool, empties: bool| {
            let settings = GitSettings {
                exclude_merge_commits: merges,
                exclude_empty_commits: empties,
                ..GitSettings::default()
            };
            Extractor::new(&settings)
                .extract("api", &MockGit::new(commits.clone()), &window())
                .unwrap()
                .len()
        };

        assert_eq!(count(true, true), 1);
        assert_eq!(count(false, true), 2);
        assert_eq!(count(true, false), 2);
        assert_eq!(count(false, false), 3);
    }

    #[test]
    fn max_commits_keeps_newest() {
        let git = MockGit::new(vec![
            raw_commit("aaa", at(1), "feat: one"),
            raw_commit("bbb", at(2), "feat: two"),
            raw_commit("ccc", at(3), "feat: three"),
        ]);
        let settings = GitSettings {
            max_commits: Some(2),
            ..GitSettings::default()
        };
        let records = Extractor::new(&settings)
            .extract("api", &git, &window())
            .unwrap();
        let hashes: Vec<String> = records.iter().map(|r| r.hash).collect();
        assert_eq!(hashes, vec!["bbb", "ccc"]);
    }

    #[test]
    fn custom_classifier_is_used() {
        struct AlwaysDocs;
        impl CommitClassifier for AlwaysDocs {
            fn classify(&self, _message: &str) -> CommitType {
                CommitType::Docs
            }
        }

        let git = MockGit::new(vec![raw_commit("aaa", at(1), "fix: bug")]);
        let records = Extractor::new(&GitSettings::default())
            .with_classifier(Arc::new(AlwaysDocs))
            .extract("api", &git, &window())
            .unwrap();
        assert_eq!(records.iter().next().unwrap().commit_type, CommitType::Docs);
    }

    #[test]
    fn sums_line_stats() {
        let git = MockGit::new(vec![raw_commit("aaa", at(1), "feat: one\n\nbody")]);
        let record = Extractor::new(&GitSettings::default())
            .extract("api", &git, &window())
            .unwrap()
            .iter()
            .next()
            .unwrap();
        assert_eq!(record.subject, "feat: one");
        assert_eq!(record.lines_added, 10);
        assert_eq!(record.lines_removed, 2);
        assert_eq!(record.files_changed(), 1);
        assert!(!record.is_merge);
    }

    #[test]
    fn repository_errors_propagate() {
        let git = MockGit::failing();
        let result = Extractor::new(&GitSettings::default()).extract("api", &git, &window());
        assert!(matches!(result, Err(GitError::NotARepository(_))));
    }
}
