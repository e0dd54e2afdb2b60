//! Commit message classification.

use crate::models::CommitType;

/// Strategy that assigns a [`CommitType`] to a commit message.
pub trait CommitClassifier: Send + Sync {
    fn classify(&self, message: &str) -> CommitType;
}

/// Keyword heuristics over the commit message.
///
/// Conventional-commit prefixes (`feat:`, `fix(parser):`, `refactor!:`) win.
/// Otherwise the words of the message are matched against keyword lists in
/// rule order; a word matches a keyword when it starts with it, so `fixes`
/// and `added` are recognized.
pub struct KeywordClassifier {
    prefixes: Vec<(&'static str, CommitType)>,
    rules: Vec<(CommitType, Vec<&'static str>)>,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        Self {
            prefixes: vec![
                ("feat", CommitType::Feature),
                ("feature", CommitType::Feature),
                ("fix", CommitType::Bugfix),
                ("bugfix", CommitType::Bugfix),
                ("hotfix", CommitType::Bugfix),
                ("refactor", CommitType::Refactor),
                ("perf", CommitType::Refactor),
                ("docs", CommitType::Docs),
                ("doc", CommitType::Docs),
                ("test", CommitType::Test),
                ("tests", CommitType::Test),
            ],
            rules: vec![
                (CommitType::Bugfix, vec!["fix", "bug", "issue", "error", "hotfix"]),
                (CommitType::Feature, vec!["feat", "feature", "add", "implement", "introduce"]),
                (CommitType::Refactor, vec!["refactor", "cleanup", "restructure"]),
                (CommitType::Docs, vec!["doc", "readme", "changelog"]),
                (CommitType::Test, vec!["test", "spec"]),
            ],
        }
    }

    fn conventional_prefix(&self, subject: &str) -> Option<CommitType> {
        let (head, _) = subject.split_once(':')?;
        let kind = head
            .split('(')
            .next()
            .unwrap_or(head)
            .trim_end_matches('!')
            .trim();
        self.prefixes
            .iter()
            .find(|(prefix, _)| *prefix == kind)
            .map(|(_, ty)| *ty)
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitClassifier for KeywordClassifier {
    fn classify(&self, message: &str) -> CommitType {
        let lowered = message.to_lowercase();
        let subject = lowered.lines().next().unwrap_or("").trim();

        if let Some(ty) = self.conventional_prefix(subject) {
            return ty;
        }

        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        self.rules
            .iter()
            .find(|(_, keywords)| {
                words
                    .iter()
                    .any(|w| keywords.iter().any(|k| w.starts_with(k)))
            })
            .map(|(ty, _)| *ty)
            .unwrap_or(CommitType::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(message: &str) -> CommitType {
        KeywordClassifier::new().classify(message)
    }

    #[test]
    fn conventional_prefixes() {
        assert_eq!(classify("feat: add login"), CommitType::Feature);
        assert_eq!(classify("fix(parser): handle EOF"), CommitType::Bugfix);
        assert_eq!(classify("refactor!: split module"), CommitType::Refactor);
        assert_eq!(classify("docs: fix typo in README"), CommitType::Docs);
        assert_eq!(classify("test: cover error path"), CommitType::Test);
    }

    #[test]
    fn keyword_fallback_in_priority_order() {
        assert_eq!(classify("Fixes crash when config missing"), CommitType::Bugfix);
        assert_eq!(classify("Added export to CSV"), CommitType::Feature);
        assert_eq!(classify("Refactoring the scheduler"), CommitType::Refactor);
        assert_eq!(classify("Update README"), CommitType::Docs);
        assert_eq!(classify("More specs for the router"), CommitType::Test);
        // Bugfix keywords outrank feature keywords
        assert_eq!(classify("Add fix for race"), CommitType::Bugfix);
    }

    #[test]
    fn unmatched_message_is_other() {
        assert_eq!(classify("Bump version to 1.2.3"), CommitType::Other);
        assert_eq!(classify(""), CommitType::Other);
    }

    #[test]
    fn unknown_prefix_falls_back_to_keywords() {
        assert_eq!(classify("chore: fix lint"), CommitType::Bugfix);
        assert_eq!(classify("chore: bump deps"), CommitType::Other);
    }
}
