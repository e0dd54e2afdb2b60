//! Author email to contributor resolution.

use std::collections::{BTreeMap, HashMap};

use crate::config::ConfigError;
use crate::models::Contributor;

/// Maps raw author emails onto canonical contributors.
///
/// Matching ignores case and surrounding whitespace. Unknown emails resolve to
/// a synthetic, unmapped contributor named after the email itself.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    contributors: Vec<Contributor>,
    by_email: HashMap<String, usize>,
}

impl IdentityResolver {
    /// Build from a display-name to emails table.
    ///
    /// Fails if a contributor has no emails or an email is listed under two names.
    pub fn new(mapping: &BTreeMap<String, Vec<String>>) -> Result<Self, ConfigError> {
        let mut contributors = Vec::with_capacity(mapping.len());
        let mut by_email: HashMap<String, usize> = HashMap::new();

        for (name, emails) in mapping {
            let mut normalized: Vec<String> = emails
                .iter()
                .map(|e| normalize_email(e))
                .filter(|e| !e.is_empty())
                .collect();
            normalized.sort();
            normalized.dedup();
            if normalized.is_empty() {
                return Err(ConfigError::NoEmails(name.clone()));
            }

            let index = contributors.len();
            for email in &normalized {
                if let Some(&existing) = by_email.get(email) {
                    let first: &Contributor = &contributors[existing];
                    return Err(ConfigError::DuplicateEmail {
                        email: email.clone(),
                        first: first.name.clone(),
                        second: name.clone(),
                    });
                }
                by_email.insert(email.clone(), index);
            }

            contributors.push(Contributor {
                name: name.clone(),
                emails: normalized,
                mapped: true,
            });
        }

        Ok(Self {
            contributors,
            by_email,
        })
    }

    /// Resolve an email. Never fails.
    pub fn resolve(&self, email: &str) -> Contributor {
        match self.by_email.get(&normalize_email(email)) {
            Some(&index) => self.contributors[index].clone(),
            None => Contributor::unmapped(email),
        }
    }

    /// Configured contributors, ordered by name.
    pub fn contributors(&self) -> &[Contributor] {
        &self.contributors
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(name, emails)| {
                (
                    name.to_string(),
                    emails.iter().map(|e| e.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn resolves_case_insensitively() {
        let resolver = IdentityResolver::new(&mapping(&[(
            "Alice",
            &["alice@example.com", "Alice@Users.Noreply.Github.com"],
        )]))
        .unwrap();

        let c = resolver.resolve("ALICE@example.com");
        assert_eq!(c.name, "Alice");
        assert!(c.mapped);

        let c = resolver.resolve(" alice@users.noreply.github.com ");
        assert_eq!(c.name, "Alice");
    }

    #[test]
    fn unknown_email_is_unmapped() {
        let resolver = IdentityResolver::new(&mapping(&[("Alice", &["alice@example.com"])])).unwrap();
        let c = resolver.resolve("bob@example.com");
        assert_eq!(c.name, "bob@example.com");
        assert!(!c.mapped);
    }

    #[test]
    fn same_email_under_two_names_is_rejected() {
        let result = IdentityResolver::new(&mapping(&[
            ("Alice", &["dev@example.com"]),
            ("Bob", &["dev@example.com"]),
        ]));
        match result {
            Err(ConfigError::DuplicateEmail {
                email,
                first,
                second,
            }) => {
                assert_eq!(email, "dev@example.com");
                assert_eq!(first, "Alice");
                assert_eq!(second, "Bob");
            }
            other => panic!("expected duplicate email error, got {:?}", other),
        }
    }

    #[test]
    fn repeated_email_under_same_name_is_fine() {
        let resolver = IdentityResolver::new(&mapping(&[(
            "Alice",
            &["alice@example.com", "ALICE@example.com"],
        )]))
        .unwrap();
        assert_eq!(resolver.contributors()[0].emails.len(), 1);
    }

    #[test]
    fn contributor_without_emails_is_rejected() {
        let result = IdentityResolver::new(&mapping(&[("Ghost", &[])]));
        assert!(matches!(result, Err(ConfigError::NoEmails(name)) if name == "Ghost"));
    }
}
