//! Findings and recommendations derived from an evaluation.

use serde::{Deserialize, Serialize};

use super::tier::TierLadder;
use super::{Evaluation, RepositorySummary, TeamScore};

/// Team mean composite at or above which the team is called strong.
pub const STRONG_TEAM: f64 = 0.8;
/// Team mean composite below which improvement measures are recommended.
pub const SOLID_TEAM: f64 = 0.6;
/// Repositories above this many commits per day are called very active.
pub const BUSY_REPOSITORY: f64 = 5.0;
/// Repositories below this many commits per day are called quiet.
pub const QUIET_REPOSITORY: f64 = 1.0;

const STANDING_RECOMMENDATIONS: [&str; 3] = [
    "Hold regular code quality retrospectives",
    "Encourage contributions to open-source projects to broaden technical perspective",
    "Keep technical documentation and the knowledge base current",
];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Insights {
    pub findings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl Insights {
    pub fn derive(evaluation: &Evaluation, ladder: &TierLadder) -> Self {
        Self::from_parts(&evaluation.team, &evaluation.repositories, ladder)
    }

    fn from_parts(team: &TeamScore, repositories: &[RepositorySummary], ladder: &TierLadder) -> Self {
        let mut findings = Vec::new();
        let mut recommendations = Vec::new();
        let in_tier = |tier: &str| team.tier_distribution.get(tier).copied().unwrap_or(0);

        if team.contributors > 0 {
            let score = team.mean_composite;
            findings.push(if score >= STRONG_TEAM {
                format!("Team performance is strong ({:.2}): quality and throughput are both high", score)
            } else if score >= SOLID_TEAM {
                format!("Team performance is solid ({:.2}) with room to improve in some dimensions", score)
            } else {
                format!("Team performance needs attention ({:.2}); consider an improvement plan", score)
            });
            if score < SOLID_TEAM {
                recommendations.push("Strengthen code review to raise code quality".to_string());
                recommendations.push("Schedule technical training and knowledge sharing sessions".to_string());
            }
        }

        let struggling = in_tier(&ladder.floor);
        if struggling > 0 {
            findings.push(format!(
                "{} contributor(s) in the '{}' tier need close attention",
                struggling, ladder.floor
            ));
        }
        // With no levels configured everyone lands on the floor; there is no top tier.
        if let Some(top) = ladder.levels.first() {
            let leading = in_tier(&top.name);
            if leading > 0 {
                findings.push(format!(
                    "{} contributor(s) in the '{}' tier set the bar for the team",
                    leading, top.name
                ));
            }
        }

        let mut quiet = Vec::new();
        for repo in repositories {
            if repo.commits_per_day > BUSY_REPOSITORY {
                findings.push(format!(
                    "Repository {} is very active ({:.1} commits/day)",
                    repo.name, repo.commits_per_day
                ));
            } else if repo.commits_per_day < QUIET_REPOSITORY {
                findings.push(format!(
                    "Repository {} has low activity ({:.1} commits/day)",
                    repo.name, repo.commits_per_day
                ));
                quiet.push(repo.name.as_str());
            }
        }

        if struggling > 0 {
            recommendations.push(format!(
                "Draw up individual improvement plans for the {} contributor(s) in the '{}' tier",
                struggling, ladder.floor
            ));
            recommendations.push("Pair struggling contributors with a mentor".to_string());
        }
        if !quiet.is_empty() {
            recommendations.push(format!(
                "Re-evaluate priority and staffing of low-activity repositories: {}",
                quiet.join(", ")
            ));
        }
        recommendations.extend(STANDING_RECOMMENDATIONS.iter().map(|r| r.to_string()));

        Self {
            findings,
            recommendations,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::Config;

    fn team(mean: f64, distribution: &[(&str, usize)]) -> TeamScore {
        TeamScore {
            contributors: distribution.iter().map(|(_, n)| n).sum::<usize>().max(1),
            mean_composite: mean,
            tier: "medium".into(),
            tier_distribution: distribution
                .iter()
                .map(|(tier, n)| (tier.to_string(), *n))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn repo(name: &str, commits_per_day: f64) -> RepositorySummary {
        RepositorySummary {
            name: name.into(),
            weight: 1.0,
            commits: 10,
            contributors: 2,
            net_lines: 100,
            commits_per_day,
            assessed_commits: 10,
            mean_quality: Some(0.7),
            mean_complexity: Some(1.0),
        }
    }

    fn ladder() -> TierLadder {
        Config::default().tiers
    }

    #[test]
    fn team_bands_split_at_point_eight_and_point_six() {
        let strong = Insights::from_parts(&team(0.8, &[]), &[], &ladder());
        assert!(strong.findings[0].starts_with("Team performance is strong"));

        let solid = Insights::from_parts(&team(0.6, &[]), &[], &ladder());
        assert!(solid.findings[0].starts_with("Team performance is solid"));
        assert!(!solid.recommendations.iter().any(|r| r.contains("code review")));

        let weak = Insights::from_parts(&team(0.59, &[]), &[], &ladder());
        assert!(weak.findings[0].starts_with("Team performance needs attention"));
        assert!(weak.recommendations[0].contains("code review"));
    }

    #[test]
    fn counts_top_and_floor_tiers() {
        let ladder = ladder();
        let top = ladder.levels[0].name.clone();
        let team = team(0.7, &[(top.as_str(), 2), (ladder.floor.as_str(), 1), ("medium", 3)]);
        let insights = Insights::from_parts(&team, &[], &ladder);

        assert!(insights
            .findings
            .contains(&format!("1 contributor(s) in the '{}' tier need close attention", ladder.floor)));
        assert!(insights
            .findings
            .contains(&format!("2 contributor(s) in the '{}' tier set the bar for the team", top)));
        assert!(insights
            .recommendations
            .iter()
            .any(|r| r.starts_with("Draw up individual improvement plans for the 1 contributor(s)")));
    }

    #[test]
    fn repository_activity_thresholds_are_exclusive() {
        let repos = [repo("busy", 5.1), repo("edge-high", 5.0), repo("edge-low", 1.0), repo("quiet", 0.4)];
        let insights = Insights::from_parts(&team(0.7, &[]), &repos, &ladder());

        let about = |name: &str| {
            insights
                .findings
                .iter()
                .filter(|f| f.starts_with(&format!("Repository {} ", name)))
                .count()
        };
        assert_eq!(about("busy"), 1);
        assert_eq!(about("edge-high"), 0);
        assert_eq!(about("edge-low"), 0);
        assert_eq!(about("quiet"), 1);
        assert!(insights
            .recommendations
            .contains(&"Re-evaluate priority and staffing of low-activity repositories: quiet".to_string()));
    }

    #[test]
    fn empty_team_gets_only_standing_recommendations() {
        let empty = TeamScore {
            contributors: 0,
            mean_composite: 0.0,
            tier: "below".into(),
            tier_distribution: BTreeMap::new(),
        };
        let insights = Insights::from_parts(&empty, &[], &ladder());
        assert!(insights.findings.is_empty());
        assert_eq!(insights.recommendations.len(), STANDING_RECOMMENDATIONS.len());
    }
}
