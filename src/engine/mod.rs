//! Efficiency scoring.
//!
//! The [`Engine`] is a pure function of commit records, verdicts, identity
//! mapping, external collaboration signals and configuration: the same inputs
//! always produce the same [`Evaluation`], down to the byte when serialized.

pub mod dimensions;
pub mod insights;
pub mod normalize;
pub mod tier;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::identity::IdentityResolver;
use crate::models::{CommitRecord, Contributor, EvaluationWindow, QualityVerdict};
use crate::utils::{clamp_unit, mean};

pub use dimensions::{CollaborationSignals, DimensionScore, DimensionScores, TypeCounts};
pub use insights::Insights;
use dimensions::{Assessed, ProductivityFactors};

/// Numbers behind a contributor's dimension scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMetrics {
    pub commits: usize,
    pub assessed_commits: usize,
    pub missing_verdicts: usize,
    pub lines_added: u64,
    pub lines_removed: u64,
    pub net_lines: i64,
    pub types: TypeCounts,
    pub bugfix_ratio: f64,
    pub maintenance_ratio: f64,
    pub productivity: ProductivityFactors,
    pub signals: CollaborationSignals,
    pub repositories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorScore {
    pub name: String,
    pub emails: Vec<String>,
    /// False when the contributor is not in the employee mapping.
    pub mapped: bool,
    pub dimensions: DimensionScores,
    pub composite: f64,
    pub tier: String,
    /// Quality dimension label from the quality ladder.
    pub quality_label: String,
    pub raw: RawMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamScore {
    pub contributors: usize,
    /// Mean composite over contributors; 0 for an empty team.
    pub mean_composite: f64,
    pub tier: String,
    /// Number of contributors per tier; every configured tier is present.
    pub tier_distribution: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub name: String,
    pub weight: f64,
    pub commits: usize,
    pub contributors: usize,
    pub net_lines: i64,
    pub commits_per_day: f64,
    pub assessed_commits: usize,
    /// Mean verdict quality over assessed commits.
    pub mean_quality: Option<f64>,
    /// Mean complexity multiplier over assessed commits.
    pub mean_complexity: Option<f64>,
}

/// Scores for one evaluation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub window: EvaluationWindow,
    /// Ordered by composite descending, then name.
    pub contributors: Vec<ContributorScore>,
    pub team: TeamScore,
    pub repositories: Vec<RepositorySummary>,
}

/// Inputs of one evaluation.
pub struct EngineInput<'a> {
    pub window: EvaluationWindow,
    pub commits: &'a [CommitRecord],
    /// Keyed by commit hash.
    pub verdicts: &'a HashMap<String, QualityVerdict>,
    /// Keyed by contributor display name.
    pub signals: &'a BTreeMap<String, CollaborationSignals>,
}

pub struct Engine<'a> {
    config: &'a Config,
    resolver: &'a IdentityResolver,
    repository_weights: BTreeMap<String, f64>,
}

struct Partial {
    name: String,
    emails: Vec<String>,
    mapped: bool,
    quality: f64,
    collaboration: f64,
    maintenance: f64,
    productivity_raw: f64,
    innovation_raw: f64,
    raw: RawMetrics,
}

impl<'a> Engine<'a> {
    pub fn new(config: &'a Config, resolver: &'a IdentityResolver) -> Self {
        Self {
            config,
            resolver,
            repository_weights: config.repository_weights(),
        }
    }

    pub fn evaluate(&self, input: &EngineInput<'_>) -> Evaluation {
        // Group by canonical contributor, keeping commit order within each group.
        let mut groups: BTreeMap<String, (Contributor, Vec<Assessed<'_>>)> =
            BTreeMap::new();
        for commit in input.commits {
            let contributor = self.resolver.resolve(&commit.author_email);
            let verdict = input.verdicts.get(&commit.hash);
            groups
                .entry(contributor.name.clone())
                .or_insert_with(|| (contributor, Vec::new()))
                .1
                .push((commit, verdict));
        }

        let partials: Vec<Partial> = groups
            .into_values()
            .map(|(contributor, activity)| {
                let signals = input
                    .signals
                    .get(&contributor.name)
                    .copied()
                    .unwrap_or_default();
                self.score_contributor(contributor, &activity, &input.window, signals)
            })
            .collect();

        let normalization = self.config.scoring.normalization;
        let productivity = normalization.apply(
            &partials.iter().map(|p| p.productivity_raw).collect::<Vec<_>>(),
        );
        let innovation =
            normalization.apply(&partials.iter().map(|p| p.innovation_raw).collect::<Vec<_>>());

        let mut contributors: Vec<ContributorScore> = partials
            .into_iter()
            .zip(productivity.into_iter().zip(innovation))
            .map(|(p, (prod, innov))| {
                let dimensions = DimensionScores {
                    quality: DimensionScore::direct(p.quality),
                    productivity: DimensionScore {
                        value: clamp_unit(prod),
                        raw: p.productivity_raw,
                    },
                    collaboration: DimensionScore::direct(p.collaboration),
                    innovation: DimensionScore {
                        value: clamp_unit(innov),
                        raw: p.innovation_raw,
                    },
                    maintenance: DimensionScore::direct(p.maintenance),
                };
                let composite = dimensions.composite(&self.config.weights);
                ContributorScore {
                    tier: self.config.tiers.tier_for(composite).to_string(),
                    quality_label: self
                        .config
                        .quality_levels
                        .tier_for(dimensions.quality.value)
                        .to_string(),
                    name: p.name,
                    emails: p.emails,
                    mapped: p.mapped,
                    dimensions,
                    composite,
                    raw: p.raw,
                }
            })
            .collect();

        contributors.sort_by(|a, b| {
            b.composite
                .total_cmp(&a.composite)
                .then_with(|| a.name.cmp(&b.name))
        });

        Evaluation {
            window: input.window,
            team: self.team_score(&contributors),
            repositories: self.repository_summaries(input),
            contributors,
        }
    }

    fn score_contributor(
        &self,
        contributor: Contributor,
        activity: &[Assessed<'_>],
        window: &EvaluationWindow,
        signals: CollaborationSignals,
    ) -> Partial {
        let types = TypeCounts::from_commits(activity.iter().map(|(c, _)| *c));
        let total = activity.len();
        let assessed = activity.iter().filter(|(_, v)| v.is_some()).count();
        let lines_added: u64 = activity.iter().map(|(c, _)| c.lines_added).sum();
        let lines_removed: u64 = activity.iter().map(|(c, _)| c.lines_removed).sum();
        let repositories: BTreeSet<String> =
            activity.iter().map(|(c, _)| c.repository.clone()).collect();

        let factors = ProductivityFactors::compute(
            activity,
            window,
            &self.config.productivity,
            &self.repository_weights,
        );
        let bugfix_ratio = dimensions::ratio(types.bugfix, total);
        let maintenance_ratio = dimensions::ratio(types.bugfix + types.refactor, total);

        Partial {
            quality: dimensions::quality(activity, self.config.scoring.missing_verdicts),
            collaboration: dimensions::collaboration(
                bugfix_ratio,
                &signals,
                &self.config.collaboration,
            ),
            maintenance: dimensions::maintenance(&types, &self.config.maintenance),
            productivity_raw: factors.raw(),
            innovation_raw: types.feature as f64,
            name: contributor.name,
            emails: contributor.emails,
            mapped: contributor.mapped,
            raw: RawMetrics {
                commits: total,
                assessed_commits: assessed,
                missing_verdicts: total - assessed,
                lines_added,
                lines_removed,
                net_lines: lines_added as i64 - lines_removed as i64,
                types,
                bugfix_ratio,
                maintenance_ratio,
                productivity: factors,
                signals,
                repositories: repositories.into_iter().collect(),
            },
        }
    }

    fn team_score(&self, contributors: &[ContributorScore]) -> TeamScore {
        let composites: Vec<f64> = contributors.iter().map(|c| c.composite).collect();
        let mean_composite = clamp_unit(mean(&composites));

        let mut tier_distribution: BTreeMap<String, usize> = self
            .config
            .tiers
            .names()
            .map(|name| (name.to_string(), 0))
            .collect();
        for c in contributors {
            *tier_distribution.entry(c.tier.clone()).or_insert(0) += 1;
        }

        TeamScore {
            contributors: contributors.len(),
            mean_composite,
            tier: self.config.tiers.tier_for(mean_composite).to_string(),
            tier_distribution,
        }
    }

    fn repository_summaries(&self, input: &EngineInput<'_>) -> Vec<RepositorySummary> {
        let mut by_repo: BTreeMap<&str, Vec<&CommitRecord>> = BTreeMap::new();
        for commit in input.commits {
            by_repo.entry(commit.repository.as_str()).or_default().push(commit);
        }
        for repo in self.config.active_repositories() {
            by_repo.entry(repo.name.as_str()).or_default();
        }

        by_repo
            .into_iter()
            .map(|(name, commits)| {
                let verdicts: Vec<&QualityVerdict> = commits
                    .iter()
                    .filter_map(|c| input.verdicts.get(&c.hash))
                    .collect();
                let contributors: BTreeSet<String> = commits
                    .iter()
                    .map(|c| self.resolver.resolve(&c.author_email).name)
                    .collect();
                let qualities: Vec<f64> = verdicts.iter().map(|v| v.quality_score).collect();
                let complexities: Vec<f64> = verdicts
                    .iter()
                    .map(|v| self.config.productivity.complexity.for_tier(v.complexity))
                    .collect();

                RepositorySummary {
                    name: name.to_string(),
                    weight: self.repository_weights.get(name).copied().unwrap_or(1.0),
                    commits: commits.len(),
                    contributors: contributors.len(),
                    net_lines: commits.iter().map(|c| c.net_lines()).sum(),
                    commits_per_day: commits.len() as f64 / input.window.days(),
                    assessed_commits: verdicts.len(),
                    mean_quality: (!qualities.is_empty()).then(|| mean(&qualities)),
                    mean_complexity: (!complexities.is_empty()).then(|| mean(&complexities)),
                }
            })
            .collect()
    }
}
