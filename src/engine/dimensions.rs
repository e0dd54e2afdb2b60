//! Per-contributor dimension calculations.
//!
//! Everything here is a pure function of one contributor's commits and
//! verdicts. Team-relative normalization happens in [`super::Engine`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{
    CollaborationWeights, DimensionWeights, MaintenanceWeights, MissingVerdictPolicy,
    ProductivitySettings,
};
use crate::extract::stack::dominant_stack;
use crate::models::{CommitRecord, CommitType, Complexity, EvaluationWindow, QualityVerdict};
use crate::utils::clamp_unit;

/// Weight assumed for repositories missing from the weight table.
const DEFAULT_REPOSITORY_WEIGHT: f64 = 1.0;

/// A commit together with its verdict, if one was produced.
pub type Assessed<'a> = (&'a CommitRecord, Option<&'a QualityVerdict>);

/// Collaboration inputs that do not come from commit history.
///
/// Both values are fractions in [0, 1]; absent signals count as 0.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaborationSignals {
    pub review_participation: f64,
    pub merge_conflicts: f64,
}

/// A dimension value in [0, 1] and the raw number it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DimensionScore {
    pub value: f64,
    pub raw: f64,
}

impl DimensionScore {
    /// Score whose value is its raw input, clipped.
    pub fn direct(raw: f64) -> Self {
        Self {
            value: clamp_unit(raw),
            raw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DimensionScores {
    pub quality: DimensionScore,
    pub productivity: DimensionScore,
    pub collaboration: DimensionScore,
    pub innovation: DimensionScore,
    pub maintenance: DimensionScore,
}

impl DimensionScores {
    /// Weighted sum of the five values, clipped to [0, 1].
    pub fn composite(&self, weights: &DimensionWeights) -> f64 {
        clamp_unit(
            self.quality.value * weights.quality
                + self.productivity.value * weights.productivity
                + self.collaboration.value * weights.collaboration
                + self.innovation.value * weights.innovation
                + self.maintenance.value * weights.maintenance,
        )
    }
}

/// Commit counts by type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeCounts {
    pub feature: usize,
    pub bugfix: usize,
    pub refactor: usize,
    pub docs: usize,
    pub test: usize,
    pub other: usize,
}

impl TypeCounts {
    pub fn from_commits<'a>(commits: impl IntoIterator<Item = &'a CommitRecord>) -> Self {
        let mut counts = Self::default();
        for commit in commits {
            match commit.commit_type {
                CommitType::Feature => counts.feature += 1,
                CommitType::Bugfix => counts.bugfix += 1,
                CommitType::Refactor => counts.refactor += 1,
                CommitType::Docs => counts.docs += 1,
                CommitType::Test => counts.test += 1,
                CommitType::Other => counts.other += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.feature + self.bugfix + self.refactor + self.docs + self.test + self.other
    }
}

/// Inputs and intermediate factors of the productivity dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductivityFactors {
    /// Repository-weighted lines added minus removed, floored at 0.
    pub weighted_net_output: f64,
    pub commits_per_day: f64,
    pub cadence_multiplier: f64,
    pub tech_stack: String,
    pub tech_multiplier: f64,
    /// Mean complexity multiplier; commits without verdict count as medium.
    pub complexity_weight: f64,
}

impl ProductivityFactors {
    pub fn compute(
        activity: &[Assessed<'_>],
        window: &EvaluationWindow,
        settings: &ProductivitySettings,
        repository_weights: &BTreeMap<String, f64>,
    ) -> Self {
        let net: f64 = activity
            .iter()
            .map(|(c, _)| {
                let weight = repository_weights
                    .get(&c.repository)
                    .copied()
                    .unwrap_or(DEFAULT_REPOSITORY_WEIGHT);
                weight * c.net_lines() as f64
            })
            .sum();

        let commits_per_day = activity.len() as f64 / window.days();
        let tech_stack = dominant_stack(
            activity
                .iter()
                .flat_map(|(c, _)| c.files.iter().map(String::as_str)),
        );

        let complexity_weight = if activity.is_empty() {
            settings.complexity.for_tier(Complexity::Medium)
        } else {
            activity
                .iter()
                .map(|(_, v)| {
                    let tier = v.map(|v| v.complexity).unwrap_or(Complexity::Medium);
                    settings.complexity.for_tier(tier)
                })
                .sum::<f64>()
                / activity.len() as f64
        };

        Self {
            weighted_net_output: net.max(0.0),
            commits_per_day,
            cadence_multiplier: settings.cadence_multiplier(commits_per_day),
            tech_stack: tech_stack.to_string(),
            tech_multiplier: settings.tech_multiplier(tech_stack),
            complexity_weight,
        }
    }

    /// The multiplicative raw productivity value, before team normalization.
    pub fn raw(&self) -> f64 {
        self.weighted_net_output
            * self.cadence_multiplier
            * self.tech_multiplier
            * self.complexity_weight
    }
}

/// Mean verdict quality under the given missing-verdict policy.
pub fn quality(activity: &[Assessed<'_>], policy: MissingVerdictPolicy) -> f64 {
    let scores: Vec<f64> = activity
        .iter()
        .filter_map(|(_, v)| v.map(|v| v.quality_score))
        .collect();
    let denominator = match policy {
        MissingVerdictPolicy::CountAsZero => activity.len(),
        MissingVerdictPolicy::Exclude => scores.len(),
    };
    if denominator == 0 {
        return 0.0;
    }
    scores.iter().sum::<f64>() / denominator as f64
}

pub fn collaboration(
    bugfix_ratio: f64,
    signals: &CollaborationSignals,
    weights: &CollaborationWeights,
) -> f64 {
    weights.bugfix_ratio * clamp_unit(bugfix_ratio)
        + weights.review_participation * clamp_unit(signals.review_participation)
        + weights.merge_conflicts * clamp_unit(signals.merge_conflicts)
}

pub fn maintenance(counts: &TypeCounts, weights: &MaintenanceWeights) -> f64 {
    let ratio = ratio(counts.bugfix + counts.refactor, counts.total());
    let documentation = if counts.docs > 0 { 1.0 } else { 0.0 };
    weights.maintenance_ratio * ratio + weights.documentation * documentation
}

/// `part / total`, 0 when there is nothing to divide.
pub fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}
