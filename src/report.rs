//! Report assembly and formatting.

use std::fmt::Write as _;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::engine::tier::TierLadder;
use crate::engine::{ContributorScore, Evaluation, Insights, RepositorySummary, TeamScore};
use crate::models::EvaluationWindow;
use crate::utils::ellipsize;

const NAME_WIDTH: usize = 24;

/// Output format for evaluation reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with a degradation caveat.
    #[default]
    Pretty,
    /// Stable, pretty-printed JSON.
    Json,
}

/// A repository left out of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRepository {
    pub name: String,
    pub reason: String,
}

/// How much of the run was scored without full information.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Degradation {
    pub total_commits: usize,
    pub assessed_commits: usize,
    /// Commits scored without a verdict, for any reason.
    pub missing_verdicts: usize,
    /// Backend unreachable or out of retries.
    pub unavailable: usize,
    /// Backend answered with something that could not be parsed.
    pub malformed: usize,
    /// Not assessed because the run was cancelled.
    pub cancelled: usize,
    /// Not assessed because AI assessment was turned off.
    pub ai_disabled: usize,
    /// Contributors with at least one missing verdict.
    pub degraded_contributors: Vec<String>,
    pub skipped_repositories: Vec<SkippedRepository>,
}

impl Degradation {
    pub fn is_degraded(&self) -> bool {
        self.missing_verdicts > 0 || !self.skipped_repositories.is_empty()
    }
}

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Period label, e.g. `weekly` or `14 days`.
    pub period: String,
    /// Model used for verdicts; absent when AI assessment was off.
    pub model: Option<String>,
    pub window: EvaluationWindow,
    pub contributors: Vec<ContributorScore>,
    pub team: TeamScore,
    pub repositories: Vec<RepositorySummary>,
    pub findings: Vec<String>,
    pub recommendations: Vec<String>,
    pub degradation: Degradation,
}

impl EvaluationReport {
    pub fn new(
        period: impl Into<String>,
        model: Option<String>,
        evaluation: Evaluation,
        tiers: &TierLadder,
        degradation: Degradation,
    ) -> Self {
        let insights = Insights::derive(&evaluation, tiers);
        Self {
            period: period.into(),
            model,
            window: evaluation.window,
            contributors: evaluation.contributors,
            team: evaluation.team,
            repositories: evaluation.repositories,
            findings: insights.findings,
            recommendations: insights.recommendations,
            degradation,
        }
    }
}

/// Format a report for output.
pub fn render(report: &EvaluationReport, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Pretty => Ok(format_pretty(report)),
        OutputFormat::Json => serde_json::to_string_pretty(report),
    }
}

fn format_pretty(report: &EvaluationReport) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_pretty(&mut out, report);
    out
}

fn write_pretty(out: &mut String, report: &EvaluationReport) -> std::fmt::Result {
    writeln!(out, "Efficiency report: {}", report.period)?;
    writeln!(
        out,
        "Window: {} .. {}",
        report.window.start.format("%Y-%m-%d %H:%M"),
        report.window.end.format("%Y-%m-%d %H:%M")
    )?;
    match &report.model {
        Some(model) => writeln!(out, "AI model: {}", model)?,
        None => writeln!(out, "AI model: disabled")?,
    }
    out.push('\n');

    let team = &report.team;
    writeln!(
        out,
        "Team: {} contributor(s), mean composite {:.3} ({})",
        team.contributors, team.mean_composite, team.tier
    )?;
    let distribution: Vec<String> = team
        .tier_distribution
        .iter()
        .map(|(tier, n)| format!("{}: {}", tier, n))
        .collect();
    writeln!(out, "  {}", distribution.join(", "))?;
    out.push('\n');

    if report.contributors.is_empty() {
        writeln!(out, "No commits in this window.")?;
    } else {
        writeln!(
            out,
            "{:<width$} {:>9} {:<10} {:>7} {:>7} {:>7} {:>7} {:>7} {:>7}",
            "Contributor",
            "Composite",
            "Tier",
            "Quality",
            "Prod",
            "Collab",
            "Innov",
            "Maint",
            "Commits",
            width = NAME_WIDTH
        )?;
        for c in &report.contributors {
            write_contributor(out, c)?;
        }
    }

    if !report.repositories.is_empty() {
        out.push('\n');
        writeln!(out, "Repositories:")?;
        for repo in &report.repositories {
            let quality = repo
                .mean_quality
                .map(|q| format!("{:.2}", q))
                .unwrap_or_else(|| "n/a".to_string());
            writeln!(
                out,
                "  {} (weight {:.2}): {} commits, {} contributor(s), {:+} net lines, {}/{} assessed, mean quality {}",
                repo.name,
                repo.weight,
                repo.commits,
                repo.contributors,
                repo.net_lines,
                repo.assessed_commits,
                repo.commits,
                quality
            )?;
        }
    }

    for (title, lines) in [
        ("Findings", &report.findings),
        ("Recommendations", &report.recommendations),
    ] {
        if !lines.is_empty() {
            out.push('\n');
            writeln!(out, "{}:", title)?;
            for line in lines {
                writeln!(out, "  - {}", line)?;
            }
        }
    }

    let d = &report.degradation;
    if d.is_degraded() {
        out.push('\n');
        writeln!(
            out,
            "Caveat: {} of {} commit(s) were scored without an AI verdict \
             ({} unavailable, {} malformed, {} cancelled, {} AI disabled).",
            d.missing_verdicts, d.total_commits, d.unavailable, d.malformed, d.cancelled, d.ai_disabled
        )?;
        if !d.degraded_contributors.is_empty() {
            writeln!(out, "  Affected: {}", d.degraded_contributors.join(", "))?;
        }
        for skipped in &d.skipped_repositories {
            writeln!(out, "  Skipped repository {}: {}", skipped.name, skipped.reason)?;
        }
    }
    Ok(())
}

fn write_contributor(out: &mut String, c: &ContributorScore) -> std::fmt::Result {
    let mut name = ellipsize(&c.name, NAME_WIDTH);
    if !c.mapped {
        name = ellipsize(&format!("{}*", c.name), NAME_WIDTH);
    }
    let d = &c.dimensions;
    writeln!(
        out,
        "{:<width$} {:>9.3} {:<10} {:>7.2} {:>7.2} {:>7.2} {:>7.2} {:>7.2} {:>7}",
        name,
        c.composite,
        c.tier,
        d.quality.value,
        d.productivity.value,
        d.collaboration.value,
        d.innovation.value,
        d.maintenance.value,
        c.raw.commits,
        width = NAME_WIDTH
    )
}
