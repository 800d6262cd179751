//! Report structures and formatting.
//!
//! Supports both a human-readable table for the terminal and pretty JSON for
//! scripting. User identifiers are mapped back to the names found in the
//! input files.

use anyhow::Result;
use rankfair_core::config::EvalConfig;
use rankfair_core::evaluation::stats::{BootstrapResult, TTestResult, WilcoxonResult};
use rankfair_core::evaluation::MetricOutcome;
use rankfair_core::types::IdInterner;
use serde::Serialize;
use std::collections::BTreeMap;

/// Width of the report banners.
const BANNER_WIDTH: usize = 80;

/// Complete evaluation report.
#[derive(Debug, Serialize)]
pub struct EvalReport {
    pub config: EvalConfig,
    pub dataset: DatasetInfo,
    pub runs: Vec<RunReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comparisons: Vec<Comparison>,
}

#[derive(Debug, Serialize)]
pub struct DatasetInfo {
    pub train_users: usize,
    pub train_interactions: usize,
    pub test_users: usize,
    pub items: usize,
}

/// All metrics of one recommendation run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub name: String,
    pub users: usize,
    pub metrics: Vec<MetricSummary>,
}

/// One metric of one run. Exactly one of `value` and `error` is set.
#[derive(Debug, Serialize)]
pub struct MetricSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_users: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Bootstrap interval of the per-user mean
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<BootstrapResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_user: Option<BTreeMap<String, f64>>,
}

impl MetricSummary {
    /// Converts an outcome, naming users through `users` when per-user
    /// scores are requested.
    pub fn from_outcome(outcome: &MetricOutcome, users: &IdInterner, per_user: bool) -> Self {
        match &outcome.result {
            Ok(report) => Self {
                name: outcome.name.clone(),
                value: Some(report.aggregate),
                num_users: Some(report.num_users),
                error: None,
                confidence: None,
                per_user: per_user.then(|| {
                    report
                        .per_user
                        .iter()
                        .map(|(user, score)| {
                            let name = users
                                .name(user.as_u64())
                                .map(str::to_string)
                                .unwrap_or_else(|| user.to_string());
                            (name, *score)
                        })
                        .collect()
                }),
            },
            Err(e) => Self {
                name: outcome.name.clone(),
                value: None,
                num_users: None,
                error: Some(e.to_string()),
                confidence: None,
                per_user: None,
            },
        }
    }
}

/// Paired comparison of a candidate run against the baseline run.
#[derive(Debug, Serialize)]
pub struct Comparison {
    pub metric: String,
    pub baseline: String,
    pub candidate: String,
    pub users: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttest: Option<TTestResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wilcoxon: Option<WilcoxonResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Serializes the report as pretty-printed JSON.
pub fn format_json(report: &EvalReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Renders the report as a plain-text table.
pub fn format_human(report: &EvalReport) -> String {
    let banner = "=".repeat(BANNER_WIDTH);
    let rule = "-".repeat(BANNER_WIDTH - 10);

    let mut output = String::new();
    output.push_str(&format!("\n{}\nRECOMMENDATION EVALUATION\n{}\n", banner, banner));
    output.push_str(&format!(
        "\nTrain: {} users, {} interactions | Test: {} users | Items: {}\n",
        report.dataset.train_users,
        report.dataset.train_interactions,
        report.dataset.test_users,
        report.dataset.items
    ));
    output.push_str(&format!(
        "Cutoff: {} | Relevance threshold: {} | Popularity ratio: {}\n",
        report.config.cutoff, report.config.relevance_threshold, report.config.pop_ratio
    ));

    for run in &report.runs {
        output.push_str(&format!("\n{}\n", rule));
        output.push_str(&format!("RUN {} ({} users)\n", run.name, run.users));
        output.push_str(&format!("{:<18} {:>10} {:>8}\n", "Metric", "Value", "Users"));

        for metric in &run.metrics {
            match (&metric.value, &metric.error) {
                (Some(value), _) => {
                    let ci = metric
                        .confidence
                        .map(|c| format!("95% CI [{:.4}, {:.4}]", c.lower, c.upper))
                        .unwrap_or_default();
                    output.push_str(&format!(
                        "{:<18} {:>10.4} {:>8}  {}\n",
                        metric.name,
                        value,
                        metric.num_users.unwrap_or(0),
                        ci
                    ));
                }
                (None, Some(error)) => {
                    output.push_str(&format!(
                        "{:<18} {:>10} {:>8}  {}\n",
                        metric.name, "n/a", "-", error
                    ));
                }
                (None, None) => {}
            }

            if let Some(per_user) = &metric.per_user {
                for (user, score) in per_user {
                    output.push_str(&format!("    {:<24} {:.4}\n", user, score));
                }
            }
        }
    }

    if !report.comparisons.is_empty() {
        output.push_str(&format!("\n{}\n", rule));
        output.push_str("STATISTICAL COMPARISONS (* = p < 0.05)\n");
        for c in &report.comparisons {
            output.push_str(&format!(
                "{} vs {} ({}, {} users):",
                c.candidate, c.baseline, c.metric, c.users
            ));
            if let Some(ttest) = &c.ttest {
                output.push_str(&format!(" {}", ttest));
            }
            if let Some(wilcoxon) = &c.wilcoxon {
                output.push_str(&format!(" | Wilcoxon {}", wilcoxon));
            }
            if let Some(note) = &c.note {
                output.push_str(&format!(" {}", note));
            }
            output.push('\n');
        }
    }

    output.push_str(&format!("{}\n", banner));
    output
}
