//! Rankfair evaluation harness.
//!
//! Scores one or more recommendation runs against a held-out test split,
//! reporting ranking accuracy and popularity bias side by side.
//!
//! # Usage
//!
//! ```bash
//! # Default metrics (nDCG, Precision, Recall, ExtendedPopREO) at cutoff 10
//! rankfair-eval --train train.tsv --test test.tsv --run bpr=runs/bpr.tsv
//!
//! # Several runs, paired significance tests against the first one
//! rankfair-eval --train train.tsv --test test.tsv \
//!     --run bpr=runs/bpr.tsv --run mostpop=runs/mostpop.tsv --compare
//!
//! # Custom metrics and cutoff, JSON output
//! rankfair-eval --train train.tsv --test test.tsv --run runs/bpr.tsv \
//!     --metrics nDCG,MAP,ExtendedPopRSP --cutoff 20 --json
//! ```

mod config;
mod output;

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::{Overrides, RunSpec};
use indicatif::{ProgressBar, ProgressStyle};
use output::{Comparison, DatasetInfo, EvalReport, MetricSummary, RunReport};
use rankfair_core::evaluation::metrics::pop_fairness::{EXTENDED_POP_REO, EXTENDED_POP_RSP};
use rankfair_core::evaluation::metrics::ndcg::NDCG;
use rankfair_core::evaluation::metrics::{Metric, Ndcg};
use rankfair_core::evaluation::{
    bootstrap_ci, datasets, paired_scores, paired_ttest, wilcoxon_signed_rank, EvaluationContext,
    Evaluator, MetricRegistry, Recommendations,
};
use rankfair_core::types::IdInterner;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_METRICS: &str = "nDCG,Precision,Recall,ExtendedPopREO";

/// Seed for bootstrap resampling.
const BOOTSTRAP_SEED: u64 = 42;

// =============================================================================
// CLI
// =============================================================================

#[derive(Parser, Debug)]
#[command(name = "rankfair-eval", version)]
#[command(about = "Evaluate recommendation runs for accuracy and popularity bias")]
struct Args {
    /// Training interactions (user \t item [\t value [\t timestamp]])
    #[arg(long)]
    train: PathBuf,

    /// Test interactions with graded relevance
    #[arg(long)]
    test: PathBuf,

    /// Recommendation run as name=path (repeatable)
    #[arg(long = "run", required = true, value_parser = config::parse_run)]
    runs: Vec<RunSpec>,

    /// Metrics to compute (comma-separated)
    #[arg(long, value_delimiter = ',', default_value = DEFAULT_METRICS)]
    metrics: Vec<String>,

    /// Top-k cutoff
    #[arg(long)]
    cutoff: Option<usize>,

    /// Minimum gain for binary relevance
    #[arg(long)]
    threshold: Option<f64>,

    /// Popularity concentration ratio in (0, 1)
    #[arg(long)]
    pop_ratio: Option<f64>,

    /// JSON config file with cutoff / relevance_threshold / pop_ratio
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Include per-user scores
    #[arg(long)]
    per_user: bool,

    /// Paired tests on per-user nDCG between the first run and each other run
    #[arg(long)]
    compare: bool,

    /// Bootstrap resamples for confidence intervals (0 = off)
    #[arg(long, default_value = "0")]
    bootstrap: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

// =============================================================================
// Evaluation
// =============================================================================

struct LoadedRun {
    name: String,
    recs: Recommendations,
}

fn create_progress_bar(len: u64, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

fn evaluate_run(
    run: &LoadedRun,
    args: &Args,
    evaluator: &Evaluator,
    ctx: &EvaluationContext,
    users: &IdInterner,
    pb: &ProgressBar,
) -> Result<RunReport> {
    let mut metrics = Vec::with_capacity(args.metrics.len());

    for name in &args.metrics {
        pb.set_message(format!("{} / {}", run.name, name));
        let outcomes = evaluator.evaluate(std::slice::from_ref(name), &run.recs, ctx)?;

        for outcome in &outcomes {
            let mut summary = MetricSummary::from_outcome(outcome, users, args.per_user);

            // Fairness aggregates are not per-user means, so no interval applies
            let is_mean = outcome.name != EXTENDED_POP_REO && outcome.name != EXTENDED_POP_RSP;
            if args.bootstrap > 0 && is_mean {
                if let Ok(report) = &outcome.result {
                    let values: Vec<f64> = report.per_user.values().copied().collect();
                    summary.confidence = bootstrap_ci(&values, args.bootstrap, BOOTSTRAP_SEED).ok();
                }
            }
            metrics.push(summary);
        }
        pb.inc(1);
    }

    Ok(RunReport {
        name: run.name.clone(),
        users: run.recs.num_users(),
        metrics,
    })
}

/// Paired t-test and Wilcoxon test on per-user nDCG, first run vs the rest.
fn compare_runs(runs: &[LoadedRun], ctx: &EvaluationContext) -> Vec<Comparison> {
    let Some((baseline, candidates)) = runs.split_first() else {
        return Vec::new();
    };
    let baseline_scores = Ndcg::new(&baseline.recs, ctx);

    candidates
        .iter()
        .map(|candidate| {
            let candidate_scores = Ndcg::new(&candidate.recs, ctx);
            let mut comparison = Comparison {
                metric: NDCG.to_string(),
                baseline: baseline.name.clone(),
                candidate: candidate.name.clone(),
                users: 0,
                ttest: None,
                wilcoxon: None,
                note: None,
            };

            // Candidate first so a positive t means the candidate scores higher
            match paired_scores(
                candidate_scores.per_user_score(),
                baseline_scores.per_user_score(),
            ) {
                Ok(pairs) => {
                    comparison.users = pairs.len();
                    comparison.ttest = paired_ttest(&pairs).ok();
                    comparison.wilcoxon = wilcoxon_signed_rank(&pairs).ok();
                    if comparison.ttest.is_none() || comparison.wilcoxon.is_none() {
                        comparison.note = Some("too few differing users for some tests".into());
                    }
                }
                Err(e) => {
                    warn!(candidate = %candidate.name, error = %e, "Skipping comparison");
                    comparison.note = Some(e.to_string());
                }
            }
            comparison
        })
        .collect()
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Reject unknown metric names before touching any data
    if args.metrics.is_empty() {
        bail!("No metrics requested");
    }
    let registry = MetricRegistry::with_defaults();
    registry.validate(args.metrics.as_slice())?;

    let eval_config = config::resolve(
        args.config.as_deref(),
        Overrides {
            cutoff: args.cutoff,
            relevance_threshold: args.threshold,
            pop_ratio: args.pop_ratio,
        },
    )?;

    let mut split = datasets::load_split(&args.train, &args.test).with_context(|| {
        format!(
            "Failed to load split from {} and {}",
            args.train.display(),
            args.test.display()
        )
    })?;

    let mut runs = Vec::with_capacity(args.runs.len());
    for spec in &args.runs {
        let recs = datasets::load_recommendations(&spec.path, &mut split.users, &mut split.items)
            .with_context(|| format!("Failed to load run '{}'", spec.name))?;
        runs.push(LoadedRun {
            name: spec.name.clone(),
            recs,
        });
    }

    let dataset = DatasetInfo {
        train_users: split.train.num_users(),
        train_interactions: split.train.num_interactions(),
        test_users: split.test.num_users(),
        items: split.items.len(),
    };
    let users = split.users;
    let ctx = EvaluationContext::new(eval_config, split.test, split.train)
        .context("Invalid evaluation configuration")?;
    let evaluator = Evaluator::new(registry);

    let pb = create_progress_bar((runs.len() * args.metrics.len()) as u64, args.json);
    let mut run_reports = Vec::with_capacity(runs.len());
    for run in &runs {
        run_reports.push(evaluate_run(run, &args, &evaluator, &ctx, &users, &pb)?);
    }
    pb.finish_and_clear();

    let comparisons = if args.compare {
        if runs.len() < 2 {
            warn!("--compare needs at least two runs");
        }
        compare_runs(&runs, &ctx)
    } else {
        Vec::new()
    };

    let failed = run_reports
        .iter()
        .flat_map(|r| &r.metrics)
        .filter(|m| m.error.is_some())
        .count();
    info!(runs = runs.len(), failed, "Evaluation complete");

    let report = EvalReport {
        config: *ctx.config(),
        dataset,
        runs: run_reports,
        comparisons,
    };

    if args.json {
        println!("{}", output::format_json(&report)?);
    } else {
        print!("{}", output::format_human(&report));
    }

    Ok(())
}
