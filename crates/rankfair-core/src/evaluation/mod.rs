//! Evaluation of ranked recommendation lists.
//!
//! # Overview
//!
//! An evaluation run has three inputs, all immutable once loaded:
//! - **Training interactions**: what each user consumed before the split
//! - **Test interactions**: graded ground truth (`user -> item -> gain`)
//! - **Recommendations**: one ranked list per user, highest score first
//!
//! From the first two an [`EvaluationContext`] is built once. It holds the
//! graded [`Relevance`] model, its binary view, and the [`Popularity`] model
//! with memoized short-head / long-tail strata. Every metric reads that
//! context concurrently; none of them mutates it.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`relevance`] | Graded and binary ground truth, shared rank discount |
//! | [`popularity`] | Item popularity and short-head / long-tail strata |
//! | [`metrics`] | The `Metric` trait and its implementations |
//! | [`registry`] | Name -> factory lookup table |
//! | [`evaluator`] | Runs named metrics, isolating per-metric failures |
//! | [`stats`] | Paired significance tests between runs |
//! | [`datasets`] | TSV loaders for splits and runs |
//!
//! # Example
//!
//! ```ignore
//! use rankfair_core::config::EvalConfig;
//! use rankfair_core::evaluation::{datasets, EvaluationContext, Evaluator};
//!
//! let mut split = datasets::load_split(train_path, test_path)?;
//! let recs = datasets::load_recommendations(run_path, &mut split.users, &mut split.items)?;
//! let ctx = EvaluationContext::new(EvalConfig::default(), split.test, split.train)?;
//!
//! for outcome in Evaluator::default().evaluate(&["nDCG", "ExtendedPopREO"], &recs, &ctx)? {
//!     match outcome.result {
//!         Ok(report) => println!("{}: {:.4}", outcome.name, report.aggregate),
//!         Err(e) => println!("{}: {}", outcome.name, e),
//!     }
//! }
//! ```

pub mod context;
pub mod datasets;
pub mod evaluator;
pub mod interactions;
pub mod metrics;
pub mod popularity;
pub mod registry;
pub mod relevance;
pub mod stats;

pub use context::EvaluationContext;
pub use evaluator::{Evaluator, MetricOutcome};
pub use interactions::{Recommendations, TrainingInteractions};
pub use metrics::{Metric, MetricParams, MetricReport};
pub use popularity::{Popularity, PopularityStrata, Stratum};
pub use registry::MetricRegistry;
pub use relevance::{ranking_discount, BinaryRelevance, GainMap, Relevance};
pub use stats::{bootstrap_ci, paired_scores, paired_ttest, wilcoxon_signed_rank};
