//! Test utilities for rankfair-core.
//!
//! Shorthand constructors for identifiers, training sets, recommendation
//! lists and contexts. Only compiled when running tests.

use crate::config::EvalConfig;
use crate::evaluation::context::EvaluationContext;
use crate::evaluation::interactions::{Recommendations, TrainingInteractions};
use crate::evaluation::relevance::Relevance;
use crate::types::{ItemId, UserId};

pub fn user(id: u64) -> UserId {
    UserId::from_u64(id)
}

pub fn item(id: u64) -> ItemId {
    ItemId::from_u64(id)
}

/// Training set from `(user, [items])` rows.
pub fn training(rows: &[(u64, &[u64])]) -> TrainingInteractions {
    TrainingInteractions::from_pairs(
        rows.iter()
            .flat_map(|(u, items)| items.iter().map(move |&i| (user(*u), item(i)))),
    )
}

/// Recommendation lists from `(user, [items in rank order])` rows.
///
/// Scores decrease with rank so they agree with the given order.
pub fn recommendations(rows: &[(u64, &[u64])]) -> Recommendations {
    let mut recs = Recommendations::default();
    for (u, items) in rows {
        for (rank, &i) in items.iter().enumerate() {
            recs.push(user(*u), item(i), 1.0 - rank as f32 * 0.01);
        }
    }
    recs
}

/// Graded relevance from `(user, item, gain)` triples.
pub fn relevance(triples: &[(u64, u64, f64)]) -> Relevance {
    Relevance::from_triples(triples.iter().map(|&(u, i, g)| (user(u), item(i), g)))
        .expect("test gains are valid")
}

/// Context with the given cutoff and default threshold/ratio.
pub fn context(
    cutoff: usize,
    test: &[(u64, u64, f64)],
    train: &[(u64, &[u64])],
) -> EvaluationContext {
    let config = EvalConfig {
        cutoff,
        ..Default::default()
    };
    EvaluationContext::new(config, relevance(test), training(train)).expect("valid test config")
}
