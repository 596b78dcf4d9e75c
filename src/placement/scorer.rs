/*!
 * Weighted utility scoring and deterministic ranking of resolver estimates.
 */

use std::cmp::Ordering;

use super::models::{Estimate, ResolverScore, ScoringWeights};

/// Maximise accuracy, minimise cost and latency
pub fn score(estimate: &Estimate, weights: &ScoringWeights) -> f64 {
    weights.accuracy * estimate.accuracy - weights.cost * estimate.cost - weights.latency * estimate.latency
}

/// Score and sort estimates
///
/// Order: score desc, accuracy desc, cost asc, latency asc, resolver id asc. The
/// final lexical key makes identical estimates rank the same way regardless of
/// input order.
pub fn rank_scores(estimates: &[Estimate], weights: &ScoringWeights) -> Vec<ResolverScore> {
    let mut scores: Vec<ResolverScore> = estimates
        .iter()
        .map(|estimate| ResolverScore {
            estimate: estimate.clone(),
            score: score(estimate, weights),
        })
        .collect();

    scores.sort_by(compare_scores);
    scores
}

fn compare_scores(a: &ResolverScore, b: &ResolverScore) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.estimate.accuracy.total_cmp(&a.estimate.accuracy))
        .then_with(|| a.estimate.cost.total_cmp(&b.estimate.cost))
        .then_with(|| a.estimate.latency.total_cmp(&b.estimate.latency))
        .then_with(|| a.estimate.resolver_id.cmp(&b.estimate.resolver_id))
}
