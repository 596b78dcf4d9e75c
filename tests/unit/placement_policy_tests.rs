/*!
 * Tests for policy layering and estimate ranking
 */

use std::sync::Arc;
use std::time::Duration;

use backoffice::placement::models::{Estimate, ExecutionLimits, PolicyOverlay, ScoringWeights};
use backoffice::placement::policy::{PolicyResolver, sanitize};
use backoffice::placement::resolvers::default_registry;
use backoffice::placement::scorer::rank_scores;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn test_sanitize_withDuplicatesAndBlanks_shouldKeepFirstLowercased() {
    let ids = strings(&[" Native_PDF ", "", "native_pdf", "TEXT_ANCHOR"]);
    assert_eq!(sanitize(&ids), vec!["native_pdf", "text_anchor"]);
}

#[test]
fn test_resolve_layers_shouldApplyInPrecedenceOrder() {
    let registry = Arc::new(default_registry());
    let policies = PolicyResolver::new(Arc::clone(&registry))
        .with_system(PolicyOverlay {
            weights: ScoringWeights::new(0.5, 0.3, 0.2),
            limits: ExecutionLimits::new(2.0, Duration::from_secs(30)),
            ..Default::default()
        })
        .with_org(
            "acme",
            PolicyOverlay {
                weights: ScoringWeights::new(0.9, 0.0, 0.0),
                limits: ExecutionLimits::new(1.0, Duration::ZERO),
                ..Default::default()
            },
        )
        .with_user(
            "dana",
            PolicyOverlay {
                limits: ExecutionLimits::new(0.0, Duration::from_secs(5)),
                ..Default::default()
            },
        );

    let policy = policies.resolve(Some("acme"), Some("dana"), None).unwrap();

    assert_eq!(policy.weights, ScoringWeights::new(0.9, 0.3, 0.2));
    assert_eq!(policy.limits.max_budget, 1.0);
    assert_eq!(policy.limits.max_time, Duration::from_secs(5));
    assert_eq!(policy.enabled_resolvers, registry.ordered_ids());
}

#[test]
fn test_resolve_unknownOrgAndUser_shouldUseSystemOnly() {
    let registry = Arc::new(default_registry());
    let policies = PolicyResolver::new(registry).with_system(PolicyOverlay {
        enabled_resolvers: strings(&["AI", "ai", " native_pdf"]),
        ..Default::default()
    });

    let policy = policies.resolve(Some("nobody"), Some("nobody"), None).unwrap();

    assert_eq!(policy.enabled_resolvers, vec!["ai", "native_pdf"]);
    assert_eq!(policy.weights, ScoringWeights::BASELINE);
}

#[test]
fn test_rankScores_identicalEstimates_shouldBreakTiesById() {
    let weights = ScoringWeights::BASELINE;
    let estimates = vec![
        Estimate::new("zeta", 0.7, 0.2, 0.2, "x"),
        Estimate::new("alpha", 0.7, 0.2, 0.2, "x"),
        Estimate::new("cheap", 0.7, 0.1, 0.2, "x"),
    ];

    let ranked = rank_scores(&estimates, &weights);
    let ids: Vec<&str> = ranked.iter().map(|s| s.resolver_id()).collect();

    assert_eq!(ids, vec!["cheap", "alpha", "zeta"]);
}

#[test]
fn test_rankScores_equalScores_shouldPreferAccuracyThenCost() {
    // Both score exactly 0.5
    let weights = ScoringWeights::new(1.0, 1.0, 0.0);
    let estimates = vec![
        Estimate::new("cheap", 0.625, 0.125, 0.0, "x"),
        Estimate::new("accurate", 0.75, 0.25, 0.0, "x"),
    ];

    let ranked = rank_scores(&estimates, &weights);

    assert_eq!(ranked[0].resolver_id(), "accurate");
}
