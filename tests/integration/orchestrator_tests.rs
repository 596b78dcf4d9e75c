/*!
 * End-to-end orchestrator runs against scripted resolvers
 */

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use backoffice::errors::ResolverError;
use backoffice::placement::models::{ExecutionLimits, PolicyOverlay, ReasonCode, RunInput, RunStatus, ScoringWeights};
use backoffice::placement::{CancellationSignal, Orchestrator, PolicyResolver, ResolverRegistry, SystemClock};

use crate::common::mock_resolvers::{Delay, ScriptedResolver, registry_of};
use crate::common::{FixedClock, field_definitions, init_logging};

fn orchestrator(registry: Arc<ResolverRegistry>, system: PolicyOverlay) -> Orchestrator {
    let policies = PolicyResolver::new(Arc::clone(&registry)).with_system(system);
    Orchestrator::new(registry, policies, FixedClock::shared()).unwrap()
}

fn input(fields: usize) -> RunInput {
    RunInput {
        agreement_id: "agreement-1".to_string(),
        created_by_user_id: "user-1".to_string(),
        run_id: Some("run-1".to_string()),
        field_definitions: field_definitions(fields),
        page_count: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_run_mergeAndRank_shouldAcceptHigherScoredResolver() {
    init_logging();
    let a = ScriptedResolver::new("resolver-a", 0.4, 0.1, 0.1).suggests("field-1", 0.35);
    let b = ScriptedResolver::new("resolver-b", 0.9, 0.2, 0.2).suggests("field-1", 0.90);
    let registry = registry_of(vec![a, b]);
    let system = PolicyOverlay {
        weights: ScoringWeights::new(1.0, 0.1, 0.1),
        ..Default::default()
    };

    let run = orchestrator(registry, system).run(input(1)).await.unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.reason_code, ReasonCode::ResolvedAll);
    assert_eq!(run.suggestions.len(), 1);
    assert_eq!(run.suggestions[0].resolver_id, "resolver-b");
    assert_eq!(run.scores[0].resolver_id(), "resolver-b");
    assert_eq!(run.selected_source, "resolver-b");
    assert!(run.unresolved_definition_ids.is_empty());
}

#[tokio::test]
async fn test_run_budgetLimit_shouldStopBeforeSecondResolver() {
    init_logging();
    let first = ScriptedResolver::new("first", 0.9, 0.6, 0.1).suggests("field-1", 0.8);
    let second = ScriptedResolver::new("second", 0.8, 0.6, 0.1).suggests("field-2", 0.8);
    let second_calls = second.calls();
    let registry = registry_of(vec![first, second]);
    let system = PolicyOverlay {
        limits: ExecutionLimits::new(0.7, Duration::ZERO),
        ..Default::default()
    };

    let run = orchestrator(registry, system).run(input(2)).await.unwrap();

    assert_eq!(run.status, RunStatus::Partial);
    assert_eq!(run.reason_code, ReasonCode::BudgetExhausted);
    assert_eq!(run.suggestions.len(), 1);
    assert_eq!(run.unresolved_definition_ids, vec!["field-2"]);
    assert_eq!(run.executed_resolvers, vec!["first"]);
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    assert!(run.budget_used <= 0.7);
}

#[tokio::test]
async fn test_run_budgetLimitWithNothingAccepted_shouldReportBudgetExhausted() {
    let only = ScriptedResolver::new("expensive", 0.9, 1.5, 0.1).suggests("field-1", 0.8);
    let registry = registry_of(vec![only]);
    let system = PolicyOverlay {
        limits: ExecutionLimits::new(1.0, Duration::ZERO),
        ..Default::default()
    };

    let run = orchestrator(registry, system).run(input(1)).await.unwrap();

    assert_eq!(run.status, RunStatus::BudgetExhausted);
    assert_eq!(run.reason_code, ReasonCode::BudgetExhausted);
    assert!(run.executed_resolvers.is_empty());
    assert_eq!(run.budget_used, 0.0);
}

#[tokio::test]
async fn test_run_timeLimit_shouldStopAfterSlowResolver() {
    init_logging();
    let slow = ScriptedResolver::new("slow", 0.9, 0.1, 0.1)
        .suggests("field-1", 0.8)
        .delayed(Delay::Blocking(Duration::from_millis(60)));
    let next = ScriptedResolver::new("next", 0.5, 0.1, 0.1).suggests("field-2", 0.8);
    let next_calls = next.calls();
    let registry = registry_of(vec![slow, next]);
    let policies = PolicyResolver::new(Arc::clone(&registry)).with_system(PolicyOverlay {
        limits: ExecutionLimits::new(0.0, Duration::from_millis(10)),
        ..Default::default()
    });
    let orchestrator = Orchestrator::new(registry, policies, Arc::new(SystemClock)).unwrap();

    let run = orchestrator.run(input(2)).await.unwrap();

    assert_eq!(run.status, RunStatus::Partial);
    assert_eq!(run.reason_code, ReasonCode::TimedOut);
    assert_eq!(run.suggestions.len(), 1);
    assert_eq!(next_calls.load(Ordering::SeqCst), 0);
    assert!(run.elapsed >= Duration::from_millis(10));
}

#[tokio::test]
async fn test_run_cooperativeResolverAtDeadline_shouldReportTimedOut() {
    let waiting = ScriptedResolver::new("waiting", 0.9, 0.1, 0.1)
        .suggests("field-1", 0.8)
        .delayed(Delay::Cooperative(Duration::from_secs(5)));
    let registry = registry_of(vec![waiting]);
    let policies = PolicyResolver::new(Arc::clone(&registry)).with_system(PolicyOverlay {
        limits: ExecutionLimits::new(0.0, Duration::from_millis(10)),
        ..Default::default()
    });
    let orchestrator = Orchestrator::new(registry, policies, Arc::new(SystemClock)).unwrap();

    let run = orchestrator.run(input(1)).await.unwrap();

    assert_eq!(run.status, RunStatus::TimedOut);
    assert_eq!(run.reason_code, ReasonCode::TimedOut);
    assert!(run.suggestions.is_empty());
    assert!(run.elapsed < Duration::from_secs(5));
}

#[tokio::test]
async fn test_run_frozenClockCooperativeResolver_shouldReportTimedOut() {
    let waiting = ScriptedResolver::new("waiting", 0.9, 0.1, 0.1)
        .suggests("field-1", 0.8)
        .delayed(Delay::Cooperative(Duration::from_secs(5)));
    let registry = registry_of(vec![waiting]);
    let policies = PolicyResolver::new(Arc::clone(&registry)).with_system(PolicyOverlay {
        limits: ExecutionLimits::new(0.0, Duration::from_millis(10)),
        ..Default::default()
    });
    let orchestrator = Orchestrator::new(registry, policies, FixedClock::shared()).unwrap();

    let run = orchestrator.run(input(1)).await.unwrap();

    assert_eq!(run.status, RunStatus::TimedOut);
    assert_eq!(run.reason_code, ReasonCode::TimedOut);
    assert_eq!(run.created_at, FixedClock::new().0);
    assert_eq!(run.completed_at, run.created_at);
}

#[tokio::test]
async fn test_run_frozenClockBlockingResolver_shouldStopBeforeNextResolver() {
    let slow = ScriptedResolver::new("slow", 0.9, 0.1, 0.1)
        .suggests("field-1", 0.8)
        .delayed(Delay::Blocking(Duration::from_millis(60)));
    let next = ScriptedResolver::new("next", 0.5, 0.1, 0.1).suggests("field-2", 0.8);
    let next_calls = next.calls();
    let registry = registry_of(vec![slow, next]);
    let policies = PolicyResolver::new(Arc::clone(&registry)).with_system(PolicyOverlay {
        limits: ExecutionLimits::new(0.0, Duration::from_millis(10)),
        ..Default::default()
    });
    let orchestrator = Orchestrator::new(registry, policies, FixedClock::shared()).unwrap();

    let run = orchestrator.run(input(2)).await.unwrap();

    assert_eq!(run.status, RunStatus::Partial);
    assert_eq!(run.reason_code, ReasonCode::TimedOut);
    assert_eq!(next_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_run_shortCircuitReason_shouldPassThrough() {
    let stopper = ScriptedResolver::new("stopper", 0.9, 0.1, 0.1)
        .suggests("field-1", 0.8)
        .terminating("resolver_policy_short_circuit");
    let after = ScriptedResolver::new("after", 0.5, 0.1, 0.1).suggests("field-2", 0.8);
    let after_calls = after.calls();
    let registry = registry_of(vec![stopper, after]);

    let run = orchestrator(registry, PolicyOverlay::default())
        .run(input(2))
        .await
        .unwrap();

    assert_eq!(run.reason_code.as_str(), "resolver_policy_short_circuit");
    assert_eq!(run.status, RunStatus::Partial);
    assert_eq!(run.suggestions.len(), 1);
    assert_eq!(after_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_run_shortCircuitWithoutReason_shouldUseDefaultCode() {
    let stopper = ScriptedResolver::new("stopper", 0.9, 0.1, 0.1).terminating("  ");
    let registry = registry_of(vec![stopper]);

    let run = orchestrator(registry, PolicyOverlay::default())
        .run(input(1))
        .await
        .unwrap();

    assert_eq!(run.reason_code, ReasonCode::ResolverShortCircuit);
}

#[tokio::test]
async fn test_run_resolverError_shouldKeepEarlierSuggestions() {
    let good = ScriptedResolver::new("good", 0.9, 0.1, 0.1).suggests("field-1", 0.8);
    let bad = ScriptedResolver::new("bad", 0.5, 0.1, 0.1).failing(ResolverError::Failed("boom".to_string()));
    let registry = registry_of(vec![good, bad]);

    let run = orchestrator(registry, PolicyOverlay::default())
        .run(input(2))
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Partial);
    assert_eq!(run.reason_code, ReasonCode::ResolverError);
    assert_eq!(run.suggestions.len(), 1);
    assert_eq!(run.executed_resolvers, vec!["good", "bad"]);
    assert_eq!(run.unresolved_definition_ids, vec!["field-2"]);
}

#[tokio::test]
async fn test_run_failingEstimate_shouldBecomeUnsupported() {
    let broken = ScriptedResolver::new("broken", 0.9, 0.1, 0.1).failing_estimate();
    let working = ScriptedResolver::new("working", 0.5, 0.1, 0.1).suggests("field-1", 0.7);
    let broken_calls = broken.calls();
    let registry = registry_of(vec![broken, working]);

    let run = orchestrator(registry, PolicyOverlay::default())
        .run(input(1))
        .await
        .unwrap();

    let broken_estimate = run.estimates.iter().find(|e| e.resolver_id == "broken").unwrap();
    assert!(!broken_estimate.supported);
    assert_eq!(broken_calls.load(Ordering::SeqCst), 0);
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_run_allUnsupported_shouldFallBackToEnabledOrder() {
    let first = ScriptedResolver::new("first", 0.0, 0.0, 0.0).unsupported().suggests("field-1", 0.4);
    let second = ScriptedResolver::new("second", 0.0, 0.0, 0.0).unsupported().suggests("field-2", 0.4);
    let registry = registry_of(vec![first, second]);

    let run = orchestrator(registry, PolicyOverlay::default())
        .run(input(2))
        .await
        .unwrap();

    assert_eq!(run.executed_resolvers, vec!["first", "second"]);
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_run_hardOrder_shouldOverrideRanking() {
    let strong = ScriptedResolver::new("strong", 0.9, 0.1, 0.1).suggests("field-1", 0.9);
    let weak = ScriptedResolver::new("weak", 0.1, 0.1, 0.1).suggests("field-1", 0.4);
    let registry = registry_of(vec![strong, weak]);
    let system = PolicyOverlay {
        hard_order: vec!["WEAK".to_string(), "strong".to_string()],
        ..Default::default()
    };

    let run = orchestrator(registry, system).run(input(1)).await.unwrap();

    assert_eq!(run.resolver_order, vec!["weak", "strong"]);
    assert_eq!(run.executed_resolvers, vec!["weak"]);
    assert_eq!(run.suggestions[0].resolver_id, "weak");
}

#[tokio::test]
async fn test_run_existingPlacements_shouldBeExcluded() {
    let resolver = ScriptedResolver::new("r", 0.9, 0.1, 0.1).suggests("field-1", 0.9);
    let calls = resolver.calls();
    let registry = registry_of(vec![resolver]);
    let mut run_input = input(1);
    run_input.existing_placements = vec![backoffice::placement::models::ExistingPlacement {
        field_definition_id: " field-1 ".to_string(),
        geometry: backoffice::placement::models::Geometry::new(1, 0.0, 0.0, 10.0, 10.0),
    }];

    let run = orchestrator(registry, PolicyOverlay::default())
        .run(run_input)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.reason_code, ReasonCode::ResolvedAll);
    assert!(run.suggestions.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_run_callerCancelled_shouldReturnPartialRun() {
    let resolver = ScriptedResolver::new("r", 0.9, 0.1, 0.1).suggests("field-1", 0.9);
    let calls = resolver.calls();
    let registry = registry_of(vec![resolver]);
    let cancel = CancellationSignal::new();
    cancel.cancel();
    let mut run_input = input(1);
    run_input.cancel = Some(cancel);

    let run = orchestrator(registry, PolicyOverlay::default())
        .run(run_input)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Partial);
    assert_eq!(run.reason_code, ReasonCode::ResolverError);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_run_unresolvedLeft_shouldReportUnresolvedFields() {
    let resolver = ScriptedResolver::new("r", 0.9, 0.1, 0.1).suggests("field-1", 0.9);
    let registry = registry_of(vec![resolver]);

    let run = orchestrator(registry, PolicyOverlay::default())
        .run(input(3))
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Partial);
    assert_eq!(run.reason_code, ReasonCode::UnresolvedFields);
    assert_eq!(run.unresolved_definition_ids, vec!["field-2", "field-3"]);
}

#[test]
fn test_new_emptyRegistry_shouldFail() {
    let registry = Arc::new(ResolverRegistry::new());
    assert!(Orchestrator::with_registry(registry).is_err());
}

// Properties

#[tokio::test]
async fn test_property_identicalRuns_shouldBeDeterministic() {
    let make = || {
        registry_of(vec![
            ScriptedResolver::new("zeta", 0.7, 0.2, 0.2).suggests("field-1", 0.6).suggests("field-2", 0.9),
            ScriptedResolver::new("alpha", 0.7, 0.2, 0.2).suggests("field-1", 0.6),
            ScriptedResolver::new("mid", 0.5, 0.1, 0.1).suggests("field-3", 0.5),
        ])
    };
    let first = orchestrator(make(), PolicyOverlay::default()).run(input(3)).await.unwrap();
    let second = orchestrator(make(), PolicyOverlay::default()).run(input(3)).await.unwrap();

    assert_eq!(first.scores, second.scores);
    assert_eq!(first.suggestions, second.suggestions);
    assert_eq!(first.reason_code, second.reason_code);
    // Equal scores tie-break lexically
    assert_eq!(first.scores[0].resolver_id(), "alpha");
    assert_eq!(first.scores[1].resolver_id(), "zeta");
}

#[tokio::test]
async fn test_property_budget_shouldNeverExceedLimit() {
    for max_budget in [0.25, 0.5, 0.75, 1.0, 1.3] {
        let registry = registry_of(vec![
            ScriptedResolver::new("a", 0.9, 0.3, 0.1).suggests("field-1", 0.5),
            ScriptedResolver::new("b", 0.8, 0.3, 0.1).suggests("field-2", 0.5),
            ScriptedResolver::new("c", 0.7, 0.3, 0.1).suggests("field-3", 0.5),
            ScriptedResolver::new("d", 0.6, 0.3, 0.1).suggests("field-4", 0.5),
        ]);
        let system = PolicyOverlay {
            limits: ExecutionLimits::new(max_budget, Duration::ZERO),
            ..Default::default()
        };
        let run = orchestrator(registry, system).run(input(4)).await.unwrap();

        let executed_cost: f64 = run
            .estimates
            .iter()
            .filter(|e| run.executed_resolvers.contains(&e.resolver_id))
            .map(|e| e.cost)
            .sum();
        assert!(run.budget_used <= executed_cost + 1e-9);
        assert!(run.budget_used <= max_budget + 1e-9, "budget {} > {}", run.budget_used, max_budget);
    }
}

#[tokio::test]
async fn test_property_acceptedAndUnresolved_shouldPartitionInitialSet() {
    let registry = registry_of(vec![
        ScriptedResolver::new("a", 0.9, 0.1, 0.1).suggests("field-2", 0.5).suggests("ghost", 0.9),
        ScriptedResolver::new("b", 0.8, 0.1, 0.1).suggests("field-4", 0.5),
    ]);

    let run = orchestrator(registry, PolicyOverlay::default()).run(input(5)).await.unwrap();

    let initial: HashSet<String> = field_definitions(5).into_iter().map(|d| d.id).collect();
    let accepted: HashSet<String> = run.suggestions.iter().map(|s| s.field_definition_id.clone()).collect();
    let unresolved: HashSet<String> = run.unresolved_definition_ids.iter().cloned().collect();

    assert!(accepted.is_disjoint(&unresolved));
    assert!(accepted.union(&unresolved).all(|id| initial.contains(id)));
    assert_eq!(accepted.len() + unresolved.len(), 5);
}

#[tokio::test]
async fn test_property_perRunOverride_shouldWin() {
    let registry = registry_of(vec![
        ScriptedResolver::new("a", 0.9, 0.1, 0.1).suggests("field-1", 0.5),
        ScriptedResolver::new("b", 0.8, 0.1, 0.1).suggests("field-1", 0.5),
    ]);
    let policies = PolicyResolver::new(Arc::clone(&registry))
        .with_system(PolicyOverlay {
            enabled_resolvers: vec!["a".to_string(), "b".to_string()],
            limits: ExecutionLimits::new(5.0, Duration::ZERO),
            ..Default::default()
        })
        .with_org(
            "org-1",
            PolicyOverlay {
                enabled_resolvers: vec!["a".to_string()],
                ..Default::default()
            },
        );
    let orchestrator = Orchestrator::new(registry, policies, FixedClock::shared()).unwrap();

    let mut run_input = input(1);
    run_input.org_id = Some("org-1".to_string());
    run_input.policy_override = Some(PolicyOverlay {
        enabled_resolvers: vec!["b".to_string()],
        ..Default::default()
    });
    let run = orchestrator.run(run_input).await.unwrap();

    assert_eq!(run.policy.enabled_resolvers, vec!["b"]);
    assert_eq!(run.policy.limits.max_budget, 5.0);
    assert_eq!(run.executed_resolvers, vec!["b"]);
}
