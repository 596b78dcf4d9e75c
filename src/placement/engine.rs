/*!
 * Placement orchestrator.
 *
 * One run resolves the effective policy, collects an estimate from every
 * candidate resolver, ranks them, and then invokes resolvers one at a time in
 * execution order until every field is placed or a limit, error or
 * short-circuit stops the loop. Resolvers run sequentially so budget and time
 * accounting stay exact.
 */

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::errors::{PlacementError, ResolverError};

use super::models::{Estimate, ReasonCode, Run, RunInput, RunStatus, Suggestion};
use super::policy::PolicyResolver;
use super::registry::ResolverRegistry;
use super::resolvers::ResolveInput;
use super::scorer::rank_scores;

/// Source of wall-clock time for a run
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Runs placement requests against a fixed registry snapshot
#[derive(Debug, Clone)]
pub struct Orchestrator {
    registry: Arc<ResolverRegistry>,
    policies: Arc<PolicyResolver>,
    clock: Arc<dyn Clock>,
}

/// Why the execution loop stopped early
struct Stop {
    status: RunStatus,
    reason: ReasonCode,
}

impl Orchestrator {
    /// Build an orchestrator; fails when no resolver is registered
    pub fn new(
        registry: Arc<ResolverRegistry>,
        policies: PolicyResolver,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PlacementError> {
        if registry.is_empty() {
            return Err(PlacementError::Configuration(
                "resolver registry is empty".to_string(),
            ));
        }
        // Surface an unusable system policy at construction, not inside a run
        policies.resolve(None, None, None)?;

        Ok(Self {
            registry,
            policies: Arc::new(policies),
            clock,
        })
    }

    /// Orchestrator over the given registry with no policy overlays
    pub fn with_registry(registry: Arc<ResolverRegistry>) -> Result<Self, PlacementError> {
        let policies = PolicyResolver::new(Arc::clone(&registry));
        Self::new(registry, policies, Arc::new(SystemClock))
    }

    pub fn registry(&self) -> &Arc<ResolverRegistry> {
        &self.registry
    }

    /// Execute one placement run
    ///
    /// Resolver failures, limit breaches and cancellation are reported through
    /// the returned run's status; only a policy that cannot be resolved is an error.
    pub async fn run(&self, input: RunInput) -> Result<Run, PlacementError> {
        // Timestamps come from the clock; limits and resolver deadlines share one monotonic timer
        let started_at = self.clock.now();
        let started = tokio::time::Instant::now();

        let policy = self.policies.resolve(
            input.org_id.as_deref(),
            input.user_id.as_deref(),
            input.policy_override.as_ref(),
        )?;

        let resolver_order = if !policy.hard_order.is_empty() {
            policy.hard_order.clone()
        } else if !policy.enabled_resolvers.is_empty() {
            policy.enabled_resolvers.clone()
        } else {
            self.registry.ordered_ids()
        };

        let run_id = input
            .run_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut run = Run {
            id: run_id,
            agreement_id: input.agreement_id.clone(),
            created_by_user_id: input.created_by_user_id.clone(),
            created_at: started_at,
            completed_at: started_at,
            elapsed: Duration::ZERO,
            policy: policy.clone(),
            resolver_order: resolver_order.clone(),
            executed_resolvers: Vec::new(),
            estimates: Vec::new(),
            scores: Vec::new(),
            budget_used: 0.0,
            suggestions: Vec::new(),
            unresolved_definition_ids: Vec::new(),
            selected_source: String::new(),
            status: RunStatus::Completed,
            reason_code: ReasonCode::ResolvedAll,
        };

        let placed: HashSet<&str> = input
            .existing_placements
            .iter()
            .map(|p| p.field_definition_id.trim())
            .collect();
        let initial: Vec<_> = input
            .field_definitions
            .iter()
            .filter(|d| !placed.contains(d.id.trim()))
            .cloned()
            .collect();

        let initial_ids: HashSet<String> = initial.iter().map(|d| d.id.trim().to_string()).collect();

        if initial.is_empty() {
            info!("Placement run {}: nothing to resolve", run.id);
            return Ok(run);
        }

        let caller_cancel = input.cancel.clone().unwrap_or_default();
        let limits = policy.limits;
        let base_input = ResolveInput {
            document: Arc::from(input.document),
            page_count: input.page_count,
            definitions: initial.clone(),
            existing_placements: input.existing_placements,
            native_fields: input.native_fields,
            remaining_budget: None,
            remaining_time: None,
            cancel: caller_cancel.clone(),
        };

        // Estimates in resolver order; a failing estimate becomes unsupported
        for id in &resolver_order {
            let Some(registration) = self.registry.resolve(id) else {
                debug!("Resolver '{}' is not registered, skipping estimate", id);
                continue;
            };
            let estimate = match registration.resolver.estimate(&base_input).await {
                Ok(mut estimate) => {
                    estimate.resolver_id = registration.id.clone();
                    estimate
                }
                Err(e) => {
                    warn!("Estimate failed for resolver '{}': {}", registration.id, e);
                    Estimate::unsupported(&registration.id, &e.to_string())
                }
            };
            run.estimates.push(estimate);
        }

        run.scores = rank_scores(&run.estimates, &policy.weights);

        let execution_order: Vec<String> = if !policy.hard_order.is_empty() {
            policy.hard_order.clone()
        } else {
            let ranked: Vec<String> = run
                .scores
                .iter()
                .filter(|s| s.estimate.supported)
                .map(|s| s.resolver_id().to_string())
                .collect();
            if ranked.is_empty() {
                policy.enabled_resolvers.clone()
            } else {
                ranked
            }
        };

        let estimates: HashMap<&str, &Estimate> = run
            .estimates
            .iter()
            .map(|e| (e.resolver_id.as_str(), e))
            .collect();

        let mut accepted: BTreeMap<String, Suggestion> = BTreeMap::new();
        let mut budget_used = 0.0;
        let mut executed = Vec::new();
        let mut stop: Option<Stop> = None;

        for id in &execution_order {
            let Some(registration) = self.registry.resolve(id) else {
                debug!("Resolver '{}' is not registered, skipping", id);
                continue;
            };
            let cost = estimates
                .get(registration.id.as_str())
                .map(|e| e.cost)
                .unwrap_or(0.0);

            if caller_cancel.is_cancelled() {
                info!("Placement run {} cancelled by caller", run.id);
                stop = Some(Stop {
                    status: RunStatus::Partial,
                    reason: ReasonCode::ResolverError,
                });
                break;
            }
            if limits.max_budget > 0.0 && budget_used + cost > limits.max_budget {
                info!(
                    "Placement run {} budget exhausted before '{}' ({:.2} + {:.2} > {:.2})",
                    run.id, registration.id, budget_used, cost, limits.max_budget
                );
                stop = Some(Stop {
                    status: RunStatus::BudgetExhausted,
                    reason: ReasonCode::BudgetExhausted,
                });
                break;
            }
            let elapsed = started.elapsed();
            if !limits.max_time.is_zero() && elapsed >= limits.max_time {
                info!("Placement run {} timed out before '{}'", run.id, registration.id);
                stop = Some(Stop {
                    status: RunStatus::TimedOut,
                    reason: ReasonCode::TimedOut,
                });
                break;
            }

            let unresolved: Vec<_> = initial
                .iter()
                .filter(|d| !accepted.contains_key(d.id.trim()))
                .cloned()
                .collect();
            if unresolved.is_empty() {
                break;
            }

            let mut scoped = base_input.clone();
            scoped.definitions = unresolved;
            if limits.max_budget > 0.0 {
                scoped.remaining_budget = Some((limits.max_budget - budget_used).max(0.0));
            }
            if !limits.max_time.is_zero() {
                let slack = limits.max_time.saturating_sub(elapsed);
                scoped.remaining_time = Some(slack);
                scoped.cancel = caller_cancel.with_deadline(started + limits.max_time);
            }

            debug!("Placement run {} invoking resolver '{}'", run.id, registration.id);
            let outcome = registration.resolver.resolve(&scoped).await;

            executed.push(registration.id.clone());
            budget_used += cost;

            let result = match outcome {
                Ok(result) => result,
                Err(ResolverError::Cancelled)
                    if !caller_cancel.is_cancelled()
                        && !limits.max_time.is_zero()
                        && started.elapsed() >= limits.max_time =>
                {
                    info!("Resolver '{}' stopped at the run deadline", registration.id);
                    stop = Some(Stop {
                        status: RunStatus::TimedOut,
                        reason: ReasonCode::TimedOut,
                    });
                    break;
                }
                Err(e) => {
                    warn!("Resolver '{}' failed: {}", registration.id, e);
                    stop = Some(Stop {
                        status: RunStatus::Partial,
                        reason: ReasonCode::ResolverError,
                    });
                    break;
                }
            };

            for suggestion in result.suggestions {
                if !initial_ids.contains(suggestion.field_definition_id.trim()) {
                    debug!(
                        "Dropping suggestion from '{}' for unknown field '{}'",
                        registration.id, suggestion.field_definition_id
                    );
                    continue;
                }
                merge_suggestion(&mut accepted, suggestion);
            }

            if result.terminate {
                let reason = result.termination_reason.trim();
                let reason = if reason.is_empty() {
                    ReasonCode::ResolverShortCircuit
                } else {
                    ReasonCode::from(reason)
                };
                info!(
                    "Resolver '{}' short-circuited run {} with '{}'",
                    registration.id, run.id, reason
                );
                stop = Some(Stop {
                    status: RunStatus::Partial,
                    reason,
                });
                break;
            }
        }

        run.completed_at = self.clock.now();
        run.elapsed = self.elapsed_since(started_at);
        run.executed_resolvers = executed;
        run.budget_used = budget_used;
        run.suggestions = accepted.into_values().collect();
        run.suggestions.sort_by(|a, b| {
            a.field_definition_id
                .cmp(&b.field_definition_id)
                .then_with(|| a.resolver_id.cmp(&b.resolver_id))
        });

        let accepted_ids: HashSet<&str> = run
            .suggestions
            .iter()
            .map(|s| s.field_definition_id.as_str())
            .collect();
        let mut unresolved: Vec<String> = initial
            .iter()
            .filter(|d| !accepted_ids.contains(d.id.trim()))
            .map(|d| d.id.trim().to_string())
            .collect();
        unresolved.sort();
        unresolved.dedup();
        run.unresolved_definition_ids = unresolved;
        run.selected_source = plurality_source(&run.suggestions);

        match stop {
            Some(Stop { status, reason }) => {
                let limit_stop = matches!(status, RunStatus::BudgetExhausted | RunStatus::TimedOut);
                run.status = if limit_stop && !run.suggestions.is_empty() {
                    RunStatus::Partial
                } else {
                    status
                };
                run.reason_code = reason;
            }
            None if run.unresolved_definition_ids.is_empty() => {
                run.status = RunStatus::Completed;
                run.reason_code = ReasonCode::ResolvedAll;
            }
            None => {
                run.status = RunStatus::Partial;
                run.reason_code = ReasonCode::UnresolvedFields;
            }
        }

        info!("Placement {}", run.summary());
        Ok(run)
    }

    fn elapsed_since(&self, started_at: DateTime<Utc>) -> Duration {
        (self.clock.now() - started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Accept `incoming` unless an existing suggestion for the same field beats it
///
/// Higher normalized confidence wins; equal confidence keeps the lexically
/// smaller resolver id.
pub fn merge_suggestion(accepted: &mut BTreeMap<String, Suggestion>, mut incoming: Suggestion) {
    let field_id = incoming.field_definition_id.trim().to_string();
    if field_id.is_empty() {
        return;
    }
    if incoming.id.trim().is_empty() {
        incoming.id = Uuid::new_v4().to_string();
    }
    incoming.field_definition_id = field_id.clone();

    let replace = match accepted.get(&field_id) {
        None => true,
        Some(existing) => {
            let current = existing.normalized_confidence();
            let candidate = incoming.normalized_confidence();
            if current > candidate {
                false
            } else if candidate > current {
                true
            } else {
                incoming.resolver_id < existing.resolver_id
            }
        }
    };

    if replace {
        accepted.insert(field_id, incoming);
    }
}

/// Resolver contributing the most suggestions; ties go to the smaller id
fn plurality_source(suggestions: &[Suggestion]) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for suggestion in suggestions {
        *counts.entry(suggestion.resolver_id.as_str()).or_default() += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (id, count) in counts {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((id, count));
        }
    }
    best.map(|(id, _)| id.to_string()).unwrap_or_default()
}
