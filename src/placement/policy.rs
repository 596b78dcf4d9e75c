/*!
 * Effective policy resolution.
 *
 * Overlays apply in strict precedence: system, org, user, then per-run. A
 * non-empty resolver list replaces the one below it; a non-zero weight or limit
 * replaces the value below it; everything else is inherited.
 */

use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::app_config::PlacementConfig;
use crate::errors::PlacementError;

use super::models::{Policy, PolicyOverlay, ScoringWeights};
use super::registry::ResolverRegistry;

/// Lower-case, trim, drop empties and deduplicate, keeping first occurrences
pub fn sanitize(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| id.trim().to_lowercase())
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Apply one overlay on top of a base policy
pub fn apply_overlay(mut base: Policy, overlay: &PolicyOverlay) -> Policy {
    if !overlay.enabled_resolvers.is_empty() {
        base.enabled_resolvers = overlay.enabled_resolvers.clone();
    }
    if !overlay.hard_order.is_empty() {
        base.hard_order = overlay.hard_order.clone();
    }

    if overlay.weights.accuracy != 0.0 {
        base.weights.accuracy = overlay.weights.accuracy;
    }
    if overlay.weights.cost != 0.0 {
        base.weights.cost = overlay.weights.cost;
    }
    if overlay.weights.latency != 0.0 {
        base.weights.latency = overlay.weights.latency;
    }

    if overlay.limits.max_budget != 0.0 {
        base.limits.max_budget = overlay.limits.max_budget;
    }
    if !overlay.limits.max_time.is_zero() {
        base.limits.max_time = overlay.limits.max_time;
    }

    base
}

/// Merges system, org, user and per-run overlays into one effective policy
#[derive(Debug, Clone)]
pub struct PolicyResolver {
    registry: Arc<ResolverRegistry>,
    system: PolicyOverlay,
    org: HashMap<String, PolicyOverlay>,
    user: HashMap<String, PolicyOverlay>,
}

impl PolicyResolver {
    /// Resolver with an empty system overlay and no org/user overlays
    pub fn new(registry: Arc<ResolverRegistry>) -> Self {
        Self {
            registry,
            system: PolicyOverlay::default(),
            org: HashMap::new(),
            user: HashMap::new(),
        }
    }

    /// Build from the `placement` section of the configuration file
    pub fn from_config(registry: Arc<ResolverRegistry>, config: &PlacementConfig) -> Self {
        let mut resolver = Self::new(registry).with_system(config.system_policy.clone());
        for (org_id, overlay) in &config.org_policies {
            resolver = resolver.with_org(org_id, overlay.clone());
        }
        for (user_id, overlay) in &config.user_policies {
            resolver = resolver.with_user(user_id, overlay.clone());
        }
        resolver
    }

    pub fn with_system(mut self, overlay: PolicyOverlay) -> Self {
        self.system = overlay;
        self
    }

    pub fn with_org(mut self, org_id: &str, overlay: PolicyOverlay) -> Self {
        self.org.insert(org_id.trim().to_string(), overlay);
        self
    }

    pub fn with_user(mut self, user_id: &str, overlay: PolicyOverlay) -> Self {
        self.user.insert(user_id.trim().to_string(), overlay);
        self
    }

    pub fn registry(&self) -> &Arc<ResolverRegistry> {
        &self.registry
    }

    /// Compute the effective policy for one run
    pub fn resolve(
        &self,
        org_id: Option<&str>,
        user_id: Option<&str>,
        run_override: Option<&PolicyOverlay>,
    ) -> Result<Policy, PlacementError> {
        let mut layers: Vec<&PolicyOverlay> = vec![&self.system];
        if let Some(overlay) = org_id.and_then(|id| self.org.get(id.trim())) {
            layers.push(overlay);
        }
        if let Some(overlay) = user_id.and_then(|id| self.user.get(id.trim())) {
            layers.push(overlay);
        }
        if let Some(overlay) = run_override {
            layers.push(overlay);
        }

        let mut policy = layers
            .into_iter()
            .fold(Policy::default(), |base, overlay| apply_overlay(base, overlay));

        policy.enabled_resolvers = sanitize(&policy.enabled_resolvers);
        policy.hard_order = sanitize(&policy.hard_order);

        if policy.enabled_resolvers.is_empty() {
            policy.enabled_resolvers = self.registry.ordered_ids();
        }
        if policy.enabled_resolvers.is_empty() {
            return Err(PlacementError::Configuration(
                "no resolvers enabled and the registry is empty".to_string(),
            ));
        }

        if policy.weights.is_zero() {
            policy.weights = ScoringWeights::BASELINE;
        }

        debug!(
            "Effective placement policy: enabled={:?} hard_order={:?} weights={:?}",
            policy.enabled_resolvers, policy.hard_order, policy.weights
        );

        Ok(policy)
    }
}
