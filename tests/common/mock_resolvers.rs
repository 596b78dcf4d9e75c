/*!
 * Scripted placement resolvers for orchestrator tests
 *
 * Each resolver returns a predetermined estimate and result and counts how
 * often it was called, so tests can assert which resolvers ran.
 */

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use backoffice::errors::ResolverError;
use backoffice::placement::models::{Estimate, Geometry, Suggestion};
use backoffice::placement::{PlacementResolver, ResolveInput, ResolveResult, ResolverCapability, ResolverRegistry};

/// How the resolver behaves while "working"
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delay {
    None,
    /// Sleep without looking at the cancellation signal
    Blocking(Duration),
    /// Sleep, returning `Cancelled` as soon as the signal fires
    Cooperative(Duration),
}

/// Resolver with a fixed estimate and fixed suggestions
#[derive(Debug)]
pub struct ScriptedResolver {
    id: String,
    estimate: Result<Estimate, ResolverError>,
    suggestions: Vec<(String, f64)>,
    failure: Option<ResolverError>,
    termination: Option<String>,
    delay: Delay,
    calls: Arc<AtomicUsize>,
}

impl ScriptedResolver {
    pub fn new(id: &str, accuracy: f64, cost: f64, latency: f64) -> Self {
        Self {
            id: id.to_string(),
            estimate: Ok(Estimate::new(id, accuracy, cost, latency, "scripted")),
            suggestions: Vec::new(),
            failure: None,
            termination: None,
            delay: Delay::None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Suggest `field_id` with the given confidence on every call
    pub fn suggests(mut self, field_id: &str, confidence: f64) -> Self {
        self.suggestions.push((field_id.to_string(), confidence));
        self
    }

    pub fn unsupported(mut self) -> Self {
        self.estimate = Ok(Estimate::unsupported(&self.id, "scripted unsupported"));
        self
    }

    pub fn failing_estimate(mut self) -> Self {
        self.estimate = Err(ResolverError::Failed("estimate unavailable".to_string()));
        self
    }

    pub fn failing(mut self, error: ResolverError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn terminating(mut self, reason: &str) -> Self {
        self.termination = Some(reason.to_string());
        self
    }

    pub fn delayed(mut self, delay: Delay) -> Self {
        self.delay = delay;
        self
    }

    /// Shared call counter, readable after the resolver moves into a registry
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl PlacementResolver for ScriptedResolver {
    fn id(&self) -> &str {
        &self.id
    }

    async fn estimate(&self, _input: &ResolveInput) -> Result<Estimate, ResolverError> {
        self.estimate.clone()
    }

    async fn resolve(&self, input: &ResolveInput) -> Result<ResolveResult, ResolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match self.delay {
            Delay::None => {}
            Delay::Blocking(duration) => tokio::time::sleep(duration).await,
            Delay::Cooperative(duration) => {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => {}
                    _ = input.cancel.cancelled() => return Err(ResolverError::Cancelled),
                }
            }
        }

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let wanted = input.definition_ids();
        let suggestions: Vec<Suggestion> = self
            .suggestions
            .iter()
            .map(|(field, confidence)| {
                let mut suggestion = Suggestion::new(field, &self.id, *confidence, Geometry::new(1, 10.0, 10.0, 100.0, 20.0));
                suggestion.id = format!("{}:{}", self.id, field);
                suggestion
            })
            .collect();
        let unresolved = wanted
            .into_iter()
            .filter(|id| !suggestions.iter().any(|s| &s.field_definition_id == id))
            .collect();

        let result = ResolveResult::new(suggestions, unresolved);
        Ok(match &self.termination {
            Some(reason) => result.terminating(reason),
            None => result,
        })
    }
}

/// Registry built from scripted resolvers, in registration order
pub fn registry_of(resolvers: Vec<ScriptedResolver>) -> Arc<ResolverRegistry> {
    let mut registry = ResolverRegistry::new();
    for resolver in resolvers {
        registry.register(Arc::new(resolver), ResolverCapability::default());
    }
    Arc::new(registry)
}
