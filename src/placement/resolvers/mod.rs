/*!
 * Placement resolver strategies.
 *
 * - `native_pdf`: reads PDF widget annotations (always supported)
 * - `stubs`: text-anchor, OCR-anchor and ML-layout resolvers that advertise
 *   estimates but do not execute yet
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ResolverError;

use super::models::{Estimate, ExistingPlacement, FieldDefinition, NativeFormField, Suggestion};
use super::registry::{ResolverCapability, ResolverRegistry};
use super::signal::CancellationSignal;

pub mod native_pdf;
pub mod stubs;

pub use native_pdf::{NativePdfResolver, count_pages, scan_widgets};
pub use stubs::{MlLayoutResolver, OcrAnchorResolver, TextAnchorResolver};

/// Common trait for all placement strategies
///
/// Implementations must be pure with respect to the input: the same input yields
/// the same estimate and the same suggestions.
#[async_trait]
pub trait PlacementResolver: Send + Sync + Debug {
    /// Stable resolver identifier
    fn id(&self) -> &str;

    /// Project quality, cost and latency for this input without doing the work
    async fn estimate(&self, input: &ResolveInput) -> Result<Estimate, ResolverError>;

    /// Produce placement suggestions for the unresolved definitions
    ///
    /// Cooperative resolvers should observe `input.cancel` and return
    /// `ResolverError::Cancelled` once it fires.
    async fn resolve(&self, input: &ResolveInput) -> Result<ResolveResult, ResolverError>;
}

/// Input scoped to one resolver call
#[derive(Debug, Clone, Default)]
pub struct ResolveInput {
    /// Source document, shared read-only between calls
    pub document: Arc<[u8]>,
    pub page_count: u32,
    /// Definitions that still need a placement
    pub definitions: Vec<FieldDefinition>,
    pub existing_placements: Vec<ExistingPlacement>,
    pub native_fields: Vec<NativeFormField>,
    /// Budget left under the policy; `None` when unlimited
    pub remaining_budget: Option<f64>,
    /// Time left under the policy; `None` when unlimited
    pub remaining_time: Option<Duration>,
    pub cancel: CancellationSignal,
}

impl ResolveInput {
    pub fn definition_ids(&self) -> Vec<String> {
        self.definitions.iter().map(|d| d.id.clone()).collect()
    }
}

/// Output of one resolver call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveResult {
    pub suggestions: Vec<Suggestion>,
    pub unresolved_definition_ids: Vec<String>,
    /// Ask the orchestrator to stop after merging these suggestions
    pub terminate: bool,
    /// Reason code to record when terminating; blank means `resolver_short_circuit`
    pub termination_reason: String,
}

impl ResolveResult {
    pub fn new(suggestions: Vec<Suggestion>, mut unresolved_definition_ids: Vec<String>) -> Self {
        unresolved_definition_ids.sort();
        Self {
            suggestions,
            unresolved_definition_ids,
            terminate: false,
            termination_reason: String::new(),
        }
    }

    /// Mark the result as a short-circuit with the given reason code
    pub fn terminating(mut self, reason: &str) -> Self {
        self.terminate = true;
        self.termination_reason = reason.to_string();
        self
    }
}

/// Lower-case, trim, and strip `-`, `_` and spaces
pub fn canonical_token(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .collect()
}

/// Registry holding the four built-in resolvers in their canonical order
pub fn default_registry() -> ResolverRegistry {
    let mut registry = ResolverRegistry::new();

    registry.register(
        Arc::new(NativePdfResolver),
        ResolverCapability {
            description: "Extracts AcroForm widget annotations from the PDF".to_string(),
            deterministic: true,
            supports_native: true,
            estimated_cost: 0.12,
            estimated_latency: 0.10,
            ..Default::default()
        },
    );
    registry.register(
        Arc::new(TextAnchorResolver),
        ResolverCapability {
            description: "Anchors fields to text labels in the content stream".to_string(),
            deterministic: true,
            supports_text: true,
            estimated_cost: 0.45,
            estimated_latency: 0.60,
            ..Default::default()
        },
    );
    registry.register(
        Arc::new(OcrAnchorResolver),
        ResolverCapability {
            description: "Anchors fields to OCR text on rasterised pages".to_string(),
            supports_ocr: true,
            estimated_cost: 0.80,
            estimated_latency: 0.90,
            ..Default::default()
        },
    );
    registry.register(
        Arc::new(MlLayoutResolver),
        ResolverCapability {
            description: "Predicts field regions with a layout model".to_string(),
            supports_ml: true,
            estimated_cost: 1.00,
            estimated_latency: 1.00,
            ..Default::default()
        },
    );

    registry
}
