/*!
 * Advertised but not yet enabled resolvers.
 *
 * Each reports itself unsupported, so score-ordered execution skips it, while
 * still publishing an estimate that policy weights can rank.
 */

use async_trait::async_trait;

use crate::errors::ResolverError;
use crate::placement::models::Estimate;

use super::{PlacementResolver, ResolveInput, ResolveResult};

pub const TEXT_ANCHOR_RESOLVER_ID: &str = "text_anchor_resolver";
pub const OCR_ANCHOR_RESOLVER_ID: &str = "ocr_anchor_resolver";
pub const ML_LAYOUT_RESOLVER_ID: &str = "ml_layout_resolver";

const STUB_REASON: &str = "stub_not_enabled";

fn stub_estimate(resolver_id: &str, accuracy: f64, cost: f64, latency: f64) -> Estimate {
    Estimate {
        supported: false,
        ..Estimate::new(resolver_id, accuracy, cost, latency, STUB_REASON)
    }
}

fn stub_result(input: &ResolveInput) -> ResolveResult {
    ResolveResult::new(Vec::new(), input.definition_ids())
}

/// Anchors fields next to matching text labels
#[derive(Debug, Clone, Copy, Default)]
pub struct TextAnchorResolver;

#[async_trait]
impl PlacementResolver for TextAnchorResolver {
    fn id(&self) -> &str {
        TEXT_ANCHOR_RESOLVER_ID
    }

    async fn estimate(&self, _input: &ResolveInput) -> Result<Estimate, ResolverError> {
        Ok(stub_estimate(TEXT_ANCHOR_RESOLVER_ID, 0.55, 0.45, 0.60))
    }

    async fn resolve(&self, input: &ResolveInput) -> Result<ResolveResult, ResolverError> {
        Ok(stub_result(input))
    }
}

/// Anchors fields using OCR output
#[derive(Debug, Clone, Copy, Default)]
pub struct OcrAnchorResolver;

#[async_trait]
impl PlacementResolver for OcrAnchorResolver {
    fn id(&self) -> &str {
        OCR_ANCHOR_RESOLVER_ID
    }

    async fn estimate(&self, _input: &ResolveInput) -> Result<Estimate, ResolverError> {
        Ok(stub_estimate(OCR_ANCHOR_RESOLVER_ID, 0.65, 0.80, 0.90))
    }

    async fn resolve(&self, input: &ResolveInput) -> Result<ResolveResult, ResolverError> {
        Ok(stub_result(input))
    }
}

/// Predicts field regions with a layout model
#[derive(Debug, Clone, Copy, Default)]
pub struct MlLayoutResolver;

#[async_trait]
impl PlacementResolver for MlLayoutResolver {
    fn id(&self) -> &str {
        ML_LAYOUT_RESOLVER_ID
    }

    async fn estimate(&self, _input: &ResolveInput) -> Result<Estimate, ResolverError> {
        Ok(stub_estimate(ML_LAYOUT_RESOLVER_ID, 0.85, 1.00, 1.00))
    }

    async fn resolve(&self, input: &ResolveInput) -> Result<ResolveResult, ResolverError> {
        Ok(stub_result(input))
    }
}
