/*!
 * Placement data model.
 *
 * Inputs (field definitions, existing placements, native form fields), resolver
 * projections (estimates, scores), the effective policy, and the `Run` record an
 * orchestrator execution produces.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use super::signal::CancellationSignal;

/// Page-space rectangle in PDF points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Geometry {
    pub page_number: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Geometry {
    pub fn new(page_number: u32, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            page_number,
            x,
            y,
            width,
            height,
        }
    }

    /// Check that the rectangle has a positive area on an existing page
    pub fn is_valid(&self, page_count: u32) -> bool {
        self.page_number >= 1
            && (page_count == 0 || self.page_number <= page_count)
            && self.width > 0.0
            && self.height > 0.0
    }
}

/// Logical field to be placed on the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FieldDefinition {
    pub id: String,
    #[serde(default)]
    pub participant_id: String,
    #[serde(default)]
    pub field_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
}

impl FieldDefinition {
    pub fn new(id: &str, field_type: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            participant_id: String::new(),
            field_type: field_type.to_string(),
            label: label.to_string(),
            required: false,
        }
    }
}

/// A field that already has a placement and is excluded from resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingPlacement {
    pub field_definition_id: String,
    pub geometry: Geometry,
}

/// Form field extracted from the source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeFormField {
    pub name: String,
    #[serde(default)]
    pub field_type_hint: String,
    pub geometry: Geometry,
}

/// Candidate placement for one field definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub id: String,
    pub field_definition_id: String,
    pub resolver_id: String,
    pub confidence: f64,
    pub geometry: Geometry,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Suggestion {
    pub fn new(field_definition_id: &str, resolver_id: &str, confidence: f64, geometry: Geometry) -> Self {
        Self {
            id: String::new(),
            field_definition_id: field_definition_id.to_string(),
            resolver_id: resolver_id.to_string(),
            confidence,
            geometry,
            label: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Confidence clamped to [0, 1]; NaN reads as 0
    pub fn normalized_confidence(&self) -> f64 {
        if self.confidence.is_nan() {
            0.0
        } else {
            self.confidence.clamp(0.0, 1.0)
        }
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }
}

/// Pre-execution quality/cost/latency projection for one resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Estimate {
    pub resolver_id: String,
    pub accuracy: f64,
    pub cost: f64,
    pub latency: f64,
    pub supported: bool,
    #[serde(default)]
    pub reason: String,
}

impl Estimate {
    pub fn new(resolver_id: &str, accuracy: f64, cost: f64, latency: f64, reason: &str) -> Self {
        Self {
            resolver_id: resolver_id.to_string(),
            accuracy,
            cost,
            latency,
            supported: true,
            reason: reason.to_string(),
        }
    }

    /// Estimate recorded for a resolver that cannot run on this input
    pub fn unsupported(resolver_id: &str, reason: &str) -> Self {
        Self {
            resolver_id: resolver_id.to_string(),
            supported: false,
            reason: reason.to_string(),
            ..Default::default()
        }
    }
}

/// Estimate plus its weighted utility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverScore {
    #[serde(flatten)]
    pub estimate: Estimate,
    pub score: f64,
}

impl ResolverScore {
    pub fn resolver_id(&self) -> &str {
        &self.estimate.resolver_id
    }
}

/// Weights applied by the scorer; all-zero weights fall back to the baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScoringWeights {
    pub accuracy: f64,
    pub cost: f64,
    pub latency: f64,
}

impl ScoringWeights {
    pub const BASELINE: ScoringWeights = ScoringWeights {
        accuracy: 0.6,
        cost: 0.25,
        latency: 0.15,
    };

    pub fn new(accuracy: f64, cost: f64, latency: f64) -> Self {
        Self {
            accuracy,
            cost,
            latency,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.accuracy == 0.0 && self.cost == 0.0 && self.latency == 0.0
    }

    /// Weights to use for scoring
    pub fn effective(self) -> Self {
        if self.is_zero() { Self::BASELINE } else { self }
    }
}

/// Budget and wall-clock limits; zero means unlimited
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExecutionLimits {
    pub max_budget: f64,
    #[serde(rename = "max_time_ms", with = "duration_ms")]
    pub max_time: Duration,
}

impl ExecutionLimits {
    pub fn new(max_budget: f64, max_time: Duration) -> Self {
        Self {
            max_budget,
            max_time,
        }
    }
}

/// One layer of policy configuration (system, org, user or per-run)
///
/// Empty lists and zero numbers mean "inherit from the layer below".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PolicyOverlay {
    pub enabled_resolvers: Vec<String>,
    pub hard_order: Vec<String>,
    pub weights: ScoringWeights,
    pub limits: ExecutionLimits,
}

/// Effective policy for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Policy {
    pub enabled_resolvers: Vec<String>,
    #[serde(default)]
    pub hard_order: Vec<String>,
    pub weights: ScoringWeights,
    pub limits: ExecutionLimits,
}

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Partial,
    BudgetExhausted,
    TimedOut,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Partial => write!(f, "partial"),
            RunStatus::BudgetExhausted => write!(f, "budget_exhausted"),
            RunStatus::TimedOut => write!(f, "timed_out"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "completed" => Ok(RunStatus::Completed),
            "partial" => Ok(RunStatus::Partial),
            "budget_exhausted" => Ok(RunStatus::BudgetExhausted),
            "timed_out" => Ok(RunStatus::TimedOut),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid run status: {}", s)),
        }
    }
}

/// Why a run ended
///
/// Resolvers may short-circuit with their own code, which is carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReasonCode {
    ResolvedAll,
    UnresolvedFields,
    BudgetExhausted,
    TimedOut,
    ResolverError,
    ResolverShortCircuit,
    Custom(String),
}

impl ReasonCode {
    pub fn as_str(&self) -> &str {
        match self {
            ReasonCode::ResolvedAll => "resolved_all",
            ReasonCode::UnresolvedFields => "unresolved_fields",
            ReasonCode::BudgetExhausted => "budget_exhausted",
            ReasonCode::TimedOut => "timed_out",
            ReasonCode::ResolverError => "resolver_error",
            ReasonCode::ResolverShortCircuit => "resolver_short_circuit",
            ReasonCode::Custom(code) => code,
        }
    }
}

impl From<&str> for ReasonCode {
    fn from(code: &str) -> Self {
        match code {
            "resolved_all" => ReasonCode::ResolvedAll,
            "unresolved_fields" => ReasonCode::UnresolvedFields,
            "budget_exhausted" => ReasonCode::BudgetExhausted,
            "timed_out" => ReasonCode::TimedOut,
            "resolver_error" => ReasonCode::ResolverError,
            "resolver_short_circuit" => ReasonCode::ResolverShortCircuit,
            other => ReasonCode::Custom(other.to_string()),
        }
    }
}

impl From<String> for ReasonCode {
    fn from(code: String) -> Self {
        ReasonCode::from(code.as_str())
    }
}

impl From<ReasonCode> for String {
    fn from(code: ReasonCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to one orchestrator run
#[derive(Debug, Clone, Default)]
pub struct RunInput {
    pub agreement_id: String,
    pub created_by_user_id: String,
    /// Run id to use; generated when absent
    pub run_id: Option<String>,
    /// Highest-precedence policy overlay
    pub policy_override: Option<PolicyOverlay>,
    pub document: Vec<u8>,
    pub page_count: u32,
    pub field_definitions: Vec<FieldDefinition>,
    pub existing_placements: Vec<ExistingPlacement>,
    pub native_fields: Vec<NativeFormField>,
    pub org_id: Option<String>,
    pub user_id: Option<String>,
    /// Caller-side cancellation, checked at every resolver boundary
    pub cancel: Option<CancellationSignal>,
}

/// Immutable record of one orchestrator execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub agreement_id: String,
    pub created_by_user_id: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    #[serde(rename = "elapsed_ms", with = "duration_ms")]
    pub elapsed: Duration,

    pub policy: Policy,
    pub resolver_order: Vec<String>,

    pub executed_resolvers: Vec<String>,
    pub estimates: Vec<Estimate>,
    pub scores: Vec<ResolverScore>,
    pub budget_used: f64,

    pub suggestions: Vec<Suggestion>,
    pub unresolved_definition_ids: Vec<String>,
    pub selected_source: String,

    pub status: RunStatus,
    pub reason_code: ReasonCode,
}

impl Run {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Short human-readable description of the run
    pub fn summary(&self) -> String {
        format!(
            "run {} {} ({}): {} suggestion(s), {} unresolved, budget {:.2}, {} ms",
            self.id,
            self.status,
            self.reason_code,
            self.suggestions.len(),
            self.unresolved_definition_ids.len(),
            self.budget_used,
            self.elapsed.as_millis()
        )
    }
}

/// Serialize `Duration` as integer milliseconds
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
