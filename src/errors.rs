/*!
 * Error types for the backoffice crate.
 *
 * Each subsystem owns a thiserror enum. Domain errors expose a stable
 * `text_code()` so the admin API can render machine-readable responses.
 */

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

/// Errors returned by placement resolvers
///
/// The orchestrator never propagates these; they are folded into the run status.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolverError {
    /// The resolver could not produce a result
    #[error("resolver failed: {0}")]
    Failed(String),

    /// The resolver observed its cancellation signal
    #[error("resolver cancelled")]
    Cancelled,

    /// The input could not be processed by this resolver
    #[error("invalid resolver input: {0}")]
    InvalidInput(String),
}

/// Errors raised while configuring or running the placement orchestrator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlacementError {
    /// The orchestrator or its policy is not usable
    #[error("placement configuration error: {0}")]
    Configuration(String),
}

/// Errors from the content service collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContentError {
    /// No entity with this id exists for the resource
    #[error("{resource} entity not found: {id}")]
    NotFound {
        /// Resource name (pages, posts)
        resource: String,
        /// Entity id
        id: String,
    },

    /// The write conflicts with existing content
    #[error("content conflict: {0}")]
    Conflict(String),

    /// Storage failure
    #[error("content storage error: {0}")]
    Storage(String),
}

/// Returned when a publish transition is missing required translations
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error(
    "missing translations for {policy_entity} {entity_id} ({transition}, {environment}): {}",
    .missing_locales.join(", ")
)]
pub struct MissingTranslationsError {
    pub entity_type: String,
    pub policy_entity: String,
    pub entity_id: String,
    pub transition: String,
    pub environment: String,
    pub requested_locale: String,
    /// Sorted, deduplicated locales with no usable translation
    pub missing_locales: Vec<String>,
    /// Required fields that are blank on an otherwise present translation
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub missing_fields_by_locale: BTreeMap<String, Vec<String>>,
}

impl MissingTranslationsError {
    pub fn text_code(&self) -> &'static str {
        "TRANSLATION_MISSING"
    }

    pub fn http_status(&self) -> u16 {
        409
    }
}

/// Errors from the translation policy engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationPolicyError {
    /// The transition is blocked by missing translations
    #[error(transparent)]
    MissingTranslations(#[from] MissingTranslationsError),

    /// The entity being transitioned does not exist
    #[error("{entity_type} entity not found: {entity_id}")]
    EntityNotFound {
        entity_type: String,
        entity_id: String,
    },

    /// The content service failed
    #[error("content error: {0}")]
    Content(String),
}

impl TranslationPolicyError {
    pub fn text_code(&self) -> &'static str {
        match self {
            Self::MissingTranslations(err) => err.text_code(),
            Self::EntityNotFound { .. } => "NOT_FOUND",
            Self::Content(_) => "INTERNAL",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::MissingTranslations(err) => err.http_status(),
            Self::EntityNotFound { .. } => 404,
            Self::Content(_) => 500,
        }
    }
}

impl From<ContentError> for TranslationPolicyError {
    fn from(error: ContentError) -> Self {
        match error {
            ContentError::NotFound { resource, id } => Self::EntityNotFound {
                entity_type: resource,
                entity_id: id,
            },
            other => Self::Content(other.to_string()),
        }
    }
}

/// Errors from the translation exchange store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    /// The source/target linkage cannot be resolved
    #[error("translation exchange linkage not found: {0}")]
    LinkageNotFound(String),

    /// The source text changed since the row was exported
    #[error("source text changed for {0}")]
    SourceChanged(String),

    /// The row is malformed
    #[error("invalid exchange row: {0}")]
    InvalidRow(String),

    /// The content service failed
    #[error("content error: {0}")]
    Content(String),
}

impl ExchangeError {
    pub fn text_code(&self) -> &'static str {
        match self {
            Self::LinkageNotFound(_) => "LINKAGE_NOT_FOUND",
            Self::SourceChanged(_) => "SOURCE_HASH_MISMATCH",
            Self::InvalidRow(_) => "BAD_REQUEST",
            Self::Content(_) => "INTERNAL",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::LinkageNotFound(_) => 404,
            Self::SourceChanged(_) => 409,
            Self::InvalidRow(_) => 400,
            Self::Content(_) => 500,
        }
    }
}

impl From<ContentError> for ExchangeError {
    fn from(error: ContentError) -> Self {
        match error {
            ContentError::NotFound { resource, id } => {
                Self::LinkageNotFound(format!("{} {} does not exist", resource, id))
            }
            other => Self::Content(other.to_string()),
        }
    }
}

/// Errors from the translation assignment queue
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    /// Optimistic concurrency check failed
    #[error("stale version for assignment {id}: expected {expected}, found {actual}")]
    StaleVersion {
        id: String,
        expected: i64,
        actual: i64,
    },

    /// No assignment with this id
    #[error("assignment not found: {0}")]
    NotFound(String),

    /// The requested status change is not part of the lifecycle
    #[error("invalid assignment transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// The assignment cannot be claimed
    #[error("assignment is not claimable: {0}")]
    NotClaimable(String),

    /// The actor may not act on the assignment
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The request is malformed
    #[error("invalid assignment: {0}")]
    InvalidInput(String),

    /// Storage failure
    #[error("queue storage error: {0}")]
    Storage(String),
}

impl QueueError {
    pub fn text_code(&self) -> &'static str {
        match self {
            Self::StaleVersion { .. } => "STALE_VERSION",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::NotClaimable(_) => "NOT_CLAIMABLE",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::InvalidInput(_) => "BAD_REQUEST",
            Self::Storage(_) => "INTERNAL",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::StaleVersion { .. } | Self::NotClaimable(_) => 409,
            Self::NotFound(_) => 404,
            Self::InvalidTransition { .. } => 422,
            Self::Forbidden(_) => 403,
            Self::InvalidInput(_) => 400,
            Self::Storage(_) => 500,
        }
    }
}

impl From<anyhow::Error> for QueueError {
    fn from(error: anyhow::Error) -> Self {
        Self::Storage(error.to_string())
    }
}
