/*!
 * # Backoffice
 *
 * Core services of a content back office: signature-field placement on
 * agreement documents and the translation workflow around localized pages
 * and posts.
 *
 * ## Features
 *
 * - Policy-driven placement orchestration across pluggable resolvers
 * - Budget, time and cancellation limits with deterministic tie-breaking
 * - Publish gating on required translations per environment
 * - Translation export/import with source-hash linkage checks
 * - Translation assignment queue with optimistic concurrency (SQLite)
 *
 * ## Architecture
 *
 * - `placement`: Placement orchestrator:
 *   - `placement::engine`: Orchestrator and clock
 *   - `placement::policy`: Layered policy resolution
 *   - `placement::scorer`: Estimate scoring and ranking
 *   - `placement::resolvers`: Resolver trait and built-in resolvers
 * - `translation`: Translation workflow:
 *   - `translation::policy`: Publish gate
 *   - `translation::exchange`: Export and apply of translated fields
 *   - `translation::queue`: Assignment lifecycle
 * - `content`: Content service contract and an in-memory implementation
 * - `database`: SQLite persistence for assignments and placement runs
 * - `admin_api`: Transport-agnostic admin JSON handlers
 * - `app_config`: Configuration management
 * - `app_controller`: Wiring used by the command line tool
 * - `language_utils`: Locale normalization and ISO 639 validation
 * - `errors`: Error types for each subsystem
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod admin_api;
pub mod app_config;
pub mod app_controller;
pub mod content;
pub mod database;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod placement;
pub mod translation;

// Re-export main types for easier usage
pub use admin_api::{AdminApi, ApiRequest, ApiResponse};
pub use app_config::Config;
pub use content::{ContentEntry, ContentService, InMemoryContentService, Resource};
pub use errors::{
    ContentError, ExchangeError, MissingTranslationsError, PlacementError, QueueError, ResolverError,
    TranslationPolicyError,
};
pub use placement::{Orchestrator, PolicyResolver, ResolverRegistry};
pub use translation::{TranslationExchangeStore, TranslationPolicy, TranslationQueueService};
