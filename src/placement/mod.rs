/*!
 * Signature field placement.
 *
 * - `models`: placement inputs, estimates, policies and run records
 * - `registry`: resolver registration in canonical order
 * - `resolvers`: resolver trait plus the native PDF resolver and stubs
 * - `policy`: system/org/user/per-run policy merge
 * - `scorer`: weighted ranking of resolver estimates
 * - `engine`: the orchestrator that executes a run
 * - `signal`: cooperative cancellation with deadlines
 */

pub mod engine;
pub mod models;
pub mod policy;
pub mod registry;
pub mod resolvers;
pub mod scorer;
pub mod signal;

pub use engine::{Clock, Orchestrator, SystemClock, merge_suggestion};
pub use models::{
    Estimate, ExecutionLimits, ExistingPlacement, FieldDefinition, Geometry, NativeFormField, Policy,
    PolicyOverlay, ReasonCode, ResolverScore, Run, RunInput, RunStatus, ScoringWeights, Suggestion,
};
pub use policy::PolicyResolver;
pub use registry::{ResolverCapability, ResolverRegistry};
pub use resolvers::{PlacementResolver, ResolveInput, ResolveResult, default_registry};
pub use signal::CancellationSignal;
