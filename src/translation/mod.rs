/*!
 * Translation workflow for localized content.
 *
 * - `exchange`: export source text for translators and apply their work back
 * - `policy`: gate publish transitions on required locales
 * - `queue`: assignment lifecycle with optimistic concurrency
 */

pub mod exchange;
pub mod policy;
pub mod queue;

pub use self::exchange::{
    ApplyOutcome, ApplyRequest, ExchangeRow, ExportFilter, FieldPath, ImportReport, ImportRowResult,
    ImportSummary, Linkage, LinkageKey, TranslationExchangeStore,
};
pub use self::policy::{PUBLISH_TRANSITION, TranslationPolicy, TranslationPolicyInput};
pub use self::queue::{QueuePage, TranslationQueueService};
