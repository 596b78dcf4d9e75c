/*!
 * SQLite persistence for the translation assignment queue and placement runs.
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

pub use connection::DatabaseConnection;
pub use models::{AssignmentPriority, AssignmentStatus, AssignmentType, ListOptions, TranslationAssignment};
pub use repository::Repository;
