/*!
 * Repository layer for database operations.
 *
 * Assignment status changes are not validated here; any transition is
 * accepted. The queue service enforces the lifecycle.
 */

use anyhow::{Context, Result};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::errors::QueueError;
use crate::placement::models::Run;

use super::connection::DatabaseConnection;
use super::models::{
    AssignmentPriority, AssignmentStatus, AssignmentType, ListOptions, PlacementRunRecord,
    TranslationAssignment,
};

const ASSIGNMENT_COLUMNS: &str = "id, translation_group_id, entity_type, source_record_id, source_locale, \
     target_locale, target_record_id, assignment_type, status, priority, assignee_id, reviewer_id, \
     due_date, notes, version, created_by, created_at, updated_at, claimed_at, submitted_at, completed_at, \
     source_title, source_path";

const ACTIVE_FILTER: &str = "status NOT IN ('completed', 'cancelled')";

/// Repository for database operations
#[derive(Clone, Debug)]
pub struct Repository {
    db: DatabaseConnection,
}

impl Repository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_default()?))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // =========================================================================
    // Assignment Operations
    // =========================================================================

    /// Insert the assignment unless an active one exists for its group and locale
    ///
    /// Returns the stored assignment and whether it was inserted. New rows
    /// always start at version 1.
    pub async fn create_or_reuse_active(
        &self,
        assignment: &TranslationAssignment,
    ) -> Result<(TranslationAssignment, bool)> {
        let mut assignment = assignment.clone();

        self.db
            .transaction_async(move |tx| {
                let sql = format!(
                    "SELECT {} FROM translation_assignments \
                     WHERE translation_group_id = ?1 AND target_locale = ?2 AND {} LIMIT 1",
                    ASSIGNMENT_COLUMNS, ACTIVE_FILTER
                );
                let existing = tx
                    .query_row(
                        &sql,
                        params![assignment.translation_group_id, assignment.target_locale],
                        row_to_assignment,
                    )
                    .optional()?;

                if let Some(existing) = existing {
                    debug!(
                        "Reusing active assignment {} for {}/{}",
                        existing.id, existing.translation_group_id, existing.target_locale
                    );
                    return Ok((existing, false));
                }

                assignment.version = 1;
                insert_assignment(tx, &assignment)?;
                Ok((assignment, true))
            })
            .await
    }

    /// Compare-and-swap update on `version`
    ///
    /// Fails with `StaleVersion` when the stored version is not
    /// `expected_version`; on success the stored version is incremented.
    pub async fn update_assignment(
        &self,
        assignment: &TranslationAssignment,
        expected_version: i64,
    ) -> Result<TranslationAssignment, QueueError> {
        let mut assignment = assignment.clone();

        self.db
            .transaction_async(move |tx| {
                let stored: Option<i64> = tx
                    .query_row(
                        "SELECT version FROM translation_assignments WHERE id = ?1",
                        [&assignment.id],
                        |row| row.get(0),
                    )
                    .optional()?;

                match stored {
                    None => return Err(QueueError::NotFound(assignment.id.clone()).into()),
                    Some(actual) if actual != expected_version => {
                        return Err(QueueError::StaleVersion {
                            id: assignment.id.clone(),
                            expected: expected_version,
                            actual,
                        }
                        .into());
                    }
                    Some(_) => {}
                }

                assignment.version = expected_version + 1;
                assignment.updated_at = chrono::Utc::now().to_rfc3339();

                tx.execute(
                    r#"
                    UPDATE translation_assignments SET
                        translation_group_id = ?2, entity_type = ?3, source_record_id = ?4,
                        source_locale = ?5, target_locale = ?6, target_record_id = ?7,
                        assignment_type = ?8, status = ?9, priority = ?10, assignee_id = ?11,
                        reviewer_id = ?12, due_date = ?13, notes = ?14, version = ?15,
                        updated_at = ?16, claimed_at = ?17, submitted_at = ?18, completed_at = ?19,
                        source_title = ?21, source_path = ?22
                    WHERE id = ?1 AND version = ?20
                    "#,
                    params![
                        assignment.id,
                        assignment.translation_group_id,
                        assignment.entity_type,
                        assignment.source_record_id,
                        assignment.source_locale,
                        assignment.target_locale,
                        assignment.target_record_id,
                        assignment.assignment_type.to_string(),
                        assignment.status.to_string(),
                        assignment.priority.to_string(),
                        assignment.assignee_id,
                        assignment.reviewer_id,
                        assignment.due_date,
                        assignment.notes,
                        assignment.version,
                        assignment.updated_at,
                        assignment.claimed_at,
                        assignment.submitted_at,
                        assignment.completed_at,
                        expected_version,
                        assignment.source_title,
                        assignment.source_path,
                    ],
                )?;

                Ok(assignment)
            })
            .await
            .map_err(|e| match e.downcast::<QueueError>() {
                Ok(queue_error) => queue_error,
                Err(other) => QueueError::Storage(format!("{:#}", other)),
            })
    }

    /// Get an assignment by ID
    pub async fn get_assignment(&self, id: &str) -> Result<Option<TranslationAssignment>> {
        let id = id.to_string();

        self.db
            .execute_async(move |conn| {
                let sql = format!("SELECT {} FROM translation_assignments WHERE id = ?1", ASSIGNMENT_COLUMNS);
                Ok(conn.query_row(&sql, [&id], row_to_assignment).optional()?)
            })
            .await
    }

    /// Filtered, paginated listing; returns the page and the unpaginated total
    pub async fn list_assignments(&self, options: &ListOptions) -> Result<(Vec<TranslationAssignment>, i64)> {
        let options = options.clone();

        self.db
            .execute_async(move |conn| list_assignments_sync(conn, &options))
            .await
    }

    // =========================================================================
    // Placement Run Operations
    // =========================================================================

    /// Store a run snapshot, replacing any previous run with the same id
    pub async fn save_run(&self, run: &Run) -> Result<()> {
        let record = PlacementRunRecord {
            id: run.id.clone(),
            agreement_id: run.agreement_id.clone(),
            created_by_user_id: run.created_by_user_id.clone(),
            status: run.status.to_string(),
            reason_code: run.reason_code.to_string(),
            budget_used: run.budget_used,
            elapsed_ms: run.elapsed.as_millis() as i64,
            snapshot: serde_json::to_string(run).context("Failed to serialize placement run")?,
            created_at: run.created_at.to_rfc3339(),
            completed_at: run.completed_at.to_rfc3339(),
        };

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT OR REPLACE INTO placement_runs (
                        id, agreement_id, created_by_user_id, status, reason_code,
                        budget_used, elapsed_ms, snapshot, created_at, completed_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    "#,
                    params![
                        record.id,
                        record.agreement_id,
                        record.created_by_user_id,
                        record.status,
                        record.reason_code,
                        record.budget_used,
                        record.elapsed_ms,
                        record.snapshot,
                        record.created_at,
                        record.completed_at,
                    ],
                )?;
                debug!("Saved placement run {}", record.id);
                Ok(())
            })
            .await
    }

    /// Load a run by ID
    pub async fn get_run(&self, id: &str) -> Result<Option<Run>> {
        let id = id.to_string();

        let snapshot: Option<String> = self
            .db
            .execute_async(move |conn| {
                Ok(conn
                    .query_row("SELECT snapshot FROM placement_runs WHERE id = ?1", [&id], |row| row.get(0))
                    .optional()?)
            })
            .await?;

        snapshot
            .map(|json| serde_json::from_str(&json).context("Failed to parse placement run snapshot"))
            .transpose()
    }

    /// All runs for an agreement, oldest first
    pub async fn list_runs_for_agreement(&self, agreement_id: &str) -> Result<Vec<Run>> {
        let agreement_id = agreement_id.to_string();

        let snapshots: Vec<String> = self
            .db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT snapshot FROM placement_runs WHERE agreement_id = ?1 ORDER BY created_at, id",
                )?;
                let rows = stmt
                    .query_map([&agreement_id], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(rows)
            })
            .await?;

        snapshots
            .iter()
            .map(|json| serde_json::from_str(json).context("Failed to parse placement run snapshot"))
            .collect()
    }
}

fn insert_assignment(conn: &Connection, assignment: &TranslationAssignment) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO translation_assignments (
            id, translation_group_id, entity_type, source_record_id, source_locale,
            target_locale, target_record_id, assignment_type, status, priority, assignee_id,
            reviewer_id, due_date, notes, version, created_by, created_at, updated_at,
            claimed_at, submitted_at, completed_at, source_title, source_path
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)
        "#,
        params![
            assignment.id,
            assignment.translation_group_id,
            assignment.entity_type,
            assignment.source_record_id,
            assignment.source_locale,
            assignment.target_locale,
            assignment.target_record_id,
            assignment.assignment_type.to_string(),
            assignment.status.to_string(),
            assignment.priority.to_string(),
            assignment.assignee_id,
            assignment.reviewer_id,
            assignment.due_date,
            assignment.notes,
            assignment.version,
            assignment.created_by,
            assignment.created_at,
            assignment.updated_at,
            assignment.claimed_at,
            assignment.submitted_at,
            assignment.completed_at,
            assignment.source_title,
            assignment.source_path,
        ],
    )?;
    Ok(())
}

fn list_assignments_sync(conn: &Connection, options: &ListOptions) -> Result<(Vec<TranslationAssignment>, i64)> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    let mut push = |column: &str, value: &Option<String>| {
        if let Some(value) = value.as_ref().map(|v| v.trim()).filter(|v| !v.is_empty()) {
            values.push(Value::Text(value.to_string()));
            clauses.push(format!("{} = ?{}", column, values.len()));
        }
    };
    push("translation_group_id", &options.translation_group_id);
    push("target_locale", &options.target_locale);
    push("assignee_id", &options.assignee_id);
    push("entity_type", &options.entity_type);
    push("assignment_type", &options.assignment_type.map(|t| t.to_string()));

    if !options.statuses.is_empty() {
        let mut placeholders = Vec::new();
        for status in &options.statuses {
            values.push(Value::Text(status.to_string()));
            placeholders.push(format!("?{}", values.len()));
        }
        clauses.push(format!("status IN ({})", placeholders.join(", ")));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM translation_assignments {}", where_sql),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    let (limit, offset) = options.limit_offset();
    let sql = format!(
        "SELECT {} FROM translation_assignments {} \
         ORDER BY CASE priority WHEN 'urgent' THEN 0 WHEN 'high' THEN 1 WHEN 'normal' THEN 2 ELSE 3 END, \
         created_at, id LIMIT {} OFFSET {}",
        ASSIGNMENT_COLUMNS, where_sql, limit, offset
    );

    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params_from_iter(values.iter()), row_to_assignment)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok((items, total))
}

fn row_to_assignment(row: &Row<'_>) -> rusqlite::Result<TranslationAssignment> {
    Ok(TranslationAssignment {
        id: row.get(0)?,
        translation_group_id: row.get(1)?,
        entity_type: row.get(2)?,
        source_record_id: row.get(3)?,
        source_locale: row.get(4)?,
        target_locale: row.get(5)?,
        target_record_id: row.get(6)?,
        assignment_type: parse_column::<AssignmentType>(row, 7)?,
        status: parse_column::<AssignmentStatus>(row, 8)?,
        priority: parse_column::<AssignmentPriority>(row, 9)?,
        assignee_id: row.get(10)?,
        reviewer_id: row.get(11)?,
        due_date: row.get(12)?,
        notes: row.get(13)?,
        version: row.get(14)?,
        created_by: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
        claimed_at: row.get(18)?,
        submitted_at: row.get(19)?,
        completed_at: row.get(20)?,
        source_title: row.get(21)?,
        source_path: row.get(22)?,
    })
}

/// Parse an enum column, failing the row on an unknown value
fn parse_column<T>(row: &Row<'_>, index: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = anyhow::Error>,
{
    let raw: String = row.get(index)?;
    raw.parse().map_err(|e: anyhow::Error| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, e.into())
    })
}
