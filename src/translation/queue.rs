/*!
 * Translation assignment lifecycle.
 *
 * The repository accepts any status change; this service only allows
 * `pending -> in_progress -> review -> completed`, `review -> in_progress`
 * when changes are requested, and cancellation of any active assignment.
 * Every mutation is a compare-and-swap on the caller's expected version.
 */

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::database::models::{
    AssignmentStatus, AssignmentType, ListOptions, TranslationAssignment,
};
use crate::database::repository::Repository;
use crate::errors::QueueError;
use crate::language_utils::{get_language_name, validate_locale};

/// Page of assignments for one listing scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuePage {
    pub scope: String,
    pub total: i64,
    pub items: Vec<TranslationAssignment>,
}

/// Check a status change against the assignment lifecycle
pub fn check_transition(from: AssignmentStatus, to: AssignmentStatus) -> Result<(), QueueError> {
    use AssignmentStatus::*;

    let allowed = matches!(
        (from, to),
        (Pending, InProgress) | (InProgress, Review) | (Review, Completed) | (Review, InProgress)
    ) || (to == Cancelled && from.is_active());

    if allowed {
        Ok(())
    } else {
        Err(QueueError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Assignment workflow on top of the repository
#[derive(Debug, Clone)]
pub struct TranslationQueueService {
    repo: Repository,
}

impl TranslationQueueService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Queue work for a group and locale, reusing an active assignment if one exists
    pub async fn enqueue(&self, assignment: TranslationAssignment) -> Result<(TranslationAssignment, bool), QueueError> {
        let mut assignment = assignment;
        let invalid = |e: anyhow::Error| QueueError::InvalidInput(e.to_string());
        assignment.source_locale = validate_locale(&assignment.source_locale).map_err(invalid)?;
        assignment.target_locale = validate_locale(&assignment.target_locale).map_err(invalid)?;
        assignment.translation_group_id = assignment.translation_group_id.trim().to_string();
        if assignment.translation_group_id.is_empty() {
            return Err(QueueError::InvalidInput("translation_group_id is required".to_string()));
        }
        if assignment.source_locale == assignment.target_locale {
            return Err(QueueError::InvalidInput(format!(
                "target locale {} equals source locale",
                assignment.target_locale
            )));
        }
        assignment.status = AssignmentStatus::Pending;

        let (stored, inserted) = self.repo.create_or_reuse_active(&assignment).await?;
        if inserted {
            let language = get_language_name(&stored.target_locale).unwrap_or_else(|_| stored.target_locale.clone());
            info!(
                "Queued {} translation of {} {} as {}",
                language, stored.entity_type, stored.source_record_id, stored.id
            );
        } else {
            debug!("Reusing active assignment {}", stored.id);
        }
        Ok((stored, inserted))
    }

    /// Take an unassigned open-pool assignment
    pub async fn claim(&self, id: &str, user_id: &str, expected_version: i64) -> Result<TranslationAssignment, QueueError> {
        let mut assignment = self.load(id).await?;
        if assignment.assignment_type != AssignmentType::OpenPool
            || assignment.status != AssignmentStatus::Pending
            || assignment.assignee_id.is_some()
        {
            return Err(QueueError::NotClaimable(format!(
                "{} is {} ({})",
                assignment.id, assignment.status, assignment.assignment_type
            )));
        }

        assignment.assignee_id = Some(user_id.to_string());
        assignment.claimed_at = Some(chrono::Utc::now().to_rfc3339());
        let updated = self.repo.update_assignment(&assignment, expected_version).await?;
        info!("Assignment {} claimed by {}", updated.id, user_id);
        Ok(updated)
    }

    /// Begin work; only the assignee may start
    pub async fn start(&self, id: &str, user_id: &str, expected_version: i64) -> Result<TranslationAssignment, QueueError> {
        let assignment = self.load(id).await?;
        require_assignee(&assignment, user_id)?;
        self.transition(assignment, AssignmentStatus::InProgress, expected_version, |_| {})
            .await
    }

    /// Hand the translation to review
    pub async fn submit_for_review(
        &self,
        id: &str,
        user_id: &str,
        expected_version: i64,
    ) -> Result<TranslationAssignment, QueueError> {
        let assignment = self.load(id).await?;
        require_assignee(&assignment, user_id)?;
        self.transition(assignment, AssignmentStatus::Review, expected_version, |a| {
            a.submitted_at = Some(chrono::Utc::now().to_rfc3339());
        })
        .await
    }

    /// Accept a reviewed translation
    pub async fn approve(&self, id: &str, reviewer_id: &str, expected_version: i64) -> Result<TranslationAssignment, QueueError> {
        let assignment = self.load(id).await?;
        let reviewer = reviewer_id.to_string();
        self.transition(assignment, AssignmentStatus::Completed, expected_version, move |a| {
            a.reviewer_id = Some(reviewer);
            a.completed_at = Some(chrono::Utc::now().to_rfc3339());
        })
        .await
    }

    /// Send a reviewed translation back to the translator
    pub async fn request_changes(
        &self,
        id: &str,
        reviewer_id: &str,
        notes: &str,
        expected_version: i64,
    ) -> Result<TranslationAssignment, QueueError> {
        let assignment = self.load(id).await?;
        let reviewer = reviewer_id.to_string();
        let notes = notes.trim().to_string();
        self.transition(assignment, AssignmentStatus::InProgress, expected_version, move |a| {
            a.reviewer_id = Some(reviewer);
            if !notes.is_empty() {
                if !a.notes.is_empty() {
                    a.notes.push('\n');
                }
                a.notes.push_str(&notes);
            }
        })
        .await
    }

    /// Withdraw an active assignment
    pub async fn cancel(&self, id: &str, expected_version: i64) -> Result<TranslationAssignment, QueueError> {
        let assignment = self.load(id).await?;
        self.transition(assignment, AssignmentStatus::Cancelled, expected_version, |_| {})
            .await
    }

    /// Active assignments held by a user
    pub async fn my_work(&self, user_id: &str, page: u32, per_page: u32) -> Result<QueuePage, QueueError> {
        let options = ListOptions {
            assignee_id: Some(user_id.to_string()),
            statuses: active_statuses(),
            page,
            per_page,
            ..Default::default()
        };
        let (items, total) = self.repo.list_assignments(&options).await?;
        Ok(QueuePage {
            scope: "my_work".to_string(),
            total,
            items,
        })
    }

    /// All active assignments
    pub async fn open_queue(&self, page: u32, per_page: u32) -> Result<QueuePage, QueueError> {
        let options = ListOptions {
            statuses: active_statuses(),
            page,
            per_page,
            ..Default::default()
        };
        let (items, total) = self.repo.list_assignments(&options).await?;
        Ok(QueuePage {
            scope: "queue".to_string(),
            total,
            items,
        })
    }

    async fn load(&self, id: &str) -> Result<TranslationAssignment, QueueError> {
        self.repo
            .get_assignment(id)
            .await?
            .ok_or_else(|| QueueError::NotFound(id.to_string()))
    }

    async fn transition<F>(
        &self,
        mut assignment: TranslationAssignment,
        to: AssignmentStatus,
        expected_version: i64,
        mutate: F,
    ) -> Result<TranslationAssignment, QueueError>
    where
        F: FnOnce(&mut TranslationAssignment),
    {
        check_transition(assignment.status, to)?;
        let from = assignment.status;
        assignment.status = to;
        mutate(&mut assignment);

        let updated = self.repo.update_assignment(&assignment, expected_version).await?;
        info!("Assignment {} moved {} -> {}", updated.id, from, to);
        Ok(updated)
    }
}

fn active_statuses() -> Vec<AssignmentStatus> {
    vec![
        AssignmentStatus::Pending,
        AssignmentStatus::InProgress,
        AssignmentStatus::Review,
    ]
}

fn require_assignee(assignment: &TranslationAssignment, user_id: &str) -> Result<(), QueueError> {
    match assignment.assignee_id.as_deref() {
        Some(assignee) if assignee == user_id => Ok(()),
        Some(_) => Err(QueueError::Forbidden(format!(
            "{} is assigned to another user",
            assignment.id
        ))),
        None => Err(QueueError::Forbidden(format!(
            "{} must be claimed before work starts",
            assignment.id
        ))),
    }
}
