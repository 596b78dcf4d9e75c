/*!
 * Database entity models.
 *
 * These structures map directly to database tables.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a translation assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    /// Waiting for a translator
    Pending,
    /// A translator is working on it
    InProgress,
    /// Submitted and waiting for a reviewer
    Review,
    /// Approved
    Completed,
    /// Withdrawn
    Cancelled,
}

impl AssignmentStatus {
    /// Active rows count against the one-per-group-and-locale invariant
    pub fn is_active(&self) -> bool {
        !matches!(self, AssignmentStatus::Completed | AssignmentStatus::Cancelled)
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentStatus::Pending => write!(f, "pending"),
            AssignmentStatus::InProgress => write!(f, "in_progress"),
            AssignmentStatus::Review => write!(f, "review"),
            AssignmentStatus::Completed => write!(f, "completed"),
            AssignmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for AssignmentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(AssignmentStatus::Pending),
            "in_progress" => Ok(AssignmentStatus::InProgress),
            "review" => Ok(AssignmentStatus::Review),
            "completed" => Ok(AssignmentStatus::Completed),
            "cancelled" => Ok(AssignmentStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid assignment status: {}", s)),
        }
    }
}

/// How an assignment reaches a translator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
    /// Anyone may claim it
    #[default]
    OpenPool,
    /// Assigned to a specific translator
    Direct,
}

impl fmt::Display for AssignmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentType::OpenPool => write!(f, "open_pool"),
            AssignmentType::Direct => write!(f, "direct"),
        }
    }
}

impl std::str::FromStr for AssignmentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open_pool" => Ok(AssignmentType::OpenPool),
            "direct" => Ok(AssignmentType::Direct),
            _ => Err(anyhow::anyhow!("Invalid assignment type: {}", s)),
        }
    }
}

/// Assignment priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl fmt::Display for AssignmentPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentPriority::Low => write!(f, "low"),
            AssignmentPriority::Normal => write!(f, "normal"),
            AssignmentPriority::High => write!(f, "high"),
            AssignmentPriority::Urgent => write!(f, "urgent"),
        }
    }
}

impl std::str::FromStr for AssignmentPriority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(AssignmentPriority::Low),
            "normal" => Ok(AssignmentPriority::Normal),
            "high" => Ok(AssignmentPriority::High),
            "urgent" => Ok(AssignmentPriority::Urgent),
            _ => Err(anyhow::anyhow!("Invalid assignment priority: {}", s)),
        }
    }
}

/// Translation assignment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationAssignment {
    /// Unique assignment identifier (UUID)
    pub id: String,
    pub translation_group_id: String,
    /// Resource of the source entity (pages, posts)
    pub entity_type: String,
    pub source_record_id: String,
    pub source_locale: String,
    pub target_locale: String,
    /// Source title at enqueue time, for queue listings
    #[serde(default)]
    pub source_title: String,
    #[serde(default)]
    pub source_path: String,
    /// Translated entity, once it exists
    pub target_record_id: Option<String>,
    pub assignment_type: AssignmentType,
    pub status: AssignmentStatus,
    pub priority: AssignmentPriority,
    pub assignee_id: Option<String>,
    pub reviewer_id: Option<String>,
    /// Due date (ISO 8601)
    pub due_date: Option<String>,
    pub notes: String,
    /// Optimistic concurrency token, starts at 1
    pub version: i64,
    pub created_by: String,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
    /// Last update timestamp (ISO 8601)
    pub updated_at: String,
    pub claimed_at: Option<String>,
    pub submitted_at: Option<String>,
    pub completed_at: Option<String>,
}

impl TranslationAssignment {
    /// Create a pending open-pool assignment
    pub fn new(
        translation_group_id: &str,
        entity_type: &str,
        source_record_id: &str,
        source_locale: &str,
        target_locale: &str,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            translation_group_id: translation_group_id.to_string(),
            entity_type: entity_type.to_string(),
            source_record_id: source_record_id.to_string(),
            source_locale: source_locale.to_string(),
            target_locale: target_locale.to_string(),
            source_title: String::new(),
            source_path: String::new(),
            target_record_id: None,
            assignment_type: AssignmentType::OpenPool,
            status: AssignmentStatus::Pending,
            priority: AssignmentPriority::Normal,
            assignee_id: None,
            reviewer_id: None,
            due_date: None,
            notes: String::new(),
            version: 1,
            created_by: String::new(),
            created_at: now.clone(),
            updated_at: now,
            claimed_at: None,
            submitted_at: None,
            completed_at: None,
        }
    }

    /// Record the source title and path shown to translators
    pub fn with_source(mut self, title: &str, path: &str) -> Self {
        self.source_title = title.trim().to_string();
        self.source_path = path.trim().to_string();
        self
    }

    /// Assign directly to a translator
    pub fn assigned_to(mut self, assignee_id: &str) -> Self {
        self.assignment_type = AssignmentType::Direct;
        self.assignee_id = Some(assignee_id.to_string());
        self
    }

    pub fn with_priority(mut self, priority: AssignmentPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Filters and pagination for assignment queries
///
/// `page` is 1-based; a zero `per_page` means the default page size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    pub translation_group_id: Option<String>,
    pub target_locale: Option<String>,
    pub assignee_id: Option<String>,
    pub statuses: Vec<AssignmentStatus>,
    pub assignment_type: Option<AssignmentType>,
    pub entity_type: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

/// Default page size for assignment listings
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Largest page size a caller may request
pub const MAX_PER_PAGE: u32 = 100;

impl ListOptions {
    /// Effective `(limit, offset)` for SQL
    pub fn limit_offset(&self) -> (u32, u32) {
        let per_page = match self.per_page {
            0 => DEFAULT_PER_PAGE,
            n => n.min(MAX_PER_PAGE),
        };
        let page = self.page.max(1);
        (per_page, (page - 1) * per_page)
    }
}

/// Stored placement run summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRunRecord {
    pub id: String,
    pub agreement_id: String,
    pub created_by_user_id: String,
    pub status: String,
    pub reason_code: String,
    pub budget_used: f64,
    pub elapsed_ms: i64,
    /// Full `Run` as JSON
    pub snapshot: String,
    pub created_at: String,
    pub completed_at: String,
}
