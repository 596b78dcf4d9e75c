/*!
 * Content service contract.
 *
 * The translation subsystem reads and writes pages and posts only through the
 * `ContentService` trait. Translation groups are a flat set of entries sharing
 * a `translation_group_id`; there are no parent pointers.
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::ContentError;

pub mod memory;

pub use memory::InMemoryContentService;

/// Content resource kinds managed by the back office
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    #[default]
    Pages,
    Posts,
}

impl Resource {
    /// Both resources in export order
    pub const ALL: [Resource; 2] = [Resource::Pages, Resource::Posts];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Pages => "pages",
            Resource::Posts => "posts",
        }
    }

    /// Normalize a resource alias: `page|pages`, `post|posts|content|contents`
    pub fn normalize(value: &str) -> Option<Resource> {
        match value.trim().to_lowercase().as_str() {
            "page" | "pages" => Some(Resource::Pages),
            "post" | "posts" | "content" | "contents" => Some(Resource::Posts),
            _ => None,
        }
    }

    /// Normalize a list of aliases, dropping unknown ones; empty means all
    pub fn normalize_list(values: &[String]) -> Vec<Resource> {
        let mut resources: Vec<Resource> = values.iter().filter_map(|v| Resource::normalize(v)).collect();
        resources.sort();
        resources.dedup();
        if values.is_empty() {
            Resource::ALL.to_vec()
        } else {
            resources
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Resource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::normalize(s).ok_or_else(|| anyhow::anyhow!("Unknown content resource: {}", s))
    }
}

/// A page or post as exposed by the content service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ContentEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub resource: Resource,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub translation_group_id: String,
    #[serde(default, alias = "content_type")]
    pub content_type_slug: String,
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

impl ContentEntry {
    pub fn new(resource: Resource, id: &str, title: &str, slug: &str, locale: &str) -> Self {
        Self {
            id: id.to_string(),
            resource,
            title: title.to_string(),
            slug: slug.to_string(),
            locale: locale.to_string(),
            status: "draft".to_string(),
            ..Default::default()
        }
    }

    /// Translation group id, falling back to the entry's own id
    pub fn group_id(&self) -> &str {
        let group = self.translation_group_id.trim();
        if group.is_empty() { self.id.trim() } else { group }
    }

    /// Non-blank string value from `data`
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    pub fn set_data(&mut self, key: &str, value: &str) {
        self.data.insert(key.to_string(), Value::String(value.to_string()));
    }

    /// Content types match case-insensitively; a blank type matches anything
    pub fn content_type_matches(&self, other: &ContentEntry) -> bool {
        let mine = self.content_type_slug.trim();
        let theirs = other.content_type_slug.trim();
        mine.is_empty() || theirs.is_empty() || mine.eq_ignore_ascii_case(theirs)
    }
}

/// Storage collaborator for pages and posts
#[async_trait]
pub trait ContentService: Send + Sync + fmt::Debug {
    /// All entries of a resource, optionally restricted to one locale
    async fn entries(&self, resource: Resource, locale: Option<&str>) -> Result<Vec<ContentEntry>, ContentError>;

    /// One entry by id
    async fn entry(&self, resource: Resource, id: &str, locale: Option<&str>) -> Result<ContentEntry, ContentError>;

    /// Persist a new entry; an empty id is assigned by the service
    async fn create_entry(&self, entry: ContentEntry) -> Result<ContentEntry, ContentError>;

    /// Replace an existing entry
    async fn update_entry(&self, entry: ContentEntry) -> Result<ContentEntry, ContentError>;

    async fn pages(&self, locale: Option<&str>) -> Result<Vec<ContentEntry>, ContentError> {
        self.entries(Resource::Pages, locale).await
    }

    async fn page(&self, id: &str, locale: Option<&str>) -> Result<ContentEntry, ContentError> {
        self.entry(Resource::Pages, id, locale).await
    }

    async fn posts(&self, locale: Option<&str>) -> Result<Vec<ContentEntry>, ContentError> {
        self.entries(Resource::Posts, locale).await
    }

    async fn post(&self, id: &str, locale: Option<&str>) -> Result<ContentEntry, ContentError> {
        self.entry(Resource::Posts, id, locale).await
    }
}
