/*!
 * In-memory content service backed by a JSON fixture file.
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::ContentError;

use super::{ContentEntry, ContentService, Resource};

/// On-disk layout of a content fixture
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentSnapshot {
    #[serde(default)]
    pub pages: Vec<ContentEntry>,
    #[serde(default)]
    pub posts: Vec<ContentEntry>,
}

type Store = BTreeMap<(Resource, String), ContentEntry>;

/// Thread-safe content store keyed by resource and id
#[derive(Debug, Clone, Default)]
pub struct InMemoryContentService {
    entries: Arc<RwLock<Store>>,
}

impl InMemoryContentService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a service from a snapshot, stamping each entry with its resource
    pub fn from_snapshot(snapshot: ContentSnapshot) -> Self {
        let service = Self::new();
        {
            let mut store = service.entries.write();
            for (resource, list) in [(Resource::Pages, snapshot.pages), (Resource::Posts, snapshot.posts)] {
                for mut entry in list {
                    entry.resource = resource;
                    store.insert((resource, entry.id.clone()), entry);
                }
            }
        }
        service
    }

    /// Load a `{pages: [...], posts: [...]}` JSON fixture
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read content file: {}", path.display()))?;
        let snapshot: ContentSnapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse content file: {}", path.display()))?;
        debug!(
            "Loaded {} page(s) and {} post(s) from {}",
            snapshot.pages.len(),
            snapshot.posts.len(),
            path.display()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the current contents back as a JSON fixture
    pub fn save_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(&self.snapshot())
            .context("Failed to serialize content snapshot")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write content file: {}", path.display()))?;
        Ok(())
    }

    pub fn snapshot(&self) -> ContentSnapshot {
        let store = self.entries.read();
        let mut snapshot = ContentSnapshot::default();
        for ((resource, _), entry) in store.iter() {
            match resource {
                Resource::Pages => snapshot.pages.push(entry.clone()),
                Resource::Posts => snapshot.posts.push(entry.clone()),
            }
        }
        snapshot
    }

    /// Insert or replace an entry without going through the async contract
    pub fn insert(&self, entry: ContentEntry) {
        self.entries.write().insert((entry.resource, entry.id.clone()), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl ContentService for InMemoryContentService {
    async fn entries(&self, resource: Resource, locale: Option<&str>) -> Result<Vec<ContentEntry>, ContentError> {
        let locale = locale.map(str::trim).filter(|l| !l.is_empty());
        let store = self.entries.read();
        Ok(store
            .iter()
            .filter(|((r, _), _)| *r == resource)
            .map(|(_, entry)| entry)
            .filter(|entry| locale.is_none_or(|l| entry.locale.eq_ignore_ascii_case(l)))
            .cloned()
            .collect())
    }

    async fn entry(&self, resource: Resource, id: &str, _locale: Option<&str>) -> Result<ContentEntry, ContentError> {
        self.entries
            .read()
            .get(&(resource, id.trim().to_string()))
            .cloned()
            .ok_or_else(|| ContentError::NotFound {
                resource: resource.to_string(),
                id: id.to_string(),
            })
    }

    async fn create_entry(&self, mut entry: ContentEntry) -> Result<ContentEntry, ContentError> {
        if entry.id.trim().is_empty() {
            entry.id = Uuid::new_v4().to_string();
        }
        let key = (entry.resource, entry.id.clone());

        let mut store = self.entries.write();
        if store.contains_key(&key) {
            return Err(ContentError::Conflict(format!(
                "{} entry {} already exists",
                entry.resource, entry.id
            )));
        }
        store.insert(key, entry.clone());
        Ok(entry)
    }

    async fn update_entry(&self, entry: ContentEntry) -> Result<ContentEntry, ContentError> {
        let key = (entry.resource, entry.id.clone());

        let mut store = self.entries.write();
        match store.get_mut(&key) {
            Some(existing) => {
                *existing = entry.clone();
                Ok(entry)
            }
            None => Err(ContentError::NotFound {
                resource: entry.resource.to_string(),
                id: entry.id,
            }),
        }
    }
}
