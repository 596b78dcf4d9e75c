/*!
 * Ordered, keyed catalogue of placement resolvers.
 */

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::resolvers::PlacementResolver;

/// Advisory capability metadata advertised by a resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResolverCapability {
    pub description: String,
    pub deterministic: bool,
    pub supports_native: bool,
    pub supports_text: bool,
    pub supports_ocr: bool,
    pub supports_ml: bool,
    pub estimated_cost: f64,
    pub estimated_latency: f64,
}

/// A registered resolver and its capability metadata
#[derive(Debug, Clone)]
pub struct Registration {
    pub id: String,
    pub resolver: Arc<dyn PlacementResolver>,
    pub capability: ResolverCapability,
}

/// Resolver registry keyed by lower-cased, trimmed resolver id
///
/// Built once and shared read-only; swap the whole `Arc` to reload.
#[derive(Debug, Clone, Default)]
pub struct ResolverRegistry {
    entries: HashMap<String, Registration>,
    order: Vec<String>,
}

/// Registry key for a resolver id
pub fn registry_key(id: &str) -> String {
    id.trim().to_lowercase()
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a resolver; empty ids are ignored
    pub fn register(&mut self, resolver: Arc<dyn PlacementResolver>, capability: ResolverCapability) {
        let key = registry_key(resolver.id());
        if key.is_empty() {
            return;
        }

        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        } else {
            debug!("Replacing registered resolver {}", key);
        }

        self.entries.insert(
            key.clone(),
            Registration {
                id: key,
                resolver,
                capability,
            },
        );
    }

    pub fn resolve(&self, id: &str) -> Option<&Registration> {
        self.entries.get(&registry_key(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(&registry_key(id))
    }

    /// Registrations in insertion order
    pub fn ordered(&self) -> Vec<Registration> {
        self.order
            .iter()
            .filter_map(|key| self.entries.get(key).cloned())
            .collect()
    }

    /// Resolver ids in insertion order
    pub fn ordered_ids(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
