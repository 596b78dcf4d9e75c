/*!
 * Translation exchange: export source text as rows, resolve each row back to
 * its source and target entities, and write translated text into the target.
 *
 * Nothing is cached; every call re-reads through the content service.
 */

use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;

use crate::app_config::ExchangeConfig;
use crate::content::{ContentEntry, ContentService, Resource};
use crate::errors::ExchangeError;
use crate::language_utils::{normalize_locale, normalize_locale_list, validate_locale};

/// Translatable field of a page or post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldPath {
    Title,
    Path,
    /// `summary` or `excerpt`
    Summary,
    /// `content` or `body`
    Content,
}

impl FieldPath {
    pub fn parse(value: &str) -> Option<FieldPath> {
        match value.trim().to_lowercase().as_str() {
            "title" => Some(FieldPath::Title),
            "path" => Some(FieldPath::Path),
            "summary" | "excerpt" => Some(FieldPath::Summary),
            "content" | "body" => Some(FieldPath::Content),
            _ => None,
        }
    }

    /// Read the field's current text; missing values read as empty
    pub fn read(&self, entry: &ContentEntry) -> String {
        let value = match self {
            FieldPath::Title => Some(entry.title.as_str()),
            FieldPath::Path => entry.data_str("path").or_else(|| match entry.resource {
                Resource::Pages => entry
                    .preview_url
                    .as_deref()
                    .filter(|url| !url.trim().is_empty()),
                Resource::Posts => None,
            }),
            FieldPath::Summary => match entry.resource {
                Resource::Pages => entry.data_str("summary").or_else(|| entry.data_str("excerpt")),
                Resource::Posts => entry.data_str("excerpt").or_else(|| entry.data_str("summary")),
            },
            FieldPath::Content => entry.data_str("content").or_else(|| entry.data_str("body")),
        };

        match (self, value) {
            (_, Some(value)) => value.to_string(),
            (FieldPath::Path, None) if entry.resource == Resource::Pages && !entry.slug.trim().is_empty() => {
                format!("/{}", entry.slug.trim())
            }
            _ => String::new(),
        }
    }

    /// Write a value, mirroring it to every alias of the field
    pub fn write(&self, entry: &mut ContentEntry, value: &str) {
        match self {
            FieldPath::Title => entry.title = value.to_string(),
            FieldPath::Path => {
                entry.set_data("path", value);
                if entry.resource == Resource::Pages {
                    entry.preview_url = Some(value.to_string());
                }
            }
            FieldPath::Summary => {
                entry.set_data("summary", value);
                entry.set_data("excerpt", value);
            }
            FieldPath::Content => {
                entry.set_data("content", value);
                entry.set_data("body", value);
            }
        }
    }
}

/// SHA-256 of the trimmed source text, hex encoded
pub fn hash_source_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Append `-<locale>` unless the value already ends with it
pub fn locale_suffixed(value: &str, locale: &str) -> String {
    let value = value.trim();
    let suffix = format!("-{}", locale);
    if value.is_empty() {
        locale.to_string()
    } else if value.to_lowercase().ends_with(&suffix) {
        value.to_string()
    } else {
        format!("{}{}", value, suffix)
    }
}

/// Which entities, locales and fields to export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportFilter {
    /// Resource aliases; empty means pages and posts
    pub resources: Vec<String>,
    /// Restrict to these entity ids; empty means all
    pub entity_ids: Vec<String>,
    /// Only export entities in this locale; blank means any
    pub source_locale: String,
    pub target_locales: Vec<String>,
    pub field_paths: Vec<String>,
    pub include_source_hash: bool,
}

impl Default for ExportFilter {
    fn default() -> Self {
        Self {
            resources: Vec::new(),
            entity_ids: Vec::new(),
            source_locale: String::new(),
            target_locales: Vec::new(),
            field_paths: Vec::new(),
            include_source_hash: true,
        }
    }
}

/// One unit of translation work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExchangeRow {
    pub resource: String,
    pub entity_id: String,
    pub translation_group_id: String,
    pub source_locale: String,
    pub target_locale: String,
    pub field_path: String,
    pub source_text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source_hash: String,
    pub translated_text: String,
}

impl ExchangeRow {
    pub fn linkage_key(&self) -> LinkageKey {
        LinkageKey {
            resource: self.resource.clone(),
            entity_id: self.entity_id.clone(),
            translation_group_id: self.translation_group_id.clone(),
            target_locale: self.target_locale.clone(),
            field_path: self.field_path.clone(),
        }
    }
}

/// Identifies the source entity, field and target locale of a row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LinkageKey {
    pub resource: String,
    pub entity_id: String,
    pub translation_group_id: String,
    pub target_locale: String,
    pub field_path: String,
}

/// Resolved state of a linkage key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Linkage {
    /// The key with resource, field and locale normalized
    pub key: LinkageKey,
    pub source_hash: String,
    pub target_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

/// Write request for one translated field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ApplyRequest {
    pub key: LinkageKey,
    pub translated_text: String,
    /// Target status; blank means the configured default
    pub workflow_status: String,
    /// Create the target variant when it does not exist yet
    pub create_translation: bool,
}

/// Result of applying one translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub target_id: String,
    pub created: bool,
    pub status: String,
}

/// Counts for an import batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ImportSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Outcome of one imported row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRowResult {
    pub index: usize,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

/// Summary plus per-row results of an import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ImportReport {
    pub summary: ImportSummary,
    pub results: Vec<ImportRowResult>,
}

impl ImportReport {
    fn record(&mut self, index: usize, outcome: Result<Option<String>, ExchangeError>) {
        self.summary.processed += 1;
        let result = match outcome {
            Ok(target_id) => {
                self.summary.succeeded += 1;
                ImportRowResult {
                    index,
                    status: "ok".to_string(),
                    text_code: None,
                    message: None,
                    target_id,
                }
            }
            Err(e) => {
                self.summary.failed += 1;
                ImportRowResult {
                    index,
                    status: "error".to_string(),
                    text_code: Some(e.text_code().to_string()),
                    message: Some(e.to_string()),
                    target_id: None,
                }
            }
        };
        self.results.push(result);
    }
}

/// A key resolved against current content
struct Resolved {
    key: LinkageKey,
    field: FieldPath,
    source: ContentEntry,
    target: Option<ContentEntry>,
    source_hash: String,
}

/// Export/import front end over the content service
#[derive(Debug, Clone)]
pub struct TranslationExchangeStore {
    content: Arc<dyn ContentService>,
    defaults: ExchangeConfig,
}

impl TranslationExchangeStore {
    pub fn new(content: Arc<dyn ContentService>, defaults: ExchangeConfig) -> Self {
        Self { content, defaults }
    }

    /// Rows for every matching `(entity, target locale, field)` with target ≠ source
    pub async fn export_rows(&self, filter: &ExportFilter) -> Result<Vec<ExchangeRow>, ExchangeError> {
        let resources = Resource::normalize_list(&filter.resources);

        let targets = if filter.target_locales.is_empty() {
            &self.defaults.default_target_locales
        } else {
            &filter.target_locales
        };
        let targets: Vec<String> = normalize_locale_list(targets)
            .into_iter()
            .filter(|locale| validate_locale(locale).is_ok())
            .collect();

        let fields = if filter.field_paths.is_empty() {
            &self.defaults.default_field_paths
        } else {
            &filter.field_paths
        };
        let mut seen = HashSet::new();
        let fields: Vec<(String, FieldPath)> = fields
            .iter()
            .map(|f| f.trim().to_lowercase())
            .filter(|f| seen.insert(f.clone()))
            .filter_map(|f| FieldPath::parse(&f).map(|path| (f, path)))
            .collect();

        let ids: HashSet<&str> = filter.entity_ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()).collect();
        let source_filter = normalize_locale(&filter.source_locale);
        let locale_filter = (!source_filter.is_empty()).then_some(source_filter.as_str());

        let mut rows = Vec::new();
        for resource in resources {
            let mut entries = self.content.entries(resource, locale_filter).await?;
            entries.sort_by(|a, b| a.id.cmp(&b.id));

            for entry in entries.iter().filter(|e| ids.is_empty() || ids.contains(e.id.trim())) {
                let source_locale = [entry.locale.as_str(), source_filter.as_str(), "en"]
                    .into_iter()
                    .map(normalize_locale)
                    .find(|l| !l.is_empty())
                    .unwrap_or_default();

                for target in targets.iter().filter(|t| **t != source_locale) {
                    for (name, field) in &fields {
                        let source_text = field.read(entry);
                        let source_hash = if filter.include_source_hash {
                            hash_source_text(&source_text)
                        } else {
                            String::new()
                        };
                        rows.push(ExchangeRow {
                            resource: resource.to_string(),
                            entity_id: entry.id.clone(),
                            translation_group_id: entry.group_id().to_string(),
                            source_locale: source_locale.clone(),
                            target_locale: target.clone(),
                            field_path: name.clone(),
                            source_text,
                            source_hash,
                            translated_text: String::new(),
                        });
                    }
                }
            }
        }

        debug!("Exported {} translation row(s)", rows.len());
        Ok(rows)
    }

    /// Check that a key still points at its source and whether a target exists
    pub async fn resolve_linkage(&self, key: &LinkageKey) -> Result<Linkage, ExchangeError> {
        let resolved = self.resolve(key).await?;
        Ok(Linkage {
            target_exists: resolved.target.is_some(),
            target_id: resolved.target.map(|t| t.id),
            key: resolved.key,
            source_hash: resolved.source_hash,
        })
    }

    /// Write translated text into the target variant, creating it on request
    pub async fn apply_translation(&self, request: &ApplyRequest) -> Result<ApplyOutcome, ExchangeError> {
        let resolved = self.resolve(&request.key).await?;
        let status = match request.workflow_status.trim() {
            "" => match self.defaults.default_workflow_status.trim() {
                "" => "draft".to_string(),
                configured => configured.to_string(),
            },
            requested => requested.to_string(),
        };
        let group = resolved.source.group_id().to_string();
        let locale = resolved.key.target_locale.clone();

        if let Some(mut target) = resolved.target {
            resolved.field.write(&mut target, &request.translated_text);
            target.status = status.clone();
            target.translation_group_id = group;

            let updated = self.content.update_entry(target).await?;
            info!(
                "Updated {} translation {} ({}) field '{}'",
                locale, updated.id, updated.resource, resolved.key.field_path
            );
            return Ok(ApplyOutcome {
                target_id: updated.id,
                created: false,
                status,
            });
        }

        if !request.create_translation {
            return Err(ExchangeError::LinkageNotFound(format!(
                "no {} translation of {} {}",
                locale, resolved.key.resource, resolved.key.entity_id
            )));
        }

        let source = resolved.source;
        let mut clone = source.clone();
        clone.id = String::new();
        clone.locale = locale.clone();
        clone.status = status.clone();
        clone.translation_group_id = group;
        clone.slug = locale_suffixed(&source.slug, &locale);
        if clone.resource == Resource::Pages && clone.data_str("path").is_none() {
            let path = locale_suffixed(&FieldPath::Path.read(&source), &locale);
            FieldPath::Path.write(&mut clone, &path);
        }
        resolved.field.write(&mut clone, &request.translated_text);

        let created = self.content.create_entry(clone).await?;
        info!(
            "Created {} translation {} of {} {}",
            locale, created.id, created.resource, source.id
        );
        Ok(ApplyOutcome {
            target_id: created.id,
            created: true,
            status,
        })
    }

    /// Check every row's linkage and source hash without writing
    pub async fn validate_import(&self, rows: &[ExchangeRow]) -> ImportReport {
        let mut report = ImportReport::default();
        for (index, row) in rows.iter().enumerate() {
            let outcome = match self.resolve_linkage(&row.linkage_key()).await {
                Ok(linkage) if !row.source_hash.trim().is_empty() && row.source_hash.trim() != linkage.source_hash => {
                    Err(ExchangeError::SourceChanged(format!(
                        "{} {} field '{}'",
                        linkage.key.resource, linkage.key.entity_id, linkage.key.field_path
                    )))
                }
                Ok(linkage) => Ok(linkage.target_id),
                Err(e) => Err(e),
            };
            report.record(index, outcome);
        }
        report
    }

    /// Apply every row's translated text
    pub async fn apply_import(&self, rows: &[ExchangeRow], create_translation: bool) -> ImportReport {
        let mut report = ImportReport::default();
        for (index, row) in rows.iter().enumerate() {
            let outcome = if row.translated_text.trim().is_empty() {
                Err(ExchangeError::InvalidRow(format!("row {} has no translated_text", index)))
            } else {
                let request = ApplyRequest {
                    key: row.linkage_key(),
                    translated_text: row.translated_text.clone(),
                    workflow_status: String::new(),
                    create_translation,
                };
                self.apply_translation(&request).await.map(|o| Some(o.target_id))
            };
            report.record(index, outcome);
        }
        info!(
            "Import applied: {} processed, {} succeeded, {} failed",
            report.summary.processed, report.summary.succeeded, report.summary.failed
        );
        report
    }

    async fn resolve(&self, key: &LinkageKey) -> Result<Resolved, ExchangeError> {
        let resource = Resource::normalize(&key.resource)
            .ok_or_else(|| ExchangeError::LinkageNotFound(format!("unsupported resource '{}'", key.resource)))?;
        let field_path = key.field_path.trim().to_lowercase();
        let field = FieldPath::parse(&field_path)
            .ok_or_else(|| ExchangeError::LinkageNotFound(format!("unsupported field path '{}'", key.field_path)))?;
        let target_locale = validate_locale(&key.target_locale)
            .map_err(|_| ExchangeError::LinkageNotFound(format!("unsupported locale '{}'", key.target_locale)))?;
        let entity_id = key.entity_id.trim();
        if entity_id.is_empty() {
            return Err(ExchangeError::LinkageNotFound("missing entity id".to_string()));
        }

        let source = self.content.entry(resource, entity_id, None).await?;
        let group = source.group_id().to_string();
        if !group.eq_ignore_ascii_case(key.translation_group_id.trim()) {
            return Err(ExchangeError::LinkageNotFound(format!(
                "{} {} is not in translation group '{}'",
                resource, entity_id, key.translation_group_id
            )));
        }
        if normalize_locale(&source.locale) == target_locale {
            return Err(ExchangeError::LinkageNotFound(format!(
                "{} {} is already in locale '{}'",
                resource, entity_id, target_locale
            )));
        }

        let candidates = self.content.entries(resource, None).await?;
        let target = find_target(&source, &group, &target_locale, &candidates).cloned();
        let source_hash = hash_source_text(&field.read(&source));

        Ok(Resolved {
            key: LinkageKey {
                resource: resource.to_string(),
                entity_id: source.id.clone(),
                translation_group_id: group,
                target_locale,
                field_path,
            },
            field,
            source,
            target,
            source_hash,
        })
    }
}

/// Sibling in the same group with the target locale, else with the suffixed slug
fn find_target<'a>(
    source: &ContentEntry,
    group: &str,
    locale: &str,
    candidates: &'a [ContentEntry],
) -> Option<&'a ContentEntry> {
    let siblings: Vec<&ContentEntry> = candidates
        .iter()
        .filter(|c| c.id != source.id && c.group_id().eq_ignore_ascii_case(group))
        .collect();
    let slug = format!("{}-{}", source.slug.trim(), locale);

    siblings
        .iter()
        .find(|c| normalize_locale(&c.locale) == locale)
        .or_else(|| siblings.iter().find(|c| c.slug.trim().eq_ignore_ascii_case(&slug)))
        .copied()
}
