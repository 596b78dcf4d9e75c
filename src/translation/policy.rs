/*!
 * Publish gate: a `publish` transition is allowed only when every locale the
 * environment requires has a translation in the entity's group.
 */

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::app_config::{TransitionRequirement, TranslationPolicyConfig};
use crate::content::{ContentEntry, ContentService, Resource};
use crate::errors::{MissingTranslationsError, TranslationPolicyError};
use crate::language_utils::{locales_match, normalize_locale, normalize_locale_list};

use super::exchange::FieldPath;

/// Transition gated by the policy
pub const PUBLISH_TRANSITION: &str = "publish";

/// A workflow transition request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TranslationPolicyInput {
    pub entity_type: String,
    /// Policy key; falls back to `entity_type`. Anything after `@` is ignored.
    pub policy_entity: String,
    pub entity_id: String,
    pub transition: String,
    pub environment: String,
    pub requested_locale: String,
}

impl TranslationPolicyInput {
    pub fn publish(entity_type: &str, entity_id: &str, environment: &str) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            transition: PUBLISH_TRANSITION.to_string(),
            environment: environment.to_string(),
            ..Default::default()
        }
    }

    /// Normalized policy key
    pub fn policy_key(&self) -> String {
        let raw = if self.policy_entity.trim().is_empty() {
            &self.entity_type
        } else {
            &self.policy_entity
        };
        raw.split('@').next().unwrap_or("").trim().to_lowercase()
    }
}

/// Locale and field requirements for one transition
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Requirements {
    pub environment: String,
    pub locales: Vec<String>,
    pub fields: BTreeMap<String, Vec<FieldPath>>,
}

/// Validates workflow transitions against configured translation requirements
#[derive(Debug, Clone)]
pub struct TranslationPolicy {
    content: Arc<dyn ContentService>,
    config: TranslationPolicyConfig,
}

impl TranslationPolicy {
    pub fn new(content: Arc<dyn ContentService>, config: TranslationPolicyConfig) -> Self {
        Self { content, config }
    }

    /// Requirements for a policy key, transition and environment
    pub fn requirements(&self, policy_entity: &str, transition: &str, environment: &str) -> Requirements {
        let environment = match environment.trim().to_lowercase() {
            env if env.is_empty() => self.config.default_environment.trim().to_lowercase(),
            env => env,
        };
        let overrides: Option<&TransitionRequirement> = self
            .config
            .entities
            .get(policy_entity)
            .and_then(|transitions| transitions.get(transition));

        let locales = overrides
            .and_then(|r| r.required_locales.get(&environment))
            .or_else(|| self.config.required_locales.get(&environment))
            .or_else(|| self.config.required_locales.get("production"))
            .map(|locales| normalize_locale_list(locales))
            .unwrap_or_else(|| vec!["en".to_string(), "es".to_string(), "fr".to_string()]);

        let fields = overrides
            .map(|r| {
                r.required_fields
                    .iter()
                    .map(|(locale, fields)| {
                        let paths: Vec<FieldPath> = fields.iter().filter_map(|f| FieldPath::parse(f)).collect();
                        (normalize_locale(locale), paths)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Requirements {
            environment,
            locales,
            fields,
        }
    }

    /// Permit or reject a transition
    pub async fn validate(&self, input: &TranslationPolicyInput) -> Result<(), TranslationPolicyError> {
        let transition = input.transition.trim().to_lowercase();
        if transition != PUBLISH_TRANSITION {
            return Ok(());
        }

        let policy_entity = input.policy_key();
        let Some(resource) = Resource::normalize(&policy_entity).or_else(|| Resource::normalize(&input.entity_type))
        else {
            debug!("No translation policy for entity type '{}', permitting", policy_entity);
            return Ok(());
        };

        let requested_locale = normalize_locale(&input.requested_locale);
        let requested = (!requested_locale.is_empty()).then_some(requested_locale.as_str());
        let entity = self.content.entry(resource, input.entity_id.trim(), requested).await?;

        let source_locale = [entity.locale.as_str(), requested_locale.as_str(), "en"]
            .into_iter()
            .map(normalize_locale)
            .find(|l| !l.is_empty())
            .unwrap_or_default();

        let requirements = self.requirements(&policy_entity, &transition, &input.environment);
        let siblings = self.content.entries(resource, None).await?;

        let mut available = BTreeSet::new();
        let mut missing_fields: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for locale in &requirements.locales {
            let fields = requirements.fields.get(locale).map(Vec::as_slice).unwrap_or(&[]);
            let candidates: Vec<&ContentEntry> = if *locale == source_locale {
                vec![&entity]
            } else {
                translation_candidates(&entity, locale, &siblings)
            };

            if candidates.is_empty() {
                continue;
            }
            match candidates.iter().find(|c| blank_fields(c, fields).is_empty()) {
                Some(_) => {
                    available.insert(locale.clone());
                }
                None => {
                    let blanks = blank_fields(candidates[0], fields);
                    missing_fields.insert(locale.clone(), blanks);
                }
            }
        }

        let missing: Vec<String> = requirements
            .locales
            .iter()
            .filter(|locale| !available.contains(*locale))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if missing.is_empty() {
            info!(
                "Translation policy permits {} of {} {} in {}",
                transition, resource, entity.id, requirements.environment
            );
            return Ok(());
        }

        warn!(
            "Translation policy blocks {} of {} {} in {}: missing {:?}",
            transition, resource, entity.id, requirements.environment, missing
        );
        Err(MissingTranslationsError {
            entity_type: input.entity_type.trim().to_string(),
            policy_entity,
            entity_id: entity.id,
            transition,
            environment: requirements.environment,
            requested_locale,
            missing_locales: missing,
            missing_fields_by_locale: missing_fields,
        }
        .into())
    }
}

/// Siblings that count as the `locale` translation of `source`
///
/// A sibling qualifies when its slug is `<source-slug>-<locale>`, or when it
/// shares the translation group and carries the locale. Content types must match.
fn translation_candidates<'a>(source: &ContentEntry, locale: &str, siblings: &'a [ContentEntry]) -> Vec<&'a ContentEntry> {
    let slug = format!("{}-{}", source.slug.trim(), locale);
    let group = source.group_id();

    siblings
        .iter()
        .filter(|s| s.id != source.id && s.content_type_matches(source))
        .filter(|s| {
            s.slug.trim().eq_ignore_ascii_case(&slug)
                || (s.group_id().eq_ignore_ascii_case(group) && locales_match(&s.locale, locale))
        })
        .collect()
}

fn blank_fields(entry: &ContentEntry, fields: &[FieldPath]) -> Vec<String> {
    fields
        .iter()
        .filter(|f| f.read(entry).trim().is_empty())
        .map(|f| field_name(*f).to_string())
        .collect()
}

fn field_name(field: FieldPath) -> &'static str {
    match field {
        FieldPath::Title => "title",
        FieldPath::Path => "path",
        FieldPath::Summary => "summary",
        FieldPath::Content => "content",
    }
}
