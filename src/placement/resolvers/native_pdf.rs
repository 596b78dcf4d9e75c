/*!
 * Native PDF form resolver.
 *
 * Pairs AcroForm widget annotations (`/T (name)` + `/Rect [x0 y0 x1 y1]`) with
 * field definitions by name and type hint. Definitions left over after pairing
 * get a stacked heuristic placement on page 1.
 */

use async_trait::async_trait;
use log::debug;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::collections::HashSet;

use crate::errors::ResolverError;
use crate::placement::models::{Estimate, FieldDefinition, Geometry, NativeFormField, Suggestion};

use super::{PlacementResolver, ResolveInput, ResolveResult, canonical_token};

pub const NATIVE_PDF_RESOLVER_ID: &str = "native_pdf_forms_resolver";

const EXACT_LABEL_CONFIDENCE: f64 = 0.95;
const TYPE_HINT_CONFIDENCE: f64 = 0.80;
const FALLBACK_PAIRING_CONFIDENCE: f64 = 0.65;
const HEURISTIC_CONFIDENCE: f64 = 0.30;

const HEURISTIC_X0: f64 = 64.0;
const HEURISTIC_Y0: f64 = 120.0;
const HEURISTIC_DX: f64 = 6.0;
const HEURISTIC_DY: f64 = 34.0;
const HEURISTIC_WIDTH: f64 = 180.0;
const HEURISTIC_HEIGHT: f64 = 28.0;

static TITLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/T\s*\(((?:\\.|[^\\)])*)\)").expect("Invalid widget title regex")
});

static RECT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"/Rect\s*\[\s*(-?[0-9]*\.?[0-9]+)\s+(-?[0-9]*\.?[0-9]+)\s+(-?[0-9]*\.?[0-9]+)\s+(-?[0-9]*\.?[0-9]+)\s*\]",
    )
    .expect("Invalid widget rect regex")
});

static FIELD_TYPE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/FT\s*/([A-Za-z]+)").expect("Invalid widget field type regex"));

static PAGE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/Type\s*/Page(?-u:\b)").expect("Invalid page object regex"));

/// How a native field was paired with a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchType {
    ExactLabel,
    TypeHint,
    FallbackPairing,
}

impl MatchType {
    fn from_score(score: u32) -> Self {
        if score >= 3 {
            MatchType::ExactLabel
        } else if score == 2 {
            MatchType::TypeHint
        } else {
            MatchType::FallbackPairing
        }
    }

    fn confidence(self) -> f64 {
        match self {
            MatchType::ExactLabel => EXACT_LABEL_CONFIDENCE,
            MatchType::TypeHint => TYPE_HINT_CONFIDENCE,
            MatchType::FallbackPairing => FALLBACK_PAIRING_CONFIDENCE,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            MatchType::ExactLabel => "exact_label",
            MatchType::TypeHint => "type_hint",
            MatchType::FallbackPairing => "fallback_pairing",
        }
    }
}

/// Reference resolver backed by native PDF form widgets
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePdfResolver;

impl NativePdfResolver {
    /// Supplied native fields, or the widgets found by scanning the document
    fn native_fields(input: &ResolveInput) -> Vec<NativeFormField> {
        if !input.native_fields.is_empty() {
            return input.native_fields.clone();
        }
        scan_widgets(&input.document)
    }
}

#[async_trait]
impl PlacementResolver for NativePdfResolver {
    fn id(&self) -> &str {
        NATIVE_PDF_RESOLVER_ID
    }

    async fn estimate(&self, input: &ResolveInput) -> Result<Estimate, ResolverError> {
        if Self::native_fields(input).is_empty() {
            Ok(Estimate::new(NATIVE_PDF_RESOLVER_ID, 0.35, 0.15, 0.20, "fallback_estimate"))
        } else {
            Ok(Estimate::new(NATIVE_PDF_RESOLVER_ID, 0.92, 0.12, 0.10, "native_forms_detected"))
        }
    }

    async fn resolve(&self, input: &ResolveInput) -> Result<ResolveResult, ResolverError> {
        if input.cancel.is_cancelled() {
            return Err(ResolverError::Cancelled);
        }

        let natives = Self::native_fields(input);
        let suggestions = match_fields(&natives, &input.definitions);

        debug!(
            "Native PDF resolver matched {} native field(s) against {} definition(s)",
            natives.len(),
            input.definitions.len()
        );

        let suggested: HashSet<&str> = suggestions
            .iter()
            .map(|s| s.field_definition_id.as_str())
            .collect();
        let unresolved = input
            .definitions
            .iter()
            .filter(|d| !suggested.contains(d.id.as_str()))
            .map(|d| d.id.clone())
            .collect();

        Ok(ResolveResult::new(suggestions, unresolved))
    }
}

fn pairing_score(native_key: &str, native_hint: &str, definition: &FieldDefinition) -> u32 {
    let mut score = 0;

    if !native_key.is_empty()
        && (native_key == canonical_token(&definition.label) || native_key == canonical_token(&definition.id))
    {
        score += 3;
    }

    let field_type = canonical_token(&definition.field_type);
    if !native_hint.is_empty()
        && !field_type.is_empty()
        && (native_hint.contains(&field_type) || field_type.contains(native_hint))
    {
        score += 2;
    }

    score
}

/// Pair native fields with definitions, then fill the rest heuristically
fn match_fields(natives: &[NativeFormField], definitions: &[FieldDefinition]) -> Vec<Suggestion> {
    let mut matched = vec![false; definitions.len()];
    let mut suggestions = Vec::with_capacity(definitions.len());

    for native in natives {
        let native_key = canonical_token(&native.name);
        let native_hint = canonical_token(&native.field_type_hint);

        let mut best: Option<(usize, u32)> = None;
        for (index, definition) in definitions.iter().enumerate() {
            if matched[index] {
                continue;
            }
            let score = pairing_score(&native_key, &native_hint, definition);
            if score > 0 && best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((index, score));
            }
        }

        let chosen = best.or_else(|| matched.iter().position(|m| !m).map(|index| (index, 0)));
        let Some((index, score)) = chosen else {
            break;
        };

        matched[index] = true;
        let definition = &definitions[index];
        let match_type = MatchType::from_score(score);

        suggestions.push(
            Suggestion::new(&definition.id, NATIVE_PDF_RESOLVER_ID, match_type.confidence(), native.geometry)
                .with_label(&definition.label)
                .with_metadata("match_type", match_type.as_str())
                .with_metadata("native_field_name", &native.name),
        );
    }

    let mut offset = 0.0;
    for (index, definition) in definitions.iter().enumerate() {
        if matched[index] {
            continue;
        }
        let geometry = Geometry::new(
            1,
            HEURISTIC_X0 + HEURISTIC_DX * offset,
            HEURISTIC_Y0 + HEURISTIC_DY * offset,
            HEURISTIC_WIDTH,
            HEURISTIC_HEIGHT,
        );
        suggestions.push(
            Suggestion::new(&definition.id, NATIVE_PDF_RESOLVER_ID, HEURISTIC_CONFIDENCE, geometry)
                .with_label(&definition.label)
                .with_metadata("match_type", "heuristic_fallback"),
        );
        offset += 1.0;
    }

    suggestions
}

/// Find widget annotations in raw PDF bytes
///
/// Only uncompressed object dictionaries are visible. Widgets are reported on
/// page 1, in document order, first occurrence per name.
pub fn scan_widgets(document: &[u8]) -> Vec<NativeFormField> {
    let mut fields = Vec::new();
    let mut seen = HashSet::new();

    for own_bytes in dictionary_bodies(document) {
        let Some(name) = TITLE_REGEX
            .captures(&own_bytes)
            .map(|c| unescape_pdf_string(&c[1]))
        else {
            continue;
        };
        let name = name.trim().to_string();
        if name.is_empty() {
            continue;
        }

        let Some(rect) = RECT_REGEX.captures(&own_bytes) else {
            continue;
        };
        let coords: Vec<f64> = (1..=4)
            .filter_map(|i| std::str::from_utf8(&rect[i]).ok()?.parse::<f64>().ok())
            .collect();
        if coords.len() != 4 {
            continue;
        }
        let (x0, y0, x1, y1) = (coords[0], coords[1], coords[2], coords[3]);
        let (width, height) = (x1 - x0, y1 - y0);
        if width <= 0.0 || height <= 0.0 {
            continue;
        }

        if !seen.insert(name.clone()) {
            continue;
        }

        let field_type_hint = FIELD_TYPE_REGEX
            .captures(&own_bytes)
            .and_then(|c| std::str::from_utf8(&c[1]).ok().map(widget_type_hint))
            .unwrap_or_default();

        fields.push(NativeFormField {
            name,
            field_type_hint,
            geometry: Geometry::new(1, x0, y0, width, height),
        });
    }

    fields
}

/// Number of uncompressed `/Type /Page` objects, at least 1
pub fn count_pages(document: &[u8]) -> u32 {
    let count = PAGE_REGEX.find_iter(document).count();
    u32::try_from(count).unwrap_or(u32::MAX).max(1)
}

fn widget_type_hint(field_type: &str) -> String {
    match field_type {
        "Sig" => "signature".to_string(),
        "Tx" => "text".to_string(),
        "Btn" => "checkbox".to_string(),
        "Ch" => "choice".to_string(),
        other => other.to_lowercase(),
    }
}

fn unescape_pdf_string(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut iter = raw.iter().copied();
    while let Some(byte) = iter.next() {
        if byte == b'\\' {
            match iter.next() {
                Some(b'n') => out.push(b'\n'),
                Some(b't') => out.push(b'\t'),
                Some(b'r') => out.push(b'\r'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(byte);
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Bodies of every `<< ... >>` dictionary with nested dictionaries cut out,
/// ordered by where each dictionary starts
fn dictionary_bodies(document: &[u8]) -> Vec<Vec<u8>> {
    struct Open {
        start: usize,
        children: Vec<(usize, usize)>,
    }

    let mut stack: Vec<Open> = Vec::new();
    let mut closed: Vec<(usize, Vec<u8>)> = Vec::new();
    let mut i = 0;

    while i < document.len() {
        match document[i] {
            b'(' if !stack.is_empty() => {
                i = skip_literal_string(document, i);
                continue;
            }
            b'<' if document.get(i + 1) == Some(&b'<') => {
                stack.push(Open {
                    start: i,
                    children: Vec::new(),
                });
                i += 2;
                continue;
            }
            b'<' => {
                // hex string
                i = document[i..]
                    .iter()
                    .position(|b| *b == b'>')
                    .map_or(document.len(), |offset| i + offset + 1);
                continue;
            }
            b'>' if document.get(i + 1) == Some(&b'>') => {
                if let Some(open) = stack.pop() {
                    let end = i + 2;
                    let mut body = Vec::new();
                    let mut cursor = open.start + 2;
                    for (child_start, child_end) in &open.children {
                        body.extend_from_slice(&document[cursor..*child_start]);
                        cursor = *child_end;
                    }
                    body.extend_from_slice(&document[cursor..i]);
                    closed.push((open.start, body));

                    if let Some(parent) = stack.last_mut() {
                        parent.children.push((open.start, end));
                    }
                }
                i += 2;
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    closed.sort_by_key(|(start, _)| *start);
    closed.into_iter().map(|(_, body)| body).collect()
}

/// Index just past a balanced `( ... )` literal starting at `start`
fn skip_literal_string(document: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < document.len() {
        match document[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    document.len()
}
