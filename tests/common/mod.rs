/*!
 * Common test utilities for the backoffice test suite
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Once;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use backoffice::content::{ContentEntry, InMemoryContentService, Resource};
use backoffice::placement::Clock;
use backoffice::placement::models::FieldDefinition;

// Re-export the mock resolvers module
pub mod mock_resolvers;

static INIT_LOGGING: Once = Once::new();

/// Route library logs through env_logger in test mode
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    std::fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Clock frozen at a single instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn new() -> Self {
        Self(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().unwrap_or_else(Utc::now))
    }

    pub fn shared() -> Arc<dyn Clock> {
        Arc::new(Self::new())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Field definitions `field-1..=field-n`
pub fn field_definitions(count: usize) -> Vec<FieldDefinition> {
    (1..=count)
        .map(|i| FieldDefinition::new(&format!("field-{}", i), "signature", &format!("Field {}", i)))
        .collect()
}

/// A page in translation group `group`
pub fn page(id: &str, slug: &str, locale: &str, group: &str) -> ContentEntry {
    let mut entry = ContentEntry::new(Resource::Pages, id, &format!("Title {}", id), slug, locale);
    entry.translation_group_id = group.to_string();
    entry
}

/// A post in translation group `group`
pub fn post(id: &str, slug: &str, locale: &str, group: &str) -> ContentEntry {
    let mut entry = ContentEntry::new(Resource::Posts, id, &format!("Post {}", id), slug, locale);
    entry.translation_group_id = group.to_string();
    entry
}

/// Content service seeded with the given entries
pub fn content_with(entries: Vec<ContentEntry>) -> Arc<InMemoryContentService> {
    let content = InMemoryContentService::new();
    for entry in entries {
        content.insert(entry);
    }
    Arc::new(content)
}

/// Minimal uncompressed PDF with one signature widget per name
pub fn pdf_with_widgets(names: &[&str]) -> Vec<u8> {
    let mut pdf = String::from("%PDF-1.4\n1 0 obj << /Type /Page >> endobj\n");
    for (i, name) in names.iter().enumerate() {
        let y = 100 + i * 50;
        pdf.push_str(&format!(
            "{} 0 obj << /Type /Annot /Subtype /Widget /FT /Sig /T ({}) /Rect [50 {} 250 {}] >> endobj\n",
            i + 2,
            name,
            y,
            y + 40
        ));
    }
    pdf.push_str("%%EOF\n");
    pdf.into_bytes()
}
