/*!
 * Tests for the controller used by the command line tool
 */

use backoffice::app_config::Config;
use backoffice::app_controller::{Controller, PlaceRequest};
use backoffice::content::{ContentService, InMemoryContentService, Resource};
use backoffice::file_utils::FileManager;
use backoffice::placement::models::RunStatus;
use backoffice::translation::exchange::ExportFilter;

use crate::common::{create_temp_dir, create_test_file, field_definitions, pdf_with_widgets};

const CONTENT_FIXTURE: &str = r#"{
  "pages": [
    { "id": "page-1", "title": "Welcome", "slug": "welcome", "locale": "en", "translation_group_id": "g1" }
  ],
  "posts": []
}"#;

#[tokio::test]
async fn test_place_withPersist_shouldStoreRunInConfiguredDatabase() {
    let dir = create_temp_dir().unwrap();
    let pdf = dir.path().join("lease.pdf");
    std::fs::write(&pdf, pdf_with_widgets(&["field-1", "field-2"])).unwrap();
    let definitions = dir.path().join("fields.json");
    FileManager::write_json(&definitions, &field_definitions(2)).unwrap();

    let mut config = Config::default();
    let db_path = dir.path().join("runs.db");
    config.database.path = Some(db_path.to_string_lossy().to_string());
    let controller = Controller::with_config(config).unwrap();

    let request = PlaceRequest {
        agreement_id: "lease-2024".to_string(),
        user_id: Some("user-1".to_string()),
        persist: true,
        ..Default::default()
    };
    let run = controller.place(&pdf, &definitions, request).await.unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.suggestions.len(), 2);
    assert_eq!(run.created_by_user_id, "user-1");

    let repo = controller.open_repository().unwrap();
    let stored = repo.list_runs_for_agreement("lease-2024").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, run.id);
    assert_eq!(stored[0].suggestions.len(), 2);
}

#[tokio::test]
async fn test_exportThenApply_throughFixtureFile_shouldPersistTranslation() {
    let dir = create_temp_dir().unwrap();
    let fixture = create_test_file(dir.path(), "content.json", CONTENT_FIXTURE).unwrap();
    let controller = Controller::with_content_file(Config::default(), &fixture).unwrap();

    let filter = ExportFilter {
        target_locales: vec!["es".to_string()],
        ..Default::default()
    };
    let mut rows = controller.export(&filter).await.unwrap();
    assert_eq!(rows.len(), 1);
    rows[0].translated_text = "Bienvenido".to_string();

    let report = controller.apply(&rows, true).await;
    assert_eq!(report.summary.succeeded, 1);
    controller.save_content(&fixture).unwrap();

    let reloaded = InMemoryContentService::from_json_file(&fixture).unwrap();
    let pages = reloaded.entries(Resource::Pages, Some("es")).await.unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].title, "Bienvenido");
    assert_eq!(pages[0].translation_group_id, "g1");
}

#[tokio::test]
async fn test_checkPublish_afterTranslationsApplied_shouldPass() {
    let dir = create_temp_dir().unwrap();
    let fixture = create_test_file(dir.path(), "content.json", CONTENT_FIXTURE).unwrap();
    let controller = Controller::with_content_file(Config::default(), &fixture).unwrap();

    assert!(controller.check_publish(Resource::Pages, "page-1", "production").await.is_err());

    let mut rows = controller.export(&ExportFilter::default()).await.unwrap();
    for row in &mut rows {
        row.translated_text = format!("{} [{}]", row.source_text, row.target_locale);
    }
    let report = controller.apply(&rows, true).await;
    assert_eq!(report.summary.succeeded, 2);

    controller.check_publish(Resource::Pages, "page-1", "production").await.unwrap();
}
