/*!
 * Assignment queue and run persistence on an in-memory SQLite database
 */

use serde_json::json;
use std::sync::Arc;

use backoffice::app_config::{ExchangeConfig, TranslationPolicyConfig};
use backoffice::content::ContentService;
use backoffice::database::models::{AssignmentStatus, AssignmentType, TranslationAssignment};
use backoffice::database::repository::Repository;
use backoffice::errors::QueueError;
use backoffice::placement::models::{PolicyOverlay, RunInput};
use backoffice::placement::{Orchestrator, PolicyResolver};
use backoffice::translation::TranslationPolicy;
use backoffice::{AdminApi, ApiRequest, TranslationExchangeStore, TranslationQueueService};

use crate::common::mock_resolvers::{ScriptedResolver, registry_of};
use crate::common::{FixedClock, content_with, field_definitions, init_logging};

fn queue() -> TranslationQueueService {
    TranslationQueueService::new(Repository::new_in_memory().unwrap())
}

fn api_with(queue: TranslationQueueService) -> AdminApi {
    let content: Arc<dyn ContentService> = content_with(vec![]);
    AdminApi::new(
        Arc::clone(&content),
        TranslationExchangeStore::new(Arc::clone(&content), ExchangeConfig::default()),
        TranslationPolicy::new(content, TranslationPolicyConfig::default()),
    )
    .with_queue(queue)
}

#[tokio::test]
async fn test_update_concurrentWriters_shouldRejectStaleVersion() {
    init_logging();
    let queue = queue();
    let (queued, _) = queue
        .enqueue(TranslationAssignment::new("g1", "pages", "page-1", "en", "es"))
        .await
        .unwrap();

    let first = queue.claim(&queued.id, "alice", queued.version).await.unwrap();
    assert_eq!(first.version, queued.version + 1);

    let err = queue.cancel(&queued.id, queued.version).await.unwrap_err();
    assert_eq!(
        err,
        QueueError::StaleVersion {
            id: queued.id.clone(),
            expected: queued.version,
            actual: first.version,
        }
    );

    let stored = queue.repository().get_assignment(&queued.id).await.unwrap().unwrap();
    assert_eq!(stored.assignee_id.as_deref(), Some("alice"));
    assert_eq!(stored.status, AssignmentStatus::Pending);
}

#[tokio::test]
async fn test_enqueue_sameGroupAndLocale_shouldReuseActiveAssignment() {
    let queue = queue();
    let (first, inserted) = queue
        .enqueue(TranslationAssignment::new("g1", "pages", "page-1", "en", "fr"))
        .await
        .unwrap();
    assert!(inserted);

    let (second, inserted) = queue
        .enqueue(TranslationAssignment::new("g1", "pages", "page-1", "en", "FR"))
        .await
        .unwrap();
    assert!(!inserted);
    assert_eq!(second.id, first.id);

    queue.cancel(&first.id, first.version).await.unwrap();
    let (third, inserted) = queue
        .enqueue(TranslationAssignment::new("g1", "pages", "page-1", "en", "fr"))
        .await
        .unwrap();
    assert!(inserted);
    assert_ne!(third.id, first.id);
}

#[tokio::test]
async fn test_enqueue_invalidInput_shouldBeRejected() {
    let queue = queue();

    let same_locale = queue
        .enqueue(TranslationAssignment::new("g1", "pages", "page-1", "en", "en"))
        .await;
    assert!(matches!(same_locale, Err(QueueError::InvalidInput(_))));

    let no_group = queue
        .enqueue(TranslationAssignment::new("  ", "pages", "page-1", "en", "fr"))
        .await;
    assert!(matches!(no_group, Err(QueueError::InvalidInput(_))));
}

#[tokio::test]
async fn test_approve_fromPending_shouldBeInvalidTransition() {
    let queue = queue();
    let (queued, _) = queue
        .enqueue(TranslationAssignment::new("g1", "posts", "post-1", "en", "es"))
        .await
        .unwrap();

    let err = queue.approve(&queued.id, "bob", queued.version).await.unwrap_err();

    assert!(matches!(err, QueueError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_adminApi_myWorkAndQueue_shouldListActiveAssignments() {
    let queue = queue();
    let (mine, _) = queue
        .enqueue(TranslationAssignment::new("g1", "pages", "page-1", "en", "es"))
        .await
        .unwrap();
    let (open, _) = queue
        .enqueue(TranslationAssignment::new("g2", "pages", "page-2", "en", "fr"))
        .await
        .unwrap();
    let (done, _) = queue
        .enqueue(TranslationAssignment::new("g3", "posts", "post-1", "en", "fr"))
        .await
        .unwrap();
    queue.claim(&mine.id, "alice", mine.version).await.unwrap();
    queue.cancel(&done.id, done.version).await.unwrap();
    let api = api_with(queue);

    let my_work = api
        .dispatch(&ApiRequest::get("/admin/api/translations/my-work").with_user("alice"))
        .await;
    assert_eq!(my_work.status, 200);
    assert_eq!(my_work.body.pointer("/data/scope"), Some(&json!("my_work")));
    assert_eq!(my_work.body.pointer("/data/total"), Some(&json!(1)));
    assert_eq!(my_work.body.pointer("/data/items/0/id"), Some(&json!(mine.id)));

    let open_queue = api
        .dispatch(&ApiRequest::get("/admin/api/translations/queue").with_query("per_page", "1"))
        .await;
    assert_eq!(open_queue.status, 200);
    assert_eq!(open_queue.body.pointer("/data/total"), Some(&json!(2)));
    assert_eq!(open_queue.body["data"]["items"].as_array().map(Vec::len), Some(1));
    let listed = open_queue.body["data"]["items"][0]["id"].clone();
    assert!(listed == json!(mine.id) || listed == json!(open.id));
}

#[tokio::test]
async fn test_directAssignment_shouldNotBeClaimable() {
    let queue = queue();
    let mut assignment = TranslationAssignment::new("g1", "pages", "page-1", "en", "es").assigned_to("carol");
    assignment.assignment_type = AssignmentType::Direct;
    let (queued, _) = queue.enqueue(assignment).await.unwrap();

    let err = queue.claim(&queued.id, "alice", queued.version).await.unwrap_err();
    assert!(matches!(err, QueueError::NotClaimable(_)));

    let started = queue.start(&queued.id, "carol", queued.version).await.unwrap();
    assert_eq!(started.status, AssignmentStatus::InProgress);
}

#[tokio::test]
async fn test_saveRun_shouldRoundTripThroughRepository() {
    let registry = registry_of(vec![ScriptedResolver::new("r", 0.9, 0.1, 0.1).suggests("field-1", 0.8)]);
    let policies = PolicyResolver::new(Arc::clone(&registry)).with_system(PolicyOverlay::default());
    let orchestrator = Orchestrator::new(registry, policies, FixedClock::shared()).unwrap();
    let run = orchestrator
        .run(RunInput {
            agreement_id: "agreement-7".to_string(),
            run_id: Some("run-7".to_string()),
            field_definitions: field_definitions(2),
            page_count: 1,
            ..Default::default()
        })
        .await
        .unwrap();

    let repo = Repository::new_in_memory().unwrap();
    repo.save_run(&run).await.unwrap();

    let loaded = repo.get_run("run-7").await.unwrap().unwrap();
    assert_eq!(loaded.id, run.id);
    assert_eq!(loaded.status, run.status);
    assert_eq!(loaded.reason_code, run.reason_code);
    assert_eq!(loaded.suggestions.len(), 1);
    assert_eq!(loaded.unresolved_definition_ids, vec!["field-2"]);
    assert_eq!(repo.list_runs_for_agreement("agreement-7").await.unwrap().len(), 1);
    assert!(repo.get_run("missing").await.unwrap().is_none());
}
