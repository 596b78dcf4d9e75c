/*!
 * Transport-agnostic handlers for the admin JSON endpoints.
 *
 * An HTTP adapter turns a request into an [`ApiRequest`], calls
 * [`AdminApi::dispatch`], and writes back the status and JSON body of the
 * returned [`ApiResponse`]. Errors are rendered as
 * `{error: {text_code, message, metadata}}`.
 */

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::content::{ContentService, Resource};
use crate::errors::{ContentError, ExchangeError, QueueError, TranslationPolicyError};
use crate::translation::exchange::{ExchangeRow, ExportFilter, TranslationExchangeStore};
use crate::translation::policy::{TranslationPolicy, TranslationPolicyInput};
use crate::translation::queue::TranslationQueueService;

/// Route prefix shared by every admin endpoint
pub const API_PREFIX: &str = "/admin/api";

/// Request as seen by the handlers
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    pub method: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub body: Value,
    /// Authenticated caller, if any
    pub user_id: Option<String>,
}

impl ApiRequest {
    pub fn get(path: &str) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.to_string(),
            ..Default::default()
        }
    }

    pub fn post(path: &str, body: Value) -> Self {
        Self {
            method: "POST".to_string(),
            path: path.to_string(),
            body,
            ..Default::default()
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    fn query_u32(&self, key: &str) -> u32 {
        self.query.get(key).and_then(|v| v.trim().parse().ok()).unwrap_or(0)
    }
}

/// Status code plus JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn error(status: u16, text_code: &str, message: &str, metadata: Value) -> Self {
        Self {
            status,
            body: json!({
                "error": {
                    "text_code": text_code,
                    "message": message,
                    "metadata": metadata,
                }
            }),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::error(400, "BAD_REQUEST", message, json!({}))
    }

    pub fn not_found(message: &str) -> Self {
        Self::error(404, "NOT_FOUND", message, json!({}))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `error.text_code` of an error response
    pub fn text_code(&self) -> Option<&str> {
        self.body.pointer("/error/text_code").and_then(Value::as_str)
    }
}

/// Render a domain error as an error envelope
pub trait IntoApiResponse {
    fn into_api_response(self) -> ApiResponse;
}

impl IntoApiResponse for TranslationPolicyError {
    fn into_api_response(self) -> ApiResponse {
        let metadata = match &self {
            TranslationPolicyError::MissingTranslations(missing) => {
                serde_json::to_value(missing).unwrap_or_else(|_| json!({}))
            }
            TranslationPolicyError::EntityNotFound {
                entity_type,
                entity_id,
            } => json!({ "entity_type": entity_type, "entity_id": entity_id }),
            TranslationPolicyError::Content(_) => json!({}),
        };
        ApiResponse::error(self.http_status(), self.text_code(), &self.to_string(), metadata)
    }
}

impl IntoApiResponse for ExchangeError {
    fn into_api_response(self) -> ApiResponse {
        ApiResponse::error(self.http_status(), self.text_code(), &self.to_string(), json!({}))
    }
}

impl IntoApiResponse for QueueError {
    fn into_api_response(self) -> ApiResponse {
        let metadata = match &self {
            QueueError::StaleVersion { id, expected, actual } => {
                json!({ "id": id, "expected_version": expected, "actual_version": actual })
            }
            _ => json!({}),
        };
        ApiResponse::error(self.http_status(), self.text_code(), &self.to_string(), metadata)
    }
}

impl IntoApiResponse for ContentError {
    fn into_api_response(self) -> ApiResponse {
        match &self {
            ContentError::NotFound { .. } => ApiResponse::not_found(&self.to_string()),
            ContentError::Conflict(_) => ApiResponse::error(409, "CONFLICT", &self.to_string(), json!({})),
            ContentError::Storage(_) => ApiResponse::error(500, "INTERNAL", &self.to_string(), json!({})),
        }
    }
}

/// Body of the export endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExportRequest {
    pub filter: ExportFilter,
}

/// Body of the import endpoints
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImportRequest {
    pub rows: Vec<ExchangeRow>,
    pub create_translation: bool,
}

/// Body of a panel publish action
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishRequest {
    pub id: String,
    pub locale: String,
    pub environment: String,
    pub policy_entity: String,
}

/// Handlers for the translation endpoints and panel publish actions
#[derive(Debug, Clone)]
pub struct AdminApi {
    content: Arc<dyn ContentService>,
    exchange: TranslationExchangeStore,
    policy: TranslationPolicy,
    queue: Option<TranslationQueueService>,
}

impl AdminApi {
    pub fn new(content: Arc<dyn ContentService>, exchange: TranslationExchangeStore, policy: TranslationPolicy) -> Self {
        Self {
            content,
            exchange,
            policy,
            queue: None,
        }
    }

    pub fn with_queue(mut self, queue: TranslationQueueService) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Route a request to its handler
    pub async fn dispatch(&self, request: &ApiRequest) -> ApiResponse {
        let method = request.method.trim().to_uppercase();
        let Some(route) = request.path.trim_end_matches('/').strip_prefix(API_PREFIX) else {
            return ApiResponse::not_found(&format!("no route for {}", request.path));
        };
        debug!("{} {}", method, request.path);

        match (method.as_str(), route) {
            ("POST", "/translations/export") => self.export(&request.body).await,
            ("POST", "/translations/import/validate") => self.import_validate(&request.body).await,
            ("POST", "/translations/import/apply") => self.import_apply(&request.body).await,
            ("GET", "/translations/my-work") => match request.user_id.as_deref() {
                Some(user) => self.my_work(user, request.query_u32("page"), request.query_u32("per_page")).await,
                None => ApiResponse::error(401, "UNAUTHORIZED", "my-work requires an authenticated user", json!({})),
            },
            ("GET", "/translations/queue") => {
                self.open_queue(request.query_u32("page"), request.query_u32("per_page"))
                    .await
            }
            ("POST", route) => match route.strip_prefix('/').and_then(|r| r.strip_suffix("/actions/publish")) {
                Some(panel) if !panel.contains('/') => self.publish(panel, &request.body).await,
                _ => ApiResponse::not_found(&format!("no route for {} {}", method, request.path)),
            },
            _ => ApiResponse::not_found(&format!("no route for {} {}", method, request.path)),
        }
    }

    /// `POST /admin/api/translations/export`
    pub async fn export(&self, body: &Value) -> ApiResponse {
        let request: ExportRequest = match parse_body(body) {
            Ok(request) => request,
            Err(response) => return response,
        };
        match self.exchange.export_rows(&request.filter).await {
            Ok(rows) => ApiResponse::ok(json!({ "rows": rows })),
            Err(e) => e.into_api_response(),
        }
    }

    /// `POST /admin/api/translations/import/validate`
    pub async fn import_validate(&self, body: &Value) -> ApiResponse {
        let request: ImportRequest = match parse_body(body) {
            Ok(request) => request,
            Err(response) => return response,
        };
        let report = self.exchange.validate_import(&request.rows).await;
        ApiResponse::ok(json!({ "summary": report.summary, "results": report.results }))
    }

    /// `POST /admin/api/translations/import/apply`
    pub async fn import_apply(&self, body: &Value) -> ApiResponse {
        let request: ImportRequest = match parse_body(body) {
            Ok(request) => request,
            Err(response) => return response,
        };
        let report = self
            .exchange
            .apply_import(&request.rows, request.create_translation)
            .await;
        ApiResponse::ok(json!({ "summary": report.summary, "results": report.results }))
    }

    /// `POST /admin/api/<panel>/actions/publish`
    pub async fn publish(&self, panel: &str, body: &Value) -> ApiResponse {
        let request: PublishRequest = match parse_body(body) {
            Ok(request) => request,
            Err(response) => return response,
        };
        if request.id.trim().is_empty() {
            return ApiResponse::bad_request("id is required");
        }
        let Some(resource) = Resource::normalize(panel) else {
            return ApiResponse::not_found(&format!("panel '{}' has no publish action", panel));
        };

        let input = TranslationPolicyInput {
            entity_type: panel.to_string(),
            policy_entity: request.policy_entity.clone(),
            entity_id: request.id.clone(),
            transition: crate::translation::PUBLISH_TRANSITION.to_string(),
            environment: request.environment.clone(),
            requested_locale: request.locale.clone(),
        };
        if let Err(e) = self.policy.validate(&input).await {
            warn!("Publish of {} {} rejected: {}", panel, request.id, e);
            return e.into_api_response();
        }

        let locale = request.locale.trim();
        let locale = (!locale.is_empty()).then_some(locale);
        let mut entry = match self.content.entry(resource, request.id.trim(), locale).await {
            Ok(entry) => entry,
            Err(e) => return e.into_api_response(),
        };
        entry.status = "published".to_string();
        match self.content.update_entry(entry).await {
            Ok(_) => ApiResponse::ok(json!({ "status": "ok" })),
            Err(e) => e.into_api_response(),
        }
    }

    /// `GET /admin/api/translations/my-work`
    pub async fn my_work(&self, user_id: &str, page: u32, per_page: u32) -> ApiResponse {
        let Some(queue) = &self.queue else {
            return queue_unavailable();
        };
        match queue.my_work(user_id, page, per_page).await {
            Ok(page) => ApiResponse::ok(json!({ "data": page })),
            Err(e) => e.into_api_response(),
        }
    }

    /// `GET /admin/api/translations/queue`
    pub async fn open_queue(&self, page: u32, per_page: u32) -> ApiResponse {
        let Some(queue) = &self.queue else {
            return queue_unavailable();
        };
        match queue.open_queue(page, per_page).await {
            Ok(page) => ApiResponse::ok(json!({ "data": page })),
            Err(e) => e.into_api_response(),
        }
    }
}

fn parse_body<T: serde::de::DeserializeOwned + Default>(body: &Value) -> Result<T, ApiResponse> {
    if body.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(body.clone()).map_err(|e| ApiResponse::bad_request(&format!("invalid request body: {}", e)))
}

fn queue_unavailable() -> ApiResponse {
    ApiResponse::error(503, "QUEUE_UNAVAILABLE", "assignment queue is not configured", json!({}))
}
