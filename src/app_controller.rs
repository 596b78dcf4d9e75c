use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;

use crate::admin_api::AdminApi;
use crate::app_config::Config;
use crate::content::{ContentService, InMemoryContentService, Resource};
use crate::database::{DatabaseConnection, Repository};
use crate::errors::TranslationPolicyError;
use crate::file_utils::FileManager;
use crate::placement::models::{FieldDefinition, Run, RunInput};
use crate::placement::resolvers::{count_pages, default_registry, scan_widgets};
use crate::placement::{Orchestrator, PolicyResolver, SystemClock};
use crate::translation::exchange::{ExchangeRow, ExportFilter, ImportReport, TranslationExchangeStore};
use crate::translation::policy::{TranslationPolicy, TranslationPolicyInput};
use crate::translation::queue::{QueuePage, TranslationQueueService};

// @module: Application controller wiring configuration to the services

/// Options for one placement run from the command line
#[derive(Debug, Clone, Default)]
pub struct PlaceRequest {
    pub agreement_id: String,
    pub user_id: Option<String>,
    pub org_id: Option<String>,
    /// Persist the run in the database
    pub persist: bool,
}

/// Main application controller
pub struct Controller {
    // @field: App configuration
    config: Config,
    content: Arc<InMemoryContentService>,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;
        Ok(Self {
            config,
            content: Arc::new(InMemoryContentService::new()),
        })
    }

    /// Controller whose content is loaded from a JSON fixture
    pub fn with_content_file<P: AsRef<Path>>(config: Config, content_path: P) -> Result<Self> {
        let mut controller = Self::with_config(config)?;
        controller.content = Arc::new(InMemoryContentService::from_json_file(content_path)?);
        Ok(controller)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn content(&self) -> &InMemoryContentService {
        &self.content
    }

    /// Write the current content back to a fixture file
    pub fn save_content<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.content.save_json_file(path)
    }

    fn content_service(&self) -> Arc<dyn ContentService> {
        self.content.clone()
    }

    // @method: Open the configured database, or the default location
    pub fn open_repository(&self) -> Result<Repository> {
        let db = match self.config.database.path.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(path) => DatabaseConnection::new(path)?,
            None => DatabaseConnection::new_default()?,
        };
        if let Ok(stats) = db.stats() {
            debug!("Database {}: {}", db.path().display(), stats);
        }
        Ok(Repository::new(db))
    }

    /// Orchestrator over the built-in resolvers with the configured policies
    pub fn orchestrator(&self) -> Result<Orchestrator> {
        let registry = Arc::new(default_registry());
        let policies = PolicyResolver::from_config(Arc::clone(&registry), &self.config.placement);
        Ok(Orchestrator::new(registry, policies, Arc::new(SystemClock))?)
    }

    pub fn exchange_store(&self) -> TranslationExchangeStore {
        TranslationExchangeStore::new(self.content_service(), self.config.exchange.clone())
    }

    pub fn translation_policy(&self) -> TranslationPolicy {
        TranslationPolicy::new(self.content_service(), self.config.translation_policy.clone())
    }

    /// Admin handlers; the queue is attached when a repository is given
    pub fn admin_api(&self, repository: Option<Repository>) -> AdminApi {
        let api = AdminApi::new(self.content_service(), self.exchange_store(), self.translation_policy());
        match repository {
            Some(repo) => api.with_queue(TranslationQueueService::new(repo)),
            None => api,
        }
    }

    /// Run placement for a PDF and a JSON list of field definitions
    pub async fn place<P1: AsRef<Path>, P2: AsRef<Path>>(
        &self,
        pdf_path: P1,
        definitions_path: P2,
        request: PlaceRequest,
    ) -> Result<Run> {
        let document = FileManager::read_bytes(&pdf_path)?;
        let field_definitions: Vec<FieldDefinition> = FileManager::read_json(&definitions_path)?;
        if field_definitions.is_empty() {
            warn!("No field definitions in {:?}", definitions_path.as_ref());
        }

        let native_fields = scan_widgets(&document);
        let page_count = count_pages(&document);
        debug!(
            "Document {:?}: {} page(s), {} native widget(s)",
            pdf_path.as_ref(),
            page_count,
            native_fields.len()
        );

        let agreement_id = if request.agreement_id.trim().is_empty() {
            pdf_path
                .as_ref()
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default()
        } else {
            request.agreement_id.clone()
        };

        let input = RunInput {
            agreement_id,
            created_by_user_id: request.user_id.clone().unwrap_or_default(),
            document,
            page_count,
            field_definitions,
            native_fields,
            org_id: request.org_id.clone(),
            user_id: request.user_id.clone(),
            ..Default::default()
        };

        let run = self.orchestrator()?.run(input).await?;
        info!("{}", run.summary());

        if request.persist {
            self.open_repository()?.save_run(&run).await?;
            info!("Saved run {}", run.id);
        }
        Ok(run)
    }

    /// Export exchange rows from the loaded content
    pub async fn export(&self, filter: &ExportFilter) -> Result<Vec<ExchangeRow>> {
        let rows = self.exchange_store().export_rows(filter).await?;
        info!("Exported {} row(s)", rows.len());
        Ok(rows)
    }

    /// Apply translated rows to the loaded content
    pub async fn apply(&self, rows: &[ExchangeRow], create_translation: bool) -> ImportReport {
        self.exchange_store().apply_import(rows, create_translation).await
    }

    /// Run the publish gate for one entity
    pub async fn check_publish(
        &self,
        resource: Resource,
        entity_id: &str,
        environment: &str,
    ) -> Result<(), TranslationPolicyError> {
        let input = TranslationPolicyInput::publish(resource.as_str(), entity_id, environment);
        self.translation_policy().validate(&input).await
    }

    /// List assignments for a user, or the whole open queue
    pub async fn queue(&self, user_id: Option<&str>, page: u32, per_page: u32) -> Result<QueuePage> {
        let service = TranslationQueueService::new(self.open_repository()?);
        let page = match user_id {
            Some(user) => service.my_work(user, page, per_page).await,
            None => service.open_queue(page, per_page).await,
        };
        page.map_err(|e| anyhow!(e))
    }
}
