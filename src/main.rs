// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use backoffice::admin_api::IntoApiResponse;
use backoffice::app_config::{self, Config};
use backoffice::app_controller::{Controller, PlaceRequest};
use backoffice::content::Resource;
use backoffice::file_utils::FileManager;
use backoffice::translation::exchange::{ExchangeRow, ExportFilter};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Suggest field placements for a PDF agreement
    Place(PlaceArgs),

    /// Export source text for translation
    Export(ExportArgs),

    /// Apply translated rows to the content fixture
    Apply(ApplyArgs),

    /// Check whether an entity may be published
    CheckPublish(CheckPublishArgs),

    /// List translation assignments
    Queue(QueueArgs),

    /// Generate shell completions for backoffice
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct PlaceArgs {
    /// PDF document
    #[arg(value_name = "PDF")]
    pdf: PathBuf,

    /// JSON array of field definitions
    #[arg(value_name = "FIELDS_JSON")]
    fields: PathBuf,

    /// Agreement id (defaults to the PDF file stem)
    #[arg(long)]
    agreement_id: Option<String>,

    /// Requesting user, used for user policy overlays
    #[arg(long)]
    user: Option<String>,

    /// Organization, used for org policy overlays
    #[arg(long)]
    org: Option<String>,

    /// Save the run in the database
    #[arg(long)]
    persist: bool,

    /// Write the run JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Content fixture (`{pages: [...], posts: [...]}`)
    #[arg(long, value_name = "CONTENT_JSON")]
    content: PathBuf,

    /// Resources to export (pages, posts)
    #[arg(short, long = "resource")]
    resources: Vec<String>,

    /// Restrict to these entity ids
    #[arg(long = "entity-id")]
    entity_ids: Vec<String>,

    /// Only export entities in this locale
    #[arg(short, long)]
    source_locale: Option<String>,

    /// Target locales (default from config)
    #[arg(short, long = "target-locale")]
    target_locales: Vec<String>,

    /// Field paths (default from config)
    #[arg(short, long = "field")]
    fields: Vec<String>,

    /// Leave source_hash empty
    #[arg(long)]
    no_source_hash: bool,

    /// Write the rows here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ApplyArgs {
    /// Content fixture, updated in place
    #[arg(long, value_name = "CONTENT_JSON")]
    content: PathBuf,

    /// JSON array of translated exchange rows
    #[arg(value_name = "ROWS_JSON")]
    rows: PathBuf,

    /// Create missing translations
    #[arg(long)]
    create: bool,

    /// Only validate linkage and source hashes
    #[arg(long)]
    validate_only: bool,
}

#[derive(Parser, Debug)]
struct CheckPublishArgs {
    /// Content fixture
    #[arg(long, value_name = "CONTENT_JSON")]
    content: PathBuf,

    /// Entity id
    #[arg(value_name = "ID")]
    id: String,

    /// Resource of the entity
    #[arg(short, long, default_value = "pages")]
    resource: String,

    /// Target environment (default from config)
    #[arg(short, long, default_value = "")]
    environment: String,
}

#[derive(Parser, Debug)]
struct QueueArgs {
    /// Show only this user's work
    #[arg(short, long)]
    user: Option<String>,

    #[arg(long, default_value_t = 1)]
    page: u32,

    #[arg(long, default_value_t = 20)]
    per_page: u32,
}

/// Backoffice - placement and translation workflow tools
#[derive(Parser, Debug)]
#[command(name = "backoffice")]
#[command(version)]
#[command(about = "Placement orchestration and translation workflow for content back offices")]
#[command(long_about = "Backoffice runs the signature-field placement orchestrator and the translation workflow.

EXAMPLES:
    backoffice place nda.pdf fields.json                     # Suggest placements
    backoffice place nda.pdf fields.json --persist           # ...and store the run
    backoffice export --content content.json -t fr -o rows.json
    backoffice apply --content content.json rows.json --create
    backoffice check-publish --content content.json page-1 -e staging
    backoffice queue --user alice                            # My work
    backoffice completions bash > backoffice.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level: LevelFilter::Trace }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let _ = writeln!(
                std::io::stderr(),
                "{}{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the config is loaded
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "backoffice", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Place(args) => run_place(config, args).await,
        Commands::Export(args) => run_export(config, args).await,
        Commands::Apply(args) => run_apply(config, args).await,
        Commands::CheckPublish(args) => run_check_publish(config, args).await,
        Commands::Queue(args) => run_queue(config, args).await,
        Commands::Completions { .. } => Ok(()),
    }
}

fn load_config(cli: &CommandLineOptions) -> Result<Config> {
    if let Some(level) = &cli.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = Config::load_or_default(&cli.config_path)
        .with_context(|| format!("Failed to load configuration from {}", cli.config_path))?;

    match &cli.log_level {
        Some(level) => config.log_level = level.clone().into(),
        None => log::set_max_level(config.log_level.to_level_filter()),
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

async fn run_place(config: Config, args: PlaceArgs) -> Result<()> {
    let controller = Controller::with_config(config)?;
    let request = PlaceRequest {
        agreement_id: args.agreement_id.unwrap_or_default(),
        user_id: args.user,
        org_id: args.org,
        persist: args.persist,
    };
    let run = controller.place(&args.pdf, &args.fields, request).await?;
    emit(&run, args.output.as_deref())
}

async fn run_export(config: Config, args: ExportArgs) -> Result<()> {
    let controller = Controller::with_content_file(config, &args.content)?;
    let filter = ExportFilter {
        resources: args.resources,
        entity_ids: args.entity_ids,
        source_locale: args.source_locale.unwrap_or_default(),
        target_locales: args.target_locales,
        field_paths: args.fields,
        include_source_hash: !args.no_source_hash,
    };
    let rows = controller.export(&filter).await?;
    emit(&rows, args.output.as_deref())
}

async fn run_apply(config: Config, args: ApplyArgs) -> Result<()> {
    let controller = Controller::with_content_file(config, &args.content)?;
    let rows: Vec<ExchangeRow> = FileManager::read_json(&args.rows)?;

    let report = if args.validate_only {
        controller.exchange_store().validate_import(&rows).await
    } else {
        controller.apply(&rows, args.create).await
    };

    if !args.validate_only && report.summary.succeeded > 0 {
        controller.save_content(&args.content)?;
        info!("Updated {}", args.content.display());
    }
    if report.summary.failed > 0 {
        warn!("{} of {} row(s) failed", report.summary.failed, report.summary.processed);
    }
    emit(&report, None)
}

async fn run_check_publish(config: Config, args: CheckPublishArgs) -> Result<()> {
    let resource: Resource = args.resource.parse()?;
    let controller = Controller::with_content_file(config, &args.content)?;

    match controller.check_publish(resource, &args.id, &args.environment).await {
        Ok(()) => {
            println!("{}", serde_json::json!({ "status": "ok" }));
            Ok(())
        }
        Err(e) => {
            let response = e.clone().into_api_response();
            println!("{}", serde_json::to_string_pretty(&response.body)?);
            Err(anyhow!(e))
        }
    }
}

async fn run_queue(config: Config, args: QueueArgs) -> Result<()> {
    let controller = Controller::with_config(config)?;
    let page = controller
        .queue(args.user.as_deref(), args.page, args.per_page)
        .await?;
    emit(&serde_json::json!({ "data": page }), None)
}

// Print JSON to stdout or write it to a file
fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            FileManager::write_json(path, value)?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}
