//! `appgen`: validate or generate an application from a models file, or serve the HTTP API.
//!
//! Run from repo root: `cargo run -p appgen-cli -- generate shop --models-file shop.json`

use anyhow::{Context, Result};
use appgen_sdk::{
    ensure_database_exists, router, AppState, ApplicationDraft, FileStore, FsSink, GenerateError, GenerationService,
    KnownApplications, ModelSchema, Persistence, PgStore, Settings, WriteOutcome, WriteReport,
};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "appgen", version, about = "Generate application modules from application definitions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a definition and print the planned emission; nothing is written.
    Validate(DefinitionArgs),
    /// Generate artifacts into the output directory.
    Generate {
        #[command(flatten)]
        definition: DefinitionArgs,
        /// Replace artifacts written by an earlier run.
        #[arg(long)]
        overwrite: bool,
        #[arg(long)]
        skip_admin: bool,
        #[arg(long)]
        skip_tests: bool,
        #[arg(long)]
        skip_urls: bool,
    },
    /// Serve the HTTP API.
    Serve {
        /// Listen address; defaults to APPGEN_BIND.
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct DefinitionArgs {
    /// Application name.
    name: String,
    /// JSON file holding the model list, or a full application object.
    #[arg(long = "models-file", short = 'm')]
    models_file: PathBuf,
    /// JSON file of extra known applications, e.g. `{"crm": {"models": ["Customer"]}}`.
    #[arg(long)]
    known: Option<PathBuf>,
    #[arg(long)]
    label: Option<String>,
    /// Output directory; defaults to APPGEN_OUTPUT_DIR.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DefinitionFile {
    Models(Vec<ModelSchema>),
    Application(ApplicationDraft),
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("appgen_sdk=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    match cli.command {
        Command::Validate(args) => validate(&settings, args).await,
        Command::Generate {
            definition,
            overwrite,
            skip_admin,
            skip_tests,
            skip_urls,
        } => {
            let mut draft = read_draft(&definition)?;
            draft.flags.overwrite |= overwrite;
            draft.flags.skip_admin |= skip_admin;
            draft.flags.skip_tests |= skip_tests;
            draft.flags.skip_urls |= skip_urls;
            generate(&settings, &definition, draft).await
        }
        Command::Serve { bind, output } => {
            let mut settings = settings;
            if let Some(bind) = bind {
                settings.bind = bind;
            }
            if let Some(output) = output {
                settings.output_dir = output;
            }
            serve(settings).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_draft(args: &DefinitionArgs) -> Result<ApplicationDraft> {
    let bytes = std::fs::read(&args.models_file)
        .with_context(|| format!("reading {}", args.models_file.display()))?;
    let file: DefinitionFile = serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing {}", args.models_file.display()))?;
    let mut draft = match file {
        DefinitionFile::Models(models) => ApplicationDraft::from_models(args.name.clone(), models),
        DefinitionFile::Application(mut draft) => {
            if draft.name != args.name {
                tracing::warn!(file = %draft.name, argument = %args.name, "application name taken from the command line");
            }
            draft.name = args.name.clone();
            draft
        }
    };
    if args.label.is_some() {
        draft.label = args.label.clone();
    }
    Ok(draft)
}

fn read_known(path: &Path) -> Result<KnownApplications> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}

/// Service over the file catalog in `<output>/.appgen`, writing artifacts under `output`.
async fn file_service(output: &Path, known: Option<&Path>) -> Result<GenerationService> {
    let service = GenerationService::load(Arc::new(FileStore::for_output(output)), Arc::new(FsSink::new(output)))
        .await
        .with_context(|| format!("loading catalog from {}", output.display()))?;
    if let Some(path) = known {
        service.extend_known(read_known(path)?);
    }
    Ok(service)
}

async fn validate(settings: &Settings, args: DefinitionArgs) -> Result<ExitCode> {
    let draft = read_draft(&args)?;
    let output = args.output.clone().unwrap_or_else(|| settings.output_dir.clone());
    let service = file_service(&output, args.known.as_deref()).await?;
    match service.validate(&draft) {
        Ok(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            print_error(&e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn generate(settings: &Settings, args: &DefinitionArgs, draft: ApplicationDraft) -> Result<ExitCode> {
    let output = args.output.clone().unwrap_or_else(|| settings.output_dir.clone());
    let service = file_service(&output, args.known.as_deref()).await?;
    let result = match service.upsert(draft).await {
        Ok(stored) => service.generate(&stored.name, None).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(report) => {
            print_report(&report);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            print_error(&e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_report(report: &WriteReport) {
    for entry in &report.entries {
        let outcome = match &entry.outcome {
            WriteOutcome::Written => "written".to_string(),
            WriteOutcome::Overwritten => "overwritten".to_string(),
            WriteOutcome::Skipped { reason } => format!("skipped ({})", reason),
            WriteOutcome::Failed { error } => format!("failed ({})", error),
            WriteOutcome::NotAttempted => "not attempted".to_string(),
        };
        println!("{:<40} {}", entry.path, outcome);
    }
    let c = report.counts();
    println!(
        "{}: {} written, {} overwritten, {} skipped, {} failed, {} not attempted",
        report.application, c.written, c.overwritten, c.skipped, c.failed, c.not_attempted
    );
}

fn print_error(err: &GenerateError) {
    match err {
        GenerateError::Validation(errors) => {
            eprintln!("definition is invalid:");
            for e in errors.iter() {
                eprintln!("  {}", e);
            }
        }
        GenerateError::UnknownTargets(errors) => {
            eprintln!("unknown relationship targets:");
            for e in &errors.0 {
                eprintln!("  {}", e);
            }
        }
        GenerateError::Write(failure) => {
            print_report(&failure.report);
            eprintln!("{}", failure);
        }
        other => eprintln!("{}", other),
    }
}

async fn serve(settings: Settings) -> Result<()> {
    let (store, pool): (Arc<dyn Persistence>, Option<PgPool>) = match &settings.database_url {
        Some(url) => {
            ensure_database_exists(url).await?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await?;
            let store: Arc<dyn Persistence> = Arc::new(PgStore::connect(pool.clone(), &settings.schema).await?);
            (store, Some(pool))
        }
        None => {
            let store: Arc<dyn Persistence> = Arc::new(FileStore::for_output(&settings.output_dir));
            (store, None)
        }
    };
    let service = GenerationService::load(store, Arc::new(FsSink::new(&settings.output_dir))).await?;
    let app = router(AppState::new(Arc::new(service), pool), settings.body_limit);

    let listener = TcpListener::bind(&settings.bind).await?;
    tracing::info!(
        output = %settings.output_dir.display(),
        "appgen listening on http://{}",
        listener.local_addr()?
    );
    axum::serve(listener, app).await?;
    Ok(())
}
