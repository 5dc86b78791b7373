//! learnhub CLI
//!
//! Inspect the role permission table, print CSV templates, validate import
//! files and commit them.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use learnhub::{
    access_control::{AccessResolver, PermissionKey, Role, permissions_for},
    audit::AuditLog,
    config::{AppConfig, LogFormat, load_config},
    import::{
        CommitPipeline, ExistingRecords, ImportFile, ImportSession, MemoryStore, PipelineEvent,
        PipelineSettings, StaticDirectory, role_template, user_template,
    },
    users::User,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// learnhub - role-based access control and bulk CSV import
#[derive(Parser, Debug)]
#[command(name = "learnhub")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "LEARNHUB_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides logging.level
    #[arg(long, env = "LEARNHUB_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the permissions each role grants
    Permissions {
        /// Only show this role
        #[arg(long)]
        role: Option<String>,
    },
    /// Print a CSV template
    Template {
        #[arg(value_enum)]
        kind: TemplateKind,
    },
    /// Validate import files without committing
    Validate {
        #[arg(long)]
        users: Option<PathBuf>,
        #[arg(long)]
        roles: Option<PathBuf>,
    },
    /// Validate and commit import files
    Import {
        #[arg(long)]
        users: Option<PathBuf>,
        #[arg(long)]
        roles: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TemplateKind {
    Users,
    Roles,
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn show_permissions(role: Option<&str>) -> anyhow::Result<()> {
    let roles = match role {
        Some(name) => vec![Role::from_name_or_anonymous(name)],
        None => Role::CANONICAL.to_vec(),
    };

    let table: Vec<_> = roles
        .into_iter()
        .map(|role| json!({ "role": role, "permissions": permissions_for(role) }))
        .collect();
    print_json(&table)
}

fn read_file(path: &Path) -> anyhow::Result<ImportFile> {
    ImportFile::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn load_session(
    existing: &dyn ExistingRecords,
    users: Option<&Path>,
    roles: Option<&Path>,
) -> anyhow::Result<ImportSession> {
    if users.is_none() && roles.is_none() {
        anyhow::bail!("Provide --users, --roles or both");
    }

    let mut session = ImportSession::new();

    if let Some(path) = roles {
        session
            .load_roles(&read_file(path)?, existing)
            .inspect_err(|e| error!(error = %e, "Role file rejected"))?;
    }
    if let Some(path) = users {
        session
            .load_users(&read_file(path)?, existing)
            .inspect_err(|e| error!(error = %e, "User file rejected"))?;
    }

    Ok(session)
}

fn validate(
    config: &AppConfig,
    users: Option<&Path>,
    roles: Option<&Path>,
) -> anyhow::Result<()> {
    let directory = StaticDirectory::from_config(&config.directory);
    let session = load_session(&directory, users, roles)?;

    for err in session.error_report() {
        warn!("{}", err);
    }
    print_json(&json!({
        "summary": session.summary(),
        "errors": session.error_report(),
    }))
}

async fn import(
    config: &AppConfig,
    users: Option<&Path>,
    roles: Option<&Path>,
) -> anyhow::Result<()> {
    let actor = User::from_config(&config.current_user)?;
    let audit = Arc::new(AuditLog::with_capacity(config.audit.capacity));

    AccessResolver::new(audit.clone())
        .require(&actor, PermissionKey::ImportContent)
        .inspect_err(|e| error!(error = %e, "Import not permitted"))?;

    // Validation and commit see the same existing records
    let store = Arc::new(MemoryStore::with_existing(&config.directory));
    let session = load_session(store.as_ref(), users, roles)?;
    let batch = session.commit_batch();

    let pipeline = CommitPipeline::new(
        store,
        PipelineSettings::from(&config.pipeline),
        audit.clone(),
        &actor.email,
    );

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received interrupt, cancelling import");
                cancel.cancel();
            }
        })
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let progress = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::Progress(status) => debug!(
                    state = %status.state,
                    progress = status.progress,
                    processed = status.processed_rows,
                    total = status.total_rows,
                    "Import progress"
                ),
                PipelineEvent::Notice(notice) => {
                    info!(severity = ?notice.severity, "{}: {}", notice.title, notice.message)
                }
            }
        }
    });

    let report = pipeline
        .run(&batch, Some(tx), cancel)
        .await
        .inspect_err(|e| error!(error = %e, "Import failed to start"));
    ctrl_c.abort();
    // the sender is dropped with the run, so this drains and ends
    let _ = progress.await;

    let report = report?;
    print_json(&json!({
        "status": report.status,
        "failures": report.failures,
        "summary": session.summary(),
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Logging settings come from the config file when it loads
    let config = load_config(args.config.as_deref());
    let logging = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    init_logging(
        args.log_level.as_deref().unwrap_or(&logging.level),
        logging.format,
    );

    let config = config.inspect_err(|e| error!(error = %e, "Failed to load configuration"))?;

    match args.command {
        Command::Permissions { role } => show_permissions(role.as_deref()),
        Command::Template { kind } => {
            match kind {
                TemplateKind::Users => print!("{}", user_template()),
                TemplateKind::Roles => print!("{}", role_template()),
            }
            Ok(())
        }
        Command::Validate { users, roles } => {
            validate(&config, users.as_deref(), roles.as_deref())
        }
        Command::Import { users, roles } => {
            import(&config, users.as_deref(), roles.as_deref()).await
        }
    }
}
