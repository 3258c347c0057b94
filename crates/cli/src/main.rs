use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use feedback_client::HttpBackend;
use feedback_core::config::ClientConfig;
use feedback_core::db::SqliteStorage;
use feedback_core::schema::{FeedbackDraft, FeedbackStatus, Severity, StatusUpdate};
use feedback_core::taxonomy::Taxonomy;
use feedback_core::validation::normalize_review_status;
use feedback_core::{FeedbackError, FeedbackSession};
use schemars::schema_for;
use std::fs;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type Session = FeedbackSession<HttpBackend, SqliteStorage>;

#[derive(Parser)]
#[command(name = "feedback")]
#[command(about = "Anonymous workplace feedback client", long_about = None)]
struct Cli {
    /// Path to the client configuration file
    #[arg(short, long, default_value = "feedback.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit anonymous feedback and receive a tracking ID
    Submit(SubmitArgs),

    /// Check the review status of a submission
    Status {
        /// Tracking ID returned when the feedback was submitted
        tracking_id: Option<String>,

        /// Use the Nth most recent tracking ID from history instead (1 = latest)
        #[arg(long, conflicts_with = "tracking_id")]
        recent: Option<usize>,

        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// List tracking IDs issued to this client
    History {
        /// Forget all stored tracking IDs
        #[arg(long)]
        clear: bool,
    },

    /// Change the review status of a submission (requires an API token)
    UpdateStatus {
        tracking_id: String,

        /// New status, e.g. investigating, resolved, requires_more_info
        #[arg(long)]
        status: String,

        /// Notes visible to the submitter
        #[arg(long)]
        public_notes: Option<String>,

        #[arg(long)]
        next_steps: Option<String>,
    },

    /// List feedback types and their categories
    Taxonomy,

    /// Export JSON Schemas for the wire types
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
}

#[derive(clap::Args)]
struct SubmitArgs {
    /// Feedback type, e.g. harassment (see `feedback taxonomy`)
    #[arg(long = "type")]
    feedback_type: String,

    #[arg(long)]
    category: String,

    /// low, medium, high or critical
    #[arg(long)]
    severity: String,

    /// Description of the concern (at least 10 characters)
    #[arg(long, required_unless_present = "description_file")]
    description: Option<String>,

    /// Read the description from a file
    #[arg(long, conflicts_with = "description")]
    description_file: Option<PathBuf>,

    /// Organization ID (defaults to client.organization_id from config)
    #[arg(long)]
    organization: Option<String>,

    #[arg(long)]
    target_type: Option<String>,

    #[arg(long)]
    target_id: Option<String>,

    /// Link to supporting evidence; may be repeated
    #[arg(long = "evidence-url")]
    evidence_urls: Vec<String>,

    /// Date of the incident (YYYY-MM-DD)
    #[arg(long)]
    incident_date: Option<String>,
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Export JSON Schema files for the request and response types
    Export {
        /// Output directory (default: ./schemas)
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Schema { command } => match command {
            SchemaCommands::Export { out_dir } => schema_export(out_dir),
        },
        Commands::Taxonomy => {
            let config = ClientConfig::load(&cli.config)?;
            print_taxonomy(&load_taxonomy(&config)?);
            Ok(())
        }
        Commands::Submit(args) => {
            let config = ClientConfig::load(&cli.config)?;
            let mut session = open_session(&config)?;
            submit(&mut session, &config, args).await
        }
        Commands::Status {
            tracking_id,
            recent,
            json,
        } => {
            let config = ClientConfig::load(&cli.config)?;
            let mut session = open_session(&config)?;
            status(&mut session, tracking_id, recent, json).await
        }
        Commands::History { clear } => {
            let config = ClientConfig::load(&cli.config)?;
            let mut session = open_session(&config)?;
            history(&mut session, clear)
        }
        Commands::UpdateStatus {
            tracking_id,
            status,
            public_notes,
            next_steps,
        } => {
            let config = ClientConfig::load(&cli.config)?;
            let mut session = open_session(&config)?;
            let update = StatusUpdate {
                status: normalize_review_status(&status)
                    .map_err(|errors| report(FeedbackError::Validation(errors)))?,
                public_notes,
                next_steps,
            };
            session
                .update_status(&tracking_id, &update)
                .await
                .map_err(report)?;
            println!("Status of {} set to {}", tracking_id.trim(), update.status.label());
            Ok(())
        }
    }
}

fn load_taxonomy(config: &ClientConfig) -> Result<Taxonomy> {
    match &config.client.taxonomy_path {
        Some(path) => Taxonomy::load(path),
        None => Taxonomy::builtin(),
    }
}

fn print_taxonomy(taxonomy: &Taxonomy) {
    for (name, entry) in taxonomy.types() {
        println!("{name} ({})", entry.label);
        for category in &entry.categories {
            println!("  - {category}");
        }
    }
    println!();
    println!("Severity levels:");
    for severity in Severity::ALL {
        println!("  - {severity}: {}", severity.label());
    }
}

fn open_session(config: &ClientConfig) -> Result<Session> {
    debug!(
        base_url = %config.api.base_url,
        storage = %config.client.storage_path.display(),
        "opening feedback session"
    );
    let taxonomy = load_taxonomy(config)?;
    let backend = HttpBackend::new(&config.api)?;
    let storage = SqliteStorage::open(&config.client.storage_path).with_context(|| {
        format!(
            "opening client storage {}",
            config.client.storage_path.display()
        )
    })?;
    Ok(FeedbackSession::new(backend, storage, taxonomy))
}

async fn submit(session: &mut Session, config: &ClientConfig, args: SubmitArgs) -> Result<()> {
    let description = match (args.description, args.description_file) {
        (Some(text), _) => text,
        (None, Some(path)) => fs::read_to_string(&path)
            .with_context(|| format!("reading description from {}", path.display()))?,
        (None, None) => String::new(),
    };
    let draft = FeedbackDraft {
        organization_id: args
            .organization
            .or_else(|| config.client.organization_id.clone())
            .unwrap_or_default(),
        feedback_type: args.feedback_type,
        category: args.category,
        description,
        severity: args.severity,
        target_type: args.target_type,
        target_id: args.target_id,
        evidence_urls: args.evidence_urls,
        incident_date: args.incident_date,
    };

    let tracking_id = session.submit(&draft).await.map_err(report)?;

    println!("Feedback submitted anonymously.");
    println!("Tracking ID: {tracking_id}");
    println!("Keep this ID to check on your report later: feedback status {tracking_id}");
    Ok(())
}

async fn status(
    session: &mut Session,
    tracking_id: Option<String>,
    recent: Option<usize>,
    json: bool,
) -> Result<()> {
    let tracking_id = match (tracking_id, recent) {
        (Some(id), _) => id,
        (None, Some(position)) => session
            .cache()
            .recent(position)
            .map(|record| record.tracking_id.clone())
            .ok_or_else(|| {
                anyhow!("no tracking ID at position {position}; see `feedback history`")
            })?,
        (None, None) => String::new(),
    };

    let status = session.check_status(&tracking_id).await.map_err(report)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(tracking_id.trim(), &status);
    }
    Ok(())
}

fn print_status(tracking_id: &str, status: &FeedbackStatus) {
    println!("Tracking ID:  {tracking_id}");
    println!("Status:       {}", status.status.label());
    if let Some(severity) = status.severity {
        println!("Severity:     {severity}");
    }
    if let Some(category) = &status.category {
        println!("Category:     {category}");
    }
    if let Some(submitted_at) = &status.submitted_at {
        println!("Submitted:    {submitted_at}");
    }
    if let Some(last_updated) = &status.last_updated {
        println!("Last updated: {last_updated}");
    }
    if let Some(notes) = &status.public_notes {
        println!();
        println!("Notes from reviewers:");
        println!("{notes}");
    }
    if let Some(next_steps) = &status.next_steps {
        println!();
        println!("Next steps:");
        println!("{next_steps}");
    }
    if status.status.is_terminal() {
        println!();
        println!("This report is {} and will not receive further updates.", status.status);
    }
}

fn history(session: &mut Session, clear: bool) -> Result<()> {
    if clear {
        session.cache_mut().clear()?;
        println!("Tracking ID history cleared.");
        return Ok(());
    }
    let records = session.cache().records();
    if records.is_empty() {
        println!("No tracking IDs stored yet.");
        return Ok(());
    }
    for (index, record) in records.iter().enumerate() {
        println!(
            "{:>2}. {}  {}  {}  {}",
            index + 1,
            record.tracking_id,
            record.submitted_at,
            record.category,
            record.severity
        );
    }
    Ok(())
}

/// Prints the user-facing message and any suggested alternatives.
fn report(err: FeedbackError) -> anyhow::Error {
    let actions = err.alternative_actions();
    if !actions.is_empty() {
        eprintln!("You can also:");
        for action in actions {
            eprintln!("  - {action}");
        }
    }
    anyhow::Error::new(err)
}

fn schema_export(out_dir: PathBuf) -> Result<()> {
    fs::create_dir_all(&out_dir)?;

    let schemas = [
        ("FeedbackSubmission", schema_for!(feedback_core::schema::FeedbackSubmission)),
        ("SubmitResponse", schema_for!(feedback_core::schema::SubmitResponse)),
        ("StatusResponse", schema_for!(feedback_core::schema::StatusResponse)),
        ("StatusUpdate", schema_for!(feedback_core::schema::StatusUpdate)),
        ("TrackingRecord", schema_for!(feedback_core::schema::TrackingRecord)),
    ];
    for (name, schema) in schemas {
        let json = serde_json::to_string_pretty(&schema)?;
        fs::write(out_dir.join(format!("{name}.schema.json")), json)?;
    }

    println!("Exported schemas to {}", out_dir.display());
    Ok(())
}
