// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! persona-audit: persona-driven inclusivity review of UI screenshots
//!
//! Drives the review workflow from the command line: upload, pick a
//! persona, analyze, and print the report.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use persona_audit::client::{load_rulebook, HttpCollaborator, RuleSource};
use persona_audit::config::AppConfig;
use persona_audit::guard::{Decision, Step};
use persona_audit::images::ImagePayload;
use persona_audit::report::render::render_summary;
use persona_audit::report::Report;
use persona_audit::{AuditError, Result, Session};

/// persona-audit CLI - inclusivity review of UI screenshots
#[derive(Parser, Debug)]
#[command(name = "persona-audit")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Persona-driven inclusivity review of UI screenshots", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json", "jsonl"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload screenshots, pick a persona and generate a report
    Analyze {
        /// Screenshot files or glob patterns
        #[arg(required_unless_present = "resume")]
        images: Vec<String>,

        /// Persona name or id
        #[arg(short, long)]
        persona: String,

        /// Replace the persona's background narrative
        #[arg(short, long)]
        background: Option<String>,

        /// Continue from the saved session snapshot
        #[arg(long)]
        resume: bool,

        /// Save the session snapshot afterwards
        #[arg(long)]
        save_session: bool,
    },

    /// List the persona catalog
    Personas,

    /// Show rule metadata from the analysis service
    Rules,

    /// Check that the analysis service is reachable
    Status,

    /// Saved session operations
    Session {
        #[command(subcommand)]
        action: SessionCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum SessionCommands {
    /// Summarize the saved session
    Show,

    /// Delete the saved session
    Clear {
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Analyze { images, persona, background, resume, save_session } => {
            run_analyze(config, AnalyzeArgs { images, persona, background, resume, save_session }, &cli.format).await
        }
        Commands::Personas => run_personas(config, &cli.format),
        Commands::Rules => run_rules(config, &cli.format).await,
        Commands::Status => run_status(config).await,
        Commands::Session { action } => run_session_command(config, action),
        Commands::Config { action } => run_config_command(config, action, &cli.config),
    }
}

struct AnalyzeArgs {
    images: Vec<String>,
    persona: String,
    background: Option<String>,
    resume: bool,
    save_session: bool,
}

/// Expand glob patterns; plain paths pass through unchanged
fn expand_inputs(inputs: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        match glob::glob(input) {
            Ok(paths) => {
                let before = files.len();
                files.extend(paths.flatten().filter(|p| p.is_file()));
                if files.len() == before {
                    files.push(PathBuf::from(input));
                }
            }
            Err(_) => files.push(PathBuf::from(input)),
        }
    }
    files
}

/// Enter a workflow step, turning a redirect into an error for the CLI
fn require(session: &Session, step: Step) -> Result<()> {
    match session.enter(step) {
        Decision::Allow => {
            debug!("Entered {}", step);
            Ok(())
        }
        Decision::Redirect(to) => Err(AuditError::Precondition(format!(
            "Cannot continue to {}: complete {} first",
            step, to
        ))),
    }
}

async fn run_analyze(config: AppConfig, args: AnalyzeArgs, format: &str) -> Result<()> {
    let session = Session::new(&config)?;
    let snapshot_path = PathBuf::from(&config.session.snapshot_path);

    if args.resume && !session.load(&snapshot_path)? {
        warn!("No saved session at {:?}, starting fresh", snapshot_path);
    }

    // Upload
    require(&session, Step::Upload)?;
    for path in expand_inputs(&args.images) {
        let added = ImagePayload::from_path(&path).and_then(|payload| session.images().add(payload));
        if let Err(e) = added {
            error!("Skipping {}: {}", path.display(), e);
        }
    }
    require(&session, Step::Preview)?;
    info!("{} screenshots ready", session.images().len());

    // Persona
    require(&session, Step::SelectPersona)?;
    {
        let mut personas = session.personas();
        if !personas.select_by_name(&args.persona) {
            personas.select(&args.persona);
        }
        if personas.current().is_none() {
            let known: Vec<_> = personas.all().iter().map(|p| p.name.clone()).collect();
            return Err(AuditError::Precondition(format!(
                "Unknown persona '{}'. Available: {}",
                args.persona,
                known.join(", ")
            )));
        }
    }
    require(&session, Step::PersonaDetails)?;
    if let Some(text) = &args.background {
        let mut personas = session.personas();
        if let Some(id) = personas.current().map(|p| p.id.clone()) {
            personas.edit_background(&id, text);
        }
    }

    // Review and analyze
    require(&session, Step::Review)?;
    let collaborator = HttpCollaborator::new(&config.service)?;

    let mut progress = session.pipeline().subscribe();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let current = progress.borrow_and_update().clone();
            let (done, total) = current.persisted();
            if total > 0 {
                info!("{:?}: saved {} of {} images", current.state, done, total);
            } else {
                info!("{:?}", current.state);
            }
        }
    });

    let outcome = session.analyze(&collaborator, &collaborator).await;
    reporter.abort();

    if args.save_session {
        session.save(&snapshot_path)?;
        info!("Session saved to {:?}", snapshot_path);
    }

    if let Err(e) = &outcome {
        if e.is_pipeline_failure() {
            if let Some(message) = session.reports().error() {
                eprintln!("Report generation failed: {}", message);
            }
        }
    }

    let report = outcome?;
    require(&session, Step::Results)?;
    print_report(&report, &collaborator, format).await
}

async fn print_report(report: &Report, collaborator: &HttpCollaborator, format: &str) -> Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(report)?),
        "jsonl" => {
            for result in &report.results {
                println!("{}", serde_json::to_string(result)?);
            }
        }
        _ => {
            let rules = load_rulebook(collaborator).await;
            print!("{}", render_summary(report, &rules)?);
        }
    }
    Ok(())
}

fn run_personas(config: AppConfig, format: &str) -> Result<()> {
    let session = Session::new(&config)?;
    let personas = session.personas();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(personas.all())?),
        "jsonl" => {
            for persona in personas.all() {
                println!("{}", serde_json::to_string(persona)?);
            }
        }
        _ => {
            for persona in personas.all() {
                println!("{} (id {}){}", persona.name, persona.id,
                    if persona.has_disability { " [accessibility focus]" } else { "" });
                println!("  {}", persona.background);
                for facet in &persona.facets {
                    println!("  - {}: {}", facet.title, facet.highlights.join("; "));
                }
            }
        }
    }

    Ok(())
}

async fn run_rules(config: AppConfig, format: &str) -> Result<()> {
    let collaborator = HttpCollaborator::new(&config.service)?;
    let rules = collaborator.rules().await;

    match rules {
        Ok(rules) => match format {
            "json" => println!("{}", serde_json::to_string_pretty(&rules)?),
            "jsonl" => {
                for rule in &rules {
                    println!("{}", serde_json::to_string(rule)?);
                }
            }
            _ => {
                for rule in &rules {
                    println!("{:<8} {} [{}]", rule.rule_id, rule.rule_name, rule.facet);
                }
            }
        },
        Err(e) => {
            // Rule metadata is optional; reports still show rule ids
            warn!("Rule metadata unavailable: {}", e);
        }
    }

    Ok(())
}

async fn run_status(config: AppConfig) -> Result<()> {
    let collaborator = HttpCollaborator::new(&config.service)?;

    println!("persona-audit v{} Status", env!("CARGO_PKG_VERSION"));
    println!("==========================");

    match collaborator.health_check().await {
        Ok(()) => println!("Analysis service: Running ({})", collaborator.base_url()),
        Err(e) => println!("Analysis service: Error - {}", e),
    }

    let rules = load_rulebook(&collaborator).await;
    println!("Rule metadata: {} rules", rules.len());

    println!("\nConfiguration:");
    println!("  Upload limit: {} bytes", config.upload.max_file_bytes);
    println!("  Allowed types: {}", config.upload.allowed_types.join(", "));
    println!("  Session file: {}", config.session.snapshot_path);

    Ok(())
}

fn run_session_command(config: AppConfig, action: SessionCommands) -> Result<()> {
    let path = Path::new(&config.session.snapshot_path);

    match action {
        SessionCommands::Show => {
            let session = Session::new(&config)?;
            if !session.load(path)? {
                println!("No saved session at {:?}", path);
                return Ok(());
            }
            let images = session.images();
            println!("Images ({}):", images.len());
            for image in images.list() {
                println!("  {} -> {}", image.name, image.remote_path.as_deref().unwrap_or("(not saved)"));
            }
            drop(images);

            match session.personas().current() {
                Some(persona) => println!("Persona: {}", persona.name),
                None => println!("Persona: (none)"),
            }
            match session.reports().report() {
                Some(report) => println!("Report: {} ({} issues) {}", report.id, report.issue_count(), report.url),
                None => println!("Report: (none)"),
            };
        }
        SessionCommands::Clear { force } => {
            if !force {
                eprintln!("Use --force to confirm clearing the saved session");
                return Ok(());
            }
            if path.exists() {
                std::fs::remove_file(path)?;
            }
            println!("Session cleared");
        }
    }

    Ok(())
}

fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Service: {}", config.service.base_url);
            println!("  Timeout: {}s", config.service.timeout_secs);
        }
    }

    Ok(())
}
