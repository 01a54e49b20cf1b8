//! pg-data-migrate CLI - dependency-aware PostgreSQL to PostgreSQL data copy.

use clap::{Parser, Subcommand};
use pg_data_migrate::{
    Config, CopyStatus, HealthCheckResult, MigrateError, MigrationReport, Orchestrator,
    RunStatus,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "pg-data-migrate")]
#[command(about = "Dependency-aware bulk data copy between PostgreSQL databases")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Source connection URL (overrides the configuration file)
    #[arg(long, env = "PG_MIGRATE_SOURCE_URL", hide_env_values = true)]
    source_url: Option<String>,

    /// Target connection URL (overrides the configuration file)
    #[arg(long, env = "PG_MIGRATE_TARGET_URL", hide_env_values = true)]
    target_url: Option<String>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info", value_parser = ["debug", "info", "warn", "error"])]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy all data from source to target
    Run {
        /// Working schema on both sides
        #[arg(long)]
        schema: Option<String>,

        /// Rows per insert batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Dry run: introspect and show the copy order without writing
        #[arg(long)]
        dry_run: bool,

        /// Leave target sequences untouched
        #[arg(long)]
        skip_sequences: bool,

        /// Do not drop target foreign keys during the copy
        #[arg(long)]
        keep_constraints: bool,
    },

    /// Show the copy order and dependency cycles
    Plan {
        /// Working schema on both sides
        #[arg(long)]
        schema: Option<String>,
    },

    /// Validate row counts between source and target
    Validate {
        /// Working schema on both sides
        #[arg(long)]
        schema: Option<String>,
    },

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(MigrateError::Config)?;

    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Run {
            schema,
            batch_size,
            dry_run,
            skip_sequences,
            keep_constraints,
        } => {
            apply_schema(&mut config, schema);
            if let Some(size) = batch_size {
                config.migration.batch_size = size;
            }
            if skip_sequences {
                config.migration.reset_sequences = false;
            }
            if keep_constraints {
                config.migration.drop_foreign_keys = false;
            }

            let orchestrator = Orchestrator::connect(config).await?;
            if dry_run {
                let report = orchestrator.dry_run().await?;
                print_plan(&report, cli.output_json)?;
                return Ok(());
            }

            let cancel_token = setup_signal_handler();
            let report = orchestrator.run(cancel_token).await?;
            print_report(&report, cli.output_json)?;

            if report.status == RunStatus::Cancelled {
                return Err(MigrateError::Cancelled);
            }
        }

        Commands::Plan { schema } => {
            apply_schema(&mut config, schema);
            let report = Orchestrator::connect(config).await?.dry_run().await?;
            print_plan(&report, cli.output_json)?;
        }

        Commands::Validate { schema } => {
            apply_schema(&mut config, schema);
            let orchestrator = Orchestrator::connect(config).await?;
            let result = orchestrator.validate().await;
            orchestrator.close().await;
            let report = result?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if report.all_match() {
                println!("Validation completed: {} tables match", report.tables.len());
            } else {
                println!(
                    "Validation completed: {} of {} tables differ",
                    report.mismatches(),
                    report.tables.len()
                );
            }
        }

        Commands::HealthCheck => {
            let result = Orchestrator::health_check(&config).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_health(&result);
            }

            if !result.healthy {
                return Err(unhealthy(&result));
            }
        }
    }

    Ok(())
}

/// Load the configuration file, or build one from `--source-url` and
/// `--target-url` when no file exists.
fn load_config(cli: &Cli) -> Result<Config, MigrateError> {
    let mut config = if cli.config.exists() {
        let config = Config::load(&cli.config)?;
        info!("Loaded configuration from {:?}", cli.config);
        config
    } else {
        match (&cli.source_url, &cli.target_url) {
            (Some(source), Some(target)) => Config::from_urls(source.as_str(), target.as_str()),
            _ => return Err(missing_config(&cli.config)),
        }
    };

    if let Some(url) = &cli.source_url {
        config.source.url = Some(url.clone());
    }
    if let Some(url) = &cli.target_url {
        config.target.url = Some(url.clone());
    }
    Ok(config)
}

fn missing_config(path: &Path) -> MigrateError {
    MigrateError::Config(format!(
        "configuration file not found: {} (or pass --source-url and --target-url)",
        path.display()
    ))
}

fn apply_schema(config: &mut Config, schema: Option<String>) {
    if let Some(schema) = schema {
        config.source.schema = schema.clone();
        config.target.schema = schema;
    }
}

fn print_plan(report: &MigrationReport, json: bool) -> Result<(), MigrateError> {
    if json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    println!("Copy order ({} tables):", report.plan.len());
    for (i, table) in report.plan.iter().enumerate() {
        println!("  {:>3}. {}", i + 1, table);
    }
    if !report.cycles.is_empty() {
        println!("\nDependency cycles (copied with foreign keys suspended):");
        for cycle in &report.cycles {
            println!("  {}", cycle);
        }
    }
    Ok(())
}

fn print_report(report: &MigrationReport, json: bool) -> Result<(), MigrateError> {
    if json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    let status_msg = match report.status {
        RunStatus::Completed => "Migration completed!",
        RunStatus::CompletedWithErrors => "Migration completed with errors.",
        RunStatus::Cancelled => "Migration cancelled.",
        RunStatus::DryRun => "Dry run completed!",
    };
    println!("\n{}", status_msg);
    println!("  Run ID: {}", report.run_id);
    println!("  Duration: {:.2}s", report.duration_seconds);
    println!(
        "  Tables: {} with data / {} discovered",
        report.tables_with_data, report.tables_discovered
    );
    println!("  Rows: {}", report.total_rows);
    println!(
        "  Constraints restored: {}/{}",
        report.constraints.restored, report.constraints.restore_attempted
    );
    println!("  Sequences reconciled: {}", report.sequences.reconciled.len());
    if !report.cycles.is_empty() {
        println!("  Cycles: {}", report.cycles.len());
    }
    if !report.failed_tables.is_empty() {
        let names: Vec<&str> = report.failed_tables.iter().map(|t| t.as_str()).collect();
        println!("  Failed tables: {}", names.join(", "));
    }
    let unkeyed: Vec<&str> = report
        .tables
        .iter()
        .filter(|t| t.status == CopyStatus::Unkeyed)
        .map(|t| t.table.as_str())
        .collect();
    if !unkeyed.is_empty() {
        println!("  Not copied (no unique key, target populated): {}", unkeyed.join(", "));
    }
    Ok(())
}

fn print_health(result: &HealthCheckResult) {
    println!("Health Check Results:");
    println!(
        "  Source ({}): {} ({}ms)",
        result.source_endpoint,
        if result.source_connected { "OK" } else { "FAILED" },
        result.source_latency_ms
    );
    if let Some(ref err) = result.source_error {
        println!("    Error: {}", err);
    }
    println!(
        "  Target ({}): {} ({}ms)",
        result.target_endpoint,
        if result.target_connected { "OK" } else { "FAILED" },
        result.target_latency_ms
    );
    if let Some(ref err) = result.target_error {
        println!("    Error: {}", err);
    }
    println!(
        "\n  Overall: {}",
        if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
    );
}

fn unhealthy(result: &HealthCheckResult) -> MigrateError {
    match (&result.source_error, &result.target_error) {
        (Some(err), _) => MigrateError::connection(&result.source_endpoint, err),
        (None, Some(err)) => MigrateError::connection(&result.target_endpoint, err),
        (None, None) => MigrateError::connection("health check", "unhealthy"),
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    let result = if format == "json" {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    result.map_err(|e| format!("initializing logging: {}", e))
}

/// Cancel the returned token on SIGINT or SIGTERM.
///
/// The run stops between tables; foreign keys and sequences are still
/// restored before the process exits.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            match signal(kind) {
                Ok(mut stream) => {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Finishing the current table...", name);
                    token.cancel();
                }
                Err(e) => warn!("Failed to install {} handler: {}", name, e),
            }
        });
    }

    cancel_token
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("\nReceived Ctrl-C. Finishing the current table...");
                token.cancel();
            }
            Err(e) => warn!("Failed to install Ctrl-C handler: {}", e),
        }
    });

    cancel_token
}
