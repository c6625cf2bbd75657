//! CLI entry point for parameter_store_env.
//!
//! Loads a job's parameter-store configuration, prepares the environment the
//! way a build wrapper would, then lists the injected variables or runs a
//! command inside that environment with masked values redacted from its
//! output.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parameter_store_env::{
    BuildWrapper, Configuration, Environment, JobDefinition, PreparedEnvironment,
    RedactingMakeWriter, Redactor, SsmParameterStore, copy_redacted,
};
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "parameter_store_env")]
#[command(about = "Inject AWS Parameter Store values into a command's environment", long_about = None)]
struct Cli {
    /// JSON job definition to start from
    #[arg(short, long, value_name = "FILE")]
    job: Option<String>,

    /// Base path to fetch parameters from (defaults to the root)
    #[arg(short, long)]
    path: Option<String>,

    /// Include parameters below direct children of the path
    #[arg(short, long, default_value_t = false)]
    recursive: bool,

    /// Naming strategy: basename, relative or absolute
    #[arg(short, long)]
    naming: Option<String>,

    /// Name prefixes, e.g. "/service/db=DB_,APP_"
    #[arg(long)]
    name_prefixes: Option<String>,

    /// AWS region (defaults to the ambient region)
    #[arg(long)]
    region: Option<String>,

    /// Named credentials (AWS profile) to use
    #[arg(long, visible_alias = "profile", value_name = "ID")]
    credentials_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the variables that would be injected
    List,
    /// Run a command with the parameters injected into its environment
    Run {
        /// Command and arguments to run
        #[arg(trailing_var_arg = true, required = true, value_name = "COMMAND")]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let redactor = Redactor::new();
    let log_guard = init_tracing(&redactor)?;

    let cli = Cli::parse();
    let config = load_configuration(&cli)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    let base: Environment = std::env::vars().collect();
    let prepared = prepare(config, &base, &redactor, &cancel).await?;

    let exit_code = match cli.command {
        Commands::List => {
            for entry in &prepared.entries {
                info!(name = %entry.name, masked = entry.masked, "Variable");
            }
            info!(total = prepared.entries.len(), "Variable list complete");
            0
        }
        Commands::Run { command } => {
            run_command(&command, &prepared.environment, &redactor, &cancel).await?
        }
    };

    drop(log_guard);
    std::process::exit(exit_code);
}

/// Logging setup: colored stderr + JSON rolling log file, both redacted.
fn init_tracing(redactor: &Redactor) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/parameter_store_env.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("parameter_store_env.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(RedactingMakeWriter::new(std::io::stderr, redactor.clone()))
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(RedactingMakeWriter::new(non_blocking_file, redactor.clone()))
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(file_guard)
}

/// Job file first, then command-line overrides through the same setters.
fn load_configuration(cli: &Cli) -> Result<Configuration> {
    let job = match &cli.job {
        Some(path) => JobDefinition::load(path)?,
        None => JobDefinition::default(),
    };
    let mut config = Configuration::try_from(job)?;

    if cli.path.is_some() {
        config.set_path(cli.path.as_deref())?;
    }
    if cli.recursive {
        config.set_recursive(true);
    }
    if cli.naming.is_some() {
        config.set_naming(cli.naming.as_deref())?;
    }
    if cli.name_prefixes.is_some() {
        config.set_name_prefixes(cli.name_prefixes.as_deref());
    }
    if cli.region.is_some() {
        config.set_region_name(cli.region.as_deref());
    }
    if cli.credentials_id.is_some() {
        config.set_credentials_id(cli.credentials_id.as_deref());
    }

    Ok(config)
}

#[tracing::instrument(skip_all)]
async fn prepare(
    config: Configuration,
    base: &Environment,
    redactor: &Redactor,
    cancel: &CancellationToken,
) -> Result<PreparedEnvironment> {
    let store = SsmParameterStore::connect(&config).await?;
    let wrapper = BuildWrapper::new(config, store);
    info!(config = ?wrapper.configuration(), "Loaded parameter store configuration");

    match wrapper.set_up(base, redactor, cancel).await {
        Ok(prepared) => Ok(prepared),
        Err(e) => {
            error!(
                kind = e.kind(),
                parameter = e.path().unwrap_or("-"),
                error = %e,
                "Parameter store setup failed"
            );
            Err(e.into())
        }
    }
}

/// Runs `command` in `environment`, streaming its output through the redactor.
#[tracing::instrument(skip_all, fields(program = command.first().map(String::as_str)))]
async fn run_command(
    command: &[String],
    environment: &Environment,
    redactor: &Redactor,
    cancel: &CancellationToken,
) -> Result<i32> {
    let (program, args) = command.split_first().context("no command given")?;

    let mut child = tokio::process::Command::new(program)
        .args(args)
        .env_clear()
        .envs(environment)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to start '{program}'"))?;

    let stdout = child.stdout.take().context("child stdout not captured")?;
    let stderr = child.stderr.take().context("child stderr not captured")?;
    let stdout_task = {
        let redactor = redactor.clone();
        tokio::spawn(async move { copy_redacted(stdout, tokio::io::stdout(), &redactor).await })
    };
    let stderr_task = {
        let redactor = redactor.clone();
        tokio::spawn(async move { copy_redacted(stderr, tokio::io::stderr(), &redactor).await })
    };

    let status = tokio::select! {
        status = child.wait() => status?,
        () = cancel.cancelled() => {
            warn!("Build aborted, stopping command");
            child.kill().await?;
            child.wait().await?
        }
    };

    // The command's status stands even if relaying its output broke.
    for (stream, task) in [("stdout", stdout_task), ("stderr", stderr_task)] {
        if let Err(e) = task.await? {
            warn!(stream, error = %e, "Command output relay failed");
        }
    }

    info!(status = %status, "Command finished");
    Ok(status.code().unwrap_or(1))
}
