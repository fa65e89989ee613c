use anyhow::{Context, Result};
use atlas_sp::cli::{Cli, Command, ConnectionCommand, ProfileArgs, WorkspaceCommand};
use atlas_sp::config::DEFAULT_PROCESSORS_DIR;
use atlas_sp::connections::db_role;
use atlas_sp::output::{error_value, render_json};
use atlas_sp::profiler::run_profile;
use atlas_sp::{start_processor, AtlasClient, AtlasConfig, OperationResult};
use clap::Parser;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiering::{definition_path, ComplexityAnalyzer, Tier, TierRecommendation};
use tokio_util::sync::CancellationToken;

/// What a command produced, and whether it counts as a failure.
struct Outcome {
    value: Value,
    failed: bool,
}

impl Outcome {
    fn ok(value: Value) -> Self {
        Self {
            value,
            failed: false,
        }
    }

    fn operation(result: OperationResult) -> Result<Self> {
        let failed = result.is_failure();
        Ok(Self {
            value: serde_json::to_value(result)?,
            failed,
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }
    let color = !cli.no_color;

    match run(cli).await {
        Ok(outcome) => {
            println!("{}", render_json(&outcome.value, color));
            if outcome.failed {
                std::process::exit(1);
            }
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            println!("{}", render_json(&error_value(&format!("{e:#}")), color));
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<Outcome> {
    match cli.command {
        Command::Analyze { name, file } => {
            analyze(&processors_dir(&cli.config), &name, file.as_deref())
        }
        command => execute(&connect(&cli.config)?, command).await,
    }
}

async fn execute(client: &AtlasClient, command: Command) -> Result<Outcome> {
    match command {
        Command::List { verbose } => {
            let processors = client
                .list_processors(verbose)
                .await
                .context("Failed to list processors")?;
            Ok(Outcome::ok(Value::Array(processors)))
        }
        Command::Status { name } => {
            let report = client.status_report(name.as_deref()).await;
            Ok(Outcome::ok(serde_json::to_value(report)?))
        }
        Command::Stats { name, verbose } => {
            let report = client.stats_report(name.as_deref(), verbose).await;
            Ok(Outcome::ok(serde_json::to_value(report)?))
        }
        Command::Start {
            name,
            tier,
            auto_tier,
        } => {
            let tier = if auto_tier {
                Some(recommended_tier(client.config(), &name))
            } else {
                tier
            };
            Outcome::operation(start_processor(client, &name, tier).await)
        }
        Command::Stop { name } => Outcome::operation(client.stop_processor(&name).await),
        Command::Delete { name } => Outcome::operation(client.delete_processor(&name).await),
        Command::Create { name, file } => {
            Outcome::operation(client.create_processor_from_file(&name, &file).await)
        }
        Command::Analyze { name, file } => {
            analyze(&client.config().processors_dir, &name, file.as_deref())
        }
        Command::Profile(args) => profile(client, &args).await,
        Command::Workspaces(command) => workspaces(client, command).await,
        Command::Connections(command) => connections(client, command).await,
    }
}

fn connect(config_path: &Path) -> Result<AtlasClient> {
    let config = AtlasConfig::load(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    let client = AtlasClient::new(Arc::new(config)).context("Failed to build HTTP client")?;
    Ok(client)
}

/// Analysis needs no credentials; the config only supplies `PROCESSORS_DIR`.
fn processors_dir(config_path: &Path) -> PathBuf {
    match AtlasConfig::load(config_path) {
        Ok(config) => config.processors_dir,
        Err(e) => {
            tracing::debug!(error = %e, "No usable configuration, using default processors dir");
            PathBuf::from(DEFAULT_PROCESSORS_DIR)
        }
    }
}

fn analyze(processors_dir: &Path, name: &str, file: Option<&Path>) -> Result<Outcome> {
    let path = match file {
        Some(file) => file.to_path_buf(),
        None => definition_path(processors_dir, name),
    };
    let recommendation = ComplexityAnalyzer::new().recommend_for_file(&path);
    log_recommendation(name, &recommendation);
    Ok(Outcome::ok(serde_json::to_value(recommendation)?))
}

fn recommended_tier(config: &AtlasConfig, name: &str) -> Tier {
    let path = definition_path(&config.processors_dir, name);
    let recommendation = ComplexityAnalyzer::new().recommend_for_file(&path);
    log_recommendation(name, &recommendation);
    recommendation.recommended_tier
}

fn log_recommendation(name: &str, recommendation: &TierRecommendation) {
    match recommendation.error() {
        Some(error) => tracing::warn!(
            processor = name,
            tier = %recommendation.recommended_tier,
            error,
            "Using fallback tier"
        ),
        None => tracing::info!(
            processor = name,
            tier = %recommendation.recommended_tier,
            "Recommended tier"
        ),
    }
}

async fn profile(client: &AtlasClient, args: &ProfileArgs) -> Result<Outcome> {
    let options = args.options();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing profile");
            trigger.cancel();
        }
    });

    let analysis = run_profile(client, &options, cancel)
        .await
        .context("Profiling failed")?;
    Ok(Outcome::ok(serde_json::to_value(analysis)?))
}

async fn workspaces(client: &AtlasClient, command: WorkspaceCommand) -> Result<Outcome> {
    match command {
        WorkspaceCommand::List => {
            let list = client
                .list_workspaces()
                .await
                .context("Failed to list workspaces")?;
            Ok(Outcome::ok(list))
        }
        WorkspaceCommand::Show { name } => {
            let details = client
                .workspace_details(&name)
                .await
                .with_context(|| format!("Failed to get workspace '{name}'"))?;
            Ok(Outcome::ok(details))
        }
        WorkspaceCommand::Create {
            name,
            cloud_provider,
            region,
        } => Outcome::operation(
            client
                .create_workspace(&name, &cloud_provider, &region)
                .await,
        ),
        WorkspaceCommand::Delete { name } => {
            Outcome::operation(client.delete_workspace(&name).await)
        }
    }
}

async fn connections(client: &AtlasClient, command: ConnectionCommand) -> Result<Outcome> {
    match command {
        ConnectionCommand::List => {
            let list = client
                .list_connections()
                .await
                .context("Failed to list connections")?;
            Ok(Outcome::ok(Value::Array(list)))
        }
        ConnectionCommand::CreateHttp { name, url } => {
            Outcome::operation(client.create_http_connection(&name, &url).await)
        }
        ConnectionCommand::CreateCluster {
            name,
            cluster,
            role,
            role_type,
        } => {
            let role = db_role(role.as_deref(), role_type.as_deref());
            Outcome::operation(
                client
                    .create_cluster_connection(&name, &cluster, role)
                    .await,
            )
        }
        ConnectionCommand::Delete { name } => {
            Outcome::operation(client.delete_connection(&name).await)
        }
    }
}
