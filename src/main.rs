mod doctor;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use stackr_agent::{BitcoinNewsReport, BitcoinNewsWorkflow};
use stackr_core::config::{default_config_dir, AppConfig};
use stackr_core::traits::LlmClient;
use stackr_core::types::{BudgetTier, Priority, Provider, TaskType};
use stackr_llm::selection::{ModelSelector, Selection};
use stackr_llm::{create_client, RetryingClient};

#[derive(Parser)]
#[command(
    name = "stackr",
    version,
    about = "LLM workflow runner with cost-aware model selection"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "stackr.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Run the Bitcoin news workflow once and print the result
    Run {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show which model would be chosen for a task
    Select {
        /// analytics, code_generation, reasoning, fast_processing, vision
        #[arg(long)]
        task: TaskType,
        /// budget, standard, premium, ultra (default from config)
        #[arg(long)]
        budget: Option<BudgetTier>,
        /// cost, speed, quality (default from config)
        #[arg(long)]
        priority: Option<Priority>,
        /// Restrict to these providers (comma-separated); defaults to those with API keys
        #[arg(long, value_delimiter = ',')]
        provider: Vec<Provider>,
        /// Print the selection as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show current configuration with API keys masked
    Config,
    /// Run configuration health checks
    Doctor,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stackr=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "stackr", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;
    let selector = Arc::new(ModelSelector::from_config(&config)?);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let client = build_client(&config);
            info!(
                bind = %config.server.bind,
                providers = ?config.available_providers(),
                "Starting Stackr server"
            );
            let server = stackr_gateway::GatewayServer::new(config, selector, client);
            let cancel = tokio_util::sync::CancellationToken::new();
            let cancel_clone = cancel.clone();

            // Graceful shutdown on Ctrl-C
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down server...");
                cancel_clone.cancel();
            });

            server.run(cancel).await?;
        }
        Commands::Run { json } => {
            let client = build_client(&config);
            let workflow = BitcoinNewsWorkflow::new(&config, client, selector)?;
            match workflow.run().await {
                Ok(report) if json => println!("{}", serde_json::to_string_pretty(&report)?),
                Ok(report) => print_report(&report),
                Err(e) => {
                    error!(error = %e, "Workflow failed");
                    return Err(e.into());
                }
            }
        }
        Commands::Select {
            task,
            budget,
            priority,
            provider,
            json,
        } => {
            let providers = if provider.is_empty() {
                None
            } else {
                Some(provider.as_slice())
            };
            let selection = selector.select(
                task,
                providers,
                budget.unwrap_or(config.selection.budget),
                priority.unwrap_or(config.selection.priority),
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&selection)?);
            } else {
                print_selection(&selection);
            }
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config.redacted())?);
        }
        Commands::Doctor => {
            println!("Stackr Doctor");
            println!("=============");
            doctor::run_doctor(&config);
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}

/// `--config` if it exists, then `~/.stackr/config.toml`, then the environment.
fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        return Ok(AppConfig::load(path)?);
    }
    if let Some(home_config) = default_config_dir().map(|d| d.join("config.toml")) {
        if home_config.exists() {
            info!(path = %home_config.display(), "Using config from home directory");
            return Ok(AppConfig::load(&home_config)?);
        }
    }
    Ok(AppConfig::from_env())
}

fn build_client(config: &AppConfig) -> Arc<dyn LlmClient> {
    // One OpenAI-compatible client serves every provider; endpoints come from each call's config
    Arc::new(RetryingClient::new(
        create_client(Provider::OpenAi),
        config.retry.clone(),
    ))
}

fn print_report(report: &BitcoinNewsReport) {
    println!("Bitcoin news analysis ({})", report.run_id);
    println!("  Headline:  {}", report.headline);
    println!("  Summary:   {}", report.summary);
    println!(
        "  Sentiment: {:?} ({})",
        report.sentiment.analysis, report.sentiment.reasoning
    );
    println!("  Duration:  {} ms", report.duration_ms);
    for step in &report.steps {
        println!("    {:<12} {} ms", step.node_id, step.elapsed_ms);
    }
}

fn print_selection(selection: &Selection) {
    let m = &selection.model;
    println!("{} ({})", m.model_id, m.provider);
    println!(
        "  Cost:    ${:.2} in / ${:.2} out per 1M tokens",
        m.cost_per_million_input_tokens, m.cost_per_million_output_tokens
    );
    println!("  Speed:   {:?}", m.speed);
    println!(
        "  Context: {} tokens{}",
        m.capabilities.context_size,
        if m.capabilities.reasoning { ", reasoning" } else { "" }
    );
    if let Some(fallback) = selection.fallback {
        println!("  Fallback used: {:?} (no model met every constraint)", fallback);
    }
}
