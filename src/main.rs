//! pqkb CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use pqkb::{
    commands::{
        cmd_analyze, cmd_execute, cmd_ingest, cmd_init, cmd_prompt, cmd_publish, cmd_query,
        cmd_regenerate, cmd_status, print_analysis, print_ingest_stats, print_init_report,
        print_publish_output, print_query_results, print_regenerate_report, print_status,
        ExecuteOptions, IngestOptions, InitOptions, QueryOptions,
    },
    config::Config,
    embed::create_embedder,
    error::{Error, Result},
    executor::PersistedQueryExecutor,
    knowledge::KnowledgeBase,
    mcp::{McpServer, ToolContext},
    store::connect_store,
};
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pqkb")]
#[command(version, about = "Knowledge base and executor for persisted GraphQL queries", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize pqkb configuration, graph directory and knowledge base
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Ingest the graph's operation manifest into the knowledge base
    Ingest {
        /// Pages ingested concurrently
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Retrieve the stored chunks most similar to a query
    Query {
        /// The search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Minimum similarity (exclusive, 0-1)
        #[arg(short, long)]
        min_similarity: Option<f32>,
    },

    /// Render the retrieval prompt for a question
    Prompt {
        /// The user's question
        question: String,

        /// Maximum number of retrieved chunks
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Minimum similarity (exclusive, 0-1)
        #[arg(short, long)]
        min_similarity: Option<f32>,
    },

    /// Execute a persisted query against the router
    Execute {
        /// Persisted query id (sha256 hash)
        id: String,

        /// Router listen host (defaults to the graph's router config)
        #[arg(long)]
        router: Option<String>,

        /// Variables as a JSON string
        #[arg(long)]
        variables: Option<String>,
    },

    /// List the required variables of an operation document
    Analyze {
        /// Operation file (reads stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Maintain the operation manifest
    Manifest {
        #[command(subcommand)]
        action: ManifestAction,
    },

    /// Show system status
    Status,

    /// Start MCP server on stdio
    Mcp,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ManifestAction {
    /// Run the manifest generator and merge operation comments into it
    Regenerate {
        /// Only merge comments into the existing manifest
        #[arg(long)]
        merge_only: bool,
    },

    /// Publish the manifest with the graph registry tool
    Publish,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout belongs to command output and MCP
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Commands that don't need an existing config
    match &cli.command {
        Commands::Init { force } => return handle_init(cli.config.as_deref(), *force, cli.json).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(*shell, &mut cmd, "pqkb", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Analyze { file } => {
            let source = match file {
                Some(path) => std::fs::read_to_string(path)?,
                None => std::io::read_to_string(std::io::stdin())?,
            };
            let report = cmd_analyze(&source)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_analysis(&report);
            }
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } | Commands::Analyze { .. } => {
            unreachable!()
        }

        Commands::Ingest { concurrency } => {
            let knowledge = open_knowledge(&config).await?;
            let stats = cmd_ingest(&config, &knowledge, IngestOptions { concurrency }).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_ingest_stats(&stats);
            }

            if stats.resources_created == 0 && !stats.failures.is_empty() {
                return Err(Error::Storage(format!(
                    "all {} pages failed to ingest",
                    stats.failures.len()
                )));
            }
        }

        Commands::Query {
            query,
            top_k,
            min_similarity,
        } => {
            let knowledge = open_knowledge(&config).await?;
            let options = QueryOptions {
                top_k,
                min_similarity,
            };
            let results = cmd_query(&config, &knowledge, &query, options).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_query_results(&results);
            }
        }

        Commands::Prompt {
            question,
            top_k,
            min_similarity,
        } => {
            let knowledge = open_knowledge(&config).await?;
            let options = QueryOptions {
                top_k,
                min_similarity,
            };
            let prompt = cmd_prompt(&config, &knowledge, &question, options).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&prompt)?);
            } else {
                println!("{}", prompt.content);
            }
        }

        Commands::Execute {
            id,
            router,
            variables,
        } => {
            let options = ExecuteOptions {
                router_listen_host: router,
                variables,
            };
            let response = cmd_execute(&config, &id, options).await?;
            // The router response is JSON either way
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::Manifest { action } => match action {
            ManifestAction::Regenerate { merge_only } => {
                let report = cmd_regenerate(&config, merge_only).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    print_regenerate_report(&report);
                }
            }
            ManifestAction::Publish => {
                let output = cmd_publish(&config).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&output)?);
                } else {
                    print_publish_output(&output);
                }
            }
        },

        Commands::Status => {
            let status = cmd_status(&config).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }

        Commands::Mcp => {
            let knowledge = open_knowledge(&config).await?;
            let executor = PersistedQueryExecutor::new(&config.router)?;
            let server = McpServer::new(ToolContext {
                config,
                knowledge,
                executor,
            });
            server.run().await?;
        }
    }

    Ok(())
}

/// An explicit config path must exist; the default location falls back to defaults
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::load_from(None),
    }
}

async fn open_knowledge(config: &Config) -> Result<KnowledgeBase> {
    let embedder = create_embedder(&config.embedding)?;
    let store = connect_store(config, embedder.dimension()).await?;
    Ok(KnowledgeBase::from_config(config, embedder, store))
}

async fn handle_init(config: Option<&Path>, force: bool, json: bool) -> Result<()> {
    // A .toml path names the config file itself; anything else is the base directory
    let base_dir = match config {
        Some(path) if path.extension().map_or(false, |e| e == "toml") => path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(Config::default_base_dir),
        Some(path) => path.to_path_buf(),
        None => Config::default_base_dir(),
    };

    let report = cmd_init(InitOptions { base_dir, force }).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_init_report(&report);
    }
    Ok(())
}
