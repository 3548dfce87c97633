use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use graph_engine::{BlockCatalog, Direction, EditorSession, FileSnapshotStorage, LoadReport};
use run_client::{HttpExecutionService, RunClient};

mod config;
mod constants;

use config::AppConfig;

/// Blockflow - build and run robotics block graphs
#[derive(Parser)]
#[command(name = "blockflow")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the data directory (default: ~/.blockflow)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Execution service URL, overriding the configured one
    #[arg(long, global = true)]
    service_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the starter graph (simulator + controller) as a graph.v1 file
    New {
        /// Output file
        out: PathBuf,
    },
    /// Load a graph.v1 file and report problems
    Validate {
        file: PathBuf,
    },
    /// Print the advisory execution order of a graph.v1 file
    Order {
        file: PathBuf,
    },
    /// Submit a graph.v1 file to the execution service
    Run {
        file: PathBuf,
        /// Open the simulator viewer instead of running headless
        #[arg(long)]
        viewer: bool,
    },
    /// List block types
    Catalog {
        /// Ask the execution service instead of using the built-in blocks
        #[arg(long)]
        remote: bool,
    },
    /// Check that the execution service is up
    Health,
    /// Import a graph.v1 file into the local snapshot slot
    Save {
        file: PathBuf,
    },
    /// Export the local snapshot slot as a graph.v1 file
    Restore {
        out: PathBuf,
    },
    /// Write the effective configuration to the data directory
    Config,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => dirs::home_dir()
            .context("could not determine home directory")?
            .join(constants::paths::DATA_DIR),
    };

    let Some(command) = cli.command else {
        println!("blockflow - use --help to see available commands");
        return Ok(());
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let mut config = AppConfig::load(&data_dir)
            .await
            .with_context(|| format!("failed to load config from {}", data_dir.display()))?;
        if let Some(url) = cli.service_url {
            config.service_url = url;
        }
        execute(command, &config, &data_dir).await
    })
}

async fn execute(command: Commands, config: &AppConfig, data_dir: &Path) -> Result<()> {
    match command {
        Commands::New { out } => {
            let session = EditorSession::with_starter_graph(builtin_catalog())?;
            session
                .export_to_path(&out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Wrote starter graph to {}", out.display());
        }
        Commands::Validate { file } => {
            let (_, report) = open_graph(&file)?;
            if !report.issues.is_empty() {
                for issue in &report.issues {
                    println!("  {}", issue);
                }
                bail!("{} problem(s) in {}", report.issues.len(), file.display());
            }
            println!("{}: OK", file.display());
        }
        Commands::Order { file } => {
            let (session, _) = open_graph(&file)?;
            for (index, id) in session.to_document().execution_order.iter().enumerate() {
                let label = session.store().node(id).map(|n| n.label.as_str()).unwrap_or("");
                println!("{:>3}. {} ({})", index + 1, id, label);
            }
        }
        Commands::Run { file, viewer } => {
            let (mut session, _) = open_graph(&file)?;
            if viewer {
                session
                    .run_config_mut()
                    .set("viewer", serde_json::Value::Bool(true));
            }
            let headless = config.headless && !viewer;

            let client = connect_service(config)?;
            let response = client
                .submit(session.store(), session.run_config(), headless)
                .await
                .context("run failed")?;
            println!("Run directory: {}", response.run_dir);
            println!("{}", serde_json::to_string_pretty(&response.metrics)?);
        }
        Commands::Catalog { remote } => {
            let catalog = if remote {
                connect_service(config)?
                    .fetch_catalog()
                    .await
                    .context("failed to fetch catalog")?
            } else {
                BlockCatalog::builtin()
            };
            print_catalog(&catalog);
        }
        Commands::Health => {
            let client = connect_service(config)?;
            if !client.health_check().await {
                bail!("execution service at {} is not healthy", config.service_url);
            }
            println!("{}: ok", config.service_url);
        }
        Commands::Save { file } => {
            let (session, _) = open_graph(&file)?;
            let mut storage = FileSnapshotStorage::new(config.snapshot_dir(data_dir));
            session.save_local(&mut storage, &config.snapshot_key)?;
            println!(
                "Saved {} to snapshot '{}'",
                file.display(),
                config.snapshot_key
            );
        }
        Commands::Restore { out } => {
            let storage = FileSnapshotStorage::new(config.snapshot_dir(data_dir));
            let mut session = EditorSession::new(builtin_catalog());
            session
                .load_local(&storage, &config.snapshot_key)
                .with_context(|| format!("failed to restore snapshot '{}'", config.snapshot_key))?;
            session
                .export_to_path(&out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Restored snapshot to {}", out.display());
        }
        Commands::Config => {
            config
                .save(data_dir)
                .await
                .with_context(|| format!("failed to write config to {}", data_dir.display()))?;
            println!("{}", serde_json::to_string_pretty(config)?);
        }
    }
    Ok(())
}

fn builtin_catalog() -> Arc<BlockCatalog> {
    Arc::new(BlockCatalog::builtin())
}

fn connect_service(config: &AppConfig) -> Result<RunClient> {
    let service = HttpExecutionService::new(config.service_url.as_str(), config.request_timeout())
        .context("failed to create HTTP client")?;
    Ok(RunClient::new(Arc::new(service)))
}

/// Load a graph.v1 file into a fresh session
fn open_graph(file: &Path) -> Result<(EditorSession, LoadReport)> {
    let mut session = EditorSession::new(builtin_catalog());
    let report = session
        .import_from_path(file)
        .with_context(|| format!("failed to load {}", file.display()))?;
    Ok((session, report))
}

fn print_catalog(catalog: &BlockCatalog) {
    for block_type in catalog.block_types() {
        let Some(schema) = catalog.get(block_type) else {
            continue;
        };
        println!("{} ({:?}) - {}", schema.block_type, schema.category, schema.label);
        for direction in [Direction::Input, Direction::Output] {
            for port in schema.ports(direction) {
                let marker = if port.required { " *" } else { "" };
                println!(
                    "    {:<6} {}: {}{}",
                    direction.to_string(),
                    port.name,
                    port.data_type,
                    marker
                );
            }
        }
        for (key, value) in &schema.param_defaults {
            println!("    param  {} = {}", key, serde_json::to_string(value).unwrap_or_default());
        }
    }
}
