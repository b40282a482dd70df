use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use teardown::ai::{AiCapability, GeminiClient};
use teardown::config::Settings;
use teardown::models::{ExplorationSummary, GenerationMode, Image};
use teardown::render::render_tree;
use teardown::session::Explorer;
use teardown::{api, db, mcp};

#[derive(Parser)]
#[command(name = "teardown")]
#[command(about = "Explore any object by recursively breaking it into its parts")]
struct Cli {
    /// Run without the AI service (stored explorations only)
    #[arg(long, global = true)]
    offline: bool,

    /// Database file (defaults to the platform data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Generation mode: fast or full
    #[arg(long, global = true)]
    mode: Option<GenerationMode>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Start MCP server via stdio
    Mcp,
    /// Explore an object, or a part of an already explored item
    Explore {
        /// What to explore
        query: String,

        /// Item to explore the query as a part of
        #[arg(short, long)]
        parent: Option<Uuid>,

        /// Photo to identify instead of using the query as the name
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
    /// List stored explorations
    List,
    /// Print an exploration as a tree
    Tree {
        /// Root id of the exploration
        id: Uuid,
    },
    /// Delete an exploration and everything explored under it
    Delete {
        /// Root id of the exploration
        id: Uuid,
    },
    /// Write every exploration to a JSON file
    Export { file: PathBuf },
    /// Read explorations from a JSON export
    Import { file: PathBuf },
}

/// Initialize tracing with output to stderr (for MCP mode) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "teardown=debug,tower_http=debug".into()),
    );

    if use_stderr {
        // stdout carries the MCP protocol
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn build_explorer(cli: &Cli) -> anyhow::Result<Explorer> {
    let mut settings = Settings::from_env();
    if cli.offline {
        settings.ai = None;
    }
    if let Some(mode) = cli.mode {
        settings.generation.mode = mode;
    }
    if let Some(path) = &cli.db {
        settings.db_path = Some(path.clone());
    }

    let database = match &settings.db_path {
        Some(path) => db::Database::open(path.clone())?,
        None => db::Database::open_default()?,
    };
    database.migrate()?;

    let ai: Option<Arc<dyn AiCapability>> = match &settings.ai {
        Some(ai_settings) => Some(Arc::new(GeminiClient::from_settings(ai_settings)?)),
        None => {
            tracing::warn!("No API key configured, running offline");
            None
        }
    };

    Ok(Explorer::open(Arc::new(database), ai, settings.generation).await)
}

fn read_image(path: &Path) -> anyhow::Result<Image> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Could not read {}", path.display()))?;
    let mime_type = match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    };
    Ok(Image::from_bytes(mime_type, &bytes))
}

async fn serve(explorer: Explorer, port: u16) -> anyhow::Result<()> {
    tracing::info!("Starting teardown server on port {}", port);

    let app = api::create_router(explorer.clone());

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("teardown server listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    explorer.settle().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let use_stderr = matches!(cli.command, Some(Commands::Mcp));
    init_tracing(use_stderr);

    let explorer = build_explorer(&cli).await?;

    match cli.command {
        Some(Commands::Serve { port }) => serve(explorer, port).await?,
        Some(Commands::Mcp) => mcp::run_stdio_server(explorer).await?,
        Some(Commands::Explore {
            query,
            parent,
            image,
        }) => {
            let reference_image = image.as_deref().map(read_image).transpose()?;
            let item = explorer.explore(&query, parent, reference_image).await?;
            explorer.settle().await;

            println!("{} ({})", item.name, item.id);
            if !item.category.is_empty() {
                println!("{}", item.category);
            }
            println!("{}\n", item.description);
            for part in &item.parts {
                println!("  - {}: {}", part.name, part.description);
            }
            for fact in &item.facts {
                println!("  * {}", fact);
            }
        }
        Some(Commands::List) => {
            let collection = explorer.collection();
            if collection.is_empty() {
                println!("No explorations yet.");
            }
            for summary in collection.iter().map(ExplorationSummary::from) {
                println!(
                    "{}  {}  ({} items, {})",
                    summary.id,
                    summary.name,
                    summary.item_count,
                    summary.timestamp.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Some(Commands::Tree { id }) => {
            let root = explorer
                .collection()
                .into_iter()
                .find(|root| root.id == id)
                .ok_or_else(|| anyhow::anyhow!("Exploration {} not found", id))?;
            print!("{}", render_tree(&[root], None));
        }
        Some(Commands::Delete { id }) => {
            if explorer.remove_exploration(id).await {
                println!("Deleted {}", id);
            } else {
                anyhow::bail!("Exploration {} not found", id);
            }
        }
        Some(Commands::Export { file }) => {
            let json = explorer.export_json()?;
            std::fs::write(&file, json)
                .with_context(|| format!("Could not write {}", file.display()))?;
            println!(
                "Exported {} explorations to {}",
                explorer.collection().len(),
                file.display()
            );
        }
        Some(Commands::Import { file }) => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("Could not read {}", file.display()))?;
            let count = explorer.import_json(&json).await?;
            println!("Imported {} explorations", count);
        }
        None => serve(explorer, 3000).await?,
    }

    Ok(())
}
