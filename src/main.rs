use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tavern::config::{Config, ServerConfig};
use tavern::server::{AppState, create_router};
use tavern::service::apply_seed;
use tavern::store::{SqliteStore, Store};

#[derive(Parser)]
#[command(name = "tavern")]
#[command(about = "A character chat server backed by an LLM provider", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Serve {
        /// TOML configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database and uploaded images
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Create the database and schema without starting the server
    Init {
        /// Data directory for the database and uploaded images
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

fn init_tracing(default_level: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level)?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn open_store(server: &ServerConfig) -> anyhow::Result<SqliteStore> {
    fs::create_dir_all(&server.data_dir)?;
    let store = SqliteStore::new(server.db_path())?;
    store.initialize()?;
    Ok(store)
}

fn run_init(data_dir: PathBuf) -> anyhow::Result<()> {
    let server = ServerConfig {
        data_dir,
        ..ServerConfig::default()
    };
    open_store(&server)?;

    println!();
    println!("Database initialized at {}", server.db_path().display());
    println!();

    Ok(())
}

async fn run_serve(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(open_store(&config.server)?);
    fs::create_dir_all(config.upload_dir())?;

    let state = AppState::new(config, store.clone(), store.clone())?;
    apply_seed(
        state.store.as_ref(),
        state.sessions.as_ref(),
        state.hasher.as_ref(),
        &state.config.seed,
    )?;

    if !state.config.ai.has_api_key() {
        tracing::warn!("OPENROUTER_API_KEY is not set; replies will report a missing key");
    }

    let addr = state.config.server.socket_addr()?;
    let app = create_router(Arc::new(state));

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
        } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.server.data_dir = data_dir;
            }

            init_tracing(&config.logging.level)?;
            run_serve(config).await?;
        }
        Commands::Init { data_dir } => {
            init_tracing(&Config::default().logging.level)?;
            run_init(data_dir)?;
        }
    }

    Ok(())
}
