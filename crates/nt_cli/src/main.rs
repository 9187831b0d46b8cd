use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use nt_core::RawParams;
use nt_newsapi::{NewsApiClient, NewsSource};
use nt_storage::{BackendConfig, StorageKind};
use nt_web::{create_app, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "News proxy backend", long_about = None)]
pub struct Cli {
    #[arg(long, env = "NEWS_API_KEY", hide_env_values = true)]
    news_api_key: String,
    #[arg(long, env = "NEWS_API_BASE_URL", default_value = nt_newsapi::DEFAULT_BASE_URL)]
    news_api_url: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API
    Serve(ServeArgs),
    /// Fetch live news once and print it as JSON (same parameters as /api/news)
    Headlines {
        /// Query parameters as key=value, e.g. country=fr category=technology
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// List the provider's sources and print them as JSON
    Sources {
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, env = "PORT", default_value_t = 5000)]
    port: u16,
    /// Storage backend: mongodb or memory
    #[arg(long, env = "NT_STORAGE", default_value = "mongodb")]
    storage: StorageKind,
    #[arg(long, env = "MONGODB_URI", default_value = nt_storage::DEFAULT_URL, hide_env_values = true)]
    backend_url: String,
    #[arg(long, env = "NT_DATABASE", default_value = nt_storage::DEFAULT_DATABASE)]
    database: String,
    #[arg(long, env = "NT_COLLECTION", default_value = nt_storage::DEFAULT_COLLECTION)]
    collection: String,
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {}", s))
}

async fn serve(news: Arc<dyn NewsSource>, args: ServeArgs) -> anyhow::Result<()> {
    let config = BackendConfig {
        url: args.backend_url,
        database: args.database,
        collection: args.collection,
    };

    info!("💾 Connecting to storage ({:?})...", args.storage);
    let store = match nt_storage::create_storage(args.storage, &config).await {
        Ok(store) => store,
        Err(e) => {
            error!("❌ Storage connection failed: {}", e);
            return Err(e).context("cannot serve without storage");
        }
    };
    info!("✅ Storage connected: {}/{}", config.database, config.collection);

    let app = create_app(AppState::new(news, store.clone()));
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("🚀 Server is running on port {}", args.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    info!("Shutting down, closing storage");
    store.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let news: Arc<dyn NewsSource> = Arc::new(NewsApiClient::with_base_url(cli.news_api_key, &cli.news_api_url)?);

    match cli.command {
        Commands::Serve(args) => serve(news, args).await?,
        Commands::Headlines { params } => {
            let params: RawParams = params.into_iter().collect();
            let page = news.fetch_articles(&nt_newsapi::translate_news(&params)).await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Commands::Sources { params } => {
            let params: RawParams = params.into_iter().collect();
            let sources = news.fetch_sources(&nt_newsapi::translate_sources(&params)).await?;
            println!("{}", serde_json::to_string_pretty(&sources)?);
        }
    }

    Ok(())
}
