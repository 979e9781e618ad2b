// Link harvest server
//
// Serves the WebSocket delivery channel and the status route, and runs one
// harvesting session per connected consumer.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use kodegen_tools_linkharvest::{
    ChromiumLauncher, DriverLauncher, HarvestConfig, LinkStore, MemoryLinkStore, SessionManager,
    SessionRequest, SqliteLinkStore, server,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "kodegen-linkharvest",
    version,
    about = "Harvests image links from a scrolling feed and streams new ones to WebSocket consumers"
)]
struct Cli {
    /// Address of the plain HTTP status route.
    #[arg(long, env = "LINKHARVEST_HTTP_ADDR", default_value = "0.0.0.0:3000")]
    http_addr: SocketAddr,

    /// Address of the WebSocket delivery channel.
    #[arg(long, env = "LINKHARVEST_WS_ADDR", default_value = "0.0.0.0:8080")]
    ws_addr: SocketAddr,

    /// SQLite database recording every link ever harvested.
    #[arg(long, env = "LINKHARVEST_STORE", default_value = "linkharvest.db")]
    store: PathBuf,

    /// Table holding harvested links.
    #[arg(long, env = "LINKHARVEST_TABLE", default_value = "links")]
    table: String,

    /// Keep links in memory only; nothing survives a restart.
    #[arg(long, env = "LINKHARVEST_MEMORY_STORE")]
    memory_store: bool,

    /// Category label stored with every link.
    #[arg(long, env = "LINKHARVEST_CATEGORY")]
    category: Option<String>,

    /// Only store and deliver links starting with this prefix.
    #[arg(long, env = "LINKHARVEST_LINK_PREFIX")]
    link_prefix: Option<String>,

    /// Links per delivered batch (default 40 with a category, 400 without).
    #[arg(long, env = "LINKHARVEST_BATCH_SIZE")]
    batch_size: Option<usize>,

    /// Pause between poll cycles, in milliseconds.
    #[arg(long, env = "LINKHARVEST_CYCLE_DELAY_MS", default_value_t = 50)]
    cycle_delay_ms: u64,

    /// Recycle the browser after this many poll cycles.
    #[arg(long, env = "LINKHARVEST_RECYCLE_EVERY", default_value_t = 100)]
    recycle_every: u32,

    /// Maximum session duration in seconds; 0 lets sessions run until cancelled.
    #[arg(long, env = "LINKHARVEST_MAX_SESSION_SECS", default_value_t = 30)]
    max_session_secs: u64,

    /// Show the browser window (debug builds only).
    #[arg(long)]
    headful: bool,

    /// Start a consumerless session for this query at boot.
    #[arg(long, env = "LINKHARVEST_SEED_QUERY")]
    seed_query: Option<String>,

    /// Ordering for the seed session.
    #[arg(long, env = "LINKHARVEST_SEED_ORDER", default_value = "top")]
    seed_order: String,

    /// Container selector for the seed session.
    #[arg(long, env = "LINKHARVEST_SEED_SELECTOR", default_value = ".previewFeed")]
    seed_selector: String,
}

impl Cli {
    fn harvest_config(&self) -> Result<HarvestConfig> {
        let delay = Duration::from_millis(self.cycle_delay_ms);
        let max_session =
            (self.max_session_secs > 0).then(|| Duration::from_secs(self.max_session_secs));

        let mut builder = HarvestConfig::builder()
            .store_path(&self.store)
            .table(&self.table)
            .cycle_delay(delay)
            .idle_delay(delay)
            .recycle_every(self.recycle_every)
            .max_session_duration(max_session)
            .headless(!self.headful);

        if let Some(category) = &self.category {
            builder = builder.category(category);
        }
        if let Some(prefix) = &self.link_prefix {
            builder = builder.link_prefix(prefix);
        }
        if let Some(size) = self.batch_size {
            builder = builder.batch_size(size);
        }
        if let Some(query) = &self.seed_query {
            builder = builder.seed(SessionRequest::new(
                query,
                &self.seed_order,
                &self.seed_selector,
            ));
        }

        builder.build()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn,chromiumoxide=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Arc::new(cli.harvest_config().context("Invalid configuration")?);

    let store: Arc<dyn LinkStore> = if cli.memory_store {
        tracing::warn!("Using in-memory link store; harvested links are lost on exit");
        Arc::new(MemoryLinkStore::new())
    } else {
        Arc::new(
            SqliteLinkStore::connect(config.store_path(), config.table())
                .await
                .context("Failed to open link store")?,
        )
    };
    store
        .ensure_unique_index()
        .await
        .context("Failed to establish unique index on links")?;

    let launcher: Arc<dyn DriverLauncher> = Arc::new(ChromiumLauncher::new(&config));
    let manager = Arc::new(SessionManager::new(
        Arc::clone(&config),
        launcher,
        Arc::clone(&store),
    ));
    Arc::clone(&manager).start_cleanup_task();

    let ws_listener = tokio::net::TcpListener::bind(cli.ws_addr)
        .await
        .with_context(|| format!("Failed to bind delivery channel on {}", cli.ws_addr))?;
    let http_listener = tokio::net::TcpListener::bind(cli.http_addr)
        .await
        .with_context(|| format!("Failed to bind status route on {}", cli.http_addr))?;

    tracing::info!("{}", server::status_message(cli.ws_addr));
    tracing::info!("Status route listening on http://{}", cli.http_addr);

    if let Some(seed) = config.seed() {
        match manager.start_detached(seed.clone()).await {
            Ok(id) => tracing::info!(session = %id, query = %seed.query, "Seed session started"),
            Err(e) => tracing::warn!("Seed session not started: {e}"),
        }
    }

    let ws_app = server::router(Arc::clone(&manager));
    let http_app = server::status_router(cli.ws_addr);

    let served: Result<()> = tokio::select! {
        result = async { axum::serve(ws_listener, ws_app).await } => {
            result.context("Delivery channel server failed")
        }
        result = async { axum::serve(http_listener, http_app).await } => {
            result.context("Status server failed")
        }
        result = tokio::signal::ctrl_c() => {
            result
                .context("Failed to listen for Ctrl-C")
                .map(|()| tracing::info!("Ctrl-C received, shutting down"))
        }
    };

    // Sessions release their browsers before the store goes away
    manager.shutdown().await;
    store.close().await;
    tracing::info!("Shutdown complete");
    served
}
