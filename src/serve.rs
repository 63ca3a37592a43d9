use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use anyhow::Context as _;
use axum::{Router, extract::FromRef, routing::get};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity, log::LevelFilter};
use figment::{Figment, providers::Format as _};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

use super::config::AppConfig;
use super::db::Db;
pub use super::error::Error;

/// The application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Parser, Debug, Clone)]
/// Command line arguments.
pub struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "default.toml")]
    pub config: PathBuf,
    /// The verbosity level.
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,
}

#[derive(Clone, FromRef)]
/// The application state, shared across all routes.
pub struct AppState {
    /// The application configuration.
    pub(crate) config: AppConfig,
    /// The data access handle.
    pub db: Db,
}

/// Build the router for `state`.
pub fn app(state: AppState) -> Router {
    let images = ServeDir::new(&state.config.uploads.path);

    Router::new()
        .route("/", get(super::index))
        .nest("/api", super::endpoints::routes())
        .nest_service("/images", images)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Load the configuration from `path`, overlaid with `MEDIAFUL_*` environment variables.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    if !path.exists() {
        // Not fatal: every setting can come from the environment.
        warn!("configuration file {} does not exist", path.display());
    }

    Figment::new()
        .admerge(figment::providers::Toml::file(path))
        .admerge(figment::providers::Env::prefixed("MEDIAFUL_"))
        .extract()
        .context("failed to load configuration")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

/// The main application entry point.
pub async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    // Set up trace logging to console and account for the user-provided verbosity flag.
    if args.verbosity.log_level_filter() != LevelFilter::Off {
        let lvl = match args.verbosity.log_level_filter() {
            LevelFilter::Error => tracing::Level::ERROR,
            LevelFilter::Warn => tracing::Level::WARN,
            LevelFilter::Info | LevelFilter::Off => tracing::Level::INFO,
            LevelFilter::Debug => tracing::Level::DEBUG,
            LevelFilter::Trace => tracing::Level::TRACE,
        };
        tracing_subscriber::fmt().with_max_level(lvl).init();
    }

    let config = load_config(&args.config)?;

    // Initialize metrics reporting.
    super::metrics::setup(config.metrics.as_ref()).context("failed to set up metrics exporter")?;

    tokio::fs::create_dir_all(&config.uploads.path)
        .await
        .context("failed to create upload directory")?;

    let db = Db::connect(&config.db)
        .await
        .context("failed to open database")?;

    // On first startup there is no administrator. Create one and share the
    // credentials via the console.
    if let Some((admin, password)) = super::identity::ensure_admin(&db).await? {
        // N.B: This is a sensitive message, so we're bypassing `tracing` here and
        // logging it directly to console.
        println!("=====================================");
        println!("            FIRST STARTUP            ");
        println!("=====================================");
        println!("Administrator account created:");
        println!("  username: {}", admin.username);
        println!("  password: {password}");
        println!("=====================================");
    }

    let addr = config
        .listen_address
        .unwrap_or(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8000));

    let app = app(AppState {
        config: config.clone(),
        db: db.clone(),
    });

    let listener = TcpListener::bind(&addr)
        .await
        .context("failed to bind address")?;

    info!("listening on {addr}");
    info!("connect to: http://127.0.0.1:{}", addr.port());

    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("failed to serve app");

    db.close().await;
    served
}
