use anyhow::{bail, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

mod api;
mod audit;
mod auth;
mod config;
mod crypt;
mod settings;
mod store;
mod types;

use audit::{AssigneeResponses, Logo, ReportRenderer, ResponseHook};
use auth::{ProviderRegistry, RunContext};
use config::Config;
use crypt::Encrypter;
use store::GrcStore;

pub struct AppState {
    pub config: Config,
    pub store: GrcStore,
    pub encrypter: Encrypter,
    pub providers: ProviderRegistry,
    pub response_hook: Arc<dyn ResponseHook>,
    pub renderer: ReportRenderer,
    pub logo: Logo,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("grc_audit=debug".parse()?),
        )
        .json()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let context = if args.is_empty() {
        RunContext::Web
    } else {
        RunContext::Console
    };

    // Needs no configuration, so it runs before APP_KEY is required
    if args.first().map(String::as_str) == Some("key:generate") {
        println!("{}", Encrypter::generate_key());
        return Ok(());
    }

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let encrypter = Encrypter::from_app_key(&config.app_key)?;

    if context == RunContext::Console {
        return run_console(&args, &encrypter);
    }

    info!("Starting grc-audit v{}", env!("CARGO_PKG_VERSION"));
    info!("Application URL: {}", config.app_url);

    let store = GrcStore::new(config.redis_url.as_deref()).await;
    info!(
        "Storage backend: {}",
        if store.has_redis() { "Redis" } else { "In-memory" }
    );

    let providers = ProviderRegistry::new();
    auth::configure_providers(context, &store, &encrypter, &config.app_url, &providers).await?;

    let logo = match &config.logo_path {
        Some(path) => Logo::from_path(path).await?,
        None => Logo::bundled(),
    };

    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        encrypter,
        providers,
        response_hook: Arc::new(AssigneeResponses),
        renderer: ReportRenderer::new()?,
        logo,
    });

    if config.api_key.is_some() {
        info!("API key authentication enabled");
    } else {
        info!("API key authentication disabled (open mode)");
    }
    if config.admin_api_key.is_none() {
        info!("ADMIN_API_KEY not set, admin endpoints disabled");
    }

    let app = api::routes::app_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server with graceful shutdown
    let addr = format!("0.0.0.0:{}", config.port);
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Console commands; the web-only boot steps are skipped
fn run_console(args: &[String], encrypter: &Encrypter) -> Result<()> {
    match args.first().map(String::as_str) {
        Some("encrypt") => {
            let Some(value) = args.get(1) else {
                bail!("usage: grc-audit encrypt <value>");
            };
            println!("{}", encrypter.encrypt_string(value)?);
            Ok(())
        }
        Some(other) => bail!(
            "unknown command `{}` (expected `encrypt <value>` or `key:generate`)",
            other
        ),
        None => Ok(()),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
