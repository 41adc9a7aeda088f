//! TextExtract Server
//!
//! Serves the extraction API in backend mode, or forwards `/api/*` to a
//! backend origin in edge mode.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use textextract_server::{
    build_edge_router, build_router,
    config::{Config, ServerMode},
    proxy::ProxyState,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "textextract_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting TextExtract Server v{}", env!("CARGO_PKG_VERSION"));

    let app = match config.server.mode {
        ServerMode::Backend => {
            if config.ocr.api_key.is_none() {
                tracing::warn!("OCR_SPACE_API_KEY is not set; every request will use the Tesseract fallback");
            }
            match (&config.auth.callback_base_url, config.auth.is_configured()) {
                (Some(base), true) => tracing::info!("Google OAuth callback base: {}", base),
                (None, true) => tracing::warn!("Google OAuth is configured but REPLIT_DOMAINS is not set"),
                (_, false) => tracing::info!("Google OAuth is not configured"),
            }

            let state = AppState::from_config(config.clone())
                .await
                .context("Failed to initialize application state")?;
            tracing::info!("Usage tracking backend: {}", state.usage().backend());
            for (provider, available) in state.ocr().provider_status().await {
                if available {
                    tracing::info!("OCR provider {} is available", provider);
                } else {
                    tracing::warn!("OCR provider {} is not available", provider);
                }
            }

            build_router(state)
        }
        ServerMode::Edge => {
            tracing::info!("Edge mode, proxying /api/* to {}", config.proxy.backend_origin);
            build_edge_router(ProxyState::from_config(&config.proxy))
        }
    };

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid SERVER_HOST/SERVER_PORT")?;
    tracing::info!("TextExtract Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
