use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::net::SocketAddr;
use std::sync::Arc;

use chunk_relay::config::{Config, UploadConfig};
use chunk_relay::state::AppState;
use chunk_relay::server::{build_router, print_startup_banner, start_server};
use chunk_relay::sweeper;

// use mimalloc as the global allocator
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    // load .env file if it exists (fails silently if not found)
    let _ = dotenvy::dotenv();

    let config = Config::from_env();

    // build tokio runtime with configured worker threads
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime");

    runtime.block_on(async {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .init();

        // never fatal: bad or missing config means defaults
        let limits = UploadConfig::load(&config.upload_config_path);
        let state = Arc::new(AppState::new(limits));

        // uploads do not survive a restart
        state
            .layout
            .reset()
            .await
            .expect("Failed to prepare upload directories");

        // stand-in consumer until the chat layer subscribes
        let mut completions = state.events.subscribe();
        tokio::spawn(async move {
            use tokio::sync::broadcast::error::RecvError;
            loop {
                match completions.recv().await {
                    Ok(msg) => tracing::info!("💬 {} shared {} ({})", msg.user, msg.text, msg.file.url),
                    Err(RecvError::Lagged(n)) => tracing::warn!("Completion log lagged by {} events", n),
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let sweeper = sweeper::spawn(state.clone(), config.sweep_interval, config.session_ttl);

        let app = build_router(state.clone(), &config);
        let addr = SocketAddr::from((
            config.host.parse::<std::net::IpAddr>()
                .expect("Invalid HOST"),
            config.port,
        ));

        print_startup_banner(&config, &state);

        if let Err(e) = start_server(app, addr).await {
            tracing::error!("Server error: {}", e);
        }

        sweeper.abort();
        if let Err(e) = state.layout.reset().await {
            tracing::error!("Failed to clean upload directories on shutdown: {}", e);
        }
        tracing::info!("Bye");
    });
}
