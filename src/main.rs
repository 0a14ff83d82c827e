use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use vox_relay::{create_router, AppState, Config, MemorySessionStore, SpeechEngine};

#[derive(Parser)]
#[command(name = "vox-relay", about = "Live audio transcription relay")]
struct Cli {
    /// Config file stem, resolved by extension (e.g. config/vox-relay)
    #[arg(long, default_value = "config/vox-relay")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Arc::new(Config::load(&cli.config)?);

    info!("{} v{} starting", config.service.name, env!("CARGO_PKG_VERSION"));

    // The model is loaded once, before any connection is accepted, and
    // shared read-only across all sessions.
    let engine = load_engine(&config)?;
    info!("Speech engine ready: {}", engine.name());

    let store = Arc::new(MemorySessionStore::new());
    let state = AppState::new(store, engine, Arc::clone(&config));

    let addr = format!("{}:{}", config.service.http.bind, config.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, create_router(state)).await?;

    Ok(())
}

#[cfg(feature = "vosk")]
fn load_engine(config: &Config) -> Result<Arc<dyn SpeechEngine>> {
    use vox_relay::recognizer::VoskEngine;
    Ok(Arc::new(VoskEngine::load(&config.recognizer)?))
}

#[cfg(not(feature = "vosk"))]
fn load_engine(_config: &Config) -> Result<Arc<dyn SpeechEngine>> {
    anyhow::bail!("Built without a speech engine; rebuild with --features vosk")
}
