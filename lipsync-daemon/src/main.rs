//! lipsync daemon: HTTP front-end over the same generation pipeline as the CLI.

use lipsync_core::{AppConfig, Generator, DEFAULT_CONFIG_FILE};
use lipsync_daemon::{build_app, AppState};
use log::{info, warn};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_builder()
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let port = std::env::var("LIPSYNC_PORT").unwrap_or_else(|_| "7860".to_string());
    let config_path = std::env::var("LIPSYNC_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    let config = AppConfig::load_or_default(&PathBuf::from(&config_path))?;
    let hparams = config.hparams();
    let generator = Generator::new(config);
    let problems = generator.preflight();
    if !problems.is_empty() {
        warn!("{} setup problem(s); generations may fail", problems.len());
    }

    let app = build_app(AppState::new(generator, hparams));
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("lipsync daemon listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
