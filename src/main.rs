use anyhow::Result;
use clap::Parser;
use meeting_relay::{create_router, AppState, Config, HelperJoiner};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "meeting-relay", about = "Relays meeting audio to a broker in ordered chunks")]
struct Args {
    /// Config file stem, e.g. "config/meeting-relay"
    #[arg(long, default_value = "config/meeting-relay")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meeting_relay=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} starting", cfg.service.name);
    info!(
        "Broker: {} (subject prefix {})",
        cfg.broker.url, cfg.broker.subject_prefix
    );
    info!(
        "Capture: {} ({} {})",
        cfg.capture.ffmpeg_path, cfg.capture.input_format, cfg.capture.input_source
    );

    let bind = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let joiner = Arc::new(HelperJoiner::new(cfg.join.clone()));
    let state = AppState::new(cfg, joiner);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("HTTP server listening on {}", bind);
    axum::serve(listener, app).await?;

    Ok(())
}
