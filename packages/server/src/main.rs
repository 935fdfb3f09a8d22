use std::net::SocketAddr;

use dotenvy::dotenv;
use env_logger::Builder;
use log::{info, LevelFilter};

use demons_server::{app, models::config::GameConfig, services::game_service, state::AppState};

fn init_logger() {
    let mut builder = Builder::new();
    builder
        .filter_level(LevelFilter::Info)
        .filter_module("tower_http", LevelFilter::Debug)
        .format_timestamp(Some(env_logger::TimestampPrecision::Millis))
        .format_target(true);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = dotenv() {
        eprintln!("Warning: failed to load .env file: {}", e);
    }

    init_logger();

    let config = GameConfig::from_env();
    let state = AppState::new(config);
    let _sweeper = game_service::spawn_session_sweeper(state.clone());

    let app = app::create_app(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await
}
