use axum::{routing::get, Router};

use crate::{state::AppState, utils::websocket};

mod game;
mod session;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .nest("/api/sessions", session::lobby_routes(state.clone()))
        .nest("/api/session", session::routes(state.clone()))
        .nest("/api/game", game::routes(state.clone()))
        // websocat ws://localhost:3001/ws
        .route("/ws", get(websocket::handler).with_state(state))
}
