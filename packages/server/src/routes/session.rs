use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::SessionError, services::game_service, state::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerNameRequest {
    pub player_name: String,
}

pub fn lobby_routes(state: AppState) -> Router {
    Router::new()
        // curl http://localhost:3001/api/sessions
        .route("/", get(list_sessions))
        .with_state(state)
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        // curl -X POST http://localhost:3001/api/session/create \
        //   -H 'Content-Type: application/json' -d '{"playerName":"Alice"}'
        .route("/create", post(create_session))
        // curl http://localhost:3001/api/session/{sessionid}
        .route("/:sessionid", get(get_session))
        // curl -X POST http://localhost:3001/api/session/{sessionid}/join \
        //   -H 'Content-Type: application/json' -d '{"playerName":"Bob"}'
        .route("/:sessionid/join", post(join_session))
        // curl -X POST http://localhost:3001/api/session/{sessionid}/leave/{playerid}
        .route("/:sessionid/leave/:playerid", post(leave_session))
        .with_state(state)
}

async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = game_service::list_sessions(&state).await;
    (StatusCode::OK, Json(sessions))
}

/// HTTP clients have no socket id, so they get a fresh player id.
async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<PlayerNameRequest>,
) -> impl IntoResponse {
    let player_id = Uuid::new_v4().to_string();
    let membership = game_service::create_session(&state, &player_id, request.player_name).await;
    (StatusCode::OK, Json(membership))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, SessionError> {
    let view = game_service::get_public_view(&state, &session_id).await?;
    Ok((StatusCode::OK, Json(view)))
}

async fn join_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<PlayerNameRequest>,
) -> Result<impl IntoResponse, SessionError> {
    let player_id = Uuid::new_v4().to_string();
    let membership =
        game_service::join_session(&state, &session_id, &player_id, request.player_name).await?;
    Ok((StatusCode::OK, Json(membership)))
}

async fn leave_session(
    State(state): State<AppState>,
    Path((session_id, player_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, SessionError> {
    game_service::leave_session(&state, &session_id, &player_id).await?;
    Ok((StatusCode::OK, Json("Successfully left session")))
}
