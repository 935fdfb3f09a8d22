use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::SessionError,
    models::night::{NightAction, NightActionKind},
    services::game_service,
    state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRequest {
    pub player_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub voter_id: String,
    pub target_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NightActionRequest {
    pub player_id: String,
    pub target_id: String,
    pub action_type: NightActionKind,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .nest(
            "/:sessionid",
            Router::new()
                .route("/start", post(start_game))
                .route("/votes", get(get_votes))
                .nest(
                    "/actions",
                    Router::new()
                        .route("/vote", post(cast_vote))
                        .route("/night-action", post(submit_night_action)),
                )
                // Host-only: end the current window early.
                .route("/phase/next", post(advance_phase)),
        )
        .with_state(state)
}

async fn start_game(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<PlayerRequest>,
) -> Result<impl IntoResponse, SessionError> {
    game_service::start_game(&state, &session_id, &request.player_id).await?;
    let view = game_service::get_public_view(&state, &session_id).await?;
    Ok((StatusCode::OK, Json(view)))
}

async fn cast_vote(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<VoteRequest>,
) -> Result<impl IntoResponse, SessionError> {
    game_service::cast_vote(&state, &session_id, &request.voter_id, &request.target_id).await?;
    let votes = game_service::get_votes(&state, &session_id).await?;
    Ok((StatusCode::OK, Json(votes)))
}

async fn submit_night_action(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<NightActionRequest>,
) -> Result<impl IntoResponse, SessionError> {
    let action = NightAction::new(request.action_type, request.target_id);
    game_service::submit_night_action(&state, &session_id, &request.player_id, action).await?;
    Ok((StatusCode::OK, Json("Night action recorded")))
}

async fn advance_phase(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<PlayerRequest>,
) -> Result<impl IntoResponse, SessionError> {
    let view = game_service::advance_phase(&state, &session_id, &request.player_id).await?;
    Ok((StatusCode::OK, Json(view)))
}

async fn get_votes(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, SessionError> {
    let votes = game_service::get_votes(&state, &session_id).await?;
    Ok((StatusCode::OK, Json(votes)))
}
