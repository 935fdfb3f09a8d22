use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Coarse classification used by the transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    Conflict,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Game session not found")]
    SessionNotFound,
    #[error("Player not found in session")]
    PlayerNotFound,
    #[error("Not authorized to start game")]
    NotHost,
    #[error("Your role cannot perform this action")]
    RoleCannotAct,
    #[error("Game has already started")]
    GameAlreadyStarted,
    #[error("Game is full")]
    SessionFull,
    #[error("Player has already joined this session")]
    AlreadyJoined,
    #[error("Cannot start a game with {0} players")]
    UnsupportedPlayerCount(usize),
    #[error("Game is not in progress")]
    NotPlaying,
    #[error("This action is not allowed during the current phase")]
    WrongPhase,
    #[error("Dead players cannot act")]
    PlayerDead,
    #[error("Target is not a living player in this session")]
    InvalidTarget,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::SessionNotFound | SessionError::PlayerNotFound => ErrorKind::NotFound,
            SessionError::NotHost | SessionError::RoleCannotAct => ErrorKind::Unauthorized,
            SessionError::GameAlreadyStarted
            | SessionError::SessionFull
            | SessionError::AlreadyJoined
            | SessionError::UnsupportedPlayerCount(_)
            | SessionError::NotPlaying
            | SessionError::WrongPhase
            | SessionError::PlayerDead
            | SessionError::InvalidTarget => ErrorKind::Conflict,
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
        };

        let body = Json(serde_json::json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
