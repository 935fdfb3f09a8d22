use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::chat::ChatMessage;
use super::game::{GamePhase, LobbySummary, PublicGameView};
use super::night::{InvestigationResult, NightAction, NightActionKind};
use super::player::Player;

/// Frames a client may send over the socket:
/// `{"event": "join-session", "data": {...}}`. The acting player is always
/// the sending connection; ids such as `voterId` in a payload are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    CreateSession(String),
    JoinSession(JoinSession),
    StartGame(String),
    Vote(CastVote),
    NightAction(SubmitNightAction),
    ChatMessage(SendChat),
    GetSessions,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSession {
    pub session_id: String,
    pub player_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVote {
    pub session_id: String,
    pub target_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitNightAction {
    pub session_id: String,
    pub target_id: String,
    pub action_type: NightActionKind,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendChat {
    pub session_id: String,
    pub message: String,
}

impl SubmitNightAction {
    pub fn to_action(&self) -> NightAction {
        NightAction::new(self.action_type, self.target_id.clone())
    }
}

/// Frames the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    SessionCreated(SessionMembership),
    SessionJoined(SessionMembership),
    /// Private: carries the recipient's true role.
    YourRole(SessionMembership),
    /// Private: sent to a player killed during the night.
    PlayerStatus(SessionMembership),
    /// Private: sent to the Inspector.
    InvestigationResult(InvestigationResult),
    GameStateUpdate(PublicGameView),
    PhaseChange(PhaseChange),
    VoteUpdate(BTreeMap<String, String>),
    ChatMessage(ChatMessage),
    SessionsList(Vec<LobbySummary>),
    Error(ErrorMessage),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMembership {
    pub session_id: String,
    pub player: Player,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseChange {
    pub phase: GamePhase,
    /// Seconds until the window closes.
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorMessage {
            message: message.into(),
        })
    }
}
