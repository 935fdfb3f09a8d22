use std::{collections::HashMap, sync::Arc, time::Duration};

use log::info;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::SessionError;
use crate::models::game::{GameSession, GameState, LobbySummary, PublicGameView};
use crate::models::player::Player;

/// Owns every live session. Cloning shares the same map.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<String, GameSession>>>,
}

/// One session a departing player was removed from.
#[derive(Debug, Clone)]
pub struct Departure {
    pub session_id: String,
    pub player: Player,
    /// `None` when the session was deleted because nobody is left.
    pub remaining: Option<Remaining>,
}

#[derive(Debug, Clone)]
pub struct Remaining {
    pub player_ids: Vec<String>,
    pub view: PublicGameView,
}

impl Departure {
    fn from_session(session: &GameSession, player: Player) -> Self {
        info!("Player {} removed from session: {}", player.name, session.session_id);
        let remaining = (!session.players.is_empty()).then(|| Remaining {
            player_ids: session.player_ids(),
            view: session.public_view(),
        });
        Departure {
            session_id: session.session_id.clone(),
            player,
            remaining,
        }
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new lobby with `host` as its only member.
    pub async fn create(&self, host: Player) -> GameSession {
        let session_id = Uuid::new_v4().to_string();
        let session = GameSession::new(session_id.clone(), host);
        self.sessions
            .lock()
            .await
            .insert(session_id.clone(), session.clone());
        info!("Created session {}", session_id);
        session
    }

    pub async fn get(&self, session_id: &str) -> Option<GameSession> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    /// Runs `f` against the session while holding the registry lock.
    pub async fn update<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut GameSession) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or(SessionError::SessionNotFound)?;
        f(session)
    }

    pub async fn remove(&self, session_id: &str) -> bool {
        self.sessions.lock().await.remove(session_id).is_some()
    }

    pub async fn list_lobbies(&self) -> Vec<LobbySummary> {
        let sessions = self.sessions.lock().await;
        let mut lobbies: Vec<&GameSession> = sessions
            .values()
            .filter(|s| s.game_state == GameState::Lobby)
            .collect();
        lobbies.sort_by_key(|s| s.created_at);
        lobbies.into_iter().map(GameSession::lobby_summary).collect()
    }

    /// Drops sessions older than `max_age` and returns their ids.
    pub async fn sweep_stale(&self, max_age: Duration) -> Vec<String> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;

        let stale: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| now.saturating_duration_since(s.created_at) > max_age)
            .map(|(id, _)| id.clone())
            .collect();

        for session_id in &stale {
            sessions.remove(session_id);
            info!("Removed inactive session: {}", session_id);
        }
        stale
    }

    /// Takes a player out of every roster they are in, deleting sessions
    /// that end up empty.
    pub async fn remove_player(&self, player_id: &str) -> Vec<Departure> {
        let mut sessions = self.sessions.lock().await;
        let mut departures = Vec::new();

        for session in sessions.values_mut() {
            let Some(player) = session.remove_player(player_id) else {
                continue;
            };
            departures.push(Departure::from_session(session, player));
        }

        sessions.retain(|session_id, session| {
            let keep = !session.players.is_empty();
            if !keep {
                info!("Session {} removed (no players)", session_id);
            }
            keep
        });

        departures
    }

    /// Takes a player out of a single session, deleting it if it ends up
    /// empty.
    pub async fn leave(&self, session_id: &str, player_id: &str) -> Result<Departure, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or(SessionError::SessionNotFound)?;
        let player = session
            .remove_player(player_id)
            .ok_or(SessionError::PlayerNotFound)?;

        let departure = Departure::from_session(session, player);
        if departure.remaining.is_none() {
            sessions.remove(session_id);
            info!("Session {} removed (no players)", session_id);
        }
        Ok(departure)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
