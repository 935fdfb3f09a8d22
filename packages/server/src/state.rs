use std::{collections::HashMap, sync::Arc};

use log::{debug, warn};
use tokio::sync::{mpsc, Mutex};

use crate::models::config::GameConfig;
use crate::models::event::ServerEvent;
use crate::services::phase_scheduler::PhaseScheduler;
use crate::services::session_registry::SessionRegistry;

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionRegistry,
    pub hub: Hub,
    pub scheduler: PhaseScheduler,
    pub config: Arc<GameConfig>,
}

impl AppState {
    pub fn new(config: GameConfig) -> Self {
        AppState {
            sessions: SessionRegistry::new(),
            hub: Hub::new(),
            scheduler: PhaseScheduler::new(),
            config: Arc::new(config),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(GameConfig::default())
    }
}

/// Outbound channel per connected client, keyed by connection id (which is
/// also the player id of anyone joining over that connection).
#[derive(Clone, Default)]
pub struct Hub {
    connections: Arc<Mutex<HashMap<String, EventSender>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, connection_id: &str) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections
            .lock()
            .await
            .insert(connection_id.to_string(), tx);
        rx
    }

    pub async fn unregister(&self, connection_id: &str) {
        self.connections.lock().await.remove(connection_id);
    }

    /// Private delivery. Players without a live connection (HTTP clients)
    /// are skipped.
    pub async fn send_to(&self, connection_id: &str, event: ServerEvent) {
        let connections = self.connections.lock().await;
        match connections.get(connection_id) {
            Some(tx) => {
                deliver(connection_id, tx, event);
            }
            None => debug!("No connection for {}, dropping event", connection_id),
        }
    }

    /// Delivers one event to every listed member of a session. Returns how
    /// many connections accepted it.
    pub async fn send_to_all(&self, connection_ids: &[String], event: ServerEvent) -> usize {
        let connections = self.connections.lock().await;
        connection_ids
            .iter()
            .filter_map(|id| connections.get(id).map(|tx| (id, tx)))
            .filter(|(id, tx)| deliver(id, tx, event.clone()))
            .count()
    }

    /// Delivers to every connected client regardless of session.
    pub async fn broadcast(&self, event: ServerEvent) -> usize {
        let connections = self.connections.lock().await;
        connections
            .iter()
            .filter(|(id, tx)| deliver(id, tx, event.clone()))
            .count()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }
}

fn deliver(connection_id: &str, tx: &EventSender, event: ServerEvent) -> bool {
    if tx.send(event).is_err() {
        warn!("Connection {} is gone, dropping event", connection_id);
        return false;
    }
    true
}
