use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use log::debug;
use tokio::{sync::Mutex, task::JoinHandle};

use crate::models::game::PhaseStep;
use crate::services::game_service;
use crate::state::AppState;

/// Owns at most one running timer per session. Each timer is a driver task
/// that sleeps through a window, runs the next step and loops until the game
/// stops producing steps.
#[derive(Clone, Default)]
pub struct PhaseScheduler {
    drivers: Arc<Mutex<HashMap<String, Driver>>>,
    generation: Arc<AtomicU64>,
}

struct Driver {
    generation: u64,
    handle: JoinHandle<()>,
}

impl PhaseScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `step` after `delay`, replacing whatever timer the session had.
    pub async fn schedule(&self, state: AppState, session_id: &str, step: PhaseStep, delay: Duration) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let mut drivers = self.drivers.lock().await;

        if let Some(previous) = drivers.remove(session_id) {
            previous.handle.abort();
        }

        let scheduler = self.clone();
        let owned_id = session_id.to_string();
        let handle = tokio::spawn(async move {
            drive(&state, &owned_id, step, delay).await;
            scheduler.release(&owned_id, generation).await;
        });

        drivers.insert(session_id.to_string(), Driver { generation, handle });
        debug!("Scheduled {:?} for session {} in {:?}", step, session_id, delay);
    }

    pub async fn cancel(&self, session_id: &str) {
        if let Some(driver) = self.drivers.lock().await.remove(session_id) {
            driver.handle.abort();
            debug!("Cancelled timer for session {}", session_id);
        }
    }

    pub async fn is_scheduled(&self, session_id: &str) -> bool {
        self.drivers.lock().await.contains_key(session_id)
    }

    pub async fn active_count(&self) -> usize {
        self.drivers.lock().await.len()
    }

    /// Forgets a driver that finished on its own, unless it was replaced.
    async fn release(&self, session_id: &str, generation: u64) {
        let mut drivers = self.drivers.lock().await;
        if drivers
            .get(session_id)
            .is_some_and(|d| d.generation == generation)
        {
            drivers.remove(session_id);
        }
    }
}

async fn drive(state: &AppState, session_id: &str, mut step: PhaseStep, mut delay: Duration) {
    loop {
        tokio::time::sleep(delay).await;
        match game_service::run_step(state, session_id, step).await {
            Some(next) => {
                step = next;
                delay = state.config.phases.delay_before(next);
            }
            None => break,
        }
    }
}
