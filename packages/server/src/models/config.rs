use std::env;
use std::time::Duration;

use super::game::{GamePhase, PhaseStep};

#[derive(Debug, Clone)]
pub struct GameConfig {
    pub port: u16,
    // Frontend origin allowed by CORS.
    pub client_origin: String,
    pub max_players: usize,
    pub phases: PhaseDurations,
    // Sessions older than this are swept.
    pub session_max_age: Duration,
    pub sweep_interval: Duration,
}

/// Length of each timed window, plus the pause between night resolution and
/// the next day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseDurations {
    pub day: Duration,
    pub demons: Duration,
    pub inspector: Duration,
    pub doctor: Duration,
    pub resolution: Duration,
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            day: Duration::from_secs(5),
            demons: Duration::from_secs(5),
            inspector: Duration::from_secs(5),
            doctor: Duration::from_secs(5),
            resolution: Duration::from_secs(5),
        }
    }
}

impl PhaseDurations {
    pub fn uniform(duration: Duration) -> Self {
        Self {
            day: duration,
            demons: duration,
            inspector: duration,
            doctor: duration,
            resolution: duration,
        }
    }

    pub fn of(&self, phase: GamePhase) -> Duration {
        match phase {
            GamePhase::Day => self.day,
            GamePhase::Demons => self.demons,
            GamePhase::Inspector => self.inspector,
            GamePhase::Doctor => self.doctor,
        }
    }

    /// How long the scheduler waits before running `step`: the length of the
    /// window that precedes it.
    pub fn delay_before(&self, step: PhaseStep) -> Duration {
        match step {
            PhaseStep::Enter(GamePhase::Day) => self.resolution,
            PhaseStep::Enter(GamePhase::Demons) => self.day,
            PhaseStep::Enter(GamePhase::Inspector) => self.demons,
            PhaseStep::Enter(GamePhase::Doctor) => self.inspector,
            PhaseStep::ResolveNight => self.doctor,
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            client_origin: "http://localhost:3000".to_string(),
            max_players: 15,
            phases: PhaseDurations::default(),
            session_max_age: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(5),
        }
    }
}

impl GameConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(defaults.port);
        let client_origin = env::var("CLIENT_ORIGIN").unwrap_or(defaults.client_origin);
        let max_players = env::var("MAX_PLAYERS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.max_players);

        let phases = PhaseDurations {
            day: env_seconds("DAY_PHASE_SECONDS", defaults.phases.day),
            demons: env_seconds("DEMONS_PHASE_SECONDS", defaults.phases.demons),
            inspector: env_seconds("INSPECTOR_PHASE_SECONDS", defaults.phases.inspector),
            doctor: env_seconds("DOCTOR_PHASE_SECONDS", defaults.phases.doctor),
            resolution: env_seconds("RESOLUTION_DELAY_SECONDS", defaults.phases.resolution),
        };

        Self {
            port,
            client_origin,
            max_players,
            phases,
            session_max_age: env_seconds("SESSION_MAX_AGE_SECONDS", defaults.session_max_age),
            sweep_interval: env_seconds(
                "SESSION_SWEEP_INTERVAL_SECONDS",
                defaults.sweep_interval,
            ),
        }
    }
}

fn env_seconds(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
