pub mod game_service;
pub mod phase_scheduler;
pub mod session_registry;
