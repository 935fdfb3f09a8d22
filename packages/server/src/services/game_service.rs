use std::{collections::BTreeMap, time::Duration};

use log::{debug, info, warn};
use tokio::task::JoinHandle;

use crate::{
    error::SessionError,
    models::{
        chat::ChatMessage,
        event::{ClientEvent, PhaseChange, ServerEvent, SessionMembership},
        game::{GameSession, LobbySummary, PhaseStep, PublicGameView, StepOutcome},
        night::NightAction,
        player::Player,
    },
    services::session_registry::Departure,
    state::AppState,
};

/// What a phase step changed, captured under the registry lock so delivery
/// can happen after it is released.
struct StepReport {
    session_id: String,
    outcome: StepOutcome,
    recipients: Vec<String>,
    view: PublicGameView,
    killed: Option<Player>,
}

impl StepReport {
    fn capture(session: &GameSession, outcome: StepOutcome) -> Self {
        let killed = outcome
            .night
            .as_ref()
            .and_then(|night| night.killed.as_deref())
            .and_then(|id| session.player(id))
            .cloned();

        StepReport {
            session_id: session.session_id.clone(),
            outcome,
            recipients: session.player_ids(),
            view: session.public_view(),
            killed,
        }
    }
}

pub async fn create_session(
    state: &AppState,
    player_id: &str,
    player_name: String,
) -> SessionMembership {
    let session = state
        .sessions
        .create(Player::host(player_id.to_string(), player_name))
        .await;

    let membership = SessionMembership {
        session_id: session.session_id.clone(),
        player: session.players[0].clone(),
    };

    state
        .hub
        .send_to(player_id, ServerEvent::SessionCreated(membership.clone()))
        .await;
    state
        .hub
        .send_to_all(
            &session.player_ids(),
            ServerEvent::GameStateUpdate(session.public_view()),
        )
        .await;
    broadcast_lobbies(state).await;

    membership
}

pub async fn join_session(
    state: &AppState,
    session_id: &str,
    player_id: &str,
    player_name: String,
) -> Result<SessionMembership, SessionError> {
    let max_players = state.config.max_players;
    let (player, recipients, view) = state
        .sessions
        .update(session_id, |session| {
            let player = session.add_player(
                Player::new(player_id.to_string(), player_name),
                max_players,
            )?;
            Ok((player, session.player_ids(), session.public_view()))
        })
        .await?;

    let membership = SessionMembership {
        session_id: session_id.to_string(),
        player,
    };
    state
        .hub
        .send_to(player_id, ServerEvent::SessionJoined(membership.clone()))
        .await;
    state
        .hub
        .send_to_all(&recipients, ServerEvent::GameStateUpdate(view))
        .await;
    broadcast_lobbies(state).await;

    Ok(membership)
}

pub async fn start_game(
    state: &AppState,
    session_id: &str,
    requester_id: &str,
) -> Result<(), SessionError> {
    let (report, players) = state
        .sessions
        .update(session_id, |session| {
            let outcome = session.start(requester_id, &mut rand::thread_rng())?;
            Ok((StepReport::capture(session, outcome), session.players.clone()))
        })
        .await?;

    for player in players {
        let player_id = player.id.clone();
        state
            .hub
            .send_to(
                &player_id,
                ServerEvent::YourRole(SessionMembership {
                    session_id: session_id.to_string(),
                    player,
                }),
            )
            .await;
    }

    deliver_step(state, &report).await;
    schedule_next(state, session_id, report.outcome.next).await;
    broadcast_lobbies(state).await;

    info!("Game started in session: {}", session_id);
    Ok(())
}

/// Runs one scheduled step and notifies the session. Returns the step that
/// should follow, or `None` once the game (or the session) is gone.
pub async fn run_step(state: &AppState, session_id: &str, step: PhaseStep) -> Option<PhaseStep> {
    let report = match state
        .sessions
        .update(session_id, |session| {
            let outcome = session.apply_pending(step);
            Ok(StepReport::capture(session, outcome))
        })
        .await
    {
        Ok(report) => report,
        Err(e) => {
            debug!("Dropping {:?} for session {}: {}", step, session_id, e);
            return None;
        }
    };

    deliver_step(state, &report).await;
    report.outcome.next
}

async fn deliver_step(state: &AppState, report: &StepReport) {
    let outcome = &report.outcome;
    if !outcome.applied {
        return;
    }

    if let Some(night) = &outcome.night {
        if let Some(victim) = &report.killed {
            state
                .hub
                .send_to(
                    &victim.id,
                    ServerEvent::PlayerStatus(SessionMembership {
                        session_id: report.session_id.clone(),
                        player: victim.clone(),
                    }),
                )
                .await;
        }
        if let Some(result) = &night.investigation {
            state
                .hub
                .send_to(
                    &result.inspector_id,
                    ServerEvent::InvestigationResult(result.clone()),
                )
                .await;
        }
    }

    if let Some(phase) = outcome.entered {
        state
            .hub
            .send_to_all(
                &report.recipients,
                ServerEvent::PhaseChange(PhaseChange {
                    phase,
                    duration: state.config.phases.of(phase).as_secs(),
                }),
            )
            .await;
    }

    state
        .hub
        .send_to_all(
            &report.recipients,
            ServerEvent::GameStateUpdate(report.view.clone()),
        )
        .await;
}

async fn schedule_next(state: &AppState, session_id: &str, next: Option<PhaseStep>) {
    match next {
        Some(step) => {
            let delay = state.config.phases.delay_before(step);
            state
                .scheduler
                .schedule(state.clone(), session_id, step, delay)
                .await;
        }
        None => state.scheduler.cancel(session_id).await,
    }
}

/// Host-only: closes the current window now instead of waiting for its timer.
/// The pending step is taken and applied under one lock, so a timer firing
/// at the same moment finds a newer step pending and backs off.
pub async fn advance_phase(
    state: &AppState,
    session_id: &str,
    requester_id: &str,
) -> Result<PublicGameView, SessionError> {
    let report = state
        .sessions
        .update(session_id, |session| {
            if session.host_id != requester_id {
                return Err(SessionError::NotHost);
            }
            let outcome = session.force_pending()?;
            Ok(StepReport::capture(session, outcome))
        })
        .await?;

    // Replaces (or cancels) the timer of the window that was just closed.
    schedule_next(state, session_id, report.outcome.next).await;
    deliver_step(state, &report).await;

    Ok(report.view)
}

pub async fn cast_vote(
    state: &AppState,
    session_id: &str,
    voter_id: &str,
    target_id: &str,
) -> Result<(), SessionError> {
    let (votes, recipients) = state
        .sessions
        .update(session_id, |session| {
            session.record_vote(voter_id, target_id)?;
            Ok((session.votes.clone(), session.player_ids()))
        })
        .await?;

    debug!("Vote in session {} from {} to {}", session_id, voter_id, target_id);
    state
        .hub
        .send_to_all(&recipients, ServerEvent::VoteUpdate(votes))
        .await;
    Ok(())
}

pub async fn submit_night_action(
    state: &AppState,
    session_id: &str,
    player_id: &str,
    action: NightAction,
) -> Result<(), SessionError> {
    state
        .sessions
        .update(session_id, |session| {
            session.record_night_action(player_id, action)
        })
        .await
}

pub async fn post_chat(
    state: &AppState,
    session_id: &str,
    player_id: &str,
    message: String,
) -> Result<ChatMessage, SessionError> {
    let (chat_message, recipients) = state
        .sessions
        .update(session_id, |session| {
            let chat_message = session.add_chat_message(player_id, message)?;
            Ok((chat_message, session.player_ids()))
        })
        .await?;

    state
        .hub
        .send_to_all(&recipients, ServerEvent::ChatMessage(chat_message.clone()))
        .await;
    Ok(chat_message)
}

pub async fn get_public_view(
    state: &AppState,
    session_id: &str,
) -> Result<PublicGameView, SessionError> {
    state
        .sessions
        .get(session_id)
        .await
        .map(|session| session.public_view())
        .ok_or(SessionError::SessionNotFound)
}

pub async fn get_votes(
    state: &AppState,
    session_id: &str,
) -> Result<BTreeMap<String, String>, SessionError> {
    state
        .sessions
        .get(session_id)
        .await
        .map(|session| session.votes)
        .ok_or(SessionError::SessionNotFound)
}

pub async fn list_sessions(state: &AppState) -> Vec<LobbySummary> {
    state.sessions.list_lobbies().await
}

async fn broadcast_lobbies(state: &AppState) {
    let lobbies = list_sessions(state).await;
    state.hub.broadcast(ServerEvent::SessionsList(lobbies)).await;
}

/// Removes a player from every session they are in.
pub async fn disconnect(state: &AppState, player_id: &str) {
    let departures = state.sessions.remove_player(player_id).await;
    if departures.is_empty() {
        return;
    }
    notify_departures(state, departures).await;
}

pub async fn leave_session(
    state: &AppState,
    session_id: &str,
    player_id: &str,
) -> Result<(), SessionError> {
    let departure = state.sessions.leave(session_id, player_id).await?;
    notify_departures(state, vec![departure]).await;
    Ok(())
}

async fn notify_departures(state: &AppState, departures: Vec<Departure>) {
    for departure in departures {
        match departure.remaining {
            Some(remaining) => {
                state
                    .hub
                    .send_to_all(
                        &remaining.player_ids,
                        ServerEvent::GameStateUpdate(remaining.view),
                    )
                    .await;
            }
            None => state.scheduler.cancel(&departure.session_id).await,
        }
    }
    broadcast_lobbies(state).await;
}

/// Removes expired sessions and stops their timers.
pub async fn sweep_stale_sessions(state: &AppState) -> usize {
    let removed = state
        .sessions
        .sweep_stale(state.config.session_max_age)
        .await;

    for session_id in &removed {
        state.scheduler.cancel(session_id).await;
    }
    if !removed.is_empty() {
        broadcast_lobbies(state).await;
    }
    removed.len()
}

pub fn spawn_session_sweeper(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        // interval() panics on a zero period.
        let period = state.config.sweep_interval.max(Duration::from_secs(1));
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            sweep_stale_sessions(&state).await;
        }
    })
}

/// Dispatches one socket frame. The connection id is the acting player for
/// every event. Failures go back to the sender only.
pub async fn handle_client_event(state: &AppState, connection_id: &str, event: ClientEvent) {
    let result = match event {
        ClientEvent::CreateSession(player_name) => {
            create_session(state, connection_id, player_name).await;
            Ok(())
        }
        ClientEvent::JoinSession(join) => {
            join_session(state, &join.session_id, connection_id, join.player_name)
                .await
                .map(|_| ())
        }
        ClientEvent::StartGame(session_id) => start_game(state, &session_id, connection_id).await,
        ClientEvent::Vote(vote) => {
            cast_vote(state, &vote.session_id, connection_id, &vote.target_id).await
        }
        ClientEvent::NightAction(action) => {
            submit_night_action(state, &action.session_id, connection_id, action.to_action())
                .await
        }
        ClientEvent::ChatMessage(chat) => {
            post_chat(state, &chat.session_id, connection_id, chat.message)
                .await
                .map(|_| ())
        }
        ClientEvent::GetSessions => {
            let lobbies = list_sessions(state).await;
            state
                .hub
                .send_to(connection_id, ServerEvent::SessionsList(lobbies))
                .await;
            Ok(())
        }
    };

    if let Err(e) = result {
        warn!("Rejected event from {}: {}", connection_id, e);
        state
            .hub
            .send_to(connection_id, ServerEvent::error(e.to_string()))
            .await;
    }
}
