use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::time::Instant;

use super::chat::{ChatLog, ChatMessage, PUBLIC_CHAT_HISTORY};
use super::night::{self, NightAction, NightOutcome};
use super::player::{Player, PublicPlayer};
use super::role::{self, Party};
use crate::error::SessionError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameState {
    PreLobby,
    Lobby,
    Playing,
    Ended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    Day,
    Demons,
    Inspector,
    Doctor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Day,
    Night,
}

/// One transition of the day/night cycle, run when the preceding window's
/// timer fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseStep {
    Enter(GamePhase),
    ResolveNight,
}

/// What a single phase step did, so the caller can notify players.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// False when the session was no longer playing and nothing happened.
    pub applied: bool,
    pub entered: Option<GamePhase>,
    /// Player removed by the day vote.
    pub eliminated: Option<String>,
    pub night: Option<NightOutcome>,
    pub winner: Option<Party>,
    pub next: Option<PhaseStep>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicGameView {
    pub session_id: String,
    pub players: Vec<PublicPlayer>,
    pub game_state: GameState,
    pub time_of_day: TimeOfDay,
    pub day_count: u32,
    pub chat_messages: Vec<ChatMessage>,
    pub winning_party: Option<Party>,
    pub game_phase: GamePhase,
    pub player_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbySummary {
    pub session_id: String,
    pub player_count: usize,
    pub host_name: String,
}

#[derive(Clone, Debug)]
pub struct GameSession {
    pub session_id: String,
    pub host_id: String,
    pub players: Vec<Player>,
    pub game_state: GameState,
    pub game_phase: GamePhase,
    pub day_count: u32,
    pub votes: BTreeMap<String, String>,
    pub night_actions: BTreeMap<String, NightAction>,
    pub chat: ChatLog,
    pub winning_party: Option<Party>,
    pub next_step: Option<PhaseStep>,
    pub created_at: Instant,
}

impl GamePhase {
    pub fn time_of_day(self) -> TimeOfDay {
        match self {
            GamePhase::Day => TimeOfDay::Day,
            _ => TimeOfDay::Night,
        }
    }
}

impl PhaseStep {
    pub fn following(self) -> PhaseStep {
        match self {
            PhaseStep::Enter(GamePhase::Day) => PhaseStep::Enter(GamePhase::Demons),
            PhaseStep::Enter(GamePhase::Demons) => PhaseStep::Enter(GamePhase::Inspector),
            PhaseStep::Enter(GamePhase::Inspector) => PhaseStep::Enter(GamePhase::Doctor),
            PhaseStep::Enter(GamePhase::Doctor) => PhaseStep::ResolveNight,
            PhaseStep::ResolveNight => PhaseStep::Enter(GamePhase::Day),
        }
    }
}

/// Target with the strictly highest count. Ties go to the first key in map
/// order, i.e. the lowest player id.
pub(crate) fn strict_leader(tally: &BTreeMap<&str, usize>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for (&target, &count) in tally {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((target, count));
        }
    }
    best.map(|(target, _)| target.to_string())
}

/// Villagers win once no demon is alive; demons win once they are at least as
/// many as everyone else alive.
pub fn evaluate_winner(players: &[Player]) -> Option<Party> {
    let alive_evil = players.iter().filter(|p| p.is_alive && p.is_evil()).count();
    let alive_good = players.iter().filter(|p| p.is_alive && !p.is_evil()).count();

    if alive_evil == 0 {
        Some(Party::Villager)
    } else if alive_evil >= alive_good {
        Some(Party::Demon)
    } else {
        None
    }
}

impl GameSession {
    pub fn new(session_id: String, mut host: Player) -> Self {
        host.is_host = true;
        GameSession {
            session_id,
            host_id: host.id.clone(),
            players: vec![host],
            game_state: GameState::Lobby,
            game_phase: GamePhase::Day,
            day_count: 1,
            votes: BTreeMap::new(),
            night_actions: BTreeMap::new(),
            chat: ChatLog::new(),
            winning_party: None,
            next_step: None,
            created_at: Instant::now(),
        }
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_ids(&self) -> Vec<String> {
        self.players.iter().map(|p| p.id.clone()).collect()
    }

    fn is_living(&self, player_id: &str) -> bool {
        self.player(player_id).is_some_and(|p| p.is_alive)
    }

    fn living_player(&self, player_id: &str) -> Result<&Player, SessionError> {
        let player = self
            .player(player_id)
            .ok_or(SessionError::PlayerNotFound)?;
        if !player.is_alive {
            return Err(SessionError::PlayerDead);
        }
        Ok(player)
    }

    fn ensure_phase(&self, phase: GamePhase) -> Result<(), SessionError> {
        if self.game_state != GameState::Playing {
            return Err(SessionError::NotPlaying);
        }
        if self.game_phase != phase {
            return Err(SessionError::WrongPhase);
        }
        Ok(())
    }

    fn name_of(&self, player_id: &str) -> String {
        self.player(player_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| player_id.to_string())
    }

    pub fn add_player(&mut self, mut player: Player, max_players: usize) -> Result<Player, SessionError> {
        if self.game_state != GameState::Lobby {
            return Err(SessionError::GameAlreadyStarted);
        }
        if self.players.len() >= max_players {
            return Err(SessionError::SessionFull);
        }
        if self.player(&player.id).is_some() {
            return Err(SessionError::AlreadyJoined);
        }

        player.is_host = false;
        self.players.push(player.clone());
        Ok(player)
    }

    /// Drops a player from the roster. If they were host, the earliest
    /// remaining joiner takes over.
    pub fn remove_player(&mut self, player_id: &str) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id == player_id)?;
        let removed = self.players.remove(index);

        if removed.id == self.host_id {
            if let Some(next_host) = self.players.first_mut() {
                next_host.is_host = true;
                self.host_id = next_host.id.clone();
                info!(
                    "Host of session {} passed to {}",
                    self.session_id, next_host.id
                );
            }
        }

        Some(removed)
    }

    /// Host-only. Deals roles, moves to Playing and enters the first day.
    pub fn start<R: Rng + ?Sized>(
        &mut self,
        requester_id: &str,
        rng: &mut R,
    ) -> Result<StepOutcome, SessionError> {
        if requester_id != self.host_id {
            return Err(SessionError::NotHost);
        }
        if self.game_state != GameState::Lobby {
            return Err(SessionError::GameAlreadyStarted);
        }
        if !role::is_supported_player_count(self.players.len()) {
            return Err(SessionError::UnsupportedPlayerCount(self.players.len()));
        }

        role::assign_roles(&mut self.players, rng);
        self.game_state = GameState::Playing;
        self.day_count = 1;
        self.votes.clear();
        self.night_actions.clear();
        self.winning_party = None;
        info!(
            "Game started in session {} with {} players",
            self.session_id,
            self.players.len()
        );

        Ok(self.apply_step(PhaseStep::Enter(GamePhase::Day)))
    }

    pub fn record_vote(&mut self, voter_id: &str, target_id: &str) -> Result<(), SessionError> {
        self.ensure_phase(GamePhase::Day)?;
        self.living_player(voter_id)?;
        if !self.is_living(target_id) {
            return Err(SessionError::InvalidTarget);
        }

        self.votes
            .insert(voter_id.to_string(), target_id.to_string());
        Ok(())
    }

    pub fn record_night_action(
        &mut self,
        player_id: &str,
        action: NightAction,
    ) -> Result<(), SessionError> {
        let kind = action.kind();
        self.ensure_phase(kind.phase())?;

        let actor = self.living_player(player_id)?;
        if !actor.role.is_some_and(|role| kind.allowed_for(role)) {
            return Err(SessionError::RoleCannotAct);
        }
        if !self.is_living(action.target_id()) {
            return Err(SessionError::InvalidTarget);
        }

        self.night_actions.insert(player_id.to_string(), action);
        Ok(())
    }

    pub fn add_chat_message(
        &mut self,
        player_id: &str,
        message: String,
    ) -> Result<ChatMessage, SessionError> {
        let player = self
            .player(player_id)
            .ok_or(SessionError::PlayerNotFound)?;

        let chat_message = ChatMessage::new(player.name.clone(), message);
        self.chat.add_message(chat_message.clone());
        Ok(chat_message)
    }

    /// Tallies the day vote. Votes whose voter or target is no longer a living
    /// roster member are ignored. Votes are always cleared.
    pub fn resolve_votes(&mut self) -> Option<String> {
        let mut tally: BTreeMap<&str, usize> = BTreeMap::new();
        for (voter, target) in &self.votes {
            if self.is_living(voter) && self.is_living(target) {
                *tally.entry(target.as_str()).or_insert(0) += 1;
            }
        }
        let eliminated = strict_leader(&tally);

        self.votes.clear();

        if let Some(player) = eliminated
            .as_deref()
            .and_then(|id| self.players.iter_mut().find(|p| p.id == id))
        {
            player.is_alive = false;
        }
        eliminated
    }

    pub fn resolve_night(&mut self) -> NightOutcome {
        debug!(
            "Resolving {} night actions in session {}",
            self.night_actions.len(),
            self.session_id
        );
        let outcome = night::resolve_night(&mut self.players, &self.night_actions);
        self.night_actions.clear();
        outcome
    }

    /// Applies the win rules. A terminal result ends the game.
    pub fn evaluate_win(&mut self) -> Option<Party> {
        let winner = evaluate_winner(&self.players)?;

        self.game_state = GameState::Ended;
        self.winning_party = Some(winner);
        self.next_step = None;
        self.chat.add_system_message(format!("{} win!", winner));
        info!("Session {} ended: {} win", self.session_id, winner);
        Some(winner)
    }

    /// Runs one transition of the cycle. Does nothing unless the game is in
    /// progress, which makes late timer fires harmless.
    pub fn apply_step(&mut self, step: PhaseStep) -> StepOutcome {
        if self.game_state != GameState::Playing {
            return StepOutcome::default();
        }

        let mut outcome = StepOutcome {
            applied: true,
            ..StepOutcome::default()
        };

        match step {
            PhaseStep::Enter(GamePhase::Day) => {
                self.votes.clear();
                self.game_phase = GamePhase::Day;
                outcome.entered = Some(GamePhase::Day);
            }
            PhaseStep::Enter(GamePhase::Demons) => {
                if let Some(eliminated) = self.resolve_votes() {
                    let name = self.name_of(&eliminated);
                    self.chat
                        .add_system_message(format!("{} was eliminated by the village.", name));
                    outcome.eliminated = Some(eliminated);
                    outcome.winner = self.evaluate_win();
                }
                if outcome.winner.is_none() {
                    self.game_phase = GamePhase::Demons;
                    outcome.entered = Some(GamePhase::Demons);
                }
            }
            PhaseStep::Enter(phase) => {
                self.game_phase = phase;
                outcome.entered = Some(phase);
            }
            PhaseStep::ResolveNight => {
                self.day_count += 1;
                let night = self.resolve_night();
                let announcement = match &night.killed {
                    Some(victim) => format!("{} was killed during the night.", self.name_of(victim)),
                    None => "Nobody died during the night.".to_string(),
                };
                self.chat.add_system_message(announcement);
                outcome.night = Some(night);
                outcome.winner = self.evaluate_win();
            }
        }

        outcome.next = match outcome.winner {
            Some(_) => None,
            None => Some(step.following()),
        };
        self.next_step = outcome.next;
        outcome
    }

    /// Runs `expected` only if it is still the pending step. A timer that
    /// lost the race to a forced advance finds another step pending and
    /// does nothing.
    pub fn apply_pending(&mut self, expected: PhaseStep) -> StepOutcome {
        if self.next_step != Some(expected) {
            debug!(
                "Ignoring stale {:?} in session {} (pending {:?})",
                expected, self.session_id, self.next_step
            );
            return StepOutcome::default();
        }
        self.apply_step(expected)
    }

    /// Runs whatever step is pending right now.
    pub fn force_pending(&mut self) -> Result<StepOutcome, SessionError> {
        if self.game_state != GameState::Playing {
            return Err(SessionError::NotPlaying);
        }
        let step = self.next_step.ok_or(SessionError::NotPlaying)?;
        Ok(self.apply_step(step))
    }

    /// The projection every member may see. Roles never appear here.
    pub fn public_view(&self) -> PublicGameView {
        PublicGameView {
            session_id: self.session_id.clone(),
            players: self
                .players
                .iter()
                .map(|p| p.to_public(&self.host_id))
                .collect(),
            game_state: self.game_state,
            time_of_day: self.game_phase.time_of_day(),
            day_count: self.day_count,
            chat_messages: self.chat.recent(PUBLIC_CHAT_HISTORY).to_vec(),
            winning_party: self.winning_party,
            game_phase: self.game_phase,
            player_count: self.players.len(),
        }
    }

    pub fn lobby_summary(&self) -> LobbySummary {
        LobbySummary {
            session_id: self.session_id.clone(),
            player_count: self.players.len(),
            host_name: self
                .players
                .iter()
                .find(|p| p.is_host)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::night::NightActionKind;
    use crate::models::role::Role;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn session_with(ids: &[&str]) -> GameSession {
        let mut session = GameSession::new(
            "s1".to_string(),
            Player::new(ids[0].to_string(), ids[0].to_uppercase()),
        );
        for id in &ids[1..] {
            session
                .add_player(Player::new(id.to_string(), id.to_uppercase()), 15)
                .unwrap();
        }
        session
    }

    /// A playing session with fixed roles instead of a shuffle.
    fn playing(roles: &[(&str, Role)]) -> GameSession {
        let ids: Vec<&str> = roles.iter().map(|(id, _)| *id).collect();
        let mut session = session_with(&ids);
        for (player, (_, role)) in session.players.iter_mut().zip(roles) {
            player.role = Some(*role);
        }
        session.game_state = GameState::Playing;
        session.game_phase = GamePhase::Day;
        session
    }

    fn alive(session: &GameSession, id: &str) -> bool {
        session.player(id).unwrap().is_alive
    }

    #[test]
    fn test_new_session_has_host() {
        let session = session_with(&["a", "b"]);
        assert_eq!(session.game_state, GameState::Lobby);
        assert_eq!(session.host_id, "a");
        assert!(session.players[0].is_host);
        assert!(!session.players[1].is_host);
        assert_eq!(session.day_count, 1);
    }

    #[test]
    fn test_join_rules() {
        let mut session = session_with(&["a"]);
        assert_eq!(
            session.add_player(Player::new("a".to_string(), "Again".to_string()), 15),
            Err(SessionError::AlreadyJoined)
        );
        assert_eq!(
            session.add_player(Player::new("b".to_string(), "B".to_string()), 1),
            Err(SessionError::SessionFull)
        );

        session.game_state = GameState::Playing;
        assert_eq!(
            session.add_player(Player::new("c".to_string(), "C".to_string()), 15),
            Err(SessionError::GameAlreadyStarted)
        );
    }

    #[test]
    fn test_host_reassigned_to_earliest_joiner() {
        let mut session = session_with(&["a", "b", "c"]);
        session.remove_player("a");

        assert_eq!(session.host_id, "b");
        assert!(session.players[0].is_host);
        assert_eq!(session.players.len(), 2);
        assert_eq!(session.lobby_summary().host_name, "B");
    }

    #[test]
    fn test_non_host_leaving_keeps_host() {
        let mut session = session_with(&["a", "b", "c"]);
        assert!(session.remove_player("b").is_some());
        assert!(session.remove_player("b").is_none());
        assert_eq!(session.host_id, "a");
    }

    #[test]
    fn test_start_requires_host_and_supported_size() {
        let mut rng = StdRng::seed_from_u64(1);

        let mut session = session_with(&["a", "b"]);
        assert_eq!(session.start("b", &mut rng), Err(SessionError::NotHost));

        let mut session = session_with(&["a", "b", "c"]);
        assert_eq!(
            session.start("a", &mut rng),
            Err(SessionError::UnsupportedPlayerCount(3))
        );
        assert_eq!(session.game_state, GameState::Lobby);
    }

    #[test]
    fn test_start_deals_roles_and_enters_day() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut session = session_with(&["a", "b", "c", "d", "e"]);

        let outcome = session.start("a", &mut rng).unwrap();

        assert_eq!(session.game_state, GameState::Playing);
        assert_eq!(session.game_phase, GamePhase::Day);
        assert_eq!(outcome.entered, Some(GamePhase::Day));
        assert_eq!(outcome.next, Some(PhaseStep::Enter(GamePhase::Demons)));
        assert!(session.players.iter().all(|p| p.role.is_some() && p.is_alive));
        assert_eq!(
            session.start("a", &mut rng),
            Err(SessionError::GameAlreadyStarted)
        );
    }

    #[test]
    fn test_majority_vote_eliminates() {
        let mut session = playing(&[
            ("a", Role::Villager),
            ("b", Role::Villager),
            ("c", Role::Demon),
            ("t", Role::Villager),
            ("u", Role::Doctor),
        ]);
        session.record_vote("a", "t").unwrap();
        session.record_vote("b", "t").unwrap();
        session.record_vote("c", "u").unwrap();

        assert_eq!(session.resolve_votes().as_deref(), Some("t"));
        assert!(!alive(&session, "t"));
        assert!(alive(&session, "u"));
        assert!(session.votes.is_empty());
    }

    #[test]
    fn test_no_votes_eliminates_nobody() {
        let mut session = playing(&[("a", Role::Villager), ("b", Role::Demon)]);
        assert_eq!(session.resolve_votes(), None);
        assert!(session.players.iter().all(|p| p.is_alive));
    }

    #[test]
    fn test_vote_tie_goes_to_lowest_id() {
        let mut session = playing(&[
            ("a", Role::Villager),
            ("b", Role::Villager),
            ("x", Role::Demon),
            ("y", Role::Villager),
        ]);
        session.record_vote("a", "y").unwrap();
        session.record_vote("b", "x").unwrap();

        assert_eq!(session.resolve_votes().as_deref(), Some("x"));
    }

    #[test]
    fn test_revote_overwrites() {
        let mut session = playing(&[
            ("a", Role::Villager),
            ("b", Role::Villager),
            ("c", Role::Demon),
        ]);
        session.record_vote("a", "b").unwrap();
        session.record_vote("a", "c").unwrap();

        assert_eq!(session.votes.len(), 1);
        assert_eq!(session.votes["a"], "c");
    }

    #[test]
    fn test_votes_from_departed_players_are_ignored() {
        let mut session = playing(&[
            ("a", Role::Villager),
            ("b", Role::Villager),
            ("c", Role::Demon),
            ("d", Role::Villager),
        ]);
        session.record_vote("a", "d").unwrap();
        session.record_vote("b", "d").unwrap();
        session.record_vote("c", "b").unwrap();
        session.remove_player("a");
        session.remove_player("b");

        assert_eq!(session.resolve_votes(), None);
        assert!(alive(&session, "d"));
    }

    #[test]
    fn test_vote_validation() {
        let mut session = playing(&[("a", Role::Villager), ("b", Role::Demon)]);
        assert_eq!(
            session.record_vote("ghost", "a"),
            Err(SessionError::PlayerNotFound)
        );
        assert_eq!(
            session.record_vote("a", "ghost"),
            Err(SessionError::InvalidTarget)
        );

        session.game_phase = GamePhase::Demons;
        assert_eq!(session.record_vote("a", "b"), Err(SessionError::WrongPhase));

        session.game_state = GameState::Lobby;
        assert_eq!(session.record_vote("a", "b"), Err(SessionError::NotPlaying));
    }

    #[test]
    fn test_night_action_validation() {
        let mut session = playing(&[
            ("d", Role::Demon),
            ("doc", Role::Doctor),
            ("v", Role::Villager),
        ]);
        let kill = NightAction::new(NightActionKind::Kill, "v".to_string());

        assert_eq!(
            session.record_night_action("d", kill.clone()),
            Err(SessionError::WrongPhase)
        );

        session.game_phase = GamePhase::Demons;
        assert_eq!(
            session.record_night_action("doc", kill.clone()),
            Err(SessionError::RoleCannotAct)
        );
        assert_eq!(session.record_night_action("d", kill), Ok(()));

        session.game_phase = GamePhase::Doctor;
        session.players[0].is_alive = false;
        assert_eq!(
            session.record_night_action(
                "doc",
                NightAction::new(NightActionKind::Save, "d".to_string())
            ),
            Err(SessionError::InvalidTarget)
        );
    }

    #[test]
    fn test_win_evaluation() {
        let roster = |roles: &[(Role, bool)]| -> Vec<Player> {
            roles
                .iter()
                .enumerate()
                .map(|(i, (role, is_alive))| {
                    let mut p = Player::new(i.to_string(), i.to_string());
                    p.role = Some(*role);
                    p.is_alive = *is_alive;
                    p
                })
                .collect()
        };

        assert_eq!(
            evaluate_winner(&roster(&[(Role::Demon, true), (Role::Villager, true)])),
            Some(Party::Demon)
        );
        assert_eq!(
            evaluate_winner(&roster(&[(Role::Demon, false), (Role::Villager, true)])),
            Some(Party::Villager)
        );
        assert_eq!(
            evaluate_winner(&roster(&[
                (Role::Demon, true),
                (Role::DemonLeader, true),
                (Role::Villager, true),
                (Role::Doctor, true),
                (Role::Inspector, true),
            ])),
            None
        );
    }

    #[test]
    fn test_evaluate_win_ends_game() {
        let mut session = playing(&[("a", Role::Villager), ("b", Role::Demon)]);
        session.players[1].is_alive = false;

        assert_eq!(session.evaluate_win(), Some(Party::Villager));
        assert_eq!(session.game_state, GameState::Ended);
        assert_eq!(session.winning_party, Some(Party::Villager));
    }

    #[test]
    fn test_full_cycle_increments_day_count() {
        let mut session = playing(&[
            ("a", Role::Villager),
            ("b", Role::Villager),
            ("c", Role::Villager),
            ("d", Role::Demon),
            ("e", Role::Doctor),
        ]);

        let mut step = PhaseStep::Enter(GamePhase::Day);
        let mut seen = Vec::new();
        for _ in 0..6 {
            let outcome = session.apply_step(step);
            assert!(outcome.applied);
            seen.push(session.game_phase);
            step = outcome.next.unwrap();
        }

        assert_eq!(
            seen,
            vec![
                GamePhase::Day,
                GamePhase::Demons,
                GamePhase::Inspector,
                GamePhase::Doctor,
                GamePhase::Doctor,
                GamePhase::Day,
            ]
        );
        assert_eq!(session.day_count, 2);
        assert_eq!(session.game_state, GameState::Playing);
    }

    #[test]
    fn test_day_elimination_of_last_demon_ends_game() {
        let mut session = playing(&[
            ("a", Role::Villager),
            ("b", Role::Villager),
            ("d", Role::Demon),
        ]);
        session.record_vote("a", "d").unwrap();
        session.record_vote("b", "d").unwrap();

        let outcome = session.apply_step(PhaseStep::Enter(GamePhase::Demons));

        assert_eq!(outcome.eliminated.as_deref(), Some("d"));
        assert_eq!(outcome.winner, Some(Party::Villager));
        assert_eq!(outcome.entered, None);
        assert_eq!(outcome.next, None);
        assert_eq!(session.game_phase, GamePhase::Day);
        assert_eq!(session.game_state, GameState::Ended);
    }

    #[test]
    fn test_night_kill_can_end_game() {
        let mut session = playing(&[("v", Role::Villager), ("d", Role::Demon)]);
        session.game_phase = GamePhase::Demons;
        session
            .record_night_action("d", NightAction::new(NightActionKind::Kill, "v".to_string()))
            .unwrap();

        let outcome = session.apply_step(PhaseStep::ResolveNight);

        assert_eq!(outcome.night.unwrap().killed.as_deref(), Some("v"));
        assert_eq!(outcome.winner, Some(Party::Demon));
        assert!(session.night_actions.is_empty());
        assert_eq!(session.next_step, None);
    }

    #[test]
    fn test_steps_after_game_end_do_nothing() {
        let mut session = playing(&[("v", Role::Villager), ("d", Role::Demon)]);
        session.game_state = GameState::Ended;

        let outcome = session.apply_step(PhaseStep::Enter(GamePhase::Doctor));
        assert!(!outcome.applied);
        assert_eq!(session.game_phase, GamePhase::Day);
    }

    #[test]
    fn test_stale_step_is_ignored() {
        let mut session = playing(&[
            ("a", Role::Villager),
            ("b", Role::Villager),
            ("c", Role::Villager),
            ("d", Role::Demon),
        ]);
        session.apply_step(PhaseStep::Enter(GamePhase::Day));
        assert_eq!(session.next_step, Some(PhaseStep::Enter(GamePhase::Demons)));

        let outcome = session.force_pending().unwrap();
        assert_eq!(outcome.entered, Some(GamePhase::Demons));

        // The timer for the window that was just closed fires late.
        let late = session.apply_pending(PhaseStep::Enter(GamePhase::Demons));
        assert!(!late.applied);
        assert_eq!(late.next, None);
        assert_eq!(session.game_phase, GamePhase::Demons);
        assert_eq!(session.next_step, Some(PhaseStep::Enter(GamePhase::Inspector)));

        let outcome = session.apply_pending(PhaseStep::Enter(GamePhase::Inspector));
        assert!(outcome.applied);
        assert_eq!(session.game_phase, GamePhase::Inspector);
    }

    #[test]
    fn test_force_pending_requires_running_game() {
        let mut session = session_with(&["a", "b"]);
        assert_eq!(session.force_pending(), Err(SessionError::NotPlaying));
    }

    #[test]
    fn test_public_view_never_exposes_roles() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut session = session_with(&["a", "b", "c", "d", "e", "f", "g", "h"]);
        session.start("a", &mut rng).unwrap();

        let json = serde_json::to_value(session.public_view()).unwrap();
        for player in json["players"].as_array().unwrap() {
            assert!(player["role"].is_null());
        }
        assert_eq!(json["gameState"], "playing");
        assert_eq!(json["gamePhase"], "day");
        assert_eq!(json["timeOfDay"], "day");
        assert_eq!(json["playerCount"], 8);
        assert!(json["winningParty"].is_null());
    }

    #[test]
    fn test_chat_requires_roster_membership() {
        let mut session = session_with(&["a"]);
        let message = session
            .add_chat_message("a", "hello".to_string())
            .unwrap();
        assert_eq!(message.player, "A");
        assert_eq!(
            session.add_chat_message("ghost", "boo".to_string()),
            Err(SessionError::PlayerNotFound)
        );
        assert_eq!(session.public_view().chat_messages.len(), 1);
    }
}
