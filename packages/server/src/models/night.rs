use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::game::{strict_leader, GamePhase};
use super::player::Player;
use super::role::{Alignment, Role};

/// Wire name of a night action. Anything else is rejected while parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NightActionKind {
    Kill,
    Save,
    Investigate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NightAction {
    Kill { target_id: String },
    Save { target_id: String },
    Investigate { target_id: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationResult {
    pub target_id: String,
    pub target_name: String,
    pub result: Alignment,
    pub inspector_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NightOutcome {
    /// Player who died tonight.
    pub killed: Option<String>,
    /// Player the demons chose but the doctor protected.
    pub saved: Option<String>,
    pub investigation: Option<InvestigationResult>,
}

impl NightActionKind {
    /// The window during which this action is accepted.
    pub fn phase(self) -> GamePhase {
        match self {
            NightActionKind::Kill => GamePhase::Demons,
            NightActionKind::Investigate => GamePhase::Inspector,
            NightActionKind::Save => GamePhase::Doctor,
        }
    }

    pub fn allowed_for(self, role: Role) -> bool {
        match self {
            NightActionKind::Kill => role.is_evil(),
            NightActionKind::Save => role == Role::Doctor,
            NightActionKind::Investigate => role == Role::Inspector,
        }
    }
}

impl NightAction {
    pub fn new(kind: NightActionKind, target_id: String) -> Self {
        match kind {
            NightActionKind::Kill => NightAction::Kill { target_id },
            NightActionKind::Save => NightAction::Save { target_id },
            NightActionKind::Investigate => NightAction::Investigate { target_id },
        }
    }

    pub fn kind(&self) -> NightActionKind {
        match self {
            NightAction::Kill { .. } => NightActionKind::Kill,
            NightAction::Save { .. } => NightActionKind::Save,
            NightAction::Investigate { .. } => NightActionKind::Investigate,
        }
    }

    pub fn target_id(&self) -> &str {
        match self {
            NightAction::Kill { target_id }
            | NightAction::Save { target_id }
            | NightAction::Investigate { target_id } => target_id,
        }
    }
}

/// Folds one night's actions into a single outcome and applies the death, if
/// any, to `players`. Actions from absent or dead players are skipped, as are
/// actions the actor's role cannot perform.
pub fn resolve_night(
    players: &mut [Player],
    actions: &BTreeMap<String, NightAction>,
) -> NightOutcome {
    let find = |id: &str| players.iter().find(|p| p.id == id);

    let mut kill_votes: BTreeMap<&str, usize> = BTreeMap::new();
    let mut doctor_target: Option<&str> = None;
    let mut investigation = None;

    for (actor_id, action) in actions {
        let Some(actor) = find(actor_id).filter(|p| p.is_alive) else {
            debug!("Skipping action from dead/missing player {}", actor_id);
            continue;
        };
        let Some(role) = actor.role else {
            continue;
        };

        match action {
            NightAction::Kill { target_id } if role.is_evil() => match find(target_id) {
                Some(target) if target.is_evil() => {
                    debug!("Ignoring demon vote from {} against ally {}", actor_id, target_id);
                }
                Some(target) if target.is_alive => {
                    *kill_votes.entry(target_id.as_str()).or_insert(0) += 1;
                }
                _ => {}
            },
            NightAction::Save { target_id } if role == Role::Doctor => {
                doctor_target = Some(target_id.as_str());
            }
            NightAction::Investigate { target_id } if role == Role::Inspector => {
                if let Some(target) = find(target_id) {
                    investigation = Some(InvestigationResult {
                        target_id: target.id.clone(),
                        target_name: target.name.clone(),
                        result: target
                            .role
                            .map_or(Alignment::Villager, Role::apparent_alignment),
                        inspector_id: actor_id.clone(),
                    });
                }
            }
            _ => debug!("{} cannot perform {:?}", actor_id, action.kind()),
        }
    }

    let target_to_kill = strict_leader(&kill_votes);
    let saved = target_to_kill
        .as_deref()
        .filter(|target| doctor_target == Some(*target))
        .map(str::to_string);

    let killed = if saved.is_some() { None } else { target_to_kill };

    if let Some(victim) = killed
        .as_deref()
        .and_then(|id| players.iter_mut().find(|p| p.id == id))
    {
        victim.is_alive = false;
    }

    NightOutcome {
        killed,
        saved,
        investigation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str, role: Role) -> Player {
        let mut player = Player::new(id.to_string(), id.to_uppercase());
        player.role = Some(role);
        player
    }

    fn roster() -> Vec<Player> {
        vec![
            player("d1", Role::Demon),
            player("d2", Role::DemonLeader),
            player("doc", Role::Doctor),
            player("insp", Role::Inspector),
            player("v1", Role::Villager),
            player("v2", Role::Villager),
        ]
    }

    fn actions(entries: &[(&str, NightActionKind, &str)]) -> BTreeMap<String, NightAction> {
        entries
            .iter()
            .map(|(actor, kind, target)| {
                (actor.to_string(), NightAction::new(*kind, target.to_string()))
            })
            .collect()
    }

    fn alive(players: &[Player], id: &str) -> bool {
        players.iter().find(|p| p.id == id).unwrap().is_alive
    }

    #[test]
    fn test_doctor_saves_demon_target() {
        let mut players = roster();
        let actions = actions(&[
            ("d1", NightActionKind::Kill, "v1"),
            ("doc", NightActionKind::Save, "v1"),
        ]);

        let outcome = resolve_night(&mut players, &actions);

        assert!(alive(&players, "v1"));
        assert_eq!(outcome.killed, None);
        assert_eq!(outcome.saved.as_deref(), Some("v1"));
    }

    #[test]
    fn test_doctor_saves_someone_else() {
        let mut players = roster();
        let actions = actions(&[
            ("d1", NightActionKind::Kill, "v1"),
            ("doc", NightActionKind::Save, "v2"),
        ]);

        let outcome = resolve_night(&mut players, &actions);

        assert!(!alive(&players, "v1"));
        assert!(alive(&players, "v2"));
        assert_eq!(outcome.killed.as_deref(), Some("v1"));
    }

    #[test]
    fn test_friendly_fire_is_discarded() {
        let mut players = roster();
        let actions = actions(&[
            ("d1", NightActionKind::Kill, "d2"),
            ("d2", NightActionKind::Kill, "d1"),
        ]);

        let outcome = resolve_night(&mut players, &actions);

        assert_eq!(outcome.killed, None);
        assert!(players.iter().all(|p| p.is_alive));
    }

    #[test]
    fn test_friendly_fire_does_not_count_toward_tally() {
        let mut players = roster();
        let actions = actions(&[
            ("d1", NightActionKind::Kill, "d2"),
            ("d2", NightActionKind::Kill, "v2"),
        ]);

        let outcome = resolve_night(&mut players, &actions);

        assert_eq!(outcome.killed.as_deref(), Some("v2"));
        assert!(alive(&players, "d2"));
    }

    #[test]
    fn test_kill_tie_goes_to_lowest_id() {
        let mut players = roster();
        let actions = actions(&[
            ("d1", NightActionKind::Kill, "v2"),
            ("d2", NightActionKind::Kill, "v1"),
        ]);

        let outcome = resolve_night(&mut players, &actions);

        assert_eq!(outcome.killed.as_deref(), Some("v1"));
        assert!(alive(&players, "v2"));
    }

    #[test]
    fn test_dead_and_missing_actors_are_ignored() {
        let mut players = roster();
        players[0].is_alive = false;
        let actions = actions(&[
            ("d1", NightActionKind::Kill, "v1"),
            ("ghost", NightActionKind::Kill, "v2"),
        ]);

        let outcome = resolve_night(&mut players, &actions);

        assert_eq!(outcome.killed, None);
        assert!(alive(&players, "v1"));
        assert!(alive(&players, "v2"));
    }

    #[test]
    fn test_wrong_role_actions_are_ignored() {
        let mut players = roster();
        let actions = actions(&[
            ("v1", NightActionKind::Kill, "v2"),
            ("d1", NightActionKind::Save, "d1"),
            ("v2", NightActionKind::Investigate, "d1"),
        ]);

        let outcome = resolve_night(&mut players, &actions);

        assert_eq!(outcome, NightOutcome::default());
        assert!(players.iter().all(|p| p.is_alive));
    }

    #[test]
    fn test_investigation_reports_alignment() {
        let mut players = roster();
        let outcome = resolve_night(
            &mut players,
            &actions(&[("insp", NightActionKind::Investigate, "d1")]),
        );
        let result = outcome.investigation.unwrap();
        assert_eq!(result.result, Alignment::Demon);
        assert_eq!(result.target_name, "D1");
        assert_eq!(result.inspector_id, "insp");

        let outcome = resolve_night(
            &mut players,
            &actions(&[("insp", NightActionKind::Investigate, "d2")]),
        );
        assert_eq!(outcome.investigation.unwrap().result, Alignment::Villager);
    }

    #[test]
    fn test_action_windows() {
        assert_eq!(NightActionKind::Kill.phase(), GamePhase::Demons);
        assert_eq!(NightActionKind::Investigate.phase(), GamePhase::Inspector);
        assert_eq!(NightActionKind::Save.phase(), GamePhase::Doctor);
        assert!(NightActionKind::Kill.allowed_for(Role::DemonLeader));
        assert!(!NightActionKind::Save.allowed_for(Role::Inspector));
    }

    #[test]
    fn test_unknown_action_type_is_rejected() {
        let parsed = serde_json::from_str::<NightActionKind>("\"poison\"");
        assert!(parsed.is_err());
        let parsed = serde_json::from_str::<NightActionKind>("\"investigate\"");
        assert_eq!(parsed.unwrap(), NightActionKind::Investigate);
    }
}
