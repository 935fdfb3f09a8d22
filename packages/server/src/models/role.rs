use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::player::Player;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Villager,
    Demon,
    DemonLeader,
    Doctor,
    Inspector,
}

/// The two factions a game can end in favour of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Villager,
    Demon,
}

/// What the Inspector learns about a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Demon,
    Villager,
}

impl Role {
    pub fn is_evil(self) -> bool {
        matches!(self, Role::Demon | Role::DemonLeader)
    }

    pub fn party(self) -> Party {
        if self.is_evil() {
            Party::Demon
        } else {
            Party::Villager
        }
    }

    /// The DemonLeader deliberately reads as a villager.
    pub fn apparent_alignment(self) -> Alignment {
        match self {
            Role::Demon => Alignment::Demon,
            _ => Alignment::Villager,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Villager => write!(f, "Villager"),
            Role::Demon => write!(f, "Demon"),
            Role::DemonLeader => write!(f, "Demon Leader"),
            Role::Doctor => write!(f, "Doctor"),
            Role::Inspector => write!(f, "Inspector"),
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Villager => write!(f, "Villagers"),
            Party::Demon => write!(f, "Demons"),
        }
    }
}

/// Role multiset for a roster of `player_count`. Sizes outside the table
/// (1, 3) get an empty multiset.
pub fn roles_for_player_count(player_count: usize) -> Vec<Role> {
    let mut roles = match player_count {
        2 => vec![Role::Villager, Role::Demon],
        4 => vec![Role::Villager, Role::Demon, Role::Inspector, Role::Doctor],
        5..=7 => vec![
            Role::Villager,
            Role::Villager,
            Role::Villager,
            Role::Demon,
            Role::Inspector,
            Role::Doctor,
        ],
        n if n >= 8 => vec![
            Role::Villager,
            Role::Villager,
            Role::Villager,
            Role::Villager,
            Role::Demon,
            Role::DemonLeader,
            Role::Inspector,
            Role::Doctor,
        ],
        _ => Vec::new(),
    };

    for _ in 8..player_count {
        roles.push(Role::Villager);
    }

    roles
}

pub fn is_supported_player_count(player_count: usize) -> bool {
    !roles_for_player_count(player_count).is_empty()
}

/// The multiset actually dealt to `player_count` seats. A table longer than
/// the roster gives up Villagers first, so the special roles and at least one
/// Demon always survive. Seats past the table become Villagers.
pub fn dealt_roles(player_count: usize) -> Vec<Role> {
    let mut roles = roles_for_player_count(player_count);
    while roles.len() > player_count {
        match roles.iter().position(|role| *role == Role::Villager) {
            Some(index) => {
                roles.remove(index);
            }
            None => roles.truncate(player_count),
        }
    }
    roles.resize(player_count, Role::Villager);
    roles
}

/// Shuffles the dealt multiset and hands it out positionally. Everyone is
/// marked alive.
pub fn assign_roles<R: Rng + ?Sized>(players: &mut [Player], rng: &mut R) {
    let mut roles = dealt_roles(players.len());
    roles.shuffle(rng);

    for (player, role) in players.iter_mut().zip(roles) {
        player.role = Some(role);
        player.is_alive = true;
    }
}
