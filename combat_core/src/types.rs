//! Core types shared across the combat engine

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::stat_block::StatBlock;

/// Combat attributes a StatBlock can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Attack,
    Defense,
    Agility,
    Luck,
    CritChance,
    Evasion,
    Initiative,
}

impl Stat {
    /// Get all stat variants
    pub fn all() -> &'static [Stat] {
        &[
            Stat::Attack,
            Stat::Defense,
            Stat::Agility,
            Stat::Luck,
            Stat::CritChance,
            Stat::Evasion,
            Stat::Initiative,
        ]
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stat::Attack => write!(f, "Attack"),
            Stat::Defense => write!(f, "Defense"),
            Stat::Agility => write!(f, "Agility"),
            Stat::Luck => write!(f, "Luck"),
            Stat::CritChance => write!(f, "Crit Chance"),
            Stat::Evasion => write!(f, "Evasion"),
            Stat::Initiative => write!(f, "Initiative"),
        }
    }
}

/// Spendable resource pools for ability costs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Mana,
    Stamina,
}

impl Resource {
    pub fn all() -> &'static [Resource] {
        &[Resource::Mana, Resource::Stamina]
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Mana => write!(f, "MP"),
            Resource::Stamina => write!(f, "Stamina"),
        }
    }
}

/// Body parts tracked for cumulative damage and block targeting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyPart {
    Head,
    Torso,
    Arms,
    Legs,
}

impl BodyPart {
    /// Get all body part variants
    pub fn all() -> &'static [BodyPart] {
        &[BodyPart::Head, BodyPart::Torso, BodyPart::Arms, BodyPart::Legs]
    }
}

/// Which side of an exchange an HP delta applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Attacker,
    Defender,
}

/// Capability contract for anything that can take part in an exchange.
///
/// Resolver functions only need a name, a stat block and hit points, so
/// both persisted battle participants and lightweight test doubles can
/// implement this.
pub trait Combatant {
    fn name(&self) -> &str;
    fn stats(&self) -> &StatBlock;
    fn current_hp(&self) -> i32;
    fn max_hp(&self) -> i32;

    fn is_alive(&self) -> bool {
        self.current_hp() > 0
    }
}
