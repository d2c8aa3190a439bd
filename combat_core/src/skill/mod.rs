//! Skill system - ability definitions, cooldown ledger and execution

mod executor;

pub use executor::{execute_skill, AppliedEffect, CasterState, SkillOutcome, TargetState};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::types::{Resource, Stat};

/// Identifier for an ability definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbilityId(pub String);

impl From<&str> for AbilityId {
    fn from(s: &str) -> Self {
        AbilityId(s.to_string())
    }
}

impl From<String> for AbilityId {
    fn from(s: String) -> Self {
        AbilityId(s)
    }
}

impl fmt::Display for AbilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One effect an ability produces when cast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkillEffect {
    /// Direct damage: base plus `scaling_stat * scaling_factor`
    Damage {
        base: i32,
        #[serde(default)]
        scaling_stat: Option<Stat>,
        #[serde(default)]
        scaling_factor: f64,
    },
    /// Restores HP on the target, clamped to max HP
    Heal {
        base: i32,
        #[serde(default)]
        scaling_stat: Option<Stat>,
        #[serde(default)]
        scaling_factor: f64,
    },
    /// Timed positive stat modifier on the cast target
    Buff { stat: Stat, amount: i32, rounds: u32 },
    /// Timed negative stat modifier on the opponent
    Debuff { stat: Stat, amount: i32, rounds: u32 },
    /// Tick damage firing for `rounds` subsequent rounds
    Dot { damage_per_round: i32, rounds: u32 },
    /// Damage applied to every valid target within the radius
    Aoe { base: i32, radius: u32 },
    /// Damage that heals the caster for a percentage of what it dealt
    Drain { base: i32, heal_percent: i32 },
    /// Absorption pool negating incoming damage until spent or expired
    Shield { amount: i32, rounds: u32 },
}

/// An ability definition: effects, costs and cooldown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ability {
    pub id: AbilityId,
    pub name: String,
    pub effects: Vec<SkillEffect>,
    #[serde(default)]
    pub resource_cost: HashMap<Resource, i32>,
    #[serde(default)]
    pub cooldown_rounds: u32,
}

impl Ability {
    pub fn new(id: impl Into<AbilityId>, name: impl Into<String>) -> Self {
        Ability {
            id: id.into(),
            name: name.into(),
            effects: Vec::new(),
            resource_cost: HashMap::new(),
            cooldown_rounds: 0,
        }
    }

    /// Convenience constructor for a plain damage ability
    pub fn strike(id: &str, name: &str, base_damage: i32) -> Self {
        Ability {
            id: AbilityId::from(id),
            name: name.to_string(),
            effects: vec![SkillEffect::Damage {
                base: base_damage,
                scaling_stat: None,
                scaling_factor: 0.0,
            }],
            resource_cost: HashMap::new(),
            cooldown_rounds: 0,
        }
    }

    pub fn with_effect(mut self, effect: SkillEffect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_cost(mut self, resource: Resource, amount: i32) -> Self {
        self.resource_cost.insert(resource, amount);
        self
    }

    pub fn with_cooldown(mut self, rounds: u32) -> Self {
        self.cooldown_rounds = rounds;
        self
    }

    /// Mana portion of the resource cost
    pub fn mana_cost(&self) -> i32 {
        self.resource_cost.get(&Resource::Mana).copied().unwrap_or(0)
    }

    /// Flat damage the ability adds to a basic exchange
    pub fn flat_damage_bonus(&self) -> i32 {
        self.effects
            .iter()
            .map(|effect| match effect {
                SkillEffect::Damage { base, .. } => *base,
                _ => 0,
            })
            .sum()
    }

    /// Whether any effect fans out to multiple targets
    pub fn is_aoe(&self) -> bool {
        self.effects.iter().any(|e| matches!(e, SkillEffect::Aoe { .. }))
    }
}

/// Ability definition registry
#[derive(Debug, Clone, Default)]
pub struct AbilityBook {
    abilities: HashMap<AbilityId, Ability>,
}

impl AbilityBook {
    /// Create a new empty registry
    pub fn new() -> Self {
        AbilityBook::default()
    }

    /// Register an ability definition
    pub fn register(&mut self, ability: Ability) {
        self.abilities.insert(ability.id.clone(), ability);
    }

    /// Get an ability by ID
    pub fn get(&self, id: &AbilityId) -> Option<&Ability> {
        self.abilities.get(id)
    }
}

/// Per-caster record of when each ability becomes available again.
///
/// Keys are ability IDs, values are the round number at which the ability
/// is ready. Strongly typed on purpose: this replaces a stringly-keyed
/// metadata blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CooldownLedger {
    ready_at: HashMap<AbilityId, u32>,
}

impl CooldownLedger {
    pub fn new() -> Self {
        CooldownLedger::default()
    }

    /// Whether the ability can be cast in the given round
    pub fn is_ready(&self, id: &AbilityId, round: u32) -> bool {
        self.ready_at.get(id).map_or(true, |&ready| round >= ready)
    }

    /// Rounds left before the ability is available again
    pub fn remaining(&self, id: &AbilityId, round: u32) -> u32 {
        self.ready_at
            .get(id)
            .map_or(0, |&ready| ready.saturating_sub(round))
    }

    /// Record a successful cast in `round` with the ability's cooldown
    pub fn record(&mut self, id: AbilityId, round: u32, cooldown_rounds: u32) {
        if cooldown_rounds > 0 {
            self.ready_at.insert(id, round + cooldown_rounds);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_ledger() {
        let mut ledger = CooldownLedger::new();
        let id = AbilityId::from("fireball");

        assert!(ledger.is_ready(&id, 1));
        ledger.record(id.clone(), 1, 3);
        assert!(!ledger.is_ready(&id, 2));
        assert_eq!(ledger.remaining(&id, 2), 2);
        assert!(ledger.is_ready(&id, 4));
    }

    #[test]
    fn test_zero_cooldown_never_blocks() {
        let mut ledger = CooldownLedger::new();
        let id = AbilityId::from("jab");
        ledger.record(id.clone(), 1, 0);
        assert!(ledger.is_ready(&id, 1));
    }

    #[test]
    fn test_flat_damage_bonus_sums_damage_effects() {
        let ability = Ability::strike("combo", "Combo", 4).with_effect(SkillEffect::Damage {
            base: 3,
            scaling_stat: None,
            scaling_factor: 0.0,
        });
        assert_eq!(ability.flat_damage_bonus(), 7);
    }

    #[test]
    fn test_effect_serde_tagging() {
        let effect = SkillEffect::Drain { base: 10, heal_percent: 50 };
        let json = serde_json::to_string(&effect).unwrap();
        assert!(json.contains("\"kind\":\"drain\""));
        let back: SkillEffect = serde_json::from_str(&json).unwrap();
        assert_eq!(back, effect);
    }
}
