//! StatBlock - base attribute values plus timed modifiers
//!
//! Effective values combine in a fixed order: all additive modifier
//! amounts are summed onto the base first, then every multiplicative
//! modifier is applied, then the result is floored at zero. The block is
//! ephemeral engine state; it is recomputed per resolution and never
//! persisted directly.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::Stat;

/// A single modifier attached to one stat.
///
/// `amount` is additive. When `multiplier` is set it is applied after all
/// additive amounts for the stat have been summed. `rounds_remaining` of
/// `None` means the modifier never expires on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatModifier {
    pub amount: i32,
    #[serde(default)]
    pub multiplier: Option<f64>,
    #[serde(default)]
    pub rounds_remaining: Option<u32>,
    /// Where the modifier came from, for logs ("war_cry", "weakness", ...)
    pub source: String,
}

impl StatModifier {
    /// Flat additive modifier with a duration in rounds
    pub fn additive(amount: i32, rounds: u32, source: impl Into<String>) -> Self {
        StatModifier {
            amount,
            multiplier: None,
            rounds_remaining: Some(rounds),
            source: source.into(),
        }
    }

    /// Multiplicative modifier with a duration in rounds
    pub fn multiplicative(multiplier: f64, rounds: u32, source: impl Into<String>) -> Self {
        StatModifier {
            amount: 0,
            multiplier: Some(multiplier),
            rounds_remaining: Some(rounds),
            source: source.into(),
        }
    }

    /// Check whether the modifier is still active
    pub fn is_active(&self) -> bool {
        self.rounds_remaining.map_or(true, |r| r > 0)
    }
}

/// Base attribute values and the modifiers currently applied to them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatBlock {
    base: HashMap<Stat, i32>,
    modifiers: HashMap<Stat, Vec<StatModifier>>,
}

impl StatBlock {
    /// Create an empty stat block (every stat reads as 0)
    pub fn new() -> Self {
        StatBlock::default()
    }

    /// Create a stat block from base values
    pub fn with_base(values: impl IntoIterator<Item = (Stat, i32)>) -> Self {
        StatBlock {
            base: values.into_iter().collect(),
            modifiers: HashMap::new(),
        }
    }

    /// Base value for a stat, before any modifiers
    pub fn base(&self, stat: Stat) -> i32 {
        self.base.get(&stat).copied().unwrap_or(0)
    }

    /// Set the base value for a stat
    pub fn set_base(&mut self, stat: Stat, value: i32) {
        self.base.insert(stat, value);
    }

    /// Attach a modifier to a stat
    pub fn add_modifier(&mut self, stat: Stat, modifier: StatModifier) {
        self.modifiers.entry(stat).or_default().push(modifier);
    }

    /// Modifiers currently attached to a stat
    pub fn modifiers(&self, stat: Stat) -> &[StatModifier] {
        self.modifiers.get(&stat).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Effective value: base + sum of additive amounts, then each
    /// multiplicative modifier in attachment order, floored at 0.
    pub fn effective(&self, stat: Stat) -> i32 {
        let mods = self.modifiers(stat);
        let additive: i32 = self.base(stat) + mods.iter().filter(|m| m.is_active()).map(|m| m.amount).sum::<i32>();
        let mut value = additive as f64;
        for modifier in mods.iter().filter(|m| m.is_active()) {
            if let Some(mult) = modifier.multiplier {
                value *= mult;
            }
        }
        (value.floor() as i32).max(0)
    }

    /// Advance all timed modifiers by one round.
    ///
    /// Expired modifiers are dropped. Returns true if any expired, so the
    /// caller can log the wear-off.
    pub fn tick_round(&mut self) -> bool {
        let mut expired = false;
        for mods in self.modifiers.values_mut() {
            for modifier in mods.iter_mut() {
                if let Some(rounds) = modifier.rounds_remaining.as_mut() {
                    *rounds = rounds.saturating_sub(1);
                }
            }
            let before = mods.len();
            mods.retain(|m| m.is_active());
            expired |= mods.len() != before;
        }
        expired
    }

    /// Drop every modifier, keeping base values
    pub fn clear_modifiers(&mut self) {
        self.modifiers.clear();
    }
}
