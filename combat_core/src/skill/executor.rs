//! Skill execution - validate a cast and resolve its declared effects
//!
//! Execution flow:
//!   1. Validate: caster alive, resources payable, not on cooldown
//!   2. Calculate: damage / healing / effect registrations per declared effect
//!   3. Return: a structured outcome the orchestration layer commits
//!
//! Validation failures return `success = false` with a display-ready
//! message and never mutate anything; the executor itself holds no state.
//! Resource deduction and cooldown recording happen in the same battle
//! transaction as the rest of the round, driven by the outcome's
//! `resource_cost` and `cooldown_until` fields.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{Ability, CooldownLedger, SkillEffect};
use crate::config::constants;
use crate::stat_block::StatBlock;
use crate::types::{Resource, Stat};

/// Everything the executor needs to know about the caster
#[derive(Debug, Clone)]
pub struct CasterState<'a> {
    pub name: &'a str,
    pub stats: &'a StatBlock,
    pub current_hp: i32,
    pub max_hp: i32,
    pub resources: &'a HashMap<Resource, i32>,
}

/// Everything the executor needs to know about the target
#[derive(Debug, Clone)]
pub struct TargetState<'a> {
    pub name: &'a str,
    pub stats: &'a StatBlock,
    pub current_hp: i32,
    pub max_hp: i32,
}

/// A timed effect the cast registers; attached by the orchestration layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AppliedEffect {
    Buff { stat: Stat, amount: i32, rounds: u32 },
    Debuff { stat: Stat, amount: i32, rounds: u32 },
    Dot { damage_per_round: i32, rounds: u32 },
    Shield { amount: i32, rounds: u32 },
}

/// Result of a skill execution attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillOutcome {
    pub success: bool,
    /// Damage to deal to the target (0 if none)
    pub damage: i32,
    /// Healing to apply to the target, already clamped to max HP
    pub healing: i32,
    /// Healing returned to the caster (drain effects)
    pub caster_healing: i32,
    /// Timed effects to register on the target
    pub effects_applied: Vec<AppliedEffect>,
    /// Display-ready summary or rejection reason
    pub message: String,
    pub critical: bool,
    /// Whether the damage fans out to every valid target
    pub aoe: bool,
    /// Resources to deduct from the caster on commit
    pub resource_cost: HashMap<Resource, i32>,
    /// Round at which the ability becomes available again, if it has a cooldown
    pub cooldown_until: Option<u32>,
}

impl SkillOutcome {
    fn failure(message: impl Into<String>) -> Self {
        SkillOutcome {
            success: false,
            damage: 0,
            healing: 0,
            caster_healing: 0,
            effects_applied: Vec::new(),
            message: message.into(),
            critical: false,
            aoe: false,
            resource_cost: HashMap::new(),
            cooldown_until: None,
        }
    }
}

/// Execute an ability cast.
///
/// `round` is the battle's current round number; `ledger` is the caster's
/// cooldown record. Pure: the caller applies the outcome.
pub fn execute_skill(
    caster: &CasterState<'_>,
    target: &TargetState<'_>,
    ability: &Ability,
    round: u32,
    ledger: &CooldownLedger,
    rng: &mut impl Rng,
) -> SkillOutcome {
    // Fail-fast validation, no mutation on any rejection path.
    if caster.current_hp <= 0 {
        return SkillOutcome::failure(format!("{} cannot act while defeated", caster.name));
    }

    // Fixed resource order keeps the rejection message deterministic
    // when more than one pool falls short.
    for resource in Resource::all() {
        let Some(cost) = ability.resource_cost.get(resource) else { continue };
        let pool = caster.resources.get(resource).copied().unwrap_or(0);
        if pool < *cost {
            return SkillOutcome::failure(format!("Not enough {}", resource));
        }
    }

    if !ledger.is_ready(&ability.id, round) {
        let left = ledger.remaining(&ability.id, round);
        return SkillOutcome::failure(format!(
            "{} is on cooldown for {} more round{}",
            ability.name,
            left,
            if left == 1 { "" } else { "s" }
        ));
    }

    // One crit roll covers every damaging effect of the cast.
    let crit_roll: f64 = rng.gen();
    let crit_chance = caster.stats.effective(Stat::CritChance) as f64 / 100.0;
    let critical = crit_roll < crit_chance;
    let crit_multiplier = constants().crit.multiplier;

    let mut damage = 0;
    let mut healing = 0;
    let mut caster_healing = 0;
    let mut effects_applied = Vec::new();
    let mut aoe = false;

    for effect in &ability.effects {
        match effect {
            SkillEffect::Damage { base, scaling_stat, scaling_factor } => {
                damage += roll_damage(caster.stats, *base, *scaling_stat, *scaling_factor, critical, crit_multiplier);
            }
            SkillEffect::Heal { base, scaling_stat, scaling_factor } => {
                let amount = *base + scaled_bonus(caster.stats, *scaling_stat, *scaling_factor);
                healing += amount.max(0);
            }
            SkillEffect::Buff { stat, amount, rounds } => {
                effects_applied.push(AppliedEffect::Buff {
                    stat: *stat,
                    amount: *amount,
                    rounds: *rounds,
                });
            }
            SkillEffect::Debuff { stat, amount, rounds } => {
                effects_applied.push(AppliedEffect::Debuff {
                    stat: *stat,
                    amount: -amount.abs(),
                    rounds: *rounds,
                });
            }
            SkillEffect::Dot { damage_per_round, rounds } => {
                effects_applied.push(AppliedEffect::Dot {
                    damage_per_round: *damage_per_round,
                    rounds: *rounds,
                });
            }
            SkillEffect::Aoe { base, .. } => {
                aoe = true;
                damage += roll_damage(caster.stats, *base, None, 0.0, critical, crit_multiplier);
            }
            SkillEffect::Drain { base, heal_percent } => {
                let dealt = roll_damage(caster.stats, *base, None, 0.0, critical, crit_multiplier);
                damage += dealt;
                caster_healing += dealt * heal_percent / 100;
            }
            SkillEffect::Shield { amount, rounds } => {
                effects_applied.push(AppliedEffect::Shield {
                    amount: *amount,
                    rounds: *rounds,
                });
            }
        }
    }

    // Healing can never push the target above max HP.
    healing = healing.min((target.max_hp - target.current_hp).max(0));

    let message = if damage > 0 {
        format!("{} uses {} on {} for {} damage!", caster.name, ability.name, target.name, damage)
    } else if healing > 0 {
        format!("{} uses {}, restoring {} HP to {}!", caster.name, ability.name, healing, target.name)
    } else {
        format!("{} uses {} on {}!", caster.name, ability.name, target.name)
    };

    SkillOutcome {
        success: true,
        damage,
        healing,
        caster_healing,
        effects_applied,
        message,
        critical: critical && damage > 0,
        aoe,
        resource_cost: ability.resource_cost.clone(),
        cooldown_until: (ability.cooldown_rounds > 0).then(|| round + ability.cooldown_rounds),
    }
}

fn scaled_bonus(stats: &StatBlock, scaling_stat: Option<Stat>, scaling_factor: f64) -> i32 {
    match scaling_stat {
        Some(stat) => (stats.effective(stat) as f64 * scaling_factor).floor() as i32,
        None => 0,
    }
}

fn roll_damage(
    stats: &StatBlock,
    base: i32,
    scaling_stat: Option<Stat>,
    scaling_factor: f64,
    critical: bool,
    crit_multiplier: f64,
) -> i32 {
    let raw = (base + scaled_bonus(stats, scaling_stat, scaling_factor)).max(1);
    if critical {
        (raw as f64 * crit_multiplier).round() as i32
    } else {
        raw
    }
}
