//! Convenience re-exports for the common combat_core surface

pub use crate::config::{constants, ensure_constants_initialized};
pub use crate::resolver::{resolve_exchange, resolve_exchange_seeded, ExchangeResult, Fighter};
pub use crate::skill::{
    execute_skill, Ability, AbilityBook, AbilityId, AppliedEffect, CasterState, CooldownLedger,
    SkillEffect, SkillOutcome, TargetState,
};
pub use crate::stat_block::{StatBlock, StatModifier};
pub use crate::types::{BodyPart, Combatant, Resource, Role, Stat};
