//! combat_core - Deterministic combat resolution primitives
//!
//! This library provides:
//! - StatBlock: base attributes plus timed additive/multiplicative modifiers
//! - TurnResolver: one attacker->defender exchange under an explicit RNG
//! - SkillExecutor: ability cast validation and effect resolution
//! - CombatConstants: tunable combat numbers loadable from TOML
//!
//! Every chance-dependent computation takes a caller-supplied RNG (or a
//! `u64` seed). Nothing in this crate reads process-global randomness,
//! performs I/O, or consults a clock, so identical inputs always produce
//! identical outputs.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use combat_core::prelude::*;
//!
//! let mut attacker = StatBlock::new();
//! attacker.set_base(Stat::Attack, 15);
//! attacker.set_base(Stat::CritChance, 10);
//!
//! let mut defender = StatBlock::new();
//! defender.set_base(Stat::Defense, 8);
//!
//! let result = resolve_exchange_seeded(
//!     &Fighter::new("hero", attacker, 100),
//!     &Fighter::new("goblin", defender, 40),
//!     "slash",
//!     None,
//!     1,
//! );
//! println!("{}", result.log[0]);
//! ```

pub mod config;
pub mod prelude;
pub mod resolver;
pub mod skill;
pub mod stat_block;
pub mod types;

// Core API - what most users need
pub use resolver::{resolve_exchange, resolve_exchange_seeded, ExchangeResult};
pub use skill::{execute_skill, Ability, AbilityBook, AbilityId, CooldownLedger, SkillEffect, SkillOutcome};
pub use stat_block::{StatBlock, StatModifier};
pub use types::{BodyPart, Combatant, Resource, Role, Stat};

// Configuration
pub use config::{constants, ensure_constants_initialized, init_constants, init_constants_default};
