//! battle_core - Battle lifecycle, round reconciliation and encounter services
//!
//! This library owns everything stateful about combat:
//! - Battle / BattleParticipant / CombatLogEntry data model
//! - Collaborator ports: persistence, notification, rewards, death handling,
//!   NPC templates, arena ratings
//! - AttackService: persists resolved exchanges and advances the turn counter
//! - TurnBasedCombatService: simultaneous-submission round reconciliation
//! - PveEncounterService: player-vs-NPC encounter lifecycle
//! - EncounterBuilder: PvP battle construction
//! - ArenaLadder: post-battle rating adjustment
//!
//! All mutation of a battle and its participants is serialized through the
//! store's per-battle lock. Business-rule violations come back as
//! [`Rejection`] values with display-ready messages, never as panics or
//! opaque errors. Notification publishing is fire-and-forget and combat-log
//! persistence is soft-failed: neither can block a state transition.

pub mod attack;
pub mod battle;
pub mod builder;
pub mod ladder;
pub mod ports;
pub mod pve;
pub mod rounds;
pub mod store;

pub use attack::AttackService;
pub use battle::{
    Actor, AttackIntent, AttackKind, Battle, BattleId, BattleParticipant, BattleStatus, BattleType,
    BlockIntent, CharacterId, CombatLogEntry, LogType, NpcId, Outcome, ParticipantId, SkillCast,
    TurnSubmission,
};
pub use builder::EncounterBuilder;
pub use ladder::{ArenaLadder, RatingChange};
pub use ports::{
    BattleRecord, BattleStore, DeathHandler, Notifier, NpcCatalog, NpcTemplate, RatingStore,
    Rejection, RewardSink, StoreError,
};
pub use pve::{EncounterUpdate, PlayerAction, PlayerProfile, PveEncounterService};
pub use rounds::{RoundReport, SubmitStatus, TurnBasedCombatService};
pub use store::{MemoryNotifier, MemoryRatingStore, MemoryStore, RecordingDeathHandler, RecordingRewardSink};
