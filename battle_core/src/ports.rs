//! Port traits for the combat engine's collaborators.
//!
//! These are the only abstractions in the crate: persistence, real-time
//! notification, reward granting, death handling, NPC templates and arena
//! ratings. Everything else is concrete types. Any backend that honors
//! these contracts (atomic battle+participants create, per-battle mutation
//! serialization, single-active-battle exclusivity) can sit behind them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::battle::{
    Battle, BattleId, BattleParticipant, CharacterId, CombatLogEntry, NpcId, Outcome,
    ParticipantId,
};

/// Errors from the persistence layer
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The single-active-battle constraint rejected a create
    #[error("Already in combat")]
    AlreadyInCombat,
    #[error("Battle not found")]
    NotFound,
    #[error("Storage error: {0}")]
    Storage(String),
}

/// A business-rule rejection with a display-ready message.
///
/// Expected violations (dead actor, insufficient resources, budget
/// overruns, ...) travel as values, not errors; the message is suitable
/// for showing to the player verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub message: String,
}

impl Rejection {
    pub fn new(message: impl Into<String>) -> Self {
        Rejection { message: message.into() }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<StoreError> for Rejection {
    fn from(err: StoreError) -> Self {
        Rejection::new(err.to_string())
    }
}

/// A battle with its participants and log, as stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleRecord {
    pub battle: Battle,
    pub participants: Vec<BattleParticipant>,
    pub log: Vec<CombatLogEntry>,
}

impl BattleRecord {
    pub fn participant(&self, id: ParticipantId) -> Option<&BattleParticipant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut BattleParticipant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    /// Distinct team labels in participant order
    pub fn teams(&self) -> Vec<String> {
        let mut teams: Vec<String> = Vec::new();
        for p in &self.participants {
            if !teams.contains(&p.team) {
                teams.push(p.team.clone());
            }
        }
        teams
    }

    /// Whether every participant on the team is dead
    pub fn team_wiped(&self, team: &str) -> bool {
        self.participants.iter().filter(|p| p.team == team).all(|p| !p.is_alive)
    }

    /// All player characters in the battle
    pub fn player_characters(&self) -> Vec<CharacterId> {
        self.participants.iter().filter_map(|p| p.actor.character()).collect()
    }

    /// True once every living participant has a pending submission
    pub fn all_submitted(&self) -> bool {
        self.participants.iter().filter(|p| p.is_alive).all(|p| p.pending.is_some())
    }
}

/// Persistence port for battles.
///
/// Implementations must make `create_battle` atomic (battle plus all
/// participants, or nothing), enforce one active battle per player
/// character at the storage level, and serialize `with_battle` closures
/// per battle so concurrent submissions cannot interleave.
pub trait BattleStore: Send + Sync {
    /// Atomically persist a battle and its participants, assigning ids.
    /// Fails with [`StoreError::AlreadyInCombat`] if any player character
    /// already has a non-terminal battle.
    fn create_battle(
        &self,
        battle: Battle,
        participants: Vec<BattleParticipant>,
    ) -> Result<BattleId, StoreError>;

    /// Run `f` with exclusive access to the battle record. When the
    /// closure leaves the battle in a terminal status, the store releases
    /// the active-battle reservation for its player characters.
    fn with_battle<R>(
        &self,
        id: BattleId,
        f: impl FnOnce(&mut BattleRecord) -> R,
    ) -> Result<R, StoreError>;

    /// Snapshot of the record for read-only use
    fn read_battle(&self, id: BattleId) -> Result<BattleRecord, StoreError>;

    /// Append one log entry, assigning its within-round sequence number.
    /// Callers treat failures as soft: gameplay never depends on this.
    fn append_log(&self, id: BattleId, entry: CombatLogEntry) -> Result<u32, StoreError>;

    /// The character's current non-terminal battle, if any
    fn active_battle_for(&self, character: CharacterId) -> Option<BattleId>;
}

/// Fire-and-forget publication of JSON payloads to named channels.
///
/// Delivery is never awaited and never fails from the engine's point of
/// view; implementations swallow and log transport errors.
pub trait Notifier: Send + Sync {
    fn publish(&self, channel: &str, payload: Value);
}

/// Grants XP and currency to a character
pub trait RewardSink: Send + Sync {
    fn grant(&self, character: CharacterId, xp: i64, gold: i64);
}

/// Invoked exactly once when a player participant dies in battle
pub trait DeathHandler: Send + Sync {
    fn on_death(&self, character: CharacterId);
}

/// Read-only NPC template lookup
pub trait NpcCatalog: Send + Sync {
    fn get(&self, id: NpcId) -> Option<NpcTemplate>;
}

/// Stat metadata for building an enemy participant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcTemplate {
    pub id: NpcId,
    pub name: String,
    pub level: u32,
    #[serde(default)]
    pub attack: Option<i32>,
    #[serde(default)]
    pub defense: Option<i32>,
    #[serde(default)]
    pub agility: Option<i32>,
    #[serde(default)]
    pub health: Option<i32>,
}

/// Arena rating persistence. ArenaLadder is the only writer.
pub trait RatingStore: Send + Sync {
    fn rating(&self, character: CharacterId) -> i32;
    fn set_rating(&self, character: CharacterId, value: i32);
}

/// Notification payload constructors, one per message shape
pub mod payloads {
    use super::*;

    /// Per-character channel name
    pub fn character_channel(character: CharacterId) -> String {
        format!("character:{}", character)
    }

    /// Per-battle channel name
    pub fn battle_channel(battle: BattleId) -> String {
        format!("battle:{}", battle)
    }

    pub fn combat_started(battle: &Battle) -> Value {
        json!({
            "type": "combat_started",
            "battle_id": battle.id,
            "battle_type": battle.battle_type,
        })
    }

    pub fn combat_update(battle: &Battle, log: &[String]) -> Value {
        json!({
            "type": "combat_update",
            "battle_id": battle.id,
            "round_number": battle.round_number,
            "log": log,
        })
    }

    pub fn combat_ended(battle: &Battle, outcome: Option<Outcome>) -> Value {
        json!({
            "type": "combat_ended",
            "battle_id": battle.id,
            "outcome": outcome,
        })
    }

    pub fn round_complete(battle: &Battle, log_entries: &[String], participants: &[BattleParticipant]) -> Value {
        let participants: Vec<Value> = participants
            .iter()
            .map(|p| {
                json!({
                    "id": p.id,
                    "name": p.name,
                    "team": p.team,
                    "current_hp": p.current_hp,
                    "max_hp": p.max_hp,
                    "is_alive": p.is_alive,
                })
            })
            .collect();
        json!({
            "type": "round_complete",
            "battle_id": battle.id,
            "round_number": battle.round_number,
            "log_entries": log_entries,
            "participants": participants,
        })
    }

    pub fn battle_end(battle: &Battle) -> Value {
        json!({
            "type": "battle_end",
            "battle_id": battle.id,
            "winner_team": battle.winner_team,
            "outcome": battle.outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::{Actor, BattleType};
    use combat_core::stat_block::StatBlock;

    #[test]
    fn test_rejection_from_store_error() {
        let rejection: Rejection = StoreError::AlreadyInCombat.into();
        assert_eq!(rejection.message, "Already in combat");
    }

    #[test]
    fn test_payload_shapes() {
        let battle = Battle::new(BattleType::Pve, CharacterId(7), 0);
        let started = payloads::combat_started(&battle);
        assert_eq!(started["type"], "combat_started");

        let p = BattleParticipant::new(
            Actor::Player(CharacterId(7)),
            "hero",
            "blue",
            1,
            StatBlock::new(),
            30,
            10,
        );
        let round = payloads::round_complete(&battle, &["hit".into()], &[p]);
        assert_eq!(round["type"], "round_complete");
        assert_eq!(round["participants"][0]["name"], "hero");
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(payloads::character_channel(CharacterId(3)), "character:3");
        assert_eq!(payloads::battle_channel(BattleId(9)), "battle:9");
    }
}
