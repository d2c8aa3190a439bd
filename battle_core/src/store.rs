//! In-memory collaborator implementations.
//!
//! `MemoryStore` is the reference persistence backend: one mutex guards the
//! battle index and the active-battle reservations (so check-and-create is
//! atomic), and each battle record sits behind its own mutex so all
//! mutation is serialized per battle without blocking unrelated battles.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::battle::{Battle, BattleId, BattleParticipant, CharacterId, CombatLogEntry, ParticipantId};
use crate::ports::{BattleRecord, BattleStore, DeathHandler, Notifier, RatingStore, RewardSink, StoreError};

#[derive(Default)]
struct MemoryIndex {
    battles: HashMap<BattleId, Arc<Mutex<BattleRecord>>>,
    /// character -> their single non-terminal battle
    active: HashMap<CharacterId, BattleId>,
    next_battle_id: u64,
    next_participant_id: u64,
}

/// Reference in-memory battle store
#[derive(Default)]
pub struct MemoryStore {
    index: Mutex<MemoryIndex>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn record(&self, id: BattleId) -> Result<Arc<Mutex<BattleRecord>>, StoreError> {
        let index = self.index.lock().expect("store index poisoned");
        index.battles.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    /// Drop the active-battle reservations for a finished battle
    fn release(&self, id: BattleId, characters: &[CharacterId]) {
        let mut index = self.index.lock().expect("store index poisoned");
        for character in characters {
            if index.active.get(character) == Some(&id) {
                index.active.remove(character);
            }
        }
    }
}

impl BattleStore for MemoryStore {
    fn create_battle(
        &self,
        mut battle: Battle,
        mut participants: Vec<BattleParticipant>,
    ) -> Result<BattleId, StoreError> {
        let mut index = self.index.lock().expect("store index poisoned");

        // Check-and-create under one lock: the exclusivity constraint and
        // the insert cannot be separated by another request.
        for participant in &participants {
            if let Some(character) = participant.actor.character() {
                if index.active.contains_key(&character) {
                    return Err(StoreError::AlreadyInCombat);
                }
            }
        }

        index.next_battle_id += 1;
        let id = BattleId(index.next_battle_id);
        battle.id = id;
        for participant in participants.iter_mut() {
            index.next_participant_id += 1;
            participant.id = ParticipantId(index.next_participant_id);
        }

        if !battle.is_terminal() {
            for participant in &participants {
                if let Some(character) = participant.actor.character() {
                    index.active.insert(character, id);
                }
            }
        }

        index.battles.insert(
            id,
            Arc::new(Mutex::new(BattleRecord {
                battle,
                participants,
                log: Vec::new(),
            })),
        );
        debug!(battle = id.0, "battle created");
        Ok(id)
    }

    fn with_battle<R>(
        &self,
        id: BattleId,
        f: impl FnOnce(&mut BattleRecord) -> R,
    ) -> Result<R, StoreError> {
        let record = self.record(id)?;
        let (result, released) = {
            let mut guard = record.lock().expect("battle record poisoned");
            let was_terminal = guard.battle.is_terminal();
            let result = f(&mut guard);
            let released = (!was_terminal && guard.battle.is_terminal())
                .then(|| guard.player_characters());
            (result, released)
        };
        if let Some(characters) = released {
            self.release(id, &characters);
        }
        Ok(result)
    }

    fn read_battle(&self, id: BattleId) -> Result<BattleRecord, StoreError> {
        let record = self.record(id)?;
        let guard = record.lock().expect("battle record poisoned");
        Ok(guard.clone())
    }

    fn append_log(&self, id: BattleId, mut entry: CombatLogEntry) -> Result<u32, StoreError> {
        let record = self.record(id)?;
        let mut guard = record.lock().expect("battle record poisoned");
        let sequence = guard
            .log
            .iter()
            .filter(|e| e.round_number == entry.round_number)
            .count() as u32
            + 1;
        entry.sequence = sequence;
        guard.log.push(entry);
        Ok(sequence)
    }

    fn active_battle_for(&self, character: CharacterId) -> Option<BattleId> {
        let index = self.index.lock().expect("store index poisoned");
        index.active.get(&character).copied()
    }
}

/// Notifier that records every published payload, for tests and local runs
#[derive(Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<(String, Value)>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        MemoryNotifier::default()
    }

    pub fn sent(&self) -> Vec<(String, Value)> {
        self.sent.lock().expect("notifier poisoned").clone()
    }

    /// Payloads published to one channel
    pub fn sent_to(&self, channel: &str) -> Vec<Value> {
        self.sent
            .lock()
            .expect("notifier poisoned")
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

impl Notifier for MemoryNotifier {
    fn publish(&self, channel: &str, payload: Value) {
        self.sent
            .lock()
            .expect("notifier poisoned")
            .push((channel.to_string(), payload));
    }
}

/// Rating store backed by a map, defaulting to the configured initial rating
#[derive(Default)]
pub struct MemoryRatingStore {
    ratings: Mutex<HashMap<CharacterId, i32>>,
}

impl MemoryRatingStore {
    pub fn new() -> Self {
        MemoryRatingStore::default()
    }
}

impl RatingStore for MemoryRatingStore {
    fn rating(&self, character: CharacterId) -> i32 {
        self.ratings
            .lock()
            .expect("ratings poisoned")
            .get(&character)
            .copied()
            .unwrap_or(combat_core::constants().rating.initial_rating)
    }

    fn set_rating(&self, character: CharacterId, value: i32) {
        self.ratings
            .lock()
            .expect("ratings poisoned")
            .insert(character, value);
    }
}

/// Reward sink that records every grant
#[derive(Default)]
pub struct RecordingRewardSink {
    grants: Mutex<Vec<(CharacterId, i64, i64)>>,
}

impl RecordingRewardSink {
    pub fn new() -> Self {
        RecordingRewardSink::default()
    }

    pub fn grants(&self) -> Vec<(CharacterId, i64, i64)> {
        self.grants.lock().expect("grants poisoned").clone()
    }
}

impl RewardSink for RecordingRewardSink {
    fn grant(&self, character: CharacterId, xp: i64, gold: i64) {
        self.grants
            .lock()
            .expect("grants poisoned")
            .push((character, xp, gold));
    }
}

/// Death handler that records every invocation
#[derive(Default)]
pub struct RecordingDeathHandler {
    deaths: Mutex<Vec<CharacterId>>,
}

impl RecordingDeathHandler {
    pub fn new() -> Self {
        RecordingDeathHandler::default()
    }

    pub fn deaths(&self) -> Vec<CharacterId> {
        self.deaths.lock().expect("deaths poisoned").clone()
    }
}

impl DeathHandler for RecordingDeathHandler {
    fn on_death(&self, character: CharacterId) {
        self.deaths
            .lock()
            .expect("deaths poisoned")
            .push(character);
    }
}
