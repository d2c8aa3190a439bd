//! AttackService - persist resolved exchanges and advance the turn counter
//!
//! Thin orchestration around the pure resolver. Side effects live here:
//! HP application, log persistence and the turn counter. A failed log
//! append is logged and swallowed; the in-memory combat outcome stands.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tracing::warn;

use combat_core::resolver::{resolve_exchange, ExchangeResult};
use combat_core::skill::Ability;

use crate::battle::{BattleId, CombatLogEntry, LogType, ParticipantId};
use crate::ports::{BattleStore, Rejection};

/// Wraps the turn resolver with persistence and turn accounting
pub struct AttackService<S> {
    store: Arc<S>,
}

impl<S: BattleStore> AttackService<S> {
    pub fn new(store: Arc<S>) -> Self {
        AttackService { store }
    }

    /// Resolve one attacker->defender exchange inside the battle, apply
    /// the HP deltas, persist the log and bump the turn counter.
    pub fn perform(
        &self,
        battle_id: BattleId,
        attacker: ParticipantId,
        defender: ParticipantId,
        action: &str,
        ability: Option<&Ability>,
        seed: u64,
    ) -> Result<ExchangeResult, Rejection> {
        let outcome = self.store.with_battle(battle_id, |record| {
            if record.battle.is_terminal() {
                return Err(Rejection::new("Battle is over"));
            }
            let attacker = record
                .participant(attacker)
                .ok_or_else(|| Rejection::new("Not a participant of this battle"))?
                .clone();
            let defender_view = record
                .participant(defender)
                .ok_or_else(|| Rejection::new("Not a participant of this battle"))?
                .clone();
            if !attacker.is_alive {
                return Err(Rejection::new("Defeated participants cannot act"));
            }

            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let result = resolve_exchange(&attacker, &defender_view, action, ability, &mut rng);

            let damage = result.damage_dealt();
            let round = record.battle.round_number;
            if damage > 0 {
                if let Some(target) = record.participant_mut(defender) {
                    target.apply_damage(damage, None);
                }
            }
            record.battle.round_number += 1;
            Ok((result, round, damage))
        })??;

        let (result, round, damage) = outcome;
        for line in &result.log {
            let entry = CombatLogEntry::new(
                battle_id,
                round,
                line.clone(),
                LogType::Attack,
                (damage > 0).then_some(damage),
            );
            if let Err(err) = self.store.append_log(battle_id, entry) {
                // Soft-fail: the exchange already happened, gameplay goes on.
                warn!(battle = battle_id.0, error = %err, "failed to persist combat log entry");
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::{Actor, Battle, BattleParticipant, BattleType, CharacterId, NpcId, Outcome};
    use crate::ports::{BattleRecord, StoreError};
    use crate::store::MemoryStore;
    use combat_core::config::ensure_constants_initialized;
    use combat_core::stat_block::StatBlock;
    use combat_core::types::Stat;

    fn setup_battle(store: &MemoryStore) -> (BattleId, ParticipantId, ParticipantId) {
        let hero_stats = StatBlock::with_base([(Stat::Attack, 15)]);
        let wolf_stats = StatBlock::with_base([(Stat::Defense, 8)]);
        let hero = BattleParticipant::new(
            Actor::Player(CharacterId(1)),
            "hero",
            "blue",
            3,
            hero_stats,
            50,
            20,
        );
        let wolf = BattleParticipant::new(Actor::Npc(NpcId(1)), "wolf", "red", 3, wolf_stats, 40, 0);
        let id = store
            .create_battle(Battle::new(BattleType::Pve, CharacterId(1), 100), vec![hero, wolf])
            .unwrap();
        let record = store.read_battle(id).unwrap();
        (id, record.participants[0].id, record.participants[1].id)
    }

    #[test]
    fn test_perform_applies_damage_and_logs() {
        ensure_constants_initialized();
        let store = Arc::new(MemoryStore::new());
        let (id, hero, wolf) = setup_battle(&store);
        let service = AttackService::new(store.clone());

        let result = service.perform(id, hero, wolf, "slash", None, 1).unwrap();
        let damage = result.damage_dealt();
        assert!(damage >= 7); // (15 - 8) at minimum, more on a crit

        let record = store.read_battle(id).unwrap();
        let wolf_state = record.participant(wolf).unwrap();
        assert_eq!(wolf_state.current_hp, 40 - damage);
        assert_eq!(record.battle.round_number, 2);
        assert_eq!(record.log.len(), 1);
        assert_eq!(record.log[0].sequence, 1);
        assert_eq!(record.log[0].damage_amount, Some(damage));
    }

    #[test]
    fn test_perform_rejected_after_completion() {
        ensure_constants_initialized();
        let store = Arc::new(MemoryStore::new());
        let (id, hero, wolf) = setup_battle(&store);
        store
            .with_battle(id, |rec| rec.battle.complete(Some(Outcome::Victory), None, 200))
            .unwrap();

        let service = AttackService::new(store.clone());
        let rejected = service.perform(id, hero, wolf, "slash", None, 1).unwrap_err();
        assert_eq!(rejected.message, "Battle is over");
    }

    /// Store wrapper whose log persistence always fails
    struct FlakyLogStore {
        inner: MemoryStore,
    }

    impl BattleStore for FlakyLogStore {
        fn create_battle(
            &self,
            battle: Battle,
            participants: Vec<BattleParticipant>,
        ) -> Result<BattleId, StoreError> {
            self.inner.create_battle(battle, participants)
        }
        fn with_battle<R>(
            &self,
            id: BattleId,
            f: impl FnOnce(&mut BattleRecord) -> R,
        ) -> Result<R, StoreError> {
            self.inner.with_battle(id, f)
        }
        fn read_battle(&self, id: BattleId) -> Result<BattleRecord, StoreError> {
            self.inner.read_battle(id)
        }
        fn append_log(&self, _id: BattleId, _entry: CombatLogEntry) -> Result<u32, StoreError> {
            Err(StoreError::Storage("disk full".into()))
        }
        fn active_battle_for(&self, character: CharacterId) -> Option<BattleId> {
            self.inner.active_battle_for(character)
        }
    }

    #[test]
    fn test_log_persistence_soft_fails() {
        ensure_constants_initialized();
        let store = Arc::new(FlakyLogStore { inner: MemoryStore::new() });
        let (id, hero, wolf) = setup_battle(&store.inner);
        let service = AttackService::new(store.clone());

        // the exchange must still succeed and apply damage
        let result = service.perform(id, hero, wolf, "slash", None, 1).unwrap();
        assert!(result.damage_dealt() > 0);

        let record = store.read_battle(id).unwrap();
        assert!(record.participant(wolf).unwrap().current_hp < 40);
        assert!(record.log.is_empty());
    }
}
