//! TurnBasedCombatService - simultaneous-submission round reconciliation
//!
//! Each round runs `collecting -> resolving -> settled`: every living
//! participant submits attacks, blocks and skill casts; once the last
//! submission arrives the round resolves in one transaction. All damage
//! and healing is computed against snapshots taken at the start of the
//! round, so resolution order cannot change final HP totals; only log
//! ordering depends on it, and that order is fixed (team label, then
//! participant id).
//!
//! A timeout scheduler may call `force_resolve` to substitute the default
//! "no action" submission for laggards.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use combat_core::config::constants;
use combat_core::resolver::resolve_exchange;
use combat_core::skill::{execute_skill, AbilityBook, AppliedEffect, CasterState, TargetState};
use combat_core::stat_block::StatModifier;
use combat_core::types::{BodyPart, Resource};

use crate::battle::{
    AttackKind, BattleId, BattleParticipant, CombatLogEntry, LogType, ParticipantId, TurnSubmission,
    ActiveEffect,
};
use crate::ports::{payloads, BattleStore, Notifier, Rejection};

/// What a successful submission means for the round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    /// Stored; waiting for the remaining participants
    Waiting,
    /// Everyone has submitted, the round can resolve
    ReadyToResolve,
}

/// Summary of one resolved round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundReport {
    /// The round that was just resolved
    pub round_number: u32,
    pub log: Vec<String>,
    pub completed: bool,
    pub winner_team: Option<String>,
}

/// Orchestrates N-participant battles with simultaneous turn submission
pub struct TurnBasedCombatService<S> {
    store: Arc<S>,
    abilities: Arc<AbilityBook>,
    notifier: Arc<dyn Notifier>,
}

struct PendingDamage {
    target: ParticipantId,
    amount: i32,
    part: Option<BodyPart>,
}

impl<S: BattleStore> TurnBasedCombatService<S> {
    pub fn new(store: Arc<S>, abilities: Arc<AbilityBook>, notifier: Arc<dyn Notifier>) -> Self {
        TurnBasedCombatService { store, abilities, notifier }
    }

    /// Validate and store one participant's actions for the current round.
    ///
    /// Rejections leave no pending-action state behind.
    pub fn submit_turn(
        &self,
        battle_id: BattleId,
        participant_id: ParticipantId,
        submission: TurnSubmission,
    ) -> Result<SubmitStatus, Rejection> {
        self.store.with_battle(battle_id, |record| {
            if record.battle.is_terminal() {
                return Err(Rejection::new("Battle is over"));
            }
            let participant = record
                .participant_mut(participant_id)
                .ok_or_else(|| Rejection::new("Not a participant of this battle"))?;
            if !participant.is_alive {
                return Err(Rejection::new("Defeated participants cannot act"));
            }

            let budget = constants().action_points.budget;
            if submission.ap_cost() > budget {
                return Err(Rejection::new("Exceeds action point limit"));
            }

            let mut mana_cost = 0;
            for cast in &submission.skills {
                let ability = self
                    .abilities
                    .get(&cast.ability)
                    .ok_or_else(|| Rejection::new("Unknown skill"))?;
                mana_cost += ability.mana_cost();
            }
            if mana_cost > participant.current_mp {
                return Err(Rejection::new("Not enough MP"));
            }

            participant.pending = Some(submission);

            if record.all_submitted() {
                Ok(SubmitStatus::ReadyToResolve)
            } else {
                Ok(SubmitStatus::Waiting)
            }
        })?
    }

    /// Resolve the current round once every living participant has
    /// submitted. Applies damage/healing, ticks effects, detects deaths
    /// and team wipes, clears submissions and advances the round counter.
    pub fn resolve_round(&self, battle_id: BattleId, seed: u64, now: u64) -> Result<RoundReport, Rejection> {
        let (report, lines, notifications) = self.store.with_battle(battle_id, |record| {
            if record.battle.is_terminal() {
                return Err(Rejection::new("Battle is over"));
            }
            if !record.all_submitted() {
                return Err(Rejection::new("Waiting for all participants to submit"));
            }
            Ok(Self::reconcile(&self.abilities, record, seed, now))
        })??;

        for (message, log_type, damage) in lines {
            let entry = CombatLogEntry::new(battle_id, report.round_number, message, log_type, damage);
            if let Err(err) = self.store.append_log(battle_id, entry) {
                warn!(battle = battle_id.0, error = %err, "failed to persist combat log entry");
            }
        }
        for (channel, payload) in notifications {
            self.notifier.publish(&channel, payload);
        }
        Ok(report)
    }

    /// Timeout path: substitute the default "no action" submission for
    /// every living participant that has not submitted, then resolve.
    pub fn force_resolve(&self, battle_id: BattleId, seed: u64, now: u64) -> Result<RoundReport, Rejection> {
        self.store.with_battle(battle_id, |record| {
            if record.battle.is_terminal() {
                return;
            }
            for participant in record.participants.iter_mut() {
                if participant.is_alive && participant.pending.is_none() {
                    debug!(participant = participant.id.0, "substituting no-action submission on timeout");
                    participant.pending = Some(TurnSubmission::none());
                }
            }
        })?;
        self.resolve_round(battle_id, seed, now)
    }

    /// The round reconciliation itself. Runs under the battle lock.
    #[allow(clippy::type_complexity)]
    fn reconcile(
        abilities: &AbilityBook,
        record: &mut crate::ports::BattleRecord,
        seed: u64,
        now: u64,
    ) -> (RoundReport, Vec<(String, LogType, Option<i32>)>, Vec<(String, Value)>) {
        let round = record.battle.round_number;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut lines: Vec<(String, LogType, Option<i32>)> = Vec::new();

        // Snapshots: every exchange this round is computed against the
        // state participants had when the round began.
        let snapshots: HashMap<ParticipantId, BattleParticipant> =
            record.participants.iter().map(|p| (p.id, p.clone())).collect();

        let mut order: Vec<ParticipantId> = record
            .participants
            .iter()
            .filter(|p| p.is_alive)
            .map(|p| p.id)
            .collect();
        order.sort_by(|a, b| {
            let (pa, pb) = (&snapshots[a], &snapshots[b]);
            pa.team.cmp(&pb.team).then(a.cmp(b))
        });

        let mitigation = &constants().mitigation;
        let mut damage_queue: Vec<PendingDamage> = Vec::new();
        let mut heal_queue: Vec<(ParticipantId, i32)> = Vec::new();
        let mut effect_queue: Vec<(ParticipantId, AppliedEffect)> = Vec::new();
        let mut mp_spent: HashMap<ParticipantId, i32> = HashMap::new();
        let mut fatigue_gained: HashMap<ParticipantId, i32> = HashMap::new();

        for actor_id in &order {
            let actor = &snapshots[actor_id];
            let submission = actor.pending.clone().unwrap_or_default();
            *fatigue_gained.entry(*actor_id).or_insert(0) += submission.ap_cost() / 10;

            for intent in &submission.attacks {
                let Some(target) = snapshots.get(&intent.target) else { continue };
                if !target.is_alive {
                    continue;
                }
                let action = match intent.kind {
                    AttackKind::Simple => "attack",
                    AttackKind::Aimed => "aimed attack",
                };
                let result = resolve_exchange(actor, target, action, None, &mut rng);
                let mut damage = result.damage_dealt();

                for line in &result.log {
                    lines.push((line.clone(), LogType::Attack, (damage > 0).then_some(damage)));
                }

                if damage > 0 {
                    let blocked = target
                        .pending
                        .as_ref()
                        .is_some_and(|s| s.blocks_part(intent.body_part));
                    if blocked {
                        damage = (damage as f64 * (1.0 - mitigation.block_percent / 100.0)).round() as i32;
                        lines.push((
                            format!("{} blocks the blow to the {:?}!", target.name, intent.body_part),
                            LogType::Defend,
                            None,
                        ));
                    }
                    if target.defending {
                        damage = (damage as f64 * (1.0 - mitigation.defend_percent / 100.0)).round() as i32;
                    }
                    if damage > 0 {
                        damage_queue.push(PendingDamage {
                            target: intent.target,
                            amount: damage,
                            part: Some(intent.body_part),
                        });
                    }
                }
            }

            for cast in &submission.skills {
                let Some(ability) = abilities.get(&cast.ability) else {
                    lines.push((format!("{} fumbles an unknown skill", actor.name), LogType::Skill, None));
                    continue;
                };
                let Some(target) = snapshots.get(&cast.target) else { continue };

                let mut pools = actor.resource_pools();
                if let Some(spent) = mp_spent.get(actor_id) {
                    pools.entry(Resource::Mana).and_modify(|m| *m -= spent);
                }
                let caster_state = CasterState {
                    name: &actor.name,
                    stats: &actor.stats,
                    current_hp: actor.current_hp,
                    max_hp: actor.max_hp,
                    resources: &pools,
                };
                let target_state = TargetState {
                    name: &target.name,
                    stats: &target.stats,
                    current_hp: target.current_hp,
                    max_hp: target.max_hp,
                };
                let ledger = record.battle.cooldowns.get(actor_id).cloned().unwrap_or_default();
                let outcome = execute_skill(&caster_state, &target_state, ability, round, &ledger, &mut rng);

                if !outcome.success {
                    lines.push((outcome.message, LogType::Skill, None));
                    continue;
                }

                *mp_spent.entry(*actor_id).or_insert(0) +=
                    outcome.resource_cost.get(&Resource::Mana).copied().unwrap_or(0);
                if outcome.cooldown_until.is_some() {
                    record
                        .battle
                        .cooldowns_for(*actor_id)
                        .record(ability.id.clone(), round, ability.cooldown_rounds);
                }

                if outcome.damage > 0 {
                    if outcome.aoe {
                        // Fan out to every living participant on another team
                        for other in snapshots.values() {
                            if other.is_alive && other.team != actor.team {
                                damage_queue.push(PendingDamage {
                                    target: other.id,
                                    amount: outcome.damage,
                                    part: None,
                                });
                            }
                        }
                    } else {
                        damage_queue.push(PendingDamage {
                            target: cast.target,
                            amount: outcome.damage,
                            part: None,
                        });
                    }
                }
                if outcome.healing > 0 {
                    heal_queue.push((cast.target, outcome.healing));
                }
                if outcome.caster_healing > 0 {
                    heal_queue.push((*actor_id, outcome.caster_healing));
                }
                for effect in &outcome.effects_applied {
                    effect_queue.push((cast.target, effect.clone()));
                }
                lines.push((outcome.message.clone(), LogType::Skill, (outcome.damage > 0).then_some(outcome.damage)));
            }
        }

        // Apply phase. Pre-existing damage-over-time effects tick first;
        // effects registered this round start on the next one.
        for participant in record.participants.iter_mut() {
            if participant.is_alive {
                for line in participant.tick_dots() {
                    let log_type = if line.contains("fallen") { LogType::Death } else { LogType::System };
                    lines.push((line, log_type, None));
                }
            }
        }

        for pending in &damage_queue {
            if let Some(target) = record.participant_mut(pending.target) {
                let applied = target.apply_damage(pending.amount, pending.part);
                if applied.killing_blow {
                    lines.push((format!("{} has fallen!", target.name), LogType::Death, None));
                }
            }
        }

        for (target_id, amount) in &heal_queue {
            if let Some(target) = record.participant_mut(*target_id) {
                target.apply_healing(*amount);
            }
        }

        for (participant_id, spent) in &mp_spent {
            if let Some(participant) = record.participant_mut(*participant_id) {
                participant.spend_mana(*spent);
            }
        }
        for (participant_id, gained) in &fatigue_gained {
            if let Some(participant) = record.participant_mut(*participant_id) {
                participant.fatigue += *gained;
            }
        }

        for participant in record.participants.iter_mut() {
            participant.decay_effects();
            participant.pending = None;
        }

        for (target_id, effect) in effect_queue {
            if let Some(target) = record.participant_mut(target_id) {
                match effect {
                    AppliedEffect::Buff { stat, amount, rounds } => {
                        target.stats.add_modifier(stat, StatModifier::additive(amount, rounds, "buff"));
                    }
                    AppliedEffect::Debuff { stat, amount, rounds } => {
                        target.stats.add_modifier(stat, StatModifier::additive(amount, rounds, "debuff"));
                    }
                    AppliedEffect::Dot { damage_per_round, rounds } => {
                        target.active_effects.push(ActiveEffect::Dot {
                            damage_per_round,
                            rounds_left: rounds,
                            source: "affliction".into(),
                        });
                    }
                    AppliedEffect::Shield { amount, rounds } => {
                        target.active_effects.push(ActiveEffect::Shield {
                            remaining: amount,
                            rounds_left: rounds,
                        });
                    }
                }
            }
        }

        // Team-wipe detection ends the battle.
        let teams = record.teams();
        let surviving: Vec<String> = teams.into_iter().filter(|t| !record.team_wiped(t)).collect();
        let completed = surviving.len() <= 1;
        let winner_team = surviving.first().cloned();
        if completed {
            record.battle.complete(None, winner_team.clone(), now);
            match &winner_team {
                Some(team) => lines.push((format!("Team {} wins the battle!", team), LogType::System, None)),
                None => lines.push(("The battle ends with no survivors.".to_string(), LogType::System, None)),
            }
        }

        // The round-complete payload reports the round that was just
        // resolved; the counter advances only after it is built.
        let messages: Vec<String> = lines.iter().map(|(m, _, _)| m.clone()).collect();
        let mut notifications = vec![(
            payloads::battle_channel(record.battle.id),
            payloads::round_complete(&record.battle, &messages, &record.participants),
        )];
        if completed {
            notifications.push((
                payloads::battle_channel(record.battle.id),
                payloads::battle_end(&record.battle),
            ));
        }

        record.battle.round_number += 1;

        let report = RoundReport {
            round_number: round,
            log: messages,
            completed,
            winner_team,
        };
        (report, lines, notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::{
        Actor, AttackIntent, Battle, BattleType, BlockIntent, CharacterId, SkillCast,
    };
    use crate::store::{MemoryNotifier, MemoryStore};
    use combat_core::config::ensure_constants_initialized;
    use combat_core::skill::{Ability, SkillEffect};
    use combat_core::stat_block::StatBlock;
    use combat_core::types::Stat;

    fn plain_stats(attack: i32, defense: i32) -> StatBlock {
        // no crit, no evasion: exchanges are fully deterministic
        StatBlock::with_base([(Stat::Attack, attack), (Stat::Defense, defense)])
    }

    fn duel_service() -> (
        Arc<MemoryStore>,
        Arc<MemoryNotifier>,
        TurnBasedCombatService<MemoryStore>,
        BattleId,
        ParticipantId,
        ParticipantId,
    ) {
        ensure_constants_initialized();
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let mut abilities = AbilityBook::new();
        abilities.register(
            Ability::new("fireball", "Fireball")
                .with_effect(SkillEffect::Damage { base: 10, scaling_stat: None, scaling_factor: 0.0 })
                .with_cost(combat_core::types::Resource::Mana, 8)
                .with_cooldown(2),
        );
        abilities.register(
            Ability::new("regrowth", "Regrowth")
                .with_effect(SkillEffect::Heal { base: 12, scaling_stat: None, scaling_factor: 0.0 })
                .with_cost(combat_core::types::Resource::Mana, 6),
        );

        let alice = BattleParticipant::new(
            Actor::Player(CharacterId(1)),
            "alice",
            "blue",
            5,
            plain_stats(12, 2),
            60,
            20,
        );
        let bob = BattleParticipant::new(
            Actor::Player(CharacterId(2)),
            "bob",
            "red",
            5,
            plain_stats(10, 4),
            60,
            20,
        );
        let id = store
            .create_battle(Battle::new(BattleType::Pvp, CharacterId(1), 100), vec![alice, bob])
            .unwrap();
        let record = store.read_battle(id).unwrap();
        let (a, b) = (record.participants[0].id, record.participants[1].id);
        let service = TurnBasedCombatService::new(store.clone(), Arc::new(abilities), notifier.clone());
        (store, notifier, service, id, a, b)
    }

    fn simple_attack(target: ParticipantId) -> TurnSubmission {
        TurnSubmission {
            attacks: vec![AttackIntent { kind: AttackKind::Simple, target, body_part: BodyPart::Torso }],
            blocks: Vec::new(),
            skills: Vec::new(),
        }
    }

    #[test]
    fn test_submit_then_resolve_applies_damage() {
        let (store, _, service, id, a, b) = duel_service();

        assert_eq!(service.submit_turn(id, a, simple_attack(b)).unwrap(), SubmitStatus::Waiting);
        assert_eq!(
            service.submit_turn(id, b, simple_attack(a)).unwrap(),
            SubmitStatus::ReadyToResolve
        );

        let report = service.resolve_round(id, 11, 200).unwrap();
        assert_eq!(report.round_number, 1);
        assert!(!report.completed);

        let record = store.read_battle(id).unwrap();
        // alice hits for 12-4=8, bob for 10-2=8
        assert_eq!(record.participant(a).unwrap().current_hp, 52);
        assert_eq!(record.participant(b).unwrap().current_hp, 52);
        assert_eq!(record.battle.round_number, 2);
        assert!(record.participants.iter().all(|p| p.pending.is_none()));
        assert!(!record.log.is_empty());
    }

    #[test]
    fn test_ap_budget_rejection_leaves_no_pending() {
        let (store, _, service, id, a, b) = duel_service();

        let greedy = TurnSubmission {
            attacks: vec![
                AttackIntent { kind: AttackKind::Aimed, target: b, body_part: BodyPart::Head },
                AttackIntent { kind: AttackKind::Aimed, target: b, body_part: BodyPart::Head },
                AttackIntent { kind: AttackKind::Aimed, target: b, body_part: BodyPart::Head },
            ],
            blocks: Vec::new(),
            skills: Vec::new(),
        };
        let rejected = service.submit_turn(id, a, greedy).unwrap_err();
        assert_eq!(rejected.message, "Exceeds action point limit");

        let record = store.read_battle(id).unwrap();
        assert!(record.participant(a).unwrap().pending.is_none());
    }

    #[test]
    fn test_mp_budget_rejection_does_not_deduct() {
        let (store, _, service, id, a, b) = duel_service();

        let spam = TurnSubmission {
            attacks: Vec::new(),
            blocks: Vec::new(),
            skills: vec![
                SkillCast { ability: "fireball".into(), target: b },
                SkillCast { ability: "fireball".into(), target: b },
                SkillCast { ability: "fireball".into(), target: b },
            ],
        };
        let rejected = service.submit_turn(id, a, spam).unwrap_err();
        assert_eq!(rejected.message, "Not enough MP");

        let record = store.read_battle(id).unwrap();
        assert_eq!(record.participant(a).unwrap().current_mp, 20);
        assert!(record.participant(a).unwrap().pending.is_none());
    }

    #[test]
    fn test_block_halves_damage_on_covered_part() {
        let (store, _, service, id, a, b) = duel_service();

        let aimed_head = TurnSubmission {
            attacks: vec![AttackIntent { kind: AttackKind::Aimed, target: b, body_part: BodyPart::Head }],
            blocks: Vec::new(),
            skills: Vec::new(),
        };
        let guard_head = TurnSubmission {
            attacks: Vec::new(),
            blocks: vec![BlockIntent { body_part: BodyPart::Head }],
            skills: Vec::new(),
        };
        service.submit_turn(id, a, aimed_head).unwrap();
        service.submit_turn(id, b, guard_head).unwrap();
        service.resolve_round(id, 11, 200).unwrap();

        let record = store.read_battle(id).unwrap();
        // 12-4=8, halved by the block to 4
        assert_eq!(record.participant(b).unwrap().current_hp, 56);
        assert_eq!(record.participant(b).unwrap().body_damage[&BodyPart::Head], 4);
    }

    #[test]
    fn test_round_complete_payload_reports_resolved_round() {
        let (store, notifier, service, id, a, b) = duel_service();

        service.submit_turn(id, a, simple_attack(b)).unwrap();
        service.submit_turn(id, b, TurnSubmission::none()).unwrap();
        let report = service.resolve_round(id, 11, 200).unwrap();
        assert_eq!(report.round_number, 1);

        let battle_events = notifier.sent_to(&payloads::battle_channel(id));
        let payload = battle_events.iter().find(|v| v["type"] == "round_complete").unwrap();
        assert_eq!(payload["round_number"], report.round_number);

        // the stored counter has still advanced to the next round
        let record = store.read_battle(id).unwrap();
        assert_eq!(record.battle.round_number, 2);
    }

    #[test]
    fn test_defensive_stance_reduces_round_damage() {
        let (store, _, service, id, a, b) = duel_service();
        store
            .with_battle(id, |rec| {
                rec.participant_mut(b).unwrap().defending = true;
            })
            .unwrap();

        service.submit_turn(id, a, simple_attack(b)).unwrap();
        service.submit_turn(id, b, TurnSubmission::none()).unwrap();
        service.resolve_round(id, 11, 200).unwrap();

        let record = store.read_battle(id).unwrap();
        // 12-4=8, halved to 4 by the stance, which then expires with decay
        assert_eq!(record.participant(b).unwrap().current_hp, 56);
        assert!(!record.participant(b).unwrap().defending);
    }

    #[test]
    fn test_skill_cooldown_blocks_second_cast() {
        let (store, _, service, id, a, b) = duel_service();

        let cast = TurnSubmission {
            attacks: Vec::new(),
            blocks: Vec::new(),
            skills: vec![SkillCast { ability: "fireball".into(), target: b }],
        };
        service.submit_turn(id, a, cast.clone()).unwrap();
        service.submit_turn(id, b, TurnSubmission::none()).unwrap();
        service.resolve_round(id, 11, 200).unwrap();

        let after_first = store.read_battle(id).unwrap();
        assert_eq!(after_first.participant(b).unwrap().current_hp, 50);
        assert_eq!(after_first.participant(a).unwrap().current_mp, 12);

        // round 2: the cooldown ledger rejects the recast
        service.submit_turn(id, a, cast).unwrap();
        service.submit_turn(id, b, TurnSubmission::none()).unwrap();
        let report = service.resolve_round(id, 12, 300).unwrap();
        assert!(report.log.iter().any(|l| l.contains("cooldown")));

        let after_second = store.read_battle(id).unwrap();
        assert_eq!(after_second.participant(b).unwrap().current_hp, 50);
        assert_eq!(after_second.participant(a).unwrap().current_mp, 12);
    }

    #[test]
    fn test_heal_clamped_and_applied() {
        let (store, _, service, id, a, b) = duel_service();
        store
            .with_battle(id, |rec| {
                rec.participant_mut(a).unwrap().current_hp = 50;
            })
            .unwrap();

        let mend_self = TurnSubmission {
            attacks: Vec::new(),
            blocks: Vec::new(),
            skills: vec![SkillCast { ability: "regrowth".into(), target: a }],
        };
        service.submit_turn(id, a, mend_self).unwrap();
        service.submit_turn(id, b, TurnSubmission::none()).unwrap();
        service.resolve_round(id, 11, 200).unwrap();

        let record = store.read_battle(id).unwrap();
        // 12 healing clamped to the 10 missing HP
        assert_eq!(record.participant(a).unwrap().current_hp, 60);
    }

    #[test]
    fn test_team_wipe_completes_battle() {
        let (store, notifier, service, id, a, b) = duel_service();
        store
            .with_battle(id, |rec| {
                rec.participant_mut(b).unwrap().current_hp = 1;
            })
            .unwrap();

        service.submit_turn(id, a, simple_attack(b)).unwrap();
        service.submit_turn(id, b, TurnSubmission::none()).unwrap();
        let report = service.resolve_round(id, 11, 500).unwrap();

        assert!(report.completed);
        assert_eq!(report.winner_team.as_deref(), Some("blue"));
        assert!(report.log.iter().any(|l| l.contains("has fallen")));

        let record = store.read_battle(id).unwrap();
        assert!(record.battle.is_terminal());
        assert_eq!(record.battle.ended_at, Some(500));
        assert!(!record.participant(b).unwrap().is_alive);

        let battle_events = notifier.sent_to(&payloads::battle_channel(id));
        assert!(battle_events.iter().any(|v| v["type"] == "round_complete"));
        assert!(battle_events.iter().any(|v| v["type"] == "battle_end" && v["winner_team"] == "blue"));

        // the terminal battle accepts no further submissions
        let rejected = service.submit_turn(id, a, simple_attack(b)).unwrap_err();
        assert_eq!(rejected.message, "Battle is over");
    }

    #[test]
    fn test_resolve_requires_all_submissions() {
        let (_, _, service, id, a, b) = duel_service();
        service.submit_turn(id, a, simple_attack(b)).unwrap();

        let rejected = service.resolve_round(id, 11, 200).unwrap_err();
        assert!(rejected.message.contains("Waiting"));
    }

    #[test]
    fn test_force_resolve_substitutes_no_action() {
        let (store, _, service, id, a, b) = duel_service();
        service.submit_turn(id, a, simple_attack(b)).unwrap();

        // b never submits; the scheduler forces the round
        let report = service.force_resolve(id, 11, 200).unwrap();
        assert_eq!(report.round_number, 1);

        let record = store.read_battle(id).unwrap();
        assert_eq!(record.participant(b).unwrap().current_hp, 52);
        assert_eq!(record.participant(a).unwrap().current_hp, 60);
    }

    #[test]
    fn test_buff_applies_to_later_rounds() {
        let (store, _, _, id, a, b) = duel_service();
        let mut abilities = AbilityBook::new();
        abilities.register(
            Ability::new("war_cry", "War Cry")
                .with_effect(SkillEffect::Buff { stat: Stat::Attack, amount: 6, rounds: 2 }),
        );
        let service =
            TurnBasedCombatService::new(store.clone(), Arc::new(abilities), Arc::new(MemoryNotifier::new()));

        let shout = TurnSubmission {
            attacks: Vec::new(),
            blocks: Vec::new(),
            skills: vec![SkillCast { ability: "war_cry".into(), target: a }],
        };
        service.submit_turn(id, a, shout).unwrap();
        service.submit_turn(id, b, TurnSubmission::none()).unwrap();
        service.resolve_round(id, 11, 200).unwrap();

        // round 2: buffed attack hits for (12+6)-4 = 14
        service.submit_turn(id, a, simple_attack(b)).unwrap();
        service.submit_turn(id, b, TurnSubmission::none()).unwrap();
        service.resolve_round(id, 12, 300).unwrap();

        let record = store.read_battle(id).unwrap();
        assert_eq!(record.participant(b).unwrap().current_hp, 46);
    }
}
