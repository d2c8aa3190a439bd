//! PveEncounterService - single-player encounters against NPC templates
//!
//! The PvE loop is per-call rather than per-round-barrier: the player
//! submits either a single action (attack/defend/flee) or one batched
//! [`TurnSubmission`], the engine resolves it plus the enemy's single
//! reply in one transaction, and the battle ends on death, victory or
//! escape. Victory rewards are granted exactly once, scaled by the level
//! gap; player death is forwarded to the [`DeathHandler`] exactly once.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use combat_core::config::constants;
use combat_core::resolver::resolve_exchange;
use combat_core::skill::{execute_skill, AbilityBook, AppliedEffect, CasterState, TargetState};
use combat_core::stat_block::{StatBlock, StatModifier};
use combat_core::types::{BodyPart, Resource, Stat};

use crate::battle::{
    initiative_key, ActiveEffect, Actor, AttackKind, Battle, BattleId, BattleParticipant,
    BattleType, CharacterId, CombatLogEntry, LogType, NpcId, Outcome, ParticipantId,
    TurnSubmission,
};
use crate::ports::{
    payloads, BattleRecord, BattleStore, DeathHandler, Notifier, NpcCatalog, Rejection,
    RewardSink,
};

pub const PLAYER_TEAM: &str = "player";
pub const ENEMY_TEAM: &str = "enemy";

/// What the player wants to do this turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerAction {
    Attack,
    /// Halve incoming damage for the enemy's reply
    Defend,
    /// Chance-based escape; failure grants the enemy a free attack
    Flee,
}

/// Character sheet data needed to enter an encounter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub id: CharacterId,
    pub name: String,
    pub level: u32,
    pub stats: StatBlock,
    pub current_hp: i32,
    pub max_hp: i32,
    pub max_mp: i32,
}

/// State snapshot returned after each encounter mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncounterUpdate {
    pub battle_id: BattleId,
    pub round_number: u32,
    pub log: Vec<String>,
    pub player_hp: i32,
    pub enemy_hp: i32,
    pub completed: bool,
    pub outcome: Option<Outcome>,
}

/// Orchestrates player-versus-environment encounters
pub struct PveEncounterService<S> {
    store: Arc<S>,
    npcs: Arc<dyn NpcCatalog>,
    abilities: Arc<AbilityBook>,
    rewards: Arc<dyn RewardSink>,
    deaths: Arc<dyn DeathHandler>,
    notifier: Arc<dyn Notifier>,
}

/// Side effects collected inside the battle transaction and performed
/// after it, so collaborator calls never run under the battle lock.
#[derive(Default)]
struct Followups {
    lines: Vec<(String, LogType, Option<i32>)>,
    reward: Option<(CharacterId, i64, i64)>,
    death: Option<CharacterId>,
    notifications: Vec<(String, Value)>,
}

impl<S: BattleStore> PveEncounterService<S> {
    pub fn new(
        store: Arc<S>,
        npcs: Arc<dyn NpcCatalog>,
        abilities: Arc<AbilityBook>,
        rewards: Arc<dyn RewardSink>,
        deaths: Arc<dyn DeathHandler>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        PveEncounterService { store, npcs, abilities, rewards, deaths, notifier }
    }

    /// Start an encounter between a player and an NPC template.
    ///
    /// Fails if the player is dead, the template is unknown, or the
    /// store's single-active-battle constraint rejects the create.
    pub fn start_encounter(
        &self,
        player: &PlayerProfile,
        npc_id: NpcId,
        now: u64,
    ) -> Result<EncounterUpdate, Rejection> {
        if player.current_hp <= 0 {
            return Err(Rejection::new("Cannot start combat while defeated"));
        }
        let template = self
            .npcs
            .get(npc_id)
            .ok_or_else(|| Rejection::new("Unknown enemy"))?;

        let mut hero = BattleParticipant::new(
            Actor::Player(player.id),
            player.name.clone(),
            PLAYER_TEAM,
            player.level,
            player.stats.clone(),
            player.max_hp,
            player.max_mp,
        );
        hero.current_hp = player.current_hp;

        let level = template.level as i32;
        let enemy_stats = StatBlock::with_base([
            (Stat::Attack, template.attack.unwrap_or(level * 2)),
            (Stat::Defense, template.defense.unwrap_or(level)),
            (Stat::Agility, template.agility.unwrap_or(level)),
        ]);
        let enemy_hp = template.health.unwrap_or(level * 12 + 20);
        let enemy = BattleParticipant::new(
            Actor::Npc(template.id),
            template.name.clone(),
            ENEMY_TEAM,
            template.level,
            enemy_stats,
            enemy_hp,
            0,
        );

        // Higher initiative is listed (and later logged) first
        let mut participants = vec![hero, enemy];
        participants.sort_by_key(initiative_key);

        let battle = Battle::new(BattleType::Pve, player.id, now);
        let battle_id = self.store.create_battle(battle, participants)?;
        info!(battle = battle_id.0, character = player.id.0, npc = npc_id.0, "encounter started");

        let opening = format!("Combat begins: {} vs {}!", player.name, template.name);
        let entry = CombatLogEntry::new(battle_id, 1, opening.clone(), LogType::System, None);
        if let Err(err) = self.store.append_log(battle_id, entry) {
            warn!(battle = battle_id.0, error = %err, "failed to persist combat log entry");
        }

        let record = self.store.read_battle(battle_id)?;
        self.notifier.publish(
            &payloads::character_channel(player.id),
            payloads::combat_started(&record.battle),
        );

        Ok(EncounterUpdate {
            battle_id,
            round_number: 1,
            log: vec![opening],
            player_hp: player.current_hp,
            enemy_hp,
            completed: false,
            outcome: None,
        })
    }

    /// Resolve one player action and the enemy's reply.
    pub fn process_action(
        &self,
        battle_id: BattleId,
        character: CharacterId,
        action: PlayerAction,
        seed: u64,
        now: u64,
    ) -> Result<EncounterUpdate, Rejection> {
        let (update, followups) = self.store.with_battle(battle_id, |record| {
            Self::resolve_action(record, character, action, seed, now)
        })??;
        self.run_followups(battle_id, update.round_number.saturating_sub(1), followups);
        Ok(update)
    }

    /// Batched variant: all of the player's attacks and skill casts
    /// resolve against the encounter, then the enemy responds once.
    /// Blocks mitigate that single response.
    pub fn process_turn(
        &self,
        battle_id: BattleId,
        character: CharacterId,
        submission: &TurnSubmission,
        seed: u64,
        now: u64,
    ) -> Result<EncounterUpdate, Rejection> {
        let (update, followups) = self.store.with_battle(battle_id, |record| {
            Self::resolve_batch(record, &self.abilities, character, submission, seed, now)
        })??;
        self.run_followups(battle_id, update.round_number.saturating_sub(1), followups);
        Ok(update)
    }

    fn run_followups(&self, battle_id: BattleId, round: u32, followups: Followups) {
        for (message, log_type, damage) in followups.lines {
            let entry = CombatLogEntry::new(battle_id, round, message, log_type, damage);
            if let Err(err) = self.store.append_log(battle_id, entry) {
                warn!(battle = battle_id.0, error = %err, "failed to persist combat log entry");
            }
        }
        if let Some((character, xp, gold)) = followups.reward {
            self.rewards.grant(character, xp, gold);
        }
        if let Some(character) = followups.death {
            self.deaths.on_death(character);
        }
        for (channel, payload) in followups.notifications {
            self.notifier.publish(&channel, payload);
        }
    }

    /// Locate the acting player and the enemy, with liveness checks
    fn encounter_sides(
        record: &BattleRecord,
        character: CharacterId,
    ) -> Result<(ParticipantId, ParticipantId), Rejection> {
        if record.battle.is_terminal() {
            return Err(Rejection::new("Battle is over"));
        }
        let player = record
            .participants
            .iter()
            .find(|p| p.actor == Actor::Player(character))
            .ok_or_else(|| Rejection::new("Not a participant of this battle"))?;
        if !player.is_alive {
            return Err(Rejection::new("Defeated participants cannot act"));
        }
        let enemy = record
            .participants
            .iter()
            .find(|p| !p.actor.is_player())
            .ok_or_else(|| Rejection::new("Encounter has no enemy"))?;
        Ok((player.id, enemy.id))
    }

    /// The single-action resolution. Runs under the battle lock.
    fn resolve_action(
        record: &mut BattleRecord,
        character: CharacterId,
        action: PlayerAction,
        seed: u64,
        now: u64,
    ) -> Result<(EncounterUpdate, Followups), Rejection> {
        let (player_id, enemy_id) = Self::encounter_sides(record, character)?;
        let player = record.participant(player_id).cloned().ok_or_else(not_participant)?;
        let enemy = record.participant(enemy_id).cloned().ok_or_else(no_enemy)?;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut followups = Followups::default();
        let mut fled = false;

        match action {
            PlayerAction::Attack => {
                let result = resolve_exchange(&player, &enemy, "attack", None, &mut rng);
                let damage = result.damage_dealt();
                for line in &result.log {
                    followups.lines.push((line.clone(), LogType::Attack, (damage > 0).then_some(damage)));
                }
                apply_to(record, enemy_id, damage, None, &mut followups);
            }
            PlayerAction::Defend => {
                if let Some(p) = record.participant_mut(player_id) {
                    p.defending = true;
                }
                followups.lines.push((
                    format!("{} takes a defensive stance.", player.name),
                    LogType::Defend,
                    None,
                ));
            }
            PlayerAction::Flee => {
                let flee = &constants().flee;
                let gap = player.stats.effective(Stat::Agility) - enemy.stats.effective(Stat::Agility);
                let chance = (flee.base_chance + flee.agility_step * gap as f64)
                    .clamp(flee.min_chance, flee.max_chance);
                if rng.gen::<f64>() < chance {
                    fled = true;
                    followups.lines.push((
                        format!("{} flees from battle!", player.name),
                        LogType::System,
                        None,
                    ));
                } else {
                    followups.lines.push((
                        format!("{} fails to flee!", player.name),
                        LogType::System,
                        None,
                    ));
                }
            }
        }

        if !fled {
            Self::enemy_reply(record, player_id, enemy_id, &player, false, &mut rng, &mut followups);
            Self::tick_and_decay(record, [player_id, enemy_id], &mut followups);
        }

        Self::finish(record, character, player_id, enemy_id, fled, now, followups)
    }

    /// The batched-turn resolution. Runs under the battle lock.
    fn resolve_batch(
        record: &mut BattleRecord,
        abilities: &AbilityBook,
        character: CharacterId,
        submission: &TurnSubmission,
        seed: u64,
        now: u64,
    ) -> Result<(EncounterUpdate, Followups), Rejection> {
        let (player_id, enemy_id) = Self::encounter_sides(record, character)?;
        let player = record.participant(player_id).cloned().ok_or_else(not_participant)?;
        let enemy = record.participant(enemy_id).cloned().ok_or_else(no_enemy)?;

        if submission.ap_cost() > constants().action_points.budget {
            return Err(Rejection::new("Exceeds action point limit"));
        }
        let mut mana_cost = 0;
        for cast in &submission.skills {
            let ability = abilities
                .get(&cast.ability)
                .ok_or_else(|| Rejection::new("Unknown skill"))?;
            mana_cost += ability.mana_cost();
        }
        if mana_cost > player.current_mp {
            return Err(Rejection::new("Not enough MP"));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut followups = Followups::default();
        let round = record.battle.round_number;

        for intent in &submission.attacks {
            if !record.participant(enemy_id).is_some_and(|p| p.is_alive) {
                break;
            }
            let action = match intent.kind {
                AttackKind::Simple => "attack",
                AttackKind::Aimed => "aimed attack",
            };
            let result = resolve_exchange(&player, &enemy, action, None, &mut rng);
            let damage = result.damage_dealt();
            for line in &result.log {
                followups.lines.push((line.clone(), LogType::Attack, (damage > 0).then_some(damage)));
            }
            apply_to(record, enemy_id, damage, Some(intent.body_part), &mut followups);
        }

        let mut mp_spent = 0;
        let mut new_effects: Vec<(ParticipantId, AppliedEffect)> = Vec::new();
        for cast in &submission.skills {
            let Some(ability) = abilities.get(&cast.ability) else { continue };
            let Some(target) = record.participant(cast.target).cloned() else { continue };

            let mut pools = player.resource_pools();
            pools.entry(Resource::Mana).and_modify(|m| *m -= mp_spent);
            let caster_state = CasterState {
                name: &player.name,
                stats: &player.stats,
                current_hp: player.current_hp,
                max_hp: player.max_hp,
                resources: &pools,
            };
            let target_state = TargetState {
                name: &target.name,
                stats: &target.stats,
                current_hp: target.current_hp,
                max_hp: target.max_hp,
            };
            let ledger = record.battle.cooldowns.get(&player_id).cloned().unwrap_or_default();
            let outcome = execute_skill(&caster_state, &target_state, ability, round, &ledger, &mut rng);

            if !outcome.success {
                followups.lines.push((outcome.message, LogType::Skill, None));
                continue;
            }
            mp_spent += outcome.resource_cost.get(&Resource::Mana).copied().unwrap_or(0);
            if outcome.cooldown_until.is_some() {
                record
                    .battle
                    .cooldowns_for(player_id)
                    .record(ability.id.clone(), round, ability.cooldown_rounds);
            }

            followups.lines.push((
                outcome.message.clone(),
                LogType::Skill,
                (outcome.damage > 0).then_some(outcome.damage),
            ));
            // aoe degenerates to the single enemy in PvE
            let damage_target = if outcome.aoe { enemy_id } else { cast.target };
            apply_to(record, damage_target, outcome.damage, None, &mut followups);
            if outcome.healing > 0 {
                if let Some(p) = record.participant_mut(cast.target) {
                    p.apply_healing(outcome.healing);
                }
            }
            if outcome.caster_healing > 0 {
                if let Some(p) = record.participant_mut(player_id) {
                    p.apply_healing(outcome.caster_healing);
                }
            }
            for effect in outcome.effects_applied {
                new_effects.push((cast.target, effect));
            }
        }
        if mp_spent > 0 {
            if let Some(p) = record.participant_mut(player_id) {
                p.spend_mana(mp_spent);
            }
        }

        // The enemy responds once, against any blocks in the submission
        Self::enemy_reply(record, player_id, enemy_id, &player, submission.blocks_part(BodyPart::Torso), &mut rng, &mut followups);

        Self::tick_and_decay(record, [player_id, enemy_id], &mut followups);
        for (target_id, effect) in new_effects {
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
                        target.active_effects.push(ActiveEffect::Shield { remaining: amount, rounds_left: rounds });
                    }
                }
            }
        }

        Self::finish(record, character, player_id, enemy_id, false, now, followups)
    }

    /// The enemy's single attack back at the player. A defensive stance
    /// (the participant's `defending` flag) and blocks both mitigate it.
    fn enemy_reply(
        record: &mut BattleRecord,
        player_id: ParticipantId,
        enemy_id: ParticipantId,
        player: &BattleParticipant,
        blocked: bool,
        rng: &mut ChaCha8Rng,
        followups: &mut Followups,
    ) {
        let Some(enemy) = record.participant(enemy_id).cloned() else { return };
        if !enemy.is_alive || !record.participant(player_id).is_some_and(|p| p.is_alive) {
            return;
        }
        let result = resolve_exchange(&enemy, player, "attack", None, rng);
        let mut damage = result.damage_dealt();
        for line in &result.log {
            followups.lines.push((line.clone(), LogType::Attack, (damage > 0).then_some(damage)));
        }
        if damage > 0 && blocked {
            damage = mitigate(damage, constants().mitigation.block_percent);
            followups.lines.push((
                format!("{} blocks the blow!", player.name),
                LogType::Defend,
                None,
            ));
        }
        let defending = record.participant(player_id).is_some_and(|p| p.defending);
        if damage > 0 && defending {
            damage = mitigate(damage, constants().mitigation.defend_percent);
            followups.lines.push((
                format!("{} absorbs part of the blow.", player.name),
                LogType::Defend,
                None,
            ));
        }
        apply_to(record, player_id, damage, None, followups);
    }

    /// Shared end-of-turn effect handling: pre-existing damage-over-time
    /// effects tick, then modifiers, dots, shields and the defend flag
    /// decay. Effects registered this turn start on the next one.
    fn tick_and_decay(
        record: &mut BattleRecord,
        ids: [ParticipantId; 2],
        followups: &mut Followups,
    ) {
        for id in ids {
            if let Some(p) = record.participant_mut(id) {
                if p.is_alive {
                    for line in p.tick_dots() {
                        let log_type = if line.contains("fallen") { LogType::Death } else { LogType::System };
                        followups.lines.push((line, log_type, None));
                    }
                }
                p.decay_effects();
            }
        }
    }

    /// Shared turn epilogue: advance the counter, detect the outcome,
    /// complete the battle and queue rewards/death/notifications.
    fn finish(
        record: &mut BattleRecord,
        character: CharacterId,
        player_id: ParticipantId,
        enemy_id: ParticipantId,
        fled: bool,
        now: u64,
        mut followups: Followups,
    ) -> Result<(EncounterUpdate, Followups), Rejection> {
        record.battle.round_number += 1;

        let player_state = record.participant(player_id).cloned().ok_or_else(not_participant)?;
        let enemy_state = record.participant(enemy_id).cloned().ok_or_else(no_enemy)?;

        let outcome = if fled {
            Some(Outcome::Fled)
        } else if !enemy_state.is_alive {
            Some(Outcome::Victory)
        } else if !player_state.is_alive {
            Some(Outcome::Defeat)
        } else {
            None
        };

        if let Some(outcome) = outcome {
            let winner = match outcome {
                Outcome::Victory => Some(PLAYER_TEAM.to_string()),
                Outcome::Defeat => Some(ENEMY_TEAM.to_string()),
                Outcome::Fled => None,
            };
            record.battle.complete(Some(outcome), winner, now);

            match outcome {
                Outcome::Victory => {
                    let (xp, gold) = victory_rewards(player_state.level, enemy_state.level);
                    followups.reward = Some((character, xp, gold));
                    followups.lines.push((
                        format!("Victory! {} defeats {}.", player_state.name, enemy_state.name),
                        LogType::System,
                        None,
                    ));
                    followups.lines.push((
                        format!("You gain {} XP and {} gold.", xp, gold),
                        LogType::Reward,
                        None,
                    ));
                }
                Outcome::Defeat => {
                    followups.death = Some(character);
                }
                Outcome::Fled => {}
            }
        }

        let messages: Vec<String> = followups.lines.iter().map(|(m, _, _)| m.clone()).collect();
        let channel = payloads::character_channel(character);
        followups
            .notifications
            .push((channel.clone(), payloads::combat_update(&record.battle, &messages)));
        if record.battle.is_terminal() {
            followups
                .notifications
                .push((channel, payloads::combat_ended(&record.battle, outcome)));
        }

        let update = EncounterUpdate {
            battle_id: record.battle.id,
            round_number: record.battle.round_number,
            log: messages,
            player_hp: player_state.current_hp,
            enemy_hp: enemy_state.current_hp,
            completed: record.battle.is_terminal(),
            outcome,
        };
        Ok((update, followups))
    }
}

fn not_participant() -> Rejection {
    Rejection::new("Not a participant of this battle")
}

fn no_enemy() -> Rejection {
    Rejection::new("Encounter has no enemy")
}

fn mitigate(damage: i32, percent: f64) -> i32 {
    (damage as f64 * (1.0 - percent / 100.0)).round() as i32
}

fn apply_to(
    record: &mut BattleRecord,
    target_id: ParticipantId,
    damage: i32,
    part: Option<BodyPart>,
    followups: &mut Followups,
) {
    if damage <= 0 {
        return;
    }
    if let Some(target) = record.participant_mut(target_id) {
        let applied = target.apply_damage(damage, part);
        if applied.killing_blow {
            followups.lines.push((format!("{} has fallen!", target.name), LogType::Death, None));
        }
    }
}

/// XP and gold for defeating an enemy, scaled by the level gap
pub fn victory_rewards(player_level: u32, enemy_level: u32) -> (i64, i64) {
    let rewards = &constants().rewards;
    let gap = enemy_level as f64 - player_level as f64;
    let multiplier = (1.0 + rewards.level_multiplier_step * gap)
        .clamp(rewards.multiplier_floor, rewards.multiplier_cap);
    let xp = (enemy_level as i64 * rewards.xp_per_level) as f64 * multiplier;
    let gold = (enemy_level as i64 * rewards.gold_per_level + rewards.gold_base) as f64 * multiplier;
    (xp.round() as i64, gold.round() as i64)
}
