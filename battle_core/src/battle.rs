//! Battle data model - battles, participants, submissions and log entries

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use combat_core::skill::{AbilityId, CooldownLedger};
use combat_core::stat_block::StatBlock;
use combat_core::types::{BodyPart, Combatant, Resource, Stat};
use combat_core::config::constants;

/// Battle identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BattleId(pub u64);

/// Player character identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterId(pub u64);

/// NPC template identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NpcId(pub u64);

/// Participant identifier, unique within the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub u64);

impl fmt::Display for BattleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a battle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleStatus {
    Pending,
    Active,
    Live,
    Completed,
    Cancelled,
}

impl BattleStatus {
    /// Terminal statuses permit no further mutation
    pub fn is_terminal(&self) -> bool {
        matches!(self, BattleStatus::Completed | BattleStatus::Cancelled)
    }
}

/// What kind of battle this is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleType {
    Pve,
    Pvp,
    Arena,
}

/// How a completed battle ended, from the initiator's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Victory,
    Defeat,
    Fled,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Victory => write!(f, "victory"),
            Outcome::Defeat => write!(f, "defeat"),
            Outcome::Fled => write!(f, "fled"),
        }
    }
}

/// The backing actor of a participant: a player character or an NPC
/// template, never both and never neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Player(CharacterId),
    Npc(NpcId),
}

impl Actor {
    /// Character reference if this actor is a player
    pub fn character(&self) -> Option<CharacterId> {
        match self {
            Actor::Player(id) => Some(*id),
            Actor::Npc(_) => None,
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self, Actor::Player(_))
    }
}

/// A single combat instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battle {
    pub id: BattleId,
    pub status: BattleStatus,
    pub battle_type: BattleType,
    /// Monotonic round/turn counter, starts at 1
    pub round_number: u32,
    pub initiator: CharacterId,
    /// Per-participant cooldown records, keyed by ability on the inside
    pub cooldowns: HashMap<ParticipantId, CooldownLedger>,
    pub started_at: u64,
    pub ended_at: Option<u64>,
    pub outcome: Option<Outcome>,
    pub winner_team: Option<String>,
}

impl Battle {
    pub fn new(battle_type: BattleType, initiator: CharacterId, started_at: u64) -> Self {
        Battle {
            id: BattleId(0), // assigned by the store on create
            status: BattleStatus::Active,
            battle_type,
            round_number: 1,
            initiator,
            cooldowns: HashMap::new(),
            started_at,
            ended_at: None,
            outcome: None,
            winner_team: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Transition to `Completed`, exactly once.
    ///
    /// Calls after the first are ignored: the terminal state is
    /// irreversible and rewards must not run twice.
    pub fn complete(&mut self, outcome: Option<Outcome>, winner_team: Option<String>, now: u64) {
        if self.is_terminal() {
            return;
        }
        self.status = BattleStatus::Completed;
        self.ended_at = Some(now);
        self.outcome = outcome;
        self.winner_team = winner_team;
    }

    /// Cooldown ledger for one participant, created on first use
    pub fn cooldowns_for(&mut self, participant: ParticipantId) -> &mut CooldownLedger {
        self.cooldowns.entry(participant).or_default()
    }
}

/// Attack flavors with different action point costs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    Simple,
    /// Targets a chosen body part, costs more AP
    Aimed,
}

/// One attack a participant wants to make this round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackIntent {
    pub kind: AttackKind,
    pub target: ParticipantId,
    pub body_part: BodyPart,
}

impl AttackIntent {
    pub fn ap_cost(&self) -> i32 {
        let ap = &constants().action_points;
        match self.kind {
            AttackKind::Simple => ap.simple_attack,
            AttackKind::Aimed => ap.aimed_attack,
        }
    }
}

/// One body part a participant wants to cover this round
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlockIntent {
    pub body_part: BodyPart,
}

impl BlockIntent {
    pub fn ap_cost(&self) -> i32 {
        constants().action_points.block
    }
}

/// One skill cast a participant wants to make this round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillCast {
    pub ability: AbilityId,
    pub target: ParticipantId,
}

/// Everything a participant submits for one round
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnSubmission {
    pub attacks: Vec<AttackIntent>,
    pub blocks: Vec<BlockIntent>,
    pub skills: Vec<SkillCast>,
}

impl TurnSubmission {
    /// The default "no action" submission used on turn timeout
    pub fn none() -> Self {
        TurnSubmission::default()
    }

    /// Summed action point cost of attacks and blocks
    pub fn ap_cost(&self) -> i32 {
        self.attacks.iter().map(AttackIntent::ap_cost).sum::<i32>()
            + self.blocks.iter().map(BlockIntent::ap_cost).sum::<i32>()
    }

    /// Whether a given body part is covered by a block
    pub fn blocks_part(&self, part: BodyPart) -> bool {
        self.blocks.iter().any(|b| b.body_part == part)
    }

    pub fn is_empty(&self) -> bool {
        self.attacks.is_empty() && self.blocks.is_empty() && self.skills.is_empty()
    }
}

/// A timed engine effect carried by a participant between rounds.
///
/// Stat modifiers live inside the participant's [`StatBlock`]; these are
/// the effects that need their own bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActiveEffect {
    Dot {
        damage_per_round: i32,
        rounds_left: u32,
        source: String,
    },
    Shield {
        remaining: i32,
        rounds_left: u32,
    },
}

/// What apply_damage actually did
#[derive(Debug, Clone, Copy, Default)]
pub struct DamageApplied {
    /// Damage that reached hit points
    pub dealt: i32,
    /// Damage soaked by shields
    pub absorbed: i32,
    /// True if this blow dropped the participant to 0 HP
    pub killing_blow: bool,
}

/// One combatant inside a battle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleParticipant {
    pub id: ParticipantId,
    pub actor: Actor,
    pub name: String,
    pub team: String,
    pub level: u32,
    pub stats: StatBlock,
    pub current_hp: i32,
    pub max_hp: i32,
    pub current_mp: i32,
    pub max_mp: i32,
    /// Tracked explicitly (not just derived) so a round can observe the
    /// "just died" transition before flags are refreshed.
    pub is_alive: bool,
    pub pending: Option<TurnSubmission>,
    /// Cumulative per-body-part damage, flavor data rather than authority
    pub body_damage: HashMap<BodyPart, i32>,
    pub fatigue: i32,
    pub active_effects: Vec<ActiveEffect>,
    /// Set by the PvE defend action; halves incoming damage for the round
    pub defending: bool,
}

impl BattleParticipant {
    pub fn new(
        actor: Actor,
        name: impl Into<String>,
        team: impl Into<String>,
        level: u32,
        stats: StatBlock,
        max_hp: i32,
        max_mp: i32,
    ) -> Self {
        BattleParticipant {
            id: ParticipantId(0), // assigned by the store on create
            actor,
            name: name.into(),
            team: team.into(),
            level,
            stats,
            current_hp: max_hp,
            max_hp,
            current_mp: max_mp,
            max_mp,
            is_alive: max_hp > 0,
            pending: None,
            body_damage: HashMap::new(),
            fatigue: 0,
            active_effects: Vec::new(),
            defending: false,
        }
    }

    /// Resource pools as the skill executor sees them
    pub fn resource_pools(&self) -> HashMap<Resource, i32> {
        HashMap::from([
            (Resource::Mana, self.current_mp),
            (Resource::Stamina, (100 - self.fatigue).max(0)),
        ])
    }

    /// Current shield absorption across all active shield effects
    pub fn shield_pool(&self) -> i32 {
        self.active_effects
            .iter()
            .map(|e| match e {
                ActiveEffect::Shield { remaining, .. } => *remaining,
                _ => 0,
            })
            .sum()
    }

    /// Apply incoming damage: shields soak first, the rest hits HP and is
    /// recorded against the struck body part.
    pub fn apply_damage(&mut self, amount: i32, part: Option<BodyPart>) -> DamageApplied {
        let mut applied = DamageApplied::default();
        if amount <= 0 || !self.is_alive {
            return applied;
        }

        let mut remaining_damage = amount;
        for effect in self.active_effects.iter_mut() {
            if remaining_damage == 0 {
                break;
            }
            if let ActiveEffect::Shield { remaining, .. } = effect {
                let soaked = remaining_damage.min(*remaining);
                *remaining -= soaked;
                remaining_damage -= soaked;
                applied.absorbed += soaked;
            }
        }
        self.active_effects.retain(|e| !matches!(e, ActiveEffect::Shield { remaining: 0, .. }));

        if remaining_damage > 0 {
            *self.body_damage.entry(part.unwrap_or(BodyPart::Torso)).or_insert(0) += remaining_damage;
            self.current_hp -= remaining_damage;
            applied.dealt = remaining_damage;
            if self.current_hp <= 0 {
                self.current_hp = 0;
                if self.is_alive {
                    self.is_alive = false;
                    applied.killing_blow = true;
                }
            }
        }
        applied
    }

    /// Apply healing, clamped to max HP. Returns HP actually restored.
    pub fn apply_healing(&mut self, amount: i32) -> i32 {
        if amount <= 0 || !self.is_alive {
            return 0;
        }
        let restored = amount.min(self.max_hp - self.current_hp);
        self.current_hp += restored;
        restored
    }

    /// Spend mana. Callers validate affordability first.
    pub fn spend_mana(&mut self, amount: i32) {
        self.current_mp = (self.current_mp - amount).max(0);
    }

    /// Tick pre-existing damage-over-time effects, applying their damage.
    /// Returns log lines for each tick.
    pub fn tick_dots(&mut self) -> Vec<String> {
        let ticks: Vec<(i32, String)> = self
            .active_effects
            .iter()
            .filter_map(|e| match e {
                ActiveEffect::Dot { damage_per_round, rounds_left, source } if *rounds_left > 0 => {
                    Some((*damage_per_round, source.clone()))
                }
                _ => None,
            })
            .collect();

        let mut lines = Vec::new();
        for (damage, source) in ticks {
            let applied = self.apply_damage(damage, None);
            if applied.dealt > 0 || applied.absorbed > 0 {
                lines.push(format!("{} suffers {} damage from {}!", self.name, damage, source));
            }
            if applied.killing_blow {
                lines.push(format!("{} has fallen!", self.name));
            }
        }
        lines
    }

    /// End-of-round decay: timed stat modifiers, dots and shields lose one
    /// round, expired ones are dropped, the defend flag clears.
    pub fn decay_effects(&mut self) {
        self.stats.tick_round();
        for effect in self.active_effects.iter_mut() {
            match effect {
                ActiveEffect::Dot { rounds_left, .. } => *rounds_left = rounds_left.saturating_sub(1),
                ActiveEffect::Shield { rounds_left, .. } => *rounds_left = rounds_left.saturating_sub(1),
            }
        }
        self.active_effects.retain(|e| match e {
            ActiveEffect::Dot { rounds_left, .. } => *rounds_left > 0,
            ActiveEffect::Shield { rounds_left, remaining } => *rounds_left > 0 && *remaining > 0,
        });
        self.defending = false;
    }
}

impl Combatant for BattleParticipant {
    fn name(&self) -> &str {
        &self.name
    }
    fn stats(&self) -> &StatBlock {
        &self.stats
    }
    fn current_hp(&self) -> i32 {
        self.current_hp
    }
    fn max_hp(&self) -> i32 {
        self.max_hp
    }
}

/// Category of a combat log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    System,
    Attack,
    Defend,
    Skill,
    Death,
    Reward,
}

/// Append-only log line attached to a battle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatLogEntry {
    pub battle: BattleId,
    pub round_number: u32,
    /// Strictly increasing within a round, starting at 1; assigned by the
    /// store on append.
    pub sequence: u32,
    pub message: String,
    pub log_type: LogType,
    pub damage_amount: Option<i32>,
}

impl CombatLogEntry {
    pub fn new(
        battle: BattleId,
        round_number: u32,
        message: impl Into<String>,
        log_type: LogType,
        damage_amount: Option<i32>,
    ) -> Self {
        CombatLogEntry {
            battle,
            round_number,
            sequence: 0,
            message: message.into(),
            log_type,
            damage_amount,
        }
    }
}

/// Helper for deterministic initiative: higher Initiative acts first,
/// Agility breaks ties, insertion order breaks the rest.
pub fn initiative_key(participant: &BattleParticipant) -> (i32, i32) {
    (
        -participant.stats.effective(Stat::Initiative),
        -participant.stats.effective(Stat::Agility),
    )
}
