//! EncounterBuilder - assemble and persist multi-participant battles
//!
//! The PvE service only ever builds "one player, one NPC". Everything
//! else (duels, team PvP, arena matches) goes through this builder: add
//! participants to named teams, then `build` validates the lineup, orders
//! it by initiative and creates the battle atomically.

use tracing::warn;

use crate::battle::{
    initiative_key, Actor, Battle, BattleId, BattleParticipant, BattleType, CharacterId,
    CombatLogEntry, LogType,
};
use crate::ports::{payloads, BattleStore, Notifier, NpcTemplate, Rejection};
use crate::pve::PlayerProfile;
use combat_core::stat_block::StatBlock;
use combat_core::types::Stat;

/// Staged battle setup, consumed by [`EncounterBuilder::build`]
pub struct EncounterBuilder {
    battle_type: BattleType,
    started_at: u64,
    initiator: Option<CharacterId>,
    participants: Vec<BattleParticipant>,
}

impl EncounterBuilder {
    pub fn new(battle_type: BattleType, started_at: u64) -> Self {
        EncounterBuilder {
            battle_type,
            started_at,
            initiator: None,
            participants: Vec::new(),
        }
    }

    /// Add a player character to a team. The first player added becomes
    /// the battle's initiator.
    pub fn player(mut self, team: impl Into<String>, profile: &PlayerProfile) -> Self {
        if self.initiator.is_none() {
            self.initiator = Some(profile.id);
        }
        let mut participant = BattleParticipant::new(
            Actor::Player(profile.id),
            profile.name.clone(),
            team,
            profile.level,
            profile.stats.clone(),
            profile.max_hp,
            profile.max_mp,
        );
        participant.current_hp = profile.current_hp;
        participant.is_alive = profile.current_hp > 0;
        self.participants.push(participant);
        self
    }

    /// Add an NPC from a template to a team
    pub fn npc(mut self, team: impl Into<String>, template: &NpcTemplate) -> Self {
        let level = template.level as i32;
        let stats = StatBlock::with_base([
            (Stat::Attack, template.attack.unwrap_or(level * 2)),
            (Stat::Defense, template.defense.unwrap_or(level)),
            (Stat::Agility, template.agility.unwrap_or(level)),
        ]);
        let participant = BattleParticipant::new(
            Actor::Npc(template.id),
            template.name.clone(),
            team,
            template.level,
            stats,
            template.health.unwrap_or(level * 12 + 20),
            0,
        );
        self.participants.push(participant);
        self
    }

    /// Validate the lineup and persist the battle.
    ///
    /// Participants are stored in initiative order. Every player in the
    /// lineup gets a `combat_started` notification; the opening log line
    /// is persisted soft-fail like all log writes.
    pub fn build<S: BattleStore>(
        mut self,
        store: &S,
        notifier: &dyn Notifier,
    ) -> Result<BattleId, Rejection> {
        let initiator = self
            .initiator
            .ok_or_else(|| Rejection::new("At least one player is required"))?;
        if self.participants.len() < 2 {
            return Err(Rejection::new("At least two participants are required"));
        }
        let mut teams: Vec<&str> = self.participants.iter().map(|p| p.team.as_str()).collect();
        teams.sort_unstable();
        teams.dedup();
        if teams.len() < 2 {
            return Err(Rejection::new("At least two teams are required"));
        }
        if self.participants.iter().any(|p| !p.is_alive) {
            return Err(Rejection::new("Defeated characters cannot enter combat"));
        }

        self.participants.sort_by_key(initiative_key);
        let names: Vec<String> = self.participants.iter().map(|p| p.name.clone()).collect();
        let players: Vec<CharacterId> = self
            .participants
            .iter()
            .filter_map(|p| p.actor.character())
            .collect();

        let battle = Battle::new(self.battle_type, initiator, self.started_at);
        let battle_id = store.create_battle(battle, self.participants)?;

        let opening = format!("Combat begins: {}!", names.join(" vs "));
        let entry = CombatLogEntry::new(battle_id, 1, opening, LogType::System, None);
        if let Err(err) = store.append_log(battle_id, entry) {
            warn!(battle = battle_id.0, error = %err, "failed to persist combat log entry");
        }

        let record = store.read_battle(battle_id)?;
        for character in players {
            notifier.publish(
                &payloads::character_channel(character),
                payloads::combat_started(&record.battle),
            );
        }
        Ok(battle_id)
    }
}
