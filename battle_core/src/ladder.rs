//! ArenaLadder - Elo rating adjustments for arena battles
//!
//! The ladder is the only writer of ratings. Adjustments are zero-sum:
//! the winner gains exactly what the loser drops, and the gain is never
//! below one point even when the favorite wins.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use combat_core::config::constants;

use crate::battle::{BattleType, CharacterId};
use crate::ports::{BattleRecord, RatingStore};

/// Outcome of one ladder adjustment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingChange {
    pub winner: CharacterId,
    pub loser: CharacterId,
    /// Rating transferred from loser to winner
    pub delta: i32,
    pub winner_rating: i32,
    pub loser_rating: i32,
}

/// Applies Elo adjustments against a [`RatingStore`]
pub struct ArenaLadder {
    ratings: Arc<dyn RatingStore>,
}

impl ArenaLadder {
    pub fn new(ratings: Arc<dyn RatingStore>) -> Self {
        ArenaLadder { ratings }
    }

    /// Adjust both ratings for a decided match.
    ///
    /// Standard Elo expectation with the configured K-factor; the delta
    /// is floored at 1 so a win always moves the ladder.
    pub fn apply(&self, winner: CharacterId, loser: CharacterId) -> RatingChange {
        let winner_before = self.ratings.rating(winner);
        let loser_before = self.ratings.rating(loser);

        let expected = 1.0 / (1.0 + 10f64.powf((loser_before - winner_before) as f64 / 400.0));
        let k = constants().rating.k_factor;
        let delta = ((k * (1.0 - expected)).round() as i32).max(1);

        let winner_rating = winner_before + delta;
        let loser_rating = loser_before - delta;
        self.ratings.set_rating(winner, winner_rating);
        self.ratings.set_rating(loser, loser_rating);
        info!(
            winner = winner.0,
            loser = loser.0,
            delta,
            winner_rating,
            loser_rating,
            "arena ratings adjusted"
        );

        RatingChange { winner, loser, delta, winner_rating, loser_rating }
    }

    /// Adjust ratings from a completed arena battle record.
    ///
    /// Returns `None` unless the record is a decided arena battle between
    /// exactly one player per side.
    pub fn apply_to_battle(&self, record: &BattleRecord) -> Option<RatingChange> {
        if record.battle.battle_type != BattleType::Arena || !record.battle.is_terminal() {
            return None;
        }
        let winner_team = record.battle.winner_team.as_deref()?;

        let mut winner = None;
        let mut loser = None;
        for participant in &record.participants {
            let Some(character) = participant.actor.character() else { continue };
            let slot = if participant.team == winner_team { &mut winner } else { &mut loser };
            if slot.replace(character).is_some() {
                return None; // more than one player per side
            }
        }
        Some(self.apply(winner?, loser?))
    }
}
