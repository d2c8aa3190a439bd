//! Combat constants configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use tracing::info;

use super::ConfigError;

/// Global combat constants instance
static COMBAT_CONSTANTS: OnceLock<CombatConstants> = OnceLock::new();

/// Initialize the global combat constants from a TOML file
///
/// Must be called once at startup before any combat calculations.
/// Returns error if already initialized or if loading fails.
pub fn init_constants(path: &Path) -> Result<(), ConfigError> {
    let constants = CombatConstants::load_from_path(path)?;
    info!(path = %path.display(), "combat constants loaded");
    COMBAT_CONSTANTS
        .set(constants)
        .map_err(|_| ConfigError::ValidationError("CombatConstants already initialized".to_string()))
}

/// Initialize the global combat constants with default values
///
/// Useful for tests or when no config file is available.
pub fn init_constants_default() -> Result<(), ConfigError> {
    COMBAT_CONSTANTS
        .set(CombatConstants::default())
        .map_err(|_| ConfigError::ValidationError("CombatConstants already initialized".to_string()))
}

/// Get a reference to the global combat constants
///
/// Panics if constants have not been initialized via `init_constants()` or `init_constants_default()`.
pub fn constants() -> &'static CombatConstants {
    COMBAT_CONSTANTS
        .get()
        .expect("CombatConstants not initialized - call init_constants() or init_constants_default() first")
}

/// Check if constants have been initialized
pub fn constants_initialized() -> bool {
    COMBAT_CONSTANTS.get().is_some()
}

/// Ensure constants are initialized with defaults (idempotent, useful for tests)
pub fn ensure_constants_initialized() {
    COMBAT_CONSTANTS.get_or_init(CombatConstants::default);
}

/// Tunable combat constants
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombatConstants {
    #[serde(default)]
    pub crit: CritConstants,
    #[serde(default)]
    pub evasion: EvasionConstants,
    #[serde(default)]
    pub action_points: ActionPointConstants,
    #[serde(default)]
    pub mitigation: MitigationConstants,
    #[serde(default)]
    pub flee: FleeConstants,
    #[serde(default)]
    pub rewards: RewardConstants,
    #[serde(default)]
    pub rating: RatingConstants,
}

impl CombatConstants {
    /// Load constants from a TOML file
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let constants: CombatConstants = toml::from_str(&content)?;
        Ok(constants)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CritConstants {
    /// Damage multiplier applied on a critical hit (1.5 = 150%)
    #[serde(default = "default_crit_multiplier")]
    pub multiplier: f64,
}

impl Default for CritConstants {
    fn default() -> Self {
        CritConstants { multiplier: 1.5 }
    }
}

fn default_crit_multiplier() -> f64 {
    1.5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvasionConstants {
    /// Luck + evasion must exceed this before any dodge chance accrues
    #[serde(default = "default_evasion_threshold")]
    pub threshold: i32,
    /// Dodge chance per point above the threshold (0.005 = 0.5%)
    #[serde(default = "default_evasion_per_point")]
    pub chance_per_point: f64,
    /// Hard cap on dodge chance
    #[serde(default = "default_evasion_cap")]
    pub max_chance: f64,
}

impl Default for EvasionConstants {
    fn default() -> Self {
        EvasionConstants {
            threshold: 10,
            chance_per_point: 0.005,
            max_chance: 0.35,
        }
    }
}

fn default_evasion_threshold() -> i32 {
    10
}
fn default_evasion_per_point() -> f64 {
    0.005
}
fn default_evasion_cap() -> f64 {
    0.35
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPointConstants {
    /// Per-round action point budget for attacks and blocks
    #[serde(default = "default_ap_budget")]
    pub budget: i32,
    /// Cost of a simple attack
    #[serde(default = "default_simple_attack_cost")]
    pub simple_attack: i32,
    /// Cost of an aimed attack (targets a chosen body part)
    #[serde(default = "default_aimed_attack_cost")]
    pub aimed_attack: i32,
    /// Cost of blocking one body part
    #[serde(default = "default_block_cost")]
    pub block: i32,
}

impl Default for ActionPointConstants {
    fn default() -> Self {
        ActionPointConstants {
            budget: 80,
            simple_attack: 20,
            aimed_attack: 30,
            block: 15,
        }
    }
}

fn default_ap_budget() -> i32 {
    80
}
fn default_simple_attack_cost() -> i32 {
    20
}
fn default_aimed_attack_cost() -> i32 {
    30
}
fn default_block_cost() -> i32 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MitigationConstants {
    /// Damage reduction when a hit lands on a blocked body part (percent)
    #[serde(default = "default_block_percent")]
    pub block_percent: f64,
    /// Damage reduction while defending for the round (percent)
    #[serde(default = "default_defend_percent")]
    pub defend_percent: f64,
}

impl Default for MitigationConstants {
    fn default() -> Self {
        MitigationConstants {
            block_percent: 50.0,
            defend_percent: 50.0,
        }
    }
}

fn default_block_percent() -> f64 {
    50.0
}
fn default_defend_percent() -> f64 {
    50.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleeConstants {
    /// Base chance to escape a PvE encounter
    #[serde(default = "default_flee_base")]
    pub base_chance: f64,
    /// Chance adjustment per point of agility difference (player - enemy)
    #[serde(default = "default_flee_step")]
    pub agility_step: f64,
    /// Lower clamp on flee chance
    #[serde(default = "default_flee_min")]
    pub min_chance: f64,
    /// Upper clamp on flee chance
    #[serde(default = "default_flee_max")]
    pub max_chance: f64,
}

impl Default for FleeConstants {
    fn default() -> Self {
        FleeConstants {
            base_chance: 0.5,
            agility_step: 0.05,
            min_chance: 0.1,
            max_chance: 0.9,
        }
    }
}

fn default_flee_base() -> f64 {
    0.5
}
fn default_flee_step() -> f64 {
    0.05
}
fn default_flee_min() -> f64 {
    0.1
}
fn default_flee_max() -> f64 {
    0.9
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConstants {
    /// Base XP per enemy level
    #[serde(default = "default_xp_per_level")]
    pub xp_per_level: i64,
    /// Base gold per enemy level
    #[serde(default = "default_gold_per_level")]
    pub gold_per_level: i64,
    /// Flat gold added on top of the per-level amount
    #[serde(default = "default_gold_base")]
    pub gold_base: i64,
    /// Reward multiplier step per level of difference (enemy - player)
    #[serde(default = "default_level_step")]
    pub level_multiplier_step: f64,
    /// Floor for the level-difference multiplier
    #[serde(default = "default_multiplier_floor")]
    pub multiplier_floor: f64,
    /// Cap for the level-difference multiplier
    #[serde(default = "default_multiplier_cap")]
    pub multiplier_cap: f64,
}

impl Default for RewardConstants {
    fn default() -> Self {
        RewardConstants {
            xp_per_level: 10,
            gold_per_level: 2,
            gold_base: 5,
            level_multiplier_step: 0.1,
            multiplier_floor: 0.5,
            multiplier_cap: 2.0,
        }
    }
}

fn default_xp_per_level() -> i64 {
    10
}
fn default_gold_per_level() -> i64 {
    2
}
fn default_gold_base() -> i64 {
    5
}
fn default_level_step() -> f64 {
    0.1
}
fn default_multiplier_floor() -> f64 {
    0.5
}
fn default_multiplier_cap() -> f64 {
    2.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingConstants {
    /// Elo K-factor for arena rating adjustments
    #[serde(default = "default_k_factor")]
    pub k_factor: f64,
    /// Rating assigned to characters with no recorded rating
    #[serde(default = "default_initial_rating")]
    pub initial_rating: i32,
}

impl Default for RatingConstants {
    fn default() -> Self {
        RatingConstants {
            k_factor: 32.0,
            initial_rating: 1200,
        }
    }
}

fn default_k_factor() -> f64 {
    32.0
}
fn default_initial_rating() -> i32 {
    1200
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constants() {
        let constants = CombatConstants::default();
        assert!((constants.crit.multiplier - 1.5).abs() < f64::EPSILON);
        assert_eq!(constants.action_points.budget, 80);
        assert_eq!(constants.rewards.xp_per_level, 10);
        assert!((constants.rating.k_factor - 32.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_constants() {
        let toml = r#"
[crit]
multiplier = 2.0

[action_points]
budget = 100
simple_attack = 25

[flee]
base_chance = 0.4
"#;

        let constants: CombatConstants = toml::from_str(toml).unwrap();
        assert!((constants.crit.multiplier - 2.0).abs() < f64::EPSILON);
        assert_eq!(constants.action_points.budget, 100);
        assert_eq!(constants.action_points.aimed_attack, 30);
        assert!((constants.flee.base_chance - 0.4).abs() < f64::EPSILON);
        // untouched sections fall back to defaults
        assert_eq!(constants.rewards.gold_base, 5);
    }
}
