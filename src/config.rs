//! Balance configuration.
//!
//! Every field has a default matching the shipped game, so a TOML file only
//! needs the keys it wants to override.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    // ── Damage ──
    pub weakness_multiplier: f64,
    pub combo_multiplier: f64,
    pub combo_cap: u32,
    /// Ticks a combo survives without a correct answer; 0 disables expiry.
    pub combo_timeout: u32,
    pub mastery_multiplier: f64,
    /// Half-width of the uniform damage jitter band (0.1 = ±10%).
    pub damage_jitter: f64,

    // ── Question selection ──
    pub recent_capacity: usize,

    // ── Enemy defaults for incomplete data ──
    pub default_shield_hp: u32,
    pub default_enemy_atk: u32,
    pub default_enemy_exp: u32,

    // ── Healing ──
    pub heal_base: u32,
    pub heal_per_level: f64,
    /// HP ratio restored between fights of a bonus stage.
    pub bonus_interlude_heal: f64,

    // ── Player ──
    pub start_hp: u32,
    pub start_attack: u32,
    pub start_heal_count: u32,
    pub level_up_attack: u32,
    pub level_up_max_hp: u32,

    // ── Scheduler delays (ticks, 10 ticks/sec) ──
    pub enemy_turn_delay: u32,
    pub resume_delay: u32,
    pub spawn_delay: u32,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            weakness_multiplier: 1.5,
            combo_multiplier: 1.5,
            combo_cap: 5,
            combo_timeout: 0,
            mastery_multiplier: 2.0,
            damage_jitter: 0.1,
            recent_capacity: 5,
            default_shield_hp: 3,
            default_enemy_atk: 5,
            default_enemy_exp: 30,
            heal_base: 30,
            heal_per_level: 2.5,
            bonus_interlude_heal: 0.3,
            start_hp: 100,
            start_attack: 10,
            start_heal_count: 3,
            level_up_attack: 2,
            level_up_max_hp: 10,
            enemy_turn_delay: 10,
            resume_delay: 15,
            spawn_delay: 5,
        }
    }
}

impl BattleConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// `30 + floor(level * 2.5)` with the shipped constants.
    pub fn heal_amount(&self, level: u32) -> u32 {
        self.heal_base + (level as f64 * self.heal_per_level).floor() as u32
    }
}
