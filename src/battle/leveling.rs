//! Experience curve and level-up.

use log::info;

use super::state::{LevelUp, PlayerStats};
use crate::config::BattleConfig;

/// Exp needed to advance past `level`:
/// `exp_for_level(1) = 100`, `exp_for_level(L) = floor(exp_for_level(L-1) * 1.2) + 20`.
/// Levels below 1 are treated as 1.
pub fn exp_for_level(level: u32) -> u32 {
    (2..=level.max(1)).fold(100u32, |prev, _| prev * 6 / 5 + 20)
}

/// Add exp and level up at most once per call. Overflow past the threshold
/// carries into the new level.
pub fn add_exp(player: &mut PlayerStats, config: &BattleConfig, gained: u32) -> LevelUp {
    player.exp += gained;
    let needed = exp_for_level(player.level);
    if player.exp < needed {
        return LevelUp { leveled_up: false, new_level: player.level };
    }

    player.exp -= needed;
    player.level += 1;
    player.attack += config.level_up_attack.max(1);
    player.max_hp += config.level_up_max_hp.max(1);
    info!(
        "level up: lv{} atk={} max_hp={}",
        player.level, player.attack, player.max_hp
    );
    LevelUp { leveled_up: true, new_level: player.level }
}
