//! Kanji Battle state: data structures only, no logic.

use std::collections::VecDeque;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::mastery::ProgressStore;
use super::reading::ReadingType;
use crate::catalog::Catalog;
use crate::config::BattleConfig;
use crate::time::Scheduler;

// ── Kanji ─────────────────────────────────────────────────────

/// A question card. Readings are stored normalized (hiragana, no spaces).
#[derive(Clone, Debug, PartialEq)]
pub struct KanjiItem {
    pub id: String,
    pub text: String,
    pub onyomi: Vec<String>,
    pub kunyomi: Vec<String>,
    pub strokes: u32,
    pub meaning: String,
    pub grade: u32,
    /// Lifetime counters, kept across encounters.
    pub correct_count: u32,
    pub incorrect_count: u32,
}

impl KanjiItem {
    pub fn new(id: &str, text: &str, onyomi: &[&str], kunyomi: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            onyomi: onyomi.iter().map(|s| s.to_string()).collect(),
            kunyomi: kunyomi.iter().map(|s| s.to_string()).collect(),
            strokes: 0,
            meaning: String::new(),
            grade: 1,
            correct_count: 0,
            incorrect_count: 0,
        }
    }

    pub fn readings(&self, kind: ReadingType) -> &[String] {
        match kind {
            ReadingType::Onyomi => &self.onyomi,
            ReadingType::Kunyomi => &self.kunyomi,
        }
    }

    /// `正しいよみ: 音「…」訓「…」`, appended to answer feedback.
    pub fn reading_message(&self) -> String {
        format!(
            "正しいよみ: 音「{}」訓「{}」",
            self.onyomi.join("、"),
            self.kunyomi.join("、")
        )
    }
}

// ── Enemies ───────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct Enemy {
    pub id: String,
    pub name: String,
    pub hp: u32,
    pub max_hp: u32,
    pub atk: u32,
    pub exp: u32,
    pub weakness: ReadingType,
    pub is_boss: bool,
    /// Only meaningful when `is_boss`.
    pub shield_hp: u32,
    pub original_shield_hp: u32,
}

impl Enemy {
    /// Full HP, shield back to its original value.
    pub fn respawn(&mut self) {
        self.hp = self.max_hp;
        self.shield_hp = if self.is_boss { self.original_shield_hp } else { 0 };
    }

    pub fn is_shielded(&self) -> bool {
        self.is_boss && self.shield_hp > 0
    }

    pub fn is_defeated(&self) -> bool {
        self.hp == 0
    }
}

// ── Player ────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct PlayerStats {
    pub level: u32,
    /// Progress inside the current level.
    pub exp: u32,
    pub hp: u32,
    pub max_hp: u32,
    pub attack: u32,
    pub heal_count: u32,

    // Session counters
    pub total_correct: u32,
    pub total_incorrect: u32,
    pub weakness_hits: u32,
    pub heals_successful: u32,
    pub bosses_defeated: u32,
}

impl PlayerStats {
    pub fn new(config: &BattleConfig) -> Self {
        Self {
            level: 1,
            exp: 0,
            hp: config.start_hp,
            max_hp: config.start_hp,
            attack: config.start_attack,
            heal_count: config.start_heal_count,
            total_correct: 0,
            total_incorrect: 0,
            weakness_hits: 0,
            heals_successful: 0,
            bosses_defeated: 0,
        }
    }

    pub fn heal(&mut self, amount: u32) {
        self.hp = (self.hp + amount).min(self.max_hp);
    }

    pub fn take_damage(&mut self, amount: u32) {
        self.hp = self.hp.saturating_sub(amount);
    }
}

// ── Encounter ─────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Turn {
    Player,
    Enemy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StagePhase {
    InProgress,
    /// Every enemy in the roster was defeated.
    Cleared,
    /// Player HP reached 0.
    Failed,
}

/// What the player does with a typed answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Attack,
    Heal,
}

/// Deferred steps run by the scheduler after a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Continuation {
    /// The current enemy attacks.
    EnemyTurn,
    /// Next question, input back on.
    ResumePlayer,
    /// Advance to the next enemy of the roster.
    SpawnNext,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EncounterState {
    pub stage_id: String,
    /// Set for grade-bonus stages.
    pub bonus_grade: Option<u32>,
    pub turn: Turn,
    pub phase: StagePhase,
    pub input_enabled: bool,
    pub combo_count: u32,
    /// Ticks left before the combo expires; 0 when not armed.
    pub combo_timer: u32,

    pub enemies: Vec<Enemy>,
    pub current_enemy_index: usize,

    pub kanji_pool: Vec<String>,
    pub onyomi_pool: Vec<String>,
    pub kunyomi_pool: Vec<String>,
    pub recent_kanji_ids: VecDeque<String>,
    pub current_kanji: Option<String>,
    /// One-shot: doubles the next correct attack.
    pub mastery_bonus_active: bool,
    /// 0 = hidden, 1 = strokes, 2 = first character, 3 = meaning.
    pub hint_level: u8,

    pub log: Vec<String>,
    pub pending: Scheduler<Continuation>,

    // Stage statistics
    pub stage_correct: u32,
    pub stage_incorrect: u32,
    pub enemies_defeated: u32,
}

impl EncounterState {
    pub fn new(stage_id: &str, enemies: Vec<Enemy>, kanji_pool: Vec<String>) -> Self {
        Self {
            stage_id: stage_id.to_string(),
            bonus_grade: None,
            turn: Turn::Player,
            phase: StagePhase::InProgress,
            input_enabled: false,
            combo_count: 0,
            combo_timer: 0,
            enemies,
            current_enemy_index: 0,
            kanji_pool,
            onyomi_pool: Vec::new(),
            kunyomi_pool: Vec::new(),
            recent_kanji_ids: VecDeque::new(),
            current_kanji: None,
            mastery_bonus_active: false,
            hint_level: 0,
            log: Vec::new(),
            pending: Scheduler::new(),
            stage_correct: 0,
            stage_incorrect: 0,
            enemies_defeated: 0,
        }
    }

    pub fn add_log(&mut self, text: &str) {
        self.log.push(text.to_string());
    }

    pub fn current_enemy(&self) -> Option<&Enemy> {
        self.enemies.get(self.current_enemy_index)
    }

    pub fn current_enemy_mut(&mut self) -> Option<&mut Enemy> {
        self.enemies.get_mut(self.current_enemy_index)
    }

    pub fn has_next_enemy(&self) -> bool {
        self.current_enemy_index + 1 < self.enemies.len()
    }

    pub fn is_bonus(&self) -> bool {
        self.bonus_grade.is_some()
    }

    /// Whole-percent accuracy over this stage's answers; 0 with no answers.
    pub fn accuracy_pct(&self) -> f64 {
        let total = self.stage_correct + self.stage_incorrect;
        if total == 0 {
            0.0
        } else {
            self.stage_correct as f64 * 100.0 / total as f64
        }
    }
}

// ── Submission results ────────────────────────────────────────

/// How a boss shield reacted to a correct attack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShieldEffect {
    /// Weakness hit: one shield point removed, no HP damage.
    Cracked { remaining: u32 },
    /// Non-weakness hit against an intact shield: flat 1 damage.
    Deflected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelUp {
    pub leveled_up: bool,
    pub new_level: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnswerOutcome {
    pub action: Action,
    pub correct: bool,
    /// Reading type credited for a correct answer (ambiguous resolved).
    pub reading: Option<ReadingType>,
    pub weakness_hit: bool,
    pub combo_bonus: bool,
    pub mastery_bonus: bool,
    pub shield: Option<ShieldEffect>,
    pub damage: u32,
    pub healed: u32,
    /// Reading type to highlight after a miss.
    pub hint: Option<ReadingType>,
    pub newly_mastered: bool,
    pub enemy_defeated: bool,
    pub level_up: Option<LevelUp>,
}

impl AnswerOutcome {
    pub(crate) fn new(action: Action, correct: bool) -> Self {
        Self {
            action,
            correct,
            reading: None,
            weakness_hit: false,
            combo_bonus: false,
            mastery_bonus: false,
            shield: None,
            damage: 0,
            healed: 0,
            hint: None,
            newly_mastered: false,
            enemy_defeated: false,
            level_up: None,
        }
    }
}

/// Stage-end contract handed to the UI after `finish_stage`.
#[derive(Clone, Debug, PartialEq)]
pub struct StageReport {
    pub stage_id: String,
    pub cleared: bool,
    pub enemies_defeated: u32,
    pub accuracy_pct: f64,
    pub remaining_hp_pct: f64,
    pub xp_awarded: u32,
    pub level_up: Option<LevelUp>,
    pub bonus: Option<crate::bonus::BonusReward>,
}

// ── Root Game State ───────────────────────────────────────────

pub struct GameState {
    pub config: BattleConfig,
    pub catalog: Catalog,
    pub progress: ProgressStore,
    pub player: PlayerStats,
    /// Present only while a stage is running (or awaiting `finish_stage`).
    pub encounter: Option<EncounterState>,
    pub rng: ChaCha8Rng,
}

impl GameState {
    pub fn new(config: BattleConfig, catalog: Catalog) -> Self {
        Self::with_rng(config, catalog, ChaCha8Rng::from_entropy())
    }

    pub fn with_seed(config: BattleConfig, catalog: Catalog, seed: u64) -> Self {
        Self::with_rng(config, catalog, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(config: BattleConfig, catalog: Catalog, rng: ChaCha8Rng) -> Self {
        let player = PlayerStats::new(&config);
        Self {
            config,
            catalog,
            progress: ProgressStore::new(),
            player,
            encounter: None,
            rng,
        }
    }
}
