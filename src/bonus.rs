//! Grade-bonus stages: scoring, XP, first-clear flags, title tiers.
//!
//! Persisted keys (values are decimal strings / `"1"`):
//! - `bonus_{grade}_clearCount`: S/A clears counted toward titles
//! - `bonus_{grade}_firstClear`: set once the grade's bonus stage is cleared
//! - `clear_{stageId}`: ordinary stage clear flags, read by the unlock check

use log::{debug, info};
use serde::Serialize;

use crate::catalog::Catalog;
use crate::store::{AchievementSink, KeyValueStore};

/// Clear counts that unlock a title, with the title prefix for each.
pub const TITLE_THRESHOLDS: [(u32, &str); 3] = [
    (3, "title_conqueror"),
    (5, "title_guardian"),
    (10, "title_champion"),
];

const BONUS_PREFIX: &str = "bonus_g";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Rank {
    S,
    A,
    B,
}

impl Rank {
    pub fn multiplier(self) -> f64 {
        match self {
            Rank::S => 1.5,
            Rank::A => 1.2,
            Rank::B => 1.0,
        }
    }

    /// B clears don't advance titles.
    pub fn counts_for_titles(self) -> bool {
        matches!(self, Rank::S | Rank::A)
    }
}

/// Aggregates of a finished bonus run.
#[derive(Clone, Debug, PartialEq)]
pub struct BonusRunStats {
    pub grade: u32,
    pub fights: u32,
    pub accuracy_pct: f64,
    pub rem_hp_pct: f64,
    pub first_clear: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TitleProgress {
    pub count: u32,
    /// Smallest threshold still above `count`; `None` once all titles are in reach.
    pub next_threshold: Option<u32>,
    /// Whether this run incremented the counter.
    pub gained: bool,
    /// Achievement ids newly unlocked by this run.
    pub titles_unlocked: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BonusReward {
    pub score: u32,
    pub rank: Rank,
    pub multiplier: f64,
    pub base_xp: u32,
    pub first_clear_bonus: u32,
    pub xp: u32,
    pub title_progress: TitleProgress,
}

// ── Stage id helpers ──────────────────────────────────────────

/// Matches `bonus_g<digits>`, ignoring case.
pub fn is_bonus_stage(stage_id: &str) -> bool {
    bonus_grade(stage_id).is_some()
}

pub fn bonus_grade(stage_id: &str) -> Option<u32> {
    let lower = stage_id.to_ascii_lowercase();
    let digits = lower.strip_prefix(BONUS_PREFIX)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Number of fights in a grade's bonus stage.
pub fn fights_for_grade(grade: u32) -> u32 {
    if grade <= 6 {
        3
    } else {
        4
    }
}

pub fn clear_key(stage_id: &str) -> String {
    format!("clear_{stage_id}")
}

fn clear_count_key(grade: u32) -> String {
    format!("bonus_{grade}_clearCount")
}

fn first_clear_key(grade: u32) -> String {
    format!("bonus_{grade}_firstClear")
}

// ── Unlock / first clear ──────────────────────────────────────

/// A grade's bonus stage opens once every ordinary stage of the grade is cleared.
pub fn is_bonus_unlocked(catalog: &Catalog, store: &dyn KeyValueStore, grade: u32) -> bool {
    let stages = catalog.stages_for_grade(grade);
    !stages.is_empty()
        && stages
            .iter()
            .all(|s| store.get(&clear_key(&s.stage_id)).as_deref() == Some("1"))
}

pub fn is_first_clear(store: &dyn KeyValueStore, grade: u32) -> bool {
    store.get(&first_clear_key(grade)).as_deref() != Some("1")
}

/// Returns true only on the call that sets the flag.
pub fn mark_bonus_first_clear(store: &mut dyn KeyValueStore, grade: u32) -> bool {
    if !is_first_clear(store, grade) {
        return false;
    }
    store.set(&first_clear_key(grade), "1");
    true
}

// ── Scoring ───────────────────────────────────────────────────

pub fn compute_score(accuracy_pct: f64, rem_hp_pct: f64) -> u32 {
    (0.6 * accuracy_pct + 0.4 * rem_hp_pct).floor().max(0.0) as u32
}

pub fn compute_rank(score: u32) -> Rank {
    if score >= 85 {
        Rank::S
    } else if score >= 70 {
        Rank::A
    } else {
        Rank::B
    }
}

fn base_xp(grade: u32, fights: u32) -> u32 {
    (60 + 10 * grade) * fights
}

/// Partial reward for a failed bonus run.
pub fn calc_fail_xp(grade: u32, cleared_fights: u32) -> u32 {
    (base_xp(grade, cleared_fights) as f64 * 0.4).floor() as u32
}

fn record_title_progress(
    store: &mut dyn KeyValueStore,
    sink: &mut dyn AchievementSink,
    grade: u32,
    rank: Rank,
) -> TitleProgress {
    let key = clear_count_key(grade);
    let mut count: u32 = store.get(&key).and_then(|v| v.parse().ok()).unwrap_or(0);
    let gained = rank.counts_for_titles();
    let mut titles_unlocked = Vec::new();

    if gained {
        count += 1;
        store.set(&key, &count.to_string());
        for (threshold, prefix) in TITLE_THRESHOLDS {
            if count >= threshold {
                let id = format!("{prefix}_g{grade}");
                if sink.unlock_achievement(&id) {
                    info!("title unlocked: {}", id);
                    titles_unlocked.push(id);
                }
            }
        }
    }

    let next_threshold = TITLE_THRESHOLDS
        .iter()
        .map(|(t, _)| *t)
        .find(|&t| count < t);

    TitleProgress { count, next_threshold, gained, titles_unlocked }
}

/// Score a cleared bonus run and update the persisted title counter.
pub fn calc_bonus_reward(
    stats: &BonusRunStats,
    store: &mut dyn KeyValueStore,
    sink: &mut dyn AchievementSink,
) -> BonusReward {
    let score = compute_score(stats.accuracy_pct, stats.rem_hp_pct);
    let rank = compute_rank(score);
    let multiplier = rank.multiplier();
    let base = base_xp(stats.grade, stats.fights);

    let (first_clear_bonus, xp) = if stats.first_clear {
        let bonus = 200 + 30 * stats.grade;
        (bonus, (base as f64 * multiplier + bonus as f64).floor() as u32)
    } else {
        (0, (base as f64 * 0.4 * multiplier).floor() as u32)
    };
    debug!(
        "bonus g{}: score={} rank={:?} base={} xp={}",
        stats.grade, score, rank, base, xp
    );

    let title_progress = record_title_progress(store, sink, stats.grade, rank);

    BonusReward {
        score,
        rank,
        multiplier,
        base_xp: base,
        first_clear_bonus,
        xp,
        title_progress,
    }
}
