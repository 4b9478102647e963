//! Kanji / enemy / stage catalog.
//!
//! Source data is loose JSON: readings may be arrays or space-delimited
//! strings, a kanji may belong to one stage or several, and enemy stats are
//! sometimes missing. Everything is normalized once here so the battle code
//! only ever sees one shape.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use log::warn;
use serde::Deserialize;

use crate::battle::reading::{normalize, ReadingType};
use crate::battle::state::{Enemy, KanjiItem};
use crate::bonus::{bonus_grade, fights_for_grade, is_bonus_stage};
use crate::config::BattleConfig;
use crate::error::CatalogError;

/// Highest grade with a synthesized bonus stage.
pub const MAX_GRADE: u32 = 10;
/// Grades above this reuse the last elementary grade's kanji when they have none.
const LAST_ELEMENTARY_GRADE: u32 = 6;

// ── Raw JSON shapes ───────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum RawReadings {
    List(Vec<String>),
    Spaced(String),
}

impl RawReadings {
    fn into_normalized(self) -> Vec<String> {
        let raw: Vec<String> = match self {
            RawReadings::List(v) => v,
            RawReadings::Spaced(s) => s.split_whitespace().map(str::to_string).collect(),
        };
        let mut seen = HashSet::new();
        raw.iter()
            .map(|r| normalize(r))
            .filter(|r| !r.is_empty() && seen.insert(r.clone()))
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStageIds {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawKanji {
    id: String,
    kanji: String,
    #[serde(default)]
    onyomi: Option<RawReadings>,
    #[serde(default)]
    kunyomi: Option<RawReadings>,
    #[serde(default)]
    strokes: u32,
    #[serde(default)]
    meaning: String,
    #[serde(default)]
    grade: Option<u32>,
    #[serde(default)]
    stage_id: Option<RawStageIds>,
    #[serde(default)]
    correct_count: u32,
    #[serde(default)]
    incorrect_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnemy {
    id: String,
    name: String,
    max_hp: u32,
    #[serde(default)]
    atk: Option<u32>,
    #[serde(default)]
    exp: Option<u32>,
    #[serde(default)]
    weakness: Option<ReadingType>,
    #[serde(default)]
    is_boss: bool,
    #[serde(default)]
    shield_hp: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStage {
    stage_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    grade: u32,
    #[serde(default)]
    region: String,
    #[serde(default)]
    enemy_id_list: Vec<String>,
}

#[derive(Deserialize, Default)]
struct RawCatalog {
    #[serde(default)]
    kanji: Vec<RawKanji>,
    #[serde(default)]
    enemies: Vec<RawEnemy>,
    #[serde(default)]
    stages: Vec<RawStage>,
}

// ── Catalog ───────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct Stage {
    pub stage_id: String,
    pub name: String,
    pub grade: u32,
    pub region: String,
    pub enemy_ids: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    kanji: Vec<KanjiItem>,
    kanji_index: HashMap<String, usize>,
    /// Lower-cased stage id → kanji ids.
    stage_kanji: HashMap<String, Vec<String>>,
    enemies: Vec<Enemy>,
    stages: Vec<Stage>,
}

fn enemy_from_raw(raw: RawEnemy, config: &BattleConfig) -> Enemy {
    let weakness = raw.weakness.unwrap_or_else(|| {
        warn!("enemy {} has no weakness, defaulting to kunyomi", raw.id);
        ReadingType::Kunyomi
    });
    let shield = raw.shield_hp.unwrap_or(config.default_shield_hp);
    Enemy {
        id: raw.id,
        name: raw.name,
        hp: raw.max_hp,
        max_hp: raw.max_hp,
        atk: raw.atk.unwrap_or(config.default_enemy_atk),
        exp: raw.exp.unwrap_or(config.default_enemy_exp),
        weakness,
        is_boss: raw.is_boss,
        shield_hp: if raw.is_boss { shield } else { 0 },
        original_shield_hp: shield,
    }
}

fn bonus_stage_name(grade: u32) -> String {
    match grade {
        1..=6 => format!("{grade}年 学年ボーナス"),
        7 => "学年ボーナス（4級）".into(),
        8 => "学年ボーナス（3級）".into(),
        9 => "学年ボーナス（準2級）".into(),
        _ => "学年ボーナス（2級）".into(),
    }
}

fn bonus_stage_region(grade: u32) -> &'static str {
    match grade {
        1..=6 => "ボーナス",
        7 => "アジア",
        8 => "ヨーロッパ",
        9 => "アメリカ大陸",
        _ => "アフリカ大陸",
    }
}

impl Catalog {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Self::from_json_with(json, &BattleConfig::default())
    }

    /// Parse with enemy defaults (atk / exp / shield) taken from `config`.
    pub fn from_json_with(json: &str, config: &BattleConfig) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_str(json)?;

        let mut kanji = Vec::new();
        let mut assignments = Vec::new();
        for rk in raw.kanji {
            let onyomi = rk.onyomi.map(RawReadings::into_normalized).unwrap_or_default();
            let kunyomi = rk.kunyomi.map(RawReadings::into_normalized).unwrap_or_default();
            if onyomi.is_empty() && kunyomi.is_empty() {
                warn!("kanji {} ({}) has no readings, skipped", rk.id, rk.kanji);
                continue;
            }
            let stage_ids = match rk.stage_id {
                Some(RawStageIds::One(s)) => vec![s],
                Some(RawStageIds::Many(v)) => v,
                None => Vec::new(),
            };
            for sid in stage_ids {
                assignments.push((sid, rk.id.clone()));
            }
            kanji.push(KanjiItem {
                id: rk.id,
                text: rk.kanji,
                onyomi,
                kunyomi,
                strokes: rk.strokes,
                meaning: rk.meaning,
                grade: rk.grade.unwrap_or(1),
                correct_count: rk.correct_count,
                incorrect_count: rk.incorrect_count,
            });
        }

        let enemies = raw.enemies.into_iter().map(|e| enemy_from_raw(e, config)).collect();
        let stages = raw
            .stages
            .into_iter()
            .map(|s| Stage {
                stage_id: s.stage_id,
                name: s.name,
                grade: s.grade,
                region: s.region,
                enemy_ids: s.enemy_id_list,
            })
            .collect();

        let mut catalog = Self::from_parts(kanji, enemies, stages)?;
        for (stage_id, kanji_id) in assignments {
            catalog.assign_kanji_to_stage(&stage_id, &kanji_id);
        }
        Ok(catalog)
    }

    pub fn load(path: &Path, config: &BattleConfig) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_with(&text, config)
    }

    /// Build from already-normalized parts. Bonus stages for every grade are
    /// added unless present.
    pub fn from_parts(
        kanji: Vec<KanjiItem>,
        enemies: Vec<Enemy>,
        mut stages: Vec<Stage>,
    ) -> Result<Self, CatalogError> {
        let mut kanji_index = HashMap::new();
        for (i, k) in kanji.iter().enumerate() {
            if kanji_index.insert(k.id.clone(), i).is_some() {
                return Err(CatalogError::DuplicateId { kind: "kanji", id: k.id.clone() });
            }
        }
        let mut seen = HashSet::new();
        for e in &enemies {
            if !seen.insert(e.id.as_str()) {
                return Err(CatalogError::DuplicateId { kind: "enemy", id: e.id.clone() });
            }
        }
        let mut seen = HashSet::new();
        for s in &stages {
            if !seen.insert(s.stage_id.to_lowercase()) {
                return Err(CatalogError::DuplicateId { kind: "stage", id: s.stage_id.clone() });
            }
        }

        for grade in 1..=MAX_GRADE {
            let id = format!("bonus_g{grade}");
            if !stages.iter().any(|s| s.stage_id.eq_ignore_ascii_case(&id)) {
                stages.push(Stage {
                    stage_id: id,
                    name: bonus_stage_name(grade),
                    grade,
                    region: bonus_stage_region(grade).into(),
                    enemy_ids: Vec::new(),
                });
            }
        }

        Ok(Self {
            kanji,
            kanji_index,
            stage_kanji: HashMap::new(),
            enemies,
            stages,
        })
    }

    /// Attach a kanji to a stage. Stage ids are case-insensitive and a kanji
    /// is listed at most once per stage.
    pub fn assign_kanji_to_stage(&mut self, stage_id: &str, kanji_id: &str) {
        let ids = self.stage_kanji.entry(stage_id.to_lowercase()).or_default();
        if !ids.iter().any(|id| id == kanji_id) {
            ids.push(kanji_id.to_string());
        }
    }

    // ── Lookups ──

    pub fn kanji(&self, id: &str) -> Option<&KanjiItem> {
        self.kanji_index.get(id).map(|&i| &self.kanji[i])
    }

    pub fn kanji_mut(&mut self, id: &str) -> Option<&mut KanjiItem> {
        let i = *self.kanji_index.get(id)?;
        self.kanji.get_mut(i)
    }

    pub fn all_kanji(&self) -> &[KanjiItem] {
        &self.kanji
    }

    pub fn kanji_by_grade(&self, grade: u32) -> Vec<&KanjiItem> {
        let found: Vec<&KanjiItem> = self.kanji.iter().filter(|k| k.grade == grade).collect();
        if found.is_empty() && grade > LAST_ELEMENTARY_GRADE {
            return self.kanji_by_grade(LAST_ELEMENTARY_GRADE);
        }
        found
    }

    pub fn stage(&self, stage_id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.stage_id.eq_ignore_ascii_case(stage_id))
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Ordinary (non-bonus) stages of a grade.
    pub fn stages_for_grade(&self, grade: u32) -> Vec<&Stage> {
        self.stages
            .iter()
            .filter(|s| s.grade == grade && !is_bonus_stage(&s.stage_id))
            .collect()
    }

    pub fn enemy(&self, id: &str) -> Option<&Enemy> {
        self.enemies.iter().find(|e| e.id == id)
    }

    /// Kanji ids quizzed on a stage.
    pub fn kanji_for_stage(&self, stage_id: &str) -> Vec<String> {
        if let Some(grade) = bonus_grade(stage_id) {
            return self.kanji_by_grade(grade).iter().map(|k| k.id.clone()).collect();
        }
        if let Some(ids) = self.stage_kanji.get(&stage_id.to_lowercase()) {
            return ids.iter().filter(|id| self.kanji(id).is_some()).cloned().collect();
        }
        match self.stage(stage_id) {
            Some(stage) => self.kanji_by_grade(stage.grade).iter().map(|k| k.id.clone()).collect(),
            None => Vec::new(),
        }
    }

    /// Fresh enemy roster for a stage (full HP, shields reset). The last
    /// enemy of a stage is always a boss.
    pub fn enemies_for_stage(&self, stage_id: &str) -> Vec<Enemy> {
        let mut roster = match bonus_grade(stage_id) {
            Some(grade) => self.bonus_roster(grade),
            None => match self.stage(stage_id) {
                Some(stage) => stage
                    .enemy_ids
                    .iter()
                    .filter_map(|id| {
                        let found = self.enemy(id).cloned();
                        if found.is_none() {
                            warn!("stage {} references unknown enemy {}", stage_id, id);
                        }
                        found
                    })
                    .collect(),
                None => Vec::new(),
            },
        };

        if let Some(last) = roster.last_mut() {
            last.is_boss = true;
        }
        for e in &mut roster {
            e.respawn();
        }
        roster
    }

    /// One boss per ordinary stage of the grade, then the grade's other
    /// enemies by descending id, up to `fights_for_grade`.
    fn bonus_roster(&self, grade: u32) -> Vec<Enemy> {
        let fights = fights_for_grade(grade) as usize;
        let stages = self.stages_for_grade(grade);
        let mut picked: Vec<Enemy> = Vec::new();

        for stage in &stages {
            if picked.len() >= fights {
                break;
            }
            let members: Vec<&Enemy> =
                stage.enemy_ids.iter().filter_map(|id| self.enemy(id)).collect();
            let boss = members
                .iter()
                .find(|e| e.is_boss)
                .or_else(|| members.iter().max_by(|a, b| a.id.cmp(&b.id)));
            if let Some(boss) = boss {
                if !picked.iter().any(|p| p.id == boss.id) {
                    picked.push((*boss).clone());
                }
            }
        }

        if picked.len() < fights {
            let mut rest: Vec<&Enemy> = stages
                .iter()
                .flat_map(|s| s.enemy_ids.iter())
                .filter_map(|id| self.enemy(id))
                .collect();
            rest.sort_by(|a, b| b.id.cmp(&a.id));
            rest.dedup_by(|a, b| a.id == b.id);
            for e in rest {
                if picked.len() >= fights {
                    break;
                }
                if !picked.iter().any(|p| p.id == e.id) {
                    picked.push(e.clone());
                }
            }
        }

        for e in &mut picked {
            e.is_boss = true;
        }
        picked
    }
}
