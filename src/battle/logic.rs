//! Encounter state machine: stage start, answer resolution, deferred
//! enemy/spawn steps, hints and stage-end rewards.
//!
//! Every function takes `&mut GameState` and appends human-readable lines to
//! the encounter log; the front end only renders state.

use log::{debug, info};
use rand::Rng;

use super::leveling::add_exp;
use super::mastery::{record_correct, ProgressStore};
use super::reading::{classify_reading_type, is_correct, nearest_reading_type, normalize, ReadingType};
use super::selector::pick_next;
use super::state::{
    Action, AnswerOutcome, Continuation, EncounterState, GameState, KanjiItem, PlayerStats,
    ShieldEffect, StagePhase, StageReport, Turn,
};
use crate::bonus::{
    bonus_grade, calc_bonus_reward, calc_fail_xp, clear_key, is_first_clear,
    mark_bonus_first_clear, BonusRunStats,
};
use crate::catalog::Catalog;
use crate::config::BattleConfig;
use crate::error::BattleError;
use crate::store::{AchievementSink, KeyValueStore};

const PLAYER_NAME: &str = "プレイヤー";

// ── Stage lifecycle ───────────────────────────────────────────

/// Build a fresh encounter for `stage_id`, spawn the first enemy and ask
/// the first question. Any previous encounter is discarded.
pub fn start_stage(state: &mut GameState, stage_id: &str) -> Result<(), BattleError> {
    // Stored ids use the catalog's casing so persisted keys stay stable.
    let (stage_id, stage_name) = match state.catalog.stage(stage_id) {
        Some(s) => (s.stage_id.clone(), s.name.clone()),
        None => return Err(BattleError::UnknownStage(stage_id.to_string())),
    };
    let enemies = state.catalog.enemies_for_stage(&stage_id);
    if enemies.is_empty() {
        return Err(BattleError::NoEnemies(stage_id));
    }
    let pool = state.catalog.kanji_for_stage(&stage_id);
    if pool.is_empty() {
        return Err(BattleError::NoKanjiAvailable);
    }

    leave_stage(state);

    let mut enc = EncounterState::new(&stage_id, enemies, pool);
    enc.bonus_grade = bonus_grade(&stage_id);
    enc.onyomi_pool = typed_pool(&state.catalog, &enc.kanji_pool, ReadingType::Onyomi);
    enc.kunyomi_pool = typed_pool(&state.catalog, &enc.kanji_pool, ReadingType::Kunyomi);

    state.player.hp = state.player.max_hp;
    state.player.heal_count = state.config.start_heal_count;

    info!(
        "stage {} start: {} enemies, {} kanji ({} on / {} kun)",
        stage_id,
        enc.enemies.len(),
        enc.kanji_pool.len(),
        enc.onyomi_pool.len(),
        enc.kunyomi_pool.len()
    );
    enc.add_log(&format!("{stage_name} にとうちゃく！"));
    spawn_current(&mut enc);
    ask_question(&mut enc, &state.catalog, &state.progress, &state.config, &mut state.rng)?;
    state.encounter = Some(enc);
    Ok(())
}

fn typed_pool(catalog: &Catalog, pool: &[String], kind: ReadingType) -> Vec<String> {
    pool.iter()
        .filter(|id| catalog.kanji(id).is_some_and(|k| !k.readings(kind).is_empty()))
        .cloned()
        .collect()
}

/// Drop the running encounter along with any pending step. Returns the
/// step that was cancelled, if one was waiting.
pub fn leave_stage(state: &mut GameState) -> Option<Continuation> {
    let mut enc = state.encounter.take()?;
    let cancelled = enc.pending.cancel();
    debug!("left stage {} (cancelled {:?})", enc.stage_id, cancelled);
    cancelled
}

/// Consume a finished encounter and pay out its rewards.
///
/// - ordinary clear: sets `clear_{stageId}`
/// - bonus clear: scored by `calc_bonus_reward`, XP awarded, first clear marked
/// - bonus failure: partial XP for the fights won
/// - ordinary failure: nothing
pub fn finish_stage(
    state: &mut GameState,
    store: &mut dyn KeyValueStore,
    sink: &mut dyn AchievementSink,
) -> Result<StageReport, BattleError> {
    match &state.encounter {
        None => return Err(BattleError::NoActiveEncounter),
        Some(enc) if enc.phase == StagePhase::InProgress => {
            return Err(BattleError::StageInProgress)
        }
        Some(_) => {}
    }
    let enc = state.encounter.take().ok_or(BattleError::NoActiveEncounter)?;

    let cleared = enc.phase == StagePhase::Cleared;
    let accuracy_pct = enc.accuracy_pct();
    let remaining_hp_pct = if state.player.max_hp == 0 {
        0.0
    } else {
        state.player.hp as f64 * 100.0 / state.player.max_hp as f64
    };

    let mut report = StageReport {
        stage_id: enc.stage_id.clone(),
        cleared,
        enemies_defeated: enc.enemies_defeated,
        accuracy_pct,
        remaining_hp_pct,
        xp_awarded: 0,
        level_up: None,
        bonus: None,
    };

    match (cleared, enc.bonus_grade) {
        (true, None) => store.set(&clear_key(&enc.stage_id), "1"),
        (true, Some(grade)) => {
            let stats = BonusRunStats {
                grade,
                fights: enc.enemies.len() as u32,
                accuracy_pct,
                rem_hp_pct: remaining_hp_pct,
                first_clear: is_first_clear(&*store, grade),
            };
            let reward = calc_bonus_reward(&stats, store, sink);
            report.xp_awarded = reward.xp;
            mark_bonus_first_clear(store, grade);
            report.bonus = Some(reward);
        }
        (false, Some(grade)) => report.xp_awarded = calc_fail_xp(grade, enc.enemies_defeated),
        (false, None) => {}
    }

    if report.xp_awarded > 0 {
        report.level_up = Some(add_exp(&mut state.player, &state.config, report.xp_awarded));
    }
    info!(
        "stage {} finished: cleared={} acc={:.0}% hp={:.0}% xp={}",
        report.stage_id, cleared, accuracy_pct, remaining_hp_pct, report.xp_awarded
    );
    Ok(report)
}

// ── Spawning / questions ──────────────────────────────────────

fn spawn_current(enc: &mut EncounterState) {
    let Some(enemy) = enc.current_enemy_mut() else {
        return;
    };
    enemy.respawn();
    let name = enemy.name.clone();
    let (is_boss, shielded) = (enemy.is_boss, enemy.is_shielded());

    if is_boss {
        enc.add_log(&format!("ボス {name} があらわれた！"));
        if shielded {
            enc.add_log(&format!("{name}は防御態勢をとっている！"));
        }
    } else {
        enc.add_log(&format!("{name} があらわれた！"));
    }
}

fn ask_question<R: Rng>(
    enc: &mut EncounterState,
    catalog: &Catalog,
    progress: &ProgressStore,
    config: &BattleConfig,
    rng: &mut R,
) -> Result<(), BattleError> {
    let id = pick_next(enc, progress, config.recent_capacity, rng)?;
    if let Some(k) = catalog.kanji(&id) {
        enc.add_log(&format!("「{}」をよもう！", k.text));
    }
    enc.turn = Turn::Player;
    enc.input_enabled = true;
    Ok(())
}

// ── Answer resolution ─────────────────────────────────────────

/// Damage for a correct attack before any shield override.
///
/// Order: mastery doubling, ±jitter (rounded), weakness, combo; each
/// multiplier step floors.
pub fn roll_damage<R: Rng>(
    config: &BattleConfig,
    attack: u32,
    weakness_hit: bool,
    combo_bonus: bool,
    mastery_bonus: bool,
    rng: &mut R,
) -> u32 {
    let mut base = attack as f64;
    if mastery_bonus {
        base = (base * config.mastery_multiplier).floor();
    }
    let jitter = if config.damage_jitter > 0.0 {
        rng.gen_range(-config.damage_jitter..=config.damage_jitter)
    } else {
        0.0
    };
    let mut dmg = (base * (1.0 + jitter)).round();
    if weakness_hit {
        dmg = (dmg * config.weakness_multiplier).floor();
    }
    if combo_bonus {
        dmg = (dmg * config.combo_multiplier).floor();
    }
    dmg.max(0.0) as u32
}

/// Count a correct answer toward the combo. True when it completes one.
fn bump_combo(enc: &mut EncounterState, config: &BattleConfig) -> bool {
    let cap = config.combo_cap.max(1);
    enc.combo_count = (enc.combo_count + 1).min(cap);
    enc.combo_timer = config.combo_timeout;
    if enc.combo_count >= cap {
        enc.combo_count = 0;
        enc.combo_timer = 0;
        true
    } else {
        false
    }
}

fn reset_combo(enc: &mut EncounterState) {
    enc.combo_count = 0;
    enc.combo_timer = 0;
}

/// Submit a typed answer for the current question.
///
/// Only accepted on the player's turn with input enabled. Locks input and
/// schedules the next step (enemy turn or next spawn); the caller drives it
/// with [`tick`] or [`run_pending`].
pub fn submit_answer(
    state: &mut GameState,
    raw: &str,
    action: Action,
) -> Result<AnswerOutcome, BattleError> {
    let GameState { config, catalog, progress, player, encounter, rng } = state;
    let enc = encounter.as_mut().ok_or(BattleError::NoActiveEncounter)?;

    if enc.phase != StagePhase::InProgress || enc.turn != Turn::Player || !enc.input_enabled {
        return Err(BattleError::InputDisabled);
    }
    let kanji = enc
        .current_kanji
        .as_deref()
        .and_then(|id| catalog.kanji(id))
        .cloned()
        .ok_or(BattleError::NoCurrentKanji)?;
    if action == Action::Heal && player.heal_count == 0 {
        return Err(BattleError::NoHealsLeft);
    }

    let answer = normalize(raw);
    let correct = is_correct(&kanji, &answer);
    let mut outcome = AnswerOutcome::new(action, correct);
    let reading_msg = kanji.reading_message();
    debug!("answer {:?} for {} ({:?}): {}", answer, kanji.text, action, correct);

    enc.input_enabled = false;
    enc.turn = Turn::Enemy;

    if correct {
        enc.stage_correct += 1;
        player.total_correct += 1;
        if let Some(k) = catalog.kanji_mut(&kanji.id) {
            k.correct_count += 1;
        }
        outcome.newly_mastered = record_correct(progress, &kanji, &answer);
        outcome.combo_bonus = bump_combo(enc, config);
    } else {
        enc.stage_incorrect += 1;
        player.total_incorrect += 1;
        if let Some(k) = catalog.kanji_mut(&kanji.id) {
            k.incorrect_count += 1;
        }
        reset_combo(enc);
        outcome.hint = Some(nearest_reading_type(&kanji, &answer));
    }

    match (action, correct) {
        (Action::Attack, true) => {
            resolve_attack(enc, player, config, rng, &kanji, &answer, &reading_msg, &mut outcome)
        }
        (Action::Heal, true) => resolve_heal(enc, player, config, &kanji, &answer, &reading_msg, &mut outcome),
        (Action::Attack, false) => enc.add_log(&format!("こうげきしっぱい！{reading_msg}")),
        (Action::Heal, false) => enc.add_log(&format!("かいふくしっぱい！{reading_msg}")),
    }
    if outcome.newly_mastered {
        info!("kanji mastered: {}", kanji.text);
        enc.add_log(&format!("ぜんぶよめた！「{}」がマスターかんじになった！", kanji.text));
    }

    if outcome.enemy_defeated {
        handle_defeat(enc, player, config, &mut outcome);
    } else {
        enc.pending.schedule(Continuation::EnemyTurn, config.enemy_turn_delay);
    }
    Ok(outcome)
}

#[allow(clippy::too_many_arguments)]
fn resolve_attack<R: Rng>(
    enc: &mut EncounterState,
    player: &mut PlayerStats,
    config: &BattleConfig,
    rng: &mut R,
    kanji: &KanjiItem,
    answer: &str,
    reading_msg: &str,
    outcome: &mut AnswerOutcome,
) {
    let Some(weakness) = enc.current_enemy().map(|e| e.weakness) else {
        return;
    };
    outcome.reading = classify_reading_type(kanji, answer).map(|c| c.resolve(weakness));
    outcome.weakness_hit = outcome.reading == Some(weakness);
    outcome.mastery_bonus = std::mem::take(&mut enc.mastery_bonus_active);
    if outcome.weakness_hit {
        player.weakness_hits += 1;
    }

    let mut dmg = roll_damage(
        config,
        player.attack,
        outcome.weakness_hit,
        outcome.combo_bonus,
        outcome.mastery_bonus,
        rng,
    );

    let mut lines = Vec::new();
    if outcome.mastery_bonus {
        lines.push("マスターかんじボーナス！2ばい！".to_string());
    }
    if outcome.weakness_hit {
        lines.push("弱点にヒット！大ダメージ！".to_string());
    }
    if outcome.combo_bonus {
        lines.push("れんぞくせいかいボーナス！".to_string());
    }

    let idx = enc.current_enemy_index;
    let Some(enemy) = enc.enemies.get_mut(idx) else {
        return;
    };
    if enemy.is_shielded() {
        if outcome.weakness_hit {
            enemy.shield_hp -= 1;
            dmg = 0;
            outcome.shield = Some(ShieldEffect::Cracked { remaining: enemy.shield_hp });
            lines.push(format!("せいかい！{reading_msg}"));
            lines.push("シールドにヒビが入った！".to_string());
            if enemy.shield_hp == 0 {
                lines.push("ボスの防御が崩れた！".to_string());
            }
        } else {
            dmg = 1;
            outcome.shield = Some(ShieldEffect::Deflected);
            lines.push(format!("せいかい！{reading_msg}、しかし{}の防御は固い！", enemy.name));
        }
    } else {
        lines.push(format!("せいかい！{reading_msg}、{}に{dmg}のダメージ！", enemy.name));
    }

    enemy.hp = enemy.hp.saturating_sub(dmg);
    outcome.damage = dmg;
    outcome.enemy_defeated = enemy.is_defeated();
    enc.log.extend(lines);
}

fn resolve_heal(
    enc: &mut EncounterState,
    player: &mut PlayerStats,
    config: &BattleConfig,
    kanji: &KanjiItem,
    answer: &str,
    reading_msg: &str,
    outcome: &mut AnswerOutcome,
) {
    if let Some(weakness) = enc.current_enemy().map(|e| e.weakness) {
        outcome.reading = classify_reading_type(kanji, answer).map(|c| c.resolve(weakness));
    }

    let mut amount = config.heal_amount(player.level);
    if outcome.combo_bonus {
        amount = (amount as f64 * config.combo_multiplier).floor() as u32;
        enc.add_log("れんぞくせいかいボーナス！");
    }
    let before = player.hp;
    player.heal(amount);
    outcome.healed = player.hp - before;
    player.heal_count = player.heal_count.saturating_sub(1);
    player.heals_successful += 1;
    enc.add_log(&format!("かいふくせいこう！{reading_msg}"));
    enc.add_log(&format!("HPが{}かいふくした！（のこり{}回）", outcome.healed, player.heal_count));
}

fn handle_defeat(
    enc: &mut EncounterState,
    player: &mut PlayerStats,
    config: &BattleConfig,
    outcome: &mut AnswerOutcome,
) {
    let Some((name, is_boss, exp)) = enc.current_enemy().map(|e| (e.name.clone(), e.is_boss, e.exp))
    else {
        return;
    };
    enc.add_log(&format!("{PLAYER_NAME}は{name}をたおした！"));
    enc.enemies_defeated += 1;
    if is_boss {
        player.bosses_defeated += 1;
    }

    // Bonus stages pay out once at the end instead.
    let gained = if enc.is_bonus() { 0 } else { exp };
    if gained > 0 {
        enc.add_log(&format!("{gained}の経験値を獲得した！"));
        let lu = add_exp(player, config, gained);
        if lu.leveled_up {
            enc.add_log(&format!("レベルが {} にあがった！", lu.new_level));
            enc.add_log("攻撃力が上がった！ HP最大値が増えた！");
        }
        outcome.level_up = Some(lu);
    }

    info!(
        "defeated {} ({}/{})",
        name,
        enc.enemies_defeated,
        enc.enemies.len()
    );
    if enc.has_next_enemy() {
        enc.pending.schedule(Continuation::SpawnNext, config.spawn_delay);
    } else {
        enc.phase = StagePhase::Cleared;
        enc.add_log("ステージクリア！");
    }
}

// ── Deferred steps ────────────────────────────────────────────

fn enemy_attack(enc: &mut EncounterState, player: &mut PlayerStats) {
    let Some((name, atk)) = enc.current_enemy().map(|e| (e.name.clone(), e.atk)) else {
        return;
    };
    enc.add_log(&format!("{name} のこうげき！{PLAYER_NAME}に{atk}のダメージ！"));
    player.take_damage(atk);
    if player.hp == 0 {
        enc.phase = StagePhase::Failed;
        enc.input_enabled = false;
        enc.add_log(&format!("{PLAYER_NAME}はたおれてしまった…"));
        info!("stage {} failed", enc.stage_id);
    }
}

fn run_step(state: &mut GameState, step: Continuation) -> Result<(), BattleError> {
    let GameState { config, catalog, progress, player, encounter, rng } = state;
    let enc = encounter.as_mut().ok_or(BattleError::NoActiveEncounter)?;
    debug!("run {:?}", step);

    match step {
        Continuation::EnemyTurn => {
            enemy_attack(enc, player);
            if enc.phase == StagePhase::InProgress {
                enc.pending.schedule(Continuation::ResumePlayer, config.resume_delay);
            }
        }
        Continuation::ResumePlayer => ask_question(enc, catalog, progress, config, rng)?,
        Continuation::SpawnNext => {
            enc.current_enemy_index += 1;
            spawn_current(enc);
            if enc.is_bonus() && config.bonus_interlude_heal > 0.0 {
                let amount = (player.max_hp as f64 * config.bonus_interlude_heal).floor() as u32;
                player.heal(amount);
                enc.add_log(&format!(
                    "連戦の合間にHPが回復した！（+{:.0}%）",
                    config.bonus_interlude_heal * 100.0
                ));
            }
            ask_question(enc, catalog, progress, config, rng)?;
        }
    }
    Ok(())
}

/// Advance game time by `delta_ticks`. Runs the pending step if it came
/// due and returns it. Expires the combo when its timer runs out.
pub fn tick(state: &mut GameState, delta_ticks: u32) -> Result<Option<Continuation>, BattleError> {
    let Some(enc) = state.encounter.as_mut() else {
        return Ok(None);
    };

    if enc.combo_timer > 0 {
        enc.combo_timer = enc.combo_timer.saturating_sub(delta_ticks);
        if enc.combo_timer == 0 {
            debug!("combo expired at {}", enc.combo_count);
            enc.combo_count = 0;
        }
    }

    match enc.pending.advance(delta_ticks) {
        Some(step) => {
            run_step(state, step)?;
            Ok(Some(step))
        }
        None => Ok(None),
    }
}

/// Run every pending step immediately, in order, until the encounter waits
/// for player input or ends.
pub fn run_pending(state: &mut GameState) -> Result<Vec<Continuation>, BattleError> {
    let mut ran = Vec::new();
    while let Some(step) = state.encounter.as_mut().and_then(|e| e.pending.take_now()) {
        run_step(state, step)?;
        ran.push(step);
    }
    Ok(ran)
}

// ── Hints ─────────────────────────────────────────────────────

fn reading_hint(kanji: &KanjiItem, weakness: ReadingType) -> String {
    [weakness, weakness.other()]
        .into_iter()
        .find_map(|kind| {
            let first = kanji.readings(kind).first()?.chars().next()?;
            Some(format!("ヒント（読み）: {}は「{first}○○」から始まる", kind.label()))
        })
        .unwrap_or_else(|| "ヒント（読み）: よみが見つからない".to_string())
}

/// Step the hint for the current question: hidden → strokes → first
/// character of a reading → meaning → hidden. Returns the logged line.
pub fn cycle_hint(state: &mut GameState) -> Result<String, BattleError> {
    let GameState { catalog, encounter, .. } = state;
    let enc = encounter.as_mut().ok_or(BattleError::NoActiveEncounter)?;
    let kanji = enc
        .current_kanji
        .as_deref()
        .and_then(|id| catalog.kanji(id))
        .ok_or(BattleError::NoCurrentKanji)?;

    enc.hint_level = (enc.hint_level + 1) % 4;
    let weakness = enc.current_enemy().map_or(ReadingType::Kunyomi, |e| e.weakness);
    let msg = match enc.hint_level {
        1 => format!("ヒント（基本）: 画数は{}", kanji.strokes),
        2 => reading_hint(kanji, weakness),
        3 => format!("ヒント（意味）: {}", kanji.meaning),
        _ => "ヒントを非表示にした".to_string(),
    };
    enc.add_log(&msg);
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::state::Enemy;
    use crate::catalog::Stage;
    use crate::store::{MemoryAchievements, MemoryStore};

    fn yama() -> KanjiItem {
        let mut k = KanjiItem::new("k-yama", "山", &["さん"], &["やま"]);
        k.strokes = 3;
        k.meaning = "mountain".into();
        k
    }

    fn enemy(id: &str, hp: u32, atk: u32, is_boss: bool, shield: u32) -> Enemy {
        Enemy {
            id: id.into(),
            name: format!("敵{id}"),
            hp,
            max_hp: hp,
            atk,
            exp: 30,
            weakness: ReadingType::Onyomi,
            is_boss,
            shield_hp: 0,
            original_shield_hp: shield,
        }
    }

    fn game_with(enemies: Vec<Enemy>, kanji: Vec<KanjiItem>) -> GameState {
        let stage = Stage {
            stage_id: "s1".into(),
            name: "テストの森".into(),
            grade: 1,
            region: String::new(),
            enemy_ids: enemies.iter().map(|e| e.id.clone()).collect(),
        };
        let catalog = Catalog::from_parts(kanji, enemies, vec![stage]).unwrap();
        let config = BattleConfig { damage_jitter: 0.0, ..BattleConfig::default() };
        GameState::with_seed(config, catalog, 42)
    }

    /// Regular enemy first, shieldless boss last.
    fn started(hp: u32) -> GameState {
        let mut state =
            game_with(vec![enemy("a", hp, 5, false, 0), enemy("b", hp, 5, true, 0)], vec![yama()]);
        start_stage(&mut state, "s1").unwrap();
        state
    }

    fn enc(state: &GameState) -> &EncounterState {
        state.encounter.as_ref().unwrap()
    }

    #[test]
    fn start_spawns_and_asks() {
        let state = started(50);
        let e = enc(&state);
        assert!(e.input_enabled);
        assert_eq!(e.turn, Turn::Player);
        assert_eq!(e.current_kanji.as_deref(), Some("k-yama"));
        assert!(e.log.iter().any(|l| l == "敵a があらわれた！"));
        assert_eq!(e.log.last().map(String::as_str), Some("「山」をよもう！"));
        assert_eq!(e.onyomi_pool, vec!["k-yama"]);
        assert_eq!(e.kunyomi_pool, vec!["k-yama"]);
    }

    #[test]
    fn unknown_stage_is_rejected() {
        let mut state = started(50);
        assert_eq!(
            start_stage(&mut state, "nowhere"),
            Err(BattleError::UnknownStage("nowhere".into()))
        );
        // The running encounter is left alone.
        assert!(state.encounter.is_some());
    }

    #[test]
    fn weakness_hit_multiplies() {
        let mut state = started(100);
        let out = submit_answer(&mut state, "サン", Action::Attack).unwrap();
        assert!(out.correct);
        assert!(out.weakness_hit);
        assert_eq!(out.reading, Some(ReadingType::Onyomi));
        assert_eq!(out.damage, 15);
        assert_eq!(enc(&state).current_enemy().unwrap().hp, 85);
        assert_eq!(state.player.weakness_hits, 1);
    }

    #[test]
    fn non_weakness_hit_is_plain() {
        let mut state = started(100);
        let out = submit_answer(&mut state, " やま ", Action::Attack).unwrap();
        assert!(!out.weakness_hit);
        assert_eq!(out.damage, 10);
    }

    #[test]
    fn wrong_answer_resets_combo_and_hints() {
        let mut state = started(100);
        submit_answer(&mut state, "さん", Action::Attack).unwrap();
        run_pending(&mut state).unwrap();
        assert_eq!(enc(&state).combo_count, 1);

        let out = submit_answer(&mut state, "やも", Action::Attack).unwrap();
        assert!(!out.correct);
        assert_eq!(out.damage, 0);
        assert_eq!(out.hint, Some(ReadingType::Kunyomi));
        assert_eq!(enc(&state).combo_count, 0);
        assert_eq!(enc(&state).stage_incorrect, 1);
        assert_eq!(state.catalog.kanji("k-yama").unwrap().incorrect_count, 1);
        assert!(enc(&state).log.iter().any(|l| l.starts_with("こうげきしっぱい！")));
    }

    #[test]
    fn input_locked_until_step_runs() {
        let mut state = started(100);
        submit_answer(&mut state, "さん", Action::Attack).unwrap();
        assert_eq!(
            submit_answer(&mut state, "さん", Action::Attack),
            Err(BattleError::InputDisabled)
        );
        assert_eq!(
            run_pending(&mut state).unwrap(),
            vec![Continuation::EnemyTurn, Continuation::ResumePlayer]
        );
        assert_eq!(state.player.hp, 95);
        assert!(enc(&state).input_enabled);
        assert!(submit_answer(&mut state, "さん", Action::Attack).is_ok());
    }

    #[test]
    fn tick_drives_steps_with_delays() {
        let mut state = started(100);
        submit_answer(&mut state, "やま", Action::Attack).unwrap();
        assert_eq!(tick(&mut state, 9).unwrap(), None);
        assert_eq!(tick(&mut state, 1).unwrap(), Some(Continuation::EnemyTurn));
        assert!(!enc(&state).input_enabled);
        assert_eq!(tick(&mut state, 14).unwrap(), None);
        assert_eq!(tick(&mut state, 1).unwrap(), Some(Continuation::ResumePlayer));
        assert!(enc(&state).input_enabled);
    }

    #[test]
    fn combo_bonus_fires_once_at_five() {
        let mut state = started(1000);
        let mut bonuses = Vec::new();
        for _ in 0..6 {
            let out = submit_answer(&mut state, "やま", Action::Attack).unwrap();
            bonuses.push(out.combo_bonus);
            if out.combo_bonus {
                assert_eq!(out.damage, 15);
                assert_eq!(enc(&state).combo_count, 0);
            }
            run_pending(&mut state).unwrap();
        }
        assert_eq!(bonuses, vec![false, false, false, false, true, false]);
        assert_eq!(enc(&state).combo_count, 1);
    }

    #[test]
    fn boss_shield_absorbs_weakness_hits() {
        let mut state = game_with(vec![enemy("boss", 100, 1, true, 2)], vec![yama()]);
        start_stage(&mut state, "s1").unwrap();
        assert!(enc(&state).log.iter().any(|l| l == "敵bossは防御態勢をとっている！"));

        for remaining in [1, 0] {
            let out = submit_answer(&mut state, "さん", Action::Attack).unwrap();
            assert_eq!(out.shield, Some(ShieldEffect::Cracked { remaining }));
            assert_eq!(out.damage, 0);
            assert_eq!(enc(&state).current_enemy().unwrap().hp, 100);
            run_pending(&mut state).unwrap();
        }
        assert!(enc(&state).log.iter().any(|l| l == "ボスの防御が崩れた！"));

        let out = submit_answer(&mut state, "さん", Action::Attack).unwrap();
        assert_eq!(out.shield, None);
        assert_eq!(out.damage, 15);
    }

    #[test]
    fn shielded_boss_takes_one_from_off_type() {
        let mut state = game_with(vec![enemy("boss", 100, 1, true, 3)], vec![yama()]);
        start_stage(&mut state, "s1").unwrap();
        let out = submit_answer(&mut state, "やま", Action::Attack).unwrap();
        assert_eq!(out.shield, Some(ShieldEffect::Deflected));
        assert_eq!(out.damage, 1);
        let boss = enc(&state).current_enemy().unwrap();
        assert_eq!(boss.hp, 99);
        assert_eq!(boss.shield_hp, 3);
    }

    #[test]
    fn defeat_awards_exp_and_spawns_next() {
        let mut state = started(10);
        let out = submit_answer(&mut state, "さん", Action::Attack).unwrap();
        assert!(out.enemy_defeated);
        assert_eq!(out.level_up, Some(crate::battle::state::LevelUp { leveled_up: false, new_level: 1 }));
        assert_eq!(state.player.exp, 30);
        assert_eq!(enc(&state).pending.pending(), Some(Continuation::SpawnNext));

        assert_eq!(run_pending(&mut state).unwrap(), vec![Continuation::SpawnNext]);
        let e = enc(&state);
        assert_eq!(e.current_enemy_index, 1);
        assert!(e.log.iter().any(|l| l == "ボス 敵b があらわれた！"));
        assert!(e.input_enabled);
        // No enemy attack after a kill.
        assert_eq!(state.player.hp, 100);
    }

    #[test]
    fn last_kill_clears_stage() {
        let mut state = started(10);
        submit_answer(&mut state, "さん", Action::Attack).unwrap();
        run_pending(&mut state).unwrap();
        let out = submit_answer(&mut state, "さん", Action::Attack).unwrap();
        assert!(out.enemy_defeated);
        let e = enc(&state);
        assert_eq!(e.phase, StagePhase::Cleared);
        assert!(e.pending.is_idle());
        assert!(!e.input_enabled);
        assert_eq!(e.enemies_defeated, 2);
        assert_eq!(state.player.bosses_defeated, 1);
    }

    #[test]
    fn player_defeat_fails_stage() {
        let mut state = game_with(
            vec![enemy("a", 100, 500, false, 0), enemy("b", 100, 5, true, 0)],
            vec![yama()],
        );
        start_stage(&mut state, "s1").unwrap();
        submit_answer(&mut state, "ちがう", Action::Attack).unwrap();
        assert_eq!(run_pending(&mut state).unwrap(), vec![Continuation::EnemyTurn]);
        assert_eq!(state.player.hp, 0);
        assert_eq!(enc(&state).phase, StagePhase::Failed);
        assert_eq!(
            submit_answer(&mut state, "さん", Action::Attack),
            Err(BattleError::InputDisabled)
        );

        let mut store = MemoryStore::new();
        let mut sink = MemoryAchievements::new();
        let report = finish_stage(&mut state, &mut store, &mut sink).unwrap();
        assert!(!report.cleared);
        assert_eq!(report.xp_awarded, 0);
        assert!(store.is_empty());
        assert!(state.encounter.is_none());
    }

    #[test]
    fn heal_restores_and_uses_a_charge() {
        let mut state = started(100);
        state.player.hp = 50;
        let out = submit_answer(&mut state, "やま", Action::Heal).unwrap();
        assert!(out.correct);
        assert_eq!(out.healed, 32);
        assert_eq!(out.damage, 0);
        assert_eq!(state.player.hp, 82);
        assert_eq!(state.player.heal_count, 2);
        assert_eq!(state.player.heals_successful, 1);
        // Heal still hands the turn to the enemy.
        assert_eq!(enc(&state).pending.pending(), Some(Continuation::EnemyTurn));
    }

    #[test]
    fn failed_heal_keeps_charge() {
        let mut state = started(100);
        let out = submit_answer(&mut state, "ちがう", Action::Heal).unwrap();
        assert!(!out.correct);
        assert_eq!(out.healed, 0);
        assert_eq!(state.player.heal_count, 3);
    }

    #[test]
    fn heal_without_charges_is_rejected() {
        let mut state = started(100);
        state.player.heal_count = 0;
        assert_eq!(
            submit_answer(&mut state, "やま", Action::Heal),
            Err(BattleError::NoHealsLeft)
        );
        // Nothing changed; input still open.
        assert!(enc(&state).input_enabled);
        assert_eq!(enc(&state).stage_correct, 0);
    }

    #[test]
    fn mastery_arms_double_damage_once() {
        let mut state = started(1000);
        let out = submit_answer(&mut state, "さん", Action::Attack).unwrap();
        assert!(!out.newly_mastered);
        run_pending(&mut state).unwrap();
        let out = submit_answer(&mut state, "やま", Action::Attack).unwrap();
        assert!(out.newly_mastered);
        run_pending(&mut state).unwrap();
        assert!(enc(&state).mastery_bonus_active);

        let out = submit_answer(&mut state, "やま", Action::Attack).unwrap();
        assert!(out.mastery_bonus);
        assert_eq!(out.damage, 20);
        assert!(!enc(&state).mastery_bonus_active);
    }

    #[test]
    fn combo_expires_after_timeout() {
        let mut state = started(1000);
        state.config.combo_timeout = 20;
        submit_answer(&mut state, "やま", Action::Attack).unwrap();
        assert_eq!(enc(&state).combo_count, 1);
        tick(&mut state, 19).unwrap();
        assert_eq!(enc(&state).combo_count, 1);
        tick(&mut state, 1).unwrap();
        assert_eq!(enc(&state).combo_count, 0);
    }

    #[test]
    fn leave_stage_cancels_pending() {
        let mut state = started(100);
        submit_answer(&mut state, "やま", Action::Attack).unwrap();
        assert_eq!(leave_stage(&mut state), Some(Continuation::EnemyTurn));
        assert!(state.encounter.is_none());
        assert_eq!(tick(&mut state, 100).unwrap(), None);
        assert_eq!(state.player.hp, 100);
        assert_eq!(leave_stage(&mut state), None);
    }

    #[test]
    fn hint_cycles_through_levels() {
        let mut state = started(100);
        assert_eq!(cycle_hint(&mut state).unwrap(), "ヒント（基本）: 画数は3");
        assert_eq!(
            cycle_hint(&mut state).unwrap(),
            "ヒント（読み）: 音読みは「さ○○」から始まる"
        );
        assert_eq!(cycle_hint(&mut state).unwrap(), "ヒント（意味）: mountain");
        assert_eq!(cycle_hint(&mut state).unwrap(), "ヒントを非表示にした");
        assert_eq!(enc(&state).hint_level, 0);
    }

    #[test]
    fn hint_falls_back_to_other_reading_type() {
        let mut k = yama();
        k.onyomi.clear();
        let mut state = game_with(vec![enemy("a", 10, 1, true, 0)], vec![k]);
        start_stage(&mut state, "s1").unwrap();
        cycle_hint(&mut state).unwrap();
        assert_eq!(
            cycle_hint(&mut state).unwrap(),
            "ヒント（読み）: 訓読みは「や○○」から始まる"
        );
    }

    #[test]
    fn acting_without_a_question_is_rejected() {
        let mut state = started(100);
        state.encounter.as_mut().unwrap().current_kanji = None;
        let before = state.encounter.clone();

        assert_eq!(
            submit_answer(&mut state, "さん", Action::Attack),
            Err(BattleError::NoCurrentKanji)
        );
        assert_eq!(cycle_hint(&mut state), Err(BattleError::NoCurrentKanji));
        assert_eq!(state.encounter, before);
        assert_eq!(state.player.hp, 100);
        assert_eq!(state.player.total_correct + state.player.total_incorrect, 0);
    }

    #[test]
    fn stage_id_takes_catalog_casing() {
        let mut state = started(10);
        start_stage(&mut state, "S1").unwrap();
        assert_eq!(enc(&state).stage_id, "s1");
    }

    #[test]
    fn finish_requires_terminal_phase() {
        let mut state = started(100);
        let mut store = MemoryStore::new();
        let mut sink = MemoryAchievements::new();
        assert_eq!(
            finish_stage(&mut state, &mut store, &mut sink),
            Err(BattleError::StageInProgress)
        );
        assert!(state.encounter.is_some());
    }

    #[test]
    fn ordinary_clear_sets_flag() {
        let mut state = started(10);
        submit_answer(&mut state, "さん", Action::Attack).unwrap();
        run_pending(&mut state).unwrap();
        submit_answer(&mut state, "さん", Action::Attack).unwrap();

        let mut store = MemoryStore::new();
        let mut sink = MemoryAchievements::new();
        let report = finish_stage(&mut state, &mut store, &mut sink).unwrap();
        assert!(report.cleared);
        assert_eq!(report.accuracy_pct, 100.0);
        assert_eq!(report.remaining_hp_pct, 100.0);
        assert!(report.bonus.is_none());
        assert_eq!(store.get("clear_s1").as_deref(), Some("1"));
    }

    #[test]
    fn roll_damage_order() {
        let cfg = BattleConfig { damage_jitter: 0.0, ..BattleConfig::default() };
        let mut rng = rand::thread_rng();
        assert_eq!(roll_damage(&cfg, 10, false, false, false, &mut rng), 10);
        assert_eq!(roll_damage(&cfg, 10, true, false, false, &mut rng), 15);
        assert_eq!(roll_damage(&cfg, 10, true, true, false, &mut rng), 22);
        assert_eq!(roll_damage(&cfg, 10, true, true, true, &mut rng), 45);
        assert_eq!(roll_damage(&cfg, 7, false, false, true, &mut rng), 14);
    }

    #[test]
    fn roll_damage_stays_in_jitter_band() {
        let cfg = BattleConfig::default();
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let d = roll_damage(&cfg, 100, false, false, false, &mut rng);
            assert!((90..=110).contains(&d), "{d}");
        }
    }
}
