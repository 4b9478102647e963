//! Weakness-biased question selection with recent-repeat avoidance.

use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use super::mastery::{is_mastered, ProgressStore};
use super::reading::ReadingType;
use super::state::EncounterState;
use crate::error::BattleError;

/// Candidates from one pool: ids not seen recently, or the whole pool if
/// every id is recent. `None` only for an empty pool.
fn candidates<'a>(pool: &'a [String], recent: &EncounterState) -> Option<Vec<&'a String>> {
    if pool.is_empty() {
        return None;
    }
    let fresh: Vec<&String> = pool
        .iter()
        .filter(|id| !recent.recent_kanji_ids.contains(*id))
        .collect();
    if fresh.is_empty() {
        Some(pool.iter().collect())
    } else {
        Some(fresh)
    }
}

/// Choose the next question for the current enemy and make it current.
///
/// Tries the enemy's weakness pool, then the other reading type's pool,
/// then the whole stage pool. Fails only when the stage pool is empty.
pub fn pick_next<R: Rng>(
    enc: &mut EncounterState,
    progress: &ProgressStore,
    capacity: usize,
    rng: &mut R,
) -> Result<String, BattleError> {
    let weakness = enc.current_enemy().map(|e| e.weakness);

    let chosen = {
        let tiers: Vec<(&[String], &str)> = match weakness {
            Some(w) => {
                let (primary, fallback) = match w {
                    ReadingType::Onyomi => (&enc.onyomi_pool, &enc.kunyomi_pool),
                    ReadingType::Kunyomi => (&enc.kunyomi_pool, &enc.onyomi_pool),
                };
                vec![
                    (primary.as_slice(), "primary"),
                    (fallback.as_slice(), "fallback"),
                    (enc.kanji_pool.as_slice(), "stage"),
                ]
            }
            None => vec![(enc.kanji_pool.as_slice(), "stage")],
        };

        let mut chosen = None;
        for (pool, name) in tiers {
            match candidates(pool, enc) {
                Some(list) => {
                    chosen = list.choose(rng).map(|id| (*id).clone());
                    debug!("picked from {} pool ({} candidates)", name, list.len());
                    break;
                }
                None => warn!("{} pool is empty, falling back", name),
            }
        }
        chosen
    };

    let id = chosen.ok_or(BattleError::NoKanjiAvailable)?;

    enc.recent_kanji_ids.push_back(id.clone());
    while enc.recent_kanji_ids.len() > capacity {
        enc.recent_kanji_ids.pop_front();
    }
    enc.current_kanji = Some(id.clone());
    enc.mastery_bonus_active = is_mastered(progress, &id);
    enc.hint_level = 0;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::mastery::record_correct;
    use crate::battle::state::{Enemy, KanjiItem};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn enemy(weakness: ReadingType) -> Enemy {
        Enemy {
            id: "e".into(),
            name: "e".into(),
            hp: 10,
            max_hp: 10,
            atk: 1,
            exp: 1,
            weakness,
            is_boss: false,
            shield_hp: 0,
            original_shield_hp: 0,
        }
    }

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i}")).collect()
    }

    fn encounter(on: Vec<String>, kun: Vec<String>, weakness: ReadingType) -> EncounterState {
        let mut all = on.clone();
        for id in &kun {
            if !all.contains(id) {
                all.push(id.clone());
            }
        }
        let mut enc = EncounterState::new("s", vec![enemy(weakness)], all);
        enc.onyomi_pool = on;
        enc.kunyomi_pool = kun;
        enc
    }

    #[test]
    fn picks_from_weakness_pool() {
        let mut enc = encounter(ids("on", 3), ids("kun", 3), ReadingType::Kunyomi);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let progress = ProgressStore::new();
        for _ in 0..50 {
            let id = pick_next(&mut enc, &progress, 5, &mut rng).unwrap();
            assert!(id.starts_with("kun"));
        }
    }

    #[test]
    fn empty_primary_falls_back_to_other_type() {
        let mut enc = encounter(ids("on", 3), vec![], ReadingType::Kunyomi);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let id = pick_next(&mut enc, &ProgressStore::new(), 5, &mut rng).unwrap();
        assert!(id.starts_with("on"));
    }

    #[test]
    fn both_typed_pools_empty_uses_stage_pool() {
        let mut enc = encounter(vec![], vec![], ReadingType::Onyomi);
        enc.kanji_pool = ids("any", 2);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let id = pick_next(&mut enc, &ProgressStore::new(), 5, &mut rng).unwrap();
        assert!(id.starts_with("any"));
    }

    #[test]
    fn empty_stage_pool_is_an_error() {
        let mut enc = encounter(vec![], vec![], ReadingType::Onyomi);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        assert_eq!(
            pick_next(&mut enc, &ProgressStore::new(), 5, &mut rng),
            Err(BattleError::NoKanjiAvailable)
        );
        assert!(enc.current_kanji.is_none());
    }

    #[test]
    fn all_recent_still_selects() {
        let mut enc = encounter(ids("on", 2), vec![], ReadingType::Onyomi);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let progress = ProgressStore::new();
        for _ in 0..10 {
            assert!(pick_next(&mut enc, &progress, 5, &mut rng).is_ok());
        }
        assert_eq!(enc.recent_kanji_ids.len(), 5);
    }

    #[test]
    fn recent_buffer_is_fifo_bounded() {
        let mut enc = encounter(ids("on", 8), vec![], ReadingType::Onyomi);
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let progress = ProgressStore::new();
        let mut picked = Vec::new();
        for _ in 0..7 {
            picked.push(pick_next(&mut enc, &progress, 5, &mut rng).unwrap());
        }
        let tail: Vec<String> = picked[2..].to_vec();
        let recent: Vec<String> = enc.recent_kanji_ids.iter().cloned().collect();
        assert_eq!(recent, tail);
    }

    #[test]
    fn mastered_pick_arms_bonus() {
        let mut enc = encounter(vec!["k".into()], vec![], ReadingType::Onyomi);
        let mut progress = ProgressStore::new();
        let k = KanjiItem::new("k", "山", &["さん"], &[]);
        record_correct(&mut progress, &k, "さん");
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        pick_next(&mut enc, &progress, 5, &mut rng).unwrap();
        assert!(enc.mastery_bonus_active);
        assert_eq!(enc.current_kanji.as_deref(), Some("k"));
    }

    #[test]
    fn unmastered_pick_clears_bonus() {
        let mut enc = encounter(vec!["k".into()], vec![], ReadingType::Onyomi);
        enc.mastery_bonus_active = true;
        enc.hint_level = 2;
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        pick_next(&mut enc, &ProgressStore::new(), 5, &mut rng).unwrap();
        assert!(!enc.mastery_bonus_active);
        assert_eq!(enc.hint_level, 0);
    }
}
