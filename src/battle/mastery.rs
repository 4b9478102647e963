//! Per-kanji reading progress and the derived "mastered" flag.

use std::collections::{HashMap, HashSet};

use super::state::KanjiItem;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadingProgress {
    pub mastered_onyomi: HashSet<String>,
    pub mastered_kunyomi: HashSet<String>,
    /// Monotonic: never goes back to false within a session.
    pub mastered: bool,
}

/// Progress entries keyed by kanji id, created lazily on the first correct answer.
#[derive(Clone, Debug, Default)]
pub struct ProgressStore {
    entries: HashMap<String, ReadingProgress>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kanji_id: &str) -> Option<&ReadingProgress> {
        self.entries.get(kanji_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn mastered_count(&self) -> usize {
        self.entries.values().filter(|p| p.mastered).count()
    }
}

/// Credit a correct answer. Returns true exactly when this call made the
/// kanji mastered.
pub fn record_correct(store: &mut ProgressStore, kanji: &KanjiItem, answer: &str) -> bool {
    let prog = store.entries.entry(kanji.id.clone()).or_default();

    if kanji.kunyomi.iter().any(|r| r == answer) {
        prog.mastered_kunyomi.insert(answer.to_string());
    }
    if kanji.onyomi.iter().any(|r| r == answer) {
        prog.mastered_onyomi.insert(answer.to_string());
    }

    if prog.mastered {
        return false;
    }
    let all_kun = kanji.kunyomi.iter().all(|r| prog.mastered_kunyomi.contains(r));
    let all_on = kanji.onyomi.iter().all(|r| prog.mastered_onyomi.contains(r));
    prog.mastered = all_kun && all_on;
    prog.mastered
}

pub fn is_mastered(store: &ProgressStore, kanji_id: &str) -> bool {
    store.get(kanji_id).map(|p| p.mastered).unwrap_or(false)
}
