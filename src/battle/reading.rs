//! Reading normalization and answer matching.
//!
//! All readings stored on a [`KanjiItem`] are already in normalized form
//! (see `catalog`), so matching is plain string membership.

use serde::{Deserialize, Serialize};

use super::state::KanjiItem;

/// ァ..ヶ map onto ぁ..ゖ by a fixed offset.
const KATAKANA_FIRST: u32 = 0x30A1;
const KATAKANA_LAST: u32 = 0x30F6;
const KANA_OFFSET: u32 = 0x60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingType {
    Onyomi,
    Kunyomi,
}

impl ReadingType {
    pub fn other(self) -> Self {
        match self {
            ReadingType::Onyomi => ReadingType::Kunyomi,
            ReadingType::Kunyomi => ReadingType::Onyomi,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReadingType::Onyomi => "音読み",
            ReadingType::Kunyomi => "訓読み",
        }
    }
}

/// Which reading list an accepted answer came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadingClass {
    Onyomi,
    Kunyomi,
    /// The literal answer is listed as both an onyomi and a kunyomi.
    Ambiguous,
}

impl ReadingClass {
    /// Ambiguous answers count as whatever the enemy is weak to.
    pub fn resolve(self, weakness: ReadingType) -> ReadingType {
        match self {
            ReadingClass::Onyomi => ReadingType::Onyomi,
            ReadingClass::Kunyomi => ReadingType::Kunyomi,
            ReadingClass::Ambiguous => weakness,
        }
    }
}

fn to_hiragana(c: char) -> char {
    let code = c as u32;
    if (KATAKANA_FIRST..=KATAKANA_LAST).contains(&code) {
        char::from_u32(code - KANA_OFFSET).unwrap_or(c)
    } else {
        c
    }
}

/// Canonical comparable form of typed input: whitespace removed (including
/// full-width spaces), katakana folded to hiragana.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .map(to_hiragana)
        .collect()
}

pub fn is_correct(kanji: &KanjiItem, answer: &str) -> bool {
    kanji.onyomi.iter().any(|r| r == answer) || kanji.kunyomi.iter().any(|r| r == answer)
}

pub fn classify_reading_type(kanji: &KanjiItem, answer: &str) -> Option<ReadingClass> {
    let on = kanji.onyomi.iter().any(|r| r == answer);
    let kun = kanji.kunyomi.iter().any(|r| r == answer);
    match (on, kun) {
        (true, true) => Some(ReadingClass::Ambiguous),
        (true, false) => Some(ReadingClass::Onyomi),
        (false, true) => Some(ReadingClass::Kunyomi),
        (false, false) => None,
    }
}

/// Classic DP edit distance over characters, ignoring surrounding
/// whitespace and ASCII case.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.trim().to_lowercase().chars().collect();
    let b: Vec<char> = b.trim().to_lowercase().chars().collect();

    let mut prev: Vec<usize> = (0..=a.len()).collect();
    let mut curr = vec![0; a.len() + 1];
    for (i, cb) in b.iter().enumerate() {
        curr[0] = i + 1;
        for (j, ca) in a.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j]
            } else {
                1 + prev[j].min(prev[j + 1]).min(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[a.len()]
}

fn min_distance(answer: &str, readings: &[String]) -> usize {
    readings
        .iter()
        .map(|r| levenshtein(answer, r))
        .min()
        .unwrap_or(usize::MAX)
}

/// Reading type closest to a wrong answer, used only to highlight a hint.
/// Ties (including a kanji with no readings at all) go to kunyomi.
pub fn nearest_reading_type(kanji: &KanjiItem, answer: &str) -> ReadingType {
    let on = min_distance(answer, &kanji.onyomi);
    let kun = min_distance(answer, &kanji.kunyomi);
    if on < kun {
        ReadingType::Onyomi
    } else {
        ReadingType::Kunyomi
    }
}
