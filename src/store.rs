//! 永続キー/バリューストアと実績シンク。
//!
//! 値はすべて短い文字列（`"1"`、カウンタの10進表記）。ブラウザ版は
//! localStorage、ネイティブ版は JSON ファイル、テストはメモリ上に保存する。
//!
//! 書き込みは投げっぱなし: 失敗はログに残してゲームは続行する。

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

/// 実績の解除先。同じ id を二度解除しても何も起きない。
pub trait AchievementSink {
    /// Returns true only when `id` was not unlocked before.
    fn unlock_achievement(&mut self, id: &str) -> bool;
}

// ── Memory ────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

// ── File (native) ─────────────────────────────────────────────

const SAVE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SaveData {
    version: u32,
    entries: BTreeMap<String, String>,
}

/// JSON ファイルに保存するストア。`set` / `remove` のたびに書き出す。
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open an existing save file, or start empty if it does not exist yet.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let entries = if path.exists() {
            let text = std::fs::read_to_string(path)?;
            let data: SaveData = serde_json::from_str(&text)?;
            if data.version > SAVE_VERSION {
                warn!(
                    "save file {} has newer version {} (current {})",
                    path.display(),
                    data.version,
                    SAVE_VERSION
                );
            }
            data.entries
        } else {
            BTreeMap::new()
        };
        Ok(Self { path: path.to_path_buf(), entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        let data = SaveData { version: SAVE_VERSION, entries: self.entries.clone() };
        let json = serde_json::to_string_pretty(&data)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.flush() {
            warn!("セーブの書き込みに失敗: {}: {e}", self.path.display());
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
        self.persist();
    }

    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.persist();
        }
    }
}

// ── localStorage (wasm32) ─────────────────────────────────────

/// Browser localStorage. Every key is namespaced under `prefix`.
#[cfg(target_arch = "wasm32")]
pub struct LocalStorage {
    prefix: String,
}

#[cfg(target_arch = "wasm32")]
fn get_storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok()?
}

#[cfg(target_arch = "wasm32")]
impl LocalStorage {
    pub fn new(prefix: &str) -> Self {
        Self { prefix: prefix.to_string() }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[cfg(target_arch = "wasm32")]
impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str) -> Option<String> {
        get_storage()?.get_item(&self.full_key(key)).ok()?
    }

    fn set(&mut self, key: &str, value: &str) {
        if let Some(storage) = get_storage() {
            if let Err(e) = storage.set_item(&self.full_key(key), value) {
                web_sys::console::warn_1(
                    &format!("kanji-battle: localStorage への保存に失敗: {e:?}").into(),
                );
            }
        }
    }

    fn remove(&mut self, key: &str) {
        if let Some(storage) = get_storage() {
            if let Err(e) = storage.remove_item(&self.full_key(key)) {
                web_sys::console::warn_1(
                    &format!("kanji-battle: localStorage からの削除に失敗: {e:?}").into(),
                );
            }
        }
    }
}

// ── Achievements ──────────────────────────────────────────────

#[derive(Clone, Debug, Default)]
pub struct MemoryAchievements {
    unlocked: HashSet<String>,
}

impl MemoryAchievements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unlocked(&self) -> &HashSet<String> {
        &self.unlocked
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.unlocked.contains(id)
    }
}

impl AchievementSink for MemoryAchievements {
    fn unlock_achievement(&mut self, id: &str) -> bool {
        self.unlocked.insert(id.to_string())
    }
}

/// Persists unlocks as `achievement_{id}` = `"1"` in its own key/value store.
#[derive(Debug, Default)]
pub struct StoreAchievements<S> {
    store: S,
}

impl<S: KeyValueStore> StoreAchievements<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn key(id: &str) -> String {
        format!("achievement_{id}")
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.store.get(&Self::key(id)).as_deref() == Some("1")
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S: KeyValueStore> AchievementSink for StoreAchievements<S> {
    fn unlock_achievement(&mut self, id: &str) -> bool {
        if self.is_unlocked(id) {
            return false;
        }
        self.store.set(&Self::key(id), "1");
        true
    }
}
