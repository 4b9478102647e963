//! Kanji reading quiz-battle engine.
//!
//! `battle` holds the encounter state machine, `bonus` the grade-bonus
//! scoring, `catalog` the kanji / enemy / stage data and `store` the
//! persisted key/value contract. Rendering is left to the front end.

pub mod battle;
pub mod bonus;
pub mod catalog;
pub mod config;
pub mod error;
pub mod input;
pub mod store;
pub mod time;

pub use battle::{Action, GameState};
pub use catalog::Catalog;
pub use config::BattleConfig;
pub use error::{BattleError, CatalogError, ConfigError, StoreError};
