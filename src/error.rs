//! Error types for the battle engine and its collaborators.
//!
//! Normal game outcomes (player defeat, exhausted question pools) are never
//! errors. Only broken caller contracts and I/O failures end up here.

use std::io;

use thiserror::Error;

/// Caller contract violations raised by the encounter engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BattleError {
    /// An answer was submitted while input is locked (enemy turn, respawn, stage end).
    #[error("input is disabled; another step is still pending")]
    InputDisabled,
    /// A submission arrived with no question on screen.
    #[error("no current kanji to answer")]
    NoCurrentKanji,
    /// The selector exhausted every pool, including the full stage pool.
    #[error("no kanji available for selection")]
    NoKanjiAvailable,
    /// An encounter operation was called outside of a stage.
    #[error("no active encounter")]
    NoActiveEncounter,
    /// Heal was requested with no charges left.
    #[error("no heal charges left")]
    NoHealsLeft,
    /// The catalog does not know this stage id.
    #[error("unknown stage: {0}")]
    UnknownStage(String),
    /// The stage resolved to an empty enemy roster.
    #[error("stage {0} has no enemies")]
    NoEnemies(String),
    /// `finish_stage` was called while the encounter is still running.
    #[error("stage is still in progress")]
    StageInProgress,
}

/// Errors raised while ingesting catalog data.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },
}

/// Errors raised by persistent key/value stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while loading balance configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
