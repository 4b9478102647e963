//! 漢字の読みで戦うターン制バトル。

pub mod leveling;
pub mod logic;
pub mod mastery;
pub mod reading;
pub mod selector;
pub mod state;

pub use logic::{
    cycle_hint, finish_stage, leave_stage, run_pending, start_stage, submit_answer, tick,
};
pub use state::{Action, AnswerOutcome, Continuation, GameState, StagePhase, StageReport};
