//! Isolated, independently-tested surface for parsing and driving the batch scheduler's
//! `sinfo`/`squeue`/`sbatch` text commands. Kept separate from the Cluster Agent's
//! dispatch loop so the brittle column parsing can be pinned down with golden-text
//! tests instead of a live scheduler.

pub mod parse;
pub mod probe;
pub mod submit;

pub use parse::SchedulerState;
pub use submit::{submit, SlurmSubmission};
