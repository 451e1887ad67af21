//! tollgate-core
//!
//! Traits and the fan-out aggregator shared across the tollgate crates.
//!
//! - `fetcher`: the `Fetcher` trait implemented by upstream clients.
//! - `emptiness`: classification of "successful but empty" upstream results.
//! - `fanout`: concurrent execution of independent tasks with per-task outcomes.
//!
//! Async runtime (Tokio)
//! ---------------------
//! Fan-out spawns each task with `tokio::spawn`, so `fanout::all` and
//! `fanout::all_settled` must be awaited inside a Tokio 1.x runtime.
//!
#![warn(missing_docs)]

/// Classification of empty upstream results.
pub mod emptiness;
pub mod fanout;
/// The upstream client trait.
pub mod fetcher;

pub use emptiness::Emptiness;
pub use fanout::{Outcomes, Task, TaskOutcome, all, all_settled};
pub use fetcher::Fetcher;
pub use tollgate_types::*;
