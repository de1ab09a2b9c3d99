//! Survey CSV import
//!
//! Row parser -> identity resolver + response writer (one transaction per
//! row) -> progress tracker, driven by the pipeline orchestrator.

pub mod identity;
pub mod memory;
pub mod pipeline;
pub mod progress;
pub mod responses;
pub mod row;
pub mod store;
pub mod tally;
pub mod transaction;

pub use memory::MemoryStore;
pub use pipeline::{ImportPipeline, ImportRunOutcome, ImportSettings};
pub use row::DateFallback;
pub use store::{ImportJobStore, RowTransaction, SurveyStore};
