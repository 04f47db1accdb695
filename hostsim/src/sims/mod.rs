//! Catalog-scale simulation runs

pub mod batch;

pub use batch::{
    process_system, run_batch, stamp_path, BatchConfig, BatchSummary, OffsetPolicy,
    SystemOutcome,
};
