//! Business logic services for the memory bank.
//!
//! The memory service is the only layer tool handlers touch; it resolves
//! database handles and dispatches to the repository accessors.

mod ctx;
mod memory;

pub use ctx::{Progress, ProgressUpdate, ToolCtx};
pub use memory::{CycleGroup, ImportOutcome, InitOutcome, MemoryService};
