//! Command execution pipeline for FleetLink.
//!
//! Every outbound device call passes through three layers, composed once at
//! start-up by plain nesting:
//!
//! ```text
//! LoggingExecutor  records call id, timing, outcome and retry count
//!   RetryExecutor  re-attempts retryable failures with exponential backoff
//!     AdapterExecutor  resolves the adapter and bounds the call in time
//! ```
//!
//! [`CommandPipeline`] bundles the three with an in-memory execution history.

pub mod command;
pub mod executor;
pub mod logging;
pub mod pipeline;
pub mod retry;

pub use command::{Command, CommandOutcome, CommandOutput, CommandRequest};
pub use executor::{AdapterExecutor, CommandExecutor};
pub use logging::{
    ExecutionOutcome, ExecutionRecord, ExecutionSink, ExecutionStats, LoggingExecutor,
    RecordingSink, StatsSnapshot,
};
pub use pipeline::{CommandPipeline, CommandPipelineBuilder, PipelineConfig};
pub use retry::{RetryExecutor, RetryPolicy};
