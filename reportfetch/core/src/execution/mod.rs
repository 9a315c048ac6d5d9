//! Running prepared queries against the leaf accounts
//!
//! The [`TaskScheduler`] creates one [`ExecutionTask`] per query and runs it either in parallel on
//! the tokio runtime or strictly one after the other. Each task is handed to a [`QueryExecutor`]
//! and its result turned into an [`Outcome`] by the [`OutcomeReporter`].

mod error;
mod executor;
mod outcome;
mod scheduler;
mod task;
mod traits;

pub use error::{ApiError, ExecutionError, SinkError};
pub use executor::{AccountFanOutExecutor, MAX_CONCURRENT_ACCOUNTS};
pub use outcome::{BatchReport, ExecutionSummary, Outcome, OutcomeReporter};
pub use scheduler::{default_parallelism, TaskScheduler};
pub use task::{ExecutionMode, ExecutionTask, OptimizePerformance, TaskContext};
pub use traits::{OutputSink, QueryExecutor, RemoteApiClient};
