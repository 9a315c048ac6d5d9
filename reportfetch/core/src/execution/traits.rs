//! Interfaces of the collaborators driven by a run

use async_trait::async_trait;

use super::error::{ApiError, ExecutionError, SinkError};
use super::outcome::ExecutionSummary;
use super::task::ExecutionTask;
use crate::model::{AccountId, Report, Row};

/// Authenticated access to the remote reporting service
#[async_trait]
pub trait RemoteApiClient: Send + Sync {
    /// Run `query_text` for a single account and return every result row
    async fn query(&self, account: &AccountId, query_text: &str) -> Result<Vec<Row>, ApiError>;
}

/// Destination for query results
///
/// A single sink instance is shared by all concurrently running queries, implementations must
/// tolerate concurrent calls to `write`
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Short name of the sink used in logs and errors
    fn name(&self) -> &'static str;

    /// One-time setup, called once before the first write
    async fn prepare_destination(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Write all rows of one query
    async fn write(&self, report: &Report, query_name: &str) -> Result<(), SinkError>;
}

/// Executes a single query against all accounts of a task and hands the rows to the task's sink
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, task: &ExecutionTask) -> Result<ExecutionSummary, ExecutionError>;
}
