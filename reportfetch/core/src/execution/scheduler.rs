use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, Span};

use super::error::ExecutionError;
use super::outcome::{BatchReport, Outcome, OutcomeReporter};
use super::task::{ExecutionMode, ExecutionTask, TaskContext};
use super::traits::QueryExecutor;
use crate::model::PreparedQuery;

/// Number of tasks allowed in flight in parallel mode when nothing else is configured
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Runs one [`ExecutionTask`] per query and collects their outcomes
pub struct TaskScheduler {
    executor: Arc<dyn QueryExecutor>,
    reporter: OutcomeReporter,
    span: Span,
    max_in_flight: usize,
}

impl TaskScheduler {
    pub fn new(executor: Arc<dyn QueryExecutor>, span: Span) -> Self {
        Self {
            executor,
            reporter: OutcomeReporter::new(span.clone()),
            span,
            max_in_flight: default_parallelism(),
        }
    }

    /// Bound the number of concurrently running tasks in parallel mode
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Execute every query with the shared `context`
    ///
    /// Never fails, task failures are returned as [`Outcome::Failure`] entries
    #[instrument(parent = &self.span, skip_all, fields(queries = queries.len(), mode = ?mode))]
    pub async fn run(
        &self,
        queries: Vec<PreparedQuery>,
        context: TaskContext,
        mode: ExecutionMode,
    ) -> BatchReport {
        let tasks = queries
            .into_iter()
            .map(|query| ExecutionTask::new(query, context.clone()));

        let time = std::time::Instant::now();
        let report = match mode {
            ExecutionMode::Parallel => self.run_parallel(tasks).await,
            ExecutionMode::Sequential => self.run_sequential(tasks).await,
        };
        debug!(
            "Finished {} queries ... Elapsed time: {:.2?}",
            report.len(),
            time.elapsed()
        );

        report
    }

    async fn run_sequential(&self, tasks: impl Iterator<Item = ExecutionTask>) -> BatchReport {
        let mut report = BatchReport::default();

        for task in tasks {
            let outcome = observe(self.executor.clone(), self.reporter.clone(), task).await;
            report.push(outcome);
        }

        report
    }

    async fn run_parallel(&self, tasks: impl Iterator<Item = ExecutionTask>) -> BatchReport {
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut running = JoinSet::new();
        let mut names = HashMap::new();

        for task in tasks {
            let name = task.name().to_string();
            let executor = self.executor.clone();
            let reporter = self.reporter.clone();
            let semaphore = semaphore.clone();

            let handle = running.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                observe(executor, reporter, task).await
            });
            names.insert(handle.id(), name);
        }

        let mut report = BatchReport::default();
        while let Some(joined) = running.join_next_with_id().await {
            match joined {
                Ok((_, outcome)) => report.push(outcome),
                Err(err) => {
                    let name = names.remove(&err.id()).unwrap_or_default();
                    let outcome = self
                        .reporter
                        .report(&name, Err(ExecutionError::Panicked(err.to_string())));
                    report.push(outcome);
                }
            }
        }

        report
    }
}

async fn observe(
    executor: Arc<dyn QueryExecutor>,
    reporter: OutcomeReporter,
    task: ExecutionTask,
) -> Outcome {
    let name = task.name().to_string();
    reporter
        .observe(&name, async move { executor.execute(&task).await })
        .await
}
