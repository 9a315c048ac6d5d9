use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, instrument, Span};

use crate::accounts::AccountExpander;
use crate::config::ConfigResolver;
use crate::error::RunError;
use crate::execution::{
    AccountFanOutExecutor, BatchReport, ExecutionMode, OptimizePerformance, OutputSink,
    QueryExecutor, RemoteApiClient, TaskContext, TaskScheduler,
};
use crate::model::{Config, QueryReference};
use crate::reader::QueryTextResolver;

/// Name the account selection query is reported under
pub const ACCOUNT_SELECTION_QUERY_NAME: &str = "account_selection";

/// Per-run switches that are not part of the saved configuration
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: ExecutionMode,
    pub optimize: OptimizePerformance,
    pub disable_account_expansion: bool,
    /// Reference date for dynamic macro values
    pub today: NaiveDate,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            optimize: OptimizePerformance::default(),
            disable_account_expansion: false,
            today: chrono::Local::now().date_naive(),
        }
    }
}

/// Drives a complete batch
///
/// 1. read and render every query, any failure ends the run
/// 2. expand the seed accounts into leaf accounts
/// 3. prepare the output destination
/// 4. run one task per query
///
/// An empty set of leaf accounts ends the run without touching the destination
pub struct BatchRunner {
    resolver: ConfigResolver,
    reader: Arc<dyn QueryTextResolver>,
    expander: AccountExpander,
    scheduler: TaskScheduler,
    span: Span,
}

impl BatchRunner {
    pub fn new(
        client: Arc<dyn RemoteApiClient>,
        reader: Arc<dyn QueryTextResolver>,
        span: Span,
    ) -> Self {
        let executor = Arc::new(AccountFanOutExecutor::new(client.clone()));

        Self {
            resolver: ConfigResolver::new(span.clone()),
            reader,
            expander: AccountExpander::new(client, span.clone()),
            scheduler: TaskScheduler::new(executor, span.clone()),
            span,
        }
    }

    /// Replace the executor tasks are delegated to
    pub fn with_executor(mut self, executor: Arc<dyn QueryExecutor>) -> Self {
        self.scheduler = TaskScheduler::new(executor, self.span.clone());
        self
    }

    /// Bound the number of queries running at the same time in parallel mode
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.scheduler = self.scheduler.with_max_in_flight(max_in_flight);
        self
    }

    #[instrument(parent = &self.span, skip_all, fields(queries = queries.len()), err)]
    pub async fn run(
        &self,
        config: &Config,
        queries: &[QueryReference],
        sink: Arc<dyn OutputSink>,
        options: &RunOptions,
    ) -> Result<BatchReport, RunError> {
        let params = self
            .resolver
            .resolve_params(&config.macro_params, options.today)?;
        let prepared = self
            .resolver
            .prepare_queries(queries, self.reader.as_ref(), &params)?;

        let selection_query = config
            .account_selection_query
            .as_ref()
            .map(|source| {
                let reference = QueryReference::named(ACCOUNT_SELECTION_QUERY_NAME, source.clone());
                self.resolver
                    .prepare_query(&reference, self.reader.as_ref(), &params)
            })
            .transpose()?;

        let accounts = self
            .expander
            .expand(
                &config.account,
                selection_query.as_ref().map(|query| query.text.as_str()),
                options.disable_account_expansion,
            )
            .await?;

        if accounts.is_empty() {
            return Ok(BatchReport::default());
        }

        sink.prepare_destination().await?;

        let context = TaskContext::new(accounts, sink, params, options.optimize);
        let report = self.scheduler.run(prepared, context, options.mode).await;

        info!(
            succeeded = report.succeeded().count(),
            failed = report.failed().count(),
            "Finished batch"
        );

        Ok(report)
    }
}
