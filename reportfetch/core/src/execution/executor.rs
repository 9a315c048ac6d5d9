use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::debug;

use super::error::ExecutionError;
use super::outcome::ExecutionSummary;
use super::task::{ExecutionTask, OptimizePerformance};
use super::traits::{QueryExecutor, RemoteApiClient};
use crate::model::{AccountId, Report, Row};

/// Accounts fetched at the same time with [`OptimizePerformance::Batch`]
pub const MAX_CONCURRENT_ACCOUNTS: usize = 10;

/// Runs the query of a task against every leaf account and writes all rows with a single sink call
///
/// Rows are only written once every account returned, a query failing for one account writes
/// nothing
#[derive(Clone, derive_new::new)]
pub struct AccountFanOutExecutor {
    client: Arc<dyn RemoteApiClient>,
}

impl AccountFanOutExecutor {
    async fn fetch(&self, account: &AccountId, text: &str) -> Result<Vec<Row>, ExecutionError> {
        let rows = self
            .client
            .query(account, text)
            .await
            .map_err(|source| ExecutionError::Remote {
                account: account.clone(),
                source,
            })?;

        debug!(account = account.as_str(), rows = rows.len(), "Fetched account");
        Ok(rows)
    }
}

#[async_trait]
impl QueryExecutor for AccountFanOutExecutor {
    async fn execute(&self, task: &ExecutionTask) -> Result<ExecutionSummary, ExecutionError> {
        let accounts = task.context.accounts.as_ref();
        let text = task.query.text.as_str();
        let mut report = Report::default();

        match task.context.optimize {
            OptimizePerformance::None => {
                for account in accounts {
                    report.extend(self.fetch(account, text).await?);
                }
            }
            OptimizePerformance::Batch => {
                let fetches: Vec<_> = accounts
                    .iter()
                    .map(|account| self.fetch(account, text))
                    .collect();
                let fetched: Vec<Vec<Row>> = stream::iter(fetches)
                    .buffer_unordered(MAX_CONCURRENT_ACCOUNTS)
                    .try_collect()
                    .await?;

                report.extend(fetched.into_iter().flatten());
            }
        }

        task.context.sink.write(&report, task.name()).await?;

        Ok(ExecutionSummary {
            rows: report.len(),
            accounts: accounts.len(),
        })
    }
}
