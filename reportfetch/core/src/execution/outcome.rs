use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::{error, info, info_span, Instrument, Span};

use super::error::ExecutionError;
use crate::model::AccountId;

/// Counters of a successfully executed query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub rows: usize,
    pub accounts: usize,
}

/// Terminal state of one query task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success {
        query: String,
        summary: ExecutionSummary,
    },
    Failure {
        query: String,
        account: Option<AccountId>,
        kind: String,
        message: String,
    },
}

impl Outcome {
    pub fn query(&self) -> &str {
        match self {
            Outcome::Success { query, .. } | Outcome::Failure { query, .. } => query,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// Outcomes of every task of a batch in completion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<Outcome>,
}

impl BatchReport {
    pub fn push(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn outcome(&self, query: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.query() == query)
    }
}

impl FromIterator<Outcome> for BatchReport {
    fn from_iter<T: IntoIterator<Item = Outcome>>(iter: T) -> Self {
        Self {
            outcomes: iter.into_iter().collect(),
        }
    }
}

/// Turns the result of a query task into an [`Outcome`] and logs it
///
/// Every task runs inside its own `query` span below the span the reporter was created with.
/// Errors and panics of the task are contained here and never propagate to sibling tasks
#[derive(Debug, Clone)]
pub struct OutcomeReporter {
    span: Span,
}

impl OutcomeReporter {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// Drive `work` to completion and report its result
    pub async fn observe<F>(&self, query_name: &str, work: F) -> Outcome
    where
        F: Future<Output = Result<ExecutionSummary, ExecutionError>>,
    {
        let span = info_span!(parent: &self.span, "query", name = query_name);

        let result = AssertUnwindSafe(work)
            .catch_unwind()
            .instrument(span.clone())
            .await
            .unwrap_or_else(|panic| Err(ExecutionError::Panicked(panic_message(panic))));

        span.in_scope(|| self.report(query_name, result))
    }

    /// Log and convert an already available result
    pub fn report(
        &self,
        query_name: &str,
        result: Result<ExecutionSummary, ExecutionError>,
    ) -> Outcome {
        match result {
            Ok(summary) => {
                info!(
                    query = query_name,
                    rows = summary.rows,
                    accounts = summary.accounts,
                    "Query finished"
                );

                Outcome::Success {
                    query: query_name.to_string(),
                    summary,
                }
            }
            Err(err) => {
                let account = err.account().cloned();
                error!(
                    query = query_name,
                    account = account.as_ref().map(AccountId::as_str).unwrap_or("-"),
                    kind = err.kind(),
                    "Query failed: {err}"
                );

                Outcome::Failure {
                    query: query_name.to_string(),
                    account,
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                }
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::error::ApiError;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn test_success_is_logged() {
        let reporter = OutcomeReporter::new(Span::current());
        let outcome = reporter
            .observe("campaigns", async {
                Ok(ExecutionSummary {
                    rows: 12,
                    accounts: 3,
                })
            })
            .await;

        assert!(outcome.is_success());
        assert!(logs_contain("Query finished"));
        assert!(logs_contain("rows=12"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failure_names_account_and_kind() {
        let reporter = OutcomeReporter::new(Span::current());
        let outcome = reporter
            .observe("campaigns", async {
                Err(ExecutionError::Remote {
                    account: "1234567890".parse().unwrap(),
                    source: ApiError::PermissionDenied("no access".into()),
                })
            })
            .await;

        match outcome {
            Outcome::Failure {
                query,
                account,
                kind,
                ..
            } => {
                assert_eq!(query, "campaigns");
                assert_eq!(account.unwrap().as_str(), "1234567890");
                assert_eq!(kind, "permission_denied");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(logs_contain("Query failed"));
        assert!(logs_contain("account=1234567890"));
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        let reporter = OutcomeReporter::new(Span::none());
        let outcome = reporter
            .observe("broken", async {
                if true {
                    panic!("boom");
                }
                Ok(ExecutionSummary::default())
            })
            .await;

        assert_eq!(
            outcome,
            Outcome::Failure {
                query: "broken".into(),
                account: None,
                kind: "panic".into(),
                message: "query task panicked: boom".into(),
            }
        );
    }

    #[test]
    fn test_batch_report_partitions_outcomes() {
        let report: BatchReport = [
            Outcome::Success {
                query: "a".into(),
                summary: ExecutionSummary::default(),
            },
            Outcome::Failure {
                query: "b".into(),
                account: None,
                kind: "sink".into(),
                message: "disk full".into(),
            },
        ]
        .into_iter()
        .collect();

        assert_eq!(report.succeeded().count(), 1);
        assert_eq!(report.failed().map(Outcome::query).collect::<Vec<_>>(), vec!["b"]);
        assert!(report.outcome("a").is_some());
    }
}
