//! Test doubles for the collaborators of a run.
//!
//! The fakes record every interaction so tests can assert on remote calls, executor invocations and
//! the rows that reached the sink.

#![allow(dead_code)]

use async_trait::async_trait;
use reportfetch_core::prelude::*;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn account(id: &str) -> AccountId {
    id.parse().expect("valid account id")
}

pub fn leaf_set(ids: &[&str]) -> LeafAccountSet {
    ids.iter().map(|id| account(id)).collect()
}

/// Remote service answering account lookups from a fixed hierarchy and report queries with one
/// row per account
#[derive(Default)]
pub struct MockApiClient {
    hierarchy: HashMap<AccountId, Vec<AccountId>>,
    failures: Vec<(String, ApiError)>,
    calls: Mutex<Vec<(AccountId, String)>>,
}

impl MockApiClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaf accounts returned for lookups against `seed`
    pub fn with_children(mut self, seed: &str, children: &[&str]) -> Self {
        self.hierarchy
            .insert(account(seed), children.iter().map(|id| account(id)).collect());
        self
    }

    /// Fail every query whose text contains `pattern`
    pub fn failing_on(mut self, pattern: &str, error: ApiError) -> Self {
        self.failures.push((pattern.to_string(), error));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(AccountId, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteApiClient for MockApiClient {
    async fn query(&self, account: &AccountId, query_text: &str) -> Result<Vec<Row>, ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push((account.clone(), query_text.to_string()));

        if let Some((_, error)) = self
            .failures
            .iter()
            .find(|(pattern, _)| query_text.contains(pattern.as_str()))
        {
            return Err(error.clone());
        }

        if query_text.contains("FROM customer_client") {
            let children = self.hierarchy.get(account).cloned().unwrap_or_default();
            return Ok(children
                .into_iter()
                .map(|child| row(json!({ "customer_client.id": child.as_str() })))
                .collect());
        }

        Ok(vec![row(json!({
            "customer.id": account.as_str(),
            "query": query_text,
            "metrics.clicks": 10,
        }))])
    }
}

pub fn row(value: serde_json::Value) -> Row {
    value.as_object().cloned().expect("row must be an object")
}

/// Keeps every written report in memory keyed by query name
#[derive(Default)]
pub struct MemorySink {
    reports: Mutex<BTreeMap<String, Report>>,
    prepared: AtomicUsize,
}

impl MemorySink {
    pub fn reports(&self) -> BTreeMap<String, Report> {
        self.reports.lock().unwrap().clone()
    }

    pub fn prepare_count(&self) -> usize {
        self.prepared.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OutputSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn prepare_destination(&self) -> Result<(), SinkError> {
        self.prepared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn write(&self, report: &Report, query_name: &str) -> Result<(), SinkError> {
        self.reports
            .lock()
            .unwrap()
            .insert(query_name.to_string(), report.clone());
        Ok(())
    }
}

/// Sink whose destination can never be prepared
#[derive(Default)]
pub struct UnpreparableSink;

#[async_trait]
impl OutputSink for UnpreparableSink {
    fn name(&self) -> &'static str {
        "unpreparable"
    }

    async fn prepare_destination(&self) -> Result<(), SinkError> {
        Err(SinkError::new(self.name(), "warehouse", "permission denied"))
    }

    async fn write(&self, _report: &Report, _query_name: &str) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Executor counting its invocations, panics for queries named in `panic_on`
pub struct CountingExecutor {
    inner: AccountFanOutExecutor,
    invocations: AtomicUsize,
    panic_on: Option<String>,
}

impl CountingExecutor {
    pub fn new(client: Arc<dyn RemoteApiClient>) -> Self {
        Self {
            inner: AccountFanOutExecutor::new(client),
            invocations: AtomicUsize::new(0),
            panic_on: None,
        }
    }

    pub fn panicking_on(mut self, query_name: &str) -> Self {
        self.panic_on = Some(query_name.to_string());
        self
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryExecutor for CountingExecutor {
    async fn execute(&self, task: &ExecutionTask) -> Result<ExecutionSummary, ExecutionError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);

        if self.panic_on.as_deref() == Some(task.name()) {
            panic!("executor exploded on {}", task.name());
        }

        self.inner.execute(task).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Started(String),
    Finished(String),
}

/// Executor recording when tasks start and finish and the highest number of tasks running at once
pub struct RecordingExecutor {
    events: Mutex<Vec<TaskEvent>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
}

impl RecordingExecutor {
    pub fn new(delay: Duration) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn events(&self) -> Vec<TaskEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryExecutor for RecordingExecutor {
    async fn execute(&self, task: &ExecutionTask) -> Result<ExecutionSummary, ExecutionError> {
        self.events
            .lock()
            .unwrap()
            .push(TaskEvent::Started(task.name().to_string()));
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events
            .lock()
            .unwrap()
            .push(TaskEvent::Finished(task.name().to_string()));

        Ok(ExecutionSummary {
            rows: 0,
            accounts: task.context.accounts.len(),
        })
    }
}

pub fn prepared_queries(count: usize) -> Vec<PreparedQuery> {
    (1..=count)
        .map(|position| {
            let text = format!("SELECT campaign.id FROM campaign LIMIT {position}");
            PreparedQuery::new(QueryReference::inline(position, text.clone()), text)
        })
        .collect()
}

pub fn task_context(sink: Arc<dyn OutputSink>) -> TaskContext {
    TaskContext::new(
        leaf_set(&["11", "12"]),
        sink,
        MacroParams::default(),
        OptimizePerformance::None,
    )
}

pub fn inline_queries(texts: &[&str]) -> Vec<QueryReference> {
    texts
        .iter()
        .enumerate()
        .map(|(position, text)| QueryReference::inline(position + 1, *text))
        .collect()
}

pub fn config(seed: &str) -> Config {
    ConfigResolver::new(tracing::Span::none())
        .build(
            ConfigOverrides {
                account: Some(AccountSeed::parse(seed).expect("valid seed")),
                ..Default::default()
            },
            None,
            None,
        )
        .expect("valid config")
}
