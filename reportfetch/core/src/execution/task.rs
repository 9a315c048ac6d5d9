use std::fmt;
use std::sync::Arc;

use super::traits::OutputSink;
use crate::model::{LeafAccountSet, MacroParams, PreparedQuery};

/// How the accounts of a single query are fetched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OptimizePerformance {
    /// One account after the other
    #[default]
    None,

    /// Accounts are fetched concurrently
    Batch,
}

/// How the queries of a batch are scheduled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    #[default]
    Parallel,
    Sequential,
}

/// State shared read-only by every task of a batch
#[derive(Clone)]
pub struct TaskContext {
    pub accounts: Arc<LeafAccountSet>,
    pub sink: Arc<dyn OutputSink>,
    /// Macro values the queries were rendered with
    ///
    /// Queries arrive fully rendered, the built-in executor never reads these. They are kept for
    /// executors that render additional text per account
    pub macro_params: Arc<MacroParams>,
    pub optimize: OptimizePerformance,
}

impl TaskContext {
    pub fn new(
        accounts: LeafAccountSet,
        sink: Arc<dyn OutputSink>,
        macro_params: MacroParams,
        optimize: OptimizePerformance,
    ) -> Self {
        Self {
            accounts: Arc::new(accounts),
            sink,
            macro_params: Arc::new(macro_params),
            optimize,
        }
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("accounts", &self.accounts)
            .field("sink", &self.sink.name())
            .field("macro_params", &self.macro_params)
            .field("optimize", &self.optimize)
            .finish()
    }
}

/// One query to run against every account of the context
#[derive(Debug, Clone, derive_new::new)]
pub struct ExecutionTask {
    pub query: PreparedQuery,
    pub context: TaskContext,
}

impl ExecutionTask {
    pub fn name(&self) -> &str {
        self.query.name()
    }
}
