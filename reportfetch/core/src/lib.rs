//! # reportfetch core
//!
//! Orchestration of report queries over advertising account hierarchies.
//!
//! A run starts from a [`Config`](model::Config) built by the [`ConfigResolver`](config::ConfigResolver)
//! from command line values, an optional config file and built-in defaults. The
//! [`BatchRunner`](runner::BatchRunner) then
//!
//! - renders the macro parameters into every query
//! - expands the seed account(s) into the set of leaf accounts with the
//!   [`AccountExpander`](accounts::AccountExpander)
//! - runs one task per query through the [`TaskScheduler`](execution::TaskScheduler), either in
//!   parallel or one after the other
//!
//! Every task ends in an [`Outcome`](execution::Outcome), a failing query never stops its siblings.
//!
//! The remote service and the output destinations are abstracted behind the
//! [`RemoteApiClient`](execution::RemoteApiClient) and [`OutputSink`](execution::OutputSink) traits.

pub mod accounts;
pub mod config;
pub mod error;
pub mod execution;
pub mod model;
pub mod persist;
pub mod reader;
pub mod runner;
pub mod templating;

/// Prelude to import all relevant models and functions
pub mod prelude {
    pub use super::accounts::{AccountExpander, ExpansionError, DEFAULT_LEAF_ACCOUNTS_QUERY};
    pub use super::config::{ConfigError, ConfigResolver};
    pub use super::error::RunError;
    pub use super::execution::*;
    pub use super::model::*;
    pub use super::persist::{should_persist, ConfigPersister, PersistenceError};
    pub use super::reader::{FileQueryReader, QueryTextResolver};
    pub use super::runner::{BatchRunner, RunOptions};
    pub use super::templating::{QueryTemplate, Segment, TemplateError};
}

pub type Result<T> = core::result::Result<T, error::RunError>;
