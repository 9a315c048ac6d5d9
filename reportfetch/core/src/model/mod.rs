//! Data models shared by every stage of a run
//!
//! The models are serializable where they appear in saved config files:
//!
//! - account identifiers, seeds and the expanded leaf account set
//! - query references and prepared query text
//! - the sink configuration union
//! - the resolved run configuration and its partial, per-source form
//! - result rows

pub mod account;
pub mod config;
pub mod query;
pub mod report;
pub mod sink;

pub use account::{AccountId, AccountSeed, InvalidAccountId, LeafAccountSet};
pub use config::{Config, ConfigOverrides, MacroParams, DEFAULT_API_VERSION};
pub use query::{PreparedQuery, QueryReference, QuerySource};
pub use report::{Report, Row};
pub use sink::{InvalidSink, SinkConfig, SinkKind, SinkOverrides};
