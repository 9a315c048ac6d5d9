use crate::{accounts::ExpansionError, config::ConfigError, execution::SinkError};

use miette::Diagnostic;

/// Errors ending a run before any query was executed
///
/// Failures of individual queries are not errors of the run, they are reported as outcomes
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum RunError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(Box<ConfigError>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Expansion(Box<ExpansionError>),

    #[error("Cannot prepare the output destination")]
    #[diagnostic(
        code(reportfetch::run::destination),
        help("Check that the output location exists or can be created and is writable")
    )]
    Destination(#[source] Box<SinkError>),
}

impl From<ConfigError> for RunError {
    fn from(error: ConfigError) -> Self {
        RunError::Config(Box::new(error))
    }
}

impl From<ExpansionError> for RunError {
    fn from(error: ExpansionError) -> Self {
        RunError::Expansion(Box::new(error))
    }
}

impl From<SinkError> for RunError {
    fn from(error: SinkError) -> Self {
        RunError::Destination(Box::new(error))
    }
}
