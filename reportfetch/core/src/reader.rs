use crate::config::ConfigError;
use crate::model::{QueryReference, QuerySource};

/// Provides the raw text of a query
pub trait QueryTextResolver: Send + Sync {
    fn read(&self, reference: &QueryReference) -> Result<String, ConfigError>;
}

/// Returns inline text as is and reads query files from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileQueryReader;

impl QueryTextResolver for FileQueryReader {
    fn read(&self, reference: &QueryReference) -> Result<String, ConfigError> {
        match reference.source() {
            QuerySource::Inline(text) => Ok(text.clone()),
            QuerySource::File(path) => {
                std::fs::read_to_string(path).map_err(|source| ConfigError::QueryRead {
                    query: reference.name().to_string(),
                    file_path: path.display().to_string(),
                    source,
                })
            }
        }
    }
}
