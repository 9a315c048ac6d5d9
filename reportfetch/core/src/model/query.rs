use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the text of a query comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuerySource {
    /// Literal query text
    Inline(String),

    /// Path to a file containing the query text
    File(PathBuf),
}

/// A named query, the name is used for logging and as the target name within the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryReference {
    name: String,
    source: QuerySource,
}

impl QueryReference {
    /// Reference a query file, named after the file stem
    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());

        Self {
            name,
            source: QuerySource::File(path.to_path_buf()),
        }
    }

    /// Reference an inline query, `position` is 1-based
    pub fn inline(position: usize, text: impl Into<String>) -> Self {
        Self {
            name: format!("query_{position}"),
            source: QuerySource::Inline(text.into()),
        }
    }

    pub fn named(name: impl Into<String>, source: QuerySource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &QuerySource {
        &self.source
    }
}

/// A query with its text read and all macros resolved, ready to be sent to the remote service
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct PreparedQuery {
    pub reference: QueryReference,
    pub text: String,
}

impl PreparedQuery {
    pub fn name(&self) -> &str {
        self.reference.name()
    }
}
