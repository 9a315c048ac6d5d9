use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default number of rows printed per query by the console sink
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Default delimiter for CSV output
pub const DEFAULT_DELIMITER: char = ',';

/// Supported sink kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    Console,
    Csv,
    Json,
    Parquet,
    Delta,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SinkKind::Console => "console",
            SinkKind::Csv => "csv",
            SinkKind::Json => "json",
            SinkKind::Parquet => "parquet",
            SinkKind::Delta => "delta",
        };

        f.write_str(name)
    }
}

impl FromStr for SinkKind {
    type Err = InvalidSink;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "console" => Ok(SinkKind::Console),
            "csv" => Ok(SinkKind::Csv),
            "json" => Ok(SinkKind::Json),
            "parquet" => Ok(SinkKind::Parquet),
            "delta" => Ok(SinkKind::Delta),
            other => Err(InvalidSink {
                kind: other.to_string(),
                reason: "unknown sink kind".into(),
            }),
        }
    }
}

/// A sink configuration was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid '{kind}' output: {reason}")]
pub struct InvalidSink {
    pub kind: String,
    pub reason: String,
}

impl InvalidSink {
    fn new(kind: SinkKind, reason: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }
}

/// Output destination for query results
///
/// Every variant only carries the parameters its sink needs. Instances are created through
/// [`SinkOverrides::build`] which validates them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Pretty print the first `page_size` rows of every query to stdout
    Console { page_size: usize },

    /// One CSV file per query inside `destination_folder`
    Csv {
        destination_folder: PathBuf,
        delimiter: char,
    },

    /// One newline delimited JSON file per query inside `destination_folder`
    Json { destination_folder: PathBuf },

    /// One Parquet file per query inside `destination_folder`
    Parquet { destination_folder: PathBuf },

    /// One Delta Lake table per query below `location`
    Delta {
        location: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        storage_options: BTreeMap<String, String>,
    },
}

impl SinkConfig {
    pub fn kind(&self) -> SinkKind {
        match self {
            SinkConfig::Console { .. } => SinkKind::Console,
            SinkConfig::Csv { .. } => SinkKind::Csv,
            SinkConfig::Json { .. } => SinkKind::Json,
            SinkConfig::Parquet { .. } => SinkKind::Parquet,
            SinkConfig::Delta { .. } => SinkKind::Delta,
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::Console {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Partially specified sink settings as they come from a single configuration source
///
/// Layers are merged field by field with [`SinkOverrides::or`] and turned into a [`SinkConfig`]
/// once all sources were applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkOverrides {
    #[serde(rename = "type", default)]
    pub kind: Option<SinkKind>,
    #[serde(default)]
    pub destination_folder: Option<PathBuf>,
    #[serde(default)]
    pub delimiter: Option<char>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub storage_options: Option<BTreeMap<String, String>>,
}

impl SinkOverrides {
    /// Fill every field unset in `self` from `lower`
    pub fn or(self, lower: SinkOverrides) -> SinkOverrides {
        SinkOverrides {
            kind: self.kind.or(lower.kind),
            destination_folder: self.destination_folder.or(lower.destination_folder),
            delimiter: self.delimiter.or(lower.delimiter),
            page_size: self.page_size.or(lower.page_size),
            location: self.location.or(lower.location),
            storage_options: self.storage_options.or(lower.storage_options),
        }
    }

    /// Validate the merged settings and build the sink configuration, unset fields take their defaults
    pub fn build(self) -> Result<SinkConfig, InvalidSink> {
        let kind = self.kind.unwrap_or(SinkKind::Console);
        let folder = |folder: Option<PathBuf>| -> Result<PathBuf, InvalidSink> {
            match folder {
                Some(path) if path.as_os_str().is_empty() => Err(InvalidSink::new(
                    kind,
                    "destination_folder must not be empty",
                )),
                Some(path) => Ok(path),
                None => Ok(PathBuf::from(".")),
            }
        };

        match kind {
            SinkKind::Console => {
                let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
                if page_size == 0 {
                    return Err(InvalidSink::new(kind, "page_size must be at least 1"));
                }

                Ok(SinkConfig::Console { page_size })
            }
            SinkKind::Csv => {
                let delimiter = self.delimiter.unwrap_or(DEFAULT_DELIMITER);
                if !delimiter.is_ascii() || delimiter == '\n' || delimiter == '"' {
                    return Err(InvalidSink::new(
                        kind,
                        format!("'{delimiter}' cannot be used as a delimiter"),
                    ));
                }

                Ok(SinkConfig::Csv {
                    destination_folder: folder(self.destination_folder)?,
                    delimiter,
                })
            }
            SinkKind::Json => Ok(SinkConfig::Json {
                destination_folder: folder(self.destination_folder)?,
            }),
            SinkKind::Parquet => Ok(SinkConfig::Parquet {
                destination_folder: folder(self.destination_folder)?,
            }),
            SinkKind::Delta => match self.location {
                Some(location) if !location.trim().is_empty() => Ok(SinkConfig::Delta {
                    location,
                    storage_options: self.storage_options.unwrap_or_default(),
                }),
                _ => Err(InvalidSink::new(kind, "a table location is required")),
            },
        }
    }
}

impl From<SinkConfig> for SinkOverrides {
    fn from(config: SinkConfig) -> Self {
        let kind = Some(config.kind());

        match config {
            SinkConfig::Console { page_size } => SinkOverrides {
                kind,
                page_size: Some(page_size),
                ..Default::default()
            },
            SinkConfig::Csv {
                destination_folder,
                delimiter,
            } => SinkOverrides {
                kind,
                destination_folder: Some(destination_folder),
                delimiter: Some(delimiter),
                ..Default::default()
            },
            SinkConfig::Json { destination_folder } | SinkConfig::Parquet { destination_folder } => {
                SinkOverrides {
                    kind,
                    destination_folder: Some(destination_folder),
                    ..Default::default()
                }
            }
            SinkConfig::Delta {
                location,
                storage_options,
            } => SinkOverrides {
                kind,
                location: Some(location),
                storage_options: Some(storage_options),
                ..Default::default()
            },
        }
    }
}
