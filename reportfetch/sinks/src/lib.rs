//! # reportfetch sinks
//!
//! Output destinations for query results.
//!
//! | Output    | Sink            | Target per query                         |
//! |-----------|-----------------|------------------------------------------|
//! | `console` | [`ConsoleSink`] | table with the first `page_size` rows    |
//! | `csv`     | [`FileSink`]    | `<destination_folder>/<query>.csv`       |
//! | `json`    | [`FileSink`]    | `<destination_folder>/<query>.json`      |
//! | `parquet` | [`FileSink`]    | `<destination_folder>/<query>.parquet`   |
//! | `delta`   | [`DeltaSink`]   | Delta table `<location>/<query>/`        |
//!
//! Rows are converted into Arrow record batches before they are written, see [`report_to_batches`].

mod batches;
mod console;
mod delta;
mod error;
mod file;

pub use batches::report_to_batches;
pub use console::ConsoleSink;
pub use delta::DeltaSink;
pub use error::{Error, Result};
pub use file::{FileFormat, FileSink};

use reportfetch_core::execution::OutputSink;
use reportfetch_core::model::SinkConfig;
use std::sync::Arc;

/// Create the sink for a validated output configuration
pub fn build_sink(config: &SinkConfig) -> Result<Arc<dyn OutputSink>> {
    let sink: Arc<dyn OutputSink> = match config {
        SinkConfig::Console { page_size } => Arc::new(ConsoleSink::stdout(*page_size)),
        SinkConfig::Csv {
            destination_folder,
            delimiter,
        } => {
            let delimiter = u8::try_from(*delimiter)
                .map_err(|_| Error::Other(format!("'{delimiter}' is not a single byte delimiter")))?;
            Arc::new(FileSink::new(
                destination_folder,
                FileFormat::Csv { delimiter },
            ))
        }
        SinkConfig::Json { destination_folder } => {
            Arc::new(FileSink::new(destination_folder, FileFormat::Json))
        }
        SinkConfig::Parquet { destination_folder } => {
            Arc::new(FileSink::new(destination_folder, FileFormat::Parquet))
        }
        SinkConfig::Delta {
            location,
            storage_options,
        } => Arc::new(DeltaSink::try_new(location, storage_options)?),
    };

    Ok(sink)
}
