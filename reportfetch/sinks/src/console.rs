use async_trait::async_trait;
use datafusion::arrow::util::pretty::pretty_format_batches;
use reportfetch_core::execution::{OutputSink, SinkError};
use reportfetch_core::model::Report;
use std::io::{Stdout, Write};
use std::sync::Mutex;

use crate::batches::report_to_batches;

/// Prints the first `page_size` rows of every query as a table
///
/// Writes of concurrently running queries are serialized, a table is never interleaved with another
pub struct ConsoleSink<W: Write + Send = Stdout> {
    writer: Mutex<W>,
    page_size: usize,
}

impl ConsoleSink<Stdout> {
    pub fn stdout(page_size: usize) -> Self {
        Self::new(std::io::stdout(), page_size)
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(writer: W, page_size: usize) -> Self {
        Self {
            writer: Mutex::new(writer),
            page_size,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn render(&self, report: &Report, query_name: &str) -> crate::Result<String> {
        if report.is_empty() {
            return Ok(format!("{query_name}: no rows\n"));
        }

        let page = Report::new(report.rows.iter().take(self.page_size).cloned().collect());
        let table = pretty_format_batches(&report_to_batches(&page)?)?;

        Ok(format!(
            "{query_name}: showing {} of {} rows\n{table}\n",
            page.len(),
            report.len()
        ))
    }
}

#[async_trait]
impl<W: Write + Send + 'static> OutputSink for ConsoleSink<W> {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn write(&self, report: &Report, query_name: &str) -> Result<(), SinkError> {
        let output = self
            .render(report, query_name)
            .map_err(|e| SinkError::new(self.name(), query_name, e))?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SinkError::new(self.name(), query_name, "console writer is poisoned"))?;

        writer
            .write_all(output.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| SinkError::new(self.name(), query_name, e))
    }
}
