use async_trait::async_trait;
use datafusion::config::CsvOptions;
use datafusion::dataframe::DataFrameWriteOptions;
use datafusion::prelude::*;
use reportfetch_core::execution::{OutputSink, SinkError};
use reportfetch_core::model::Report;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::batches::report_to_batches;

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv { delimiter: u8 },
    Json,
    Parquet,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv { .. } => "csv",
            FileFormat::Json => "json",
            FileFormat::Parquet => "parquet",
        }
    }
}

/// Writes every query to its own file `<destination_folder>/<query name>.<extension>`
///
/// Existing files are replaced. Queries without rows do not create a file
pub struct FileSink {
    folder: PathBuf,
    format: FileFormat,
    ctx: SessionContext,
}

impl FileSink {
    pub fn new(folder: impl Into<PathBuf>, format: FileFormat) -> Self {
        Self {
            folder: folder.into(),
            format,
            ctx: SessionContext::new(),
        }
    }

    pub fn path_for(&self, query_name: &str) -> PathBuf {
        self.folder
            .join(format!("{query_name}.{}", self.format.extension()))
    }

    async fn write_file(&self, report: &Report, path: &Path) -> crate::Result<()> {
        let path = std::path::absolute(path)?;
        let location = path
            .to_str()
            .ok_or_else(|| crate::Error::InvalidLocation(path.display().to_string()))?;

        if tokio::fs::try_exists(&path).await? {
            tokio::fs::remove_file(&path).await?;
        }

        let data = self.ctx.read_batches(report_to_batches(report)?)?;
        let write_options = DataFrameWriteOptions::new().with_single_file_output(true);

        let _ = match self.format {
            FileFormat::Csv { delimiter } => {
                let csv_options = CsvOptions::default()
                    .with_has_header(true)
                    .with_delimiter(delimiter);

                data.write_csv(location, write_options, Some(csv_options))
                    .await?
            }
            FileFormat::Json => data.write_json(location, write_options, None).await?,
            FileFormat::Parquet => data.write_parquet(location, write_options, None).await?,
        };

        Ok(())
    }
}

#[async_trait]
impl OutputSink for FileSink {
    fn name(&self) -> &'static str {
        self.format.extension()
    }

    async fn prepare_destination(&self) -> Result<(), SinkError> {
        tokio::fs::create_dir_all(&self.folder)
            .await
            .map_err(|e| SinkError::new(self.name(), self.folder.display().to_string(), e))
    }

    async fn write(&self, report: &Report, query_name: &str) -> Result<(), SinkError> {
        let path = self.path_for(query_name);

        if report.is_empty() {
            debug!("Query {query_name} returned no rows, skipping {}", path.display());
            return Ok(());
        }

        self.write_file(report, &path)
            .await
            .map_err(|e| SinkError::new(self.name(), path.display().to_string(), e))?;

        debug!("Wrote {} rows to {}", report.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::assert_batches_eq;
    use serde_json::json;

    fn report() -> Report {
        Report::new(
            [
                json!({"campaign.id": "1", "metrics.clicks": 10}),
                json!({"campaign.id": "2", "metrics.clicks": 20}),
            ]
            .into_iter()
            .map(|row| row.as_object().cloned().unwrap())
            .collect(),
        )
    }

    #[tokio::test]
    async fn test_write_csv_ok() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path(), FileFormat::Csv { delimiter: b';' });

        sink.prepare_destination().await.unwrap();
        sink.write(&report(), "campaigns").await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("campaigns.csv")).unwrap();
        assert_eq!(written, "campaign.id;metrics.clicks\n1;10\n2;20\n");
    }

    #[tokio::test]
    async fn test_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path(), FileFormat::Csv { delimiter: b',' });
        std::fs::write(dir.path().join("campaigns.csv"), "stale").unwrap();

        sink.write(&report(), "campaigns").await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("campaigns.csv")).unwrap();
        assert!(written.starts_with("campaign.id,metrics.clicks\n"));
    }

    #[tokio::test]
    async fn test_write_parquet_ok() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("nested"), FileFormat::Parquet);

        sink.prepare_destination().await.unwrap();
        sink.write(&report(), "campaigns").await.unwrap();

        let ctx = SessionContext::new();
        let path = dir.path().join("nested").join("campaigns.parquet");
        let batches = ctx
            .read_parquet(path.to_str().unwrap(), ParquetReadOptions::default())
            .await
            .unwrap()
            .sort(vec![ident("campaign.id").sort(true, false)])
            .unwrap()
            .collect()
            .await
            .unwrap();

        assert_batches_eq!(
            [
                "+-------------+----------------+",
                "| campaign.id | metrics.clicks |",
                "+-------------+----------------+",
                "| 1           | 10             |",
                "| 2           | 20             |",
                "+-------------+----------------+",
            ],
            batches.as_slice()
        );
    }

    #[tokio::test]
    async fn test_write_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path(), FileFormat::Json);

        sink.write(&report(), "campaigns").await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("campaigns.json")).unwrap();
        let lines = written.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(lines[0]).unwrap(),
            json!({"campaign.id": "1", "metrics.clicks": 10})
        );
    }

    #[tokio::test]
    async fn test_empty_report_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path(), FileFormat::Json);

        sink.write(&Report::default(), "empty").await.unwrap();

        assert!(!dir.path().join("empty.json").exists());
    }
}
