use async_trait::async_trait;
use deltalake::operations::write::SchemaMode;
use deltalake::protocol::SaveMode;
use deltalake::DeltaOps;
use reportfetch_core::execution::{OutputSink, SinkError};
use reportfetch_core::model::Report;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;
use url::Url;

use crate::batches::report_to_batches;
use crate::{Error, Result};

/// Writes every query into its own Delta table below a common location
///
/// The table of a query is `<location>/<query name>/` and is overwritten on every run, schema
/// changes between runs replace the table schema
#[derive(Debug, Clone)]
pub struct DeltaSink {
    location: Url,
    storage_options: HashMap<String, String>,
}

impl DeltaSink {
    /// `location` is either a URL (`s3://bucket/prefix/`, `file:///tmp/warehouse/`) or a local path
    pub fn try_new(location: &str, storage_options: &BTreeMap<String, String>) -> Result<Self> {
        let mut location = match Url::parse(location) {
            Ok(url) => url,
            Err(_) => Url::from_directory_path(std::path::absolute(location)?)
                .map_err(|_| Error::InvalidLocation(location.to_string()))?,
        };

        if !location.path().ends_with('/') {
            let path = format!("{}/", location.path());
            location.set_path(&path);
        }

        Ok(Self {
            location,
            storage_options: storage_options
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    pub fn table_url(&self, query_name: &str) -> Result<Url> {
        self.location
            .join(&format!("{query_name}/"))
            .map_err(|_| Error::InvalidLocation(format!("{}{query_name}/", self.location)))
    }

    async fn ensure_local_dir(url: &Url) -> Result<()> {
        if url.scheme() == "file" {
            let path = url
                .to_file_path()
                .map_err(|_| Error::InvalidLocation(url.to_string()))?;
            tokio::fs::create_dir_all(path).await?;
        }

        Ok(())
    }

    async fn write_table(&self, report: &Report, table_url: &Url) -> Result<()> {
        Self::ensure_local_dir(table_url).await?;

        let batches = report_to_batches(report)?;
        let _ = DeltaOps::try_from_uri_with_storage_options(
            table_url.as_str(),
            self.storage_options.clone(),
        )
        .await?
        .write(batches)
        .with_save_mode(SaveMode::Overwrite)
        .with_schema_mode(SchemaMode::Overwrite)
        .await?;

        debug!("Wrote {} rows to {table_url}", report.len());
        Ok(())
    }
}

#[async_trait]
impl OutputSink for DeltaSink {
    fn name(&self) -> &'static str {
        "delta"
    }

    async fn prepare_destination(&self) -> std::result::Result<(), SinkError> {
        Self::ensure_local_dir(&self.location)
            .await
            .map_err(|e| SinkError::new(self.name(), self.location.as_str(), e))
    }

    async fn write(&self, report: &Report, query_name: &str) -> std::result::Result<(), SinkError> {
        if report.is_empty() {
            debug!("Query {query_name} returned no rows, leaving its table untouched");
            return Ok(());
        }

        let table_url = self
            .table_url(query_name)
            .map_err(|e| SinkError::new(self.name(), query_name, e))?;

        self.write_table(report, &table_url)
            .await
            .map_err(|e| SinkError::new(self.name(), table_url.as_str(), e))
    }
}
