use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::json::reader::{infer_json_schema_from_iterator, ReaderBuilder};
use datafusion::arrow::record_batch::RecordBatch;
use reportfetch_core::model::{Report, Row};
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;

const BATCH_SIZE: usize = 1024;

/// Convert the rows of a report into Arrow record batches
///
/// Column types are inferred from the values. Columns that only ever hold `null` are typed as
/// strings and nested values are kept as their JSON text so every sink can store them
pub fn report_to_batches(report: &Report) -> Result<Vec<RecordBatch>> {
    if report.is_empty() {
        return Ok(vec![]);
    }

    let rows = report.rows.iter().map(flatten_nested).collect::<Vec<_>>();
    let schema = infer_schema(&rows)?;

    let mut decoder = ReaderBuilder::new(schema)
        .with_batch_size(BATCH_SIZE)
        .build_decoder()?;

    let mut batches = Vec::with_capacity(rows.len().div_ceil(BATCH_SIZE));
    for chunk in rows.chunks(BATCH_SIZE) {
        decoder.serialize(chunk)?;
        if let Some(batch) = decoder.flush()? {
            batches.push(batch);
        }
    }

    Ok(batches)
}

fn infer_schema(rows: &[Row]) -> Result<Arc<Schema>> {
    let inferred = infer_json_schema_from_iterator(
        rows.iter().map(|row| Ok(Value::Object(row.clone()))),
    )?;

    let fields = inferred
        .fields()
        .iter()
        .map(|field| match field.data_type() {
            DataType::Null => Arc::new(Field::new(field.name(), DataType::Utf8, true)),
            _ => field.clone(),
        })
        .collect::<Vec<_>>();

    Ok(Arc::new(Schema::new(fields)))
}

fn flatten_nested(row: &Row) -> Row {
    row.iter()
        .map(|(name, value)| {
            let value = match value {
                Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
                other => other.clone(),
            };
            (name.clone(), value)
        })
        .collect()
}
