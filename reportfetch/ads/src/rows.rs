//! Flattening of `searchStream` responses into rows

use reportfetch_core::model::Row;
use serde::Deserialize;
use serde_json::Value;

/// One message of a `searchStream` response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStreamBatch {
    #[serde(default)]
    pub results: Vec<Value>,

    /// Comma separated camelCase paths of the selected fields, e.g. `campaign.id,metrics.costMicros`
    #[serde(default)]
    pub field_mask: Option<String>,

    #[serde(default)]
    pub request_id: Option<String>,
}

impl SearchStreamBatch {
    /// Rows in select order, columns are named by their snake_case field path
    ///
    /// Fields listed in the mask but omitted from a result are `null`. Without a field mask every
    /// leaf value of a result becomes a column
    pub fn rows(&self) -> Vec<Row> {
        let fields = self
            .field_mask
            .as_deref()
            .map(|mask| {
                mask.split(',')
                    .map(str::trim)
                    .filter(|field| !field.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        self.results
            .iter()
            .map(|result| {
                if fields.is_empty() {
                    let mut row = Row::new();
                    flatten_into(&mut row, None, result);
                    row
                } else {
                    fields
                        .iter()
                        .map(|field| (column_name(field), lookup(result, field)))
                        .collect()
                }
            })
            .collect()
    }
}

fn lookup(result: &Value, path: &str) -> Value {
    path.split('.')
        .try_fold(result, |value, segment| value.get(segment))
        .cloned()
        .unwrap_or(Value::Null)
}

fn flatten_into(row: &mut Row, prefix: Option<&str>, value: &Value) {
    match value {
        Value::Object(fields) => {
            for (name, nested) in fields {
                let path = match prefix {
                    Some(prefix) => format!("{prefix}.{name}"),
                    None => name.clone(),
                };
                flatten_into(row, Some(&path), nested);
            }
        }
        leaf => {
            if let Some(path) = prefix {
                row.insert(column_name(path), leaf.clone());
            }
        }
    }
}

/// `adGroupCriterion.keyword.matchType` becomes `ad_group_criterion.keyword.match_type`
pub fn column_name(path: &str) -> String {
    let mut name = String::with_capacity(path.len() + 4);

    for c in path.chars() {
        if c.is_ascii_uppercase() {
            name.push('_');
            name.push(c.to_ascii_lowercase());
        } else {
            name.push(c);
        }
    }

    name
}
