use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::account::AccountSeed;
use super::query::QuerySource;
use super::sink::{SinkConfig, SinkOverrides};

/// Remote API version used when no source specifies one
pub const DEFAULT_API_VERSION: u32 = 19;

/// Named values substituted into `{placeholder}` tokens of query text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacroParams(BTreeMap<String, String>);

impl MacroParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Keys of `self` win over keys of `lower`
    pub fn merged_over(mut self, lower: MacroParams) -> MacroParams {
        for (name, value) in lower.0 {
            self.0.entry(name).or_insert(value);
        }
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MacroParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Fully resolved run configuration
///
/// Produced once by the [`ConfigResolver`](crate::config::ConfigResolver) and treated as read-only
/// afterwards. The serialized form is the saved config file format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Seed account(s) the run starts from
    pub account: AccountSeed,

    /// Where query results are written
    pub output: SinkConfig,

    /// Version of the remote reporting API
    pub api_version: u32,

    /// Values for the placeholders used in query text
    #[serde(rename = "macro", default, skip_serializing_if = "MacroParams::is_empty")]
    pub macro_params: MacroParams,

    /// Query enumerating the leaf accounts to include, replaces the default hierarchy lookup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_selection_query: Option<QuerySource>,
}

/// One configuration source where every setting is optional
///
/// Both the command line and config files are read into this shape before being merged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(default)]
    pub account: Option<AccountSeed>,
    #[serde(default)]
    pub output: Option<SinkOverrides>,
    #[serde(default)]
    pub api_version: Option<u32>,
    #[serde(rename = "macro", default)]
    pub macro_params: Option<MacroParams>,
    #[serde(default)]
    pub account_selection_query: Option<QuerySource>,
}

impl From<Config> for ConfigOverrides {
    fn from(config: Config) -> Self {
        ConfigOverrides {
            account: Some(config.account),
            output: Some(config.output.into()),
            api_version: Some(config.api_version),
            macro_params: Some(config.macro_params),
            account_selection_query: config.account_selection_query,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sink::SinkKind;

    #[test]
    fn test_macro_params_merge_prefers_self() {
        let cli = MacroParams::from_iter([("start_date", "2024-01-01")]);
        let file = MacroParams::from_iter([("start_date", "2023-01-01"), ("end_date", "2024-02-01")]);

        let merged = cli.merged_over(file);
        assert_eq!(merged.get("start_date"), Some("2024-01-01"));
        assert_eq!(merged.get("end_date"), Some("2024-02-01"));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_partial_file_deserializes() {
        let raw = r#"{"account": "123", "output": {"type": "csv"}, "macro": {"x": "1"}}"#;
        let overrides: ConfigOverrides = serde_json::from_str(raw).unwrap();

        assert!(overrides.account.is_some());
        assert!(overrides.api_version.is_none());
        assert_eq!(overrides.output.and_then(|o| o.kind), Some(SinkKind::Csv));
        assert_eq!(overrides.macro_params.unwrap().get("x"), Some("1"));
    }
}
