//! Resolution of the run configuration from the command line, a config file and defaults

use chrono::NaiveDate;
use miette::{Diagnostic, NamedSource, SourceOffset, SourceSpan};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument, Span};

use crate::model::{
    AccountId, AccountSeed, Config, ConfigOverrides, InvalidAccountId, InvalidSink, MacroParams,
    PreparedQuery, QueryReference, DEFAULT_API_VERSION,
};
use crate::reader::QueryTextResolver;
use crate::templating::{QueryTemplate, TemplateError};

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum ConfigError {
    #[error("No account to run the queries for")]
    #[diagnostic(
        code(reportfetch::config::missing_account),
        help(
            "Pass --account, set 'account' in the config file or add a login_customer_id to the ads credentials file"
        )
    )]
    MissingAccount,

    #[error(transparent)]
    #[diagnostic(code(reportfetch::config::invalid_account))]
    InvalidAccount(#[from] InvalidAccountId),

    #[error(transparent)]
    #[diagnostic(code(reportfetch::config::invalid_output))]
    InvalidSink(#[from] InvalidSink),

    #[error("Cannot prepare query '{query}'")]
    #[diagnostic(code(reportfetch::config::template))]
    Template {
        query: String,
        #[source]
        #[diagnostic_source]
        source: TemplateError,
    },

    #[error("Invalid macro parameters")]
    #[diagnostic(code(reportfetch::config::macro_params))]
    Params(
        #[source]
        #[diagnostic_source]
        TemplateError,
    ),

    #[error("Cannot read query '{query}' from '{file_path}'")]
    #[diagnostic(
        code(reportfetch::config::query_not_found),
        help("Check that the file path is correct or pass --input console for inline queries")
    )]
    QueryRead {
        query: String,
        file_path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Config file not found: '{file_path}'")]
    #[diagnostic(
        code(reportfetch::config::file_not_found),
        help("Check that the file path is correct and the file exists")
    )]
    NotFound {
        #[source]
        source: std::io::Error,
        file_path: String,
    },

    #[error("Unsupported configuration format: '{0}'")]
    #[diagnostic(
        code(reportfetch::config::unknown_format),
        help(
            "Available formats in this build:\n{}",
            ConfigFormat::available_formats()
        )
    )]
    UnknownFormat(ConfigFormat),

    #[error("JSON parsing error")]
    #[diagnostic(code(reportfetch::config::json_parse_error))]
    ParseJson {
        #[source_code]
        source_code: Arc<NamedSource<String>>,
        #[label("{}", error)]
        span: SourceSpan,
        #[source]
        error: serde_json::Error,
    },

    #[cfg(feature = "yaml")]
    #[error("YAML parsing error")]
    #[diagnostic(code(reportfetch::config::yaml_parse_error))]
    ParseYaml {
        #[source_code]
        source_code: Arc<NamedSource<String>>,
        #[label("{}", error)]
        span: SourceSpan,
        #[source]
        error: serde_yml::Error,
    },

    #[cfg(feature = "toml")]
    #[error("TOML parsing error")]
    #[diagnostic(code(reportfetch::config::toml_parse_error))]
    ParseToml {
        #[source_code]
        source_code: Arc<NamedSource<String>>,
        #[label("{}", error)]
        span: SourceSpan,
        #[source]
        error: toml::de::Error,
    },
}

/// Serialization format of a config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json files)
    Json,
    /// TOML format (.toml files)
    Toml,
    /// YAML format (.yml or .yaml files)
    Yaml,
    /// Unknown or unsupported format
    Unknown(String),
}

impl ConfigFormat {
    fn available_formats() -> String {
        let mut formats = vec!["• JSON (.json)"];

        #[cfg(feature = "yaml")]
        formats.push("• YAML (.yaml, .yml)");

        #[cfg(feature = "toml")]
        formats.push("• TOML (.toml)");

        formats.join("\n")
    }
}

impl std::fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigFormat::Json => write!(f, "json"),
            ConfigFormat::Toml => write!(f, "toml"),
            ConfigFormat::Yaml => write!(f, "yaml"),
            ConfigFormat::Unknown(format) => write!(f, "{format}"),
        }
    }
}

pub fn format_from_path<P: AsRef<Path>>(path: P) -> ConfigFormat {
    let path = path.as_ref();
    let ext = path.extension().and_then(|s| s.to_str());

    match ext {
        Some("toml") => ConfigFormat::Toml,
        Some("json") => ConfigFormat::Json,
        Some("yml") | Some("yaml") => ConfigFormat::Yaml,
        ext => ConfigFormat::Unknown(ext.unwrap_or("unknown_ext").to_string()),
    }
}

/// Merges the configuration sources of a run into one immutable [`Config`]
///
/// Every setting is taken from the first source that provides it:
///
/// 1. command line
/// 2. config file
/// 3. built-in default
///
/// Output settings are merged field by field and macro parameters key by key
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    span: Span,
}

impl ConfigResolver {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// Build the run configuration
    ///
    /// `login_account` is the account from the ads credentials file and is only used when neither
    /// the command line nor the config file name an account
    #[instrument(parent = &self.span, skip_all, err)]
    pub fn build(
        &self,
        cli: ConfigOverrides,
        file: Option<ConfigOverrides>,
        login_account: Option<AccountId>,
    ) -> Result<Config, ConfigError> {
        let file = file.unwrap_or_default();

        let account = cli
            .account
            .filter(|seed| !seed.is_empty())
            .or(file.account.filter(|seed| !seed.is_empty()))
            .or(login_account.map(AccountSeed::Single))
            .ok_or(ConfigError::MissingAccount)?;

        let output = cli
            .output
            .unwrap_or_default()
            .or(file.output.unwrap_or_default())
            .build()?;

        let macro_params = cli
            .macro_params
            .unwrap_or_default()
            .merged_over(file.macro_params.unwrap_or_default());

        let config = Config {
            account,
            output,
            api_version: cli
                .api_version
                .or(file.api_version)
                .unwrap_or(DEFAULT_API_VERSION),
            macro_params,
            account_selection_query: cli
                .account_selection_query
                .or(file.account_selection_query),
        };

        debug!(
            account = %config.account,
            output = %config.output.kind(),
            api_version = config.api_version,
            "Resolved configuration"
        );

        Ok(config)
    }

    /// Resolve dynamic date values of the macro parameters as seen from `today`
    pub fn resolve_params(
        &self,
        params: &MacroParams,
        today: NaiveDate,
    ) -> Result<MacroParams, ConfigError> {
        crate::templating::resolve_dynamic_params(params, today).map_err(ConfigError::Params)
    }

    /// Read and render a single query
    ///
    /// The text is always scanned for placeholders, a placeholder without a value is an error
    pub fn prepare_query(
        &self,
        reference: &QueryReference,
        reader: &dyn QueryTextResolver,
        params: &MacroParams,
    ) -> Result<PreparedQuery, ConfigError> {
        let text = reader.read(reference)?;
        let rendered = QueryTemplate::parse(&text)
            .and_then(|template| template.render(params))
            .map_err(|source| ConfigError::Template {
                query: reference.name().to_string(),
                source,
            })?;

        Ok(PreparedQuery::new(reference.clone(), rendered))
    }

    /// Read and render all queries, the first failing query aborts preparation
    #[instrument(parent = &self.span, skip_all, fields(queries = references.len()), err)]
    pub fn prepare_queries(
        &self,
        references: &[QueryReference],
        reader: &dyn QueryTextResolver,
        params: &MacroParams,
    ) -> Result<Vec<PreparedQuery>, ConfigError> {
        references
            .iter()
            .map(|reference| self.prepare_query(reference, reader, params))
            .collect()
    }

    /// Read a config file, the format is inferred from the file extension
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<ConfigOverrides, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::NotFound {
            source,
            file_path: path.display().to_string(),
        })?;

        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("config");

        Self::from_str(&contents, format_from_path(path), name)
    }

    /// Parse config file contents of the given format
    pub fn from_str(
        contents: &str,
        format: ConfigFormat,
        name: &str,
    ) -> Result<ConfigOverrides, ConfigError> {
        debug!("Parsing config with format: {format:?}");

        match format {
            ConfigFormat::Json => serde_json::from_str(contents).map_err(|error| {
                let offset = SourceOffset::from_location(contents, error.line(), error.column());
                ConfigError::ParseJson {
                    source_code: Arc::new(NamedSource::new(name, contents.to_string())),
                    span: SourceSpan::new(offset, 1),
                    error,
                }
            }),
            ConfigFormat::Yaml => {
                #[cfg(feature = "yaml")]
                {
                    serde_yml::from_str(contents).map_err(|error| {
                        let offset = match error.location() {
                            Some(location) => SourceOffset::from_location(
                                contents,
                                location.line(),
                                location.column(),
                            ),
                            None => SourceOffset::from(0),
                        };
                        ConfigError::ParseYaml {
                            source_code: Arc::new(NamedSource::new(name, contents.to_string())),
                            span: SourceSpan::new(offset, 1),
                            error,
                        }
                    })
                }
                #[cfg(not(feature = "yaml"))]
                {
                    Err(ConfigError::UnknownFormat(ConfigFormat::Yaml))
                }
            }
            ConfigFormat::Toml => {
                #[cfg(feature = "toml")]
                {
                    toml::from_str(contents).map_err(|error| {
                        let offset = match error.span() {
                            Some(span) => SourceOffset::from(span.start),
                            None => SourceOffset::from(0),
                        };
                        ConfigError::ParseToml {
                            source_code: Arc::new(NamedSource::new(name, contents.to_string())),
                            span: SourceSpan::new(offset, 1),
                            error,
                        }
                    })
                }
                #[cfg(not(feature = "toml"))]
                {
                    Err(ConfigError::UnknownFormat(ConfigFormat::Toml))
                }
            }
            fmt @ ConfigFormat::Unknown(_) => Err(ConfigError::UnknownFormat(fmt)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuerySource, SinkConfig, SinkKind, SinkOverrides};
    use rstest::rstest;

    fn resolver() -> ConfigResolver {
        ConfigResolver::new(Span::none())
    }

    fn seed(value: &str) -> AccountSeed {
        AccountSeed::parse(value).unwrap()
    }

    fn with_account(value: &str) -> ConfigOverrides {
        ConfigOverrides {
            account: Some(seed(value)),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = resolver().build(with_account("1"), None, None).unwrap();

        assert_eq!(config.output, SinkConfig::default());
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
        assert!(config.macro_params.is_empty());
        assert!(config.account_selection_query.is_none());
    }

    #[rstest]
    #[case::cli_wins(Some("1"), Some("2"), Some("3"), "1")]
    #[case::file_over_login(None, Some("2"), Some("3"), "2")]
    #[case::login_fallback(None, None, Some("3"), "3")]
    fn test_account_precedence(
        #[case] cli: Option<&str>,
        #[case] file: Option<&str>,
        #[case] login: Option<&str>,
        #[case] expected: &str,
    ) {
        let cli = ConfigOverrides {
            account: cli.map(seed),
            ..Default::default()
        };
        let file = file.map(with_account);
        let login = login.map(|id| id.parse().unwrap());

        let config = resolver().build(cli, file, login).unwrap();
        assert_eq!(config.account, seed(expected));
    }

    #[test]
    fn test_missing_account() {
        let err = resolver()
            .build(ConfigOverrides::default(), Some(ConfigOverrides::default()), None)
            .unwrap_err();

        assert!(matches!(err, ConfigError::MissingAccount));
    }

    #[rstest]
    #[case::cli_wins(Some(17), Some(18), 17)]
    #[case::file_over_default(None, Some(18), 18)]
    #[case::default(None, None, DEFAULT_API_VERSION)]
    fn test_api_version_precedence(
        #[case] cli: Option<u32>,
        #[case] file: Option<u32>,
        #[case] expected: u32,
    ) {
        let cli = ConfigOverrides {
            api_version: cli,
            ..with_account("1")
        };
        let file = ConfigOverrides {
            api_version: file,
            ..Default::default()
        };

        let config = resolver().build(cli, Some(file), None).unwrap();
        assert_eq!(config.api_version, expected);
    }

    #[test]
    fn test_output_and_macros_merge_per_field() {
        let cli = ConfigOverrides {
            output: Some(SinkOverrides {
                delimiter: Some(';'),
                ..Default::default()
            }),
            macro_params: Some(MacroParams::from_iter([("start", "2024-01-01")])),
            account_selection_query: Some(QuerySource::Inline("SELECT 1".into())),
            ..with_account("1")
        };
        let file = ConfigOverrides {
            output: Some(SinkOverrides {
                kind: Some(SinkKind::Csv),
                destination_folder: Some("out".into()),
                delimiter: Some(','),
                ..Default::default()
            }),
            macro_params: Some(MacroParams::from_iter([
                ("start", "2023-01-01"),
                ("end", "2023-12-31"),
            ])),
            account_selection_query: Some(QuerySource::File("accounts.sql".into())),
            ..Default::default()
        };

        let config = resolver().build(cli, Some(file), None).unwrap();

        assert_eq!(
            config.output,
            SinkConfig::Csv {
                destination_folder: "out".into(),
                delimiter: ';'
            }
        );
        assert_eq!(config.macro_params.get("start"), Some("2024-01-01"));
        assert_eq!(config.macro_params.get("end"), Some("2023-12-31"));
        assert_eq!(
            config.account_selection_query,
            Some(QuerySource::Inline("SELECT 1".into()))
        );
    }

    #[test]
    fn test_invalid_output_is_config_error() {
        let cli = ConfigOverrides {
            output: Some(SinkOverrides {
                kind: Some(SinkKind::Delta),
                ..Default::default()
            }),
            ..with_account("1")
        };

        let err = resolver().build(cli, None, None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSink(_)));
    }

    #[rstest]
    #[case("config.yaml", ConfigFormat::Yaml)]
    #[case("config.yml", ConfigFormat::Yaml)]
    #[case("config.json", ConfigFormat::Json)]
    #[case("config.toml", ConfigFormat::Toml)]
    #[case("config.ini", ConfigFormat::Unknown("ini".into()))]
    fn test_format_from_path(#[case] path: &str, #[case] expected: ConfigFormat) {
        assert_eq!(format_from_path(path), expected);
    }

    #[test]
    fn test_parse_error_points_into_source() {
        let err = ConfigResolver::from_str("{\"account\": [}", ConfigFormat::Json, "config.json")
            .unwrap_err();

        assert!(matches!(err, ConfigError::ParseJson { .. }));
    }

    #[test]
    fn test_unknown_format() {
        let err = ConfigResolver::load_file("does/not/exist.ini").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));

        let err = ConfigResolver::from_str("", ConfigFormat::Unknown("ini".into()), "config.ini")
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownFormat(_)));
    }
}
