//! Saving the resolved configuration for later runs

use std::path::{Path, PathBuf};
use tracing::{info, warn, Span};

use crate::config::{format_from_path, ConfigFormat};
use crate::model::Config;

/// Default file the configuration is saved to
pub const DEFAULT_CONFIG_DESTINATION: &str = "config.yaml";

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Cannot serialize config as {format}: {message}")]
    Serialize { format: ConfigFormat, message: String },

    #[error("Cannot write config to '{path}'")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported configuration format: '{0}'")]
    UnknownFormat(ConfigFormat),
}

/// Saving only makes sense when the settings did not come from a config file already
pub fn should_persist(save_requested: bool, launched_from_file: bool) -> bool {
    save_requested && !launched_from_file
}

/// Writes a [`Config`] in the format matching the destination file extension, YAML by default
#[derive(Debug, Clone)]
pub struct ConfigPersister {
    destination: PathBuf,
    span: Span,
}

impl ConfigPersister {
    pub fn new(destination: impl Into<PathBuf>, span: Span) -> Self {
        Self {
            destination: destination.into(),
            span,
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn save(&self, config: &Config) -> Result<(), PersistenceError> {
        let contents = serialize(config, format_from_path(&self.destination))?;

        if let Some(parent) = self.destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| PersistenceError::Write {
                path: self.destination.clone(),
                source,
            })?;
        }

        std::fs::write(&self.destination, contents).map_err(|source| PersistenceError::Write {
            path: self.destination.clone(),
            source,
        })
    }

    /// Save and log the result, returns whether the config was written
    pub fn save_or_warn(&self, config: &Config) -> bool {
        let _guard = self.span.enter();

        match self.save(config) {
            Ok(()) => {
                info!("Saved configuration to {}", self.destination.display());
                true
            }
            Err(err) => {
                warn!("Configuration was not saved: {err}");
                false
            }
        }
    }
}

fn serialize(config: &Config, format: ConfigFormat) -> Result<String, PersistenceError> {
    let failed = |format: ConfigFormat, message: String| PersistenceError::Serialize { format, message };

    match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)
            .map_err(|e| failed(ConfigFormat::Json, e.to_string())),
        ConfigFormat::Toml => {
            #[cfg(feature = "toml")]
            {
                toml::to_string(config).map_err(|e| failed(ConfigFormat::Toml, e.to_string()))
            }
            #[cfg(not(feature = "toml"))]
            {
                Err(PersistenceError::UnknownFormat(ConfigFormat::Toml))
            }
        }
        ConfigFormat::Yaml | ConfigFormat::Unknown(_) => {
            #[cfg(feature = "yaml")]
            {
                serde_yml::to_string(config).map_err(|e| failed(ConfigFormat::Yaml, e.to_string()))
            }
            #[cfg(not(feature = "yaml"))]
            {
                Err(PersistenceError::UnknownFormat(format))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccountSeed, SinkConfig};
    use rstest::rstest;

    #[rstest]
    #[case(true, false, true)]
    #[case(true, true, false)]
    #[case(false, false, false)]
    #[case(false, true, false)]
    fn test_should_persist(
        #[case] save_requested: bool,
        #[case] launched_from_file: bool,
        #[case] expected: bool,
    ) {
        assert_eq!(should_persist(save_requested, launched_from_file), expected);
    }

    #[test]
    fn test_unknown_extension_writes_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("nested").join("reportfetch.conf");
        let config = Config {
            account: AccountSeed::parse("1234567890").unwrap(),
            output: SinkConfig::default(),
            api_version: 19,
            macro_params: Default::default(),
            account_selection_query: None,
        };

        ConfigPersister::new(&destination, Span::none())
            .save(&config)
            .unwrap();

        let written = std::fs::read_to_string(destination).unwrap();
        assert!(written.contains("account: '1234567890'") || written.contains("account: \"1234567890\""));
        assert!(written.contains("type: console"));
    }

    #[test]
    fn test_unwritable_destination_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            account: AccountSeed::parse("1").unwrap(),
            output: SinkConfig::default(),
            api_version: 19,
            macro_params: Default::default(),
            account_selection_query: None,
        };

        // a directory cannot be overwritten with a file
        let persister = ConfigPersister::new(dir.path(), Span::none());
        assert!(!persister.save_or_warn(&config));
    }
}
