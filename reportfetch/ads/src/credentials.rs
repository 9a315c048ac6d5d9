use reportfetch_core::model::AccountId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Name of the credentials file looked up in the home directory
pub const DEFAULT_CREDENTIALS_FILE: &str = "google-ads.yaml";

pub const DEFAULT_ENDPOINT: &str = "https://googleads.googleapis.com/";

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("Cannot read ads credentials from '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid ads credentials in '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("No home directory to look up {DEFAULT_CREDENTIALS_FILE} in")]
    NoHomeDir,
}

/// OAuth and API settings from a `google-ads.yaml` file
#[derive(Clone, Serialize, Deserialize)]
pub struct AdsCredentials {
    pub developer_token: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,

    /// Manager account the requests are made through
    #[serde(default)]
    pub login_customer_id: Option<AccountId>,

    #[serde(default = "default_endpoint")]
    pub endpoint: Url,

    #[serde(default = "default_token_uri")]
    pub token_uri: Url,
}

fn default_endpoint() -> Url {
    Url::parse(DEFAULT_ENDPOINT).expect("valid default endpoint")
}

fn default_token_uri() -> Url {
    Url::parse(DEFAULT_TOKEN_URI).expect("valid default token uri")
}

impl std::fmt::Debug for AdsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdsCredentials")
            .field("client_id", &self.client_id)
            .field("login_customer_id", &self.login_customer_id)
            .field("endpoint", &self.endpoint.as_str())
            .field("token_uri", &self.token_uri.as_str())
            .finish_non_exhaustive()
    }
}

/// `~/google-ads.yaml`
pub fn default_credentials_path() -> Result<PathBuf, CredentialsError> {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_CREDENTIALS_FILE))
        .ok_or(CredentialsError::NoHomeDir)
}

impl AdsCredentials {
    /// Load credentials from a YAML or JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CredentialsError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| CredentialsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let parsed = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents).map_err(|e| e.to_string()),
            _ => serde_yml::from_str(&contents).map_err(|e| e.to_string()),
        };

        parsed.map_err(|message| CredentialsError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_yaml_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            r#"
developer_token: dev-token
client_id: client.apps.googleusercontent.com
client_secret: secret
refresh_token: refresh
login_customer_id: 123-456-7890
use_proto_plus: true
"#
        )
        .unwrap();

        let credentials = AdsCredentials::load(file.path()).unwrap();

        assert_eq!(credentials.developer_token, "dev-token");
        assert_eq!(
            credentials.login_customer_id.unwrap().as_str(),
            "1234567890"
        );
        assert_eq!(credentials.endpoint.as_str(), DEFAULT_ENDPOINT);
        assert_eq!(credentials.token_uri.as_str(), DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_debug_hides_secrets() {
        let credentials: AdsCredentials = serde_json::from_str(
            r#"{"developer_token": "dev", "client_id": "id", "client_secret": "shh", "refresh_token": "rt", "login_customer_id": 1}"#,
        )
        .unwrap();

        let debug = format!("{credentials:?}");
        assert!(!debug.contains("shh"));
        assert!(!debug.contains("rt\""));
    }

    #[test]
    fn test_missing_fields_are_reported() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(file, "developer_token: dev").unwrap();

        let err = AdsCredentials::load(file.path()).unwrap_err();
        assert!(matches!(err, CredentialsError::Parse { .. }));
    }
}
