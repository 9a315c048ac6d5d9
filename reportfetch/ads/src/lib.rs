//! # reportfetch ads
//!
//! Google Ads access for reportfetch.
//!
//! [`GoogleAdsClient`] implements [`RemoteApiClient`](reportfetch_core::execution::RemoteApiClient)
//! on top of the Google Ads REST interface. Credentials are read from a `google-ads.yaml` file:
//!
//! ```yaml
//! developer_token: INSERT_DEVELOPER_TOKEN
//! client_id: INSERT_CLIENT_ID
//! client_secret: INSERT_CLIENT_SECRET
//! refresh_token: INSERT_REFRESH_TOKEN
//! login_customer_id: 1234567890
//! ```

mod client;
mod credentials;
mod retry;
pub mod rows;

pub use client::{status_error, ClientError, GoogleAdsClient};
pub use credentials::{
    default_credentials_path, AdsCredentials, CredentialsError, DEFAULT_CREDENTIALS_FILE,
    DEFAULT_ENDPOINT, DEFAULT_TOKEN_URI,
};
pub use retry::RetryPolicy;
