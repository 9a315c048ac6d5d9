//! Expansion of seed accounts into the leaf accounts the queries run against

use miette::Diagnostic;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn, Span};

use crate::execution::{ApiError, RemoteApiClient};
use crate::model::{AccountId, AccountSeed, LeafAccountSet, Row};

/// Lists every enabled, non-manager account below a seed account
pub const DEFAULT_LEAF_ACCOUNTS_QUERY: &str = "SELECT customer_client.id FROM customer_client WHERE customer_client.manager = FALSE AND customer_client.status = ENABLED";

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum ExpansionError {
    #[error("Account lookup failed for seed account {account}")]
    #[diagnostic(
        code(reportfetch::accounts::remote),
        help("Check that the credentials have access to the seed account")
    )]
    Remote {
        account: AccountId,
        #[source]
        source: ApiError,
    },

    #[error("Account selection returned '{value}' for seed account {account}, expected an account id")]
    #[diagnostic(
        code(reportfetch::accounts::invalid_row),
        help("The first selected column of the account selection query must be an account id")
    )]
    InvalidRow { account: AccountId, value: String },
}

/// Resolves a seed into the deduplicated set of leaf accounts
pub struct AccountExpander {
    client: Arc<dyn RemoteApiClient>,
    span: Span,
}

impl AccountExpander {
    pub fn new(client: Arc<dyn RemoteApiClient>, span: Span) -> Self {
        Self { client, span }
    }

    /// Expand `seed`
    ///
    /// - `disabled`: the seed ids are the leaf accounts, no remote call is made
    /// - otherwise `selection_query` (or [`DEFAULT_LEAF_ACCOUNTS_QUERY`]) runs against every seed
    ///   account and the first column of every returned row is taken as a leaf account id
    ///
    /// An empty result is not an error, it is logged as a single warning
    #[instrument(parent = &self.span, skip_all, fields(seed = %seed, disabled = disabled), err)]
    pub async fn expand(
        &self,
        seed: &AccountSeed,
        selection_query: Option<&str>,
        disabled: bool,
    ) -> Result<LeafAccountSet, ExpansionError> {
        if disabled {
            return Ok(seed.ids().iter().cloned().collect());
        }

        let query = selection_query.unwrap_or(DEFAULT_LEAF_ACCOUNTS_QUERY);
        let mut leaves = Vec::new();

        for account in seed.ids() {
            let rows = self
                .client
                .query(account, query)
                .await
                .map_err(|source| ExpansionError::Remote {
                    account: account.clone(),
                    source,
                })?;

            for row in rows.iter() {
                leaves.push(leaf_id(account, row)?);
            }
        }

        let leaves = leaves.into_iter().collect::<LeafAccountSet>();
        if leaves.is_empty() {
            warn!("No leaf accounts found under seed account(s) {seed}, check the account selection query: {query}");
        } else {
            info!(accounts = leaves.len(), "Expanded seed accounts");
        }

        Ok(leaves)
    }
}

fn leaf_id(seed: &AccountId, row: &Row) -> Result<AccountId, ExpansionError> {
    let invalid = |value: String| ExpansionError::InvalidRow {
        account: seed.clone(),
        value,
    };

    match row.values().next() {
        Some(Value::String(text)) => text.parse().map_err(|_| invalid(text.clone())),
        Some(Value::Number(number)) => number
            .to_string()
            .parse()
            .map_err(|_| invalid(number.to_string())),
        Some(other) => Err(invalid(other.to_string())),
        None => Err(invalid(String::new())),
    }
}
