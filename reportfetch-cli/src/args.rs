use anyhow::Context;
use clap::{Parser, ValueEnum};
use reportfetch_core::persist::DEFAULT_CONFIG_DESTINATION;
use reportfetch_core::prelude::*;
use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;
use tracing::{info, Span};

/// Run report queries against every leaf account below the given account(s)
#[derive(Debug, Parser)]
#[command(name = "reportfetch", version, about, long_about = None)]
pub struct Args {
    /// Query files to run, or query text when used with `--input console`
    #[arg(required = true)]
    pub queries: Vec<String>,

    /// Saved configuration file (YAML, JSON or TOML), command line values take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Account id(s) to run the queries for, comma separated
    #[arg(long)]
    pub account: Option<String>,

    /// Where query results are written
    #[arg(long, value_enum)]
    pub output: Option<Output>,

    /// Folder for csv, json and parquet output
    #[arg(long)]
    pub destination_folder: Option<PathBuf>,

    /// Field delimiter for csv output
    #[arg(long)]
    pub csv_delimiter: Option<char>,

    /// Number of rows printed per query for console output
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Location of the Delta tables for delta output, e.g. s3://bucket/warehouse/
    #[arg(long)]
    pub delta_location: Option<String>,

    /// k=v storage options for delta output
    /// e.g. --storage-option AWS_REGION=eu-central-1
    #[arg(long = "storage-option", value_parser = parse_key_val::<String, String>)]
    pub storage_options: Vec<(String, String)>,

    /// How the positional queries are interpreted
    #[arg(long, value_enum, default_value_t = Input::File)]
    pub input: Input,

    /// Google Ads credentials file, defaults to ~/google-ads.yaml
    #[arg(long, env = "REPORTFETCH_ADS_CONFIG")]
    pub ads_config: Option<PathBuf>,

    /// Google Ads API version
    #[arg(long)]
    pub api_version: Option<u32>,

    /// k=v list of macro values substituted into the queries
    /// e.g. reportfetch queries/*.sql -m start_date=:YYYYMMDD-7 -m country=DE
    #[arg(short = 'm', long = "macro", value_parser = parse_key_val::<String, String>)]
    pub macros: Vec<(String, String)>,

    /// Query selecting the leaf accounts, the first column must be the account id
    #[arg(long, conflicts_with = "customer_ids_query_file")]
    pub customer_ids_query: Option<String>,

    /// File containing the query selecting the leaf accounts
    #[arg(long)]
    pub customer_ids_query_file: Option<PathBuf>,

    /// Run the queries for the given account(s) only, without looking up child accounts
    #[arg(long)]
    pub disable_account_expansion: bool,

    /// Run queries concurrently (default)
    #[arg(long, overrides_with = "no_parallel_queries")]
    pub parallel_queries: bool,

    /// Run queries one after the other
    #[arg(long, overrides_with = "parallel_queries")]
    pub no_parallel_queries: bool,

    /// Fetch the accounts of a query concurrently with `batch`
    #[arg(long, value_enum, default_value_t = Optimize::None)]
    pub optimize_performance: Optimize,

    /// Save the resolved configuration to `--config-destination`
    #[arg(long, overrides_with = "no_save_config")]
    pub save_config: bool,

    /// Do not save the resolved configuration (default)
    #[arg(long, overrides_with = "save_config")]
    pub no_save_config: bool,

    /// File the configuration is saved to, the format follows the extension
    #[arg(long, default_value = DEFAULT_CONFIG_DESTINATION)]
    pub config_destination: PathBuf,

    /// Resolve and optionally save the configuration without running any query
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (info, debug, trace)
    #[arg(long, env = "REPORTFETCH_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Output {
    Console,
    Csv,
    Json,
    Parquet,
    Delta,
}

impl From<Output> for SinkKind {
    fn from(output: Output) -> Self {
        match output {
            Output::Console => SinkKind::Console,
            Output::Csv => SinkKind::Csv,
            Output::Json => SinkKind::Json,
            Output::Parquet => SinkKind::Parquet,
            Output::Delta => SinkKind::Delta,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Input {
    File,
    Console,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Optimize {
    None,
    Batch,
}

fn parse_key_val<T, U>(s: &str) -> Result<(T, U), Box<dyn Error + Send + Sync + 'static>>
where
    T: std::str::FromStr,
    T::Err: Error + Send + Sync + 'static,
    U: std::str::FromStr,
    U::Err: Error + Send + Sync + 'static,
{
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=value: no `=` found in `{s}`"))?;
    Ok((s[..pos].parse()?, s[pos + 1..].parse()?))
}

impl Args {
    /// Settings given on the command line, unset values are filled from the config file or defaults
    pub fn overrides(&self) -> Result<ConfigOverrides, InvalidAccountId> {
        let output = SinkOverrides {
            kind: self.output.map(SinkKind::from),
            destination_folder: self.destination_folder.clone(),
            delimiter: self.csv_delimiter,
            page_size: self.page_size,
            location: self.delta_location.clone(),
            storage_options: (!self.storage_options.is_empty())
                .then(|| self.storage_options.iter().cloned().collect::<BTreeMap<_, _>>()),
        };

        let account_selection_query = self
            .customer_ids_query
            .clone()
            .map(QuerySource::Inline)
            .or_else(|| self.customer_ids_query_file.clone().map(QuerySource::File));

        Ok(ConfigOverrides {
            account: self.account.as_deref().map(AccountSeed::parse).transpose()?,
            output: Some(output),
            api_version: self.api_version,
            macro_params: (!self.macros.is_empty())
                .then(|| self.macros.iter().cloned().collect::<MacroParams>()),
            account_selection_query,
        })
    }

    /// Resolve the run configuration and save it when requested
    ///
    /// `login_account` is the manager account of the ads credentials. Returns `None` for a dry run,
    /// in which case nothing else of the run may happen
    pub fn resolve_config(
        &self,
        login_account: Option<AccountId>,
        span: Span,
    ) -> anyhow::Result<Option<Config>> {
        let file = self
            .config
            .as_ref()
            .map(|path| {
                ConfigResolver::load_file(path)
                    .with_context(|| format!("failed to load config from {}", path.display()))
            })
            .transpose()?;

        let overrides = self.overrides().context("invalid --account")?;
        let config = ConfigResolver::new(span.clone())
            .build(overrides, file, login_account)
            .context("failed to resolve configuration")?;

        if should_persist(self.save_config, self.config.is_some()) {
            ConfigPersister::new(&self.config_destination, span).save_or_warn(&config);
        }

        if self.dry_run {
            info!(
                account = %config.account,
                output = %config.output.kind(),
                api_version = config.api_version,
                "Dry run, no queries executed"
            );
            return Ok(None);
        }

        Ok(Some(config))
    }

    pub fn query_references(&self) -> Vec<QueryReference> {
        self.queries
            .iter()
            .enumerate()
            .map(|(position, query)| match self.input {
                Input::File => QueryReference::file(query),
                Input::Console => QueryReference::inline(position + 1, query.as_str()),
            })
            .collect()
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            mode: if self.no_parallel_queries {
                ExecutionMode::Sequential
            } else {
                ExecutionMode::Parallel
            },
            optimize: match self.optimize_performance {
                Optimize::None => OptimizePerformance::None,
                Optimize::Batch => OptimizePerformance::Batch,
            },
            disable_account_expansion: self.disable_account_expansion,
            ..Default::default()
        }
    }
}
