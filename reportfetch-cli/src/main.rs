use anyhow::Context;
use clap::Parser;
use reportfetch_ads::{default_credentials_path, AdsCredentials, GoogleAdsClient};
use reportfetch_core::prelude::*;
use reportfetch_sinks::build_sink;
use std::{str::FromStr, sync::Arc};
use tracing::{info, info_span, warn, Instrument, Level, Span};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

mod args;

use args::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = Level::from_str(&args.log_level.to_lowercase()).unwrap_or(Level::INFO);
    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    let span = info_span!("run", run_id = %Uuid::new_v4());

    run(args, span.clone()).instrument(span).await
}

async fn run(args: Args, span: Span) -> anyhow::Result<()> {
    // a missing credentials file only matters once the remote service is called
    let credentials = args
        .ads_config
        .clone()
        .map(Ok)
        .unwrap_or_else(default_credentials_path)
        .and_then(|path| AdsCredentials::load(&path));
    let login_account = credentials
        .as_ref()
        .ok()
        .and_then(|credentials| credentials.login_customer_id.clone());

    let Some(config) = args.resolve_config(login_account, span.clone())? else {
        return Ok(());
    };

    let credentials = credentials.context("failed to load Google Ads credentials")?;
    let client = GoogleAdsClient::new(credentials, config.api_version)
        .context("failed to create Google Ads client")?;
    let sink = build_sink(&config.output).context("failed to create output sink")?;

    let report = BatchRunner::new(Arc::new(client), Arc::new(FileQueryReader), span.clone())
        .run(&config, &args.query_references(), sink, &args.run_options())
        .await?;

    log_summary(&report);

    Ok(())
}

/// An empty report means no leaf accounts were found, which the expansion already reported
fn log_summary(report: &BatchReport) {
    if report.is_empty() {
        return;
    }

    let failed = report.failed().count();
    if failed > 0 {
        warn!("{failed} of {} queries failed", report.len());
    } else {
        info!("All {} queries succeeded", report.len());
    }
}
