// ABOUTME: wearable-link CLI - drive provider linking and reconciliation against a backend
// ABOUTME: Links providers, checks pending links, reconciles, syncs data and disconnects
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
//!
//! Usage:
//! ```bash
//! # Show cached connection state, then refresh it from the backend
//! wearable-link --user u-123 status
//! wearable-link --user u-123 reconcile
//!
//! # Link an OAuth provider: opens nothing, prints the URL, waits for Enter
//! wearable-link --user u-123 link garmin
//!
//! # Poll again after a link timed out
//! wearable-link --user u-123 check garmin
//!
//! # Pull one day of data and retry failed categories
//! wearable-link --user u-123 sync oura --date 2025-06-01
//! wearable-link --user u-123 retry-syncs
//! ```

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::env;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use wearable_core::models::{ConnectionStatus, LinkOutcome};
use wearable_gateway::HttpHealthGateway;
use wearable_link::config::LinkConfig;
use wearable_link::host::{ExternalAgentLauncher, StaticSession};
use wearable_link::logging::LoggingConfig;
use wearable_link::oauth::PollOutcome;
use wearable_link::registry::ProviderRegistry;
use wearable_link::service::LinkService;

#[derive(Parser)]
#[command(
    name = "wearable-link",
    about = "Wearable provider linking CLI",
    long_about = "Link health providers, reconcile connection state and trigger data syncs against the wearable backend."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// User id (falls back to WEARABLE_USER_ID)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List known providers
    Providers,
    /// Show connection records (cached, then local state)
    Status,
    /// Refresh every provider from the backend
    Reconcile,
    /// Link a provider
    Link {
        /// Provider id, e.g. garmin
        provider: String,
    },
    /// Poll again for a provider whose link was not confirmed
    Check {
        /// Provider id
        provider: String,
    },
    /// Ask the backend to retry failed category syncs
    RetrySyncs,
    /// Pull one day of data for a provider
    Sync {
        /// Provider id
        provider: String,
        /// Day to sync (defaults to today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Disconnect a provider
    Disconnect {
        /// Provider id
        provider: String,
    },
}

/// Prints the authorization URL instead of opening a browser
struct PrintLauncher;

#[async_trait]
impl ExternalAgentLauncher for PrintLauncher {
    async fn open(&self, url: &str) -> Result<()> {
        println!("Open this URL to authorize:\n\n  {url}\n");
        Ok(())
    }
}

fn print_status(service: &LinkService) {
    let snapshot = service.snapshot();
    for descriptor in service.registry().iter() {
        let record = snapshot.get(&descriptor.id).cloned().unwrap_or_default();
        let synced = record
            .last_synced_at
            .map_or_else(|| "-".to_owned(), |at| at.to_rfc3339());
        let error = record
            .last_error
            .map(|e| format!("  ({})", e.kind.description()))
            .unwrap_or_default();
        println!(
            "{:<16} {:<24} last sync {synced}{error}",
            descriptor.id,
            format!("{:?}", record.status)
        );
    }
}

async fn wait_for_enter() -> Result<()> {
    let mut line = String::new();
    BufReader::new(io::stdin()).read_line(&mut line).await?;
    Ok(())
}

async fn await_poll(handle: JoinHandle<PollOutcome>) -> Result<()> {
    match handle.await? {
        PollOutcome::Linked { attempts } => println!("Linked after {attempts} check(s)"),
        PollOutcome::TimedOut { attempts } => {
            println!("Not confirmed after {attempts} check(s); run `check` to try again");
        }
        PollOutcome::Cancelled { .. } => println!("Link request was cancelled"),
    }
    Ok(())
}

async fn link(service: &LinkService, provider: &str) -> Result<()> {
    match service.link(provider).await? {
        LinkOutcome::AlreadyConnected => println!("{provider} is already connected"),
        LinkOutcome::Linked => println!("{provider} linked"),
        LinkOutcome::Superseded => println!("Link request for {provider} was superseded"),
        LinkOutcome::AwaitingExternalAuth => {
            println!("Press Enter once you have finished authorizing in the browser...");
            wait_for_enter().await?;
            let activity = service.on_app_foreground();
            for poll in activity.polls {
                await_poll(poll).await?;
            }
            if let Some(reconcile) = activity.reconcile {
                reconcile.await??;
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    LoggingConfig::for_cli(cli.verbose).init()?;

    let config = LinkConfig::from_env()?;
    let user_id = cli
        .user
        .or_else(|| env::var("WEARABLE_USER_ID").ok())
        .ok_or_else(|| anyhow!("--user or WEARABLE_USER_ID is required"))?;

    let registry = ProviderRegistry::with_builtin_providers();
    let gateway = HttpHealthGateway::new(config.gateway.clone(), registry.iter());
    let service = LinkService::builder(
        Arc::new(gateway),
        Arc::new(StaticSession::signed_in(user_id)),
        Arc::new(PrintLauncher),
    )
    .registry(registry)
    .config(config)
    .build();
    service.restore_cached().await;

    match cli.command {
        Command::Providers => {
            for descriptor in service.registry().iter() {
                println!(
                    "{:<16} {:<16} {:?}",
                    descriptor.id, descriptor.display_name, descriptor.link_type
                );
            }
        }
        Command::Status => print_status(&service),
        Command::Reconcile => {
            let report = service.reconcile().await?;
            print_status(&service);
            for (provider, kind) in &report.failed {
                println!("check failed for {provider}: {}", kind.description());
            }
        }
        Command::Link { provider } => {
            link(&service, &provider).await?;
            print_status(&service);
        }
        Command::Check { provider } => match service.check_again(&provider)? {
            Some(poll) => await_poll(poll).await?,
            None if service.record(&provider).status == ConnectionStatus::Linked => {
                println!("{provider} is already connected");
            }
            None => println!("A check for {provider} is already running"),
        },
        Command::RetrySyncs => {
            let retried = service.retry_failed_syncs().await?;
            println!("retried: {retried}");
        }
        Command::Sync { provider, date } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let result = service.sync_provider_data(&provider, date).await?;
            for (category, outcome) in &result.outcomes {
                println!("{:<10} {outcome:?}", category.as_str());
            }
        }
        Command::Disconnect { provider } => {
            service.disconnect(&provider).await?;
            println!("{provider} disconnected");
        }
    }
    Ok(())
}
