// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{io, path::PathBuf, time::Duration};

use async_trait::async_trait;
use clap::Args;
use log::{error, info, warn};
use tokio::{select, signal, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    daemon::Daemon,
    error::{Error, Result},
    federation::Exchange,
    identity::Source,
    metadata, storage,
};

pub(crate) mod jwt;
pub(crate) mod x509;

#[async_trait]
pub(crate) trait Command {
    async fn execute(self) -> Result<()>;
}

/// Where and how to write credentials.
#[derive(Debug, Args)]
pub(crate) struct CredentialFileArgs {
    /// The AWS shared credentials file to update. Defaults to
    /// `~/.aws/credentials`.
    #[arg(long, env = "AWS_SHARED_CREDENTIALS_FILE", value_hint = clap::ValueHint::FilePath)]
    aws_credentials_path: Option<PathBuf>,

    /// The profile in the credentials file to write.
    #[arg(long, default_value = storage::DEFAULT_PROFILE)]
    profile: String,

    /// Overwrite the credentials file even if it cannot be parsed.
    #[arg(long)]
    force: bool,

    /// Discard any other profiles in the credentials file.
    #[arg(long)]
    replace: bool,
}

impl CredentialFileArgs {
    fn storage(self) -> Result<storage::File> {
        let path = self
            .aws_credentials_path
            .or_else(|| metadata::DEFAULT_CREDENTIALS_PATH.clone())
            .ok_or_else(|| {
                error!("Could not determine a home directory; pass --aws-credentials-path");
                Error::Command
            })?;
        Ok(storage::File::new(storage::FileConfig {
            path,
            profile_name: Some(self.profile),
            force: self.force,
            replace: self.replace,
        }))
    }
}

#[derive(Debug, Args)]
pub(crate) struct WatchArgs {
    /// How often, in seconds, to check the SVID files for changes.
    #[arg(long, env = "AWS_SVID_HELPER_POLL_INTERVAL", default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval: u64,
}

impl WatchArgs {
    fn interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }
}

/// Fetches the current SVID once and prints the resulting credentials in the
/// format expected of an AWS `credential_process`.
async fn print_credentials<S, E>(source: &S, exchange: &E) -> Result<()>
where
    S: Source,
    E: Exchange<Svid = S::Svid>,
{
    let svid = source.fetch().await?;
    let record = exchange.exchange(&svid).await?;
    println!("{}", serde_json::to_string(&record.to_process_output())?);
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> io::Result<()> {
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    select! {
        result = signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> io::Result<()> {
    signal::ctrl_c().await
}

fn cancel_on_shutdown(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        select! {
            () = token.cancelled() => {}
            result = shutdown_signal() => match result {
                Ok(()) => {
                    info!("Shutting down");
                    token.cancel();
                }
                Err(e) => warn!("Unable to listen for shutdown signals: {}", e),
            }
        }
    })
}

/// Runs the renewal daemon until the process is asked to stop. `watcher`
/// is the source's change watcher, already running under `token`.
async fn run_daemon<S, E, St>(
    source: S,
    exchange: E,
    storage: St,
    token: CancellationToken,
    watcher: JoinHandle<()>,
) -> Result<()>
where
    S: Source,
    E: Exchange<Svid = S::Svid>,
    St: storage::Storage,
{
    let signals = cancel_on_shutdown(token.clone());

    let result = Daemon::new(source, exchange, storage)
        .run(token.clone())
        .await;

    token.cancel();
    watcher.await?;
    signals.await?;
    result
}
