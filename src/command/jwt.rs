// SPDX-FileCopyrightText: 2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use async_trait::async_trait;
use clap::{Args, Parser};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    daemon::Daemon,
    error::{self, Result},
    federation::{http_client, web_identity, WebIdentity},
    identity::JwtSource,
    metadata,
};

use super::{print_credentials, run_daemon, CredentialFileArgs, WatchArgs};

#[derive(Debug, Args)]
pub(crate) struct SourceArgs {
    /// A file holding either a single JWT SVID or a JSON array of
    /// `{"hint": ..., "svid": ...}` objects.
    #[arg(long, env = "AWS_SVID_HELPER_JWT_SVID_PATH", value_hint = clap::ValueHint::FilePath)]
    jwt_svid_path: PathBuf,

    /// Only consider JWT SVIDs issued for this audience.
    #[arg(long, env = "AWS_SVID_HELPER_AUDIENCE")]
    audience: Option<String>,

    /// Use the JWT SVID with this hint when several are available.
    #[arg(long, env = "AWS_SVID_HELPER_HINT")]
    hint: Option<String>,
}

impl SourceArgs {
    fn source(self) -> JwtSource {
        JwtSource::new(self.jwt_svid_path, self.audience, self.hint)
    }
}

#[derive(Debug, Args)]
pub(crate) struct WebIdentityArgs {
    /// The ARN of the role to obtain credentials for.
    #[arg(long)]
    role_arn: String,

    /// Use the regional STS endpoint for this region instead of the global
    /// one.
    #[arg(long)]
    region: Option<String>,

    /// Use this URL as the STS endpoint.
    #[arg(long, value_parser = Url::parse, conflicts_with = "region")]
    endpoint: Option<Url>,

    /// How long, in seconds, the credentials should remain valid.
    #[arg(long, default_value_t = 3600, value_parser = clap::value_parser!(u32).range(900..=43200))]
    session_duration: u32,

    /// The name of the role session.
    #[arg(long, default_value_t = metadata::CLIENT_NAME.clone())]
    role_session_name: String,
}

impl WebIdentityArgs {
    fn exchange(self) -> Result<WebIdentity> {
        let endpoint = match (self.endpoint, self.region) {
            (Some(endpoint), _) => endpoint,
            (None, Some(region)) => web_identity::regional_endpoint(&region)?,
            (None, None) => Url::parse(web_identity::DEFAULT_ENDPOINT).map_err(|e| {
                error::Federation::InvalidConfiguration(format!("default endpoint: {e}"))
            })?,
        };
        Ok(WebIdentity::new(
            http_client()?,
            web_identity::Config {
                endpoint,
                role_arn: self.role_arn,
                role_session_name: self.role_session_name,
                session_duration: self.session_duration,
            },
        ))
    }
}

/// Exchange the JWT SVID for AWS credentials through STS and print them for
/// use as a `credential_process`.
#[derive(Debug, Parser)]
pub(crate) struct CredentialProcess {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    federation: WebIdentityArgs,
}

#[async_trait]
impl super::Command for CredentialProcess {
    async fn execute(self) -> Result<()> {
        print_credentials(&self.source.source(), &self.federation.exchange()?).await
    }
}

/// Exchange the JWT SVID for AWS credentials through STS and write them to a
/// credentials file once.
#[derive(Debug, Parser)]
pub(crate) struct CredentialFileOneshot {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    federation: WebIdentityArgs,

    #[command(flatten)]
    file: CredentialFileArgs,
}

#[async_trait]
impl super::Command for CredentialFileOneshot {
    async fn execute(self) -> Result<()> {
        Daemon::new(
            self.source.source(),
            self.federation.exchange()?,
            self.file.storage()?,
        )
        .run_once()
        .await
    }
}

/// Keep a credentials file updated with AWS credentials for the JWT SVID,
/// renewing them before they expire or when the SVID changes.
#[derive(Debug, Parser)]
pub(crate) struct CredentialFile {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    federation: WebIdentityArgs,

    #[command(flatten)]
    file: CredentialFileArgs,

    #[command(flatten)]
    watch: WatchArgs,
}

#[async_trait]
impl super::Command for CredentialFile {
    async fn execute(self) -> Result<()> {
        let exchange = self.federation.exchange()?;
        let storage = self.file.storage()?;
        let source = self.source.source();

        let token = CancellationToken::new();
        let watcher = source.spawn_watcher(self.watch.interval(), token.clone());
        run_daemon(source, exchange, storage, token, watcher).await
    }
}
