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
    error::Result,
    federation::{http_client, roles_anywhere, RolesAnywhere},
    identity::X509Source,
};

use super::{print_credentials, run_daemon, CredentialFileArgs, WatchArgs};

#[derive(Debug, Args)]
pub(crate) struct SourceArgs {
    /// The PEM-encoded X.509 SVID, leaf certificate first, followed by any
    /// intermediates.
    #[arg(long, env = "AWS_SVID_HELPER_X509_SVID_PATH", value_hint = clap::ValueHint::FilePath)]
    x509_svid_path: PathBuf,

    /// The PEM-encoded private key of the X.509 SVID.
    #[arg(long, env = "AWS_SVID_HELPER_X509_KEY_PATH", value_hint = clap::ValueHint::FilePath)]
    x509_key_path: PathBuf,

    /// A label to attach to the SVID in log messages.
    #[arg(long, env = "AWS_SVID_HELPER_HINT")]
    hint: Option<String>,
}

impl SourceArgs {
    fn source(self) -> X509Source {
        X509Source::new(self.x509_svid_path, self.x509_key_path, self.hint)
    }
}

#[derive(Debug, Args)]
pub(crate) struct RolesAnywhereArgs {
    /// The ARN of the role to obtain credentials for.
    #[arg(long)]
    role_arn: String,

    /// The ARN of the Roles Anywhere profile that grants access to the role.
    #[arg(long)]
    profile_arn: String,

    /// The ARN of the Roles Anywhere trust anchor that issued the SVID.
    #[arg(long)]
    trust_anchor_arn: String,

    /// The region of the Roles Anywhere endpoint. Defaults to the region of
    /// the trust anchor.
    #[arg(long)]
    region: Option<String>,

    /// How long, in seconds, the credentials should remain valid.
    #[arg(long, default_value_t = 3600, value_parser = clap::value_parser!(u32).range(900..=43200))]
    session_duration: u32,

    /// The name of the role session.
    #[arg(long)]
    role_session_name: Option<String>,

    /// Use this URL instead of the regional Roles Anywhere endpoint.
    #[arg(long, value_parser = Url::parse)]
    endpoint: Option<Url>,
}

impl RolesAnywhereArgs {
    fn exchange(self) -> Result<RolesAnywhere> {
        RolesAnywhere::new(
            http_client()?,
            roles_anywhere::Config {
                endpoint: self.endpoint,
                region: self.region,
                trust_anchor_arn: self.trust_anchor_arn,
                profile_arn: self.profile_arn,
                role_arn: self.role_arn,
                role_session_name: self.role_session_name,
                session_duration: self.session_duration,
            },
        )
    }
}

/// Exchange the X.509 SVID for AWS credentials through IAM Roles Anywhere and
/// print them for use as a `credential_process`.
#[derive(Debug, Parser)]
pub(crate) struct CredentialProcess {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    federation: RolesAnywhereArgs,
}

#[async_trait]
impl super::Command for CredentialProcess {
    async fn execute(self) -> Result<()> {
        print_credentials(&self.source.source(), &self.federation.exchange()?).await
    }
}

/// Exchange the X.509 SVID for AWS credentials through IAM Roles Anywhere and
/// write them to a credentials file once.
#[derive(Debug, Parser)]
pub(crate) struct CredentialFileOneshot {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    federation: RolesAnywhereArgs,

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

/// Keep a credentials file updated with AWS credentials for the X.509 SVID,
/// renewing them before they expire or when the SVID changes.
#[derive(Debug, Parser)]
pub(crate) struct CredentialFile {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    federation: RolesAnywhereArgs,

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
