// SPDX-FileCopyrightText: 2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

pub(crate) mod roles_anywhere;
pub(crate) mod web_identity;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Serialize;

use crate::{
    error::{self, Result},
    metadata,
};

pub(crate) use roles_anywhere::RolesAnywhere;
pub(crate) use web_identity::WebIdentity;

const CREDENTIAL_PROCESS_VERSION: u32 = 1;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Temporary AWS credentials issued by a federation exchange.
#[derive(Clone, Debug)]
pub(crate) struct CredentialRecord {
    pub(crate) version: u32,
    pub(crate) access_key_id: String,
    pub(crate) secret_access_key: SecretString,
    pub(crate) session_token: SecretString,
    pub(crate) expiration: String,
}

impl CredentialRecord {
    pub(crate) fn new(
        access_key_id: String,
        secret_access_key: String,
        session_token: String,
        expiration: String,
    ) -> Self {
        Self {
            version: CREDENTIAL_PROCESS_VERSION,
            access_key_id,
            secret_access_key: SecretString::new(secret_access_key),
            session_token: SecretString::new(session_token),
            expiration,
        }
    }

    pub(crate) fn expires_at(&self) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.expiration)
            .map(|expires_at| expires_at.with_timezone(&Utc))
            .map_err(|source| error::Error::ExpirationParse {
                value: self.expiration.clone(),
                source,
            })
    }

    /// The document the AWS CLI and SDKs expect from an external credential
    /// process.
    pub(crate) fn to_process_output(&self) -> CredentialProcessOutput<'_> {
        CredentialProcessOutput {
            version: self.version,
            access_key_id: &self.access_key_id,
            secret_access_key: self.secret_access_key.expose_secret(),
            session_token: self.session_token.expose_secret(),
            expiration: &self.expiration,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CredentialProcessOutput<'record> {
    version: u32,
    access_key_id: &'record str,
    secret_access_key: &'record str,
    session_token: &'record str,
    expiration: &'record str,
}

/// Trades an SVID for AWS credentials.
#[async_trait]
pub(crate) trait Exchange: Send + Sync {
    type Svid: Send + Sync;

    async fn exchange(&self, svid: &Self::Svid) -> Result<CredentialRecord>;
}

pub(crate) fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(metadata::USER_AGENT.as_str())
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

/// Reads the body of a response, failing with the status and body when the
/// endpoint rejected the request.
async fn read_response(resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(error::Federation::RequestFailed {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            body,
        }
        .into());
    }
    Ok(body)
}
