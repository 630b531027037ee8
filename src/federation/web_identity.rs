// SPDX-FileCopyrightText: 2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

//! `AssumeRoleWithWebIdentity` against AWS STS, spoken directly over the
//! query protocol.
//!
//! See <https://docs.aws.amazon.com/STS/latest/APIReference/API_AssumeRoleWithWebIdentity.html>.

use async_trait::async_trait;
use log::debug;
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;
use url::Url;

use crate::{
    error::{self, Result},
    identity::JwtSvid,
};

use super::{read_response, CredentialRecord, Exchange};

pub(crate) const DEFAULT_ENDPOINT: &str = "https://sts.amazonaws.com/";

const ACTION: &str = "AssumeRoleWithWebIdentity";
const API_VERSION: &str = "2011-06-15";

pub(crate) fn regional_endpoint(region: &str) -> Result<Url> {
    Url::parse(&format!("https://sts.{region}.amazonaws.com/")).map_err(|e| {
        error::Federation::InvalidConfiguration(format!("region {region:?}: {e}")).into()
    })
}

#[derive(Clone, Debug)]
pub(crate) struct Config {
    pub(crate) endpoint: Url,
    pub(crate) role_arn: String,
    pub(crate) role_session_name: String,
    pub(crate) session_duration: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleWithWebIdentityResponse {
    assume_role_with_web_identity_result: AssumeRoleWithWebIdentityResult,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleWithWebIdentityResult {
    credentials: Credentials,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Credentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expiration: String,
}

pub(crate) struct WebIdentity {
    client: reqwest::Client,
    config: Config,
}

impl WebIdentity {
    pub(crate) fn new(client: reqwest::Client, config: Config) -> Self {
        Self { client, config }
    }

    /// Exchanges a bearer token for credentials in a single round trip.
    /// Parameters travel in a form-encoded POST body.
    pub(crate) async fn assume_role(&self, token: &SecretString) -> Result<CredentialRecord> {
        let duration = self.config.session_duration.to_string();
        let mut params = vec![
            ("Action", ACTION),
            ("Version", API_VERSION),
            ("WebIdentityToken", token.expose_secret().as_str()),
            ("DurationSeconds", duration.as_str()),
        ];
        if !self.config.role_arn.is_empty() {
            params.push(("RoleArn", self.config.role_arn.as_str()));
        }
        if !self.config.role_session_name.is_empty() {
            params.push(("RoleSessionName", self.config.role_session_name.as_str()));
        }

        debug!(
            "Calling {} at {} for role {:?}",
            ACTION, self.config.endpoint, self.config.role_arn
        );
        let resp = self
            .client
            .post(self.config.endpoint.clone())
            .form(&params)
            .send()
            .await?;
        let body = read_response(resp).await?;

        let credentials = quick_xml::de::from_str::<AssumeRoleWithWebIdentityResponse>(&body)
            .map_err(|e| error::Federation::ResponseMalformed(e.to_string()))?
            .assume_role_with_web_identity_result
            .credentials;

        Ok(CredentialRecord::new(
            credentials.access_key_id,
            credentials.secret_access_key,
            credentials.session_token,
            credentials.expiration,
        ))
    }
}

#[async_trait]
impl Exchange for WebIdentity {
    type Svid = JwtSvid;

    async fn exchange(&self, svid: &JwtSvid) -> Result<CredentialRecord> {
        self.assume_role(svid.token()).await
    }
}
