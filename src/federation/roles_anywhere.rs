// SPDX-FileCopyrightText: 2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

//! `CreateSession` against AWS IAM Roles Anywhere, authenticated with the
//! X.509 variant of Signature Version 4.
//!
//! See <https://docs.aws.amazon.com/rolesanywhere/latest/userguide/authentication-sign-process.html>.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use url::Url;

use crate::{
    error::{self, Result},
    identity::X509Svid,
    signer::{HashFunction, Signer},
};

use super::{read_response, CredentialRecord, Exchange};

const SERVICE: &str = "rolesanywhere";

#[derive(Clone, Debug)]
pub(crate) struct Config {
    pub(crate) endpoint: Option<Url>,
    pub(crate) region: Option<String>,
    pub(crate) trust_anchor_arn: String,
    pub(crate) profile_arn: String,
    pub(crate) role_arn: String,
    pub(crate) role_session_name: Option<String>,
    pub(crate) session_duration: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest<'config> {
    duration_seconds: u32,
    profile_arn: &'config str,
    role_arn: &'config str,
    trust_anchor_arn: &'config str,
    #[serde(skip_serializing_if = "Option::is_none")]
    role_session_name: Option<&'config str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    credential_set: Vec<CredentialSetItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialSetItem {
    credentials: Credentials,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expiration: String,
}

/// The region component of an ARN such as
/// `arn:aws:rolesanywhere:us-east-1:123456789012:trust-anchor/...`.
fn region_from_arn(arn: &str) -> Option<&str> {
    let mut parts = arn.splitn(6, ':');
    match (parts.next(), parts.nth(2)) {
        (Some("arn"), Some(region)) if !region.is_empty() => Some(region),
        _ => None,
    }
}

fn host_header(url: &Url) -> Result<String> {
    let host = url.host_str().ok_or_else(|| {
        error::Federation::InvalidConfiguration(format!("endpoint {url} has no host"))
    })?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    })
}

fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub(crate) struct SignedRequest {
    /// Lower-cased header names and values, including `authorization`.
    pub(crate) headers: Vec<(&'static str, String)>,
    pub(crate) canonical_request: String,
    pub(crate) string_to_sign: String,
}

pub(crate) fn sign_request(
    signer: &Signer<'_>,
    url: &Url,
    region: &str,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<SignedRequest> {
    let algorithm = signer.signature_algorithm()?;
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let scope = format!("{}/{region}/{SERVICE}/aws4_request", now.format("%Y%m%d"));

    // Kept in lexicographic order.
    let mut headers = vec![
        ("content-type", "application/json".to_owned()),
        ("host", host_header(url)?),
        ("x-amz-date", amz_date.clone()),
        ("x-amz-x509", base64::encode(signer.certificate().der())),
    ];
    let chain = signer.certificate_chain();
    if !chain.is_empty() {
        headers.push((
            "x-amz-x509-chain",
            chain
                .iter()
                .map(|cert| base64::encode(cert.der()))
                .collect::<Vec<_>>()
                .join(","),
        ));
    }

    let signed_headers = headers
        .iter()
        .map(|&(name, _)| name)
        .collect::<Vec<_>>()
        .join(";");
    let mut canonical_request = format!("POST\n{}\n\n", url.path());
    for &(name, ref value) in &headers {
        canonical_request.push_str(name);
        canonical_request.push(':');
        canonical_request.push_str(value.trim());
        canonical_request.push('\n');
    }
    canonical_request.push('\n');
    canonical_request.push_str(&signed_headers);
    canonical_request.push('\n');
    canonical_request.push_str(&hex_sha256(body));

    let string_to_sign = format!(
        "{algorithm}\n{amz_date}\n{scope}\n{}",
        hex_sha256(canonical_request.as_bytes())
    );
    let signature = signer.sign(string_to_sign.as_bytes(), HashFunction::Sha256)?;

    headers.push((
        "authorization",
        format!(
            "{algorithm} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={}",
            signer.certificate().serial_number(),
            hex::encode(signature)
        ),
    ));

    Ok(SignedRequest {
        headers,
        canonical_request,
        string_to_sign,
    })
}

pub(crate) struct RolesAnywhere {
    client: reqwest::Client,
    config: Config,
    region: String,
    url: Url,
}

impl RolesAnywhere {
    pub(crate) fn new(client: reqwest::Client, config: Config) -> Result<Self> {
        let region = match config.region.as_deref().filter(|region| !region.is_empty()) {
            Some(region) => region.to_owned(),
            None => region_from_arn(&config.trust_anchor_arn)
                .ok_or_else(|| {
                    error::Federation::InvalidConfiguration(format!(
                        "could not determine a region from trust anchor {:?}; set one explicitly",
                        config.trust_anchor_arn
                    ))
                })?
                .to_owned(),
        };

        let endpoint = match config.endpoint {
            Some(ref endpoint) => endpoint.clone(),
            None => Url::parse(&format!("https://{SERVICE}.{region}.amazonaws.com/")).map_err(
                |e| error::Federation::InvalidConfiguration(format!("region {region:?}: {e}")),
            )?,
        };
        let url = endpoint.join("sessions").map_err(|e| {
            error::Federation::InvalidConfiguration(format!("endpoint {endpoint}: {e}"))
        })?;

        Ok(Self {
            client,
            config,
            region,
            url,
        })
    }

    pub(crate) async fn create_session(&self, svid: &X509Svid) -> Result<CredentialRecord> {
        let body = serde_json::to_vec(&CreateSessionRequest {
            duration_seconds: self.config.session_duration,
            profile_arn: &self.config.profile_arn,
            role_arn: &self.config.role_arn,
            trust_anchor_arn: &self.config.trust_anchor_arn,
            role_session_name: self.config.role_session_name.as_deref(),
        })?;

        let signed = sign_request(&Signer::new(svid), &self.url, &self.region, &body, Utc::now())?;
        debug!(
            "Calling CreateSession at {} for role {:?}",
            self.url, self.config.role_arn
        );
        debug!("Canonical request:\n{}", signed.canonical_request);
        debug!("String to sign:\n{}", signed.string_to_sign);

        let mut req = self.client.post(self.url.clone()).body(body);
        for (name, value) in signed.headers {
            // The transport derives the same value from the URL.
            if name != "host" {
                req = req.header(name, value);
            }
        }
        let body = read_response(req.send().await?).await?;

        let credentials = serde_json::from_str::<CreateSessionResponse>(&body)
            .map_err(|e| error::Federation::ResponseMalformed(e.to_string()))?
            .credential_set
            .into_iter()
            .next()
            .ok_or_else(|| {
                error::Federation::ResponseMalformed("credential set is empty".to_owned())
            })?
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
impl Exchange for RolesAnywhere {
    type Svid = X509Svid;

    async fn exchange(&self, svid: &X509Svid) -> Result<CredentialRecord> {
        self.create_session(svid).await
    }
}
