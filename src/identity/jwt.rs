// SPDX-FileCopyrightText: 2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Deserialize;

use crate::error::{self, Result};

use super::Svid;

#[derive(Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
    aud: Option<Audience>,
}

/// A JWT SVID. The token is issued and signed by the attestation service;
/// claims are only decoded here, never verified.
#[derive(Clone, Debug)]
pub(crate) struct JwtSvid {
    id: String,
    hint: String,
    token: SecretString,
    audience: Vec<String>,
    expires_at: DateTime<Utc>,
}

impl JwtSvid {
    pub(crate) fn parse(token: &str, hint: String) -> Result<Self> {
        let token = token.trim();
        let payload = match token.split('.').collect::<Vec<_>>()[..] {
            [_, payload, _] => payload,
            _ => {
                return Err(error::Identity::Malformed(
                    "JWT does not have three segments".to_owned(),
                )
                .into())
            }
        };
        let payload = base64::decode_config(payload, base64::URL_SAFE_NO_PAD)
            .map_err(|e| error::Identity::Malformed(format!("JWT payload encoding: {e}")))?;
        let claims: Claims = serde_json::from_slice(&payload)
            .map_err(|e| error::Identity::Malformed(format!("JWT claims: {e}")))?;

        Ok(Self {
            id: claims.sub,
            hint,
            token: SecretString::new(token.to_owned()),
            audience: match claims.aud {
                None => vec![],
                Some(Audience::One(aud)) => vec![aud],
                Some(Audience::Many(aud)) => aud,
            },
            expires_at: DateTime::from_timestamp(claims.exp, 0).ok_or_else(|| {
                error::Identity::Malformed("JWT expiry is out of range".to_owned())
            })?,
        })
    }

    pub(crate) fn token(&self) -> &SecretString {
        &self.token
    }

    pub(crate) fn has_audience(&self, audience: &str) -> bool {
        self.audience.iter().any(|aud| aud == audience)
    }
}

impl Svid for JwtSvid {
    fn id(&self) -> &str {
        &self.id
    }

    fn hint(&self) -> &str {
        &self.hint
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use secrecy::ExposeSecret as _;

    use super::*;

    pub(crate) fn token(sub: &str, aud: &serde_json::Value, exp: i64) -> String {
        let header = base64::encode_config(r#"{"alg":"ES256","typ":"JWT"}"#, base64::URL_SAFE_NO_PAD);
        let claims = serde_json::json!({ "sub": sub, "aud": aud, "exp": exp });
        let payload = base64::encode_config(claims.to_string(), base64::URL_SAFE_NO_PAD);
        format!("{header}.{payload}.c2lnbmF0dXJl")
    }

    #[test]
    fn decodes_claims() -> Result<()> {
        let raw = token(
            "spiffe://example.org/workload",
            &serde_json::json!("sts.amazonaws.com"),
            1_700_000_000,
        );
        let svid = JwtSvid::parse(&format!("{raw}\n"), "hint".to_owned())?;

        assert_eq!(svid.id(), "spiffe://example.org/workload");
        assert_eq!(svid.hint(), "hint");
        assert_eq!(svid.expires_at().timestamp(), 1_700_000_000);
        assert!(svid.has_audience("sts.amazonaws.com"));
        assert_eq!(svid.token().expose_secret(), &raw);
        Ok(())
    }

    #[test]
    fn accepts_audience_lists() -> Result<()> {
        let raw = token(
            "spiffe://example.org/workload",
            &serde_json::json!(["a", "b"]),
            1_700_000_000,
        );
        let svid = JwtSvid::parse(&raw, String::new())?;
        assert!(svid.has_audience("b"));
        assert!(!svid.has_audience("c"));
        Ok(())
    }

    #[test]
    fn rejects_garbage() {
        assert!(JwtSvid::parse("not-a-jwt", String::new()).is_err());
        assert!(JwtSvid::parse("a.b.c", String::new()).is_err());
    }
}
