// SPDX-FileCopyrightText: 2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

mod file;
pub(crate) mod jwt;
pub(crate) mod x509;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::warn;
use tokio::sync::watch;

use crate::error::{self, Result};

pub(crate) use file::{JwtSource, X509Source};
pub(crate) use jwt::JwtSvid;
pub(crate) use x509::X509Svid;

pub(crate) trait Svid {
    /// The SPIFFE ID of the workload this SVID was issued to.
    fn id(&self) -> &str;
    fn hint(&self) -> &str;
    fn expires_at(&self) -> DateTime<Utc>;
}

/// A provider of the workload's current identity.
///
/// Receivers handed out by [`Source::updated`] are notified at least once
/// whenever a new SVID may be available. Notifications carry no payload;
/// consumers must call [`Source::fetch`] again to obtain the new SVID.
#[async_trait]
pub(crate) trait Source: Send + Sync {
    type Svid: Svid + Send + Sync;

    async fn fetch(&self) -> Result<Self::Svid>;

    fn updated(&self) -> watch::Receiver<()>;
}

pub(crate) fn select_by_hint<T: Svid>(svids: Vec<T>, hint: Option<&str>) -> Result<T> {
    let count = svids.len();
    match hint.filter(|hint| !hint.is_empty()) {
        Some(hint) => {
            let mut available = Vec::with_capacity(count);
            for svid in svids {
                if svid.hint() == hint {
                    return Ok(svid);
                }
                available.push(svid.hint().to_owned());
            }
            Err(error::Identity::HintNotFound {
                hint: hint.to_owned(),
                available,
            }
            .into())
        }
        None => {
            if count > 1 {
                warn!("Received {} SVIDs, but no hint was set; selecting the first SVID", count);
            }
            svids
                .into_iter()
                .next()
                .ok_or_else(|| error::Identity::NoSvid.into())
        }
    }
}
