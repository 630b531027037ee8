// SPDX-FileCopyrightText: 2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{self, Result},
    federation::Exchange,
    identity::{Source, Svid},
    storage::Storage,
};

/// Time to wait before renewing credentials that expire at `expires_at`:
/// half of their remaining lifetime, or nothing if they already expired.
pub(crate) fn renewal_delay(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Duration {
    (expires_at - now)
        .to_std()
        .map(|remaining| remaining / 2)
        .unwrap_or(Duration::ZERO)
}

/// Keeps a credential store populated with credentials for the workload's
/// current identity.
pub(crate) struct Daemon<S, E, St> {
    source: S,
    exchange: E,
    storage: St,
}

impl<S, E, St> Daemon<S, E, St>
where
    S: Source,
    E: Exchange<Svid = S::Svid>,
    St: Storage,
{
    pub(crate) fn new(source: S, exchange: E, storage: St) -> Self {
        Self {
            source,
            exchange,
            storage,
        }
    }

    async fn fetch(&self) -> Result<S::Svid> {
        let svid = self.source.fetch().await?;
        info!(
            "Fetched SVID: spiffe_id={} hint={:?} expires_at={}",
            svid.id(),
            svid.hint(),
            svid.expires_at()
        );
        Ok(svid)
    }

    async fn renew(&mut self, svid: &S::Svid) -> Result<DateTime<Utc>> {
        let record = self.exchange.exchange(svid).await?;
        let expires_at = record.expires_at()?;
        self.storage.update(&record).await?;
        Ok(expires_at)
    }

    /// Exchanges the current identity and stores the result once.
    pub(crate) async fn run_once(mut self) -> Result<()> {
        let svid = self.fetch().await?;
        let expires_at = self.renew(&svid).await?;
        info!("Credentials stored: expires_at={}", expires_at);
        Ok(())
    }

    /// Renews credentials until `token` is cancelled.
    ///
    /// Any failure to fetch an identity, exchange it, or store the result
    /// ends the loop with that error.
    pub(crate) async fn run(mut self, token: CancellationToken) -> Result<()> {
        // Subscribe first so a rotation racing the initial fetch is not lost.
        let mut updated = self.source.updated();
        let mut svid = self.fetch().await?;

        loop {
            let expires_at = self.renew(&svid).await?;
            let now = Utc::now();
            let delay = renewal_delay(now, expires_at);
            info!(
                "Credentials renewed: spiffe_id={} hint={:?} expires_at={} renews_at={}",
                svid.id(),
                svid.hint(),
                expires_at,
                now + (expires_at - now).max(chrono::Duration::zero()) / 2
            );

            select! {
                biased;

                () = token.cancelled() => {
                    debug!("Renewal loop cancelled");
                    return Ok(());
                }
                changed = updated.changed() => {
                    changed.map_err(error::Internal::from)?;
                    svid = self.fetch().await?;
                    info!("Starting identity-driven renewal: spiffe_id={}", svid.id());
                }
                () = time::sleep(delay) => {
                    info!("Starting expiry-driven renewal: spiffe_id={}", svid.id());
                }
            }
        }
    }
}
