// SPDX-FileCopyrightText: 2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use sha2::{Digest as _, Sha256};
use tokio::{
    fs, select,
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::error::{self, Error, Result};

use super::{select_by_hint, JwtSvid, Source, X509Svid};

async fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).await.map_err(|e| {
        error::Identity::FetchFailed {
            source_name: path.display().to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn fetch_failed(path: &Path) -> impl FnOnce(Error) -> Error + '_ {
    move |err| match err {
        Error::Identity(error::Identity::FetchFailed { .. }) => err,
        _ => error::Identity::FetchFailed {
            source_name: path.display().to_string(),
            reason: err.to_string(),
        }
        .into(),
    }
}

async fn fingerprint(paths: &[PathBuf]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    for path in paths {
        match fs::read(path).await {
            Ok(data) => {
                hasher.update([1_u8]);
                hasher.update(Sha256::digest(data));
            }
            Err(e) => {
                hasher.update([0_u8]);
                hasher.update(e.kind().to_string());
            }
        }
    }
    hasher.finalize().to_vec()
}

/// Polls a set of files written by an attestation agent and notifies
/// subscribers whenever their contents change.
struct Watcher {
    paths: Vec<PathBuf>,
    tx: Arc<watch::Sender<()>>,
}

impl Watcher {
    fn new(paths: Vec<PathBuf>) -> Self {
        let (tx, _) = watch::channel(());
        Self {
            paths,
            tx: Arc::new(tx),
        }
    }

    fn subscribe(&self) -> watch::Receiver<()> {
        self.tx.subscribe()
    }

    fn spawn(&self, interval: Duration, token: CancellationToken) -> JoinHandle<()> {
        let paths = self.paths.clone();
        let tx = Arc::clone(&self.tx);

        tokio::spawn(async move {
            let mut last = fingerprint(&paths).await;
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                select! {
                    () = token.cancelled() => {
                        debug!("Stopping SVID file watcher");
                        return;
                    }
                    _ = ticker.tick() => {}
                }

                let current = fingerprint(&paths).await;
                if current != last {
                    debug!("SVID files changed on disk: {:?}", paths);
                    last = current;
                    _ = tx.send_replace(());
                }
            }
        })
    }
}

/// Reads an X.509 SVID from a PEM certificate chain (leaf first) and a PEM
/// private key.
pub(crate) struct X509Source {
    svid_path: PathBuf,
    key_path: PathBuf,
    hint: String,
    watcher: Watcher,
}

impl X509Source {
    pub(crate) fn new(svid_path: PathBuf, key_path: PathBuf, hint: Option<String>) -> Self {
        let watcher = Watcher::new(vec![svid_path.clone(), key_path.clone()]);
        Self {
            svid_path,
            key_path,
            hint: hint.unwrap_or_default(),
            watcher,
        }
    }

    pub(crate) fn spawn_watcher(&self, interval: Duration, token: CancellationToken) -> JoinHandle<()> {
        self.watcher.spawn(interval, token)
    }
}

#[async_trait]
impl Source for X509Source {
    type Svid = X509Svid;

    async fn fetch(&self) -> Result<X509Svid> {
        let certificates = read(&self.svid_path).await?;
        let private_key = read(&self.key_path).await?;
        X509Svid::from_pem(&certificates, &private_key, self.hint.clone())
            .map_err(fetch_failed(&self.svid_path))
    }

    fn updated(&self) -> watch::Receiver<()> {
        self.watcher.subscribe()
    }
}

#[derive(Deserialize)]
struct JwtEntry {
    #[serde(default)]
    hint: String,
    svid: String,
}

/// Reads JWT SVIDs from a file holding either a single compact token or a
/// JSON array of `{"hint": ..., "svid": ...}` objects.
pub(crate) struct JwtSource {
    path: PathBuf,
    audience: Option<String>,
    hint: Option<String>,
    watcher: Watcher,
}

impl JwtSource {
    pub(crate) fn new(path: PathBuf, audience: Option<String>, hint: Option<String>) -> Self {
        let watcher = Watcher::new(vec![path.clone()]);
        Self {
            path,
            audience,
            hint,
            watcher,
        }
    }

    pub(crate) fn spawn_watcher(&self, interval: Duration, token: CancellationToken) -> JoinHandle<()> {
        self.watcher.spawn(interval, token)
    }

    fn parse(&self, data: &[u8]) -> Result<JwtSvid> {
        let entries = match serde_json::from_slice::<Vec<JwtEntry>>(data) {
            Ok(entries) => entries,
            Err(_) => vec![JwtEntry {
                hint: String::new(),
                svid: String::from_utf8(data.to_vec()).map_err(|e| {
                    error::Identity::Malformed(format!("JWT file is not UTF-8: {e}"))
                })?,
            }],
        };

        let mut svids = Vec::with_capacity(entries.len());
        for entry in entries {
            let svid = JwtSvid::parse(&entry.svid, entry.hint)?;
            match self.audience.as_deref() {
                Some(audience) if !svid.has_audience(audience) => {
                    warn!(
                        "Skipping JWT SVID {} (hint={:?}) as it is not valid for audience {:?}",
                        super::Svid::id(&svid),
                        super::Svid::hint(&svid),
                        audience
                    );
                }
                _ => svids.push(svid),
            }
        }

        select_by_hint(svids, self.hint.as_deref())
    }
}

#[async_trait]
impl Source for JwtSource {
    type Svid = JwtSvid;

    async fn fetch(&self) -> Result<JwtSvid> {
        let data = read(&self.path).await?;
        self.parse(&data).map_err(fetch_failed(&self.path))
    }

    fn updated(&self) -> watch::Receiver<()> {
        self.watcher.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::fs as std_fs;

    use tempfile::TempDir;

    use super::*;
    use crate::identity::{jwt, x509, Svid as _};

    #[tokio::test]
    async fn fetches_x509_svid() -> Result<()> {
        let dir = TempDir::new()?;
        let svid_path = dir.path().join("svid.pem");
        let key_path = dir.path().join("svid_key.pem");
        std_fs::write(&svid_path, x509::tests::EC_SVID)?;
        std_fs::write(&key_path, x509::tests::EC_KEY)?;

        let source = X509Source::new(svid_path, key_path, Some("primary".to_owned()));
        let svid = source.fetch().await?;
        assert_eq!(svid.id(), "spiffe://example.org/workload");
        assert_eq!(svid.hint(), "primary");
        Ok(())
    }

    #[tokio::test]
    async fn missing_files_fail_to_fetch() -> Result<()> {
        let dir = TempDir::new()?;
        let source = X509Source::new(dir.path().join("svid.pem"), dir.path().join("key.pem"), None);
        assert!(matches!(
            source.fetch().await,
            Err(Error::Identity(error::Identity::FetchFailed { .. }))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn half_rotated_files_fail_to_fetch() -> Result<()> {
        let dir = TempDir::new()?;
        let svid_path = dir.path().join("svid.pem");
        let key_path = dir.path().join("svid_key.pem");
        std_fs::write(&svid_path, x509::tests::EC_SVID)?;
        std_fs::write(&key_path, x509::tests::RSA_KEY)?;

        let source = X509Source::new(svid_path, key_path, None);
        assert!(matches!(
            source.fetch().await,
            Err(Error::Identity(error::Identity::FetchFailed { ref reason, .. }))
                if reason.contains("does not match")
        ));
        Ok(())
    }

    #[tokio::test]
    async fn selects_jwt_svid_by_hint_and_audience() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("jwt.json");
        let entries = serde_json::json!([
            { "hint": "a", "svid": jwt::tests::token("spiffe://example.org/a", &serde_json::json!("other"), 2_000_000_000) },
            { "hint": "b", "svid": jwt::tests::token("spiffe://example.org/b", &serde_json::json!("sts"), 2_000_000_000) },
            { "hint": "c", "svid": jwt::tests::token("spiffe://example.org/c", &serde_json::json!("sts"), 2_000_000_000) },
        ]);
        std_fs::write(&path, entries.to_string())?;

        let svid = JwtSource::new(path.clone(), Some("sts".to_owned()), None)
            .fetch()
            .await?;
        assert_eq!(svid.id(), "spiffe://example.org/b");

        let svid = JwtSource::new(path.clone(), None, Some("c".to_owned()))
            .fetch()
            .await?;
        assert_eq!(svid.id(), "spiffe://example.org/c");

        assert!(JwtSource::new(path, Some("sts".to_owned()), Some("a".to_owned()))
            .fetch()
            .await
            .is_err());
        Ok(())
    }

    #[tokio::test]
    async fn reads_bare_jwt_file() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("token");
        std_fs::write(
            &path,
            jwt::tests::token("spiffe://example.org/workload", &serde_json::json!("sts"), 2_000_000_000),
        )?;

        let svid = JwtSource::new(path, None, None).fetch().await?;
        assert_eq!(svid.id(), "spiffe://example.org/workload");
        assert_eq!(svid.hint(), "");
        Ok(())
    }

    #[tokio::test]
    async fn watcher_notifies_on_change() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("token");
        std_fs::write(&path, "first")?;

        let source = JwtSource::new(path.clone(), None, None);
        let mut updated = source.updated();
        let token = CancellationToken::new();
        let handle = source.spawn_watcher(Duration::from_millis(10), token.clone());

        // Give the watcher a chance to take its initial fingerprint.
        time::sleep(Duration::from_millis(50)).await;
        assert!(!updated.has_changed().map_err(error::Internal::from)?);

        std_fs::write(&path, "second")?;
        time::timeout(Duration::from_secs(5), updated.changed())
            .await
            .unwrap()
            .map_err(error::Internal::from)?;

        token.cancel();
        handle.await?;
        Ok(())
    }
}
