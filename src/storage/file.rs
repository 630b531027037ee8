// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    fs,
    io::{self, Write as _},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use log::{debug, warn};
use secrecy::ExposeSecret as _;
use tempfile::NamedTempFile;

use crate::{
    error::{self, LoadFailure, Result},
    federation::CredentialRecord,
};

use super::{ini::Document, Storage};

pub(crate) const DEFAULT_PROFILE: &str = "default";

const AWS_SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
const AWS_ACCESS_KEY_ID: &str = "aws_access_key_id";
const AWS_SESSION_TOKEN: &str = "aws_session_token";

#[derive(Clone, Debug)]
pub(crate) struct Config {
    pub(crate) path: PathBuf,
    pub(crate) profile_name: Option<String>,
    /// Start over with an empty file if the existing one cannot be loaded.
    pub(crate) force: bool,
    /// Discard everything in the existing file.
    pub(crate) replace: bool,
}

impl Config {
    pub(crate) fn profile_name(&self) -> &str {
        self.profile_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_PROFILE)
    }
}

fn read(path: &Path) -> Result<Document, LoadFailure> {
    let text = String::from_utf8(fs::read(path)?)?;
    Ok(Document::parse(&text)?)
}

fn load(config: &Config) -> Result<Document> {
    if config.replace {
        return Ok(Document::default());
    }

    match read(&config.path) {
        Ok(doc) => Ok(doc),
        Err(LoadFailure::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(Document::default()),
        Err(reason) if config.force => {
            warn!(
                "Discarding existing credentials file that could not be loaded: path={} reason={}",
                config.path.display(),
                reason
            );
            Ok(Document::default())
        }
        Err(reason) => Err(error::CredentialFile::Unreadable {
            path: config.path.clone(),
            reason,
        }
        .into()),
    }
}

/// Writes `contents` next to `path` and renames it into place, so readers
/// see either the old file or the new one. A symlink at `path` is followed
/// and its target replaced.
fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let path = match fs::canonicalize(path) {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == io::ErrorKind::NotFound => path.to_owned(),
        Err(e) => return Err(e),
    };
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    _ = file.persist(&path).map_err(|e| e.error)?;
    Ok(())
}

/// Sets the credentials in `record` on the configured profile of an AWS
/// shared credentials file. Every other profile is left as it was unless
/// the whole file is being replaced.
pub(crate) fn upsert_profile(config: &Config, record: &CredentialRecord) -> Result<()> {
    let mut doc = load(config)?;
    doc.upsert(
        config.profile_name(),
        &[
            (
                AWS_SECRET_ACCESS_KEY,
                record.secret_access_key.expose_secret().as_str(),
            ),
            (AWS_ACCESS_KEY_ID, record.access_key_id.as_str()),
            (AWS_SESSION_TOKEN, record.session_token.expose_secret().as_str()),
        ],
    );

    write_atomic(&config.path, doc.to_string().as_bytes()).map_err(|source| {
        error::CredentialFile::WriteFailed {
            path: config.path.clone(),
            source,
        }
    })?;
    debug!(
        "Wrote credentials: path={} profile={}",
        config.path.display(),
        config.profile_name()
    );
    Ok(())
}

/// An AWS shared credentials file.
pub(crate) struct File {
    config: Config,
}

impl File {
    pub(crate) fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Storage for File {
    async fn update(&mut self, record: &CredentialRecord) -> Result<()> {
        upsert_profile(&self.config, record)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::error::Error;

    const EXPECTED: &str = "[default]\n\
                            aws_secret_access_key = abcdefgh\n\
                            aws_access_key_id     = 1234567890\n\
                            aws_session_token     = ijklmnop\n";
    const PRE_EXISTING: &str = "[pre-existing]\n\
                                aws_access_key_id=AKIDEXAMPLE\n\
                                aws_secret_access_key =   shh   \n";

    fn record() -> CredentialRecord {
        CredentialRecord::new(
            "1234567890".to_owned(),
            "abcdefgh".to_owned(),
            "ijklmnop".to_owned(),
            "2024-05-01T12:30:00Z".to_owned(),
        )
    }

    fn config(dir: &TempDir) -> Config {
        Config {
            path: dir.path().join("aws").join("credentials"),
            profile_name: None,
            force: false,
            replace: false,
        }
    }

    fn read_to_string(config: &Config) -> Result<String> {
        Ok(fs::read_to_string(&config.path)?)
    }

    #[test]
    fn writes_new_file() -> Result<()> {
        let dir = TempDir::new()?;
        let config = config(&dir);
        upsert_profile(&config, &record())?;
        assert_eq!(read_to_string(&config)?, EXPECTED);
        Ok(())
    }

    #[test]
    fn upsert_is_idempotent() -> Result<()> {
        let dir = TempDir::new()?;
        let config = config(&dir);
        fs::create_dir_all(dir.path().join("aws"))?;
        fs::write(&config.path, PRE_EXISTING)?;

        upsert_profile(&config, &record())?;
        let first = read_to_string(&config)?;
        upsert_profile(&config, &record())?;
        assert_eq!(read_to_string(&config)?, first);
        Ok(())
    }

    #[test]
    fn preserves_other_profiles() -> Result<()> {
        let dir = TempDir::new()?;
        let config = config(&dir);
        fs::create_dir_all(dir.path().join("aws"))?;
        fs::write(&config.path, PRE_EXISTING)?;

        upsert_profile(&config, &record())?;
        assert_eq!(
            read_to_string(&config)?,
            format!("{PRE_EXISTING}\n{EXPECTED}")
        );
        Ok(())
    }

    #[test]
    fn replace_discards_other_profiles() -> Result<()> {
        let dir = TempDir::new()?;
        let config = Config {
            replace: true,
            ..config(&dir)
        };
        fs::create_dir_all(dir.path().join("aws"))?;
        fs::write(&config.path, PRE_EXISTING)?;

        upsert_profile(&config, &record())?;
        assert_eq!(read_to_string(&config)?, EXPECTED);
        Ok(())
    }

    #[test]
    fn overwrites_matching_profile_in_place() -> Result<()> {
        let dir = TempDir::new()?;
        let config = Config {
            profile_name: Some("pre-existing".to_owned()),
            ..config(&dir)
        };
        fs::create_dir_all(dir.path().join("aws"))?;
        fs::write(
            &config.path,
            format!("[first]\nregion = eu-west-1\n\n{PRE_EXISTING}\n[last]\noutput = json\n"),
        )?;

        upsert_profile(&config, &record())?;
        assert_eq!(
            read_to_string(&config)?,
            "[first]\nregion = eu-west-1\n\n\
             [pre-existing]\n\
             aws_secret_access_key = abcdefgh\n\
             aws_access_key_id     = 1234567890\n\
             aws_session_token     = ijklmnop\n\
             \n\
             [last]\noutput = json\n"
        );
        Ok(())
    }

    #[test]
    fn unreadable_file_is_left_alone() -> Result<()> {
        let dir = TempDir::new()?;
        let config = config(&dir);
        fs::create_dir_all(dir.path().join("aws"))?;
        fs::write(&config.path, "[broken\n")?;

        let result = upsert_profile(&config, &record());
        match result {
            Err(Error::CredentialFile(error::CredentialFile::Unreadable { ref path, .. })) => {
                assert_eq!(*path, config.path);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(read_to_string(&config)?, "[broken\n");
        Ok(())
    }

    #[test]
    fn force_overwrites_unreadable_file() -> Result<()> {
        let dir = TempDir::new()?;
        let config = Config {
            force: true,
            ..config(&dir)
        };
        fs::create_dir_all(dir.path().join("aws"))?;
        fs::write(&config.path, b"[pre-existing]\naws_session_token = \xff\n")?;

        upsert_profile(&config, &record())?;
        assert_eq!(read_to_string(&config)?, EXPECTED);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn writes_through_symlink() -> Result<()> {
        let dir = TempDir::new()?;
        let config = config(&dir);
        let target = dir.path().join("dotfiles").join("credentials");
        fs::create_dir_all(dir.path().join("dotfiles"))?;
        fs::create_dir_all(dir.path().join("aws"))?;
        fs::write(&target, PRE_EXISTING)?;
        std::os::unix::fs::symlink(&target, &config.path)?;

        upsert_profile(&config, &record())?;
        assert!(fs::symlink_metadata(&config.path)?.file_type().is_symlink());
        assert_eq!(
            fs::read_to_string(&target)?,
            format!("{PRE_EXISTING}\n{EXPECTED}")
        );
        Ok(())
    }

    #[test]
    fn write_failure_is_reported() -> Result<()> {
        let dir = TempDir::new()?;
        // A regular file where the parent directory should be.
        fs::write(dir.path().join("aws"), "")?;
        let config = Config {
            replace: true,
            ..config(&dir)
        };

        assert!(matches!(
            upsert_profile(&config, &record()),
            Err(Error::CredentialFile(error::CredentialFile::WriteFailed { .. }))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn storage_uses_named_profile() -> Result<()> {
        let dir = TempDir::new()?;
        let config = Config {
            profile_name: Some("workload".to_owned()),
            ..config(&dir)
        };
        File::new(config.clone()).update(&record()).await?;
        assert!(read_to_string(&config)?.starts_with("[workload]\n"));
        Ok(())
    }
}
