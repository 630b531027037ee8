// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{io, path::PathBuf, result};

use thiserror::Error;
use tokio::sync::watch;

use crate::storage::ini;

pub(crate) type Result<T, E = Error> = result::Result<T, E>;

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error("IO operation failed: {0}")]
    Io(#[from] io::Error),
    #[error("JSON format error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("identity error: {0}")]
    Identity(#[from] Identity),
    #[error("signing error: {0}")]
    Signing(#[from] Signing),
    #[error("federation error: {0}")]
    Federation(#[from] Federation),
    #[error("credential file error: {0}")]
    CredentialFile(#[from] CredentialFile),
    #[error(r#"could not parse credential expiration "{}": {source}"#, .value.escape_default())]
    ExpirationParse {
        value: String,
        source: chrono::ParseError,
    },
    #[error("internal communication error: {0}")]
    Internal(#[from] Internal),
    #[error("command execution failed")]
    Command,
}

impl From<tokio::task::JoinError> for Error {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Io(value.into())
    }
}

#[derive(Error, Debug)]
pub(crate) enum Identity {
    #[error("failed to fetch the current SVID from {source_name}: {reason}")]
    FetchFailed { source_name: String, reason: String },
    #[error("no SVID is available")]
    NoSvid,
    #[error(r#"could not find an SVID with hint "{}" (available hints: [{}])"#, .hint.escape_default(), .available.join(", "))]
    HintNotFound {
        hint: String,
        available: Vec<String>,
    },
    #[error("SVID is malformed: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub(crate) enum Signing {
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),
    #[error("unsupported hash function: {0}")]
    UnsupportedHashFunction(String),
    #[error("signing with RSA: {0}")]
    Rsa(#[from] rsa::Error),
    #[error("signing with ECDSA: {0}")]
    Ecdsa(#[from] p256::ecdsa::Error),
}

#[derive(Error, Debug)]
pub(crate) enum Federation {
    #[error("request failed with status {status} {status_text}: {body}")]
    RequestFailed {
        status: u16,
        status_text: String,
        body: String,
    },
    #[error("response could not be understood: {0}")]
    ResponseMalformed(String),
    #[error("invalid federation configuration: {0}")]
    InvalidConfiguration(String),
}

#[derive(Error, Debug)]
pub(crate) enum CredentialFile {
    #[error("could not load existing credentials file {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: LoadFailure },
    #[error("could not write credentials file {}: {source}", .path.display())]
    WriteFailed { path: PathBuf, source: io::Error },
}

#[derive(Error, Debug)]
pub(crate) enum LoadFailure {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("unexpected non-UTF-8-encoded bytes in file: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("{0}")]
    Syntax(#[from] ini::ParseError),
}

#[derive(Error, Debug)]
pub(crate) enum Internal {
    #[error("channel is closed")]
    ChannelClosed,
}

impl From<watch::error::RecvError> for Internal {
    fn from(_: watch::error::RecvError) -> Self {
        Self::ChannelClosed
    }
}
