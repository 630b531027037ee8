// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use directories::BaseDirs;
use once_cell::sync::Lazy;

pub(crate) static CLIENT_NAME: Lazy<String> = Lazy::new(|| {
    option_env!("CARGO_PKG_NAME")
        .unwrap_or("aws-svid-helper")
        .to_owned()
});
pub(crate) static USER_AGENT: Lazy<String> = Lazy::new(|| {
    format!(
        "{}/{}",
        *CLIENT_NAME,
        option_env!("CARGO_PKG_VERSION").unwrap_or("dev")
    )
});

/// The location the AWS CLI and SDKs read shared credentials from when
/// `AWS_SHARED_CREDENTIALS_FILE` is not set.
pub(crate) static DEFAULT_CREDENTIALS_PATH: Lazy<Option<PathBuf>> = Lazy::new(|| {
    BaseDirs::new().map(|dirs| dirs.home_dir().join(".aws").join("credentials"))
});
