// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

mod file;
pub(crate) mod ini;
#[cfg(test)]
mod memory;

use async_trait::async_trait;

use crate::{error::Result, federation::CredentialRecord};

pub(crate) use file::{Config as FileConfig, File, DEFAULT_PROFILE};
#[cfg(test)]
pub(crate) use memory::Memory;

#[async_trait]
pub(crate) trait Storage: Send + Sync {
    async fn update(&mut self, record: &CredentialRecord) -> Result<()>;
}
