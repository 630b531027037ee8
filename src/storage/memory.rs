// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{error::Result, federation::CredentialRecord};

use super::Storage;

/// Keeps every record it is given, in order. Clones share the same history.
#[derive(Clone, Default)]
pub(crate) struct Memory {
    records: Arc<RwLock<Vec<CredentialRecord>>>,
}

impl Memory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn records(&self) -> Vec<CredentialRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl Storage for Memory {
    async fn update(&mut self, record: &CredentialRecord) -> Result<()> {
        let records = Arc::clone(&self.records);
        let mut guard = records.write_owned().await;
        guard.push(record.clone());
        Ok(())
    }
}
