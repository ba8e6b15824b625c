// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! This module provides `OverwriteAction` for full-table data replacement.
//!
//! The new snapshot marks every live data file of the parent snapshot as
//! DELETED and adds the supplied files. None of the parent's manifests are
//! carried forward, so the table afterwards contains exactly the added files.
//!
//! # Example
//!
//! ```ignore
//! use iceberg_commit::transaction::{ApplyTransactionAction, Transaction};
//!
//! let tx = Transaction::new(&table);
//! let action = tx.overwrite().add_data_files(new_files);
//! let tx = action.apply(tx)?;
//! let table = tx.commit(&catalog).await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::spec::{DataFile, ManifestContentType, ManifestEntry, ManifestFile, Operation};
use crate::table::Table;
use crate::transaction::snapshot::{SnapshotProduceOperation, SnapshotProducer};
use crate::transaction::{ActionCommit, TransactionAction};

/// Action that replaces the whole content of a table.
///
/// Overwriting a table that has no snapshot yet is recorded as an `append`,
/// since nothing is replaced. Overwriting with no new files still produces a
/// snapshot, which then only records deletions.
pub struct OverwriteAction {
    check_duplicate: bool,
    commit_uuid: Option<Uuid>,
    snapshot_properties: HashMap<String, String>,
    added_data_files: Vec<DataFile>,
}

impl OverwriteAction {
    pub(crate) fn new() -> Self {
        Self {
            check_duplicate: true,
            commit_uuid: None,
            snapshot_properties: HashMap::default(),
            added_data_files: vec![],
        }
    }

    /// Set whether to check duplicate files
    pub fn with_check_duplicate(mut self, v: bool) -> Self {
        self.check_duplicate = v;
        self
    }

    /// Add data files that form the new content of the table.
    pub fn add_data_files(mut self, data_files: impl IntoIterator<Item = DataFile>) -> Self {
        self.added_data_files.extend(data_files);
        self
    }

    /// Set commit UUID for the snapshot.
    pub fn set_commit_uuid(mut self, commit_uuid: Uuid) -> Self {
        self.commit_uuid = Some(commit_uuid);
        self
    }

    /// Set snapshot summary properties.
    pub fn set_snapshot_properties(mut self, snapshot_properties: HashMap<String, String>) -> Self {
        self.snapshot_properties = snapshot_properties;
        self
    }
}

#[async_trait]
impl TransactionAction for OverwriteAction {
    async fn commit(self: Arc<Self>, table: &Table) -> Result<ActionCommit> {
        let snapshot_producer = SnapshotProducer::new(
            table,
            self.commit_uuid.unwrap_or_else(Uuid::now_v7),
            self.snapshot_properties.clone(),
            self.added_data_files.clone(),
        );

        snapshot_producer.validate_added_data_files()?;

        if self.check_duplicate {
            snapshot_producer.validate_duplicate_files().await?;
        }

        snapshot_producer.commit(OverwriteOperation).await
    }
}

/// Operation implementation for full-table overwrite.
struct OverwriteOperation;

impl SnapshotProduceOperation for OverwriteOperation {
    fn operation(&self, snapshot_producer: &SnapshotProducer<'_>) -> Operation {
        if snapshot_producer.parent_snapshot().is_some() {
            Operation::Overwrite
        } else {
            Operation::Append
        }
    }

    async fn delete_entries(
        &self,
        snapshot_producer: &SnapshotProducer<'_>,
    ) -> Result<Vec<ManifestEntry>> {
        let Some(snapshot) = snapshot_producer.parent_snapshot() else {
            return Ok(vec![]);
        };

        let manifest_list = snapshot
            .load_manifest_list(snapshot_producer.table.file_io())
            .await?;

        let mut entries_to_delete = Vec::new();
        for manifest_file in manifest_list.entries() {
            if manifest_file.content != ManifestContentType::Data {
                continue;
            }

            let manifest = manifest_file
                .load_manifest(snapshot_producer.table.file_io())
                .await?;
            entries_to_delete.extend(
                manifest
                    .entries()
                    .iter()
                    .filter(|entry| entry.is_alive())
                    .map(|entry| entry.as_ref().clone()),
            );
        }

        Ok(entries_to_delete)
    }

    async fn existing_manifest(
        &self,
        _snapshot_producer: &SnapshotProducer<'_>,
    ) -> Result<Vec<ManifestFile>> {
        // Every live entry is deleted, so no parent manifest survives.
        Ok(vec![])
    }
}
