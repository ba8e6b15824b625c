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

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::ops::RangeFrom;

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::spec::{
    DataContentType, DataFile, FormatVersion, MAIN_BRANCH, ManifestEntry, ManifestFile,
    ManifestListWriter, ManifestWriter, Operation, Snapshot, SnapshotRef, SnapshotReference,
    SnapshotRetention, SnapshotSummaryCollector, Summary, update_snapshot_summaries,
};
use crate::table::Table;
use crate::transaction::ActionCommit;
use crate::{Error, ErrorKind, TableRequirement, TableUpdate};

const META_ROOT_PATH: &str = "metadata";
const MANIFEST_EXTENSION: &str = "json";

/// A trait that defines how different table operations produce new snapshots.
///
/// `SnapshotProduceOperation` is used by [`SnapshotProducer`] to customize snapshot creation
/// based on the type of operation being performed. Each operation type implements this
/// trait to specify:
/// - Which operation type to record in the snapshot summary
/// - Which existing manifest files should be carried into the new snapshot
/// - Which manifest entries should be marked as deleted
pub(crate) trait SnapshotProduceOperation: Send + Sync {
    /// Returns the operation type that will be recorded in the snapshot summary.
    fn operation(&self, snapshot_produce: &SnapshotProducer<'_>) -> Operation;

    /// Returns live entries of the parent snapshot that this snapshot removes.
    ///
    /// They are written to a new manifest with status DELETED.
    fn delete_entries(
        &self,
        snapshot_produce: &SnapshotProducer<'_>,
    ) -> impl Future<Output = Result<Vec<ManifestEntry>>> + Send;

    /// Returns the manifests of the parent snapshot to carry forward.
    ///
    /// A carried manifest that also records deletions is rewritten with only
    /// its live entries.
    fn existing_manifest(
        &self,
        snapshot_produce: &SnapshotProducer<'_>,
    ) -> impl Future<Output = Result<Vec<ManifestFile>>> + Send;
}

/// Builds one snapshot of a table: writes its manifests and manifest list
/// and turns the result into the updates and requirements of an [`ActionCommit`].
pub(crate) struct SnapshotProducer<'a> {
    pub(crate) table: &'a Table,
    snapshot_id: i64,
    commit_uuid: Uuid,
    snapshot_properties: HashMap<String, String>,
    added_data_files: Vec<DataFile>,
    // A counter used to generate unique manifest file names.
    // It starts from 0 and increments for each new manifest file.
    manifest_counter: RangeFrom<u64>,
}

impl<'a> SnapshotProducer<'a> {
    pub(crate) fn new(
        table: &'a Table,
        commit_uuid: Uuid,
        snapshot_properties: HashMap<String, String>,
        added_data_files: Vec<DataFile>,
    ) -> Self {
        Self {
            table,
            snapshot_id: Self::generate_unique_snapshot_id(table),
            commit_uuid,
            snapshot_properties,
            added_data_files,
            manifest_counter: (0..),
        }
    }

    /// The snapshot the new snapshot is based on: the head of `main`.
    pub(crate) fn parent_snapshot(&self) -> Option<&SnapshotRef> {
        self.table.metadata().snapshot_for_ref(MAIN_BRANCH)
    }

    pub(crate) fn validate_added_data_files(&self) -> Result<()> {
        for data_file in &self.added_data_files {
            if data_file.content_type() != DataContentType::Data {
                return Err(Error::new(
                    ErrorKind::DataInvalid,
                    "Only data content type is allowed for fast append",
                ));
            }
        }

        Ok(())
    }

    pub(crate) async fn validate_duplicate_files(&self) -> Result<()> {
        let mut new_files: HashSet<&str> = HashSet::new();
        let mut intra_batch_duplicates = Vec::new();
        for data_file in &self.added_data_files {
            if !new_files.insert(data_file.file_path()) {
                intra_batch_duplicates.push(data_file.file_path().to_string());
            }
        }
        if !intra_batch_duplicates.is_empty() {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!(
                    "Cannot add duplicate data files in the same batch: {}",
                    intra_batch_duplicates.join(", ")
                ),
            ));
        }

        let mut referenced_files = Vec::new();
        if let Some(current_snapshot) = self.parent_snapshot() {
            let manifest_list = current_snapshot
                .load_manifest_list(self.table.file_io())
                .await?;
            for manifest_list_entry in manifest_list.entries() {
                let manifest = manifest_list_entry
                    .load_manifest(self.table.file_io())
                    .await?;
                for entry in manifest.entries() {
                    if entry.is_alive() && new_files.contains(entry.file_path()) {
                        referenced_files.push(entry.file_path().to_string());
                    }
                }
            }
        }

        if !referenced_files.is_empty() {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!(
                    "Cannot add files that are already referenced by table, files: {}",
                    referenced_files.join(", ")
                ),
            ));
        }

        Ok(())
    }

    fn generate_unique_snapshot_id(table: &Table) -> i64 {
        let generate_random_id = || -> i64 {
            let (lhs, rhs) = Uuid::new_v4().as_u64_pair();
            let snapshot_id = (lhs ^ rhs) as i64;
            if snapshot_id < 0 {
                snapshot_id.wrapping_neg().max(1)
            } else {
                snapshot_id
            }
        };
        let mut snapshot_id = generate_random_id();

        while table
            .metadata()
            .snapshots()
            .any(|s| s.snapshot_id() == snapshot_id)
        {
            snapshot_id = generate_random_id();
        }
        snapshot_id
    }

    fn new_manifest_writer(&mut self) -> Result<ManifestWriter> {
        let counter = self.manifest_counter.next().ok_or_else(|| {
            Error::new(ErrorKind::Unexpected, "Manifest counter is exhausted")
        })?;
        let new_manifest_path = format!(
            "{}/{}/{}-m{}.{}",
            self.table.metadata().location(),
            META_ROOT_PATH,
            self.commit_uuid,
            counter,
            MANIFEST_EXTENSION
        );
        let metadata = self.table.metadata();
        Ok(ManifestWriter::new(
            self.table.file_io().new_output(new_manifest_path)?,
            self.snapshot_id,
            metadata.format_version(),
            metadata.current_schema_id(),
            metadata.default_partition_spec_id(),
        ))
    }

    // Write manifest file for added data files and return the ManifestFile for ManifestList.
    async fn write_added_manifest(&mut self) -> Result<ManifestFile> {
        let added_data_files = std::mem::take(&mut self.added_data_files);
        if added_data_files.is_empty() {
            return Err(Error::new(
                ErrorKind::PreconditionFailed,
                "No added data files found when write an added manifest file",
            ));
        }

        let mut writer = self.new_manifest_writer()?;
        for data_file in added_data_files {
            writer.add_file(data_file);
        }
        writer.write_manifest_file().await
    }

    // Write manifest file marking entries of the parent snapshot as deleted.
    async fn write_deleted_manifest(
        &mut self,
        deleted_entries: &[ManifestEntry],
    ) -> Result<ManifestFile> {
        if deleted_entries.is_empty() {
            return Err(Error::new(
                ErrorKind::PreconditionFailed,
                "No deleted entries to write",
            ));
        }

        let mut writer = self.new_manifest_writer()?;
        for entry in deleted_entries {
            writer.add_delete_entry(entry)?;
        }
        writer.write_manifest_file().await
    }

    // Rewrite a carried manifest keeping its live entries as EXISTING.
    async fn write_existing_manifest(
        &mut self,
        manifest_file: &ManifestFile,
    ) -> Result<ManifestFile> {
        let manifest = manifest_file.load_manifest(self.table.file_io()).await?;
        let mut writer = self.new_manifest_writer()?;
        for entry in manifest.entries().iter().filter(|e| e.is_alive()) {
            writer.add_existing_entry(entry)?;
        }
        debug!(
            manifest = manifest_file.manifest_path.as_str(),
            existing = writer.len(),
            "rewrote carried manifest without deleted entries"
        );
        writer.write_manifest_file().await
    }

    /// Returns the manifests of the new snapshot in manifest-list order: the
    /// manifest of added files, then the manifest of deleted entries, then the
    /// carried manifests of the parent.
    async fn manifest_file<OP: SnapshotProduceOperation>(
        &mut self,
        snapshot_produce_operation: &OP,
        deleted_entries: &[ManifestEntry],
    ) -> Result<Vec<ManifestFile>> {
        let existing_manifests = snapshot_produce_operation.existing_manifest(self).await?;

        let mut manifest_files = Vec::with_capacity(existing_manifests.len() + 2);
        if !self.added_data_files.is_empty() {
            manifest_files.push(self.write_added_manifest().await?);
        }
        if !deleted_entries.is_empty() {
            manifest_files.push(self.write_deleted_manifest(deleted_entries).await?);
        }
        for manifest_file in existing_manifests {
            let mixed = manifest_file.deleted_files_count.is_some_and(|c| c > 0)
                && (manifest_file.has_added_files() || manifest_file.has_existing_files());
            if mixed {
                manifest_files.push(self.write_existing_manifest(&manifest_file).await?);
            } else {
                manifest_files.push(manifest_file);
            }
        }

        Ok(manifest_files)
    }

    // Returns a `Summary` of the current snapshot
    fn summary(&self, operation: Operation, deleted_entries: &[ManifestEntry]) -> Result<Summary> {
        let mut summary_collector = SnapshotSummaryCollector::default();

        for data_file in &self.added_data_files {
            summary_collector.add_file(data_file);
        }
        for entry in deleted_entries {
            summary_collector.remove_file(entry.data_file());
        }

        let mut additional_properties = summary_collector.build();
        let mut snapshot_properties: Vec<_> = self.snapshot_properties.clone().into_iter().collect();
        snapshot_properties.sort();
        additional_properties.extend(snapshot_properties);

        let summary = Summary {
            operation,
            additional_properties,
        };

        update_snapshot_summaries(summary, self.parent_snapshot().map(|s| s.summary()))
    }

    fn generate_manifest_list_file_path(&self, attempt: i64) -> String {
        format!(
            "{}/{}/snap-{}-{}-{}.{}",
            self.table.metadata().location(),
            META_ROOT_PATH,
            self.snapshot_id,
            attempt,
            self.commit_uuid,
            MANIFEST_EXTENSION
        )
    }

    /// Finished building the action and return the [`ActionCommit`] to the transaction.
    pub(crate) async fn commit<OP: SnapshotProduceOperation>(
        mut self,
        snapshot_produce_operation: OP,
    ) -> Result<ActionCommit> {
        let table = self.table;
        let metadata = table.metadata();
        let parent_snapshot_id = self.parent_snapshot().map(|s| s.snapshot_id());
        let retention = metadata
            .refs()
            .get(MAIN_BRANCH)
            .map(|r| r.retention.clone())
            .unwrap_or_else(|| SnapshotRetention::branch(None, None, None));
        let operation = snapshot_produce_operation.operation(&self);

        let manifest_list_path = self.generate_manifest_list_file_path(0);
        let next_seq_num = metadata.next_sequence_number();
        let output = table.file_io().new_output(&manifest_list_path)?;
        let mut manifest_list_writer = match metadata.format_version() {
            FormatVersion::V1 => ManifestListWriter::v1(output, self.snapshot_id),
            FormatVersion::V2 => ManifestListWriter::v2(output, self.snapshot_id, next_seq_num),
        };

        let deleted_entries = snapshot_produce_operation.delete_entries(&self).await?;

        // Calling self.summary() before self.manifest_file() is important because self.added_data_files
        // will be set to an empty vec after self.manifest_file() returns, resulting in an empty summary
        // being generated.
        let summary = self.summary(operation, &deleted_entries)?;

        let new_manifests = self
            .manifest_file(&snapshot_produce_operation, &deleted_entries)
            .await?;
        debug!(
            snapshot_id = self.snapshot_id,
            manifests = new_manifests.len(),
            "writing manifest list"
        );
        manifest_list_writer.add_manifests(new_manifests.into_iter())?;
        manifest_list_writer.close().await?;

        let commit_ts = chrono::Utc::now().timestamp_millis();
        let new_snapshot = Snapshot::builder()
            .with_manifest_list(manifest_list_path)
            .with_snapshot_id(self.snapshot_id)
            .with_parent_snapshot_id(parent_snapshot_id)
            .with_sequence_number(next_seq_num)
            .with_summary(summary)
            .with_schema_id(metadata.current_schema_id())
            .with_timestamp_ms(commit_ts)
            .build();

        info!(
            snapshot_id = self.snapshot_id,
            parent_snapshot_id = ?parent_snapshot_id,
            sequence_number = next_seq_num,
            operation = operation.as_str(),
            "produced snapshot"
        );

        let updates = vec![
            TableUpdate::AddSnapshot {
                snapshot: new_snapshot,
            },
            TableUpdate::SetSnapshotRef {
                ref_name: MAIN_BRANCH.to_string(),
                reference: SnapshotReference::new(self.snapshot_id, retention),
            },
        ];

        let requirements = vec![
            TableRequirement::UuidMatch {
                uuid: metadata.uuid(),
            },
            TableRequirement::RefSnapshotIdMatch {
                r#ref: MAIN_BRANCH.to_string(),
                snapshot_id: parent_snapshot_id,
            },
        ];

        Ok(ActionCommit::new(updates, requirements))
    }
}
