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

//! Defines the [table metadata](https://iceberg.apache.org/spec/#table-metadata).
//! The main struct here is `TableMetadata`, which holds everything a reader needs to load a table.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde_derive::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    PartitionSpecRef, SchemaId, SchemaRef, SnapshotRef, SnapshotReference, MAIN_BRANCH,
    TableMetadataBuilder,
};
use _serde::TableMetadataSerde;

use crate::error::Result;
use crate::{Error, ErrorKind};

/// Reference to [`TableMetadata`].
pub type TableMetadataRef = Arc<TableMetadata>;

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(try_from = "TableMetadataSerde", into = "TableMetadataSerde")]
/// Fields for the version 2 of the table metadata.
///
/// We assume that this data structure is always valid, so we will panic when invalid error happens.
/// We check the validity of this data structure when constructing.
pub struct TableMetadata {
    /// Integer Version for the format.
    pub(crate) format_version: FormatVersion,
    /// A UUID that identifies the table
    pub(crate) table_uuid: Uuid,
    /// Location tables base location
    pub(crate) location: String,
    /// The tables highest sequence number
    pub(crate) last_sequence_number: i64,
    /// Timestamp in milliseconds from the unix epoch when the table was last updated.
    pub(crate) last_updated_ms: i64,
    /// An integer; the highest assigned column ID for the table.
    pub(crate) last_column_id: i32,
    /// A list of schemas, stored as objects with schema-id.
    pub(crate) schemas: HashMap<i32, SchemaRef>,
    /// ID of the table’s current schema.
    pub(crate) current_schema_id: i32,
    /// A list of partition specs, stored as full partition spec objects.
    pub(crate) partition_specs: HashMap<i32, PartitionSpecRef>,
    /// ID of the “current” spec that writers should use by default.
    pub(crate) default_spec_id: i32,
    /// A string to string map of table properties. This is used to control settings that
    /// affect reading and writing and is not intended to be used for arbitrary metadata.
    /// For example, commit.retry.num-retries is used to control the number of commit retries.
    pub(crate) properties: HashMap<String, String>,
    /// long ID of the current table snapshot; must be the same as the current
    /// ID of the main branch in refs.
    pub(crate) current_snapshot_id: Option<i64>,
    /// A list of valid snapshots. Valid snapshots are snapshots for which all
    /// data files exist in the file system. A data file must not be deleted
    /// from the file system until the last snapshot in which it was listed is
    /// garbage collected.
    pub(crate) snapshots: HashMap<i64, SnapshotRef>,
    /// A list (optional) of timestamp and snapshot ID pairs that encodes changes
    /// to the current snapshot for the table. Each time the current-snapshot-id
    /// is changed, a new entry should be added with the last-updated-ms
    /// and the new current-snapshot-id.
    pub(crate) snapshot_log: Vec<SnapshotLog>,

    /// A list (optional) of timestamp and metadata file location pairs
    /// that encodes changes to the previous metadata files for the table.
    pub(crate) metadata_log: Vec<MetadataLog>,

    /// A map of snapshot references. The map keys are the unique snapshot reference
    /// names in the table, and the map values are snapshot reference objects.
    pub(crate) refs: HashMap<String, SnapshotReference>,
}

impl TableMetadata {
    /// Convert this Table Metadata into a builder for modification.
    ///
    /// `current_file_location` is the location where the current version
    /// of the metadata file is stored. This is used to update the metadata log.
    /// If `current_file_location` is `None`, the metadata log will not be updated.
    #[must_use]
    pub fn into_builder(self, current_file_location: Option<String>) -> TableMetadataBuilder {
        TableMetadataBuilder::new_from_metadata(self, current_file_location)
    }

    /// Returns format version of this metadata.
    #[inline]
    pub fn format_version(&self) -> FormatVersion {
        self.format_version
    }

    /// Returns uuid of current table.
    #[inline]
    pub fn uuid(&self) -> Uuid {
        self.table_uuid
    }

    /// Returns table location.
    #[inline]
    pub fn location(&self) -> &str {
        self.location.as_str()
    }

    /// Returns last sequence number.
    #[inline]
    pub fn last_sequence_number(&self) -> i64 {
        self.last_sequence_number
    }

    /// Sequence number the next snapshot of this table receives.
    ///
    /// Always 0 for V1 tables.
    #[inline]
    pub fn next_sequence_number(&self) -> i64 {
        match self.format_version {
            FormatVersion::V1 => 0,
            _ => self.last_sequence_number + 1,
        }
    }

    /// Returns last updated time in milliseconds.
    #[inline]
    pub fn last_updated_ms(&self) -> i64 {
        self.last_updated_ms
    }

    /// Returns the highest column id ever assigned by this table.
    #[inline]
    pub fn last_column_id(&self) -> i32 {
        self.last_column_id
    }

    /// Returns schemas
    #[inline]
    pub fn schemas_iter(&self) -> impl ExactSizeIterator<Item = &SchemaRef> {
        self.schemas.values()
    }

    /// Lookup schema by id.
    #[inline]
    pub fn schema_by_id(&self, schema_id: SchemaId) -> Option<&SchemaRef> {
        self.schemas.get(&schema_id)
    }

    /// Get current schema
    #[inline]
    pub fn current_schema(&self) -> &SchemaRef {
        self.schema_by_id(self.current_schema_id)
            .expect("Current schema id set, but not found in table metadata")
    }

    /// Get the id of the current schema
    #[inline]
    pub fn current_schema_id(&self) -> SchemaId {
        self.current_schema_id
    }

    /// Get default partition spec
    #[inline]
    pub fn default_partition_spec(&self) -> &PartitionSpecRef {
        self.partition_specs
            .get(&self.default_spec_id)
            .expect("Default partition spec id set, but not found in table metadata")
    }

    /// Returns spec id.
    #[inline]
    pub fn default_partition_spec_id(&self) -> i32 {
        self.default_spec_id
    }

    /// Returns properties of table.
    #[inline]
    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Returns all snapshots
    #[inline]
    pub fn snapshots(&self) -> impl ExactSizeIterator<Item = &SnapshotRef> {
        self.snapshots.values()
    }

    /// Lookup snapshot by id.
    #[inline]
    pub fn snapshot_by_id(&self, snapshot_id: i64) -> Option<&SnapshotRef> {
        self.snapshots.get(&snapshot_id)
    }

    /// Returns snapshot history.
    #[inline]
    pub fn history(&self) -> &[SnapshotLog] {
        &self.snapshot_log
    }

    /// Returns the metadata files this table was committed through, oldest first.
    #[inline]
    pub fn metadata_log(&self) -> &[MetadataLog] {
        &self.metadata_log
    }

    /// Get current snapshot
    #[inline]
    pub fn current_snapshot(&self) -> Option<&SnapshotRef> {
        self.current_snapshot_id.map(|s| {
            self.snapshot_by_id(s)
                .expect("Current snapshot id has been set, but doesn't exist in metadata")
        })
    }

    /// Get the current snapshot id
    #[inline]
    pub fn current_snapshot_id(&self) -> Option<i64> {
        self.current_snapshot_id
    }

    /// Get the snapshot for a reference
    /// Returns an option if the `ref_name` is not found
    #[inline]
    pub fn snapshot_for_ref(&self, ref_name: &str) -> Option<&SnapshotRef> {
        self.refs.get(ref_name).map(|r| {
            self.snapshot_by_id(r.snapshot_id)
                .unwrap_or_else(|| panic!("Snapshot id of ref {ref_name} doesn't exist"))
        })
    }

    /// Returns the snapshot references of this table.
    #[inline]
    pub fn refs(&self) -> &HashMap<String, SnapshotReference> {
        &self.refs
    }

    /// Returns every snapshot of the table, oldest first.
    ///
    /// Snapshots are ordered by commit timestamp, ties broken by sequence
    /// number and then by their position in the snapshot log.
    pub fn snapshots_in_commit_order(&self) -> Vec<&SnapshotRef> {
        let log_position: HashMap<i64, usize> = self
            .snapshot_log
            .iter()
            .enumerate()
            .map(|(idx, log)| (log.snapshot_id, idx))
            .collect();
        let mut snapshots: Vec<_> = self.snapshots.values().collect();
        snapshots.sort_by_key(|s| {
            (
                s.timestamp_ms(),
                s.sequence_number(),
                log_position.get(&s.snapshot_id()).copied().unwrap_or(usize::MAX),
            )
        });
        snapshots
    }

    /// Validates the cross references of this metadata.
    pub(crate) fn validate(&self) -> Result<()> {
        if !self.schemas.contains_key(&self.current_schema_id) {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!(
                    "No schema exists with the current schema id {}.",
                    self.current_schema_id
                ),
            ));
        }
        if !self.partition_specs.contains_key(&self.default_spec_id) {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!(
                    "No partition spec exists with the default spec id {}.",
                    self.default_spec_id
                ),
            ));
        }
        if let Some(current_snapshot_id) = self.current_snapshot_id {
            if !self.snapshots.contains_key(&current_snapshot_id) {
                return Err(Error::new(
                    ErrorKind::DataInvalid,
                    format!("Snapshot for current snapshot id {current_snapshot_id} does not exist in the existing snapshots list"),
                ));
            }
            let main = self.refs.get(MAIN_BRANCH).map(|r| r.snapshot_id);
            if main != Some(current_snapshot_id) {
                return Err(Error::new(
                    ErrorKind::DataInvalid,
                    format!(
                        "Current snapshot id {current_snapshot_id} does not match main branch ({main:?})"
                    ),
                ));
            }
        }
        for (name, reference) in &self.refs {
            if !self.snapshots.contains_key(&reference.snapshot_id) {
                return Err(Error::new(
                    ErrorKind::DataInvalid,
                    format!(
                        "Snapshot for reference {name} does not exist in the existing snapshots list"
                    ),
                ));
            }
        }
        Ok(())
    }
}

pub(super) mod _serde {
    use std::collections::HashMap;
    use std::sync::Arc;

    use serde_derive::{Deserialize, Serialize};
    use uuid::Uuid;

    use super::{FormatVersion, MetadataLog, SnapshotLog, TableMetadata};
    use crate::spec::{MAIN_BRANCH, PartitionSpec, Schema, Snapshot, SnapshotReference, SnapshotRetention};
    use crate::{Error, ErrorKind};

    #[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
    #[serde(rename_all = "kebab-case")]
    pub(super) struct TableMetadataSerde {
        format_version: FormatVersion,
        table_uuid: Uuid,
        location: String,
        last_sequence_number: i64,
        last_updated_ms: i64,
        last_column_id: i32,
        schemas: Vec<Schema>,
        current_schema_id: i32,
        partition_specs: Vec<PartitionSpec>,
        default_spec_id: i32,
        #[serde(default)]
        properties: HashMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_snapshot_id: Option<i64>,
        #[serde(default)]
        snapshots: Vec<Snapshot>,
        #[serde(default)]
        snapshot_log: Vec<SnapshotLog>,
        #[serde(default)]
        metadata_log: Vec<MetadataLog>,
        #[serde(default)]
        refs: HashMap<String, SnapshotReference>,
    }

    impl TryFrom<TableMetadataSerde> for TableMetadata {
        type Error = Error;

        fn try_from(value: TableMetadataSerde) -> Result<Self, Error> {
            let current_snapshot_id = match value.current_snapshot_id {
                Some(-1) => None,
                id => id,
            };
            let mut refs = value.refs;
            // Older writers only record the current snapshot id.
            if let Some(id) = current_snapshot_id {
                refs.entry(MAIN_BRANCH.to_string()).or_insert(SnapshotReference {
                    snapshot_id: id,
                    retention: SnapshotRetention::branch(None, None, None),
                });
            }
            if value.format_version == FormatVersion::V1 && value.last_sequence_number != 0 {
                return Err(Error::new(
                    ErrorKind::DataInvalid,
                    "V1 table metadata must have last-sequence-number 0",
                ));
            }

            let metadata = TableMetadata {
                format_version: value.format_version,
                table_uuid: value.table_uuid,
                location: value.location,
                last_sequence_number: value.last_sequence_number,
                last_updated_ms: value.last_updated_ms,
                last_column_id: value.last_column_id,
                schemas: value
                    .schemas
                    .into_iter()
                    .map(|schema| (schema.schema_id(), Arc::new(schema)))
                    .collect(),
                current_schema_id: value.current_schema_id,
                partition_specs: value
                    .partition_specs
                    .into_iter()
                    .map(|spec| (spec.spec_id(), Arc::new(spec)))
                    .collect(),
                default_spec_id: value.default_spec_id,
                properties: value.properties,
                current_snapshot_id,
                snapshots: value
                    .snapshots
                    .into_iter()
                    .map(|snapshot| (snapshot.snapshot_id(), Arc::new(snapshot)))
                    .collect(),
                snapshot_log: value.snapshot_log,
                metadata_log: value.metadata_log,
                refs,
            };
            metadata.validate()?;
            Ok(metadata)
        }
    }

    impl From<TableMetadata> for TableMetadataSerde {
        fn from(v: TableMetadata) -> Self {
            let mut schemas: Vec<Schema> = v
                .schemas
                .into_values()
                .map(|s| Arc::try_unwrap(s).unwrap_or_else(|s| s.as_ref().clone()))
                .collect();
            schemas.sort_by_key(|s| s.schema_id());
            let mut partition_specs: Vec<PartitionSpec> = v
                .partition_specs
                .into_values()
                .map(|s| Arc::try_unwrap(s).unwrap_or_else(|s| s.as_ref().clone()))
                .collect();
            partition_specs.sort_by_key(|s| s.spec_id());
            let mut snapshots: Vec<Snapshot> = v
                .snapshots
                .into_values()
                .map(|s| Arc::try_unwrap(s).unwrap_or_else(|s| s.as_ref().clone()))
                .collect();
            snapshots.sort_by_key(|s| (s.timestamp_ms(), s.sequence_number()));

            TableMetadataSerde {
                format_version: v.format_version,
                table_uuid: v.table_uuid,
                location: v.location,
                last_sequence_number: v.last_sequence_number,
                last_updated_ms: v.last_updated_ms,
                last_column_id: v.last_column_id,
                schemas,
                current_schema_id: v.current_schema_id,
                partition_specs,
                default_spec_id: v.default_spec_id,
                properties: v.properties,
                current_snapshot_id: v.current_snapshot_id,
                snapshots,
                snapshot_log: v.snapshot_log,
                metadata_log: v.metadata_log,
                refs: v.refs,
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
/// Iceberg format version
pub enum FormatVersion {
    /// Iceberg spec version 1
    V1 = 1,
    /// Iceberg spec version 2
    V2 = 2,
}

impl From<FormatVersion> for u8 {
    fn from(value: FormatVersion) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for FormatVersion {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(FormatVersion::V1),
            2 => Ok(FormatVersion::V2),
            _ => Err(Error::new(
                ErrorKind::FeatureUnsupported,
                format!("Unsupported table format version: {value}"),
            )),
        }
    }
}

impl std::str::FromStr for FormatVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let version: u8 = s.trim().parse().map_err(|e| {
            Error::new(
                ErrorKind::InvalidProperty,
                format!("Invalid format version: {s}"),
            )
            .with_source(e)
        })?;
        FormatVersion::try_from(version)
    }
}

impl Display for FormatVersion {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            FormatVersion::V1 => write!(f, "v1"),
            FormatVersion::V2 => write!(f, "v2"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// Encodes changes to the previous metadata files for the table
pub struct MetadataLog {
    /// The file for the log.
    pub metadata_file: String,
    /// Time new metadata was created
    pub timestamp_ms: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// A log of when each snapshot was made.
pub struct SnapshotLog {
    /// Id of the snapshot.
    pub snapshot_id: i64,
    /// Last updated timestamp
    pub timestamp_ms: i64,
}
