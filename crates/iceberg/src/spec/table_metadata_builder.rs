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
use std::sync::Arc;

use uuid::Uuid;

use super::{
    DEFAULT_PARTITION_SPEC_ID, DEFAULT_SCHEMA_ID, FormatVersion, MAIN_BRANCH, MetadataLog,
    PartitionSpec, Schema, SchemaRef, Snapshot, SnapshotLog, SnapshotReference, TableMetadata,
    TableProperties,
};
use crate::error::{Error, ErrorKind, Result};
use crate::{TableCreation, TableUpdate};

const ONE_MINUTE_MS: i64 = 60_000;

/// Manipulating table metadata.
///
/// For this builder the order of called functions matters. Functions are applied in-order.
/// All operations applied to the `TableMetadata` are tracked in `changes` as  a chronologically
/// ordered vec of `TableUpdate`.
/// If an operation does not lead to a change of the `TableMetadata`, the corresponding update
/// is omitted from `changes`.
#[derive(Debug, Clone)]
pub struct TableMetadataBuilder {
    metadata: TableMetadata,
    changes: Vec<TableUpdate>,
    last_added_schema_id: Option<i32>,
    // None if this is a new table (from_metadata) method not used
    previous_history_entry: Option<MetadataLog>,
    last_updated_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
/// Result of modifying or creating a `TableMetadata`.
pub struct TableMetadataBuildResult {
    /// The new `TableMetadata`.
    pub metadata: TableMetadata,
    /// The changes that were applied to the metadata.
    pub changes: Vec<TableUpdate>,
}

impl TableMetadataBuilder {
    /// Proxy id for "last added" schema.
    pub const LAST_ADDED: i32 = -1;

    /// Create a `TableMetadata` object from scratch.
    ///
    /// Field ids of `schema` are kept, the schema id is reset to the default.
    pub fn new(
        schema: Schema,
        spec: PartitionSpec,
        location: String,
        format_version: FormatVersion,
        properties: HashMap<String, String>,
    ) -> Result<Self> {
        if !spec.is_unpartitioned() {
            // Re-validated so hand built specs cannot slip through.
            PartitionSpec::try_new(spec.spec_id(), spec.fields().to_vec())?;
        }
        let schema = schema.with_schema_id(DEFAULT_SCHEMA_ID);

        let builder = Self {
            metadata: TableMetadata {
                format_version,
                table_uuid: Uuid::now_v7(),
                location: "".to_string(), // Overwritten immediately by set_location
                last_sequence_number: 0,
                last_updated_ms: 0,    // Overwritten by build() if not set before
                last_column_id: 0,     // Raised by add_current_schema
                current_schema_id: -1, // Overwritten immediately by add_current_schema
                schemas: HashMap::new(),
                partition_specs: HashMap::from([(
                    DEFAULT_PARTITION_SPEC_ID,
                    Arc::new(PartitionSpec::unpartition_spec()),
                )]),
                default_spec_id: DEFAULT_PARTITION_SPEC_ID,
                properties: HashMap::new(),
                current_snapshot_id: None,
                snapshots: HashMap::new(),
                snapshot_log: vec![],
                metadata_log: vec![],
                refs: HashMap::default(),
            },
            last_updated_ms: None,
            changes: vec![],
            last_added_schema_id: None,
            previous_history_entry: None,
        };

        builder
            .set_location(location)
            .add_current_schema(schema)?
            .set_properties(properties)
    }

    /// Creates a new table metadata builder from the given metadata to modify it.
    /// `current_file_location` is the location where the current version
    /// of the metadata file is stored. This is used to update the metadata log.
    /// If `current_file_location` is `None`, the metadata log will not be updated.
    #[must_use]
    pub fn new_from_metadata(
        previous: TableMetadata,
        current_file_location: Option<String>,
    ) -> Self {
        Self {
            previous_history_entry: current_file_location.map(|l| MetadataLog {
                metadata_file: l,
                timestamp_ms: previous.last_updated_ms,
            }),
            metadata: previous,
            changes: Vec::default(),
            last_added_schema_id: None,
            last_updated_ms: None,
        }
    }

    /// Creates a new table metadata builder from the given table creation.
    ///
    /// The reserved `format-version` property selects the format version and
    /// is not persisted. Tables default to V2.
    pub fn from_table_creation(table_creation: TableCreation) -> Result<Self> {
        let TableCreation {
            name: _,
            location,
            schema,
            partition_spec,
            mut properties,
        } = table_creation;

        let location = location.ok_or_else(|| {
            Error::new(
                ErrorKind::DataInvalid,
                "Can't create table without location",
            )
        })?;
        let format_version = match properties.remove(TableProperties::PROPERTY_FORMAT_VERSION) {
            Some(v) => v.parse::<FormatVersion>()?,
            None => FormatVersion::V2,
        };

        Self::new(
            schema,
            partition_spec.unwrap_or_else(PartitionSpec::unpartition_spec),
            location,
            format_version,
            properties,
        )
    }

    /// Changes uuid of table metadata.
    pub fn assign_uuid(mut self, uuid: Uuid) -> Self {
        if self.metadata.table_uuid != uuid {
            self.metadata.table_uuid = uuid;
            self.changes.push(TableUpdate::AssignUuid { uuid });
        }

        self
    }

    /// Upgrade `FormatVersion`. Downgrades are not allowed.
    ///
    /// # Errors
    /// - Cannot downgrade to older format versions.
    pub fn upgrade_format_version(mut self, format_version: FormatVersion) -> Result<Self> {
        if format_version < self.metadata.format_version {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!(
                    "Cannot downgrade FormatVersion from {} to {}",
                    self.metadata.format_version, format_version
                ),
            ));
        }

        if format_version != self.metadata.format_version {
            self.metadata.format_version = format_version;
            self.changes
                .push(TableUpdate::UpgradeFormatVersion { format_version });
        }

        Ok(self)
    }

    /// Set properties. If a property already exists, it will be overwritten.
    ///
    /// # Errors
    /// - If properties contains a reserved property
    pub fn set_properties(mut self, properties: HashMap<String, String>) -> Result<Self> {
        // List of specified properties that are RESERVED and should not be persisted.
        let reserved_properties = properties
            .keys()
            .filter(|key| TableProperties::RESERVED_PROPERTIES.contains(&key.as_str()))
            .map(ToString::to_string)
            .collect::<Vec<_>>();

        if !reserved_properties.is_empty() {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!(
                    "Table properties should not contain reserved properties, but got: [{}]",
                    reserved_properties.join(", ")
                ),
            ));
        }

        if properties.is_empty() {
            return Ok(self);
        }

        self.metadata.properties.extend(properties.clone());
        self.changes.push(TableUpdate::SetProperties {
            updates: properties,
        });

        Ok(self)
    }

    /// Remove properties from the table metadata.
    /// Does nothing if the key is not present.
    ///
    /// # Errors
    /// - If properties to remove contains a reserved property
    pub fn remove_properties(mut self, properties: &[String]) -> Result<Self> {
        // remove duplicates
        let properties = properties.iter().cloned().collect::<HashSet<_>>();

        let reserved_properties = properties
            .iter()
            .filter(|key| TableProperties::RESERVED_PROPERTIES.contains(&key.as_str()))
            .map(ToString::to_string)
            .collect::<Vec<_>>();

        if !reserved_properties.is_empty() {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!(
                    "Table properties to remove contain reserved properties: [{}]",
                    reserved_properties.join(", ")
                ),
            ));
        }

        for property in &properties {
            self.metadata.properties.remove(property);
        }

        if !properties.is_empty() {
            let mut removals: Vec<String> = properties.into_iter().collect();
            removals.sort();
            self.changes.push(TableUpdate::RemoveProperties { removals });
        }

        Ok(self)
    }

    /// Set the location of the table, stripping any trailing slashes.
    pub fn set_location(mut self, location: String) -> Self {
        let location = location.trim_end_matches('/').to_string();
        if self.metadata.location != location {
            self.changes.push(TableUpdate::SetLocation {
                location: location.clone(),
            });
            self.metadata.location = location;
        }

        self
    }

    /// Add a snapshot to the table metadata.
    ///
    /// # Errors
    /// - Snapshot id already exists.
    /// - For format version > 1: the sequence number of the snapshot is lower than the highest sequence number specified so far.
    pub fn add_snapshot(mut self, snapshot: Snapshot) -> Result<Self> {
        if self
            .metadata
            .snapshots
            .contains_key(&snapshot.snapshot_id())
        {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!("Snapshot already exists for: '{}'", snapshot.snapshot_id()),
            ));
        }

        if self.metadata.format_version != FormatVersion::V1
            && snapshot.sequence_number() <= self.metadata.last_sequence_number
            && snapshot.parent_snapshot_id().is_some()
        {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!(
                    "Cannot add snapshot with sequence number {} older than last sequence number {}",
                    snapshot.sequence_number(),
                    self.metadata.last_sequence_number
                ),
            ));
        }

        if let Some(last) = self.metadata.snapshot_log.last() {
            // commits can happen concurrently from different machines.
            // A tolerance helps us avoid failure for small clock skew
            if snapshot.timestamp_ms() - last.timestamp_ms < -ONE_MINUTE_MS {
                return Err(Error::new(
                    ErrorKind::DataInvalid,
                    format!(
                        "Invalid snapshot timestamp {}: before last snapshot timestamp {}",
                        snapshot.timestamp_ms(),
                        last.timestamp_ms
                    ),
                ));
            }
        }

        // Mutation happens in next line - must be infallible from here
        self.changes.push(TableUpdate::AddSnapshot {
            snapshot: snapshot.clone(),
        });

        self.last_updated_ms = Some(snapshot.timestamp_ms());
        self.metadata.last_sequence_number = self
            .metadata
            .last_sequence_number
            .max(snapshot.sequence_number());
        self.metadata
            .snapshots
            .insert(snapshot.snapshot_id(), snapshot.into());

        Ok(self)
    }

    /// Set a reference to a snapshot.
    ///
    /// # Errors
    /// - The snapshot id is unknown.
    pub fn set_ref(mut self, ref_name: &str, reference: SnapshotReference) -> Result<Self> {
        if self
            .metadata
            .refs
            .get(ref_name)
            .is_some_and(|snap_ref| snap_ref.eq(&reference))
        {
            return Ok(self);
        }

        let Some(snapshot) = self.metadata.snapshots.get(&reference.snapshot_id) else {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!(
                    "Cannot set '{ref_name}' to unknown snapshot: '{}'",
                    reference.snapshot_id
                ),
            ));
        };

        // Update last_updated_ms to the exact timestamp of the snapshot if it was added in this commit
        let is_added_snapshot = self.changes.iter().any(|update| {
            matches!(update, TableUpdate::AddSnapshot { snapshot: snap } if snap.snapshot_id() == snapshot.snapshot_id())
        });
        if is_added_snapshot {
            self.last_updated_ms = Some(snapshot.timestamp_ms());
        }

        // Current snapshot id is set only for the main branch
        if ref_name == MAIN_BRANCH {
            self.metadata.current_snapshot_id = Some(snapshot.snapshot_id());
            let timestamp_ms = if let Some(last_updated_ms) = self.last_updated_ms {
                last_updated_ms
            } else {
                let last_updated_ms = chrono::Utc::now().timestamp_millis();
                self.last_updated_ms = Some(last_updated_ms);
                last_updated_ms
            };

            self.metadata.snapshot_log.push(SnapshotLog {
                snapshot_id: snapshot.snapshot_id(),
                timestamp_ms,
            });
        }

        self.changes.push(TableUpdate::SetSnapshotRef {
            ref_name: ref_name.to_string(),
            reference: reference.clone(),
        });
        self.metadata.refs.insert(ref_name.to_string(), reference);

        Ok(self)
    }

    /// Add a schema to the table metadata.
    ///
    /// A schema identical to a known one reuses that schema's id. Otherwise
    /// the schema receives the next free id. `last_column_id` is never lowered.
    pub fn add_schema(mut self, schema: Schema) -> Result<Self> {
        let new_schema_id = self.reuse_or_create_new_schema_id(&schema);
        let schema_found = self.metadata.schemas.contains_key(&new_schema_id);

        if schema_found {
            if self.last_added_schema_id != Some(new_schema_id) {
                self.changes.push(TableUpdate::AddSchema {
                    schema: schema.with_schema_id(new_schema_id),
                });
                self.last_added_schema_id = Some(new_schema_id);
            }

            return Ok(self);
        }

        // New schemas might contain only old columns. In this case last_column_id should not be
        // reduced.
        self.metadata.last_column_id =
            std::cmp::max(self.metadata.last_column_id, schema.highest_field_id());

        let schema = match new_schema_id == schema.schema_id() {
            true => schema,
            false => schema.with_schema_id(new_schema_id),
        };

        self.metadata
            .schemas
            .insert(new_schema_id, schema.clone().into());

        self.changes.push(TableUpdate::AddSchema { schema });

        self.last_added_schema_id = Some(new_schema_id);

        Ok(self)
    }

    /// Set the current schema id.
    ///
    /// If `schema_id` is -1, the last added schema is set as the current schema.
    ///
    /// Errors:
    /// - provided `schema_id` is -1 but no schema has been added via `add_schema`.
    /// - No schema with the provided `schema_id` exists.
    pub fn set_current_schema(mut self, mut schema_id: i32) -> Result<Self> {
        if schema_id == Self::LAST_ADDED {
            schema_id = self.last_added_schema_id.ok_or_else(|| {
                Error::new(
                    ErrorKind::DataInvalid,
                    "Cannot set current schema to last added schema: no schema has been added.",
                )
            })?;
        };
        let schema_id = schema_id; // Make immutable

        if schema_id == self.metadata.current_schema_id {
            return Ok(self);
        }

        if !self.metadata.schemas.contains_key(&schema_id) {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!("Cannot set current schema to unknown schema with id: '{schema_id}'"),
            ));
        }

        self.metadata.current_schema_id = schema_id;

        if self.last_added_schema_id == Some(schema_id) {
            self.changes.push(TableUpdate::SetCurrentSchema {
                schema_id: Self::LAST_ADDED,
            });
        } else {
            self.changes
                .push(TableUpdate::SetCurrentSchema { schema_id });
        }

        Ok(self)
    }

    /// Add a schema and set it as the current schema.
    pub fn add_current_schema(self, schema: Schema) -> Result<Self> {
        self.add_schema(schema)?
            .set_current_schema(Self::LAST_ADDED)
    }

    /// Build the table metadata.
    pub fn build(mut self) -> Result<TableMetadataBuildResult> {
        self.metadata.last_updated_ms = self
            .last_updated_ms
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

        self.get_current_schema()?;

        if let Some(hist_entry) = self.previous_history_entry.take() {
            self.metadata.metadata_log.push(hist_entry);
        }
        self.expire_metadata_log();
        self.metadata.validate()?;

        Ok(TableMetadataBuildResult {
            metadata: self.metadata,
            changes: self.changes,
        })
    }

    fn expire_metadata_log(&mut self) {
        let max_size = self
            .metadata
            .properties
            .get(TableProperties::PROPERTY_METADATA_PREVIOUS_VERSIONS_MAX)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(TableProperties::PROPERTY_METADATA_PREVIOUS_VERSIONS_MAX_DEFAULT)
            .max(1);

        if self.metadata.metadata_log.len() > max_size {
            let expired = self.metadata.metadata_log.len() - max_size;
            self.metadata.metadata_log.drain(0..expired);
        }
    }

    fn reuse_or_create_new_schema_id(&self, new_schema: &Schema) -> i32 {
        self.metadata
            .schemas
            .iter()
            .find_map(|(id, schema)| new_schema.is_same_schema(schema).then_some(*id))
            .unwrap_or_else(|| self.get_highest_schema_id() + 1)
    }

    fn get_highest_schema_id(&self) -> i32 {
        *self
            .metadata
            .schemas
            .keys()
            .max()
            .unwrap_or(&self.metadata.current_schema_id)
    }

    fn get_current_schema(&self) -> Result<&SchemaRef> {
        self.metadata
            .schemas
            .get(&self.metadata.current_schema_id)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::DataInvalid,
                    format!(
                        "Current schema with id '{}' not found in table metadata.",
                        self.metadata.current_schema_id
                    ),
                )
            })
    }
}

impl From<TableMetadataBuildResult> for TableMetadata {
    fn from(result: TableMetadataBuildResult) -> Self {
        result.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{NestedField, Operation, PrimitiveType, SnapshotRetention, Summary};

    const TEST_LOCATION: &str = "memory:///warehouse/db/t";

    fn schema() -> Schema {
        Schema::builder()
            .with_fields(vec![
                NestedField::required(1, "x", PrimitiveType::Long).into(),
                NestedField::optional(2, "y", PrimitiveType::String).into(),
            ])
            .build()
            .unwrap()
    }

    fn builder_without_changes(format_version: FormatVersion) -> TableMetadataBuilder {
        TableMetadataBuilder::new(
            schema(),
            PartitionSpec::unpartition_spec(),
            TEST_LOCATION.to_string(),
            format_version,
            HashMap::new(),
        )
        .unwrap()
        .build()
        .unwrap()
        .metadata
        .into_builder(Some("memory:///warehouse/db/t/metadata/00000-a.metadata.json".to_string()))
    }

    fn snapshot(id: i64, parent: Option<i64>, sequence_number: i64) -> Snapshot {
        Snapshot::builder()
            .with_snapshot_id(id)
            .with_parent_snapshot_id(parent)
            .with_sequence_number(sequence_number)
            .with_timestamp_ms(chrono::Utc::now().timestamp_millis())
            .with_manifest_list(format!("{TEST_LOCATION}/metadata/snap-{id}.json"))
            .with_summary(Summary::new(Operation::Append))
            .with_schema_id(0)
            .build()
    }

    #[test]
    fn test_minimal_build() {
        let metadata = builder_without_changes(FormatVersion::V2)
            .build()
            .unwrap()
            .metadata;
        assert_eq!(metadata.location(), TEST_LOCATION);
        assert_eq!(metadata.current_schema_id(), 0);
        assert_eq!(metadata.last_column_id(), 2);
        assert_eq!(metadata.last_sequence_number(), 0);
        assert!(metadata.current_snapshot().is_none());
        assert!(metadata.default_partition_spec().is_unpartitioned());
        assert_eq!(metadata.metadata_log().len(), 1);
    }

    #[test]
    fn test_new_metadata_changes() {
        let changes = TableMetadataBuilder::new(
            schema(),
            PartitionSpec::unpartition_spec(),
            format!("{TEST_LOCATION}/"),
            FormatVersion::V2,
            HashMap::from([("owner".to_string(), "rust".to_string())]),
        )
        .unwrap()
        .build()
        .unwrap()
        .changes;

        assert_eq!(changes, vec![
            TableUpdate::SetLocation {
                location: TEST_LOCATION.to_string()
            },
            TableUpdate::AddSchema { schema: schema() },
            TableUpdate::SetCurrentSchema { schema_id: -1 },
            TableUpdate::SetProperties {
                updates: HashMap::from([("owner".to_string(), "rust".to_string())])
            },
        ]);
    }

    #[test]
    fn test_add_compatible_schema_reuses_id() {
        let builder = builder_without_changes(FormatVersion::V2);
        let added = schema()
            .into_builder()
            .with_fields(vec![
                NestedField::optional(3, "z", PrimitiveType::Double).into(),
            ])
            .build()
            .unwrap();
        let metadata = builder
            .add_current_schema(added.clone())
            .unwrap()
            .build()
            .unwrap()
            .metadata;
        assert_eq!(metadata.current_schema_id(), 1);
        assert_eq!(metadata.last_column_id(), 3);

        // Switching back to the first schema does not create a new one.
        let result = metadata
            .into_builder(None)
            .add_current_schema(schema())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(result.metadata.current_schema_id(), 0);
        assert_eq!(result.metadata.last_column_id(), 3);
        assert_eq!(result.changes, vec![
            TableUpdate::AddSchema { schema: schema() },
            TableUpdate::SetCurrentSchema { schema_id: -1 },
        ]);
    }

    #[test]
    fn test_set_ref() {
        let builder = builder_without_changes(FormatVersion::V2);
        let snapshot = snapshot(1, None, 1);
        let timestamp = snapshot.timestamp_ms();
        let metadata = builder
            .add_snapshot(snapshot)
            .unwrap()
            .set_ref(
                MAIN_BRANCH,
                SnapshotReference::new(1, SnapshotRetention::branch(None, None, None)),
            )
            .unwrap()
            .build()
            .unwrap()
            .metadata;

        assert_eq!(metadata.current_snapshot_id(), Some(1));
        assert_eq!(metadata.last_sequence_number(), 1);
        assert_eq!(metadata.last_updated_ms(), timestamp);
        assert_eq!(metadata.history(), &[SnapshotLog {
            snapshot_id: 1,
            timestamp_ms: timestamp
        }]);
    }

    #[test]
    fn test_set_ref_to_unknown_snapshot_fails() {
        let err = builder_without_changes(FormatVersion::V2)
            .set_ref(
                MAIN_BRANCH,
                SnapshotReference::new(9, SnapshotRetention::branch(None, None, None)),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);
    }

    #[test]
    fn test_cannot_add_duplicate_snapshot_id() {
        let builder = builder_without_changes(FormatVersion::V2)
            .add_snapshot(snapshot(1, None, 1))
            .unwrap();
        let err = builder.add_snapshot(snapshot(1, None, 2)).unwrap_err();
        assert!(err.message().contains("Snapshot already exists for: '1'"));
    }

    #[test]
    fn test_v2_sequence_number_cannot_decrease() {
        let builder = builder_without_changes(FormatVersion::V2)
            .add_snapshot(snapshot(1, None, 1))
            .unwrap();
        let err = builder.add_snapshot(snapshot(2, Some(1), 1)).unwrap_err();
        assert!(
            err.message()
                .contains("older than last sequence number 1")
        );
    }

    #[test]
    fn test_downgrade_fails() {
        let err = builder_without_changes(FormatVersion::V2)
            .upgrade_format_version(FormatVersion::V1)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);

        let result = builder_without_changes(FormatVersion::V1)
            .upgrade_format_version(FormatVersion::V2)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(result.metadata.format_version(), FormatVersion::V2);
        assert_eq!(result.changes, vec![TableUpdate::UpgradeFormatVersion {
            format_version: FormatVersion::V2
        }]);
    }

    #[test]
    fn test_reserved_properties_rejected() {
        let err = builder_without_changes(FormatVersion::V2)
            .set_properties(HashMap::from([(
                "format-version".to_string(),
                "2".to_string(),
            )]))
            .unwrap_err();
        assert!(err.message().contains("reserved properties"));

        let err = builder_without_changes(FormatVersion::V2)
            .remove_properties(&["format-version".to_string()])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);
    }

    #[test]
    fn test_from_table_creation_reads_format_version() {
        let creation = TableCreation::builder()
            .name("t".to_string())
            .location(TEST_LOCATION.to_string())
            .schema(schema())
            .properties(HashMap::from([(
                "format-version".to_string(),
                "1".to_string(),
            )]))
            .build();
        let metadata = TableMetadataBuilder::from_table_creation(creation)
            .unwrap()
            .build()
            .unwrap()
            .metadata;
        assert_eq!(metadata.format_version(), FormatVersion::V1);
        assert!(!metadata.properties().contains_key("format-version"));
    }

    #[test]
    fn test_partitioned_table_rejected() {
        let creation = TableCreation::builder()
            .name("t".to_string())
            .location(TEST_LOCATION.to_string())
            .schema(schema())
            .partition_spec(
                serde_json::from_value::<PartitionSpec>(serde_json::json!({
                    "spec-id": 0,
                    "fields": [{"source-id": 1, "field-id": 1000, "name": "x_bucket", "transform": "bucket[4]"}]
                }))
                .unwrap(),
            )
            .build();
        let err = TableMetadataBuilder::from_table_creation(creation).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FeatureUnsupported);
    }

    #[test]
    fn test_expire_metadata_log() {
        let mut metadata = builder_without_changes(FormatVersion::V2)
            .set_properties(HashMap::from([(
                TableProperties::PROPERTY_METADATA_PREVIOUS_VERSIONS_MAX.to_string(),
                "2".to_string(),
            )]))
            .unwrap()
            .build()
            .unwrap()
            .metadata;
        for v in 1..4 {
            metadata = metadata
                .into_builder(Some(format!("{TEST_LOCATION}/metadata/{v:05}-a.metadata.json")))
                .build()
                .unwrap()
                .metadata;
        }
        let files: Vec<_> = metadata
            .metadata_log()
            .iter()
            .map(|l| l.metadata_file.as_str())
            .collect();
        assert_eq!(files, vec![
            "memory:///warehouse/db/t/metadata/00002-a.metadata.json",
            "memory:///warehouse/db/t/metadata/00003-a.metadata.json",
        ]);
    }
}
