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

//! Manifests and the data files they track.
//!
//! Manifests are stored as JSON documents. Each lists data files together
//! with their status relative to the snapshot that wrote the manifest.

use std::cmp::min;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use derive_builder::Builder;
use serde_derive::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use super::{FormatVersion, ManifestContentType, ManifestFile, UNASSIGNED_SEQUENCE_NUMBER};
use crate::error::Result;
use crate::io::OutputFile;
use crate::{Error, ErrorKind};

/// Sequence number assigned to everything written to a V1 table.
pub const INITIAL_SEQUENCE_NUMBER: i64 = 0;

/// A manifest is an immutable file that lists data files along with each
/// file's metrics and tracking information.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Manifest {
    format_version: FormatVersion,
    schema_id: i32,
    partition_spec_id: i32,
    content: ManifestContentType,
    entries: Vec<ManifestEntryRef>,
}

impl Manifest {
    /// Parse a manifest from bytes.
    pub fn parse(bs: &[u8]) -> Result<Self> {
        serde_json::from_slice(bs).map_err(|e| {
            Error::new(ErrorKind::DataInvalid, "Failed to parse manifest").with_source(e)
        })
    }

    /// Entries slice.
    pub fn entries(&self) -> &[ManifestEntryRef] {
        &self.entries
    }

    /// Consume this Manifest, returning its entries.
    pub fn into_entries(self) -> Vec<ManifestEntryRef> {
        self.entries
    }

    /// Id of the schema the manifest was written with.
    pub fn schema_id(&self) -> i32 {
        self.schema_id
    }

    pub(crate) fn inherit_data(&mut self, manifest_file: &ManifestFile) {
        for entry in &mut self.entries {
            Arc::make_mut(entry).inherit_data(manifest_file);
        }
    }
}

/// Builds one manifest for a snapshot, counting entries by status.
pub struct ManifestWriter {
    output: OutputFile,

    snapshot_id: i64,
    format_version: FormatVersion,
    schema_id: i32,
    partition_spec_id: i32,

    entries: Vec<ManifestEntryRef>,

    added_files: u32,
    added_rows: u64,
    existing_files: u32,
    existing_rows: u64,
    deleted_files: u32,
    deleted_rows: u64,

    min_seq_num: Option<i64>,
}

impl ManifestWriter {
    /// Create a new manifest writer.
    pub fn new(
        output: OutputFile,
        snapshot_id: i64,
        format_version: FormatVersion,
        schema_id: i32,
        partition_spec_id: i32,
    ) -> Self {
        Self {
            output,
            snapshot_id,
            format_version,
            schema_id,
            partition_spec_id,
            entries: vec![],
            added_files: 0,
            added_rows: 0,
            existing_files: 0,
            existing_rows: 0,
            deleted_files: 0,
            deleted_rows: 0,
            min_seq_num: None,
        }
    }

    /// Add a new data file. Its sequence numbers are inherited from the
    /// manifest list entry once the snapshot is committed.
    pub fn add_file(&mut self, data_file: DataFile) {
        self.added_files += 1;
        self.added_rows += data_file.record_count;
        self.entries.push(Arc::new(
            ManifestEntry::builder()
                .status(ManifestStatus::Added)
                .snapshot_id(self.snapshot_id)
                .data_file(data_file)
                .build(),
        ));
    }

    /// Carry a live entry of an earlier snapshot into this manifest.
    pub fn add_existing_entry(&mut self, entry: &ManifestEntry) -> Result<()> {
        let (sequence_number, file_sequence_number) = entry.require_sequence_numbers()?;
        self.existing_files += 1;
        self.existing_rows += entry.data_file.record_count;
        self.track_sequence_number(sequence_number);
        self.entries.push(Arc::new(ManifestEntry {
            status: ManifestStatus::Existing,
            snapshot_id: entry.snapshot_id,
            sequence_number: Some(sequence_number),
            file_sequence_number: Some(file_sequence_number),
            data_file: entry.data_file.clone(),
        }));
        Ok(())
    }

    /// Mark a live entry of an earlier snapshot as deleted by this snapshot.
    pub fn add_delete_entry(&mut self, entry: &ManifestEntry) -> Result<()> {
        let (sequence_number, file_sequence_number) = entry.require_sequence_numbers()?;
        self.deleted_files += 1;
        self.deleted_rows += entry.data_file.record_count;
        self.entries.push(Arc::new(
            ManifestEntry::builder()
                .status(ManifestStatus::Deleted)
                .snapshot_id(self.snapshot_id)
                .sequence_number(sequence_number)
                .file_sequence_number(file_sequence_number)
                .data_file(entry.data_file.clone())
                .build(),
        ));
        Ok(())
    }

    fn track_sequence_number(&mut self, seq_num: i64) {
        self.min_seq_num = Some(self.min_seq_num.map_or(seq_num, |v| min(v, seq_num)));
    }

    /// Number of entries added so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry was added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the manifest and return its manifest list entry.
    pub async fn write_manifest_file(self) -> Result<ManifestFile> {
        let manifest = Manifest {
            format_version: self.format_version,
            schema_id: self.schema_id,
            partition_spec_id: self.partition_spec_id,
            content: ManifestContentType::Data,
            entries: self.entries,
        };
        let content = serde_json::to_vec(&manifest)?;
        let length = content.len();
        self.output.write(Bytes::from(content)).await?;

        Ok(ManifestFile {
            manifest_path: self.output.location().to_string(),
            manifest_length: length as i64,
            partition_spec_id: self.partition_spec_id,
            content: ManifestContentType::Data,
            // Replaced with the commit's sequence number by `ManifestListWriter`.
            sequence_number: UNASSIGNED_SEQUENCE_NUMBER,
            min_sequence_number: self.min_seq_num.unwrap_or(UNASSIGNED_SEQUENCE_NUMBER),
            added_snapshot_id: self.snapshot_id,
            added_files_count: Some(self.added_files),
            existing_files_count: Some(self.existing_files),
            deleted_files_count: Some(self.deleted_files),
            added_rows_count: Some(self.added_rows),
            existing_rows_count: Some(self.existing_rows),
            deleted_rows_count: Some(self.deleted_rows),
        })
    }
}

/// Reference to [`ManifestEntry`].
pub type ManifestEntryRef = Arc<ManifestEntry>;

/// A manifest entry tracks one data file and its status.
#[derive(Debug, PartialEq, Eq, Clone, TypedBuilder, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ManifestEntry {
    /// Used to track additions and deletions.
    status: ManifestStatus,
    /// Snapshot id where the file was added, or deleted if status is 2.
    /// Inherited when null.
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    snapshot_id: Option<i64>,
    /// Data sequence number of the file.
    /// Inherited when null and status is 1 (added).
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    sequence_number: Option<i64>,
    /// File sequence number indicating when the file was added.
    /// Inherited when null and status is 1 (added).
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    file_sequence_number: Option<i64>,
    /// File path, metrics, …
    data_file: DataFile,
}

impl ManifestEntry {
    /// Check if this manifest entry is deleted.
    pub fn is_alive(&self) -> bool {
        matches!(
            self.status,
            ManifestStatus::Added | ManifestStatus::Existing
        )
    }

    /// Status of this manifest entry
    pub fn status(&self) -> ManifestStatus {
        self.status
    }

    /// Content type of this manifest entry.
    #[inline]
    pub fn content_type(&self) -> DataContentType {
        self.data_file.content
    }

    /// Data file path of this manifest entry.
    #[inline]
    pub fn file_path(&self) -> &str {
        &self.data_file.file_path
    }

    /// Snapshot id
    #[inline]
    pub fn snapshot_id(&self) -> Option<i64> {
        self.snapshot_id
    }

    /// Data sequence number.
    #[inline]
    pub fn sequence_number(&self) -> Option<i64> {
        self.sequence_number
    }

    /// File sequence number.
    #[inline]
    pub fn file_sequence_number(&self) -> Option<i64> {
        self.file_sequence_number
    }

    /// File size in bytes.
    #[inline]
    pub fn file_size_in_bytes(&self) -> u64 {
        self.data_file.file_size_in_bytes
    }

    /// get a reference to the actual data file
    #[inline]
    pub fn data_file(&self) -> &DataFile {
        &self.data_file
    }

    /// Inherit data from manifest list, such as snapshot id, sequence number.
    pub(crate) fn inherit_data(&mut self, snapshot_entry: &ManifestFile) {
        if self.snapshot_id.is_none() {
            self.snapshot_id = Some(snapshot_entry.added_snapshot_id);
        }

        if self.sequence_number.is_none()
            && (self.status == ManifestStatus::Added
                || snapshot_entry.sequence_number == INITIAL_SEQUENCE_NUMBER)
        {
            self.sequence_number = Some(snapshot_entry.sequence_number);
        }

        if self.file_sequence_number.is_none()
            && (self.status == ManifestStatus::Added
                || snapshot_entry.sequence_number == INITIAL_SEQUENCE_NUMBER)
        {
            self.file_sequence_number = Some(snapshot_entry.sequence_number);
        }
    }

    fn require_sequence_numbers(&self) -> Result<(i64, i64)> {
        match (self.sequence_number, self.file_sequence_number) {
            (Some(seq), Some(file_seq)) => Ok((seq, file_seq)),
            _ => Err(Error::new(
                ErrorKind::DataInvalid,
                format!(
                    "Manifest entry for {} has no sequence number, it must be loaded through its manifest list",
                    self.data_file.file_path
                ),
            )),
        }
    }
}

/// Used to track additions and deletions in ManifestEntry.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum ManifestStatus {
    /// Value: 0
    Existing = 0,
    /// Value: 1
    Added = 1,
    /// Value: 2
    ///
    /// Deletes are informational only and not used in scans.
    Deleted = 2,
}

impl From<ManifestStatus> for i32 {
    fn from(v: ManifestStatus) -> i32 {
        v as i32
    }
}

impl TryFrom<i32> for ManifestStatus {
    type Error = Error;

    fn try_from(v: i32) -> Result<ManifestStatus> {
        match v {
            0 => Ok(ManifestStatus::Existing),
            1 => Ok(ManifestStatus::Added),
            2 => Ok(ManifestStatus::Deleted),
            _ => Err(Error::new(
                ErrorKind::DataInvalid,
                format!("manifest status {v} is invalid"),
            )),
        }
    }
}

/// Data file carries data file path, metrics, …
#[derive(Debug, PartialEq, Clone, Eq, Builder, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DataFile {
    /// Type of content stored by the data file: data, equality deletes,
    /// or position deletes (all v1 files are data files)
    #[builder(default = "DataContentType::Data")]
    pub(crate) content: DataContentType,
    /// Full URI for the file with FS scheme
    pub(crate) file_path: String,
    /// String file format name, avro, orc or parquet
    #[builder(default = "DataFileFormat::Parquet")]
    pub(crate) file_format: DataFileFormat,
    /// Number of records in this file
    pub(crate) record_count: u64,
    /// Total file size in bytes
    pub(crate) file_size_in_bytes: u64,
    /// Map from column id to the total size on disk of all regions that
    /// store the column. Does not include bytes necessary to read other
    /// columns, like footers.
    #[builder(default)]
    #[serde(default)]
    pub(crate) column_sizes: HashMap<i32, u64>,
    /// Map from column id to number of values in the column (including null
    /// and NaN values)
    #[builder(default)]
    #[serde(default)]
    pub(crate) value_counts: HashMap<i32, u64>,
    /// Map from column id to number of null values in the column
    #[builder(default)]
    #[serde(default)]
    pub(crate) null_value_counts: HashMap<i32, u64>,
    /// Split offsets for the data file. For example, all row group offsets
    /// in a Parquet file. Must be sorted ascending
    #[builder(default)]
    #[serde(default)]
    pub(crate) split_offsets: Vec<i64>,
}

impl DataFile {
    /// Get the content type of the data file (data, equality deletes, or position deletes)
    pub fn content_type(&self) -> DataContentType {
        self.content
    }
    /// Get the file path as full URI with FS scheme
    pub fn file_path(&self) -> &str {
        &self.file_path
    }
    /// Get the file format of the file (avro, orc or parquet).
    pub fn file_format(&self) -> DataFileFormat {
        self.file_format
    }
    /// Get the record count in the data file.
    pub fn record_count(&self) -> u64 {
        self.record_count
    }
    /// Get the file size in bytes.
    pub fn file_size_in_bytes(&self) -> u64 {
        self.file_size_in_bytes
    }
    /// Get the column sizes.
    pub fn column_sizes(&self) -> &HashMap<i32, u64> {
        &self.column_sizes
    }
    /// Get the columns value counts for the data file.
    pub fn value_counts(&self) -> &HashMap<i32, u64> {
        &self.value_counts
    }
    /// Get the null value counts of the data file.
    pub fn null_value_counts(&self) -> &HashMap<i32, u64> {
        &self.null_value_counts
    }
    /// Get the split offsets of the data file.
    pub fn split_offsets(&self) -> &[i64] {
        &self.split_offsets
    }
}

/// Type of content stored by the data file: data, equality deletes, or
/// position deletes (all v1 files are data files)
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(into = "i32", try_from = "i32")]
pub enum DataContentType {
    /// value: 0
    #[default]
    Data = 0,
    /// value: 1
    PositionDeletes = 1,
    /// value: 2
    EqualityDeletes = 2,
}

impl From<DataContentType> for i32 {
    fn from(v: DataContentType) -> i32 {
        v as i32
    }
}

impl TryFrom<i32> for DataContentType {
    type Error = Error;

    fn try_from(v: i32) -> Result<DataContentType> {
        match v {
            0 => Ok(DataContentType::Data),
            1 => Ok(DataContentType::PositionDeletes),
            2 => Ok(DataContentType::EqualityDeletes),
            _ => Err(Error::new(
                ErrorKind::DataInvalid,
                format!("data content type {v} is invalid"),
            )),
        }
    }
}

/// Format of this data.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataFileFormat {
    /// Avro file format: <https://avro.apache.org/>
    Avro,
    /// Orc file format: <https://orc.apache.org/>
    Orc,
    /// Parquet file format: <https://parquet.apache.org/>
    Parquet,
}

impl fmt::Display for DataFileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFileFormat::Avro => write!(f, "avro"),
            DataFileFormat::Orc => write!(f, "orc"),
            DataFileFormat::Parquet => write!(f, "parquet"),
        }
    }
}

/// A data file of `records` rows, 100 bytes per row.
#[cfg(test)]
pub(crate) fn test_data_file(path: &str, records: u64) -> DataFile {
    DataFileBuilder::default()
        .file_path(path.to_string())
        .record_count(records)
        .file_size_in_bytes(records * 100)
        .build()
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::FileIO;

    fn committed_manifest_file(mut manifest_file: ManifestFile, seq: i64) -> ManifestFile {
        manifest_file.sequence_number = seq;
        manifest_file
    }

    #[tokio::test]
    async fn test_write_and_load_manifest() {
        let file_io = FileIO::from_path("memory:///").unwrap().build().unwrap();
        let output = file_io.new_output("memory:///t/metadata/m0.json").unwrap();

        let mut writer = ManifestWriter::new(output, 42, FormatVersion::V2, 0, 0);
        writer.add_file(test_data_file("memory:///t/data/a.parquet", 3));
        writer.add_file(test_data_file("memory:///t/data/b.parquet", 5));
        let manifest_file = writer.write_manifest_file().await.unwrap();

        assert_eq!(manifest_file.added_files_count, Some(2));
        assert_eq!(manifest_file.added_rows_count, Some(8));
        assert_eq!(manifest_file.deleted_files_count, Some(0));
        assert_eq!(manifest_file.sequence_number, UNASSIGNED_SEQUENCE_NUMBER);

        let manifest_file = committed_manifest_file(manifest_file, 7);
        let manifest = manifest_file.load_manifest(&file_io).await.unwrap();
        assert_eq!(manifest.entries().len(), 2);
        for entry in manifest.entries() {
            assert_eq!(entry.status(), ManifestStatus::Added);
            assert_eq!(entry.snapshot_id(), Some(42));
            assert_eq!(entry.sequence_number(), Some(7));
            assert_eq!(entry.file_sequence_number(), Some(7));
        }
    }

    #[tokio::test]
    async fn test_delete_and_existing_entries_keep_sequence_numbers() {
        let file_io = FileIO::from_path("memory:///").unwrap().build().unwrap();
        let live = ManifestEntry::builder()
            .status(ManifestStatus::Added)
            .snapshot_id(1)
            .sequence_number(1)
            .file_sequence_number(1)
            .data_file(test_data_file("memory:///t/data/a.parquet", 3))
            .build();

        let mut writer = ManifestWriter::new(
            file_io.new_output("memory:///t/metadata/m1.json").unwrap(),
            2,
            FormatVersion::V2,
            0,
            0,
        );
        writer.add_delete_entry(&live).unwrap();
        writer.add_existing_entry(&live).unwrap();
        let manifest_file = writer.write_manifest_file().await.unwrap();
        assert_eq!(manifest_file.deleted_files_count, Some(1));
        assert_eq!(manifest_file.deleted_rows_count, Some(3));
        assert_eq!(manifest_file.existing_files_count, Some(1));
        assert_eq!(manifest_file.min_sequence_number, 1);

        let manifest = committed_manifest_file(manifest_file, 2)
            .load_manifest(&file_io)
            .await
            .unwrap();
        let deleted = &manifest.entries()[0];
        assert_eq!(deleted.status(), ManifestStatus::Deleted);
        assert_eq!(deleted.snapshot_id(), Some(2));
        assert_eq!(deleted.sequence_number(), Some(1));
        let existing = &manifest.entries()[1];
        assert_eq!(existing.status(), ManifestStatus::Existing);
        assert_eq!(existing.snapshot_id(), Some(1));
    }

    #[test]
    fn test_unloaded_entry_cannot_be_carried() {
        let entry = ManifestEntry::builder()
            .status(ManifestStatus::Added)
            .data_file(test_data_file("a.parquet", 1))
            .build();
        let err = entry.require_sequence_numbers().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);
    }

    #[test]
    fn test_data_file_serde() {
        let mut data_file = test_data_file("memory:///t/data/a.parquet", 3);
        data_file.null_value_counts.insert(1, 1);
        let json = serde_json::to_value(&data_file).unwrap();
        assert_eq!(json["content"], 0);
        assert_eq!(json["file-format"], "PARQUET");
        assert_eq!(json["null-value-counts"]["1"], 1);
        assert_eq!(serde_json::from_value::<DataFile>(json).unwrap(), data_file);
    }
}
