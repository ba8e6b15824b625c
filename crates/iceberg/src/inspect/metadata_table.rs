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

use super::{
    AllManifestsTable, FilesTable, HistoryTable, ManifestsTable, PropertiesTable, SnapshotsTable,
};
use crate::table::Table;

/// Metadata table is used to inspect a table's history, snapshots, and other metadata as a table.
///
/// Every metadata table offers a `scan` returning an
/// [`ArrowRecordBatchStream`](crate::scan::ArrowRecordBatchStream), so its rows
/// can be checked the same way the data of the table is.
#[derive(Debug)]
pub struct MetadataTable<'a>(&'a Table);

/// Metadata table type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter)]
pub enum MetadataTableType {
    /// [`SnapshotsTable`]
    Snapshots,
    /// [`HistoryTable`]
    History,
    /// [`ManifestsTable`]
    Manifests,
    /// [`AllManifestsTable`]
    AllManifests,
    /// [`FilesTable`]
    Files,
    /// [`PropertiesTable`]
    Properties,
}

impl MetadataTableType {
    /// Returns the string representation of the metadata table type.
    pub fn as_str(&self) -> &str {
        match self {
            MetadataTableType::Snapshots => "snapshots",
            MetadataTableType::History => "history",
            MetadataTableType::Manifests => "manifests",
            MetadataTableType::AllManifests => "all_manifests",
            MetadataTableType::Files => "files",
            MetadataTableType::Properties => "properties",
        }
    }

    /// Returns all the metadata table types.
    pub fn all_types() -> impl Iterator<Item = Self> {
        use strum::IntoEnumIterator;
        Self::iter()
    }
}

impl TryFrom<&str> for MetadataTableType {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, String> {
        match value {
            "snapshots" => Ok(Self::Snapshots),
            "history" => Ok(Self::History),
            "manifests" => Ok(Self::Manifests),
            "all_manifests" => Ok(Self::AllManifests),
            "files" => Ok(Self::Files),
            "properties" => Ok(Self::Properties),
            _ => Err(format!("invalid metadata table type: {value}")),
        }
    }
}

impl<'a> MetadataTable<'a> {
    /// Creates a new metadata scan.
    pub fn new(table: &'a Table) -> Self {
        Self(table)
    }

    /// Get the snapshots table.
    pub fn snapshots(&self) -> SnapshotsTable<'_> {
        SnapshotsTable::new(self.0)
    }

    /// Get the history table.
    pub fn history(&self) -> HistoryTable<'_> {
        HistoryTable::new(self.0)
    }

    /// Get the manifests table.
    pub fn manifests(&self) -> ManifestsTable<'_> {
        ManifestsTable::new(self.0)
    }

    /// Get the all manifests table.
    pub fn all_manifests(&self) -> AllManifestsTable<'_> {
        AllManifestsTable::new(self.0)
    }

    /// Get the files table.
    pub fn files(&self) -> FilesTable<'_> {
        FilesTable::new(self.0)
    }

    /// Get the properties table.
    pub fn properties(&self) -> PropertiesTable<'_> {
        PropertiesTable::new(self.0)
    }
}
