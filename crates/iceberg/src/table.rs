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

//! Table API for Apache Iceberg

use std::collections::HashMap;

use arrow_array::RecordBatch;

use crate::inspect::MetadataTable;
use crate::io::FileIO;
use crate::scan::TableScanBuilder;
use crate::spec::{SchemaRef, SnapshotRef, TableMetadata, TableMetadataRef};
use crate::transaction::{ApplyTransactionAction, Transaction};
use crate::writer::write_data_files;
use crate::{Catalog, Error, ErrorKind, Result, TableIdent};

/// Builder to create a [`Table`].
pub struct TableBuilder {
    file_io: Option<FileIO>,
    metadata_location: Option<String>,
    metadata: Option<TableMetadataRef>,
    identifier: Option<TableIdent>,
}

impl TableBuilder {
    pub(crate) fn new() -> Self {
        Self {
            file_io: None,
            metadata_location: None,
            metadata: None,
            identifier: None,
        }
    }

    /// required - sets the necessary FileIO to use for the table
    pub fn file_io(mut self, file_io: FileIO) -> Self {
        self.file_io = Some(file_io);
        self
    }

    /// optional - sets the tables metadata location
    pub fn metadata_location<T: Into<String>>(mut self, metadata_location: T) -> Self {
        self.metadata_location = Some(metadata_location.into());
        self
    }

    /// required - passes in the TableMetadata to use for the Table
    pub fn metadata<T: Into<TableMetadataRef>>(mut self, metadata: T) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    /// required - passes in the TableIdent to use for the Table
    pub fn identifier(mut self, identifier: TableIdent) -> Self {
        self.identifier = Some(identifier);
        self
    }

    /// build the Table
    pub fn build(self) -> Result<Table> {
        let Self {
            file_io,
            metadata_location,
            metadata,
            identifier,
        } = self;

        let Some(file_io) = file_io else {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                "FileIO must be provided with TableBuilder.file_io()",
            ));
        };

        let Some(metadata) = metadata else {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                "TableMetadataRef must be provided with TableBuilder.metadata()",
            ));
        };

        let Some(identifier) = identifier else {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                "TableIdent must be provided with TableBuilder.identifier()",
            ));
        };

        Ok(Table {
            file_io,
            metadata_location,
            metadata,
            identifier,
        })
    }
}

/// Table represents a table in the catalog.
///
/// A `Table` is an immutable view of one metadata version. Writes go through
/// a [`Transaction`] and return the `Table` of the version they committed.
#[derive(Debug, Clone)]
pub struct Table {
    file_io: FileIO,
    metadata_location: Option<String>,
    metadata: TableMetadataRef,
    identifier: TableIdent,
}

impl Table {
    /// Sets the [`Table`] metadata and returns an updated instance with the new metadata applied.
    pub(crate) fn with_metadata(mut self, metadata: TableMetadataRef) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns a TableBuilder to build a table
    pub fn builder() -> TableBuilder {
        TableBuilder::new()
    }

    /// Returns table identifier.
    pub fn identifier(&self) -> &TableIdent {
        &self.identifier
    }
    /// Returns current metadata.
    pub fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    /// Returns current metadata ref.
    pub fn metadata_ref(&self) -> TableMetadataRef {
        self.metadata.clone()
    }

    /// Returns current metadata location.
    pub fn metadata_location(&self) -> Option<&str> {
        self.metadata_location.as_deref()
    }

    /// Returns file io used in this table.
    pub fn file_io(&self) -> &FileIO {
        &self.file_io
    }

    /// Returns the current schema.
    pub fn current_schema(&self) -> &SchemaRef {
        self.metadata.current_schema()
    }

    /// Returns the snapshot `main` points at, if any.
    pub fn current_snapshot(&self) -> Option<&SnapshotRef> {
        self.metadata.current_snapshot()
    }

    /// Returns all table properties.
    pub fn properties(&self) -> &HashMap<String, String> {
        self.metadata.properties()
    }

    /// Returns a specific property value.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.metadata.properties().get(key).map(|s| s.as_str())
    }

    /// Creates a table scan.
    pub fn scan(&self) -> TableScanBuilder<'_> {
        TableScanBuilder::new(self)
    }

    /// Creates a metadata table which provides table-like APIs for inspecting metadata.
    /// See [`MetadataTable`] for more details.
    pub fn inspect(&self) -> MetadataTable<'_> {
        MetadataTable::new(self)
    }

    /// Writes `batches` and commits them as a new `append` snapshot.
    ///
    /// Zero rows still commit a snapshot, with no files.
    pub async fn append(&self, catalog: &dyn Catalog, batches: &[RecordBatch]) -> Result<Table> {
        let data_files = write_data_files(&self.file_io, &self.metadata, batches).await?;
        let tx = Transaction::new(self);
        let tx = tx.fast_append().add_data_files(data_files).apply(tx)?;
        tx.commit(catalog).await
    }

    /// Replaces every live data file of the table with `batches`.
    pub async fn overwrite(
        &self,
        catalog: &dyn Catalog,
        batches: &[RecordBatch],
    ) -> Result<Table> {
        let data_files = write_data_files(&self.file_io, &self.metadata, batches).await?;
        let tx = Transaction::new(self);
        let tx = tx.overwrite().add_data_files(data_files).apply(tx)?;
        tx.commit(catalog).await
    }
}
