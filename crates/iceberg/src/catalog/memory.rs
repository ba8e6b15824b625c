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

//! In-memory catalog.
//!
//! Namespaces and table pointers live in process memory. Table metadata is
//! still written as versioned JSON files through [`FileIO`], so every commit
//! leaves the same on-storage trail a persistent catalog would.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Catalog, NamespaceIdent, TableCommit, TableCreation, TableIdent};
use crate::io::FileIO;
use crate::spec::{TableMetadata, TableMetadataBuilder};
use crate::table::Table;
use crate::{Error, ErrorKind, Result};

#[derive(Debug, Default)]
struct CatalogState {
    namespaces: HashMap<NamespaceIdent, HashMap<String, String>>,
    /// Table identifier to the location of its current metadata file.
    tables: HashMap<TableIdent, String>,
}

/// Memory catalog implementation.
///
/// The state mutex is held across the whole of `update_table`, so concurrent
/// commits against one table are serialized and at most one of several
/// writers racing on the same base can win.
#[derive(Debug)]
pub struct MemoryCatalog {
    state: Mutex<CatalogState>,
    file_io: FileIO,
    warehouse_location: String,
}

impl MemoryCatalog {
    /// Creates a memory catalog that places new tables under `warehouse_location`.
    pub fn new(file_io: FileIO, warehouse_location: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(CatalogState::default()),
            file_io,
            warehouse_location: warehouse_location.into().trim_end_matches('/').to_string(),
        }
    }

    /// Returns the file io used for metadata and data files.
    pub fn file_io(&self) -> &FileIO {
        &self.file_io
    }

    fn default_table_location(&self, namespace: &NamespaceIdent, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.warehouse_location,
            namespace.join("/"),
            name
        )
    }

    async fn read_metadata(&self, metadata_location: &str) -> Result<TableMetadata> {
        let content = self.file_io.new_input(metadata_location)?.read().await?;
        let metadata = serde_json::from_slice::<TableMetadata>(&content)?;
        Ok(metadata)
    }

    async fn write_metadata(
        &self,
        metadata: &TableMetadata,
        version: i32,
    ) -> Result<String> {
        let metadata_location = format!(
            "{}/metadata/{:05}-{}.metadata.json",
            metadata.location(),
            version,
            Uuid::new_v4()
        );
        self.file_io
            .new_output(&metadata_location)?
            .write(serde_json::to_vec(metadata)?.into())
            .await?;
        debug!(location = %metadata_location, version, "wrote table metadata file");
        Ok(metadata_location)
    }

    fn build_table(
        &self,
        ident: TableIdent,
        metadata: TableMetadata,
        metadata_location: String,
    ) -> Result<Table> {
        Table::builder()
            .identifier(ident)
            .metadata(metadata)
            .metadata_location(metadata_location)
            .file_io(self.file_io.clone())
            .build()
    }
}

/// Parses the version prefix of a metadata file name such as
/// `00003-<uuid>.metadata.json`.
fn parse_metadata_version(metadata_location: &str) -> Result<i32> {
    let file_name = metadata_location
        .rsplit('/')
        .next()
        .unwrap_or(metadata_location);
    let invalid = || {
        Error::new(
            ErrorKind::Unexpected,
            format!("Invalid metadata file location: {metadata_location}"),
        )
    };
    let (version, _) = file_name.split_once('-').ok_or_else(invalid)?;
    version
        .parse::<i32>()
        .map_err(|e| invalid().with_source(e))
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn create_namespace(
        &self,
        namespace: &NamespaceIdent,
        properties: HashMap<String, String>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.namespaces.contains_key(namespace) {
            return Err(Error::new(
                ErrorKind::NamespaceAlreadyExists,
                format!("Namespace {namespace} already exists"),
            ));
        }
        state.namespaces.insert(namespace.clone(), properties);
        info!(namespace = %namespace, "created namespace");
        Ok(())
    }

    async fn namespace_exists(&self, namespace: &NamespaceIdent) -> Result<bool> {
        Ok(self.state.lock().await.namespaces.contains_key(namespace))
    }

    async fn create_table(
        &self,
        namespace: &NamespaceIdent,
        mut creation: TableCreation,
    ) -> Result<Table> {
        let mut state = self.state.lock().await;
        if !state.namespaces.contains_key(namespace) {
            return Err(Error::new(
                ErrorKind::NamespaceNotFound,
                format!("No such namespace: {namespace}"),
            ));
        }

        let ident = TableIdent::new(namespace.clone(), creation.name.clone());
        if state.tables.contains_key(&ident) {
            return Err(Error::new(
                ErrorKind::TableAlreadyExists,
                format!("Table {ident} already exists"),
            ));
        }

        if creation.location.is_none() {
            creation.location = Some(self.default_table_location(namespace, &creation.name));
        }

        let metadata = TableMetadataBuilder::from_table_creation(creation)?
            .build()?
            .metadata;
        let metadata_location = self.write_metadata(&metadata, 0).await?;

        state.tables.insert(ident.clone(), metadata_location.clone());
        info!(
            table = %ident,
            format_version = %metadata.format_version(),
            location = metadata.location(),
            "created table"
        );

        self.build_table(ident, metadata, metadata_location)
    }

    async fn load_table(&self, table: &TableIdent) -> Result<Table> {
        let metadata_location = {
            let state = self.state.lock().await;
            state.tables.get(table).cloned().ok_or_else(|| {
                Error::new(ErrorKind::TableNotFound, format!("No such table: {table}"))
            })?
        };

        let metadata = self.read_metadata(&metadata_location).await?;
        self.build_table(table.clone(), metadata, metadata_location)
    }

    async fn table_exists(&self, table: &TableIdent) -> Result<bool> {
        Ok(self.state.lock().await.tables.contains_key(table))
    }

    async fn drop_table(&self, table: &TableIdent) -> Result<()> {
        let mut state = self.state.lock().await;
        state.tables.remove(table).ok_or_else(|| {
            Error::new(ErrorKind::TableNotFound, format!("No such table: {table}"))
        })?;
        info!(table = %table, "dropped table");
        Ok(())
    }

    async fn update_table(&self, commit: TableCommit) -> Result<Table> {
        let mut state = self.state.lock().await;
        let ident = commit.identifier().clone();
        let current_location = state.tables.get(&ident).cloned().ok_or_else(|| {
            Error::new(ErrorKind::TableNotFound, format!("No such table: {ident}"))
        })?;

        let current = self.read_metadata(&current_location).await?;
        let updated = commit.apply(current, Some(current_location.clone()))?;

        let next_version = parse_metadata_version(&current_location)? + 1;
        let metadata_location = self.write_metadata(&updated, next_version).await?;

        state.tables.insert(ident.clone(), metadata_location.clone());
        info!(
            table = %ident,
            previous = %current_location,
            current = %metadata_location,
            snapshot_id = ?updated.current_snapshot_id(),
            "swapped table metadata pointer"
        );

        self.build_table(ident, updated, metadata_location)
    }
}
