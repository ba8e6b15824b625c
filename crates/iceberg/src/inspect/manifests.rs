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

use std::sync::Arc;

use arrow_array::builder::{PrimitiveBuilder, StringBuilder};
use arrow_array::types::{Int32Type, Int64Type};
use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::SchemaRef as ArrowSchemaRef;
use futures::{StreamExt, stream};

use crate::Result;
use crate::arrow::schema_to_arrow_schema;
use crate::scan::ArrowRecordBatchStream;
use crate::spec::{ManifestContentType, ManifestFile, NestedField, PrimitiveType, Schema};
use crate::table::Table;

/// Manifests table, listing the manifests of the current snapshot.
///
/// # Schema
///
/// | Column | Type | Description |
/// |--------|------|-------------|
/// | `content` | `Int` | 0 for data manifests, 1 for delete manifests |
/// | `path` | `String` | Location of the manifest |
/// | `length` | `Long` | Size of the manifest in bytes |
/// | `partition_spec_id` | `Int` | Spec the manifest was written with |
/// | `added_snapshot_id` | `Long` | Snapshot that wrote the manifest |
/// | `added_data_files_count` | `Int` | Entries with status ADDED |
/// | `existing_data_files_count` | `Int` | Entries with status EXISTING |
/// | `deleted_data_files_count` | `Int` | Entries with status DELETED |
/// | `added_rows_count` | `Long` | Rows in ADDED entries |
/// | `existing_rows_count` | `Long` | Rows in EXISTING entries |
/// | `deleted_rows_count` | `Long` | Rows in DELETED entries |
pub struct ManifestsTable<'a> {
    table: &'a Table,
}

impl<'a> ManifestsTable<'a> {
    /// Create a new Manifests table instance.
    pub fn new(table: &'a Table) -> Self {
        Self { table }
    }

    /// Returns the Arrow schema of the manifests table.
    pub fn schema(&self) -> Result<ArrowSchemaRef> {
        manifest_schema(false)
    }

    /// Scans the manifests table and returns Arrow record batches.
    pub async fn scan(&self) -> Result<ArrowRecordBatchStream> {
        let schema = self.schema()?;
        let mut rows = ManifestRows::default();

        if let Some(snapshot) = self.table.metadata().current_snapshot() {
            let manifest_list = snapshot.load_manifest_list(self.table.file_io()).await?;
            for manifest_file in manifest_list.entries() {
                rows.append(manifest_file);
            }
        }

        let batch = RecordBatch::try_new(schema, rows.finish())?;
        Ok(stream::iter(vec![Ok(batch)]).boxed())
    }
}

/// All manifests table, listing the manifests of every snapshot.
///
/// Snapshots are visited in commit order. A manifest shared by several
/// snapshots appears once per snapshot, told apart by the extra
/// `reference_snapshot_id` column.
pub struct AllManifestsTable<'a> {
    table: &'a Table,
}

impl<'a> AllManifestsTable<'a> {
    /// Create a new All manifests table instance.
    pub fn new(table: &'a Table) -> Self {
        Self { table }
    }

    /// Returns the Arrow schema of the all manifests table.
    pub fn schema(&self) -> Result<ArrowSchemaRef> {
        manifest_schema(true)
    }

    /// Scans the all manifests table and returns Arrow record batches.
    pub async fn scan(&self) -> Result<ArrowRecordBatchStream> {
        let schema = self.schema()?;
        let mut rows = ManifestRows::default();
        let mut reference_snapshot_id = PrimitiveBuilder::<Int64Type>::new();

        for snapshot in self.table.metadata().snapshots_in_commit_order() {
            let manifest_list = snapshot.load_manifest_list(self.table.file_io()).await?;
            for manifest_file in manifest_list.entries() {
                rows.append(manifest_file);
                reference_snapshot_id.append_value(snapshot.snapshot_id());
            }
        }

        let mut columns = rows.finish();
        columns.push(Arc::new(reference_snapshot_id.finish()));
        let batch = RecordBatch::try_new(schema, columns)?;
        Ok(stream::iter(vec![Ok(batch)]).boxed())
    }
}

fn manifest_schema(with_reference_snapshot: bool) -> Result<ArrowSchemaRef> {
    let mut fields = vec![
        NestedField::required(14, "content", PrimitiveType::Int),
        NestedField::required(1, "path", PrimitiveType::String),
        NestedField::required(2, "length", PrimitiveType::Long),
        NestedField::required(3, "partition_spec_id", PrimitiveType::Int),
        NestedField::required(4, "added_snapshot_id", PrimitiveType::Long),
        NestedField::optional(5, "added_data_files_count", PrimitiveType::Int),
        NestedField::optional(6, "existing_data_files_count", PrimitiveType::Int),
        NestedField::optional(7, "deleted_data_files_count", PrimitiveType::Int),
        NestedField::optional(15, "added_rows_count", PrimitiveType::Long),
        NestedField::optional(16, "existing_rows_count", PrimitiveType::Long),
        NestedField::optional(17, "deleted_rows_count", PrimitiveType::Long),
    ];
    if with_reference_snapshot {
        fields.push(NestedField::required(
            18,
            "reference_snapshot_id",
            PrimitiveType::Long,
        ));
    }
    let schema = Schema::builder()
        .with_fields(fields.into_iter().map(Arc::new))
        .build()?;
    Ok(Arc::new(schema_to_arrow_schema(&schema)?))
}

#[derive(Default)]
struct ManifestRows {
    content: PrimitiveBuilder<Int32Type>,
    path: StringBuilder,
    length: PrimitiveBuilder<Int64Type>,
    partition_spec_id: PrimitiveBuilder<Int32Type>,
    added_snapshot_id: PrimitiveBuilder<Int64Type>,
    added_data_files_count: PrimitiveBuilder<Int32Type>,
    existing_data_files_count: PrimitiveBuilder<Int32Type>,
    deleted_data_files_count: PrimitiveBuilder<Int32Type>,
    added_rows_count: PrimitiveBuilder<Int64Type>,
    existing_rows_count: PrimitiveBuilder<Int64Type>,
    deleted_rows_count: PrimitiveBuilder<Int64Type>,
}

impl ManifestRows {
    fn append(&mut self, manifest: &ManifestFile) {
        self.content.append_value(match manifest.content {
            ManifestContentType::Data => 0,
            ManifestContentType::Deletes => 1,
        });
        self.path.append_value(&manifest.manifest_path);
        self.length.append_value(manifest.manifest_length);
        self.partition_spec_id
            .append_value(manifest.partition_spec_id);
        self.added_snapshot_id
            .append_value(manifest.added_snapshot_id);
        self.added_data_files_count
            .append_option(manifest.added_files_count.map(|c| c as i32));
        self.existing_data_files_count
            .append_option(manifest.existing_files_count.map(|c| c as i32));
        self.deleted_data_files_count
            .append_option(manifest.deleted_files_count.map(|c| c as i32));
        self.added_rows_count
            .append_option(manifest.added_rows_count.map(|c| c as i64));
        self.existing_rows_count
            .append_option(manifest.existing_rows_count.map(|c| c as i64));
        self.deleted_rows_count
            .append_option(manifest.deleted_rows_count.map(|c| c as i64));
    }

    fn finish(mut self) -> Vec<ArrayRef> {
        vec![
            Arc::new(self.content.finish()),
            Arc::new(self.path.finish()),
            Arc::new(self.length.finish()),
            Arc::new(self.partition_spec_id.finish()),
            Arc::new(self.added_snapshot_id.finish()),
            Arc::new(self.added_data_files_count.finish()),
            Arc::new(self.existing_data_files_count.finish()),
            Arc::new(self.deleted_data_files_count.finish()),
            Arc::new(self.added_rows_count.finish()),
            Arc::new(self.existing_rows_count.finish()),
            Arc::new(self.deleted_rows_count.finish()),
        ]
    }
}
