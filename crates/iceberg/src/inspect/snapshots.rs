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

use std::collections::HashMap;
use std::sync::Arc;

use arrow_array::builder::{MapBuilder, MapFieldNames, PrimitiveBuilder, StringBuilder};
use arrow_array::types::{Int64Type, TimestampMicrosecondType};
use arrow_array::{Array, RecordBatch};
use arrow_schema::{Field, Schema as ArrowSchema, SchemaRef as ArrowSchemaRef};
use futures::{StreamExt, stream};
use parquet::arrow::PARQUET_FIELD_ID_META_KEY;

use crate::Result;
use crate::arrow::{UTC_TIME_ZONE, field_to_arrow_field};
use crate::scan::ArrowRecordBatchStream;
use crate::spec::{NestedField, PrimitiveType};
use crate::table::Table;

const SUMMARY_FIELD_ID: i32 = 6;

/// Snapshots table, one row per snapshot in commit order.
///
/// # Schema
///
/// | Column | Type | Description |
/// |--------|------|-------------|
/// | `committed_at` | `TimestampTz` | Commit time of the snapshot (UTC) |
/// | `snapshot_id` | `Long` | The snapshot ID |
/// | `parent_id` | `Long` (nullable) | Parent snapshot ID |
/// | `operation` | `String` | `append`, `overwrite`, `delete` or `replace` |
/// | `manifest_list` | `String` | Location of the manifest list |
/// | `summary` | `Map<String, String>` | Snapshot summary |
///
/// Summary entries keep the order the committer wrote them in.
pub struct SnapshotsTable<'a> {
    table: &'a Table,
}

impl<'a> SnapshotsTable<'a> {
    /// Create a new Snapshots table instance.
    pub fn new(table: &'a Table) -> Self {
        Self { table }
    }

    /// Returns the Arrow schema of the snapshots table.
    pub fn schema(&self) -> Result<ArrowSchemaRef> {
        let mut fields = [
            NestedField::required(1, "committed_at", PrimitiveType::Timestamptz),
            NestedField::required(2, "snapshot_id", PrimitiveType::Long),
            NestedField::optional(3, "parent_id", PrimitiveType::Long),
            NestedField::optional(4, "operation", PrimitiveType::String),
            NestedField::optional(5, "manifest_list", PrimitiveType::String),
        ]
        .iter()
        .map(field_to_arrow_field)
        .collect::<Result<Vec<_>>>()?;
        fields.push(summary_field());
        Ok(Arc::new(ArrowSchema::new(fields)))
    }

    /// Scans the snapshots table and returns Arrow record batches.
    pub async fn scan(&self) -> Result<ArrowRecordBatchStream> {
        let schema = self.schema()?;
        let metadata = self.table.metadata();

        let mut committed_at =
            PrimitiveBuilder::<TimestampMicrosecondType>::new().with_timezone(UTC_TIME_ZONE);
        let mut snapshot_id = PrimitiveBuilder::<Int64Type>::new();
        let mut parent_id = PrimitiveBuilder::<Int64Type>::new();
        let mut operation = StringBuilder::new();
        let mut manifest_list = StringBuilder::new();
        let mut summary = summary_builder();

        for snapshot in metadata.snapshots_in_commit_order() {
            committed_at.append_value(snapshot.timestamp_ms() * 1000);
            snapshot_id.append_value(snapshot.snapshot_id());
            parent_id.append_option(snapshot.parent_snapshot_id());
            operation.append_value(snapshot.summary().operation.as_str());
            manifest_list.append_value(snapshot.manifest_list());

            for (key, value) in snapshot.summary().iter() {
                summary.keys().append_value(key);
                summary.values().append_value(value);
            }
            summary.append(true)?;
        }

        let batch = RecordBatch::try_new(schema, vec![
            Arc::new(committed_at.finish()),
            Arc::new(snapshot_id.finish()),
            Arc::new(parent_id.finish()),
            Arc::new(operation.finish()),
            Arc::new(manifest_list.finish()),
            Arc::new(summary.finish()),
        ])?;

        Ok(stream::iter(vec![Ok(batch)]).boxed())
    }
}

fn summary_builder() -> MapBuilder<StringBuilder, StringBuilder> {
    let names = MapFieldNames {
        entry: "key_value".to_string(),
        key: "key".to_string(),
        value: "value".to_string(),
    };
    MapBuilder::new(Some(names), StringBuilder::new(), StringBuilder::new())
}

fn summary_field() -> Field {
    let data_type = summary_builder().finish().data_type().clone();
    Field::new("summary", data_type, false).with_metadata(HashMap::from([(
        PARQUET_FIELD_ID_META_KEY.to_string(),
        SUMMARY_FIELD_ID.to_string(),
    )]))
}
