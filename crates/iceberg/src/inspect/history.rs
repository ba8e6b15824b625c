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

use arrow_array::RecordBatch;
use arrow_array::builder::{BooleanBuilder, PrimitiveBuilder};
use arrow_array::types::{Int64Type, TimestampMicrosecondType};
use arrow_schema::SchemaRef as ArrowSchemaRef;
use futures::{StreamExt, stream};

use crate::Result;
use crate::arrow::{UTC_TIME_ZONE, schema_to_arrow_schema};
use crate::scan::ArrowRecordBatchStream;
use crate::spec::snapshot_util::is_ancestor_of;
use crate::spec::{NestedField, PrimitiveType, Schema};
use crate::table::Table;

/// History table showing snapshot lineage and rollback detection.
///
/// This table tracks when each snapshot became the current snapshot,
/// enabling detection of rollbacks (snapshots that are no longer ancestors
/// of the current state).
///
/// # Schema
///
/// | Column | Type | Description |
/// |--------|------|-------------|
/// | `made_current_at` | `TimestampTz` | When the snapshot became current (UTC) |
/// | `snapshot_id` | `Long` | The snapshot ID |
/// | `parent_id` | `Long` (nullable) | Parent snapshot ID |
/// | `is_current_ancestor` | `Boolean` | Whether this is an ancestor of current snapshot |
pub struct HistoryTable<'a> {
    table: &'a Table,
}

impl<'a> HistoryTable<'a> {
    /// Create a new History table instance.
    pub fn new(table: &'a Table) -> Self {
        Self { table }
    }

    /// Returns the Arrow schema of the history table.
    pub fn schema(&self) -> Result<ArrowSchemaRef> {
        let schema = Schema::builder()
            .with_fields(
                [
                    NestedField::required(1, "made_current_at", PrimitiveType::Timestamptz),
                    NestedField::required(2, "snapshot_id", PrimitiveType::Long),
                    NestedField::optional(3, "parent_id", PrimitiveType::Long),
                    NestedField::required(4, "is_current_ancestor", PrimitiveType::Boolean),
                ]
                .map(Arc::new),
            )
            .build()?;
        Ok(Arc::new(schema_to_arrow_schema(&schema)?))
    }

    /// Scans the history table and returns Arrow record batches.
    pub async fn scan(&self) -> Result<ArrowRecordBatchStream> {
        let schema = self.schema()?;
        let metadata = self.table.metadata();

        let current_snapshot_id = metadata.current_snapshot_id();

        let mut made_current_at =
            PrimitiveBuilder::<TimestampMicrosecondType>::new().with_timezone(UTC_TIME_ZONE);
        let mut snapshot_id = PrimitiveBuilder::<Int64Type>::new();
        let mut parent_id = PrimitiveBuilder::<Int64Type>::new();
        let mut is_current_ancestor = BooleanBuilder::new();

        for entry in metadata.history() {
            made_current_at.append_value(entry.timestamp_ms * 1000);
            snapshot_id.append_value(entry.snapshot_id);
            parent_id.append_option(
                metadata
                    .snapshot_by_id(entry.snapshot_id)
                    .and_then(|s| s.parent_snapshot_id()),
            );
            is_current_ancestor.append_value(
                current_snapshot_id
                    .is_some_and(|current| is_ancestor_of(metadata, current, entry.snapshot_id)),
            );
        }

        let batch = RecordBatch::try_new(schema, vec![
            Arc::new(made_current_at.finish()),
            Arc::new(snapshot_id.finish()),
            Arc::new(parent_id.finish()),
            Arc::new(is_current_ancestor.finish()),
        ])?;

        Ok(stream::iter(vec![Ok(batch)]).boxed())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use arrow_array::Array;
    use arrow_array::cast::AsArray;
    use futures::TryStreamExt;

    use super::*;
    use crate::inspect::tests::{batch, create_table};

    #[tokio::test]
    async fn test_history_table() {
        let (catalog, table) = create_table(HashMap::new()).await;
        let table = table.append(&catalog, &[batch(2)]).await.unwrap();
        let table = table.append(&catalog, &[batch(1)]).await.unwrap();

        let batches: Vec<_> = table
            .inspect()
            .history()
            .scan()
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let batch = &batches[0];
        assert_eq!(batch.num_rows(), 2);

        let snapshot_ids = batch.column(1).as_primitive::<Int64Type>();
        let parent_ids = batch.column(2).as_primitive::<Int64Type>();
        assert!(parent_ids.is_null(0));
        assert_eq!(parent_ids.value(1), snapshot_ids.value(0));
        assert_eq!(
            snapshot_ids.value(1),
            table.current_snapshot().unwrap().snapshot_id()
        );

        let is_current_ancestor = batch.column(3).as_boolean();
        assert!(is_current_ancestor.value(0));
        assert!(is_current_ancestor.value(1));
    }
}
