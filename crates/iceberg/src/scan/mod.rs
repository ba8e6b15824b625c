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

//! Table scan api.
//!
//! A scan reads the live data files of one snapshot and returns their rows
//! as Arrow record batches in the shape of the current schema. Files written
//! before a schema change are projected by field id: columns they do not
//! have come back as nulls and promoted columns are cast to the wider type.

use std::sync::Arc;

use arrow_array::RecordBatch;
use arrow_schema::{Schema as ArrowSchema, SchemaRef as ArrowSchemaRef};
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt, stream};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::debug;

use crate::arrow::{field_to_arrow_field, project_batch};
use crate::io::FileIO;
use crate::spec::{DataFile, ManifestContentType, SnapshotRef, TableMetadataRef};
use crate::table::Table;
use crate::{Error, ErrorKind, Result};

/// A stream of arrow [`RecordBatch`]es.
pub type ArrowRecordBatchStream = BoxStream<'static, Result<RecordBatch>>;

const DEFAULT_CONCURRENCY_LIMIT: usize = 4;

/// Builder to create table scan.
pub struct TableScanBuilder<'a> {
    table: &'a Table,
    column_names: Option<Vec<String>>,
    snapshot_id: Option<i64>,
    concurrency_limit: usize,
}

impl<'a> TableScanBuilder<'a> {
    pub(crate) fn new(table: &'a Table) -> Self {
        Self {
            table,
            column_names: None,
            snapshot_id: None,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
        }
    }

    /// Select all columns.
    pub fn select_all(mut self) -> Self {
        self.column_names = None;
        self
    }

    /// Select some columns of the table.
    pub fn select(mut self, column_names: impl IntoIterator<Item = impl ToString>) -> Self {
        self.column_names = Some(
            column_names
                .into_iter()
                .map(|item| item.to_string())
                .collect(),
        );
        self
    }

    /// Set the snapshot to scan. When not set, it uses current snapshot.
    pub fn snapshot_id(mut self, snapshot_id: i64) -> Self {
        self.snapshot_id = Some(snapshot_id);
        self
    }

    /// Sets how many data files are read at the same time.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    /// Build the table scan.
    pub fn build(self) -> Result<TableScan> {
        let metadata = self.table.metadata_ref();

        let snapshot = match self.snapshot_id {
            Some(snapshot_id) => Some(
                metadata
                    .snapshot_by_id(snapshot_id)
                    .ok_or_else(|| {
                        Error::new(
                            ErrorKind::DataInvalid,
                            format!("Snapshot with id {snapshot_id} not found"),
                        )
                    })?
                    .clone(),
            ),
            None => metadata.current_snapshot().cloned(),
        };

        let schema = metadata.current_schema();
        let fields = match &self.column_names {
            None => schema.fields().to_vec(),
            Some(column_names) => column_names
                .iter()
                .map(|name| {
                    schema.field_by_name(name).cloned().ok_or_else(|| {
                        Error::new(
                            ErrorKind::DataInvalid,
                            format!("Column {name} not found in table schema"),
                        )
                        .with_context("schema", schema.to_string())
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        };
        let projection = fields
            .iter()
            .map(|f| field_to_arrow_field(f))
            .collect::<Result<Vec<_>>>()?;

        Ok(TableScan {
            file_io: self.table.file_io().clone(),
            metadata,
            snapshot,
            projection: Arc::new(ArrowSchema::new(projection)),
            concurrency_limit: self.concurrency_limit,
        })
    }
}

/// A data file to read, planned by [`TableScan::plan_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileScanTask {
    data_file: DataFile,
}

impl FileScanTask {
    /// The data file to read.
    pub fn data_file(&self) -> &DataFile {
        &self.data_file
    }

    /// Location of the data file.
    pub fn data_file_path(&self) -> &str {
        self.data_file.file_path()
    }
}

/// Table scan.
#[derive(Debug)]
pub struct TableScan {
    file_io: FileIO,
    metadata: TableMetadataRef,
    snapshot: Option<SnapshotRef>,
    projection: ArrowSchemaRef,
    concurrency_limit: usize,
}

impl TableScan {
    /// Returns the snapshot being scanned, `None` for a table without one.
    pub fn snapshot(&self) -> Option<&SnapshotRef> {
        self.snapshot.as_ref()
    }

    /// Returns the Arrow schema of the batches produced by [`Self::to_arrow`].
    pub fn arrow_schema(&self) -> ArrowSchemaRef {
        self.projection.clone()
    }

    /// Lists the live data files of the scanned snapshot.
    pub async fn plan_files(&self) -> Result<Vec<FileScanTask>> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(vec![]);
        };

        let manifest_list = snapshot.load_manifest_list(&self.file_io).await?;
        let mut tasks = vec![];
        for manifest_file in manifest_list.entries() {
            if manifest_file.content != ManifestContentType::Data {
                continue;
            }
            let manifest = manifest_file.load_manifest(&self.file_io).await?;
            tasks.extend(
                manifest
                    .entries()
                    .iter()
                    .filter(|entry| entry.is_alive())
                    .map(|entry| FileScanTask {
                        data_file: entry.data_file().clone(),
                    }),
            );
        }

        debug!(
            location = self.metadata.location(),
            snapshot_id = snapshot.snapshot_id(),
            files = tasks.len(),
            "planned table scan"
        );
        Ok(tasks)
    }

    /// Reads the planned files as a stream of record batches.
    ///
    /// Batches come in file order, then row order within a file.
    pub async fn to_arrow(&self) -> Result<ArrowRecordBatchStream> {
        let tasks = self.plan_files().await?;
        let file_io = self.file_io.clone();
        let projection = self.projection.clone();

        Ok(stream::iter(tasks)
            .map(move |task| read_task(file_io.clone(), task, projection.clone()))
            .buffered(self.concurrency_limit)
            .map_ok(|batches| stream::iter(batches.into_iter().map(Ok::<_, Error>)))
            .try_flatten()
            .boxed())
    }
}

async fn read_task(
    file_io: FileIO,
    task: FileScanTask,
    projection: ArrowSchemaRef,
) -> Result<Vec<RecordBatch>> {
    let content = file_io.new_input(task.data_file_path())?.read().await?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(content)?.build()?;
    reader
        .map(|batch| project_batch(&batch?, &projection))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use arrow_array::{Array, Int32Array, Int64Array, StringArray};
    use arrow_schema::{DataType, Field};
    use arrow_select::concat::concat_batches;

    use super::*;
    use crate::spec::PrimitiveType;
    use crate::transaction::tests::test_schema;
    use crate::transaction::{ApplyTransactionAction, Transaction};
    use crate::{Catalog, MemoryCatalog, NamespaceIdent, TableCreation};

    async fn create_table() -> (MemoryCatalog, Table) {
        let file_io = FileIO::from_path("memory:///").unwrap().build().unwrap();
        let catalog = MemoryCatalog::new(file_io, "memory:///warehouse");
        let namespace = NamespaceIdent::new("ns".to_string());
        catalog
            .create_namespace(&namespace, HashMap::new())
            .await
            .unwrap();
        let table = catalog
            .create_table(
                &namespace,
                TableCreation::builder()
                    .name("t".to_string())
                    .schema(test_schema())
                    .build(),
            )
            .await
            .unwrap();
        (catalog, table)
    }

    fn batch(ids: Vec<i64>, values: Vec<Option<i32>>) -> RecordBatch {
        RecordBatch::try_new(
            Arc::new(ArrowSchema::new(vec![
                Field::new("id", DataType::Int64, false),
                Field::new("value", DataType::Int32, true),
            ])),
            vec![
                Arc::new(Int64Array::from(ids)),
                Arc::new(Int32Array::from(values)),
            ],
        )
        .unwrap()
    }

    async fn read_all(table: &Table) -> RecordBatch {
        let scan = table.scan().build().unwrap();
        let batches: Vec<_> = scan.to_arrow().await.unwrap().try_collect().await.unwrap();
        concat_batches(&scan.arrow_schema(), &batches).unwrap()
    }

    #[tokio::test]
    async fn test_scan_empty_table() {
        let (_catalog, table) = create_table().await;
        let scan = table.scan().build().unwrap();
        assert!(scan.snapshot().is_none());
        assert!(scan.plan_files().await.unwrap().is_empty());
        assert_eq!(read_all(&table).await.num_rows(), 0);
    }

    #[tokio::test]
    async fn test_plan_files_follows_snapshots() {
        let (catalog, table) = create_table().await;
        let table = table
            .append(&catalog, &[batch(vec![1, 2], vec![Some(1), None])])
            .await
            .unwrap();
        let first_snapshot = table.current_snapshot().unwrap().snapshot_id();
        let table = table
            .append(&catalog, &[batch(vec![3], vec![Some(3)])])
            .await
            .unwrap();

        let files = table.scan().build().unwrap().plan_files().await.unwrap();
        assert_eq!(files.len(), 2);

        let files = table
            .scan()
            .snapshot_id(first_snapshot)
            .build()
            .unwrap()
            .plan_files()
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].data_file().record_count(), 2);

        let table = table
            .overwrite(&catalog, &[batch(vec![9], vec![None])])
            .await
            .unwrap();
        let files = table.scan().build().unwrap().plan_files().await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].data_file().record_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_snapshot_and_column() {
        let (_catalog, table) = create_table().await;
        let err = table.scan().snapshot_id(42).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);
        let err = table.scan().select(["nope"]).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);
    }

    #[tokio::test]
    async fn test_read_after_schema_evolution() {
        let (catalog, table) = create_table().await;
        let table = table
            .append(&catalog, &[batch(vec![1, 2], vec![Some(10), None])])
            .await
            .unwrap();

        let tx = Transaction::new(&table);
        let tx = tx
            .update_schema()
            .update_column("value", PrimitiveType::Long)
            .add_column("extra", PrimitiveType::String)
            .apply(tx)
            .unwrap();
        let table = tx.commit(&catalog).await.unwrap();

        let all = read_all(&table).await;
        assert_eq!(all.num_rows(), 2);
        let value = all.column_by_name("value").unwrap();
        assert_eq!(value.data_type(), &DataType::Int64);
        let value = value.as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(value.value(0), 10);
        assert!(value.is_null(1));
        assert_eq!(all.column_by_name("extra").unwrap().null_count(), 2);
        assert_eq!(all.column_by_name("data").unwrap().null_count(), 2);

        let scan = table.scan().select(["extra", "id"]).build().unwrap();
        let batches: Vec<_> = scan.to_arrow().await.unwrap().try_collect().await.unwrap();
        assert_eq!(batches[0].schema().field(0).name(), "extra");
        assert!(batches[0].column(0).as_any().downcast_ref::<StringArray>().is_some());
    }
}
