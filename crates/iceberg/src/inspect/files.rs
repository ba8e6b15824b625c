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
use arrow_array::builder::{PrimitiveBuilder, StringBuilder};
use arrow_array::types::{Int32Type, Int64Type};
use arrow_schema::SchemaRef as ArrowSchemaRef;
use futures::{StreamExt, stream};

use crate::Result;
use crate::arrow::schema_to_arrow_schema;
use crate::scan::ArrowRecordBatchStream;
use crate::spec::{ManifestContentType, NestedField, PrimitiveType, Schema};
use crate::table::Table;

/// Files table, listing the live data files of the current snapshot.
///
/// # Schema
///
/// | Column | Type | Description |
/// |--------|------|-------------|
/// | `content` | `Int` | 0 data, 1 position deletes, 2 equality deletes |
/// | `file_path` | `String` | Location of the file |
/// | `file_format` | `String` | `parquet` for files this crate writes |
/// | `record_count` | `Long` | Rows in the file |
/// | `file_size_in_bytes` | `Long` | Size of the file |
pub struct FilesTable<'a> {
    table: &'a Table,
}

impl<'a> FilesTable<'a> {
    /// Create a new Files table instance.
    pub fn new(table: &'a Table) -> Self {
        Self { table }
    }

    /// Returns the Arrow schema of the files table.
    pub fn schema(&self) -> Result<ArrowSchemaRef> {
        let schema = Schema::builder()
            .with_fields(
                [
                    NestedField::required(134, "content", PrimitiveType::Int),
                    NestedField::required(100, "file_path", PrimitiveType::String),
                    NestedField::required(101, "file_format", PrimitiveType::String),
                    NestedField::required(103, "record_count", PrimitiveType::Long),
                    NestedField::required(104, "file_size_in_bytes", PrimitiveType::Long),
                ]
                .map(Arc::new),
            )
            .build()?;
        Ok(Arc::new(schema_to_arrow_schema(&schema)?))
    }

    /// Scans the files table and returns Arrow record batches.
    pub async fn scan(&self) -> Result<ArrowRecordBatchStream> {
        let schema = self.schema()?;
        let file_io = self.table.file_io();

        let mut content = PrimitiveBuilder::<Int32Type>::new();
        let mut file_path = StringBuilder::new();
        let mut file_format = StringBuilder::new();
        let mut record_count = PrimitiveBuilder::<Int64Type>::new();
        let mut file_size_in_bytes = PrimitiveBuilder::<Int64Type>::new();

        if let Some(snapshot) = self.table.metadata().current_snapshot() {
            let manifest_list = snapshot.load_manifest_list(file_io).await?;
            for manifest_file in manifest_list.entries() {
                if manifest_file.content != ManifestContentType::Data {
                    continue;
                }
                let manifest = manifest_file.load_manifest(file_io).await?;
                for entry in manifest.entries().iter().filter(|e| e.is_alive()) {
                    let data_file = entry.data_file();
                    content.append_value(data_file.content_type() as i32);
                    file_path.append_value(data_file.file_path());
                    file_format.append_value(data_file.file_format().to_string());
                    record_count.append_value(data_file.record_count() as i64);
                    file_size_in_bytes.append_value(data_file.file_size_in_bytes() as i64);
                }
            }
        }

        let batch = RecordBatch::try_new(schema, vec![
            Arc::new(content.finish()),
            Arc::new(file_path.finish()),
            Arc::new(file_format.finish()),
            Arc::new(record_count.finish()),
            Arc::new(file_size_in_bytes.finish()),
        ])?;

        Ok(stream::iter(vec![Ok(batch)]).boxed())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use arrow_array::cast::AsArray;
    use futures::TryStreamExt;

    use super::*;
    use crate::inspect::tests::{batch, create_table};

    #[tokio::test]
    async fn test_files_table_tracks_live_files() {
        let (catalog, table) = create_table(HashMap::new()).await;
        let table = table.append(&catalog, &[batch(3)]).await.unwrap();
        let table = table.append(&catalog, &[batch(2)]).await.unwrap();

        let batches: Vec<_> = table
            .inspect()
            .files()
            .scan()
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let files = &batches[0];
        assert_eq!(files.num_rows(), 2);
        let formats = files.column(2).as_string::<i32>();
        assert!(formats.iter().all(|f| f == Some("parquet")));
        let mut records = files
            .column(3)
            .as_primitive::<Int64Type>()
            .values()
            .to_vec();
        records.sort();
        assert_eq!(records, vec![2, 3]);

        let table = table.overwrite(&catalog, &[batch(4)]).await.unwrap();
        let batches: Vec<_> = table
            .inspect()
            .files()
            .scan()
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let files = &batches[0];
        assert_eq!(files.num_rows(), 1);
        assert_eq!(files.column(3).as_primitive::<Int64Type>().value(0), 4);
        let path = files.column(1).as_string::<i32>().value(0);
        assert!(table.file_io().exists(path).await.unwrap());
    }
}
