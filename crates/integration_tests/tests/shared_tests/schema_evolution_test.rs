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

//! Evolving the schema and appending data in one transaction.

use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::types::Int32Type;
use arrow_array::{Array, ArrayRef, Int32Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema as ArrowSchema};
use iceberg_commit::arrow::arrow_schema_to_schema;
use iceberg_commit::spec::{NestedField, PrimitiveType, Schema};
use iceberg_commit::transaction::{ApplyTransactionAction, Transaction};
use iceberg_commit::writer::write_data_files;
use iceberg_commit_integration_tests::{props, set_test_fixture};

use super::{collect, num_rows};

fn foo_schema() -> Schema {
    Schema::builder()
        .with_fields([Arc::new(NestedField::optional(
            1,
            "foo",
            PrimitiveType::String,
        ))])
        .build()
        .unwrap()
}

fn foo_bar_batch() -> RecordBatch {
    RecordBatch::try_new(
        Arc::new(ArrowSchema::new(vec![
            Field::new("foo", DataType::Utf8, true),
            Field::new("bar", DataType::Int32, true),
        ])),
        vec![
            Arc::new(StringArray::from(vec![Some("a"), None, Some("c")])) as ArrayRef,
            Arc::new(Int32Array::from(vec![Some(1), Some(2), None])) as ArrayRef,
        ],
    )
    .unwrap()
}

#[tokio::test]
async fn test_evolve_schema_and_append_in_one_transaction() {
    let fixture = set_test_fixture().await;
    for format_version in ["1", "2"] {
        let table = fixture
            .create_table_with_schema(
                &format!("evolve_and_append_v{format_version}"),
                foo_schema(),
                props([("format-version", format_version)]),
                &[],
            )
            .await;

        let batch = foo_bar_batch();
        let new_schema = arrow_schema_to_schema(batch.schema().as_ref()).unwrap();

        let tx = Transaction::new(&table);
        let tx = tx
            .update_schema()
            .union_by_name(new_schema)
            .apply(tx)
            .unwrap();

        // Files are written against the evolved schema before the commit.
        let staged = tx.stage().await.unwrap();
        let data_files = write_data_files(table.file_io(), staged.metadata(), &[batch])
            .await
            .unwrap();
        assert_eq!(data_files.len(), 1);

        let tx = tx
            .fast_append()
            .add_data_files(data_files)
            .apply(tx)
            .unwrap();
        let table = tx.commit(&fixture.catalog).await.unwrap();

        let schema = table.metadata().current_schema();
        let names: Vec<_> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["foo", "bar"]);
        assert_eq!(table.metadata().snapshots().count(), 1);

        let scan = table.scan().build().unwrap();
        let batches = collect(scan.to_arrow().await.unwrap()).await;
        assert_eq!(num_rows(&batches), 3);
        let bar = batches[0]
            .column_by_name("bar")
            .unwrap()
            .as_primitive::<Int32Type>();
        assert_eq!(bar.value(0), 1);
        assert_eq!(bar.value(1), 2);
        assert!(bar.is_null(2));
    }
}

#[tokio::test]
async fn test_old_files_read_with_null_for_new_column() {
    let fixture = set_test_fixture().await;
    let table = fixture
        .create_table_with_schema("evolve_after_append", foo_schema(), props([]), &[])
        .await;

    let foo_only = RecordBatch::try_new(
        Arc::new(ArrowSchema::new(vec![Field::new("foo", DataType::Utf8, true)])),
        vec![Arc::new(StringArray::from(vec!["x", "y"])) as ArrayRef],
    )
    .unwrap();
    let table = table.append(&fixture.catalog, &[foo_only]).await.unwrap();

    let batch = foo_bar_batch();
    let tx = Transaction::new(&table);
    let tx = tx
        .update_schema()
        .union_by_name(arrow_schema_to_schema(batch.schema().as_ref()).unwrap())
        .apply(tx)
        .unwrap();
    let table = tx.commit(&fixture.catalog).await.unwrap();
    let table = table.append(&fixture.catalog, &[batch]).await.unwrap();

    let scan = table.scan().build().unwrap();
    let batches = collect(scan.to_arrow().await.unwrap()).await;
    assert_eq!(num_rows(&batches), 5);
    let bar_nulls: usize = batches
        .iter()
        .map(|b| b.column_by_name("bar").unwrap().null_count())
        .sum();
    // Two rows from the old file plus one null in the new batch.
    assert_eq!(bar_nulls, 3);
}
