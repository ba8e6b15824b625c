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

//! Writes read back through a table scan and the metadata tables.

use std::collections::HashMap;
use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::types::{Int32Type, Int64Type};
use arrow_array::{Array, ArrayRef, LargeBinaryArray, RecordBatch};
use arrow_schema::{DataType, Field, Schema as ArrowSchema, TimeUnit};
use iceberg_commit::{Catalog, ErrorKind};
use iceberg_commit::spec::{FormatVersion, TableProperties};
use iceberg_commit::table::Table;
use iceberg_commit::transaction::{ApplyTransactionAction, Transaction};
use iceberg_commit::writer::batch_weight;
use iceberg_commit_integration_tests::{
    arrow_schema, arrow_table_with_null, arrow_table_with_only_nulls, arrow_table_without_data,
    props, set_test_fixture,
};

use super::{collect, collect_one, num_rows};

fn format_props(format_version: u8) -> HashMap<String, String> {
    let format_version = format_version.to_string();
    props([("format-version", format_version.as_str())])
}

/// Null and non-null counts of every column of the table.
async fn null_counts(table: &Table) -> Vec<(String, usize, usize)> {
    let scan = table.scan().build().unwrap();
    let batches = collect(scan.to_arrow().await.unwrap()).await;
    scan.arrow_schema()
        .fields()
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            let nulls: usize = batches.iter().map(|b| b.column(idx).null_count()).sum();
            (field.name().clone(), nulls, num_rows(&batches) - nulls)
        })
        .collect()
}

async fn data_files_count(table: &Table) -> usize {
    collect_one(table.inspect().files().scan().await.unwrap())
        .await
        .num_rows()
}

#[tokio::test]
async fn test_query_filter_null() {
    let fixture = set_test_fixture().await;
    for format_version in [1, 2] {
        let table = fixture
            .create_table(
                &format!("arrow_table_v{format_version}_with_null"),
                format_props(format_version),
                &[vec![arrow_table_with_null()]],
            )
            .await;
        assert_eq!(
            table.metadata().format_version(),
            if format_version == 1 {
                FormatVersion::V1
            } else {
                FormatVersion::V2
            }
        );

        let counts = null_counts(&table).await;
        assert_eq!(counts.len(), 12);
        for (column, nulls, values) in counts {
            assert_eq!((nulls, values), (1, 2), "column {column}");
        }
    }
}

#[tokio::test]
async fn test_query_filter_without_data() {
    let fixture = set_test_fixture().await;
    for format_version in [1, 2] {
        let table = fixture
            .create_table(
                &format!("arrow_table_v{format_version}_without_data"),
                format_props(format_version),
                &[vec![arrow_table_without_data()]],
            )
            .await;
        for (column, nulls, values) in null_counts(&table).await {
            assert_eq!((nulls, values), (0, 0), "column {column}");
        }
        assert_eq!(data_files_count(&table).await, 0);
    }
}

#[tokio::test]
async fn test_query_filter_only_nulls() {
    let fixture = set_test_fixture().await;
    for format_version in [1, 2] {
        let table = fixture
            .create_table(
                &format!("arrow_table_v{format_version}_with_only_nulls"),
                format_props(format_version),
                &[vec![arrow_table_with_only_nulls()]],
            )
            .await;
        for (column, nulls, values) in null_counts(&table).await {
            assert_eq!((nulls, values), (2, 0), "column {column}");
        }
    }
}

#[tokio::test]
async fn test_query_filter_appended_null() {
    let fixture = set_test_fixture().await;
    for format_version in [1, 2] {
        let table = fixture
            .create_table(
                &format!("arrow_table_v{format_version}_appended_with_null"),
                format_props(format_version),
                &[vec![arrow_table_with_null()], vec![arrow_table_with_null()]],
            )
            .await;
        for (column, nulls, values) in null_counts(&table).await {
            assert_eq!((nulls, values), (2, 4), "column {column}");
        }
    }
}

#[tokio::test]
async fn test_query_filter_v1_v2_append_null() {
    let fixture = set_test_fixture().await;
    let table = fixture
        .create_table(
            "arrow_table_v1_v2_appended_with_null",
            format_props(1),
            &[vec![arrow_table_with_null()]],
        )
        .await;
    assert_eq!(table.metadata().format_version(), FormatVersion::V1);

    let tx = Transaction::new(&table);
    let tx = tx
        .upgrade_table_version()
        .set_format_version(FormatVersion::V2)
        .apply(tx)
        .unwrap();
    let table = tx.commit(&fixture.catalog).await.unwrap();
    let table = table
        .append(&fixture.catalog, &[arrow_table_with_null()])
        .await
        .unwrap();

    assert_eq!(table.metadata().format_version(), FormatVersion::V2);
    for (column, nulls, values) in null_counts(&table).await {
        assert_eq!((nulls, values), (2, 4), "column {column}");
    }
}

#[tokio::test]
async fn test_data_files() {
    let fixture = set_test_fixture().await;
    let table = fixture
        .create_table("arrow_data_files", format_props(1), &[])
        .await;

    let table = table
        .overwrite(&fixture.catalog, &[arrow_table_with_null()])
        .await
        .unwrap();
    // Marks the first file as deleted.
    let table = table
        .overwrite(&fixture.catalog, &[arrow_table_with_null()])
        .await
        .unwrap();
    // Adds a new manifest next to the live one of the previous snapshot.
    let table = table
        .append(&fixture.catalog, &[arrow_table_with_null()])
        .await
        .unwrap();

    let rows = collect_one(table.inspect().all_manifests().scan().await.unwrap()).await;
    let column = |name: &str| {
        rows.column_by_name(name)
            .unwrap()
            .as_primitive::<Int32Type>()
            .values()
            .to_vec()
    };
    assert_eq!(column("added_data_files_count"), vec![1, 1, 0, 1, 1]);
    assert_eq!(column("existing_data_files_count"), vec![0, 0, 0, 0, 0]);
    assert_eq!(column("deleted_data_files_count"), vec![0, 0, 1, 0, 0]);
}

#[tokio::test]
async fn test_writes_match_latest_snapshot() {
    let fixture = set_test_fixture().await;
    let mut table = fixture
        .create_table("writes_with_snapshot_reads", format_props(1), &[])
        .await;

    async fn latest_snapshot_id(table: &Table) -> i64 {
        let snapshots = collect_one(table.inspect().snapshots().scan().await.unwrap()).await;
        let ids = snapshots.column(1).as_primitive::<Int64Type>();
        ids.value(ids.len() - 1)
    }

    for overwrite in [true, true, false] {
        let batches = [arrow_table_with_null()];
        table = if overwrite {
            table.overwrite(&fixture.catalog, &batches).await.unwrap()
        } else {
            table.append(&fixture.catalog, &batches).await.unwrap()
        };

        let reloaded = fixture.catalog.load_table(table.identifier()).await.unwrap();
        let current = reloaded.current_snapshot().unwrap().snapshot_id();
        assert_eq!(current, table.current_snapshot().unwrap().snapshot_id());
        assert_eq!(current, latest_snapshot_id(&reloaded).await);
    }
}

#[tokio::test]
async fn test_write_bin_pack_data_files() {
    let fixture = set_test_fixture().await;
    let table = fixture
        .create_table("write_bin_pack_data_files", format_props(1), &[])
        .await;

    // Smaller than the default target: one file.
    let batch = arrow_table_with_null();
    let weight = batch_weight(&batch).unwrap();
    assert!(weight < TableProperties::PROPERTY_WRITE_TARGET_FILE_SIZE_BYTES_DEFAULT);
    let table = table
        .overwrite(&fixture.catalog, &[batch.clone()])
        .await
        .unwrap();
    assert_eq!(data_files_count(&table).await, 1);

    let bigger = vec![batch.clone(); 10];
    let table = table.overwrite(&fixture.catalog, &bigger).await.unwrap();
    assert_eq!(data_files_count(&table).await, 1);

    for (target, expected_files) in [(weight, 10), (weight * 2, 5)] {
        let tx = Transaction::new(&table);
        let tx = tx
            .update_table_properties()
            .set(
                TableProperties::PROPERTY_WRITE_TARGET_FILE_SIZE_BYTES,
                target.to_string(),
            )
            .apply(tx)
            .unwrap();
        let updated = tx.commit(&fixture.catalog).await.unwrap();
        assert_eq!(
            updated.property(TableProperties::PROPERTY_WRITE_TARGET_FILE_SIZE_BYTES),
            Some(target.to_string().as_str())
        );

        let updated = updated.overwrite(&fixture.catalog, &bigger).await.unwrap();
        assert_eq!(data_files_count(&updated).await, expected_files);
        assert_eq!(
            num_rows(&collect(updated.scan().build().unwrap().to_arrow().await.unwrap()).await),
            30
        );
    }
}

#[tokio::test]
async fn test_invalid_batches() {
    let fixture = set_test_fixture().await;
    let table = fixture
        .create_table("arrow_invalid_batches", format_props(1), &[])
        .await;

    let wrong_type = RecordBatch::try_new(
        Arc::new(ArrowSchema::new(vec![Field::new("int", DataType::Utf8, true)])),
        vec![Arc::new(arrow_array::StringArray::from(vec!["not an int"])) as ArrayRef],
    )
    .unwrap();
    let err = table
        .append(&fixture.catalog, &[wrong_type.clone()])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataInvalid);
    let err = table
        .overwrite(&fixture.catalog, &[wrong_type])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataInvalid);

    let unknown = RecordBatch::try_new(
        Arc::new(ArrowSchema::new(vec![Field::new("nope", DataType::Int32, true)])),
        vec![Arc::new(arrow_array::Int32Array::from(vec![1])) as ArrayRef],
    )
    .unwrap();
    let err = table.append(&fixture.catalog, &[unknown]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataInvalid);

    let reloaded = fixture.catalog.load_table(table.identifier()).await.unwrap();
    assert!(reloaded.current_snapshot().is_none());
}

#[tokio::test]
async fn test_write_accepts_wider_arrow_flavours() {
    let fixture = set_test_fixture().await;
    let table = fixture
        .create_table("arrow_wider_flavours", format_props(2), &[])
        .await;

    // Large binary and a named UTC zone store as the table's binary and timestamptz.
    let batch = arrow_table_with_null();
    let schema = arrow_schema();
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| match f.name().as_str() {
            "binary" => Field::new("binary", DataType::LargeBinary, true),
            "timestamptz" => Field::new(
                "timestamptz",
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                true,
            ),
            _ => f.as_ref().clone(),
        })
        .collect();
    let columns: Vec<ArrayRef> = schema
        .fields()
        .iter()
        .zip(batch.columns())
        .map(|(f, column)| match f.name().as_str() {
            "binary" => Arc::new(LargeBinaryArray::from_opt_vec(vec![
                Some(b"\x01".as_slice()),
                None,
                Some(b"\x12".as_slice()),
            ])) as ArrayRef,
            "timestamptz" => with_utc_zone(column),
            _ => column.clone(),
        })
        .collect();
    let wider = RecordBatch::try_new(Arc::new(ArrowSchema::new(fields)), columns).unwrap();

    let table = table.append(&fixture.catalog, &[wider]).await.unwrap();
    let scan = table.scan().build().unwrap();
    let batches = collect(scan.to_arrow().await.unwrap()).await;
    assert_eq!(num_rows(&batches), 3);
    let binary = batches[0].column_by_name("binary").unwrap();
    assert_eq!(binary.data_type(), &DataType::Binary);
    assert_eq!(binary.as_binary::<i32>().value(2), b"\x12");
}

fn with_utc_zone(column: &ArrayRef) -> ArrayRef {
    let values = column.as_primitive::<arrow_array::types::TimestampMicrosecondType>();
    Arc::new(values.clone().with_timezone("UTC"))
}
