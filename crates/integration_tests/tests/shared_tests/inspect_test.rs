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

//! Metadata tables after a mix of overwrites and appends.

use arrow_array::cast::AsArray;
use arrow_array::types::Int64Type;
use arrow_array::{Array, RecordBatch};
use iceberg_commit::table::Table;
use iceberg_commit_integration_tests::{
    TestFixture, arrow_table_with_null, props, set_test_fixture,
};

use super::collect_one;

/// The fixture owns the warehouse directory and must outlive the table.
async fn overwrite_overwrite_append(
    fixture_name: &str,
    format_version: &str,
) -> (TestFixture, Table) {
    let fixture = set_test_fixture().await;
    let table = fixture
        .create_table(fixture_name, props([("format-version", format_version)]), &[])
        .await;
    let table = table
        .overwrite(&fixture.catalog, &[arrow_table_with_null()])
        .await
        .unwrap();
    let table = table
        .overwrite(&fixture.catalog, &[arrow_table_with_null()])
        .await
        .unwrap();
    let table = table
        .append(&fixture.catalog, &[arrow_table_with_null()])
        .await
        .unwrap();
    (fixture, table)
}

fn string_column(batch: &RecordBatch, name: &str) -> Vec<String> {
    batch
        .column_by_name(name)
        .unwrap()
        .as_string::<i32>()
        .iter()
        .map(|v| v.unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_inspect_snapshots() {
    for format_version in ["1", "2"] {
        let (_fixture, table) =
            overwrite_overwrite_append("inspect_snapshots", format_version).await;
        let snapshots = collect_one(table.inspect().snapshots().scan().await.unwrap()).await;

        let names: Vec<_> = snapshots
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(names, vec![
            "committed_at",
            "snapshot_id",
            "parent_id",
            "operation",
            "manifest_list",
            "summary",
        ]);
        assert_eq!(snapshots.num_rows(), 3);

        let snapshot_ids = snapshots
            .column_by_name("snapshot_id")
            .unwrap()
            .as_primitive::<Int64Type>();
        let parent_ids = snapshots
            .column_by_name("parent_id")
            .unwrap()
            .as_primitive::<Int64Type>();
        assert!(parent_ids.is_null(0));
        assert_eq!(parent_ids.value(1), snapshot_ids.value(0));
        assert_eq!(parent_ids.value(2), snapshot_ids.value(1));
        assert_eq!(
            snapshot_ids.value(2),
            table.current_snapshot().unwrap().snapshot_id()
        );

        assert_eq!(string_column(&snapshots, "operation"), vec![
            "append",
            "overwrite",
            "append"
        ]);
        for manifest_list in string_column(&snapshots, "manifest_list") {
            assert!(
                manifest_list.starts_with(table.metadata().location()),
                "{manifest_list}"
            );
        }

        let summary = snapshots.column_by_name("summary").unwrap().as_map();
        let first = summary.value(0);
        let keys: Vec<_> = first
            .column(0)
            .as_string::<i32>()
            .iter()
            .map(|k| k.unwrap().to_string())
            .collect();
        assert_eq!(keys, vec![
            "added-files-size",
            "added-data-files",
            "added-records",
            "total-data-files",
            "total-delete-files",
            "total-records",
            "total-files-size",
            "total-position-deletes",
            "total-equality-deletes",
        ]);
        let values = first.column(1).as_string::<i32>();
        assert_eq!(values.value(1), "1");
        assert_eq!(values.value(2), "3");
    }
}

#[tokio::test]
async fn test_inspect_history_and_files() {
    let (_fixture, table) = overwrite_overwrite_append("inspect_history_and_files", "2").await;

    let history = collect_one(table.inspect().history().scan().await.unwrap()).await;
    assert_eq!(history.num_rows(), 3);
    let ancestors = history
        .column_by_name("is_current_ancestor")
        .unwrap()
        .as_boolean();
    assert!(ancestors.iter().all(|v| v == Some(true)));

    // The second overwrite replaced the first file, the append added one.
    let files = collect_one(table.inspect().files().scan().await.unwrap()).await;
    assert_eq!(files.num_rows(), 2);
    for path in string_column(&files, "file_path") {
        assert!(table.file_io().exists(&path).await.unwrap(), "{path}");
    }
    assert!(
        string_column(&files, "file_format")
            .iter()
            .all(|f| f.eq_ignore_ascii_case("parquet"))
    );
    let records = files
        .column_by_name("record_count")
        .unwrap()
        .as_primitive::<Int64Type>();
    assert_eq!(records.values().iter().sum::<i64>(), 6);
}

#[tokio::test]
async fn test_inspect_properties() {
    let fixture = set_test_fixture().await;
    let table = fixture
        .create_table(
            "inspect_properties",
            props([("format-version", "2"), ("owner", "reporting")]),
            &[],
        )
        .await;

    let properties = collect_one(table.inspect().properties().scan().await.unwrap()).await;
    let keys = string_column(&properties, "key");
    let values = string_column(&properties, "value");
    let owner = keys.iter().position(|k| k == "owner").unwrap();
    assert_eq!(values[owner], "reporting");
    assert!(!keys.iter().any(|k| k == "format-version"));
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}
