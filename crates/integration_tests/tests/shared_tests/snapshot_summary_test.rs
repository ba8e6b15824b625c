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

//! Snapshot summaries as a downstream reader sees them.

use std::collections::BTreeMap;

use iceberg_commit::spec::{Operation, SnapshotRef};
use iceberg_commit::table::Table;
use iceberg_commit_integration_tests::{
    arrow_table_with_null, arrow_table_with_only_nulls, arrow_table_without_data, props,
    set_test_fixture,
};

fn summary_map(snapshot: &SnapshotRef) -> BTreeMap<String, String> {
    snapshot
        .summary()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn expected(entries: &[(&str, String)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Sum of the sizes of the files the snapshot added.
async fn added_file_size(table: &Table, snapshot: &SnapshotRef) -> u64 {
    let manifest_list = snapshot.load_manifest_list(table.file_io()).await.unwrap();
    let mut size = 0;
    for manifest_file in manifest_list.entries() {
        if manifest_file.added_snapshot_id != snapshot.snapshot_id() {
            continue;
        }
        let manifest = manifest_file.load_manifest(table.file_io()).await.unwrap();
        size += manifest
            .entries()
            .iter()
            .filter(|e| e.snapshot_id() == Some(snapshot.snapshot_id()) && e.is_alive())
            .map(|e| e.file_size_in_bytes())
            .sum::<u64>();
    }
    size
}

#[tokio::test]
async fn test_summaries() {
    let fixture = set_test_fixture().await;
    let table = fixture
        .create_table(
            "arrow_table_summaries",
            props([("format-version", "1")]),
            &[vec![arrow_table_with_null()], vec![arrow_table_with_null()]],
        )
        .await;
    let table = table
        .overwrite(&fixture.catalog, &[arrow_table_with_null()])
        .await
        .unwrap();

    let snapshots = table.metadata().snapshots_in_commit_order();
    let operations: Vec<_> = snapshots.iter().map(|s| s.summary().operation).collect();
    assert_eq!(operations, vec![
        Operation::Append,
        Operation::Append,
        Operation::Overwrite
    ]);

    let s0 = added_file_size(&table, snapshots[0]).await;
    let s1 = added_file_size(&table, snapshots[1]).await;
    let s2 = added_file_size(&table, snapshots[2]).await;
    assert!(s0 > 0);

    assert_eq!(
        summary_map(snapshots[0]),
        expected(&[
            ("added-data-files", "1".to_string()),
            ("added-files-size", s0.to_string()),
            ("added-records", "3".to_string()),
            ("total-data-files", "1".to_string()),
            ("total-delete-files", "0".to_string()),
            ("total-equality-deletes", "0".to_string()),
            ("total-files-size", s0.to_string()),
            ("total-position-deletes", "0".to_string()),
            ("total-records", "3".to_string()),
        ])
    );

    assert_eq!(
        summary_map(snapshots[1]),
        expected(&[
            ("added-data-files", "1".to_string()),
            ("added-files-size", s1.to_string()),
            ("added-records", "3".to_string()),
            ("total-data-files", "2".to_string()),
            ("total-delete-files", "0".to_string()),
            ("total-equality-deletes", "0".to_string()),
            ("total-files-size", (s0 + s1).to_string()),
            ("total-position-deletes", "0".to_string()),
            ("total-records", "6".to_string()),
        ])
    );

    assert_eq!(
        summary_map(snapshots[2]),
        expected(&[
            ("added-data-files", "1".to_string()),
            ("added-files-size", s2.to_string()),
            ("added-records", "3".to_string()),
            ("deleted-data-files", "2".to_string()),
            ("deleted-records", "6".to_string()),
            ("removed-files-size", (s0 + s1).to_string()),
            ("total-data-files", "1".to_string()),
            ("total-delete-files", "0".to_string()),
            ("total-equality-deletes", "0".to_string()),
            ("total-files-size", s2.to_string()),
            ("total-position-deletes", "0".to_string()),
            ("total-records", "3".to_string()),
        ])
    );
}

#[tokio::test]
async fn test_summaries_with_only_nulls() {
    let fixture = set_test_fixture().await;
    let table = fixture
        .create_table(
            "arrow_table_summaries_with_only_nulls",
            props([("format-version", "1")]),
            &[
                vec![arrow_table_without_data()],
                vec![arrow_table_with_only_nulls()],
            ],
        )
        .await;
    let table = table
        .overwrite(&fixture.catalog, &[arrow_table_without_data()])
        .await
        .unwrap();

    let snapshots = table.metadata().snapshots_in_commit_order();
    let operations: Vec<_> = snapshots.iter().map(|s| s.summary().operation).collect();
    assert_eq!(operations, vec![
        Operation::Append,
        Operation::Append,
        Operation::Overwrite
    ]);

    let zero = "0".to_string();
    assert_eq!(
        summary_map(snapshots[0]),
        expected(&[
            ("total-data-files", zero.clone()),
            ("total-delete-files", zero.clone()),
            ("total-equality-deletes", zero.clone()),
            ("total-files-size", zero.clone()),
            ("total-position-deletes", zero.clone()),
            ("total-records", zero.clone()),
        ])
    );

    let size = added_file_size(&table, snapshots[1]).await;
    assert_eq!(
        summary_map(snapshots[1]),
        expected(&[
            ("added-data-files", "1".to_string()),
            ("added-files-size", size.to_string()),
            ("added-records", "2".to_string()),
            ("total-data-files", "1".to_string()),
            ("total-delete-files", zero.clone()),
            ("total-equality-deletes", zero.clone()),
            ("total-files-size", size.to_string()),
            ("total-position-deletes", zero.clone()),
            ("total-records", "2".to_string()),
        ])
    );

    assert_eq!(
        summary_map(snapshots[2]),
        expected(&[
            ("removed-files-size", size.to_string()),
            ("total-equality-deletes", zero.clone()),
            ("total-position-deletes", zero.clone()),
            ("deleted-data-files", "1".to_string()),
            ("total-delete-files", zero.clone()),
            ("total-files-size", zero.clone()),
            ("deleted-records", "2".to_string()),
            ("total-data-files", zero.clone()),
            ("total-records", zero.clone()),
        ])
    );
}

#[tokio::test]
async fn test_summary_keys_keep_commit_order() {
    let fixture = set_test_fixture().await;
    let table = fixture
        .create_table("summary_key_order", props([]), &[vec![
            arrow_table_with_null(),
        ]])
        .await;

    let keys: Vec<_> = table
        .current_snapshot()
        .unwrap()
        .summary()
        .iter()
        .map(|(k, _)| k.to_string())
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
}
