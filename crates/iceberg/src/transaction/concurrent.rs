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

//! Concurrency tests for transactions against a shared catalog.
//!
//! Writers racing on one base must produce exactly one winner per round. The
//! losers see a retryable conflict and the table stays consistent: a linear
//! snapshot chain whose totals match the files that were committed.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use tokio::sync::Barrier;

    use crate::io::FileIOBuilder;
    use crate::spec::{MAIN_BRANCH, snapshot_util, test_data_file};
    use crate::table::Table;
    use crate::transaction::tests::test_schema;
    use crate::transaction::{ApplyTransactionAction, Transaction};
    use crate::{Catalog, ErrorKind, MemoryCatalog, NamespaceIdent, TableCreation, TableIdent};

    async fn new_catalog_with_table(name: &str) -> (Arc<MemoryCatalog>, Table) {
        let file_io = FileIOBuilder::new("memory").build().unwrap();
        let catalog = Arc::new(MemoryCatalog::new(file_io, "memory:///warehouse"));
        let namespace = NamespaceIdent::new("ns".to_string());
        catalog
            .create_namespace(&namespace, HashMap::new())
            .await
            .unwrap();
        let table = catalog
            .create_table(
                &namespace,
                TableCreation::builder()
                    .name(name.to_string())
                    .schema(test_schema())
                    .build(),
            )
            .await
            .unwrap();
        (catalog, table)
    }

    fn append_tx(table: &Table, file_id: u32) -> Transaction {
        let tx = Transaction::new(table);
        tx.fast_append()
            .add_data_files(vec![test_data_file(
                &format!("memory:///warehouse/ns/t/data/concurrent_{file_id}.parquet"),
                10,
            )])
            .apply(tx)
            .unwrap()
    }

    /// Checks the snapshot chain is linear and the totals match its files.
    async fn verify_table_consistency(catalog: &MemoryCatalog, ident: &TableIdent) -> Table {
        let table = catalog.load_table(ident).await.unwrap();
        let metadata = table.metadata();

        let Some(current) = metadata.current_snapshot() else {
            return table;
        };
        assert_eq!(
            metadata.refs()[MAIN_BRANCH].snapshot_id,
            current.snapshot_id()
        );

        let chain = snapshot_util::ancestor_ids(metadata, current.snapshot_id());
        assert_eq!(chain.len(), metadata.snapshots().len());

        let mut live_files = 0;
        let manifest_list = current.load_manifest_list(table.file_io()).await.unwrap();
        for manifest_file in manifest_list.entries() {
            let manifest = manifest_file.load_manifest(table.file_io()).await.unwrap();
            live_files += manifest.entries().iter().filter(|e| e.is_alive()).count();
        }
        assert_eq!(
            current.summary().get("total-data-files"),
            Some(live_files.to_string().as_str())
        );
        table
    }

    #[tokio::test]
    async fn test_concurrent_append_vs_append() {
        let (catalog, table) = new_catalog_with_table("t").await;
        let ident = table.identifier().clone();
        let barrier = Arc::new(Barrier::new(2));

        let mut handles = vec![];
        for file_id in 0..2 {
            let catalog = catalog.clone();
            let barrier = barrier.clone();
            let tx = append_tx(&table, file_id);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                tx.commit(catalog.as_ref()).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(err) => {
                    assert_eq!(err.kind(), ErrorKind::CatalogCommitConflicts);
                    assert!(err.retryable());
                }
            }
        }
        assert_eq!(successes, 1);

        let table = verify_table_consistency(&catalog, &ident).await;
        assert_eq!(table.metadata().snapshots().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_appends_with_retry_all_land() {
        let (catalog, table) = new_catalog_with_table("t").await;
        let ident = table.identifier().clone();
        let writers = 4;
        let barrier = Arc::new(Barrier::new(writers));

        let mut handles = vec![];
        for file_id in 0..writers as u32 {
            let catalog = catalog.clone();
            let barrier = barrier.clone();
            let tx = append_tx(&table, file_id);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                tx.commit_with_retry(catalog.as_ref()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let table = verify_table_consistency(&catalog, &ident).await;
        let current = table.metadata().current_snapshot().unwrap();
        assert_eq!(current.summary().get("total-data-files"), Some("4"));
        assert_eq!(current.summary().get("total-records"), Some("40"));
        assert_eq!(table.metadata().snapshots().len(), writers);
    }

    #[tokio::test]
    async fn test_concurrent_property_update_vs_append() {
        let (catalog, table) = new_catalog_with_table("t").await;
        let ident = table.identifier().clone();

        let props_tx = {
            let tx = Transaction::new(&table);
            tx.update_table_properties()
                .set("owner", "etl")
                .apply(tx)
                .unwrap()
        };
        let append = append_tx(&table, 0);

        // Property updates assert nothing, so both land.
        props_tx.commit(catalog.as_ref()).await.unwrap();
        append.commit(catalog.as_ref()).await.unwrap();

        let table = verify_table_consistency(&catalog, &ident).await;
        assert_eq!(table.properties().get("owner").map(String::as_str), Some("etl"));
        assert!(table.metadata().current_snapshot().is_some());
    }

    #[tokio::test]
    async fn test_stale_transaction_conflict() {
        let (catalog, table) = new_catalog_with_table("t").await;

        append_tx(&table, 0).commit(catalog.as_ref()).await.unwrap();

        // Built on the base before the first append.
        let err = append_tx(&table, 1)
            .commit(catalog.as_ref())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CatalogCommitConflicts);
        assert!(err.retryable());

        // Retrying reloads the table and re-applies the append on the new head.
        let table = append_tx(&table, 1)
            .commit_with_retry(catalog.as_ref())
            .await
            .unwrap();
        let current = table.metadata().current_snapshot().unwrap();
        assert_eq!(current.summary().get("total-data-files"), Some("2"));
        assert!(current.parent_snapshot_id().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_schema_updates() {
        let (catalog, table) = new_catalog_with_table("t").await;
        let ident = table.identifier().clone();
        let barrier = Arc::new(Barrier::new(2));

        let mut handles = vec![];
        for column in ["a", "b"] {
            let catalog = catalog.clone();
            let barrier = barrier.clone();
            let tx = Transaction::new(&table);
            let tx = tx
                .update_schema()
                .add_column(column, crate::spec::PrimitiveType::Int)
                .apply(tx)
                .unwrap();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                tx.commit(catalog.as_ref()).await
            }));
        }

        let results: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);

        // Both writers picked id 4; only one of them may own it.
        let table = catalog.load_table(&ident).await.unwrap();
        assert_eq!(table.metadata().last_column_id(), 4);
        assert_eq!(table.current_schema().fields().len(), 4);
    }

    #[tokio::test]
    async fn test_sequential_appends() {
        let (catalog, mut table) = new_catalog_with_table("t").await;
        let ident = table.identifier().clone();

        for file_id in 0..3 {
            table = append_tx(&table, file_id)
                .commit(catalog.as_ref())
                .await
                .unwrap();
        }

        let table = verify_table_consistency(&catalog, &ident).await;
        let snapshots = table.metadata().snapshots_in_commit_order();
        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[0].parent_snapshot_id(), None);
        for pair in snapshots.windows(2) {
            assert_eq!(pair[1].parent_snapshot_id(), Some(pair[0].snapshot_id()));
            assert!(pair[1].sequence_number() > pair[0].sequence_number());
        }
    }
}
