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

//! Utilities for walking the snapshot lineage of a table.
//!
//! Every snapshot names its parent, so the history of the `main` branch is a
//! singly linked chain ending in the first snapshot of the table.

use super::{SnapshotRef, TableMetadata};

/// Iterator over a snapshot and its ancestors, newest first.
#[derive(Debug)]
pub struct Ancestors<'a> {
    metadata: &'a TableMetadata,
    next: Option<&'a SnapshotRef>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a SnapshotRef;

    fn next(&mut self) -> Option<Self::Item> {
        let snapshot = self.next.take()?;
        self.next = snapshot
            .parent_snapshot_id()
            .and_then(|id| self.metadata.snapshot_by_id(id));
        Some(snapshot)
    }
}

/// Walks the parent chain starting at `snapshot_id`.
///
/// The starting snapshot is yielded first. The walk stops at the root or at
/// the first parent that is no longer part of the metadata.
pub fn ancestors_of(metadata: &TableMetadata, snapshot_id: i64) -> Ancestors<'_> {
    Ancestors {
        metadata,
        next: metadata.snapshot_by_id(snapshot_id),
    }
}

/// Returns the ids of `snapshot_id` and all of its ancestors, newest first.
///
/// ```rust,ignore
/// // For a chain: s1 -> s2 -> s3 (current)
/// assert_eq!(ancestor_ids(metadata, 3), vec![3, 2, 1]);
/// ```
pub fn ancestor_ids(metadata: &TableMetadata, snapshot_id: i64) -> Vec<i64> {
    ancestors_of(metadata, snapshot_id)
        .map(|s| s.snapshot_id())
        .collect()
}

/// Check if `potential_ancestor_id` is an ancestor of `snapshot_id`.
///
/// A snapshot is considered an ancestor of itself.
pub fn is_ancestor_of(
    metadata: &TableMetadata,
    snapshot_id: i64,
    potential_ancestor_id: i64,
) -> bool {
    ancestors_of(metadata, snapshot_id).any(|s| s.snapshot_id() == potential_ancestor_id)
}
