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

//! Snapshot summary bookkeeping.
//!
//! A commit records per-commit deltas (`added-records`, `removed-files-size`,
//! ...) through [`SnapshotSummaryCollector`] and then carries the previous
//! snapshot's totals forward with [`update_snapshot_summaries`].

use tracing::debug;

use super::{DataContentType, DataFile, Summary};
use crate::{Error, ErrorKind, Result};

const ADDED_DATA_FILES: &str = "added-data-files";
const ADDED_DELETE_FILES: &str = "added-delete-files";
const ADDED_EQUALITY_DELETES: &str = "added-equality-deletes";
const ADDED_FILE_SIZE: &str = "added-files-size";
const ADDED_POSITION_DELETES: &str = "added-position-deletes";
const ADDED_POSITION_DELETE_FILES: &str = "added-position-delete-files";
const ADDED_RECORDS: &str = "added-records";
const DELETED_DATA_FILES: &str = "deleted-data-files";
const DELETED_RECORDS: &str = "deleted-records";
const ADDED_EQUALITY_DELETE_FILES: &str = "added-equality-delete-files";
const REMOVED_DELETE_FILES: &str = "removed-delete-files";
const REMOVED_EQUALITY_DELETES: &str = "removed-equality-deletes";
const REMOVED_EQUALITY_DELETE_FILES: &str = "removed-equality-delete-files";
const REMOVED_FILE_SIZE: &str = "removed-files-size";
const REMOVED_POSITION_DELETES: &str = "removed-position-deletes";
const REMOVED_POSITION_DELETE_FILES: &str = "removed-position-delete-files";
/// Total number of live data files.
pub const TOTAL_DATA_FILES: &str = "total-data-files";
/// Total number of live delete files.
pub const TOTAL_DELETE_FILES: &str = "total-delete-files";
/// Total number of records in live data files.
pub const TOTAL_RECORDS: &str = "total-records";
/// Total byte size of live files.
pub const TOTAL_FILE_SIZE: &str = "total-files-size";
/// Total number of position deletes.
pub const TOTAL_POSITION_DELETES: &str = "total-position-deletes";
/// Total number of equality deletes.
pub const TOTAL_EQUALITY_DELETES: &str = "total-equality-deletes";

/// Accumulates the per-commit counters of a snapshot.
#[derive(Debug, Default)]
pub(crate) struct SnapshotSummaryCollector {
    metrics: UpdateMetrics,
}

impl SnapshotSummaryCollector {
    /// Records a file that the commit adds.
    pub fn add_file(&mut self, data_file: &DataFile) {
        self.metrics.add_file(data_file);
    }

    /// Records a file that the commit removes.
    pub fn remove_file(&mut self, data_file: &DataFile) {
        self.metrics.remove_file(data_file);
    }

    /// Returns the non-zero counters in their canonical order.
    pub fn build(&self) -> Vec<(String, String)> {
        self.metrics.to_properties()
    }
}

#[derive(Debug, Default)]
struct UpdateMetrics {
    added_file_size: u64,
    removed_file_size: u64,
    added_data_files: u64,
    removed_data_files: u64,
    added_eq_delete_files: u64,
    removed_eq_delete_files: u64,
    added_pos_delete_files: u64,
    removed_pos_delete_files: u64,
    added_delete_files: u64,
    removed_delete_files: u64,
    added_records: u64,
    deleted_records: u64,
    added_pos_deletes: u64,
    removed_pos_deletes: u64,
    added_eq_deletes: u64,
    removed_eq_deletes: u64,
}

impl UpdateMetrics {
    fn add_file(&mut self, data_file: &DataFile) {
        self.added_file_size += data_file.file_size_in_bytes();
        match data_file.content_type() {
            DataContentType::Data => {
                self.added_data_files += 1;
                self.added_records += data_file.record_count();
            }
            DataContentType::PositionDeletes => {
                self.added_delete_files += 1;
                self.added_pos_delete_files += 1;
                self.added_pos_deletes += data_file.record_count();
            }
            DataContentType::EqualityDeletes => {
                self.added_delete_files += 1;
                self.added_eq_delete_files += 1;
                self.added_eq_deletes += data_file.record_count();
            }
        }
    }

    fn remove_file(&mut self, data_file: &DataFile) {
        self.removed_file_size += data_file.file_size_in_bytes();
        match data_file.content_type() {
            DataContentType::Data => {
                self.removed_data_files += 1;
                self.deleted_records += data_file.record_count();
            }
            DataContentType::PositionDeletes => {
                self.removed_delete_files += 1;
                self.removed_pos_delete_files += 1;
                self.removed_pos_deletes += data_file.record_count();
            }
            DataContentType::EqualityDeletes => {
                self.removed_delete_files += 1;
                self.removed_eq_delete_files += 1;
                self.removed_eq_deletes += data_file.record_count();
            }
        }
    }

    fn to_properties(&self) -> Vec<(String, String)> {
        let mut properties = Vec::new();
        for (name, value) in [
            (ADDED_FILE_SIZE, self.added_file_size),
            (REMOVED_FILE_SIZE, self.removed_file_size),
            (ADDED_DATA_FILES, self.added_data_files),
            (DELETED_DATA_FILES, self.removed_data_files),
            (ADDED_EQUALITY_DELETE_FILES, self.added_eq_delete_files),
            (REMOVED_EQUALITY_DELETE_FILES, self.removed_eq_delete_files),
            (ADDED_POSITION_DELETE_FILES, self.added_pos_delete_files),
            (REMOVED_POSITION_DELETE_FILES, self.removed_pos_delete_files),
            (ADDED_DELETE_FILES, self.added_delete_files),
            (REMOVED_DELETE_FILES, self.removed_delete_files),
            (ADDED_RECORDS, self.added_records),
            (DELETED_RECORDS, self.deleted_records),
            (ADDED_POSITION_DELETES, self.added_pos_deletes),
            (REMOVED_POSITION_DELETES, self.removed_pos_deletes),
            (ADDED_EQUALITY_DELETES, self.added_eq_deletes),
            (REMOVED_EQUALITY_DELETES, self.removed_eq_deletes),
        ] {
            set_if_positive(&mut properties, value, name);
        }
        properties
    }
}

fn set_if_positive(properties: &mut Vec<(String, String)>, value: u64, property_name: &str) {
    if value > 0 {
        properties.push((property_name.to_string(), value.to_string()));
    }
}

/// Carries the totals of `previous_summary` into `summary`.
///
/// Totals are appended after the per-commit counters in a fixed order. When
/// there is no previous summary every total starts at zero. A total is left
/// out when the previous summary exists but lacks it, or when the result
/// would be negative.
pub(crate) fn update_snapshot_summaries(
    mut summary: Summary,
    previous_summary: Option<&Summary>,
) -> Result<Summary> {
    for (total, added, removed) in [
        (TOTAL_DATA_FILES, ADDED_DATA_FILES, DELETED_DATA_FILES),
        (TOTAL_DELETE_FILES, ADDED_DELETE_FILES, REMOVED_DELETE_FILES),
        (TOTAL_RECORDS, ADDED_RECORDS, DELETED_RECORDS),
        (TOTAL_FILE_SIZE, ADDED_FILE_SIZE, REMOVED_FILE_SIZE),
        (
            TOTAL_POSITION_DELETES,
            ADDED_POSITION_DELETES,
            REMOVED_POSITION_DELETES,
        ),
        (
            TOTAL_EQUALITY_DELETES,
            ADDED_EQUALITY_DELETES,
            REMOVED_EQUALITY_DELETES,
        ),
    ] {
        update_totals(&mut summary, previous_summary, total, added, removed)?;
    }
    Ok(summary)
}

fn parse_counter(summary: &Summary, property: &str) -> Result<Option<i64>> {
    summary
        .get(property)
        .map(|value| {
            value.parse::<i64>().map_err(|e| {
                Error::new(
                    ErrorKind::Unexpected,
                    format!("Snapshot summary property {property} is not a number: {value}"),
                )
                .with_source(e)
            })
        })
        .transpose()
}

fn update_totals(
    summary: &mut Summary,
    previous_summary: Option<&Summary>,
    total_property: &str,
    added_property: &str,
    removed_property: &str,
) -> Result<()> {
    let previous_total = match previous_summary {
        None => 0,
        Some(previous) => match parse_counter(previous, total_property)? {
            Some(total) => total,
            None => {
                debug!(total_property, "previous summary has no total, skipping");
                return Ok(());
            }
        },
    };

    let new_total = previous_total + parse_counter(summary, added_property)?.unwrap_or(0)
        - parse_counter(summary, removed_property)?.unwrap_or(0);

    if new_total >= 0 {
        summary.set(total_property, new_total.to_string());
    }
    Ok(())
}
