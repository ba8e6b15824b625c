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

//! Turns record batches into Parquet data files of a table.
//!
//! [`write_data_files`] is the entry point. It:
//!
//! 1. reads a [`WriterConfig`] from the table properties, failing fast on
//!    settings the writer does not support,
//! 2. checks each batch against the current schema and casts it to the
//!    table's types,
//! 3. bin-packs the rows by their Arrow byte size so each file holds about
//!    `write.target-file-size-bytes`,
//! 4. encodes every bin concurrently and writes it through [`FileIO`].
//!
//! The resulting [`DataFile`]s are not visible to readers until a
//! transaction commits them.

mod bin_pack;
mod config;
mod parquet_writer;

use std::sync::Arc;

use arrow_array::RecordBatch;
pub use bin_pack::{batch_weight, bin_pack_batches};
pub use config::WriterConfig;
use futures::future::try_join_all;
pub use parquet_writer::write_parquet_file;
use tracing::info;
use uuid::Uuid;

use crate::Result;
use crate::arrow::{conform_batch, schema_to_arrow_schema};
use crate::io::FileIO;
use crate::spec::{DataFile, TableMetadata};

/// Location of the `task_id`-th file of the write `write_uuid`.
pub fn data_file_location(location: &str, task_id: usize, write_uuid: &Uuid) -> String {
    // Unpartitioned tables always write split 0.
    format!(
        "{}/data/{:05}-{task_id}-{write_uuid}.parquet",
        location.trim_end_matches('/'),
        0
    )
}

/// Writes `batches` as data files of the table described by `metadata`.
///
/// Zero-row input produces no files.
pub async fn write_data_files(
    file_io: &FileIO,
    metadata: &TableMetadata,
    batches: &[RecordBatch],
) -> Result<Vec<DataFile>> {
    let config = WriterConfig::try_from(metadata.properties())?;

    let schema = metadata.current_schema();
    let arrow_schema = Arc::new(schema_to_arrow_schema(schema)?);
    let batches = batches
        .iter()
        .map(|batch| conform_batch(batch, schema, &arrow_schema))
        .collect::<Result<Vec<_>>>()?;

    let bins = bin_pack_batches(&batches, config.target_file_size_bytes)?;
    if bins.is_empty() {
        return Ok(vec![]);
    }

    let write_uuid = Uuid::now_v7();
    let props = config.writer_properties();
    let tasks = bins.iter().enumerate().map(|(task_id, bin)| {
        write_parquet_file(
            file_io,
            data_file_location(metadata.location(), task_id, &write_uuid),
            arrow_schema.clone(),
            bin,
            props.clone(),
        )
    });
    let data_files = try_join_all(tasks).await?;

    info!(
        location = metadata.location(),
        files = data_files.len(),
        records = data_files.iter().map(DataFile::record_count).sum::<u64>(),
        target_file_size_bytes = config.target_file_size_bytes,
        "wrote data files"
    );
    Ok(data_files)
}
