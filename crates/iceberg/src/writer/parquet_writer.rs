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

//! Encodes one bin of record batches into a single Parquet data file.

use std::collections::HashMap;

use arrow_array::RecordBatch;
use arrow_schema::SchemaRef as ArrowSchemaRef;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::{ParquetMetaData, RowGroupMetaData};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use tracing::debug;

use crate::io::FileIO;
use crate::spec::{DataContentType, DataFile, DataFileBuilder, DataFileFormat};
use crate::{Error, ErrorKind, Result};

/// Writes `batches` as one Parquet file at `path`.
///
/// The returned [`DataFile`] is built from the footer of the bytes that were
/// actually written, so its size and counts match what any reader sees.
pub async fn write_parquet_file(
    file_io: &FileIO,
    path: String,
    schema: ArrowSchemaRef,
    batches: &[RecordBatch],
    props: WriterProperties,
) -> Result<DataFile> {
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, schema, Some(props))?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.close()?;

    let bytes = Bytes::from(buffer);
    let file_size_in_bytes = bytes.len() as u64;
    file_io.new_output(&path)?.write(bytes.clone()).await?;

    let reader = SerializedFileReader::new(bytes)?;
    let data_file = data_file_from_footer(path, file_size_in_bytes, reader.metadata())?;
    debug!(
        file_path = data_file.file_path(),
        record_count = data_file.record_count(),
        file_size_in_bytes,
        "wrote parquet data file"
    );
    Ok(data_file)
}

fn data_file_from_footer(
    file_path: String,
    file_size_in_bytes: u64,
    metadata: &ParquetMetaData,
) -> Result<DataFile> {
    let record_count = u64::try_from(metadata.file_metadata().num_rows()).map_err(|_| {
        Error::new(
            ErrorKind::DataInvalid,
            "Parquet footer reports a negative row count",
        )
        .with_context("file_path", file_path.clone())
    })?;

    let mut column_sizes: HashMap<i32, u64> = HashMap::new();
    let mut value_counts: HashMap<i32, u64> = HashMap::new();
    let mut null_value_counts: HashMap<i32, u64> = HashMap::new();
    let mut split_offsets = Vec::with_capacity(metadata.num_row_groups());

    for row_group in metadata.row_groups() {
        if let Some(offset) = row_group_offset(row_group) {
            split_offsets.push(offset);
        }

        for column in row_group.columns() {
            let info = column.column_descr().self_type().get_basic_info();
            if !info.has_id() {
                continue;
            }
            let field_id = info.id();

            *column_sizes.entry(field_id).or_default() += column.compressed_size().max(0) as u64;
            *value_counts.entry(field_id).or_default() += column.num_values().max(0) as u64;
            if let Some(nulls) = column.statistics().and_then(|s| s.null_count_opt()) {
                *null_value_counts.entry(field_id).or_default() += nulls;
            }
        }
    }
    split_offsets.sort_unstable();

    DataFileBuilder::default()
        .content(DataContentType::Data)
        .file_path(file_path)
        .file_format(DataFileFormat::Parquet)
        .record_count(record_count)
        .file_size_in_bytes(file_size_in_bytes)
        .column_sizes(column_sizes)
        .value_counts(value_counts)
        .null_value_counts(null_value_counts)
        .split_offsets(split_offsets)
        .build()
        .map_err(|e| {
            Error::new(ErrorKind::Unexpected, "Failed to build data file").with_source(e)
        })
}

fn row_group_offset(row_group: &RowGroupMetaData) -> Option<i64> {
    row_group.file_offset().or_else(|| {
        row_group
            .columns()
            .first()
            .map(|c| c.dictionary_page_offset().unwrap_or(c.data_page_offset()))
    })
}
