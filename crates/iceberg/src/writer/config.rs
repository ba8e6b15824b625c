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

use std::collections::HashMap;

use parquet::basic::{BrotliLevel, Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;

use crate::spec::{TableProperties, parse_property};
use crate::{Error, ErrorKind, Result};

/// Parquet writer settings read from table properties.
#[derive(Debug, Clone, PartialEq)]
pub struct WriterConfig {
    /// Byte size of the in-memory rows that go into one file.
    pub target_file_size_bytes: usize,
    /// Codec and level of the column chunks.
    pub compression: Compression,
    /// Best-effort byte limit of a data page.
    pub data_page_size_limit: usize,
    /// Best-effort byte limit of a dictionary page.
    pub dictionary_page_size_limit: usize,
}

impl WriterConfig {
    /// Builds the parquet [`WriterProperties`] for this config.
    pub fn writer_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_data_page_size_limit(self.data_page_size_limit)
            .set_dictionary_page_size_limit(self.dictionary_page_size_limit)
            .build()
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            target_file_size_bytes: TableProperties::PROPERTY_WRITE_TARGET_FILE_SIZE_BYTES_DEFAULT,
            compression: Compression::ZSTD(ZstdLevel::default()),
            data_page_size_limit: TableProperties::PROPERTY_PARQUET_PAGE_SIZE_BYTES_DEFAULT,
            dictionary_page_size_limit: TableProperties::PROPERTY_PARQUET_DICT_SIZE_BYTES_DEFAULT,
        }
    }
}

impl TryFrom<&HashMap<String, String>> for WriterConfig {
    type Error = Error;

    fn try_from(props: &HashMap<String, String>) -> Result<Self> {
        reject_unsupported(props)?;

        let target_file_size_bytes = parse_property(
            props,
            TableProperties::PROPERTY_WRITE_TARGET_FILE_SIZE_BYTES,
            TableProperties::PROPERTY_WRITE_TARGET_FILE_SIZE_BYTES_DEFAULT,
        )?;
        if target_file_size_bytes == 0 {
            return Err(Error::new(
                ErrorKind::InvalidProperty,
                format!(
                    "{} must be positive",
                    TableProperties::PROPERTY_WRITE_TARGET_FILE_SIZE_BYTES
                ),
            ));
        }

        let codec = props
            .get(TableProperties::PROPERTY_PARQUET_COMPRESSION_CODEC)
            .map(String::as_str)
            .unwrap_or(TableProperties::PROPERTY_PARQUET_COMPRESSION_CODEC_DEFAULT);
        let level = props
            .get(TableProperties::PROPERTY_PARQUET_COMPRESSION_LEVEL)
            .map(|_| parse_property(props, TableProperties::PROPERTY_PARQUET_COMPRESSION_LEVEL, 0i32))
            .transpose()?;

        Ok(WriterConfig {
            target_file_size_bytes,
            compression: parse_compression(codec, level)?,
            data_page_size_limit: parse_property(
                props,
                TableProperties::PROPERTY_PARQUET_PAGE_SIZE_BYTES,
                TableProperties::PROPERTY_PARQUET_PAGE_SIZE_BYTES_DEFAULT,
            )?,
            dictionary_page_size_limit: parse_property(
                props,
                TableProperties::PROPERTY_PARQUET_DICT_SIZE_BYTES,
                TableProperties::PROPERTY_PARQUET_DICT_SIZE_BYTES_DEFAULT,
            )?,
        })
    }
}

fn reject_unsupported(props: &HashMap<String, String>) -> Result<()> {
    const UNSUPPORTED: [&str; 3] = [
        TableProperties::PROPERTY_PARQUET_ROW_GROUP_SIZE_BYTES,
        TableProperties::PROPERTY_PARQUET_PAGE_ROW_LIMIT,
        TableProperties::PROPERTY_PARQUET_BLOOM_FILTER_MAX_BYTES,
    ];

    let unsupported = props.keys().find(|key| {
        UNSUPPORTED.contains(&key.as_str())
            || key.starts_with(TableProperties::PROPERTY_PARQUET_BLOOM_FILTER_COLUMN_ENABLED_PREFIX)
    });
    match unsupported {
        Some(key) => Err(Error::new(
            ErrorKind::FeatureUnsupported,
            format!("Writing with property {key} is not supported"),
        )),
        None => Ok(()),
    }
}

fn check_level(codec: &str, level: i32, min: i32, max: i32) -> Result<()> {
    if level < min || level > max {
        return Err(Error::new(
            ErrorKind::InvalidProperty,
            format!("Compression level {level} is out of range {min}-{max} for {codec}"),
        ));
    }
    Ok(())
}

fn parse_compression(codec: &str, level: Option<i32>) -> Result<Compression> {
    let compression = match codec.trim().to_ascii_lowercase().as_str() {
        "uncompressed" | "none" => Compression::UNCOMPRESSED,
        "snappy" => Compression::SNAPPY,
        "lz4" => Compression::LZ4_RAW,
        "gzip" => match level {
            Some(level) => {
                check_level(codec, level, 0, 9)?;
                Compression::GZIP(GzipLevel::try_new(level as u32)?)
            }
            None => Compression::GZIP(GzipLevel::default()),
        },
        "zstd" => match level {
            Some(level) => {
                check_level(codec, level, 1, 22)?;
                Compression::ZSTD(ZstdLevel::try_new(level)?)
            }
            None => Compression::ZSTD(ZstdLevel::default()),
        },
        "brotli" => match level {
            Some(level) => {
                check_level(codec, level, 0, 11)?;
                Compression::BROTLI(BrotliLevel::try_new(level as u32)?)
            }
            None => Compression::BROTLI(BrotliLevel::default()),
        },
        _ => {
            return Err(Error::new(
                ErrorKind::InvalidProperty,
                format!("Unknown compression codec: {codec}"),
            ));
        }
    };
    Ok(compression)
}
