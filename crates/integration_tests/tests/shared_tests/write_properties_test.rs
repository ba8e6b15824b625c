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

//! Parquet writer settings taken from table properties.

use std::path::Path;

use iceberg_commit::spec::{TableProperties, properties_from_json};
use iceberg_commit::table::Table;
use iceberg_commit::writer::WriterConfig;
use iceberg_commit::{Catalog, ErrorKind};
use iceberg_commit_integration_tests::{arrow_table_with_null, props, set_test_fixture};
use parquet::basic::Compression;
use parquet::file::reader::{FileReader, SerializedFileReader};
use serde_json::json;

/// Codec of the first column chunk of the first data file.
async fn first_file_compression(table: &Table) -> Compression {
    let tasks = table.scan().build().unwrap().plan_files().await.unwrap();
    let content = table
        .file_io()
        .new_input(tasks[0].data_file_path())
        .unwrap()
        .read()
        .await
        .unwrap();
    let reader = SerializedFileReader::new(content).unwrap();
    reader.metadata().row_group(0).column(0).compression()
}

#[tokio::test]
async fn test_write_parquet_compression_properties() {
    let fixture = set_test_fixture().await;
    let cases: Vec<(Vec<(&str, &str)>, &str)> = vec![
        (vec![], "ZSTD"),
        (
            vec![("write.parquet.compression-codec", "uncompressed")],
            "UNCOMPRESSED",
        ),
        (
            vec![
                ("write.parquet.compression-codec", "gzip"),
                ("write.parquet.compression-level", "1"),
            ],
            "GZIP",
        ),
        (
            vec![
                ("write.parquet.compression-codec", "zstd"),
                ("write.parquet.compression-level", "1"),
            ],
            "ZSTD",
        ),
        (vec![("write.parquet.compression-codec", "snappy")], "SNAPPY"),
    ];

    for format_version in ["1", "2"] {
        for (properties, expected) in &cases {
            let mut properties: std::collections::HashMap<_, _> = properties
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            properties.insert("format-version".to_string(), format_version.to_string());

            let table = fixture
                .create_table("write_parquet_compression_properties", properties, &[vec![
                    arrow_table_with_null(),
                ]])
                .await;

            let compression = first_file_compression(&table).await;
            let name = match compression {
                Compression::UNCOMPRESSED => "UNCOMPRESSED",
                Compression::GZIP(_) => "GZIP",
                Compression::ZSTD(_) => "ZSTD",
                Compression::SNAPPY => "SNAPPY",
                other => panic!("unexpected codec {other:?}"),
            };
            assert_eq!(name, *expected, "format version {format_version}");
        }
    }
}

#[tokio::test]
async fn test_write_parquet_other_properties() {
    let fixture = set_test_fixture().await;
    for key in [
        TableProperties::PROPERTY_PARQUET_PAGE_SIZE_BYTES,
        TableProperties::PROPERTY_PARQUET_DICT_SIZE_BYTES,
    ] {
        let table = fixture
            .create_table("write_parquet_other_properties", props([(key, "42")]), &[
                vec![arrow_table_with_null()],
            ])
            .await;

        let writer_properties = WriterConfig::try_from(table.properties())
            .unwrap()
            .writer_properties();
        let limit = if key == TableProperties::PROPERTY_PARQUET_PAGE_SIZE_BYTES {
            writer_properties.data_page_size_limit()
        } else {
            writer_properties.dictionary_page_size_limit()
        };
        assert_eq!(limit, 42, "{key}");
        assert!(table.current_snapshot().is_some());
    }
}

#[tokio::test]
async fn test_write_parquet_unsupported_properties() {
    let fixture = set_test_fixture().await;
    for key in [
        "write.parquet.row-group-size-bytes",
        "write.parquet.page-row-limit",
        "write.parquet.bloom-filter-enabled.column.bool",
        "write.parquet.bloom-filter-max-bytes",
    ] {
        let table = fixture
            .create_table("write_parquet_unsupported_properties", props([(key, "42")]), &[])
            .await;

        let err = table
            .append(&fixture.catalog, &[arrow_table_with_null()])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FeatureUnsupported, "{key}");

        let reloaded = fixture.catalog.load_table(table.identifier()).await.unwrap();
        assert!(reloaded.current_snapshot().is_none());

        let data_dir = Path::new(
            table
                .metadata()
                .location()
                .trim_start_matches("file://"),
        )
        .join("data");
        let written = match std::fs::read_dir(&data_dir) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        };
        assert_eq!(written, 0, "{key} left files in {}", data_dir.display());
    }
}

#[tokio::test]
async fn test_table_properties_int_value() {
    let fixture = set_test_fixture().await;
    for format_version in [1, 2] {
        let properties = properties_from_json([
            ("format-version".to_string(), json!(format_version)),
            ("property_name".to_string(), json!(42)),
        ])
        .unwrap();

        let table = fixture
            .create_table("test_table_properties_int_value", properties, &[vec![
                arrow_table_with_null(),
            ]])
            .await;
        assert_eq!(table.property("property_name"), Some("42"));
    }
}

#[tokio::test]
async fn test_table_properties_raise_for_none_value() {
    for format_version in [1, 2] {
        let err = properties_from_json([
            ("format-version".to_string(), json!(format_version)),
            ("property_name".to_string(), json!(null)),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidProperty);
        assert!(
            err.to_string()
                .contains("None type is not a supported value in properties: property_name")
        );
    }
}
