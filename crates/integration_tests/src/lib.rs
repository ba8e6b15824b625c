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

//! Shared fixtures for the end to end write tests.
//!
//! Every fixture table lives in a [`MemoryCatalog`] whose warehouse is a
//! temporary directory, so committed data and metadata files are real files
//! on disk that the tests read back independently of the writer.

use std::collections::HashMap;
use std::sync::{Arc, Once};

use arrow_array::{
    ArrayRef, BinaryArray, BooleanArray, Date32Array, FixedSizeBinaryArray, Float32Array,
    Float64Array, Int32Array, Int64Array, RecordBatch, StringArray, TimestampMicrosecondArray,
    new_null_array,
};
use arrow_schema::SchemaRef as ArrowSchemaRef;
use iceberg_commit::arrow::{UTC_TIME_ZONE, schema_to_arrow_schema};
use iceberg_commit::io::FileIOBuilder;
use iceberg_commit::spec::{NestedField, PrimitiveType, Schema};
use iceberg_commit::table::Table;
use iceberg_commit::{Catalog, MemoryCatalog, NamespaceIdent, TableCreation, TableIdent};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Namespace every fixture table is created in.
pub const NAMESPACE: &str = "default";

// 2023-01-01T19:25:00 and 2023-03-01T19:25:00 in microseconds since epoch.
const TS_JAN: i64 = 1_672_601_100_000_000;
const TS_MAR: i64 = 1_677_698_700_000_000;
// 2023-01-01 and 2023-03-01 in days since epoch.
const DATE_JAN: i32 = 19_358;
const DATE_MAR: i32 = 19_417;

static INIT_LOGGING: Once = Once::new();

fn set_up() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Holds a catalog and the directory backing its warehouse.
pub struct TestFixture {
    pub catalog: MemoryCatalog,
    _warehouse: TempDir,
}

impl TestFixture {
    /// Identifier of the fixture table `name`.
    pub fn ident(&self, name: &str) -> TableIdent {
        TableIdent::new(NamespaceIdent::new(NAMESPACE.to_string()), name.to_string())
    }

    /// Creates table `name` with [`table_schema`], replacing any previous one,
    /// and appends each entry of `data` as its own snapshot.
    pub async fn create_table(
        &self,
        name: &str,
        properties: HashMap<String, String>,
        data: &[Vec<RecordBatch>],
    ) -> Table {
        self.create_table_with_schema(name, table_schema(), properties, data)
            .await
    }

    /// Like [`TestFixture::create_table`] with a caller supplied schema.
    pub async fn create_table_with_schema(
        &self,
        name: &str,
        schema: Schema,
        properties: HashMap<String, String>,
        data: &[Vec<RecordBatch>],
    ) -> Table {
        let ident = self.ident(name);
        if self.catalog.table_exists(&ident).await.unwrap() {
            self.catalog.drop_table(&ident).await.unwrap();
        }

        let creation = TableCreation::builder()
            .name(name.to_string())
            .schema(schema)
            .properties(properties)
            .build();
        let mut table = self
            .catalog
            .create_table(ident.namespace(), creation)
            .await
            .unwrap();

        for batches in data {
            table = table.append(&self.catalog, batches).await.unwrap();
        }
        table
    }
}

/// Creates a catalog over a fresh temporary warehouse with the
/// [`NAMESPACE`] namespace.
pub async fn set_test_fixture() -> TestFixture {
    set_up();

    let warehouse = TempDir::new().unwrap();
    let file_io = FileIOBuilder::new_fs_io().build().unwrap();
    let catalog = MemoryCatalog::new(file_io, warehouse.path().to_str().unwrap());
    catalog
        .create_namespace(&NamespaceIdent::new(NAMESPACE.to_string()), HashMap::new())
        .await
        .unwrap();

    TestFixture {
        catalog,
        _warehouse: warehouse,
    }
}

/// Shorthand for a property map.
pub fn props<const N: usize>(entries: [(&str, &str); N]) -> HashMap<String, String> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// One optional column of every primitive type the writer covers.
pub fn table_schema() -> Schema {
    Schema::builder()
        .with_fields(
            [
                NestedField::optional(1, "bool", PrimitiveType::Boolean),
                NestedField::optional(2, "string", PrimitiveType::String),
                NestedField::optional(3, "string_long", PrimitiveType::String),
                NestedField::optional(4, "int", PrimitiveType::Int),
                NestedField::optional(5, "long", PrimitiveType::Long),
                NestedField::optional(6, "float", PrimitiveType::Float),
                NestedField::optional(7, "double", PrimitiveType::Double),
                NestedField::optional(8, "timestamp", PrimitiveType::Timestamp),
                NestedField::optional(9, "timestamptz", PrimitiveType::Timestamptz),
                NestedField::optional(10, "date", PrimitiveType::Date),
                NestedField::optional(12, "binary", PrimitiveType::Binary),
                NestedField::optional(13, "fixed", PrimitiveType::Fixed(16)),
            ]
            .map(Arc::new),
        )
        .build()
        .unwrap()
}

/// Arrow schema of [`table_schema`].
pub fn arrow_schema() -> ArrowSchemaRef {
    Arc::new(schema_to_arrow_schema(&table_schema()).unwrap())
}

/// Three rows: a populated one, an all-null one and another populated one.
pub fn arrow_table_with_null() -> RecordBatch {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(BooleanArray::from(vec![Some(false), None, Some(true)])),
        Arc::new(StringArray::from(vec![Some("a"), None, Some("z")])),
        Arc::new(StringArray::from(vec![
            Some("a".repeat(22)),
            None,
            Some("z".repeat(22)),
        ])),
        Arc::new(Int32Array::from(vec![Some(1), None, Some(9)])),
        Arc::new(Int64Array::from(vec![Some(1), None, Some(9)])),
        Arc::new(Float32Array::from(vec![Some(0.0), None, Some(0.9)])),
        Arc::new(Float64Array::from(vec![Some(0.0), None, Some(0.9)])),
        Arc::new(TimestampMicrosecondArray::from(vec![
            Some(TS_JAN),
            None,
            Some(TS_MAR),
        ])),
        Arc::new(
            TimestampMicrosecondArray::from(vec![Some(TS_JAN), None, Some(TS_MAR)])
                .with_timezone(UTC_TIME_ZONE),
        ),
        Arc::new(Date32Array::from(vec![Some(DATE_JAN), None, Some(DATE_MAR)])),
        Arc::new(BinaryArray::from_opt_vec(vec![
            Some(b"\x01".as_slice()),
            None,
            Some(b"\x12".as_slice()),
        ])),
        Arc::new(
            FixedSizeBinaryArray::try_from_sparse_iter_with_size(
                vec![Some([0u8; 16]), None, Some([0x11u8; 16])].into_iter(),
                16,
            )
            .unwrap(),
        ),
    ];
    RecordBatch::try_new(arrow_schema(), columns).unwrap()
}

/// A batch with every column and no rows.
pub fn arrow_table_without_data() -> RecordBatch {
    RecordBatch::new_empty(arrow_schema())
}

/// Two rows where every value is null.
pub fn arrow_table_with_only_nulls() -> RecordBatch {
    let schema = arrow_schema();
    let columns = schema
        .fields()
        .iter()
        .map(|field| new_null_array(field.data_type(), 2))
        .collect();
    RecordBatch::try_new(schema, columns).unwrap()
}
