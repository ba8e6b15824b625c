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

use std::sync::Arc;

use arrow_array::RecordBatch;
use arrow_array::builder::StringBuilder;
use arrow_schema::SchemaRef as ArrowSchemaRef;
use futures::{StreamExt, stream};

use crate::Result;
use crate::arrow::schema_to_arrow_schema;
use crate::scan::ArrowRecordBatchStream;
use crate::spec::{NestedField, PrimitiveType, Schema};
use crate::table::Table;

/// Properties table showing table properties as key-value pairs.
///
/// # Schema
///
/// | Column | Type | Description |
/// |--------|------|-------------|
/// | `key` | `String` | Property key |
/// | `value` | `String` | Property value |
///
/// Properties are returned sorted by key for consistent output.
pub struct PropertiesTable<'a> {
    table: &'a Table,
}

impl<'a> PropertiesTable<'a> {
    /// Create a new Properties table instance.
    pub fn new(table: &'a Table) -> Self {
        Self { table }
    }

    /// Returns the Arrow schema of the properties table.
    pub fn schema(&self) -> Result<ArrowSchemaRef> {
        let schema = Schema::builder()
            .with_fields(
                [
                    NestedField::required(1, "key", PrimitiveType::String),
                    NestedField::required(2, "value", PrimitiveType::String),
                ]
                .map(Arc::new),
            )
            .build()?;
        Ok(Arc::new(schema_to_arrow_schema(&schema)?))
    }

    /// Scans the properties table and returns Arrow record batches.
    pub async fn scan(&self) -> Result<ArrowRecordBatchStream> {
        let schema = self.schema()?;

        let mut sorted: Vec<_> = self.table.properties().iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let mut key_builder = StringBuilder::new();
        let mut value_builder = StringBuilder::new();
        for (key, value) in sorted {
            key_builder.append_value(key);
            value_builder.append_value(value);
        }

        let batch = RecordBatch::try_new(schema, vec![
            Arc::new(key_builder.finish()),
            Arc::new(value_builder.finish()),
        ])?;

        Ok(stream::iter(vec![Ok(batch)]).boxed())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use arrow_array::cast::AsArray;
    use futures::TryStreamExt;

    use crate::inspect::tests::create_table;

    #[tokio::test]
    async fn test_properties_table() {
        let (_catalog, table) = create_table(HashMap::from([
            ("write.parquet.compression-codec".to_string(), "snappy".to_string()),
            ("commit.retry.num-retries".to_string(), "2".to_string()),
        ]))
        .await;

        let batches: Vec<_> = table
            .inspect()
            .properties()
            .scan()
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let batch = &batches[0];
        let keys: Vec<_> = batch.column(0).as_string::<i32>().iter().flatten().collect();
        let values: Vec<_> = batch.column(1).as_string::<i32>().iter().flatten().collect();
        assert_eq!(keys, vec![
            "commit.retry.num-retries",
            "write.parquet.compression-codec"
        ]);
        assert_eq!(values, vec!["2", "snappy"]);
    }

    #[tokio::test]
    async fn test_properties_table_schema() {
        let (_catalog, table) = create_table(HashMap::new()).await;
        let schema = table.inspect().properties().schema().unwrap();
        let names: Vec<_> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["key", "value"]);
        assert!(schema.fields().iter().all(|f| !f.is_nullable()));
    }
}
