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

//! Table schemas.

use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_derive::{Deserialize as DeserializeDerive, Serialize as SerializeDerive};

use super::datatypes::{NestedField, NestedFieldRef};
use crate::{Error, ErrorKind, Result};

/// Type alias for schema id.
pub type SchemaId = i32;
/// Reference to [`Schema`].
pub type SchemaRef = Arc<Schema>;

/// The schema id assigned to the first schema of a table.
pub const DEFAULT_SCHEMA_ID: SchemaId = 0;

/// Defines schema in iceberg.
#[derive(Debug, Clone)]
pub struct Schema {
    schema_id: SchemaId,
    fields: Vec<NestedFieldRef>,
    highest_field_id: i32,

    id_to_index: HashMap<i32, usize>,
    name_to_index: HashMap<String, usize>,
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.schema_id == other.schema_id && self.fields == other.fields
    }
}

impl Eq for Schema {}

/// Schema builder.
#[derive(Debug)]
pub struct SchemaBuilder {
    schema_id: SchemaId,
    fields: Vec<NestedFieldRef>,
}

impl SchemaBuilder {
    /// Add fields to schema builder.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = NestedFieldRef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Set schema id.
    pub fn with_schema_id(mut self, schema_id: SchemaId) -> Self {
        self.schema_id = schema_id;
        self
    }

    /// Builds the schema, rejecting duplicate ids or names.
    pub fn build(self) -> Result<Schema> {
        let mut id_to_index = HashMap::with_capacity(self.fields.len());
        let mut name_to_index = HashMap::with_capacity(self.fields.len());

        for (idx, field) in self.fields.iter().enumerate() {
            if field.id <= 0 {
                return Err(Error::new(
                    ErrorKind::DataInvalid,
                    format!("Field id must be positive: {field}"),
                ));
            }
            if id_to_index.insert(field.id, idx).is_some() {
                return Err(Error::new(
                    ErrorKind::DataInvalid,
                    format!("Duplicate field id {} in schema", field.id),
                ));
            }
            if name_to_index.insert(field.name.clone(), idx).is_some() {
                return Err(Error::new(
                    ErrorKind::DataInvalid,
                    format!("Duplicate field name '{}' in schema", field.name),
                ));
            }
        }

        let highest_field_id = self.fields.iter().map(|f| f.id).max().unwrap_or(0);

        Ok(Schema {
            schema_id: self.schema_id,
            fields: self.fields,
            highest_field_id,
            id_to_index,
            name_to_index,
        })
    }
}

impl Schema {
    /// Create a schema builder.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder {
            schema_id: DEFAULT_SCHEMA_ID,
            fields: vec![],
        }
    }

    /// Create a new schema builder from a schema.
    pub fn into_builder(self) -> SchemaBuilder {
        SchemaBuilder {
            schema_id: self.schema_id,
            fields: self.fields,
        }
    }

    /// Returns a copy of this schema with a different id.
    pub fn with_schema_id(self, schema_id: SchemaId) -> Self {
        Self { schema_id, ..self }
    }

    /// Get field by field id.
    pub fn field_by_id(&self, field_id: i32) -> Option<&NestedFieldRef> {
        self.id_to_index.get(&field_id).map(|idx| &self.fields[*idx])
    }

    /// Get field by field name.
    ///
    /// Lookup is case sensitive.
    pub fn field_by_name(&self, field_name: &str) -> Option<&NestedFieldRef> {
        self.name_to_index
            .get(field_name)
            .map(|idx| &self.fields[*idx])
    }

    /// Get field by field name, ignoring ASCII case.
    pub fn field_by_name_case_insensitive(&self, field_name: &str) -> Option<&NestedFieldRef> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(field_name))
    }

    /// Returns the highest field id in this schema, 0 when empty.
    #[inline]
    pub fn highest_field_id(&self) -> i32 {
        self.highest_field_id
    }

    /// Returns the id of this schema.
    #[inline]
    pub fn schema_id(&self) -> SchemaId {
        self.schema_id
    }

    /// Returns the top-level fields in declaration order.
    #[inline]
    pub fn fields(&self) -> &[NestedFieldRef] {
        &self.fields
    }

    /// Returns the ids of every field in the schema.
    pub fn field_ids(&self) -> HashSet<i32> {
        self.id_to_index.keys().copied().collect()
    }

    /// Whether two schemas declare the same fields, ignoring schema ids.
    pub(crate) fn is_same_schema(&self, other: &Schema) -> bool {
        self.fields == other.fields
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "table {{")?;
        for field in &self.fields {
            writeln!(f, "  {field}")?;
        }
        writeln!(f, "}}")
    }
}

#[derive(SerializeDerive, DeserializeDerive)]
#[serde(rename_all = "kebab-case", tag = "type", rename = "struct")]
struct SchemaSerde {
    schema_id: SchemaId,
    fields: Vec<NestedField>,
}

impl Serialize for Schema {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where S: Serializer {
        SchemaSerde {
            schema_id: self.schema_id,
            fields: self.fields.iter().map(|f| f.as_ref().clone()).collect(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where D: Deserializer<'de> {
        let serde = SchemaSerde::deserialize(deserializer)?;
        Schema::builder()
            .with_schema_id(serde.schema_id)
            .with_fields(serde.fields.into_iter().map(Arc::new))
            .build()
            .map_err(serde::de::Error::custom)
    }
}
