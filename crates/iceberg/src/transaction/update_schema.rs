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

//! Schema evolution for top-level columns.
//!
//! Columns are tracked by field id, so renames, drops and type promotions
//! never touch existing data files. Ids handed out here always start above
//! the table's `last-column-id`, which means a dropped id is never reused.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::spec::{NestedField, NestedFieldRef, PrimitiveType, Schema};
use crate::table::Table;
use crate::transaction::action::{ActionCommit, TransactionAction};
use crate::{Error, ErrorKind, Result, TableRequirement, TableUpdate};

#[derive(Debug, Clone)]
enum SchemaUpdateOperation {
    AddColumn {
        name: String,
        field_type: PrimitiveType,
        required: bool,
    },
    RenameColumn {
        name: String,
        new_name: String,
    },
    DropColumn {
        name: String,
    },
    UpdateColumn {
        name: String,
        field_type: PrimitiveType,
    },
    MakeOptional {
        name: String,
    },
    UnionByName {
        schema: Schema,
    },
}

/// Transactional schema update action.
///
/// Edits are applied in the order they were added. An update that leaves the
/// schema unchanged commits nothing.
///
/// # Example
///
/// ```ignore
/// let tx = Transaction::new(&table);
/// let tx = tx
///     .update_schema()
///     .add_column("comment", PrimitiveType::String)
///     .update_column("value", PrimitiveType::Long)
///     .apply(tx)?;
/// ```
pub struct UpdateSchemaAction {
    operations: Vec<SchemaUpdateOperation>,
}

impl UpdateSchemaAction {
    pub(crate) fn new() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    /// Add an optional column.
    pub fn add_column(mut self, name: impl Into<String>, field_type: PrimitiveType) -> Self {
        self.operations.push(SchemaUpdateOperation::AddColumn {
            name: name.into(),
            field_type,
            required: false,
        });
        self
    }

    /// Add a required column.
    ///
    /// Existing rows would have no value for it, so this is only allowed
    /// while the table has no snapshot.
    pub fn add_required_column(
        mut self,
        name: impl Into<String>,
        field_type: PrimitiveType,
    ) -> Self {
        self.operations.push(SchemaUpdateOperation::AddColumn {
            name: name.into(),
            field_type,
            required: true,
        });
        self
    }

    /// Rename a column, keeping its field id.
    pub fn rename_column(mut self, name: impl Into<String>, new_name: impl Into<String>) -> Self {
        self.operations.push(SchemaUpdateOperation::RenameColumn {
            name: name.into(),
            new_name: new_name.into(),
        });
        self
    }

    /// Drop a column.
    pub fn drop_column(mut self, name: impl Into<String>) -> Self {
        self.operations
            .push(SchemaUpdateOperation::DropColumn { name: name.into() });
        self
    }

    /// Widen the type of a column, e.g. `int` to `long`.
    pub fn update_column(mut self, name: impl Into<String>, field_type: PrimitiveType) -> Self {
        self.operations.push(SchemaUpdateOperation::UpdateColumn {
            name: name.into(),
            field_type,
        });
        self
    }

    /// Relax a required column to optional.
    pub fn make_column_optional(mut self, name: impl Into<String>) -> Self {
        self.operations
            .push(SchemaUpdateOperation::MakeOptional { name: name.into() });
        self
    }

    /// Merge `schema` into the table schema by column name.
    ///
    /// Matching is case sensitive. Matched columns keep their id and may be
    /// promoted or relaxed to optional. Unmatched columns are appended as
    /// optional columns with fresh ids. Columns missing from `schema` are kept.
    pub fn union_by_name(mut self, schema: Schema) -> Self {
        self.operations
            .push(SchemaUpdateOperation::UnionByName { schema });
        self
    }

    fn apply_operations(&self, table: &Table) -> Result<Schema> {
        let metadata = table.metadata();
        let current_schema = metadata.current_schema();
        let mut evolver = SchemaEvolver {
            fields: current_schema.fields().to_vec(),
            last_column_id: metadata.last_column_id(),
            has_snapshot: metadata.current_snapshot_id().is_some(),
        };

        for op in &self.operations {
            match op {
                SchemaUpdateOperation::AddColumn {
                    name,
                    field_type,
                    required,
                } => evolver.add_column(name, field_type.clone(), *required)?,
                SchemaUpdateOperation::RenameColumn { name, new_name } => {
                    evolver.rename_column(name, new_name)?
                }
                SchemaUpdateOperation::DropColumn { name } => evolver.drop_column(name)?,
                SchemaUpdateOperation::UpdateColumn { name, field_type } => {
                    let index = evolver.index_of(name)?;
                    evolver.promote(index, field_type)?
                }
                SchemaUpdateOperation::MakeOptional { name } => {
                    let index = evolver.index_of(name)?;
                    evolver.make_optional(index)
                }
                SchemaUpdateOperation::UnionByName { schema } => evolver.union_by_name(schema)?,
            }
        }

        Schema::builder()
            .with_schema_id(current_schema.schema_id())
            .with_fields(evolver.fields)
            .build()
    }
}

/// Working copy of the column list while edits are applied.
struct SchemaEvolver {
    fields: Vec<NestedFieldRef>,
    last_column_id: i32,
    has_snapshot: bool,
}

impl SchemaEvolver {
    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.position(name).ok_or_else(|| {
            Error::new(
                ErrorKind::DataInvalid,
                format!("Column '{name}' does not exist"),
            )
        })
    }

    /// Fails if `name` is free but another column differs from it only by case.
    ///
    /// The column at `skip`, if any, is left out of the comparison.
    fn ensure_unambiguous(&self, name: &str, skip: Option<usize>) -> Result<()> {
        if let Some(existing) = self
            .fields
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .map(|(_, f)| f)
            .find(|f| f.name != name && f.name.eq_ignore_ascii_case(name))
        {
            return Err(Error::new(
                ErrorKind::IncompatibleSchemaChange,
                format!(
                    "Column '{name}' is ambiguous with existing column '{}'",
                    existing.name
                ),
            ));
        }
        Ok(())
    }

    fn add_column(&mut self, name: &str, field_type: PrimitiveType, required: bool) -> Result<()> {
        ensure_top_level_name(name)?;
        if self.position(name).is_some() {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!("Column '{name}' already exists"),
            ));
        }
        self.ensure_unambiguous(name, None)?;
        if required && self.has_snapshot {
            return Err(Error::new(
                ErrorKind::IncompatibleSchemaChange,
                format!("Cannot add required column '{name}' to a table with data"),
            ));
        }

        self.last_column_id += 1;
        let field = if required {
            NestedField::required(self.last_column_id, name, field_type)
        } else {
            NestedField::optional(self.last_column_id, name, field_type)
        };
        self.fields.push(Arc::new(field));
        Ok(())
    }

    fn rename_column(&mut self, name: &str, new_name: &str) -> Result<()> {
        ensure_top_level_name(new_name)?;
        let index = self.index_of(name)?;
        if name == new_name {
            return Ok(());
        }
        if self.position(new_name).is_some() {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!("Column '{new_name}' already exists"),
            ));
        }
        self.ensure_unambiguous(new_name, Some(index))?;

        let mut field = (*self.fields[index]).clone();
        field.name = new_name.to_string();
        self.fields[index] = Arc::new(field);
        Ok(())
    }

    fn drop_column(&mut self, name: &str) -> Result<()> {
        let index = self.index_of(name)?;
        if self.fields.len() == 1 {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!("Cannot drop '{name}', the last column of the table"),
            ));
        }
        self.fields.remove(index);
        Ok(())
    }

    fn promote(&mut self, index: usize, field_type: &PrimitiveType) -> Result<()> {
        let current = &self.fields[index];
        if &current.field_type == field_type {
            return Ok(());
        }
        if !current.field_type.is_promotable_to(field_type) {
            return Err(Error::new(
                ErrorKind::IncompatibleSchemaChange,
                format!(
                    "Cannot change column '{}' from {} to {}",
                    current.name, current.field_type, field_type
                ),
            ));
        }

        let mut field = (**current).clone();
        field.field_type = field_type.clone();
        self.fields[index] = Arc::new(field);
        Ok(())
    }

    fn make_optional(&mut self, index: usize) {
        if self.fields[index].required {
            let mut field = (*self.fields[index]).clone();
            field.required = false;
            self.fields[index] = Arc::new(field);
        }
    }

    fn union_by_name(&mut self, schema: &Schema) -> Result<()> {
        for new_field in schema.fields() {
            match self.position(&new_field.name) {
                Some(index) => {
                    self.promote(index, &new_field.field_type)?;
                    if !new_field.required {
                        self.make_optional(index);
                    }
                }
                None => self.add_column(&new_field.name, new_field.field_type.clone(), false)?,
            }
        }
        Ok(())
    }
}

fn ensure_top_level_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::new(
            ErrorKind::DataInvalid,
            "Column name must not be empty",
        ));
    }
    if name.contains('.') {
        return Err(Error::new(
            ErrorKind::FeatureUnsupported,
            format!("Nested field paths are not supported: '{name}'"),
        ));
    }
    Ok(())
}

#[async_trait]
impl TransactionAction for UpdateSchemaAction {
    async fn commit(self: Arc<Self>, table: &Table) -> Result<ActionCommit> {
        let new_schema = self.apply_operations(table)?;
        let metadata = table.metadata();
        if new_schema.is_same_schema(metadata.current_schema()) {
            debug!("schema update is a no-op");
            return Ok(ActionCommit::default());
        }

        let current_schema_id = metadata.current_schema_id();
        let last_assigned_field_id = metadata.last_column_id();

        let updates = vec![
            TableUpdate::AddSchema { schema: new_schema },
            TableUpdate::SetCurrentSchema { schema_id: -1 },
        ];

        let requirements = vec![
            TableRequirement::CurrentSchemaIdMatch { current_schema_id },
            TableRequirement::LastAssignedFieldIdMatch {
                last_assigned_field_id,
            },
        ];

        Ok(ActionCommit::new(updates, requirements))
    }
}
