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

use std::collections::{HashMap, HashSet};

use arrow_array::{ArrayRef, RecordBatch, RecordBatchOptions, new_null_array};
use arrow_cast::cast;
use arrow_schema::SchemaRef as ArrowSchemaRef;

use super::{arrow_type_to_type, get_field_id};
use crate::spec::{PrimitiveType, Schema};
use crate::{Error, ErrorKind, Result};

/// Checks `batch` against the table schema and rewrites it with the table's
/// column order and Arrow types.
///
/// Columns are matched by name. Optional columns absent from the batch are
/// filled with nulls. An unknown or repeated column, a missing required
/// column, nulls in a required column or a type that cannot be widened into
/// the table type are rejected with [`ErrorKind::DataInvalid`].
pub(crate) fn conform_batch(
    batch: &RecordBatch,
    schema: &Schema,
    target: &ArrowSchemaRef,
) -> Result<RecordBatch> {
    let batch_schema = batch.schema();
    let mut seen = HashSet::with_capacity(batch_schema.fields().len());
    if let Some(duplicate) = batch_schema
        .fields()
        .iter()
        .find(|f| !seen.insert(f.name().as_str()))
    {
        return Err(Error::new(
            ErrorKind::DataInvalid,
            format!("Column {} appears more than once in the batch", duplicate.name()),
        ));
    }
    if let Some(unknown) = batch_schema
        .fields()
        .iter()
        .find(|f| schema.field_by_name(f.name()).is_none())
    {
        return Err(Error::new(
            ErrorKind::DataInvalid,
            format!("Column {} is not part of the table schema", unknown.name()),
        )
        .with_context("schema", schema.to_string()));
    }

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(target.fields().len());
    for (table_field, arrow_field) in schema.fields().iter().zip(target.fields()) {
        let Some(column) = batch.column_by_name(&table_field.name) else {
            if table_field.required {
                return Err(Error::new(
                    ErrorKind::DataInvalid,
                    format!("Required column {} is missing", table_field.name),
                ));
            }
            columns.push(new_null_array(arrow_field.data_type(), batch.num_rows()));
            continue;
        };

        let source_type = arrow_type_to_type(column.data_type())?;
        if !is_writable_as(&source_type, &table_field.field_type) {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!(
                    "Column {} has type {}, which cannot be written as {}",
                    table_field.name,
                    column.data_type(),
                    table_field.field_type
                ),
            ));
        }
        if table_field.required && column.null_count() > 0 {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!("Required column {} contains nulls", table_field.name),
            ));
        }

        if column.data_type() == arrow_field.data_type() {
            columns.push(column.clone());
        } else {
            columns.push(cast(column, arrow_field.data_type())?);
        }
    }

    Ok(RecordBatch::try_new_with_options(
        target.clone(),
        columns,
        &RecordBatchOptions::new().with_row_count(Some(batch.num_rows())),
    )?)
}

fn is_writable_as(source: &PrimitiveType, target: &PrimitiveType) -> bool {
    source == target
        || source.is_promotable_to(target)
        || matches!(
            (source, target),
            (PrimitiveType::Fixed(16), PrimitiveType::Uuid)
        )
}

/// Projects a batch read from a data file onto `target` by field id.
///
/// Columns the file does not have are filled with nulls and columns stored
/// with an older, narrower type are cast to the current one.
pub(crate) fn project_batch(batch: &RecordBatch, target: &ArrowSchemaRef) -> Result<RecordBatch> {
    let mut by_id = HashMap::with_capacity(batch.num_columns());
    for (idx, field) in batch.schema().fields().iter().enumerate() {
        if let Some(id) = get_field_id(field)? {
            by_id.insert(id, idx);
        }
    }

    let columns = target
        .fields()
        .iter()
        .map(|field| {
            let column = get_field_id(field)?.and_then(|id| by_id.get(&id));
            match column {
                None => Ok(new_null_array(field.data_type(), batch.num_rows())),
                Some(idx) => {
                    let column = batch.column(*idx);
                    if column.data_type() == field.data_type() {
                        Ok(column.clone())
                    } else {
                        Ok(cast(column, field.data_type())?)
                    }
                }
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RecordBatch::try_new_with_options(
        target.clone(),
        columns,
        &RecordBatchOptions::new().with_row_count(Some(batch.num_rows())),
    )?)
}
