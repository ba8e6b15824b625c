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

//! Conversion between table schemas and Arrow schemas.

use std::collections::HashMap;
use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema as ArrowSchema, TimeUnit};
use parquet::arrow::PARQUET_FIELD_ID_META_KEY;

use crate::spec::{NestedField, PrimitiveType, Schema};
use crate::{Error, ErrorKind, Result};

/// Timezone attached to `timestamptz` columns.
pub const UTC_TIME_ZONE: &str = "+00:00";

const DECIMAL128_MAX_PRECISION: u32 = 38;

/// Converts a primitive type to its Arrow representation.
pub fn type_to_arrow_type(ty: &PrimitiveType) -> Result<DataType> {
    Ok(match ty {
        PrimitiveType::Boolean => DataType::Boolean,
        PrimitiveType::Int => DataType::Int32,
        PrimitiveType::Long => DataType::Int64,
        PrimitiveType::Float => DataType::Float32,
        PrimitiveType::Double => DataType::Float64,
        PrimitiveType::Decimal { precision, scale } => {
            let (precision, scale) = (u8::try_from(*precision), i8::try_from(*scale));
            match (precision, scale) {
                (Ok(precision), Ok(scale)) => DataType::Decimal128(precision, scale),
                _ => {
                    return Err(Error::new(
                        ErrorKind::DataInvalid,
                        format!("Decimal type {ty} is out of range for arrow"),
                    ));
                }
            }
        }
        PrimitiveType::Date => DataType::Date32,
        PrimitiveType::Time => DataType::Time64(TimeUnit::Microsecond),
        PrimitiveType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
        PrimitiveType::Timestamptz => {
            DataType::Timestamp(TimeUnit::Microsecond, Some(UTC_TIME_ZONE.into()))
        }
        PrimitiveType::String => DataType::Utf8,
        PrimitiveType::Uuid => DataType::FixedSizeBinary(16),
        PrimitiveType::Fixed(len) => DataType::FixedSizeBinary(i32::try_from(*len).map_err(
            |_| {
                Error::new(
                    ErrorKind::DataInvalid,
                    format!("Fixed type length {len} is out of range for arrow"),
                )
            },
        )?),
        PrimitiveType::Binary => DataType::Binary,
    })
}

/// Converts an Arrow type to the primitive type that stores it.
///
/// Narrow integers are stored as `int`, every string flavour as `string` and
/// every binary flavour as `binary`. Nested types are not supported.
pub fn arrow_type_to_type(ty: &DataType) -> Result<PrimitiveType> {
    Ok(match ty {
        DataType::Boolean => PrimitiveType::Boolean,
        DataType::Int8 | DataType::Int16 | DataType::Int32 => PrimitiveType::Int,
        DataType::UInt8 | DataType::UInt16 => PrimitiveType::Int,
        DataType::Int64 | DataType::UInt32 => PrimitiveType::Long,
        DataType::Float16 | DataType::Float32 => PrimitiveType::Float,
        DataType::Float64 => PrimitiveType::Double,
        DataType::Decimal128(precision, scale) if *scale >= 0 => {
            let precision = u32::from(*precision);
            if precision > DECIMAL128_MAX_PRECISION {
                return Err(Error::new(
                    ErrorKind::DataInvalid,
                    format!("Decimal precision {precision} exceeds {DECIMAL128_MAX_PRECISION}"),
                ));
            }
            PrimitiveType::Decimal {
                precision,
                scale: *scale as u32,
            }
        }
        DataType::Date32 => PrimitiveType::Date,
        DataType::Time64(TimeUnit::Microsecond) => PrimitiveType::Time,
        DataType::Timestamp(_, None) => PrimitiveType::Timestamp,
        DataType::Timestamp(_, Some(_)) => PrimitiveType::Timestamptz,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => PrimitiveType::String,
        DataType::Binary | DataType::LargeBinary | DataType::BinaryView => PrimitiveType::Binary,
        DataType::FixedSizeBinary(len) if *len > 0 => PrimitiveType::Fixed(*len as u64),
        DataType::List(_)
        | DataType::LargeList(_)
        | DataType::FixedSizeList(_, _)
        | DataType::Struct(_)
        | DataType::Map(_, _) => {
            return Err(Error::new(
                ErrorKind::FeatureUnsupported,
                format!("Nested arrow type {ty} is not supported"),
            ));
        }
        _ => {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!("Arrow type {ty} has no table type counterpart"),
            ));
        }
    })
}

/// Reads the field id stored under [`PARQUET_FIELD_ID_META_KEY`].
pub fn get_field_id(field: &Field) -> Result<Option<i32>> {
    field
        .metadata()
        .get(PARQUET_FIELD_ID_META_KEY)
        .map(|value| {
            value.parse::<i32>().map_err(|e| {
                Error::new(
                    ErrorKind::DataInvalid,
                    format!("Invalid field id for arrow field {}", field.name()),
                )
                .with_context("value", value.clone())
                .with_source(e)
            })
        })
        .transpose()
}

/// Converts a table field to an Arrow field carrying its field id.
pub fn field_to_arrow_field(field: &NestedField) -> Result<Field> {
    Ok(
        Field::new(&field.name, type_to_arrow_type(&field.field_type)?, !field.required)
            .with_metadata(HashMap::from([(
                PARQUET_FIELD_ID_META_KEY.to_string(),
                field.id.to_string(),
            )])),
    )
}

/// Converts a table schema to an Arrow schema.
pub fn schema_to_arrow_schema(schema: &Schema) -> Result<ArrowSchema> {
    let fields = schema
        .fields()
        .iter()
        .map(|f| field_to_arrow_field(f))
        .collect::<Result<Vec<_>>>()?;
    Ok(ArrowSchema::new(fields))
}

/// Converts an Arrow schema to a table schema.
///
/// Field ids come from the field metadata when every field carries one.
/// Otherwise ids are assigned sequentially from 1 in field order.
pub fn arrow_schema_to_schema(schema: &ArrowSchema) -> Result<Schema> {
    let ids = schema
        .fields()
        .iter()
        .map(|f| get_field_id(f))
        .collect::<Result<Vec<_>>>()?;
    let has_ids = ids.iter().all(Option::is_some);

    let fields = schema
        .fields()
        .iter()
        .zip(ids)
        .enumerate()
        .map(|(pos, (field, id))| {
            let id = match id {
                Some(id) if has_ids => id,
                _ => pos as i32 + 1,
            };
            let field_type = arrow_type_to_type(field.data_type())?;
            Ok(Arc::new(if field.is_nullable() {
                NestedField::optional(id, field.name(), field_type)
            } else {
                NestedField::required(id, field.name(), field_type)
            }))
        })
        .collect::<Result<Vec<_>>>()?;

    Schema::builder().with_fields(fields).build()
}
