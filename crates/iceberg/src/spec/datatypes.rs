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

//! Data types of table columns.
//!
//! Only primitive top-level columns are modelled. Each type serializes to the
//! Iceberg JSON type string (`"long"`, `"decimal(9,2)"`, `"fixed[16]"`, ...).

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::{Error as DeError, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_derive::{Deserialize as DeserializeDerive, Serialize as SerializeDerive};

use crate::{Error, ErrorKind, Result};

/// Reference to [`NestedField`].
pub type NestedFieldRef = Arc<NestedField>;

const MAX_DECIMAL_PRECISION: u32 = 38;

/// Primitive data types
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum PrimitiveType {
    /// True or False
    Boolean,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    /// 32-bit IEEE 754 floating point.
    Float,
    /// 64-bit IEEE 754 floating point.
    Double,
    /// Fixed point decimal
    Decimal {
        /// Precision, must be 38 or less
        precision: u32,
        /// Scale
        scale: u32,
    },
    /// Calendar date without timezone or time.
    Date,
    /// Time of day in microsecond precision, without date or timezone.
    Time,
    /// Timestamp in microsecond precision, without timezone
    Timestamp,
    /// Timestamp in microsecond precision, with timezone
    Timestamptz,
    /// Arbitrary-length character sequences encoded in utf-8
    String,
    /// Universally Unique Identifiers, should use 16-byte fixed
    Uuid,
    /// Fixed length byte array
    Fixed(u64),
    /// Arbitrary-length byte array.
    Binary,
}

impl PrimitiveType {
    /// Whether a column of this type can be widened to `target` without
    /// rewriting data files.
    ///
    /// Identity is not a promotion; callers compare for equality first.
    pub fn is_promotable_to(&self, target: &PrimitiveType) -> bool {
        match (self, target) {
            (PrimitiveType::Int, PrimitiveType::Long) => true,
            (PrimitiveType::Float, PrimitiveType::Double) => true,
            (
                PrimitiveType::Decimal { precision, scale },
                PrimitiveType::Decimal {
                    precision: target_precision,
                    scale: target_scale,
                },
            ) => scale == target_scale && target_precision > precision,
            _ => false,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveType::Boolean => write!(f, "boolean"),
            PrimitiveType::Int => write!(f, "int"),
            PrimitiveType::Long => write!(f, "long"),
            PrimitiveType::Float => write!(f, "float"),
            PrimitiveType::Double => write!(f, "double"),
            PrimitiveType::Decimal { precision, scale } => {
                write!(f, "decimal({precision},{scale})")
            }
            PrimitiveType::Date => write!(f, "date"),
            PrimitiveType::Time => write!(f, "time"),
            PrimitiveType::Timestamp => write!(f, "timestamp"),
            PrimitiveType::Timestamptz => write!(f, "timestamptz"),
            PrimitiveType::String => write!(f, "string"),
            PrimitiveType::Uuid => write!(f, "uuid"),
            PrimitiveType::Fixed(size) => write!(f, "fixed[{size}]"),
            PrimitiveType::Binary => write!(f, "binary"),
        }
    }
}

impl FromStr for PrimitiveType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let ty = match s {
            "boolean" => PrimitiveType::Boolean,
            "int" => PrimitiveType::Int,
            "long" => PrimitiveType::Long,
            "float" => PrimitiveType::Float,
            "double" => PrimitiveType::Double,
            "date" => PrimitiveType::Date,
            "time" => PrimitiveType::Time,
            "timestamp" => PrimitiveType::Timestamp,
            "timestamptz" => PrimitiveType::Timestamptz,
            "string" => PrimitiveType::String,
            "uuid" => PrimitiveType::Uuid,
            "binary" => PrimitiveType::Binary,
            _ => {
                if let Some(inner) = s.strip_prefix("fixed[").and_then(|s| s.strip_suffix(']')) {
                    PrimitiveType::Fixed(inner.trim().parse()?)
                } else if let Some(inner) =
                    s.strip_prefix("decimal(").and_then(|s| s.strip_suffix(')'))
                {
                    let (precision, scale) = inner.split_once(',').ok_or_else(|| {
                        Error::new(
                            ErrorKind::DataInvalid,
                            format!("Invalid decimal type: {s}"),
                        )
                    })?;
                    let precision: u32 = precision.trim().parse()?;
                    if precision == 0 || precision > MAX_DECIMAL_PRECISION {
                        return Err(Error::new(
                            ErrorKind::DataInvalid,
                            format!(
                                "Decimal precision must be in [1, {MAX_DECIMAL_PRECISION}], got {precision}"
                            ),
                        ));
                    }
                    PrimitiveType::Decimal {
                        precision,
                        scale: scale.trim().parse()?,
                    }
                } else {
                    return Err(Error::new(
                        ErrorKind::FeatureUnsupported,
                        format!("Unsupported column type: {s}"),
                    ));
                }
            }
        };
        Ok(ty)
    }
}

impl Serialize for PrimitiveType {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PrimitiveType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where D: Deserializer<'de> {
        struct PrimitiveTypeVisitor;

        impl Visitor<'_> for PrimitiveTypeVisitor {
            type Value = PrimitiveType;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an iceberg primitive type string")
            }

            fn visit_str<E: DeError>(self, v: &str) -> std::result::Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(PrimitiveTypeVisitor)
    }
}

/// A field of a table schema.
#[derive(Debug, PartialEq, Eq, Clone, SerializeDerive, DeserializeDerive)]
#[serde(rename_all = "kebab-case")]
pub struct NestedField {
    /// Id unique in table schema
    pub id: i32,
    /// Field Name
    pub name: String,
    /// Optional or required
    pub required: bool,
    /// Datatype
    #[serde(rename = "type")]
    pub field_type: PrimitiveType,
    /// Fields may have an optional comment or doc string.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub doc: Option<String>,
}

impl NestedField {
    /// Construct a required field.
    pub fn required(id: i32, name: impl ToString, field_type: PrimitiveType) -> Self {
        Self {
            id,
            name: name.to_string(),
            required: true,
            field_type,
            doc: None,
        }
    }

    /// Construct an optional field.
    pub fn optional(id: i32, name: impl ToString, field_type: PrimitiveType) -> Self {
        Self {
            id,
            name: name.to_string(),
            required: false,
            field_type,
            doc: None,
        }
    }

    /// Set the field's doc.
    pub fn with_doc(mut self, doc: impl ToString) -> Self {
        self.doc = Some(doc.to_string());
        self
    }
}

impl fmt::Display for NestedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.id)?;
        write!(f, "{}: ", self.name)?;
        if self.required {
            write!(f, "required ")?;
        } else {
            write!(f, "optional ")?;
        }
        write!(f, "{}", self.field_type)
    }
}
