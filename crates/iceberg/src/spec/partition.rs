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

//! Partition specs.
//!
//! Tables written by this crate are unpartitioned. The partition spec is still
//! recorded in table metadata and manifests so that readers see the usual
//! `partition-spec-id` bookkeeping.

use std::sync::Arc;

use serde_derive::{Deserialize, Serialize};

use crate::{Error, ErrorKind, Result};

/// Reference to [`PartitionSpec`].
pub type PartitionSpecRef = Arc<PartitionSpec>;

/// Id of the unpartitioned spec every table starts with.
pub const DEFAULT_PARTITION_SPEC_ID: i32 = 0;

/// Partition fields capture the transform from table data to partition values.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct PartitionField {
    /// A source column id from the table’s schema
    pub source_id: i32,
    /// A partition field id that is used to identify a partition field and is unique within a partition spec.
    pub field_id: i32,
    /// A partition name.
    pub name: String,
    /// A transform that is applied to the source column to produce a partition value.
    pub transform: String,
}

/// Partition spec that defines how to produce a tuple of partition values from a record.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct PartitionSpec {
    /// Identifier for PartitionSpec
    spec_id: i32,
    /// Details of the partition spec
    fields: Vec<PartitionField>,
}

impl PartitionSpec {
    /// The spec that places every row in a single partition.
    pub fn unpartition_spec() -> Self {
        Self {
            spec_id: DEFAULT_PARTITION_SPEC_ID,
            fields: vec![],
        }
    }

    /// Builds a spec from explicit fields.
    ///
    /// Only the unpartitioned layout can be written, so any field is rejected.
    pub fn try_new(spec_id: i32, fields: Vec<PartitionField>) -> Result<Self> {
        if !fields.is_empty() {
            return Err(Error::new(
                ErrorKind::FeatureUnsupported,
                format!(
                    "Partitioned tables are not supported, got partition fields: [{}]",
                    fields
                        .iter()
                        .map(|f| f.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ));
        }
        Ok(Self { spec_id, fields })
    }

    /// Spec id of this partition spec.
    pub fn spec_id(&self) -> i32 {
        self.spec_id
    }

    /// Fields of this partition spec.
    pub fn fields(&self) -> &[PartitionField] {
        &self.fields
    }

    /// Returns if the partition spec is unpartitioned.
    pub fn is_unpartitioned(&self) -> bool {
        self.fields.is_empty()
    }
}
