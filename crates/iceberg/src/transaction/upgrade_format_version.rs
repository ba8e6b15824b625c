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

use async_trait::async_trait;

use crate::spec::FormatVersion;
use crate::table::Table;
use crate::transaction::action::{ActionCommit, TransactionAction};
use crate::{Error, ErrorKind, Result, TableUpdate};

/// An action that upgrades the format version of a table.
///
/// Upgrading to the current version is a no-op. Downgrades fail with
/// [`ErrorKind::DataInvalid`].
pub struct UpgradeFormatVersionAction {
    format_version: Option<FormatVersion>,
}

impl UpgradeFormatVersionAction {
    pub(crate) fn new() -> Self {
        UpgradeFormatVersionAction {
            format_version: None,
        }
    }

    /// Sets the target format version.
    pub fn set_format_version(mut self, format_version: FormatVersion) -> Self {
        self.format_version = Some(format_version);
        self
    }
}

#[async_trait]
impl TransactionAction for UpgradeFormatVersionAction {
    async fn commit(self: Arc<Self>, table: &Table) -> Result<ActionCommit> {
        let format_version = self.format_version.ok_or_else(|| {
            Error::new(
                ErrorKind::DataInvalid,
                "FormatVersion is not set for UpgradeFormatVersionAction!",
            )
        })?;

        let current = table.metadata().format_version();
        if format_version < current {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!("Cannot downgrade FormatVersion from {current} to {format_version}"),
            ));
        }
        if format_version == current {
            return Ok(ActionCommit::default());
        }

        Ok(ActionCommit::new(
            vec![TableUpdate::UpgradeFormatVersion { format_version }],
            vec![],
        ))
    }
}
