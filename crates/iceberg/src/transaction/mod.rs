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

//! This module contains transaction api.
//!
//! The transaction API enables changes to be made to an existing table.
//! Actions are staged on a [`Transaction`] and only reach the catalog when the
//! transaction is committed, as one atomic [`TableCommit`].
//!
//! Note that staging may have side effects, such as producing new manifest
//! files. A transaction that is dropped before commit leaves those files
//! unreferenced but never changes the table.
//!
//! Below is a basic example using the "fast-append" action:
//!
//! ```ignore
//! use iceberg_commit::transaction::{ApplyTransactionAction, Transaction};
//!
//! // Create a transaction.
//! let tx = Transaction::new(&table);
//!
//! // Create a `FastAppendAction` which will not rewrite or append
//! // to existing metadata. This will create a new manifest.
//! let action = tx.fast_append().add_data_files(my_data_files);
//!
//! // Apply the fast-append action to the given transaction, returning
//! // the newly updated `Transaction`.
//! let tx = action.apply(tx)?;
//!
//! // End the transaction by committing to a `Catalog` implementation.
//! let table = tx.commit(&catalog).await?;
//! ```

mod action;

pub use action::*;
pub use append::FastAppendAction;
pub use overwrite::OverwriteAction;
pub use update_properties::UpdatePropertiesAction;
pub use update_schema::UpdateSchemaAction;
pub use upgrade_format_version::UpgradeFormatVersionAction;
mod append;
#[cfg(test)]
mod concurrent;
mod overwrite;
mod snapshot;
mod update_properties;
mod update_schema;
mod upgrade_format_version;

use std::collections::HashSet;
use std::mem::discriminant;
use std::sync::Arc;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder, RetryableWithContext};
use tracing::{info, warn};

use crate::error::Result;
use crate::spec::TableProperties;
use crate::table::Table;
use crate::transaction::action::BoxedTransactionAction;
use crate::{Catalog, Error, ErrorKind, TableCommit, TableRequirement, TableUpdate};

/// Table transaction.
#[derive(Clone)]
pub struct Transaction {
    table: Table,
    actions: Vec<BoxedTransactionAction>,
}

impl Transaction {
    /// Creates a new transaction.
    pub fn new(table: &Table) -> Self {
        Self {
            table: table.clone(),
            actions: vec![],
        }
    }

    fn update_table_metadata(table: Table, updates: &[TableUpdate]) -> Result<Table> {
        let mut metadata_builder = table.metadata().clone().into_builder(None);
        for update in updates {
            metadata_builder = update.clone().apply(metadata_builder)?;
        }

        Ok(table.with_metadata(Arc::new(metadata_builder.build()?.metadata)))
    }

    /// Applies an [`ActionCommit`] to the given [`Table`], returning a new [`Table`] with updated metadata.
    /// Also appends any derived [`TableUpdate`]s and [`TableRequirement`]s to the provided vectors.
    fn apply(
        table: Table,
        mut action_commit: ActionCommit,
        existing_updates: &mut Vec<TableUpdate>,
        existing_requirements: &mut Vec<TableRequirement>,
    ) -> Result<Table> {
        let updates = action_commit.take_updates();
        let requirements = action_commit.take_requirements();

        for requirement in &requirements {
            requirement.check(Some(table.metadata()))?;
        }

        let updated_table = Self::update_table_metadata(table, &updates)?;

        existing_updates.extend(updates);
        existing_requirements.extend(requirements);

        Ok(updated_table)
    }

    /// Sets table to a new version.
    pub fn upgrade_table_version(&self) -> UpgradeFormatVersionAction {
        UpgradeFormatVersionAction::new()
    }

    /// Update table's property.
    pub fn update_table_properties(&self) -> UpdatePropertiesAction {
        UpdatePropertiesAction::new()
    }

    /// Update table schema.
    pub fn update_schema(&self) -> UpdateSchemaAction {
        UpdateSchemaAction::new()
    }

    /// Creates a fast append action.
    pub fn fast_append(&self) -> FastAppendAction {
        FastAppendAction::new()
    }

    /// Creates an action that replaces every live data file of the table.
    pub fn overwrite(&self) -> OverwriteAction {
        OverwriteAction::new()
    }

    /// Runs every staged action against `base` in order.
    ///
    /// Each action sees the metadata produced by the actions before it.
    /// Returns the staged table with the combined updates and requirements.
    async fn apply_actions(
        &self,
        base: Table,
    ) -> Result<(Table, Vec<TableUpdate>, Vec<TableRequirement>)> {
        let mut current_table = base;
        let mut existing_updates: Vec<TableUpdate> = vec![];
        let mut existing_requirements: Vec<TableRequirement> = vec![];

        for action in &self.actions {
            let action_commit = Arc::clone(action).commit(&current_table).await?;
            current_table = Self::apply(
                current_table,
                action_commit,
                &mut existing_updates,
                &mut existing_requirements,
            )?;
        }

        Ok((
            current_table,
            existing_updates,
            dedup_requirements(existing_requirements),
        ))
    }

    /// Returns the table as it would look after a successful commit, without
    /// contacting a catalog.
    ///
    /// Snapshot producing actions still write their manifests.
    pub async fn stage(&self) -> Result<Table> {
        let (staged, _, _) = self.apply_actions(self.table.clone()).await?;
        Ok(staged)
    }

    /// Commit transaction.
    ///
    /// Makes exactly one attempt against the base the transaction was created
    /// from. A concurrent change of the table fails with a retryable
    /// [`ErrorKind::CatalogCommitConflicts`]; see [`Transaction::commit_with_retry`].
    pub async fn commit(self, catalog: &dyn Catalog) -> Result<Table> {
        if self.actions.is_empty() {
            // nothing to commit
            return Ok(self.table);
        }

        let (staged, updates, requirements) = self.apply_actions(self.table.clone()).await?;
        self.send(catalog, staged, updates, requirements).await
    }

    /// Commit transaction, retrying on commit conflicts.
    ///
    /// Every attempt reloads the table from the catalog and re-applies all
    /// actions on top of it. Backoff follows the `commit.retry.*` table
    /// properties.
    pub async fn commit_with_retry(self, catalog: &dyn Catalog) -> Result<Table> {
        if self.actions.is_empty() {
            // nothing to commit
            return Ok(self.table);
        }

        let table_props =
            TableProperties::try_from(self.table.metadata().properties()).map_err(|e| {
                Error::new(ErrorKind::DataInvalid, "Invalid table properties").with_source(e)
            })?;

        let backoff = Self::build_backoff(table_props)?;
        let tx = self;

        (|mut tx: Transaction| async {
            let result = tx.do_commit(catalog).await;
            (tx, result)
        })
        .retry(backoff)
        .sleep(tokio::time::sleep)
        .context(tx)
        .when(|e| e.retryable())
        .notify(|e, wait| warn!(error = %e, ?wait, "commit conflict, retrying"))
        .await
        .1
    }

    fn build_backoff(props: TableProperties) -> Result<ExponentialBackoff> {
        Ok(ExponentialBuilder::new()
            .with_min_delay(Duration::from_millis(props.commit_min_retry_wait_ms))
            .with_max_delay(Duration::from_millis(props.commit_max_retry_wait_ms))
            .with_total_delay(Some(Duration::from_millis(
                props.commit_total_retry_timeout_ms,
            )))
            .with_max_times(props.commit_num_retries)
            .with_factor(2.0)
            .build())
    }

    async fn do_commit(&mut self, catalog: &dyn Catalog) -> Result<Table> {
        let refreshed = catalog.load_table(self.table.identifier()).await?;

        if self.table.metadata() != refreshed.metadata()
            || self.table.metadata_location() != refreshed.metadata_location()
        {
            // current base is stale, use refreshed as base and re-apply transaction actions
            self.table = refreshed;
        }

        let (staged, updates, requirements) = self.apply_actions(self.table.clone()).await?;
        self.send(catalog, staged, updates, requirements).await
    }

    async fn send(
        &self,
        catalog: &dyn Catalog,
        staged: Table,
        updates: Vec<TableUpdate>,
        requirements: Vec<TableRequirement>,
    ) -> Result<Table> {
        // No-op actions such as an unchanged schema leave nothing to write.
        if updates.is_empty() {
            return Ok(staged);
        }

        info!(
            table = %self.table.identifier(),
            updates = updates.len(),
            requirements = requirements.len(),
            "committing transaction"
        );

        let table_commit = TableCommit::builder()
            .ident(self.table.identifier().to_owned())
            .updates(updates)
            .requirements(requirements)
            .build();

        catalog.update_table(table_commit).await
    }
}

/// Keeps the first requirement of each kind.
///
/// Later actions of a transaction assert against metadata staged by earlier
/// ones, which the catalog has never seen. The first requirement of a kind
/// describes the base the transaction started from.
fn dedup_requirements(requirements: Vec<TableRequirement>) -> Vec<TableRequirement> {
    let mut seen = HashSet::new();
    requirements
        .into_iter()
        .filter(|requirement| {
            let ref_name = match requirement {
                TableRequirement::RefSnapshotIdMatch { r#ref, .. } => Some(r#ref.clone()),
                _ => None,
            };
            seen.insert((discriminant(requirement), ref_name))
        })
        .collect()
}
