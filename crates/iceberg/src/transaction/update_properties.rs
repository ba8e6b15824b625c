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

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use crate::spec::TableProperties;
use crate::table::Table;
use crate::transaction::action::{ActionCommit, TransactionAction};
use crate::{Error, ErrorKind, Result, TableUpdate};

/// A transactional action that sets or removes table properties.
///
/// A key may be set or removed by one action, not both. Reserved keys such
/// as `format-version` are never persisted and cannot be touched here; use
/// [`crate::transaction::Transaction::upgrade_table_version`] instead.
pub struct UpdatePropertiesAction {
    updates: BTreeMap<String, String>,
    removals: BTreeSet<String>,
}

impl UpdatePropertiesAction {
    pub(crate) fn new() -> Self {
        UpdatePropertiesAction {
            updates: BTreeMap::default(),
            removals: BTreeSet::default(),
        }
    }

    /// Sets `key` to `value`, overwriting a previous value.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.updates.insert(key.into(), value.into());
        self
    }

    /// Removes `key`. Removing an absent key is a no-op.
    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.removals.insert(key.into());
        self
    }

    fn validate(&self, table: &Table) -> Result<()> {
        let reserved = self
            .updates
            .keys()
            .chain(self.removals.iter())
            .find(|key| TableProperties::RESERVED_PROPERTIES.contains(&key.as_str()));
        if let Some(key) = reserved {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!("Cannot modify reserved property '{key}'"),
            ));
        }

        if let Some(key) = self.removals.iter().find(|k| self.updates.contains_key(*k)) {
            return Err(Error::new(
                ErrorKind::PreconditionFailed,
                format!("Key {key} is present in both removal set and update set"),
            ));
        }

        // Typed settings must still parse once the change lands.
        let mut merged: HashMap<String, String> = table.metadata().properties().clone();
        merged.retain(|k, _| !self.removals.contains(k));
        merged.extend(self.updates.clone());
        TableProperties::try_from(&merged)?;

        Ok(())
    }
}

#[async_trait]
impl TransactionAction for UpdatePropertiesAction {
    async fn commit(self: Arc<Self>, table: &Table) -> Result<ActionCommit> {
        self.validate(table)?;

        let mut updates = Vec::with_capacity(2);
        if !self.updates.is_empty() {
            updates.push(TableUpdate::SetProperties {
                updates: self.updates.clone().into_iter().collect(),
            });
        }
        if !self.removals.is_empty() {
            updates.push(TableUpdate::RemoveProperties {
                removals: self.removals.iter().cloned().collect(),
            });
        }

        Ok(ActionCommit::new(updates, vec![]))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use as_any::Downcast;

    use crate::spec::TableProperties;
    use crate::transaction::action::{ApplyTransactionAction, TransactionAction};
    use crate::transaction::tests::make_v2_table;
    use crate::transaction::update_properties::UpdatePropertiesAction;
    use crate::transaction::Transaction;
    use crate::{ErrorKind, TableUpdate};

    #[test]
    fn test_update_table_property() {
        let table = make_v2_table();
        let tx = Transaction::new(&table);
        let tx = tx
            .update_table_properties()
            .set("a", "b")
            .remove("b")
            .apply(tx)
            .unwrap();

        assert_eq!(tx.actions.len(), 1);

        let action = (*tx.actions[0])
            .downcast_ref::<UpdatePropertiesAction>()
            .unwrap();
        assert_eq!(action.updates.get("a").map(String::as_str), Some("b"));
        assert!(action.removals.contains("b"));
    }

    #[tokio::test]
    async fn test_commit_emits_set_and_remove() {
        let table = make_v2_table();
        let action = UpdatePropertiesAction::new()
            .set(TableProperties::PROPERTY_WRITE_TARGET_FILE_SIZE_BYTES, "1024")
            .remove("old.key");
        let mut commit = Arc::new(action).commit(&table).await.unwrap();

        assert_eq!(commit.take_updates(), vec![
            TableUpdate::SetProperties {
                updates: HashMap::from([(
                    "write.target-file-size-bytes".to_string(),
                    "1024".to_string()
                )]),
            },
            TableUpdate::RemoveProperties {
                removals: vec!["old.key".to_string()],
            },
        ]);
        assert!(commit.take_requirements().is_empty());
    }

    #[tokio::test]
    async fn test_empty_action_has_no_updates() {
        let table = make_v2_table();
        let mut commit = Arc::new(UpdatePropertiesAction::new())
            .commit(&table)
            .await
            .unwrap();
        assert!(commit.take_updates().is_empty());
    }

    #[tokio::test]
    async fn test_cannot_set_reserved_property() {
        let table = make_v2_table();
        let action =
            UpdatePropertiesAction::new().set(TableProperties::PROPERTY_FORMAT_VERSION, "1");
        let err = Arc::new(action).commit(&table).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);
        assert!(err.message().contains("format-version"));
    }

    #[tokio::test]
    async fn test_cannot_remove_reserved_property() {
        let table = make_v2_table();
        let action =
            UpdatePropertiesAction::new().remove(TableProperties::PROPERTY_CURRENT_SNAPSHOT_ID);
        let err = Arc::new(action).commit(&table).await.unwrap_err();
        assert!(err.message().contains("current-snapshot-id"));
    }

    #[tokio::test]
    async fn test_set_and_remove_same_key_fails() {
        let table = make_v2_table();
        let action = UpdatePropertiesAction::new().set("k", "v").remove("k");
        let err = Arc::new(action).commit(&table).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    }

    #[tokio::test]
    async fn test_malformed_typed_property_fails() {
        let table = make_v2_table();
        let action = UpdatePropertiesAction::new()
            .set(TableProperties::PROPERTY_COMMIT_NUM_RETRIES, "many");
        let err = Arc::new(action).commit(&table).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidProperty);
    }
}
