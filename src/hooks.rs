use async_trait::async_trait;

use crate::filter::FilterData;
use crate::record::Record;
use crate::store::{DataStore, StoreError};

/// Extension points for the bulk operations, injected into app state as a
/// strategy object. Every method has a default; deployments override only
/// what they need (e.g. one bulk INSERT instead of the per-record loop, or a
/// different destroy policy).
#[async_trait]
pub trait BulkHooks: Send + Sync {
    /// Gate for collection-level destroys.
    ///
    /// The default allows a destroy only when the request's criteria narrow
    /// the collection: a non-empty where clause. Limit/offset alone don't
    /// count, so a bare DELETE can never wipe a collection through this
    /// path. Override for collections where an unfiltered destroy is
    /// intentional.
    fn allow_bulk_destroy(&self, filter: &FilterData) -> bool {
        filter.narrows()
    }

    /// Persist validated create records. Default: insert one at a time, in
    /// payload order; a failure partway leaves earlier inserts in place.
    async fn perform_bulk_create(
        &self,
        store: &dyn DataStore,
        resource: &str,
        records: Vec<Record>,
    ) -> Result<Vec<Record>, StoreError> {
        let mut created = Vec::with_capacity(records.len());
        for record in records {
            created.push(store.insert(resource, record).await?);
        }
        Ok(created)
    }

    /// Persist validated update records. Default: save one at a time.
    async fn perform_bulk_update(
        &self,
        store: &dyn DataStore,
        resource: &str,
        records: Vec<Record>,
    ) -> Result<Vec<Record>, StoreError> {
        let mut updated = Vec::with_capacity(records.len());
        for record in records {
            updated.push(store.update(resource, record).await?);
        }
        Ok(updated)
    }

    /// Delete the targeted records. Default: delete one at a time; returns
    /// the number of records removed.
    async fn perform_bulk_destroy(
        &self,
        store: &dyn DataStore,
        resource: &str,
        targets: Vec<Record>,
    ) -> Result<u64, StoreError> {
        let mut deleted = 0u64;
        for target in targets {
            let id = target
                .id()
                .ok_or_else(|| StoreError::Query("destroy target has no id".to_string()))?;
            store.delete(resource, id).await?;
            deleted += 1;
        }
        Ok(deleted)
    }
}

/// The stock hook set: every method uses the trait defaults.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBulkHooks;

impl BulkHooks for DefaultBulkHooks {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    struct AllowEverything;
    impl BulkHooks for AllowEverything {
        fn allow_bulk_destroy(&self, _filter: &FilterData) -> bool {
            true
        }
    }

    #[test]
    fn default_guard_requires_narrowing_criteria() {
        let hooks = DefaultBulkHooks;
        assert!(!hooks.allow_bulk_destroy(&FilterData::default()));
        assert!(!hooks.allow_bulk_destroy(&FilterData {
            where_clause: Some(json!({})),
            ..Default::default()
        }));
        assert!(!hooks.allow_bulk_destroy(&FilterData { limit: Some(5), ..Default::default() }));
        assert!(hooks.allow_bulk_destroy(&FilterData::eq("role", "bot")));
    }

    #[test]
    fn guard_is_overridable() {
        assert!(AllowEverything.allow_bulk_destroy(&FilterData::default()));
    }

    #[tokio::test]
    async fn default_destroy_deletes_each_target() {
        let store = MemoryStore::new();
        let mut targets = Vec::new();
        for i in 0..3 {
            let record = Record::from_validated(
                json!({"n": i}).as_object().unwrap().clone().into_iter().collect(),
            );
            targets.push(store.insert("items", record).await.unwrap());
        }
        // One extra record that is not targeted
        let keep = Record::from_validated(
            json!({"n": 99}).as_object().unwrap().clone().into_iter().collect(),
        );
        let keep = store.insert("items", keep).await.unwrap();

        let deleted =
            DefaultBulkHooks.perform_bulk_destroy(&store, "items", targets).await.unwrap();
        assert_eq!(deleted, 3);

        let remaining = store.list("items", &FilterData::default()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id(), keep.id());
    }
}
