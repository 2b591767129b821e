// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! An in-memory [`DurableStore`] implementation.
//!
//! Stores the same JSON snapshots as the Redis store so recovery exercises
//! identical serialization paths. TTLs are not enforced: the store lives at
//! most as long as the process.

use std::sync::Mutex;

use ahash::AHashMap;
use indexmap::{IndexMap, IndexSet};
use sievebus_model::{
    identifiers::{BrokerId, PublicationId, SubscriptionId},
    publication::Publication,
    subscription::Subscription,
};

use super::DurableStore;

#[derive(Debug, Default)]
struct MemoryStoreState {
    subscriptions: AHashMap<BrokerId, IndexMap<SubscriptionId, String>>,
    publications: AHashMap<PublicationId, String>,
    unprocessed: AHashMap<BrokerId, IndexSet<PublicationId>>,
    window_buffers: AHashMap<SubscriptionId, Vec<String>>,
}

/// A process-local durable store, used by tests and store-less deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryStoreState>,
}

impl MemoryStore {
    /// Creates a new empty [`MemoryStore`] instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, MemoryStoreState> {
        self.state.lock().expect("memory store lock poisoned")
    }
}

impl DurableStore for MemoryStore {
    fn put_subscription(
        &self,
        broker_id: BrokerId,
        subscription: &Subscription,
    ) -> anyhow::Result<()> {
        let snapshot = subscription.to_snapshot()?;
        self.locked()
            .subscriptions
            .entry(broker_id)
            .or_default()
            .insert(subscription.id, snapshot);
        Ok(())
    }

    fn delete_subscription(
        &self,
        broker_id: BrokerId,
        subscription_id: SubscriptionId,
    ) -> anyhow::Result<()> {
        let mut state = self.locked();
        if let Some(snapshots) = state.subscriptions.get_mut(&broker_id) {
            snapshots.shift_remove(&subscription_id);
        }
        state.window_buffers.remove(&subscription_id);
        Ok(())
    }

    fn load_subscriptions(&self, broker_id: BrokerId) -> anyhow::Result<Vec<Subscription>> {
        self.locked()
            .subscriptions
            .get(&broker_id)
            .map(|snapshots| {
                snapshots
                    .values()
                    .map(|snapshot| Subscription::from_snapshot(snapshot))
                    .collect()
            })
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn record_publication(
        &self,
        publication: &Publication,
        broker_ids: &[BrokerId],
    ) -> anyhow::Result<()> {
        let body = serde_json::to_string(publication)?;
        let mut state = self.locked();
        state.publications.insert(publication.id, body);
        for broker_id in broker_ids {
            state
                .unprocessed
                .entry(*broker_id)
                .or_default()
                .insert(publication.id);
        }
        Ok(())
    }

    fn load_publication(
        &self,
        publication_id: &PublicationId,
    ) -> anyhow::Result<Option<Publication>> {
        self.locked()
            .publications
            .get(publication_id)
            .map(|body| Publication::from_json_bytes(body.as_bytes()))
            .transpose()
    }

    fn mark_processed(
        &self,
        broker_id: BrokerId,
        publication_id: &PublicationId,
    ) -> anyhow::Result<()> {
        if let Some(ids) = self.locked().unprocessed.get_mut(&broker_id) {
            ids.shift_remove(publication_id);
        }
        Ok(())
    }

    fn unprocessed_ids(&self, broker_id: BrokerId) -> anyhow::Result<Vec<PublicationId>> {
        Ok(self
            .locked()
            .unprocessed
            .get(&broker_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    fn append_window_buffer(
        &self,
        subscription_id: SubscriptionId,
        publication: &Publication,
    ) -> anyhow::Result<()> {
        let body = serde_json::to_string(publication)?;
        self.locked()
            .window_buffers
            .entry(subscription_id)
            .or_default()
            .push(body);
        Ok(())
    }

    fn load_window_buffer(
        &self,
        subscription_id: SubscriptionId,
    ) -> anyhow::Result<Vec<Publication>> {
        self.locked()
            .window_buffers
            .get(&subscription_id)
            .map(|bodies| {
                bodies
                    .iter()
                    .map(|body| Publication::from_json_bytes(body.as_bytes()))
                    .collect()
            })
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn clear_window_buffer(&self, subscription_id: SubscriptionId) -> anyhow::Result<()> {
        self.locked().window_buffers.remove(&subscription_id);
        Ok(())
    }

    fn flush_all(&self) -> anyhow::Result<()> {
        let mut state = self.locked();
        *state = MemoryStoreState::default();
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use rstest::{fixture, rstest};
    use sievebus_model::{
        condition::{CompareOp, Condition},
        identifiers::SubscriberId,
        value::FieldValue,
    };
    use ustr::Ustr;

    use super::*;

    #[fixture]
    fn store() -> MemoryStore {
        MemoryStore::new()
    }

    fn publication(temp: i64) -> Publication {
        let mut fields = IndexMap::new();
        fields.insert(Ustr::from("temp"), FieldValue::Int(temp));
        Publication::new(fields)
    }

    fn subscription() -> Subscription {
        Subscription::new(
            SubscriberId::new("subscriber_0"),
            vec![Condition::new("temp", CompareOp::Ge, 10i64)],
        )
    }

    #[rstest]
    fn test_subscription_round_trip(store: MemoryStore) {
        let broker_id = BrokerId::new("broker_0");
        let subscription = subscription();
        store.put_subscription(broker_id, &subscription).unwrap();

        let loaded = store.load_subscriptions(broker_id).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, subscription.id);
        assert_eq!(loaded[0].conditions, subscription.conditions);

        store
            .delete_subscription(broker_id, subscription.id)
            .unwrap();
        assert!(store.load_subscriptions(broker_id).unwrap().is_empty());
    }

    #[rstest]
    fn test_record_and_mark_processed(store: MemoryStore) {
        let broker_ids = vec![BrokerId::new("broker_0"), BrokerId::new("broker_1")];
        let publication = publication(12);
        store
            .record_publication(&publication, &broker_ids)
            .unwrap();

        for broker_id in &broker_ids {
            assert_eq!(
                store.unprocessed_ids(*broker_id).unwrap(),
                vec![publication.id]
            );
        }
        assert_eq!(
            store.load_publication(&publication.id).unwrap().unwrap(),
            publication
        );

        store
            .mark_processed(broker_ids[0], &publication.id)
            .unwrap();
        assert!(store.unprocessed_ids(broker_ids[0]).unwrap().is_empty());
        assert_eq!(
            store.unprocessed_ids(broker_ids[1]).unwrap(),
            vec![publication.id]
        );
    }

    #[rstest]
    fn test_load_missing_publication(store: MemoryStore) {
        let missing = PublicationId::new("missing");
        assert!(store.load_publication(&missing).unwrap().is_none());
    }

    #[rstest]
    fn test_window_buffer_round_trip(store: MemoryStore) {
        let subscription_id = SubscriptionId::random();
        for temp in [1, 2, 3] {
            store
                .append_window_buffer(subscription_id, &publication(temp))
                .unwrap();
        }

        let buffer = store.load_window_buffer(subscription_id).unwrap();
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer[0].get("temp"), Some(&FieldValue::Int(1)));
        assert_eq!(buffer[2].get("temp"), Some(&FieldValue::Int(3)));

        store.clear_window_buffer(subscription_id).unwrap();
        assert!(store.load_window_buffer(subscription_id).unwrap().is_empty());
    }

    #[rstest]
    fn test_flush_all(store: MemoryStore) {
        let broker_id = BrokerId::new("broker_0");
        store.put_subscription(broker_id, &subscription()).unwrap();
        store
            .record_publication(&publication(1), &[broker_id])
            .unwrap();

        store.flush_all().unwrap();
        assert!(store.load_subscriptions(broker_id).unwrap().is_empty());
        assert!(store.unprocessed_ids(broker_id).unwrap().is_empty());
    }
}
