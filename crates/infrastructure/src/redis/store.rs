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

//! The Redis-backed [`DurableStore`] implementation.
//!
//! Key scheme (every key carries a 3600 s TTL):
//!
//! | Key | Kind | Contents |
//! |---|---|---|
//! | `subscriptions:{brokerId}` | hash | `subId -> JSON(Subscription)` |
//! | `publication:{pubId}` | string | JSON(Publication) |
//! | `unprocessed_pubs:{brokerId}` | set | publication IDs awaiting processing |
//! | `window_buffer:{subId}` | list | JSON(Publication), tail-appended |
//!
//! Broker workers are plain OS threads; each trait method bridges onto the
//! shared Tokio runtime with `block_on`.

use std::collections::HashMap;

use redis::{AsyncCommands, aio::ConnectionManager};
use sievebus_common::{
    runtime::get_runtime,
    store::{
        DurableStore, STORE_TTL_SECS, publication_key, subscriptions_key, unprocessed_key,
        window_buffer_key,
    },
};
use sievebus_model::{
    identifiers::{BrokerId, PublicationId, SubscriptionId},
    publication::Publication,
    subscription::Subscription,
};

use super::{RedisConfig, create_redis_connection, flush_redis};

const STORE_CONNECTION: &str = "durable-store";

/// A durable store backed by a Redis server.
///
/// The connection manager multiplexes one underlying connection and
/// reconnects with exponential backoff per the [`RedisConfig`].
pub struct RedisStore {
    con: ConnectionManager,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(RedisStore)).finish()
    }
}

impl RedisStore {
    /// Creates a new [`RedisStore`] instance, establishing the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn new(config: &RedisConfig) -> anyhow::Result<Self> {
        let con = get_runtime().block_on(create_redis_connection(STORE_CONNECTION, config))?;
        Ok(Self { con })
    }

    fn con(&self) -> ConnectionManager {
        self.con.clone()
    }
}

impl DurableStore for RedisStore {
    fn put_subscription(
        &self,
        broker_id: BrokerId,
        subscription: &Subscription,
    ) -> anyhow::Result<()> {
        let key = subscriptions_key(broker_id);
        let snapshot = subscription.to_snapshot()?;
        let field = subscription.id.to_string();
        let mut con = self.con();
        get_runtime().block_on(async move {
            let mut pipe = redis::pipe();
            pipe.atomic();
            pipe.hset(&key, field, snapshot).ignore();
            pipe.expire(&key, STORE_TTL_SECS as i64).ignore();
            pipe.query_async::<()>(&mut con).await?;
            Ok(())
        })
    }

    fn delete_subscription(
        &self,
        broker_id: BrokerId,
        subscription_id: SubscriptionId,
    ) -> anyhow::Result<()> {
        let key = subscriptions_key(broker_id);
        let buffer_key = window_buffer_key(subscription_id);
        let mut con = self.con();
        get_runtime().block_on(async move {
            let mut pipe = redis::pipe();
            pipe.atomic();
            pipe.hdel(&key, subscription_id.to_string()).ignore();
            pipe.del(&buffer_key).ignore();
            pipe.query_async::<()>(&mut con).await?;
            Ok(())
        })
    }

    fn load_subscriptions(&self, broker_id: BrokerId) -> anyhow::Result<Vec<Subscription>> {
        let key = subscriptions_key(broker_id);
        let mut con = self.con();
        let snapshots: HashMap<String, String> =
            get_runtime().block_on(async move { con.hgetall(&key).await })?;
        snapshots
            .values()
            .map(|snapshot| Subscription::from_snapshot(snapshot))
            .collect()
    }

    fn record_publication(
        &self,
        publication: &Publication,
        broker_ids: &[BrokerId],
    ) -> anyhow::Result<()> {
        let body = serde_json::to_string(publication)?;
        let pub_key = publication_key(&publication.id);
        let id = publication.id.to_string();
        let unprocessed_keys: Vec<String> =
            broker_ids.iter().map(|b| unprocessed_key(*b)).collect();
        let mut con = self.con();
        get_runtime().block_on(async move {
            let mut pipe = redis::pipe();
            pipe.atomic();
            pipe.set_ex(&pub_key, body, STORE_TTL_SECS).ignore();
            for key in &unprocessed_keys {
                pipe.sadd(key, &id).ignore();
                pipe.expire(key, STORE_TTL_SECS as i64).ignore();
            }
            pipe.query_async::<()>(&mut con).await?;
            Ok(())
        })
    }

    fn load_publication(
        &self,
        publication_id: &PublicationId,
    ) -> anyhow::Result<Option<Publication>> {
        let key = publication_key(publication_id);
        let mut con = self.con();
        let body: Option<String> =
            get_runtime().block_on(async move { con.get(&key).await })?;
        body.map(|body| Publication::from_json_bytes(body.as_bytes()))
            .transpose()
    }

    fn mark_processed(
        &self,
        broker_id: BrokerId,
        publication_id: &PublicationId,
    ) -> anyhow::Result<()> {
        let key = unprocessed_key(broker_id);
        let id = publication_id.to_string();
        let mut con = self.con();
        get_runtime().block_on(async move {
            con.srem::<_, _, ()>(&key, id).await?;
            Ok(())
        })
    }

    fn unprocessed_ids(&self, broker_id: BrokerId) -> anyhow::Result<Vec<PublicationId>> {
        let key = unprocessed_key(broker_id);
        let mut con = self.con();
        let ids: Vec<String> =
            get_runtime().block_on(async move { con.smembers(&key).await })?;
        ids.iter()
            .map(|id| PublicationId::new_checked(id))
            .collect()
    }

    fn append_window_buffer(
        &self,
        subscription_id: SubscriptionId,
        publication: &Publication,
    ) -> anyhow::Result<()> {
        let key = window_buffer_key(subscription_id);
        let body = serde_json::to_string(publication)?;
        let mut con = self.con();
        get_runtime().block_on(async move {
            let mut pipe = redis::pipe();
            pipe.atomic();
            pipe.rpush(&key, body).ignore();
            pipe.expire(&key, STORE_TTL_SECS as i64).ignore();
            pipe.query_async::<()>(&mut con).await?;
            Ok(())
        })
    }

    fn load_window_buffer(
        &self,
        subscription_id: SubscriptionId,
    ) -> anyhow::Result<Vec<Publication>> {
        let key = window_buffer_key(subscription_id);
        let mut con = self.con();
        let bodies: Vec<String> =
            get_runtime().block_on(async move { con.lrange(&key, 0, -1).await })?;
        bodies
            .iter()
            .map(|body| Publication::from_json_bytes(body.as_bytes()))
            .collect()
    }

    fn clear_window_buffer(&self, subscription_id: SubscriptionId) -> anyhow::Result<()> {
        let key = window_buffer_key(subscription_id);
        let mut con = self.con();
        get_runtime().block_on(async move {
            con.del::<_, ()>(&key).await?;
            Ok(())
        })
    }

    fn flush_all(&self) -> anyhow::Result<()> {
        let mut con = self.con();
        get_runtime().block_on(async move { flush_redis(&mut con).await })?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
// Require a running Redis server on the default localhost port; run with
// `cargo test -- --ignored` against a disposable instance.
#[cfg(test)]
mod serial_tests {
    use indexmap::IndexMap;
    use rstest::rstest;
    use sievebus_model::{
        condition::{CompareOp, Condition},
        identifiers::SubscriberId,
        value::FieldValue,
    };
    use ustr::Ustr;

    use super::*;

    fn store() -> RedisStore {
        let store = RedisStore::new(&RedisConfig::default()).unwrap();
        store.flush_all().unwrap();
        store
    }

    fn publication(temp: i64) -> Publication {
        let mut fields = IndexMap::new();
        fields.insert(Ustr::from("temp"), FieldValue::Int(temp));
        Publication::new(fields)
    }

    #[rstest]
    #[ignore = "requires running Redis"]
    fn test_subscription_round_trip() {
        let store = store();
        let broker_id = BrokerId::new("broker_0");
        let subscription = Subscription::new(
            SubscriberId::new("subscriber_0"),
            vec![Condition::new("temp", CompareOp::Ge, 10i64)],
        );

        store.put_subscription(broker_id, &subscription).unwrap();
        let loaded = store.load_subscriptions(broker_id).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, subscription.id);
        assert_eq!(loaded[0].conditions, subscription.conditions);

        store
            .delete_subscription(broker_id, subscription.id)
            .unwrap();
        assert!(store.load_subscriptions(broker_id).unwrap().is_empty());
        store.flush_all().unwrap();
    }

    #[rstest]
    #[ignore = "requires running Redis"]
    fn test_record_publication_pipeline() {
        let store = store();
        let broker_ids = vec![BrokerId::new("broker_0"), BrokerId::new("broker_1")];
        let publication = publication(12);

        store
            .record_publication(&publication, &broker_ids)
            .unwrap();
        assert_eq!(
            store.load_publication(&publication.id).unwrap().unwrap(),
            publication
        );
        for broker_id in &broker_ids {
            assert_eq!(
                store.unprocessed_ids(*broker_id).unwrap(),
                vec![publication.id]
            );
        }

        store
            .mark_processed(broker_ids[0], &publication.id)
            .unwrap();
        assert!(store.unprocessed_ids(broker_ids[0]).unwrap().is_empty());
        store.flush_all().unwrap();
    }

    #[rstest]
    #[ignore = "requires running Redis"]
    fn test_window_buffer_round_trip() {
        let store = store();
        let subscription_id = SubscriptionId::random();
        for temp in [1, 2, 3] {
            store
                .append_window_buffer(subscription_id, &publication(temp))
                .unwrap();
        }

        let buffer = store.load_window_buffer(subscription_id).unwrap();
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer[0].get("temp"), Some(&FieldValue::Int(1)));

        store.clear_window_buffer(subscription_id).unwrap();
        assert!(store.load_window_buffer(subscription_id).unwrap().is_empty());
        store.flush_all().unwrap();
    }
}
