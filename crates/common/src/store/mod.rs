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

//! The durable-store abstraction backing broker recovery.
//!
//! Brokers persist subscription snapshots, publication bodies, per-broker
//! unprocessed-id sets, and window buffers through this trait so that no
//! acknowledged publication is lost across a crash and restart. The Redis
//! implementation lives in the infrastructure crate; [`MemoryStore`] backs
//! tests and store-less deployments.

pub mod memory;

use std::fmt::Debug;

use sievebus_model::{
    identifiers::{BrokerId, PublicationId, SubscriptionId},
    publication::Publication,
    subscription::Subscription,
};

pub use memory::MemoryStore;

/// Time-to-live applied to every durable key.
pub const STORE_TTL_SECS: u64 = 3600;

/// Returns the hash key holding a broker's subscription snapshots.
#[must_use]
pub fn subscriptions_key(broker_id: BrokerId) -> String {
    format!("subscriptions:{broker_id}")
}

/// Returns the string key holding a publication body.
#[must_use]
pub fn publication_key(publication_id: &PublicationId) -> String {
    format!("publication:{publication_id}")
}

/// Returns the set key holding a broker's unprocessed publication IDs.
#[must_use]
pub fn unprocessed_key(broker_id: BrokerId) -> String {
    format!("unprocessed_pubs:{broker_id}")
}

/// Returns the list key holding a windowed subscription's buffered records.
#[must_use]
pub fn window_buffer_key(subscription_id: SubscriptionId) -> String {
    format!("window_buffer:{subscription_id}")
}

/// An external key/value + list + set service holding the fabric's durable
/// state, with a 3600 s TTL on every key.
///
/// Implementations must be safe to call concurrently from broker worker
/// threads; failures propagate as errors that crash the worker, after which
/// the supervisor restarts it and rehydrates from the last durable state.
pub trait DurableStore: Debug + Send + Sync {
    /// Persists the snapshot of `subscription` under the owning broker's key.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation fails.
    fn put_subscription(
        &self,
        broker_id: BrokerId,
        subscription: &Subscription,
    ) -> anyhow::Result<()>;

    /// Deletes a subscription snapshot along with any window-buffer snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation fails.
    fn delete_subscription(
        &self,
        broker_id: BrokerId,
        subscription_id: SubscriptionId,
    ) -> anyhow::Result<()>;

    /// Loads every subscription snapshot stored for `broker_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation or snapshot decoding fails.
    fn load_subscriptions(&self, broker_id: BrokerId) -> anyhow::Result<Vec<Subscription>>;

    /// Records `publication` durably and marks it unprocessed for every given
    /// broker, atomically (single pipeline).
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation fails.
    fn record_publication(
        &self,
        publication: &Publication,
        broker_ids: &[BrokerId],
    ) -> anyhow::Result<()>;

    /// Loads a publication body by ID, `None` when absent or expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation or body decoding fails.
    fn load_publication(
        &self,
        publication_id: &PublicationId,
    ) -> anyhow::Result<Option<Publication>>;

    /// Removes `publication_id` from the broker's unprocessed set.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation fails.
    fn mark_processed(
        &self,
        broker_id: BrokerId,
        publication_id: &PublicationId,
    ) -> anyhow::Result<()>;

    /// Returns the IDs currently unprocessed for `broker_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation fails.
    fn unprocessed_ids(&self, broker_id: BrokerId) -> anyhow::Result<Vec<PublicationId>>;

    /// Appends `publication` to the subscription's durable window buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation fails.
    fn append_window_buffer(
        &self,
        subscription_id: SubscriptionId,
        publication: &Publication,
    ) -> anyhow::Result<()>;

    /// Loads the subscription's durable window buffer, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation or body decoding fails.
    fn load_window_buffer(
        &self,
        subscription_id: SubscriptionId,
    ) -> anyhow::Result<Vec<Publication>>;

    /// Drops the subscription's durable window buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation fails.
    fn clear_window_buffer(&self, subscription_id: SubscriptionId) -> anyhow::Result<()>;

    /// Removes all durable state (test and teardown support).
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation fails.
    fn flush_all(&self) -> anyhow::Result<()>;
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::rstest;
    use sievebus_model::identifiers::{BrokerId, PublicationId, SubscriptionId};

    use super::*;

    #[rstest]
    fn test_key_scheme() {
        let broker_id = BrokerId::new("broker_0");
        let publication_id = PublicationId::new("f81d4fae-7dec-11d0-a765-00a0c91e6bf6");
        let subscription_id = SubscriptionId::random();

        assert_eq!(subscriptions_key(broker_id), "subscriptions:broker_0");
        assert_eq!(
            publication_key(&publication_id),
            "publication:f81d4fae-7dec-11d0-a765-00a0c91e6bf6"
        );
        assert_eq!(unprocessed_key(broker_id), "unprocessed_pubs:broker_0");
        assert_eq!(
            window_buffer_key(subscription_id),
            format!("window_buffer:{subscription_id}")
        );
    }
}
