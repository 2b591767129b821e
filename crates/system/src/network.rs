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

//! The broker network supervisor.
//!
//! Owns a fixed set of broker IDs for the process lifetime. Subscriptions
//! are placed round-robin over the expected ID list (a dead slot persists
//! straight to the durable store for pickup at recovery); publications are
//! recorded durably in one atomic pipeline and then fanned out to every live
//! broker; a health checker recreates failed brokers under their stable IDs.

use std::{
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use indexmap::IndexMap;
use sievebus_common::store::DurableStore;
use sievebus_core::{correctness::check_positive_usize, time::unix_nanos_now};
use sievebus_model::{
    identifiers::{BrokerId, PublicationId, SubscriptionId},
    publication::Publication,
    subscription::Subscription,
};

use crate::broker::{Broker, BrokerStats};

const HEALTH_CHECKER: &str = "health-checker";

/// Default interval between health-check sweeps.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(5);

/// Granularity at which sleeping loops observe the stop flag.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(100);

struct NetworkInner {
    broker_ids: Vec<BrokerId>,
    window_size: usize,
    store: Arc<dyn DurableStore>,
    health_interval: Duration,
    brokers: RwLock<IndexMap<BrokerId, Arc<Broker>>>,
    rr_cursor: AtomicUsize,
    running: AtomicBool,
    health_worker: Mutex<Option<JoinHandle<()>>>,
}

/// Supervises a fixed set of broker nodes sharing one durable store.
#[derive(Clone)]
pub struct BrokerNetwork {
    inner: Arc<NetworkInner>,
}

impl std::fmt::Debug for BrokerNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(BrokerNetwork))
            .field("broker_ids", &self.inner.broker_ids)
            .field("window_size", &self.inner.window_size)
            .finish()
    }
}

impl BrokerNetwork {
    /// Creates a new [`BrokerNetwork`] instance with broker IDs
    /// `broker_0..broker_{num_brokers-1}`, stable for the network's lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error if `num_brokers` or `window_size` is zero.
    pub fn new(
        num_brokers: usize,
        window_size: usize,
        store: Arc<dyn DurableStore>,
    ) -> anyhow::Result<Self> {
        check_positive_usize(num_brokers, stringify!(num_brokers))?;
        check_positive_usize(window_size, stringify!(window_size))?;

        let broker_ids = (0..num_brokers).map(BrokerId::from_index).collect();
        log::info!("broker_network_created num_brokers={num_brokers} window_size={window_size}");
        Ok(Self {
            inner: Arc::new(NetworkInner {
                broker_ids,
                window_size,
                store,
                health_interval: DEFAULT_HEALTH_INTERVAL,
                brokers: RwLock::new(IndexMap::new()),
                rr_cursor: AtomicUsize::new(0),
                running: AtomicBool::new(false),
                health_worker: Mutex::new(None),
            }),
        })
    }

    /// Overrides the health-check interval (before `start`).
    ///
    /// # Panics
    ///
    /// Panics if the network has already been started.
    #[must_use]
    pub fn with_health_interval(self, health_interval: Duration) -> Self {
        assert!(
            !self.inner.running.load(Ordering::Relaxed),
            "health interval must be set before start"
        );
        let inner = NetworkInner {
            broker_ids: self.inner.broker_ids.clone(),
            window_size: self.inner.window_size,
            store: self.inner.store.clone(),
            health_interval,
            brokers: RwLock::new(IndexMap::new()),
            rr_cursor: AtomicUsize::new(0),
            running: AtomicBool::new(false),
            health_worker: Mutex::new(None),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Starts every broker under its persistent ID, wires the ring topology,
    /// and spawns the health checker.
    ///
    /// # Errors
    ///
    /// Returns an error if a broker fails to start or the health-check thread
    /// cannot be spawned.
    pub fn start(&self) -> anyhow::Result<()> {
        log::info!(
            "broker_network_starting num_brokers={}",
            self.inner.broker_ids.len()
        );
        self.inner.running.store(true, Ordering::Relaxed);

        for broker_id in &self.inner.broker_ids {
            NetworkInner::start_broker(&self.inner, *broker_id)?;
        }

        let inner = Arc::clone(&self.inner);
        let handle = std::thread::Builder::new()
            .name(HEALTH_CHECKER.to_string())
            .spawn(move || NetworkInner::health_check_loop(&inner))?;
        *self
            .inner
            .health_worker
            .lock()
            .expect("network health lock poisoned") = Some(handle);

        Ok(())
    }

    /// Stops the health checker, then each broker in turn.
    pub fn stop(&self) {
        log::info!(
            "broker_network_stopping num_brokers={}",
            self.inner.broker_ids.len()
        );
        self.inner.running.store(false, Ordering::Relaxed);

        let handle = self
            .inner
            .health_worker
            .lock()
            .expect("network health lock poisoned")
            .take();
        if let Some(handle) = handle
            && let Err(e) = handle.join()
        {
            log::error!("Error joining health checker: {e:?}");
        }

        let brokers: Vec<Arc<Broker>> = self
            .inner
            .brokers
            .read()
            .expect("network brokers lock poisoned")
            .values()
            .cloned()
            .collect();
        for broker in brokers {
            broker.stop();
        }
        log::info!("broker_network_stopped");
    }

    /// Places a subscription round-robin over the expected broker-ID list.
    ///
    /// When the assigned slot is live the broker takes it (persisting and
    /// advertising); a dead slot gets the snapshot persisted directly so the
    /// broker picks it up at recovery.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting the subscription fails.
    pub fn add_subscription(&self, subscription: Subscription) -> anyhow::Result<SubscriptionId> {
        let index =
            self.inner.rr_cursor.fetch_add(1, Ordering::Relaxed) % self.inner.broker_ids.len();
        let broker_id = self.inner.broker_ids[index];

        let broker = self
            .inner
            .brokers
            .read()
            .expect("network brokers lock poisoned")
            .get(&broker_id)
            .cloned();

        match broker {
            Some(broker) if broker.is_alive() => {
                let subscription_id = broker.add_subscription(subscription)?;
                log::info!(
                    "subscription_distributed broker_id={broker_id} subscription_id={subscription_id}"
                );
                Ok(subscription_id)
            }
            _ => {
                let subscription_id = subscription.id;
                self.inner.store.put_subscription(broker_id, &subscription)?;
                log::warn!(
                    "subscription_persisted_for_dead_broker broker_id={broker_id} subscription_id={subscription_id}"
                );
                Ok(subscription_id)
            }
        }
    }

    /// Publishes a record: assigns the publish timestamp when missing,
    /// records the body and per-broker unprocessed markers in one atomic
    /// pipeline, then enqueues onto every live broker.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable pipeline fails; nothing is enqueued in
    /// that case.
    pub fn publish(&self, mut publication: Publication) -> anyhow::Result<PublicationId> {
        if publication.timestamp.is_none() {
            publication.timestamp = Some(unix_nanos_now());
        }
        self.inner
            .store
            .record_publication(&publication, &self.inner.broker_ids)?;
        log::debug!("publication_recorded publication_id={}", publication.id);

        let brokers: Vec<Arc<Broker>> = self
            .inner
            .brokers
            .read()
            .expect("network brokers lock poisoned")
            .values()
            .cloned()
            .collect();
        let publication_id = publication.id;
        for broker in brokers {
            if broker.is_alive() {
                broker.publish(publication.clone());
            }
        }
        Ok(publication_id)
    }

    /// Returns the fixed broker-ID list.
    #[must_use]
    pub fn broker_ids(&self) -> &[BrokerId] {
        &self.inner.broker_ids
    }

    /// Returns the live broker registered under `broker_id`, if any.
    #[must_use]
    pub fn broker(&self, broker_id: BrokerId) -> Option<Arc<Broker>> {
        self.inner
            .brokers
            .read()
            .expect("network brokers lock poisoned")
            .get(&broker_id)
            .cloned()
    }

    /// Returns a snapshot of every broker instance.
    #[must_use]
    pub fn brokers(&self) -> Vec<Arc<Broker>> {
        self.inner
            .brokers
            .read()
            .expect("network brokers lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Returns processing counters from every broker.
    #[must_use]
    pub fn all_stats(&self) -> Vec<BrokerStats> {
        self.brokers().iter().map(|broker| broker.stats()).collect()
    }

    /// Returns the neighbor adjacency per broker.
    #[must_use]
    pub fn topology(&self) -> IndexMap<BrokerId, Vec<BrokerId>> {
        self.brokers()
            .iter()
            .map(|broker| (broker.id(), broker.neighbor_ids()))
            .collect()
    }
}

impl NetworkInner {
    fn start_broker(inner: &Arc<Self>, broker_id: BrokerId) -> anyhow::Result<()> {
        log::info!("broker_starting broker_id={broker_id}");
        let broker = Broker::new(broker_id, inner.window_size, inner.store.clone());
        broker.start()?;
        inner
            .brokers
            .write()
            .expect("network brokers lock poisoned")
            .insert(broker_id, broker);
        Self::rewire(inner);
        Ok(())
    }

    /// Rebuilds the ring topology over the brokers in slot order.
    fn rewire(inner: &Arc<Self>) {
        let brokers: Vec<Arc<Broker>> = {
            let registered = inner
                .brokers
                .read()
                .expect("network brokers lock poisoned");
            inner
                .broker_ids
                .iter()
                .filter_map(|broker_id| registered.get(broker_id).cloned())
                .collect()
        };

        let count = brokers.len();
        for (index, broker) in brokers.iter().enumerate() {
            let mut neighbors = Vec::new();
            if count > 1 {
                neighbors.push(brokers[(index + count - 1) % count].clone());
                if count > 2 {
                    neighbors.push(brokers[(index + 1) % count].clone());
                }
            }
            broker.set_neighbors(neighbors);
        }
    }

    fn health_check_loop(inner: &Arc<Self>) {
        log::debug!("Started task '{HEALTH_CHECKER}'");
        let mut last_sweep: Option<Instant> = None;

        while inner.running.load(Ordering::Relaxed) {
            let due = last_sweep.is_none_or(|sweep| sweep.elapsed() >= inner.health_interval);
            if !due {
                std::thread::sleep(STOP_CHECK_INTERVAL);
                continue;
            }
            last_sweep = Some(Instant::now());

            for broker_id in &inner.broker_ids {
                if !inner.running.load(Ordering::Relaxed) {
                    break;
                }
                let broker = inner
                    .brokers
                    .read()
                    .expect("network brokers lock poisoned")
                    .get(broker_id)
                    .cloned();
                let alive = broker.as_ref().is_some_and(|b| b.is_alive());
                if alive {
                    continue;
                }
                if broker.is_some() {
                    log::error!("broker_failed broker_id={broker_id}");
                }
                if let Err(e) = Self::start_broker(inner, *broker_id) {
                    log::error!("broker_restart_failed broker_id={broker_id} error={e:#}");
                }
            }
        }
        log::debug!("Stopped task '{HEALTH_CHECKER}'");
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::rstest;
    use sievebus_common::store::MemoryStore;

    use super::*;

    fn network(num_brokers: usize) -> BrokerNetwork {
        BrokerNetwork::new(num_brokers, 10, Arc::new(MemoryStore::new())).unwrap()
    }

    #[rstest]
    fn test_broker_ids_are_stable() {
        let network = network(3);
        let ids: Vec<&str> = network
            .broker_ids()
            .iter()
            .map(|broker_id| broker_id.as_str())
            .collect();
        assert_eq!(ids, vec!["broker_0", "broker_1", "broker_2"]);
    }

    #[rstest]
    fn test_zero_brokers_rejected() {
        assert!(BrokerNetwork::new(0, 10, Arc::new(MemoryStore::new())).is_err());
        assert!(BrokerNetwork::new(3, 0, Arc::new(MemoryStore::new())).is_err());
    }

    #[rstest]
    fn test_ring_topology() {
        let network = network(3);
        network.start().unwrap();

        let topology = network.topology();
        for (broker_id, neighbors) in &topology {
            assert_eq!(neighbors.len(), 2, "broker {broker_id} should have 2 neighbors");
            assert!(!neighbors.contains(broker_id));
        }

        network.stop();
    }

    #[rstest]
    fn test_single_broker_has_no_neighbors() {
        let network = network(1);
        network.start().unwrap();
        assert!(network.topology()[&BrokerId::new("broker_0")].is_empty());
        network.stop();
    }
}
