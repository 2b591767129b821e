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

//! The subscriber endpoint: a named sink receiving matched publications.

use std::{
    fmt::Debug,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use indexmap::IndexMap;
use rand::RngExt;
use sievebus_core::time::{NANOSECONDS_IN_MILLISECOND, unix_nanos_now};
use sievebus_model::{
    identifiers::{SubscriberId, SubscriptionId},
    publication::Publication,
    subscription::Subscription,
};

use crate::generator::RecordGenerator;

const AUTO_SUBSCRIBE: &str = "auto-subscribe";
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// A callback invoked on every received publication.
///
/// Callbacks run on the delivering broker's worker thread and are expected to
/// return quickly or enqueue.
pub type ReceiveCallback = dyn Fn(&Publication) + Send + Sync;

struct SubscriberInner {
    id: SubscriberId,
    received: Mutex<Vec<Publication>>,
    latencies_ns: Mutex<Vec<u64>>,
    subscriptions: Mutex<IndexMap<SubscriptionId, Subscription>>,
    callback: Option<Box<ReceiveCallback>>,
    running: AtomicBool,
    auto_handle: Mutex<Option<JoinHandle<()>>>,
}

/// A named sink that receives matched publications, tracks delivery latency,
/// and enumerates the subscriptions it owns.
///
/// The endpoint is cheaply cloneable (shared state behind an `Arc`); brokers
/// resolve it through the process-local subscriber registry so durable
/// subscription snapshots never hold an object reference.
#[derive(Clone)]
pub struct Subscriber {
    inner: Arc<SubscriberInner>,
}

impl Subscriber {
    /// Creates a new [`Subscriber`] instance.
    #[must_use]
    pub fn new(id: SubscriberId) -> Self {
        Self::build(id, None)
    }

    /// Creates a new [`Subscriber`] instance notifying `callback` on every
    /// received publication.
    #[must_use]
    pub fn with_callback<F>(id: SubscriberId, callback: F) -> Self
    where
        F: Fn(&Publication) + Send + Sync + 'static,
    {
        Self::build(id, Some(Box::new(callback)))
    }

    fn build(id: SubscriberId, callback: Option<Box<ReceiveCallback>>) -> Self {
        Self {
            inner: Arc::new(SubscriberInner {
                id,
                received: Mutex::new(Vec::new()),
                latencies_ns: Mutex::new(Vec::new()),
                subscriptions: Mutex::new(IndexMap::new()),
                callback,
                running: AtomicBool::new(false),
                auto_handle: Mutex::new(None),
            }),
        }
    }

    /// Returns the subscriber ID.
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Creates a simple subscription owned by this subscriber.
    ///
    /// The returned value is handed to the broker network for placement; the
    /// broker holds the authoritative copy, this endpoint keeps a snapshot
    /// for enumeration only.
    pub fn create_subscription(
        &self,
        conditions: Vec<sievebus_model::condition::Condition>,
    ) -> Subscription {
        let subscription = Subscription::new(self.inner.id, conditions);
        self.track(&subscription);
        log::info!(
            "subscription_created subscriber_id={} subscription_id={}",
            self.inner.id,
            subscription.id
        );
        subscription
    }

    /// Creates a windowed subscription owned by this subscriber.
    ///
    /// # Panics
    ///
    /// Panics if `window_size` is zero.
    pub fn create_window_subscription(
        &self,
        conditions: Vec<sievebus_model::condition::Condition>,
        window_size: usize,
    ) -> Subscription {
        let subscription = Subscription::windowed(self.inner.id, conditions, window_size);
        self.track(&subscription);
        log::info!(
            "window_subscription_created subscriber_id={} subscription_id={} window_size={window_size}",
            self.inner.id,
            subscription.id
        );
        subscription
    }

    fn track(&self, subscription: &Subscription) {
        self.inner
            .subscriptions
            .lock()
            .expect("subscriber lock poisoned")
            .insert(subscription.id, subscription.clone());
    }

    /// Returns the IDs of the subscriptions this endpoint has created.
    #[must_use]
    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.inner
            .subscriptions
            .lock()
            .expect("subscriber lock poisoned")
            .keys()
            .copied()
            .collect()
    }

    /// Receives a matched publication from a broker worker.
    ///
    /// Appends to the local log, records a latency sample when the
    /// publication carries a publish timestamp, and notifies the optional
    /// callback. Must return quickly: it runs under the delivering broker's
    /// processing lock.
    pub fn receive(&self, publication: &Publication) {
        if let Some(timestamp) = publication.timestamp {
            let latency_ns = unix_nanos_now().saturating_sub(timestamp);
            self.inner
                .latencies_ns
                .lock()
                .expect("subscriber lock poisoned")
                .push(latency_ns);
        }
        self.inner
            .received
            .lock()
            .expect("subscriber lock poisoned")
            .push(publication.clone());
        if let Some(callback) = &self.inner.callback {
            callback(publication);
        }
    }

    /// Returns a copy of all received publications, in delivery order.
    #[must_use]
    pub fn received(&self) -> Vec<Publication> {
        self.inner
            .received
            .lock()
            .expect("subscriber lock poisoned")
            .clone()
    }

    /// Returns the number of received publications.
    #[must_use]
    pub fn received_count(&self) -> usize {
        self.inner
            .received
            .lock()
            .expect("subscriber lock poisoned")
            .len()
    }

    /// Clears the received-publication log.
    pub fn clear_received(&self) {
        self.inner
            .received
            .lock()
            .expect("subscriber lock poisoned")
            .clear();
    }

    /// Returns the average delivery latency in milliseconds, when any sample
    /// has been recorded.
    #[must_use]
    pub fn average_latency_ms(&self) -> Option<f64> {
        let latencies = self
            .inner
            .latencies_ns
            .lock()
            .expect("subscriber lock poisoned");
        if latencies.is_empty() {
            return None;
        }
        let total: u64 = latencies.iter().sum();
        Some(total as f64 / latencies.len() as f64 / NANOSECONDS_IN_MILLISECOND as f64)
    }

    /// Starts the optional auto-subscription thread.
    ///
    /// Every `cadence`, generates a random simple subscription (and, with
    /// probability 0.5, a window subscription) and hands it to `install`
    /// (typically the broker network's placement). Orthogonal to matching:
    /// delivery semantics are unaffected by whether this loop runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn start_auto_subscriptions<F>(
        &self,
        generator: Arc<RecordGenerator>,
        cadence: Duration,
        install: F,
    ) -> anyhow::Result<()>
    where
        F: Fn(Subscription) + Send + Sync + 'static,
    {
        self.inner.running.store(true, Ordering::Relaxed);
        let endpoint = self.clone();

        let handle = std::thread::Builder::new()
            .name(format!("{AUTO_SUBSCRIBE}-{}", self.inner.id))
            .spawn(move || {
                let mut last_created = Instant::now();
                while endpoint.inner.running.load(Ordering::Relaxed) {
                    if last_created.elapsed() < cadence {
                        std::thread::sleep(STOP_CHECK_INTERVAL);
                        continue;
                    }
                    last_created = Instant::now();

                    let subscription =
                        endpoint.create_subscription(generator.generate_conditions());
                    install(subscription);

                    if rand::rng().random_bool(0.5) {
                        let subscription = endpoint.create_window_subscription(
                            generator.generate_window_conditions(),
                            generator.window_size(),
                        );
                        install(subscription);
                    }
                }
            })?;

        *self
            .inner
            .auto_handle
            .lock()
            .expect("subscriber lock poisoned") = Some(handle);
        Ok(())
    }

    /// Stops the auto-subscription thread, when running.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::Relaxed);
        let handle = self
            .inner
            .auto_handle
            .lock()
            .expect("subscriber lock poisoned")
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.join() {
                log::error!("Error joining auto-subscribe thread: {e:?}");
            }
        }
    }
}

impl Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(Subscriber))
            .field("id", &self.inner.id)
            .field("received", &self.received_count())
            .finish()
    }
}
