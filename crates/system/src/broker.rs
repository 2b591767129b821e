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

//! The broker node.
//!
//! Each broker owns a FIFO of inbound publications drained by one dedicated
//! worker thread, a set of local subscriptions, a neighbor list, and a
//! routing table of peer-advertised interest. Subscriptions, routing state,
//! and window buffers are protected by one per-broker lock held for the
//! entirety of `process_publication`, `add_subscription`, and
//! `remove_subscription`; the queue is independent of that lock.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
    },
    thread::JoinHandle,
    time::Duration,
};

use ahash::AHashSet;
use indexmap::IndexMap;
use serde::Serialize;
use sievebus_common::{registry::get_subscriber, store::DurableStore};
use sievebus_core::time::unix_nanos_now;
use sievebus_model::{
    covering::covers,
    identifiers::{BrokerId, PublicationId, SubscriptionId},
    publication::Publication,
    subscription::Subscription,
};

const WORKER: &str = "broker-worker";

/// Bounded wait for one queue pull; the stop flag is observed at this
/// boundary.
const QUEUE_WAIT: Duration = Duration::from_secs(1);

/// Capacity of the recently-seen publication-ID ring used to tolerate
/// duplicate enqueues within one broker instance.
const SEEN_IDS_CAPACITY: usize = 1024;

/// A snapshot of one broker's processing counters.
#[derive(Clone, Debug, Default, Serialize)]
pub struct BrokerStats {
    /// The broker ID.
    pub broker_id: String,
    /// Publications pulled off the queue.
    pub received_publications: u64,
    /// Subscription evaluations attempted.
    pub matching_attempts: u64,
    /// Evaluations that produced a match (window firings included).
    pub matches_found: u64,
    /// Subscriber notifications delivered.
    pub notified_subscribers: u64,
}

#[derive(Debug, Default)]
struct BrokerState {
    subscriptions: IndexMap<SubscriptionId, Subscription>,
    /// Interest advertised *by* each peer (publications forward toward it).
    routing_table: IndexMap<BrokerId, Vec<Subscription>>,
    /// Subscriptions this broker already advertised *toward* each neighbor.
    advertised: IndexMap<BrokerId, Vec<Subscription>>,
    seen_ring: VecDeque<PublicationId>,
    seen_ids: AHashSet<PublicationId>,
    received_publications: u64,
    matching_attempts: u64,
    matches_found: u64,
    notified_subscribers: u64,
}

impl BrokerState {
    fn remember_seen(&mut self, publication_id: PublicationId) {
        if !self.seen_ids.insert(publication_id) {
            return;
        }
        self.seen_ring.push_back(publication_id);
        if self.seen_ring.len() > SEEN_IDS_CAPACITY
            && let Some(evicted) = self.seen_ring.pop_front()
        {
            self.seen_ids.remove(&evicted);
        }
    }
}

/// A broker node with a stable ID, recreated under the same ID on restart.
pub struct Broker {
    id: BrokerId,
    window_size: usize,
    store: Arc<dyn DurableStore>,
    state: Mutex<BrokerState>,
    neighbors: RwLock<Vec<Arc<Broker>>>,
    queue_tx: Sender<Publication>,
    queue_rx: Mutex<Option<Receiver<Publication>>>,
    running: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(Broker))
            .field("id", &self.id)
            .field("window_size", &self.window_size)
            .finish()
    }
}

impl Broker {
    /// Creates a new [`Broker`] instance (not yet started).
    #[must_use]
    pub fn new(id: BrokerId, window_size: usize, store: Arc<dyn DurableStore>) -> Arc<Self> {
        let (queue_tx, queue_rx) = mpsc::channel();
        Arc::new(Self {
            id,
            window_size,
            store,
            state: Mutex::new(BrokerState::default()),
            neighbors: RwLock::new(Vec::new()),
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
            running: AtomicBool::new(false),
            worker: Mutex::new(None),
        })
    }

    /// Returns the broker ID.
    #[must_use]
    pub fn id(&self) -> BrokerId {
        self.id
    }

    /// Returns the default window size handed to generated subscriptions.
    #[must_use]
    pub const fn window_size(&self) -> usize {
        self.window_size
    }

    /// Replaces the neighbor list (topology wiring).
    pub fn set_neighbors(&self, neighbors: Vec<Arc<Broker>>) {
        *self.neighbors.write().expect("broker neighbors lock poisoned") = neighbors;
    }

    /// Returns the current neighbor IDs.
    #[must_use]
    pub fn neighbor_ids(&self) -> Vec<BrokerId> {
        self.neighbors
            .read()
            .expect("broker neighbors lock poisoned")
            .iter()
            .map(|n| n.id)
            .collect()
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, BrokerState> {
        self.state.lock().expect("broker state lock poisoned")
    }

    /// Recovers durable state, then spawns the worker thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker was already started, recovery fails, or
    /// the worker thread cannot be spawned.
    pub fn start(self: &Arc<Self>) -> anyhow::Result<()> {
        self.recover()?;

        let queue_rx = self
            .queue_rx
            .lock()
            .expect("broker queue lock poisoned")
            .take()
            .ok_or_else(|| anyhow::anyhow!("broker {} already started", self.id))?;

        self.running.store(true, Ordering::Relaxed);
        let broker = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name(format!("{WORKER}-{}", self.id))
            .spawn(move || broker.process_loop(&queue_rx))?;
        *self.worker.lock().expect("broker worker lock poisoned") = Some(handle);

        log::info!("broker_started broker_id={}", self.id);
        Ok(())
    }

    /// Stops the broker: clears the running flag and joins the worker, which
    /// observes the flag at its next queue-wait boundary.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        let handle = self
            .worker
            .lock()
            .expect("broker worker lock poisoned")
            .take();
        if let Some(handle) = handle
            && let Err(e) = handle.join()
        {
            log::error!("Error joining worker for broker {}: {e:?}", self.id);
        }
        log::info!("broker_stopped broker_id={}", self.id);
    }

    /// Liveness probe for the supervisor: the worker thread exists and has
    /// not exited.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        if !self.running.load(Ordering::Relaxed) {
            return false;
        }
        self.worker
            .lock()
            .expect("broker worker lock poisoned")
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Enqueues a publication onto the broker's FIFO (non-blocking).
    pub fn publish(&self, publication: Publication) {
        if self.queue_tx.send(publication).is_err() {
            log::warn!("publication_dropped broker_id={} reason=worker_gone", self.id);
        }
    }

    /// Inserts the subscription locally, persists its snapshot, and
    /// advertises it toward neighbors with loop and covering suppression.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting the snapshot fails.
    pub fn add_subscription(&self, subscription: Subscription) -> anyhow::Result<SubscriptionId> {
        let subscription_id = subscription.id;
        self.store.put_subscription(self.id, &subscription)?;
        {
            let mut state = self.locked();
            state
                .subscriptions
                .insert(subscription_id, subscription.clone());
        }
        log::info!(
            "subscription_added broker_id={} subscription_id={subscription_id} subscriber_id={}",
            self.id,
            subscription.subscriber_id
        );

        let mut visited: AHashSet<BrokerId> = [self.id].into_iter().collect();
        for neighbor in self.mark_forwards(&subscription, &visited) {
            neighbor.administer(self.id, &subscription, &mut visited);
        }
        Ok(subscription_id)
    }

    /// Removes the subscription locally along with its durable snapshots.
    ///
    /// # Errors
    ///
    /// Returns an error if deleting the durable snapshot fails.
    pub fn remove_subscription(&self, subscription_id: SubscriptionId) -> anyhow::Result<()> {
        let removed = self
            .locked()
            .subscriptions
            .shift_remove(&subscription_id)
            .is_some();
        if removed {
            self.store.delete_subscription(self.id, subscription_id)?;
            log::info!(
                "subscription_removed broker_id={} subscription_id={subscription_id}",
                self.id
            );
        }
        Ok(())
    }

    /// Records interest advertised by `source` and forwards it onward.
    ///
    /// Visits each broker at most once per advertisement (`visited` guard);
    /// forwarding toward a neighbor is suppressed when the same subscription
    /// ID was already advertised that way, or when an already-advertised
    /// subscription covers the new one.
    pub fn administer(
        &self,
        source: BrokerId,
        subscription: &Subscription,
        visited: &mut AHashSet<BrokerId>,
    ) {
        if !visited.insert(self.id) {
            return;
        }
        self.locked()
            .routing_table
            .entry(source)
            .or_default()
            .push(subscription.clone());
        log::debug!(
            "routing_interest_recorded broker_id={} source={source} subscription_id={}",
            self.id,
            subscription.id
        );

        for neighbor in self.mark_forwards(subscription, visited) {
            neighbor.administer(self.id, subscription, visited);
        }
    }

    /// Selects the neighbors to forward toward, recording the advertisement.
    /// The per-broker lock is released before any recursion.
    fn mark_forwards(
        &self,
        subscription: &Subscription,
        visited: &AHashSet<BrokerId>,
    ) -> Vec<Arc<Broker>> {
        let neighbors = self
            .neighbors
            .read()
            .expect("broker neighbors lock poisoned")
            .clone();
        let mut state = self.locked();
        let mut forwards = Vec::new();

        for neighbor in neighbors {
            if visited.contains(&neighbor.id) {
                continue;
            }
            let advertised = state.advertised.entry(neighbor.id).or_default();
            if advertised.iter().any(|s| s.id == subscription.id) {
                continue;
            }
            if advertised.iter().any(|s| covers(s, subscription)) {
                log::debug!(
                    "routing_forward_suppressed broker_id={} neighbor={} subscription_id={}",
                    self.id,
                    neighbor.id,
                    subscription.id
                );
                continue;
            }
            advertised.push(subscription.clone());
            forwards.push(neighbor);
        }
        forwards
    }

    /// Routes a publication through the broker graph by advertised interest:
    /// processes locally, then recurses into each neighbor whose routing
    /// entries match, with a visited guard.
    ///
    /// # Errors
    ///
    /// Returns an error if local processing fails.
    pub fn route_publication(
        &self,
        publication: &Publication,
        visited: &mut AHashSet<BrokerId>,
    ) -> anyhow::Result<()> {
        if !visited.insert(self.id) {
            return Ok(());
        }
        self.process_publication(publication)?;

        let forwards: Vec<Arc<Broker>> = {
            let neighbors = self
                .neighbors
                .read()
                .expect("broker neighbors lock poisoned")
                .clone();
            let state = self.locked();
            neighbors
                .into_iter()
                .filter(|neighbor| {
                    !visited.contains(&neighbor.id)
                        && state
                            .routing_table
                            .get(&neighbor.id)
                            .is_some_and(|subs| subs.iter().any(|s| s.matches(publication)))
                })
                .collect()
        };
        for neighbor in forwards {
            neighbor.route_publication(publication, visited)?;
        }
        Ok(())
    }

    /// Evaluates every local subscription against `publication`, delivering
    /// to each distinct subscriber at most once per source publication, then
    /// clears the publication's unprocessed marker.
    ///
    /// # Errors
    ///
    /// Returns an error on the crash sentinel or when a durable-store
    /// operation fails; the worker exits and the supervisor restarts the
    /// broker.
    pub fn process_publication(&self, publication: &Publication) -> anyhow::Result<()> {
        if publication.is_poison() {
            anyhow::bail!("crash sentinel received");
        }

        {
            let mut state = self.locked();
            state.received_publications += 1;

            if state.seen_ids.contains(&publication.id) {
                // Duplicate enqueue (e.g. re-delivery race): matching already
                // ran for this instance, only the unprocessed marker remains.
                log::debug!(
                    "duplicate_publication_skipped broker_id={} publication_id={}",
                    self.id,
                    publication.id
                );
            } else {
                state.remember_seen(publication.id);
                self.match_subscriptions(&mut state, publication)?;
            }
        }

        self.store.mark_processed(self.id, &publication.id)?;
        Ok(())
    }

    fn match_subscriptions(
        &self,
        state: &mut BrokerState,
        publication: &Publication,
    ) -> anyhow::Result<()> {
        let broker_id = self.id;
        let mut notified: AHashSet<_> = AHashSet::new();

        let BrokerState {
            subscriptions,
            matching_attempts,
            matches_found,
            notified_subscribers,
            ..
        } = state;

        for subscription in subscriptions.values_mut() {
            if subscription.window_size.is_none() {
                *matching_attempts += 1;
                if !subscription.matches(publication) {
                    continue;
                }
                *matches_found += 1;
                log::info!(
                    "match_found broker_id={broker_id} subscription_id={} publication_id={}",
                    subscription.id,
                    publication.id
                );
                if !notified.insert(subscription.subscriber_id) {
                    continue;
                }
                match get_subscriber(subscription.subscriber_id) {
                    Some(subscriber) => {
                        subscriber.receive(publication);
                        *notified_subscribers += 1;
                        log::info!(
                            "subscriber_notified broker_id={broker_id} subscriber_id={} publication_id={}",
                            subscription.subscriber_id,
                            publication.id
                        );
                    }
                    None => log::warn!(
                        "subscriber_unresolved broker_id={broker_id} subscriber_id={}",
                        subscription.subscriber_id
                    ),
                }
            } else {
                subscription.push_window(publication.clone());
                self.store
                    .append_window_buffer(subscription.id, publication)?;
                if !subscription.window_full() {
                    continue;
                }
                *matching_attempts += 1;
                let meta = subscription.process_window(unix_nanos_now());
                self.store.clear_window_buffer(subscription.id)?;
                let Some(meta) = meta else {
                    continue;
                };
                *matches_found += 1;
                log::info!(
                    "window_processed broker_id={broker_id} subscription_id={} meta_id={}",
                    subscription.id,
                    meta.id
                );
                match get_subscriber(subscription.subscriber_id) {
                    Some(subscriber) => {
                        subscriber.receive(&meta);
                        *notified_subscribers += 1;
                    }
                    None => log::warn!(
                        "subscriber_unresolved broker_id={broker_id} subscriber_id={}",
                        subscription.subscriber_id
                    ),
                }
            }
        }
        Ok(())
    }

    fn process_loop(&self, queue_rx: &Receiver<Publication>) {
        while self.running.load(Ordering::Relaxed) {
            match queue_rx.recv_timeout(QUEUE_WAIT) {
                Ok(publication) => {
                    if let Err(e) = self.process_publication(&publication) {
                        log::error!(
                            "broker_process_loop_crash broker_id={} publication_id={} error={e:#}",
                            self.id,
                            publication.id
                        );
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    /// Rehydrates subscriptions (with window buffers) and re-enqueues every
    /// unprocessed publication from the durable store.
    ///
    /// # Errors
    ///
    /// Returns an error if a durable-store operation fails.
    fn recover(&self) -> anyhow::Result<()> {
        let snapshots = self.store.load_subscriptions(self.id)?;
        let unprocessed = self.store.unprocessed_ids(self.id)?;
        log::info!(
            "broker_recovering_state broker_id={} subscriptions={} unprocessed={}",
            self.id,
            snapshots.len(),
            unprocessed.len()
        );

        {
            let mut state = self.locked();
            for mut subscription in snapshots {
                if subscription.is_windowed() {
                    subscription.window_buffer = self.store.load_window_buffer(subscription.id)?;
                }
                state.subscriptions.insert(subscription.id, subscription);
            }
        }

        let mut requeued = 0usize;
        for publication_id in unprocessed {
            match self.store.load_publication(&publication_id)? {
                Some(publication) => {
                    if self.queue_tx.send(publication).is_ok() {
                        requeued += 1;
                    }
                }
                None => {
                    // Body expired ahead of the set entry; drop the marker.
                    log::warn!(
                        "unprocessed_body_expired broker_id={} publication_id={publication_id}",
                        self.id
                    );
                    self.store.mark_processed(self.id, &publication_id)?;
                }
            }
        }

        log::info!(
            "broker_recovery_complete broker_id={} requeued={requeued}",
            self.id
        );
        Ok(())
    }

    /// Returns a snapshot of the processing counters.
    #[must_use]
    pub fn stats(&self) -> BrokerStats {
        let state = self.locked();
        BrokerStats {
            broker_id: self.id.to_string(),
            received_publications: state.received_publications,
            matching_attempts: state.matching_attempts,
            matches_found: state.matches_found,
            notified_subscribers: state.notified_subscribers,
        }
    }

    /// Returns the number of local subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.locked().subscriptions.len()
    }

    /// Returns the IDs of the local subscriptions.
    #[must_use]
    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.locked().subscriptions.keys().copied().collect()
    }

    /// Returns the buffered window length for a local subscription.
    #[must_use]
    pub fn window_buffer_len(&self, subscription_id: SubscriptionId) -> Option<usize> {
        self.locked()
            .subscriptions
            .get(&subscription_id)
            .map(|s| s.window_buffer.len())
    }

    /// Returns the routing table as peer ID to advertised subscription IDs.
    #[must_use]
    pub fn routing_table(&self) -> IndexMap<BrokerId, Vec<SubscriptionId>> {
        self.locked()
            .routing_table
            .iter()
            .map(|(peer, subs)| (*peer, subs.iter().map(|s| s.id).collect()))
            .collect()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use indexmap::IndexMap as Map;
    use rstest::{fixture, rstest};
    use sievebus_common::store::MemoryStore;
    use sievebus_model::{
        condition::{CompareOp, Condition},
        identifiers::SubscriberId,
        value::FieldValue,
    };
    use ustr::Ustr;

    use super::*;

    #[fixture]
    fn store() -> Arc<dyn DurableStore> {
        Arc::new(MemoryStore::new())
    }

    fn weather(temp: i64) -> Publication {
        let mut fields = Map::new();
        fields.insert(Ustr::from("temp"), FieldValue::Int(temp));
        Publication::new(fields)
    }

    fn subscription(subscriber: &str, threshold: i64) -> Subscription {
        Subscription::new(
            SubscriberId::new(subscriber),
            vec![Condition::new("temp", CompareOp::Gt, threshold)],
        )
    }

    fn triangle(store: &Arc<dyn DurableStore>) -> (Arc<Broker>, Arc<Broker>, Arc<Broker>) {
        let b0 = Broker::new(BrokerId::new("broker_0"), 10, store.clone());
        let b1 = Broker::new(BrokerId::new("broker_1"), 10, store.clone());
        let b2 = Broker::new(BrokerId::new("broker_2"), 10, store.clone());
        b0.set_neighbors(vec![b1.clone(), b2.clone()]);
        b1.set_neighbors(vec![b2.clone(), b0.clone()]);
        b2.set_neighbors(vec![b0.clone(), b1.clone()]);
        (b0, b1, b2)
    }

    #[rstest]
    fn test_add_subscription_persists(store: Arc<dyn DurableStore>) {
        let broker = Broker::new(BrokerId::new("broker_0"), 10, store.clone());
        let subscription = subscription("broker_test_subscriber", 10);
        let subscription_id = broker.add_subscription(subscription).unwrap();

        assert_eq!(broker.subscription_count(), 1);
        let stored = store.load_subscriptions(broker.id()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, subscription_id);

        broker.remove_subscription(subscription_id).unwrap();
        assert_eq!(broker.subscription_count(), 0);
        assert!(store.load_subscriptions(broker.id()).unwrap().is_empty());
    }

    #[rstest]
    fn test_administer_triangle_visits_each_once(store: Arc<dyn DurableStore>) {
        let (b0, b1, b2) = triangle(&store);
        let subscription = subscription("triangle_subscriber", 10);
        let subscription_id = b0.add_subscription(subscription).unwrap();

        // Each peer received the advertisement exactly once; the origin's own
        // routing table never lists itself.
        let b1_table = b1.routing_table();
        let b2_table = b2.routing_table();
        let b1_entries: usize = b1_table.values().map(Vec::len).sum();
        let b2_entries: usize = b2_table.values().map(Vec::len).sum();
        assert_eq!(b1_entries, 1);
        assert_eq!(b2_entries, 1);
        assert_eq!(b1_table[&b0.id()], vec![subscription_id]);
        assert!(b0.routing_table().is_empty());
        assert!(!b2.routing_table().contains_key(&b2.id()));
    }

    #[rstest]
    fn test_covered_advertisement_suppressed(store: Arc<dyn DurableStore>) {
        let (b0, b1, b2) = triangle(&store);

        let general = subscription("covering_subscriber", 10);
        b0.add_subscription(general).unwrap();

        // Covered by the general subscription: neighbors see nothing new.
        let specific = subscription("covering_subscriber", 20);
        b0.add_subscription(specific).unwrap();

        let b1_entries: usize = b1.routing_table().values().map(Vec::len).sum();
        let b2_entries: usize = b2.routing_table().values().map(Vec::len).sum();
        assert_eq!(b1_entries, 1);
        assert_eq!(b2_entries, 1);
        assert_eq!(b0.subscription_count(), 2);
    }

    #[rstest]
    fn test_route_publication_follows_interest(store: Arc<dyn DurableStore>) {
        let (b0, b1, b2) = triangle(&store);

        let subscriber = sievebus_common::Subscriber::new(SubscriberId::new(
            "routing_interest_subscriber",
        ));
        sievebus_common::registry::register_subscriber(&subscriber);

        let subscription = Subscription::new(
            subscriber.id(),
            vec![Condition::new("temp", CompareOp::Gt, 10i64)],
        );
        b1.add_subscription(subscription).unwrap();

        // Inject at b0: interest advertised from b1 pulls the publication over.
        let mut visited = AHashSet::new();
        b0.route_publication(&weather(15), &mut visited).unwrap();
        assert_eq!(subscriber.received_count(), 1);

        // Below threshold nothing is delivered anywhere.
        let mut visited = AHashSet::new();
        b0.route_publication(&weather(5), &mut visited).unwrap();
        assert_eq!(subscriber.received_count(), 1);

        sievebus_common::registry::deregister_subscriber(subscriber.id());
        let _ = b2;
    }

    #[rstest]
    fn test_process_publication_marks_processed(store: Arc<dyn DurableStore>) {
        let broker = Broker::new(BrokerId::new("broker_0"), 10, store.clone());
        let publication = weather(12);
        store
            .record_publication(&publication, &[broker.id()])
            .unwrap();

        broker.process_publication(&publication).unwrap();
        assert!(store.unprocessed_ids(broker.id()).unwrap().is_empty());
        assert_eq!(broker.stats().received_publications, 1);
    }

    #[rstest]
    fn test_duplicate_publication_skips_matching(store: Arc<dyn DurableStore>) {
        let broker = Broker::new(BrokerId::new("broker_0"), 10, store.clone());
        let subscriber =
            sievebus_common::Subscriber::new(SubscriberId::new("duplicate_subscriber"));
        sievebus_common::registry::register_subscriber(&subscriber);
        broker
            .add_subscription(Subscription::new(
                subscriber.id(),
                vec![Condition::new("temp", CompareOp::Gt, 10i64)],
            ))
            .unwrap();

        let publication = weather(15);
        broker.process_publication(&publication).unwrap();
        broker.process_publication(&publication).unwrap();

        assert_eq!(subscriber.received_count(), 1);
        sievebus_common::registry::deregister_subscriber(subscriber.id());
    }

    #[rstest]
    fn test_poison_pill_faults_processing(store: Arc<dyn DurableStore>) {
        let broker = Broker::new(BrokerId::new("broker_0"), 10, store);
        assert!(broker.process_publication(&Publication::poison()).is_err());
    }

    #[rstest]
    fn test_recovery_rehydrates_subscriptions_and_queue(store: Arc<dyn DurableStore>) {
        let broker_id = BrokerId::new("broker_0");
        let subscription = subscription("recovery_unit_subscriber", 10);
        store.put_subscription(broker_id, &subscription).unwrap();
        let publication = weather(30);
        store
            .record_publication(&publication, &[broker_id])
            .unwrap();

        let broker = Broker::new(broker_id, 10, store.clone());
        broker.recover().unwrap();

        assert_eq!(broker.subscription_ids(), vec![subscription.id]);
        // The unprocessed publication was re-enqueued exactly once.
        let queue_rx = broker.queue_rx.lock().unwrap().take().unwrap();
        let requeued = queue_rx.try_recv().unwrap();
        assert_eq!(requeued, publication);
        assert!(queue_rx.try_recv().is_err());
    }
}
