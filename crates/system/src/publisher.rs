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

//! The synthetic publisher: producer threads generating schema-conformant
//! publications into an internal FIFO on a configurable cadence.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use sievebus_common::generator::RecordGenerator;
use sievebus_model::publication::Publication;

const PRODUCER: &str = "publisher-producer";
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(100);

struct PublisherInner {
    generator: Arc<RecordGenerator>,
    interval: Duration,
    batch_size: usize,
    queue_tx: Sender<Publication>,
    queue_rx: Mutex<Receiver<Publication>>,
    running: AtomicBool,
    producers: Mutex<Vec<JoinHandle<()>>>,
    generated: AtomicU64,
}

/// Generates batches of publications on producer threads; the harness drains
/// them and hands each to the broker network.
#[derive(Clone)]
pub struct Publisher {
    inner: Arc<PublisherInner>,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(Publisher))
            .field("generated", &self.generated_count())
            .finish()
    }
}

impl Publisher {
    /// Creates a new [`Publisher`] instance producing `batch_size` records
    /// every `interval` per producer thread.
    #[must_use]
    pub fn new(generator: Arc<RecordGenerator>, interval: Duration, batch_size: usize) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel();
        Self {
            inner: Arc::new(PublisherInner {
                generator,
                interval,
                batch_size: batch_size.max(1),
                queue_tx,
                queue_rx: Mutex::new(queue_rx),
                running: AtomicBool::new(false),
                producers: Mutex::new(Vec::new()),
                generated: AtomicU64::new(0),
            }),
        }
    }

    /// Starts `num_threads` producer threads.
    ///
    /// # Errors
    ///
    /// Returns an error if a producer thread cannot be spawned.
    pub fn start(&self, num_threads: usize) -> anyhow::Result<()> {
        self.inner.running.store(true, Ordering::Relaxed);
        let mut producers = self
            .inner
            .producers
            .lock()
            .expect("publisher producers lock poisoned");

        for index in 0..num_threads.max(1) {
            let inner = Arc::clone(&self.inner);
            let handle = std::thread::Builder::new()
                .name(format!("{PRODUCER}-{index}"))
                .spawn(move || {
                    let mut last_batch: Option<Instant> = None;
                    while inner.running.load(Ordering::Relaxed) {
                        let due = last_batch
                            .is_none_or(|batch| batch.elapsed() >= inner.interval);
                        if !due {
                            std::thread::sleep(STOP_CHECK_INTERVAL.min(inner.interval));
                            continue;
                        }
                        last_batch = Some(Instant::now());

                        for _ in 0..inner.batch_size {
                            let publication = inner.generator.generate_publication();
                            if inner.queue_tx.send(publication).is_err() {
                                return;
                            }
                            inner.generated.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })?;
            producers.push(handle);
        }

        log::info!("publisher_started num_threads={}", num_threads.max(1));
        Ok(())
    }

    /// Stops the producer threads and waits for them to finish.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::Relaxed);
        let producers = std::mem::take(
            &mut *self
                .inner
                .producers
                .lock()
                .expect("publisher producers lock poisoned"),
        );
        for handle in producers {
            if let Err(e) = handle.join() {
                log::error!("Error joining producer thread: {e:?}");
            }
        }
        log::info!(
            "publisher_stopped generated_publications={}",
            self.generated_count()
        );
    }

    /// Returns the next generated publication without blocking.
    #[must_use]
    pub fn try_next(&self) -> Option<Publication> {
        self.inner
            .queue_rx
            .lock()
            .expect("publisher queue lock poisoned")
            .try_recv()
            .ok()
    }

    /// Returns the next generated publication, waiting up to `timeout`.
    #[must_use]
    pub fn next_timeout(&self, timeout: Duration) -> Option<Publication> {
        let queue_rx = self
            .inner
            .queue_rx
            .lock()
            .expect("publisher queue lock poisoned");
        match queue_rx.recv_timeout(timeout) {
            Ok(publication) => Some(publication),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Returns the number of publications generated so far.
    #[must_use]
    pub fn generated_count(&self) -> u64 {
        self.inner.generated.load(Ordering::Relaxed)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::rstest;
    use sievebus_model::schema::Schema;

    use super::*;

    fn generator() -> Arc<RecordGenerator> {
        let schema: Schema = serde_json::from_str(
            r#"[{"name": "temp", "type": "int", "min": -10, "max": 40}]"#,
        )
        .unwrap();
        Arc::new(RecordGenerator::with_random_frequencies(schema, 0.7, 10).unwrap())
    }

    #[rstest]
    fn test_produces_and_stops() {
        let publisher = Publisher::new(generator(), Duration::from_millis(10), 5);
        publisher.start(2).unwrap();

        let publication = publisher
            .next_timeout(Duration::from_secs(2))
            .expect("expected a generated publication");
        assert!(publication.get("temp").is_some());

        publisher.stop();
        assert!(publisher.generated_count() >= 1);
    }

    #[rstest]
    fn test_try_next_on_idle_publisher() {
        let publisher = Publisher::new(generator(), Duration::from_millis(10), 1);
        assert!(publisher.try_next().is_none());
    }
}
