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

//! The evaluation experiment: seeds subscriptions, drives publications
//! through the network for a fixed duration, and writes CSV results.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use sievebus_common::{
    Subscriber,
    registry::{deregister_subscriber, register_subscriber},
    store::DurableStore,
};
use sievebus_infrastructure::redis::{RedisConfig, store::RedisStore};
use sievebus_model::identifiers::SubscriberId;
use sievebus_system::{BrokerNetwork, Publisher, SystemConfig};

use crate::opt::{EvaluateOpts, StoreBackend};

const DRAIN_PAUSE: Duration = Duration::from_millis(10);
const PUBLISHER_BATCH_SIZE: usize = 5;

/// The per-run totals written to the summary CSV.
#[derive(Debug)]
pub struct ExperimentSummary {
    pub label: String,
    pub published: u64,
    pub delivered: u64,
    pub avg_latency_ms: f64,
    pub match_rate_percent: f64,
}

/// Runs one timed experiment per the given options.
///
/// # Errors
///
/// Returns an error if configuration loading, store construction, network
/// startup, or result writing fails.
pub fn run_experiment(opts: &EvaluateOpts) -> anyhow::Result<ExperimentSummary> {
    let config = SystemConfig::from_json_file(&opts.config)?;
    let generator = Arc::new(config.build_generator()?);

    let store: Arc<dyn DurableStore> = match opts.store {
        StoreBackend::Memory => Arc::new(sievebus_common::MemoryStore::new()),
        StoreBackend::Redis => Arc::new(RedisStore::new(&RedisConfig::default())?),
    };

    let network = BrokerNetwork::new(config.num_brokers, config.window_size, store)?;
    network.start()?;

    let subscribers: Vec<Subscriber> = (0..config.num_subscribers.max(1))
        .map(|index| {
            let subscriber = Subscriber::new(SubscriberId::new(format!("subscriber_{index}")));
            register_subscriber(&subscriber);
            subscriber
        })
        .collect();

    log::info!(
        "Seeding {} subscriptions across {} subscribers",
        opts.subscriptions,
        subscribers.len()
    );
    for index in 0..opts.subscriptions {
        let subscriber = &subscribers[index % subscribers.len()];
        let subscription = subscriber.create_subscription(generator.generate_conditions());
        network.add_subscription(subscription)?;
    }

    let publisher = Publisher::new(
        generator,
        config.publication_interval(),
        PUBLISHER_BATCH_SIZE,
    );
    publisher.start(opts.producer_threads)?;

    let deadline = Instant::now() + Duration::from_secs(opts.duration_secs);
    let mut published = 0u64;
    while Instant::now() < deadline {
        while let Some(publication) = publisher.try_next() {
            network.publish(publication)?;
            published += 1;
        }
        std::thread::sleep(DRAIN_PAUSE);
    }

    publisher.stop();
    network.stop();

    let stats = network.all_stats();
    let delivered: u64 = subscribers.iter().map(|s| s.received_count() as u64).sum();
    let latencies: Vec<f64> = subscribers
        .iter()
        .filter_map(Subscriber::average_latency_ms)
        .collect();
    let avg_latency_ms = if latencies.is_empty() {
        0.0
    } else {
        latencies.iter().sum::<f64>() / latencies.len() as f64
    };
    let attempts: u64 = stats.iter().map(|s| s.matching_attempts).sum();
    let matches: u64 = stats.iter().map(|s| s.matches_found).sum();
    let match_rate_percent = if attempts > 0 {
        matches as f64 / attempts as f64 * 100.0
    } else {
        0.0
    };

    for subscriber in &subscribers {
        deregister_subscriber(subscriber.id());
    }

    let results_dir = PathBuf::from(&config.results_dir);
    std::fs::create_dir_all(&results_dir)?;
    write_broker_stats_csv(&results_dir, &opts.label, &stats)?;

    let summary = ExperimentSummary {
        label: opts.label.clone(),
        published,
        delivered,
        avg_latency_ms,
        match_rate_percent,
    };
    write_summary_csv(&results_dir, &summary)?;
    Ok(summary)
}

fn write_broker_stats_csv(
    results_dir: &Path,
    label: &str,
    stats: &[sievebus_system::BrokerStats],
) -> anyhow::Result<()> {
    let path = results_dir.join(format!("broker_stats_{label}.csv"));
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record([
        "broker_id",
        "received_publications",
        "matching_attempts",
        "matches_found",
        "notified_subscribers",
        "timestamp",
    ])?;

    let timestamp = chrono::Utc::now().to_rfc3339();
    for stat in stats {
        writer.write_record([
            stat.broker_id.as_str(),
            &stat.received_publications.to_string(),
            &stat.matching_attempts.to_string(),
            &stat.matches_found.to_string(),
            &stat.notified_subscribers.to_string(),
            &timestamp,
        ])?;
    }
    writer.flush()?;
    log::info!("Broker stats saved to {}", path.display());
    Ok(())
}

fn write_summary_csv(results_dir: &Path, summary: &ExperimentSummary) -> anyhow::Result<()> {
    let path = results_dir.join(format!("evaluation_summary_{}.csv", summary.label));
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record([
        "config_label",
        "published",
        "delivered",
        "avg_latency_ms",
        "match_rate_percent",
        "timestamp",
    ])?;
    writer.write_record([
        summary.label.as_str(),
        &summary.published.to_string(),
        &summary.delivered.to_string(),
        &format!("{:.2}", summary.avg_latency_ms),
        &format!("{:.2}", summary.match_rate_percent),
        &chrono::Utc::now().to_rfc3339(),
    ])?;
    writer.flush()?;
    log::info!("Summary results saved to {}", path.display());
    Ok(())
}
