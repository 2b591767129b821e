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

//! Subscriptions: conjunctive predicates over publications, optionally
//! evaluated over a fixed-count tumbling window.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sievebus_core::{UnixNanos, correctness::check_positive_usize};
use ustr::Ustr;

use crate::{
    condition::Condition,
    identifiers::{SubscriberId, SubscriptionId},
    publication::Publication,
    value::FieldValue,
};

/// A conjunction of conditions on publication fields, optionally over a
/// tumbling window.
///
/// The broker holding the subscription owns the authoritative in-memory copy
/// and its window buffer exclusively; the durable snapshot persists only the
/// predicate (the buffer is persisted separately so windows survive restarts).
/// The subscriber reference is carried as an ID and resolved through the
/// process-local subscriber registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subscription {
    /// The subscription ID.
    pub id: SubscriptionId,
    /// The owning subscriber's ID.
    pub subscriber_id: SubscriberId,
    /// The conjunctive conditions, in declaration order.
    pub conditions: Vec<Condition>,
    /// The tumbling-window size; `None` for simple subscriptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_size: Option<usize>,
    /// The window buffer (windowed subscriptions only). Owned exclusively by
    /// the broker holding the subscription; never part of the snapshot.
    #[serde(skip)]
    pub window_buffer: Vec<Publication>,
}

impl Subscription {
    /// Creates a new simple (non-windowed) [`Subscription`] instance.
    #[must_use]
    pub fn new(subscriber_id: SubscriberId, conditions: Vec<Condition>) -> Self {
        Self {
            id: SubscriptionId::random(),
            subscriber_id,
            conditions,
            window_size: None,
            window_buffer: Vec::new(),
        }
    }

    /// Creates a new windowed [`Subscription`] instance.
    ///
    /// # Panics
    ///
    /// Panics if `window_size` is zero.
    #[must_use]
    pub fn windowed(
        subscriber_id: SubscriberId,
        conditions: Vec<Condition>,
        window_size: usize,
    ) -> Self {
        check_positive_usize(window_size, stringify!(window_size))
            .expect("window size must be positive");
        Self {
            id: SubscriptionId::random(),
            subscriber_id,
            conditions,
            window_size: Some(window_size),
            window_buffer: Vec::new(),
        }
    }

    /// Returns whether the subscription aggregates over a tumbling window.
    #[must_use]
    pub const fn is_windowed(&self) -> bool {
        self.window_size.is_some()
    }

    /// Evaluates the simple conjunctive match against `publication`.
    ///
    /// A missing field or a mixed-type comparison is a non-match, never an
    /// error. Repeated calls never mutate state.
    #[must_use]
    pub fn matches(&self, publication: &Publication) -> bool {
        self.conditions.iter().all(|condition| {
            publication
                .get(condition.field.as_str())
                .is_some_and(|actual| condition.evaluate(actual))
        })
    }

    /// Appends `publication` to the window buffer.
    pub fn push_window(&mut self, publication: Publication) {
        self.window_buffer.push(publication);
    }

    /// Returns whether the window buffer has reached the window size.
    #[must_use]
    pub fn window_full(&self) -> bool {
        self.window_size
            .is_some_and(|size| self.window_buffer.len() >= size)
    }

    /// Evaluates the buffered tumbling window, returning the emitted
    /// meta-publication on a match.
    ///
    /// The buffer is cleared regardless of outcome (windows never overlap and
    /// never straddle an evaluation). Aggregate-alias conditions evaluate
    /// against the computed aggregate; an alias whose base field yields no
    /// values makes the whole window a non-match. Plain conditions evaluate
    /// against the last record of the window.
    pub fn process_window(&mut self, now: UnixNanos) -> Option<Publication> {
        let window = std::mem::take(&mut self.window_buffer);
        let last = window.last()?;

        let mut aggregates: IndexMap<Ustr, f64> = IndexMap::new();
        for condition in &self.conditions {
            let Some((aggregate, base)) = condition.aggregate_alias() else {
                continue;
            };
            if aggregates.contains_key(&condition.field) {
                continue;
            }
            let values: Vec<f64> = window
                .iter()
                .filter_map(|p| p.get(base.as_str()).and_then(FieldValue::as_f64))
                .collect();
            aggregates.insert(condition.field, aggregate.apply(&values)?);
        }

        for condition in &self.conditions {
            let holds = match aggregates.get(&condition.field) {
                Some(value) => condition.evaluate(&FieldValue::Float(*value)),
                None => last
                    .get(condition.field.as_str())
                    .is_some_and(|actual| condition.evaluate(actual)),
            };
            if !holds {
                return None;
            }
        }

        Some(Publication::meta(self.id, aggregates, now))
    }

    /// Serializes the durable snapshot (predicate only, no buffer).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_snapshot(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Reconstructs a subscription from its durable snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if `snapshot` is not a valid encoding.
    pub fn from_snapshot(snapshot: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(snapshot)?)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::condition::CompareOp;

    fn weather(city: &str, temp: i64) -> Publication {
        let mut fields = IndexMap::new();
        fields.insert(Ustr::from("city"), FieldValue::from(city));
        fields.insert(Ustr::from("temp"), FieldValue::Int(temp));
        Publication::new(fields)
    }

    #[fixture]
    fn subscriber_id() -> SubscriberId {
        SubscriberId::new("subscriber_0")
    }

    #[rstest]
    fn test_simple_match_conjunctive(subscriber_id: SubscriberId) {
        let subscription = Subscription::new(
            subscriber_id,
            vec![
                Condition::new("city", CompareOp::Eq, "Bucharest"),
                Condition::new("temp", CompareOp::Ge, 10i64),
            ],
        );

        assert!(subscription.matches(&weather("Bucharest", 12)));
        assert!(!subscription.matches(&weather("Cluj", 12))); // first condition fails
        assert!(!subscription.matches(&weather("Bucharest", 9))); // second condition fails
    }

    #[rstest]
    fn test_missing_field_is_non_match(subscriber_id: SubscriberId) {
        let subscription = Subscription::new(
            subscriber_id,
            vec![Condition::new("wind", CompareOp::Lt, 80i64)],
        );
        assert!(!subscription.matches(&weather("Cluj", 12)));
    }

    #[rstest]
    fn test_repeated_match_is_idempotent(subscriber_id: SubscriberId) {
        let subscription = Subscription::new(
            subscriber_id,
            vec![Condition::new("temp", CompareOp::Gt, 100i64)],
        );
        let publication = weather("Cluj", 12);
        for _ in 0..3 {
            assert!(!subscription.matches(&publication));
        }
        assert!(subscription.window_buffer.is_empty());
    }

    #[rstest]
    fn test_window_avg_fires_and_clears(subscriber_id: SubscriberId) {
        let mut subscription = Subscription::windowed(
            subscriber_id,
            vec![Condition::new("avg_temp", CompareOp::Gt, 20i64)],
            3,
        );

        for temp in [15, 20] {
            subscription.push_window(weather("Cluj", temp));
            assert!(!subscription.window_full());
        }
        subscription.push_window(weather("Cluj", 30));
        assert!(subscription.window_full());

        let meta = subscription
            .process_window(UnixNanos::new(1_000_000_000))
            .unwrap();
        assert_eq!(
            meta.get("avg_temp"),
            Some(&FieldValue::Float(21.666_666_666_666_668))
        );
        assert!(subscription.window_buffer.is_empty());
    }

    #[rstest]
    fn test_window_non_match_still_clears(subscriber_id: SubscriberId) {
        let mut subscription = Subscription::windowed(
            subscriber_id,
            vec![Condition::new("avg_temp", CompareOp::Gt, 50i64)],
            2,
        );
        subscription.push_window(weather("Cluj", 10));
        subscription.push_window(weather("Cluj", 20));

        assert!(subscription.process_window(UnixNanos::new(1)).is_none());
        assert!(subscription.window_buffer.is_empty());
    }

    #[rstest]
    fn test_window_empty_aggregate_input_is_non_match(subscriber_id: SubscriberId) {
        let mut subscription = Subscription::windowed(
            subscriber_id,
            vec![Condition::new("avg_wind", CompareOp::Gt, 0i64)],
            2,
        );
        subscription.push_window(weather("Cluj", 10));
        subscription.push_window(weather("Cluj", 20));

        assert!(subscription.process_window(UnixNanos::new(1)).is_none());
        assert!(subscription.window_buffer.is_empty());
    }

    #[rstest]
    fn test_window_mixed_conditions_use_last_record(subscriber_id: SubscriberId) {
        let mut subscription = Subscription::windowed(
            subscriber_id,
            vec![
                Condition::new("avg_temp", CompareOp::Gt, 10i64),
                Condition::new("city", CompareOp::Eq, "Cluj"),
            ],
            2,
        );

        // Last record satisfies the plain condition.
        subscription.push_window(weather("Bucharest", 20));
        subscription.push_window(weather("Cluj", 20));
        assert!(subscription.process_window(UnixNanos::new(1)).is_some());

        // Last record violates the plain condition even though an earlier one held.
        subscription.push_window(weather("Cluj", 20));
        subscription.push_window(weather("Bucharest", 20));
        assert!(subscription.process_window(UnixNanos::new(2)).is_none());
    }

    #[rstest]
    fn test_window_min_max_aggregates(subscriber_id: SubscriberId) {
        let mut subscription = Subscription::windowed(
            subscriber_id,
            vec![
                Condition::new("min_temp", CompareOp::Ge, 10i64),
                Condition::new("max_temp", CompareOp::Le, 30i64),
            ],
            3,
        );
        for temp in [10, 25, 30] {
            subscription.push_window(weather("Cluj", temp));
        }
        let meta = subscription.process_window(UnixNanos::new(1)).unwrap();
        assert_eq!(meta.get("min_temp"), Some(&FieldValue::Float(10.0)));
        assert_eq!(meta.get("max_temp"), Some(&FieldValue::Float(30.0)));
    }

    #[rstest]
    fn test_snapshot_round_trip(subscriber_id: SubscriberId) {
        let mut subscription = Subscription::windowed(
            subscriber_id,
            vec![
                Condition::new("avg_temp", CompareOp::Ge, 25i64),
                Condition::new("max_rain", CompareOp::Le, 70i64),
            ],
            10,
        );
        subscription.push_window(weather("Cluj", 1)); // buffer must not persist

        let snapshot = subscription.to_snapshot().unwrap();
        let restored = Subscription::from_snapshot(&snapshot).unwrap();

        assert_eq!(restored.id, subscription.id);
        assert_eq!(restored.subscriber_id, subscription.subscriber_id);
        assert_eq!(restored.conditions, subscription.conditions);
        assert_eq!(restored.window_size, subscription.window_size);
        assert!(restored.window_buffer.is_empty());
    }
}
