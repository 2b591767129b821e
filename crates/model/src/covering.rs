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

//! The covering relation between subscriptions.
//!
//! Subscription `a` covers subscription `b` when every publication matching
//! `b` also matches `a`; a broker then suppresses forwarding `b` toward a
//! neighbor that already received `a`. The relation implemented here is
//! conservative (sound but not complete): a `true` result guarantees the
//! subset property, a `false` result guarantees nothing.

use std::cmp::Ordering;

use crate::{condition::Condition, subscription::Subscription};

/// Returns whether subscription `a` covers subscription `b`.
///
/// Windowed and non-windowed subscriptions never cover each other; windowed
/// pairs additionally require equal window sizes so the compared aggregates
/// range over the same records.
#[must_use]
pub fn covers(a: &Subscription, b: &Subscription) -> bool {
    if a.window_size != b.window_size {
        return false;
    }
    a.conditions.iter().all(|ca| {
        b.conditions
            .iter()
            .any(|cb| cb.field == ca.field && condition_covers(ca, cb))
    })
}

/// Returns whether condition `a` covers condition `b` on the same field,
/// per the conservative operator table.
fn condition_covers(a: &Condition, b: &Condition) -> bool {
    use crate::condition::CompareOp::{Eq, Ge, Gt, Le, Lt, Ne};

    let eq = a.value.eq_value(&b.value);
    let ord = a.value.partial_cmp_value(&b.value);

    match (a.op, b.op) {
        (Eq, Eq) | (Ne, Ne) => eq == Some(true),
        (Gt, Gt) | (Ge, Gt) | (Ge, Ge) => {
            matches!(ord, Some(Ordering::Less | Ordering::Equal))
        }
        (Gt, Ge) => ord == Some(Ordering::Less),
        (Lt, Lt) | (Le, Lt) | (Le, Le) => {
            matches!(ord, Some(Ordering::Greater | Ordering::Equal))
        }
        (Lt, Le) => ord == Some(Ordering::Greater),
        _ => false,
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use proptest::prelude::*;
    use rstest::{fixture, rstest};
    use ustr::Ustr;

    use super::*;
    use crate::{
        condition::CompareOp,
        identifiers::SubscriberId,
        publication::Publication,
        value::FieldValue,
    };

    #[fixture]
    fn subscriber_id() -> SubscriberId {
        SubscriberId::new("subscriber_0")
    }

    fn simple(subscriber_id: SubscriberId, conditions: Vec<Condition>) -> Subscription {
        Subscription::new(subscriber_id, conditions)
    }

    #[rstest]
    fn test_general_covers_specific(subscriber_id: SubscriberId) {
        // A = [(temp > 10)], B = [(temp > 20), (city = X)]
        let a = simple(
            subscriber_id,
            vec![Condition::new("temp", CompareOp::Gt, 10i64)],
        );
        let b = simple(
            subscriber_id,
            vec![
                Condition::new("temp", CompareOp::Gt, 20i64),
                Condition::new("city", CompareOp::Eq, "X"),
            ],
        );

        assert!(covers(&a, &b));
        assert!(!covers(&b, &a));
    }

    #[rstest]
    #[case(CompareOp::Eq, 10, CompareOp::Eq, 10, true)]
    #[case(CompareOp::Eq, 10, CompareOp::Eq, 11, false)]
    #[case(CompareOp::Ne, 10, CompareOp::Ne, 10, true)]
    #[case(CompareOp::Gt, 10, CompareOp::Gt, 20, true)] // Av <= Bv
    #[case(CompareOp::Gt, 10, CompareOp::Gt, 10, true)]
    #[case(CompareOp::Gt, 10, CompareOp::Ge, 10, false)] // needs Av < Bv
    #[case(CompareOp::Gt, 10, CompareOp::Ge, 11, true)]
    #[case(CompareOp::Ge, 10, CompareOp::Gt, 10, true)]
    #[case(CompareOp::Ge, 10, CompareOp::Ge, 10, true)]
    #[case(CompareOp::Lt, 90, CompareOp::Lt, 50, true)] // Av >= Bv
    #[case(CompareOp::Lt, 50, CompareOp::Lt, 90, false)]
    #[case(CompareOp::Lt, 50, CompareOp::Le, 50, false)] // needs Av > Bv
    #[case(CompareOp::Le, 50, CompareOp::Lt, 50, true)]
    #[case(CompareOp::Le, 50, CompareOp::Le, 50, true)]
    #[case(CompareOp::Eq, 10, CompareOp::Gt, 5, false)] // mixed pair never covers
    #[case(CompareOp::Gt, 5, CompareOp::Eq, 10, false)]
    fn test_operator_table(
        subscriber_id: SubscriberId,
        #[case] a_op: CompareOp,
        #[case] a_value: i64,
        #[case] b_op: CompareOp,
        #[case] b_value: i64,
        #[case] expected: bool,
    ) {
        let a = simple(
            subscriber_id,
            vec![Condition::new("temp", a_op, a_value)],
        );
        let b = simple(
            subscriber_id,
            vec![Condition::new("temp", b_op, b_value)],
        );
        assert_eq!(covers(&a, &b), expected);
    }

    #[rstest]
    fn test_field_not_in_b_blocks_cover(subscriber_id: SubscriberId) {
        let a = simple(
            subscriber_id,
            vec![Condition::new("wind", CompareOp::Lt, 80i64)],
        );
        let b = simple(
            subscriber_id,
            vec![Condition::new("temp", CompareOp::Gt, 20i64)],
        );
        assert!(!covers(&a, &b));
    }

    #[rstest]
    fn test_windowed_never_covers_simple(subscriber_id: SubscriberId) {
        let windowed = Subscription::windowed(
            subscriber_id,
            vec![Condition::new("avg_temp", CompareOp::Gt, 10i64)],
            10,
        );
        let plain = simple(
            subscriber_id,
            vec![Condition::new("avg_temp", CompareOp::Gt, 20i64)],
        );
        assert!(!covers(&windowed, &plain));
        assert!(!covers(&plain, &windowed));
    }

    #[rstest]
    fn test_windowed_pair_covers_per_alias(subscriber_id: SubscriberId) {
        let a = Subscription::windowed(
            subscriber_id,
            vec![Condition::new("avg_temp", CompareOp::Gt, 10i64)],
            10,
        );
        let b = Subscription::windowed(
            subscriber_id,
            vec![Condition::new("avg_temp", CompareOp::Gt, 20i64)],
            10,
        );
        assert!(covers(&a, &b));
        assert!(!covers(&b, &a));
    }

    #[rstest]
    fn test_windowed_pair_with_different_sizes(subscriber_id: SubscriberId) {
        let a = Subscription::windowed(
            subscriber_id,
            vec![Condition::new("avg_temp", CompareOp::Gt, 10i64)],
            5,
        );
        let b = Subscription::windowed(
            subscriber_id,
            vec![Condition::new("avg_temp", CompareOp::Gt, 20i64)],
            10,
        );
        assert!(!covers(&a, &b));
    }

    fn arb_op() -> impl Strategy<Value = CompareOp> {
        prop_oneof![
            Just(CompareOp::Eq),
            Just(CompareOp::Ne),
            Just(CompareOp::Lt),
            Just(CompareOp::Le),
            Just(CompareOp::Gt),
            Just(CompareOp::Ge),
        ]
    }

    proptest! {
        /// Covering soundness: whenever the conservative table reports that
        /// `a` covers `b`, every publication matching `b` matches `a`.
        #[test]
        fn prop_covering_soundness(
            a_op in arb_op(),
            a_value in -50i64..50,
            b_op in arb_op(),
            b_value in -50i64..50,
            probes in proptest::collection::vec(-60i64..60, 1..32),
        ) {
            let subscriber_id = SubscriberId::new("prop_subscriber");
            let a = Subscription::new(
                subscriber_id,
                vec![Condition::new("temp", a_op, a_value)],
            );
            let b = Subscription::new(
                subscriber_id,
                vec![Condition::new("temp", b_op, b_value)],
            );

            if covers(&a, &b) {
                for probe in probes {
                    let mut fields = IndexMap::new();
                    fields.insert(Ustr::from("temp"), FieldValue::Int(probe));
                    let publication = Publication::new(fields);
                    prop_assert!(
                        !b.matches(&publication) || a.matches(&publication),
                        "covers(a, b) but b matched {probe} and a did not",
                    );
                }
            }
        }
    }
}
