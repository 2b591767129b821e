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

//! Subscription conditions over publication fields.
//!
//! A condition is always the serializable triple (field, operator, value) so
//! it can be inspected by the covering relation and reconstructed after
//! recovery. Aggregate interest is expressed through field aliases of the
//! form `{avg|min|max}_<base>` over a numeric base field.

use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
};

use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumIter, EnumString};
use ustr::Ustr;

use crate::value::FieldValue;

/// A comparison operator applied between a publication field and a condition value.
#[repr(C)]
#[derive(
    Copy,
    Clone,
    Debug,
    Hash,
    PartialEq,
    Eq,
    StrumDisplay,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
pub enum CompareOp {
    /// Equality.
    #[serde(rename = "=")]
    #[strum(serialize = "=")]
    Eq,
    /// Inequality.
    #[serde(rename = "!=")]
    #[strum(serialize = "!=")]
    Ne,
    /// Strictly less than.
    #[serde(rename = "<")]
    #[strum(serialize = "<")]
    Lt,
    /// Less than or equal.
    #[serde(rename = "<=")]
    #[strum(serialize = "<=")]
    Le,
    /// Strictly greater than.
    #[serde(rename = ">")]
    #[strum(serialize = ">")]
    Gt,
    /// Greater than or equal.
    #[serde(rename = ">=")]
    #[strum(serialize = ">=")]
    Ge,
}

impl CompareOp {
    /// Evaluates `actual <op> expected` under the matching semantics.
    ///
    /// Mixed-kind and unordered comparisons evaluate to `false` (non-match),
    /// never an error.
    #[must_use]
    pub fn evaluate(&self, actual: &FieldValue, expected: &FieldValue) -> bool {
        match self {
            Self::Eq => actual.eq_value(expected) == Some(true),
            Self::Ne => actual.eq_value(expected) == Some(false),
            Self::Lt => actual.partial_cmp_value(expected) == Some(Ordering::Less),
            Self::Le => matches!(
                actual.partial_cmp_value(expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Self::Gt => actual.partial_cmp_value(expected) == Some(Ordering::Greater),
            Self::Ge => matches!(
                actual.partial_cmp_value(expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

/// An aggregate function applied over a tumbling window of records.
#[repr(C)]
#[derive(
    Copy,
    Clone,
    Debug,
    Hash,
    PartialEq,
    Eq,
    StrumDisplay,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    /// Arithmetic mean of the collected values.
    Avg,
    /// Minimum of the collected values.
    Min,
    /// Maximum of the collected values.
    Max,
}

impl Aggregate {
    /// Applies the aggregate over `values`, returning `None` when empty.
    #[must_use]
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let result = match self {
            Self::Avg => values.iter().sum::<f64>() / values.len() as f64,
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        };
        Some(result)
    }
}

/// Parses an aggregate field alias of the form `{avg|min|max}_<base>`.
///
/// Returns the aggregate function and the base field name, or `None` when
/// the field is not an alias.
#[must_use]
pub fn parse_aggregate_alias(field: &str) -> Option<(Aggregate, Ustr)> {
    let (prefix, base) = field.split_once('_')?;
    if base.is_empty() {
        return None;
    }
    let aggregate = match prefix {
        "avg" => Aggregate::Avg,
        "min" => Aggregate::Min,
        "max" => Aggregate::Max,
        _ => return None,
    };
    Some((aggregate, Ustr::from(base)))
}

/// A single predicate over one publication field.
///
/// Conditions within a subscription are conjunctive; there is no disjunction
/// at the subscription level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// The field name the condition applies to (may be an aggregate alias).
    pub field: Ustr,
    /// The comparison operator.
    pub op: CompareOp,
    /// The expected value compared against.
    pub value: FieldValue,
}

impl Condition {
    /// Creates a new [`Condition`] instance.
    pub fn new<T: AsRef<str>, V: Into<FieldValue>>(field: T, op: CompareOp, value: V) -> Self {
        Self {
            field: Ustr::from(field.as_ref()),
            op,
            value: value.into(),
        }
    }

    /// Evaluates the condition against an actual field value.
    #[must_use]
    pub fn evaluate(&self, actual: &FieldValue) -> bool {
        self.op.evaluate(actual, &self.value)
    }

    /// Returns the aggregate alias decomposition when the field is one.
    #[must_use]
    pub fn aggregate_alias(&self) -> Option<(Aggregate, Ustr)> {
        parse_aggregate_alias(self.field.as_str())
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} {} {})", self.field, self.op, self.value)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(CompareOp::Eq, 12, 12, true)]
    #[case(CompareOp::Eq, 12, 13, false)]
    #[case(CompareOp::Ne, 12, 13, true)]
    #[case(CompareOp::Lt, 5, 10, true)]
    #[case(CompareOp::Le, 10, 10, true)]
    #[case(CompareOp::Gt, 10, 10, false)]
    #[case(CompareOp::Ge, 10, 10, true)]
    fn test_compare_op_int(
        #[case] op: CompareOp,
        #[case] actual: i64,
        #[case] expected: i64,
        #[case] outcome: bool,
    ) {
        assert_eq!(
            op.evaluate(&FieldValue::Int(actual), &FieldValue::Int(expected)),
            outcome
        );
    }

    #[rstest]
    fn test_compare_op_mixed_kinds_never_match() {
        let actual = FieldValue::from("Bucharest");
        let expected = FieldValue::Int(10);
        assert!(!CompareOp::Eq.evaluate(&actual, &expected));
        assert!(!CompareOp::Ne.evaluate(&actual, &expected));
        assert!(!CompareOp::Lt.evaluate(&actual, &expected));
        assert!(!CompareOp::Ge.evaluate(&actual, &expected));
    }

    #[rstest]
    fn test_compare_op_numeric_coercion() {
        assert!(CompareOp::Gt.evaluate(
            &FieldValue::Float(21.666_666_666_666_668),
            &FieldValue::Int(20)
        ));
    }

    #[rstest]
    #[case(&[15.0, 20.0, 30.0], Aggregate::Avg, 21.666_666_666_666_668)]
    #[case(&[15.0, 20.0, 30.0], Aggregate::Min, 15.0)]
    #[case(&[15.0, 20.0, 30.0], Aggregate::Max, 30.0)]
    fn test_aggregate_apply(
        #[case] values: &[f64],
        #[case] aggregate: Aggregate,
        #[case] expected: f64,
    ) {
        assert_eq!(aggregate.apply(values), Some(expected));
    }

    #[rstest]
    fn test_aggregate_apply_empty() {
        assert_eq!(Aggregate::Avg.apply(&[]), None);
    }

    #[rstest]
    #[case("avg_temp", Some((Aggregate::Avg, "temp")))]
    #[case("min_rain", Some((Aggregate::Min, "rain")))]
    #[case("max_wind_speed", Some((Aggregate::Max, "wind_speed")))]
    #[case("temp", None)]
    #[case("sum_temp", None)]
    #[case("avg_", None)]
    fn test_parse_aggregate_alias(
        #[case] field: &str,
        #[case] expected: Option<(Aggregate, &str)>,
    ) {
        let parsed = parse_aggregate_alias(field);
        match expected {
            Some((aggregate, base)) => {
                let (parsed_aggregate, parsed_base) = parsed.unwrap();
                assert_eq!(parsed_aggregate, aggregate);
                assert_eq!(parsed_base.as_str(), base);
            }
            None => assert!(parsed.is_none()),
        }
    }

    #[rstest]
    fn test_condition_serde_round_trip() {
        let condition = Condition::new("temp", CompareOp::Ge, 10i64);
        let json = serde_json::to_string(&condition).unwrap();
        assert_eq!(json, r#"{"field":"temp","op":">=","value":10}"#);
        let parsed: Condition = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, condition);
    }

    #[rstest]
    fn test_condition_display() {
        let condition = Condition::new("city", CompareOp::Eq, "Cluj");
        assert_eq!(format!("{condition}"), "(city = Cluj)");
    }
}
