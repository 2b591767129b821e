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

//! Typed values carried by publication fields.

use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single typed value carried by a publication field.
///
/// The untagged wire representation keeps publications in plain JSON:
/// integers, floats, booleans, ISO dates, and text map directly onto their
/// JSON forms. Variant order matters for deserialization: integers are tried
/// before floats, and dates before free text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A boolean marker value (control fields such as the crash sentinel).
    Flag(bool),
    /// A 64-bit signed integer value.
    Int(i64),
    /// A 64-bit floating point value.
    Float(f64),
    /// A calendar date value (ISO `YYYY-MM-DD` wire form).
    Date(NaiveDate),
    /// A text value.
    Text(String),
}

impl FieldValue {
    /// Returns the name of the value kind, for diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Flag(_) => "flag",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Date(_) => "date",
            Self::Text(_) => "text",
        }
    }

    /// Returns whether the value is numeric (int or float).
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    /// Returns the numeric value coerced to `f64`, when numeric.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Compares two values for equality under the matching semantics.
    ///
    /// Int and float values compare numerically. Returns `None` for any
    /// mixed-kind comparison, which callers treat as a non-match rather than
    /// an error.
    #[must_use]
    pub fn eq_value(&self, other: &Self) -> Option<bool> {
        match (self, other) {
            (Self::Flag(a), Self::Flag(b)) => Some(a == b),
            (Self::Text(a), Self::Text(b)) => Some(a == b),
            (Self::Date(a), Self::Date(b)) => Some(a == b),
            _ if self.is_numeric() && other.is_numeric() => {
                Some(self.as_f64() == other.as_f64())
            }
            _ => None,
        }
    }

    /// Orders two values under the matching semantics.
    ///
    /// Numeric values use host `f64` ordering (int coerced), text is
    /// lexicographic, dates use calendar ordering. Flags carry no ordering.
    /// Returns `None` for mixed kinds and NaN, which callers treat as a
    /// non-match rather than an error.
    #[must_use]
    pub fn partial_cmp_value(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            _ if self.is_numeric() && other.is_numeric() => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            _ => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flag(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Date(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
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
    #[case(FieldValue::Int(12), FieldValue::Int(12), Some(true))]
    #[case(FieldValue::Int(12), FieldValue::Float(12.0), Some(true))] // numeric coercion
    #[case(FieldValue::Float(1.5), FieldValue::Float(2.5), Some(false))]
    #[case(FieldValue::from("Cluj"), FieldValue::from("Cluj"), Some(true))]
    #[case(FieldValue::from("Cluj"), FieldValue::Int(1), None)] // mixed kinds
    #[case(FieldValue::Flag(true), FieldValue::Flag(true), Some(true))]
    #[case(FieldValue::Flag(true), FieldValue::Int(1), None)]
    fn test_eq_value(
        #[case] a: FieldValue,
        #[case] b: FieldValue,
        #[case] expected: Option<bool>,
    ) {
        assert_eq!(a.eq_value(&b), expected);
    }

    #[rstest]
    #[case(FieldValue::Int(1), FieldValue::Int(2), Some(Ordering::Less))]
    #[case(FieldValue::Int(3), FieldValue::Float(2.5), Some(Ordering::Greater))]
    #[case(FieldValue::from("a"), FieldValue::from("b"), Some(Ordering::Less))]
    #[case(FieldValue::from("a"), FieldValue::Int(1), None)]
    #[case(FieldValue::Flag(true), FieldValue::Flag(false), None)] // flags unordered
    fn test_partial_cmp_value(
        #[case] a: FieldValue,
        #[case] b: FieldValue,
        #[case] expected: Option<Ordering>,
    ) {
        assert_eq!(a.partial_cmp_value(&b), expected);
    }

    #[rstest]
    fn test_nan_is_unordered() {
        let a = FieldValue::Float(f64::NAN);
        let b = FieldValue::Float(1.0);
        assert_eq!(a.partial_cmp_value(&b), None);
    }

    #[rstest]
    fn test_date_ordering() {
        let a = FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let b = FieldValue::Date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(a.partial_cmp_value(&b), Some(Ordering::Less));
    }

    #[rstest]
    #[case(FieldValue::Int(42), "42")]
    #[case(FieldValue::Float(1.5), "1.5")]
    #[case(FieldValue::from("Bucharest"), "\"Bucharest\"")]
    #[case(FieldValue::Flag(true), "true")]
    fn test_serde_wire_form(#[case] value: FieldValue, #[case] json: &str) {
        assert_eq!(serde_json::to_string(&value).unwrap(), json);
        let parsed: FieldValue = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, value);
    }

    #[rstest]
    fn test_serde_date_before_text() {
        let parsed: FieldValue = serde_json::from_str("\"2024-03-01\"").unwrap();
        assert_eq!(
            parsed,
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
    }

    #[rstest]
    fn test_serde_integer_stays_int() {
        let parsed: FieldValue = serde_json::from_str("20").unwrap();
        assert_eq!(parsed, FieldValue::Int(20));
        let parsed: FieldValue = serde_json::from_str("20.5").unwrap();
        assert_eq!(parsed, FieldValue::Float(20.5));
    }
}
