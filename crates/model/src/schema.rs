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

//! The record schema shared by producers and consumers.
//!
//! A schema is an ordered list of field descriptors fixed for a run. Invalid
//! schemas fail configuration loading; nothing starts on a partial schema.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sievebus_core::correctness::check_predicate_true;
use strum::{Display, EnumIter, EnumString};
use ustr::Ustr;

use crate::{condition::parse_aggregate_alias, value::FieldValue};

/// The declared type of a schema field.
#[repr(C)]
#[derive(
    Copy,
    Clone,
    Debug,
    Hash,
    PartialEq,
    Eq,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// 64-bit signed integer with an inclusive `[min, max]` domain.
    Int,
    /// 64-bit float with an inclusive `[min, max]` domain.
    Float,
    /// Text drawn from a non-empty choice list.
    #[serde(rename = "string")]
    #[strum(serialize = "string")]
    Text,
    /// Calendar date with an inclusive `[min, max]` domain and a strftime format.
    Date,
}

/// Describes a single schema field: name, type, and value domain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// The field name.
    pub name: Ustr,
    /// The declared field type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Domain lower bound (int/float/date).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<FieldValue>,
    /// Domain upper bound (int/float/date).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<FieldValue>,
    /// Value choices (string fields).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    /// strftime format (date fields).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl FieldSpec {
    /// Validates the descriptor against the rules for its declared type.
    ///
    /// # Errors
    ///
    /// Returns an error if mandatory keys are missing, bounds are not of the
    /// declared type, `min > max`, the choice list is empty, or a date bound
    /// does not parse with the declared format.
    pub fn validate(&self) -> anyhow::Result<()> {
        check_predicate_true(
            !self.name.is_empty(),
            "schema field with empty 'name'",
        )?;
        let name = self.name;

        match self.field_type {
            FieldType::Int | FieldType::Float => {
                let (min, max) = self.numeric_range().map_err(|e| {
                    anyhow::anyhow!("schema field '{name}': {e}")
                })?;
                check_predicate_true(
                    min <= max,
                    &format!("schema field '{name}': min {min} exceeds max {max}"),
                )?;
            }
            FieldType::Text => {
                let choices = self
                    .choices
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("schema field '{name}': missing 'choices'"))?;
                check_predicate_true(
                    !choices.is_empty(),
                    &format!("schema field '{name}': empty 'choices'"),
                )?;
            }
            FieldType::Date => {
                let (min, max) = self.date_range().map_err(|e| {
                    anyhow::anyhow!("schema field '{name}': {e}")
                })?;
                check_predicate_true(
                    min <= max,
                    &format!("schema field '{name}': min {min} exceeds max {max}"),
                )?;
            }
        }
        Ok(())
    }

    /// Returns the numeric `[min, max]` domain for int/float fields.
    ///
    /// # Errors
    ///
    /// Returns an error if either bound is missing or non-numeric.
    pub fn numeric_range(&self) -> anyhow::Result<(f64, f64)> {
        let bound = |value: &Option<FieldValue>, key: &str| -> anyhow::Result<f64> {
            value
                .as_ref()
                .and_then(FieldValue::as_f64)
                .ok_or_else(|| anyhow::anyhow!("missing or non-numeric '{key}'"))
        };
        Ok((bound(&self.min, "min")?, bound(&self.max, "max")?))
    }

    /// Returns the calendar `[min, max]` domain for date fields.
    ///
    /// Bounds may be given either in ISO form or in the field's declared
    /// strftime format.
    ///
    /// # Errors
    ///
    /// Returns an error if the format is missing or either bound does not parse.
    pub fn date_range(&self) -> anyhow::Result<(NaiveDate, NaiveDate)> {
        let format = self
            .format
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("missing 'format'"))?;
        let bound = |value: &Option<FieldValue>, key: &str| -> anyhow::Result<NaiveDate> {
            match value {
                Some(FieldValue::Date(date)) => Ok(*date),
                Some(FieldValue::Text(text)) => NaiveDate::parse_from_str(text, format)
                    .map_err(|e| anyhow::anyhow!("'{key}' does not parse with '{format}': {e}")),
                _ => anyhow::bail!("missing or non-date '{key}'"),
            }
        };
        Ok((bound(&self.min, "min")?, bound(&self.max, "max")?))
    }
}

/// An ordered set of field descriptors, immutable for a run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    /// The field descriptors, in declaration order.
    pub fields: Vec<FieldSpec>,
}

impl Schema {
    /// Creates a new [`Schema`] instance from the given descriptors.
    #[must_use]
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Validates every field descriptor and name uniqueness.
    ///
    /// # Errors
    ///
    /// Returns an error on the first invalid descriptor or duplicated name.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (index, field) in self.fields.iter().enumerate() {
            field.validate()?;
            check_predicate_true(
                !self.fields[..index].iter().any(|f| f.name == field.name),
                &format!("schema field '{}' declared more than once", field.name),
            )?;
        }
        Ok(())
    }

    /// Returns the descriptor for `name`, if declared.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns all declared field names.
    #[must_use]
    pub fn field_names(&self) -> Vec<Ustr> {
        self.fields.iter().map(|f| f.name).collect()
    }

    /// Returns the names of numeric (int/float) fields.
    #[must_use]
    pub fn numeric_field_names(&self) -> Vec<Ustr> {
        self.fields
            .iter()
            .filter(|f| matches!(f.field_type, FieldType::Int | FieldType::Float))
            .map(|f| f.name)
            .collect()
    }

    /// Returns whether `name` is usable in a condition: either a declared
    /// field, or an aggregate alias over a declared numeric base field.
    #[must_use]
    pub fn supports_condition_field(&self, name: &str) -> bool {
        if self.field(name).is_some() {
            return true;
        }
        match parse_aggregate_alias(name) {
            Some((_, base)) => self
                .field(base.as_str())
                .is_some_and(|f| matches!(f.field_type, FieldType::Int | FieldType::Float)),
            None => false,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn schema() -> Schema {
        serde_json::from_str(
            r#"[
                {"name": "city", "type": "string", "choices": ["Bucharest", "Cluj"]},
                {"name": "temp", "type": "int", "min": -10, "max": 40},
                {"name": "rain", "type": "float", "min": 0.0, "max": 100.0},
                {"name": "reported", "type": "date", "min": "2024-01-01", "max": "2024-12-31", "format": "%Y-%m-%d"}
            ]"#,
        )
        .unwrap()
    }

    #[rstest]
    fn test_valid_schema(schema: Schema) {
        assert!(schema.validate().is_ok());
        assert_eq!(schema.fields.len(), 4);
        assert_eq!(schema.field("temp").unwrap().field_type, FieldType::Int);
    }

    #[rstest]
    fn test_numeric_field_names(schema: Schema) {
        let names: Vec<&str> = schema
            .numeric_field_names()
            .iter()
            .map(Ustr::as_str)
            .collect();
        assert_eq!(names, vec!["temp", "rain"]);
    }

    #[rstest]
    #[case("temp", true)] // declared
    #[case("avg_temp", true)] // alias over numeric base
    #[case("max_rain", true)]
    #[case("avg_city", false)] // alias over non-numeric base
    #[case("wind", false)] // undeclared
    fn test_supports_condition_field(
        schema: Schema,
        #[case] name: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(schema.supports_condition_field(name), expected);
    }

    #[rstest]
    #[case(r#"[{"name": "temp", "type": "int", "min": 10}]"#)] // missing max
    #[case(r#"[{"name": "temp", "type": "int", "min": 50, "max": 40}]"#)] // min > max
    #[case(r#"[{"name": "city", "type": "string"}]"#)] // missing choices
    #[case(r#"[{"name": "city", "type": "string", "choices": []}]"#)] // empty choices
    #[case(r#"[{"name": "d", "type": "date", "min": "2024-01-01", "max": "2024-12-31"}]"#)] // missing format
    #[case(r#"[{"name": "a", "type": "int", "min": 0, "max": 1}, {"name": "a", "type": "int", "min": 0, "max": 1}]"#)] // duplicate
    fn test_invalid_schema(#[case] json: &str) {
        let schema: Schema = serde_json::from_str(json).unwrap();
        assert!(schema.validate().is_err());
    }

    #[rstest]
    fn test_unknown_type_fails_to_parse() {
        let result: Result<Schema, _> =
            serde_json::from_str(r#"[{"name": "x", "type": "decimal"}]"#);
        assert!(result.is_err());
    }

    #[rstest]
    fn test_date_range(schema: Schema) {
        let (min, max) = schema.field("reported").unwrap().date_range().unwrap();
        assert_eq!(min, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(max, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    }

    #[rstest]
    fn test_serde_round_trip(schema: Schema) {
        let json = serde_json::to_string(&schema).unwrap();
        let parsed: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, schema);
    }
}
