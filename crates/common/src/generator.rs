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

//! Schema-driven synthetic publication and subscription generation.
//!
//! Drives load experiments and the optional subscriber auto-subscription
//! loop. Subscription shape is controlled by two frequency maps: per-field
//! inclusion probability and per-field equality-operator bias.

use anyhow::Context;
use chrono::Days;
use indexmap::IndexMap;
use rand::Rng;
use rand::RngExt;
use sievebus_core::correctness::{check_positive_usize, check_predicate_true};
use sievebus_model::{
    condition::{Aggregate, CompareOp, Condition},
    publication::Publication,
    schema::{FieldSpec, FieldType, Schema},
    value::FieldValue,
};
use ustr::Ustr;

const DEFAULT_EQ_FREQ: f64 = 0.5;
const MIN_FIELD_FREQ: f64 = 0.05;

/// Generates schema-conformant random publications and random subscriptions.
#[derive(Clone, Debug)]
pub struct RecordGenerator {
    schema: Schema,
    field_freq: IndexMap<Ustr, f64>,
    eq_freq: IndexMap<Ustr, f64>,
    window_size: usize,
}

impl RecordGenerator {
    /// Creates a new [`RecordGenerator`] instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema is invalid or empty, a frequency map
    /// references an undeclared field, or `window_size` is zero.
    pub fn new(
        schema: Schema,
        field_freq: IndexMap<Ustr, f64>,
        eq_freq: IndexMap<Ustr, f64>,
        window_size: usize,
    ) -> anyhow::Result<Self> {
        schema.validate()?;
        check_predicate_true(
            !schema.fields.is_empty(),
            "generator schema declares no fields",
        )?;
        check_positive_usize(window_size, stringify!(window_size))?;
        for field in field_freq.keys().chain(eq_freq.keys()) {
            if schema.field(field.as_str()).is_none() {
                anyhow::bail!("frequency map references undeclared field '{field}'");
            }
        }
        Ok(Self {
            schema,
            field_freq,
            eq_freq,
            window_size,
        })
    }

    /// Creates a generator with fabricated frequency maps (see
    /// [`generate_field_frequencies`] / [`generate_equality_frequencies`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema is invalid or `window_size` is zero.
    pub fn with_random_frequencies(
        schema: Schema,
        min_eq: f64,
        window_size: usize,
    ) -> anyhow::Result<Self> {
        let fields = schema.field_names();
        let field_freq = generate_field_frequencies(&fields);
        let chosen: Vec<Ustr> = field_freq.keys().copied().collect();
        let eq_freq = generate_equality_frequencies(&chosen, min_eq);
        Self::new(schema, field_freq, eq_freq, window_size)
    }

    /// Returns the configured window size for generated window subscriptions.
    #[must_use]
    pub const fn window_size(&self) -> usize {
        self.window_size
    }

    /// Returns the schema driving generation.
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Generates one publication carrying a value for every schema field.
    #[must_use]
    pub fn generate_publication(&self) -> Publication {
        let mut rng = rand::rng();
        let mut fields = IndexMap::new();
        for spec in &self.schema.fields {
            fields.insert(spec.name, random_value(spec, &mut rng));
        }
        Publication::new(fields)
    }

    /// Generates conditions for a random simple subscription.
    ///
    /// Each frequency-map field is included with its configured probability;
    /// at least one condition is always produced.
    #[must_use]
    pub fn generate_conditions(&self) -> Vec<Condition> {
        let mut rng = rand::rng();
        let mut conditions = Vec::new();

        for (field, freq) in &self.field_freq {
            if rng.random::<f64>() >= *freq {
                continue;
            }
            // Frequency keys are validated against the schema at construction
            let spec = self
                .schema
                .field(field.as_str())
                .expect("frequency field validated at construction");
            conditions.push(self.random_condition(spec, &mut rng));
        }

        if conditions.is_empty() {
            let field = self
                .field_freq
                .keys()
                .next()
                .copied()
                .unwrap_or(self.schema.fields[0].name);
            let spec = self
                .schema
                .field(field.as_str())
                .expect("frequency field validated at construction");
            conditions.push(self.random_condition(spec, &mut rng));
        }

        conditions
    }

    /// Generates conditions for a random window subscription: one or two
    /// aggregate aliases over numeric schema fields.
    ///
    /// Falls back to a simple-subscription shape when the schema declares no
    /// numeric fields.
    #[must_use]
    pub fn generate_window_conditions(&self) -> Vec<Condition> {
        let mut rng = rand::rng();
        let numeric = self.schema.numeric_field_names();
        if numeric.is_empty() {
            return self.generate_conditions();
        }

        let count = rng.random_range(1..=numeric.len().min(2));
        let mut conditions = Vec::with_capacity(count);
        let mut remaining = numeric;
        for _ in 0..count {
            let base = remaining.swap_remove(rng.random_range(0..remaining.len()));
            let spec = self
                .schema
                .field(base.as_str())
                .expect("numeric field comes from the schema");
            let aggregate = match rng.random_range(0..3) {
                0 => Aggregate::Avg,
                1 => Aggregate::Min,
                _ => Aggregate::Max,
            };
            let op = random_inequality(&mut rng);
            conditions.push(Condition::new(
                format!("{aggregate}_{base}"),
                op,
                random_value(spec, &mut rng),
            ));
        }
        conditions
    }

    fn random_condition<R: Rng>(&self, spec: &FieldSpec, rng: &mut R) -> Condition {
        let eq_freq = self
            .eq_freq
            .get(&spec.name)
            .copied()
            .unwrap_or(DEFAULT_EQ_FREQ);
        let use_equality = rng.random_bool(eq_freq.clamp(0.0, 1.0));
        let op = if use_equality {
            CompareOp::Eq
        } else if spec.field_type == FieldType::Text {
            CompareOp::Ne
        } else {
            random_inequality(rng)
        };
        Condition::new(spec.name.as_str(), op, random_value(spec, rng))
    }
}

fn random_inequality<R: Rng>(rng: &mut R) -> CompareOp {
    match rng.random_range(0..4) {
        0 => CompareOp::Lt,
        1 => CompareOp::Le,
        2 => CompareOp::Gt,
        _ => CompareOp::Ge,
    }
}

fn random_value<R: Rng>(spec: &FieldSpec, rng: &mut R) -> FieldValue {
    match spec.field_type {
        FieldType::Int => {
            let (min, max) = spec
                .numeric_range()
                .expect("numeric domain validated at construction");
            FieldValue::Int(rng.random_range(min as i64..=max as i64))
        }
        FieldType::Float => {
            let (min, max) = spec
                .numeric_range()
                .expect("numeric domain validated at construction");
            FieldValue::Float(rng.random_range(min..=max))
        }
        FieldType::Text => {
            let choices = spec
                .choices
                .as_ref()
                .expect("choices validated at construction");
            FieldValue::Text(choices[rng.random_range(0..choices.len())].clone())
        }
        FieldType::Date => {
            let (min, max) = spec
                .date_range()
                .expect("date domain validated at construction");
            let span_days = (max - min).num_days().max(0) as u64;
            let offset = rng.random_range(0..=span_days);
            FieldValue::Date(min.checked_add_days(Days::new(offset)).unwrap_or(max))
        }
    }
}

/// Fabricates a per-field inclusion frequency map over a random subset of
/// `fields`, adjusted so the frequencies sum to at least 1.0 (every generated
/// subscription then has at least one condition in expectation).
#[must_use]
pub fn generate_field_frequencies(fields: &[Ustr]) -> IndexMap<Ustr, f64> {
    let mut rng = rand::rng();
    let mut freq = IndexMap::new();

    for field in fields {
        if rng.random_bool(0.5) {
            let value = rng.random_range(MIN_FIELD_FREQ..=1.0);
            freq.insert(*field, (value * 100.0).round() / 100.0);
        }
    }
    if freq.is_empty() && !fields.is_empty() {
        freq.insert(fields[rng.random_range(0..fields.len())], 1.0);
    }

    let sum: f64 = freq.values().sum();
    if sum < 1.0 {
        if let Some(value) = freq.values_mut().next() {
            *value += 1.0 - sum;
        }
    }
    freq
}

/// Fabricates a per-field equality-operator bias map over `fields`, each at
/// least `min_eq`.
#[must_use]
pub fn generate_equality_frequencies(fields: &[Ustr], min_eq: f64) -> IndexMap<Ustr, f64> {
    let mut rng = rand::rng();
    let min_eq = min_eq.clamp(0.0, 1.0);
    fields
        .iter()
        .map(|field| {
            let value = rng.random_range(min_eq..=1.0);
            (*field, (value * 100.0).round() / 100.0)
        })
        .collect()
}

/// Parses a frequency map keyed by field name from loosely-typed JSON config.
///
/// # Errors
///
/// Returns an error if a value is not numeric.
pub fn frequencies_from_json(
    map: &IndexMap<String, serde_json::Value>,
) -> anyhow::Result<IndexMap<Ustr, f64>> {
    map.iter()
        .map(|(field, value)| {
            let freq = value
                .as_f64()
                .with_context(|| format!("frequency for '{field}' is not numeric"))?;
            Ok((Ustr::from(field), freq))
        })
        .collect()
}
