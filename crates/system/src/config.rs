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

//! System configuration loading.
//!
//! One JSON file carries the record schema plus run settings. An invalid
//! schema is fatal at load time; no brokers start on a partial configuration.

use std::{path::Path, time::Duration};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sievebus_common::generator::{
    RecordGenerator, frequencies_from_json, generate_equality_frequencies,
    generate_field_frequencies,
};
use sievebus_model::schema::Schema;
use ustr::Ustr;

/// System configuration: the shared record schema plus run settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemConfig {
    /// The record schema shared by producers and consumers.
    pub schema: Schema,
    /// Number of broker nodes in the network.
    #[serde(default = "default_num_brokers")]
    pub num_brokers: usize,
    /// Number of subscriber endpoints to simulate.
    #[serde(default = "default_num_subscribers")]
    pub num_subscribers: usize,
    /// Window size handed to generated window subscriptions.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Publication generation interval per producer thread (milliseconds).
    #[serde(default = "default_publication_interval_ms")]
    pub publication_interval_ms: u64,
    /// Minimum equality-operator bias for generated conditions.
    #[serde(default = "default_min_equality_freq")]
    pub min_equality_freq: f64,
    /// Per-field inclusion frequencies; fabricated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freq_fields: Option<IndexMap<String, serde_json::Value>>,
    /// Per-field equality-operator biases; fabricated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freq_equality: Option<IndexMap<String, serde_json::Value>>,
    /// Directory receiving evaluation output.
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
}

const fn default_num_brokers() -> usize {
    3
}

const fn default_num_subscribers() -> usize {
    3
}

const fn default_window_size() -> usize {
    10
}

const fn default_publication_interval_ms() -> u64 {
    400
}

const fn default_min_equality_freq() -> f64 {
    0.7
}

fn default_results_dir() -> String {
    "results".to_string()
}

impl SystemConfig {
    /// Loads and validates the configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// schema fails validation (fatal: no partial start).
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            anyhow::anyhow!("failed to read config '{}': {e}", path.as_ref().display())
        })?;
        Self::from_json_str(&content)
    }

    /// Parses and validates the configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or schema validation fails.
    pub fn from_json_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.schema.validate()?;
        Ok(config)
    }

    /// Returns the publication generation interval.
    #[must_use]
    pub const fn publication_interval(&self) -> Duration {
        Duration::from_millis(self.publication_interval_ms)
    }

    /// Builds the record generator from the configured (or fabricated)
    /// frequency maps.
    ///
    /// # Errors
    ///
    /// Returns an error if a frequency map is malformed or references an
    /// undeclared field.
    pub fn build_generator(&self) -> anyhow::Result<RecordGenerator> {
        let field_freq = match &self.freq_fields {
            Some(map) => frequencies_from_json(map)?,
            None => generate_field_frequencies(&self.schema.field_names()),
        };
        let eq_freq = match &self.freq_equality {
            Some(map) => frequencies_from_json(map)?,
            None => {
                let chosen: Vec<Ustr> = field_freq.keys().copied().collect();
                generate_equality_frequencies(&chosen, self.min_equality_freq)
            }
        };
        RecordGenerator::new(self.schema.clone(), field_freq, eq_freq, self.window_size)
    }
}
