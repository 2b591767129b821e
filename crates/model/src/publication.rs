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

//! Publications: schema-conformant records circulating through the fabric.

use bytes::Bytes;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sievebus_core::UnixNanos;
use ustr::Ustr;

use crate::{
    identifiers::{PublicationId, SubscriptionId},
    value::FieldValue,
};

/// A test-only poison-pill marker: a publication carrying this field crashes
/// the broker worker that processes it, exercising the supervisor restart path.
pub const CRASH_FIELD: &str = "__crash__";

/// A single record circulating through the system.
///
/// Carries one value per schema field, plus an ID and a publish timestamp.
/// Meta-publications emitted by windowed subscriptions carry the computed
/// aggregates as their fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    /// The publication ID.
    pub id: PublicationId,
    /// Nanoseconds since the UNIX epoch at publish time; assigned by the
    /// network when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<UnixNanos>,
    /// The field values, in schema order.
    #[serde(flatten)]
    pub fields: IndexMap<Ustr, FieldValue>,
}

impl Publication {
    /// Creates a new [`Publication`] instance with a fresh random ID.
    #[must_use]
    pub fn new(fields: IndexMap<Ustr, FieldValue>) -> Self {
        Self {
            id: PublicationId::random(),
            timestamp: None,
            fields,
        }
    }

    /// Creates a new [`Publication`] instance with the given ID.
    #[must_use]
    pub fn with_id(id: PublicationId, fields: IndexMap<Ustr, FieldValue>) -> Self {
        Self {
            id,
            timestamp: None,
            fields,
        }
    }

    /// Creates the meta-publication emitted when the windowed `subscription_id`
    /// fires, carrying the computed aggregate values.
    #[must_use]
    pub fn meta(
        subscription_id: SubscriptionId,
        aggregates: IndexMap<Ustr, f64>,
        now: UnixNanos,
    ) -> Self {
        let fields = aggregates
            .into_iter()
            .map(|(alias, value)| (alias, FieldValue::Float(value)))
            .collect();
        Self {
            id: PublicationId::new(format!("meta_{subscription_id}_{}", now.as_millis())),
            timestamp: Some(now),
            fields,
        }
    }

    /// Creates the test-only poison pill (see [`CRASH_FIELD`]).
    #[must_use]
    pub fn poison() -> Self {
        let mut fields = IndexMap::new();
        fields.insert(Ustr::from(CRASH_FIELD), FieldValue::Flag(true));
        Self::new(fields)
    }

    /// Returns the value of `field`, if present.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(&Ustr::from(field))
    }

    /// Returns whether this publication is the poison-pill sentinel.
    #[must_use]
    pub fn is_poison(&self) -> bool {
        matches!(self.get(CRASH_FIELD), Some(FieldValue::Flag(true)))
    }

    /// Encodes the publication to its canonical JSON wire form.
    ///
    /// The codec satisfies `decode(encode(p)) = p`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_bytes(&self) -> anyhow::Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Decodes a publication from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is not a valid encoding.
    pub fn from_json_bytes(data: &[u8]) -> anyhow::Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}
