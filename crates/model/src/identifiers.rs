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

//! Identifiers for the domain entities of the messaging fabric.

use std::{
    fmt::{Debug, Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sievebus_core::correctness::{FAILED, check_valid_string};
use ustr::Ustr;
use uuid::Uuid;

/// Represents a valid broker node ID.
///
/// Broker IDs are stable across restarts: a supervisor recreates a failed
/// broker under the same ID so durable state can be rehydrated.
#[repr(C)]
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BrokerId(Ustr);

/// Represents a valid subscriber endpoint ID.
#[repr(C)]
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriberId(Ustr);

/// Represents a publication ID.
///
/// Regular publications carry a UUID v4 string; meta-publications emitted by
/// windowed subscriptions use the `meta_<subscription_id>_<millis>` form.
#[repr(C)]
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicationId(Ustr);

/// Represents a subscription ID (UUID v4).
#[repr(C)]
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

macro_rules! impl_ustr_identifier {
    ($ty:ident) => {
        impl $ty {
            /// Creates a new identifier instance.
            ///
            /// # Errors
            ///
            /// Returns an error if `value` is not a valid string.
            pub fn new_checked<T: AsRef<str>>(value: T) -> anyhow::Result<Self> {
                check_valid_string(value.as_ref(), stringify!(value))?;
                Ok(Self(Ustr::from(value.as_ref())))
            }

            /// Creates a new identifier instance.
            ///
            /// # Panics
            ///
            /// Panics if `value` is not a valid string.
            pub fn new<T: AsRef<str>>(value: T) -> Self {
                Self::new_checked(value).expect(FAILED)
            }

            /// Returns the inner identifier value.
            #[must_use]
            pub fn inner(&self) -> Ustr {
                self.0
            }

            /// Returns the inner identifier value as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl Debug for $ty {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:?}", self.0)
            }
        }

        impl Display for $ty {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

impl_ustr_identifier!(BrokerId);
impl_ustr_identifier!(SubscriberId);
impl_ustr_identifier!(PublicationId);

impl BrokerId {
    /// Returns the conventional broker ID for the given slot index (`broker_<index>`).
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        Self(Ustr::from(&format!("broker_{index}")))
    }
}

impl PublicationId {
    /// Generates a fresh random publication ID (UUID v4 string form).
    #[must_use]
    pub fn random() -> Self {
        Self(Ustr::from(&Uuid::new_v4().to_string()))
    }
}

impl SubscriptionId {
    /// Generates a fresh random subscription ID.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::random()
    }
}

impl FromStr for SubscriptionId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::try_parse(value)?))
    }
}

impl Debug for SubscriptionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}('{}')", stringify!(SubscriptionId), self.0)
    }
}

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
