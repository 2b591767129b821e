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

//! The process-local subscriber registry.
//!
//! Durable subscription snapshots carry only a `SubscriberId`; this registry
//! resolves the ID back to a live endpoint on delivery and after recovery,
//! avoiding ownership cycles between subscriptions and subscribers. Lookups
//! happen on broker worker threads, so the registry is a shared read-mostly
//! map rather than a thread-local.

use std::sync::{OnceLock, RwLock};

use ahash::AHashMap;
use sievebus_model::identifiers::SubscriberId;

use crate::subscriber::Subscriber;

static SUBSCRIBER_REGISTRY: OnceLock<RwLock<AHashMap<SubscriberId, Subscriber>>> =
    OnceLock::new();

fn registry() -> &'static RwLock<AHashMap<SubscriberId, Subscriber>> {
    SUBSCRIBER_REGISTRY.get_or_init(|| RwLock::new(AHashMap::new()))
}

/// Registers `subscriber` for delivery resolution, replacing any endpoint
/// previously registered under the same ID.
pub fn register_subscriber(subscriber: &Subscriber) {
    registry()
        .write()
        .expect("subscriber registry lock poisoned")
        .insert(subscriber.id(), subscriber.clone());
}

/// Removes the endpoint registered under `subscriber_id`, if any.
pub fn deregister_subscriber(subscriber_id: SubscriberId) {
    registry()
        .write()
        .expect("subscriber registry lock poisoned")
        .remove(&subscriber_id);
}

/// Resolves `subscriber_id` to its registered endpoint.
#[must_use]
pub fn get_subscriber(subscriber_id: SubscriberId) -> Option<Subscriber> {
    registry()
        .read()
        .expect("subscriber registry lock poisoned")
        .get(&subscriber_id)
        .cloned()
}

/// Clears the registry (teardown support).
pub fn clear_subscriber_registry() {
    registry()
        .write()
        .expect("subscriber registry lock poisoned")
        .clear();
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_register_resolve_deregister() {
        let subscriber = Subscriber::new(SubscriberId::new("registry_subscriber"));
        register_subscriber(&subscriber);

        let resolved = get_subscriber(subscriber.id()).unwrap();
        assert_eq!(resolved.id(), subscriber.id());

        deregister_subscriber(subscriber.id());
        assert!(get_subscriber(subscriber.id()).is_none());
    }

    #[rstest]
    fn test_reregistration_replaces() {
        let id = SubscriberId::new("replaced_subscriber");
        let first = Subscriber::new(id);
        register_subscriber(&first);
        first.receive(&sievebus_model::publication::Publication::poison());

        let second = Subscriber::new(id);
        register_subscriber(&second);
        assert_eq!(get_subscriber(id).unwrap().received_count(), 0);

        deregister_subscriber(id);
    }
}
