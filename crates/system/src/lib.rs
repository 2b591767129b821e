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

//! Broker nodes, routing, and the network supervisor for the sievebus
//! messaging fabric.
//!
//! A [`BrokerNetwork`](network::BrokerNetwork) supervises a fixed set of
//! [`Broker`](broker::Broker) nodes: subscriptions are placed round-robin,
//! publications are recorded durably then fanned out to every live broker,
//! and a health checker restarts failed nodes, which rehydrate from the
//! durable store.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod broker;
pub mod config;
pub mod network;
pub mod publisher;

pub use broker::{Broker, BrokerStats};
pub use config::SystemConfig;
pub use network::BrokerNetwork;
pub use publisher::Publisher;
