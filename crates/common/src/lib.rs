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

//! Common functionality and machinery for the sievebus messaging fabric.
//!
//! Holds the pieces shared between the broker layer and the outer surfaces:
//! logging setup, the shared Tokio runtime, the durable-store abstraction with
//! its in-memory implementation, the subscriber endpoint and its process-local
//! registry, and the schema-driven synthetic generator.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod generator;
pub mod logging;
pub mod registry;
pub mod runtime;
pub mod store;
pub mod subscriber;
pub mod testing;

pub use generator::RecordGenerator;
pub use store::{DurableStore, MemoryStore};
pub use subscriber::Subscriber;
