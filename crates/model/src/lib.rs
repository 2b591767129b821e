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

//! Data model for the sievebus messaging fabric.
//!
//! Defines the domain entities circulating through the system: identifiers,
//! the record schema, typed field values, publications (including the wire
//! codec), subscription conditions, subscriptions with tumbling-window
//! evaluation, and the conservative covering relation used to prune
//! forwarded advertisements.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod condition;
pub mod covering;
pub mod identifiers;
pub mod publication;
pub mod schema;
pub mod subscription;
pub mod value;

pub use condition::{Aggregate, CompareOp, Condition};
pub use covering::covers;
pub use identifiers::{BrokerId, PublicationId, SubscriberId, SubscriptionId};
pub use publication::Publication;
pub use schema::{FieldSpec, FieldType, Schema};
pub use subscription::Subscription;
pub use value::FieldValue;
