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

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "sievebus",
    about = "Content-based publish/subscribe messaging fabric",
    version
)]
pub struct SievebusCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Runs a timed evaluation experiment and writes CSV results.
    Evaluate(EvaluateOpts),
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateOpts {
    /// Path to the JSON system configuration.
    #[arg(long, short = 'c')]
    pub config: PathBuf,

    /// Experiment label used in output file names.
    #[arg(long, default_value = "run")]
    pub label: String,

    /// Run duration in seconds.
    #[arg(long, default_value_t = 30)]
    pub duration_secs: u64,

    /// Total simple subscriptions to seed across subscribers.
    #[arg(long, default_value_t = 300)]
    pub subscriptions: usize,

    /// Number of publication producer threads.
    #[arg(long, default_value_t = 2)]
    pub producer_threads: usize,

    /// Durable store backing the broker network.
    #[arg(long, value_enum, default_value_t = StoreBackend::Memory)]
    pub store: StoreBackend,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local in-memory store.
    Memory,
    /// Redis server on the default localhost port.
    Redis,
}
