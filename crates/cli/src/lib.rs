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

//! Command-line evaluation harness for the sievebus messaging fabric.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod evaluation;
pub mod opt;

use crate::opt::{Commands, SievebusCli};

/// Executes the parsed CLI command.
///
/// # Errors
///
/// Returns an error if the selected command fails.
pub fn run(cli: SievebusCli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Evaluate(opts) => {
            let summary = evaluation::run_experiment(&opts)?;
            println!("=== Results for experiment '{}' ===", summary.label);
            println!("Published publications: {}", summary.published);
            println!("Delivered messages:     {}", summary.delivered);
            println!("Average latency (ms):   {:.2}", summary.avg_latency_ms);
            println!("Match rate (%):         {:.2}", summary.match_rate_percent);
            Ok(())
        }
    }
}
