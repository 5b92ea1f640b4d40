// TTD - Time-Travel Debugging identity core
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! TTD - Time-Travel Debugging identity core
//!
//! Command-line inspector for built-in image descriptions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eyre::Result;

mod cmd;

/// Command-line interface for TTD
#[derive(Debug, Parser)]
#[command(name = "ttd")]
#[command(about = "Time-Travel Debugging - inspect core image paths and identity configuration")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: ~/.ttd/config.toml)
    #[arg(long, global = true, env = "TTD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also write logs to a daily rolling file
    #[arg(long, global = true)]
    pub log_file: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the deterministic path of every core image entity
    Paths {
        /// JSON image description
        image: PathBuf,
        /// Named roots to start from (default: every root in the image)
        #[arg(long = "root", value_name = "NAME")]
        roots: Vec<String>,
    },
    /// Check that path assignment is reproducible for an image
    Verify {
        /// JSON image description
        image: PathBuf,
    },
    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    ttd_common::logging::init_logging("ttd", cli.log_file)?;

    let config = cmd::load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Paths { image, roots } => {
            tracing::info!("Computing core paths for {}", image.display());
            cmd::print_paths(image, roots, config)
        }
        Commands::Verify { image } => {
            tracing::info!("Verifying path determinism for {}", image.display());
            cmd::verify_image(image, config)
        }
        Commands::Config => cmd::show_config(&config),
    }
}
