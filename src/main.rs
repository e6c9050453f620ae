//! Ajustar CLI
//!
//! Fine-tuning launcher for the ajustar library.
//!
//! # Usage
//!
//! ```bash
//! # Run the default recipe
//! ajustar train
//!
//! # Run with overrides
//! ajustar train --set trainer.optim.lr=0.0001 --set epochs=1
//!
//! # Resolve without training
//! ajustar train --dry-run
//!
//! # Show the effective configuration
//! ajustar info --set epochs=3
//!
//! # Show the dataset-settings grid
//! ajustar settings
//! ```

use clap::Parser;
use std::process::ExitCode;

use ajustar::cli::{run_command, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
