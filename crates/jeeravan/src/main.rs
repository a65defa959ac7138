// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Jeeravan - a realtime conversational assistant with semantic memory.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod doctor;
mod identity;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use jeeravan_config::{ConfigError, JeeravanConfig};

/// Jeeravan - a realtime conversational assistant with semantic memory.
#[derive(Parser, Debug)]
#[command(name = "jeeravan", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP and WebSocket server.
    Serve,
    /// Check configuration, storage, memory and the Gemini models.
    Doctor {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Manage identities.
    Identity {
        #[command(subcommand)]
        action: IdentityCommand,
    },
}

#[derive(Subcommand, Debug)]
enum IdentityCommand {
    /// Create an identity and print a signed credential for it.
    Create {
        /// Display name of the new identity.
        #[arg(long)]
        name: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            jeeravan_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => {
            if let Err(errors) = jeeravan_config::validate_serve_requirements(&config) {
                jeeravan_config::render_errors(&errors);
                std::process::exit(1);
            }
            serve::run_serve(config).await
        }
        Some(Commands::Doctor { plain }) => doctor::run_doctor(&config, plain).await,
        Some(Commands::Identity {
            action: IdentityCommand::Create { name },
        }) => identity::run_create(&config, &name).await,
        None => {
            println!("jeeravan: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<JeeravanConfig, Vec<ConfigError>> {
    match path {
        Some(path) => jeeravan_config::load_and_validate_path(path),
        None => jeeravan_config::load_and_validate(),
    }
}
