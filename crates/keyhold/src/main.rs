// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! keyhold - command-line tools for the keyhold vault core.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod keys;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use keyhold_config::KeyholdConfig;

/// keyhold - session-scoped vault crypto tools.
#[derive(Parser, Debug)]
#[command(name = "keyhold", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a fresh base64 user salt.
    Salt,
    /// Derive the master key and print the base64 auth hash.
    AuthHash {
        /// The user's base64 salt.
        #[arg(long)]
        salt: String,
    },
    /// Check a master password against a stored auth hash (exit 0 on match).
    Verify {
        /// The user's base64 salt.
        #[arg(long)]
        salt: String,
        /// The stored base64 auth hash.
        #[arg(long)]
        hash: String,
    },
    /// Load and validate configuration, then print the effective settings.
    CheckConfig,
    /// Run an encrypt/decrypt/clear round trip against a fresh session store.
    SelfTest,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match keyhold_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            keyhold_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.logging.level);

    let result = match cli.command {
        Commands::Salt => keys::run_salt(),
        Commands::AuthHash { salt } => keys::run_auth_hash(&config, &salt).await,
        Commands::Verify { salt, hash } => match keys::run_verify(&config, &salt, &hash).await {
            Ok(true) => {
                println!("ok");
                Ok(())
            }
            Ok(false) => {
                eprintln!("keyhold: master password does not match");
                return ExitCode::FAILURE;
            }
            Err(e) => Err(e),
        },
        Commands::CheckConfig => {
            print_config(&config);
            Ok(())
        }
        Commands::SelfTest => self_test::run_self_test(&config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("keyhold: error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_config(config: &KeyholdConfig) {
    println!("configuration is valid");
    println!("  vault.kdf_iterations      = {}", config.vault.kdf_iterations);
    println!(
        "  session.idle_timeout_secs = {}",
        config.session.idle_timeout_secs
    );
    println!(
        "  session.max_lifetime_secs = {}",
        config.session.max_lifetime_secs
    );
    println!(
        "  session.sweep_interval    = {}",
        config.session.sweep_interval_secs
    );
    println!("  crypto.worker_threads     = {}", config.crypto.worker_threads);
    println!("  logging.level             = {}", config.logging.level);
}

/// Initializes the tracing subscriber with the given log level. Logs go to
/// stderr so command output on stdout stays machine-readable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("keyhold={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
