//! CLI argument definitions for Keyhole.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::DEFAULT_CONFIG_PATH;

/// Keyhole -- a delegated-authentication provider.
#[derive(Parser)]
#[command(
    name = "keyhole",
    version,
    about = "Keyhole -- delegated-authentication provider",
    long_about = "Lets consumer sites sign a user in by delegating to this provider. \
                  The user proves identity with the passphrase that unlocks the \
                  provider's sealed private key."
)]
pub struct Cli {
    /// Emit logs as JSON lines instead of the compact format.
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the provider's HTTP server.
    Serve {
        /// Path to the TOML configuration file.
        #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Address to bind the HTTP server to (overrides the config file).
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on (overrides the config file).
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Encrypt a PKCS#8 DER private key under a passphrase.
    SealKey {
        /// The unencrypted PKCS#8 DER key file.
        input: PathBuf,

        /// Where to write the sealed key.
        output: PathBuf,

        /// Passphrase used to seal the key.
        #[arg(long, env = "KEYHOLE_PASSPHRASE", hide_env_values = true)]
        passphrase: String,

        /// PBKDF2 iteration count.
        #[arg(long, default_value_t = keyhole_vault::crypto::DEFAULT_PBKDF2_ITERATIONS)]
        iterations: u32,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_defaults() {
        let cli = Cli::try_parse_from(["keyhole", "serve"]).unwrap();
        match cli.command {
            Commands::Serve { config, bind, port } => {
                assert_eq!(config, PathBuf::from(DEFAULT_CONFIG_PATH));
                assert!(bind.is_none());
                assert!(port.is_none());
            }
            _ => panic!("expected serve"),
        }
        assert!(!cli.json_logs);
    }

    #[test]
    fn seal_key_parses_arguments() {
        let cli = Cli::try_parse_from([
            "keyhole",
            "--json-logs",
            "seal-key",
            "in.der",
            "out.key",
            "--passphrase",
            "pw",
            "--iterations",
            "1000",
        ])
        .unwrap();

        assert!(cli.json_logs);
        match cli.command {
            Commands::SealKey {
                input,
                output,
                passphrase,
                iterations,
            } => {
                assert_eq!(input, PathBuf::from("in.der"));
                assert_eq!(output, PathBuf::from("out.key"));
                assert_eq!(passphrase, "pw");
                assert_eq!(iterations, 1000);
            }
            _ => panic!("expected seal-key"),
        }
    }
}
