//! Vault seed discovery CLI
//!
//! Command-line interface for validating seed phrases and discovering the
//! wallets derived from them

use clap::Parser;
use std::process;
use vault_seed_discovery::cli::args::{BackupAction, Cli, Commands, ConfigAction};
use vault_seed_discovery::cli::commands;
use vault_seed_discovery::config::{ConfigOverrides, NetworkType};
use vault_seed_discovery::discovery::DiscoveryOptions;

fn main() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let network = cli.network.as_deref().map(|n| match n.parse::<NetworkType>() {
        Ok(network) => network,
        Err(_) => {
            eprintln!(
                "Error: Invalid network '{}'. Use: regtest, signet, testnet, or mainnet",
                n
            );
            process::exit(1);
        }
    });

    // Build config overrides from global arguments
    let overrides = ConfigOverrides {
        network,
        esplora_url: cli.esplora_url.clone(),
        gap_limit: cli.gap_limit,
        probe_timeout_secs: cli.probe_timeout,
    };
    let config_path = cli.config.as_deref();

    let result: Result<(), Box<dyn std::error::Error>> = match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Init { network } => {
                commands::config::init(network, config_path).map_err(Into::into)
            }
        },

        Commands::Validate { phrase } => commands::seed::validate(&phrase).map_err(Into::into),

        Commands::Derive {
            phrase,
            kind,
            account,
            count,
            passphrase,
        } => commands::seed::derive(
            &phrase,
            kind.into(),
            account,
            count,
            passphrase.as_deref(),
            config_path,
            overrides,
        )
        .map_err(Into::into),

        Commands::Discover {
            phrase,
            ask_passphrase,
            no_account_search,
            offline,
            json,
        } => {
            let options = DiscoveryOptions {
                ask_passphrase,
                search_accounts: !no_account_search,
                offline,
                templates: None,
            };
            match tokio::runtime::Runtime::new() {
                Ok(rt) => {
                    let outcome = rt.block_on(commands::discover::discover(
                        &phrase,
                        options,
                        json,
                        config_path,
                        overrides,
                    ));
                    // a stdin prompt abandoned by Ctrl-C may still be blocked on read
                    rt.shutdown_background();
                    outcome.map_err(Into::into)
                }
                Err(e) => Err(format!("Failed to create async runtime: {}", e).into()),
            }
        }

        Commands::Backup { action } => match action {
            BackupAction::Encrypt { phrase, password } => {
                commands::seed::backup_encrypt(&phrase, &password).map_err(Into::into)
            }
            BackupAction::Decrypt { backup, password } => {
                commands::seed::backup_decrypt(&backup, &password).map_err(Into::into)
            }
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
