//! Discover command implementation

use async_trait::async_trait;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::config::{load_config, ConfigError, ConfigOverrides};
use crate::discovery::{Discovery, DiscoveryError, DiscoveryListener, DiscoveryOptions, DiscoveryResult};
use crate::types::DiscoveredWallet;

#[derive(Debug, thiserror::Error)]
pub enum DiscoverCommandError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Prints events to the terminal and reads secrets from stdin
struct ConsoleListener {
    json: bool,
}

#[async_trait]
impl DiscoveryListener for ConsoleListener {
    fn on_progress(&self, text: &str) {
        eprintln!("  … {}", text);
    }

    fn on_wallet(&self, wallet: &DiscoveredWallet) {
        if self.json {
            eprintln!("  found {} account {}", wallet.kind, wallet.account);
        } else {
            print_wallet(wallet);
        }
    }

    async fn on_password_request(&self, title: &str, prompt: &str) -> Option<String> {
        let title = title.to_string();
        let prompt = prompt.to_string();
        let answer = tokio::task::spawn_blocking(move || read_secret(&title, &prompt)).await;
        answer.ok().flatten()
    }
}

/// Run discovery against the configured Esplora server
///
/// Ctrl-C cancels the run; the wallets found so far are still printed.
pub async fn discover(
    input: &str,
    options: DiscoveryOptions,
    json: bool,
    config_path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<(), DiscoverCommandError> {
    let config = load_config(config_path, overrides)?;
    eprintln!(
        "Discovering wallets on {} via {}",
        config.bitcoin.network, config.bitcoin.esplora_url
    );

    let discovery = Discovery::with_esplora(config);
    let task = discovery.start(input, options)?;

    let cancel = task.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling...");
            cancel.cancel();
        }
    });

    let listener = ConsoleListener { json };
    let result = task.run_with(&listener).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }

    Ok(())
}

fn print_wallet(wallet: &DiscoveredWallet) {
    let marker = if wallet.has_history { "✓" } else { "·" };
    println!("{} {} - account {}", marker, wallet.kind, wallet.account);
    if let Some(path) = wallet.derivation_path() {
        println!("    Path:          {}", path);
    }
    println!("    First address: {}", wallet.first_address);
    println!("    Next unused:   {}", wallet.next_unused_index);
    println!("    Wallet ID:     {}", wallet.id);
}

fn print_summary(result: &DiscoveryResult) {
    println!();
    if result.cancelled {
        println!("Discovery cancelled: {} wallets found before stopping", result.wallets.len());
    } else if result.found_history() {
        println!("✓ Discovery complete: {} wallets", result.wallets.len());
    } else {
        println!("✓ Discovery complete: no history found, default wallets offered");
    }

    for failure in &result.failures {
        println!("  ✗ {}", failure);
    }

    let elapsed = result.finished_at - result.started_at;
    println!("  Took {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0);
}

/// Prompt on stderr and read one line from stdin
///
/// An empty line or a read error declines.
fn read_secret(title: &str, prompt: &str) -> Option<String> {
    eprint!("{} - {}: ", title, prompt);
    std::io::stderr().flush().ok()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line).ok()?;
    let secret = line.trim_end_matches(|c: char| c == '\r' || c == '\n').to_string();
    if secret.is_empty() {
        None
    } else {
        Some(secret)
    }
}
