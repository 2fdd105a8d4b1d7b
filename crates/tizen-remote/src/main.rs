//! tizen-remote: command-line remote for Samsung Tizen TVs.
//!
//! # Usage
//!
//! ```text
//! tizen-remote [--config <PATH>] <COMMAND>
//!
//! Commands:
//!   discover                     Find TVs on the LAN and save them
//!   list                         Show saved TVs
//!   info      <ID>               Print device metadata
//!   apps      <ID>               List installed apps
//!   power-on  <ID> [--timeout-secs N]
//!   power-off <ID> [--timeout-secs N]
//!   key       <ID> <KEY> [--action click|press|release]
//!   keys      <ID> <KEY>... [--delay-ms N]
//!   open-app  <ID> <APP_ID>
//!   browser   <ID> <URL>
//! ```
//!
//! Keys are accepted with or without the `KEY_` prefix, case-insensitively
//! (`power`, `KEY_VOLUP`, `hdmi1`).
//!
//! # Environment variable overrides
//!
//! | Variable              | Description                                  |
//! |-----------------------|----------------------------------------------|
//! | `TIZEN_REMOTE_CONFIG` | Registry file (default: platform config dir) |
//! | `RUST_LOG`            | Log filter (default: `info`)                 |
//!
//! The first command that opens a control channel to a new TV makes the TV
//! show an "Allow" prompt.  Once accepted, the issued token is saved in the
//! registry and later runs connect without prompting.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tizen_core::{Key, KeyAction, KeySequence};
use tizen_remote::application::TvManager;
use tizen_remote::infrastructure::storage::config::TomlConfigStorage;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Remote control for Samsung Tizen TVs.
#[derive(Debug, Parser)]
#[command(name = "tizen-remote", about = "Remote control for Samsung Tizen TVs", version)]
struct Cli {
    /// Device registry file.
    ///
    /// Defaults to `devices.toml` in the platform config directory.
    #[arg(long, global = true, env = "TIZEN_REMOTE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Discover TVs on the local network and save them to the registry.
    Discover,
    /// List TVs saved in the registry.
    List,
    /// Print device metadata.
    Info { id: String },
    /// List installed apps.
    Apps { id: String },
    /// Wake the TV and open the control channel.
    PowerOn {
        id: String,
        #[arg(long, default_value_t = 15)]
        timeout_secs: u64,
    },
    /// Send the power key and wait until the TV is off.
    PowerOff {
        id: String,
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,
    },
    /// Send one key.
    Key {
        id: String,
        key: Key,
        #[arg(long, value_enum, default_value_t = ActionArg::Click)]
        action: ActionArg,
    },
    /// Click several keys in order.
    Keys {
        id: String,
        #[arg(required = true)]
        keys: Vec<Key>,
        /// Pause after each key.
        #[arg(long, default_value_t = 500)]
        delay_ms: u64,
    },
    /// Open an app by id.
    OpenApp { id: String, app_id: String },
    /// Open a URL in the TV's browser.
    Browser { id: String, url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ActionArg {
    Click,
    Press,
    Release,
}

impl From<ActionArg> for KeyAction {
    fn from(action: ActionArg) -> Self {
        match action {
            ActionArg::Click => KeyAction::Click,
            ActionArg::Press => KeyAction::Press,
            ActionArg::Release => KeyAction::Release,
        }
    }
}

/// Builds a click sequence with a uniform post-delay.
fn click_sequence(keys: &[Key], delay: Duration) -> KeySequence {
    let mut sequence = KeySequence::new();
    for key in keys {
        sequence.click(*key).wait(delay);
    }
    sequence
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `RUST_LOG` overrides the default `info` level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let storage = match cli.config {
        Some(path) => TomlConfigStorage::new(path),
        None => TomlConfigStorage::platform_default()
            .context("locating the device registry; pass --config")?,
    };
    info!("using device registry {}", storage.path().display());
    let manager = TvManager::new(Arc::new(storage));

    run(&manager, cli.command).await
}

async fn run(manager: &TvManager, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Discover => {
            let tvs = manager.discover().await.context("discovering TVs")?;
            manager.store(&tvs).context("saving discovered TVs")?;
            for tv in &tvs {
                println!("{}\t{}\t{}", tv.id(), tv.config().name, tv.config().host);
            }
        }
        Command::List => {
            for tv in manager.load().context("loading device registry")? {
                let config = tv.config();
                let transport = if config.control.secure { "wss" } else { "ws" };
                println!(
                    "{}\t{}\t{}\t{}:{}",
                    config.id, config.name, config.host, transport, config.control.port
                );
            }
        }
        Command::Info { id } => {
            let tv = manager.load_by_id(&id)?;
            let info = tv.info().await.with_context(|| format!("querying {id}"))?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Apps { id } => {
            let tv = manager.load_by_id(&id)?;
            let apps = tv.apps().await.with_context(|| format!("listing apps on {id}"))?;
            for app in apps {
                let state = if app.running { "running" } else { "stopped" };
                println!("{}\t{}\t{}", app.id, app.name, state);
            }
            tv.close().await?;
        }
        Command::PowerOn { id, timeout_secs } => {
            let tv = manager.load_by_id(&id)?;
            tv.power_on_within(Duration::from_secs(timeout_secs))
                .await
                .with_context(|| format!("powering on {id}"))?;
            tv.close().await?;
        }
        Command::PowerOff { id, timeout_secs } => {
            let tv = manager.load_by_id(&id)?;
            tv.power_off_within(Duration::from_secs(timeout_secs))
                .await
                .with_context(|| format!("powering off {id}"))?;
        }
        Command::Key { id, key, action } => {
            let tv = manager.load_by_id(&id)?;
            tv.send_key(key, action.into())
                .await
                .with_context(|| format!("sending {key} to {id}"))?;
            tv.close().await?;
        }
        Command::Keys { id, keys, delay_ms } => {
            let tv = manager.load_by_id(&id)?;
            let sequence = click_sequence(&keys, Duration::from_millis(delay_ms));
            tv.send_keys(&sequence)
                .await
                .with_context(|| format!("sending keys to {id}"))?;
            tv.close().await?;
        }
        Command::OpenApp { id, app_id } => {
            let tv = manager.load_by_id(&id)?;
            tv.open_app(&app_id)
                .await
                .with_context(|| format!("opening {app_id} on {id}"))?;
        }
        Command::Browser { id, url } => {
            let tv = manager.load_by_id(&id)?;
            tv.open_browser(&url)
                .await
                .with_context(|| format!("opening {url} on {id}"))?;
            tv.close().await?;
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
