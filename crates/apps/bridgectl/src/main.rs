//! SheetBridge command-line entry points
//!
//! # Commands
//!
//! - `login` - interactive Google authorization, prints a sealed refresh credential
//! - `run` - unattended sync of every active registry pairing (cron entry point)
//! - `sync` - manual sync of pairings described in a JSON file
//! - `pairs` - registry inspection and soft activation toggles
//! - `seal` - seal a raw refresh token with the operator secret

use std::fs;
use std::io::Read;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use bridge::registry::PairsRegistry;
use bridge::sync::{BatchContext, ManualPair, SyncOptions, run_manual, run_unattended};
use bridge::{
    BitableClient, Direction, GoogleAuth, GoogleCredentials, LarkCredentials, Pairing,
    SheetsClient, SheetsFactory, SyncConfig, crypto, links,
};

/// Google Sheets / Lark Bitable synchronization tools.
#[derive(Parser)]
#[command(name = "bridgectl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize a Google account interactively and print its sealed
    /// refresh credential
    Login {
        /// Print the raw refresh token instead of sealing it
        #[arg(long)]
        raw: bool,
    },

    /// Sync every active registry pairing
    Run,

    /// Sync pairings described in a JSON array ("-" reads stdin)
    Sync {
        /// Path to a JSON file of pairs
        file: String,
    },

    /// Registry inspection and maintenance
    Pairs {
        #[command(subcommand)]
        command: PairsCommand,
    },

    /// Seal a refresh token with the operator secret
    Seal {
        /// The raw refresh token to seal
        refresh_token: String,
    },
}

#[derive(Subcommand)]
enum PairsCommand {
    /// List registry rows
    List,
    /// Register a new pairing as an appended registry row
    Add {
        /// Google Sheet share link
        #[arg(long)]
        sheet_url: String,
        /// Bitable share link (/base/<baseId>?table=<tableId>)
        #[arg(long)]
        base_url: String,
        /// "lark-to-sheet" (default) or "sheet-to-lark"
        #[arg(long, default_value = "lark-to-sheet")]
        direction: String,
        /// Audit attribution for unattended runs
        #[arg(long, default_value = "")]
        owner: String,
        /// Raw refresh token; sealed with the operator secret before storage.
        /// Omit to register the pairing for manual syncs only.
        #[arg(long)]
        refresh_token: Option<String>,
        /// Free-text note
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Soft-delete a pairing by registry row
    Deactivate { row_id: usize },
    /// Re-activate a pairing by registry row
    Activate { row_id: usize },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = config::init() {
        warn!("failed to initialize config directory: {}", e);
    }

    match Cli::parse().command {
        Commands::Login { raw } => login(raw),
        Commands::Run => run(),
        Commands::Sync { file } => sync(&file),
        Commands::Pairs { command } => pairs(command),
        Commands::Seal { refresh_token } => seal(&refresh_token),
    }
}

fn login(raw: bool) -> Result<()> {
    let sync_config = SyncConfig::from_env();
    let auth = GoogleAuth::new(GoogleCredentials::load()?);

    let domain = Some(sync_config.allowed_domain.as_str()).filter(|d| !d.is_empty());
    let token = auth.authorize_interactive(domain)?;

    if let Some(id_token) = token.id_token.as_deref()
        && let Ok(claims) = auth.verify_id_token(id_token)
        && let Some(email) = claims.email
    {
        info!("authorized as {}", email);
    }

    let refresh = token
        .refresh_token
        .context("no refresh token issued; revoke the app's access and log in again")?;
    if raw {
        println!("{}", refresh);
    } else {
        let secret = bridge::config::sync_secret()?;
        println!("{}", crypto::seal(&refresh, &secret)?);
    }
    Ok(())
}

fn run() -> Result<()> {
    let sync_config = SyncConfig::from_env();
    let secret = bridge::config::sync_secret()?;
    let owner_refresh = bridge::config::owner_refresh_token()?;

    let auth = GoogleAuth::new(GoogleCredentials::load()?);
    let records = BitableClient::new(LarkCredentials::from_env()?);
    let grids = SheetsFactory;
    let ctx = BatchContext {
        config: &sync_config,
        auth: &auth,
        grids: &grids,
        records: &records,
        options: SyncOptions::with_max_rows(sync_config.max_rows_per_sync),
    };

    let report = run_unattended(&ctx, &owner_refresh, &secret)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn sync(file: &str) -> Result<()> {
    let payload = if file == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read pairs from stdin")?;
        buf
    } else {
        fs::read_to_string(file).with_context(|| format!("failed to read {}", file))?
    };
    let pairs: Vec<ManualPair> =
        serde_json::from_str(&payload).context("expected a JSON array of pairs")?;

    let sync_config = SyncConfig::from_env();
    let auth = GoogleAuth::new(GoogleCredentials::load()?);
    let records = BitableClient::new(LarkCredentials::from_env()?);
    let grids = SheetsFactory;
    let ctx = BatchContext {
        config: &sync_config,
        auth: &auth,
        grids: &grids,
        records: &records,
        options: SyncOptions::with_max_rows(sync_config.max_rows_per_sync),
    };

    let report = run_manual(&ctx, &pairs)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn pairs(command: PairsCommand) -> Result<()> {
    let sync_config = SyncConfig::from_env();
    let history_sheet = sync_config.require_history_sheet()?.to_string();

    let auth = GoogleAuth::new(GoogleCredentials::load()?);
    let access = auth.refresh_access_token(&bridge::config::owner_refresh_token()?)?;
    let grid = SheetsClient::new(access);
    let registry = PairsRegistry::new(&grid, &history_sheet, &sync_config.pairs_tab);

    match command {
        PairsCommand::List => {
            for p in registry.read_pairings()? {
                let state = if p.active { "active" } else { "inactive" };
                let last = if p.last_synced_at.is_empty() {
                    "never"
                } else {
                    p.last_synced_at.as_str()
                };
                println!(
                    "{:>4}  {:8}  {:13}  {} <-> {}/{}  owner: {}  last: {}",
                    p.row_id, state, p.direction, p.sheet_id, p.base_id, p.table_id, p.owner, last
                );
            }
        }
        PairsCommand::Add {
            sheet_url,
            base_url,
            direction,
            owner,
            refresh_token,
            notes,
        } => {
            let sheet_id = links::parse_sheet_id(&sheet_url);
            if sheet_id.is_empty() {
                anyhow::bail!("invalid Google Sheet URL: {}", sheet_url);
            }
            let base_ref = links::parse_base_ref(&base_url);
            if base_ref.base_id.is_empty() || base_ref.table_id.is_empty() {
                anyhow::bail!(
                    "invalid base URL (expected /base/<baseId>?table=<tableId>): {}",
                    base_url
                );
            }
            let credential_enc = match refresh_token {
                Some(token) => crypto::seal(&token, &bridge::config::sync_secret()?)?,
                None => String::new(),
            };

            let pairing = Pairing {
                row_id: 0,
                created_at: String::new(),
                sheet_url,
                sheet_id,
                base_url,
                base_id: base_ref.base_id,
                table_id: base_ref.table_id,
                direction: Direction::parse(&direction),
                owner,
                credential_enc,
                active: true,
                last_synced_at: String::new(),
                notes,
            };
            registry.append(&pairing)?;
            println!(
                "pairing registered: {} <-> {}/{}",
                pairing.sheet_id, pairing.base_id, pairing.table_id
            );
        }
        PairsCommand::Deactivate { row_id } => {
            registry.set_active(row_id, false)?;
            println!("registry row {} deactivated", row_id);
        }
        PairsCommand::Activate { row_id } => {
            registry.set_active(row_id, true)?;
            println!("registry row {} activated", row_id);
        }
    }
    Ok(())
}

fn seal(refresh_token: &str) -> Result<()> {
    let secret = bridge::config::sync_secret()?;
    println!("{}", crypto::seal(refresh_token, &secret)?);
    Ok(())
}
