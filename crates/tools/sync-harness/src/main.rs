//! CLI harness for exercising an mwebd-backed wallet
//!
//! Runs against a daemon on a local port, or launches one itself (`run`).
//! Commands that need keys read the phrase from `--mnemonic` or
//! `MWEB_MNEMONIC`.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use mweb_core::display::{
    confirmation_label, format_block_time, format_ltc, truncate_output_id,
};
use mweb_core::{generate_mnemonic, StatusSnapshot};
use mweb_daemon::DaemonConfig;
use mweb_params::{Chain, DEFAULT_RPC_PORT};
use mweb_sync_mwebd::{CancelToken, MwebRpc, MwebdClient, StreamOutcome, UtxoStreamEvent};
use mweb_wallet_service::WalletSession;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "sync-harness")]
#[command(about = "MWEB light wallet harness for mwebd", long_about = None)]
struct Cli {
    /// Chain the wallet and daemon use
    #[arg(short, long, global = true, default_value = "mainnet")]
    chain: Chain,

    /// BIP-39 phrase
    #[arg(long, global = true, env = "MWEB_MNEMONIC", hide_env_values = true)]
    mnemonic: Option<String>,

    /// BIP-39 passphrase
    #[arg(long, global = true, env = "MWEB_PASSPHRASE", default_value = "", hide_env_values = true)]
    passphrase: String,

    /// Account index
    #[arg(long, global = true, default_value = "0")]
    account: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new phrase
    Mnemonic {
        /// 12, 18 or 24
        #[arg(short, long, default_value = "24")]
        words: u32,
    },

    /// Show daemon sync status
    Status {
        /// mwebd RPC port
        #[arg(short, long, default_value_t = DEFAULT_RPC_PORT)]
        port: u16,
    },

    /// List receive addresses
    Addresses {
        /// mwebd RPC port
        #[arg(short, long, default_value_t = DEFAULT_RPC_PORT)]
        port: u16,

        /// First index
        #[arg(long, default_value = "0")]
        from: u32,

        /// One past the last index
        #[arg(long, default_value = "10")]
        to: u32,
    },

    /// Stream the wallet's outputs and print them
    Utxos {
        /// mwebd RPC port
        #[arg(short, long, default_value_t = DEFAULT_RPC_PORT)]
        port: u16,

        /// Scan start height (defaults to MWEB activation)
        #[arg(long)]
        from_height: Option<u32>,
    },

    /// Check which output ids are spent
    Spent {
        /// mwebd RPC port
        #[arg(short, long, default_value_t = DEFAULT_RPC_PORT)]
        port: u16,

        /// Output ids
        #[arg(required = true)]
        output_ids: Vec<String>,
    },

    /// Broadcast a raw transaction
    Broadcast {
        /// mwebd RPC port
        #[arg(short, long, default_value_t = DEFAULT_RPC_PORT)]
        port: u16,

        /// Transaction hex
        tx_hex: String,
    },

    /// Launch mwebd, wait for sync, scan and report the balance
    Run {
        /// Daemon data directory
        #[arg(short, long, default_value = "mwebd-data")]
        data_dir: PathBuf,

        /// Peer to sync from (defaults to the chain's peer)
        #[arg(long)]
        peer: Option<String>,

        /// SOCKS proxy
        #[arg(long)]
        proxy: Option<String>,

        /// mwebd binary
        #[arg(long, default_value = "mwebd")]
        binary: PathBuf,

        /// Give up waiting for sync after N seconds
        #[arg(long, default_value = "3600")]
        sync_timeout: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Mnemonic { words } => {
            println!("{}", generate_mnemonic(Some(*words))?);
        }
        Commands::Status { port } => {
            let status = MwebdClient::loopback(*port).status().await?;
            print_status(&status);
        }
        Commands::Addresses { port, from, to } => {
            let session = attach(&cli, *port).await?;
            let batch = session.addresses(*from, *to).await?;
            for (index, address) in batch.iter() {
                println!("{:>4}  {}", index, address);
            }
        }
        Commands::Utxos { port, from_height } => {
            let session = attach(&cli, *port).await?;
            let from_height = from_height.unwrap_or_else(|| session.default_scan_height());
            scan(&session, from_height).await?;
        }
        Commands::Spent { port, output_ids } => {
            let spent = MwebdClient::loopback(*port).spent(output_ids).await?;
            for id in output_ids {
                let label = if spent.contains(id) { "spent" } else { "unspent" };
                println!("{}  {}", truncate_output_id(id), label);
            }
        }
        Commands::Broadcast { port, tx_hex } => {
            let raw_tx = hex::decode(tx_hex.trim()).context("transaction is not valid hex")?;
            let txid = MwebdClient::loopback(*port).broadcast(&raw_tx).await?;
            println!("{}", txid);
        }
        Commands::Run {
            data_dir,
            peer,
            proxy,
            binary,
            sync_timeout,
        } => {
            let mut config = DaemonConfig::for_chain(cli.chain, data_dir.clone());
            config.binary_path = binary.clone();
            config.proxy_addr = proxy.clone();
            if let Some(peer) = peer {
                config.peer_addr = peer.clone();
            }
            let config = config.with_env_overrides()?;
            run(&cli, config, Duration::from_secs(*sync_timeout)).await?;
        }
    }

    Ok(())
}

fn session(cli: &Cli) -> anyhow::Result<WalletSession> {
    let Some(phrase) = cli.mnemonic.as_deref() else {
        bail!("no mnemonic; pass --mnemonic or set MWEB_MNEMONIC");
    };
    Ok(WalletSession::from_mnemonic(
        phrase,
        &cli.passphrase,
        cli.account,
        cli.chain,
    )?)
}

async fn attach(cli: &Cli, port: u16) -> anyhow::Result<WalletSession> {
    let session = session(cli)?;
    session.attach(port).await;
    Ok(session)
}

async fn run(cli: &Cli, config: DaemonConfig, sync_timeout: Duration) -> anyhow::Result<()> {
    let session = session(cli)?;
    let port = session.start_daemon(config).await?;
    info!("mwebd listening on 127.0.0.1:{}", port);

    let cancel = CancelToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted");
                cancel.cancel();
            }
        })
    };

    let result = async {
        wait_for_sync(&session, sync_timeout, &cancel).await?;
        tokio::select! {
            scanned = scan(&session, session.default_scan_height()) => scanned?,
            _ = cancel.cancelled() => bail!("interrupted during scan"),
        }
        let spent = session.check_spent().await?;
        if !spent.is_empty() {
            warn!("{} scanned outputs are already spent", spent.len());
        }
        anyhow::Ok(())
    }
    .await;

    ctrl_c.abort();
    session.stop_daemon().await?;
    result
}

async fn wait_for_sync(
    session: &WalletSession,
    timeout: Duration,
    cancel: &CancelToken,
) -> anyhow::Result<()> {
    let pb = ProgressBar::new(1000);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {percent}% {msg}")?
            .progress_chars("=>-"),
    );

    let progress = {
        let pb = pb.clone();
        let session_port = session.port();
        tokio::spawn(async move {
            let Some(port) = session_port else { return };
            let client = MwebdClient::loopback(port);
            loop {
                if let Ok(status) = client.status().await {
                    pb.set_position((status.sync_progress() * 1000.0) as u64);
                    pb.set_message(format!(
                        "{} blocks remaining",
                        status.blocks_remaining()
                    ));
                }
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        })
    };

    let synced = session
        .wait_for_sync(Duration::from_secs(1), timeout, cancel)
        .await;
    progress.abort();

    match synced {
        Ok(status) => {
            pb.finish_with_message("synced");
            print_status(&status);
            Ok(())
        }
        Err(e) => {
            pb.abandon_with_message("not synced");
            Err(e.into())
        }
    }
}

async fn scan(session: &WalletSession, from_height: u32) -> anyhow::Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(120));

    let mut events = session.subscribe()?;
    session.start_utxo_stream(from_height).await?;

    let ticker = {
        let spinner = spinner.clone();
        tokio::spawn(async move {
            let mut found = 0usize;
            while let Ok(event) = events.recv().await {
                if let UtxoStreamEvent::UtxoAdded(_) = event {
                    found += 1;
                    spinner.set_message(format!("{} outputs found", found));
                }
            }
        })
    };

    let outcome = session.wait_utxo_stream().await;
    ticker.abort();
    spinner.finish_and_clear();

    match outcome? {
        StreamOutcome::NoOutputsFound => println!("No outputs found from height {}", from_height),
        StreamOutcome::Cancelled { received } => println!("Scan cancelled after {} messages", received),
        StreamOutcome::Completed { .. } => {
            for utxo in session.utxos().iter() {
                println!(
                    "{}  {:>20}  {:<9}  {}",
                    truncate_output_id(&utxo.output_id),
                    format_ltc(utxo.value),
                    confirmation_label(utxo),
                    format_block_time(utxo.block_time).unwrap_or_else(|| "-".to_string()),
                );
            }
        }
    }

    let balance = session.balance();
    println!("Confirmed:   {}", format_ltc(balance.confirmed));
    println!("Unconfirmed: {}", format_ltc(balance.unconfirmed));
    println!("Total:       {}", format_ltc(balance.total));
    Ok(())
}

fn print_status(status: &StatusSnapshot) {
    println!("Block headers: {}", status.block_header_height);
    println!("MWEB headers:  {}", status.mweb_header_height);
    println!("MWEB UTXOs:    {}", status.mweb_utxos_height);
    if let Some(time) = format_block_time(status.block_time) {
        println!("Block time:    {}", time);
    }
    println!(
        "Synced:        {} ({:.1}%)",
        status.is_synced(),
        status.sync_progress() * 100.0
    );
}
