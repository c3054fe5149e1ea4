use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ledger_core::{
    constants::{DEFAULT_DIFFICULTY, DEFAULT_REWARD},
    signing::derive_public_key,
    Chain, ChainConfig, MiningBudget, PrivateKey, Transaction,
};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "Mine, inspect and audit a local proof-of-work ledger snapshot")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new private key
    Keygen,
    /// Build a small two-block chain and audit it
    Demo {
        /// Where to write the resulting chain snapshot
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, default_value_t = 1)]
        difficulty: u32,
        #[arg(long, default_value_t = DEFAULT_REWARD)]
        reward: i64,
    },
    /// Queue a signed transfer in a snapshot's pending pool
    Transfer {
        /// Chain snapshot (JSON)
        #[arg(long)]
        chain: PathBuf,
        /// Sender private key (hex)
        #[arg(long)]
        key: String,
        /// Recipient public key (hex)
        #[arg(long)]
        to: String,
        #[arg(long, allow_negative_numbers = true)]
        amount: i64,
    },
    /// Mine pending transactions into a new block, creating the snapshot if needed
    Mine {
        /// Chain snapshot (JSON)
        #[arg(long)]
        chain: PathBuf,
        /// Miner private key (hex)
        #[arg(long)]
        key: String,
        /// Difficulty for a newly created chain
        #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
        difficulty: u32,
        /// Reward for a newly created chain
        #[arg(long, default_value_t = DEFAULT_REWARD)]
        reward: i64,
        /// Give up after this many nonces
        #[arg(long)]
        max_attempts: Option<u64>,
    },
    /// Audit a snapshot; exits non-zero if it is invalid
    Audit {
        /// Chain snapshot (JSON)
        #[arg(long)]
        chain: PathBuf,
    },
}

#[derive(Serialize)]
struct KeyPair {
    private_key: String,
    public_key: String,
}

#[derive(Serialize)]
struct Report {
    height: usize,
    difficulty: u32,
    reward: i64,
    pending: usize,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    violation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    balances: Option<std::collections::BTreeMap<String, i64>>,
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Keygen => {
            let key = PrivateKey::generate();
            print_json(&KeyPair {
                public_key: derive_public_key(&key),
                private_key: key.to_hex(),
            })?;
        }
        Command::Demo {
            out,
            difficulty,
            reward,
        } => {
            let chain = demo(ChainConfig { difficulty, reward })?;
            if let Some(path) = out {
                save(&path, &chain)?;
            }
            let report = report(&chain);
            print_json(&report)?;
        }
        Command::Transfer {
            chain: path,
            key,
            to,
            amount,
        } => {
            let mut chain = load(&path)?;
            let key = parse_key(&key)?;
            chain.submit_transaction(Transaction::transfer(&key, &to, amount));
            save(&path, &chain)?;
            info!(pending = chain.pending().len(), "transfer queued");
        }
        Command::Mine {
            chain: path,
            key,
            difficulty,
            reward,
            max_attempts,
        } => {
            let mut chain = if path.exists() {
                load(&path)?
            } else {
                Chain::new(ChainConfig { difficulty, reward })?
            };
            let key = parse_key(&key)?;
            let budget = match max_attempts {
                Some(n) => MiningBudget::with_max_attempts(n),
                None => MiningBudget::unbounded(),
            };
            let block = chain.mine_with(&key, &budget)?.clone();
            save(&path, &chain)?;
            print_json(&block)?;
        }
        Command::Audit { chain: path } => {
            let chain = load(&path)?;
            let report = report(&chain);
            print_json(&report)?;
            if !report.valid {
                bail!("chain in {} is invalid", path.display());
            }
        }
    }
    Ok(())
}

/// Key A mines, pays B 30, then B mines.
fn demo(config: ChainConfig) -> Result<Chain> {
    let mut chain = Chain::new(config)?;
    let a = PrivateKey::generate();
    let b = PrivateKey::generate();
    chain.mine(&a)?;
    chain.submit_transaction(Transaction::transfer(&a, &derive_public_key(&b), 30));
    chain.mine(&b)?;
    Ok(chain)
}

fn report(chain: &Chain) -> Report {
    let verdict = chain.audit();
    Report {
        height: chain.height(),
        difficulty: chain.difficulty(),
        reward: chain.reward(),
        pending: chain.pending().len(),
        valid: verdict.is_ok(),
        violation: verdict.err().map(|v| v.to_string()),
        balances: chain.balances().ok(),
    }
}

fn parse_key(hex: &str) -> Result<PrivateKey> {
    hex.parse().context("parsing private key")
}

fn load(path: &Path) -> Result<Chain> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("decoding {}", path.display()))
}

fn save(path: &Path, chain: &Chain) -> Result<()> {
    let json = serde_json::to_vec_pretty(chain)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
