use clap::{Parser, Subcommand};
use sealed_chain::chain::{Block, Chain, ProofOfWork, TracingObserver};
use sealed_chain::config::Config;
use sealed_chain::error::{Error, Result};
use sealed_chain::logger::{init_logging, LogFormat};
use sealed_chain::storage::FileStorage;
use sealed_chain::tx::{decode_payload, encode_payload, genesis_payload, Transaction};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "sealed-chain")]
#[command(about = "Sealed Chain CLI - Append-only proof-of-work block store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: "human" or "json"
    #[arg(short, long, default_value = "human")]
    pub format: String,

    /// Data directory path
    #[arg(short, long)]
    pub data_dir: Option<String>,

    /// Proof-of-work difficulty in leading zero bits
    #[arg(long)]
    pub difficulty: Option<u32>,

    /// Give up on a nonce search after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Log level or filter directive
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the genesis block, or report the existing tip
    Init {
        /// Genesis coinbase receiver
        #[arg(long, default_value = "Genesis receiver")]
        receiver: String,

        /// Genesis coinbase data
        #[arg(long, default_value = "Genesis data")]
        data: String,
    },

    /// Seal and append a block carrying a coinbase transaction
    Add {
        /// Coinbase receiver
        #[arg(long)]
        to: String,

        /// Coinbase data
        #[arg(long, default_value = "")]
        data: String,
    },

    /// Print every block from tip to genesis
    Print,

    /// Show a single block
    Show {
        /// Block digest (hex)
        digest: String,
    },

    /// Show the tip block
    Tip,

    /// Re-verify linkage, seals and difficulty of the whole chain
    Verify,
}

/// Format output based on format type
fn format_output<T: serde::Serialize + std::fmt::Debug>(data: &T, format: &str) -> Result<String> {
    match format {
        "json" => serde_json::to_string_pretty(data)
            .map_err(|e| Error::Serialization(format!("Failed to serialize JSON: {}", e))),
        _ => Ok(format!("{:#?}", data)),
    }
}

fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(dir) = &cli.data_dir {
        config.set_data_dir(PathBuf::from(dir));
    }
    config.set_output_format(cli.format.clone());
    if let Some(level) = &cli.log_level {
        config.set_log_level(level.clone());
    }
    if let Some(difficulty) = cli.difficulty {
        config.set_difficulty(difficulty);
    }
    if let Some(secs) = cli.timeout_secs {
        config.set_mining_timeout(Some(Duration::from_secs(secs)));
    }
    Ok(config)
}

fn open_chain(config: &Config) -> Result<Chain<FileStorage, TracingObserver>> {
    let pow = ProofOfWork::new(config.difficulty)?;
    let chain = Chain::with_observer(FileStorage::new(config), pow, TracingObserver);
    Ok(match config.mining_timeout {
        Some(timeout) => chain.with_mining_timeout(timeout),
        None => chain,
    })
}

fn print_block(block: &Block, format: &str) -> Result<()> {
    match format {
        "json" => println!("{}", format_output(&BlockOutput::from_block(block), format)?),
        _ => {
            println!("{}", block);
            if let Ok(txs) = decode_payload(block.payload()) {
                for tx in txs {
                    println!("\t Tx:\t{}", hex::encode(&tx.id));
                }
            }
        }
    }
    Ok(())
}

pub fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;
    init_logging(config.get_log_level(), LogFormat::from_str_lossy(config.get_output_format()));

    let format = config.get_output_format().to_string();
    let mut chain = open_chain(&config)?;

    match cli.command {
        Commands::Init { receiver, data } => {
            let tip = chain.init(|| genesis_payload(&receiver, &data))?;
            let output = InitOutput {
                data_dir: config.get_data_dir().display().to_string(),
                tip: hex::encode(tip),
                difficulty: chain.pow().difficulty(),
            };
            println!("{}", render_init(&output, &format)?);
            Ok(())
        }

        Commands::Add { to, data } => {
            let coinbase = Transaction::coinbase(&to, &data)?;
            let block = chain.append(encode_payload(&[coinbase])?)?;
            println!("✓ Block appended");
            print_block(&block, &format)
        }

        Commands::Print => {
            if format == "json" {
                let mut blocks = Vec::new();
                chain.traverse(|block| blocks.push(BlockOutput::from_block(block)), || {}, || {})?;
                println!("{}", format_output(&blocks, &format)?);
                return Ok(());
            }

            let mut failed = None;
            let visited = chain.traverse(
                |block| {
                    if let Err(e) = print_block(block, &format) {
                        failed.get_or_insert(e);
                    }
                    println!();
                },
                || println!("=== Chain (newest first) ==="),
                || println!("=== End of chain ==="),
            )?;
            if let Some(e) = failed {
                return Err(e);
            }
            println!("{} block(s)", visited);
            Ok(())
        }

        Commands::Show { digest } => {
            let digest = hex::decode(&digest)
                .map_err(|e| Error::NotFound(format!("{} (invalid hex: {})", digest, e)))?;
            let block = chain.get_block(&digest)?;
            print_block(&block, &format)
        }

        Commands::Tip => {
            let block = chain.tip_block()?;
            print_block(&block, &format)
        }

        Commands::Verify => {
            let length = chain.verify()?;
            let output = VerifyOutput {
                length,
                difficulty: chain.pow().difficulty(),
                valid: true,
            };
            println!("{}", format_output(&output, &format)?);
            Ok(())
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct TransactionOutput {
    id: String,
    receivers: Vec<String>,
    value: u64,
    coinbase: bool,
}

impl TransactionOutput {
    fn from_tx(tx: &Transaction) -> Self {
        TransactionOutput {
            id: hex::encode(&tx.id),
            receivers: tx
                .vout
                .iter()
                .map(|out| String::from_utf8_lossy(&out.pub_key_hash).into_owned())
                .collect(),
            value: tx.vout.iter().map(|out| out.value).sum(),
            coinbase: tx.is_coinbase(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct BlockOutput {
    digest: String,
    link: String,
    nonce: u64,
    genesis: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    transactions: Option<Vec<TransactionOutput>>,
}

impl BlockOutput {
    fn from_block(block: &Block) -> Self {
        BlockOutput {
            digest: block.digest_hex(),
            link: block.link_hex(),
            nonce: block.nonce(),
            genesis: block.is_genesis(),
            transactions: decode_payload(block.payload())
                .ok()
                .map(|txs| txs.iter().map(TransactionOutput::from_tx).collect()),
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct VerifyOutput {
    length: usize,
    difficulty: u32,
    valid: bool,
}

#[derive(Debug, serde::Serialize)]
struct InitOutput {
    data_dir: String,
    tip: String,
    difficulty: u32,
}

fn render_init(output: &InitOutput, format: &str) -> Result<String> {
    match format {
        "json" => format_output(output, format),
        _ => Ok(format!(
            "✓ Chain initialized at {}\n  Tip: {}\n  Difficulty: {}",
            output.data_dir, output.tip, output.difficulty
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_output() -> InitOutput {
        InitOutput {
            data_dir: "/tmp/chain".to_string(),
            tip: "00ab".to_string(),
            difficulty: 8,
        }
    }

    #[test]
    fn test_init_output_json() {
        let rendered = render_init(&init_output(), "json").unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["data_dir"], "/tmp/chain");
        assert_eq!(value["tip"], "00ab");
        assert_eq!(value["difficulty"], 8);
    }

    #[test]
    fn test_init_output_human() {
        let rendered = render_init(&init_output(), "human").unwrap();
        assert!(rendered.starts_with("✓ Chain initialized at /tmp/chain"));
        assert!(rendered.contains("Tip: 00ab"));
        assert!(rendered.lines().all(|line| line.len() < 100));
    }
}
