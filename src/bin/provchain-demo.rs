#![forbid(unsafe_code)]
//! End-to-end walkthrough: record three products, verify the chain, then
//! check scanned codes against it.

use clap::Parser;
use colored::*;
use provchain::blockchain::{Block, Ledger};
use provchain::cli::init_tracing;
use provchain::collaborators::{authenticate_and_present, Authenticity, PlainTextDecoder, Presenter};
use provchain::config::{load_config_from, DEFAULT_CONFIG_FILE};
use provchain::crypto::{hash_to_hex, short_hex};
use provchain::error::ChainError;
use provchain::record::ProductRecord;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about = "Record products on a fresh ledger and check scanned codes", long_about = None)]
struct Args {
    /// Directory of decoded code files (one code per file)
    codes: Option<PathBuf>,

    /// Path to the configuration file (defaults to ./provchain.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Prints authenticity results to the terminal.
struct ConsolePresenter;

impl Presenter for ConsolePresenter {
    fn present(&mut self, decoded: &str, block: Option<&Block>) -> Result<(), ChainError> {
        match block {
            Some(block) => {
                println!("{} {}", "✅ Genuine:".green().bold(), decoded);
                println!("   block:   {}", short_hex(block.content_hash(), 16).bright_cyan());
                match block.payload_str().map(str::parse::<ProductRecord>) {
                    Some(Ok(record)) => {
                        println!("   company: {}", record.company);
                        println!("   style:   {} ({}, size {})", record.style, record.color, record.size);
                        println!("   made:    {} in {}", record.date, record.country);
                        println!("   item:    #{}", record.item_number);
                    }
                    _ => println!("   payload: {} bytes", block.payload().len()),
                }
            }
            None => println!("{} {}", "❌ Not on the ledger:".red().bold(), decoded),
        }
        Ok(())
    }
}

fn products() -> Result<Vec<ProductRecord>, ChainError> {
    Ok(vec![
        "Nike, Free Runners, 12, Black/Red, 09/16/2009, Antarctica, 1".parse()?,
        "Puma, Mesh runners, 12.5, White/Gray, 06/08/2020, Switzerland, 2".parse()?,
        "Converse, Low top skater shoes, 10, Black/Black, 04/25/2012, England, 3".parse()?,
    ])
}

/// Each file in `dir` is one scanned code; with no directory the codes are the
/// recorded block hashes plus one counterfeit.
fn scanned_codes(args: &Args, ledger: &Ledger) -> Result<Vec<(String, Vec<u8>)>, ChainError> {
    let Some(dir) = &args.codes else {
        let mut codes: Vec<(String, Vec<u8>)> = ledger
            .iter()
            .skip(1)
            .enumerate()
            .map(|(i, block)| (format!("label-{}", i + 1), hash_to_hex(block.content_hash()).into_bytes()))
            .collect();
        codes.push(("counterfeit".to_string(), b"Nike,Free Runners,12,Black/Red,09/16/2009,Antarctica,99".to_vec()));
        return Ok(codes);
    };

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            entries.push(path);
        }
    }
    entries.sort();

    entries
        .into_iter()
        .map(|path| -> Result<(String, Vec<u8>), ChainError> {
            let bytes = fs::read(&path)?;
            Ok((path.display().to_string(), bytes))
        })
        .collect()
}

fn run(args: Args) -> Result<(), ChainError> {
    let config = load_config_from(args.config.as_deref().unwrap_or(Path::new(DEFAULT_CONFIG_FILE)))?;
    init_tracing(&config);

    let mut ledger = Ledger::with_limit(config.ledger.max_payload_bytes);
    println!("{}", "📦 Recording products".bright_cyan().bold());
    for record in products()? {
        let block = ledger.append(record.to_payload())?;
        println!("   {} {}", short_hex(block.content_hash(), 16).bright_cyan(), record);
    }

    ledger.verify()?;
    info!(blocks = ledger.len(), "Ledger verified");
    println!("{} {}", "🔒 Verified:".green().bold(), ledger.summary());
    println!();

    println!("{}", "🔎 Checking scanned codes".bright_cyan().bold());
    let mut presenter = ConsolePresenter;
    let mut genuine = 0;
    let codes = scanned_codes(&args, &ledger)?;
    for (source, image) in &codes {
        println!("{} {}", "→".dimmed(), source.dimmed());
        match authenticate_and_present(&ledger, &PlainTextDecoder, &mut presenter, image) {
            Ok(Authenticity::Unreadable) => println!("{}", "   ⚠️  No code found".yellow()),
            Ok(verdict) if verdict.is_genuine() => genuine += 1,
            Ok(_) => {}
            Err(ChainError::DecodeError(msg)) => {
                warn!(source = %source, "Could not decode code: {}", msg);
                println!("   {} {}", "⚠️  Unreadable:".yellow(), msg);
            }
            Err(e) => return Err(e),
        }
    }

    println!();
    println!("{} {}/{} genuine", "📊".bright_white(), genuine, codes.len());
    Ok(())
}

fn main() {
    if let Err(e) = run(Args::parse()) {
        eprintln!("{} {}", "❌".red(), e.to_string().red());
        std::process::exit(1);
    }
}
