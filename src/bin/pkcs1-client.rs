//! PKCS#1 v1.5 test client: generate conforming and deliberately damaged
//! padded messages for a key width, to exercise a padding oracle's
//! responses independently of the attack engine.

use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser};
use num_bigint::{BigInt, Sign};

use bleach::keys::{self, PublicKey};
use bleach::utils::{bytes_to_hold, pow2_round};
use bleach::Pkcs1v15;

#[derive(Parser)]
#[command(
    name = "pkcs1-client",
    about = "Generate PKCS#1 v1.5 padded messages for various padding conditions",
    group(ArgGroup::new("width").required(true).args(["length", "pubkey"]))
)]
struct Args {
    /// Length of the RSA modulus in bits
    #[arg(short, long)]
    length: Option<i64>,

    /// PEM file containing the public key
    #[arg(short = 'f', long)]
    pubkey: Option<PathBuf>,

    /// Treat the cleartext as a hex encoded string
    #[arg(short = 'x', long)]
    hex: bool,

    /// RSA-encrypt each message under the public key (needs --pubkey)
    #[arg(short, long, requires = "pubkey")]
    encrypt: bool,

    /// Generate a conforming padded message
    #[arg(short = '1', long = "cm", action = clap::ArgAction::SetTrue)]
    conforming: bool,

    /// Conforming message with multiple consecutive null bytes
    #[arg(short = '2', long = "cnb", action = clap::ArgAction::SetTrue)]
    consecutive_nulls: bool,

    /// Non-conforming header: message starts 0x0001 instead of 0x0002
    #[arg(short = '3', long = "nch", action = clap::ArgAction::SetTrue)]
    bad_header: bool,

    /// Null byte within the 8 mandatory padding bytes
    #[arg(short = '4', long = "ncl", action = clap::ArgAction::SetTrue)]
    short_padding: bool,

    /// No null-byte delimiter at all
    #[arg(short = '5', long = "ncd", action = clap::ArgAction::SetTrue)]
    no_delimiter: bool,

    /// Generate all test cases
    #[arg(short, long)]
    all: bool,

    /// Cleartext to pad. Read line-wise from stdin if omitted
    cleartext: Option<String>,
}

impl Args {
    fn selectors(&self) -> Vec<u8> {
        if self.all {
            return vec![1, 2, 3, 4, 5];
        }
        let chosen: Vec<u8> = [
            self.conforming,
            self.consecutive_nulls,
            self.bad_header,
            self.short_padding,
            self.no_delimiter,
        ]
        .iter()
        .enumerate()
        .filter(|(_, &picked)| picked)
        .map(|(index, _)| index as u8 + 1)
        .collect();
        match chosen.is_empty() {
            true => vec![1],
            false => chosen,
        }
    }
}

fn encrypt(key: &PublicKey, message: &[u8], k: usize) -> String {
    let m = BigInt::from_bytes_be(Sign::Plus, message);
    let c = m.modpow(&key.e, &key.n);
    format!("{:0>width$}", c.to_str_radix(16), width = 2 * k)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let key = match &args.pubkey {
        Some(path) => Some(keys::public_from_pem_file(path)?),
        None => None,
    };
    let k_bits = match (&key, args.length) {
        (Some(key), _) => pow2_round((bytes_to_hold(&key.n) * 8) as i64),
        (None, Some(length)) => pow2_round(length),
        (None, None) => unreachable!("clap enforces the width group"),
    }
    .context("key width must be a positive number of bits")?;
    let k = (k_bits / 8) as usize;
    let pkcs1 = Pkcs1v15::new(k);

    let cleartexts: Vec<String> = match &args.cleartext {
        Some(cleartext) => vec![cleartext.clone()],
        None => io::stdin().lock().lines().collect::<Result<_, _>>()?,
    };
    if cleartexts.is_empty() {
        bail!("no cleartext provided");
    }

    for cleartext in &cleartexts {
        let payload = match args.hex {
            true => hex::decode(cleartext.trim())
                .with_context(|| format!("cleartext is not hex: {}", cleartext))?,
            false => cleartext.clone().into_bytes(),
        };
        for selector in args.selectors() {
            let message = pkcs1.variant(selector, &payload)?;
            match (&key, args.encrypt) {
                (Some(key), true) => println!("{}", encrypt(key, &message, k)),
                _ => println!("{}", hex::encode(&message)),
            }
        }
    }
    Ok(())
}
