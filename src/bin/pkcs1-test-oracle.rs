//! Toy decrypting padding oracle for development and testing: decrypts a
//! ciphertext with a private key and reports the padding condition
//! through its exit code, so the exec oracle has something honest to
//! interrogate.
//!
//! Exit codes: 0 = conforming, 2 = header is not 0x0002, 3 = null byte
//! inside the eight mandatory padding bytes, 4 = no null delimiter.

use std::path::PathBuf;
use std::process::exit;

use anyhow::{bail, Result};
use clap::Parser;

use bleach::keys;
use bleach::pkcs1::MIN_PAD_LEN;
use bleach::utils::{bytes_to_hold, pow2_round, to_int_error};

#[derive(Parser)]
#[command(
    name = "pkcs1-test-oracle",
    about = "Decrypt a ciphertext and report its PKCS#1 v1.5 padding condition via exit code"
)]
struct Args {
    /// PEM file containing the private key
    privkey: PathBuf,

    /// Ciphertext to decrypt, decimal or hex
    ciphertext: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let key = keys::private_from_pem_file(&args.privkey)?;
    let k = (pow2_round((bytes_to_hold(&key.n) * 8) as i64)? / 8) as usize;
    if k < MIN_PAD_LEN + 3 {
        bail!("key width of {} bytes is too small for PKCS#1 v1.5", k);
    }

    let c = to_int_error(&args.ciphertext, "Ciphertext")?;
    let m = c.modpow(&key.d, &key.n);
    let (_, bytes) = m.to_bytes_be();
    if bytes.len() < k {
        eprintln!("Message too short. Prepending {} null bytes", k - bytes.len());
    }
    let mut padded = vec![0_u8; k.saturating_sub(bytes.len())];
    padded.extend_from_slice(&bytes);

    let header = &padded[..2];
    let mandatory_padding = &padded[2..2 + MIN_PAD_LEN];
    let with_padding = &padded[2..];

    if header != [0x00, 0x02] {
        eprintln!("Error: m does not start with 0x0002: {}", hex::encode(header));
        exit(2);
    }
    if mandatory_padding.contains(&0x00) {
        eprintln!(
            "Error: m contains 0x00 within the mandatory {} padding bytes: {}",
            MIN_PAD_LEN,
            hex::encode(mandatory_padding)
        );
        exit(3);
    }
    match with_padding.iter().position(|&byte| byte == 0x00) {
        Some(delimiter) => {
            println!("{}", hex::encode(&with_padding[delimiter + 1..]));
            Ok(())
        }
        None => {
            eprintln!("Error: m does not contain a 0x00 padding delimiter");
            exit(4);
        }
    }
}
