//! Manual probe for HTTP padding oracles: replay a ciphertext against a
//! URL template a few times and print status code and latency per
//! response, to find out whether the server leaks a usable signal.

use std::io::{self, BufRead};

use anyhow::Result;
use clap::Parser;

use bleach::oracle::{HttpOracle, HttpResponse, PaddingOracle};
use bleach::utils::to_int_error;

#[derive(Parser)]
#[command(
    name = "http-probe",
    about = "Record HTTP responses to padding faults"
)]
struct Args {
    /// URL to test; "{}" is replaced by the hex ciphertext
    #[arg(short, long)]
    url: String,

    /// Ignore the http(s)_proxy environment variables
    #[arg(short = 'n', long)]
    noproxy: bool,

    /// Queries per ciphertext; repetition smooths the timing signal
    #[arg(short, long, default_value_t = 5)]
    iterations: u32,

    /// Request headers as comma-separated key=value pairs; values may
    /// contain "{}"
    #[arg(short = 'x', long, default_value = "")]
    headers: String,

    /// POST form fields as comma-separated key=value pairs; values may
    /// contain "{}". GET is used when empty
    #[arg(short, long, default_value = "")]
    post: String,

    /// The ciphertext to probe with. Read line-wise from stdin if omitted
    ciphertext: Option<String>,
}

/// Splits a free-form "a=1,b=2,c" string into pairs; a valueless key maps
/// to the empty string.
fn kv_pairs(free_form: &str) -> Vec<(String, String)> {
    free_form
        .split(',')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

fn main() -> Result<()> {
    let args = Args::parse();

    let oracle = HttpOracle::new(
        &args.url,
        kv_pairs(&args.headers),
        kv_pairs(&args.post),
        0,
        !args.noproxy,
        Box::new(|response: &HttpResponse| {
            println!(
                "\tCode: {:8}\tDuration: {:.6}s",
                response.status,
                response.duration.as_secs_f64()
            );
            false
        }),
    )?;

    let ciphertexts: Vec<String> = match args.ciphertext {
        Some(ciphertext) => vec![ciphertext],
        None => io::stdin().lock().lines().collect::<Result<_, _>>()?,
    };

    for ciphertext in &ciphertexts {
        println!("{}", ciphertext);
        let c = to_int_error(ciphertext, "Ciphertext")?;
        for _ in 0..args.iterations {
            oracle.query(&c)?;
        }
    }
    Ok(())
}
