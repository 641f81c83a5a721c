//! Bleichenbacher's 1998 adaptive chosen-ciphertext attack against RSA
//! PKCS#1 v1.5 encryption, driven through a pluggable padding oracle.
//!
//! The attack engine lives in [`engine`]; [`oracle`] supplies the oracle
//! contract and the exec/HTTP transports; [`pkcs1`] builds the conforming
//! and deliberately damaged messages used to probe oracles. The binaries
//! under `src/bin/` wire these together into the command-line tools.

pub mod engine;
pub mod interval;
pub mod keys;
pub mod oracle;
pub mod pkcs1;
pub mod pool;
pub mod utils;

pub use engine::{Bleichenbacher, EngineError, SearchOutcome, DEFAULT_EXPONENT};
pub use interval::{Interval, IntervalSet};
pub use oracle::{ExecOracle, ExecResponse, HttpOracle, HttpResponse, PaddingOracle};
pub use pkcs1::Pkcs1v15;
