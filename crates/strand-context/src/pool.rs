//! Pool of carrier threads
//!
//! Each carrier thread owns one [`Carrier`]. Work arrives through a bounded
//! lock-free queue per carrier, filled round-robin by [`CarrierPool::submit`].
//! A submitted closure becomes a local task on the carrier that picks it up
//! and never migrates afterwards.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, Thread};

use crossbeam_queue::ArrayQueue;
use strand_core::{kdebug, kerror, kinfo, StrandError, StrandResult};

use crate::carrier::{Carrier, RunStats};
use crate::config::CarrierConfig;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    queues: Vec<ArrayQueue<Job>>,
    shutdown: AtomicBool,
    /// Submitters between their shutdown check and their push
    submitting: AtomicUsize,
}

/// Carrier threads fed through per-carrier submission queues
pub struct CarrierPool {
    shared: Arc<Shared>,
    threads: Vec<Thread>,
    handles: Vec<JoinHandle<StrandResult<RunStats>>>,
    next: AtomicUsize,
}

impl CarrierPool {
    /// Start `config.num_carriers` carrier threads
    pub fn start(config: CarrierConfig) -> StrandResult<CarrierPool> {
        config.validate()?;
        let n = config.num_carriers;
        let shared = Arc::new(Shared {
            queues: (0..n).map(|_| ArrayQueue::new(config.injector_capacity)).collect(),
            shutdown: AtomicBool::new(false),
            submitting: AtomicUsize::new(0),
        });

        let mut pool = CarrierPool {
            shared: shared.clone(),
            threads: Vec::with_capacity(n),
            handles: Vec::with_capacity(n),
            next: AtomicUsize::new(0),
        };

        for index in 0..n {
            let shared = shared.clone();
            let config = config.clone();
            let handle = thread::Builder::new()
                .name(format!("strand-carrier-{}", index))
                .spawn(move || carrier_main(index, &shared, config))
                .map_err(|e| StrandError::Thread(e.to_string()))?;
            pool.threads.push(handle.thread().clone());
            pool.handles.push(handle);
        }

        kinfo!("carrier pool started with {} carriers", n);
        Ok(pool)
    }

    pub fn num_carriers(&self) -> usize {
        self.threads.len()
    }

    /// Hand a closure to the next carrier in round-robin order
    pub fn submit<F>(&self, f: F) -> StrandResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        // a carrier does not exit while a submitter is in flight
        self.shared.submitting.fetch_add(1, Ordering::SeqCst);
        let result = self.push(Box::new(f));
        self.shared.submitting.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn push(&self, job: Job) -> StrandResult<()> {
        if self.shared.shutdown.load(Ordering::SeqCst) {
            return Err(StrandError::ShutDown);
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.threads.len();
        self.shared.queues[index]
            .push(job)
            .map_err(|_| StrandError::QueueFull)?;
        self.threads[index].unpark();
        Ok(())
    }

    /// Stop accepting work; carriers exit once their queues and tasks drain
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        for t in &self.threads {
            t.unpark();
        }
    }

    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }

    /// Shut down and wait for every carrier, summing their counters
    pub fn join(mut self) -> StrandResult<RunStats> {
        self.shutdown();
        let mut total = RunStats::default();
        let mut first_err = None;
        for handle in self.handles.drain(..) {
            let result = handle
                .join()
                .map_err(|_| StrandError::Thread("carrier thread panicked".to_string()))
                .and_then(|r| r);
            match result {
                Ok(stats) => total += stats,
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(total),
        }
    }
}

impl Drop for CarrierPool {
    fn drop(&mut self) {
        self.shutdown();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn carrier_main(index: usize, shared: &Shared, config: CarrierConfig) -> StrandResult<RunStats> {
    let park_timeout = config.park_timeout;
    let mut carrier = Carrier::new(config)?;
    let queue = &shared.queues[index];
    let mut total = RunStats::default();

    loop {
        while carrier.has_capacity() {
            let Some(job) = queue.pop() else {
                break;
            };
            // a job whose task cannot be spawned is dropped; the carrier keeps going
            if let Err(e) = carrier.spawn(job) {
                kerror!("carrier {} dropped a job: {}", index, e);
                total.rejected += 1;
            }
        }

        if carrier.has_ready() {
            total += carrier.run_round();
            continue;
        }

        if shared.shutdown.load(Ordering::SeqCst)
            && shared.submitting.load(Ordering::SeqCst) == 0
            && queue.is_empty()
        {
            break;
        }
        thread::park_timeout(park_timeout);
    }

    kdebug!(
        "carrier {} exiting: {} switches, {} completed, {} rejected",
        index,
        total.switches,
        total.completed,
        total.rejected
    );
    Ok(total)
}
