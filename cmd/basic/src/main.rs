//! Basic strand example
//!
//! Runs a few cooperative tasks on one carrier, then the same work on a
//! pool of carriers, then flushes an ordered write queue.
//!
//! # Environment Variables
//!
//! - `STRAND_FLUSH_EPRINT=1` - Flush debug output immediately
//! - `STRAND_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)
//! - `STRAND_STACK_SIZE=256k` - Override the task stack size

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use strand::{
    current_task, kdebug, kinfo, spawn, yield_now, BytesMessage, Carrier, CarrierConfig,
    CarrierPool, MemoryTransport, StrandResult, WriteQueue,
};

// STRAND_LOG_LEVEL=debug STRAND_FLUSH_EPRINT=1 cargo run -p strand-basic
fn main() -> StrandResult<()> {
    println!("=== Strand Basic Example ===\n");

    let config = CarrierConfig::from_env();
    config.print();
    println!();

    single_carrier(config.clone())?;
    carrier_pool(config.num_carriers(2))?;
    ordered_writes();

    println!("\n=== Done ===");
    Ok(())
}

fn single_carrier(config: CarrierConfig) -> StrandResult<()> {
    println!("--- one carrier ---");
    let mut carrier = Carrier::new(config)?;
    let finished = Rc::new(Cell::new(0));

    for i in 1..=3 {
        let done = finished.clone();
        let id = carrier.spawn(move || {
            for step in 0..3 {
                println!("  task {} ({:?}) step {}", i, current_task(), step);
                yield_now();
            }
            if i == 3 {
                spawn(|| println!("  late task spawned from task 3")).ok();
            }
            done.set(done.get() + 1);
        })?;
        kdebug!("spawned task {} as {}", i, id);
    }

    let stats = carrier.run()?;
    println!(
        "  {} switches, {} tasks completed, {} counted by tasks",
        stats.switches,
        stats.completed,
        finished.get()
    );
    Ok(())
}

fn carrier_pool(config: CarrierConfig) -> StrandResult<()> {
    println!("--- carrier pool ---");
    let pool = CarrierPool::start(config)?;
    let total = Arc::new(AtomicUsize::new(0));

    for i in 0..16usize {
        let total = total.clone();
        pool.submit(move || {
            for _ in 0..4 {
                total.fetch_add(i, Ordering::Relaxed);
                yield_now();
            }
        })?;
    }

    let stats = pool.join()?;
    kinfo!("pool finished {} tasks", stats.completed);
    println!(
        "  sum {} ({} tasks, {} switches)",
        total.load(Ordering::Relaxed),
        stats.completed,
        stats.switches
    );
    Ok(())
}

fn ordered_writes() {
    println!("--- write queue ---");
    let mut queue = WriteQueue::new();
    let mut transport = MemoryTransport::new(1);

    let receipts: Vec<_> = ["GET / HTTP/1.1\r\n", "Host: a\r\n", "\r\n"]
        .iter()
        .map(|line| queue.push_message(BytesMessage(line.as_bytes().to_vec())))
        .collect();
    let report = queue.flush(&mut transport);

    println!("  {:?}", report);
    println!("  sent {:?}", String::from_utf8_lossy(transport.sent()));

    let late = queue.push_message(BytesMessage(b"too late".to_vec()));
    transport.tear_down();
    queue.flush(&mut transport);
    println!("  first receipt {:?}, late receipt {:?}", receipts[0].status(), late.status());
}
