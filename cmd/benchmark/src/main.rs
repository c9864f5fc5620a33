//! Switch benchmarks
//!
//! Reports nanoseconds per raw switch with and without FPU preservation,
//! and per task yield on a carrier.

use std::cell::Cell;
use std::time::Instant;

use strand::{jump_context, make_context, yield_now, Carrier, CarrierConfig, ContextHandle, Stack};

const ITERATIONS: usize = 1_000_000;

thread_local! {
    static MAIN: Cell<ContextHandle> = const { Cell::new(ContextHandle::null()) };
    static PEER: Cell<ContextHandle> = const { Cell::new(ContextHandle::null()) };
    static FPU: Cell<bool> = const { Cell::new(false) };
}

extern "C" fn echo(mut v: usize) {
    loop {
        let me = PEER.with(Cell::as_ptr);
        let main = MAIN.with(Cell::get);
        v = unsafe { jump_context(me, main, v, FPU.with(Cell::get)) };
    }
}

fn main() {
    println!("=== Strand Benchmarks ===\n");

    if let Err(e) = bench_raw_switch(false).and_then(|_| bench_raw_switch(true)) {
        eprintln!("raw switch benchmark failed: {}", e);
    }
    if let Err(e) = bench_carrier_yield() {
        eprintln!("carrier benchmark failed: {}", e);
    }

    println!("=== Benchmarks Complete ===");
}

fn report(name: &str, switches: usize, elapsed: std::time::Duration) {
    let per = elapsed.as_nanos() as f64 / switches as f64;
    println!("Benchmark: {}", name);
    println!("{}", "─".repeat(40));
    println!("  Switches:    {}", switches);
    println!("  Total time:  {:?}", elapsed);
    println!("  Per switch:  {:.1} ns", per);
    println!("  Rate:        {:.0}/sec\n", switches as f64 / elapsed.as_secs_f64());
}

fn bench_raw_switch(fpu: bool) -> strand::StrandResult<()> {
    let stack = Stack::new(64 * 1024)?;
    PEER.with(|p| p.set(unsafe { make_context(stack.top(), stack.size(), echo) }));
    FPU.with(|f| f.set(fpu));

    let start = Instant::now();
    let mut acc = 0usize;
    for i in 0..ITERATIONS {
        let main = MAIN.with(Cell::as_ptr);
        let peer = PEER.with(Cell::get);
        acc = acc.wrapping_add(unsafe { jump_context(main, peer, i, fpu) });
    }
    let elapsed = start.elapsed();
    std::hint::black_box(acc);

    // two switches per iteration: there and back
    let name = if fpu { "raw switch (preserve_fpu)" } else { "raw switch" };
    report(name, ITERATIONS * 2, elapsed);
    Ok(())
}

fn bench_carrier_yield() -> strand::StrandResult<()> {
    let mut carrier = Carrier::new(CarrierConfig::from_env())?;
    let per_task = ITERATIONS / 4;
    for _ in 0..4 {
        carrier.spawn(move || {
            for _ in 0..per_task {
                yield_now();
            }
        })?;
    }

    let start = Instant::now();
    let stats = carrier.run()?;
    let elapsed = start.elapsed();

    report("carrier yield", stats.switches as usize * 2, elapsed);
    Ok(())
}
