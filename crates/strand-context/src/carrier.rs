//! Reference carrier: a single-threaded cooperative scheduler
//!
//! A carrier owns a set of tasks, each running on its own [`Stack`] through
//! a context made with [`make_context_with_finish`]. Tasks run in FIFO order
//! until they yield or finish. Every switch goes through the carrier: a task
//! always switches back to the carrier's own context (`origin`), never
//! directly to a sibling.
//!
//! Transfer values: the carrier passes the task id into a task, and the
//! task passes back a [`SwitchReason`].

use std::collections::VecDeque;
use std::ops::AddAssign;
use std::panic::{self, AssertUnwindSafe};

use slab::Slab;
use strand_core::{kdebug, kerror, ktrace, SwitchReason, StrandError, StrandResult, TaskId, TaskState};

use crate::config::CarrierConfig;
use crate::context::{jump_context, make_context_with_finish, ContextHandle};
use crate::stack::Stack;
use crate::tls;

type TaskFn = Box<dyn FnOnce() + 'static>;

struct Task {
    state: TaskState,
    context: ContextHandle,
    stack: Stack,
    entry: Option<TaskFn>,
}

/// Counters returned by [`Carrier::run`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    /// Switches from the carrier into a task
    pub switches: u64,
    /// Tasks whose closure returned or panicked
    pub completed: u64,
    /// Tasks whose closure panicked
    pub panicked: u64,
    /// Pool jobs dropped because no task could be spawned for them
    pub rejected: u64,
}

impl AddAssign for RunStats {
    fn add_assign(&mut self, rhs: RunStats) {
        self.switches += rhs.switches;
        self.completed += rhs.completed;
        self.panicked += rhs.panicked;
        self.rejected += rhs.rejected;
    }
}

pub(crate) struct CarrierState {
    config: CarrierConfig,
    tasks: Slab<Task>,
    run_queue: VecDeque<TaskId>,
    /// Carrier's own context while a task runs
    origin: ContextHandle,
    stack_pool: Vec<Stack>,
    stats: RunStats,
}

impl CarrierState {
    fn spawn(&mut self, entry: TaskFn) -> StrandResult<TaskId> {
        if self.tasks.len() >= self.config.max_contexts {
            return Err(StrandError::NoSlotsAvailable);
        }
        let slot = self.tasks.vacant_entry();
        let id = TaskId::from_index(slot.key()).ok_or(StrandError::NoSlotsAvailable)?;

        let stack = match self.stack_pool.pop() {
            Some(stack) => stack,
            None => Stack::new(self.config.stack_size)?,
        };
        let context = unsafe {
            make_context_with_finish(stack.top(), stack.size(), task_entry, task_finished)
        };

        slot.insert(Task {
            state: TaskState::Created,
            context,
            stack,
            entry: Some(entry),
        });
        self.run_queue.push_back(id);
        ktrace!("spawned {} ({} live)", id, self.tasks.len());
        Ok(id)
    }

    fn retire(&mut self, id: TaskId) {
        if !self.tasks.contains(id.as_usize()) {
            return;
        }
        let task = self.tasks.remove(id.as_usize());
        debug_assert!(task.state.is_terminated());
        if self.stack_pool.len() < self.config.stack_pool_limit {
            self.stack_pool.push(task.stack);
        }
        self.stats.completed += 1;
    }
}

/// Run `f` against this thread's carrier state, if a carrier is installed
///
/// The reference must not outlive `f`: no `jump_context` may happen inside.
fn with_state<R>(f: impl FnOnce(&mut CarrierState) -> R) -> Option<R> {
    let ptr = tls::carrier_ptr();
    if ptr.is_null() {
        return None;
    }
    Some(f(unsafe { &mut *ptr }))
}

/// Cooperative scheduler bound to the OS thread that created it
pub struct Carrier {
    state: *mut CarrierState,
}

impl Carrier {
    /// Install a carrier on the current thread
    pub fn new(config: CarrierConfig) -> StrandResult<Carrier> {
        config.validate()?;
        if tls::is_on_carrier() {
            return Err(StrandError::AlreadyInitialized);
        }

        let state = Box::into_raw(Box::new(CarrierState {
            config,
            tasks: Slab::new(),
            run_queue: VecDeque::new(),
            origin: ContextHandle::null(),
            stack_pool: Vec::new(),
            stats: RunStats::default(),
        }));
        tls::install_carrier(state);
        kdebug!("carrier installed on {:?}", std::thread::current().id());
        Ok(Carrier { state })
    }

    /// Queue a new task
    pub fn spawn<F>(&self, f: F) -> StrandResult<TaskId>
    where
        F: FnOnce() + 'static,
    {
        self.state_mut().spawn(Box::new(f))
    }

    /// Live tasks, running or suspended
    pub fn live_tasks(&self) -> usize {
        self.state_mut().tasks.len()
    }

    /// Whether another task can be spawned
    pub fn has_capacity(&self) -> bool {
        let state = self.state_mut();
        state.tasks.len() < state.config.max_contexts
    }

    /// Whether any task is waiting to run
    pub fn has_ready(&self) -> bool {
        !self.state_mut().run_queue.is_empty()
    }

    /// Scheduling state of a live task
    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.state_mut().tasks.get(id.as_usize()).map(|t| t.state)
    }

    pub fn config(&self) -> &CarrierConfig {
        unsafe { &(*self.state).config }
    }

    /// Run tasks until none is ready
    pub fn run(&mut self) -> StrandResult<RunStats> {
        let mut total = RunStats::default();
        while self.has_ready() {
            total += self.run_round();
        }
        kdebug!(
            "carrier run done: {} switches, {} completed, {} panicked",
            total.switches,
            total.completed,
            total.panicked
        );
        Ok(total)
    }

    /// Give every task that is ready right now one turn
    pub(crate) fn run_round(&mut self) -> RunStats {
        let before = self.state_mut().stats;
        let round = self.state_mut().run_queue.len();
        for _ in 0..round {
            let Some(id) = self.state_mut().run_queue.pop_front() else {
                break;
            };
            self.resume(id);
        }
        let after = self.state_mut().stats;
        RunStats {
            switches: after.switches - before.switches,
            completed: after.completed - before.completed,
            panicked: after.panicked - before.panicked,
            rejected: 0,
        }
    }

    fn resume(&mut self, id: TaskId) {
        let (origin, target, preserve_fpu) = {
            let state = self.state_mut();
            let Some(task) = state.tasks.get_mut(id.as_usize()) else {
                return;
            };
            debug_assert!(task.state.is_runnable());
            task.state = TaskState::Running;
            let target = task.context;
            state.stats.switches += 1;
            (&mut state.origin as *mut ContextHandle, target, state.config.preserve_fpu)
        };

        tls::set_current_task(id);
        let transfer = unsafe { jump_context(origin, target, id.as_usize(), preserve_fpu) };
        tls::clear_current_task();

        let state = self.state_mut();
        match SwitchReason::from_transfer(transfer) {
            Some(SwitchReason::Yielded) => {
                if let Some(task) = state.tasks.get_mut(id.as_usize()) {
                    task.state = TaskState::Ready;
                    state.run_queue.push_back(id);
                }
            }
            Some(SwitchReason::Finished) => {
                if let Some(task) = state.tasks.get_mut(id.as_usize()) {
                    task.state = TaskState::Finished;
                }
                state.retire(id);
                ktrace!("{} finished", id);
            }
            None => {
                kerror!("{} switched back with unknown reason {:#x}", id, transfer);
                std::process::abort();
            }
        }
    }

    #[allow(clippy::mut_from_ref)]
    fn state_mut(&self) -> &mut CarrierState {
        unsafe { &mut *self.state }
    }
}

impl Drop for Carrier {
    fn drop(&mut self) {
        tls::clear_carrier();
        let state = unsafe { Box::from_raw(self.state) };
        if !state.tasks.is_empty() {
            // suspended tasks are never resumed; their stacks go with them
            kdebug!("carrier dropped with {} unfinished tasks", state.tasks.len());
        }
    }
}

/// Entry routine of every task context
extern "C" fn task_entry(transfer: usize) {
    let Some(id) = TaskId::from_index(transfer) else {
        return;
    };
    let entry = with_state(|s| s.tasks.get_mut(id.as_usize()).and_then(|t| t.entry.take()));
    let Some(Some(entry)) = entry else {
        return;
    };

    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(entry)) {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        kerror!("{} panicked: {}", id, msg);
        with_state(|s| s.stats.panicked += 1);
    }
}

/// Finish handler of every task context; runs on the finished task's stack
extern "C" fn task_finished() -> ! {
    let Some((origin, preserve_fpu)) = with_state(|s| (s.origin, s.config.preserve_fpu)) else {
        kerror!("task finished without a carrier on this thread");
        std::process::abort();
    };
    let mut dead = ContextHandle::null();
    unsafe {
        jump_context(&mut dead, origin, SwitchReason::Finished.as_transfer(), preserve_fpu);
    }
    kerror!("finished task was resumed");
    std::process::abort()
}

/// Queue a task on this thread's carrier
pub fn spawn<F>(f: F) -> StrandResult<TaskId>
where
    F: FnOnce() + 'static,
{
    with_state(|s| s.spawn(Box::new(f))).unwrap_or(Err(StrandError::NotOnCarrier))
}

/// Let the other ready tasks run
///
/// Outside a task this yields the OS thread instead.
pub fn yield_now() {
    let Some(id) = tls::current_task() else {
        std::thread::yield_now();
        return;
    };
    let switch = with_state(|s| {
        let task = s.tasks.get_mut(id.as_usize())?;
        Some((&mut task.context as *mut ContextHandle, s.origin, s.config.preserve_fpu))
    });
    let Some(Some((slot, origin, preserve_fpu))) = switch else {
        std::thread::yield_now();
        return;
    };
    unsafe {
        jump_context(slot, origin, SwitchReason::Yielded.as_transfer(), preserve_fpu);
    }
}

/// Task running on this thread, if any
pub fn current_task() -> Option<TaskId> {
    tls::current_task()
}

/// Whether this thread has a carrier installed
pub fn is_on_carrier() -> bool {
    tls::is_on_carrier()
}
