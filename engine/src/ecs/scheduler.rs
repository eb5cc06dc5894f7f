//! Job/task execution with per-type locking and result propagation
//! (spec.md §4.7).
//!
//! Rust's `Repository<T>` has no interior mutability, so unlike the source
//! design — where a task mutates columns directly while holding the
//! store's read lock plus a per-type mutex for the whole job — every
//! mutation here is deferred through a [`Commands`] buffer (grounded in
//! the teacher's own `CommandBuffer`/`Commands` pattern, see
//! `ecs/system/command.rs` and `ecs/system/param/commands.rs` in the
//! retrieved pack) and applied under a short-lived write-lock acquisition
//! right after the task that queued it returns.
//!
//! A job's declared per-type [`Mutex`]es are still acquired, in
//! deterministic sorted order, for the job's *entire* execution — this is
//! what actually lets two shared jobs with disjoint `accessed_types` run
//! concurrently on different threads (spec.md §8 scenario 6) and what
//! prevents deadlock when two jobs declare overlapping-but-differently-
//! ordered type sets. The store's own `RwLock` is then taken fresh, briefly,
//! around each individual task's `process()` call (a shared read lock) and
//! around each command flush (a short write lock), rather than held for
//! the whole job — `std::sync::RwLock` has no read-to-write upgrade, and
//! this sequencing needs none: disjoint-type jobs still genuinely overlap
//! during their read phases, and only contend against each other during
//! the brief windows where one of them is actually mutating.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::queue::SegQueue;
use log::{debug, trace, warn};

use crate::ecs::entity_store::EntityStore;
use crate::ecs::error::{Error, Result};

/// A value a [`Task`] can hand to later tasks in the same job via
/// [`TaskContext::report`].
///
/// Rust has no reflection, so instead of the source's "enumerate every
/// `report(ResultSubtype)` method", each [`Task`] decides for itself, in
/// [`Task::receive`], whether a given reported value is one it cares about
/// (by attempting a downcast through [`ReportResult::as_any`]).
pub trait ReportResult: Send + Sync + 'static {
    /// A singleton result may be reported at most once per job execution;
    /// a second report within the same run is fatal to the job (spec.md
    /// §4.7, §7).
    fn is_singleton(&self) -> bool {
        false
    }

    /// Used only for the error/log message when a singleton is reported
    /// twice.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn as_any(&self) -> &dyn Any;
}

/// What a [`Task`] declares about its concurrency requirements.
///
/// A task that doesn't override [`Task::concurrency`] is `Exclusive` — the
/// Rust equivalent of spec.md §4.7's "a task that does not implement this
/// interface is treated as fully exclusive".
#[derive(Debug, Clone, Default)]
pub enum Concurrency {
    #[default]
    Exclusive,
    Shared {
        accessed_types: Vec<TypeId>,
        modifies_entity_set: bool,
    },
}

/// One step of a [`Job`].
pub trait Task: Send {
    /// Called on every task, in order, before any task's `process` runs
    /// this execution.
    fn reset(&mut self, store: &EntityStore) {
        let _ = store;
    }

    /// Do this task's work. May queue mutations via `ctx.commands()` and
    /// report results via `ctx.report()`. Returning `Some(job)` appends
    /// `job` to the post-process chain run (as a fresh tail job) once
    /// every task in the current job has processed.
    fn process(&mut self, ctx: &mut TaskContext<'_>) -> Option<Job>;

    /// Declares this task's parallelism constraints. See [`Concurrency`].
    fn concurrency(&self) -> Concurrency {
        Concurrency::default()
    }

    /// Offered every result reported by an earlier task in this job
    /// execution. Most tasks downcast via `result.as_any()` and ignore
    /// anything that doesn't match a type they care about.
    fn receive(&mut self, result: &dyn ReportResult) {
        let _ = result;
    }
}

/// Deferred mutation queue shared by every task in one job execution.
///
/// Grounded in the teacher's `CommandBuffer`: producers push closures
/// without taking any lock; [`Commands::flush`] applies them in push order
/// under the caller's `&mut EntityStore`.
#[derive(Default)]
pub struct Commands {
    queue: SegQueue<Box<dyn FnOnce(&mut EntityStore) + Send>>,
}

impl Commands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a mutation to run at the next flush.
    pub fn push(&self, f: impl FnOnce(&mut EntityStore) + Send + 'static) {
        self.queue.push(Box::new(f));
    }

    /// Apply every queued mutation, in the order it was pushed.
    pub fn flush(&self, store: &mut EntityStore) {
        while let Some(f) = self.queue.pop() {
            f(store);
        }
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// What a [`Task::process`] call is handed: read access to the store as of
/// the start of this task's turn, the shared command queue, and the
/// reporting surface.
pub struct TaskContext<'a> {
    store: &'a EntityStore,
    commands: &'a Commands,
    scheduler: Arc<SchedulerInner>,
    reports: Vec<Box<dyn ReportResult>>,
}

impl<'a> TaskContext<'a> {
    pub fn store(&self) -> &EntityStore {
        self.store
    }

    pub fn commands(&self) -> &Commands {
        self.commands
    }

    /// Report a result to every task later in this job's task list.
    pub fn report<R: ReportResult>(&mut self, result: R) {
        self.reports.push(Box::new(result));
    }

    /// Start building a post-process job bound to the same scheduler that
    /// is running the current job. Returning the built `Job` from
    /// `Task::process` chains it into the tail sequence spec.md §4.7
    /// describes.
    pub fn job(&self, name: impl Into<String>) -> JobBuilder {
        JobBuilder {
            scheduler: self.scheduler.clone(),
            name: name.into(),
            tasks: Vec::new(),
        }
    }
}

/// An ordered, immutable list of tasks bound to the [`Scheduler`] that
/// built it. Constructing a `Job` computes its lock requirements once, up
/// front, from every task's declared [`Concurrency`].
pub struct Job {
    name: String,
    scheduler: Arc<SchedulerInner>,
    tasks: Vec<Box<dyn Task>>,
    needs_exclusive_lock: bool,
    /// Sorted-by-lock-index union of every task's accessed types. Unused
    /// when `needs_exclusive_lock` is set.
    accessed_types: Vec<TypeId>,
}

impl Job {
    fn new(scheduler: Arc<SchedulerInner>, name: impl Into<String>, tasks: Vec<Box<dyn Task>>) -> Self {
        let mut needs_exclusive_lock = tasks.is_empty();
        let mut accessed: HashSet<TypeId> = HashSet::new();
        for task in &tasks {
            match task.concurrency() {
                Concurrency::Exclusive => needs_exclusive_lock = true,
                Concurrency::Shared {
                    accessed_types,
                    modifies_entity_set,
                } => {
                    if modifies_entity_set {
                        needs_exclusive_lock = true;
                    }
                    accessed.extend(accessed_types);
                }
            }
        }
        let mut accessed_types: Vec<TypeId> = accessed.into_iter().collect();
        accessed_types.sort_by_key(|t| scheduler.type_index(*t));
        Self {
            name: name.into(),
            scheduler,
            tasks,
            needs_exclusive_lock,
            accessed_types,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A builder for [`Job`]s bound to one [`Scheduler`].
pub struct JobBuilder {
    scheduler: Arc<SchedulerInner>,
    name: String,
    tasks: Vec<Box<dyn Task>>,
}

impl JobBuilder {
    pub fn task(mut self, task: impl Task + 'static) -> Self {
        self.tasks.push(Box::new(task));
        self
    }

    pub fn build(self) -> Job {
        Job::new(self.scheduler, self.name, self.tasks)
    }
}

/// A background scheduling handle. Dropping it does not cancel anything;
/// call [`CancelHandle::cancel`] explicitly.
#[derive(Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signal the repeater to stop issuing new invocations. A job already
    /// running continues to completion under its held locks (spec.md
    /// §4.7).
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

struct SchedulerInner {
    store: RwLock<EntityStore>,
    /// Job-level exclusivity gate, independent of `store`. Shared jobs
    /// hold `gate.read()` for their whole execution (so several can run
    /// concurrently); an exclusive job holds `gate.write()` for its whole
    /// execution, so it cannot start until every currently-running shared
    /// job finishes, and no new shared job can start while it runs
    /// (spec.md §8 scenario 6: "a third job that modifies the entity set
    /// blocks both until they finish").
    gate: RwLock<()>,
    /// Stable `TypeId -> lock-ordering index` registry. `TypeId` has no
    /// `Ord` in stable Rust, so every type that ever appears in a job's
    /// accessed set is assigned an increasing index the first time it's
    /// seen; jobs acquire per-type mutexes in ascending-index order,
    /// preventing deadlock across jobs with overlapping but differently
    /// ordered access sets.
    type_index: Mutex<HashMap<TypeId, usize>>,
    type_locks: Mutex<Vec<Arc<Mutex<()>>>>,
}

impl SchedulerInner {
    fn type_index(&self, type_id: TypeId) -> usize {
        let mut indices = self.type_index.lock().unwrap();
        if let Some(&i) = indices.get(&type_id) {
            return i;
        }
        let i = indices.len();
        indices.insert(type_id, i);
        self.type_locks.lock().unwrap().push(Arc::new(Mutex::new(())));
        i
    }

    fn type_lock(&self, index: usize) -> Arc<Mutex<()>> {
        self.type_locks.lock().unwrap()[index].clone()
    }
}

/// Owns the `EntityStore` and the locks that protect it, and runs [`Job`]s
/// against it. Cloning a `Scheduler` clones a cheap handle to the same
/// underlying store.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(store: EntityStore) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                store: RwLock::new(store),
                gate: RwLock::new(()),
                type_index: Mutex::new(HashMap::new()),
                type_locks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Start building a job with the given name (used only for log
    /// messages and in naming any post-process tail chain).
    pub fn job(&self, name: impl Into<String>) -> JobBuilder {
        JobBuilder {
            scheduler: self.inner.clone(),
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    /// Read-only access to the store, outside of any job execution. Useful
    /// for tests and for code that isn't itself scheduled as a task.
    pub fn with_store<R>(&self, f: impl FnOnce(&EntityStore) -> R) -> R {
        f(&self.inner.store.read().unwrap())
    }

    pub fn with_store_mut<R>(&self, f: impl FnOnce(&mut EntityStore) -> R) -> R {
        f(&mut self.inner.store.write().unwrap())
    }

    /// Run `job` to completion on the current thread.
    pub fn run(&self, job: Job) -> Result<()> {
        if !Arc::ptr_eq(&job.scheduler, &self.inner) {
            return Err(Error::WrongScheduler);
        }
        run_job(&self.inner, job);
        Ok(())
    }

    /// Run `job` once on a freshly spawned background thread. The returned
    /// handle can be `.join()`ed.
    pub fn run_background(&self, job: Job) -> JoinHandle<Result<()>> {
        let inner = self.inner.clone();
        let scheduler_matches = Arc::ptr_eq(&job.scheduler, &inner);
        std::thread::spawn(move || {
            if !scheduler_matches {
                return Err(Error::WrongScheduler);
            }
            run_job(&inner, job);
            Ok(())
        })
    }

    /// Repeatedly build and run a job via `make_job` no more often than
    /// every `period`, until the returned handle is cancelled. Each
    /// invocation runs to completion before the next is considered.
    pub fn run_repeating(
        &self,
        period: Duration,
        mut make_job: impl FnMut() -> Job + Send + 'static,
    ) -> CancelHandle {
        let handle = CancelHandle::new();
        let inner = self.inner.clone();
        let cancelled = handle.cancelled.clone();
        std::thread::spawn(move || {
            while !cancelled.load(Ordering::SeqCst) {
                let started = Instant::now();
                run_job(&inner, make_job());
                if cancelled.load(Ordering::SeqCst) {
                    break;
                }
                let elapsed = started.elapsed();
                if elapsed < period {
                    std::thread::sleep(period - elapsed);
                }
            }
        });
        handle
    }

    /// Like [`Scheduler::run_repeating`] with a zero minimum period: each
    /// invocation starts as soon as the previous one finishes (spec.md
    /// §4.7's "continuous (minimal-interval) repeater").
    pub fn run_continuous(&self, make_job: impl FnMut() -> Job + Send + 'static) -> CancelHandle {
        self.run_repeating(Duration::ZERO, make_job)
    }
}

enum GateGuard<'a> {
    Shared(std::sync::RwLockReadGuard<'a, ()>),
    Exclusive(std::sync::RwLockWriteGuard<'a, ()>),
}

fn run_job(inner: &Arc<SchedulerInner>, job: Job) {
    debug!("job '{}': starting, exclusive={}", job.name, job.needs_exclusive_lock);
    let Job {
        name,
        mut tasks,
        needs_exclusive_lock,
        accessed_types,
        ..
    } = job;

    // Held for the job's whole execution: an exclusive job waits out every
    // currently-running shared job and blocks new ones from starting (and
    // vice versa), while any number of shared jobs hold this concurrently.
    let _gate = if needs_exclusive_lock {
        GateGuard::Exclusive(inner.gate.write().unwrap())
    } else {
        GateGuard::Shared(inner.gate.read().unwrap())
    };

    // Acquired, in ascending lock-index order, for the job's whole
    // execution: deterministic ordering over the declared type set among
    // shared jobs, independent of how the store's own `RwLock` gets
    // acquired moment-to-moment below.
    let type_locks: Vec<Arc<Mutex<()>>> = accessed_types
        .iter()
        .map(|&t| inner.type_lock(inner.type_index(t)))
        .collect();
    let type_guards: Vec<_> = type_locks.iter().map(|m| m.lock().unwrap()).collect();

    let commands = Commands::new();

    {
        let store = inner.store.read().unwrap();
        for task in tasks.iter_mut() {
            task.reset(&store);
        }
    }

    let mut reported_singletons: HashSet<TypeId> = HashSet::new();
    let mut post_process: Vec<Job> = Vec::new();
    let mut aborted = false;

    for i in 0..tasks.len() {
        if aborted {
            break;
        }
        let reports = {
            let store = inner.store.read().unwrap();
            let mut ctx = TaskContext {
                store: &store,
                commands: &commands,
                scheduler: inner.clone(),
                reports: Vec::new(),
            };
            let next = tasks[i].process(&mut ctx);
            if let Some(job) = next {
                post_process.push(job);
            }
            ctx.reports
        };

        if !commands.is_empty() {
            let mut store = inner.store.write().unwrap();
            commands.flush(&mut store);
        }

        if dispatch_reports(&mut tasks, i, reports, &mut reported_singletons).is_err() {
            aborted = true;
        }
    }

    drop(type_guards);
    drop(_gate);

    let mut chain = post_process;
    while let Some(next) = chain.pop() {
        run_job(inner, next);
    }

    debug!("job '{}': finished", name);
}

/// Dispatch every result `tasks[reporter_index]` produced to every task
/// with a larger index, and enforce the singleton-reported-twice rule.
fn dispatch_reports(
    tasks: &mut [Box<dyn Task>],
    reporter_index: usize,
    reports: Vec<Box<dyn ReportResult>>,
    reported_singletons: &mut HashSet<TypeId>,
) -> std::result::Result<(), Error> {
    for result in reports {
        if result.is_singleton() {
            let type_id = (*result).as_any().type_id();
            if !reported_singletons.insert(type_id) {
                let name = result.type_name();
                warn!("scheduler: singleton result {name} reported more than once in one job");
                return Err(Error::SingletonResultReported(leak_name(name)));
            }
        }
        for receiver in tasks.iter_mut().skip(reporter_index + 1) {
            receiver.receive(result.as_ref());
        }
        trace!(
            "scheduler: dispatched {} from task {}",
            result.type_name(),
            reporter_index
        );
    }
    Ok(())
}

/// `Error::SingletonResultReported` carries a `&'static str`; the reported
/// type's name is already `&'static` in practice (it comes from
/// `std::any::type_name` or a literal override), but the `dyn
/// ReportResult` we have here only guarantees `&'static str` by contract,
/// not by the borrow checker, so we normalize through a leak. This only
/// runs on the (already-fatal, job-aborting) double-report path.
fn leak_name(name: &str) -> &'static str {
    Box::leak(name.to_string().into_boxed_str())
}
