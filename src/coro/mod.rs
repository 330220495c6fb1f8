//! A thread-backed suspend/resume primitive.
//!
//! `Coro::new` takes a body that receives a `Yielder`. Each `resume()` on the
//! driver lets the body run until it calls `yield_value` (or returns), then
//! parks it again. The body lives on its own worker thread, but control is
//! strictly alternating: the driver blocks while the body runs and the body
//! blocks while the driver runs. Values cross over zero-capacity rendezvous
//! channels, which is also what orders the body's writes before the driver's
//! reads.

pub mod kill;
pub mod options;

use std::cell::Cell;
use std::panic;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use crossbeam_channel::{bounded, Receiver, Select, Sender};
use log::{debug, warn};

use crate::error::{CoroError, CoroResult};

pub use kill::{kill_switch, KillSignal, KillSwitch};
pub use options::{kill_after, kill_at, kill_on, stack_size, thread_name, Options, SetOption};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

enum Resume {
    Next,
    Kill,
}

enum Step<Y, R> {
    Yield(Y),
    Return(R),
}

enum Wake {
    Resume,
    Killed,
}

/// Outcome of a single `Coro::resume`.
#[derive(Debug, PartialEq)]
pub enum Resumed<Y, R> {
    /// The body called `yield_value` and is now parked.
    Yielded(Y),
    /// The body returned. Reported exactly once.
    Returned(R),
    /// The body returned on an earlier resume.
    Finished,
}

impl<Y, R> Resumed<Y, R> {
    pub fn yielded(self) -> Option<Y> {
        match self {
            Resumed::Yielded(value) => Some(value),
            _ => None,
        }
    }
}

/// The yield capability handed to a coroutine body.
pub struct Yielder<Y, R> {
    name: String,
    resume_rx: Receiver<Resume>,
    step_tx: Sender<Step<Y, R>>,
    kill: Vec<KillSignal>,
    deadline: Option<Instant>,
    killed: Cell<bool>,
}

impl<Y, R> Yielder<Y, R> {
    /// Hand `value` to the driver and park until the next resume.
    ///
    /// Returns `CoroError::Killed` once the coroutine has been killed, without
    /// handing anything over. Bodies should unwind with `?` and run their
    /// cleanup on the way out.
    pub fn yield_value(&self, value: Y) -> CoroResult<()> {
        if self.is_killed() {
            return Err(CoroError::Killed);
        }
        if self.step_tx.send(Step::Yield(value)).is_err() {
            self.killed.set(true);
            return Err(CoroError::Killed);
        }
        debug!("coroutine {} yielded", self.name);
        match self.wait() {
            Wake::Resume if !self.is_killed() => Ok(()),
            _ => {
                debug!("coroutine {} killed while suspended", self.name);
                self.killed.set(true);
                Err(CoroError::Killed)
            }
        }
    }

    pub fn is_killed(&self) -> bool {
        self.killed.get() || self.kill.iter().any(KillSignal::is_killed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until the driver resumes us or one of the kill signals fires.
    fn wait(&self) -> Wake {
        let mut sel = Select::new();
        let resume = sel.recv(&self.resume_rx);
        for k in &self.kill {
            sel.recv(&k.rx);
        }
        let op = match self.deadline {
            Some(deadline) => match sel.select_deadline(deadline) {
                Ok(op) => op,
                Err(_) => return Wake::Killed,
            },
            None => sel.select(),
        };
        let index = op.index();
        if index == resume {
            match op.recv(&self.resume_rx) {
                Ok(Resume::Next) => Wake::Resume,
                Ok(Resume::Kill) | Err(_) => Wake::Killed,
            }
        } else {
            // Kill channels only ever disconnect.
            let _ = op.recv(&self.kill[index - 1].rx);
            Wake::Killed
        }
    }
}

/// Driver side of a coroutine.
pub struct Coro<Y, R> {
    name: String,
    resume_tx: Sender<Resume>,
    step_rx: Receiver<Step<Y, R>>,
    handle: Option<JoinHandle<()>>,
    finished: bool,
}

impl<Y, R> Coro<Y, R>
where
    Y: Send + 'static,
    R: Send + 'static,
{
    /// Spawn the worker for `body`. The body does not start running until the
    /// first `resume()`, unless a kill arrives first, in which case it starts
    /// with the yielder already killed so it can clean up.
    pub fn new<'o, F>(body: F, options: impl IntoIterator<Item = SetOption<'o>>) -> CoroResult<Self>
    where
        F: FnOnce(&Yielder<Y, R>) -> R + Send + 'static,
    {
        let opts = Options::from_set(options);
        let name = match &opts.thread_name {
            Some(name) => name.clone(),
            None => format!("rowcoro-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed)),
        };
        let deadline = opts.deadline();

        // Only one resume request is ever in flight, so a single slot means
        // the driver never blocks on it.
        let (resume_tx, resume_rx) = bounded(1);
        let (step_tx, step_rx) = bounded(0);

        let yielder = Yielder {
            name: name.clone(),
            resume_rx,
            step_tx,
            kill: opts.kill,
            deadline,
            killed: Cell::new(false),
        };

        let mut builder = thread::Builder::new().name(name.clone());
        if let Some(size) = opts.stack_size {
            builder = builder.stack_size(size);
        }
        let handle = builder.spawn(move || run(body, yielder))?;
        debug!("coroutine {} spawned", name);

        Ok(Coro {
            name,
            resume_tx,
            step_rx,
            handle: Some(handle),
            finished: false,
        })
    }

    /// Run the body until it next yields or returns.
    ///
    /// If the body panicked, the panic is re-raised here.
    pub fn resume(&mut self) -> Resumed<Y, R> {
        if self.finished {
            return Resumed::Finished;
        }
        debug!("resuming coroutine {}", self.name);
        if self.resume_tx.send(Resume::Next).is_err() {
            self.reap();
            return Resumed::Finished;
        }
        match self.step_rx.recv() {
            Ok(Step::Yield(value)) => Resumed::Yielded(value),
            Ok(Step::Return(out)) => {
                self.reap();
                Resumed::Returned(out)
            }
            Err(_) => {
                self.reap();
                Resumed::Finished
            }
        }
    }
}

impl<Y, R> Coro<Y, R> {
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn reap(&mut self) {
        self.finished = true;
        if let Some(handle) = self.handle.take() {
            if let Err(payload) = handle.join() {
                panic::resume_unwind(payload);
            }
        }
        debug!("coroutine {} finished", self.name);
    }
}

impl<Y, R> Drop for Coro<Y, R> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        debug!("coroutine {} dropped before returning, killing it", self.name);
        let _ = self.resume_tx.send(Resume::Kill);
        // A killed body never yields again, so the next step is its return
        // (or a disconnect if it panicked).
        while let Ok(step) = self.step_rx.recv() {
            if let Step::Return(_) = step {
                break;
            }
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("coroutine {} panicked while being killed", self.name);
            }
        }
        self.finished = true;
    }
}

fn run<Y, R, F>(body: F, yielder: Yielder<Y, R>)
where
    F: FnOnce(&Yielder<Y, R>) -> R,
{
    if let Wake::Killed = yielder.wait() {
        debug!("coroutine {} killed before it started", yielder.name);
        yielder.killed.set(true);
    }
    let out = body(&yielder);
    debug!("coroutine {} returned", yielder.name);
    let _ = yielder.step_tx.send(Step::Return(out));
}
