use std::time::{Duration, Instant};
use crate::coro::kill::KillSignal;

/// Configuration owned by a coroutine, built by applying `SetOption`s in order.
#[derive(Default, Debug)]
pub struct Options {
    pub(crate) kill: Vec<KillSignal>,
    pub(crate) thread_name: Option<String>,
    pub(crate) stack_size: Option<usize>,
}

/// A single configuration step. Each one is applied exactly once, when the
/// coroutine is constructed.
pub type SetOption<'a> = Box<dyn FnOnce(&mut Options) + 'a>;

impl Options {
    pub fn from_set<'o>(options: impl IntoIterator<Item = SetOption<'o>>) -> Self {
        let mut opts = Options::default();
        for set in options {
            set(&mut opts);
        }
        opts
    }

    pub fn kill_signals(&self) -> &[KillSignal] {
        &self.kill
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    pub fn stack_size(&self) -> Option<usize> {
        self.stack_size
    }

    /// The earliest deadline across all kill signals.
    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.kill.iter().filter_map(|k| k.deadline).min()
    }
}

/// Kill the coroutine when `signal` fires.
pub fn kill_on(signal: KillSignal) -> SetOption<'static> {
    Box::new(move |opts: &mut Options| opts.kill.push(signal))
}

pub fn kill_at(deadline: Instant) -> SetOption<'static> {
    kill_on(KillSignal::at(deadline))
}

pub fn kill_after(timeout: Duration) -> SetOption<'static> {
    kill_on(KillSignal::after(timeout))
}

pub fn thread_name(name: impl Into<String>) -> SetOption<'static> {
    let name = name.into();
    Box::new(move |opts: &mut Options| opts.thread_name = Some(name))
}

pub fn stack_size(bytes: usize) -> SetOption<'static> {
    Box::new(move |opts: &mut Options| opts.stack_size = Some(bytes))
}
