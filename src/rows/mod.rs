pub mod memory;
pub mod value;

use log::{debug, warn};

use crate::coro::{Coro, Resumed, SetOption, Yielder};
use crate::error::{CoroError, CoroResult};

/// A cursor over a tabular result set.
///
/// Call order is `advance` until it returns false, then `last_error`, then
/// `release`. `current` is only meaningful right after `advance` returned true.
pub trait RowSource: Send + 'static {
    /// Handle to the row the cursor is on. Valid until the next `advance`.
    type Row: Send + 'static;
    type Error: Send + 'static;

    fn advance(&mut self) -> bool;

    fn current(&mut self) -> Self::Row;

    /// Error that ended iteration, if any. Only called after `advance` returned false.
    fn last_error(&mut self) -> Option<Self::Error>;

    /// Tear the source down. Called exactly once. On a killed iterator this
    /// happens without `advance` having returned false.
    fn release(&mut self) -> Result<(), Self::Error>;
}

/// What the producer hands back when it returns.
struct Outcome<E> {
    err: Option<E>,
    killed: bool,
}

type RowYielder<S> = Yielder<<S as RowSource>::Row, Outcome<<S as RowSource>::Error>>;

/// Pull iterator over a `RowSource`, returned by `iterate_rows`.
pub struct NextRow<S: RowSource> {
    coro: Coro<S::Row, Outcome<S::Error>>,
    killed: bool,
}

/// Wrap `source` in a coroutine and return its advancing function.
///
/// `options` are handed to the coroutine untouched.
pub fn iterate_rows<'o, S: RowSource>(
    source: S,
    options: impl IntoIterator<Item = SetOption<'o>>,
) -> CoroResult<NextRow<S>> {
    let coro = Coro::new(move |yielder: &RowYielder<S>| produce(source, yielder), options)?;
    debug!("row iterator ready on coroutine {}", coro.name());
    Ok(NextRow { coro, killed: false })
}

fn produce<S: RowSource>(mut source: S, yielder: &RowYielder<S>) -> Outcome<S::Error> {
    let drained = drain(&mut source, yielder);
    let released = source.release();
    if released.is_err() {
        warn!("row source release failed on coroutine {}", yielder.name());
    }
    match drained {
        // Exhaustion error wins over release error.
        Ok(err) => Outcome { err: err.or(released.err()), killed: false },
        Err(_) => Outcome { err: released.err(), killed: true },
    }
}

fn drain<S: RowSource>(source: &mut S, yielder: &RowYielder<S>) -> CoroResult<Option<S::Error>> {
    loop {
        if yielder.is_killed() {
            return Err(CoroError::Killed);
        }
        if !source.advance() {
            return Ok(source.last_error());
        }
        yielder.yield_value(source.current())?;
    }
}

impl<S: RowSource> NextRow<S> {
    /// Advance one row.
    ///
    /// Returns true with the row written to `into`, or false once iteration
    /// has ended. On the first false the terminal error, if any, is written
    /// to `returned`; pass `None` to ignore it. Later calls keep returning
    /// false and never touch the source again.
    pub fn next_row(&mut self, into: &mut Option<S::Row>, returned: Option<&mut Option<S::Error>>) -> bool {
        match self.coro.resume() {
            Resumed::Yielded(row) => {
                *into = Some(row);
                true
            }
            Resumed::Returned(outcome) => {
                self.killed = outcome.killed;
                debug!(
                    "row iterator on coroutine {} ended (error: {}, killed: {})",
                    self.coro.name(),
                    outcome.err.is_some(),
                    outcome.killed
                );
                if let (Some(err), Some(slot)) = (outcome.err, returned) {
                    *slot = Some(err);
                }
                false
            }
            Resumed::Finished => false,
        }
    }

    pub fn is_done(&self) -> bool {
        self.coro.is_finished()
    }

    /// Whether iteration was cut short by a kill signal.
    pub fn killed(&self) -> bool {
        self.killed
    }

    /// The advancing function as a bare closure.
    pub fn into_fn(mut self) -> impl FnMut(&mut Option<S::Row>, Option<&mut Option<S::Error>>) -> bool {
        move |into, returned| self.next_row(into, returned)
    }
}

impl<S: RowSource> Iterator for NextRow<S> {
    type Item = Result<S::Row, S::Error>;

    /// Yields each row, then the terminal error once if there is one.
    fn next(&mut self) -> Option<Self::Item> {
        let mut row = None;
        let mut err = None;
        if self.next_row(&mut row, Some(&mut err)) {
            return row.map(Ok);
        }
        err.map(Err)
    }
}
