use std::time::{Duration, Instant};
use crossbeam_channel::{bounded, never, Receiver, Sender, TryRecvError};

/// Create a linked kill switch and signal.
///
/// Firing the switch (or dropping it) disconnects the channel every clone of
/// the signal listens on, which wakes any coroutine parked on it.
pub fn kill_switch() -> (KillSwitch, KillSignal) {
    let (tx, rx) = bounded(0);
    (KillSwitch { _tx: tx }, KillSignal { rx, deadline: None })
}

/// Owning side of a kill signal. Dropping it has the same effect as `kill`.
pub struct KillSwitch {
    _tx: Sender<()>,
}

impl KillSwitch {
    pub fn kill(self) {}
}

/// Listening side of a kill signal, optionally carrying a deadline.
#[derive(Clone, Debug)]
pub struct KillSignal {
    pub(crate) rx: Receiver<()>,
    pub(crate) deadline: Option<Instant>,
}

impl KillSignal {
    /// A signal that fires once `deadline` has passed.
    pub fn at(deadline: Instant) -> Self {
        KillSignal { rx: never(), deadline: Some(deadline) }
    }

    /// A signal that fires once `timeout` has elapsed. A timeout too large to
    /// represent as an `Instant` never fires.
    pub fn after(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::at(deadline),
            None => KillSignal { rx: never(), deadline: None },
        }
    }

    /// Also fire at `deadline`, keeping whichever deadline comes first.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(d) if d < deadline => d,
            _ => deadline,
        });
        self
    }

    pub fn is_killed(&self) -> bool {
        if let Some(d) = self.deadline {
            if Instant::now() >= d {
                return true;
            }
        }
        // Nothing is ever sent, so the only way out of Empty is the switch dropping.
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }
}
