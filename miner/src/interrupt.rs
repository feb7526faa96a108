//! The shared interrupt word between commit rounds.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Why an in-flight commit was asked to stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptReason {
    /// Keep going.
    None,
    /// The chain head moved: discard the half-built block.
    NewHead,
    /// The recommit timer fired: submit what is gathered as a partial
    /// block and start over.
    Resubmit,
}

const NONE: i32 = 0;
const NEW_HEAD: i32 = 1;
const RESUBMIT: i32 = 2;

/// A word the work loop flips to steer the commit in flight.
///
/// Each commit round gets a fresh interrupt; issuing the next round
/// signals the previous one.
#[derive(Clone, Default)]
pub struct CommitInterrupt(Arc<AtomicI32>);

impl CommitInterrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self, reason: InterruptReason) {
        let value = match reason {
            InterruptReason::None => NONE,
            InterruptReason::NewHead => NEW_HEAD,
            InterruptReason::Resubmit => RESUBMIT,
        };
        self.0.store(value, Ordering::SeqCst);
    }

    pub fn reason(&self) -> InterruptReason {
        match self.0.load(Ordering::SeqCst) {
            NEW_HEAD => InterruptReason::NewHead,
            RESUBMIT => InterruptReason::Resubmit,
            _ => InterruptReason::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clear_and_latches_signal() {
        let interrupt = CommitInterrupt::new();
        assert_eq!(interrupt.reason(), InterruptReason::None);

        interrupt.signal(InterruptReason::Resubmit);
        assert_eq!(interrupt.reason(), InterruptReason::Resubmit);

        // A newer, stronger signal overwrites.
        interrupt.signal(InterruptReason::NewHead);
        assert_eq!(interrupt.reason(), InterruptReason::NewHead);
    }

    #[test]
    fn clones_share_the_word() {
        let interrupt = CommitInterrupt::new();
        let observer = interrupt.clone();
        interrupt.signal(InterruptReason::NewHead);
        assert_eq!(observer.reason(), InterruptReason::NewHead);
    }
}
