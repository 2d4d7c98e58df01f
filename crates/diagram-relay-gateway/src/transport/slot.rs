//! Single-occupant connection slot.
//!
//! Each side of the relay owns one slot. A new connection overwrites the
//! occupant (last writer wins); the previous occupant's outbound sender is
//! dropped in the same step, which closes its queue and ends its session.
//!
//! The slot is a `std::sync::Mutex`: every operation under it is
//! non-blocking (`try_send`, assignment), so it is never held across an await.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};

use diagram_relay_core::{RelayError, Result, Side};

/// Process-unique id of one accepted connection.
pub type ConnId = u64;

/// How an attach changed the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attached {
    /// Slot was empty: `Disconnected -> Connected`.
    Fresh,
    /// Slot was occupied: abrupt replacement, no intermediate `Disconnected`.
    Replaced { previous: ConnId },
}

struct Occupant<M> {
    id: ConnId,
    tx: mpsc::Sender<M>,
}

pub struct ConnectionSlot<M> {
    side: Side,
    capacity: usize,
    next_id: AtomicU64,
    current: Mutex<Option<Occupant<M>>>,
}

impl<M> ConnectionSlot<M> {
    pub fn new(side: Side, capacity: usize) -> Self {
        Self {
            side,
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
            current: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Occupant<M>>> {
        // Nothing under the lock can leave the slot half-updated.
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a new occupant and return its id plus its outbound queue.
    ///
    /// `then` runs while the slot is still locked, so transitions observed by
    /// it are totally ordered with every other attach/detach on this slot.
    pub fn attach_with<F>(&self, then: F) -> (ConnId, mpsc::Receiver<M>)
    where
        F: FnOnce(ConnId, Attached),
    {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut cur = self.lock();
        let attached = match cur.replace(Occupant { id, tx }) {
            Some(old) => Attached::Replaced { previous: old.id },
            None => Attached::Fresh,
        };
        then(id, attached);
        (id, rx)
    }

    pub fn attach(&self) -> (ConnId, mpsc::Receiver<M>, Attached) {
        let mut how = Attached::Fresh;
        let (id, rx) = self.attach_with(|_, a| how = a);
        (id, rx, how)
    }

    /// Clear the slot if `id` still occupies it. Returns whether it did.
    ///
    /// A replaced connection detaching later is a no-op, so each
    /// `Connected -> Disconnected` transition is reported at most once.
    pub fn detach_with<F>(&self, id: ConnId, then: F) -> bool
    where
        F: FnOnce(),
    {
        let mut cur = self.lock();
        if cur.as_ref().is_some_and(|o| o.id == id) {
            *cur = None;
            then();
            true
        } else {
            false
        }
    }

    pub fn detach(&self, id: ConnId) -> bool {
        self.detach_with(id, || {})
    }

    pub fn is_current(&self, id: ConnId) -> bool {
        self.lock().as_ref().is_some_and(|o| o.id == id)
    }

    pub fn current_id(&self) -> Option<ConnId> {
        self.lock().as_ref().map(|o| o.id)
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    /// Queue `msg` for the occupant without waiting. Never buffers elsewhere:
    /// no occupant or a full queue means the message is gone.
    pub fn try_send(&self, msg: M) -> Result<()> {
        let cur = self.lock();
        let Some(occupant) = cur.as_ref() else {
            return Err(RelayError::NoDestination(self.side));
        };
        occupant.tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => RelayError::QueueFull(self.side),
            TrySendError::Closed(_) => RelayError::Closed(self.side),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_closes_previous_queue() {
        let slot: ConnectionSlot<u32> = ConnectionSlot::new(Side::Browser, 4);
        let (a, mut rx_a, how) = slot.attach();
        assert_eq!(how, Attached::Fresh);

        let (b, mut rx_b, how) = slot.attach();
        assert_eq!(how, Attached::Replaced { previous: a });
        assert!(matches!(rx_a.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));

        slot.try_send(7).unwrap();
        assert_eq!(rx_b.try_recv().unwrap(), 7);
        assert!(!slot.is_current(a));
        assert_eq!(slot.current_id(), Some(b));
    }

    #[test]
    fn stale_detach_is_ignored() {
        let slot: ConnectionSlot<u32> = ConnectionSlot::new(Side::Editor, 4);
        let (a, _rx_a, _) = slot.attach();
        let (b, _rx_b, _) = slot.attach();

        let mut fired = 0;
        assert!(!slot.detach_with(a, || fired += 1));
        assert!(slot.is_connected());
        assert!(slot.detach_with(b, || fired += 1));
        assert!(!slot.detach_with(b, || fired += 1));
        assert_eq!(fired, 1);
        assert!(!slot.is_connected());
    }

    #[test]
    fn send_errors_are_classified() {
        let slot: ConnectionSlot<u32> = ConnectionSlot::new(Side::Editor, 1);
        assert!(matches!(slot.try_send(1), Err(RelayError::NoDestination(Side::Editor))));

        let (_id, rx, _) = slot.attach();
        slot.try_send(1).unwrap();
        assert!(matches!(slot.try_send(2), Err(RelayError::QueueFull(Side::Editor))));

        drop(rx);
        assert!(matches!(slot.try_send(3), Err(RelayError::Closed(Side::Editor))));
    }
}
