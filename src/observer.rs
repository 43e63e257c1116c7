// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Best-effort delivery to at most one attached observer
//!
//! Messages are never queued for later or retried. A newly attached observer
//! gets only what is emitted after it attached and should ask for a snapshot.

use std::sync::Mutex;
use tokio::sync::mpsc;

/// Outcome of a single emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Dropped,
}

const DEFAULT_CAPACITY: usize = 64;

/// Single observer slot; attaching replaces the previous observer
pub struct ObserverSlot<T> {
    sender: Mutex<Option<mpsc::Sender<T>>>,
}

impl<T> Default for ObserverSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ObserverSlot<T> {
    pub fn new() -> Self {
        Self {
            sender: Mutex::new(None),
        }
    }

    /// Attach a new observer, detaching any previous one
    pub fn attach(&self) -> mpsc::Receiver<T> {
        self.attach_with_capacity(DEFAULT_CAPACITY)
    }

    pub fn attach_with_capacity(&self, capacity: usize) -> mpsc::Receiver<T> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        *self.slot() = Some(tx);
        rx
    }

    pub fn detach(&self) {
        *self.slot() = None;
    }

    pub fn is_attached(&self) -> bool {
        self.slot().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Try to hand the message over without waiting
    pub fn emit(&self, message: T) -> Delivery {
        let mut slot = self.slot();
        let Some(tx) = slot.as_ref() else {
            return Delivery::Dropped;
        };
        match tx.try_send(message) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Dropped,
            Err(mpsc::error::TrySendError::Closed(_)) => {
                *slot = None;
                Delivery::Dropped
            }
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<mpsc::Sender<T>>> {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_observer_is_dropped() {
        let slot: ObserverSlot<u32> = ObserverSlot::new();
        assert_eq!(slot.emit(1), Delivery::Dropped);
        assert!(!slot.is_attached());
    }

    #[test]
    fn attached_observer_receives_messages() {
        let slot = ObserverSlot::new();
        let mut rx = slot.attach();
        assert_eq!(slot.emit("hello"), Delivery::Delivered);
        assert_eq!(tokio_test::block_on(rx.recv()), Some("hello"));
    }

    #[test]
    fn full_or_closed_channels_drop() {
        let slot = ObserverSlot::new();
        let rx = slot.attach_with_capacity(1);
        assert_eq!(slot.emit(1), Delivery::Delivered);
        assert_eq!(slot.emit(2), Delivery::Dropped);

        drop(rx);
        assert_eq!(slot.emit(3), Delivery::Dropped);
        assert!(!slot.is_attached());
    }

    #[test]
    fn reattach_replaces_previous_observer() {
        let slot = ObserverSlot::new();
        let mut first = slot.attach();
        let mut second = slot.attach();
        slot.emit(7);
        assert!(first.try_recv().is_err());
        assert_eq!(second.try_recv().ok(), Some(7));
    }
}
