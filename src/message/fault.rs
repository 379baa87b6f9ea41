use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{Receiver, Sender};

use crate::error::Error;

/// A one-shot failure signal shared by the ranks of a group, or by a
/// communicator and its transport threads. Raising it wakes every receive
/// blocked on the group's mailboxes; the first reason given is the one
/// reported from then on.
///
/// No value is ever sent on the internal channel. Raising the fault drops
/// the only sender, so every clone of the receiver observes a disconnect.
///
#[derive(Clone)]
pub struct Fault {
    reason: Arc<Mutex<Option<String>>>,
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl Fault {
    pub fn new() -> Self {
        let (trigger, signal) = crossbeam_channel::bounded(0);
        Self {
            reason: Arc::new(Mutex::new(None)),
            trigger: Arc::new(Mutex::new(Some(trigger))),
            signal,
        }
    }

    /// Record `reason` unless a fault was already raised, and wake every
    /// waiter.
    ///
    pub fn raise(&self, reason: impl Into<String>) {
        self.reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert_with(|| reason.into());
        self.trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_raised(&self) -> bool {
        self.reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Return the fault as a transport error if it was raised.
    ///
    pub fn check(&self) -> Result<(), Error> {
        match self.reason.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(reason) => Err(Error::Transport(reason.clone())),
            None => Ok(()),
        }
    }

    /// A receiver that becomes ready (disconnected) once the fault is
    /// raised. Meant for use in `crossbeam_channel::select!`.
    ///
    pub fn signal(&self) -> &Receiver<()> {
        &self.signal
    }
}

impl Default for Fault {
    fn default() -> Self {
        Self::new()
    }
}
