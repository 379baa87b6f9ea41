use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use crossbeam_channel::{select, Receiver};
use log::debug;

use super::comm::{Envelope, Tag};
use super::fault::Fault;
use crate::error::Error;

/// Matches incoming envelopes against `(source, tag)` receive requests.
/// Envelopes that arrive before anyone asks for them are kept, in arrival
/// order per key, until a matching receive is made. A receive that is
/// blocked on the inbound channel returns a transport error as soon as the
/// fault is raised.
///
/// Concurrent receives on one mailbox are served one at a time; the
/// buffered messages stay readable while a receive is blocked.
pub struct Mailbox {
    inbound: Receiver<Envelope>,
    fault: Fault,
    receiving: Mutex<()>,
    pending: Mutex<HashMap<(usize, Tag), VecDeque<Vec<u8>>>>,
}

impl Mailbox {
    pub fn new(inbound: Receiver<Envelope>, fault: Fault) -> Self {
        Self {
            inbound,
            fault,
            receiving: Mutex::new(()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Block until the next message from `source` with the given tag is
    /// available, and return its payload.
    pub fn recv(&self, source: usize, tag: Tag) -> Result<Vec<u8>, Error> {
        let _receiving = self.receiving.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(payload) = self.take_pending(source, tag) {
            return Ok(payload);
        }

        loop {
            self.fault.check()?;

            let env = select! {
                recv(self.inbound) -> env => env.map_err(|_| {
                    Error::Transport(format!(
                        "inbound channel closed while waiting on rank {} for {:?}",
                        source, tag
                    ))
                })?,
                recv(self.fault.signal()) -> _ => {
                    self.fault.check()?;
                    continue;
                }
            };

            if env.source == source && env.tag == tag {
                return Ok(env.payload);
            }
            debug!(
                "message from {} {:?} arrived early, buffering",
                env.source, env.tag
            );
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry((env.source, env.tag))
                .or_insert_with(VecDeque::new)
                .push_back(env.payload)
        }
    }

    fn take_pending(&self, source: usize, tag: Tag) -> Option<Vec<u8>> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let queue = pending.get_mut(&(source, tag))?;
        let payload = queue.pop_front();

        if queue.is_empty() {
            pending.remove(&(source, tag));
        }
        payload
    }

    /// Return the number of buffered messages that nobody has asked for yet.
    pub fn pending_len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|q| q.len())
            .sum()
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::Mailbox;
    use crate::message::comm::{Envelope, Tag};
    use crate::message::fault::Fault;

    fn envelope(source: usize, channel: u64, payload: u8) -> Envelope {
        Envelope {
            source,
            tag: Tag::new(channel, 0),
            payload: vec![payload],
        }
    }

    #[test]
    fn out_of_order_messages_are_matched_by_source_and_tag() {
        let (sink, source) = crossbeam_channel::unbounded();
        let mailbox = Mailbox::new(source, Fault::new());

        sink.send(envelope(1, 20, 1)).unwrap();
        sink.send(envelope(2, 20, 2)).unwrap();
        sink.send(envelope(1, 21, 3)).unwrap();
        sink.send(envelope(1, 20, 4)).unwrap();

        assert_eq!(mailbox.recv(1, Tag::new(21, 0)).unwrap(), vec![3]);
        assert_eq!(mailbox.pending_len(), 2);
        assert_eq!(mailbox.recv(2, Tag::new(20, 0)).unwrap(), vec![2]);
        assert_eq!(mailbox.recv(1, Tag::new(20, 0)).unwrap(), vec![1]);
        assert_eq!(mailbox.recv(1, Tag::new(20, 0)).unwrap(), vec![4]);
        assert_eq!(mailbox.pending_len(), 0);
    }

    #[test]
    fn closed_channel_is_a_transport_error() {
        let (sink, source) = crossbeam_channel::unbounded::<Envelope>();
        let mailbox = Mailbox::new(source, Fault::new());
        drop(sink);
        assert!(mailbox.recv(0, Tag::BROADCAST).is_err());
    }

    #[test]
    fn buffered_messages_can_be_counted_while_a_receive_blocks() {
        let (sink, source) = crossbeam_channel::unbounded();
        let mailbox = Mailbox::new(source, Fault::new());

        std::thread::scope(|scope| {
            let waiter = scope.spawn(|| mailbox.recv(3, Tag::new(20, 0)));
            sink.send(envelope(1, 20, 7)).unwrap();
            std::thread::sleep(Duration::from_millis(50));
            assert_eq!(mailbox.pending_len(), 1);
            sink.send(envelope(3, 20, 8)).unwrap();
            assert_eq!(waiter.join().unwrap().unwrap(), vec![8]);
        });
        assert_eq!(mailbox.recv(1, Tag::new(20, 0)).unwrap(), vec![7]);
    }

    #[test]
    fn raising_the_fault_wakes_a_blocked_receive() {
        let (_sink, source) = crossbeam_channel::unbounded::<Envelope>();
        let fault = Fault::new();
        let mailbox = Mailbox::new(source, fault.clone());

        std::thread::scope(|scope| {
            let waiter = scope.spawn(|| mailbox.recv(0, Tag::new(20, 0)));
            std::thread::sleep(Duration::from_millis(20));
            fault.raise("peer went away");
            assert!(waiter.join().unwrap().is_err());
        });
    }
}
