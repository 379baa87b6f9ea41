use serde::{Deserialize, Serialize};

use super::util;
use crate::error::Error;

/// Identifies a stream of messages between two peers. Messages with equal
/// source and tag are delivered in the order they were sent.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub channel: u64,
    pub sequence: u64,
}

impl Tag {
    pub const BROADCAST: Tag = Tag::reserved(0);
    pub const REDUCE: Tag = Tag::reserved(1);
    pub const GATHER: Tag = Tag::reserved(2);
    pub const BARRIER: Tag = Tag::reserved(3);

    /// Channels below this value are reserved for collective operations.
    pub const FIRST_USER_CHANNEL: u64 = 16;

    const fn reserved(channel: u64) -> Self {
        Self {
            channel,
            sequence: 0,
        }
    }

    pub fn new(channel: u64, sequence: u64) -> Self {
        Self { channel, sequence }
    }
}

/// A message in flight: the payload and where it came from.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub source: usize,
    pub tag: Tag,
    pub payload: Vec<u8>,
}

/// Interface for a group of processes that can exchange messages over a
/// network. The underlying transport can in principle be TCP, in-process
/// channels, or a higher level abstraction like MPI.
///
pub trait Communicator: Send + Sync {
    /// Must be implemented to return the rank of this process within the
    /// communicator.
    fn rank(&self) -> usize;

    /// Must be implemented to return the number of peers processes in this
    /// communicator.
    fn size(&self) -> usize;

    /// Must be implemented to send a message to a peer. This method must
    /// return immediately, in other words it is not allowed to block until a
    /// matching receive is posted. Sending to oneself is allowed.
    fn send(&self, rank: usize, tag: Tag, message: Vec<u8>) -> Result<(), Error>;

    /// Must be implemented to receive the next message with the given tag
    /// from the given peer. This method blocks until that message has
    /// arrived; messages from other peers or with other tags that arrive in
    /// the meantime are kept for later receives.
    fn recv(&self, rank: usize, tag: Tag) -> Result<Vec<u8>, Error>;

    /// Implements a binomial tree broadcast from the root node. The message
    /// buffer must be `Some` if this is the root node, and it must be `None`
    /// otherwise.
    ///
    fn broadcast(&self, value: Option<Vec<u8>>) -> Result<Vec<u8>, Error> {
        let r = self.rank();
        let p = self.size();

        let value = match (value, r) {
            (Some(value), _) => value,
            (None, 0) => {
                return Err(Error::Protocol("broadcast root has no value".to_string()))
            }
            (None, r) => self.recv(r & (r - 1), Tag::BROADCAST)?,
        };
        for level in (0..util::ceil_log2(p)).rev() {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 && r + one < p {
                self.send(r + one, Tag::BROADCAST, value.clone())?
            }
        }
        Ok(value)
    }

    /// Implements a binomial tree reduce. All ranks return `None` except for
    /// the root. The operator must be associative and commutative.
    ///
    fn reduce(
        &self,
        f: &dyn Fn(Vec<u8>, Vec<u8>) -> Vec<u8>,
        mut value: Vec<u8>,
    ) -> Result<Option<Vec<u8>>, Error> {
        let r = self.rank();
        let p = self.size();

        for level in 0..util::ceil_log2(p) {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 {
                if r + one < p {
                    value = f(value, self.recv(r + one, Tag::REDUCE)?)
                }
            } else {
                self.send(r - one, Tag::REDUCE, value)?;
                return Ok(None);
            }
        }
        Ok(Some(value))
    }

    /// Implements an all-reduce (symmetric fold) operation over a commutative
    /// binary operator.
    ///
    fn all_reduce(
        &self,
        f: &dyn Fn(Vec<u8>, Vec<u8>) -> Vec<u8>,
        value: Vec<u8>,
    ) -> Result<Vec<u8>, Error> {
        let reduced = self.reduce(f, value)?;
        self.broadcast(reduced)
    }

    /// Collect one message from every rank on the root, in rank order. All
    /// other ranks return `None`.
    ///
    fn gather(&self, value: Vec<u8>) -> Result<Option<Vec<Vec<u8>>>, Error> {
        if self.rank() == 0 {
            let mut result = vec![value];
            for peer in 1..self.size() {
                result.push(self.recv(peer, Tag::GATHER)?);
            }
            Ok(Some(result))
        } else {
            self.send(0, Tag::GATHER, value)?;
            Ok(None)
        }
    }

    /// Block until every rank has entered the barrier.
    ///
    fn barrier(&self) -> Result<(), Error> {
        self.reduce(&|a, _| a, Vec::new())?;
        if self.rank() == 0 {
            for peer in 1..self.size() {
                self.send(peer, Tag::BARRIER, Vec::new())?;
            }
        } else {
            self.recv(0, Tag::BARRIER)?;
        }
        Ok(())
    }
}
