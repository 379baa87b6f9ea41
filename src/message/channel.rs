use crossbeam_channel::Sender;

use super::comm::{Communicator, Envelope, Tag};
use super::fault::Fault;
use super::mailbox::Mailbox;
use crate::error::Error;

/// A communicator whose peers live in the same OS process, typically one per
/// thread. Every rank owns the receiving end of one unbounded channel and a
/// sender to every other rank's channel, so sends never block.
///
/// Because every rank also holds a sender to its own channel, a peer that
/// goes away never closes anyone's inbound channel. The group instead shares
/// a [Fault]; once it is raised, every blocked or later send and receive in
/// the group fails with a transport error.
///
pub struct ChannelCommunicator {
    rank: usize,
    peers: Vec<Sender<Envelope>>,
    mailbox: Mailbox,
    fault: Fault,
}

impl ChannelCommunicator {
    /// Create a fully connected group of `size` communicators, in rank
    /// order.
    ///
    pub fn world(size: usize) -> Vec<Self> {
        Self::world_with_fault(size, Fault::new())
    }

    /// Like `world`, but the group aborts when the given fault is raised.
    ///
    pub fn world_with_fault(size: usize, fault: Fault) -> Vec<Self> {
        let (sinks, sources): (Vec<_>, Vec<_>) =
            (0..size).map(|_| crossbeam_channel::unbounded()).unzip();

        sources
            .into_iter()
            .enumerate()
            .map(|(rank, source)| Self {
                rank,
                peers: sinks.clone(),
                mailbox: Mailbox::new(source, fault.clone()),
                fault: fault.clone(),
            })
            .collect()
    }
}

impl Communicator for ChannelCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn send(&self, rank: usize, tag: Tag, message: Vec<u8>) -> Result<(), Error> {
        self.fault.check()?;
        let peer = self
            .peers
            .get(rank)
            .ok_or_else(|| Error::Transport(format!("no rank {} in this world", rank)))?;
        peer.send(Envelope {
            source: self.rank,
            tag,
            payload: message,
        })
        .map_err(|_| Error::Transport(format!("rank {} has hung up", rank)))
    }

    fn recv(&self, rank: usize, tag: Tag) -> Result<Vec<u8>, Error> {
        self.mailbox.recv(rank, tag)
    }
}

#[cfg(test)]
mod test {
    use super::ChannelCommunicator;
    use crate::message::comm::{Communicator, Tag};
    use crate::message::fault::Fault;

    fn run_world<F>(size: usize, f: F)
    where
        F: Fn(&ChannelCommunicator) + Sync,
    {
        let world = ChannelCommunicator::world(size);
        std::thread::scope(|scope| {
            for comm in &world {
                let f = &f;
                scope.spawn(move || f(comm));
            }
        });
    }

    #[test]
    fn ring_exchange_works() {
        run_world(4, |comm| {
            let next = (comm.rank() + 1) % comm.size();
            let prev = (comm.rank() + comm.size() - 1) % comm.size();
            comm.send(next, Tag::new(99, 0), vec![comm.rank() as u8]).unwrap();
            assert_eq!(comm.recv(prev, Tag::new(99, 0)).unwrap(), vec![prev as u8]);
        });
    }

    #[test]
    fn broadcast_reaches_every_rank() {
        for size in 1..8 {
            run_world(size, |comm| {
                let value = if comm.rank() == 0 { Some(vec![42, 43]) } else { None };
                assert_eq!(comm.broadcast(value).unwrap(), vec![42, 43]);
            });
        }
    }

    #[test]
    fn all_reduce_sums_ranks() {
        for size in 1..8 {
            run_world(size, |comm| {
                let add = |a: Vec<u8>, b: Vec<u8>| vec![a[0] + b[0]];
                let total = comm.all_reduce(&add, vec![comm.rank() as u8]).unwrap();
                assert_eq!(total[0] as usize, size * (size - 1) / 2);
            });
        }
    }

    #[test]
    fn gather_collects_in_rank_order() {
        run_world(5, |comm| {
            let gathered = comm.gather(vec![comm.rank() as u8 * 2]).unwrap();
            if comm.rank() == 0 {
                assert_eq!(gathered.unwrap(), (0..5).map(|r| vec![r * 2]).collect::<Vec<_>>());
            } else {
                assert!(gathered.is_none());
            }
            comm.barrier().unwrap();
        });
    }

    #[test]
    fn sending_to_a_missing_rank_fails() {
        let world = ChannelCommunicator::world(1);
        assert!(world[0].send(3, Tag::new(16, 0), vec![]).is_err());
    }

    #[test]
    fn raised_fault_fails_the_whole_world() {
        let fault = Fault::new();
        let world = ChannelCommunicator::world_with_fault(3, fault.clone());

        std::thread::scope(|scope| {
            let waiters: Vec<_> = world[1..]
                .iter()
                .map(|comm| scope.spawn(move || comm.recv(0, Tag::new(50, 0))))
                .collect();
            fault.raise("rank 0 panicked");

            for waiter in waiters {
                assert!(waiter.join().unwrap().is_err());
            }
        });
        assert!(world[0].send(1, Tag::new(50, 0), vec![1]).is_err());
    }
}
