use core_affinity::{get_core_ids, set_for_current};
use log::{debug, error};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crate::context::Context;
use crate::message::{ChannelCommunicator, Fault};

/// Raises the group's fault if the rank's thread unwinds, and remembers
/// which rank unwound first.
struct PanicGuard<'a> {
    rank: usize,
    fault: &'a Fault,
    first: &'a Mutex<Option<usize>>,
}

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("rank {} panicked, aborting the other ranks", self.rank);
            self.first
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get_or_insert(self.rank);
            self.fault.raise(format!("rank {} panicked", self.rank));
        }
    }
}

/// Run `f` once per rank of an in-process group of `num_ranks` ranks, each
/// on its own OS thread. The ranks are connected by a channel communicator,
/// so they may create grids, vectors, and exchange halos exactly as separate
/// processes would. Threads are pinned round-robin to the available cores
/// when the platform reports them. Returns the results in rank order.
///
/// A panic on any rank makes every receive in the group fail with a
/// transport error, so ranks waiting on the failed one are released. Once
/// all ranks have finished, the panic of the first rank to fail is re-raised
/// on the calling thread.
///
pub fn launch<F, T>(num_ranks: usize, f: F) -> Vec<T>
where
    F: Fn(Arc<Context>) -> T + Sync,
    T: Send,
{
    let core_ids = get_core_ids().unwrap_or_default();
    let fault = Fault::new();
    let first = Mutex::new(None);
    let world = ChannelCommunicator::world_with_fault(num_ranks, fault.clone());

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = world
            .into_iter()
            .enumerate()
            .map(|(rank, comm)| {
                let core_id = core_ids.get(rank % core_ids.len().max(1)).cloned();
                let (f, fault, first) = (&f, &fault, &first);
                scope.spawn(move || {
                    let _guard = PanicGuard { rank, fault, first };

                    if let Some(core_id) = core_id {
                        set_for_current(core_id);
                    }
                    debug!("rank {} started", rank);
                    f(Context::new(Box::new(comm)))
                })
            })
            .collect();

        handles.into_iter().map(|handle| handle.join()).collect()
    });

    let first = first.into_inner().unwrap_or_else(PoisonError::into_inner);
    let mut values = Vec::with_capacity(num_ranks);
    let mut panics = Vec::new();

    for (rank, result) in results.into_iter().enumerate() {
        match result {
            Ok(value) => values.push(value),
            Err(panic) => panics.push((rank, panic)),
        }
    }
    if let Some(index) = panics.iter().position(|(rank, _)| Some(*rank) == first) {
        std::panic::resume_unwind(panics.swap_remove(index).1)
    }
    if let Some((_, panic)) = panics.into_iter().next() {
        std::panic::resume_unwind(panic)
    }
    values
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::launch;
    use crate::message::Tag;

    #[test]
    fn every_rank_runs_once_and_results_are_in_rank_order() {
        let ranks = launch(6, |ctx| (ctx.rank(), ctx.size()));
        assert_eq!(ranks, (0..6).map(|r| (r, 6)).collect::<Vec<_>>());
    }

    #[test]
    fn ranks_can_talk_to_each_other() {
        let sums = launch(4, |ctx| {
            let add = |a: Vec<u8>, b: Vec<u8>| vec![a[0] + b[0]];
            ctx.comm().all_reduce(&add, vec![1]).unwrap()[0]
        });
        assert_eq!(sums, vec![4; 4]);
    }

    #[test]
    fn a_panic_releases_waiting_ranks_and_is_raised() {
        let (sink, source) = crossbeam_channel::bounded(1);

        std::thread::spawn(move || {
            let result = std::panic::catch_unwind(|| {
                launch(3, |ctx| {
                    if ctx.rank() == 1 {
                        panic!("rank 1 failed")
                    }
                    ctx.comm().recv(1, Tag::new(40, 0)).map(|_| ())
                })
            });
            let message = result
                .err()
                .and_then(|panic| panic.downcast_ref::<&str>().map(|s| s.to_string()));
            sink.send(message).ok();
        });

        let message = source.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(message.as_deref(), Some("rank 1 failed"));
    }

    #[test]
    fn the_first_panic_is_raised_when_waiters_panic_too() {
        let result = std::panic::catch_unwind(|| {
            launch(2, |ctx| {
                if ctx.rank() == 1 {
                    panic!("rank 1 failed")
                }
                ctx.comm().recv(1, Tag::new(41, 0)).unwrap();
            })
        });
        let panic = result.unwrap_err();
        assert_eq!(panic.downcast_ref::<&str>(), Some(&"rank 1 failed"));
    }
}
