use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use log::info;

use crate::error::Error;
use crate::message::Communicator;

/// Per-process state that every distributed object needs: the communicator
/// (rank and messaging identity), high-water-mark memory accounting for the
/// field buffers allocated on this process, and the counter that numbers
/// vectors identically on every rank. One context is created per rank and
/// shared by reference counting; there are no process-wide globals.
///
pub struct Context {
    comm: Box<dyn Communicator>,
    current_bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
    vector_serial: AtomicU64,
}

impl Context {
    pub fn new(comm: Box<dyn Communicator>) -> Arc<Self> {
        Arc::new(Self {
            comm,
            current_bytes: AtomicUsize::new(0),
            peak_bytes: AtomicUsize::new(0),
            vector_serial: AtomicU64::new(0),
        })
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn size(&self) -> usize {
        self.comm.size()
    }

    pub fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    /// Return the next vector serial number. Vectors are created
    /// collectively, so every rank hands out the same numbers in the same
    /// order.
    ///
    pub fn next_vector_serial(&self) -> u64 {
        self.vector_serial.fetch_add(1, Ordering::SeqCst)
    }

    pub fn record_allocation(&self, bytes: usize) {
        let current = self.current_bytes.fetch_add(bytes, Ordering::SeqCst) + bytes;
        self.peak_bytes.fetch_max(current, Ordering::SeqCst);
    }

    pub fn record_release(&self, bytes: usize) {
        self.current_bytes.fetch_sub(bytes, Ordering::SeqCst);
    }

    pub fn current_bytes(&self) -> usize {
        self.current_bytes.load(Ordering::SeqCst)
    }

    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes.load(Ordering::SeqCst)
    }

    /// Collect the high-water mark of every rank onto rank 0, which writes
    /// one line per rank to the log and returns the marks (in bytes, rank
    /// order). Other ranks return `None`. This is a collective call.
    ///
    pub fn report_max_memory(&self) -> Result<Option<Vec<usize>>, Error> {
        let peak = (self.peak_bytes() as u64).to_le_bytes().to_vec();

        let gathered = match self.comm.gather(peak)? {
            Some(gathered) => gathered,
            None => return Ok(None),
        };

        let mut peaks = Vec::with_capacity(gathered.len());
        for (rank, bytes) in gathered.iter().enumerate() {
            let array: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                Error::Protocol(format!("memory report from rank {} is malformed", rank))
            })?;
            let peak = u64::from_le_bytes(array) as usize;
            info!(
                "Maximum memory used on process {} : {} MB",
                rank,
                peak / (1024 * 1024)
            );
            peaks.push(peak);
        }
        Ok(Some(peaks))
    }
}

#[cfg(test)]
mod test {
    use crate::launch::launch;

    #[test]
    fn high_water_mark_survives_release() {
        launch(1, |ctx| {
            ctx.record_allocation(100);
            ctx.record_allocation(50);
            ctx.record_release(120);
            ctx.record_allocation(10);
            assert_eq!(ctx.current_bytes(), 40);
            assert_eq!(ctx.peak_bytes(), 150);
        });
    }

    #[test]
    fn memory_report_gathers_every_rank() {
        let reports = launch(3, |ctx| {
            ctx.record_allocation(1024 * (ctx.rank() + 1));
            ctx.report_max_memory().unwrap()
        });
        assert_eq!(reports[0], Some(vec![1024, 2048, 3072]));
        assert!(reports[1].is_none() && reports[2].is_none());
    }

    #[test]
    fn vector_serials_count_up() {
        launch(2, |ctx| {
            assert_eq!(ctx.next_vector_serial(), 0);
            assert_eq!(ctx.next_vector_serial(), 1);
        });
    }
}
