//! Distributed fields. A `Vector` stores `num_components` values per cell
//! over every local subgrid of a `Grid`, each padded with `num_ghost` ghost
//! cells, in one contiguous arena. The ghost cells are refreshed from the
//! neighboring subgrids by the halo exchange in `comm`.
//!

mod subvector;

pub use subvector::Subvector;

use std::sync::Arc;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::box_loop::BoxLoop;
use crate::comm::{CommHandle, CommPkg, UpdateMode, NUM_UPDATE_MODES};
use crate::error::Error;
use crate::geometry::Grid;
use crate::index_space::Index;
use crate::message::Tag;




/**
 * A field distributed over the subgrids of a grid. Dropping the vector
 * releases its storage and exchange plans.
 */
pub struct Vector {
    grid: Arc<Grid>,
    num_components: usize,
    num_ghost: i64,
    serial: u64,
    data: Vec<f64>,
    subvectors: Vec<Subvector>,
    comm_pkgs: Vec<CommPkg>,
    sequence: [u64; NUM_UPDATE_MODES],
}




// ============================================================================
impl Vector {

    /**
     * Allocate a zero-filled vector over the local subgrids of `grid`. This
     * is a collective operation: every rank must create its vectors in the
     * same order, since the order determines the tags their exchanges use.
     */
    pub fn new(grid: &Arc<Grid>, num_components: usize, num_ghost: i64) -> Result<Self, Error> {
        assert!(num_components > 0, "a vector needs at least one component");
        assert!(num_ghost >= 0, "ghost width must be non-negative");

        let mut start = 0;
        let subvectors: Vec<_> = grid
            .local_subgrids()
            .map(|subgrid| {
                let s = Subvector::new(subgrid.clone(), num_ghost, num_components, start);
                start += s.len();
                s
            })
            .collect();

        let bytes = start * std::mem::size_of::<f64>();
        let mut data = Vec::new();
        data.try_reserve_exact(start).map_err(|_| Error::Allocation { bytes })?;
        data.resize(start, 0.0);

        let context = grid.context();
        context.record_allocation(bytes);

        let serial = context.next_vector_serial();
        let comm_pkgs = compile_comm_pkgs(grid, &subvectors, num_components, num_ghost);

        debug!(
            "vector {} on rank {}: {} subvectors, {} bytes",
            serial,
            context.rank(),
            subvectors.len(),
            bytes
        );

        Ok(Self {
            grid: grid.clone(),
            num_components,
            num_ghost,
            serial,
            data,
            subvectors,
            comm_pkgs,
            sequence: [0; NUM_UPDATE_MODES],
        })
    }

    /**
     * Release the vector. Equivalent to dropping it.
     */
    pub fn destroy(self) {}

    pub fn grid(&self) -> &Arc<Grid> {
        &self.grid
    }

    pub fn num_components(&self) -> usize {
        self.num_components
    }

    pub fn num_ghost(&self) -> i64 {
        self.num_ghost
    }

    /**
     * The collective serial number of this vector, equal on every rank.
     */
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /**
     * The number of cells in the whole domain.
     */
    pub fn size(&self) -> usize {
        self.grid.size()
    }

    /**
     * The number of interior cells stored on this rank.
     */
    pub fn local_size(&self) -> usize {
        self.subvectors.iter().map(|s| s.interior().len()).sum()
    }

    /**
     * The number of values in the arena, ghosts and components included.
     */
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn num_subvectors(&self) -> usize {
        self.subvectors.len()
    }

    pub fn subvector(&self, n: usize) -> &Subvector {
        &self.subvectors[n]
    }

    pub fn subvectors(&self) -> &[Subvector] {
        &self.subvectors
    }

    pub fn subvector_data(&self, n: usize) -> &[f64] {
        &self.data[self.subvectors[n].range()]
    }

    pub fn subvector_data_mut(&mut self, n: usize) -> &mut [f64] {
        let range = self.subvectors[n].range();
        &mut self.data[range]
    }

    /**
     * Return every subvector together with its own mutable slice of the
     * arena.
     */
    pub fn subvectors_mut(&mut self) -> Vec<(&Subvector, &mut [f64])> {
        let mut rest = self.data.as_mut_slice();
        let mut result = Vec::with_capacity(self.subvectors.len());

        for s in &self.subvectors {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(s.len());
            result.push((s, head));
            rest = tail;
        }
        result
    }

    /**
     * Apply `f` to every subvector in parallel.
     */
    pub fn par_for_each_subvector_mut<F>(&mut self, f: F)
    where
        F: Fn(&Subvector, &mut [f64]) + Sync + Send,
    {
        self.subvectors_mut()
            .into_par_iter()
            .for_each(|(s, data)| f(s, data))
    }

    /**
     * Look up one component of the value stored for a cell. Cells owned by
     * a local subgrid are read from it; otherwise the first local ghost
     * copy is used. Returns `None` if no subvector stores the cell.
     */
    pub fn value(&self, index: Index, component: usize) -> Option<f64> {
        assert!(component < self.num_components, "component {} out of range", component);

        let owner = self
            .subvectors
            .iter()
            .find(|s| s.interior().contains(index))
            .or_else(|| self.subvectors.iter().find(|s| s.data_space().contains(index)))?;

        Some(self.data[owner.range().start + owner.view().offset(index) + component])
    }

    /**
     * Set every value, ghost cells included.
     */
    pub fn fill_constant(&mut self, value: f64) {
        self.par_for_each_subvector_mut(|_, data| data.fill(value))
    }

    /**
     * Set every interior value, leaving the ghost cells untouched.
     */
    pub fn fill_constant_interior(&mut self, value: f64) {
        self.par_for_each_subvector_mut(|s, data| {
            BoxLoop::new(s.interior().clone()).for_each([s.view()], |_, [n]| {
                data[n..n + s.view().components()].fill(value)
            })
        })
    }

    /**
     * Set every component of interior cell `(i, j, k)` to
     * `base + slope * (i + j + k)`, using global indexes. Ghost cells are
     * untouched.
     */
    pub fn fill_linear_ramp(&mut self, base: f64, slope: f64) {
        self.par_for_each_subvector_mut(|s, data| {
            BoxLoop::new(s.interior().clone()).for_each([s.view()], |(i, j, k), [n]| {
                data[n..n + s.view().components()].fill(base + slope * (i + j + k) as f64)
            })
        })
    }

    /**
     * Set every interior value to a pseudo-random number in `[0, 1)`. Each
     * rank draws from one stream seeded with `seed`, visiting its subgrids
     * in order and the cells of each in box order. Ghost cells are
     * untouched.
     */
    pub fn fill_random(&mut self, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);

        for (s, data) in self.subvectors_mut() {
            BoxLoop::new(s.interior().clone()).for_each([s.view()], |_, [n]| {
                for x in &mut data[n..n + s.view().components()] {
                    *x = rng.gen::<f64>()
                }
            })
        }
    }

    /**
     * Swap in a new arena of the same size, returning the old one. The
     * exchange plans are rebuilt against the new buffer.
     */
    pub fn replace_data(&mut self, data: Vec<f64>) -> Result<Vec<f64>, Error> {
        if data.len() != self.data.len() {
            return Err(Error::Protocol(format!(
                "replacement buffer has {} values, vector needs {}",
                data.len(),
                self.data.len()
            )));
        }
        let old = std::mem::replace(&mut self.data, data);
        self.comm_pkgs = compile_comm_pkgs(&self.grid, &self.subvectors, self.num_components, self.num_ghost);
        Ok(old)
    }

    /**
     * Start a halo exchange: pack and send every outgoing region for the
     * given mode, without waiting for any peer. The returned handle borrows
     * the vector until it is completed.
     */
    pub fn post_update(&mut self, mode: UpdateMode) -> Result<CommHandle<'_>, Error> {
        let channel = Tag::FIRST_USER_CHANNEL + self.serial * NUM_UPDATE_MODES as u64 + mode.index() as u64;
        let tag = Tag::new(channel, self.sequence[mode.index()]);
        self.sequence[mode.index()] += 1;

        self.comm_pkgs[mode.index()].post(&self.data, self.grid.context().comm(), tag)?;
        Ok(CommHandle::new(self, mode, tag))
    }

    /**
     * Run a complete halo exchange.
     */
    pub fn update(&mut self, mode: UpdateMode) -> Result<(), Error> {
        self.post_update(mode)?.complete()
    }

    pub(crate) fn finish_update(&mut self, mode: UpdateMode, tag: Tag) -> Result<(), Error> {
        let comm = self.grid.context().comm();
        self.comm_pkgs[mode.index()].complete(&mut self.data, comm, tag)
    }
}




// ============================================================================
impl Drop for Vector {
    fn drop(&mut self) {
        self.grid
            .context()
            .record_release(self.data.len() * std::mem::size_of::<f64>());
    }
}




// ============================================================================
fn compile_comm_pkgs(grid: &Grid, subvectors: &[Subvector], num_components: usize, num_ghost: i64) -> Vec<CommPkg> {
    UpdateMode::MODES
        .iter()
        .map(|&mode| CommPkg::new(&grid.compute_pkg(mode, num_ghost), subvectors, num_components))
        .collect()
}
