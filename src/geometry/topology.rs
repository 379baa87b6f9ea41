use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::geometry::subgrid::{Subgrid, SubgridArray};

/**
 * The factorization of the process count into `p x q x r` processes along
 * the x, y, and z axes. Ranks are laid out with x increasing fastest.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub p: usize,
    pub q: usize,
    pub r: usize,
}




// ============================================================================
impl Default for Topology {
    fn default() -> Self {
        Self { p: 1, q: 1, r: 1 }
    }
}




// ============================================================================
impl Topology {
    pub fn new(p: usize, q: usize, r: usize) -> Self {
        Self { p, q, r }
    }

    pub fn num_procs(&self) -> usize {
        self.p * self.q * self.r
    }

    /**
     * Check that every factor is positive and their product is the number
     * of processes actually running.
     */
    pub fn validate(&self, size: usize) -> Result<(), Error> {
        if self.p == 0 || self.q == 0 || self.r == 0 || self.num_procs() != size {
            return Err(Error::InvalidTopology {
                p: self.p,
                q: self.q,
                r: self.r,
                size,
            });
        }
        Ok(())
    }

    /**
     * Return the process coordinates of a rank.
     */
    pub fn coords(&self, rank: usize) -> (usize, usize, usize) {
        (rank % self.p, (rank / self.p) % self.q, rank / (self.p * self.q))
    }

    /**
     * Return the rank at the given process coordinates.
     */
    pub fn rank(&self, coords: (usize, usize, usize)) -> usize {
        coords.0 + self.p * (coords.1 + self.q * coords.2)
    }

    /**
     * Decompose the index space `[0, extent)` into subgrids. Every process
     * gets the block of cells given by [`split`] along each axis, which is
     * further split into `blocks` subgrids. Subgrids are ordered by rank,
     * then by block with x increasing fastest.
     */
    pub fn decompose(
        &self,
        extent: (i64, i64, i64),
        blocks: (usize, usize, usize),
        levels: (u32, u32, u32),
    ) -> Result<SubgridArray, Error> {
        check_axis('x', extent.0, self.p, blocks.0)?;
        check_axis('y', extent.1, self.q, blocks.1)?;
        check_axis('z', extent.2, self.r, blocks.2)?;

        let mut subgrids = SubgridArray::new();

        for rank in 0..self.num_procs() {
            let (pi, pj, pk) = self.coords(rank);
            let (x0, nx) = split(extent.0, self.p, pi);
            let (y0, ny) = split(extent.1, self.q, pj);
            let (z0, nz) = split(extent.2, self.r, pk);

            for bk in 0..blocks.2 {
                for bj in 0..blocks.1 {
                    for bi in 0..blocks.0 {
                        let (ix, lx) = split(nx, blocks.0, bi);
                        let (iy, ly) = split(ny, blocks.1, bj);
                        let (iz, lz) = split(nz, blocks.2, bk);
                        subgrids.push(Subgrid::new(
                            (x0 + ix, y0 + iy, z0 + iz),
                            (lx, ly, lz),
                            levels,
                            rank,
                        ));
                    }
                }
            }
        }
        Ok(subgrids)
    }
}

/**
 * Split `n` cells among `parts` owners as evenly as possible: every owner
 * gets `n / parts` cells and the first `n % parts` owners get one more.
 * Returns the start and count of the given owner's share.
 */
pub fn split(n: i64, parts: usize, which: usize) -> (i64, i64) {
    let parts = parts as i64;
    let which = which as i64;
    let base = n / parts;
    let rem = n % parts;
    let start = which * base + which.min(rem);
    let count = base + if which < rem { 1 } else { 0 };
    (start, count)
}

fn check_axis(axis: char, n: i64, procs: usize, blocks: usize) -> Result<(), Error> {
    if blocks == 0 {
        return Err(Error::InvalidDecomposition(format!(
            "zero blocks requested on axis {}",
            axis
        )));
    }
    if n < (procs * blocks) as i64 {
        return Err(Error::InvalidDecomposition(format!(
            "axis {} has {} cells, too few for {} processes with {} blocks each",
            axis, n, procs, blocks
        )));
    }
    Ok(())
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::{split, Topology};

    #[test]
    fn topology_must_match_process_count() {
        assert!(Topology::new(2, 2, 1).validate(4).is_ok());
        assert!(Topology::new(2, 2, 1).validate(3).is_err());
        assert!(Topology::new(0, 2, 1).validate(0).is_err());
    }

    #[test]
    fn rank_and_coords_are_inverse() {
        let t = Topology::new(3, 2, 4);
        for rank in 0..t.num_procs() {
            assert_eq!(t.rank(t.coords(rank)), rank);
        }
        assert_eq!(t.coords(4), (1, 1, 0));
    }

    #[test]
    fn split_distributes_the_remainder_first() {
        let shares: Vec<_> = (0..3).map(|w| split(10, 3, w)).collect();
        assert_eq!(shares, vec![(0, 4), (4, 3), (7, 3)]);
    }

    #[test]
    fn decomposition_orders_by_rank_then_block() {
        let t = Topology::new(2, 1, 1);
        let subgrids = t.decompose((8, 2, 2), (2, 1, 1), (0, 0, 0)).unwrap();
        let origins: Vec<_> = subgrids.iter().map(|s| (s.origin().0, s.process())).collect();
        assert_eq!(origins, vec![(0, 0), (2, 0), (4, 1), (6, 1)]);
    }

    #[test]
    fn too_many_processes_is_an_error() {
        let t = Topology::new(5, 1, 1);
        assert!(t.decompose((4, 4, 4), (1, 1, 1), (0, 0, 0)).is_err());
    }
}
