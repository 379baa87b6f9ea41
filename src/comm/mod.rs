//! The halo exchange protocol. A `ComputePkg` lists, for one update mode
//! and ghost width, which index-space regions every local subgrid sends to
//! and receives from each peer rank. It depends only on the grid, so it is
//! built once and cached there. A `CommPkg` binds those regions to the
//! memory layout of one vector, and a `CommHandle` is a single exchange in
//! flight.
//!

pub mod comm_pkg;
pub mod compute_pkg;
pub mod handle;

pub use comm_pkg::CommPkg;
pub use compute_pkg::ComputePkg;
pub use handle::CommHandle;

use crate::index_space::{Axis, IndexSpace};




pub const NUM_UPDATE_MODES: usize = 3;




/**
 * Names the set of ghost cells refreshed by an exchange.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpdateMode {
    /**
     * The whole ghost shell, including edges and corners.
     */
    All,
    /**
     * The six face slabs, without edges and corners.
     */
    Faces,
    /**
     * The two face slabs on the z axis.
     */
    Vertical,
}




// ============================================================================
impl UpdateMode {

    pub const MODES: [UpdateMode; NUM_UPDATE_MODES] = [
        UpdateMode::All,
        UpdateMode::Faces,
        UpdateMode::Vertical,
    ];

    pub fn index(self) -> usize {
        match self {
            UpdateMode::All => 0,
            UpdateMode::Faces => 1,
            UpdateMode::Vertical => 2,
        }
    }

    /**
     * Return the ghost region of the given interior space as a list of
     * disjoint slabs of width `num_ghost`. The order of the list is fixed,
     * and both sides of an exchange rely on it. For `All`, the z slabs span
     * the padded x-y plane and the y slabs the padded x range, so the six
     * slabs together cover the full shell exactly once.
     */
    pub fn ghost_slabs(self, interior: &IndexSpace, num_ghost: i64) -> Vec<IndexSpace> {
        let g = num_ghost;

        match self {
            UpdateMode::All => {
                let i = interior.range(Axis::I);
                let j = interior.range(Axis::J);
                let padded_x = interior.with_range(Axis::I, i.start - g .. i.end + g);
                let padded_xy = padded_x.with_range(Axis::J, j.start - g .. j.end + g);
                vec![
                    interior.lower_slab(g, Axis::I),
                    interior.upper_slab(g, Axis::I),
                    padded_x.lower_slab(g, Axis::J),
                    padded_x.upper_slab(g, Axis::J),
                    padded_xy.lower_slab(g, Axis::K),
                    padded_xy.upper_slab(g, Axis::K),
                ]
            }
            UpdateMode::Faces => vec![
                interior.lower_slab(g, Axis::I),
                interior.upper_slab(g, Axis::I),
                interior.lower_slab(g, Axis::J),
                interior.upper_slab(g, Axis::J),
                interior.lower_slab(g, Axis::K),
                interior.upper_slab(g, Axis::K),
            ],
            UpdateMode::Vertical => vec![
                interior.lower_slab(g, Axis::K),
                interior.upper_slab(g, Axis::K),
            ],
        }
    }
}
