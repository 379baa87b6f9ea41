use serde::{Deserialize, Serialize};

use crate::index_space::IndexSpace;

/**
 * The global physical domain: the lower corner of the box, the base cell
 * spacing, and the number of base cells on each axis. Fixed for a run and
 * shared read-only by every process.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Background {
    pub origin: (f64, f64, f64),
    pub spacing: (f64, f64, f64),
    pub extent: (i64, i64, i64),
}




// ============================================================================
impl Default for Background {
    fn default() -> Self {
        Self {
            origin: (0.0, 0.0, 0.0),
            spacing: (1.0, 1.0, 1.0),
            extent: (1, 1, 1),
        }
    }
}




// ============================================================================
impl Background {
    /**
     * Return the base-level index space of the domain.
     */
    pub fn index_space(&self) -> IndexSpace {
        IndexSpace::from_origin((0, 0, 0), self.extent)
    }

    /**
     * Return the number of base cells in the domain.
     */
    pub fn num_cells(&self) -> usize {
        self.index_space().len()
    }

    /**
     * Cell spacing at refinement level `r` on the x axis.
     */
    pub fn dx(&self, r: u32) -> f64 {
        self.spacing.0 / (1u64 << r) as f64
    }

    /**
     * Cell spacing at refinement level `r` on the y axis.
     */
    pub fn dy(&self, r: u32) -> f64 {
        self.spacing.1 / (1u64 << r) as f64
    }

    /**
     * Cell spacing at refinement level `r` on the z axis.
     */
    pub fn dz(&self, r: u32) -> f64 {
        self.spacing.2 / (1u64 << r) as f64
    }

    /**
     * Return the physical coordinates of the center of a cell at the given
     * refinement levels.
     */
    pub fn cell_center(&self, index: (i64, i64, i64), levels: (u32, u32, u32)) -> (f64, f64, f64) {
        let (dx, dy, dz) = (self.dx(levels.0), self.dy(levels.1), self.dz(levels.2));
        (
            self.origin.0 + dx * (index.0 as f64 + 0.5),
            self.origin.1 + dy * (index.1 as f64 + 0.5),
            self.origin.2 + dz * (index.2 as f64 + 0.5),
        )
    }
}
