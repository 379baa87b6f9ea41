use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::geometry::{exact_log2, Background, Topology};




/**
 * Everything needed to build a `Grid`: the physical domain, the process
 * topology, the number of subgrids per process on each axis, and the
 * refinement ratio on each axis. Configurations are plain data and may be
 * read from or written to CBOR files.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub background: Background,
    pub topology: Topology,
    pub blocks: (usize, usize, usize),
    pub refinement: (u32, u32, u32),
}




// ============================================================================
impl Default for Config {
    fn default() -> Self {
        Self {
            background: Background::default(),
            topology: Topology::default(),
            blocks: (1, 1, 1),
            refinement: (1, 1, 1),
        }
    }
}




// ============================================================================
impl Config {

    /**
     * Return the refinement levels, `log2` of the refinement ratio on each
     * axis. Fails if any ratio is not a power of two.
     */
    pub fn levels(&self) -> Result<(u32, u32, u32), Error> {
        let level = |axis, ratio: u32| {
            exact_log2(ratio as u64).ok_or(Error::InvalidRefinement { axis, ratio })
        };
        Ok((
            level('x', self.refinement.0)?,
            level('y', self.refinement.1)?,
            level('z', self.refinement.2)?,
        ))
    }

    /**
     * Return the number of cells on each axis of the decomposed index space:
     * the background extent times the refinement ratio.
     */
    pub fn refined_extent(&self) -> (i64, i64, i64) {
        let (nx, ny, nz) = self.background.extent;
        let (rx, ry, rz) = self.refinement;
        (nx * rx as i64, ny * ry as i64, nz * rz as i64)
    }

    /**
     * Apply every configuration check that can be made before a grid is
     * built: the topology matches the process count, refinement ratios are
     * powers of two, the extent is non-negative, and no axis is split into
     * more parts than it has cells.
     */
    pub fn validate(&self, size: usize) -> Result<(), Error> {
        self.topology.validate(size)?;
        self.levels()?;

        let (nx, ny, nz) = self.background.extent;

        if nx < 0 || ny < 0 || nz < 0 {
            return Err(Error::InvalidDecomposition(format!(
                "background extent ({}, {}, {}) is negative", nx, ny, nz)));
        }

        let (nx, ny, nz) = self.refined_extent();
        let (bx, by, bz) = self.blocks;
        let Topology { p, q, r } = self.topology;

        for (axis, n, parts) in [('x', nx, p * bx), ('y', ny, q * by), ('z', nz, r * bz)] {
            if parts == 0 || n < parts as i64 {
                return Err(Error::InvalidDecomposition(format!(
                    "axis {} has {} cells and cannot be split into {} parts", axis, n, parts)));
            }
        }
        Ok(())
    }

    /**
     * Read a configuration from a CBOR stream.
     */
    pub fn read_cbor<R: Read>(reader: R) -> Result<Self, Error> {
        ciborium::de::from_reader(reader).map_err(|e| Error::Codec(format!("{:?}", e)))
    }

    /**
     * Write this configuration to a CBOR stream.
     */
    pub fn write_cbor<W: Write>(&self, writer: W) -> Result<(), Error> {
        ciborium::ser::into_writer(self, writer).map_err(|e| Error::Codec(format!("{:?}", e)))
    }
}
