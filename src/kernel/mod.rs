//! Numerical kernels which consume the grid, vector, and exchange API. A
//! kernel is configured from a `KernelConfig` once it is known which grid it
//! will run on, sets up its per-instance state, runs any number of steps,
//! and releases that state again. Dropping the boxed kernel frees its
//! configuration.
//!

mod constant;
mod real_space_z;

pub use constant::ConstantField;
pub use real_space_z::RealSpaceZ;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::geometry::Grid;
use crate::mask::GeomSolid;
use crate::vector::Vector;




/**
 * The problem description shared by kernels: a vertical cell-size
 * multiplier field and the solid marking the active domain.
 */
pub struct ProblemData {
    pub z_mult: Vector,
    pub domain: Box<dyn GeomSolid + Send + Sync>,
}




/**
 * The lifecycle every kernel implements.
 */
pub trait Kernel: Send {

    fn name(&self) -> &'static str;

    /**
     * Allocate the per-instance state needed to run on `grid`.
     */
    fn init_instance(&mut self, grid: &Arc<Grid>) -> Result<(), Error>;

    /**
     * Compute the kernel's output field. Must be called on every rank, since
     * kernels may exchange halos.
     */
    fn step(&mut self, problem: &ProblemData, output: &mut Vector) -> Result<(), Error>;

    /**
     * Release the per-instance state. The kernel may be initialized again
     * afterwards.
     */
    fn free_instance(&mut self);

    /**
     * The number of scratch values the kernel needs per rank.
     */
    fn scratch_size(&self) -> usize;
}




/**
 * The kernels which can be selected in a configuration file.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum KernelConfig {
    RealSpaceZ,
    ConstantField { value: f64 },
}




// ============================================================================
impl KernelConfig {

    /**
     * Check this configuration against the grid and return the configured
     * kernel.
     */
    pub fn configure(&self, grid: &Grid) -> Result<Box<dyn Kernel>, Error> {
        match self {
            KernelConfig::RealSpaceZ => Ok(Box::new(RealSpaceZ::new(grid)?)),
            KernelConfig::ConstantField { value } => Ok(Box::new(ConstantField::new(*value))),
        }
    }
}
