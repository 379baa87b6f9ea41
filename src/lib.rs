//! Halogrid is the distributed structured-grid data layer of a parallel
//! subsurface-flow simulator. It decomposes a rectilinear 3D domain into
//! subgrids owned by cooperating processes, stores per-cell field data with
//! ghost-cell padding in one contiguous buffer per process, and keeps the
//! ghost cells consistent through a two-phase (post, then complete) halo
//! exchange. Structured box iteration, optionally restricted to the inside
//! of a geometric solid, is the means by which kernels visit the cells.
//! Processes talk through a `Communicator`; in-process channel and TCP
//! transports are included.

pub mod box_loop;
pub mod comm;
pub mod config;
pub mod context;
pub mod error;
pub mod geometry;
pub mod index_space;
pub mod kernel;
pub mod launch;
pub mod mask;
pub mod message;
pub mod vector;

pub use box_loop::{BoxLoop, DataView};
pub use comm::{CommHandle, UpdateMode};
pub use config::Config;
pub use context::Context;
pub use error::Error;
pub use geometry::{Background, Grid, Subgrid, SubgridArray, Topology};
pub use launch::launch;
pub use vector::{Subvector, Vector};
