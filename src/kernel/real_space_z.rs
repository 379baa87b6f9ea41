use std::sync::Arc;

use log::debug;

use super::{Kernel, ProblemData};
use crate::comm::UpdateMode;
use crate::error::Error;
use crate::geometry::Grid;
use crate::mask::masked_loop;
use crate::vector::Vector;

/**
 * Computes the real-space z coordinate of every cell center, for a grid
 * whose vertical cell sizes are the base spacing scaled by a multiplier
 * field. Heights are accumulated upward from the bottom of the domain, so
 * every subgrid must span the full height of the domain.
 */
pub struct RealSpaceZ {
    scratch: Vec<f64>,
}




// ============================================================================
impl RealSpaceZ {
    pub fn new(grid: &Grid) -> Result<Self, Error> {
        let nz = grid.domain().dim().2 as i64;

        if grid.topology().r != 1 {
            return Err(Error::InvalidDecomposition(format!(
                "real space z needs whole columns on each process, topology has r = {}",
                grid.topology().r
            )));
        }
        for subgrid in grid.all_subgrids() {
            if subgrid.origin().2 != 0 || subgrid.extent().2 != nz {
                return Err(Error::InvalidDecomposition(format!(
                    "real space z needs whole columns, subgrid {} does not span {} cells in z",
                    subgrid, nz
                )));
            }
        }
        Ok(Self {
            scratch: Vec::new(),
        })
    }
}




// ============================================================================
impl Kernel for RealSpaceZ {
    fn name(&self) -> &'static str {
        "real space z"
    }

    fn init_instance(&mut self, grid: &Arc<Grid>) -> Result<(), Error> {
        let tallest = grid
            .local_subgrids()
            .map(|s| s.extent().2 as usize)
            .max()
            .unwrap_or(0);
        self.scratch = vec![0.0; tallest];
        Ok(())
    }

    /**
     * Fill `output` with 1.0, then write the height of each inside cell's
     * center: starting at the bottom of the background, each layer adds
     * half of its scaled spacing below its center and half above. The
     * multiplier is read from the column at the subgrid's lower x-y
     * corner. Finishes with a full halo exchange of `output`.
     */
    fn step(&mut self, problem: &ProblemData, output: &mut Vector) -> Result<(), Error> {
        assert!(
            Arc::ptr_eq(problem.z_mult.grid(), output.grid()),
            "multiplier and output live on different grids"
        );
        output.fill_constant(1.0);

        let grid = output.grid().clone();
        let background = grid.background();

        for n in 0..output.num_subvectors() {
            let mult = problem.z_mult.subvector(n);
            let mult_data = problem.z_mult.subvector_data(n);
            let subgrid = output.subvector(n).subgrid().clone();
            let (ix, iy, iz) = subgrid.origin();
            let (_, _, nz) = subgrid.extent();
            let levels = subgrid.levels();
            let dz = background.dz(levels.2);
            let zz = self
                .scratch
                .get_mut(..nz as usize)
                .ok_or_else(|| Error::Protocol("real space z stepped before init_instance".to_string()))?;
            let mut z = background.origin.2;

            for k in iz..iz + nz {
                let m = mult_data[mult.view().offset((ix, iy, k))];
                z += 0.5 * dz * m;
                zz[(k - iz) as usize] = z;
                z += 0.5 * dz * m;
            }

            let view = output.subvector(n).view().clone();
            let data = output.subvector_data_mut(n);

            masked_loop(
                problem.domain.as_ref(),
                levels,
                subgrid.space(),
                [&view],
                |(_, _, k), [o]| data[o] = zz[(k - iz) as usize],
            );
        }
        debug!("real space z computed on rank {}", grid.context().rank());
        output.update(UpdateMode::All)
    }

    fn free_instance(&mut self) {
        self.scratch = Vec::new();
    }

    fn scratch_size(&self) -> usize {
        self.scratch.len()
    }
}




// ============================================================================
#[cfg(test)]
mod test {
    use crate::config::Config;
    use crate::error::Error;
    use crate::geometry::{Background, Grid, Topology};
    use crate::index_space::range3d;
    use crate::kernel::{KernelConfig, ProblemData};
    use crate::launch::launch;
    use crate::mask::{BoxSolid, MaskSolid};
    use crate::vector::Vector;

    fn config(topology: Topology) -> Config {
        Config {
            background: Background {
                origin: (0.0, 0.0, -10.0),
                spacing: (1.0, 1.0, 2.0),
                extent: (4, 3, 5),
            },
            topology,
            blocks: (1, 1, 1),
            refinement: (1, 1, 2),
        }
    }

    #[test]
    fn heights_accumulate_the_scaled_spacing() {
        launch(2, |ctx| {
            let grid = Grid::new(ctx, &config(Topology::new(2, 1, 1))).unwrap();
            let mut z_mult = Vector::new(&grid, 1, 1).unwrap();
            z_mult.fill_constant(2.0);

            let problem = ProblemData {
                z_mult,
                domain: Box::new(BoxSolid::new(range3d(0..4, 0..3, 0..5))),
            };
            let mut output = Vector::new(&grid, 1, 1).unwrap();
            let mut kernel = KernelConfig::RealSpaceZ.configure(&grid).unwrap();

            kernel.init_instance(&grid).unwrap();
            assert_eq!(kernel.scratch_size(), 10);
            kernel.step(&problem, &mut output).unwrap();

            for s in output.subvectors() {
                for index in s.data_space().iter() {
                    let expected = if grid.domain().contains(index) {
                        -10.0 + 2.0 * (index.2 as f64 + 0.5)
                    } else {
                        1.0
                    };
                    assert_eq!(output.value(index, 0), Some(expected), "index {:?}", index);
                }
            }
            kernel.free_instance();
            assert_eq!(kernel.scratch_size(), 0);
        });
    }

    #[test]
    fn cells_outside_the_domain_stay_at_one() {
        launch(1, |ctx| {
            let grid = Grid::new(ctx, &config(Topology::new(1, 1, 1))).unwrap();
            let mut z_mult = Vector::new(&grid, 1, 0).unwrap();
            z_mult.fill_constant(1.0);

            let problem = ProblemData {
                z_mult,
                domain: Box::new(MaskSolid::from_fn(range3d(0..4, 0..3, 0..5), |(i, _, k)| {
                    i < 2 && k < 3
                })),
            };
            let mut output = Vector::new(&grid, 1, 0).unwrap();
            let mut kernel = KernelConfig::RealSpaceZ.configure(&grid).unwrap();
            kernel.init_instance(&grid).unwrap();
            kernel.step(&problem, &mut output).unwrap();

            for (i, j, k) in grid.domain().iter() {
                let expected = if i < 2 && k < 6 {
                    -10.0 + (k as f64 + 0.5)
                } else {
                    1.0
                };
                assert_eq!(output.value((i, j, k), 0), Some(expected));
            }
        });
    }

    #[test]
    fn split_columns_are_rejected() {
        launch(2, |ctx| {
            let grid = Grid::new(ctx, &config(Topology::new(1, 1, 2))).unwrap();
            assert!(matches!(
                KernelConfig::RealSpaceZ.configure(&grid),
                Err(Error::InvalidDecomposition(_))
            ));
        });
    }
}
