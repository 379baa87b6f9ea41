use std::sync::Arc;

use super::{Kernel, ProblemData};
use crate::comm::UpdateMode;
use crate::error::Error;
use crate::geometry::Grid;
use crate::mask::masked_loop;
use crate::vector::Vector;

/**
 * Writes a constant to every component of every cell inside the problem
 * domain, then refreshes the halos.
 */
pub struct ConstantField {
    value: f64,
}




// ============================================================================
impl ConstantField {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}




// ============================================================================
impl Kernel for ConstantField {
    fn name(&self) -> &'static str {
        "constant field"
    }

    fn init_instance(&mut self, _grid: &Arc<Grid>) -> Result<(), Error> {
        Ok(())
    }

    fn step(&mut self, problem: &ProblemData, output: &mut Vector) -> Result<(), Error> {
        let value = self.value;
        let components = output.num_components();

        for (s, data) in output.subvectors_mut() {
            masked_loop(
                problem.domain.as_ref(),
                s.subgrid().levels(),
                s.interior(),
                [s.view()],
                |_, [o]| data[o..o + components].fill(value),
            );
        }
        output.update(UpdateMode::All)
    }

    fn free_instance(&mut self) {}

    fn scratch_size(&self) -> usize {
        0
    }
}




// ============================================================================
#[cfg(test)]
mod test {
    use crate::config::Config;
    use crate::geometry::{Background, Grid, Topology};
    use crate::index_space::range3d;
    use crate::kernel::{KernelConfig, ProblemData};
    use crate::launch::launch;
    use crate::mask::BoxSolid;
    use crate::vector::Vector;

    #[test]
    fn constant_is_written_inside_the_domain_only() {
        launch(2, |ctx| {
            let config = Config {
                background: Background {
                    extent: (6, 4, 4),
                    ..Background::default()
                },
                topology: Topology::new(2, 1, 1),
                ..Config::default()
            };
            let grid = Grid::new(ctx, &config).unwrap();
            let problem = ProblemData {
                z_mult: Vector::new(&grid, 1, 0).unwrap(),
                domain: Box::new(BoxSolid::new(range3d(2..4, 0..4, 0..4))),
            };
            let mut output = Vector::new(&grid, 2, 1).unwrap();
            let mut kernel = KernelConfig::ConstantField { value: 3.0 }.configure(&grid).unwrap();

            kernel.init_instance(&grid).unwrap();
            kernel.step(&problem, &mut output).unwrap();
            assert_eq!(kernel.scratch_size(), 0);

            for s in output.subvectors() {
                for index in s.data_space().iter() {
                    let inside = grid.domain().contains(index) && (2..4).contains(&index.0);
                    let expected = if inside { 3.0 } else { 0.0 };
                    assert_eq!(output.value(index, 1), Some(expected), "index {:?}", index);
                }
            }
        });
    }
}
