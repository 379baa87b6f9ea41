use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info};

use super::{Background, Subgrid, SubgridArray, Topology};
use crate::comm::{ComputePkg, UpdateMode};
use crate::config::Config;
use crate::context::Context;
use crate::error::Error;
use crate::index_space::IndexSpace;

/**
 * The decomposition of the (refined) domain index space into subgrids,
 * together with the background it maps to and the context of the process
 * holding it. Every rank builds an identical global subgrid list; the
 * local subgrids are the ones whose owner is this rank, in global order.
 */
pub struct Grid {
    context: Arc<Context>,
    background: Background,
    topology: Topology,
    levels: (u32, u32, u32),
    domain: IndexSpace,
    subgrids: SubgridArray,
    local: Vec<usize>,
    compute_pkgs: Mutex<HashMap<(UpdateMode, i64), Arc<ComputePkg>>>,
}




// ============================================================================
impl Grid {
    /**
     * Validate the configuration against the context's process count,
     * decompose the domain, and verify that the subgrids tile it exactly.
     * This is a collective, deterministic operation: every rank must call
     * it with the same configuration.
     */
    pub fn new(context: Arc<Context>, config: &Config) -> Result<Arc<Self>, Error> {
        config.validate(context.size())?;

        let levels = config.levels()?;
        let extent = config.refined_extent();
        let domain = IndexSpace::from_origin((0, 0, 0), extent);
        let subgrids = config.topology.decompose(extent, config.blocks, levels)?;

        check_tiling(&domain, &subgrids)?;

        let rank = context.rank();
        let local = subgrids
            .iter()
            .enumerate()
            .filter(|(_, s)| s.process() == rank)
            .map(|(n, _)| n)
            .collect();

        Ok(Arc::new(Self {
            context,
            background: config.background.clone(),
            topology: config.topology,
            levels,
            domain,
            subgrids,
            local,
            compute_pkgs: Mutex::new(HashMap::new()),
        }))
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn background(&self) -> &Background {
        &self.background
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn levels(&self) -> (u32, u32, u32) {
        self.levels
    }

    /**
     * The index space covered by the union of all subgrids.
     */
    pub fn domain(&self) -> &IndexSpace {
        &self.domain
    }

    /**
     * The number of cells in the whole domain.
     */
    pub fn size(&self) -> usize {
        self.domain.len()
    }

    pub fn all_subgrids(&self) -> &SubgridArray {
        &self.subgrids
    }

    pub fn num_local(&self) -> usize {
        self.local.len()
    }

    /**
     * Return the global position of the `n`-th local subgrid.
     */
    pub fn local_gid(&self, n: usize) -> usize {
        self.local[n]
    }

    pub fn local_subgrid(&self, n: usize) -> &Subgrid {
        &self.subgrids[self.local[n]]
    }

    pub fn local_subgrids(&self) -> impl Iterator<Item = &Subgrid> + '_ {
        self.local.iter().map(move |&n| &self.subgrids[n])
    }

    /**
     * Return the exchange plan for the given mode and ghost width, building
     * it on first use. Plans are shared by every vector on this grid.
     */
    pub fn compute_pkg(&self, mode: UpdateMode, num_ghost: i64) -> Arc<ComputePkg> {
        let mut pkgs = self.compute_pkgs.lock().unwrap_or_else(PoisonError::into_inner);

        pkgs.entry((mode, num_ghost))
            .or_insert_with(|| {
                debug!("building {:?} exchange plan with {} ghost cells", mode, num_ghost);
                Arc::new(ComputePkg::new(&self.subgrids, self.context.rank(), mode, num_ghost))
            })
            .clone()
    }

    /**
     * Write one line per subgrid to the log.
     */
    pub fn log_layout(&self) {
        info!(
            "grid of {} cells in {} subgrids on {} processes",
            self.size(),
            self.subgrids.len(),
            self.topology.num_procs()
        );
        for (n, subgrid) in self.subgrids.iter().enumerate() {
            info!("subgrid {}: {}", n, subgrid);
        }
    }
}

fn check_tiling(domain: &IndexSpace, subgrids: &SubgridArray) -> Result<(), Error> {
    for (n, s) in subgrids.iter().enumerate() {
        if !domain.contains_space(s.space()) {
            return Err(Error::GeometryInvariant(format!(
                "subgrid {} ({}) lies outside the domain",
                n, s
            )));
        }
    }
    let all = subgrids.as_slice();

    for (a, sa) in all.iter().enumerate() {
        for (b, sb) in all.iter().enumerate().skip(a + 1) {
            if sa.space().overlaps(sb.space()) {
                return Err(Error::GeometryInvariant(format!(
                    "subgrids {} and {} overlap",
                    a, b
                )));
            }
        }
    }
    if subgrids.num_cells() != domain.len() {
        return Err(Error::GeometryInvariant(format!(
            "subgrids cover {} cells of a domain with {}",
            subgrids.num_cells(),
            domain.len()
        )));
    }
    Ok(())
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::{check_tiling, Grid};
    use crate::comm::UpdateMode;
    use crate::config::Config;
    use crate::error::Error;
    use crate::geometry::{Background, Subgrid, SubgridArray, Topology};
    use crate::index_space::range3d;
    use crate::launch::launch;
    use std::sync::Arc;

    fn config(p: usize, q: usize, r: usize) -> Config {
        Config {
            background: Background {
                extent: (7, 5, 6),
                ..Background::default()
            },
            topology: Topology::new(p, q, r),
            blocks: (1, 2, 1),
            refinement: (1, 1, 2),
        }
    }

    #[test]
    fn subgrids_tile_the_domain_for_many_topologies() {
        for (p, q, r) in [(1, 1, 1), (2, 1, 1), (3, 2, 1), (1, 2, 3), (2, 2, 2)] {
            let sizes = launch(p * q * r, |ctx| {
                let grid = Grid::new(ctx, &config(p, q, r)).unwrap();
                assert_eq!(grid.domain(), &range3d(0..7, 0..5, 0..12));
                assert!(grid.local_subgrids().all(|s| s.levels() == (0, 0, 1)));
                grid.local_subgrids().map(|s| s.len()).sum::<usize>()
            });
            assert_eq!(sizes.iter().sum::<usize>(), 7 * 5 * 12);
        }
    }

    #[test]
    fn each_rank_owns_its_blocks() {
        launch(2, |ctx| {
            let rank = ctx.rank();
            let grid = Grid::new(ctx, &config(2, 1, 1)).unwrap();
            assert_eq!(grid.num_local(), 2);
            assert_eq!(grid.local_gid(0), 2 * rank);
            assert!(grid.local_subgrids().all(|s| s.process() == rank));
        });
    }

    #[test]
    fn mismatched_topology_is_rejected() {
        launch(3, |ctx| {
            assert!(matches!(
                Grid::new(ctx, &config(2, 1, 1)),
                Err(Error::InvalidTopology { .. })
            ));
        });
    }

    #[test]
    fn bad_refinement_is_rejected() {
        launch(1, |ctx| {
            let mut c = config(1, 1, 1);
            c.refinement = (1, 6, 1);
            assert!(matches!(
                Grid::new(ctx, &c),
                Err(Error::InvalidRefinement { axis: 'y', ratio: 6 })
            ));
        });
    }

    #[test]
    fn compute_pkgs_are_cached() {
        launch(1, |ctx| {
            let grid = Grid::new(ctx, &config(1, 1, 1)).unwrap();
            let a = grid.compute_pkg(UpdateMode::Faces, 1);
            let b = grid.compute_pkg(UpdateMode::Faces, 1);
            let c = grid.compute_pkg(UpdateMode::Faces, 2);
            assert!(Arc::ptr_eq(&a, &b));
            assert!(!Arc::ptr_eq(&a, &c));
        });
    }

    #[test]
    fn overlapping_subgrids_break_the_tiling() {
        let domain = range3d(0..4, 0..4, 0..4);
        let subgrids: SubgridArray = vec![
            Subgrid::new((0, 0, 0), (3, 4, 4), (0, 0, 0), 0),
            Subgrid::new((2, 0, 0), (2, 4, 4), (0, 0, 0), 1),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            check_tiling(&domain, &subgrids),
            Err(Error::GeometryInvariant(_))
        ));
    }

    #[test]
    fn missing_cells_break_the_tiling() {
        let domain = range3d(0..4, 0..4, 0..4);
        let subgrids: SubgridArray = vec![Subgrid::new((0, 0, 0), (3, 4, 4), (0, 0, 0), 0)]
            .into_iter()
            .collect();
        assert!(check_tiling(&domain, &subgrids).is_err());
    }
}
