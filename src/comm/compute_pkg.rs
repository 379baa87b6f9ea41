use std::collections::BTreeMap;

use super::UpdateMode;
use crate::geometry::SubgridArray;
use crate::index_space::IndexSpace;




/**
 * One block of cells moving between a local subgrid and a remote one.
 * `local` is the position of the subgrid among this rank's subgrids,
 * `remote` the global position of the subgrid on the other side.
 */
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub local: usize,
    pub remote: usize,
    pub space: IndexSpace,
}




/**
 * The regions exchanged with one peer rank, in the order they appear in the
 * message.
 */
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub rank: usize,
    pub regions: Vec<Region>,
}




// ============================================================================
impl Transfer {

    /**
     * The number of cells carried by the message.
     */
    pub fn num_cells(&self) -> usize {
        self.regions.iter().map(|r| r.space.len()).sum()
    }
}




/**
 * The send and receive plan of one rank for one update mode and ghost
 * width. Subgrid X sends to subgrid Y the part of its interior lying in one
 * of Y's ghost slabs, and receives from Y the part of each of its own ghost
 * slabs lying in Y's interior. Within a message the regions are sorted by
 * (sending subgrid, receiving subgrid, slab), which both ranks compute
 * independently and identically. Ranks appear in ascending order and only
 * if at least one cell moves.
 */
#[derive(Clone, Debug)]
pub struct ComputePkg {
    mode: UpdateMode,
    num_ghost: i64,
    sends: Vec<Transfer>,
    recvs: Vec<Transfer>,
}




// ============================================================================
impl ComputePkg {

    pub fn new(subgrids: &SubgridArray, rank: usize, mode: UpdateMode, num_ghost: i64) -> Self {
        let mut sends: BTreeMap<usize, Vec<(usize, usize, usize, Region)>> = BTreeMap::new();
        let mut recvs: BTreeMap<usize, Vec<(usize, usize, usize, Region)>> = BTreeMap::new();

        let local = subgrids
            .iter()
            .enumerate()
            .filter(|(_, s)| s.process() == rank)
            .enumerate();

        for (lx, (gx, x)) in local {
            let x_slabs = mode.ghost_slabs(x.space(), num_ghost);

            for (gy, y) in subgrids.iter().enumerate() {
                if gy == gx {
                    continue;
                }
                let y_slabs = mode.ghost_slabs(y.space(), num_ghost);

                for (s, slab) in y_slabs.iter().enumerate() {
                    if let Some(space) = x.space().intersect(slab) {
                        let region = Region { local: lx, remote: gy, space };
                        sends.entry(y.process()).or_default().push((gx, gy, s, region));
                    }
                }
                for (s, slab) in x_slabs.iter().enumerate() {
                    if let Some(space) = slab.intersect(y.space()) {
                        let region = Region { local: lx, remote: gy, space };
                        recvs.entry(y.process()).or_default().push((gy, gx, s, region));
                    }
                }
            }
        }

        Self {
            mode,
            num_ghost,
            sends: into_transfers(sends),
            recvs: into_transfers(recvs),
        }
    }

    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    pub fn num_ghost(&self) -> i64 {
        self.num_ghost
    }

    pub fn sends(&self) -> &[Transfer] {
        &self.sends
    }

    pub fn recvs(&self) -> &[Transfer] {
        &self.recvs
    }
}




// ============================================================================
fn into_transfers(map: BTreeMap<usize, Vec<(usize, usize, usize, Region)>>) -> Vec<Transfer> {
    map.into_iter()
        .map(|(rank, mut entries)| {
            entries.sort_by_key(|&(a, b, s, _)| (a, b, s));
            Transfer {
                rank,
                regions: entries.into_iter().map(|(_, _, _, region)| region).collect(),
            }
        })
        .collect()
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::ComputePkg;
    use crate::comm::UpdateMode;
    use crate::geometry::Topology;

    fn pkgs(topology: Topology, extent: (i64, i64, i64), mode: UpdateMode) -> Vec<ComputePkg> {
        let subgrids = topology.decompose(extent, (1, 1, 1), (0, 0, 0)).unwrap();
        (0..topology.num_procs())
            .map(|rank| ComputePkg::new(&subgrids, rank, mode, 1))
            .collect()
    }

    #[test]
    fn sends_and_receives_agree_between_ranks() {
        for mode in UpdateMode::MODES {
            let pkgs = pkgs(Topology::new(2, 2, 2), (6, 6, 6), mode);

            for (a, pa) in pkgs.iter().enumerate() {
                for send in pa.sends() {
                    let recv = pkgs[send.rank]
                        .recvs()
                        .iter()
                        .find(|t| t.rank == a)
                        .expect("matching receive");
                    let sent: Vec<_> = send.regions.iter().map(|r| &r.space).collect();
                    let received: Vec<_> = recv.regions.iter().map(|r| &r.space).collect();
                    assert_eq!(sent, received);
                }
            }
        }
    }

    #[test]
    fn full_shell_reaches_all_corner_neighbors() {
        let pkgs = pkgs(Topology::new(2, 2, 2), (4, 4, 4), UpdateMode::All);
        assert_eq!(pkgs[0].sends().len(), 7);
        assert_eq!(pkgs[0].recvs().len(), 7);
    }

    #[test]
    fn faces_reach_face_neighbors_only() {
        let pkgs = pkgs(Topology::new(2, 2, 2), (4, 4, 4), UpdateMode::Faces);
        let peers: Vec<_> = pkgs[0].recvs().iter().map(|t| t.rank).collect();
        assert_eq!(peers, vec![1, 2, 4]);
    }

    #[test]
    fn vertical_reaches_the_z_neighbor_only() {
        let pkgs = pkgs(Topology::new(2, 1, 2), (4, 4, 4), UpdateMode::Vertical);
        let peers: Vec<_> = pkgs[0].sends().iter().map(|t| t.rank).collect();
        assert_eq!(peers, vec![2]);
        assert_eq!(pkgs[0].sends()[0].num_cells(), 2 * 4);
    }

    #[test]
    fn single_process_has_nothing_to_exchange() {
        let pkgs = pkgs(Topology::new(1, 1, 1), (4, 4, 4), UpdateMode::All);
        assert!(pkgs[0].sends().is_empty() && pkgs[0].recvs().is_empty());
    }
}
