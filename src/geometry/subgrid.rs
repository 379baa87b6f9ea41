use std::fmt;

use crate::index_space::{Index, IndexSpace};




/**
 * One rectangular region of the structured index space, at a given
 * refinement level on each axis, owned by one process. The extents may be
 * zero but never negative.
 */
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subgrid {
    space: IndexSpace,
    levels: (u32, u32, u32),
    process: usize,
}




// ============================================================================
impl Subgrid {

    pub fn new(origin: Index, extent: (i64, i64, i64), levels: (u32, u32, u32), process: usize) -> Self {
        Self {
            space: IndexSpace::from_origin(origin, extent),
            levels,
            process,
        }
    }

    pub fn from_space(space: IndexSpace, levels: (u32, u32, u32), process: usize) -> Self {
        Self { space, levels, process }
    }

    /**
     * The lower corner `(ix, iy, iz)`.
     */
    pub fn origin(&self) -> Index {
        self.space.start()
    }

    /**
     * The number of cells `(nx, ny, nz)`.
     */
    pub fn extent(&self) -> (i64, i64, i64) {
        let (l, m, n) = self.space.dim();
        (l as i64, m as i64, n as i64)
    }

    /**
     * The refinement levels `(rx, ry, rz)`: each axis is refined by a factor
     * `2^r` relative to the background.
     */
    pub fn levels(&self) -> (u32, u32, u32) {
        self.levels
    }

    pub fn process(&self) -> usize {
        self.process
    }

    pub fn space(&self) -> &IndexSpace {
        &self.space
    }

    pub fn len(&self) -> usize {
        self.space.len()
    }

    pub fn is_empty(&self) -> bool {
        self.space.is_empty()
    }

    /**
     * Return the subgrid grown by `num_ghost` cells in every direction, with
     * the same levels and owner. This is the data space of a subvector.
     */
    pub fn grow(&self, num_ghost: i64) -> Self {
        Self {
            space: self.space.extend_all(num_ghost),
            levels: self.levels,
            process: self.process,
        }
    }
}




// ============================================================================
impl fmt::Display for Subgrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (ix, iy, iz) = self.origin();
        let (nx, ny, nz) = self.extent();
        let (rx, ry, rz) = self.levels;
        write!(
            f,
            "({}, {}, {}; {}, {}, {}; {}, {}, {}) on process {}",
            ix, iy, iz, nx, ny, nz, rx, ry, rz, self.process
        )
    }
}




/**
 * An ordered, append-only collection of subgrids. Insertion order is the
 * iteration order, and the position of a subgrid is its identity within the
 * array.
 */
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubgridArray {
    subgrids: Vec<Subgrid>,
}




// ============================================================================
impl SubgridArray {

    pub fn new() -> Self {
        Self::default()
    }

    /**
     * Append a subgrid. Panics if an identical subgrid is already present.
     */
    pub fn push(&mut self, subgrid: Subgrid) {
        assert!(
            !self.subgrids.contains(&subgrid),
            "subgrid {} is already in the array", subgrid);
        self.subgrids.push(subgrid)
    }

    pub fn len(&self) -> usize {
        self.subgrids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subgrids.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Subgrid> {
        self.subgrids.get(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subgrid> {
        self.subgrids.iter()
    }

    pub fn as_slice(&self) -> &[Subgrid] {
        &self.subgrids
    }

    /**
     * Return the total number of cells over all subgrids.
     */
    pub fn num_cells(&self) -> usize {
        self.subgrids.iter().map(Subgrid::len).sum()
    }
}




// ============================================================================
impl std::ops::Index<usize> for SubgridArray {
    type Output = Subgrid;

    fn index(&self, i: usize) -> &Subgrid {
        &self.subgrids[i]
    }
}




// ============================================================================
impl FromIterator<Subgrid> for SubgridArray {
    fn from_iter<I: IntoIterator<Item = Subgrid>>(iter: I) -> Self {
        let mut result = Self::new();

        for subgrid in iter {
            result.push(subgrid);
        }
        result
    }
}




// ============================================================================
impl<'a> IntoIterator for &'a SubgridArray {
    type Item = &'a Subgrid;
    type IntoIter = std::slice::Iter<'a, Subgrid>;

    fn into_iter(self) -> Self::IntoIter {
        self.subgrids.iter()
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{Subgrid, SubgridArray};

    #[test]
    fn grown_subgrid_has_ghost_padding() {
        let s = Subgrid::new((2, 3, 4), (5, 6, 7), (0, 0, 0), 1);
        let g = s.grow(2);
        assert_eq!(g.origin(), (0, 1, 2));
        assert_eq!(g.extent(), (9, 10, 11));
        assert_eq!(g.process(), 1);
    }

    #[test]
    fn array_keeps_insertion_order() {
        let a: SubgridArray = (0..4)
            .map(|n| Subgrid::new((n, 0, 0), (1, 1, 1), (0, 0, 0), 0))
            .collect();
        assert_eq!(a.len(), 4);
        assert_eq!(a[2].origin(), (2, 0, 0));
        assert_eq!(a.num_cells(), 4);
    }

    #[test]
    #[should_panic]
    fn array_rejects_duplicates() {
        let mut a = SubgridArray::new();
        a.push(Subgrid::new((0, 0, 0), (1, 1, 1), (0, 0, 0), 0));
        a.push(Subgrid::new((0, 0, 0), (1, 1, 1), (0, 0, 0), 0));
    }
}
