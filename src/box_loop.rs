use crate::index_space::{Axis, Index, IndexSpace};




/**
 * Describes how the cells of an index space are laid out in a flat buffer:
 * `components` values per cell, first index fastest.
 */
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataView {
    space: IndexSpace,
    components: usize,
}




// ============================================================================
impl DataView {

    pub fn new(space: IndexSpace, components: usize) -> Self {
        Self { space, components }
    }

    pub fn space(&self) -> &IndexSpace {
        &self.space
    }

    pub fn components(&self) -> usize {
        self.components
    }

    /**
     * The number of buffer elements to advance for a unit step along each
     * axis.
     */
    pub fn strides(&self) -> (usize, usize, usize) {
        let (nx, ny, _) = self.space.dim();
        let c = self.components;
        (c, c * nx, c * nx * ny)
    }

    /**
     * The offset of the first component of the given cell.
     */
    pub fn offset(&self, index: Index) -> usize {
        assert!(self.space.contains(index), "index {:?} is outside the view", index);
        self.components * self.space.linear_offset(index)
    }

    /**
     * The number of buffer elements spanned by the view.
     */
    pub fn len(&self) -> usize {
        self.space.len() * self.components
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}




/**
 * Traverses a rectangular region with `k` outermost and `i` innermost,
 * handing the caller the cell index and its offset into each of a fixed
 * number of data views. Offsets are advanced by the view strides rather
 * than recomputed for each cell.
 */
#[derive(Clone, Debug)]
pub struct BoxLoop {
    region: IndexSpace,
}




// ============================================================================
impl BoxLoop {

    pub fn new(region: IndexSpace) -> Self {
        Self { region }
    }

    pub fn region(&self) -> &IndexSpace {
        &self.region
    }

    pub fn for_each<const N: usize, F>(&self, views: [&DataView; N], mut f: F)
    where
        F: FnMut(Index, [usize; N]),
    {
        if self.region.is_empty() {
            return;
        }
        let strides = check_views(&self.region, views);
        let mut plane = views.map(|v| v.offset(self.region.start()));

        for k in self.region.range(Axis::K).clone() {
            let mut row = plane;

            for j in self.region.range(Axis::J).clone() {
                let mut cell = row;

                for i in self.region.range(Axis::I).clone() {
                    f((i, j, k), cell);

                    for n in 0..N {
                        cell[n] += strides[n].0
                    }
                }
                for n in 0..N {
                    row[n] += strides[n].1
                }
            }
            for n in 0..N {
                plane[n] += strides[n].2
            }
        }
    }

    /**
     * Return an iterator over the same sequence of `(index, offsets)` pairs
     * visited by `for_each`. The iterator can be cloned to restart the
     * traversal from any point.
     */
    pub fn iter<const N: usize>(&self, views: [&DataView; N]) -> BoxIter<N> {
        let strides = check_views(&self.region, views);
        let offsets = if self.region.is_empty() {
            [0; N]
        } else {
            views.map(|v| v.offset(self.region.start()))
        };
        BoxIter {
            region: self.region.clone(),
            strides,
            index: self.region.start(),
            offsets,
            remaining: self.region.len(),
        }
    }
}




fn check_views<const N: usize>(region: &IndexSpace, views: [&DataView; N]) -> [(usize, usize, usize); N] {
    for view in views {
        assert!(
            view.space().contains_space(region),
            "loop region {:?} is not inside the view {:?}", region, view.space());
    }
    views.map(DataView::strides)
}




/**
 * Iterator returned by `BoxLoop::iter`.
 */
#[derive(Clone, Debug)]
pub struct BoxIter<const N: usize> {
    region: IndexSpace,
    strides: [(usize, usize, usize); N],
    index: Index,
    offsets: [usize; N],
    remaining: usize,
}




// ============================================================================
impl<const N: usize> Iterator for BoxIter<N> {
    type Item = (Index, [usize; N]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = (self.index, self.offsets);
        let (ni, nj, _) = self.region.dim();
        let (i0, j0, _) = self.region.start();
        let (i1, j1, _) = self.region.end();

        self.remaining -= 1;
        self.index.0 += 1;

        for n in 0..N {
            self.offsets[n] += self.strides[n].0
        }
        if self.index.0 == i1 {
            self.index.0 = i0;
            self.index.1 += 1;

            for n in 0..N {
                self.offsets[n] = self.offsets[n] + self.strides[n].1 - ni * self.strides[n].0
            }
            if self.index.1 == j1 {
                self.index.1 = j0;
                self.index.2 += 1;

                for n in 0..N {
                    self.offsets[n] = self.offsets[n] + self.strides[n].2 - nj * self.strides[n].1
                }
            }
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}




// ============================================================================
impl<const N: usize> ExactSizeIterator for BoxIter<N> {}
