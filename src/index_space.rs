use core::ops::Range;




/**
 * Identifier for a Cartesian axis
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    I,
    J,
    K,
}




/**
 * A cell index `(i, j, k)` in a discrete 3D index space
 */
pub type Index = (i64, i64, i64);




#[derive(Clone, Debug, PartialEq, Eq, Hash)]


/**
 * Represents a rectangular region in a discrete index space
 */
pub struct IndexSpace {
    di: Range<i64>,
    dj: Range<i64>,
    dk: Range<i64>,
}




// ============================================================================
/**
 * Describes a rectangular index space. The index type is signed 64-bit
 * integer. Empty spaces (zero extent on some axis) are allowed, negative
 * extents are not.
 */
impl IndexSpace {


    pub fn new(di: Range<i64>, dj: Range<i64>, dk: Range<i64>) -> Self {

        assert!(
            di.start <= di.end && dj.start <= dj.end && dk.start <= dk.end,
            "index space has negative volume");

        Self { di, dj, dk }
    }


    /**
     * Construct an index space from its lower corner and the number of
     * indexes on each axis.
     */
    pub fn from_origin(start: Index, count: (i64, i64, i64)) -> Self {
        Self::new(
            start.0 .. start.0 + count.0,
            start.1 .. start.1 + count.1,
            start.2 .. start.2 + count.2)
    }


    /**
     * Return the number of indexes on each axis.
     */
    pub fn dim(&self) -> (usize, usize, usize) {
        ((self.di.end - self.di.start) as usize,
         (self.dj.end - self.dj.start) as usize,
         (self.dk.end - self.dk.start) as usize)
    }


    /**
     * Return the number of elements in this index space.
     */
    pub fn len(&self) -> usize {
        let (l, m, n) = self.dim();
        l * m * n
    }


    /**
     * Determine whether this index space has no elements.
     */
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }


    /**
     * Return the minimum index (inclusive).
     */
    pub fn start(&self) -> Index {
        (self.di.start, self.dj.start, self.dk.start)
    }


    /**
     * Return the maximum index (exclusive).
     */
    pub fn end(&self) -> Index {
        (self.di.end, self.dj.end, self.dk.end)
    }


    /**
     * Return the range of indexes on the given axis.
     */
    pub fn range(&self, axis: Axis) -> &Range<i64> {
        match axis {
            Axis::I => &self.di,
            Axis::J => &self.dj,
            Axis::K => &self.dk,
        }
    }


    /**
     * Determine whether this index space contains the given index.
     */
    pub fn contains(&self, index: Index) -> bool {
        self.di.contains(&index.0) && self.dj.contains(&index.1) && self.dk.contains(&index.2)
    }


    /**
     * Determine whether another index space is a subset of this one. The
     * empty space is a subset of every space.
     */
    pub fn contains_space(&self, other: &Self) -> bool {
        other.is_empty() || (
        other.di.start >= self.di.start && other.di.end <= self.di.end &&
        other.dj.start >= self.dj.start && other.dj.end <= self.dj.end &&
        other.dk.start >= self.dk.start && other.dk.end <= self.dk.end)
    }


    /**
     * Return the intersection of two index spaces, or `None` if they do not
     * share any elements.
     */
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let di = self.di.start.max(other.di.start) .. self.di.end.min(other.di.end);
        let dj = self.dj.start.max(other.dj.start) .. self.dj.end.min(other.dj.end);
        let dk = self.dk.start.max(other.dk.start) .. self.dk.end.min(other.dk.end);

        if di.start < di.end && dj.start < dj.end && dk.start < dk.end {
            Some(Self { di, dj, dk })
        } else {
            None
        }
    }


    /**
     * Determine whether two index spaces share any elements.
     */
    pub fn overlaps(&self, other: &Self) -> bool {
        self.intersect(other).is_some()
    }


    /**
     * Expand this index space by the given number of elements on each axis.
     */
    pub fn extend_all(&self, delta: i64) -> Self {
        Self::new(
            self.di.start - delta .. self.di.end + delta,
            self.dj.start - delta .. self.dj.end + delta,
            self.dk.start - delta .. self.dk.end + delta)
    }


    /**
     * Trim this index space by the given number of elements on each axis.
     */
    pub fn trim_all(&self, delta: i64) -> Self {
        self.extend_all(-delta)
    }


    /**
     * Replace the range on one axis, keeping the other two.
     */
    pub fn with_range(&self, axis: Axis, range: Range<i64>) -> Self {
        match axis {
            Axis::I => Self::new(range, self.dj.clone(), self.dk.clone()),
            Axis::J => Self::new(self.di.clone(), range, self.dk.clone()),
            Axis::K => Self::new(self.di.clone(), self.dj.clone(), range),
        }
    }


    /**
     * Return the slab of `width` elements lying just below this space on the
     * given axis. The other two axes are unchanged.
     */
    pub fn lower_slab(&self, width: i64, axis: Axis) -> Self {
        let r = self.range(axis);
        self.with_range(axis, r.start - width .. r.start)
    }


    /**
     * Return the slab of `width` elements lying just above this space on the
     * given axis. The other two axes are unchanged.
     */
    pub fn upper_slab(&self, width: i64, axis: Axis) -> Self {
        let r = self.range(axis);
        self.with_range(axis, r.end .. r.end + width)
    }


    /**
     * Split this index space into two halves along its longest axis. The
     * space must contain at least two elements on that axis.
     */
    pub fn bisect(&self) -> (Self, Self) {
        let (l, m, n) = self.dim();
        let axis = if l >= m && l >= n {
            Axis::I
        } else if m >= n {
            Axis::J
        } else {
            Axis::K
        };
        let r = self.range(axis).clone();
        assert!(r.end - r.start >= 2, "cannot bisect a single-element axis");
        let mid = r.start + (r.end - r.start) / 2;
        (self.with_range(axis, r.start..mid), self.with_range(axis, mid..r.end))
    }


    /**
     * Map this index space to a coarser one, where each coarse element covers
     * `2^levels` fine elements on each axis. The result is the smallest
     * coarse space covering every element of this one.
     */
    pub fn coarsen(&self, levels: (u32, u32, u32)) -> Self {
        if self.is_empty() {
            return self.clone();
        }
        Self::new(
            (self.di.start >> levels.0) .. ((self.di.end - 1) >> levels.0) + 1,
            (self.dj.start >> levels.1) .. ((self.dj.end - 1) >> levels.1) + 1,
            (self.dk.start >> levels.2) .. ((self.dk.end - 1) >> levels.2) + 1)
    }


    /**
     * Return the linear offset for the given index, in a memory buffer
     * aligned with the start of this index space. The first index increases
     * fastest (Fortran-like).
     */
    pub fn linear_offset(&self, index: Index) -> usize {
        let (l, m, _) = self.dim();
        let i = (index.0 - self.di.start) as usize;
        let j = (index.1 - self.dj.start) as usize;
        let k = (index.2 - self.dk.start) as usize;
        i + l * (j + m * k)
    }


    /**
     * Return a memory region object corresponding to the selection of this
     * index space in the buffer allocated for another one.
     */
    pub fn memory_region_in(&self, parent: &Self) -> MemoryRegion {
        assert!(parent.contains_space(self), "memory region lies outside its parent space");

        let start = (
            (self.di.start - parent.di.start) as usize,
            (self.dj.start - parent.dj.start) as usize,
            (self.dk.start - parent.dk.start) as usize);
        let count = self.dim();
        let shape = parent.dim();
        MemoryRegion { start, count, shape }
    }


    /**
     * Return an iterator which traverses the index space with the first
     * index increasing fastest: `k` is the outer loop and `i` the inner one.
     */
    pub fn iter(&self) -> impl Iterator<Item = Index> + '_ {
        self.dk.clone().flat_map(move |k| {
            self.dj.clone().flat_map(move |j| self.di.clone().map(move |i| (i, j, k)))
        })
    }
}




// ============================================================================
impl From<(Range<i64>, Range<i64>, Range<i64>)> for IndexSpace {
    fn from(range: (Range<i64>, Range<i64>, Range<i64>)) -> Self {
        Self::new(range.0, range.1, range.2)
    }
}




// ============================================================================
impl From<IndexSpace> for (Range<i64>, Range<i64>, Range<i64>) {
    fn from(space: IndexSpace) -> Self {
        (space.di, space.dj, space.dk)
    }
}




/**
 * Less imposing factory function to construct an IndexSpace object.
 */
pub fn range3d(di: Range<i64>, dj: Range<i64>, dk: Range<i64>) -> IndexSpace {
    IndexSpace::new(di, dj, dk)
}




/**
 * A 3D memory region within a contiguous buffer, where the first axis
 * increases fastest in memory.
 */
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryRegion {
    start: (usize, usize, usize),
    count: (usize, usize, usize),
    shape: (usize, usize, usize),
}




// ============================================================================
impl MemoryRegion {

    /**
     * Return the number of elements selected by this region.
     */
    pub fn len(&self) -> usize {
        self.count.0 * self.count.1 * self.count.2
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter_slice<'a>(&'a self, slice: &'a [f64], chunk: usize) -> impl Iterator<Item = &'a [f64]> {
        let start = &self.start;
        let shape = &self.shape;
        let count = &self.count;
        let s = chunk;
        let r = shape.0 * s;
        let q = shape.1 * r;

        assert!(slice.len() == shape.0 * shape.1 * shape.2 * chunk);

        slice[start.2 * q .. (start.2 + count.2) * q]
        .chunks_exact(q).flat_map(move |k| k[start.1 * r .. (start.1 + count.1) * r]
        .chunks_exact(r).flat_map(move |j| j[start.0 * s .. (start.0 + count.0) * s]
        .chunks_exact(s)))
    }

    pub fn iter_slice_mut<'a>(&'a self, slice: &'a mut [f64], chunk: usize) -> impl Iterator<Item = &'a mut [f64]> {
        let start = &self.start;
        let shape = &self.shape;
        let count = &self.count;
        let s = chunk;
        let r = shape.0 * s;
        let q = shape.1 * r;

        assert!(slice.len() == shape.0 * shape.1 * shape.2 * chunk);

        slice[start.2 * q .. (start.2 + count.2) * q]
        .chunks_exact_mut(q).flat_map(move |k| k[start.1 * r .. (start.1 + count.1) * r]
        .chunks_exact_mut(r).flat_map(move |j| j[start.0 * s .. (start.0 + count.0) * s]
        .chunks_exact_mut(s)))
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{range3d, Axis};

    const NUM_FIELDS: usize = 2;

    #[test]
    fn memory_region_selects_the_correct_number_of_chunks() {
        let parent = range3d(0..10, 0..12, 0..14);
        let region = range3d(2..5, 3..7, 1..6).memory_region_in(&parent);
        let data = vec![1.0; parent.len() * NUM_FIELDS];
        assert_eq!(region.iter_slice(&data, NUM_FIELDS).count(), 3 * 4 * 5);
        assert_eq!(region.len(), 60);
    }

    #[test]
    fn memory_region_visits_cells_in_linear_offset_order() {
        let parent = range3d(-2..4, -2..3, -1..2);
        let child = range3d(-1..2, 0..2, 0..2);
        let data: Vec<f64> = (0..parent.len()).map(|n| n as f64).collect();
        let region = child.memory_region_in(&parent);
        let visited: Vec<f64> = region.iter_slice(&data, 1).map(|x| x[0]).collect();
        let expected: Vec<f64> = child.iter().map(|index| parent.linear_offset(index) as f64).collect();
        assert_eq!(visited, expected);
    }

    #[test]
    fn memory_region_can_be_written() {
        let parent = range3d(0..4, 0..4, 0..4);
        let mut data = vec![0.0; parent.len()];
        let region = range3d(1..3, 1..3, 1..3).memory_region_in(&parent);
        for x in region.iter_slice_mut(&mut data, 1) {
            x[0] = 1.0;
        }
        assert_eq!(data.iter().sum::<f64>(), 8.0);
        assert_eq!(data[parent.linear_offset((1, 1, 1))], 1.0);
        assert_eq!(data[parent.linear_offset((0, 1, 1))], 0.0);
    }

    #[test]
    fn intersection_works() {
        let a = range3d(0..10, 0..10, 0..10);
        let b = range3d(5..15, -5..5, 9..20);
        assert_eq!(a.intersect(&b), Some(range3d(5..10, 0..5, 9..10)));
        assert_eq!(a.intersect(&range3d(10..12, 0..10, 0..10)), None);
        assert!(!a.overlaps(&range3d(0..10, 0..10, 10..11)));
    }

    #[test]
    fn slabs_border_the_space() {
        let a = range3d(0..4, 0..5, 0..6);
        assert_eq!(a.lower_slab(2, Axis::I), range3d(-2..0, 0..5, 0..6));
        assert_eq!(a.upper_slab(1, Axis::K), range3d(0..4, 0..5, 6..7));
    }

    #[test]
    fn bisect_splits_the_longest_axis() {
        let (a, b) = range3d(0..2, 0..9, 0..3).bisect();
        assert_eq!(a, range3d(0..2, 0..4, 0..3));
        assert_eq!(b, range3d(0..2, 4..9, 0..3));
    }

    #[test]
    fn coarsen_covers_the_fine_space() {
        let fine = range3d(-3..5, 0..8, 1..2);
        assert_eq!(fine.coarsen((1, 2, 0)), range3d(-2..3, 0..2, 1..2));
    }

    #[test]
    fn iteration_is_first_index_fastest() {
        let order: Vec<_> = range3d(0..2, 0..2, 0..1).iter().collect();
        assert_eq!(order, vec![(0, 0, 0), (1, 0, 0), (0, 1, 0), (1, 1, 0)]);
    }
}
