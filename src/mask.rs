use crate::box_loop::DataView;
use crate::index_space::{Index, IndexSpace};

/**
 * How a block of base-level cells relates to a geometric solid.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Coverage {
    Inside,
    Outside,
    Partial,
}

/**
 * A region of the domain, tested on base-level (unrefined) cells. Solids
 * which can cheaply classify whole blocks let the masked loops skip the
 * per-cell test; the default classification always answers `Partial`.
 */
pub trait GeomSolid {
    fn contains(&self, index: Index) -> bool;

    fn classify(&self, _region: &IndexSpace) -> Coverage {
        Coverage::Partial
    }
}

/**
 * A solid which is a box of base-level cells.
 */
#[derive(Clone, Debug)]
pub struct BoxSolid {
    space: IndexSpace,
}




// ============================================================================
impl BoxSolid {
    pub fn new(space: IndexSpace) -> Self {
        Self { space }
    }
}




// ============================================================================
impl GeomSolid for BoxSolid {
    fn contains(&self, index: Index) -> bool {
        self.space.contains(index)
    }

    fn classify(&self, region: &IndexSpace) -> Coverage {
        if self.space.contains_space(region) {
            Coverage::Inside
        } else if self.space.overlaps(region) {
            Coverage::Partial
        } else {
            Coverage::Outside
        }
    }
}

/**
 * A solid given by one flag per base-level cell of a bounding box. Cells
 * outside the box are outside the solid.
 */
#[derive(Clone, Debug)]
pub struct MaskSolid {
    space: IndexSpace,
    mask: Vec<bool>,
}




// ============================================================================
impl MaskSolid {
    pub fn from_fn<F: Fn(Index) -> bool>(space: IndexSpace, f: F) -> Self {
        let mask = space.iter().map(f).collect();
        Self { space, mask }
    }

    pub fn num_inside(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }
}




// ============================================================================
impl GeomSolid for MaskSolid {
    fn contains(&self, index: Index) -> bool {
        self.space.contains(index) && self.mask[self.space.linear_offset(index)]
    }

    fn classify(&self, region: &IndexSpace) -> Coverage {
        if self.space.overlaps(region) {
            Coverage::Partial
        } else {
            Coverage::Outside
        }
    }
}

/**
 * Blocks at or below this many cells are tested cell by cell.
 */
const LEAF_CELLS: usize = 64;

/**
 * Call `f` once for every cell of `region` whose base-level cell lies in
 * the solid. The region is at the given refinement levels; a cell maps to
 * the base cell containing it. Blocks the solid classifies as wholly inside
 * or outside are handled without testing their cells. Within a block cells
 * are visited in box order.
 */
pub fn inside_loop<S, F>(solid: &S, levels: (u32, u32, u32), region: &IndexSpace, mut f: F)
where
    S: GeomSolid + ?Sized,
    F: FnMut(Index),
{
    visit(solid, levels, region, &mut f)
}

fn visit<S, F>(solid: &S, levels: (u32, u32, u32), region: &IndexSpace, f: &mut F)
where
    S: GeomSolid + ?Sized,
    F: FnMut(Index),
{
    if region.is_empty() {
        return;
    }
    match solid.classify(&region.coarsen(levels)) {
        Coverage::Outside => {}
        Coverage::Inside => region.iter().for_each(&mut *f),
        Coverage::Partial if region.len() <= LEAF_CELLS => {
            for index in region.iter() {
                if solid.contains(coarsen(index, levels)) {
                    f(index)
                }
            }
        }
        Coverage::Partial => {
            let (a, b) = region.bisect();
            visit(solid, levels, &a, f);
            visit(solid, levels, &b, f);
        }
    }
}

/**
 * Like `inside_loop`, but also hand `f` the offset of each visited cell in
 * every one of the given views. The region must lie inside every view.
 */
pub fn masked_loop<S, F, const N: usize>(
    solid: &S,
    levels: (u32, u32, u32),
    region: &IndexSpace,
    views: [&DataView; N],
    mut f: F,
) where
    S: GeomSolid + ?Sized,
    F: FnMut(Index, [usize; N]),
{
    for view in views {
        assert!(view.space().contains_space(region), "masked loop region is not inside the view");
    }
    inside_loop(solid, levels, region, |index| f(index, views.map(|v| v.offset(index))))
}

fn coarsen(index: Index, levels: (u32, u32, u32)) -> Index {
    (index.0 >> levels.0, index.1 >> levels.1, index.2 >> levels.2)
}
