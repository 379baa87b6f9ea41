use std::ops::Range;

use crate::box_loop::DataView;
use crate::geometry::Subgrid;
use crate::index_space::IndexSpace;




/**
 * The storage of one vector over one local subgrid: a range of the vector's
 * arena holding the subgrid's cells padded with ghost cells on every side.
 */
#[derive(Clone, Debug)]
pub struct Subvector {
    subgrid: Subgrid,
    view: DataView,
    range: Range<usize>,
}




// ============================================================================
impl Subvector {

    pub(crate) fn new(subgrid: Subgrid, num_ghost: i64, num_components: usize, start: usize) -> Self {
        let view = DataView::new(subgrid.space().extend_all(num_ghost), num_components);
        let range = start..start + view.len();
        Self { subgrid, view, range }
    }

    pub fn subgrid(&self) -> &Subgrid {
        &self.subgrid
    }

    /**
     * The cells owned by this subvector, without ghosts.
     */
    pub fn interior(&self) -> &IndexSpace {
        self.subgrid.space()
    }

    /**
     * The ghost-padded index space covered by the data.
     */
    pub fn data_space(&self) -> &IndexSpace {
        self.view.space()
    }

    /**
     * The layout of the data slice, for use with `BoxLoop`.
     */
    pub fn view(&self) -> &DataView {
        &self.view
    }

    /**
     * The position of this subvector's data within the vector arena.
     */
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}
