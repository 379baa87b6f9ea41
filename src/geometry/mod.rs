//! Geometry descriptors: the physical domain (`Background`), rectangular
//! index-space regions (`Subgrid`, `SubgridArray`), the process topology,
//! and the decomposed `Grid` built from them.

pub mod background;
pub mod grid;
pub mod subgrid;
pub mod topology;

pub use background::Background;
pub use grid::Grid;
pub use subgrid::{Subgrid, SubgridArray};
pub use topology::Topology;




/**
 * Return the integer `e` satisfying `p = 2^e`, or `None` if `p` is not an
 * exact power of two (zero included).
 */
pub fn exact_log2(p: u64) -> Option<u32> {
    if p.is_power_of_two() {
        Some(p.trailing_zeros())
    } else {
        None
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::exact_log2;

    #[test]
    fn exact_log2_accepts_powers_of_two() {
        assert_eq!(exact_log2(1), Some(0));
        assert_eq!(exact_log2(2), Some(1));
        assert_eq!(exact_log2(8), Some(3));
        assert_eq!(exact_log2(1 << 40), Some(40));
    }

    #[test]
    fn exact_log2_rejects_everything_else() {
        assert_eq!(exact_log2(0), None);
        assert_eq!(exact_log2(6), None);
        assert_eq!(exact_log2(12), None);
        assert!((1..1000u64).filter(|p| exact_log2(*p).is_some()).count() == 10);
    }
}
