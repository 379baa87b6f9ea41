use log::error;

use super::UpdateMode;
use crate::error::Error;
use crate::message::Tag;
use crate::vector::Vector;

/**
 * One halo exchange in flight, returned by `Vector::post_update`. The
 * handle holds the exclusive borrow of the vector, so the vector can be
 * neither read, written, reallocated, nor posted again until the exchange
 * is completed. A handle dropped without calling `complete` completes the
 * exchange in its destructor and logs the omission, unless the thread is
 * unwinding from a panic, in which case the exchange is abandoned.
 */
#[must_use = "a posted exchange must be completed"]
pub struct CommHandle<'a> {
    vector: &'a mut Vector,
    mode: UpdateMode,
    tag: Tag,
    done: bool,
}




// ============================================================================
impl<'a> CommHandle<'a> {
    pub(crate) fn new(vector: &'a mut Vector, mode: UpdateMode, tag: Tag) -> Self {
        Self {
            vector,
            mode,
            tag,
            done: false,
        }
    }

    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    /**
     * Block until every message of this exchange has arrived and its values
     * are written to the ghost cells.
     */
    pub fn complete(mut self) -> Result<(), Error> {
        self.done = true;
        self.vector.finish_update(self.mode, self.tag)
    }
}




// ============================================================================
impl Drop for CommHandle<'_> {
    fn drop(&mut self) {
        if !self.done && std::thread::panicking() {
            error!(
                "exchange {:?} on vector {} abandoned while unwinding",
                self.tag,
                self.vector.serial()
            );
        } else if !self.done {
            error!(
                "exchange {:?} on vector {} was never completed; completing it now",
                self.tag,
                self.vector.serial()
            );
            if let Err(e) = self.vector.finish_update(self.mode, self.tag) {
                error!("{}", e)
            }
        }
    }
}
