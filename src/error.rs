use std::error;
use std::fmt;
use std::io;

#[derive(Debug)]

/**
 * Error to represent invalid grid configuration, broken geometry invariants,
 * failed allocations, misuse of the halo exchange protocol, and failures of
 * the message transport.
 */
pub enum Error {
    InvalidTopology { p: usize, q: usize, r: usize, size: usize },
    InvalidRefinement { axis: char, ratio: u32 },
    InvalidDecomposition(String),
    GeometryInvariant(String),
    Allocation { bytes: usize },
    Protocol(String),
    Transport(String),
    Io(io::Error),
    Codec(String),
}




// ============================================================================
impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        use Error::*;

        match self {
            InvalidTopology { p, q, r, size } => write!(
                fmt,
                "process topology {} x {} x {} does not match {} processes",
                p, q, r, size
            ),
            InvalidRefinement { axis, ratio } => write!(
                fmt,
                "refinement ratio {} on axis {} is not a power of two",
                ratio, axis
            ),
            InvalidDecomposition(msg) => write!(fmt, "invalid decomposition: {}", msg),
            GeometryInvariant(msg) => write!(fmt, "grid geometry invariant violated: {}", msg),
            Allocation { bytes } => write!(fmt, "failed to allocate {} bytes", bytes),
            Protocol(msg) => write!(fmt, "halo exchange protocol error: {}", msg),
            Transport(msg) => write!(fmt, "message transport failed: {}", msg),
            Io(e) => write!(fmt, "i/o error: {}", e),
            Codec(msg) => write!(fmt, "message encoding failed: {}", msg),
        }
    }
}




// ============================================================================
impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}




// ============================================================================
impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
