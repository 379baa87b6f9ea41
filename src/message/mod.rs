//! This module exports a minimal message-passing API, which is encapsulated
//! by a `Communicator` trait. Implementors only need to write tagged `send`
//! and `recv` operations for a given transport layer (an in-process channel
//! transport and a pure-Rust TCP transport are included). The trait then
//! provides default implementations for broadcast, reduce, all-reduce,
//! gather, and barrier operations. A shared `Fault` lets a group of ranks
//! abort blocked receives when one of them fails.
//!

mod backoff;
pub mod channel;
pub mod comm;
pub mod fault;
pub mod mailbox;
pub mod tcp;
pub mod util;

pub use channel::ChannelCommunicator;
pub use comm::{Communicator, Envelope, Tag};
pub use fault::Fault;
pub use tcp::TcpCommunicator;
