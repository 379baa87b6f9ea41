use std::ops::Range;

use log::debug;

use super::compute_pkg::Transfer;
use super::{ComputePkg, UpdateMode};
use crate::error::Error;
use crate::index_space::MemoryRegion;
use crate::message::{util, Communicator, Tag};
use crate::vector::Subvector;




/**
 * One region of a message, located in the arena: the range of the owning
 * subvector and the cells selected within it.
 */
#[derive(Clone, Debug)]
struct Block {
    range: Range<usize>,
    region: MemoryRegion,
}




/**
 * The blocks exchanged with one peer, and the number of values carried.
 */
#[derive(Clone, Debug)]
struct Message {
    rank: usize,
    blocks: Vec<Block>,
    len: usize,
}




/**
 * An exchange plan bound to the memory layout of one vector. Packing reads
 * the outgoing regions directly out of the arena and unpacking writes the
 * ghost cells in place, so no intermediate copies of the subvectors are
 * made.
 */
#[derive(Clone, Debug)]
pub struct CommPkg {
    mode: UpdateMode,
    num_components: usize,
    sends: Vec<Message>,
    recvs: Vec<Message>,
}




// ============================================================================
impl CommPkg {

    pub fn new(compute: &ComputePkg, subvectors: &[Subvector], num_components: usize) -> Self {
        let compile = |transfers: &[Transfer]| -> Vec<Message> {
            transfers
                .iter()
                .map(|transfer| {
                    let blocks: Vec<_> = transfer
                        .regions
                        .iter()
                        .map(|r| {
                            let subvector = &subvectors[r.local];
                            Block {
                                range: subvector.range(),
                                region: r.space.memory_region_in(subvector.data_space()),
                            }
                        })
                        .collect();
                    Message {
                        rank: transfer.rank,
                        len: transfer.num_cells() * num_components,
                        blocks,
                    }
                })
                .collect()
        };
        Self {
            mode: compute.mode(),
            num_components,
            sends: compile(compute.sends()),
            recvs: compile(compute.recvs()),
        }
    }

    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    /**
     * Return the ranks this plan sends to, in send order.
     */
    pub fn send_ranks(&self) -> impl Iterator<Item = usize> + '_ {
        self.sends.iter().map(|m| m.rank)
    }

    /**
     * Return the ranks this plan receives from, in receive order.
     */
    pub fn recv_ranks(&self) -> impl Iterator<Item = usize> + '_ {
        self.recvs.iter().map(|m| m.rank)
    }

    /**
     * Pack every outgoing message from the arena and hand it to the
     * communicator. This does not wait for any peer.
     */
    pub fn post(&self, data: &[f64], comm: &dyn Communicator, tag: Tag) -> Result<(), Error> {
        for message in &self.sends {
            let mut values = Vec::with_capacity(message.len);

            for block in &message.blocks {
                for cell in block.region.iter_slice(&data[block.range.clone()], self.num_components) {
                    values.extend_from_slice(cell)
                }
            }
            debug!("send {} values to rank {} {:?}", values.len(), message.rank, tag);
            comm.send(message.rank, tag, util::encode_f64s(&values))?;
        }
        Ok(())
    }

    /**
     * Wait for every incoming message of the exchange with the given tag and
     * write its values into the ghost cells of the arena.
     */
    pub fn complete(&self, data: &mut [f64], comm: &dyn Communicator, tag: Tag) -> Result<(), Error> {
        for message in &self.recvs {
            let bytes = comm.recv(message.rank, tag)?;
            let values = util::decode_f64s(&bytes)
                .filter(|values| values.len() == message.len)
                .ok_or_else(|| Error::Protocol(format!(
                    "expected {} values from rank {} {:?}, got {} bytes",
                    message.len, message.rank, tag, bytes.len())))?;

            debug!("recv {} values from rank {} {:?}", values.len(), message.rank, tag);

            let mut source = values.chunks_exact(self.num_components);

            for block in &message.blocks {
                let slice = &mut data[block.range.clone()];

                for (cell, value) in block.region.iter_slice_mut(slice, self.num_components).zip(&mut source) {
                    cell.copy_from_slice(value)
                }
            }
        }
        Ok(())
    }
}
