//! Bit-exact emission of the on-disk image.
//!
//! The image is a header followed by one record per node, packed without
//! padding:
//!
//! ```text
//! 32 bits  size_bytes (big-endian)
//!  8 bits  cbits — width of edge characters
//!  8 bits  abits — width of node addresses (absolute bit offsets)
//! varint   num_added
//! varint   num_nodes
//! varint   num_edges
//! per node, in id order (root first):
//!   1 bit  final
//!   1 bit  single edge?
//!   varint num_edges         (only when the node has != 1 edges)
//!   per edge, ascending by character:
//!     cbits  character
//!     wbits  skip count      (omitted on the first edge; implicitly the
//!                             node's final bit)
//!     abits  target address
//! ```
//!
//! `wbits` is not stored: readers derive it from `num_added`. Node
//! addresses depend on `abits`, and `abits` depends on the total image
//! size, so the layout is iterated to a fixed point before anything is
//! written.

use std::io::{self, Write};

use super::bits::{bit_len, BitWriter};
use super::builder::Node;
use super::error::Result;
use super::varint::{unsigned_length, write_unsigned};

/// Fixed header bits before the varints: size, cbits, abits.
const HEADER_BITS: u64 = 32 + 8 + 8;

/// Serializes the finished, renumbered graph into `sink` and returns the
/// image size in bytes.
pub(crate) fn write_image<W: Write>(nodes: &[Node], num_added: usize, sink: W) -> Result<u64> {
    let num_edges: usize = nodes.iter().map(|n| n.edges.len()).sum();
    let max_char = nodes
        .iter()
        .flat_map(|n| &n.edges)
        .map(|e| e.ch as u32)
        .max()
        .unwrap_or(0);

    let cbits = bit_len(u64::from(max_char));
    let wbits = bit_len(num_added as u64);

    // The address width feeds back into the addresses themselves: grow it
    // until the final bit position fits. Monotone, so this settles in a
    // handful of rounds.
    let mut abits = 1u32;
    let mut addresses = vec![0u64; nodes.len()];
    let mut pos;
    loop {
        pos = HEADER_BITS;
        pos += u64::from(unsigned_length(num_added as u64)?) * 8;
        pos += u64::from(unsigned_length(nodes.len() as u64)?) * 8;
        pos += u64::from(unsigned_length(num_edges as u64)?) * 8;

        for (node, address) in nodes.iter().zip(&mut addresses) {
            *address = pos;
            pos += 2; // final bit + single-edge bit
            let ne = node.edges.len() as u64;
            if ne != 1 {
                pos += u64::from(unsigned_length(ne)?) * 8;
            }
            if ne >= 1 {
                // First edge carries no skip field.
                pos += ne * u64::from(cbits + wbits + abits) - u64::from(wbits);
            }
        }

        if bit_len(pos) <= abits {
            break;
        }
        abits = bit_len(pos);
    }

    let size = pos.div_ceil(8);
    if size > u64::from(u32::MAX) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("image of {size} bytes exceeds the 32-bit size field"),
        )
        .into());
    }

    let mut w = BitWriter::new(sink);
    w.write_bits(size, 32)?;
    w.write_bits(u64::from(cbits), 8)?;
    w.write_bits(u64::from(abits), 8)?;
    write_unsigned(&mut w, num_added as u64)?;
    write_unsigned(&mut w, nodes.len() as u64)?;
    write_unsigned(&mut w, num_edges as u64)?;

    for node in nodes {
        w.write_bits(u64::from(node.is_final), 1)?;
        if node.edges.len() == 1 {
            w.write_bits(1, 1)?;
        } else {
            w.write_bits(0, 1)?;
            write_unsigned(&mut w, node.edges.len() as u64)?;
        }
        for (i, edge) in node.edges.iter().enumerate() {
            w.write_bits(u64::from(edge.ch as u32), cbits)?;
            if i > 0 {
                w.write_bits(u64::from(edge.skip), wbits)?;
            }
            w.write_bits(addresses[edge.target as usize], abits)?;
        }
    }
    w.flush()?;

    Ok(size)
}
