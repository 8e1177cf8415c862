//! In-place queries over a serialized DAWG image.
//!
//! A [`Finder`] never materializes nodes: every operation walks the
//! bit-packed records directly in the backing byte source, following
//! absolute bit addresses. Edges within a node are sorted by character and
//! located by binary search; the arithmetic accounts for the first edge's
//! record being `wbits` shorter than the rest (its skip count is implied
//! by the node's final bit).

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use smallvec::SmallVec;

use super::bits::{bit_len, BitReader};
use super::error::{corrupt, DawgError, Result};
use super::source::{read_exact_at, ReadAt, Source};
use super::varint::read_unsigned;

/// A stored word together with its insertion-order index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FindResult {
    /// The stored word.
    pub word: String,
    /// The order in which the word was added, starting at 0.
    pub index: usize,
}

/// Directs [`Finder::enumerate`] from inside the callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enumeration {
    /// Descend into this prefix's continuations.
    Continue,
    /// Skip every word extending this prefix, continue with siblings.
    Skip,
    /// Abort the whole traversal immediately.
    Stop,
}

/// The address callers use for the root node; the finder substitutes the
/// real offset of the first record.
const ROOT_ADDR: u64 = 0;

/// An edge resolved by [`Finder::get_edge`]-style lookup.
struct EdgeHit {
    target: u64,
    skip: usize,
    target_final: bool,
}

/// One decoded edge of a node record.
struct RawEdge {
    ch: char,
    skip: usize,
    target: u64,
}

/// A transiently decoded node record.
struct NodeView {
    is_final: bool,
    edges: SmallVec<[RawEdge; 4]>,
}

/// Read-only queries over a serialized DAWG.
///
/// Obtained from [`Builder::finish`](super::builder::Builder::finish)
/// (backed by the owned image), [`Finder::load`] (a memory-mapped or
/// buffered file) or [`Finder::read`] (any [`ReadAt`] source, possibly at
/// a non-zero offset). All queries take `&self` and keep their cursor on
/// the stack, so a finder may be shared freely across threads; `close`
/// takes `&mut self` and therefore cannot race them.
///
/// # Examples
///
/// ```
/// use diskdawg::dawg::build_dawg;
///
/// let finder = build_dawg(["blip", "cat", "catnip", "cats"])?;
/// assert_eq!(finder.index_of("cats")?, Some(3));
/// assert_eq!(finder.at_index(1)?, "cat");
///
/// let prefixes = finder.find_all_prefixes_of("catsup")?;
/// let words: Vec<&str> = prefixes.iter().map(|r| r.word.as_str()).collect();
/// assert_eq!(words, ["cat", "cats"]);
/// # Ok::<(), diskdawg::dawg::DawgError>(())
/// ```
pub struct Finder<S: ReadAt = Source> {
    source: Option<S>,
    base: u64,
    size: u64,
    cbits: u32,
    abits: u32,
    wbits: u32,
    num_added: usize,
    num_nodes: usize,
    num_edges: usize,
    first_node_offset: u64,
    has_empty_word: bool,
}

impl Finder<Source> {
    /// Opens a DAWG file for in-place queries.
    ///
    /// With the `mmap` feature (default) the file is memory-mapped and
    /// queries touch only the pages they walk; if mapping fails, or the
    /// feature is disabled, the file is read into a buffer instead.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        #[cfg(feature = "mmap")]
        {
            // SAFETY: the map is read-only and the format is self-sized;
            // concurrent truncation of the file is the caller's contract
            // violation, as with any mapped reader.
            match File::open(path).and_then(|file| unsafe { memmap2::Mmap::map(&file) }) {
                Ok(map) => return Finder::read(Source::Mmap(map), 0),
                Err(err) => {
                    log::debug!(
                        "mmap of {} failed ({err}); falling back to a buffered read",
                        path.display()
                    );
                }
            }
        }
        Finder::read(Source::from(std::fs::read(path)?), 0)
    }
}

impl<S: ReadAt> Finder<S> {
    /// Reads a DAWG beginning at byte `offset` in `source`.
    ///
    /// Several DAWGs may be concatenated in one file; each is fully
    /// described by its own header, starting with its byte size.
    pub fn read(source: S, offset: u64) -> Result<Self> {
        let mut header = [0u8; 4];
        read_exact_at(&source, offset, &mut header)?;
        let size = u64::from(u32::from_be_bytes(header));
        if size < 9 {
            return Err(corrupt(format!("declared image size {size} is too small")));
        }

        let mut r = BitReader::new(&source, offset, size);
        r.skip(32); // past the size field
        let cbits = r.read_bits(8)? as u32;
        let abits = r.read_bits(8)? as u32;
        if cbits > 64 || abits == 0 || abits > 64 {
            return Err(corrupt(format!("implausible bit widths cbits={cbits} abits={abits}")));
        }
        let num_added = read_unsigned(&mut r)? as usize;
        let num_nodes = read_unsigned(&mut r)? as usize;
        let num_edges = read_unsigned(&mut r)? as usize;
        let first_node_offset = r.tell();
        let has_empty_word = r.read_bits(1)? == 1;
        drop(r);

        log::debug!(
            "read image: {size} bytes, {num_added} words, {num_nodes} nodes, \
             {num_edges} edges, cbits={cbits} abits={abits}"
        );

        Ok(Finder {
            source: Some(source),
            base: offset,
            size,
            cbits,
            abits,
            wbits: bit_len(num_added as u64),
            num_added,
            num_nodes,
            num_edges,
            first_node_offset,
            has_empty_word,
        })
    }

    /// Returns the number of words in the dictionary.
    pub fn num_added(&self) -> usize {
        self.num_added
    }

    /// Returns the number of nodes in the graph.
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Returns the number of edges in the graph.
    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    /// Releases the byte source. Every later query fails with
    /// [`DawgError::Closed`].
    pub fn close(&mut self) {
        self.source = None;
    }

    fn reader(&self) -> Result<BitReader<'_, S>> {
        let source = self.source.as_ref().ok_or(DawgError::Closed)?;
        Ok(BitReader::new(source, self.base, self.size))
    }

    /// Resolves the outgoing edge for `ch` at the node record at `addr`.
    ///
    /// Binary search over the edge array; edge `i` starts at
    /// `edge_start + i * (cbits + wbits + abits) - wbits` for `i > 0`
    /// because the first record omits the skip field.
    fn get_edge(
        &self,
        r: &mut BitReader<'_, S>,
        addr: u64,
        ch: char,
    ) -> Result<Option<EdgeHit>> {
        let addr = if addr == ROOT_ADDR {
            self.first_node_offset
        } else {
            addr
        };
        r.seek(addr);
        let node_final = r.read_bits(1)?;
        let single_edge = r.read_bits(1)? == 1;
        let num_edges = if single_edge { 1 } else { read_unsigned(r)? };

        let edge_start = r.tell();
        let stride = u64::from(self.cbits + self.wbits + self.abits);
        let want = ch as u32;

        let mut lo = 0u64;
        let mut hi = num_edges;
        while lo < hi {
            let mid = (lo + hi) / 2;
            let mut at = edge_start + mid * stride;
            if mid > 0 {
                at -= u64::from(self.wbits);
            }
            r.seek(at);
            let found = r.read_bits(self.cbits)? as u32;
            match want.cmp(&found) {
                std::cmp::Ordering::Equal => {
                    let skip = if mid == 0 {
                        node_final
                    } else {
                        r.read_bits(self.wbits)?
                    };
                    let target = r.read_bits(self.abits)?;
                    r.seek(target);
                    let target_final = r.read_bits(1)? == 1;
                    return Ok(Some(EdgeHit {
                        target,
                        skip: skip as usize,
                        target_final,
                    }));
                }
                std::cmp::Ordering::Less => hi = mid,
                std::cmp::Ordering::Greater => lo = mid + 1,
            }
        }
        Ok(None)
    }

    /// Decodes the whole node record at `addr`.
    fn node_at(&self, r: &mut BitReader<'_, S>, addr: u64) -> Result<NodeView> {
        let addr = if addr == ROOT_ADDR {
            self.first_node_offset
        } else {
            addr
        };
        r.seek(addr);
        let node_final = r.read_bits(1)?;
        let single_edge = r.read_bits(1)? == 1;
        let num_edges = if single_edge { 1 } else { read_unsigned(r)? };

        let mut edges = SmallVec::new();
        for i in 0..num_edges {
            let ch = r.read_bits(self.cbits)? as u32;
            let ch = char::from_u32(ch)
                .ok_or_else(|| corrupt(format!("invalid character {ch:#x} in edge record")))?;
            let skip = if i == 0 {
                node_final
            } else {
                r.read_bits(self.wbits)?
            };
            let target = r.read_bits(self.abits)?;
            edges.push(RawEdge {
                ch,
                skip: skip as usize,
                target,
            });
        }
        Ok(NodeView {
            is_final: node_final == 1,
            edges,
        })
    }

    /// Returns the insertion-order index of `word`, or `None` if the word
    /// is not in the dictionary.
    pub fn index_of(&self, word: &str) -> Result<Option<usize>> {
        let mut r = self.reader()?;
        let mut node = ROOT_ADDR;
        let mut skipped = 0;
        let mut is_final = self.has_empty_word;
        for ch in word.chars() {
            match self.get_edge(&mut r, node, ch)? {
                None => return Ok(None),
                Some(hit) => {
                    node = hit.target;
                    skipped += hit.skip;
                    is_final = hit.target_final;
                }
            }
        }
        Ok(is_final.then_some(skipped))
    }

    /// Returns every stored word that is a prefix of `input`, in order of
    /// increasing length.
    pub fn find_all_prefixes_of(&self, input: &str) -> Result<Vec<FindResult>> {
        let mut r = self.reader()?;
        let mut results = Vec::new();
        let mut node = ROOT_ADDR;
        let mut skipped = 0;
        let mut is_final = self.has_empty_word;
        for (pos, ch) in input.char_indices() {
            if is_final {
                results.push(FindResult {
                    word: input[..pos].to_string(),
                    index: skipped,
                });
            }
            match self.get_edge(&mut r, node, ch)? {
                None => return Ok(results),
                Some(hit) => {
                    node = hit.target;
                    skipped += hit.skip;
                    is_final = hit.target_final;
                }
            }
        }
        if is_final {
            results.push(FindResult {
                word: input.to_string(),
                index: skipped,
            });
        }
        Ok(results)
    }

    /// Returns the longest leftmost completion of `prefix`: from the node
    /// the prefix reaches, repeatedly follow the smallest-character edge
    /// down to a node with no continuations. `None` if no stored word
    /// starts with `prefix`.
    pub fn find_by_prefix(&self, prefix: &str) -> Result<Option<FindResult>> {
        if self.num_added == 0 {
            return Ok(None);
        }
        let mut r = self.reader()?;
        let mut node = ROOT_ADDR;
        let mut skipped = 0;
        for ch in prefix.chars() {
            match self.get_edge(&mut r, node, ch)? {
                None => return Ok(None),
                Some(hit) => {
                    node = hit.target;
                    skipped += hit.skip;
                }
            }
        }

        let mut word = prefix.to_string();
        loop {
            let view = self.node_at(&mut r, node)?;
            match view.edges.first() {
                None => {
                    debug_assert!(view.is_final);
                    return Ok(Some(FindResult {
                        word,
                        index: skipped,
                    }));
                }
                Some(edge) => {
                    word.push(edge.ch);
                    skipped += edge.skip;
                    node = edge.target;
                }
            }
        }
    }

    /// Returns the word added at position `index`.
    ///
    /// # Errors
    ///
    /// [`DawgError::OutOfRange`] if `index >= num_added()`.
    pub fn at_index(&self, index: usize) -> Result<String> {
        if index >= self.num_added {
            return Err(DawgError::OutOfRange {
                index,
                len: self.num_added,
            });
        }
        let mut r = self.reader()?;
        let mut node = ROOT_ADDR;
        let mut acc = 0;
        let mut word = String::new();
        loop {
            let view = self.node_at(&mut r, node)?;
            if view.is_final && acc == index {
                return Ok(word);
            }
            // Skips strictly increase across a node's edges (every child
            // reaches at least one word), so the last edge whose skip fits
            // is the unique branch containing `index`.
            let at = view.edges.partition_point(|e| acc + e.skip <= index);
            if at == 0 {
                return Err(corrupt(format!("no branch leads to index {index}")));
            }
            let edge = &view.edges[at - 1];
            acc += edge.skip;
            word.push(edge.ch);
            node = edge.target;
        }
    }

    /// Walks every prefix in the set depth-first in lexicographic order.
    ///
    /// The callback receives the running index (equal to
    /// `index_of(prefix)` whenever `is_final` is true), the prefix itself,
    /// and its final flag, and steers the walk by returning an
    /// [`Enumeration`]. The prefix slice is reused between calls; clone it
    /// if it must outlive the callback.
    pub fn enumerate<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(usize, &[char], bool) -> Enumeration,
    {
        let mut r = self.reader()?;
        let mut prefix = Vec::new();
        self.walk(&mut r, ROOT_ADDR, 0, &mut prefix, &mut f)?;
        Ok(())
    }

    fn walk<F>(
        &self,
        r: &mut BitReader<'_, S>,
        addr: u64,
        index: usize,
        prefix: &mut Vec<char>,
        f: &mut F,
    ) -> Result<Enumeration>
    where
        F: FnMut(usize, &[char], bool) -> Enumeration,
    {
        let view = self.node_at(r, addr)?;
        match f(index, prefix, view.is_final) {
            Enumeration::Stop => return Ok(Enumeration::Stop),
            Enumeration::Skip => return Ok(Enumeration::Continue),
            Enumeration::Continue => {}
        }
        for edge in &view.edges {
            prefix.push(edge.ch);
            let step = self.walk(r, edge.target, index + edge.skip, prefix, f)?;
            prefix.pop();
            if step == Enumeration::Stop {
                return Ok(Enumeration::Stop);
            }
        }
        Ok(Enumeration::Continue)
    }

    /// Copies the backing image into `sink`, returning the bytes written.
    pub fn write<W: Write>(&self, mut sink: W) -> Result<u64> {
        let source = self.source.as_ref().ok_or(DawgError::Closed)?;
        let mut buf = [0u8; 8192];
        let mut offset = 0;
        while offset < self.size {
            let chunk = ((self.size - offset) as usize).min(buf.len());
            read_exact_at(source, self.base + offset, &mut buf[..chunk])?;
            sink.write_all(&buf[..chunk])?;
            offset += chunk as u64;
        }
        Ok(self.size)
    }

    /// Writes the backing image to a file, returning the bytes written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<u64> {
        let mut out = BufWriter::new(File::create(path)?);
        let written = self.write(&mut out)?;
        out.flush()?;
        Ok(written)
    }

    /// Renders the header and every node record with its bit addresses.
    pub fn dump(&self) -> Result<String> {
        let mut out = String::new();
        let mut r = self.reader()?;

        let _ = writeln!(out, "[{:08x}] size={} bytes", 0, self.size);
        let _ = writeln!(out, "[{:08x}] cbits={}", 32, self.cbits);
        let _ = writeln!(out, "[{:08x}] abits={}", 40, self.abits);
        let _ = writeln!(
            out,
            "[{:08x}] words={} nodes={} edges={}",
            48, self.num_added, self.num_nodes, self.num_edges
        );

        r.seek(self.first_node_offset);
        for _ in 0..self.num_nodes {
            let at = r.tell();
            let node_final = r.read_bits(1)?;
            let single_edge = r.read_bits(1)? == 1;
            let num_edges = if single_edge { 1 } else { read_unsigned(&mut r)? };
            let _ = writeln!(
                out,
                "[{at:08x}] node final={node_final} with {num_edges} edges"
            );
            for i in 0..num_edges {
                let edge_at = r.tell();
                let ch = r.read_bits(self.cbits)? as u32;
                let skip = if i == 0 {
                    node_final
                } else {
                    r.read_bits(self.wbits)?
                };
                let target = r.read_bits(self.abits)?;
                let ch = char::from_u32(ch).unwrap_or(char::REPLACEMENT_CHARACTER);
                let _ = writeln!(
                    out,
                    "[{edge_at:08x}] {ch:?} goto <{target:08x}> skipping {skip}"
                );
            }
        }
        Ok(out)
    }
}
