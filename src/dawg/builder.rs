//! Incremental construction of a minimal DAWG from sorted input.
//!
//! Words arrive in strictly increasing lexicographic order. The builder
//! keeps only the right fringe of the graph unconfirmed — a stack of edges
//! that later words may still extend — and folds everything deeper than the
//! common prefix of consecutive words into a registry of canonical nodes.
//! The result is minimal without any global post-pass: two sub-graphs are
//! shared the moment their canonical names collide.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use smallvec::SmallVec;

use super::error::{DawgError, Result};
use super::finder::Finder;
use super::serialize;
use super::source::Source;

pub(crate) const ROOT: u32 = 0;

/// An outgoing edge of an in-memory node.
///
/// `skip` is the number of words lexicographically before this edge at its
/// node; it stays zero until `finish` runs the counting pass.
#[derive(Clone, Debug, Default)]
pub(crate) struct Edge {
    pub(crate) ch: char,
    pub(crate) target: u32,
    pub(crate) skip: u32,
}

/// An in-memory node. Edges are strictly ascending by character, which
/// sorted input guarantees by construction.
#[derive(Clone, Debug, Default)]
pub(crate) struct Node {
    pub(crate) is_final: bool,
    pub(crate) edges: SmallVec<[Edge; 2]>,
}

/// A pending parent→child edge on the right fringe, not yet eligible for
/// minimization because a later word could still grow the child.
struct Unchecked {
    parent: u32,
    ch: char,
    child: u32,
}

/// Structural identity of a minimized node: final flag plus the ordered
/// `(char, target)` edge list. Two nodes with equal names recognize the
/// same residual language, because every target is already canonical when
/// the name is taken.
#[derive(PartialEq, Eq, Hash)]
struct NodeName {
    is_final: bool,
    edges: SmallVec<[(char, u32); 2]>,
}

struct Graph {
    nodes: Vec<Node>,
    unchecked: Vec<Unchecked>,
    registry: HashMap<NodeName, u32>,
    free: Vec<u32>,
    last_word: Vec<char>,
    num_added: usize,
}

enum State {
    Building(Graph),
    Finished(Arc<[u8]>),
}

/// Builds a DAWG from words added in strictly increasing order.
///
/// After all words are added, [`finish`](Builder::finish) serializes the
/// graph into its bit-packed image and hands back a [`Finder`] that queries
/// the image in place; the in-memory graph is dropped at that point.
///
/// # Examples
///
/// ```
/// use diskdawg::dawg::Builder;
///
/// let mut builder = Builder::new();
/// for word in ["cat", "catnip", "cats"] {
///     builder.add(word)?;
/// }
/// let finder = builder.finish()?;
/// assert_eq!(finder.index_of("catnip")?, Some(1));
/// # Ok::<(), diskdawg::dawg::DawgError>(())
/// ```
pub struct Builder {
    state: State,
}

impl Builder {
    /// Creates an empty builder with a non-final root.
    pub fn new() -> Self {
        Builder {
            state: State::Building(Graph {
                nodes: vec![Node::default()],
                unchecked: Vec::new(),
                registry: HashMap::new(),
                free: Vec::new(),
                last_word: Vec::new(),
                num_added: 0,
            }),
        }
    }

    /// Returns true if `word` can be added: the builder is unfinished and
    /// `word` sorts strictly after every word added so far.
    pub fn can_add(&self, word: &str) -> bool {
        match &self.state {
            State::Building(graph) => {
                graph.num_added == 0 || word.chars().gt(graph.last_word.iter().copied())
            }
            State::Finished(_) => false,
        }
    }

    /// Adds a word.
    ///
    /// # Errors
    ///
    /// [`DawgError::OrderViolation`] if `word` does not sort strictly after
    /// the previously added word, [`DawgError::AfterFinish`] if the builder
    /// has already been finished.
    pub fn add(&mut self, word: &str) -> Result<()> {
        let graph = match &mut self.state {
            State::Building(graph) => graph,
            State::Finished(_) => return Err(DawgError::AfterFinish),
        };

        let chars: SmallVec<[char; 32]> = word.chars().collect();
        if graph.num_added > 0 && chars[..] <= graph.last_word[..] {
            let previous: String = graph.last_word.iter().collect();
            log::warn!("rejected out-of-order word {word:?} after {previous:?}");
            return Err(DawgError::OrderViolation {
                previous,
                word: word.to_string(),
            });
        }

        let common = chars
            .iter()
            .zip(&graph.last_word)
            .take_while(|(a, b)| a == b)
            .count();

        // Everything deeper than the shared prefix is settled: no later
        // word can touch it, so it is safe to fold into the registry.
        graph.minimize(common);

        let mut node = match graph.unchecked.last() {
            Some(entry) => entry.child,
            None => ROOT,
        };
        for &ch in &chars[common..] {
            let child = graph.new_node();
            debug_assert!(graph.nodes[node as usize]
                .edges
                .last()
                .map_or(true, |e| e.ch < ch));
            graph.nodes[node as usize].edges.push(Edge {
                ch,
                target: child,
                skip: 0,
            });
            graph.unchecked.push(Unchecked {
                parent: node,
                ch,
                child,
            });
            node = child;
        }
        graph.nodes[node as usize].is_final = true;

        graph.last_word = chars.into_vec();
        graph.num_added += 1;
        Ok(())
    }

    /// Finishes construction and returns a finder over the serialized image.
    ///
    /// The in-memory graph is minimized down to the root, annotated with
    /// skip counts, renumbered in depth-first preorder, serialized into an
    /// owned buffer and dropped. Calling `finish` again returns another
    /// finder over the same cached image.
    ///
    /// # Errors
    ///
    /// [`DawgError::EncodingLimit`] if a word, node or edge count exceeds
    /// the varint range, [`DawgError::Io`] if the image would overflow the
    /// 32-bit size field.
    pub fn finish(&mut self) -> Result<Finder<Source>> {
        let mut graph =
            match std::mem::replace(&mut self.state, State::Finished(Arc::from(&[][..]))) {
                State::Finished(bytes) => {
                    self.state = State::Finished(bytes.clone());
                    return Finder::read(Source::bytes(bytes), 0);
                }
                State::Building(graph) => graph,
            };

        // On failure the builder stays finished over an empty image; the
        // fringe has already been folded, so it cannot accept more words.
        let image = Self::serialize_graph(&mut graph)?;
        let bytes: Arc<[u8]> = image.into();
        self.state = State::Finished(bytes.clone());
        Finder::read(Source::bytes(bytes), 0)
    }

    fn serialize_graph(graph: &mut Graph) -> Result<Vec<u8>> {
        graph.minimize(0);
        graph.assign_skips();
        let nodes = graph.renumber_preorder();
        debug_assert_eq!(nodes.len(), graph.registry.len() + 1);

        let mut image = Vec::new();
        let size = serialize::write_image(&nodes, graph.num_added, &mut image)?;
        log::debug!(
            "serialized {} words into {size} bytes ({} nodes, {} edges)",
            graph.num_added,
            nodes.len(),
            nodes.iter().map(|n| n.edges.len()).sum::<usize>(),
        );
        Ok(image)
    }

    /// Copies the finished image into `sink`, returning the bytes written.
    ///
    /// # Errors
    ///
    /// [`DawgError::NotFinished`] before [`finish`](Builder::finish).
    pub fn write<W: Write>(&self, mut sink: W) -> Result<u64> {
        match &self.state {
            State::Finished(bytes) => {
                sink.write_all(bytes)?;
                Ok(bytes.len() as u64)
            }
            State::Building(_) => Err(DawgError::NotFinished),
        }
    }

    /// Writes the finished image to a file, returning the bytes written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<u64> {
        let mut out = BufWriter::new(File::create(path)?);
        let written = self.write(&mut out)?;
        out.flush()?;
        Ok(written)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

impl Graph {
    fn new_node(&mut self) -> u32 {
        if let Some(id) = self.free.pop() {
            self.nodes[id as usize] = Node::default();
            id
        } else {
            self.nodes.push(Node::default());
            (self.nodes.len() - 1) as u32
        }
    }

    /// Pops fringe entries until at most `down_to` remain, registering each
    /// popped child or redirecting its parent to an equivalent node already
    /// seen. Freed duplicates go back to the allocation pool.
    fn minimize(&mut self, down_to: usize) {
        while self.unchecked.len() > down_to {
            let entry = self
                .unchecked
                .pop()
                .expect("fringe is non-empty while deeper than down_to");
            let name = self.name_of(entry.child);
            match self.registry.entry(name) {
                Entry::Occupied(existing) => {
                    let existing = *existing.get();
                    // The popped edge is always the parent's newest edge.
                    let edge = self.nodes[entry.parent as usize]
                        .edges
                        .last_mut()
                        .expect("parent of a fringe entry has at least one edge");
                    debug_assert_eq!(edge.ch, entry.ch);
                    edge.target = existing;
                    self.free.push(entry.child);
                }
                Entry::Vacant(slot) => {
                    slot.insert(entry.child);
                }
            }
        }
    }

    fn name_of(&self, node: u32) -> NodeName {
        let node = &self.nodes[node as usize];
        NodeName {
            is_final: node.is_final,
            edges: node.edges.iter().map(|e| (e.ch, e.target)).collect(),
        }
    }

    /// Fills every edge's skip count: the number of words that sort before
    /// anything reachable through that edge at its node.
    fn assign_skips(&mut self) {
        let mut memo = vec![None; self.nodes.len()];
        self.count_reachable(ROOT, &mut memo);
    }

    fn count_reachable(&mut self, id: u32, memo: &mut [Option<u32>]) -> u32 {
        if let Some(count) = memo[id as usize] {
            return count;
        }
        let mut reachable = u32::from(self.nodes[id as usize].is_final);
        for i in 0..self.nodes[id as usize].edges.len() {
            self.nodes[id as usize].edges[i].skip = reachable;
            let target = self.nodes[id as usize].edges[i].target;
            reachable += self.count_reachable(target, memo);
        }
        memo[id as usize] = Some(reachable);
        reachable
    }

    /// Returns the reachable nodes renumbered in depth-first preorder with
    /// edge targets rewritten, root first. Preorder keeps each node close
    /// to its first parent in the serialized image.
    fn renumber_preorder(&self) -> Vec<Node> {
        const UNVISITED: u32 = u32::MAX;
        let mut remap = vec![UNVISITED; self.nodes.len()];
        let mut order = Vec::new();
        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            if remap[id as usize] != UNVISITED {
                continue;
            }
            remap[id as usize] = order.len() as u32;
            order.push(id);
            for edge in self.nodes[id as usize].edges.iter().rev() {
                if remap[edge.target as usize] == UNVISITED {
                    stack.push(edge.target);
                }
            }
        }

        order
            .iter()
            .map(|&old| {
                let node = &self.nodes[old as usize];
                Node {
                    is_final: node.is_final,
                    edges: node
                        .edges
                        .iter()
                        .map(|e| Edge {
                            ch: e.ch,
                            target: remap[e.target as usize],
                            skip: e.skip,
                        })
                        .collect(),
                }
            })
            .collect()
    }
}

/// Builds a finder from an iterator of words in sorted order.
///
/// # Examples
///
/// ```
/// use diskdawg::dawg::build_dawg;
///
/// let finder = build_dawg(["BAKE", "CAKE", "FAKE", "LAKE", "MAKE"])?;
/// assert_eq!(finder.index_of("CAKE")?, Some(1));
/// assert_eq!(finder.index_of("AKE")?, None);
/// # Ok::<(), diskdawg::dawg::DawgError>(())
/// ```
pub fn build_dawg<I>(words: I) -> Result<Finder<Source>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut builder = Builder::new();
    for word in words {
        builder.add(word.as_ref())?;
    }
    builder.finish()
}

/// Builds a finder from a dictionary file, one word per line.
///
/// Words must be in sorted order. Empty lines are skipped and lines whose
/// first non-blank character is `#` are treated as comments.
pub fn build_dawg_from_file<P: AsRef<Path>>(path: P) -> Result<Finder<Source>> {
    let mut builder = Builder::new();
    let mut reader = BufReader::new(File::open(path)?);

    // read_line into a reused buffer instead of lines(), avoiding a String
    // allocation per word.
    let mut buf = String::with_capacity(80);
    loop {
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        let word = buf.trim_end();
        if !word.is_empty() && !is_comment(word) {
            builder.add(word)?;
        }
        buf.clear();
    }
    builder.finish()
}

/// Returns true if this line is a comment.
fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

#[cfg(test)]
mod test {
    use super::*;

    fn order_err(result: Result<()>) -> (String, String) {
        match result {
            Err(DawgError::OrderViolation { previous, word }) => (previous, word),
            other => panic!("expected OrderViolation, got {other:?}"),
        }
    }

    #[test]
    fn sorted_input_words_give_no_error() {
        assert!(build_dawg(["ALFA", "BRAVO", "CHARLIE", "DELTA"]).is_ok());
    }

    #[test]
    fn unsorted_input_words_give_error() {
        use itertools::Itertools;
        const SORTED_WORDS: [&str; 6] = ["ALFA", "BRAVO", "CHARLIE", "DELTA", "ECHO", "FOXTROT"];
        let mut sorted_count = 0;
        // Every permutation except the sorted one must be rejected.
        for wordlist in SORTED_WORDS.iter().permutations(SORTED_WORDS.len()) {
            let is_sorted = wordlist
                .iter()
                .zip(SORTED_WORDS.iter())
                .all(|(a, b)| **a == *b);
            assert_eq!(build_dawg(wordlist).is_ok(), is_sorted);
            sorted_count += is_sorted as i32;
        }
        assert_eq!(sorted_count, 1);
    }

    #[test]
    fn same_word_twice_gives_error() {
        let mut builder = Builder::new();
        builder.add("ALFA").unwrap();
        builder.add("BRAVO").unwrap();
        let (previous, word) = order_err(builder.add("BRAVO"));
        assert_eq!(previous, "BRAVO");
        assert_eq!(word, "BRAVO");
    }

    #[test]
    fn error_reports_the_offending_pair() {
        let mut builder = Builder::new();
        builder.add("GOLF").unwrap();
        let (previous, word) = order_err(builder.add("FOXTROT"));
        assert_eq!(previous, "GOLF");
        assert_eq!(word, "FOXTROT");
    }

    #[test]
    fn prefix_of_previous_word_gives_error() {
        let mut builder = Builder::new();
        builder.add("CART").unwrap();
        order_err(builder.add("CAR"));
    }

    #[test]
    fn can_add_tracks_order_and_finish() {
        let mut builder = Builder::new();
        assert!(builder.can_add(""));
        assert!(builder.can_add("AARDVARK"));
        builder.add("MANGO").unwrap();
        assert!(!builder.can_add("MANGO"));
        assert!(!builder.can_add("APPLE"));
        assert!(builder.can_add("PAPAYA"));
        builder.finish().unwrap();
        assert!(!builder.can_add("PAPAYA"));
    }

    #[test]
    fn add_after_finish_is_rejected() {
        let mut builder = Builder::new();
        builder.add("ALFA").unwrap();
        builder.finish().unwrap();
        assert!(matches!(builder.add("BRAVO"), Err(DawgError::AfterFinish)));
    }

    #[test]
    fn write_before_finish_is_rejected() {
        let builder = Builder::new();
        let mut out = Vec::new();
        assert!(matches!(
            builder.write(&mut out),
            Err(DawgError::NotFinished)
        ));
    }

    #[test]
    fn finish_is_idempotent() {
        let mut builder = Builder::new();
        builder.add("hello").unwrap();
        builder.add("jello").unwrap();
        let first = builder.finish().unwrap();
        let second = builder.finish().unwrap();
        assert_eq!(first.index_of("jello").unwrap(), Some(1));
        assert_eq!(second.index_of("jello").unwrap(), Some(1));
        assert_eq!(first.num_nodes(), second.num_nodes());
    }

    #[test]
    fn suffix_sharing_minimizes_node_count() {
        // One shared suffix chain: the node count must match a single word
        // of the same shape.
        let single = build_dawg(["ABCDEF"]).unwrap();
        let shared = build_dawg(["ABCDEF", "ABDEF", "ABEF", "AF"]).unwrap();
        assert_eq!(single.num_nodes(), shared.num_nodes());
    }

    #[test]
    fn suffix_sharing_minimizes_node_count_unicode() {
        let single = build_dawg(["授人以鱼不如授人以渔"]).unwrap();
        let shared = build_dawg(["授人以渔", "授人以鱼不如授人以渔"]).unwrap();
        assert_eq!(single.num_nodes(), shared.num_nodes());
    }

    #[test]
    fn counts_for_the_empty_builder() {
        let finder = Builder::new().finish().unwrap();
        assert_eq!(finder.num_added(), 0);
        assert_eq!(finder.num_nodes(), 1);
        assert_eq!(finder.num_edges(), 0);
    }

    #[test]
    fn builder_write_matches_finder_write() {
        let mut builder = Builder::new();
        for word in ["blip", "cat", "catnip"] {
            builder.add(word).unwrap();
        }
        let finder = builder.finish().unwrap();

        let mut from_builder = Vec::new();
        let n = builder.write(&mut from_builder).unwrap();
        let mut from_finder = Vec::new();
        finder.write(&mut from_finder).unwrap();
        assert_eq!(from_builder, from_finder);
        assert_eq!(n as usize, from_builder.len());
    }
}
