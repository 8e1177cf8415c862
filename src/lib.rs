//! # diskdawg
//!
//! An indexed [DAWG](https://en.wikipedia.org/wiki/Deterministic_acyclic_finite_state_automaton)
//! (Directed Acyclic Word Graph) dictionary with a bit-packed on-disk
//! format that is queried in place.
//!
//! A DAWG is a minimal acyclic finite-state automaton — essentially a trie
//! with shared suffixes — giving compact storage and O(word length)
//! lookups. This implementation additionally annotates every edge with a
//! skip count, so each stored word maps to a dense integer index in
//! insertion order and back, in constant time per edge.
//!
//! ## Features
//!
//! - **Indexed both ways**: `index_of` and `at_index` translate between
//!   words and their insertion-order indexes.
//! - **Compact**: suffix sharing plus a bit-packed image with no padding
//!   and no practical limits on alphabet or node count.
//! - **Queried in place**: the serialized image is the only query
//!   structure; loading a dictionary memory-maps it and walks the bits
//!   directly, allocating nothing per node.
//! - **Thread-safe**: a [`Finder`](dawg::Finder) is immutable and every
//!   query keeps its cursor on the stack.
//!
//! ## Quick Start
//!
//! Words must be added in strictly increasing lexicographic order; the
//! builder minimizes the graph on the fly:
//!
//! ```
//! use diskdawg::dawg::build_dawg;
//!
//! let finder = build_dawg(["BAKE", "CAKE", "FAKE", "LAKE", "MAKE"])?;
//! assert_eq!(finder.index_of("CAKE")?, Some(1));
//! assert_eq!(finder.index_of("AKE")?, None);
//! assert_eq!(finder.at_index(4)?, "MAKE");
//! # Ok::<(), diskdawg::dawg::DawgError>(())
//! ```
//!
//! ## On disk
//!
//! `save` writes the image and `load` maps it back; queries then run
//! against the file without deserializing anything:
//!
//! ```no_run
//! use diskdawg::dawg::{build_dawg, Finder};
//!
//! let finder = build_dawg(["cat", "catnip", "cats"])?;
//! finder.save("words.dawg")?;
//!
//! let reopened = Finder::load("words.dawg")?;
//! for hit in reopened.find_all_prefixes_of("catsup")? {
//!     println!("prefix {} has index {}", hit.word, hit.index);
//! }
//! # Ok::<(), diskdawg::dawg::DawgError>(())
//! ```

#![warn(missing_docs)]

/// Core DAWG machinery: builder, image format, and in-place finder.
pub mod dawg;
