/// Bit-level reader and writer used by the image format.
pub(crate) mod bits;
/// DAWG builder for constructing dictionaries from sorted word lists.
pub mod builder;
/// Error taxonomy shared by builders and finders.
pub mod error;
/// In-place query engine over serialized images.
pub mod finder;
/// Minimal perfect hashing over indexed key sets.
pub mod mph;
/// Bit-exact emission of the on-disk image.
pub(crate) mod serialize;
/// Random-access byte sources finders query in place.
pub mod source;
/// Self-terminating 7-bit varint codec.
pub(crate) mod varint;

pub use builder::{build_dawg, build_dawg_from_file, Builder};
pub use error::{DawgError, Result};
pub use finder::{Enumeration, FindResult, Finder};
pub use source::{ReadAt, Source};

#[cfg(test)]
mod test {
    use super::builder::{build_dawg, Builder};
    use super::error::DawgError;
    use super::finder::{Enumeration, FindResult, Finder};

    /// Checks the index mapping both ways for every word.
    fn check_round_trip<S: super::ReadAt>(finder: &Finder<S>, words: &[&str]) {
        assert_eq!(finder.num_added(), words.len());
        for (i, word) in words.iter().enumerate() {
            assert_eq!(finder.index_of(word).unwrap(), Some(i), "index_of({word:?})");
            assert_eq!(finder.at_index(i).unwrap(), *word, "at_index({i})");
        }
    }

    #[test]
    fn empty_dictionary() {
        let finder = Builder::new().finish().unwrap();
        assert_eq!(finder.index_of("").unwrap(), None);
        assert_eq!(finder.num_added(), 0);
        assert_eq!(finder.num_nodes(), 1);
        assert_eq!(finder.num_edges(), 0);
        assert!(finder.find_all_prefixes_of("anything").unwrap().is_empty());
    }

    #[test]
    fn zero_length_word() {
        let finder = build_dawg([""]).unwrap();
        check_round_trip(&finder, &[""]);
        assert_eq!(
            finder.find_all_prefixes_of("abc").unwrap(),
            [FindResult {
                word: String::new(),
                index: 0
            }]
        );
    }

    #[test]
    fn single_entry() {
        let finder = build_dawg(["a"]).unwrap();
        check_round_trip(&finder, &["a"]);
        assert_eq!(finder.index_of("ab").unwrap(), None);
        assert_eq!(finder.index_of("").unwrap(), None);
    }

    #[test]
    fn hello_jello() {
        let words = ["hello", "jello"];
        let finder = build_dawg(words).unwrap();
        check_round_trip(&finder, &words);
    }

    #[test]
    fn five_words() {
        let words = ["", "blip", "cat", "catnip", "cats"];
        let finder = build_dawg(words).unwrap();
        check_round_trip(&finder, &words);
        assert_eq!(finder.index_of("catni").unwrap(), None);
        assert_eq!(finder.index_of("c").unwrap(), None);
    }

    #[test]
    fn prefixes_of_catsup() {
        let finder = build_dawg(["", "blip", "cat", "catnip", "cats"]).unwrap();
        let result = finder.find_all_prefixes_of("catsup").unwrap();
        let expect: Vec<FindResult> = [("", 0), ("cat", 2), ("cats", 4)]
            .into_iter()
            .map(|(word, index)| FindResult {
                word: word.to_string(),
                index,
            })
            .collect();
        assert_eq!(result, expect);
    }

    #[test]
    fn enumerate_yields_words_in_order() {
        let words = ["", "blip", "cat", "catnip", "cats", "zzz"];
        let finder = build_dawg(words).unwrap();
        let mut seen = Vec::new();
        finder
            .enumerate(|index, prefix, is_final| {
                if is_final {
                    let word: String = prefix.iter().collect();
                    assert_eq!(finder.index_of(&word).unwrap(), Some(index));
                    seen.push(word);
                }
                Enumeration::Continue
            })
            .unwrap();
        assert_eq!(seen, words);
    }

    #[test]
    fn enumerate_with_skip_and_stop() {
        let finder = build_dawg(["", "blip", "cat", "catnip", "cats", "zzz"]).unwrap();
        let mut finals = 0;
        finder
            .enumerate(|index, prefix, is_final| {
                let word: String = prefix.iter().collect();
                if is_final {
                    finals += 1;
                }
                match word.as_str() {
                    "" => assert_eq!((index, is_final), (0, true)),
                    "blip" => assert_eq!((index, is_final), (1, true)),
                    // Avoid descending below catn; catnip must never show.
                    "catn" => return Enumeration::Skip,
                    "catni" | "catnip" => panic!("skip was ignored"),
                    "cats" => return Enumeration::Stop,
                    "zzz" => panic!("stop was ignored"),
                    _ => {}
                }
                Enumeration::Continue
            })
            .unwrap();
        // "", "blip", "cat", "cats" — catnip skipped, zzz never reached.
        assert_eq!(finals, 4);
    }

    #[test]
    fn out_of_order_add_is_rejected() {
        let mut builder = Builder::new();
        builder.add("b").unwrap();
        assert!(matches!(
            builder.add("a"),
            Err(DawgError::OrderViolation { .. })
        ));
    }

    #[test]
    fn serialization_round_trip() {
        let words = ["", "blip", "cat", "catnip", "cats", "zzz"];
        let built = build_dawg(words).unwrap();

        let mut image = Vec::new();
        let written = built.write(&mut image).unwrap();
        assert_eq!(written as usize, image.len());

        let reread = Finder::read(image, 0).unwrap();
        assert_eq!(reread.num_nodes(), built.num_nodes());
        assert_eq!(reread.num_edges(), built.num_edges());
        check_round_trip(&reread, &words);
        assert_eq!(
            reread.find_all_prefixes_of("catsup").unwrap(),
            built.find_all_prefixes_of("catsup").unwrap()
        );
    }

    #[test]
    fn save_and_load_round_trip() {
        let words = ["apple", "apricot", "banana", "bandana"];
        let built = build_dawg(words).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.dawg");
        let written = built.save(&path).unwrap();
        assert_eq!(written, std::fs::metadata(&path).unwrap().len());

        let mut loaded = Finder::load(&path).unwrap();
        check_round_trip(&loaded, &words);
        assert_eq!(loaded.index_of("apri").unwrap(), None);

        // Loaded and in-memory images answer identically byte for byte.
        let mut a = Vec::new();
        let mut b = Vec::new();
        built.write(&mut a).unwrap();
        loaded.write(&mut b).unwrap();
        assert_eq!(a, b);

        loaded.close();
        assert!(matches!(loaded.index_of("apple"), Err(DawgError::Closed)));
    }

    #[test]
    fn read_at_an_offset_in_a_larger_source() {
        let first = build_dawg(["alpha", "beta"]).unwrap();
        let second = build_dawg(["delta", "gamma"]).unwrap();

        let mut blob = Vec::new();
        first.write(&mut blob).unwrap();
        let offset = blob.len() as u64;
        second.write(&mut blob).unwrap();

        let one = Finder::read(&blob, 0).unwrap();
        let two = Finder::read(&blob, offset).unwrap();
        check_round_trip(&one, &["alpha", "beta"]);
        check_round_trip(&two, &["delta", "gamma"]);
    }

    #[test]
    fn larger_dictionary_round_trips() {
        // A few hundred generated words with heavy prefix and suffix
        // sharing, to push past the toy-sized images.
        let mut words = Vec::new();
        for a in ["anti", "pro", "re", "un"] {
            for b in ["act", "form", "state", "vision"] {
                for c in ["", "ed", "ing", "s"] {
                    words.push(format!("{a}{b}{c}"));
                }
            }
        }
        words.sort();
        words.dedup();
        let refs: Vec<&str> = words.iter().map(String::as_str).collect();

        let finder = build_dawg(&refs).unwrap();
        check_round_trip(&finder, &refs);
        assert!(finder.num_nodes() < words.len() * 4);

        let mut seen = Vec::new();
        finder
            .enumerate(|_, prefix, is_final| {
                if is_final {
                    seen.push(prefix.iter().collect::<String>());
                }
                Enumeration::Continue
            })
            .unwrap();
        assert_eq!(seen, words);
    }

    #[test]
    fn unicode_words_round_trip() {
        let words = ["möbel", "möbelwagen", "übel", "授人以渔", "授人以鱼"];
        let finder = build_dawg(words).unwrap();
        check_round_trip(&finder, &words);
        assert_eq!(finder.index_of("möbe").unwrap(), None);
    }
}
