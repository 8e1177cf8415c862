//! Example: building, saving, and reopening an indexed wordlist.
//!
//! Shows the full life of a dictionary: sorted construction, both
//! directions of the index mapping, prefix queries, steered enumeration,
//! and an on-disk round trip queried in place.
//!
//! Run with: cargo run --example wordlist

use diskdawg::dawg::{build_dawg, Enumeration, Finder};

fn main() -> diskdawg::dawg::Result<()> {
    let words = ["BAKE", "BAKED", "BAKER", "CAKE", "CAKED", "FAKE", "LAKE"];
    let finder = build_dawg(words)?;

    println!(
        "{} words stored in {} nodes and {} edges",
        finder.num_added(),
        finder.num_nodes(),
        finder.num_edges()
    );

    // Index mapping in both directions
    println!("\nIndex mapping:");
    for word in ["BAKE", "BAKES", "CAKE", "MAKE"] {
        match finder.index_of(word)? {
            Some(index) => println!("  {word}: index {index}"),
            None => println!("  {word}: not in the list"),
        }
    }
    for index in [0, 4, 6] {
        println!("  #{index} is {}", finder.at_index(index)?);
    }

    // Stored words that are prefixes of a longer string
    println!("\nPrefixes of BAKERY:");
    for hit in finder.find_all_prefixes_of("BAKERY")? {
        println!("  {} (index {})", hit.word, hit.index);
    }

    // Enumerate everything under one branch
    println!("\nWords starting with BA:");
    finder.enumerate(|_, prefix, is_final| {
        if prefix.len() >= 2 && prefix[..2] != ['B', 'A'] {
            return Enumeration::Skip;
        }
        if is_final {
            println!("  {}", prefix.iter().collect::<String>());
        }
        Enumeration::Continue
    })?;

    // On-disk round trip, queried in place
    let dir = std::env::temp_dir();
    let path = dir.join("wordlist-demo.dawg");
    let bytes = finder.save(&path)?;
    let reopened = Finder::load(&path)?;
    println!(
        "\nSaved {bytes} bytes to {}; reopened copy agrees: {}",
        path.display(),
        reopened.index_of("CAKED")? == finder.index_of("CAKED")?
    );
    std::fs::remove_file(&path).ok();

    Ok(())
}
