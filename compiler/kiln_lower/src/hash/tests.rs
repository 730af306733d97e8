use pretty_assertions::assert_eq;

use super::*;

fn hash_of(chunks: &[&[u8]]) -> [u32; 4] {
    let mut hasher = SourceHasher::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    hasher.finish()
}

#[test]
fn same_input_same_hash() {
    assert_eq!(hash_of(&[b"const x = 1;"]), hash_of(&[b"const x = 1;"]));
}

#[test]
fn different_text_different_hash() {
    assert_ne!(hash_of(&[b"const x = 1;"]), hash_of(&[b"const x = 2;"]));
}

#[test]
fn chunk_boundaries_matter() {
    assert_ne!(hash_of(&[b"ab", b"c"]), hash_of(&[b"a", b"bc"]));
}

#[test]
fn markers_change_the_hash() {
    let mut plain = SourceHasher::new();
    plain.update(b"x");
    let mut marked = plain.clone();
    marked.update_u32(3);
    assert_ne!(plain.finish(), marked.finish());
}
