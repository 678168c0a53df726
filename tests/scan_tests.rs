//! Scan behavior: seek positioning, key reconstruction, value plumbing.

use keytrie::{codec, Trie, TrieOpt};

/// Seek keys probing gaps, exact hits, prefixes and past-the-end positions.
const SEEKS: &[&str] = &[
    "", "`", "a", "ab", "abc", "abca", "abcd", "abcd1", "abce", "be", "c", "cde0", "d",
];

fn build(keys: &[&str]) -> Trie<codec::U32> {
    let values: Vec<u32> = (0..keys.len() as u32).collect();
    let keys: Vec<&[u8]> = keys.iter().map(|k| k.as_bytes()).collect();
    Trie::new(codec::U32, &keys, &values, TrieOpt::complete()).unwrap()
}

/// Scan from every seek and compare against the sorted tail of `keys`.
fn check_scans(t: &Trie<codec::U32>, keys: &[&str], seeks: &[&str]) {
    for seek in seeks {
        let start = keys.partition_point(|k| k < seek);
        let mut scan = t.scan(seek.as_bytes(), true);
        for (i, k) in keys.iter().enumerate().skip(start) {
            let (key, val) = scan.next().unwrap_or_else(|| {
                panic!("scan from {:?} ended before {:?}", seek, k);
            });
            assert_eq!(key, k.as_bytes(), "scan from {:?} at {}", seek, i);
            assert_eq!(
                val,
                Some(&(i as u32).to_le_bytes()[..]),
                "value from {:?} at {}",
                seek,
                i
            );
        }
        assert!(scan.next().is_none(), "scan from {:?} over-produced", seek);
        assert!(scan.next().is_none(), "exhaustion must be stable");
    }
}

#[test]
fn scan_simple_set() {
    let keys = ["abc", "abcd", "abd", "abde", "bc", "bcd", "bcde", "cde"];
    let t = build(&keys);
    check_scans(&t, &keys, SEEKS);
    check_scans(&t, &keys, &keys);
}

#[test]
fn scan_set_with_empty_key() {
    let keys = ["", "a", "abc", "abd", "bc", "bcd", "cde"];
    let t = build(&keys);
    check_scans(&t, &keys, SEEKS);
    check_scans(&t, &keys, &keys);
}

#[test]
fn scan_empty_set() {
    let t = build(&[]);
    check_scans(&t, &[], SEEKS);
}

#[test]
fn scan_single_key() {
    let keys = ["foo"];
    let t = build(&keys);
    check_scans(&t, &keys, &["", "f", "fo", "foo"]);
    let mut scan = t.scan(b"foz", true);
    assert!(scan.next().is_none());
}

#[test]
fn scan_from_exact_key_starts_there() {
    let keys = ["alpha1", "alpha2", "alpha3"];
    let t = build(&keys);
    let mut scan = t.scan(b"alpha2", false);
    assert_eq!(scan.next().unwrap().0, b"alpha2");
    assert_eq!(scan.next().unwrap().0, b"alpha3");
    assert!(scan.next().is_none());
}

#[test]
fn scan_without_values_yields_none() {
    let keys = ["abc", "abcd", "abd", "abde", "bc", "bcd", "bcde", "cde"];
    let t = build(&keys);
    let mut scan = t.scan(b"", false);
    let mut n = 0;
    while let Some((_, val)) = scan.next() {
        assert_eq!(val, None);
        n += 1;
    }
    assert_eq!(n, keys.len());
}

#[test]
fn scan_keys_only_trie_yields_no_value_bytes() {
    let keys: Vec<&[u8]> = ["ab", "cd", "ef"].iter().map(|k| k.as_bytes()).collect();
    let t = Trie::new(codec::U32, &keys, &[], TrieOpt::complete()).unwrap();
    let mut scan = t.scan(b"", true);
    for k in &keys {
        let (key, val) = scan.next().unwrap();
        assert_eq!(&key, k);
        assert_eq!(val, None, "no values stored");
    }
    assert!(scan.next().is_none());
}

#[test]
fn scan_copies_survive_buffer_reuse() {
    let keys = ["abc", "abcd", "abd", "abde", "bc"];
    let t = build(&keys);
    let mut scan = t.scan(b"", true);
    let mut collected = Vec::new();
    while let Some((key, _)) = scan.next() {
        collected.push(key.to_vec());
    }
    let expect: Vec<Vec<u8>> = keys.iter().map(|k| k.as_bytes().to_vec()).collect();
    assert_eq!(collected, expect);
}

#[test]
fn scan_byte_wide_branch() {
    let keys: Vec<Vec<u8>> = (0..40u8).map(|i| vec![i * 6, b'k']).collect();
    let refs: Vec<&[u8]> = keys.iter().map(|k| &k[..]).collect();
    let values: Vec<u32> = (0..40).collect();
    let t = Trie::new(codec::U32, &refs, &values, TrieOpt::complete()).unwrap();
    let mut scan = t.scan(&[7], true);
    // first key >= [7] is [12, 'k']
    let (key, val) = scan.next().unwrap();
    assert_eq!(key, &[12, b'k'][..]);
    assert_eq!(val, Some(&2u32.to_le_bytes()[..]));
    let mut rest = 0;
    while scan.next().is_some() {
        rest += 1;
    }
    assert_eq!(rest, 37);
}
