mod common;

use std::collections::BTreeMap;
use std::io::Cursor;

use nxextract::formats::sarc::SarcReader;
use proptest::prelude::*;

fn archive_strategy() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    prop::collection::btree_map(
        "[a-z]{1,8}(/[a-z]{1,8})?\\.bin",
        prop::collection::vec(any::<u8>(), 0..64),
        0..8,
    )
}

proptest! {
    #[test]
    fn ranges_are_ordered_and_fit(files in archive_strategy()) {
        let input: Vec<(&str, &[u8])> =
            files.iter().map(|(n, d)| (n.as_str(), d.as_slice())).collect();
        let reader = SarcReader::new(Cursor::new(common::sarc(&input))).unwrap();

        let data_len = reader.sarc.file_size as u64 - reader.sarc.data_offset;
        let mut sum = 0u64;
        for f in reader.files() {
            prop_assert!(f.data_start <= f.data_end);
            sum += f.size();
        }
        prop_assert!(sum <= data_len);
        prop_assert_eq!(reader.files().count(), files.len());
    }

    #[test]
    fn range_reads_match_slices(
        files in archive_strategy().prop_filter("non-empty", |f| !f.is_empty()),
        pick in any::<prop::sample::Index>(),
        offset in 0u64..80,
        len in 0u64..80,
    ) {
        let input: Vec<(&str, &[u8])> =
            files.iter().map(|(n, d)| (n.as_str(), d.as_slice())).collect();
        let mut reader = SarcReader::new(Cursor::new(common::sarc(&input))).unwrap();
        let file = reader.files().nth(pick.index(files.len())).unwrap().clone();

        let whole = reader.read(&file).unwrap();
        prop_assert_eq!(&whole, &files[&file.name]);

        let part = reader.read_range(&file, offset, len).unwrap();
        let start = (offset as usize).min(whole.len());
        let end = (start + len as usize).min(whole.len());
        prop_assert_eq!(part, whole[start..end].to_vec());
    }
}

#[test]
fn data_section_bounds_all_files() {
    let archive = common::sarc(&[("a", b"12345"), ("b", b"678"), ("c", b"")]);
    let reader = SarcReader::new(Cursor::new(archive.clone())).unwrap();
    assert_eq!(reader.sarc.file_size as usize, archive.len());
    let data_len = reader.sarc.file_size as u64 - reader.sarc.data_offset;
    let sum: u64 = reader.files().map(|f| f.size()).sum();
    assert_eq!(sum, 8);
    assert!(sum <= data_len);
    assert!(reader.files().all(|f| f.data_end as u64 <= data_len));
}

#[test]
fn names_resolve_through_hash_lookup() {
    let archive = common::sarc(&[
        ("Actor/Pack/Link.bactorpack", b"x"),
        ("Map/A-1.smubin", b"yy"),
    ]);
    let reader = SarcReader::new(Cursor::new(archive)).unwrap();
    assert_eq!(reader["Map/A-1.smubin"].size(), 2);
    assert!(reader.get_file_by_name("Map/A-2.smubin").is_none());
}
