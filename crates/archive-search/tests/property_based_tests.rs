//! Property-Based Tests
//!
//! Tests using property-based testing (proptest) to verify search invariants:
//! - First-only searches record at most one file per key
//! - Case-insensitive search ignores ASCII case
//! - Repeated searches return identical results
//! - Nested archives never hide matches from recursive searches

mod common;

use archive_search::{search_file_in_archive, ArchiveSource, SearchQuery};
use common::zip_bytes;
use proptest::prelude::*;

/// Unique entry names under a couple of directories
fn entry_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("(dir[0-2]/)?[a-c]{1,2}\\.txt", 1..12)
        .prop_map(|names| names.into_iter().collect())
}

fn archive_of(names: &[String]) -> Vec<u8> {
    let entries: Vec<(&str, &[u8])> = names.iter().map(|n| (n.as_str(), n.as_bytes())).collect();
    zip_bytes(&entries)
}

// ============================================================================
// Cardinality Properties
// ============================================================================

/// Property: first-only yields min(1, actual matches) records per key
#[test]
fn proptest_first_only_cardinality() {
    proptest!(|(names in entry_names(), target in "[a-c]{1,2}\\.txt")| {
        let archive = archive_of(&names);
        let actual = names.iter().filter(|n| n.ends_with(target.as_str())).count();

        let query = SearchQuery::new()
            .file_names([target.clone()])
            .return_first_only(true)
            .return_empty_list_per_file_name(true);
        let results = search_file_in_archive(ArchiveSource::Bytes(&archive), &query).unwrap();

        prop_assert_eq!(results[&target].len(), actual.min(1));
    });
}

/// Property: without first-only, every matching entry is returned
#[test]
fn proptest_all_matches_returned() {
    proptest!(|(names in entry_names(), target in "[a-c]{1,2}\\.txt")| {
        let archive = archive_of(&names);
        let actual = names.iter().filter(|n| n.ends_with(target.as_str())).count();

        let query = SearchQuery::new().file_names([target.clone()]);
        let results = search_file_in_archive(ArchiveSource::Bytes(&archive), &query).unwrap();

        let found = results.get(&target).map_or(0, Vec::len);
        prop_assert_eq!(found, actual);
    });
}

// ============================================================================
// Matching Properties
// ============================================================================

/// Property: upper-casing the target does not change case-insensitive results
#[test]
fn proptest_case_insensitive_matches_any_case() {
    proptest!(|(names in entry_names(), target in "[a-c]{1,2}\\.txt")| {
        let archive = archive_of(&names);
        let upper = target.to_uppercase();

        let lower_query = SearchQuery::new().file_names([target.clone()]);
        let upper_query = SearchQuery::new().file_names([upper.clone()]).case_sensitive(false);

        let lower = search_file_in_archive(ArchiveSource::Bytes(&archive), &lower_query).unwrap();
        let upper_results = search_file_in_archive(ArchiveSource::Bytes(&archive), &upper_query).unwrap();

        prop_assert_eq!(lower.get(&target), upper_results.get(&upper));
    });
}

/// Property: the same search twice gives the same answer
#[test]
fn proptest_search_is_idempotent() {
    proptest!(|(names in entry_names(), recursive in any::<bool>())| {
        let inner = archive_of(&names);
        let outer = zip_bytes(&[("inner.zip", &inner), ("a.txt", b"top")]);
        let query = SearchQuery::new()
            .file_names(["a.txt", "b.txt"])
            .recursive(recursive);

        let first = search_file_in_archive(ArchiveSource::Bytes(&outer), &query).unwrap();
        let second = search_file_in_archive(ArchiveSource::Bytes(&outer), &query).unwrap();
        prop_assert_eq!(first, second);
    });
}

/// Property: a recursive search finds a file at any nesting depth
#[test]
fn proptest_recursive_finds_nested_file() {
    proptest!(|(depth in 1usize..5)| {
        let report = zip_bytes(&[("x", b"x")]);
        let mut archive = zip_bytes(&[("dir/report.zip", &report)]);
        for level in 0..depth {
            let name = format!("level{level}.zip");
            archive = zip_bytes(&[(name.as_str(), &archive)]);
        }

        let query = SearchQuery::new().file_names(["report.zip"]).recursive(true);
        let results = search_file_in_archive(ArchiveSource::Bytes(&archive), &query).unwrap();

        prop_assert_eq!(results["report.zip"].len(), 1);
        prop_assert_eq!(&results["report.zip"][0].bytes, &report);
        prop_assert_eq!(results["report.zip"][0].nested_in.len(), depth);
    });
}
