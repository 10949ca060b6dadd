//! 7Z Integration Tests
//!
//! 7Z archives searched directly and mixed with ZIP at different nesting
//! levels, plus listing and extraction through the format-agnostic API.

mod common;

use archive_search::{
    detect_archive_format, extract_archive, get_mime_type, is_7z_magic_number,
    list_archive_entries, search_file_in_archive, ArchiveFormat, ArchiveSource, ExtractOptions,
    Predicate, SearchQuery,
};
use common::{sevenz_bytes, zip_bytes};
use std::fs;

#[test]
fn test_7z_is_detected_by_signature() {
    let archive = sevenz_bytes(&[("a.txt", b"alpha")]);

    assert!(is_7z_magic_number(ArchiveSource::Bytes(&archive)).unwrap());
    assert_eq!(
        detect_archive_format(ArchiveSource::Bytes(&archive)).unwrap(),
        Some(ArchiveFormat::SevenZip)
    );
    assert_eq!(
        get_mime_type(ArchiveSource::Bytes(&archive)).unwrap(),
        "application/x-7z-compressed"
    );
}

#[test]
fn test_search_7z_by_name() {
    let archive = sevenz_bytes(&[("a.txt", b"alpha"), ("docs/", b""), ("docs/b.txt", b"bravo")]);

    let results = search_file_in_archive(
        ArchiveSource::Bytes(&archive),
        &SearchQuery::new().file_names(["b.txt"]),
    )
    .unwrap();

    let found = &results["b.txt"];
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "docs/b.txt");
    assert_eq!(found[0].bytes, b"bravo");
    assert_eq!(found[0].size, 5);
}

#[test]
fn test_search_7z_with_predicate_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drivers.7z");
    fs::write(
        &path,
        sevenz_bytes(&[("one.sys", b"MZ one"), ("readme", b"read me"), ("two.sys", b"MZ two")]),
    )
    .unwrap();

    let results = search_file_in_archive(
        ArchiveSource::Path(&path),
        &SearchQuery::new().predicate(Predicate::from_bool("mz", |b| b.starts_with(b"MZ"))),
    )
    .unwrap();

    let names: Vec<_> = results["mz"].iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["one.sys", "two.sys"]);
}

#[test]
fn test_7z_first_only_stops_walk() {
    let archive = sevenz_bytes(&[("x/dup.txt", b"1"), ("y/dup.txt", b"2"), ("z/dup.txt", b"3")]);

    let results = search_file_in_archive(
        ArchiveSource::Bytes(&archive),
        &SearchQuery::new()
            .file_names(["dup.txt"])
            .return_first_only(true),
    )
    .unwrap();

    assert_eq!(results["dup.txt"].len(), 1);
    assert_eq!(results["dup.txt"][0].bytes, b"1");
}

#[test]
fn test_zip_inside_7z_inside_zip() {
    let innermost = zip_bytes(&[("secret.txt", b"deep")]);
    let middle = sevenz_bytes(&[("pack/inner.zip", &innermost)]);
    let outer = zip_bytes(&[("middle.7z", &middle)]);

    let results = search_file_in_archive(
        ArchiveSource::Bytes(&outer),
        &SearchQuery::new().file_names(["secret.txt"]).recursive(true),
    )
    .unwrap();

    let found = &results["secret.txt"];
    assert_eq!(found[0].bytes, b"deep");
    assert_eq!(
        found[0].nested_in,
        vec!["middle.7z".to_string(), "pack/inner.zip".to_string()]
    );
}

#[test]
fn test_list_7z_entries() {
    let archive = sevenz_bytes(&[("docs/", b""), ("docs/a.txt", b"alpha")]);
    let entries = list_archive_entries(ArchiveSource::Bytes(&archive)).unwrap();

    let dir = entries.iter().find(|e| e.name == "docs").expect("docs not listed");
    assert!(dir.is_dir);
    let file = entries.iter().find(|e| e.name == "docs/a.txt").expect("docs/a.txt not listed");
    assert!(!file.is_dir);
    assert_eq!(file.size, 5);
}

#[test]
fn test_extract_7z_archive() {
    let archive = sevenz_bytes(&[("docs/", b""), ("docs/a.txt", b"alpha"), ("b.txt", b"bravo")]);
    let out = tempfile::tempdir().unwrap();

    extract_archive(
        ArchiveSource::Bytes(&archive),
        Some(out.path()),
        &ExtractOptions::default(),
    )
    .unwrap();

    assert_eq!(fs::read(out.path().join("docs/a.txt")).unwrap(), b"alpha");
    assert_eq!(fs::read(out.path().join("b.txt")).unwrap(), b"bravo");
}
