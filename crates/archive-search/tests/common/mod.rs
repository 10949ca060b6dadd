//! Common test utilities and fixtures
//!
//! Archives are built in memory at test time; names ending in `/` become
//! directory entries.

#![allow(dead_code)]

use archive_search::{ArchiveError, ArchiveSource, MimeSniffer};
use sevenz_rust::{SevenZArchiveEntry, SevenZWriter};
use std::io::{Cursor, Write};
use zip::write::{SimpleFileOptions, ZipWriter};

/// Build a ZIP archive from `(name, contents)` pairs
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for (name, data) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).expect("Failed to add directory");
        } else {
            zip.start_file(*name, options).expect("Failed to start file");
            zip.write_all(data).expect("Failed to write file");
        }
    }

    zip.finish().expect("Failed to finish ZIP").into_inner()
}

/// Build a 7Z archive from `(name, contents)` pairs
pub fn sevenz_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut sz = SevenZWriter::new(Cursor::new(Vec::new())).expect("Failed to create 7Z writer");

    for (name, data) in entries {
        let mut entry = SevenZArchiveEntry::new();
        if let Some(dir) = name.strip_suffix('/') {
            entry.name = dir.to_string();
            entry.is_directory = true;
            sz.push_archive_entry::<&[u8]>(entry, None)
                .expect("Failed to add directory");
        } else {
            entry.name = (*name).to_string();
            entry.has_stream = !data.is_empty();
            sz.push_archive_entry(entry, Some(*data))
                .expect("Failed to add file");
        }
    }

    sz.finish().expect("Failed to finish 7Z").into_inner()
}

/// Sniffer that reports a fixed MIME type regardless of content
pub struct FixedMime(pub &'static str);

impl MimeSniffer for FixedMime {
    fn sniff(&self, _source: ArchiveSource<'_>) -> Result<String, ArchiveError> {
        Ok(self.0.to_string())
    }
}
