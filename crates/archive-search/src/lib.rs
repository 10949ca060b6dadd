//! Recursive search inside ZIP and 7Z archives
//!
//! This crate finds files inside archives by name or by content, descending
//! into archives nested inside archives. Formats are recognized from their
//! bytes, never from file extensions, and both on-disk files and in-memory
//! buffers can be searched.
//!
//! # Features
//!
//! - **Format detection**: ZIP and 7Z signatures, plus an open-based ZIP
//!   check that also accepts self-extracting executables
//! - **Name search**: case-sensitive or case-insensitive suffix matching
//! - **Content search**: caller-supplied [`Predicate`]s see each entry's bytes
//! - **Recursive processing**: nested archives (ZIP within 7Z within ZIP, ...)
//!   are searched with the same query; results are merged into one map
//! - **Extraction**: matched entries can be written to a directory without
//!   overwriting anything; whole archives can be unpacked with
//!   [`extract_archive`]
//!
//! # Usage
//!
//! ## Find a file anywhere in a nested archive
//!
//! ```no_run
//! use archive_search::{search_file_in_archive, ArchiveSource, SearchQuery};
//! use std::path::Path;
//!
//! let query = SearchQuery::new()
//!     .file_names(["secret.txt"])
//!     .recursive(true)
//!     .return_first_only(true);
//!
//! let results = search_file_in_archive(ArchiveSource::Path(Path::new("outer.zip")), &query).unwrap();
//! if let Some(found) = results.get("secret.txt") {
//!     println!("{} ({} bytes) inside {:?}", found[0].name, found[0].size, found[0].nested_in);
//! }
//! ```
//!
//! ## Match by content
//!
//! ```no_run
//! use archive_search::{search_file_in_archive, ArchiveSource, Predicate, SearchQuery};
//!
//! let archive_bytes = std::fs::read("drivers.7z").unwrap();
//! let query = SearchQuery::new()
//!     .predicate(Predicate::from_bool("executables", |bytes| bytes.starts_with(b"MZ")))
//!     .extract_to("/tmp/executables");
//!
//! let results = search_file_in_archive(ArchiveSource::Bytes(&archive_bytes), &query).unwrap();
//! for file in results.get("executables").into_iter().flatten() {
//!     println!("{} -> {:?}", file.name, file.extracted_to);
//! }
//! ```

pub mod compress;
pub mod detect;
pub mod error;
pub mod extract;
pub mod mime;
pub mod reader;
pub mod search;

// =============================================================================
// Archive Constants
// =============================================================================

/// Maximum size for a single file within an archive (100 MB).
///
/// Entries are read fully into memory for matching; larger entries fail the
/// search with [`ArchiveError::FileTooLarge`] unless the limit is raised in
/// [`SearchOptions`].
pub const MAX_FILE_SIZE: u64 = 100_000_000;

/// Maximum nesting depth for recursive archive search.
///
/// Limits how deeply nested archives can be searched (e.g., ZIP within ZIP).
/// Prevents infinite recursion from malicious or corrupted archives.
pub const MAX_NESTING_DEPTH: usize = 10;

// Re-export commonly used types
pub use compress::{archive_directory, ArchiveDirectoryOptions, Compression};
pub use detect::{
    detect_archive_format, is_7z_magic_number, is_zip_archive, is_zip_magic_number, test_zip,
};
pub use error::ArchiveError;
pub use extract::{extract_archive, ExtractOptions};
pub use mime::{get_mime_type, InferSniffer, MimeSniffer, SUPPORTED_ARCHIVE_MIME_TYPES};
pub use reader::{list_archive_entries, ArchiveFormat, ArchiveSource, EntryInfo};
pub use search::{
    search_file_in_archive, search_file_in_archive_with, FoundFile, Predicate, SearchOptions,
    SearchQuery, SearchResults,
};
