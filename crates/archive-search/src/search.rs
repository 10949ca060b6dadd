//! Recursive search inside ZIP and 7Z archives
//!
//! A search walks every entry of an archive once, in archive order, and
//! decides per entry:
//!
//! 1. directories are skipped without reading them;
//! 2. the entry's bytes are read and offered to each [`Predicate`] in turn;
//!    the first one returning a value claims the entry;
//! 3. an unclaimed entry that is itself a ZIP or 7Z archive is searched
//!    recursively (when enabled) with the same query and result map;
//! 4. an unclaimed entry is then matched by name against the target names
//!    (suffix match).
//!
//! Results from every nesting level land in one map, so "first only" and
//! early termination hold across the whole walk, not per archive.

use crate::detect::{detect_archive_format, detect_format_by_magic};
use crate::error::ArchiveError;
use crate::extract::write_unique;
use crate::mime::{is_supported_mime, InferSniffer, MimeSniffer};
use crate::reader::{open_bytes, open_path, ArchiveFormat, ArchiveReader, ArchiveSource, EntryInfo, Walk};
use crate::{MAX_FILE_SIZE, MAX_NESTING_DEPTH};
use chrono::NaiveDateTime;
use log::{debug, trace};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io::{Read, Seek};
use std::path::PathBuf;

/// Found files grouped by match key (predicate id or target name)
pub type SearchResults = BTreeMap<String, Vec<FoundFile>>;

type Check = dyn Fn(&[u8]) -> Option<Value>;

/// A named content test applied to each entry's bytes
///
/// Returning `Some(value)` claims the entry; `value` is kept on the
/// resulting [`FoundFile`] as `match_value`.
pub struct Predicate {
    id: String,
    check: Box<Check>,
}

impl Predicate {
    /// Predicate returning arbitrary match metadata
    pub fn new<F>(id: impl Into<String>, check: F) -> Self
    where
        F: Fn(&[u8]) -> Option<Value> + 'static,
    {
        Predicate {
            id: id.into(),
            check: Box::new(check),
        }
    }

    /// Predicate that only says yes or no; matches carry `true`
    pub fn from_bool<F>(id: impl Into<String>, check: F) -> Self
    where
        F: Fn(&[u8]) -> bool + 'static,
    {
        Predicate::new(id, move |bytes| check(bytes).then_some(Value::Bool(true)))
    }

    /// Key under which this predicate's matches are stored
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run the predicate on entry contents
    pub fn evaluate(&self, bytes: &[u8]) -> Option<Value> {
        (self.check)(bytes)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("id", &self.id).finish_non_exhaustive()
    }
}

/// One matched archive entry
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FoundFile {
    /// Entry path inside its (innermost) archive
    pub name: String,
    /// Uncompressed contents
    pub bytes: Vec<u8>,
    /// Uncompressed size as recorded in the archive
    pub size: u64,
    /// Modification time recorded in the archive
    pub modified_time: Option<NaiveDateTime>,
    /// Value returned by the claiming predicate; `None` for name matches
    pub match_value: Option<Value>,
    /// Names of the nested archive entries leading to this entry, outermost
    /// first; empty for entries of the top-level archive
    pub nested_in: Vec<String>,
    /// Where the entry was written, if an extraction directory was set
    pub extracted_to: Option<PathBuf>,
}

/// Flags and limits of a search
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Match target names case-sensitively
    pub case_sensitive: bool,
    /// Keep at most one record per match key and stop once every key has one
    pub return_first_only: bool,
    /// Keep keys without matches in the result, mapped to empty lists
    pub return_empty_list_per_file_name: bool,
    /// Search inside nested ZIP/7Z archives
    pub recursive: bool,
    /// Write every matched entry into this directory
    pub extract_to: Option<PathBuf>,
    /// Deepest allowed archive nesting below the top-level archive
    pub max_depth: usize,
    /// Largest entry that will be read into memory
    pub max_entry_size: u64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            case_sensitive: true,
            return_first_only: false,
            return_empty_list_per_file_name: false,
            recursive: false,
            extract_to: None,
            max_depth: MAX_NESTING_DEPTH,
            max_entry_size: MAX_FILE_SIZE,
        }
    }
}

/// What to look for: target names and/or predicates, plus options
///
/// # Examples
///
/// ```no_run
/// use archive_search::{search_file_in_archive, ArchiveSource, Predicate, SearchQuery};
/// use std::path::Path;
///
/// let query = SearchQuery::new()
///     .file_names(["config.toml"])
///     .predicate(Predicate::from_bool("pe_files", |bytes| bytes.starts_with(b"MZ")))
///     .recursive(true);
///
/// let results = search_file_in_archive(ArchiveSource::Path(Path::new("bundle.zip")), &query).unwrap();
/// for (key, files) in &results {
///     println!("{key}: {} match(es)", files.len());
/// }
/// ```
#[derive(Debug, Default)]
pub struct SearchQuery {
    file_names: Vec<String>,
    predicates: Vec<Predicate>,
    options: SearchOptions,
}

impl SearchQuery {
    /// Empty query with default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add target name suffixes
    #[must_use]
    pub fn file_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.file_names.contains(&name) {
                self.file_names.push(name);
            }
        }
        self
    }

    /// Add a predicate; predicates are evaluated in insertion order
    #[must_use]
    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Replace all options
    #[must_use]
    pub fn options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.options.case_sensitive = yes;
        self
    }

    #[must_use]
    pub fn return_first_only(mut self, yes: bool) -> Self {
        self.options.return_first_only = yes;
        self
    }

    #[must_use]
    pub fn return_empty_list_per_file_name(mut self, yes: bool) -> Self {
        self.options.return_empty_list_per_file_name = yes;
        self
    }

    #[must_use]
    pub fn recursive(mut self, yes: bool) -> Self {
        self.options.recursive = yes;
        self
    }

    #[must_use]
    pub fn extract_to(mut self, directory: impl Into<PathBuf>) -> Self {
        self.options.extract_to = Some(directory.into());
        self
    }

    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.options.max_depth = depth;
        self
    }

    /// Target name suffixes
    #[must_use]
    pub fn targets(&self) -> &[String] {
        &self.file_names
    }

    /// Predicates in evaluation order
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Current options
    #[must_use]
    pub fn search_options(&self) -> &SearchOptions {
        &self.options
    }

    /// Reject queries that cannot match anything
    pub fn validate(&self) -> Result<(), ArchiveError> {
        if self.file_names.is_empty() && self.predicates.is_empty() {
            return Err(ArchiveError::InvalidArgument(
                "either file names to search or predicates must be provided".to_string(),
            ));
        }
        Ok(())
    }
}

/// Suffix match of an entry name against a target name
#[must_use]
pub fn name_matches(target: &str, entry_name: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        entry_name.ends_with(target)
    } else {
        entry_name.to_lowercase().ends_with(&target.to_lowercase())
    }
}

/// State of one top-level search, shared by every nesting level
struct Search<'q> {
    query: &'q SearchQuery,
    results: SearchResults,
    /// Match keys that have at least one record
    found: HashSet<String>,
    /// Nested archive entries currently being walked, outermost first
    nested_in: Vec<String>,
}

impl<'q> Search<'q> {
    fn new(query: &'q SearchQuery) -> Self {
        let mut results = SearchResults::new();
        for predicate in &query.predicates {
            results.entry(predicate.id().to_string()).or_default();
        }
        for name in &query.file_names {
            results.entry(name.clone()).or_default();
        }
        Search {
            query,
            results,
            found: HashSet::new(),
            nested_in: Vec::new(),
        }
    }

    fn options(&self) -> &SearchOptions {
        &self.query.options
    }

    fn search_source(&mut self, source: ArchiveSource<'_>, format: ArchiveFormat) -> Result<Walk, ArchiveError> {
        match source {
            ArchiveSource::Path(path) => self.walk(&mut open_path(path, format)?),
            ArchiveSource::Bytes(bytes) => self.walk(&mut open_bytes(bytes, format)?),
        }
    }

    fn walk<R: Read + Seek>(&mut self, archive: &mut ArchiveReader<R>) -> Result<Walk, ArchiveError> {
        let mut outcome = Walk::Continue;
        archive.for_each_entry(|info, data| {
            outcome = self.visit(info, data)?;
            Ok(outcome)
        })?;
        Ok(outcome)
    }

    fn visit(&mut self, info: &EntryInfo, data: &mut dyn Read) -> Result<Walk, ArchiveError> {
        if info.is_dir {
            return Ok(Walk::Continue);
        }

        let bytes = self.read_entry(info, data)?;

        if let Some((key, value)) = self.claim(&bytes) {
            self.record(vec![key], info, bytes, Some(value))?;
        } else {
            if self.options().recursive {
                if let Some(format) = detect_format_by_magic(&bytes) {
                    self.descend(info, &bytes, format)?;
                }
            }
            let keys = self.match_names(&info.name);
            if !keys.is_empty() {
                self.record(keys, info, bytes, None)?;
            }
        }

        if self.all_found() {
            debug!("All search keys found, stopping at {}", info.name);
            Ok(Walk::Stop)
        } else {
            Ok(Walk::Continue)
        }
    }

    fn read_entry(&self, info: &EntryInfo, data: &mut dyn Read) -> Result<Vec<u8>, ArchiveError> {
        let max = self.options().max_entry_size;
        let too_large = |size: u64| ArchiveError::FileTooLarge {
            name: info.name.clone(),
            size,
            max,
        };
        if info.size > max {
            return Err(too_large(info.size));
        }

        let mut bytes = Vec::with_capacity(usize::try_from(info.size).unwrap_or_default());
        // Headers can understate the real size
        Read::take(&mut *data, max.saturating_add(1)).read_to_end(&mut bytes)?;
        if bytes.len() as u64 > max {
            return Err(too_large(bytes.len() as u64));
        }
        Ok(bytes)
    }

    /// A key that already has a record takes no more in first-only mode
    fn is_satisfied(&self, key: &str) -> bool {
        self.options().return_first_only && self.found.contains(key)
    }

    fn claim(&self, bytes: &[u8]) -> Option<(String, Value)> {
        self.query
            .predicates
            .iter()
            .filter(|p| !self.is_satisfied(p.id()))
            .find_map(|p| p.evaluate(bytes).map(|value| (p.id().to_string(), value)))
    }

    /// Every unsatisfied target the entry name ends with
    fn match_names(&self, entry_name: &str) -> Vec<String> {
        let case_sensitive = self.options().case_sensitive;
        self.query
            .file_names
            .iter()
            .filter(|target| {
                !self.is_satisfied(target) && name_matches(target, entry_name, case_sensitive)
            })
            .cloned()
            .collect()
    }

    fn descend(&mut self, info: &EntryInfo, bytes: &[u8], format: ArchiveFormat) -> Result<(), ArchiveError> {
        let max = self.options().max_depth;
        if self.nested_in.len() >= max {
            return Err(ArchiveError::TooDeep { max });
        }

        debug!(
            "Searching nested {format} archive {} (depth {})",
            info.name,
            self.nested_in.len() + 1
        );
        self.nested_in.push(info.name.clone());
        let walked = open_bytes(bytes, format).and_then(|mut archive| self.walk(&mut archive));
        self.nested_in.pop();
        walked.map(|_| ())
    }

    /// Store one matched entry under each of `keys`, extracting it at most once
    fn record(
        &mut self,
        keys: Vec<String>,
        info: &EntryInfo,
        bytes: Vec<u8>,
        match_value: Option<Value>,
    ) -> Result<(), ArchiveError> {
        let extracted_to = match &self.options().extract_to {
            Some(directory) => Some(write_unique(directory, &info.name, &bytes)?),
            None => None,
        };

        let found = FoundFile {
            name: info.name.clone(),
            bytes,
            size: info.size,
            modified_time: info.modified,
            match_value,
            nested_in: self.nested_in.clone(),
            extracted_to,
        };

        let Some((last, rest)) = keys.split_last() else {
            return Ok(());
        };
        for key in rest {
            self.push_found(key.clone(), found.clone());
        }
        self.push_found(last.clone(), found);
        Ok(())
    }

    fn push_found(&mut self, key: String, file: FoundFile) {
        trace!("Entry {} matched key {key}", file.name);
        self.found.insert(key.clone());
        self.results.entry(key).or_default().push(file);
    }

    fn all_found(&self) -> bool {
        self.options().return_first_only
            && self.query.file_names.iter().all(|name| self.found.contains(name))
            && self.query.predicates.iter().all(|p| self.found.contains(p.id()))
    }

    fn finish(self) -> SearchResults {
        let mut results = self.results;
        if !self.query.options.return_empty_list_per_file_name {
            results.retain(|_, files| !files.is_empty());
        }
        results
    }
}

/// Search a ZIP or 7Z archive for entries by name and/or by content
///
/// The source is MIME-sniffed with [`InferSniffer`] first; see
/// [`search_file_in_archive_with`].
///
/// # Errors
///
/// Returns `ArchiveError` if:
/// - Neither target names nor predicates are given ([`ArchiveError::InvalidArgument`])
/// - The source is not a ZIP or 7Z archive ([`ArchiveError::UnknownArchiveType`])
/// - The archive, or a nested archive, is corrupt or password-protected
/// - Nesting exceeds `max_depth`, or an entry exceeds `max_entry_size`
/// - A matched entry cannot be written to the extraction directory
#[must_use = "this function returns found files that should be processed"]
pub fn search_file_in_archive(
    source: ArchiveSource<'_>,
    query: &SearchQuery,
) -> Result<SearchResults, ArchiveError> {
    search_file_in_archive_with(source, query, &InferSniffer)
}

/// [`search_file_in_archive`] with a caller-provided MIME sniffer
///
/// The sniffed MIME type must be in
/// [`SUPPORTED_ARCHIVE_MIME_TYPES`](crate::mime::SUPPORTED_ARCHIVE_MIME_TYPES)
/// and the content must then be recognized as ZIP or 7Z; otherwise the
/// search fails with [`ArchiveError::UnknownArchiveType`].
#[must_use = "this function returns found files that should be processed"]
pub fn search_file_in_archive_with(
    source: ArchiveSource<'_>,
    query: &SearchQuery,
    sniffer: &dyn MimeSniffer,
) -> Result<SearchResults, ArchiveError> {
    query.validate()?;

    let mime = sniffer.sniff(source)?;
    if !is_supported_mime(&mime) {
        return Err(ArchiveError::UnknownArchiveType { mime });
    }
    let Some(format) = detect_archive_format(source)? else {
        return Err(ArchiveError::UnknownArchiveType { mime });
    };

    debug!("Searching {format} archive ({}, MIME {mime})", source.kind());
    let mut search = Search::new(query);
    search.search_source(source, format)?;
    Ok(search.finish())
}
