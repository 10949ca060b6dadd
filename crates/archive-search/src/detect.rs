//! Archive format detection
//!
//! Formats are recognized from content, never from the file extension.
//! ZIP can be detected either by its leading signature or by opening the
//! container; 7Z is only detected by its signature, since a 7Z archive that
//! opens but fails an integrity check is still a 7Z archive.

use crate::error::ArchiveError;
use crate::reader::{ArchiveFormat, ArchiveSource};
use log::{debug, warn};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};
use zip::ZipArchive;

/// Leading signatures of a ZIP file: local file header, end of central
/// directory (empty archive) and spanned-archive marker.
pub const ZIP_SIGNATURES: [[u8; 4]; 3] = [
    [0x50, 0x4b, 0x03, 0x04],
    [0x50, 0x4b, 0x05, 0x06],
    [0x50, 0x4b, 0x07, 0x08],
];

/// 7Z signature: '7' 'z' BC AF 27 1C
pub const SEVEN_Z_SIGNATURE: [u8; 6] = [0x37, 0x7a, 0xbc, 0xaf, 0x27, 0x1c];

/// Check in-memory bytes for a ZIP signature
#[inline]
#[must_use]
pub fn is_zip_magic(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && ZIP_SIGNATURES.iter().any(|sig| bytes[..4] == sig[..])
}

/// Check in-memory bytes for the 7Z signature
#[inline]
#[must_use]
pub fn is_7z_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(&SEVEN_Z_SIGNATURE)
}

/// Check a source for a ZIP signature, reading only its first 4 bytes
pub fn is_zip_magic_number(source: ArchiveSource<'_>) -> Result<bool, ArchiveError> {
    Ok(is_zip_magic(&source.read_prefix(4)?))
}

/// Check a source for the 7Z signature, reading only its first 6 bytes
pub fn is_7z_magic_number(source: ArchiveSource<'_>) -> Result<bool, ArchiveError> {
    Ok(is_7z_magic(&source.read_prefix(SEVEN_Z_SIGNATURE.len())?))
}

/// Classify in-memory bytes by signature alone
#[must_use]
pub fn detect_format_by_magic(bytes: &[u8]) -> Option<ArchiveFormat> {
    if is_zip_magic(bytes) {
        Some(ArchiveFormat::Zip)
    } else if is_7z_magic(bytes) {
        Some(ArchiveFormat::SevenZip)
    } else {
        None
    }
}

/// Read every file entry to the end so the `zip` reader verifies its CRC.
///
/// Returns the name of the first entry that fails.
fn first_bad_entry<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Option<String> {
    for i in 0..archive.len() {
        let name = archive.name_for_index(i).unwrap_or_default().to_string();
        let checked = archive
            .by_index(i)
            .map_err(io::Error::other)
            .and_then(|mut entry| io::copy(&mut entry, &mut io::sink()));
        if let Err(e) = checked {
            debug!("Integrity check failed for {name}: {e}");
            return Some(name);
        }
    }
    None
}

fn open_zip_for_check(source: ArchiveSource<'_>) -> Result<Option<ZipOpened<'_>>, ArchiveError> {
    match source {
        ArchiveSource::Path(path) => {
            let file = File::open(path)?;
            Ok(ZipArchive::new(BufReader::new(file)).ok().map(ZipOpened::File))
        }
        ArchiveSource::Bytes(bytes) => {
            Ok(ZipArchive::new(Cursor::new(bytes)).ok().map(ZipOpened::Memory))
        }
    }
}

enum ZipOpened<'a> {
    File(ZipArchive<BufReader<File>>),
    Memory(ZipArchive<Cursor<&'a [u8]>>),
}

impl ZipOpened<'_> {
    fn first_bad_entry(&mut self) -> Option<String> {
        match self {
            ZipOpened::File(archive) => first_bad_entry(archive),
            ZipOpened::Memory(archive) => first_bad_entry(archive),
        }
    }
}

/// Test every entry of a ZIP archive against its stored CRC
///
/// Returns `Ok(None)` if all entries are intact, or the name of the first
/// damaged entry.
///
/// # Errors
///
/// Fails if the source cannot be read or is not a ZIP container at all.
pub fn test_zip(source: ArchiveSource<'_>) -> Result<Option<String>, ArchiveError> {
    let mut archive = match source {
        ArchiveSource::Path(path) => ZipOpened::File(ZipArchive::new(BufReader::new(
            File::open(path)?,
        ))?),
        ArchiveSource::Bytes(bytes) => ZipOpened::Memory(ZipArchive::new(Cursor::new(bytes))?),
    };
    Ok(archive.first_bad_entry())
}

/// Decide whether a source is a ZIP archive by opening it
///
/// A container the `zip` reader cannot parse yields `false`. Damaged
/// entries inside a parseable container are logged but do not change the
/// answer.
///
/// # Errors
///
/// Only fails when a path source cannot be opened.
pub fn is_zip_archive(source: ArchiveSource<'_>) -> Result<bool, ArchiveError> {
    let Some(mut archive) = open_zip_for_check(source)? else {
        return Ok(false);
    };
    if let Some(bad) = archive.first_bad_entry() {
        warn!("ZIP archive has a damaged entry: {bad}");
    }
    Ok(true)
}

/// Detect the format of a top-level source.
///
/// ZIP is recognized by opening the container (so self-extracting
/// executables with an appended ZIP are accepted), 7Z by its signature.
pub fn detect_archive_format(
    source: ArchiveSource<'_>,
) -> Result<Option<ArchiveFormat>, ArchiveError> {
    if is_zip_archive(source)? {
        Ok(Some(ArchiveFormat::Zip))
    } else if is_7z_magic_number(source)? {
        Ok(Some(ArchiveFormat::SevenZip))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use zip::write::{SimpleFileOptions, ZipWriter};

    fn small_zip() -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("hello.txt", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"hello").unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_zip_signatures() {
        assert!(is_zip_magic(b"PK\x03\x04rest"));
        assert!(is_zip_magic(b"PK\x05\x06"));
        assert!(is_zip_magic(b"PK\x07\x08"));
        assert!(!is_zip_magic(b"PK\x01\x02"));
        assert!(!is_zip_magic(b"PK"));
    }

    #[test]
    fn test_7z_signature() {
        assert!(is_7z_magic(b"7z\xBC\xAF\x27\x1C\x00\x04"));
        assert!(!is_7z_magic(b"7z\xBC\xAF\x27"));
        assert!(!is_7z_magic(b"PK\x03\x04\x00\x00"));
    }

    #[test]
    fn test_magic_number_from_path_reads_prefix() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&SEVEN_Z_SIGNATURE).unwrap();
        file.write_all(&[0u8; 64]).unwrap();
        file.flush().unwrap();

        assert!(is_7z_magic_number(ArchiveSource::Path(file.path())).unwrap());
        assert!(!is_zip_magic_number(ArchiveSource::Path(file.path())).unwrap());
    }

    #[test]
    fn test_magic_number_missing_path_is_error() {
        let missing = std::path::Path::new("definitely/not/here.zip");
        assert!(is_zip_magic_number(ArchiveSource::Path(missing)).is_err());
    }

    #[test]
    fn test_is_zip_archive() {
        let zip = small_zip();
        assert!(is_zip_archive(ArchiveSource::Bytes(&zip)).unwrap());
        // Signature alone is not enough for the open-based check
        assert!(!is_zip_archive(ArchiveSource::Bytes(b"PK\x03\x04garbage")).unwrap());
        assert!(!is_zip_archive(ArchiveSource::Bytes(b"")).unwrap());
    }

    #[test]
    fn test_test_zip_reports_corrupt_entry() {
        assert_eq!(test_zip(ArchiveSource::Bytes(&small_zip())).unwrap(), None);

        let payload = b"payload-bytes";
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(
                "hello.txt",
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored),
            )
            .unwrap();
        writer.write_all(payload).unwrap();
        let mut zip = writer.finish().unwrap().into_inner();

        let data_offset = zip
            .windows(payload.len())
            .position(|w| w == payload)
            .unwrap();
        zip[data_offset] ^= 0xff;

        assert_eq!(
            test_zip(ArchiveSource::Bytes(&zip)).unwrap(),
            Some("hello.txt".to_string())
        );
        // Still a ZIP container
        assert!(is_zip_archive(ArchiveSource::Bytes(&zip)).unwrap());
    }

    #[test]
    fn test_detect_archive_format() {
        let zip = small_zip();
        assert_eq!(
            detect_archive_format(ArchiveSource::Bytes(&zip)).unwrap(),
            Some(ArchiveFormat::Zip)
        );
        assert_eq!(
            detect_archive_format(ArchiveSource::Bytes(&SEVEN_Z_SIGNATURE)).unwrap(),
            Some(ArchiveFormat::SevenZip)
        );
        assert_eq!(
            detect_archive_format(ArchiveSource::Bytes(b"MZ\x90\x00")).unwrap(),
            None
        );
        assert_eq!(detect_format_by_magic(&zip), Some(ArchiveFormat::Zip));
    }
}
