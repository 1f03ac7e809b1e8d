//! Two-line patch files: the bytes to find, the bytes to write.
//!
//! Each line is either a run of hex pairs or a text literal with
//! C-style escapes. Decoding happens here, so the rest of the crate
//! only ever sees raw bytes.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::Result;

/// Where to enumerate patch files from.
#[derive(Debug, Clone)]
pub struct PatchConfig {
    pub dir: PathBuf,
}

/// One decoded patch: find `original`, write `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRecord {
    pub name: String,
    pub original: Vec<u8>,
    pub replacement: Vec<u8>,
}

impl PatchRecord {
    /// Render the original bytes as an exact hex-pair signature.
    pub fn signature(&self) -> String {
        let pairs: Vec<String> = self.original.iter().map(|b| format!("{b:02X}")).collect();
        pairs.join(" ")
    }
}

/// Resolve C-style escapes in a text line. Unknown escapes keep the
/// escaped character; a trailing backslash is kept as-is.
pub fn unescape(input: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => out.push(b'\n'),
            Some('r') => out.push(b'\r'),
            Some('t') => out.push(b'\t'),
            Some('0') => out.push(0),
            Some('x') => {
                let hi = chars.next().and_then(|c| c.to_digit(16));
                let lo = chars.next().and_then(|c| c.to_digit(16));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => out.push((hi * 16 + lo) as u8),
                    _ => out.extend_from_slice(b"\\x"),
                }
            }
            Some(other) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => out.push(b'\\'),
        }
    }
    out
}

/// True when the line is nothing but hex pairs and whitespace, with at
/// least one pair.
pub fn is_hex_string(line: &str) -> bool {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    !compact.is_empty()
        && compact.len() % 2 == 0
        && compact.chars().all(|c| c.is_ascii_hexdigit())
}

/// Decode a run of hex pairs, ignoring whitespace. Callers check
/// [`is_hex_string`] first.
pub fn hex_to_bytes(line: &str) -> Vec<u8> {
    let digits: Vec<u32> = line
        .chars()
        .filter_map(|c| c.to_digit(16))
        .collect();
    digits
        .chunks_exact(2)
        .map(|pair| (pair[0] * 16 + pair[1]) as u8)
        .collect()
}

/// A patch line is hex when it parses as hex, text with escapes
/// otherwise.
pub fn decode_line(line: &str) -> Vec<u8> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if is_hex_string(trimmed) {
        hex_to_bytes(trimmed)
    } else {
        unescape(trimmed)
    }
}

/// Enumerate the patch directory in name order, decoding each two-line
/// file. Bad files are skipped with a warning, never aborting the batch.
pub fn load_patches(config: &PatchConfig) -> Result<Vec<PatchRecord>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(&config.dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut records = Vec::new();
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(error) => {
                warn!(patch = %name, %error, "skipping unreadable patch file");
                continue;
            }
        };
        let mut lines = data.lines();
        let (Some(first), Some(second)) = (lines.next(), lines.next()) else {
            warn!(patch = %name, "skipping patch file with fewer than two lines");
            continue;
        };
        let original = decode_line(first);
        let replacement = decode_line(second);
        if original.is_empty() || replacement.is_empty() {
            warn!(patch = %name, "skipping patch file with an empty line");
            continue;
        }
        debug!(patch = %name, find = original.len(), write = replacement.len(), "loaded patch");
        records.push(PatchRecord {
            name,
            original,
            replacement,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_unescape_known_escapes() {
        assert_eq!(unescape("a\\nb\\rc\\td\\0e"), b"a\nb\rc\td\0e");
        assert_eq!(unescape("\\x41\\x00"), vec![0x41, 0x00]);
    }

    #[test]
    fn test_unescape_unknown_escape_keeps_character() {
        assert_eq!(unescape("a\\qb"), b"aqb");
    }

    #[test]
    fn test_unescape_trailing_backslash() {
        assert_eq!(unescape("ab\\"), b"ab\\");
    }

    #[test]
    fn test_unescape_bad_hex_escape_is_literal() {
        assert_eq!(unescape("\\xZZ"), b"\\xZZ");
    }

    #[test]
    fn test_is_hex_string() {
        assert!(is_hex_string("DE AD BE EF"));
        assert!(is_hex_string("deadbeef"));
        assert!(!is_hex_string("DE AD Q"));
        assert!(!is_hex_string("ABC"));
        assert!(!is_hex_string("   "));
    }

    #[test]
    fn test_decode_line_hex_versus_text() {
        assert_eq!(decode_line("CC 90"), vec![0xCC, 0x90]);
        assert_eq!(decode_line("hello\\n"), b"hello\n");
    }

    #[test]
    fn test_record_renders_hex_signature() {
        let record = PatchRecord {
            name: "x".into(),
            original: vec![0xDE, 0xAD, 0x0F],
            replacement: vec![0x90],
        };
        assert_eq!(record.signature(), "DE AD 0F");
    }

    #[test]
    fn test_load_patches_reads_sorted_and_skips_bad() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, body: &str| {
            let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
            f.write_all(body.as_bytes()).unwrap();
        };
        write("b.txt", "CC 90\n90 90\n");
        write("a.txt", "text\\0\nmore\\0\n");
        write("short.txt", "only one line\n");

        let records = load_patches(&PatchConfig {
            dir: dir.path().to_path_buf(),
        })
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "a.txt");
        assert_eq!(records[0].original, b"text\0");
        assert_eq!(records[1].original, vec![0xCC, 0x90]);
    }
}
