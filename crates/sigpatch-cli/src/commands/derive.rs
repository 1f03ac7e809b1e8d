//! Derive command implementation.
//!
//! Scans for the signature, runs the mask at every match, and prints
//! the original and synthesized byte streams side by side with the
//! differing bytes highlighted.

use std::path::Path;

use anyhow::{Result, bail};
use owo_colors::OwoColorize;
use sigpatch_core::{ImageView, ScanEngine};

pub fn run(image: &Path, signature: &str, mask: &str, base: u64) -> Result<()> {
    let bytes = super::read_image(image)?;
    let engine = ScanEngine::new(ImageView::new(base, &bytes));

    let outcomes = engine.derive(signature, mask)?;
    if outcomes.is_empty() {
        bail!("signature not found");
    }

    for outcome in &outcomes {
        let changed = outcome
            .original_bytes
            .iter()
            .zip(&outcome.synthesized_bytes)
            .filter(|(a, b)| a != b)
            .count();

        println!("Match at {:#010X}:", base + outcome.address);
        println!(
            "  original:    {}",
            diff_line(&outcome.original_bytes, &outcome.synthesized_bytes, false)
        );
        println!(
            "  synthesized: {}",
            diff_line(&outcome.synthesized_bytes, &outcome.original_bytes, true)
        );
        println!(
            "  {} of {} byte(s) differ",
            changed,
            outcome.original_bytes.len()
        );
    }
    Ok(())
}

/// Render one byte stream, coloring the positions where it disagrees
/// with the other stream: red for the bytes being replaced, green for
/// their replacements.
fn diff_line(bytes: &[u8], other: &[u8], synthesized: bool) -> String {
    let pairs: Vec<String> = bytes
        .iter()
        .zip(other)
        .map(|(byte, reference)| {
            if byte == reference {
                format!("{byte:02X}")
            } else if synthesized {
                format!("{:02X}", byte.green())
            } else {
                format!("{:02X}", byte.red())
            }
        })
        .collect();
    pairs.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_line_passes_equal_bytes_through() {
        assert_eq!(
            diff_line(&[0xDE, 0xAD], &[0xDE, 0xAD], true),
            "DE AD"
        );
        assert_eq!(diff_line(&[], &[], false), "");
    }

    #[test]
    fn test_diff_line_marks_changed_positions() {
        // Equal positions stay plain, changed ones gain color codes
        let line = diff_line(&[0x90, 0xAD], &[0xDE, 0xAD], true);
        assert!(line.ends_with(" AD"));
        assert_ne!(line, "90 AD");
        assert!(line.contains("90"));
    }
}
