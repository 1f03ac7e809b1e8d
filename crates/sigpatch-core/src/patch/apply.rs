//! Applying patch records through an image writer.

use tracing::{info, warn};

use super::record::PatchRecord;
use crate::engine::ScanEngine;
use crate::error::Result;

/// Write access to the bytes behind an image view.
pub trait ImageWriter {
    fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<()>;
}

/// Writes into an owned buffer. Used by the file-based patch path:
/// read the file, apply, write the result back out.
pub struct BufferWriter {
    bytes: Vec<u8>,
}

impl BufferWriter {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl ImageWriter for BufferWriter {
    fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let start = offset as usize;
        let end = start
            .checked_add(bytes.len())
            .filter(|end| *end <= self.bytes.len())
            .ok_or(crate::error::Error::OutOfBounds { offset })?;
        self.bytes[start..end].copy_from_slice(bytes);
        Ok(())
    }
}

/// Counts from one batch of patch records.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub missed: usize,
}

/// Scan for each record's original bytes and write the replacement at
/// every reported offset. Each record scans before it writes, so a
/// record never matches bytes it has itself just rewritten.
pub fn apply_patches(
    engine: &ScanEngine<'_>,
    records: &[PatchRecord],
    writer: &mut dyn ImageWriter,
) -> Result<ApplyReport> {
    let mut report = ApplyReport::default();
    for record in records {
        let offsets = engine.matches(&record.signature())?;
        if offsets.is_empty() {
            warn!(patch = %record.name, "pattern not found, patch skipped");
            report.missed += 1;
            continue;
        }
        for offset in &offsets {
            writer.write(*offset, &record.replacement)?;
        }
        info!(patch = %record.name, offsets = offsets.len(), "patch applied");
        report.applied += 1;
    }
    Ok(report)
}
