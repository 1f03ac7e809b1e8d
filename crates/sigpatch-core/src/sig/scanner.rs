//! Linear image scanner with skip-on-mismatch groups.

use memchr::memchr_iter;

use super::compiler::{CompiledSignature, MatchInstruction, MatchKind};
use crate::image::ImageView;

/// Per-attempt scan state: the next byte to compare and the address that
/// will be reported if the attempt succeeds. Keeping the two separate
/// makes the group realignment arithmetic auditable on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cursor {
    read: u64,
    reported: u64,
}

impl Cursor {
    pub(crate) fn new(start: u64) -> Self {
        Self {
            read: start,
            reported: start,
        }
    }

    /// Next byte position to compare.
    pub(crate) fn read(&self) -> u64 {
        self.read
    }

    pub(crate) fn advance(&mut self, bytes: u64) {
        self.read += bytes;
    }

    /// Realign after a failed group: resume right after the group's span.
    pub(crate) fn resume_at(&mut self, position: u64) {
        self.read = position;
    }

    /// `^` marker: report the current read position instead of the start.
    pub(crate) fn mark(&mut self) {
        self.reported = self.read;
    }

    pub(crate) fn reported(&self) -> u64 {
        self.reported
    }
}

/// Scan the image, honoring the signature's own find-first/find-all mode.
///
/// Returns module-relative offsets in ascending order. An empty image
/// yields an empty result.
pub fn scan(signature: &CompiledSignature, image: &ImageView<'_>) -> Vec<u64> {
    collect_matches(signature, image, !signature.find_all)
}

/// First match regardless of the signature's mode.
pub fn scan_first(signature: &CompiledSignature, image: &ImageView<'_>) -> Option<u64> {
    collect_matches(signature, image, true).pop()
}

/// Every match regardless of the signature's mode.
pub fn scan_all(signature: &CompiledSignature, image: &ImageView<'_>) -> Vec<u64> {
    collect_matches(signature, image, false)
}

fn collect_matches(
    signature: &CompiledSignature,
    image: &ImageView<'_>,
    stop_after_first: bool,
) -> Vec<u64> {
    let mut matches = Vec::new();
    if image.is_empty() || signature.instructions.is_empty() {
        return matches;
    }

    // When the signature opens with an unconditional exact byte, only
    // offsets holding that byte can start a match.
    let first_byte = match signature.instructions.first() {
        Some(MatchInstruction {
            kind: MatchKind::ExactByte(value),
            skip_on_fail: None,
        }) => Some(*value),
        _ => None,
    };

    match first_byte {
        Some(value) => {
            for start in memchr_iter(value, image.bytes()) {
                if let Some(address) = try_match(signature, image, start as u64) {
                    matches.push(address);
                    if stop_after_first {
                        break;
                    }
                }
            }
        }
        None => {
            for start in 0..image.len() {
                if let Some(address) = try_match(signature, image, start) {
                    matches.push(address);
                    if stop_after_first {
                        break;
                    }
                }
            }
        }
    }

    matches
}

/// Attempt the full instruction sequence at one start offset.
///
/// A mismatch outside a group, or any read at or past the image end,
/// fails the attempt; a mismatch inside a group jumps past the group and
/// realigns the cursor to the end of the group's byte span.
fn try_match(signature: &CompiledSignature, image: &ImageView<'_>, start: u64) -> Option<u64> {
    let instructions = &signature.instructions;
    let mut cursor = Cursor::new(start);
    let mut group_resume = start;
    let mut index = 0;

    while index < instructions.len() {
        let instruction = &instructions[index];
        match instruction.kind {
            MatchKind::SetCursor => cursor.mark(),
            MatchKind::GroupStart(len) => group_resume = cursor.read() + len as u64,
            MatchKind::Wildcard => {
                image.byte_at(cursor.read()).ok()?;
                cursor.advance(1);
            }
            MatchKind::ExactByte(value) => {
                let byte = image.byte_at(cursor.read()).ok()?;
                if byte == value {
                    cursor.advance(1);
                } else {
                    // Inside a group the mismatch skips the group's
                    // remainder; outside it the attempt is over.
                    let skip = instruction.skip_on_fail?;
                    index += skip;
                    cursor.resume_at(group_resume);
                }
            }
        }
        index += 1;
    }

    Some(cursor.reported())
}
