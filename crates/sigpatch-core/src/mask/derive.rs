//! Runs a compiled mask against a found match.

use serde::Serialize;

use super::compiler::{CompiledMask, SynthesisInstruction};
use crate::error::{Error, Result};
use crate::image::ImageView;

/// Capability for resolving the nested signatures of `@N(...)` tokens.
///
/// Injected rather than wired to the scanner, so this module does not
/// depend on the scan facade that depends back on it.
pub trait PatternResolver {
    /// Compile and scan the signature, returning the first
    /// module-relative match address, or `None` when nothing matches.
    fn resolve(&self, signature: &str) -> Result<Option<u64>>;
}

/// The byte streams produced by running a mask at a match address.
///
/// `original_bytes` and `synthesized_bytes` always have the same length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivationOutcome {
    /// Module-relative address the mask was executed at.
    pub address: u64,
    /// Bytes as they were found in the image.
    pub original_bytes: Vec<u8>,
    /// Bytes the mask synthesized for the same span.
    pub synthesized_bytes: Vec<u8>,
}

/// Execute the mask left to right, starting at the match address.
///
/// Out-of-bounds reads are fatal here: unlike a scan attempt there is no
/// next offset to fall back to.
pub fn derive(
    mask: &CompiledMask,
    address: u64,
    image: &ImageView<'_>,
    resolver: &dyn PatternResolver,
) -> Result<DerivationOutcome> {
    let mut original = Vec::new();
    let mut synthesized = Vec::new();
    let mut cursor = address;

    for instruction in &mask.instructions {
        match instruction {
            SynthesisInstruction::CopyByte => {
                let byte = image.byte_at(cursor)?;
                original.push(byte);
                synthesized.push(byte);
                cursor += 1;
            }
            SynthesisInstruction::Literal(value) => {
                original.push(image.byte_at(cursor)?);
                synthesized.push(*value);
                cursor += 1;
            }
            SynthesisInstruction::RelativeAdd(delta) => {
                let byte = image.byte_at(cursor)?;
                original.push(byte);
                synthesized.push((byte as i16).wrapping_add(*delta) as u8);
                cursor += 1;
            }
            SynthesisInstruction::AddressDeref { offset } => {
                emit_deref(image, &mut original, &mut synthesized, &mut cursor, *offset, 0)?;
            }
            SynthesisInstruction::AddressDerefRelative { offset, delta } => {
                emit_deref(
                    image,
                    &mut original,
                    &mut synthesized,
                    &mut cursor,
                    *offset,
                    *delta,
                )?;
            }
            SynthesisInstruction::EmbeddedPattern { width, signature } => {
                let resolved = resolver
                    .resolve(signature)?
                    .ok_or_else(|| Error::UnresolvedEmbeddedPattern(signature.clone()))?;
                let displacement =
                    (resolved as i64).wrapping_sub(cursor.wrapping_add(*width as u64) as i64);
                for index in 0..*width {
                    original.push(image.byte_at(cursor + index as u64)?);
                    synthesized.push((displacement >> (index * 8)) as u8);
                }
                cursor += *width as u64;
            }
        }
    }

    debug_assert_eq!(original.len(), synthesized.len());
    Ok(DerivationOutcome {
        address,
        original_bytes: original,
        synthesized_bytes: synthesized,
    })
}

/// Both deref forms occupy a pointer-width span of output positions: the
/// original side records the bytes being replaced at the cursor, the
/// synthesized side the little-endian value read at cursor + offset.
fn emit_deref(
    image: &ImageView<'_>,
    original: &mut Vec<u8>,
    synthesized: &mut Vec<u8>,
    cursor: &mut u64,
    offset: i64,
    delta: i64,
) -> Result<()> {
    let source = image.offset_by(*cursor, offset)?;
    let value = image.read_ptr(source)?.wrapping_add_signed(delta);
    for index in 0..image.ptr_size() {
        original.push(image.byte_at(*cursor + index as u64)?);
        synthesized.push((value >> (index * 8)) as u8);
    }
    *cursor += image.ptr_size() as u64;
    Ok(())
}
