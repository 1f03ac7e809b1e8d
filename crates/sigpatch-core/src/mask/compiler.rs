//! Mask language compiler.
//!
//! A mask describes how to synthesize replacement bytes at a match:
//!
//! ```text
//! HH            emit the literal byte
//! ?             pass the original byte through
//! %(+HH)        add a signed delta to the original byte
//! $(+HH)        emit the pointer-size value read at cursor + offset
//! &(+HH)(+HH)   like $ but perturb the value by a signed delta first
//! *(HH)         repeat the next token HH times
//! @N(sig)       emit an N-byte displacement to another pattern's match
//! ```

use crate::error::{Error, Result};
use crate::sig::compile_signature;

/// Radix of `*(..)` repeat counts: `*(10)` means 16 copies.
///
/// Fixed as hexadecimal, like every other numeric token, and pinned by
/// a test.
pub const REPEAT_RADIX: u32 = 16;

/// One step of a compiled mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisInstruction {
    /// Pass the original byte through unchanged.
    CopyByte,
    /// Emit this byte.
    Literal(u8),
    /// Add a signed delta to the original byte, mod 256.
    RelativeAdd(i16),
    /// Emit the pointer-size little-endian value read at cursor + offset.
    AddressDeref { offset: i64 },
    /// Like `AddressDeref`, with the value perturbed by a signed delta.
    AddressDerefRelative { offset: i64, delta: i64 },
    /// Emit a `width`-byte little-endian displacement from the end of
    /// this slot to wherever the nested signature matches.
    EmbeddedPattern { width: usize, signature: String },
}

/// A mask compiled to its instruction list. Repeat prefixes are already
/// expanded: each copy is a separate instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledMask {
    pub instructions: Vec<SynthesisInstruction>,
}

pub fn compile_mask(text: &str) -> Result<CompiledMask> {
    let bytes = text.as_bytes();
    let mut pos = 0usize;
    let mut instructions = Vec::new();
    // (count, offset of the '*') awaiting the token it applies to
    let mut pending_repeat: Option<(usize, usize)> = None;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let instruction = match c {
            b'?' => {
                pos += 1;
                SynthesisInstruction::CopyByte
            }
            b'%' => {
                pos += 1;
                expect(bytes, &mut pos, b'(')?;
                let delta = signed_byte(bytes, &mut pos)?;
                expect(bytes, &mut pos, b')')?;
                SynthesisInstruction::RelativeAdd(delta)
            }
            b'$' => {
                pos += 1;
                expect(bytes, &mut pos, b'(')?;
                let offset = signed_byte(bytes, &mut pos)? as i64;
                expect(bytes, &mut pos, b')')?;
                SynthesisInstruction::AddressDeref { offset }
            }
            b'&' => {
                pos += 1;
                expect(bytes, &mut pos, b'(')?;
                let offset = signed_byte(bytes, &mut pos)? as i64;
                expect(bytes, &mut pos, b')')?;
                expect(bytes, &mut pos, b'(')?;
                let delta = signed_byte(bytes, &mut pos)? as i64;
                expect(bytes, &mut pos, b')')?;
                SynthesisInstruction::AddressDerefRelative { offset, delta }
            }
            b'*' => {
                let star = pos;
                if pending_repeat.is_some() {
                    return Err(malformed(star, "repeat prefix cannot follow another repeat"));
                }
                pos += 1;
                expect(bytes, &mut pos, b'(')?;
                let count = hex_byte(bytes, &mut pos)?;
                expect(bytes, &mut pos, b')')?;
                if count == 0 {
                    return Err(malformed(star, "repeat count must be positive"));
                }
                pending_repeat = Some((count as usize, star));
                continue;
            }
            b'@' => compile_embedded(text, bytes, &mut pos)?,
            _ => SynthesisInstruction::Literal(hex_byte(bytes, &mut pos)?),
        };

        let count = pending_repeat.take().map_or(1, |(count, _)| count);
        for _ in 0..count {
            instructions.push(instruction.clone());
        }
    }

    if let Some((_, star)) = pending_repeat {
        return Err(malformed(star, "repeat prefix with no following token"));
    }
    if instructions.is_empty() {
        return Err(malformed(0, "mask is empty"));
    }

    Ok(CompiledMask { instructions })
}

fn compile_embedded(text: &str, bytes: &[u8], pos: &mut usize) -> Result<SynthesisInstruction> {
    let at = *pos;
    *pos += 1;

    let width = match bytes.get(*pos) {
        Some(c @ b'0'..=b'9') => {
            *pos += 1;
            (c - b'0') as usize
        }
        _ => return Err(malformed(at, "expected a width digit after '@'")),
    };
    if !(1..=8).contains(&width) {
        return Err(malformed(at, "embedded pattern width must be 1-8"));
    }

    expect(bytes, pos, b'(')?;
    let start = *pos;
    while *pos < bytes.len() && bytes[*pos] != b')' {
        *pos += 1;
    }
    if *pos >= bytes.len() {
        return Err(malformed(at, "unmatched '(' in embedded pattern"));
    }
    let signature = text[start..*pos].to_string();
    *pos += 1;

    // Validate the nested signature now so errors surface at compile
    // time; resolution itself stays a facade capability.
    compile_signature(&signature)
        .map_err(|e| malformed(at, &format!("embedded pattern: {e}")))?;

    Ok(SynthesisInstruction::EmbeddedPattern { width, signature })
}

fn expect(bytes: &[u8], pos: &mut usize, wanted: u8) -> Result<()> {
    if bytes.get(*pos) == Some(&wanted) {
        *pos += 1;
        Ok(())
    } else {
        Err(malformed(*pos, &format!("expected '{}'", wanted as char)))
    }
}

/// `±HH` with an optional sign, as a value in -255..=255.
fn signed_byte(bytes: &[u8], pos: &mut usize) -> Result<i16> {
    let negative = match bytes.get(*pos) {
        Some(b'+') => {
            *pos += 1;
            false
        }
        Some(b'-') => {
            *pos += 1;
            true
        }
        _ => false,
    };
    let magnitude = hex_byte(bytes, pos)? as i16;
    Ok(if negative { -magnitude } else { magnitude })
}

fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn hex_byte(bytes: &[u8], pos: &mut usize) -> Result<u8> {
    let start = *pos;
    let hi = bytes
        .get(start)
        .copied()
        .and_then(hex_digit)
        .ok_or_else(|| malformed(start, "expected a two-digit hex byte"))?;
    let lo = bytes
        .get(start + 1)
        .copied()
        .and_then(hex_digit)
        .ok_or_else(|| malformed(start, "expected a two-digit hex byte"))?;
    *pos += 2;
    Ok(hi << 4 | lo)
}

fn malformed(offset: usize, message: &str) -> Error {
    Error::MalformedMask {
        offset,
        message: message.to_string(),
    }
}
