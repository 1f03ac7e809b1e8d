//! Signature language compiler.
//!
//! A signature is a whitespace-tolerant token stream:
//!
//! ```text
//! 48 8B ?   exact bytes and wildcards
//! ^         report the match address at this position
//! [AA BB]   alternation group: an internal mismatch skips the rest of
//!           the group instead of aborting the attempt
//! *         (first token only) collect every match, not just the first
//! ```

use crate::error::{Error, Result};

/// One step of a compiled signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchInstruction {
    pub kind: MatchKind,
    /// Number of instructions to jump over when this one fails inside an
    /// alternation group. `None` means a mismatch aborts the attempt.
    pub skip_on_fail: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// The byte at the cursor must equal this value.
    ExactByte(u8),
    /// Any byte matches.
    Wildcard,
    /// Report the current cursor position as the match address.
    SetCursor,
    /// Marks an alternation group spanning this many bytes.
    GroupStart(usize),
}

/// A signature compiled to its instruction list.
///
/// Immutable once compiled; reusable across any number of scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSignature {
    /// Collect every match instead of stopping at the first one.
    pub find_all: bool,
    pub instructions: Vec<MatchInstruction>,
}

pub fn compile_signature(text: &str) -> Result<CompiledSignature> {
    let bytes = text.as_bytes();
    let mut pos = 0usize;
    let mut instructions = Vec::new();

    skip_whitespace(bytes, &mut pos);
    let find_all = bytes.get(pos) == Some(&b'*');
    if find_all {
        pos += 1;
    }

    loop {
        skip_whitespace(bytes, &mut pos);
        let Some(&c) = bytes.get(pos) else { break };

        match c {
            b'?' => {
                instructions.push(unconditional(MatchKind::Wildcard));
                pos += 1;
            }
            b'^' => {
                instructions.push(unconditional(MatchKind::SetCursor));
                pos += 1;
            }
            b'[' => compile_group(bytes, &mut pos, &mut instructions)?,
            b']' => return Err(malformed(pos, "unmatched ']'")),
            b'*' => return Err(malformed(pos, "'*' is only valid as the first token")),
            _ => {
                let value = hex_byte(bytes, &mut pos)?;
                instructions.push(unconditional(MatchKind::ExactByte(value)));
            }
        }
    }

    if instructions.is_empty() {
        return Err(malformed(0, "signature is empty"));
    }

    Ok(CompiledSignature {
        find_all,
        instructions,
    })
}

fn compile_group(
    bytes: &[u8],
    pos: &mut usize,
    instructions: &mut Vec<MatchInstruction>,
) -> Result<()> {
    let group_pos = *pos;
    *pos += 1;
    let mut members = Vec::new();

    loop {
        skip_whitespace(bytes, pos);
        match bytes.get(*pos) {
            None => return Err(malformed(group_pos, "unmatched '['")),
            Some(b']') => {
                *pos += 1;
                break;
            }
            Some(b'?') => {
                members.push(MatchKind::Wildcard);
                *pos += 1;
            }
            // Every group member must occupy exactly one byte so the
            // scanner's realignment after a failed member is exact.
            Some(b'^') | Some(b'*') | Some(b'[') => {
                return Err(malformed(
                    *pos,
                    "only byte and '?' tokens are allowed inside a group",
                ));
            }
            Some(_) => members.push(MatchKind::ExactByte(hex_byte(bytes, pos)?)),
        }
    }

    if members.is_empty() {
        return Err(malformed(group_pos, "empty group"));
    }

    let len = members.len();
    instructions.push(unconditional(MatchKind::GroupStart(len)));
    for (index, kind) in members.into_iter().enumerate() {
        instructions.push(MatchInstruction {
            kind,
            skip_on_fail: Some(len - index - 1),
        });
    }
    Ok(())
}

fn unconditional(kind: MatchKind) -> MatchInstruction {
    MatchInstruction {
        kind,
        skip_on_fail: None,
    }
}

fn skip_whitespace(bytes: &[u8], pos: &mut usize) {
    while matches!(bytes.get(*pos), Some(b) if b.is_ascii_whitespace()) {
        *pos += 1;
    }
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
    Error::MalformedSignature {
        offset,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(signature: &CompiledSignature) -> Vec<MatchKind> {
        signature.instructions.iter().map(|i| i.kind).collect()
    }

    #[test]
    fn test_compile_exact_bytes_and_wildcards() {
        let sig = compile_signature("48 8B ? c3").unwrap();
        assert!(!sig.find_all);
        assert_eq!(
            kinds(&sig),
            vec![
                MatchKind::ExactByte(0x48),
                MatchKind::ExactByte(0x8B),
                MatchKind::Wildcard,
                MatchKind::ExactByte(0xC3),
            ]
        );
        assert!(sig.instructions.iter().all(|i| i.skip_on_fail.is_none()));
    }

    #[test]
    fn test_compile_without_spaces() {
        let sig = compile_signature("488B?").unwrap();
        assert_eq!(sig.instructions.len(), 3);
    }

    #[test]
    fn test_compile_set_cursor() {
        let sig = compile_signature("AA ^ BB").unwrap();
        assert_eq!(sig.instructions[1].kind, MatchKind::SetCursor);
    }

    #[test]
    fn test_find_all_prefix() {
        let sig = compile_signature("* AA BB").unwrap();
        assert!(sig.find_all);
        // The marker is consumed, not compiled
        assert_eq!(sig.instructions.len(), 2);
    }

    #[test]
    fn test_star_elsewhere_is_rejected() {
        let err = compile_signature("AA * BB").unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedSignature { offset: 3, .. }
        ));
    }

    #[test]
    fn test_group_skip_counts_decrease() {
        let sig = compile_signature("[AA BB CC]").unwrap();
        assert_eq!(sig.instructions[0].kind, MatchKind::GroupStart(3));
        let skips: Vec<_> = sig.instructions[1..]
            .iter()
            .map(|i| i.skip_on_fail)
            .collect();
        assert_eq!(skips, vec![Some(2), Some(1), Some(0)]);
    }

    #[test]
    fn test_group_allows_wildcards() {
        let sig = compile_signature("[AA ? BB]").unwrap();
        assert_eq!(sig.instructions[2].kind, MatchKind::Wildcard);
        assert_eq!(sig.instructions[2].skip_on_fail, Some(1));
    }

    #[test]
    fn test_group_rejects_markers() {
        assert!(compile_signature("[AA ^ BB]").is_err());
        assert!(compile_signature("[AA * BB]").is_err());
        assert!(compile_signature("[AA [BB]]").is_err());
    }

    #[test]
    fn test_unmatched_brackets() {
        let err = compile_signature("AA [BB").unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedSignature { offset: 3, .. }
        ));
        assert!(compile_signature("AA ]").is_err());
        assert!(compile_signature("[]").is_err());
    }

    #[test]
    fn test_malformed_hex_reports_offset() {
        let err = compile_signature("AA ZZ").unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedSignature { offset: 3, .. }
        ));

        // A lone trailing nibble is malformed, not silently dropped
        let err = compile_signature("AA B").unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedSignature { offset: 3, .. }
        ));
    }

    #[test]
    fn test_empty_signature_is_rejected() {
        assert!(compile_signature("").is_err());
        assert!(compile_signature("   ").is_err());
        assert!(compile_signature("*").is_err());
    }
}
