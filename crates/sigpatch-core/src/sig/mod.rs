mod compiler;
mod scanner;

pub use compiler::{CompiledSignature, MatchInstruction, MatchKind, compile_signature};
pub use scanner::{scan, scan_all, scan_first};
