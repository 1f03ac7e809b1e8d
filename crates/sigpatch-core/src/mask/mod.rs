mod compiler;
mod derive;

pub use compiler::{CompiledMask, REPEAT_RADIX, SynthesisInstruction, compile_mask};
pub use derive::{DerivationOutcome, PatternResolver, derive};
