//! # sigpatch-core
//!
//! Signature scanning and byte derivation for in-memory binary images.
//!
//! This crate provides:
//! - A signature language compiler (exact bytes, wildcards, cursor
//!   markers, alternation groups)
//! - An image scanner with first-match and find-all modes
//! - A byte-synthesis mask language and the derivation engine that
//!   executes it at a match address
//! - Named signature catalogs (JSON)
//! - Patch records and their application through an image writer

pub mod catalog;
pub mod engine;
pub mod error;
pub mod image;
pub mod mask;
pub mod patch;
pub mod sig;

pub use catalog::{CatalogEntry, CatalogHit, SignatureCatalog, load_catalog, save_catalog};
pub use engine::ScanEngine;
pub use error::{Error, Result};
pub use image::{ImageProvider, ImageView, StaticImages};
pub use mask::{
    CompiledMask, DerivationOutcome, PatternResolver, SynthesisInstruction, compile_mask, derive,
};
pub use patch::{
    ApplyReport, BufferWriter, ImageWriter, PatchConfig, PatchRecord, apply_patches, load_patches,
};
pub use sig::{
    CompiledSignature, MatchInstruction, MatchKind, compile_signature, scan, scan_all, scan_first,
};

#[cfg(windows)]
pub use image::{LoadedModules, ModuleWriter};
