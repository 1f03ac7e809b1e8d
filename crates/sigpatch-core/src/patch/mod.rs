//! Patch records and their application to an image.

mod apply;
mod record;

pub use apply::{ApplyReport, BufferWriter, ImageWriter, apply_patches};
pub use record::{PatchConfig, PatchRecord, load_patches};
