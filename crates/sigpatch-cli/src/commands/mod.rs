//! CLI command implementations.

pub mod derive;
pub mod patch;
pub mod resolve;
pub mod scan;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Read a binary file for use as the scan image.
pub fn read_image(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read image {}", path.display()))
}
