//! Scan command implementation.

use std::path::Path;

use anyhow::Result;
use sigpatch_core::{ImageView, ScanEngine};

pub fn run(image: &Path, signature: &str, base: u64) -> Result<()> {
    let bytes = super::read_image(image)?;
    let engine = ScanEngine::new(ImageView::new(base, &bytes));

    let matches = engine.matches(signature)?;
    if matches.is_empty() {
        println!("No matches.");
        return Ok(());
    }

    println!("{} match(es):", matches.len());
    for offset in matches {
        println!("  {:#010X}", base + offset);
    }
    Ok(())
}
