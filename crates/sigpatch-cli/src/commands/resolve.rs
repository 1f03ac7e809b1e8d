//! Resolve command implementation.
//!
//! Runs every entry of a signature catalog against the image, printing
//! hits and misses.

use std::path::Path;

use anyhow::Result;
use sigpatch_core::{ImageView, ScanEngine, load_catalog};

pub fn run(image: &Path, catalog: &Path, base: u64) -> Result<()> {
    let bytes = super::read_image(image)?;
    let engine = ScanEngine::new(ImageView::new(base, &bytes));
    let catalog = load_catalog(catalog)?;

    let hits = engine.resolve_catalog(&catalog)?;
    let found = hits.iter().filter(|h| !h.addresses.is_empty()).count();

    for hit in &hits {
        if hit.addresses.is_empty() {
            println!("  {:<24} not found", hit.name);
            continue;
        }
        let rendered: Vec<String> = hit
            .addresses
            .iter()
            .map(|a| format!("{:#010X}", base + a))
            .collect();
        println!("  {:<24} {}", hit.name, rendered.join(", "));

        for outcome in &hit.outcomes {
            let pairs: Vec<String> = outcome
                .synthesized_bytes
                .iter()
                .map(|b| format!("{b:02X}"))
                .collect();
            println!(
                "  {:<24} {:#010X} -> {}",
                "",
                base + outcome.address,
                pairs.join(" ")
            );
        }
    }

    println!();
    println!("{found} of {} signature(s) found", hits.len());
    Ok(())
}
