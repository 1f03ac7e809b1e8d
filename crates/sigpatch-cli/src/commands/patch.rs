//! Patch command implementation.
//!
//! Loads two-line patch files from a directory, applies them to the
//! image file and writes the result.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use sigpatch_core::{
    BufferWriter, ImageView, PatchConfig, ScanEngine, apply_patches, load_patches,
};

pub fn run(image: &Path, patches: &Path, output: &Path) -> Result<()> {
    let bytes = super::read_image(image)?;
    let records = load_patches(&PatchConfig {
        dir: patches.to_path_buf(),
    })?;
    if records.is_empty() {
        println!("No patch files in {}", patches.display());
        return Ok(());
    }

    let engine = ScanEngine::new(ImageView::new(0, &bytes));
    let mut writer = BufferWriter::new(bytes.clone());
    let report = apply_patches(&engine, &records, &mut writer)?;

    fs::write(output, writer.into_bytes())
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "{} patch(es) applied, {} missed -> {}",
        report.applied,
        report.missed,
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_patch_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("image.bin");
        let out = dir.path().join("patched.bin");
        let patches = dir.path().join("patches");
        fs::create_dir(&patches).unwrap();

        fs::write(&image, [0x75u8, 0x08, 0x90, 0x90]).unwrap();
        let mut f = fs::File::create(patches.join("jnz.txt")).unwrap();
        f.write_all(b"75 08\nEB 08\n").unwrap();

        run(&image, &patches, &out).unwrap();
        assert_eq!(fs::read(&out).unwrap(), vec![0xEB, 0x08, 0x90, 0x90]);
    }
}
