//! High-level facade tying signatures, scanning and derivation together.

use tracing::debug;

use crate::catalog::{CatalogHit, SignatureCatalog};
use crate::error::Result;
use crate::image::{ImageProvider, ImageView};
use crate::mask::{self, CompiledMask, DerivationOutcome, PatternResolver, compile_mask};
use crate::sig::{compile_signature, scan, scan_all, scan_first};

/// Compiles and runs signatures against a single image view.
///
/// The engine borrows the view, so it is cheap to construct one per
/// module being inspected.
pub struct ScanEngine<'a> {
    image: ImageView<'a>,
}

impl<'a> ScanEngine<'a> {
    pub fn new(image: ImageView<'a>) -> Self {
        Self { image }
    }

    /// Resolve a module through a provider and wrap it in an engine.
    /// `None` if the provider does not know the module.
    pub fn for_module<P>(provider: &'a P, module: Option<&str>) -> Option<Self>
    where
        P: ImageProvider + ?Sized,
    {
        provider.resolve(module).map(Self::new)
    }

    pub fn image(&self) -> &ImageView<'a> {
        &self.image
    }

    /// Compile the signature and return its first match address, if any.
    pub fn find_first(&self, signature: &str) -> Result<Option<u64>> {
        let compiled = compile_signature(signature)?;
        Ok(scan_first(&compiled, &self.image))
    }

    /// Compile the signature and return every match address.
    pub fn find_all(&self, signature: &str) -> Result<Vec<u64>> {
        let compiled = compile_signature(signature)?;
        Ok(scan_all(&compiled, &self.image))
    }

    /// Compile the signature and honor its own mode: a leading `*`
    /// collects every match, otherwise scanning stops at the first.
    pub fn matches(&self, signature: &str) -> Result<Vec<u64>> {
        let compiled = compile_signature(signature)?;
        let found = scan(&compiled, &self.image);
        debug!(matches = found.len(), "signature scan finished");
        Ok(found)
    }

    /// Compile both languages, scan, and run the mask at every match.
    ///
    /// Multiplicity follows the signature's own mode: a leading `*`
    /// derives at every occurrence, otherwise only at the first. An
    /// empty result means the signature matched nothing.
    pub fn derive(&self, signature: &str, mask: &str) -> Result<Vec<DerivationOutcome>> {
        let compiled = compile_mask(mask)?;
        let addresses = self.matches(signature)?;
        addresses
            .into_iter()
            .map(|address| self.derive_at(&compiled, address))
            .collect()
    }

    /// Run a compiled mask at the given match address.
    ///
    /// Embedded `@N(...)` signatures are resolved by scanning this same
    /// image, first match wins.
    pub fn derive_at(&self, mask: &CompiledMask, address: u64) -> Result<DerivationOutcome> {
        let resolver = EngineResolver { image: &self.image };
        mask::derive(mask, address, &self.image, &resolver)
    }

    /// Scan every catalog entry, recording hits and misses. Entries
    /// that carry a mask are also derived at each of their matches.
    pub fn resolve_catalog(&self, catalog: &SignatureCatalog) -> Result<Vec<CatalogHit>> {
        let mut hits = Vec::with_capacity(catalog.entries.len());
        for entry in &catalog.entries {
            let addresses = self.matches(&entry.signature)?;
            if addresses.is_empty() {
                debug!(name = %entry.name, "catalog entry not found");
            }
            let outcomes = match &entry.mask {
                Some(mask) => {
                    let compiled = compile_mask(mask)?;
                    addresses
                        .iter()
                        .map(|address| self.derive_at(&compiled, *address))
                        .collect::<Result<Vec<_>>>()?
                }
                None => Vec::new(),
            };
            hits.push(CatalogHit {
                name: entry.name.clone(),
                addresses,
                outcomes,
            });
        }
        Ok(hits)
    }
}

/// Resolves embedded signatures by scanning the engine's own image.
struct EngineResolver<'a, 'b> {
    image: &'b ImageView<'a>,
}

impl PatternResolver for EngineResolver<'_, '_> {
    fn resolve(&self, signature: &str) -> Result<Option<u64>> {
        let compiled = compile_signature(signature)?;
        Ok(scan_first(&compiled, self.image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;
    use crate::mask::compile_mask;

    fn engine(bytes: &[u8]) -> ScanEngine<'_> {
        ScanEngine::new(ImageView::new(0, bytes).with_ptr_size(4))
    }

    #[test]
    fn test_find_first_and_all() {
        let image = [0xCC, 0x90, 0xCC, 0x90];
        let engine = engine(&image);
        assert_eq!(engine.find_first("CC 90").unwrap(), Some(0));
        assert_eq!(engine.find_all("CC 90").unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_matches_honors_signature_mode() {
        let image = [0xCC, 0x90, 0xCC, 0x90];
        let engine = engine(&image);
        assert_eq!(engine.matches("CC 90").unwrap(), vec![0]);
        assert_eq!(engine.matches("* CC 90").unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_derive_resolves_embedded_against_same_image() {
        // call-site slot at 0..4, target byte 0xCC at offset 8
        let image = [0x00, 0x00, 0x00, 0x00, 0x90, 0x90, 0x90, 0x90, 0xCC];
        let engine = engine(&image);
        let mask = compile_mask("@4(CC)").unwrap();
        let outcome = engine.derive_at(&mask, 0).unwrap();
        // displacement = 8 - (0 + 4) = 4
        assert_eq!(outcome.synthesized_bytes, vec![0x04, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_derive_runs_the_mask_at_every_match() {
        let image = [0x75, 0x08, 0x90, 0x75, 0x0C, 0x90];
        let engine = engine(&image);

        // Find-all mode derives at both occurrences
        let outcomes = engine.derive("* 75 ?", "EB ?").unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].address, 0);
        assert_eq!(outcomes[0].synthesized_bytes, vec![0xEB, 0x08]);
        assert_eq!(outcomes[1].address, 3);
        assert_eq!(outcomes[1].synthesized_bytes, vec![0xEB, 0x0C]);

        // Find-first mode derives only at the first
        let outcomes = engine.derive("75 ?", "EB ?").unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].address, 0);
    }

    #[test]
    fn test_derive_with_no_match_is_empty() {
        let engine = engine(&[0x90; 4]);
        assert!(engine.derive("DE AD", "90 90").unwrap().is_empty());
    }

    #[test]
    fn test_resolve_catalog_keeps_misses() {
        let image = [0xCC, 0x90];
        let engine = engine(&image);
        let catalog = SignatureCatalog {
            entries: vec![
                CatalogEntry {
                    name: "present".into(),
                    signature: "CC 90".into(),
                    mask: None,
                },
                CatalogEntry {
                    name: "absent".into(),
                    signature: "DE AD".into(),
                    mask: None,
                },
            ],
        };
        let hits = engine.resolve_catalog(&catalog).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].addresses, vec![0]);
        assert!(hits[0].outcomes.is_empty());
        assert!(hits[1].addresses.is_empty());
    }

    #[test]
    fn test_resolve_catalog_derives_masked_entries() {
        let image = [0x75, 0x08, 0x90, 0x75, 0x0C, 0x90];
        let engine = engine(&image);
        let catalog = SignatureCatalog {
            entries: vec![CatalogEntry {
                name: "jnz".into(),
                signature: "* 75 ?".into(),
                mask: Some("EB ?".into()),
            }],
        };
        let hits = engine.resolve_catalog(&catalog).unwrap();
        assert_eq!(hits[0].addresses, vec![0, 3]);
        assert_eq!(hits[0].outcomes.len(), 2);
        assert_eq!(hits[0].outcomes[1].synthesized_bytes, vec![0xEB, 0x0C]);
    }

    #[test]
    fn test_for_module_resolves_through_a_provider() {
        let provider = crate::image::StaticImages::new()
            .primary(0, vec![0xCC, 0x90])
            .named("engine.dll", 0x1000, vec![0xDE, 0xAD]);
        let engine = ScanEngine::for_module(&provider, Some("engine.dll")).unwrap();
        assert_eq!(engine.find_first("DE AD").unwrap(), Some(0));
        assert!(ScanEngine::for_module(&provider, Some("missing.dll")).is_none());
    }

    #[test]
    fn test_malformed_signature_surfaces_compile_error() {
        let engine = engine(&[0u8; 4]);
        assert!(engine.find_first("ZZ").is_err());
    }
}
