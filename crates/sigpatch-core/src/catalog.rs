//! JSON catalogs of named signatures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::mask::DerivationOutcome;

/// A named signature, optionally paired with a derivation mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
}

/// A set of catalog entries loaded from one JSON file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureCatalog {
    pub entries: Vec<CatalogEntry>,
}

/// The scan result for one catalog entry. An empty address list means
/// the signature was not found, which is a reportable outcome rather
/// than an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogHit {
    pub name: String,
    pub addresses: Vec<u64>,
    /// One outcome per address when the entry carries a mask.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outcomes: Vec<DerivationOutcome>,
}

pub fn load_catalog(path: &Path) -> Result<SignatureCatalog> {
    let data = fs::read_to_string(path)?;
    let catalog: SignatureCatalog = serde_json::from_str(&data)?;
    debug!(path = %path.display(), entries = catalog.entries.len(), "loaded catalog");
    Ok(catalog)
}

pub fn save_catalog(path: &Path, catalog: &SignatureCatalog) -> Result<()> {
    let data = serde_json::to_string_pretty(catalog)?;
    fs::write(path, data)?;
    Ok(())
}
