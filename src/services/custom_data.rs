//! Manually-registered protocol entries
//!
//! Some protocols never appear in the upstream list even though they use the
//! tracked oracle. Operators register them in a local YAML file; the entries
//! are merged into the fetched list before aggregation. A slug registered by
//! both sources with conflicting metadata is a configuration error surfaced
//! to the caller, not silently resolved.

use crate::error::{AppError, Result};
use crate::models::RawProtocol;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Load the registry file. An absent file is an empty registry; a present
/// but unparseable file is a configuration error.
pub fn load_custom_protocols(path: &Path) -> Result<Vec<RawProtocol>> {
    if !path.exists() {
        warn!(path = %path.display(), "Custom protocol file not found; skipping");
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    let protocols: Vec<RawProtocol> = serde_yaml::from_str(&raw)?;
    info!(
        path = %path.display(),
        count = protocols.len(),
        "Loaded custom protocols"
    );
    Ok(protocols)
}

/// Merge custom entries into the fetched list, keyed by slug.
///
/// An upstream entry with the same slug wins as long as its name and
/// category agree with the registered one; a disagreement means the
/// operator's registration has drifted from upstream and must be fixed.
pub fn merge_protocols(
    fetched: Vec<RawProtocol>,
    custom: Vec<RawProtocol>,
) -> Result<Vec<RawProtocol>> {
    let mut by_slug: HashMap<String, usize> = fetched
        .iter()
        .enumerate()
        .map(|(i, p)| (p.slug(), i))
        .collect();

    let mut merged = fetched;
    for entry in custom {
        let slug = entry.slug();
        match by_slug.get(&slug) {
            Some(&i) => {
                let existing = &merged[i];
                if existing.name != entry.name || existing.category != entry.category {
                    return Err(AppError::ConfigConflict(format!(
                        "protocol '{}': upstream has name={:?} category={:?}, registry has name={:?} category={:?}",
                        slug, existing.name, existing.category, entry.name, entry.category
                    )));
                }
            }
            None => {
                by_slug.insert(slug, merged.len());
                merged.push(entry);
            }
        }
    }
    Ok(merged)
}
