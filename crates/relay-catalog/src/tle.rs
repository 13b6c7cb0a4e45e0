//! TLE text parsing
//!
//! Accepts both the 2-line form and the 3-line form with a title line
//! (optionally prefixed `0 `, as some catalogs emit).

use orbital_mechanics::ElementSet;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::{CatalogError, Result};

#[derive(Debug, Default)]
pub struct ParsedCatalog {
    pub element_sets: Vec<ElementSet>,
    /// Records or stray lines that could not be used
    pub skipped: usize,
}

fn is_element_line(line: &str, number: u8) -> bool {
    let bytes = line.as_bytes();
    bytes.len() >= 2 && bytes[0] == b'0' + number && bytes[1] == b' '
}

pub fn parse_tle_text(text: &str) -> ParsedCatalog {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect();

    let mut parsed = ParsedCatalog::default();
    let mut title: Option<&str> = None;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if is_element_line(line, 1) && lines.get(i + 1).is_some_and(|next| is_element_line(next, 2)) {
            match ElementSet::from_tle(title.take(), line, lines[i + 1]) {
                Ok(set) => parsed.element_sets.push(set),
                Err(e) => {
                    warn!("Skipping TLE record: {}", e);
                    parsed.skipped += 1;
                }
            }
            i += 2;
        } else if is_element_line(line, 1) || is_element_line(line, 2) {
            warn!("Skipping unpaired TLE line: {}", line);
            parsed.skipped += 1;
            title = None;
            i += 1;
        } else {
            let name = line.strip_prefix("0 ").unwrap_or(line).trim();
            title = Some(name);
            i += 1;
        }
    }

    parsed
}

/// Load every usable element set from a local TLE file
pub fn load_tle_file(path: impl AsRef<Path>) -> Result<Vec<ElementSet>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let parsed = parse_tle_text(&text);

    if parsed.element_sets.is_empty() {
        return Err(CatalogError::Parse(format!(
            "no usable element sets in {:?}",
            path
        )));
    }

    info!(
        "Loaded {} element sets from {:?} ({} skipped)",
        parsed.element_sets.len(),
        path,
        parsed.skipped
    );
    Ok(parsed.element_sets)
}
