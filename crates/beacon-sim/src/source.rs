//! Relay element-set providers and start-up preparation

use chrono::{DateTime, Utc};
use orbital_mechanics::{ElementSet, Sgp4Orbit};
use std::collections::HashSet;
use std::future::Future;

use crate::diagnostics::{Diagnostic, DiagnosticSink};

/// Supplies relay element sets once per run.
///
/// Implementations apply their own fallback policy; an empty result is
/// treated as fatal by the engine.
pub trait RelaySource {
    fn fetch_relay_element_sets(
        &self,
        epoch: DateTime<Utc>,
    ) -> impl Future<Output = Vec<ElementSet>> + Send;
}

/// A fixed list of element sets
impl RelaySource for Vec<ElementSet> {
    async fn fetch_relay_element_sets(&self, _epoch: DateTime<Utc>) -> Vec<ElementSet> {
        self.clone()
    }
}

/// Stable, unique identifier for every set: the trimmed name, the catalog
/// number when the name is blank, and the catalog number appended when the
/// name was already taken.
pub fn relay_identifiers(sets: &[ElementSet]) -> Vec<String> {
    let mut taken = HashSet::with_capacity(sets.len());

    sets.iter()
        .map(|set| {
            let name = set.name.trim();
            let base = if name.is_empty() {
                set.catalog_number.to_string()
            } else {
                name.to_string()
            };

            let mut id = base.clone();
            let mut suffix = 1;
            while taken.contains(&id) {
                id = if suffix == 1 {
                    format!("{} ({})", base, set.catalog_number)
                } else {
                    format!("{} ({}-{})", base, set.catalog_number, suffix)
                };
                suffix += 1;
            }
            taken.insert(id.clone());
            id
        })
        .collect()
}

/// Initialize a propagator per relay, reporting and dropping the ones the
/// propagator refuses.
pub fn prepare_relays(sets: &[ElementSet], sink: &mut dyn DiagnosticSink) -> Vec<Sgp4Orbit> {
    relay_identifiers(sets)
        .into_iter()
        .zip(sets)
        .filter_map(|(id, set)| match Sgp4Orbit::with_id(id.clone(), set) {
            Ok(orbit) => Some(orbit),
            Err(e) => {
                sink.record(Diagnostic::RelayRejected {
                    relay_id: id,
                    reason: e.to_string(),
                });
                None
            }
        })
        .collect()
}
