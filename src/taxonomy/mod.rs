// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Process taxonomy: canonical process identifiers, aliases, and hierarchy.
//!
//! Raw process strings from manifests and facilities are normalised into
//! canonical URIs (`urn:process:machining`). Aliasing is a many-to-one total
//! function: every raw string lands on exactly one canonical id or on
//! nothing. Unknown strings are preserved verbatim for diagnostics but never
//! satisfy a requirement.
//!
//! The alias table is process-wide shared state. Reload is atomic via
//! [`arc_swap::ArcSwap`]: a reader holds one snapshot for the duration of a
//! match run and either sees the old table or the new one in full, never a
//! partial mix.

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Canonical, opaque identifier for a manufacturing process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(String);

impl ProcessId {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the taxonomy table, as loaded from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    /// Canonical URI, e.g. `urn:process:machining`.
    pub uri: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Parent URI for hierarchy, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

/// An immutable view of the taxonomy at one point in time.
#[derive(Debug, Default)]
pub struct TaxonomySnapshot {
    alias_to_id: HashMap<String, ProcessId>,
    parent: HashMap<ProcessId, ProcessId>,
    known: BTreeSet<ProcessId>,
}

impl TaxonomySnapshot {
    fn from_entries(entries: &[TaxonomyEntry]) -> Self {
        let mut snapshot = TaxonomySnapshot::default();
        for entry in entries {
            let id = ProcessId::new(entry.uri.clone());
            snapshot.alias_to_id.insert(normalise_key(&entry.uri), id.clone());
            for alias in &entry.aliases {
                snapshot.alias_to_id.insert(normalise_key(alias), id.clone());
            }
            if let Some(parent) = &entry.parent {
                snapshot.parent.insert(id.clone(), ProcessId::new(parent.clone()));
            }
            snapshot.known.insert(id);
        }
        snapshot
    }

    /// Map a raw string to its canonical id, or `None` for unknown strings.
    pub fn normalise(&self, raw: &str) -> Option<ProcessId> {
        self.alias_to_id.get(&normalise_key(raw)).cloned()
    }

    /// True iff the offered process satisfies the required one: equal, or
    /// the offer is a transitive descendant of the requirement. A facility
    /// offering a more specific process satisfies a more general one.
    pub fn matches(&self, required: &ProcessId, offered: &ProcessId) -> bool {
        if !self.known.contains(required) {
            return false;
        }
        if required == offered {
            return true;
        }
        let mut current = self.parent.get(offered);
        while let Some(ancestor) = current {
            if ancestor == required {
                return true;
            }
            current = self.parent.get(ancestor);
        }
        false
    }

    pub fn parent_of(&self, id: &ProcessId) -> Option<&ProcessId> {
        self.parent.get(id)
    }

    pub fn is_known(&self, id: &ProcessId) -> bool {
        self.known.contains(id)
    }

    /// Normalise a whole set of raw names, splitting out the strings the
    /// table does not know. Unknowns surface as validation warnings.
    pub fn normalise_set<'a, I>(&self, raw: I) -> (BTreeSet<ProcessId>, Vec<String>)
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut ids = BTreeSet::new();
        let mut unknown = Vec::new();
        for name in raw {
            match self.normalise(name) {
                Some(id) => {
                    ids.insert(id);
                }
                None => unknown.push(name.clone()),
            }
        }
        (ids, unknown)
    }
}

/// Case-insensitive, whitespace-normalised alias key.
fn normalise_key(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// The shared taxonomy handle. Cheap to clone; all clones observe reloads.
pub struct ProcessTaxonomy {
    snapshot: ArcSwap<TaxonomySnapshot>,
}

impl ProcessTaxonomy {
    pub fn new(entries: &[TaxonomyEntry]) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(TaxonomySnapshot::from_entries(entries)),
        }
    }

    /// Built-in table covering the common open-hardware process vocabulary.
    pub fn with_defaults() -> Self {
        Self::new(&default_entries())
    }

    /// Current table. Hold the returned snapshot for the duration of a
    /// match run so all decisions in the run see one table.
    pub fn snapshot(&self) -> Arc<TaxonomySnapshot> {
        self.snapshot.load_full()
    }

    /// Replace the table in full. In-flight readers keep their snapshot.
    pub fn reload(&self, entries: &[TaxonomyEntry]) {
        self.snapshot.store(Arc::new(TaxonomySnapshot::from_entries(entries)));
    }
}

impl Default for ProcessTaxonomy {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn entry(uri: &str, aliases: &[&str], parent: Option<&str>) -> TaxonomyEntry {
    TaxonomyEntry {
        uri: uri.to_string(),
        aliases: aliases.iter().map(|s| s.to_string()).collect(),
        parent: parent.map(str::to_string),
    }
}

/// Default process vocabulary. Domain configurations may replace this
/// wholesale through [`ProcessTaxonomy::reload`].
pub fn default_entries() -> Vec<TaxonomyEntry> {
    vec![
        entry("urn:process:machining", &["machining", "cnc", "cnc machining"], None),
        entry("urn:process:milling", &["milling", "cnc milling", "mill"], Some("urn:process:machining")),
        entry("urn:process:turning", &["turning", "lathe", "cnc turning"], Some("urn:process:machining")),
        entry("urn:process:drilling", &["drilling"], Some("urn:process:machining")),
        entry("urn:process:grinding", &["grinding", "surface grinding"], Some("urn:process:machining")),
        entry("urn:process:additive", &["3d printing", "3dp", "additive manufacturing"], None),
        entry("urn:process:fdm", &["fdm", "fff", "fused deposition modeling", "fused filament fabrication"], Some("urn:process:additive")),
        entry("urn:process:sla", &["sla", "stereolithography", "resin printing"], Some("urn:process:additive")),
        entry("urn:process:sls", &["sls", "selective laser sintering"], Some("urn:process:additive")),
        entry("urn:process:laser-cutting", &["laser cutting", "laser cut", "laser"], None),
        entry("urn:process:welding", &["welding"], None),
        entry("urn:process:tig-welding", &["tig", "tig welding", "gtaw"], Some("urn:process:welding")),
        entry("urn:process:mig-welding", &["mig", "mig welding", "gmaw"], Some("urn:process:welding")),
        entry("urn:process:casting", &["casting", "metal casting"], None),
        entry("urn:process:injection-molding", &["injection molding", "injection moulding"], None),
        entry("urn:process:sheet-metal", &["sheet metal", "sheet metal fabrication", "bending"], None),
        entry("urn:process:pcb-assembly", &["pcb assembly", "smt", "smt assembly", "electronics assembly"], None),
        entry("urn:process:assembly", &["assembly", "manual assembly", "final assembly"], None),
        entry("urn:process:finishing", &["finishing", "surface finishing"], None),
        entry("urn:process:anodizing", &["anodizing", "anodising"], Some("urn:process:finishing")),
        entry("urn:process:powder-coating", &["powder coating", "powder coat"], Some("urn:process:finishing")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_are_case_and_whitespace_insensitive() {
        let taxonomy = ProcessTaxonomy::with_defaults();
        let snapshot = taxonomy.snapshot();
        let a = snapshot.normalise("CNC   Machining").unwrap();
        let b = snapshot.normalise("machining").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "urn:process:machining");
    }

    #[test]
    fn canonical_uri_normalises_to_itself() {
        let snapshot = ProcessTaxonomy::with_defaults().snapshot();
        let id = snapshot.normalise("urn:process:fdm").unwrap();
        assert_eq!(id.as_str(), "urn:process:fdm");
    }

    #[test]
    fn unknown_strings_never_normalise() {
        let snapshot = ProcessTaxonomy::with_defaults().snapshot();
        assert!(snapshot.normalise("underwater basket weaving").is_none());
    }

    #[test]
    fn descendant_offer_satisfies_general_requirement() {
        let snapshot = ProcessTaxonomy::with_defaults().snapshot();
        let machining = snapshot.normalise("machining").unwrap();
        let milling = snapshot.normalise("milling").unwrap();
        assert!(snapshot.matches(&machining, &milling));
        // Specific requirement is not satisfied by a general offer.
        assert!(!snapshot.matches(&milling, &machining));
    }

    #[test]
    fn unknown_requirement_never_matches() {
        let snapshot = ProcessTaxonomy::with_defaults().snapshot();
        let offered = snapshot.normalise("milling").unwrap();
        let unknown = ProcessId::new("urn:process:not-in-table");
        assert!(!snapshot.matches(&unknown, &offered));
    }

    #[test]
    fn reload_is_atomic_for_held_snapshots() {
        let taxonomy = ProcessTaxonomy::with_defaults();
        let before = taxonomy.snapshot();
        taxonomy.reload(&[entry("urn:process:knitting", &["knitting"], None)]);
        let after = taxonomy.snapshot();

        // The held snapshot still answers from the old table.
        assert!(before.normalise("milling").is_some());
        assert!(before.normalise("knitting").is_none());
        // The new snapshot only knows the new table.
        assert!(after.normalise("milling").is_none());
        assert!(after.normalise("knitting").is_some());
    }

    #[test]
    fn normalise_set_splits_unknowns() {
        let snapshot = ProcessTaxonomy::with_defaults().snapshot();
        let raw: Vec<String> = vec!["milling".into(), "transmutation".into()];
        let (ids, unknown) = snapshot.normalise_set(raw.iter());
        assert_eq!(ids.len(), 1);
        assert_eq!(unknown, vec!["transmutation".to_string()]);
    }
}
