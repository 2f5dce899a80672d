// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The heuristic layer: rule-based fallbacks the exact layer cannot make.
//!
//! Four rules, all deterministic and CPU-bound: a facility offering a
//! parent process covers a more specific requirement (weaker than the
//! exact direction), whitelisted material substitution, fuzzy text match
//! on equipment names, and certification subset. Confidence sits in the
//! 0.6–0.9 band.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Component, Facility};
use crate::traits::{LayerMatcher, LayerResult, MatchContext, MatchLayer};

/// Minimum Jaro-Winkler similarity before an equipment name counts as a
/// fuzzy hit.
const FUZZY_FLOOR: f64 = 0.85;

pub struct HeuristicMatcher {
    confidence_threshold: f64,
    confidence_ceiling: f64,
    /// Material to the substitutes accepted in its place.
    substitutions: BTreeMap<String, BTreeSet<String>>,
}

impl HeuristicMatcher {
    pub fn new() -> Self {
        Self {
            confidence_threshold: 0.6,
            confidence_ceiling: 0.9,
            substitutions: default_substitutions(),
        }
    }

    pub fn with_substitutions(
        mut self,
        substitutions: BTreeMap<String, BTreeSet<String>>,
    ) -> Self {
        self.substitutions = substitutions;
        self
    }
}

impl Default for HeuristicMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Built-in substitution whitelist for common open-hardware materials.
/// Domain configurations replace this through the engine config.
fn default_substitutions() -> BTreeMap<String, BTreeSet<String>> {
    let pairs: &[(&str, &[&str])] = &[
        ("pla", &["petg", "abs"]),
        ("abs", &["petg", "asa"]),
        ("petg", &["pla", "abs"]),
        ("aluminum", &["aluminium", "6061", "7075"]),
        ("aluminium", &["aluminum", "6061", "7075"]),
        ("steel", &["stainless steel", "mild steel"]),
        ("plywood", &["mdf", "birch plywood"]),
        ("acrylic", &["polycarbonate", "pmma"]),
    ];
    pairs
        .iter()
        .map(|(material, subs)| {
            (
                material.to_string(),
                subs.iter().map(|s| s.to_string()).collect(),
            )
        })
        .collect()
}

#[async_trait]
impl LayerMatcher for HeuristicMatcher {
    fn layer(&self) -> MatchLayer {
        MatchLayer::Heuristic
    }

    fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    fn confidence_ceiling(&self) -> f64 {
        self.confidence_ceiling
    }

    async fn process(
        &self,
        component: &Component,
        facility: &Facility,
        ctx: &MatchContext,
    ) -> LayerResult {
        if ctx.is_cancelled() {
            return LayerResult::cancelled(self.layer());
        }

        let mut result = LayerResult::new(self.layer());
        let taxonomy = &ctx.taxonomy;

        // Hierarchy fallback: the facility offers an ancestor of the
        // requirement. Weaker than exact's descendant direction, since a
        // general capability may or may not cover the specific need.
        let (required, _) = taxonomy.normalise_set(component.processes.iter());
        if !required.is_empty() {
            let offered: Vec<_> = facility
                .advertised_processes()
                .into_iter()
                .filter_map(|raw| taxonomy.normalise(raw))
                .collect();
            let covered = required
                .iter()
                .filter(|req| {
                    offered.iter().any(|off| taxonomy.matches(off, req))
                })
                .count();
            if covered == required.len() {
                result.push_field(
                    "process",
                    serde_json::json!({ "rule": "parent_offers_child" }),
                    0.7,
                    "hierarchy_fallback",
                    "facility.processes",
                );
            }
        }

        // Material substitution whitelist.
        if !component.materials.is_empty() {
            let offered: BTreeSet<String> =
                facility.materials.iter().map(|m| m.trim().to_lowercase()).collect();
            let mut substituted = Vec::new();
            let covered = component
                .materials
                .iter()
                .filter(|material| {
                    let key = material.trim().to_lowercase();
                    if offered.contains(&key) {
                        return true;
                    }
                    if let Some(subs) = self.substitutions.get(&key) {
                        if let Some(hit) = subs.iter().find(|s| offered.contains(*s)) {
                            substituted.push(format!("{key} -> {hit}"));
                            return true;
                        }
                    }
                    false
                })
                .count();
            if covered == component.materials.len() && !substituted.is_empty() {
                result.push_field(
                    "materials",
                    serde_json::json!({ "substitutions": substituted }),
                    0.75,
                    "substitution_whitelist",
                    "facility.materials",
                );
            }
        }

        // Fuzzy equipment match against required process names.
        let mut best: Option<(f64, String, String)> = None;
        for process in &component.processes {
            for equipment in &facility.equipment {
                let candidates = [
                    equipment.name.as_str(),
                    equipment.process.as_str(),
                ];
                for candidate in candidates {
                    let similarity = strsim::jaro_winkler(
                        &process.to_lowercase(),
                        &candidate.to_lowercase(),
                    );
                    if similarity >= FUZZY_FLOOR
                        && best.as_ref().map_or(true, |(s, _, _)| similarity > *s)
                    {
                        best = Some((
                            similarity,
                            process.clone(),
                            equipment.name.clone(),
                        ));
                    }
                }
            }
        }
        if let Some((similarity, process, equipment)) = best {
            result.push_field(
                "equipment",
                serde_json::json!({ "process": process, "equipment": equipment }),
                similarity * self.confidence_ceiling,
                "jaro_winkler",
                "facility.equipment",
            );
        }

        // Certification subset.
        if let Some(required_certs) = component
            .constraints
            .get("certifications")
            .and_then(|v| serde_json::from_value::<BTreeSet<String>>(v.clone()).ok())
        {
            if !required_certs.is_empty()
                && required_certs.is_subset(&facility.certifications)
            {
                result.push_field(
                    "certifications",
                    serde_json::json!(required_certs),
                    0.8,
                    "certification_subset",
                    "facility.certifications",
                );
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::ProcessTaxonomy;

    fn component(yaml: &str) -> Component {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn facility(yaml: &str) -> Facility {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn ctx() -> MatchContext {
        MatchContext::new(ProcessTaxonomy::with_defaults().snapshot())
    }

    #[tokio::test]
    async fn parent_offer_covers_specific_requirement() {
        let c = component("id: c1\nname: shaft\nprocesses: [turning]");
        let f = facility("id: f1\nname: shop\nprocesses: [machining]");
        let result = HeuristicMatcher::new().process(&c, &f, &ctx()).await;
        assert_eq!(result.fields["process"].confidence, 0.7);
    }

    #[tokio::test]
    async fn whitelisted_substitute_covers_material() {
        let c = component("id: c1\nname: case\nmaterials: [PLA]");
        let f = facility("id: f1\nname: lab\nmaterials: [petg]");
        let result = HeuristicMatcher::new().process(&c, &f, &ctx()).await;
        assert_eq!(result.fields["materials"].confidence, 0.75);
    }

    #[tokio::test]
    async fn unlisted_material_is_not_substituted() {
        let c = component("id: c1\nname: case\nmaterials: [titanium]");
        let f = facility("id: f1\nname: lab\nmaterials: [petg]");
        let result = HeuristicMatcher::new().process(&c, &f, &ctx()).await;
        assert!(!result.fields.contains_key("materials"));
    }

    #[tokio::test]
    async fn near_identical_equipment_name_fuzzy_matches() {
        let c = component("id: c1\nname: panel\nprocesses: [laser cutting]");
        let mut f = facility("id: f1\nname: shop");
        f.equipment.push(crate::model::Equipment {
            name: "Laser Cutter".into(),
            process: "unknown-process".into(),
            description: None,
        });
        let result = HeuristicMatcher::new().process(&c, &f, &ctx()).await;
        let field = &result.fields["equipment"];
        assert!(field.confidence >= 0.6);
        assert!(field.confidence <= 0.9);
    }

    #[tokio::test]
    async fn certification_subset_scores() {
        let c = component(
            "id: c1\nname: bracket\nconstraints:\n  certifications: [iso9001]",
        );
        let f = facility("id: f1\nname: shop\ncertifications: [iso9001, as9100]");
        let result = HeuristicMatcher::new().process(&c, &f, &ctx()).await;
        assert_eq!(result.fields["certifications"].confidence, 0.8);
    }

    #[tokio::test]
    async fn missing_certification_contributes_nothing() {
        let c = component(
            "id: c1\nname: bracket\nconstraints:\n  certifications: [as9100]",
        );
        let f = facility("id: f1\nname: shop\ncertifications: [iso9001]");
        let result = HeuristicMatcher::new().process(&c, &f, &ctx()).await;
        assert!(!result.fields.contains_key("certifications"));
    }
}
