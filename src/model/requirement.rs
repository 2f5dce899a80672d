// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Requirement-side types: the OKH manifest and its component tree.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Reference to a bill of materials that lives outside the manifest.
///
/// OKH manifests express external BOMs either as a bare path string or as an
/// object carrying an `external_file` field. Both forms resolve relative to
/// the manifest's origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BomRef {
    /// Bare path form: `bom: "bom.yaml"`
    Path(String),
    /// Object form: `bom: { external_file: "parts/bom.json" }`
    External { external_file: String },
}

impl BomRef {
    /// The file path this reference points at, regardless of form.
    pub fn path(&self) -> &str {
        match self {
            BomRef::Path(p) => p,
            BomRef::External { external_file } => external_file,
        }
    }

    /// An empty path string is treated as no reference at all.
    pub fn is_empty(&self) -> bool {
        self.path().trim().is_empty()
    }
}

/// A single component of a bill of materials.
///
/// Components form a tree through `sub_components` and may additionally
/// point at another manifest through `reference`. When both are present the
/// resolver grafts the referenced manifest's tree in place of the inline
/// sub-components and records a warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Stable identifier within the resolved manifest.
    pub id: String,
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default = "default_unit")]
    pub unit: String,
    /// Raw process names; normalised against the taxonomy at match time.
    #[serde(default)]
    pub processes: BTreeSet<String>,
    #[serde(default)]
    pub materials: BTreeSet<String>,
    /// Free-form constraints. Well-known keys (`estimated_cost`,
    /// `estimated_time_hours`) are type-witnessed by the match pipeline;
    /// everything else is carried through untouched.
    #[serde(default)]
    pub constraints: HashMap<String, serde_json::Value>,
    /// Optional link to another manifest by id or path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default)]
    pub sub_components: Vec<Component>,
}

fn default_quantity() -> f64 {
    1.0
}

fn default_unit() -> String {
    "piece".to_string()
}

impl Component {
    /// Minimal constructor used by the resolver when a manifest has no BOM
    /// and becomes its own single root component.
    pub fn from_manifest(manifest: &Requirement) -> Self {
        Self {
            id: manifest.id.clone(),
            name: manifest.title.clone(),
            quantity: 1.0,
            unit: default_unit(),
            processes: manifest.processes.clone(),
            materials: manifest.materials.clone(),
            constraints: HashMap::new(),
            reference: None,
            sub_components: Vec::new(),
        }
    }

    /// True when this component carries any nesting, inline or referenced.
    pub fn has_nesting(&self) -> bool {
        !self.sub_components.is_empty() || self.reference.is_some()
    }
}

/// An OKH manifest: the requirement side of a match run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub license: String,
    /// Raw process names required at the manifest level.
    #[serde(default)]
    pub processes: BTreeSet<String>,
    #[serde(default)]
    pub materials: BTreeSet<String>,
    /// External BOM reference, if any. Detection order: a non-empty `bom`
    /// wins over inline `parts`/`sub_parts`; with neither present the
    /// manifest itself becomes the single root component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bom: Option<BomRef>,
    #[serde(default)]
    pub parts: Vec<Component>,
    #[serde(default)]
    pub sub_parts: Vec<Component>,
    /// Where this manifest was loaded from; external BOM paths resolve
    /// relative to it. Filled by manifest loaders, absent on inline
    /// manifests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Requirement {
    /// True when any component in the manifest nests further, which is what
    /// the coordinator's `auto_detect_depth` option looks for.
    pub fn has_nested_components(&self) -> bool {
        self.parts.iter().chain(self.sub_parts.iter()).any(Component::has_nesting)
    }
}
