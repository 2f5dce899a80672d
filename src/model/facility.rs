// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Capability-side types: the OKW facility and its equipment.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// How a facility can be used by outside parties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    Public,
    Membership,
    Commercial,
    Restricted,
    Unknown,
}

impl Default for AccessType {
    fn default() -> Self {
        AccessType::Unknown
    }
}

impl AccessType {
    /// Whether a requirement expressed as an access type is satisfiable by
    /// this facility. `Unknown` on either side never satisfies anything
    /// stricter than itself.
    pub fn satisfies(&self, required: AccessType) -> bool {
        match required {
            AccessType::Unknown => true,
            AccessType::Public => matches!(self, AccessType::Public),
            AccessType::Membership => {
                matches!(self, AccessType::Public | AccessType::Membership)
            }
            AccessType::Commercial => {
                matches!(self, AccessType::Public | AccessType::Commercial)
            }
            AccessType::Restricted => !matches!(self, AccessType::Unknown),
        }
    }
}

/// Operational status of a facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityStatus {
    Active,
    Planned,
    TemporarilyClosed,
    Closed,
}

impl Default for FacilityStatus {
    fn default() -> Self {
        FacilityStatus::Active
    }
}

/// Production batch size range a facility will accept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchRange {
    pub min: f64,
    pub max: f64,
}

impl BatchRange {
    pub fn contains(&self, quantity: f64) -> bool {
        quantity >= self.min && quantity <= self.max
    }
}

/// A single piece of equipment, tied to the process it performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub name: String,
    /// Raw process name; normalised against the taxonomy at match time.
    pub process: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An OKW facility: the capability side of a match run.
///
/// Facilities are consumed, never owned; the engine reads them through the
/// facility provider and does not mutate them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub processes: BTreeSet<String>,
    #[serde(default)]
    pub equipment: Vec<Equipment>,
    #[serde(default)]
    pub materials: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_range: Option<BatchRange>,
    #[serde(default)]
    pub access_type: AccessType,
    #[serde(default)]
    pub status: FacilityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub certifications: BTreeSet<String>,
    /// Free-text capability blurb; the NLP layer embeds this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Facility {
    /// All process names this facility advertises, from both the process
    /// set and its equipment.
    pub fn advertised_processes(&self) -> BTreeSet<&str> {
        self.processes
            .iter()
            .map(String::as_str)
            .chain(self.equipment.iter().map(|e| e.process.as_str()))
            .collect()
    }
}
