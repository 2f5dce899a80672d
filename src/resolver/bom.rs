// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! BOM type detection and format parsing (JSON, YAML, Markdown table).

use serde::Deserialize;
use std::collections::HashMap;

use crate::errors::ResolveError;
use crate::model::{Component, Requirement};
use crate::traits::ContentType;

/// How a manifest carries its bill of materials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BomKind {
    /// A non-empty `bom` field points at an external file, resolved
    /// relative to the manifest's origin.
    External { path: String },
    /// Inline `parts` / `sub_parts`.
    Embedded,
    /// Nothing to explode; the manifest is its own single component.
    Empty,
}

/// Detection order: a non-empty external reference wins over inline
/// parts; with neither the BOM is empty.
pub fn detect_bom_kind(manifest: &Requirement) -> BomKind {
    if let Some(bom) = &manifest.bom {
        if !bom.is_empty() {
            return BomKind::External { path: bom.path().to_string() };
        }
    }
    if !manifest.parts.is_empty() || !manifest.sub_parts.is_empty() {
        return BomKind::Embedded;
    }
    BomKind::Empty
}

/// A resolved bill of materials: the manifest as a root component with its
/// children attached, plus where the children came from.
#[derive(Debug, Clone, PartialEq)]
pub struct BillOfMaterials {
    pub manifest_id: String,
    pub root: Component,
    pub kind: BomKind,
}

/// Wire shapes a BOM document may take: a bare component array, or an
/// object wrapping one under `components` or `parts`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BomDocument {
    Bare(Vec<Component>),
    Wrapped {
        #[serde(default, alias = "parts")]
        components: Vec<Component>,
    },
}

impl BomDocument {
    fn into_components(self) -> Vec<Component> {
        match self {
            BomDocument::Bare(components) => components,
            BomDocument::Wrapped { components } => components,
        }
    }
}

/// Parse BOM bytes in any supported format. Sibling order is preserved;
/// it is not semantically significant for matching.
pub fn parse_components(
    bytes: &[u8],
    content_type: ContentType,
    source_path: &str,
) -> Result<Vec<Component>, ResolveError> {
    match content_type {
        ContentType::Json => parse_json(bytes, source_path),
        ContentType::Yaml => parse_yaml(bytes, source_path),
        ContentType::Markdown => parse_markdown_table(bytes, source_path),
        ContentType::Unknown => parse_json(bytes, source_path)
            .or_else(|_| parse_yaml(bytes, source_path))
            .or_else(|_| parse_markdown_table(bytes, source_path)),
    }
}

fn parse_json(bytes: &[u8], source_path: &str) -> Result<Vec<Component>, ResolveError> {
    serde_json::from_slice::<BomDocument>(bytes)
        .map(BomDocument::into_components)
        .map_err(|e| ResolveError::BomParse {
            source_path: source_path.to_string(),
            reason: e.to_string(),
        })
}

fn parse_yaml(bytes: &[u8], source_path: &str) -> Result<Vec<Component>, ResolveError> {
    serde_yaml::from_slice::<BomDocument>(bytes)
        .map(BomDocument::into_components)
        .map_err(|e| ResolveError::BomParse {
            source_path: source_path.to_string(),
            reason: e.to_string(),
        })
}

/// Parse a Markdown pipe table into components. The header row names the
/// columns; recognised names are `id`, `name`, `quantity`, `unit`,
/// `processes`, `materials`, `reference`. List cells split on `;`.
fn parse_markdown_table(
    bytes: &[u8],
    source_path: &str,
) -> Result<Vec<Component>, ResolveError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ResolveError::BomParse {
        source_path: source_path.to_string(),
        reason: format!("not valid UTF-8: {e}"),
    })?;

    let mut rows = text
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with('|'))
        .map(split_table_row);

    let header: Vec<String> = rows
        .next()
        .ok_or_else(|| ResolveError::BomParse {
            source_path: source_path.to_string(),
            reason: "no table rows found".to_string(),
        })?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();

    let mut components = Vec::new();
    for cells in rows {
        // Separator rows are all dashes.
        if cells.iter().all(|c| c.chars().all(|ch| ch == '-' || ch == ':')) {
            continue;
        }
        let cell = |name: &str| -> Option<&str> {
            header
                .iter()
                .position(|h| h == name)
                .and_then(|i| cells.get(i))
                .map(String::as_str)
                .filter(|v| !v.is_empty())
        };

        let id = cell("id").map(str::to_string).ok_or_else(|| ResolveError::BomParse {
            source_path: source_path.to_string(),
            reason: "table row missing 'id' cell".to_string(),
        })?;
        components.push(Component {
            name: cell("name").unwrap_or(&id).to_string(),
            quantity: cell("quantity").and_then(|q| q.parse().ok()).unwrap_or(1.0),
            unit: cell("unit").unwrap_or("piece").to_string(),
            processes: cell("processes").map(split_list).unwrap_or_default(),
            materials: cell("materials").map(split_list).unwrap_or_default(),
            constraints: HashMap::new(),
            reference: cell("reference").map(str::to_string),
            sub_components: Vec::new(),
            id,
        });
    }

    if components.is_empty() {
        return Err(ResolveError::BomParse {
            source_path: source_path.to_string(),
            reason: "table contained no component rows".to_string(),
        });
    }
    Ok(components)
}

fn split_table_row(line: &str) -> Vec<String> {
    line.trim_matches('|').split('|').map(|c| c.trim().to_string()).collect()
}

fn split_list(cell: &str) -> std::collections::BTreeSet<String> {
    cell.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
