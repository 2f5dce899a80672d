// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Recursive BOM explosion into a flat, depth-tracked component list.
//!
//! The explosion walks the component tree depth-first, following
//! cross-manifest references through the injected loaders, and emits one
//! [`ComponentMatch`] per component. The returned sequence is sorted by
//! depth descending so leaves precede interior nodes: the natural matching
//! order, since an assembly's tree depends on its children's trees.
//!
//! Two bounds protect the walk: `max_depth` (exceeding it fails the
//! resolve rather than silently truncating) and the reference chain (a
//! component reaching itself, directly or transitively, is a
//! [`ResolveError::CircularReference`]).

use std::path::Path;
use std::sync::Arc;

use crate::errors::ResolveError;
use crate::model::{Component, Requirement, SupplyTree};
use crate::resolver::bom::{detect_bom_kind, parse_components, BillOfMaterials, BomKind};
use crate::traits::{BlobLoader, ManifestLoader};

/// Default depth the coordinator lifts `max_depth = 0` to when
/// `auto_detect_depth` finds nesting in the manifest.
pub const DEFAULT_NESTED_DEPTH: usize = 5;

/// What to do when a component's manifest reference cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferencePolicy {
    /// Fail the resolve (default).
    #[default]
    Fail,
    /// Treat the component as a leaf and record a warning.
    LeafWithWarning,
}

/// Resolver output for one component: the component plus the context the
/// match pipeline needs to score it and the assembler needs to place it.
///
/// For every component with `depth > 0`, `parent_component_id` names
/// another component in the same explosion at `depth - 1`.
#[derive(Debug, Clone)]
pub struct ComponentMatch {
    pub component: Component,
    /// 0 is the root manifest.
    pub depth: usize,
    pub parent_component_id: Option<String>,
    /// Component names from the root down to (excluding) this component.
    pub path: Vec<String>,
    /// Manifest id that was followed when `component.reference` was set.
    pub resolved_manifest: Option<String>,
    /// Filled by the match runner.
    pub matched: bool,
    pub trees: Vec<SupplyTree>,
}

/// A finished explosion: leaves-first components plus non-fatal warnings
/// (discarded inline sub-components, references treated as leaves).
#[derive(Debug, Clone, Default)]
pub struct Explosion {
    pub components: Vec<ComponentMatch>,
    pub warnings: Vec<String>,
}

struct Frame {
    component: Component,
    depth: usize,
    parent_component_id: Option<String>,
    path: Vec<String>,
    /// Manifest ids and reference strings active on the walk from the
    /// root to this component.
    ref_chain: Vec<String>,
}

/// Resolves and explodes bills of materials through injected loaders.
pub struct BomResolver {
    blob_loader: Arc<dyn BlobLoader>,
    manifest_loader: Arc<dyn ManifestLoader>,
    reference_policy: ReferencePolicy,
}

impl BomResolver {
    pub fn new(
        blob_loader: Arc<dyn BlobLoader>,
        manifest_loader: Arc<dyn ManifestLoader>,
    ) -> Self {
        Self { blob_loader, manifest_loader, reference_policy: ReferencePolicy::default() }
    }

    pub fn with_reference_policy(mut self, policy: ReferencePolicy) -> Self {
        self.reference_policy = policy;
        self
    }

    /// Resolve a manifest's BOM into a component tree rooted at the
    /// manifest itself.
    pub async fn resolve(
        &self,
        manifest: &Requirement,
    ) -> Result<BillOfMaterials, ResolveError> {
        let kind = detect_bom_kind(manifest);
        let mut root = Component::from_manifest(manifest);

        match &kind {
            BomKind::External { path } => {
                let resolved_path = resolve_relative(manifest.origin.as_deref(), path);
                let (bytes, content_type) = self.blob_loader.read(&resolved_path).await?;
                root.sub_components =
                    parse_components(&bytes, content_type, &resolved_path)?;
            }
            BomKind::Embedded => {
                root.sub_components = manifest
                    .parts
                    .iter()
                    .chain(manifest.sub_parts.iter())
                    .cloned()
                    .collect();
            }
            BomKind::Empty => {}
        }

        Ok(BillOfMaterials { manifest_id: manifest.id.clone(), root, kind })
    }

    /// Explode a resolved BOM to a flat list.
    ///
    /// `max_depth = 0` matches only the root manifest and ignores all
    /// nesting (single-level mode). With `max_depth > 0`, descending past
    /// the bound fails with [`ResolveError::MaxDepthExceeded`]; callers
    /// choose the depth.
    pub async fn explode(
        &self,
        bom: &BillOfMaterials,
        max_depth: usize,
    ) -> Result<Explosion, ResolveError> {
        let mut root = bom.root.clone();
        if max_depth == 0 {
            root.sub_components.clear();
            return Ok(Explosion {
                components: vec![ComponentMatch {
                    component: root,
                    depth: 0,
                    parent_component_id: None,
                    path: Vec::new(),
                    resolved_manifest: None,
                    matched: false,
                    trees: Vec::new(),
                }],
                warnings: Vec::new(),
            });
        }

        let mut out = Vec::new();
        let mut warnings = Vec::new();
        let mut stack = vec![Frame {
            component: root,
            depth: 0,
            parent_component_id: None,
            path: Vec::new(),
            ref_chain: vec![bom.manifest_id.clone()],
        }];

        while let Some(frame) = stack.pop() {
            let Frame { mut component, depth, parent_component_id, path, mut ref_chain } =
                frame;

            let mut resolved_manifest = None;
            if let Some(reference) = component.reference.clone() {
                match self
                    .graft_reference(&mut component, &reference, &mut ref_chain, &mut warnings)
                    .await
                {
                    Ok(manifest_id) => resolved_manifest = manifest_id,
                    // Cycles and depth overruns stay fatal under any policy.
                    Err(err @ ResolveError::CircularReference { .. })
                    | Err(err @ ResolveError::MaxDepthExceeded { .. }) => return Err(err),
                    Err(err) => match self.reference_policy {
                        ReferencePolicy::Fail => return Err(err),
                        ReferencePolicy::LeafWithWarning => {
                            warnings.push(format!(
                                "component '{}' reference '{}' unresolved, treated as leaf: {}",
                                component.id, reference, err
                            ));
                            component.sub_components.clear();
                        }
                    },
                }
            }

            if !component.sub_components.is_empty() {
                if depth + 1 > max_depth {
                    return Err(ResolveError::MaxDepthExceeded {
                        depth: depth + 1,
                        max_depth,
                    });
                }
                let mut child_path = path.clone();
                child_path.push(component.name.clone());
                // Reverse so siblings pop in document order.
                for child in component.sub_components.iter().rev() {
                    stack.push(Frame {
                        component: child.clone(),
                        depth: depth + 1,
                        parent_component_id: Some(component.id.clone()),
                        path: child_path.clone(),
                        ref_chain: ref_chain.clone(),
                    });
                }
            }

            out.push(ComponentMatch {
                component,
                depth,
                parent_component_id,
                path,
                resolved_manifest,
                matched: false,
                trees: Vec::new(),
            });
        }

        // Leaves first. The sort is stable, so sibling order survives.
        out.sort_by(|a, b| b.depth.cmp(&a.depth));
        Ok(Explosion { components: out, warnings })
    }

    /// Load the referenced manifest, resolve its BOM, and graft the result
    /// in place of the component's inline sub-components.
    async fn graft_reference(
        &self,
        component: &mut Component,
        reference: &str,
        ref_chain: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) -> Result<Option<String>, ResolveError> {
        if ref_chain.iter().any(|seen| seen == reference) {
            let mut cycle = ref_chain.clone();
            cycle.push(reference.to_string());
            return Err(ResolveError::CircularReference { cycle });
        }

        let referenced = self.manifest_loader.load_manifest(reference).await.map_err(
            |e| ResolveError::ComponentReference {
                component_id: component.id.clone(),
                reference: reference.to_string(),
                reason: e.to_string(),
            },
        )?;

        if ref_chain.iter().any(|seen| seen == &referenced.id) {
            let mut cycle = ref_chain.clone();
            cycle.push(referenced.id.clone());
            return Err(ResolveError::CircularReference { cycle });
        }

        let ref_bom = self.resolve(&referenced).await?;
        if !component.sub_components.is_empty() {
            warnings.push(format!(
                "component '{}': inline sub-components discarded in favour of reference '{}'",
                component.id, reference
            ));
        }
        component.sub_components = ref_bom.root.sub_components;
        ref_chain.push(reference.to_string());
        ref_chain.push(referenced.id.clone());
        Ok(Some(referenced.id))
    }
}

/// Join an external BOM path against the manifest's origin directory.
fn resolve_relative(origin: Option<&str>, path: &str) -> String {
    match origin {
        Some(origin) if !Path::new(path).is_absolute() => Path::new(origin)
            .parent()
            .map(|dir| dir.join(path).to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string()),
        _ => path.to_string(),
    }
}
