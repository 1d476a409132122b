//! Dashboard hierarchy builder.
//!
//! # Responsibility
//! - Turn flat dashboard metadata into a group/link tree.
//! - Reject dangling parents, duplicate slugs and parent cycles.
//!
//! # Invariants
//! - Roots mount into host slots; every other node mounts into exactly one
//!   group's synthesized slot.
//! - Children keep the registration order of their metadata entries.

use crate::dashboard::meta::{is_valid_slug, DashboardMeta};
use std::collections::{BTreeSet, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from dashboard hierarchy construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    /// Slug is not lowercase kebab-case.
    InvalidSlug(String),
    /// Two nodes share one slug.
    DuplicateSlug(String),
    /// Parent slot is neither a host slot nor a group's dashboard slot.
    ParentNotFound { slug: String, parent_slot: String },
    /// Node can only be reached through a parent cycle.
    CycleDetected { slug: String },
}

impl Display for HierarchyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSlug(slug) => write!(f, "dashboard slug is invalid: {slug}"),
            Self::DuplicateSlug(slug) => write!(f, "dashboard slug already registered: {slug}"),
            Self::ParentNotFound { slug, parent_slot } => write!(
                f,
                "dashboard `{slug}` targets parent slot `{parent_slot}` which no group exposes"
            ),
            Self::CycleDetected { slug } => {
                write!(f, "dashboard `{slug}` is part of a parent cycle")
            }
        }
    }
}

impl Error for HierarchyError {}

/// One node of a built dashboard tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardNode {
    pub meta: DashboardMeta,
    /// Synthesized slot of this node.
    pub slot: String,
    pub children: Vec<DashboardNode>,
}

/// Built dashboard tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardTree {
    roots: Vec<DashboardNode>,
    len: usize,
}

impl DashboardTree {
    pub fn roots(&self) -> &[DashboardNode] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Preorder traversal yielding `(depth, node)`.
    pub fn iter(&self) -> DashboardIter<'_> {
        DashboardIter {
            stack: self.roots.iter().rev().map(|node| (0, node)).collect(),
        }
    }

    pub fn find(&self, slug: &str) -> Option<&DashboardNode> {
        self.iter()
            .map(|(_, node)| node)
            .find(|node| node.meta.slug == slug)
    }

    /// Nodes mounted into `slot`, in registration order.
    pub fn children_of(&self, slot: &str) -> Vec<&DashboardNode> {
        self.iter()
            .map(|(_, node)| node)
            .filter(|node| node.meta.parent_slot == slot)
            .collect()
    }
}

/// Preorder iterator over a [`DashboardTree`].
pub struct DashboardIter<'a> {
    stack: Vec<(usize, &'a DashboardNode)>,
}

impl<'a> Iterator for DashboardIter<'a> {
    type Item = (usize, &'a DashboardNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|child| (depth + 1, child)));
        Some((depth, node))
    }
}

/// Dashboard hierarchy builder.
pub struct DashboardHierarchy;

impl DashboardHierarchy {
    /// Builds the tree for `entries` given in registration order.
    ///
    /// # Errors
    /// - `InvalidSlug` / `DuplicateSlug` for malformed or repeated slugs.
    /// - `ParentNotFound` when a parent slot matches no host slot and no
    ///   group's synthesized slot.
    /// - `CycleDetected` when nodes are only reachable through each other.
    pub fn build<'a, I>(
        entries: I,
        host_slots: &BTreeSet<String>,
    ) -> Result<DashboardTree, HierarchyError>
    where
        I: IntoIterator<Item = &'a DashboardMeta>,
    {
        let metas: Vec<&DashboardMeta> = entries.into_iter().collect();

        let mut seen = BTreeSet::new();
        for meta in &metas {
            if !is_valid_slug(&meta.slug) {
                return Err(HierarchyError::InvalidSlug(meta.slug.clone()));
            }
            if !seen.insert(meta.slug.as_str()) {
                return Err(HierarchyError::DuplicateSlug(meta.slug.clone()));
            }
        }

        let group_slots: HashMap<String, usize> = metas
            .iter()
            .enumerate()
            .filter(|(_, meta)| meta.accepts_children())
            .map(|(index, meta)| (meta.dashboard_slot(), index))
            .collect();

        let mut children = vec![Vec::new(); metas.len()];
        let mut roots = Vec::new();
        for (index, meta) in metas.iter().enumerate() {
            if let Some(&parent) = group_slots.get(meta.parent_slot.as_str()) {
                children[parent].push(index);
            } else if host_slots.contains(&meta.parent_slot) {
                roots.push(index);
            } else {
                return Err(HierarchyError::ParentNotFound {
                    slug: meta.slug.clone(),
                    parent_slot: meta.parent_slot.clone(),
                });
            }
        }

        let mut visited = vec![false; metas.len()];
        let root_nodes: Vec<DashboardNode> = roots
            .iter()
            .map(|&index| assemble(index, &metas, &children, &mut visited))
            .collect();

        if let Some(index) = visited.iter().position(|reached| !reached) {
            return Err(HierarchyError::CycleDetected {
                slug: metas[index].slug.clone(),
            });
        }

        Ok(DashboardTree {
            roots: root_nodes,
            len: metas.len(),
        })
    }
}

fn assemble(
    index: usize,
    metas: &[&DashboardMeta],
    children: &[Vec<usize>],
    visited: &mut [bool],
) -> DashboardNode {
    visited[index] = true;
    let meta = metas[index].clone();
    DashboardNode {
        slot: meta.dashboard_slot(),
        children: children[index]
            .iter()
            .map(|&child| assemble(child, metas, children, visited))
            .collect(),
        meta,
    }
}
