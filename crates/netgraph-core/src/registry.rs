//! Node discovery.
//!
//! [`NodeRegistry`] stages every endpoint identity seen during a scan, in any
//! order and with duplicates. [`NodeRegistry::finalize`] consumes it and
//! yields a sorted, deduplicated [`NodeTable`]; lookups only exist on the
//! table, so nothing can search the staging list.

use crate::graph::GraphError;
use crate::identity::{IdentityKind, NodeIdentity};

/// Dense position of a node in a finalized [`NodeTable`].
///
/// The same value is the node's internal index in the encoded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeHandle(pub(crate) usize);

impl NodeHandle {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Staging area for raw node occurrences.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    kind: Option<IdentityKind>,
    staged: Vec<NodeIdentity>,
}

impl NodeRegistry {
    /// A registry committed to `kind` up front.
    #[must_use]
    pub const fn new(kind: IdentityKind) -> Self {
        Self {
            kind: Some(kind),
            staged: Vec::new(),
        }
    }

    /// A registry that commits to the kind of the first observed identity.
    #[must_use]
    pub fn uncommitted() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn kind(&self) -> Option<IdentityKind> {
        self.kind
    }

    /// Number of staged occurrences, duplicates included.
    #[must_use]
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Stage a candidate node.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::MixedIdentity`] when `identity` is not of the
    /// registry's committed kind. Nothing is staged in that case.
    pub fn observe(&mut self, identity: NodeIdentity) -> Result<(), GraphError> {
        let found = identity.kind();
        match self.kind {
            Some(expected) if expected != found => {
                return Err(GraphError::MixedIdentity { expected, found });
            }
            Some(_) => {}
            None => self.kind = Some(found),
        }
        self.staged.push(identity);
        Ok(())
    }

    /// Sort, collapse equal runs and release the staging list.
    #[must_use]
    pub fn finalize(self) -> NodeTable {
        let Self { kind, mut staged } = self;
        staged.sort_unstable();
        staged.dedup();
        staged.shrink_to_fit();

        let max_code_len = staged
            .iter()
            .map(NodeIdentity::encoded_code_len)
            .max()
            .unwrap_or(0);

        tracing::debug!(nodes = staged.len(), max_code_len, "node registry finalized");

        NodeTable {
            kind,
            nodes: staged,
            max_code_len,
        }
    }
}

/// Identity-sorted, duplicate-free node list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeTable {
    kind: Option<IdentityKind>,
    nodes: Vec<NodeIdentity>,
    max_code_len: usize,
}

impl NodeTable {
    /// Binary-search `identity`.
    #[must_use]
    pub fn find(&self, identity: &NodeIdentity) -> Option<NodeHandle> {
        self.nodes.binary_search(identity).ok().map(NodeHandle)
    }

    #[must_use]
    pub fn get(&self, handle: NodeHandle) -> Option<&NodeIdentity> {
        self.nodes.get(handle.0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &NodeIdentity)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, identity)| (NodeHandle(index), identity))
    }

    /// Identity kind of the table; `None` only when nothing was observed.
    #[must_use]
    pub const fn kind(&self) -> Option<IdentityKind> {
        self.kind
    }

    /// Longest code including its NUL terminator; zero for integer ids.
    #[must_use]
    pub const fn max_code_len(&self) -> usize {
        self.max_code_len
    }

    pub(crate) fn into_parts(self) -> (Option<IdentityKind>, Vec<NodeIdentity>, usize) {
        (self.kind, self.nodes, self.max_code_len)
    }
}
