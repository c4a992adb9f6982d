use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use compact_str::CompactString;

use crate::error::{IsoError, Result};

/// Index into the arena `Vec<IsoNode>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where a file's bytes come from when the image is written.
#[derive(Debug, Clone, Default)]
pub enum Content {
    /// No backing bytes: the extent is zero-filled for `length` bytes.
    #[default]
    Virtual,
    /// Read from a file on the host filesystem at write time.
    File(PathBuf),
    /// Bytes held in memory by the caller.
    Memory(Arc<[u8]>),
}

/// A single file or directory, stored in a flat arena.
/// Children form a sibling list kept in insertion order.
#[derive(Debug, Clone)]
pub struct IsoNode {
    /// Display name (arbitrary length/case)
    pub name: CompactString,
    /// Caller-supplied Level 1 identifier. Derived by the planner when `None`.
    pub short_name: Option<CompactString>,
    pub is_dir: bool,
    /// Content length in bytes (0 for directories)
    pub length: u64,
    /// Timestamp written to the directory record
    pub created: DateTime<Utc>,
    pub content: Content,
    /// Parent node index (None for root)
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub last_child: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    /// Depth in the tree (root = 0)
    pub depth: u16,
}

impl IsoNode {
    fn new(name: &str, is_dir: bool, length: u64, created: DateTime<Utc>, content: Content) -> Self {
        Self {
            name: CompactString::new(name),
            short_name: None,
            is_dir,
            length,
            created,
            content,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            depth: 0,
        }
    }
}

/// The volume's directory tree. The root node is the volume itself and its
/// name is the volume name.
#[derive(Debug, Clone)]
pub struct IsoTree {
    pub nodes: Vec<IsoNode>,
    pub root: NodeId,
}

impl IsoTree {
    /// Create a tree holding only the root directory.
    pub fn new(volume_name: &str, created: DateTime<Utc>) -> Self {
        let root = IsoNode::new(volume_name, true, 0, created, Content::Virtual);
        IsoTree {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    /// Volume name (the root node's name).
    pub fn volume_name(&self) -> &str {
        self.nodes[self.root.index()].name.as_str()
    }

    /// Add a subdirectory under `parent`.
    pub fn add_directory(
        &mut self,
        parent: NodeId,
        name: &str,
        created: DateTime<Utc>,
    ) -> Result<NodeId> {
        self.add_child(parent, IsoNode::new(name, true, 0, created, Content::Virtual))
    }

    /// Add a file under `parent`.
    pub fn add_file(
        &mut self,
        parent: NodeId,
        name: &str,
        length: u64,
        created: DateTime<Utc>,
        content: Content,
    ) -> Result<NodeId> {
        self.add_child(parent, IsoNode::new(name, false, length, created, content))
    }

    /// Add a file whose bytes are held in memory. Length is taken from the data.
    pub fn add_memory_file(
        &mut self,
        parent: NodeId,
        name: &str,
        data: impl Into<Arc<[u8]>>,
        created: DateTime<Utc>,
    ) -> Result<NodeId> {
        let data = data.into();
        let length = data.len() as u64;
        self.add_file(parent, name, length, created, Content::Memory(data))
    }

    /// Pin the Level 1 identifier of a node instead of deriving it.
    pub fn set_short_name(&mut self, id: NodeId, short_name: &str) {
        self.nodes[id.index()].short_name = Some(CompactString::new(short_name));
    }

    /// Append a child node to the given parent. Returns the new node's ID.
    pub fn add_child(&mut self, parent: NodeId, mut node: IsoNode) -> Result<NodeId> {
        let Some(parent_node) = self.nodes.get(parent.index()) else {
            return Err(IsoError::validation(format!("unknown parent node {}", parent.0)));
        };
        if !parent_node.is_dir {
            return Err(IsoError::validation(format!(
                "'{}' is a file and cannot hold '{}'",
                parent_node.name, node.name
            )));
        }
        if node.name.is_empty() {
            return Err(IsoError::validation(format!(
                "empty entry name under '{}'",
                parent_node.name
            )));
        }
        let last_child = parent_node.last_child;
        node.depth = parent_node.depth.saturating_add(1);
        node.parent = Some(parent);
        node.next_sibling = None;

        let new_id = NodeId(u32::try_from(self.nodes.len()).map_err(|_| {
            IsoError::capacity("more than 4 billion tree nodes")
        })?);

        // Append to keep collection order (O(1) through last_child)
        match last_child {
            Some(last) => self.nodes[last.index()].next_sibling = Some(new_id),
            None => self.nodes[parent.index()].first_child = Some(new_id),
        }
        self.nodes[parent.index()].last_child = Some(new_id);

        self.nodes.push(node);
        Ok(new_id)
    }

    /// Get a node by ID.
    pub fn get(&self, id: NodeId) -> &IsoNode {
        &self.nodes[id.index()]
    }

    /// Total number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree is empty (only root).
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn directory_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_dir).count()
    }

    pub fn file_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.is_dir).count()
    }

    /// Iterate over children of a node in insertion order.
    pub fn children(&self, parent: NodeId) -> ChildIter<'_> {
        ChildIter {
            tree: self,
            current: self.nodes[parent.index()].first_child,
        }
    }

    /// Child directories in insertion order.
    pub fn directories(&self, parent: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(parent).filter(move |&id| self.get(id).is_dir)
    }

    /// Child files in insertion order.
    pub fn files(&self, parent: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(parent).filter(move |&id| !self.get(id).is_dir)
    }

    /// Slash-separated display path from the root, for messages.
    pub fn display_path(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == self.root {
                break;
            }
            let node = self.get(node_id);
            parts.push(node.name.as_str());
            current = node.parent;
        }
        parts.reverse();
        format!("/{}", parts.join("/"))
    }
}

/// Iterator over the children of a node.
pub struct ChildIter<'a> {
    tree: &'a IsoTree,
    current: Option<NodeId>,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.current?;
        self.current = self.tree.nodes[id.index()].next_sibling;
        Some(id)
    }
}
