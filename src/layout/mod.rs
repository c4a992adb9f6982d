pub mod names;

use compact_str::CompactString;

use self::names::SiblingNames;
use crate::error::{IsoError, Result};
use crate::iso::{self, path_table, record, SECTOR_SIZE};
use crate::tree::arena::{IsoTree, NodeId};

/// Deepest directory nesting Level 1 readers are guaranteed to accept.
pub const MAX_LEVEL1_DEPTH: u16 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtentKind {
    Directory,
    File,
}

/// A contiguous run of sectors owned by one node.
#[derive(Debug, Clone, Copy)]
pub struct Extent {
    pub node: NodeId,
    pub kind: ExtentKind,
    pub lba: u32,
    pub sectors: u32,
}

impl Extent {
    /// First sector after this extent.
    pub fn end(&self) -> u64 {
        self.lba as u64 + self.sectors as u64
    }
}

/// Placement of a single node.
#[derive(Debug, Clone, Default)]
pub struct NodeLayout {
    pub lba: u32,
    pub sectors: u32,
    /// Data length written to the directory record (bytes)
    pub data_length: u32,
    /// Level 1 identifier (empty for the root)
    pub identifier: CompactString,
    /// Byte offset of this node's record inside its parent's extent
    pub record_offset: u32,
    /// Directories only: children in record order (dirs, then files, each by identifier)
    pub records: Vec<NodeId>,
    /// Directories only: index into the path table
    pub path_index: Option<u16>,
}

/// One directory in the path table. `directory_index` is zero-based; the
/// on-disc directory number is `directory_index + 1`.
#[derive(Debug, Clone)]
pub struct PathTableEntry {
    pub directory_index: u16,
    pub name: CompactString,
    pub parent_index: u16,
    pub lba: u32,
    pub node: NodeId,
}

/// The full layout result.
#[derive(Debug)]
pub struct LayoutPlan {
    /// node → placement, indexed by `NodeId`
    pub nodes: Vec<NodeLayout>,
    pub path_table: Vec<PathTableEntry>,
    /// Size of one path table copy in bytes (unpadded)
    pub path_table_size: u32,
    pub path_table_sectors: u32,
    pub type_l_lba: u32,
    pub type_m_lba: u32,
    /// Directory and file extents in ascending LBA order
    pub extents: Vec<Extent>,
    pub total_sectors: u32,
}

impl LayoutPlan {
    pub fn node(&self, id: NodeId) -> &NodeLayout {
        &self.nodes[id.index()]
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_sectors as u64 * SECTOR_SIZE as u64
    }
}

/// Compute the layout for `tree`. `on_node` is called once per visited node.
///
/// Deterministic: the same tree always produces the same plan. All
/// validation and capacity errors surface here, before anything is written.
pub fn plan(tree: &IsoTree, mut on_node: impl FnMut(NodeId)) -> Result<LayoutPlan> {
    let root = tree.root;
    if tree.volume_name().trim().is_empty() {
        return Err(IsoError::validation("volume name is empty"));
    }
    if !tree.get(root).is_dir {
        return Err(IsoError::validation("tree root must be a directory"));
    }

    let mut nodes = vec![NodeLayout::default(); tree.len()];
    on_node(root);

    assign_identifiers(tree, &mut nodes, &mut on_node)?;
    order_records(tree, &mut nodes);
    size_extents(tree, &mut nodes)?;

    let mut path_table = register_directories(tree, &mut nodes)?;
    let path_table_size: usize = path_table
        .iter()
        .map(|e| path_table::entry_length(e.name.len()))
        .sum();
    let path_table_sectors = iso::sectors_for_bytes(path_table_size as u64) as u32;

    // System area, PVD and terminator come first, then both path tables
    let mut next = iso::FIRST_DATA_LBA as u64;
    let type_l_lba = next as u32;
    next += path_table_sectors as u64;
    let type_m_lba = next as u32;
    next += path_table_sectors as u64;

    let extents = assign_lbas(tree, &mut nodes, &mut next)?;
    let total_sectors = u32::try_from(next)
        .map_err(|_| IsoError::capacity(format!("{} sectors exceed the 32-bit LBA range", next)))?;

    for entry in &mut path_table {
        entry.lba = nodes[entry.node.index()].lba;
    }

    let max_depth = tree.nodes.iter().map(|n| n.depth).max().unwrap_or(0);
    if max_depth > MAX_LEVEL1_DEPTH {
        tracing::warn!(
            "Directory depth {} exceeds the Level 1 limit of {}; some readers may refuse the image",
            max_depth,
            MAX_LEVEL1_DEPTH
        );
    }

    tracing::info!(
        "Layout planned: {} directories, {} extents, {} sectors ({} bytes)",
        path_table.len(),
        extents.len(),
        total_sectors,
        total_sectors as u64 * SECTOR_SIZE as u64
    );

    Ok(LayoutPlan {
        nodes,
        path_table,
        path_table_size: path_table_size as u32,
        path_table_sectors,
        type_l_lba,
        type_m_lba,
        extents,
        total_sectors,
    })
}

/// Give every non-root node a unique identifier within its directory.
/// Directories are claimed before files, each in collection order.
fn assign_identifiers(
    tree: &IsoTree,
    nodes: &mut [NodeLayout],
    on_node: &mut impl FnMut(NodeId),
) -> Result<()> {
    for (index, node) in tree.nodes.iter().enumerate() {
        if !node.is_dir {
            continue;
        }
        let dir = NodeId(index as u32);
        let mut siblings = SiblingNames::new();

        for child_id in tree.directories(dir).chain(tree.files(dir)) {
            let child = tree.get(child_id);
            if !child.is_dir && child.length > u32::MAX as u64 {
                return Err(IsoError::validation(format!(
                    "{} is {} bytes; Level 1 files must be smaller than 4 GiB",
                    tree.display_path(child_id),
                    child.length
                )));
            }

            let wanted = match &child.short_name {
                Some(short) => names::parse_supplied(short, child.is_dir)?,
                None => names::derive(&child.name, child.is_dir),
            };
            let claimed = siblings.claim(wanted, &tree.display_path(child_id))?;
            nodes[child_id.index()].identifier = CompactString::new(claimed.identifier());
            on_node(child_id);
        }
    }
    Ok(())
}

/// Directories first, then files, each sorted by identifier.
fn order_records(tree: &IsoTree, nodes: &mut [NodeLayout]) {
    for (index, node) in tree.nodes.iter().enumerate() {
        if !node.is_dir {
            continue;
        }
        let dir = NodeId(index as u32);
        let mut dirs: Vec<NodeId> = tree.directories(dir).collect();
        let mut files: Vec<NodeId> = tree.files(dir).collect();
        dirs.sort_by(|a, b| nodes[a.index()].identifier.cmp(&nodes[b.index()].identifier));
        files.sort_by(|a, b| nodes[a.index()].identifier.cmp(&nodes[b.index()].identifier));
        dirs.extend(files);
        nodes[index].records = dirs;
    }
}

/// Compute sector counts and record offsets. A directory record never
/// straddles a sector boundary.
fn size_extents(tree: &IsoTree, nodes: &mut [NodeLayout]) -> Result<()> {
    for (index, node) in tree.nodes.iter().enumerate() {
        if !node.is_dir {
            // Zero-length files still get a sector so every entry is addressable
            let sectors = iso::sectors_for_bytes(node.length).max(1);
            nodes[index].sectors = sectors as u32;
            nodes[index].data_length = node.length as u32;
            continue;
        }

        // "." and ".."
        let mut offset = 2 * record::record_length(1);
        let records = std::mem::take(&mut nodes[index].records);
        for &child in &records {
            let len = record::record_length(nodes[child.index()].identifier.len());
            if offset % SECTOR_SIZE + len > SECTOR_SIZE {
                offset = iso::align_to_sector(offset);
            }
            nodes[child.index()].record_offset = offset as u32;
            offset += len;
        }
        nodes[index].records = records;

        let bytes = iso::align_to_sector(offset);
        let data_length = u32::try_from(bytes).map_err(|_| {
            IsoError::capacity(format!(
                "directory {} needs {} bytes of records",
                tree.display_path(NodeId(index as u32)),
                bytes
            ))
        })?;
        nodes[index].data_length = data_length;
        nodes[index].sectors = (bytes / SECTOR_SIZE) as u32;
    }
    Ok(())
}

/// Number directories depth-first: every directory registers all of its
/// child directories before descending, so a parent's index is always lower
/// than its children's.
fn register_directories(tree: &IsoTree, nodes: &mut [NodeLayout]) -> Result<Vec<PathTableEntry>> {
    let root = tree.root;
    let mut table = vec![PathTableEntry {
        directory_index: 0,
        name: CompactString::new(""),
        parent_index: 0,
        lba: 0,
        node: root,
    }];
    nodes[root.index()].path_index = Some(0);

    let mut stack = vec![root];
    while let Some(dir) = stack.pop() {
        let parent_index = nodes[dir.index()].path_index.unwrap_or(0);
        let children: Vec<NodeId> = nodes[dir.index()]
            .records
            .iter()
            .copied()
            .filter(|&id| tree.get(id).is_dir)
            .collect();

        for &child in &children {
            // On-disc directory numbers are 1-based 16-bit values
            if table.len() >= u16::MAX as usize {
                return Err(IsoError::capacity(format!(
                    "more than {} directories do not fit the path table",
                    u16::MAX
                )));
            }
            let index = table.len() as u16;
            nodes[child.index()].path_index = Some(index);
            table.push(PathTableEntry {
                directory_index: index,
                name: nodes[child.index()].identifier.clone(),
                parent_index,
                lba: 0,
                node: child,
            });
        }
        stack.extend(children.into_iter().rev());
    }
    Ok(table)
}

/// Hand out LBAs in one ascending pass: each directory's extent, then its
/// files, then its subdirectories (pre-order).
fn assign_lbas(tree: &IsoTree, nodes: &mut [NodeLayout], next: &mut u64) -> Result<Vec<Extent>> {
    let mut extents = Vec::with_capacity(tree.len());
    let mut allocate = |id: NodeId, kind: ExtentKind, nodes: &mut [NodeLayout]| -> Result<()> {
        let sectors = nodes[id.index()].sectors;
        let end = *next + sectors as u64;
        if end > u32::MAX as u64 {
            return Err(IsoError::capacity(format!(
                "{} would end at sector {}, beyond the 32-bit LBA range",
                tree.display_path(id),
                end
            )));
        }
        let lba = *next as u32;
        nodes[id.index()].lba = lba;
        extents.push(Extent {
            node: id,
            kind,
            lba,
            sectors,
        });
        *next = end;
        Ok(())
    };

    let mut stack = vec![tree.root];
    while let Some(dir) = stack.pop() {
        allocate(dir, ExtentKind::Directory, nodes)?;

        let records = nodes[dir.index()].records.clone();
        for &file in records.iter().filter(|&&id| !tree.get(id).is_dir) {
            allocate(file, ExtentKind::File, nodes)?;
        }
        stack.extend(records.iter().rev().filter(|&&id| tree.get(id).is_dir));
    }
    Ok(extents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::arena::Content;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashSet;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 10, 10, 10, 10, 10).unwrap()
    }

    fn plan_quiet(tree: &IsoTree) -> Result<LayoutPlan> {
        plan(tree, |_| {})
    }

    #[test]
    fn single_virtual_file_layout() {
        let mut tree = IsoTree::new("ISO", t0());
        tree.add_file(tree.root, "README.TXT", 5, t0(), Content::Virtual)
            .unwrap();
        let plan = plan_quiet(&tree).unwrap();

        assert_eq!(plan.type_l_lba, 18);
        assert_eq!(plan.type_m_lba, 19);
        assert_eq!(plan.path_table_size, 10);
        assert_eq!(plan.node(tree.root).lba, 20);
        assert_eq!(plan.node(NodeId(1)).lba, 21);
        assert_eq!(plan.node(NodeId(1)).identifier, "README.TXT;1");
        assert_eq!(plan.total_sectors, 22);
    }

    #[test]
    fn empty_root_is_minimal() {
        let tree = IsoTree::new("EMPTY", t0());
        let plan = plan_quiet(&tree).unwrap();
        assert_eq!(plan.path_table.len(), 1);
        assert_eq!(plan.extents.len(), 1);
        assert_eq!(plan.total_sectors, 16 + 1 + 1 + 1 + 1 + 1);
    }

    #[test]
    fn parents_are_numbered_before_children() {
        let mut tree = IsoTree::new("V", t0());
        let a = tree.add_directory(tree.root, "a", t0()).unwrap();
        let b = tree.add_directory(tree.root, "b", t0()).unwrap();
        let a1 = tree.add_directory(a, "a1", t0()).unwrap();
        tree.add_directory(a1, "deep", t0()).unwrap();
        tree.add_directory(b, "b1", t0()).unwrap();

        let plan = plan_quiet(&tree).unwrap();
        let names: Vec<&str> = plan.path_table.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["", "A", "B", "A1", "DEEP", "B1"]);
        for entry in plan.path_table.iter().skip(1) {
            assert!(entry.parent_index < entry.directory_index);
        }
    }

    #[test]
    fn extents_are_ascending_and_disjoint() {
        let mut tree = IsoTree::new("V", t0());
        let d = tree.add_directory(tree.root, "data", t0()).unwrap();
        tree.add_file(d, "big.bin", 5000, t0(), Content::Virtual).unwrap();
        tree.add_file(d, "empty.txt", 0, t0(), Content::Virtual).unwrap();
        tree.add_file(tree.root, "z.txt", 1, t0(), Content::Virtual).unwrap();

        let plan = plan_quiet(&tree).unwrap();
        assert_eq!(plan.extents.len(), tree.len());
        for pair in plan.extents.windows(2) {
            assert_eq!(pair[0].end(), pair[1].lba as u64);
        }
        let last = plan.extents.last().unwrap();
        assert_eq!(last.end(), plan.total_sectors as u64);

        // root, its file, then the subdirectory and its files
        let kinds: Vec<ExtentKind> = plan.extents.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ExtentKind::Directory,
                ExtentKind::File,
                ExtentKind::Directory,
                ExtentKind::File,
                ExtentKind::File
            ]
        );
        assert_eq!(plan.node(NodeId(2)).sectors, 3);
        assert_eq!(plan.node(NodeId(3)).sectors, 1);
        assert_eq!(plan.node(NodeId(3)).data_length, 0);
    }

    #[test]
    fn case_variants_are_disambiguated() {
        let mut tree = IsoTree::new("V", t0());
        tree.add_file(tree.root, "REPORT.TXT", 1, t0(), Content::Virtual).unwrap();
        tree.add_file(tree.root, "Report.txt", 2, t0(), Content::Virtual).unwrap();
        let plan = plan_quiet(&tree).unwrap();

        let ids: HashSet<&str> = plan.nodes[1..].iter().map(|n| n.identifier.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("REPORT.TXT;1"));
        assert!(ids.contains("REPORT1.TXT;1"));
    }

    #[test]
    fn records_never_cross_sector_boundaries() {
        let mut tree = IsoTree::new("V", t0());
        for i in 0..200 {
            tree.add_file(tree.root, &format!("file{}.dat", i), 1, t0(), Content::Virtual)
                .unwrap();
        }
        let plan = plan_quiet(&tree).unwrap();
        let root = plan.node(tree.root);
        assert!(root.sectors > 1);
        for &child in &root.records {
            let layout = plan.node(child);
            let start = layout.record_offset as usize;
            let len = record::record_length(layout.identifier.len());
            assert_eq!(start / SECTOR_SIZE, (start + len - 1) / SECTOR_SIZE);
            assert!(start + len <= root.data_length as usize);
        }
    }

    #[test]
    fn planning_reports_every_node() {
        let mut tree = IsoTree::new("V", t0());
        let d = tree.add_directory(tree.root, "d", t0()).unwrap();
        tree.add_file(d, "f", 1, t0(), Content::Virtual).unwrap();
        let mut seen = Vec::new();
        plan(&tree, |id| seen.push(id)).unwrap();
        seen.sort();
        assert_eq!(seen, vec![NodeId(0), NodeId(1), NodeId(2)]);
    }

    #[test]
    fn oversized_files_and_empty_volume_names_fail_validation() {
        let mut tree = IsoTree::new("V", t0());
        tree.add_file(tree.root, "huge.img", 5 << 30, t0(), Content::Virtual).unwrap();
        assert!(matches!(plan_quiet(&tree), Err(IsoError::Validation(_))));

        let tree = IsoTree::new("   ", t0());
        assert!(matches!(plan_quiet(&tree), Err(IsoError::Validation(_))));
    }

    #[test]
    fn bad_supplied_short_names_fail_validation() {
        let mut tree = IsoTree::new("V", t0());
        let f = tree.add_file(tree.root, "x", 1, t0(), Content::Virtual).unwrap();
        tree.set_short_name(f, "not valid!.txt");
        assert!(matches!(plan_quiet(&tree), Err(IsoError::Validation(_))));
    }

    #[test]
    fn too_many_directories_exceed_the_path_table() {
        let mut tree = IsoTree::new("BIG", t0());
        // root plus 65 535 subdirectories is one more than 16-bit numbering allows
        let mut parent = tree.root;
        for i in 0..u16::MAX as u32 {
            if i % 1000 == 0 {
                parent = tree.add_directory(tree.root, &format!("g{}", i / 1000), t0()).unwrap();
                continue;
            }
            tree.add_directory(parent, &format!("d{}", i), t0()).unwrap();
        }
        assert_eq!(tree.directory_count(), u16::MAX as usize + 1);
        let err = plan_quiet(&tree).unwrap_err();
        assert!(matches!(err, IsoError::Capacity(_)));
    }

    #[test]
    fn largest_numbered_path_table_still_fits() {
        let mut tree = IsoTree::new("EDGE", t0());
        let mut parent = tree.root;
        for i in 0..u16::MAX as u32 - 1 {
            if i % 1000 == 0 {
                parent = tree.add_directory(tree.root, &format!("g{}", i / 1000), t0()).unwrap();
                continue;
            }
            tree.add_directory(parent, &format!("d{}", i), t0()).unwrap();
        }
        let plan = plan_quiet(&tree).unwrap();
        assert_eq!(plan.path_table.len(), u16::MAX as usize);
    }
}
