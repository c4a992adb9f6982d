use chrono::{DateTime, Utc};

use super::{datetime, write_both_endian_u16, write_both_endian_u32, SECTOR_SIZE};
use crate::layout::LayoutPlan;
use crate::tree::arena::{IsoTree, NodeId};

/// Fixed part of a directory record
pub const FIXED_LENGTH: usize = 33;

/// File flag: entry is a directory
pub const FLAG_DIRECTORY: u8 = 0x02;

/// Identifier of the `.` record
pub const SELF_ID: &[u8] = &[0x00];

/// Identifier of the `..` record
pub const PARENT_ID: &[u8] = &[0x01];

/// Total length of a record with an identifier of `identifier_len` bytes.
pub fn record_length(identifier_len: usize) -> usize {
    let pad = if identifier_len % 2 == 0 { 1 } else { 0 };
    FIXED_LENGTH + identifier_len + pad
}

/// Directory Record (variable length), ECMA-119 9.1:
///
/// | BP | Field |
/// |----|-------|
/// | 1 | record length |
/// | 2 | extended attribute record length |
/// | 3-10 | extent location (both-endian 32-bit) |
/// | 11-18 | data length (both-endian 32-bit) |
/// | 19-25 | recording date and time |
/// | 26 | file flags |
/// | 27-28 | file unit size, interleave gap |
/// | 29-32 | volume sequence number (both-endian 16-bit) |
/// | 33 | file identifier length |
/// | 34- | identifier, then a pad byte if the length is even |
#[derive(Debug, Clone)]
pub struct DirectoryRecord<'a> {
    pub extent_lba: u32,
    pub data_length: u32,
    pub recorded: DateTime<Utc>,
    pub flags: u8,
    pub identifier: &'a [u8],
}

impl DirectoryRecord<'_> {
    pub fn encoded_len(&self) -> usize {
        record_length(self.identifier.len())
    }

    /// Serialize into the start of `dst`, which must hold `self.encoded_len()` bytes.
    pub fn write_to(&self, dst: &mut [u8]) {
        let len = self.encoded_len();
        let out = &mut dst[..len];
        out.fill(0);
        out[0] = len as u8;
        out[1] = 0; // no extended attribute record
        write_both_endian_u32(&mut out[2..10], self.extent_lba);
        write_both_endian_u32(&mut out[10..18], self.data_length);
        out[18..25].copy_from_slice(&datetime::record_datetime(&self.recorded));
        out[25] = self.flags;
        out[26] = 0; // file unit size
        out[27] = 0; // interleave gap
        write_both_endian_u16(&mut out[28..32], 1);
        out[32] = self.identifier.len() as u8;
        out[33..33 + self.identifier.len()].copy_from_slice(self.identifier);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.encoded_len()];
        self.write_to(&mut buf);
        buf
    }
}

/// The record that points at `id`'s own extent, under the given identifier.
pub fn record_for<'a>(
    tree: &IsoTree,
    plan: &LayoutPlan,
    id: NodeId,
    identifier: &'a [u8],
) -> DirectoryRecord<'a> {
    let node = tree.get(id);
    let layout = plan.node(id);
    DirectoryRecord {
        extent_lba: layout.lba,
        data_length: layout.data_length,
        recorded: node.created,
        flags: if node.is_dir { FLAG_DIRECTORY } else { 0 },
        identifier,
    }
}

/// Serialize the full extent of directory `dir`: `.`, `..`, then every child
/// at the offset the planner chose. The result is exactly the planned size.
pub fn build_directory_extent(tree: &IsoTree, plan: &LayoutPlan, dir: NodeId) -> Vec<u8> {
    let layout = plan.node(dir);
    let mut buf = vec![0u8; layout.sectors as usize * SECTOR_SIZE];

    let parent = tree.get(dir).parent.unwrap_or(dir);
    let dot = record_for(tree, plan, dir, SELF_ID);
    let dotdot = record_for(tree, plan, parent, PARENT_ID);
    dot.write_to(&mut buf);
    dotdot.write_to(&mut buf[dot.encoded_len()..]);

    for &child in &layout.records {
        let child_layout = plan.node(child);
        let record = record_for(tree, plan, child, child_layout.identifier.as_bytes());
        record.write_to(&mut buf[child_layout.record_offset as usize..]);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout;
    use crate::tree::arena::Content;
    use chrono::TimeZone;

    #[test]
    fn record_lengths_include_padding() {
        assert_eq!(record_length(1), 34);
        assert_eq!(record_length(12), 46);
        assert_eq!(record_length(11), 44);
    }

    #[test]
    fn record_fields_land_at_ecma_offsets() {
        let time = Utc.with_ymd_and_hms(2010, 1, 2, 3, 4, 5).unwrap();
        let record = DirectoryRecord {
            extent_lba: 21,
            data_length: 5,
            recorded: time,
            flags: 0,
            identifier: b"README.TXT;1",
        };
        let bytes = record.to_bytes();
        assert_eq!(bytes.len(), 46);
        assert_eq!(bytes[0], 46);
        assert_eq!(&bytes[2..6], &21u32.to_le_bytes());
        assert_eq!(&bytes[6..10], &21u32.to_be_bytes());
        assert_eq!(&bytes[10..14], &5u32.to_le_bytes());
        assert_eq!(&bytes[14..18], &5u32.to_be_bytes());
        assert_eq!(&bytes[18..25], &[110, 1, 2, 3, 4, 5, 0]);
        assert_eq!(bytes[25], 0);
        assert_eq!(&bytes[28..32], &[1, 0, 0, 1]);
        assert_eq!(bytes[32], 12);
        assert_eq!(&bytes[33..45], b"README.TXT;1");
        assert_eq!(bytes[45], 0);
    }

    #[test]
    fn root_extent_points_dotdot_at_itself() {
        let time = Utc.with_ymd_and_hms(2010, 1, 2, 3, 4, 5).unwrap();
        let mut tree = IsoTree::new("V", time);
        let sub = tree.add_directory(tree.root, "sub", time).unwrap();
        tree.add_file(sub, "a.txt", 3, time, Content::Virtual).unwrap();
        let plan = layout::plan(&tree, |_| {}).unwrap();

        let root = build_directory_extent(&tree, &plan, tree.root);
        assert_eq!(root.len(), SECTOR_SIZE);
        let root_lba = plan.node(tree.root).lba.to_le_bytes();
        assert_eq!(&root[2..6], &root_lba);
        assert_eq!(&root[34 + 2..34 + 6], &root_lba);
        assert_eq!(root[33], 0x00);
        assert_eq!(root[34 + 33], 0x01);
        assert_eq!(root[68 + 25], FLAG_DIRECTORY);
        assert_eq!(&root[68 + 33..68 + 36], b"SUB");

        let child = build_directory_extent(&tree, &plan, sub);
        assert_eq!(&child[34 + 2..34 + 6], &root_lba);
        assert_eq!(&child[68 + 33..68 + 40], b"A.TXT;1");
    }
}
