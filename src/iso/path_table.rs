// The path table lists every directory once with its parent's directory
// number. Stored twice: type L (little-endian) and type M (big-endian).

use crate::layout::{LayoutPlan, PathTableEntry};

use super::SECTOR_SIZE;

/// Byte order of a path table copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// Type L
    Little,
    /// Type M
    Big,
}

/// Identifier stored for the root directory
const ROOT_ID: &[u8] = &[0x00];

/// Bytes taken by one entry with an identifier of `identifier_len` bytes
/// (8 fixed bytes, the identifier, a pad byte if the length is odd).
pub fn entry_length(identifier_len: usize) -> usize {
    let identifier_len = identifier_len.max(ROOT_ID.len());
    8 + identifier_len + identifier_len % 2
}

fn identifier(entry: &PathTableEntry) -> &[u8] {
    if entry.directory_index == 0 {
        ROOT_ID
    } else {
        entry.name.as_bytes()
    }
}

/// Serialize one path table copy, padded to the planned sector count.
pub fn encode(plan: &LayoutPlan, endian: Endian) -> Vec<u8> {
    let mut buf = Vec::with_capacity(plan.path_table_sectors as usize * SECTOR_SIZE);

    for entry in &plan.path_table {
        let id = identifier(entry);
        // Directory numbers on disc are 1-based; the root is its own parent
        let parent_number = entry.parent_index + 1;

        buf.push(id.len() as u8);
        buf.push(0); // extended attribute record length
        match endian {
            Endian::Little => {
                buf.extend_from_slice(&entry.lba.to_le_bytes());
                buf.extend_from_slice(&parent_number.to_le_bytes());
            }
            Endian::Big => {
                buf.extend_from_slice(&entry.lba.to_be_bytes());
                buf.extend_from_slice(&parent_number.to_be_bytes());
            }
        }
        buf.extend_from_slice(id);
        if id.len() % 2 == 1 {
            buf.push(0);
        }
    }

    debug_assert_eq!(buf.len(), plan.path_table_size as usize);
    buf.resize(plan.path_table_sectors as usize * SECTOR_SIZE, 0);
    buf
}
