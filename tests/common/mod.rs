// Minimal ISO9660 reader used to check images produced by the builder
#![allow(dead_code)]

use std::path::Path;

pub const SECTOR: usize = 2048;

#[derive(Debug, Clone)]
pub struct Record {
    pub lba: u32,
    pub length: u32,
    pub is_dir: bool,
    pub identifier: Vec<u8>,
}

impl Record {
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.identifier).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    pub name: Vec<u8>,
    pub lba: u32,
    pub parent: u16,
}

/// One entry of a recursive walk, path relative to the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: String,
    pub is_dir: bool,
    pub lba: u32,
    pub length: u32,
}

pub struct Image {
    pub bytes: Vec<u8>,
}

fn both_u32(b: &[u8]) -> u32 {
    let le = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
    let be = u32::from_be_bytes([b[4], b[5], b[6], b[7]]);
    assert_eq!(le, be, "both-endian field disagrees");
    le
}

impl Image {
    pub fn open(path: &Path) -> Self {
        let bytes = std::fs::read(path).expect("read image");
        assert_eq!(bytes.len() % SECTOR, 0, "image is not sector aligned");
        Self { bytes }
    }

    pub fn sector(&self, lba: u32) -> &[u8] {
        let start = lba as usize * SECTOR;
        &self.bytes[start..start + SECTOR]
    }

    pub fn pvd(&self) -> &[u8] {
        let pvd = self.sector(16);
        assert_eq!(pvd[0], 1);
        assert_eq!(&pvd[1..6], b"CD001");
        pvd
    }

    pub fn volume_id(&self) -> String {
        String::from_utf8_lossy(&self.pvd()[40..72]).trim_end().to_string()
    }

    pub fn volume_space_size(&self) -> u32 {
        both_u32(&self.pvd()[80..88])
    }

    pub fn path_table_size(&self) -> u32 {
        both_u32(&self.pvd()[132..140])
    }

    pub fn root(&self) -> Record {
        parse_record(&self.pvd()[156..190])
    }

    pub fn path_table_l(&self) -> Vec<PathEntry> {
        let lba = u32::from_le_bytes(self.pvd()[140..144].try_into().unwrap());
        self.path_table(lba, true)
    }

    pub fn path_table_m(&self) -> Vec<PathEntry> {
        let lba = u32::from_be_bytes(self.pvd()[148..152].try_into().unwrap());
        self.path_table(lba, false)
    }

    fn path_table(&self, lba: u32, little: bool) -> Vec<PathEntry> {
        let size = self.path_table_size() as usize;
        let start = lba as usize * SECTOR;
        let table = &self.bytes[start..start + size];
        let mut entries = Vec::new();
        let mut pos = 0;
        while pos < size {
            let id_len = table[pos] as usize;
            let (lba, parent) = if little {
                (
                    u32::from_le_bytes(table[pos + 2..pos + 6].try_into().unwrap()),
                    u16::from_le_bytes(table[pos + 6..pos + 8].try_into().unwrap()),
                )
            } else {
                (
                    u32::from_be_bytes(table[pos + 2..pos + 6].try_into().unwrap()),
                    u16::from_be_bytes(table[pos + 6..pos + 8].try_into().unwrap()),
                )
            };
            entries.push(PathEntry {
                name: table[pos + 8..pos + 8 + id_len].to_vec(),
                lba,
                parent,
            });
            pos += 8 + id_len + id_len % 2;
        }
        entries
    }

    /// All records of a directory extent, `.` and `..` included.
    pub fn read_dir(&self, dir: &Record) -> Vec<Record> {
        let start = dir.lba as usize * SECTOR;
        let extent = &self.bytes[start..start + dir.length as usize];
        let mut records = Vec::new();
        let mut pos = 0;
        while pos < extent.len() {
            let len = extent[pos] as usize;
            if len == 0 {
                // rest of this sector is padding
                pos = (pos / SECTOR + 1) * SECTOR;
                continue;
            }
            assert_eq!(pos / SECTOR, (pos + len - 1) / SECTOR, "record straddles a sector");
            records.push(parse_record(&extent[pos..pos + len]));
            pos += len;
        }
        records
    }

    /// Children of a directory, without `.` and `..`.
    pub fn children(&self, dir: &Record) -> Vec<Record> {
        let records = self.read_dir(dir);
        assert_eq!(records[0].identifier, vec![0]);
        assert_eq!(records[1].identifier, vec![1]);
        records.into_iter().skip(2).collect()
    }

    pub fn walk(&self) -> Vec<WalkEntry> {
        let mut out = Vec::new();
        self.walk_into(&self.root(), "", &mut out);
        out
    }

    fn walk_into(&self, dir: &Record, prefix: &str, out: &mut Vec<WalkEntry>) {
        for child in self.children(dir) {
            let path = format!("{}/{}", prefix, child.name());
            out.push(WalkEntry {
                path: path.clone(),
                is_dir: child.is_dir,
                lba: child.lba,
                length: child.length,
            });
            if child.is_dir {
                self.walk_into(&child, &path, out);
            }
        }
    }

    pub fn file_bytes(&self, record: &Record) -> &[u8] {
        let start = record.lba as usize * SECTOR;
        &self.bytes[start..start + record.length as usize]
    }
}

pub fn parse_record(bytes: &[u8]) -> Record {
    let len = bytes[0] as usize;
    let id_len = bytes[32] as usize;
    assert!(len >= 33 + id_len);
    Record {
        lba: both_u32(&bytes[2..10]),
        length: both_u32(&bytes[10..18]),
        is_dir: bytes[25] & 0x02 != 0,
        identifier: bytes[33..33 + id_len].to_vec(),
    }
}
