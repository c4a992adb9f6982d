// On-disc structures of an ISO9660 Level 1 image (ECMA-119).
// Serialization only: volume descriptors, path tables, directory records
// and their timestamps.

pub mod datetime;
pub mod path_table;
pub mod record;
pub mod volume;

/// ISO9660 sector size (always 2048 bytes)
pub const SECTOR_SIZE: usize = 2048;

/// Sectors 0-15 are reserved for the system area
pub const SYSTEM_AREA_SECTORS: u32 = 16;

/// Primary Volume Descriptor location
pub const PVD_LBA: u32 = 16;

/// Volume Descriptor Set Terminator location
pub const TERMINATOR_LBA: u32 = 17;

/// First sector free for path tables and extents
pub const FIRST_DATA_LBA: u32 = 18;

/// Standard identifier present in every volume descriptor
pub const STANDARD_ID: &[u8; 5] = b"CD001";

/// Volume descriptor type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VolumeDescriptorType {
    /// Primary Volume Descriptor
    Primary = 1,
    /// Volume Descriptor Set Terminator
    Terminator = 255,
}

/// Write a 32-bit value as LE followed by BE (8 bytes).
pub fn write_both_endian_u32(dst: &mut [u8], value: u32) {
    dst[0..4].copy_from_slice(&value.to_le_bytes());
    dst[4..8].copy_from_slice(&value.to_be_bytes());
}

/// Write a 16-bit value as LE followed by BE (4 bytes).
pub fn write_both_endian_u16(dst: &mut [u8], value: u16) {
    dst[0..2].copy_from_slice(&value.to_le_bytes());
    dst[2..4].copy_from_slice(&value.to_be_bytes());
}

/// Copy `text` into `dst`, padding the rest with spaces. Truncates if too long.
pub fn write_padded(dst: &mut [u8], text: &[u8]) {
    let n = text.len().min(dst.len());
    dst[..n].copy_from_slice(&text[..n]);
    dst[n..].fill(b' ');
}

/// Number of sectors needed for `bytes` (no minimum).
pub fn sectors_for_bytes(bytes: u64) -> u64 {
    bytes.div_ceil(SECTOR_SIZE as u64)
}

/// Round `bytes` up to a sector boundary.
pub fn align_to_sector(bytes: usize) -> usize {
    bytes.div_ceil(SECTOR_SIZE) * SECTOR_SIZE
}
