use chrono::{DateTime, Utc};

use super::record::{self, DirectoryRecord};
use super::{
    datetime, write_both_endian_u16, write_both_endian_u32, write_padded, VolumeDescriptorType,
    SECTOR_SIZE, STANDARD_ID,
};
use crate::config::BuildOptions;
use crate::layout::names::is_d_char;
use crate::layout::LayoutPlan;
use crate::tree::arena::IsoTree;

/// Byte offsets inside the PVD (ECMA-119 8.4)
mod offset {
    pub const SYSTEM_ID: usize = 8;
    pub const VOLUME_ID: usize = 40;
    pub const VOLUME_SPACE_SIZE: usize = 80;
    pub const VOLUME_SET_SIZE: usize = 120;
    pub const VOLUME_SEQUENCE_NUMBER: usize = 124;
    pub const LOGICAL_BLOCK_SIZE: usize = 128;
    pub const PATH_TABLE_SIZE: usize = 132;
    pub const TYPE_L_PATH_TABLE: usize = 140;
    pub const OPTIONAL_TYPE_L_PATH_TABLE: usize = 144;
    pub const TYPE_M_PATH_TABLE: usize = 148;
    pub const OPTIONAL_TYPE_M_PATH_TABLE: usize = 152;
    pub const ROOT_DIRECTORY_RECORD: usize = 156;
    pub const VOLUME_SET_ID: usize = 190;
    pub const PUBLISHER_ID: usize = 318;
    pub const DATA_PREPARER_ID: usize = 446;
    pub const APPLICATION_ID: usize = 574;
    pub const COPYRIGHT_FILE_ID: usize = 702;
    pub const ABSTRACT_FILE_ID: usize = 739;
    pub const BIBLIOGRAPHIC_FILE_ID: usize = 776;
    pub const CREATION_DATE: usize = 813;
    pub const MODIFICATION_DATE: usize = 830;
    pub const EXPIRATION_DATE: usize = 847;
    pub const EFFECTIVE_DATE: usize = 864;
    pub const FILE_STRUCTURE_VERSION: usize = 881;
}

/// Length of the volume identifier field
pub const VOLUME_ID_LEN: usize = 32;

/// Map a display volume name to d-characters: uppercase, anything else
/// becomes `_`, at most 32 characters.
pub fn volume_identifier(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            let c = c.to_ascii_uppercase();
            if is_d_char(c) {
                c
            } else {
                '_'
            }
        })
        .take(VOLUME_ID_LEN)
        .collect()
}

/// a-characters: d-characters plus space and a few punctuation marks.
fn a_characters(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| c.to_ascii_uppercase())
        .map(|c| {
            if is_d_char(c) || " !\"%&'()*+,-./:;<=>?".contains(c) {
                c as u8
            } else {
                b'_'
            }
        })
        .collect()
}

fn write_header(sector: &mut [u8], kind: VolumeDescriptorType) {
    sector[0] = kind as u8;
    sector[1..6].copy_from_slice(STANDARD_ID);
    sector[6] = 1; // version
}

/// Build the Primary Volume Descriptor sector (LBA 16). It describes the whole
/// volume; the set terminator follows at LBA 17.
pub fn primary_volume_descriptor(
    tree: &IsoTree,
    plan: &LayoutPlan,
    options: &BuildOptions,
    build_time: &DateTime<Utc>,
) -> Vec<u8> {
    let mut pvd = vec![0u8; SECTOR_SIZE];
    write_header(&mut pvd, VolumeDescriptorType::Primary);

    write_padded(&mut pvd[offset::SYSTEM_ID..offset::SYSTEM_ID + 32], &a_characters(&options.system_id));
    write_padded(
        &mut pvd[offset::VOLUME_ID..offset::VOLUME_ID + VOLUME_ID_LEN],
        volume_identifier(tree.volume_name()).as_bytes(),
    );

    write_both_endian_u32(&mut pvd[offset::VOLUME_SPACE_SIZE..], plan.total_sectors);
    write_both_endian_u16(&mut pvd[offset::VOLUME_SET_SIZE..], 1);
    write_both_endian_u16(&mut pvd[offset::VOLUME_SEQUENCE_NUMBER..], 1);
    write_both_endian_u16(&mut pvd[offset::LOGICAL_BLOCK_SIZE..], SECTOR_SIZE as u16);
    write_both_endian_u32(&mut pvd[offset::PATH_TABLE_SIZE..], plan.path_table_size);

    pvd[offset::TYPE_L_PATH_TABLE..offset::TYPE_L_PATH_TABLE + 4]
        .copy_from_slice(&plan.type_l_lba.to_le_bytes());
    pvd[offset::OPTIONAL_TYPE_L_PATH_TABLE..offset::OPTIONAL_TYPE_L_PATH_TABLE + 4].fill(0);
    pvd[offset::TYPE_M_PATH_TABLE..offset::TYPE_M_PATH_TABLE + 4]
        .copy_from_slice(&plan.type_m_lba.to_be_bytes());
    pvd[offset::OPTIONAL_TYPE_M_PATH_TABLE..offset::OPTIONAL_TYPE_M_PATH_TABLE + 4].fill(0);

    let root: DirectoryRecord<'_> = record::record_for(tree, plan, tree.root, record::SELF_ID);
    root.write_to(&mut pvd[offset::ROOT_DIRECTORY_RECORD..]);

    write_padded(&mut pvd[offset::VOLUME_SET_ID..offset::VOLUME_SET_ID + 128], b"");
    write_padded(
        &mut pvd[offset::PUBLISHER_ID..offset::PUBLISHER_ID + 128],
        &a_characters(&options.publisher_id),
    );
    write_padded(
        &mut pvd[offset::DATA_PREPARER_ID..offset::DATA_PREPARER_ID + 128],
        &a_characters(&options.data_preparer_id),
    );
    write_padded(
        &mut pvd[offset::APPLICATION_ID..offset::APPLICATION_ID + 128],
        &a_characters(&options.application_id),
    );
    write_padded(&mut pvd[offset::COPYRIGHT_FILE_ID..offset::COPYRIGHT_FILE_ID + 37], b"");
    write_padded(&mut pvd[offset::ABSTRACT_FILE_ID..offset::ABSTRACT_FILE_ID + 37], b"");
    write_padded(
        &mut pvd[offset::BIBLIOGRAPHIC_FILE_ID..offset::BIBLIOGRAPHIC_FILE_ID + 37],
        b"",
    );

    let stamp = datetime::volume_datetime(build_time);
    for field in [
        offset::CREATION_DATE,
        offset::MODIFICATION_DATE,
        offset::EXPIRATION_DATE,
        offset::EFFECTIVE_DATE,
    ] {
        pvd[field..field + 17].copy_from_slice(&stamp);
    }

    pvd[offset::FILE_STRUCTURE_VERSION] = 1;
    pvd
}

/// Build the Volume Descriptor Set Terminator sector.
pub fn terminator() -> Vec<u8> {
    let mut sector = vec![0u8; SECTOR_SIZE];
    write_header(&mut sector, VolumeDescriptorType::Terminator);
    sector
}
