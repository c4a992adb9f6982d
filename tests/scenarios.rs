mod common;

use std::path::Path;
use std::sync::mpsc;

use chrono::{TimeZone, Utc};
use isocreator_rs::{BuildOptions, CancelToken, Content, IsoCreator, IsoTree};

use common::{Image, SECTOR};

fn fixed_options() -> BuildOptions {
    BuildOptions::default().with_build_time(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
}

fn build(tree: &IsoTree, output: &Path) -> Image {
    let (tx, _rx) = mpsc::channel();
    IsoCreator::new(tx, CancelToken::new(), fixed_options())
        .build_from_tree(tree, output)
        .unwrap();
    Image::open(output)
}

#[test]
fn scenario_a_single_virtual_file() {
    let dir = tempfile::tempdir().unwrap();
    let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let mut tree = IsoTree::new("SCENARIO_A", t);
    tree.add_file(tree.root, "README.TXT", 5, t, Content::Virtual)
        .unwrap();

    let image = build(&tree, &dir.path().join("a.iso"));

    // system area, PVD, terminator, L and M tables, root extent, file extent
    assert_eq!(image.bytes.len(), (16 + 1 + 1 + 2 + 1 + 1) * SECTOR);
    assert_eq!(image.volume_space_size(), 22);
    assert_eq!(image.volume_id(), "SCENARIO_A");
    assert_eq!(image.sector(17)[0], 255);

    let files = image.children(&image.root());
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name(), "README.TXT;1");
    assert_eq!(files[0].length, 5);
    assert!(image.sector(files[0].lba).iter().all(|&b| b == 0));
}

#[test]
fn scenario_b_three_folders_with_two_real_files_each() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("src");
    for (i, folder) in ["alpha", "beta", "gamma"].iter().enumerate() {
        let sub = source.join(folder);
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join("one.bin"), vec![i as u8 + 1; 100]).unwrap();
        std::fs::write(sub.join("two.bin"), vec![0xAB; 3000 + i]).unwrap();
    }
    let output = dir.path().join("b.iso");

    let (tx, _rx) = mpsc::channel();
    IsoCreator::new(tx, CancelToken::new(), fixed_options())
        .build_from_folder(&source, &output, "scenario b")
        .unwrap();
    let image = Image::open(&output);

    let table = image.path_table_l();
    assert_eq!(table.len(), 4);
    assert_eq!(table[0].name, vec![0]);
    let names: Vec<_> = table[1..].iter().map(|e| e.name.clone()).collect();
    assert_eq!(names, vec![b"ALPHA".to_vec(), b"BETA".to_vec(), b"GAMMA".to_vec()]);
    assert!(table[1..].iter().all(|e| e.parent == 1));

    for (i, sub) in image.children(&image.root()).iter().enumerate() {
        assert!(sub.is_dir);
        let records = image.read_dir(sub);
        assert_eq!(records.len(), 4);
        assert_eq!(records[2].name(), "ONE.BIN;1");
        assert_eq!(records[3].name(), "TWO.BIN;1");
        assert_eq!(image.file_bytes(&records[2]), &vec![i as u8 + 1; 100][..]);
        assert_eq!(records[3].length as usize, 3000 + i);
        // `..` of each subdirectory is the root
        assert_eq!(records[1].lba, image.root().lba);
    }
    assert_eq!(image.volume_id(), "SCENARIO_B");
}

#[test]
fn scenario_c_empty_root() {
    let dir = tempfile::tempdir().unwrap();
    let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let tree = IsoTree::new("EMPTY", t);

    let image = build(&tree, &dir.path().join("c.iso"));

    assert_eq!(image.volume_space_size(), 16 + 1 + 1 + 2 + 1);
    assert_eq!(image.bytes.len(), 21 * SECTOR);
    let root = image.root();
    assert!(root.is_dir);
    assert_eq!(root.length as usize, SECTOR);
    let records = image.read_dir(&root);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].lba, root.lba);
    assert_eq!(records[1].lba, root.lba);
    assert_eq!(image.path_table_l().len(), 1);
}

#[test]
fn scenario_d_case_variants_are_disambiguated() {
    let dir = tempfile::tempdir().unwrap();
    let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let mut tree = IsoTree::new("D", t);
    tree.add_file(tree.root, "REPORT.TXT", 1, t, Content::Virtual)
        .unwrap();
    tree.add_file(tree.root, "Report.txt", 2, t, Content::Virtual)
        .unwrap();

    let image = build(&tree, &dir.path().join("d.iso"));
    let mut names: Vec<_> = image
        .children(&image.root())
        .iter()
        .map(|r| (r.name(), r.length))
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![("REPORT.TXT;1".to_string(), 1), ("REPORT1.TXT;1".to_string(), 2)]
    );
}
