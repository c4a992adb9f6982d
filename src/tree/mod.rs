pub mod arena;
pub mod listing;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use self::arena::{Content, IsoTree, NodeId};
use crate::error::{IsoError, Result};
use crate::scanner::ScanResult;

/// Build an IsoTree from a folder scan. The scanned folder becomes the
/// volume root, named `volume_name`.
pub fn build_tree(scan: &ScanResult, volume_name: &str) -> Result<IsoTree> {
    let entries = &scan.entries;
    tracing::info!(
        "Building tree from {} entries ({} dirs, {} files)",
        entries.len(),
        scan.summary.dirs,
        scan.summary.files
    );

    let mut tree = IsoTree::new(volume_name, scan.root.modified);

    // Map from path → NodeId for parent lookups
    let mut path_map: HashMap<PathBuf, NodeId> = HashMap::with_capacity(scan.summary.dirs as usize + 1);
    path_map.insert(scan.root.path.clone(), tree.root);

    for entry in entries {
        let parent_path = entry.path.parent().unwrap_or(Path::new(""));
        let Some(&parent_id) = path_map.get(parent_path) else {
            return Err(IsoError::validation(format!(
                "scan listed {} before its parent directory",
                entry.path.display()
            )));
        };

        let name = entry
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if entry.is_dir {
            let id = tree.add_directory(parent_id, &name, entry.modified)?;
            path_map.insert(entry.path.clone(), id);
        } else {
            tree.add_file(
                parent_id,
                &name,
                entry.size,
                entry.modified,
                Content::File(entry.path.clone()),
            )?;
        }
    }

    tracing::info!(
        "Tree built: {} total nodes, {} direct children of root",
        tree.len(),
        tree.children(tree.root).count()
    );

    tracing::debug!("First 10 direct children of root:");
    for (i, child_id) in tree.children(tree.root).take(10).enumerate() {
        let child = tree.get(child_id);
        tracing::debug!(
            "  [{}] '{}' (dir={}, size={})",
            i,
            child.name,
            child.is_dir,
            child.length
        );
    }

    Ok(tree)
}
