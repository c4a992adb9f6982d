/// Diagnostic tool to inspect the scan → tree → layout pipeline
use isocreator_rs::layout::{self, ExtentKind};
use isocreator_rs::{scanner, tree};
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("isocreator_rs=debug".parse()?),
        )
        .init();

    let Some(scan_path) = std::env::args().nth(1).map(PathBuf::from) else {
        anyhow::bail!("usage: debug-layout <folder> [volume-name]");
    };
    let volume_name = std::env::args().nth(2).unwrap_or_else(|| "ISO".to_string());

    println!("=== DIAGNOSTIC: Scan → Layout Pipeline ===");
    println!("Scanning: {}", scan_path.display());

    // Scan
    let scan = scanner::scan(&scan_path, None)?;
    println!(
        "\n[1] Scan completed: {} entries ({} dirs, {} files, {} bytes, {} skipped)",
        scan.entries.len(),
        scan.summary.dirs,
        scan.summary.files,
        scan.summary.total_bytes,
        scan.summary.skipped
    );

    // Build tree
    let tree = tree::build_tree(&scan, &volume_name)?;
    println!("\n[2] Tree built: {} nodes", tree.len());

    // Plan
    let mut visited = 0usize;
    let plan = layout::plan(&tree, |_| visited += 1)?;
    println!(
        "\n[3] Layout planned: {} nodes visited, {} sectors ({:.2} MB)",
        visited,
        plan.total_sectors,
        plan.total_bytes() as f64 / 1_048_576.0
    );

    println!(
        "\n[4] Path table: {} bytes, L at {}, M at {}",
        plan.path_table_size, plan.type_l_lba, plan.type_m_lba
    );
    for entry in &plan.path_table {
        println!(
            "    #{:<5} parent #{:<5} lba {:<8} {}",
            entry.directory_index + 1,
            entry.parent_index + 1,
            entry.lba,
            if entry.directory_index == 0 { "<root>" } else { entry.name.as_str() }
        );
    }

    println!("\n[5] Extent map:");
    for extent in &plan.extents {
        let node = plan.node(extent.node);
        let kind = match extent.kind {
            ExtentKind::Directory => "DIR ",
            ExtentKind::File => "FILE",
        };
        println!(
            "    {:>8}..{:<8} {} {:<14} {}",
            extent.lba,
            extent.end(),
            kind,
            node.identifier,
            tree.display_path(extent.node)
        );
    }

    println!("\n=== END DIAGNOSTIC ===");
    Ok(())
}
