use chrono::{DateTime, Utc};

use super::arena::{Content, IsoTree, NodeId};
use crate::error::{IsoError, Result};

/// Length given to listed files that carry no explicit size.
pub const DEFAULT_VIRTUAL_LENGTH: u64 = 10;

const TAB_WIDTH: isize = 4;

#[derive(Debug)]
struct Line<'a> {
    number: usize,
    indent: isize,
    name: &'a str,
    explicit_dir: bool,
    size: Option<u64>,
}

struct Frame {
    indent: isize,
    id: NodeId,
    child_indent: Option<isize>,
}

/// Parse a text listing into a fully virtual tree. Every node gets `created`.
///
/// One entry per line, nesting by indentation:
///
/// ```text
/// # catalogued disc
/// docs/
///     README.TXT 5
///     notes.txt
/// music
///     track01.mp3 4096
/// ```
///
/// A trailing `/` or indented children make an entry a directory. A trailing
/// integer is the file length; files without one get the placeholder length.
pub fn parse_listing(text: &str, volume_name: &str, created: DateTime<Utc>) -> Result<IsoTree> {
    let lines = text
        .lines()
        .enumerate()
        .filter_map(|(i, raw)| parse_line(i + 1, raw).transpose())
        .collect::<Result<Vec<_>>>()?;

    let mut tree = IsoTree::new(volume_name, created);
    let mut stack = vec![Frame {
        indent: -1,
        id: tree.root,
        child_indent: None,
    }];

    for (i, line) in lines.iter().enumerate() {
        let has_children = lines
            .get(i + 1)
            .map(|next| next.indent > line.indent)
            .unwrap_or(false);
        let is_dir = line.explicit_dir || has_children;

        if is_dir && line.size.is_some() {
            return Err(IsoError::validation(format!(
                "line {}: '{}' has a size but also holds entries",
                line.number, line.name
            )));
        }

        while stack.last().map(|f| f.indent >= line.indent).unwrap_or(false) {
            stack.pop();
        }
        let Some(parent) = stack.last_mut() else {
            return Err(IsoError::validation(format!(
                "line {}: indentation underflow",
                line.number
            )));
        };
        match parent.child_indent {
            Some(expected) if expected != line.indent => {
                return Err(IsoError::validation(format!(
                    "line {}: inconsistent indentation for '{}'",
                    line.number, line.name
                )));
            }
            Some(_) => {}
            None => parent.child_indent = Some(line.indent),
        }
        let parent_id = parent.id;

        if is_dir {
            let id = tree.add_directory(parent_id, line.name, created)?;
            stack.push(Frame {
                indent: line.indent,
                id,
                child_indent: None,
            });
        } else {
            tree.add_file(
                parent_id,
                line.name,
                line.size.unwrap_or(DEFAULT_VIRTUAL_LENGTH),
                created,
                Content::Virtual,
            )?;
        }
    }

    tracing::debug!(
        "Parsed listing: {} dirs, {} files",
        tree.directory_count() - 1,
        tree.file_count()
    );
    Ok(tree)
}

fn parse_line(number: usize, raw: &str) -> Result<Option<Line<'_>>> {
    let content = raw.trim();
    if content.is_empty() || content.starts_with('#') {
        return Ok(None);
    }

    let indent = raw
        .chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
        .sum();

    let (name, explicit_dir, size) = match content.strip_suffix('/') {
        Some(dir) => (dir.trim_end(), true, None),
        None => match content.rsplit_once(char::is_whitespace) {
            Some((head, tail)) if !head.trim().is_empty() => match tail.parse::<u64>() {
                Ok(size) => (head.trim_end(), false, Some(size)),
                Err(_) => (content, false, None),
            },
            _ => (content, false, None),
        },
    };

    if name.is_empty() {
        return Err(IsoError::validation(format!("line {}: empty name", number)));
    }

    Ok(Some(Line {
        number,
        indent,
        name,
        explicit_dir,
        size,
    }))
}
