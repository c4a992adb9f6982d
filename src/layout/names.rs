// ISO9660 Level 1 identifiers: directories get up to 8 d-characters
// (`A-Z`, `0-9`, `_`), files get `BASE.EXT;1` with an 8-character base and a
// 3-character extension.

use std::collections::HashSet;

use crate::error::{IsoError, Result};

pub const MAX_BASE_LEN: usize = 8;
pub const MAX_EXT_LEN: usize = 3;

/// Fallback for names that contain no usable character at all.
const EMPTY_BASE: &str = "_";

/// A Level 1 identifier split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortName {
    pub base: String,
    /// `None` for directories. Files always have one, possibly empty.
    pub ext: Option<String>,
}

impl ShortName {
    /// The identifier as written to directory records and path tables.
    pub fn identifier(&self) -> String {
        match &self.ext {
            Some(ext) => format!("{}.{};1", self.base, ext),
            None => self.base.clone(),
        }
    }

    /// Collision key: the identifier without version or a dangling dot.
    /// A directory `README` and a file `README` clash once readers strip `.;1`.
    pub fn key(&self) -> String {
        match &self.ext {
            Some(ext) if !ext.is_empty() => format!("{}.{}", self.base, ext),
            _ => self.base.clone(),
        }
    }

    fn with_counter(&self, counter: u32, max_digits: usize) -> Option<ShortName> {
        let digits = counter.to_string();
        if digits.len() > max_digits {
            return None;
        }
        let keep = self.base.len().min(MAX_BASE_LEN - digits.len());
        Some(ShortName {
            base: format!("{}{}", &self.base[..keep], digits),
            ext: self.ext.clone(),
        })
    }
}

pub fn is_d_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'
}

/// Uppercase, drop everything outside the d-character set, truncate.
pub fn sanitize(part: &str, max_len: usize) -> String {
    part.chars()
        .map(|c| c.to_ascii_uppercase())
        .filter(|&c| is_d_char(c))
        .take(max_len)
        .collect()
}

/// Derive an identifier from a display name.
pub fn derive(name: &str, is_dir: bool) -> ShortName {
    if is_dir {
        let base = sanitize(name, MAX_BASE_LEN);
        return ShortName {
            base: non_empty(base),
            ext: None,
        };
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, ext),
        None => (name, ""),
    };
    ShortName {
        base: non_empty(sanitize(stem, MAX_BASE_LEN)),
        ext: Some(sanitize(ext, MAX_EXT_LEN)),
    }
}

fn non_empty(base: String) -> String {
    if base.is_empty() {
        EMPTY_BASE.to_string()
    } else {
        base
    }
}

/// Validate a caller-supplied identifier. Lowercase is accepted and folded;
/// a `;1` version suffix is optional.
pub fn parse_supplied(short: &str, is_dir: bool) -> Result<ShortName> {
    let upper = short.to_ascii_uppercase();
    let invalid = || {
        IsoError::validation(format!(
            "'{}' is not a valid Level 1 {} identifier",
            short,
            if is_dir { "directory" } else { "file" }
        ))
    };
    let valid_part = |part: &str, max: usize| part.len() <= max && part.chars().all(is_d_char);

    if is_dir {
        if upper.is_empty() || !valid_part(&upper, MAX_BASE_LEN) {
            return Err(invalid());
        }
        return Ok(ShortName {
            base: upper,
            ext: None,
        });
    }

    let unversioned = upper.strip_suffix(";1").unwrap_or(&upper);
    let (base, ext) = unversioned.split_once('.').unwrap_or((unversioned, ""));
    if base.is_empty() || !valid_part(base, MAX_BASE_LEN) || !valid_part(ext, MAX_EXT_LEN) {
        return Err(invalid());
    }
    Ok(ShortName {
        base: base.to_string(),
        ext: Some(ext.to_string()),
    })
}

/// Longest collision counter; one base character always survives.
const MAX_COUNTER_DIGITS: usize = MAX_BASE_LEN - 1;

/// Hands out unique identifiers within one directory, first come first served.
#[derive(Debug)]
pub struct SiblingNames {
    taken: HashSet<String>,
    max_digits: usize,
}

impl Default for SiblingNames {
    fn default() -> Self {
        Self::with_counter_digits(MAX_COUNTER_DIGITS)
    }
}

impl SiblingNames {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_counter_digits(max_digits: usize) -> Self {
        Self {
            taken: HashSet::new(),
            max_digits: max_digits.min(MAX_COUNTER_DIGITS),
        }
    }

    /// Claim `wanted`, or the first free numbered variant of it.
    pub fn claim(&mut self, wanted: ShortName, display_name: &str) -> Result<ShortName> {
        if self.taken.insert(wanted.key()) {
            return Ok(wanted);
        }
        let mut counter: u32 = 1;
        while let Some(candidate) = wanted.with_counter(counter, self.max_digits) {
            if self.taken.insert(candidate.key()) {
                tracing::debug!(
                    "Renamed '{}' to {} to avoid a collision",
                    display_name,
                    candidate.identifier()
                );
                return Ok(candidate);
            }
            counter += 1;
        }
        Err(IsoError::validation(format!(
            "cannot find a unique 8.3 name for '{}'",
            display_name
        )))
    }
}
