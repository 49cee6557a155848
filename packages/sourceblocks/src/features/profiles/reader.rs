//! Memory-mapped profile file reader.
//!
//! One file per interaction. The reader maps the file read-only, validates
//! the three header lines, and indexes every entry as an `(offset, len)`
//! span into the map; the mapped bytes are the owning storage and nothing is
//! copied out. Indexing one file is single-threaded; multiple files load in
//! parallel.
//!
//! File format (ASCII, LF-terminated):
//!
//! ```text
//! interaction,appear#
//! <interaction_id>,<count>
//! name,profiled_srcblks_exprs
//! <method_key>,<serialized_sb_value_string>
//! ...
//! ```

use crate::errors::{Result, SourceBlockError};
use crate::features::profiles::ports::MethodTable;
use crate::shared::models::{classify_access_name, split_method_key, AccessNameKind, MethodId, TypeId};
use memmap2::Mmap;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct ProfileSpan {
    offset: usize,
    len: usize,
}

/// Hashed accessor keys are indexed by the 16-hex body hash; the two-digit
/// access-flag tag is a disambiguator this subsystem does not model.
fn hashed_key_of(name: &str) -> Option<&str> {
    let suffix = name.strip_prefix("access$")?.strip_prefix("redex")?;
    suffix.get(..16)
}

/// Index over one interaction's profile file.
#[derive(Debug)]
pub struct InteractionProfile {
    pub interaction_id: String,
    pub appear_count: u64,
    pub path: PathBuf,
    mmap: Mmap,
    by_method: FxHashMap<MethodId, ProfileSpan>,
    exact_access: FxHashMap<(TypeId, String), ProfileSpan>,
    hashed_access: FxHashMap<(TypeId, String), ProfileSpan>,
    /// Keys whose owner/method is unknown in this process, verbatim.
    pub unresolved: Vec<String>,
}

impl InteractionProfile {
    pub fn open(path: &Path, table: &dyn MethodTable) -> Result<Self> {
        let file = File::open(path)?;
        // Read-only map; lives for the whole attribution phase.
        let mmap = unsafe { Mmap::map(&file)? };

        let header_err = |detail: &str| SourceBlockError::ProfileHeader {
            path: path.display().to_string(),
            detail: detail.to_string(),
        };

        let text = std::str::from_utf8(&mmap).map_err(|_| header_err("file is not UTF-8"))?;
        let mut lines = LineSpans::new(text);

        let (_, line1) = lines.next().ok_or_else(|| header_err("empty file"))?;
        if line1 != "interaction,appear#" {
            return Err(header_err("missing `interaction,appear#` header"));
        }
        let (_, line2) = lines.next().ok_or_else(|| header_err("truncated header"))?;
        let (interaction_id, appear_count) = line2
            .split_once(',')
            .ok_or_else(|| header_err("malformed interaction line"))?;
        let appear_count: u64 = appear_count
            .trim()
            .parse()
            .map_err(|_| header_err("malformed appearance count"))?;
        let (_, line3) = lines.next().ok_or_else(|| header_err("truncated header"))?;
        if line3 != "name,profiled_srcblks_exprs" {
            return Err(header_err("missing `name,profiled_srcblks_exprs` header"));
        }
        let interaction_id = interaction_id.to_string();

        let mut spans: Vec<(String, ProfileSpan, Option<(TypeId, AccessNameKind)>)> = Vec::new();
        let mut unresolved = Vec::new();
        for (line_offset, line) in lines {
            if line.is_empty() {
                continue;
            }
            let Some((key, serialized)) = line.split_once(',') else {
                unresolved.push(line.to_string());
                continue;
            };
            let span = ProfileSpan {
                offset: line_offset + key.len() + 1,
                len: serialized.len(),
            };
            let access = split_method_key(key).and_then(|(owner, name, _)| {
                let kind = classify_access_name(name)?;
                let owner = table.resolve_type(owner)?;
                Some((owner, kind))
            });
            spans.push((key.to_string(), span, access));
        }

        let mut profile = Self {
            interaction_id,
            appear_count,
            path: path.to_path_buf(),
            mmap,
            by_method: FxHashMap::default(),
            exact_access: FxHashMap::default(),
            hashed_access: FxHashMap::default(),
            unresolved,
        };

        for (key, span, access) in spans {
            match access {
                Some((owner, AccessNameKind::Exact)) => {
                    let name = split_method_key(&key).unwrap().1.to_string();
                    profile.exact_access.insert((owner, name), span);
                }
                Some((owner, AccessNameKind::Hashed)) => {
                    let name = split_method_key(&key).unwrap().1;
                    let hash = hashed_key_of(name).unwrap().to_string();
                    profile.hashed_access.insert((owner, hash), span);
                }
                None => match table.resolve(&key) {
                    Some(method) => {
                        profile.by_method.insert(method, span);
                    }
                    None => profile.unresolved.push(key),
                },
            }
        }

        debug!(
            interaction = %profile.interaction_id,
            resolved = profile.by_method.len(),
            exact_access = profile.exact_access.len(),
            hashed_access = profile.hashed_access.len(),
            unresolved = profile.unresolved.len(),
            "indexed profile file {}",
            path.display()
        );
        Ok(profile)
    }

    fn span_str(&self, span: ProfileSpan) -> &str {
        // Spans were carved from a validated UTF-8 view of the same map.
        std::str::from_utf8(&self.mmap[span.offset..span.offset + span.len]).unwrap()
    }

    /// Serialized value string recorded for a resolved method, if any.
    pub fn lookup(&self, method: &MethodId) -> Option<&str> {
        self.by_method.get(method).map(|s| self.span_str(*s))
    }

    /// Lookup by content-hashed accessor identity (owner + 8-byte body hash).
    pub fn lookup_hashed_access(&self, owner: &TypeId, body_hash: u64) -> Option<&str> {
        let key = (owner.clone(), format!("{body_hash:016x}"));
        self.hashed_access.get(&key).map(|s| self.span_str(*s))
    }

    /// Lookup by the exact accessor name (`access$<digits>`).
    pub fn lookup_exact_access(&self, owner: &TypeId, name: &str) -> Option<&str> {
        let key = (owner.clone(), name.to_string());
        self.exact_access.get(&key).map(|s| self.span_str(*s))
    }

    pub fn entry_count(&self) -> usize {
        self.by_method.len() + self.exact_access.len() + self.hashed_access.len()
    }
}

/// Iterator over `(offset, line)` pairs of a `\n`-terminated text.
struct LineSpans<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> LineSpans<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }
}

impl<'a> Iterator for LineSpans<'a> {
    type Item = (usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.text.len() {
            return None;
        }
        let start = self.pos;
        let rest = &self.text[start..];
        let (line, advance) = match rest.find('\n') {
            Some(nl) => (&rest[..nl], nl + 1),
            None => (rest, rest.len()),
        };
        self.pos = start + advance;
        Some((start, line.strip_suffix('\r').unwrap_or(line)))
    }
}

/// Load every profile file, in parallel, then order interactions.
///
/// `ordered_interactions` is the preferred id order; listed ids come first
/// in that order, the rest keep the file order. The resulting index defines
/// the interaction index used by every source block in the run.
pub fn load_profiles(
    paths: &[PathBuf],
    table: &dyn MethodTable,
    ordered_interactions: &[String],
) -> Result<Vec<InteractionProfile>> {
    let mut profiles = paths
        .par_iter()
        .map(|path| InteractionProfile::open(path, table))
        .collect::<Result<Vec<_>>>()?;

    let rank = |id: &str| {
        ordered_interactions
            .iter()
            .position(|i| i == id)
            .unwrap_or(usize::MAX)
    };
    profiles.sort_by_key(|p| rank(&p.interaction_id));
    Ok(profiles)
}
