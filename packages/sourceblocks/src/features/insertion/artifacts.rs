//! Output artifacts of the insertion pass.
//!
//! Everything written here is deterministic: rows are gathered from the
//! parallel phase into plain vectors, sorted by the method comparator (or
//! lexically for bare keys), and flushed single-threaded.

use crate::errors::Result;
use crate::shared::models::MethodId;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const SOURCE_BLOCKS_FILE: &str = "redex-source-blocks.csv";
pub const IDOM_MAPS_FILE: &str = "redex-source-block-idom-maps.csv";
pub const UNIQUE_IDOM_MAPS_FILE: &str = "unique-idom-maps.txt";
pub const FAILED_METHODS_FILE: &str = "redex-isb-failed-methods.txt";
pub const UNRESOLVED_METHODS_FILE: &str = "redex-isb-unresolved-methods.txt";

/// Collected per-method rows, ready to sort and flush.
#[derive(Debug, Default)]
pub struct PassArtifacts {
    /// Serialized source-block string per method.
    pub serialized: Vec<(MethodId, String)>,
    /// Rendered idom map per method.
    pub idom_maps: Vec<(MethodId, String)>,
    /// Method keys whose profile parse failed.
    pub failed_methods: Vec<String>,
    /// Profile keys with no method in this process.
    pub unresolved_methods: Vec<String>,
}

impl PassArtifacts {
    /// Sort every listing by its deterministic comparator and drop
    /// duplicate keys.
    pub fn finalize(&mut self) {
        self.serialized.sort_by(|a, b| a.0.cmp(&b.0));
        self.idom_maps.sort_by(|a, b| a.0.cmp(&b.0));
        self.failed_methods.sort_unstable();
        self.failed_methods.dedup();
        self.unresolved_methods.sort_unstable();
        self.unresolved_methods.dedup();
    }

    /// Write the five artifact files into `dir`. Call [`finalize`] first;
    /// rows are emitted in stored order.
    ///
    /// [`finalize`]: PassArtifacts::finalize
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        let mut sb = BufWriter::new(File::create(dir.join(SOURCE_BLOCKS_FILE))?);
        write!(sb, "type,version\nredex-source-blocks,1\nname,serialized\n")?;
        for (method, serialized) in &self.serialized {
            writeln!(sb, "{},{}", method.as_str(), serialized)?;
        }
        sb.flush()?;

        // Unique the rendered maps; the per-method file references them by
        // line index.
        let mut unique: Vec<&str> = self.idom_maps.iter().map(|(_, m)| m.as_str()).collect();
        unique.sort_unstable();
        unique.dedup();

        let mut maps = BufWriter::new(File::create(dir.join(IDOM_MAPS_FILE))?);
        write!(maps, "type,version\nredex-source-blocks-idom-maps,1\nidom_map_id\n")?;
        for (_, map) in &self.idom_maps {
            let id = unique.binary_search(&map.as_str()).unwrap();
            writeln!(maps, "{id}")?;
        }
        maps.flush()?;

        let mut uniq = BufWriter::new(File::create(dir.join(UNIQUE_IDOM_MAPS_FILE))?);
        for map in &unique {
            writeln!(uniq, "{map}")?;
        }
        uniq.flush()?;

        let mut failed = BufWriter::new(File::create(dir.join(FAILED_METHODS_FILE))?);
        for key in &self.failed_methods {
            writeln!(failed, "{key}")?;
        }
        failed.flush()?;

        let mut unresolved = BufWriter::new(File::create(dir.join(UNRESOLVED_METHODS_FILE))?);
        for key in &self.unresolved_methods {
            writeln!(unresolved, "{key}")?;
        }
        unresolved.flush()?;
        Ok(())
    }
}
