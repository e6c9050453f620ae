//! Process-wide execution context
//!
//! Read-only state shared by every resolution step. Threaded through as an
//! explicit parameter rather than captured globally, so resolution stays
//! pure and testable in isolation.

use std::path::{Path, PathBuf};

/// Execution context for configuration resolution
#[derive(Debug, Clone)]
pub struct MetaConfig {
    /// Root directory all relative config paths are anchored at
    pub project_root: PathBuf,
    /// Verbose construction output
    pub verbose: bool,
}

impl MetaConfig {
    /// Create a context
    pub fn new(project_root: impl Into<PathBuf>, verbose: bool) -> Self {
        Self {
            project_root: project_root.into(),
            verbose,
        }
    }

    /// Anchor a config-declared path at the project root.
    ///
    /// Absolute paths pass through unchanged.
    #[must_use]
    pub fn resolve_path(&self, declared: &str) -> PathBuf {
        let p = Path::new(declared);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.project_root.join(p)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path_anchors_at_root() {
        let meta = MetaConfig::new("/work/project", false);
        assert_eq!(
            meta.resolve_path("data/eval.tsv"),
            PathBuf::from("/work/project/data/eval.tsv")
        );
    }

    #[test]
    fn test_absolute_path_passes_through() {
        let meta = MetaConfig::new("/work/project", false);
        assert_eq!(meta.resolve_path("/abs/eval.tsv"), PathBuf::from("/abs/eval.tsv"));
    }
}
