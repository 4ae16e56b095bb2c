//! Heading-structure statistics for converted Markdown.
//!
//! The counts are literal substring counts of a newline followed by one to
//! three `#` and a space. A heading at the very start of the text has no
//! preceding newline, so a leading `"# "` adds one level-1 heading. Headings
//! not at a line start after a bare `\n` (e.g. after `\r\n` or indentation)
//! are not counted.

use serde::Serialize;

/// Counts of level-1, level-2 and level-3 headings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StructureStats {
    pub h1_count: usize,
    pub h2_count: usize,
    pub h3_count: usize,
}

impl StructureStats {
    /// Count headings in `markdown`.
    pub fn from_markdown(markdown: &str) -> Self {
        let leading_h1 = usize::from(markdown.starts_with("# "));
        Self {
            h1_count: markdown.matches("\n# ").count() + leading_h1,
            h2_count: markdown.matches("\n## ").count(),
            h3_count: markdown.matches("\n### ").count(),
        }
    }

    pub fn total(&self) -> usize {
        self.h1_count + self.h2_count + self.h3_count
    }

    /// `true` when at least one heading was counted.
    pub fn has_structure(&self) -> bool {
        self.total() > 0
    }
}
