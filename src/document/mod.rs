//! Document seam and frontmatter-based file-type detection.
//!
//! The router only needs a path and the current text of whatever document a
//! session is bound to; rendering and editing live elsewhere.

use std::path::{Path, PathBuf};

/// External collaborator handle to an editor or content provider.
pub trait DocumentSource: Send + Sync {
    fn path(&self) -> &Path;

    /// The document's current text, including unsaved edits.
    fn current_text(&self) -> String;
}

/// A plain (path, text) document, for callers without a live editor.
#[derive(Debug, Clone)]
pub struct StaticDocument {
    path: PathBuf,
    text: String,
}

impl StaticDocument {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

impl DocumentSource for StaticDocument {
    fn path(&self) -> &Path {
        &self.path
    }

    fn current_text(&self) -> String {
        self.text.clone()
    }
}

/// Return the lines of the leading frontmatter block, if any.
///
/// A block starts with a first line consisting solely of `---` and ends at
/// the next line beginning `---`. An unclosed block is no block.
fn frontmatter_lines(content: &str) -> Option<Vec<&str>> {
    let mut lines = content.lines();
    if lines.next()?.trim() != "---" {
        return None;
    }
    let mut block = Vec::new();
    for line in lines {
        if line.starts_with("---") {
            return Some(block);
        }
        block.push(line);
    }
    None
}

/// Extract the verbatim value of the frontmatter `type` key.
///
/// Lines inside the block are read as `key: value`, split on the first `:`
/// with both sides trimmed. The value is not validated against any
/// vocabulary here; unrecognized values simply map to no specialized chain.
pub fn detect_file_type(content: &str) -> Option<String> {
    for line in frontmatter_lines(content)? {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if key.trim() == "type" {
            let value = value.trim();
            if value.is_empty() {
                return None;
            }
            return Some(value.to_string());
        }
    }
    None
}
