//! Class label tables.
//!
//! A label file is UTF-8 text with one label per line; line `N` (0-indexed)
//! names output class `N`. Blank lines at the end of the file are dropped,
//! blank lines in the middle are kept so indices stay aligned.

use std::path::Path;

use crate::CodecError;

/// Ordered class-index-to-name mapping for a classification model.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses label file contents.
    pub fn parse(content: &str) -> Self {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let mut labels: Vec<String> = content.lines().map(str::to_string).collect();
        while labels.last().is_some_and(|l| l.trim().is_empty()) {
            labels.pop();
        }
        Self { labels }
    }

    /// Reads and parses a label file.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::LabelFile`] if the file cannot be read or is not
    /// valid UTF-8.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CodecError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CodecError::LabelFile {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::parse(&content);
        tracing::debug!(path = %path.display(), labels = table.len(), "loaded label table");
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }
}

impl From<Vec<String>> for LabelTable {
    fn from(labels: Vec<String>) -> Self {
        Self { labels }
    }
}
