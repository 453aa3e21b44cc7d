//! # Label Resolution
//! Labels come from an optional text file and are repaired to match the
//! model's class count: missing labels are synthesized, extra ones dropped.

use std::borrow::Cow;
use std::path::Path;

/// Name used for a class without an external label.
pub fn synthesized_label(index: usize) -> String {
    format!("class_{index}")
}

/// Parse a labels file: one label per line, trimmed, blank lines ignored.
pub fn parse_labels(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Read a label source from disk.
///
/// A missing file is normal and yields `None`; unreadable files are logged and
/// also yield `None`.
pub fn load_label_source(path: &Path) -> Option<Vec<String>> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No labels file, labels will be synthesized");
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(text) => Some(parse_labels(&text)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read labels file");
            None
        }
    }
}

/// Labels aligned index-by-index with the model's classes
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    /// Reconcile a label source with the required class count.
    pub fn resolve(source: Option<&[String]>, class_count: usize) -> Self {
        let Some(source) = source else {
            return Self::synthesized(class_count);
        };

        if source.len() != class_count {
            tracing::warn!(
                labels = source.len(),
                classes = class_count,
                "Label count does not match class count, repairing"
            );
        }

        let mut labels: Vec<String> = source.iter().take(class_count).cloned().collect();
        labels.extend((labels.len()..class_count).map(synthesized_label));
        Self { labels }
    }

    pub fn synthesized(class_count: usize) -> Self {
        Self {
            labels: (0..class_count).map(synthesized_label).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label at `index`, synthesized when the set is shorter than the index.
    pub fn label(&self, index: usize) -> Cow<'_, str> {
        match self.labels.get(index) {
            Some(label) => Cow::Borrowed(label.as_str()),
            None => Cow::Owned(synthesized_label(index)),
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }
}
