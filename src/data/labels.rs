use std::collections::HashSet;

use crate::error::{LoadError, SelectionError};

// ---------------------------------------------------------------------------
// LabelMapping – internal identifier ↔ human-readable label
// ---------------------------------------------------------------------------

/// Ordered bijection between column identifiers and display labels.
///
/// Labels are made unique at construction time: a label already taken by an
/// earlier column is suffixed with the column identifier (`"Edad [q7]"`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMapping {
    entries: Vec<(String, String)>,
}

impl LabelMapping {
    /// Identity mapping, used for sources without label metadata.
    pub fn identity(identifiers: &[String]) -> Result<Self, LoadError> {
        Self::build(identifiers.iter().map(|id| (id.clone(), id.clone())))
    }

    /// Zip parallel identifier / label sequences positionally.
    ///
    /// A missing or blank label falls back to the identifier.
    pub fn from_parallel(
        identifiers: Vec<String>,
        labels: Vec<Option<String>>,
    ) -> Result<Self, LoadError> {
        if identifiers.len() != labels.len() {
            return Err(LoadError::MetadataMismatch {
                names: identifiers.len(),
                labels: labels.len(),
            });
        }
        Self::build(identifiers.into_iter().zip(labels).map(|(id, label)| {
            let label = label
                .map(|l| normalize_label(&l))
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| id.clone());
            (id, label)
        }))
    }

    fn build(pairs: impl Iterator<Item = (String, String)>) -> Result<Self, LoadError> {
        let mut taken: HashSet<String> = HashSet::new();
        let mut entries = Vec::new();
        for (id, label) in pairs {
            let label = if taken.contains(&label) {
                let suffixed = format!("{label} [{id}]");
                if taken.contains(&suffixed) {
                    return Err(LoadError::DuplicateLabel(label));
                }
                log::debug!("label \"{label}\" already used, showing {id} as \"{suffixed}\"");
                suffixed
            } else {
                label
            };
            taken.insert(label.clone());
            entries.push((id, label));
        }
        Ok(LabelMapping { entries })
    }

    pub fn label_for(&self, identifier: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(id, _)| id == identifier)
            .map(|(_, label)| label.as_str())
    }

    pub fn identifier_for(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, l)| l == label)
            .map(|(id, _)| id.as_str())
    }

    pub fn is_label(&self, text: &str) -> bool {
        self.entries.iter().any(|(_, l)| l == text)
    }

    /// Display labels in column order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, l)| l.as_str())
    }

    /// `(identifier, label)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(id, l)| (id.as_str(), l.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Translate chosen display labels into column identifiers.
    ///
    /// Identifiers come back in column order whatever order the labels were
    /// picked in. Labels with no match are dropped without complaint; the
    /// two-variable minimum is checked on what actually resolved.
    pub fn resolve<S: AsRef<str>>(&self, selected: &[S]) -> Result<Vec<String>, SelectionError> {
        let mut picked: HashSet<&str> = HashSet::with_capacity(selected.len());
        for label in selected {
            if self.is_label(label.as_ref()) {
                picked.insert(label.as_ref());
            } else {
                log::debug!("ignoring unknown label \"{}\"", label.as_ref());
            }
        }
        let resolved: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, l)| picked.contains(l.as_str()))
            .map(|(id, _)| id.clone())
            .collect();
        if resolved.len() < 2 {
            return Err(SelectionError::InsufficientVariables {
                resolved: resolved.len(),
            });
        }
        Ok(resolved)
    }
}

/// Collapse tabs and line breaks so a label always fits on one line.
pub fn normalize_label(raw: &str) -> String {
    raw.split(['\t', '\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
