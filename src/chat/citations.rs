use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A web source backing part of a reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub uri: String,
}

impl Citation {
    pub fn new(title: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            uri: uri.into(),
        }
    }
}

/// Citations in first-seen order, one per uri
#[derive(Debug, Clone, Default)]
pub struct CitationSet {
    seen: HashSet<String>,
    items: Vec<Citation>,
}

impl CitationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a citation; returns false if its uri is already present
    pub fn insert(&mut self, citation: Citation) -> bool {
        if !self.seen.insert(citation.uri.clone()) {
            return false;
        }
        self.items.push(citation);
        true
    }

    pub fn extend(&mut self, citations: impl IntoIterator<Item = Citation>) {
        for citation in citations {
            self.insert(citation);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Citation> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Citation> {
        self.items
    }
}
