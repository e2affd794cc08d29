use std::collections::BTreeMap;

use serde::Serialize;

/// Variable key that selects the layout template for a document.
pub const LAYOUT_VAR: &str = "layout";

const NOT_FOUND_TITLE: &str = "404 not found";

/// A parsed remote document: front-matter variables and rendered sections.
///
/// Variables and sections are distinct namespaces; both are keyed by
/// caller-defined strings. The record is transient and owned by whoever
/// asked for the parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentRecord {
    pub vars: BTreeMap<String, String>,
    pub sections: BTreeMap<String, String>,
}

impl DocumentRecord {
    /// The canonical not-found document, used when no raw document could be
    /// located (including after error-page fallback).
    pub fn not_found() -> Self {
        let mut vars = BTreeMap::new();
        vars.insert("title".to_string(), NOT_FOUND_TITLE.to_string());
        Self {
            vars,
            sections: BTreeMap::new(),
        }
    }

    pub fn layout(&self) -> Option<&str> {
        self.vars.get(LAYOUT_VAR).map(String::as_str)
    }
}
