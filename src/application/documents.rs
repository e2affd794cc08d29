//! Structured-document parser.
//!
//! A raw document is a YAML front-matter block followed by any number of
//! named sections, each fenced by a line of the form `++++name++++`:
//!
//! ```text
//! title: Home
//! ++++navigation++++
//! * [one](eins)
//! ++++body++++
//! # header
//! ```
//!
//! Front matter decodes to flat string variables; each section body is
//! image-rewritten and rendered to HTML.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

use crate::application::markup;
use crate::domain::document::DocumentRecord;

/// Inline image references eligible for rewriting. The character class is
/// the whole contract: references containing `/` (absolute paths) or `:`
/// (URL schemes) never match, so the resolver is not consulted for them.
static IMAGE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!([\w\-.]+)!").expect("image reference pattern is valid"));

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed front matter: {0}")]
    FrontMatter(#[from] serde_yaml::Error),
    #[error("front matter value for `{key}` is not a scalar")]
    UnsupportedValue { key: String },
}

/// Parse a raw document into variables and rendered sections.
///
/// `raw` being absent means no document could be located at all (including
/// after error-page fallback); the canonical not-found record is returned
/// in that case. `resolve_image` maps a relative image reference to the
/// URL it should be served from.
pub fn parse<F>(raw: Option<&str>, resolve_image: F) -> Result<DocumentRecord, ParseError>
where
    F: Fn(&str) -> String,
{
    let Some(raw) = raw else {
        return Ok(DocumentRecord::not_found());
    };

    let (front_matter, section_blocks) = split_fences(raw);
    let vars = parse_front_matter(&front_matter)?;

    let mut sections = BTreeMap::new();
    for (name, body) in section_blocks {
        let rewritten = rewrite_images(&body, &resolve_image);
        sections.insert(name, markup::to_html(&rewritten));
    }

    Ok(DocumentRecord { vars, sections })
}

/// Rewrite every eligible `!reference!` token through the resolver.
fn rewrite_images<F>(section: &str, resolve_image: &F) -> String
where
    F: Fn(&str) -> String,
{
    IMAGE_REF
        .replace_all(section, |caps: &Captures| {
            format!("!{}!", resolve_image(&caps[1]))
        })
        .into_owned()
}

fn split_fences(raw: &str) -> (String, Vec<(String, String)>) {
    let mut front_matter = String::new();
    let mut sections = Vec::new();
    let mut current: Option<(String, String)> = None;

    for line in raw.lines() {
        if let Some(name) = fence_name(line) {
            if let Some(finished) = current.take() {
                sections.push(finished);
            }
            current = Some((name.to_string(), String::new()));
            continue;
        }

        match current.as_mut() {
            Some((_, body)) => {
                body.push_str(line);
                body.push('\n');
            }
            None => {
                front_matter.push_str(line);
                front_matter.push('\n');
            }
        }
    }

    if let Some(finished) = current.take() {
        sections.push(finished);
    }

    (front_matter, sections)
}

fn fence_name(line: &str) -> Option<&str> {
    let line = line.trim_end();
    if line.len() > 8 && line.starts_with("++++") && line.ends_with("++++") {
        Some(&line[4..line.len() - 4])
    } else {
        None
    }
}

fn parse_front_matter(block: &str) -> Result<BTreeMap<String, String>, ParseError> {
    if block.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let mapping: Option<BTreeMap<String, serde_yaml::Value>> = serde_yaml::from_str(block)?;

    mapping
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| {
            let scalar = scalar_to_string(value)
                .ok_or_else(|| ParseError::UnsupportedValue { key: key.clone() })?;
            Ok((key, scalar))
        })
        .collect()
}

fn scalar_to_string(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(value) => Some(value),
        serde_yaml::Value::Number(value) => Some(value.to_string()),
        serde_yaml::Value::Bool(value) => Some(value.to_string()),
        serde_yaml::Value::Null => Some(String::new()),
        _ => None,
    }
}
