//! Markup-to-HTML transform for document sections.
//!
//! Sections are Markdown rendered with Comrak. On top of plain Markdown the
//! transform accepts the inline image shorthand `!url!`, which is expanded
//! to an `<img>` tag before the Markdown pass; raw HTML is enabled so the
//! expansion survives rendering.

use comrak::{Options, markdown_to_html};
use once_cell::sync::Lazy;
use regex::Regex;

static IMAGE_SHORTHAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!([^\s!]+)!").expect("image shorthand pattern is valid"));

static OPTIONS: Lazy<Options<'static>> = Lazy::new(|| {
    let mut options = Options::default();
    options.render.r#unsafe = true;
    options
});

/// Render one section body to HTML.
pub fn to_html(section: &str) -> String {
    let expanded = IMAGE_SHORTHAND.replace_all(section, r#"<img src="$1" alt="" />"#);
    markdown_to_html(&expanded, &OPTIONS)
}
