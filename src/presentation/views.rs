//! Per-request template context and layout rendering.

use std::collections::HashMap;

use serde::Serialize;
use tera::{Context, Tera, Value};

use crate::application::urls::DocumentUrls;
use crate::domain::document::DocumentRecord;

const LAYOUT_TEMPLATE: &str = "layout";

/// Read-only view handed to the template engine. Templates see exactly
/// these fields plus the registered URL helper functions, nothing else.
#[derive(Debug, Serialize)]
pub struct LayoutContext {
    pub global: DocumentRecord,
    pub page: DocumentRecord,
    pub request_path: String,
    pub query_string: String,
}

impl LayoutContext {
    pub fn new(
        global: DocumentRecord,
        page: DocumentRecord,
        request_path: &str,
        query_string: &str,
    ) -> Self {
        Self {
            global,
            page,
            request_path: request_path.to_string(),
            query_string: query_string.to_string(),
        }
    }
}

/// Render a layout template source against the per-request context.
///
/// `document_url(name=...)` and `image_url(name=...)` are exposed to the
/// template as functions so layouts can link to sibling documents and
/// images without knowing the remote host.
pub fn render_layout(
    source: &str,
    context: &LayoutContext,
    urls: &DocumentUrls,
) -> Result<String, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_template(LAYOUT_TEMPLATE, source)?;

    let document_urls = urls.clone();
    tera.register_function(
        "document_url",
        move |args: &HashMap<String, Value>| -> tera::Result<Value> {
            let name = string_arg(args, "name", "document_url")?;
            Ok(Value::String(document_urls.document_url(name)))
        },
    );

    let image_urls = urls.clone();
    tera.register_function(
        "image_url",
        move |args: &HashMap<String, Value>| -> tera::Result<Value> {
            let name = string_arg(args, "name", "image_url")?;
            Ok(Value::String(image_urls.image_url(name)))
        },
    );

    let context = Context::from_serialize(context)?;
    tera.render(LAYOUT_TEMPLATE, &context)
}

fn string_arg<'a>(
    args: &'a HashMap<String, Value>,
    key: &str,
    function: &str,
) -> tera::Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| tera::Error::msg(format!("`{function}` requires a string `{key}` argument")))
}
