//! Per-request assembly: fetch the global and page documents, fall back to
//! an error-page document when the page fetch fails, parse both, resolve
//! the layout and render it.

use std::sync::Arc;

use tokio::try_join;
use tracing::debug;

use crate::application::documents;
use crate::application::error::AppError;
use crate::application::urls::DocumentUrls;
use crate::cache::DocumentCache;
use crate::domain::document::DocumentRecord;
use crate::infra::fetch::FetchOutcome;
use crate::infra::templates::LayoutStore;
use crate::presentation::views::{self, LayoutContext};

const SOURCE: &str = "application::site";

/// Name of the site-wide document supplying shared variables and sections.
pub const GLOBAL_DOCUMENT: &str = "__global";

const DEFAULT_LAYOUT: &str = "layout";

/// Status and body of one rendered page. Both are determined by the same
/// fetch sequence, never independently.
#[derive(Debug)]
pub struct RenderedPage {
    pub status: u16,
    pub html: String,
}

pub struct SiteService {
    cache: Arc<DocumentCache>,
    urls: DocumentUrls,
    layouts: LayoutStore,
}

impl SiteService {
    pub fn new(cache: Arc<DocumentCache>, urls: DocumentUrls, layouts: LayoutStore) -> Self {
        Self {
            cache,
            urls,
            layouts,
        }
    }

    pub async fn render(
        &self,
        request_path: &str,
        query_string: &str,
    ) -> Result<RenderedPage, AppError> {
        let (global, page) = self.fetch_documents(request_path).await?;

        // The fallback document supplies content only; the envelope keeps
        // the original failing status.
        let status = page.status;
        let page_body = if page.is_success() {
            page.body
        } else {
            let fallback_url = self.urls.document_url(&status.to_string());
            debug!(target: SOURCE, status, "page fetch failed, fetching fallback document");
            self.cache.get(&fallback_url).await.body
        };

        let global_doc = documents::parse(global.body.as_deref(), |name| self.urls.image_url(name))?;
        let page_doc = documents::parse(page_body.as_deref(), |name| self.urls.image_url(name))?;

        let layout = resolve_layout(&page_doc, &global_doc).to_string();
        debug!(target: SOURCE, layout, status, "rendering layout");
        let source = self.layouts.load(&layout).await?;

        let context = LayoutContext::new(global_doc, page_doc, request_path, query_string);
        let html = views::render_layout(&source, &context, &self.urls)?;

        Ok(RenderedPage { status, html })
    }

    /// Fetch the global and page documents as two joined tasks. The global
    /// fetch never serializes behind the page fetch, and parsing does not
    /// start until both have completed.
    async fn fetch_documents(
        &self,
        request_path: &str,
    ) -> Result<(FetchOutcome, FetchOutcome), AppError> {
        let global_url = self.urls.document_url(GLOBAL_DOCUMENT);
        let page_url = self.urls.document_url(request_path);

        let global_cache = Arc::clone(&self.cache);
        let page_cache = Arc::clone(&self.cache);

        try_join!(
            tokio::spawn(async move { global_cache.get(&global_url).await }),
            tokio::spawn(async move { page_cache.get(&page_url).await }),
        )
        .map_err(|err| AppError::unexpected(format!("document fetch task failed: {err}")))
    }
}

fn resolve_layout<'a>(page: &'a DocumentRecord, global: &'a DocumentRecord) -> &'a str {
    page.layout()
        .or_else(|| global.layout())
        .unwrap_or(DEFAULT_LAYOUT)
}
