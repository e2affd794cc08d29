//! End-to-end tests for the request pipeline: path normalization, caching
//! headers, fallback content and the failure boundary, driven through the
//! axum router.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{
        Request, Response, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION},
    },
};
use foglio::{
    application::{site::SiteService, urls::DocumentUrls},
    cache::DocumentCache,
    config::RemoteSettings,
    infra::{
        fetch::{DocumentFetcher, FetchOutcome},
        http::{HttpState, build_router},
        templates::LayoutStore,
    },
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

const BASE_URL: &str = "http://content.test/site";

struct MapFetcher {
    responses: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl MapFetcher {
    fn new(responses: &[(&str, &str)]) -> Self {
        Self {
            responses: responses
                .iter()
                .map(|(name, body)| (format!("{BASE_URL}/{name}.md"), body.to_string()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls_for(&self, name: &str) -> usize {
        let url = format!("{BASE_URL}/{name}.md");
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|called| **called == url)
            .count()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }
}

#[async_trait]
impl DocumentFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        self.calls.lock().expect("calls lock").push(url.to_string());
        match self.responses.get(url) {
            Some(body) => FetchOutcome::success(body.clone()),
            None => FetchOutcome::failure(404),
        }
    }
}

struct TestSite {
    router: Router,
    fetcher: Arc<MapFetcher>,
    _templates: TempDir,
}

fn test_site(responses: &[(&str, &str)], layouts: &[(&str, &str)]) -> TestSite {
    let templates = tempfile::tempdir().expect("temp dir");
    for (name, source) in layouts {
        std::fs::write(templates.path().join(format!("{name}.html")), source)
            .expect("write layout");
    }

    let fetcher = Arc::new(MapFetcher::new(responses));
    let cache = Arc::new(DocumentCache::new(fetcher.clone(), Duration::from_secs(60)));
    let urls = DocumentUrls::from_settings(&RemoteSettings {
        base_url: BASE_URL.to_string(),
        file_extension: "md".to_string(),
        url_postfix: String::new(),
        image_path: format!("{BASE_URL}/images"),
        fetch_timeout: Duration::from_secs(10),
    });
    let layouts = LayoutStore::new(templates.path().to_path_buf(), "html".to_string());
    let site = Arc::new(SiteService::new(Arc::clone(&cache), urls, layouts));
    let state = HttpState::new(site, cache, "bust".to_string());

    TestSite {
        router: build_router(state),
        fetcher,
        _templates: templates,
    }
}

async fn get(router: &Router, uri: &str) -> Response<Body> {
    router
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response")
}

async fn body_string(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

fn header<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
}

#[tokio::test]
async fn trailing_slash_redirects_without_fetching() {
    let site = test_site(&[], &[]);

    let response = get(&site.router, "/foo/bar/").await;

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        response.headers().get(LOCATION).map(|v| v.to_str().unwrap()),
        Some("/foo/bar")
    );
    assert_eq!(site.fetcher.total_calls(), 0);
    assert_eq!(body_string(response).await, "");
}

#[tokio::test]
async fn root_path_is_served_as_the_index_document() {
    let site = test_site(
        &[
            ("__global", "site_name: Foglio\n"),
            ("index", "title: Home\n++++body++++\n# header\n"),
        ],
        &[("layout", "{{ page.sections.body | safe }}")],
    );

    let response = get(&site.router, "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(header(&response, CONTENT_TYPE.as_str())
        .expect("content type")
        .starts_with("text/html"));
    assert_eq!(
        header(&response, CACHE_CONTROL.as_str()),
        Some("public, max-age=60")
    );
    assert_eq!(site.fetcher.calls_for("index"), 1);
    assert_eq!(site.fetcher.calls_for("__global"), 1);
    assert!(body_string(response).await.contains("<h1>header</h1>"));
}

#[tokio::test]
async fn documents_are_cached_between_requests() {
    let site = test_site(
        &[("__global", ""), ("index", "++++body++++\nhello\n")],
        &[("layout", "{{ page.sections.body | safe }}")],
    );

    get(&site.router, "/").await;
    get(&site.router, "/").await;

    assert_eq!(site.fetcher.calls_for("index"), 1);
    assert_eq!(site.fetcher.calls_for("__global"), 1);
}

#[tokio::test]
async fn bust_token_busts_the_cache_and_disables_caching() {
    let site = test_site(
        &[("__global", ""), ("index", "++++body++++\nhello\n")],
        &[("layout", "{{ page.sections.body | safe }}")],
    );

    get(&site.router, "/").await;

    // The busting request is still served from the pre-bust cache.
    let response = get(&site.router, "/?bust").await;
    assert_eq!(header(&response, CACHE_CONTROL.as_str()), Some("no-cache"));
    assert_eq!(site.fetcher.calls_for("index"), 1);

    // The store was reset, so the next request refetches.
    get(&site.router, "/").await;
    assert_eq!(site.fetcher.calls_for("index"), 2);
}

#[tokio::test]
async fn other_query_strings_leave_the_cache_alone() {
    let site = test_site(
        &[("__global", ""), ("index", "++++body++++\nhello\n")],
        &[("layout", "{{ page.sections.body | safe }}")],
    );

    get(&site.router, "/").await;
    let response = get(&site.router, "/?whatever").await;

    assert_eq!(
        header(&response, CACHE_CONTROL.as_str()),
        Some("public, max-age=60")
    );
    assert_eq!(site.fetcher.calls_for("index"), 1);
}

#[tokio::test]
async fn missing_page_keeps_its_status_and_serves_the_fallback_document() {
    let site = test_site(
        &[
            ("__global", ""),
            ("404", "++++body++++\nnothing to see here\n"),
        ],
        &[("layout", "{{ page.sections.body | safe }}")],
    );

    let response = get(&site.router, "/missing").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(site.fetcher.calls_for("404"), 1);
    assert!(body_string(response).await.contains("nothing to see here"));
}

#[tokio::test]
async fn pipeline_failures_become_the_generic_500() {
    // No layout template on disk: the render fails after the fetches.
    let site = test_site(&[("__global", ""), ("index", "title: Home\n")], &[]);

    let response = get(&site.router, "/").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(header(&response, CACHE_CONTROL.as_str()).is_none());
    assert_eq!(body_string(response).await, "Sorry, but something went wrong");
}

#[tokio::test]
async fn malformed_front_matter_is_a_500_not_a_partial_page() {
    let site = test_site(
        &[("__global", ""), ("index", "{ not yaml\n")],
        &[("layout", "ok")],
    );

    let response = get(&site.router, "/").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_string(response).await, "Sorry, but something went wrong");
}
