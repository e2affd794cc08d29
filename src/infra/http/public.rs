use std::error::Error as StdError;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{
        HeaderValue, StatusCode, Uri,
        header::{CACHE_CONTROL, LOCATION},
    },
    response::{Html, IntoResponse, Response},
};
use tracing::error;

use crate::application::{error::AppError, site::SiteService};
use crate::cache::DocumentCache;

const SOURCE: &str = "infra::http::public";
const ROOT_DOCUMENT: &str = "/index";
const ERROR_BODY: &str = "Sorry, but something went wrong";

#[derive(Clone)]
pub struct HttpState {
    site: Arc<SiteService>,
    cache: Arc<DocumentCache>,
    bust_token: String,
    public_cache_control: HeaderValue,
}

impl HttpState {
    pub fn new(site: Arc<SiteService>, cache: Arc<DocumentCache>, bust_token: String) -> Self {
        let max_age = cache.ttl().as_secs();
        let public_cache_control = HeaderValue::from_str(&format!("public, max-age={max_age}"))
            .expect("cache-control header value is valid ASCII");
        Self {
            site,
            cache,
            bust_token,
            public_cache_control,
        }
    }

    fn caching_header(&self, query: &str) -> HeaderValue {
        if query == self.bust_token {
            self.cache.bust();
            HeaderValue::from_static("no-cache")
        } else {
            self.public_cache_control.clone()
        }
    }
}

pub fn build_router(state: HttpState) -> Router {
    Router::new().fallback(serve_page).with_state(state)
}

/// Single failure boundary for the whole render pipeline: whatever goes
/// wrong below, the client sees the same generic 500.
async fn serve_page(State(state): State<HttpState>, uri: Uri) -> Response {
    match handle(&state, &uri).await {
        Ok(response) => response,
        Err(err) => {
            log_failure(&err);
            (StatusCode::INTERNAL_SERVER_ERROR, ERROR_BODY).into_response()
        }
    }
}

async fn handle(state: &HttpState, uri: &Uri) -> Result<Response, AppError> {
    let path = uri.path();
    let query = uri.query().unwrap_or("");

    if path != "/" && path.ends_with('/') {
        return redirect_without_slash(path);
    }

    let request_path = if path == "/" { ROOT_DOCUMENT } else { path };

    let page = state.site.render(request_path, query).await?;
    let status = StatusCode::from_u16(page.status).map_err(|err| {
        AppError::unexpected(format!("invalid response status {}: {err}", page.status))
    })?;

    // Headers are computed after the render: the busting request itself is
    // still served from the pre-bust cache.
    let cache_control = state.caching_header(query);

    let mut response = (status, Html(page.html)).into_response();
    response.headers_mut().insert(CACHE_CONTROL, cache_control);
    Ok(response)
}

fn redirect_without_slash(path: &str) -> Result<Response, AppError> {
    let location = &path[..path.len() - 1];
    let location = HeaderValue::from_str(location).map_err(|err| {
        AppError::unexpected(format!("redirect location is not a valid header value: {err}"))
    })?;

    Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(LOCATION, location)
        .body(Body::empty())
        .map_err(|err| AppError::unexpected(format!("failed to build redirect response: {err}")))
}

fn log_failure(error: &AppError) {
    let mut messages = vec![error.to_string()];
    let mut current = error.source();
    while let Some(inner) = current {
        messages.push(inner.to_string());
        current = inner.source();
    }
    error!(
        target: SOURCE,
        chain = ?messages,
        "request pipeline failed, returning generic error"
    );
}
