use std::{process, sync::Arc};

use foglio::{
    application::{error::AppError, site::SiteService, urls::DocumentUrls},
    cache::DocumentCache,
    config,
    infra::{
        error::InfraError,
        fetch::HttpDocumentFetcher,
        http::{self, HttpState},
        telemetry,
        templates::LayoutStore,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (_cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let fetcher = Arc::new(HttpDocumentFetcher::new(settings.remote.fetch_timeout)?);
    let cache = Arc::new(DocumentCache::new(fetcher, settings.cache.ttl));
    let urls = DocumentUrls::from_settings(&settings.remote);
    let layouts = LayoutStore::new(
        settings.templates.directory.clone(),
        settings.templates.extension.clone(),
    );
    let site = Arc::new(SiteService::new(Arc::clone(&cache), urls, layouts));
    let state = HttpState::new(site, cache, settings.cache.bust_token.clone());

    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        addr = %settings.server.addr,
        base_url = %settings.remote.base_url,
        "serving site"
    );

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
