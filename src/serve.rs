//! Serve compiled content as JSON.
//!
//! - `GET /content` lists records, filtered by the `type`, `category`, `tags`
//!   (comma separated) and `sort=date` query parameters.
//! - `GET /content/<slug>` returns a single record.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::provider::{ContentFilters, ContentProvider, FsSource, LoadError};

/// List of server errors.
#[derive(Debug, Error)]
pub enum ServeError {
    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

type SharedProvider = Arc<ContentProvider<FsSource>>;

/// Query parameters of a collection request.
#[derive(Debug, Default, Deserialize)]
struct CollectionQuery {
    #[serde(rename = "type")]
    content_type: Option<String>,
    category: Option<String>,
    tags: Option<String>,
    sort: Option<String>,
}

impl From<CollectionQuery> for ContentFilters {
    fn from(query: CollectionQuery) -> Self {
        Self {
            content_type: query.content_type,
            category: query.category,
            tags: query
                .tags
                .iter()
                .flat_map(|tags| tags.split(','))
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_owned)
                .collect(),
            sort_by_date: query.sort.as_deref() == Some("date"),
        }
    }
}

/// Create the router of the content API.
pub fn router(provider: SharedProvider) -> Router {
    Router::new()
        .route("/content", get(collection_handler))
        .route("/content/*slug", get(content_handler))
        .with_state(provider)
}

/// Serve compiled content.
///
/// This function creates a HTTP server on `127.0.0.1:<port>` answering with
/// records loaded from `provider`.
pub async fn serve(provider: SharedProvider, port: u16) -> Result<(), ServeError> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on http://{}", addr);

    Ok(axum::serve(listener, router(provider).into_make_service()).await?)
}

async fn content_handler(
    State(provider): State<SharedProvider>,
    Path(slug): Path<String>,
) -> Response {
    match provider.load_content(slug.trim_matches('/')).await {
        Ok(content) => Json(content.as_ref()).into_response(),
        Err(error) => error_response(error),
    }
}

async fn collection_handler(
    State(provider): State<SharedProvider>,
    Query(query): Query<CollectionQuery>,
) -> Response {
    let filters = ContentFilters::from(query);

    match provider.load_content_collection(&filters).await {
        Ok(contents) => {
            let contents: Vec<_> = contents.iter().map(AsRef::as_ref).collect();
            Json(contents).into_response()
        },
        Err(error) => error_response(error),
    }
}

/// Convert a load error to a JSON response.
fn error_response(error: LoadError) -> Response {
    match error {
        LoadError::NotFound { slug, available } => {
            tracing::debug!("serve: `{}` not found", slug);

            let body = json!({
                "error": format!("content not found: `{}`", slug),
                "available": available,
            });

            (StatusCode::NOT_FOUND, Json(body)).into_response()
        },
        error => {
            let message = format!("{:#}", anyhow::Error::from(error));

            tracing::error!("{}", message);

            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": message }))).into_response()
        },
    }
}
