//! Request Router
//!
//! Binds the contact operations to axum routes. Handlers return
//! [`ContactResult`], and a failed one is rendered through
//! `ContactError`'s `IntoResponse`: the client gets the public message and
//! the log gets the detail.
//!
//! ## Routes
//!
//! | Method | Path        | Success                         |
//! |--------|-------------|---------------------------------|
//! | GET    | `/ping`     | 200 `pong` (never touches pool) |
//! | GET    | `/contacts` | 200 JSON array of contacts      |
//! | POST   | `/contacts` | 201 JSON contact                |
//!
//! Any other path is a 404 and any other method on a known path is a 405,
//! both with a JSON `{"error": ...}` body.

use crate::body::{read_body, DEFAULT_MAX_BODY_BYTES};
use crate::contacts::{ContactRecord, ContactRepository, CreateContactBody};
use crate::error::{ContactError, ContactResult};
use crate::pool::Connector;
use crate::query::QuerySpec;
use crate::store::Session;
use axum::body::Body;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Shared state handed to every handler.
pub struct AppState<C: Connector> {
    repo: ContactRepository<C>,
    max_body_bytes: usize,
}

impl<C: Connector> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

impl<C: Connector> AppState<C> {
    pub fn new(repo: ContactRepository<C>) -> Self {
        Self {
            repo,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Caps the size of an accepted request body.
    pub fn max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    pub fn repository(&self) -> &ContactRepository<C> {
        &self.repo
    }
}

/// Builds the service's routes over `state`.
pub fn router<C>(state: AppState<C>) -> Router
where
    C: Connector,
    C::Connection: Session,
{
    Router::new()
        .route("/ping", get(ping).fallback(method_not_allowed))
        .route(
            "/contacts",
            get(list_contacts::<C>)
                .post(create_contact::<C>)
                .fallback(method_not_allowed),
        )
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ping() -> &'static str {
    "pong"
}

async fn list_contacts<C>(
    State(state): State<AppState<C>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> ContactResult<Json<Vec<ContactRecord>>>
where
    C: Connector,
    C::Connection: Session,
{
    let Query(pairs) = query.map_err(|rejection| {
        debug!(error = %rejection, "query string rejected");
        ContactError::validation("malformed query string")
    })?;
    let spec = QuerySpec::from_params(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
    let contacts = state.repo.list_contacts(&spec).await?;
    Ok(Json(contacts))
}

async fn create_contact<C>(
    State(state): State<AppState<C>>,
    headers: HeaderMap,
    body: Body,
) -> ContactResult<(StatusCode, Json<ContactRecord>)>
where
    C: Connector,
    C::Connection: Session,
{
    let bytes = read_body(body, content_length(&headers)?, state.max_body_bytes).await?;
    let (external_id, phone_number) = CreateContactBody::from_json(&bytes)?;
    let contact = state.repo.create_contact(external_id, &phone_number).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

fn content_length(headers: &HeaderMap) -> ContactResult<Option<usize>> {
    let Some(value) = headers.get(header::CONTENT_LENGTH) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|text| text.trim().parse::<usize>().ok())
        .map(Some)
        .ok_or_else(|| ContactError::validation("invalid content-length"))
}

async fn method_not_allowed(method: Method, uri: Uri) -> Response {
    debug!(method = %method, path = %uri.path(), "method not allowed");
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "method not allowed" })),
    )
        .into_response()
}

async fn not_found(method: Method, uri: Uri) -> Response {
    debug!(method = %method, path = %uri.path(), "no route");
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
}
