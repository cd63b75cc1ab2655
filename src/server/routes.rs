use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::records::encode_snapshot;
use crate::server::client_ip::ClientIp;
use crate::server::dashboard::render_dashboard;
use crate::server::error::ServerResult;
use crate::server::AppState;
use crate::store::RecordStore;
use crate::types::{RecordId, RecordInput, StoreStats, ALL, HITS, PAGE};

/// Path segments starting with this literal are logged as hits.
pub const HIT_PREFIX: &str = "====";

#[derive(Deserialize)]
pub struct ClearParams {
    pub collection: Option<String>,
}

/// Run a store operation off the async runtime and wait for it, persist included.
async fn with_store<T, F>(state: &AppState, op: F) -> ServerResult<T>
where
    F: FnOnce(&RecordStore) -> T + Send + 'static,
    T: Send + 'static,
{
    let store = state.store.clone();
    Ok(tokio::task::spawn_blocking(move || op(&store)).await?)
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn dashboard(State(state): State<AppState>) -> Html<String> {
    Html(render_dashboard(&state.store.list_all()))
}

pub async fn stats(State(state): State<AppState>) -> Json<StoreStats> {
    Json(state.store.stats())
}

pub async fn export(State(state): State<AppState>) -> ServerResult<Response> {
    let body = encode_snapshot(&state.store.snapshot())?;
    Ok(([(CONTENT_TYPE, "application/json; charset=utf-8")], body).into_response())
}

/// `GET /====<value>`: log the rest of the segment, then back to the dashboard.
pub async fn capture_hit(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(segment): Path<String>,
) -> ServerResult<Response> {
    let Some(value) = segment.strip_prefix(HIT_PREFIX).filter(|v| !v.is_empty()) else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    let input = RecordInput::new(ip).with_field("value", value);
    let record = with_store(&state, |store| store.append(HITS, input)).await?;

    tracing::info!(
        id = %record.id,
        client_ip = %record.client_ip,
        value = record.field("value").unwrap_or_default(),
        "Captured hit"
    );
    Ok(Redirect::to("/").into_response())
}

pub async fn capture_page(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Json<Value>> {
    capture(&state, PAGE, ip, &headers, &body).await
}

pub async fn capture_all(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Json<Value>> {
    capture(&state, ALL, ip, &headers, &body).await
}

async fn capture(
    state: &AppState,
    collection: &'static str,
    ip: String,
    headers: &HeaderMap,
    body: &[u8],
) -> ServerResult<Json<Value>> {
    let input = RecordInput::from_payload(ip, &decode_payload(headers, body));
    let record = with_store(state, move |store| store.append(collection, input)).await?;

    tracing::info!(collection, id = %record.id, client_ip = %record.client_ip, "Captured record");
    Ok(Json(json!({ "ok": true })))
}

pub async fn delete_page(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ServerResult<Json<Value>> {
    delete(&state, PAGE, RecordId(id)).await
}

pub async fn delete_all(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ServerResult<Json<Value>> {
    delete(&state, ALL, RecordId(id)).await
}

async fn delete(state: &AppState, collection: &'static str, id: RecordId) -> ServerResult<Json<Value>> {
    let deleted = with_store(state, move |store| store.remove(collection, id)).await?;
    Ok(Json(json!({ "ok": true, "deleted": deleted })))
}

/// `GET /clear`: empty everything and return to the dashboard.
pub async fn clear_redirect(State(state): State<AppState>) -> ServerResult<Redirect> {
    with_store(&state, |store| store.clear(None)).await?;
    Ok(Redirect::to("/"))
}

/// `POST /_clear[?collection=name]`
pub async fn clear_json(
    State(state): State<AppState>,
    Query(params): Query<ClearParams>,
) -> ServerResult<Json<Value>> {
    with_store(&state, move |store| store.clear(params.collection.as_deref())).await?;
    Ok(Json(json!({ "ok": true })))
}

/// Decode a JSON or URL-encoded body into a field map.
///
/// Anything unparseable is treated as an empty payload.
fn decode_payload(headers: &HeaderMap, body: &[u8]) -> Map<String, Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Map::new();
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let looks_like_json = content_type.contains("json")
        || (content_type.is_empty() && body.trim_ascii_start().starts_with(b"{"));

    if looks_like_json {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed JSON body");
                Map::new()
            }
        }
    } else {
        match serde_urlencoded::from_bytes::<Vec<(String, String)>>(body) {
            Ok(pairs) => pairs
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect(),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed form body");
                Map::new()
            }
        }
    }
}
