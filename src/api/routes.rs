//! Route handlers: event entry recording, counting, export, and the
//! customer privacy proxy.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiError;
use crate::export;
use crate::store::entries::EntryRecord;
use crate::SharedState;

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/api/entry", post(entry_create))
        .route("/api/entry/count", get(entry_count))
        .route("/api/lucky/download", get(entries_download))
        .route("/api/v2/admin/customersprivacy", get(customer_lookup))
        .with_state(state)
}

async fn status(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "mall": state.config.mall_id,
        "tokenPhase": state.cafe24.credentials().phase().await,
    }))
}

#[derive(Debug, Deserialize)]
struct EntryBody {
    #[serde(rename = "memberId")]
    member_id: Option<String>,
    cellphone: Option<String>,
}

/// POST /api/entry: record a one-time entry for a member.
///
/// The duplicate check runs before the customer lookup; a repeat submission
/// must not spend a platform call.
async fn entry_create(
    State(state): State<SharedState>,
    Json(body): Json<EntryBody>,
) -> Result<Json<Value>, ApiError> {
    let member_id = body
        .member_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("memberId is required".into()))?
        .to_string();

    if state.entries.exists(&member_id).await? {
        return Err(ApiError::Conflict("Member has already entered".into()));
    }

    let payload = state.cafe24.customers_privacy(&member_id).await?;
    let customer = payload
        .get("customersprivacy")
        .and_then(|list| list.get(0))
        .cloned()
        .unwrap_or_else(|| json!({}));

    let entry = EntryRecord::enriched(&member_id, body.cellphone.as_deref(), &customer);
    let inserted_id = state.entries.insert(&entry).await?;
    info!("Entry recorded for member {member_id}");

    let entry_json = entry.response_json()?;
    Ok(Json(json!({
        "message": "Entry recorded",
        "entry": entry_json,
        "insertedId": inserted_id,
    })))
}

/// GET /api/entry/count: total recorded entries.
async fn entry_count(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let count = state.entries.count().await?;
    Ok(Json(json!({ "count": count })))
}

/// GET /api/lucky/download: every entry as an XLSX attachment.
async fn entries_download(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state.entries.all().await?;
    let bytes = export::entries_workbook(&entries)?;
    info!("Exported {} entries", entries.len());

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=entries.xlsx",
            ),
        ],
        bytes,
    ))
}

#[derive(Debug, Deserialize)]
struct CustomerQuery {
    member_id: Option<String>,
}

/// GET /api/v2/admin/customersprivacy: authenticated proxy for the
/// platform's customer lookup, same path as the upstream API.
async fn customer_lookup(
    State(state): State<SharedState>,
    Query(query): Query<CustomerQuery>,
) -> Result<Json<Value>, ApiError> {
    let member_id = query
        .member_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("member_id query parameter is required".into()))?;

    let payload = state.cafe24.customers_privacy(member_id).await?;
    Ok(Json(payload))
}
