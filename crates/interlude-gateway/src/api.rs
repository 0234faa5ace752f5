//! HTTP handlers
//!
//! Blocking endpoints fold the run into one JSON summary. Streaming
//! endpoints relay the event stream as NDJSON, or as SSE with `format=sse`.

use crate::server::SharedState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use interlude_agent::{EventStream, RunReport, RunStatus};
use interlude_core::{Error, Event, ThreadId};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::convert::Infallible;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StreamFormat {
    #[default]
    Ndjson,
    Sse,
}

#[derive(Debug, Deserialize)]
pub struct ChatParams {
    pub message: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub format: StreamFormat,
}

#[derive(Debug, Default, Deserialize)]
pub struct RespondParams {
    #[serde(default)]
    pub thread_id: Option<String>,
    pub correct: Option<String>,
    pub name: Option<String>,
    pub birthday: Option<String>,
    pub data: Option<String>,
    /// The human's free-text reply. Stands in for `data` when that is absent.
    pub response: Option<String>,
    #[serde(default)]
    pub format: StreamFormat,
}

impl RespondParams {
    /// Resume payload built from the supplied fields. `response` is sent as
    /// `data` unless `data` is given; `{"correct": "y"}` when nothing is set.
    pub fn payload(&self) -> Value {
        let mut payload = Map::new();
        let data = self.data.as_ref().or(self.response.as_ref());
        for (key, value) in [
            ("correct", self.correct.as_ref()),
            ("name", self.name.as_ref()),
            ("birthday", self.birthday.as_ref()),
            ("data", data),
        ] {
            if let Some(v) = value {
                payload.insert(key.to_string(), Value::String(v.clone()));
            }
        }
        if payload.is_empty() {
            payload.insert("correct".into(), Value::String("y".into()));
        }
        Value::Object(payload)
    }
}

fn thread_id_or_default(id: Option<String>) -> ThreadId {
    match id {
        Some(id) if !id.trim().is_empty() => ThreadId::new(id),
        _ => ThreadId::default(),
    }
}

/// Error response body: `{error, code}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: String,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_request".into(),
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "not_found".into(),
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::ThreadBusy(_) | Error::ThreadSuspended(_) | Error::NoPendingInterrupt(_) => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "error": self.message, "code": self.code })),
        )
            .into_response()
    }
}

fn stream_response(stream: EventStream, format: StreamFormat) -> Response {
    let (content_type, frame): (&str, fn(&Event) -> String) = match format {
        StreamFormat::Ndjson => ("application/x-ndjson", Event::to_ndjson),
        StreamFormat::Sse => ("text/event-stream", Event::to_sse),
    };
    let body = Body::from_stream(stream.map(move |event| Ok::<_, Infallible>(frame(&event))));
    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

/// Blocking summary of a finished run.
pub fn summarize(thread_id: &ThreadId, report: &RunReport) -> (StatusCode, Value) {
    match report.status {
        RunStatus::Completed => (
            StatusCode::OK,
            json!({
                "response": report.response,
                "thread_id": thread_id.as_str(),
                "status": "completed",
            }),
        ),
        RunStatus::InterventionRequired => {
            let payload = report.interrupt.clone().unwrap_or(Value::Null);
            let mut body = Map::new();
            if let Some(fields) = payload.as_object() {
                body.extend(fields.clone());
            }
            body.insert("intervention_required".into(), Value::Bool(true));
            body.insert("thread_id".into(), thread_id.as_str().into());
            body.insert("status".into(), "intervention_required".into());
            body.insert("payload".into(), payload);
            (StatusCode::OK, Value::Object(body))
        }
        RunStatus::Failed | RunStatus::Incomplete => {
            let (code, message) = report
                .error
                .clone()
                .unwrap_or_else(|| ("internal".into(), "run ended unexpectedly".into()));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": message,
                    "code": code,
                    "thread_id": thread_id.as_str(),
                    "status": "error",
                }),
            )
        }
    }
}

pub async fn health(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let executor = &state.executor;
    let threads = executor.store().list().await?.len();
    Ok(Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "provider": executor.provider_name(),
        "threads": threads,
        "tools": executor.tools().list(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    })))
}

pub async fn chat(
    State(state): State<SharedState>,
    Json(params): Json<ChatParams>,
) -> Result<impl IntoResponse, ApiError> {
    if params.message.trim().is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }
    let thread_id = thread_id_or_default(params.thread_id);
    let stream = state
        .executor
        .submit(thread_id.clone(), params.message)
        .await?;
    let report = RunReport::collect(stream).await;
    let (status, body) = summarize(&thread_id, &report);
    Ok((status, Json(body)))
}

pub async fn chat_stream(
    State(state): State<SharedState>,
    Query(params): Query<ChatParams>,
) -> Result<Response, ApiError> {
    if params.message.trim().is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }
    let thread_id = thread_id_or_default(params.thread_id);
    let stream = state.executor.submit(thread_id, params.message).await?;
    Ok(stream_response(stream, params.format))
}

async fn start_resume(state: &SharedState, params: &RespondParams) -> Result<(ThreadId, EventStream), ApiError> {
    let thread_id = thread_id_or_default(params.thread_id.clone());
    if let Some(note) = &params.response {
        info!(thread = %thread_id, "human response: {}", note);
    }
    let stream = state
        .executor
        .resume(thread_id.clone(), params.payload())
        .await
        .map_err(|e| {
            warn!(thread = %thread_id, "resume rejected: {}", e);
            ApiError::from(e)
        })?;
    Ok((thread_id, stream))
}

pub async fn respond(
    State(state): State<SharedState>,
    Json(params): Json<RespondParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (thread_id, stream) = start_resume(&state, &params).await?;
    let report = RunReport::collect(stream).await;
    let (status, body) = summarize(&thread_id, &report);
    Ok((status, Json(body)))
}

pub async fn respond_stream(
    State(state): State<SharedState>,
    Query(params): Query<RespondParams>,
) -> Result<Response, ApiError> {
    let (_, stream) = start_resume(&state, &params).await?;
    Ok(stream_response(stream, params.format))
}

/// Checkpointed snapshot of a thread.
pub async fn thread(
    State(state): State<SharedState>,
    Path(thread_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = ThreadId::new(thread_id);
    let snapshot = state.executor.thread(&id).await?;
    if snapshot.ledger.is_empty() && !state.executor.is_running(&id) {
        return Err(ApiError::not_found(format!("thread '{}' not found", id)));
    }
    Ok(Json(json!({
        "thread_id": id.as_str(),
        "status": snapshot.status,
        "running": state.executor.is_running(&id),
        "pending_interrupt": snapshot.pending_interrupt,
        "turns": snapshot.ledger.len(),
        "fields": snapshot.fields,
        "ledger": snapshot.ledger,
        "updated_at": snapshot.updated_at,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_payload_defaults_to_confirmation() {
        assert_eq!(RespondParams::default().payload(), json!({"correct": "y"}));
        let params = RespondParams {
            name: Some("Ada".into()),
            ..Default::default()
        };
        assert_eq!(params.payload(), json!({"name": "Ada"}));
    }

    #[test]
    fn response_text_becomes_data() {
        let params = RespondParams {
            response: Some("Paris".into()),
            ..Default::default()
        };
        assert_eq!(params.payload(), json!({"data": "Paris"}));

        let params = RespondParams {
            data: Some("Lyon".into()),
            response: Some("Paris".into()),
            ..Default::default()
        };
        assert_eq!(params.payload(), json!({"data": "Lyon"}));
    }

    #[test]
    fn busy_maps_to_conflict() {
        let err = ApiError::from(Error::ThreadBusy("t".into()));
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, "thread_busy");
        let err = ApiError::from(Error::StepLimitExceeded { limit: 2 });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn blank_thread_id_uses_default() {
        assert_eq!(thread_id_or_default(Some("  ".into())), ThreadId::default());
        assert_eq!(thread_id_or_default(Some("x".into())).as_str(), "x");
    }
}
