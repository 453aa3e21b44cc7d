use crate::error::ApiError;
use crate::state::AppState;
use crate::{bad_request, unprocessable};
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Query, State};
use axum::{Json, Router, routing::post};
use retina_inference::{InferenceError, PredictionResponse};
use serde::Deserialize;

pub const DEFAULT_TOPK: i64 = 5;
pub const MIN_TOPK: i64 = 1;
pub const MAX_TOPK: i64 = 100;

/// Multipart field carrying the image
const FILE_FIELD: &str = "file";

pub fn routes() -> Router<AppState> {
    Router::new().route("/", post(predict))
}

#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    #[serde(default)]
    pub topk: Option<i64>,
}

impl PredictQuery {
    pub fn topk(&self) -> Result<usize, ApiError> {
        let topk = self.topk.unwrap_or(DEFAULT_TOPK);
        if !(MIN_TOPK..=MAX_TOPK).contains(&topk) {
            return Err(unprocessable!(
                "topk must be between {MIN_TOPK} and {MAX_TOPK}, got {topk}"
            ));
        }
        usize::try_from(topk).map_err(|_| unprocessable!("topk out of range: {topk}"))
    }
}

/// POST /predict
#[tracing::instrument(name = "POST /predict", skip(state, query, multipart))]
pub async fn predict(
    State(state): State<AppState>,
    query: Result<Query<PredictQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let Query(query) = query.map_err(|e| unprocessable!("Invalid query: {}", e.body_text()))?;
    let topk = query.topk()?;

    let classifier = state
        .classifier
        .clone()
        .ok_or(InferenceError::ModelUnavailable)?;
    let mut multipart =
        multipart.map_err(|e| bad_request!("Invalid multipart body: {}", e.body_text()))?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            upload = Some(field.bytes().await?);
            break;
        }
    }
    let bytes = upload.ok_or_else(|| unprocessable!("Missing form field `{FILE_FIELD}`"))?;
    tracing::debug!(bytes = bytes.len(), topk, "Received image");

    let response =
        tokio::task::spawn_blocking(move || classifier.predict(&bytes, topk)).await??;
    Ok(Json(response))
}
