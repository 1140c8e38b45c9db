use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

use crate::adapters::http::error::ApiError;
use crate::adapters::http::state::HttpState;
use crate::application::dto::{
    params_from_form, params_from_json, DetectionResponse, HealthResponse, ModelStatusResponse,
};
use crate::application::image_source::{ImageSource, UploadedFile};
use crate::domain::errors::DomainError;
use crate::domain::model::RawModelParams;

pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// `POST /api/detect` with a multipart form: `image` plus optional
/// `confidence`, `iou_threshold`, `max_detections`, `target_classes`.
pub async fn detect_upload(
    State(st): State<HttpState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectionResponse>, ApiError> {
    let mut multipart = multipart.map_err(|_| st.fail(DomainError::NoFileProvided))?;

    let mut file: Option<UploadedFile> = None;
    let mut fields = HashMap::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| st.fail(DomainError::DecodeFailed(e.body_text())))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| st.fail(DomainError::DecodeFailed(e.body_text())))?;
            file = Some(UploadedFile { filename, content_type, bytes: bytes.to_vec() });
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| st.fail(DomainError::DecodeFailed(e.body_text())))?;
            fields.insert(name, text);
        }
    }

    // File problems are reported before parameter problems.
    let source = ImageSource::Upload(file);
    source.precheck().map_err(|e| st.fail(e))?;
    let params = params_from_form(&fields).map_err(|e| st.fail(e))?;
    let result = st
        .detection
        .detect(source, params)
        .await
        .map_err(|e| st.fail(e))?;
    Ok(Json(result.into()))
}

/// `POST /api/detect/url` with `{"image_url": "...", "config": {...}}`.
pub async fn detect_url(
    State(st): State<HttpState>,
    body: Bytes,
) -> Result<Json<DetectionResponse>, ApiError> {
    let body = json_object(&body)
        .map_err(|e| st.fail(e))?
        .ok_or_else(|| st.fail(DomainError::MissingImageUrl))?;

    let source = ImageSource::Url(body.get("image_url").and_then(Value::as_str).map(str::to_string));
    source.precheck().map_err(|e| st.fail(e))?;
    let params = match body.get("config") {
        None | Some(Value::Null) => RawModelParams::default(),
        Some(cfg) if cfg.is_object() => RawModelParams {
            // the model is chosen through /api/model/config, not per request
            model_name: None,
            model_path: None,
            ..params_from_json(cfg).map_err(|e| st.fail(e))?
        },
        Some(other) => {
            return Err(st.fail(DomainError::InvalidRequestBody(format!(
                "config must be an object, got {other}"
            ))))
        }
    };

    let result = st
        .detection
        .detect(source, params)
        .await
        .map_err(|e| st.fail(e))?;
    Ok(Json(result.into()))
}

/// `GET /api/model/status`
pub async fn model_status(State(st): State<HttpState>) -> Result<Json<ModelStatusResponse>, ApiError> {
    let status = st.detection.model_status().map_err(|e| st.fail(e))?;
    Ok(Json(ModelStatusResponse { success: true, status }))
}

/// `POST /api/model/config` with a partial configuration. An empty body
/// reloads the active model as is.
pub async fn reconfigure(
    State(st): State<HttpState>,
    body: Bytes,
) -> Result<Json<ModelStatusResponse>, ApiError> {
    let params = match json_object(&body).map_err(|e| st.fail(e))? {
        Some(v) => params_from_json(&v).map_err(|e| st.fail(e))?,
        None => RawModelParams::default(),
    };
    let status = st.detection.reconfigure(params).await.map_err(|e| st.fail(e))?;
    Ok(Json(ModelStatusResponse { success: true, status }))
}

/// `None` for an empty body, the parsed value when it is a JSON object, and
/// `InvalidRequestBody` for anything else.
fn json_object(body: &[u8]) -> Result<Option<Value>, DomainError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| DomainError::InvalidRequestBody(e.to_string()))?;
    if !value.is_object() {
        return Err(DomainError::InvalidRequestBody(format!("expected a JSON object, got {value}")));
    }
    Ok(Some(value))
}
