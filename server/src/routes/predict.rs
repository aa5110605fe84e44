//! Image classification endpoint

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use cornleaf::{Category, Stage};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::state::SharedState;

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

const FAILURE_MESSAGE: &str = "Error during prediction";

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub success: bool,
    pub prediction: Category,
    pub explanation: &'static str,
}

#[derive(Debug, Serialize)]
pub struct PredictErrorResponse {
    pub success: bool,
    pub message: String,
    pub error: String,
}

type PredictFailure = (StatusCode, Json<PredictErrorResponse>);

fn failure(status: StatusCode, error: impl Into<String>) -> PredictFailure {
    (
        status,
        Json(PredictErrorResponse {
            success: false,
            message: FAILURE_MESSAGE.to_string(),
            error: error.into(),
        }),
    )
}

/// Pull the bytes of the `image` field; other fields are skipped.
async fn read_image_field(multipart: &mut Multipart) -> Result<Vec<u8>, PredictFailure> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| failure(e.status(), e.body_text()))?
    {
        if field.name() == Some(IMAGE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| failure(e.status(), e.body_text()))?;
            return Ok(bytes.to_vec());
        }
    }

    Err(failure(
        StatusCode::BAD_REQUEST,
        format!("missing multipart field '{}'", IMAGE_FIELD),
    ))
}

/// POST /predict - Classify an uploaded corn leaf image
pub async fn predict(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, PredictFailure> {
    let mut multipart = multipart.map_err(|e| failure(e.status(), e.body_text()))?;
    let request_id = Uuid::new_v4().to_string();

    let bytes = read_image_field(&mut multipart).await?;

    // Cleanup failures are logged by the upload manager and do not affect
    // the response.
    let prediction = state
        .pipeline
        .classify(&request_id, bytes)
        .await
        .into_result()
        .map_err(|e| failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    info!(
        "Predicted {} ({:.1}% confidence) for request {}",
        prediction.category,
        prediction.confidence * 100.0,
        request_id
    );
    debug!(request_id = %request_id, stage = %Stage::Responded);

    Ok(Json(PredictResponse {
        success: true,
        prediction: prediction.category,
        explanation: prediction.explanation,
    }))
}
