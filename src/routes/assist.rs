use axum::{extract::State, Json};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::assistant::extract_structured;
use crate::state::AppState;

const PRESCRIPTION_PROMPT: &str = r#"You are a medical prescription analysis AI. Analyze this prescription image and extract the following information in JSON format:

{
    "medications": [
        {
            "name": "medication name",
            "dosage": "dosage amount with units",
            "frequency": "how often to take",
            "duration": "how long to take",
            "instructions": "special instructions"
        }
    ],
    "doctor_name": "doctor's name if visible",
    "patient_name": "patient's name if visible",
    "prescription_date": "date if visible",
    "additional_notes": "any additional notes or instructions",
    "raw_text": "all text found in the image"
}

Only extract information that is clearly visible; use null for anything unclear. Pay special attention to medication names, dosages, and frequencies.

Analyze this prescription image:"#;

#[derive(Deserialize, ToSchema)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<Uuid>,
}

#[derive(Serialize, ToSchema)]
pub struct ChatResponse {
    pub session_id: Uuid,
    pub reply: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PrescriptionRequest {
    /// Base64-encoded image of the prescription.
    pub image_base64: String,
    pub mime_type: Option<String>,
    pub patient_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PrescriptionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    /// Parsed analysis, or the raw model text when parsing failed.
    #[schema(value_type = Object)]
    pub analysis: Value,
    /// False when the model output did not parse as structured data and
    /// `analysis` carries the raw text instead.
    pub confident: bool,
}

// POST /assist/chat
#[utoipa::path(
    post,
    path = "/assist/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Generated reply", body = ChatResponse),
        (status = 400, description = "Empty message"),
        (status = 502, description = "Model rejected or unreachable")
    ),
    security(
        ("api_key" = [])
    ),
    tag = "Assistant"
)]
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("message must not be empty".to_string()));
    }

    let session_id = request.session_id.unwrap_or_else(Uuid::new_v4);
    let reply = state.assistant.generate_text(message).await?;

    info!(%session_id, "chat reply generated");

    Ok(Json(ChatResponse { session_id, reply }))
}

// POST /assist/prescription
#[utoipa::path(
    post,
    path = "/assist/prescription",
    request_body = PrescriptionRequest,
    responses(
        (status = 200, description = "Prescription analysis", body = PrescriptionResponse),
        (status = 400, description = "Image payload is not valid base64"),
        (status = 502, description = "Model rejected or unreachable")
    ),
    security(
        ("api_key" = [])
    ),
    tag = "Assistant"
)]
pub async fn analyze_prescription(
    State(state): State<AppState>,
    Json(request): Json<PrescriptionRequest>,
) -> Result<Json<PrescriptionResponse>, AppError> {
    let image = BASE64
        .decode(request.image_base64.as_bytes())
        .map_err(|_| AppError::BadRequest("image_base64 is not valid base64".to_string()))?;
    if image.is_empty() {
        return Err(AppError::BadRequest("image payload is empty".to_string()));
    }

    let mime_type = request.mime_type.as_deref().unwrap_or("image/jpeg");
    let text = state
        .assistant
        .analyze_image(PRESCRIPTION_PROMPT, &image, mime_type)
        .await?;

    let payload = extract_structured(&text);
    if !payload.confident {
        info!("prescription analysis returned unstructured text, passing through raw");
    }

    Ok(Json(PrescriptionResponse {
        patient_id: request.patient_id,
        analysis: payload.value,
        confident: payload.confident,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_accepts_missing_session() {
        let request: ChatRequest = serde_json::from_str(r#"{"message": "hello"}"#).unwrap();
        assert!(request.session_id.is_none());
    }

    #[test]
    fn prescription_response_serializes_analysis_verbatim() {
        let response = PrescriptionResponse {
            patient_id: Some("p-1".to_string()),
            analysis: serde_json::json!({"medications": []}),
            confident: true,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["analysis"]["medications"], serde_json::json!([]));
        assert_eq!(value["confident"], true);
    }
}
