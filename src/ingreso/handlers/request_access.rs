use axum::{extract::Extension, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

use crate::ingreso::admission::{
    self, AccessRequestForm, AccessStore, AdmissionError, AdmissionReceipt, RejectCode,
};

const MSG_INTERNAL: &str = "No se pudo procesar la solicitud.";

/// Machine-readable code plus a message suitable for direct display.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

type AccessResponse =
    Result<(StatusCode, Json<AdmissionReceipt>), (StatusCode, Json<ErrorResponse>)>;

#[utoipa::path(
    post,
    path = "/requests",
    request_body = AccessRequestForm,
    responses(
        (status = 201, description = "Request recorded for review", body = AdmissionReceipt),
        (status = 400, description = "Missing or malformed field", body = ErrorResponse),
        (status = 409, description = "Conflicting account or pending request", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse),
    ),
    tag = "requests",
)]
#[instrument(skip(store, payload))]
pub async fn request_access(
    Extension(store): Extension<Arc<dyn AccessStore>>,
    payload: Option<Json<AccessRequestForm>>,
) -> AccessResponse {
    // a missing body is the same failure as missing fields
    let form = match payload {
        Some(Json(form)) => form,
        None => {
            return Err(reject(
                RejectCode::InvalidArgument,
                admission::MSG_REQUIRED_FIELDS,
            ))
        }
    };

    debug!(rut = %form.rut, request_type = %form.request_type, "access request received");

    match admission::admit(store.as_ref(), &form).await {
        Ok(receipt) => Ok((StatusCode::CREATED, Json(receipt))),
        Err(AdmissionError::Rejected { code, message }) => Err(reject(code, message)),
        Err(AdmissionError::Store(err)) => {
            error!("Store round trip failed: {err:#}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    code: "internal".to_string(),
                    message: MSG_INTERNAL.to_string(),
                }),
            ))
        }
    }
}

fn reject(code: RejectCode, message: &str) -> (StatusCode, Json<ErrorResponse>) {
    let status = match code {
        RejectCode::InvalidArgument => StatusCode::BAD_REQUEST,
        RejectCode::AlreadyExists => StatusCode::CONFLICT,
    };

    (
        status,
        Json(ErrorResponse {
            code: code.as_str().to_string(),
            message: message.to_string(),
        }),
    )
}
