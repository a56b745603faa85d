//! Access-request admission chain.
//!
//! `admit` validates an inbound [`AccessRequestForm`] and, when it is clean
//! and conflict-free, records exactly one new request document through the
//! [`AccessStore`] seam. Validation short-circuits on the first failure so
//! error reporting stays deterministic; every rejection carries a
//! machine-readable code plus a user-facing Spanish message.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use utoipa::ToSchema;

use crate::ingreso::handlers::valid_email;
use crate::rut;

pub const MSG_REQUIRED_FIELDS: &str = "Todos los campos son obligatorios.";
pub const MSG_INVALID_EMAIL: &str = "Formato de correo electrónico inválido.";
pub const MSG_INVALID_RUT: &str = "El RUT o RUN ingresado no es válido.";
pub const MSG_INVALID_REQUEST_TYPE: &str = "Tipo de solicitud inválido.";
pub const MSG_ACCOUNT_EXISTS: &str = "Ya existe una cuenta activa asociada a este RUT.";
pub const MSG_REQUEST_EXISTS: &str = "Ya existe una solicitud pendiente o en proceso para este RUT.";
pub const MSG_SUCCESS: &str = "Solicitud enviada con éxito.";

/// Inbound form payload. Absent fields deserialize as empty strings so the
/// presence check below owns the error message, not serde.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessRequestForm {
    pub requester_name: String,
    pub requester_email: String,
    pub rut: String,
    pub institution_name: String,
    pub request_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    B2b,
    Educational,
}

impl RequestType {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "B2B" => Some(Self::B2b),
            "EDUCATIONAL" => Some(Self::Educational),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::B2b => "B2B",
            Self::Educational => "EDUCATIONAL",
        }
    }
}

/// Review lifecycle of a stored request. Admission only ever writes
/// `pending_review`; the later states belong to the review workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    PendingReview,
    PendingAdditionalData,
}

impl RequestStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingReview => "pending_review",
            Self::PendingAdditionalData => "pending_additional_data",
        }
    }
}

/// Statuses that count as an open request for the conflict check.
pub const PENDING_STATUSES: [RequestStatus; 2] = [
    RequestStatus::PendingReview,
    RequestStatus::PendingAdditionalData,
];

/// A validated request ready to persist.
#[derive(Debug, Clone, Copy)]
pub struct NewAccessRequest<'a> {
    pub requester_name: &'a str,
    pub requester_email: &'a str,
    pub rut: &'a str,
    pub institution_name: &'a str,
    pub request_type: RequestType,
    pub status: RequestStatus,
}

/// Identifier and server-assigned timestamps of a persisted request.
#[derive(Debug, Clone)]
pub struct StoredRequest {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReceipt {
    pub success: bool,
    pub message: String,
    pub request_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCode {
    InvalidArgument,
    AlreadyExists,
}

impl RejectCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid-argument",
            Self::AlreadyExists => "already-exists",
        }
    }
}

#[derive(Debug, Error)]
pub enum AdmissionError {
    /// Rejected by validation or by a conflict check. No write happened.
    #[error("{message}")]
    Rejected {
        code: RejectCode,
        message: &'static str,
    },
    /// A store round trip failed. Surfaced as-is, not locally recovered.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl AdmissionError {
    const fn rejected(code: RejectCode, message: &'static str) -> Self {
        Self::Rejected { code, message }
    }
}

/// Document-store operations the admission chain needs. Implemented by
/// `platform::store::RestStore` against the platform and by
/// `platform::store::MemoryStore` for tests and local development.
#[async_trait]
pub trait AccessStore: Send + Sync {
    /// Is there an account with this rut and status `active`?
    async fn active_account_exists(&self, rut: &str) -> Result<bool>;

    /// Is there a request with this rut in one of [`PENDING_STATUSES`]?
    async fn pending_request_exists(&self, rut: &str) -> Result<bool>;

    /// Insert one request document; the backend assigns id and timestamps.
    async fn insert_request(&self, request: NewAccessRequest<'_>) -> Result<StoredRequest>;
}

/// Runs the admission chain against `store`.
///
/// Exactly one document is written on success; none on any failure path.
/// The existence checks and the insert are separate round trips, so two
/// concurrent calls for the same rut can both pass the checks — the platform
/// store carries no uniqueness constraint for us to lean on.
///
/// # Errors
/// [`AdmissionError::Rejected`] for validation/conflict failures,
/// [`AdmissionError::Store`] for propagated platform faults.
pub async fn admit(
    store: &dyn AccessStore,
    form: &AccessRequestForm,
) -> Result<AdmissionReceipt, AdmissionError> {
    if form.requester_name.is_empty()
        || form.requester_email.is_empty()
        || form.rut.is_empty()
        || form.institution_name.is_empty()
        || form.request_type.is_empty()
    {
        return Err(AdmissionError::rejected(
            RejectCode::InvalidArgument,
            MSG_REQUIRED_FIELDS,
        ));
    }

    if !valid_email(&form.requester_email) {
        return Err(AdmissionError::rejected(
            RejectCode::InvalidArgument,
            MSG_INVALID_EMAIL,
        ));
    }

    if !rut::validate(&form.rut) {
        return Err(AdmissionError::rejected(
            RejectCode::InvalidArgument,
            MSG_INVALID_RUT,
        ));
    }

    let Some(request_type) = RequestType::parse(&form.request_type) else {
        return Err(AdmissionError::rejected(
            RejectCode::InvalidArgument,
            MSG_INVALID_REQUEST_TYPE,
        ));
    };

    if store.active_account_exists(&form.rut).await? {
        return Err(AdmissionError::rejected(
            RejectCode::AlreadyExists,
            MSG_ACCOUNT_EXISTS,
        ));
    }

    if store.pending_request_exists(&form.rut).await? {
        return Err(AdmissionError::rejected(
            RejectCode::AlreadyExists,
            MSG_REQUEST_EXISTS,
        ));
    }

    let stored = store
        .insert_request(NewAccessRequest {
            requester_name: &form.requester_name,
            requester_email: &form.requester_email,
            rut: &form.rut,
            institution_name: &form.institution_name,
            request_type,
            status: RequestStatus::PendingReview,
        })
        .await?;

    debug!(request_id = %stored.id, rut = %form.rut, "access request recorded");

    Ok(AdmissionReceipt {
        success: true,
        message: MSG_SUCCESS.to_string(),
        request_id: stored.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::store::MemoryStore;
    use anyhow::anyhow;

    fn valid_form() -> AccessRequestForm {
        AccessRequestForm {
            requester_name: "María Pérez".to_string(),
            requester_email: "maria.perez@uchile.cl".to_string(),
            rut: "12345678-5".to_string(),
            institution_name: "Universidad de Chile".to_string(),
            request_type: "EDUCATIONAL".to_string(),
        }
    }

    fn assert_rejected(err: &AdmissionError, code: RejectCode, message: &str) {
        match err {
            AdmissionError::Rejected {
                code: got_code,
                message: got_message,
            } => {
                assert_eq!(*got_code, code);
                assert_eq!(*got_message, message);
            }
            AdmissionError::Store(err) => panic!("expected rejection, got store error: {err}"),
        }
    }

    #[tokio::test]
    async fn rejects_missing_fields_without_writing() {
        let store = MemoryStore::new();

        let wipes: [fn(&mut AccessRequestForm); 5] = [
            |f| f.requester_name.clear(),
            |f| f.requester_email.clear(),
            |f| f.rut.clear(),
            |f| f.institution_name.clear(),
            |f| f.request_type.clear(),
        ];

        for wipe in wipes {
            let mut form = valid_form();
            wipe(&mut form);

            let err = admit(&store, &form).await.unwrap_err();
            assert_rejected(&err, RejectCode::InvalidArgument, MSG_REQUIRED_FIELDS);
        }

        assert_eq!(store.request_count().await, 0);
    }

    #[tokio::test]
    async fn rejects_malformed_email() {
        let store = MemoryStore::new();
        let mut form = valid_form();
        form.requester_email = "not-an-email".to_string();

        let err = admit(&store, &form).await.unwrap_err();
        assert_rejected(&err, RejectCode::InvalidArgument, MSG_INVALID_EMAIL);
        assert_eq!(store.request_count().await, 0);
    }

    #[tokio::test]
    async fn rejects_bad_check_digit() {
        let store = MemoryStore::new();
        let mut form = valid_form();
        form.rut = "12345678-0".to_string();

        let err = admit(&store, &form).await.unwrap_err();
        assert_rejected(&err, RejectCode::InvalidArgument, MSG_INVALID_RUT);
        assert_eq!(store.request_count().await, 0);
    }

    #[tokio::test]
    async fn rejects_unknown_request_type() {
        let store = MemoryStore::new();
        let mut form = valid_form();
        form.request_type = "GOVERNMENT".to_string();

        let err = admit(&store, &form).await.unwrap_err();
        assert_rejected(&err, RejectCode::InvalidArgument, MSG_INVALID_REQUEST_TYPE);
        assert_eq!(store.request_count().await, 0);
    }

    #[tokio::test]
    async fn rejects_rut_with_active_account() {
        let store = MemoryStore::new();
        store.seed_account("12345678-5", "active").await;

        let err = admit(&store, &valid_form()).await.unwrap_err();
        assert_rejected(&err, RejectCode::AlreadyExists, MSG_ACCOUNT_EXISTS);
        assert_eq!(store.request_count().await, 0);
    }

    #[tokio::test]
    async fn ignores_inactive_accounts() {
        let store = MemoryStore::new();
        store.seed_account("12345678-5", "suspended").await;

        let receipt = admit(&store, &valid_form()).await.unwrap();
        assert!(receipt.success);
        assert_eq!(store.request_count().await, 1);
    }

    #[tokio::test]
    async fn rejects_rut_with_open_request() {
        for status in PENDING_STATUSES {
            let store = MemoryStore::new();
            store.seed_request("12345678-5", status).await;

            let err = admit(&store, &valid_form()).await.unwrap_err();
            assert_rejected(&err, RejectCode::AlreadyExists, MSG_REQUEST_EXISTS);
            assert_eq!(store.request_count().await, 1, "only the seeded request");
        }
    }

    #[tokio::test]
    async fn records_one_pending_review_request() {
        let store = MemoryStore::new();

        let receipt = admit(&store, &valid_form()).await.unwrap();
        assert!(receipt.success);
        assert_eq!(receipt.message, MSG_SUCCESS);
        assert!(!receipt.request_id.is_empty());

        let records = store.requests().await;
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.id, receipt.request_id);
        assert_eq!(record.rut, "12345678-5");
        assert_eq!(record.request_type, RequestType::Educational);
        assert_eq!(record.status, RequestStatus::PendingReview);
        assert_eq!(record.created_at, record.updated_at);
    }

    struct BrokenStore;

    #[async_trait]
    impl AccessStore for BrokenStore {
        async fn active_account_exists(&self, _rut: &str) -> Result<bool> {
            Err(anyhow!("store unreachable"))
        }

        async fn pending_request_exists(&self, _rut: &str) -> Result<bool> {
            Err(anyhow!("store unreachable"))
        }

        async fn insert_request(&self, _request: NewAccessRequest<'_>) -> Result<StoredRequest> {
            Err(anyhow!("store unreachable"))
        }
    }

    #[tokio::test]
    async fn store_faults_propagate_as_is() {
        let err = admit(&BrokenStore, &valid_form()).await.unwrap_err();
        match err {
            AdmissionError::Store(err) => {
                assert!(err.to_string().contains("store unreachable"));
            }
            AdmissionError::Rejected { .. } => panic!("expected store error"),
        }
    }
}
