//! Document-store backends for the admission chain.
//!
//! [`RestStore`] talks to the platform's document database: collection
//! queries go through the `:runQuery` endpoint with equality/membership
//! filters, inserts through a document create that returns the
//! server-assigned id and timestamps. [`MemoryStore`] is the in-process
//! stand-in used by tests and local development.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{info_span, Instrument};
use ulid::Ulid;

use crate::cli::globals::GlobalArgs;
use crate::ingreso::admission::{
    AccessStore, NewAccessRequest, RequestStatus, RequestType, StoredRequest, PENDING_STATUSES,
};
use crate::platform;

const ACCOUNTS_COLLECTION: &str = "accounts";
const REQUESTS_COLLECTION: &str = "requests";
const ACTIVE_ACCOUNT_STATUS: &str = "active";

/// Store client over the platform's REST surface.
///
/// Built once at startup and shared behind `Arc<dyn AccessStore>`; the inner
/// [`Client`] pools connections across calls.
pub struct RestStore {
    store_url: String,
    project: String,
    token: SecretString,
    client: Client,
}

impl RestStore {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(globals: &GlobalArgs) -> Result<Self> {
        Ok(Self {
            store_url: globals.store_url.clone(),
            project: globals.project.clone(),
            token: globals.store_token.clone(),
            client: platform::client()?,
        })
    }

    fn documents_url(&self, suffix: &str) -> Result<String> {
        platform::endpoint_url(
            &self.store_url,
            &format!(
                "/v1/projects/{}/databases/(default)/documents{suffix}",
                self.project
            ),
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let token = self.token.expose_secret();
        if token.is_empty() {
            // emulator-style deployments run without a bearer token
            request
        } else {
            request.header("Authorization", format!("Bearer {token}"))
        }
    }

    /// Runs a conflict query, true when at least one document matched.
    async fn any_match(&self, collection: &str, query: Value) -> Result<bool> {
        let url = self.documents_url(":runQuery")?;

        let span = info_span!(
            "store.query",
            http.method = "POST",
            collection,
            url = %url
        );
        let response = self
            .authorized(self.client.post(&url))
            .json(&query)
            .send()
            .instrument(span)
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let json_response: Value = response.json().await?;

            return Err(anyhow!(
                "{} - {}, {}",
                url,
                status,
                platform::platform_error_message(&json_response)
            ));
        }

        let json_response: Value = response.json().await?;

        Ok(query_matched(&json_response))
    }
}

#[async_trait]
impl AccessStore for RestStore {
    async fn active_account_exists(&self, rut: &str) -> Result<bool> {
        let query = conflict_query(
            ACCOUNTS_COLLECTION,
            vec![
                equality_filter("rut", rut),
                equality_filter("status", ACTIVE_ACCOUNT_STATUS),
            ],
        );

        self.any_match(ACCOUNTS_COLLECTION, query).await
    }

    async fn pending_request_exists(&self, rut: &str) -> Result<bool> {
        let statuses: Vec<&str> = PENDING_STATUSES
            .iter()
            .map(|status| status.as_str())
            .collect();
        let query = conflict_query(
            REQUESTS_COLLECTION,
            vec![
                equality_filter("rut", rut),
                membership_filter("status", &statuses),
            ],
        );

        self.any_match(REQUESTS_COLLECTION, query).await
    }

    async fn insert_request(&self, request: NewAccessRequest<'_>) -> Result<StoredRequest> {
        let url = self.documents_url(&format!("/{REQUESTS_COLLECTION}"))?;

        let body = json!({
            "fields": {
                "requesterName": string_value(request.requester_name),
                "requesterEmail": string_value(request.requester_email),
                "rut": string_value(request.rut),
                "institutionName": string_value(request.institution_name),
                "requestType": string_value(request.request_type.as_str()),
                "status": string_value(request.status.as_str()),
            }
        });

        let span = info_span!(
            "store.insert",
            http.method = "POST",
            collection = REQUESTS_COLLECTION,
            url = %url
        );
        let response = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .instrument(span)
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let json_response: Value = response.json().await?;

            return Err(anyhow!(
                "{} - {}, {}",
                url,
                status,
                platform::platform_error_message(&json_response)
            ));
        }

        let json_response: Value = response.json().await?;

        parse_stored_request(&json_response)
    }
}

fn string_value(value: &str) -> Value {
    json!({ "stringValue": value })
}

fn equality_filter(field: &str, value: &str) -> Value {
    json!({
        "fieldFilter": {
            "field": { "fieldPath": field },
            "op": "EQUAL",
            "value": { "stringValue": value },
        }
    })
}

fn membership_filter(field: &str, values: &[&str]) -> Value {
    let values: Vec<Value> = values.iter().map(|value| string_value(value)).collect();

    json!({
        "fieldFilter": {
            "field": { "fieldPath": field },
            "op": "IN",
            "value": { "arrayValue": { "values": values } },
        }
    })
}

fn conflict_query(collection: &str, filters: Vec<Value>) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection }],
            "where": { "compositeFilter": { "op": "AND", "filters": filters } },
            "limit": 1,
        }
    })
}

// An empty result set still answers with one entry carrying only readTime.
fn query_matched(response: &Value) -> bool {
    response
        .as_array()
        .is_some_and(|entries| entries.iter().any(|entry| entry.get("document").is_some()))
}

fn parse_stored_request(response: &Value) -> Result<StoredRequest> {
    let name = response
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Error parsing JSON response: no name found"))?;

    let id = name
        .rsplit('/')
        .next()
        .ok_or_else(|| anyhow!("Error parsing JSON response: empty document name"))?
        .to_string();

    Ok(StoredRequest {
        id,
        created_at: parse_time(response, "createTime")?,
        updated_at: parse_time(response, "updateTime")?,
    })
}

fn parse_time(response: &Value, key: &str) -> Result<DateTime<Utc>> {
    let raw = response
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Error parsing JSON response: no {key} found"))?;

    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

/// A request document held by [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub id: String,
    pub requester_name: String,
    pub requester_email: String,
    pub rut: String,
    pub institution_name: String,
    pub request_type: RequestType,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct AccountRecord {
    rut: String,
    status: String,
}

#[derive(Debug, Default)]
struct MemoryInner {
    accounts: Vec<AccountRecord>,
    requests: Vec<RequestRecord>,
}

/// In-process store backend: the emulator stand-in for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_account(&self, rut: &str, status: &str) {
        self.inner.write().await.accounts.push(AccountRecord {
            rut: rut.to_string(),
            status: status.to_string(),
        });
    }

    pub async fn seed_request(&self, rut: &str, status: RequestStatus) {
        let now = Utc::now();
        self.inner.write().await.requests.push(RequestRecord {
            id: Ulid::new().to_string(),
            requester_name: "seeded".to_string(),
            requester_email: "seeded@example.com".to_string(),
            rut: rut.to_string(),
            institution_name: "seeded".to_string(),
            request_type: RequestType::B2b,
            status,
            created_at: now,
            updated_at: now,
        });
    }

    pub async fn requests(&self) -> Vec<RequestRecord> {
        self.inner.read().await.requests.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.inner.read().await.requests.len()
    }
}

#[async_trait]
impl AccessStore for MemoryStore {
    async fn active_account_exists(&self, rut: &str) -> Result<bool> {
        Ok(self
            .inner
            .read()
            .await
            .accounts
            .iter()
            .any(|account| account.rut == rut && account.status == ACTIVE_ACCOUNT_STATUS))
    }

    async fn pending_request_exists(&self, rut: &str) -> Result<bool> {
        Ok(self
            .inner
            .read()
            .await
            .requests
            .iter()
            .any(|request| request.rut == rut && PENDING_STATUSES.contains(&request.status)))
    }

    async fn insert_request(&self, request: NewAccessRequest<'_>) -> Result<StoredRequest> {
        let now = Utc::now();
        let record = RequestRecord {
            id: Ulid::new().to_string(),
            requester_name: request.requester_name.to_string(),
            requester_email: request.requester_email.to_string(),
            rut: request.rut.to_string(),
            institution_name: request.institution_name.to_string(),
            request_type: request.request_type,
            status: request.status,
            created_at: now,
            updated_at: now,
        };

        let stored = StoredRequest {
            id: record.id.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        };

        self.inner.write().await.requests.push(record);

        Ok(stored)
    }
}
