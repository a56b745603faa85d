//! Auth gateway: the seam over the platform's auth subsystem.
//!
//! [`AuthGateway`] is what the session capabilities consume:
//! session-change notifications, forced token refresh with claims decoding,
//! and credential sign-in/sign-out. [`RestAuthGateway`] implements it over
//! the platform's password sign-in and token-refresh endpoints. Token
//! signatures are NOT verified here; the platform owns verification and this
//! glue only reads the payload segment.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};
use std::sync::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info_span, Instrument};

use crate::platform;

const NOTIFY_CAPACITY: usize = 16;

/// Opaque external identity: platform-assigned id plus the sign-in email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub uid: String,
    pub email: Option<String>,
}

/// Decoded token claims, an opaque mapping owned by the platform.
pub type Claims = Map<String, Value>;

#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Session-change notifications: `Some(user)` on sign-in, `None` on
    /// sign-out. The current state is replayed on registration, the way the
    /// platform SDK fires a fresh callback immediately.
    fn subscribe(&self) -> broadcast::Receiver<Option<UserInfo>>;

    /// Fetches a fresh token for `user` (forced refresh) and decodes its
    /// claims.
    async fn token_claims(&self, user: &UserInfo) -> Result<Claims>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserInfo>;

    async fn sign_out(&self) -> Result<()>;
}

#[derive(Clone)]
struct SessionTokens {
    user: UserInfo,
    refresh_token: SecretString,
}

/// Auth client over the platform's REST surface.
pub struct RestAuthGateway {
    auth_url: String,
    api_key: SecretString,
    client: reqwest::Client,
    session: RwLock<Option<SessionTokens>>,
    events: broadcast::Sender<Option<UserInfo>>,
}

impl RestAuthGateway {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(auth_url: &str, api_key: SecretString) -> Result<Self> {
        let (events, _) = broadcast::channel(NOTIFY_CAPACITY);

        Ok(Self {
            auth_url: auth_url.to_string(),
            api_key,
            client: platform::client()?,
            session: RwLock::new(None),
            events,
        })
    }

    fn current_user(&self) -> Option<UserInfo> {
        self.session
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(|tokens| tokens.user.clone()))
    }

    fn store_session(&self, tokens: Option<SessionTokens>) -> Result<()> {
        let mut guard = self
            .session
            .write()
            .map_err(|_| anyhow!("session lock poisoned"))?;
        *guard = tokens;
        Ok(())
    }

    async fn post_json(&self, url: &str, operation: &str, payload: &Value) -> Result<Value> {
        let span = info_span!(
            "auth.request",
            http.method = "POST",
            operation,
            url = %url
        );
        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.expose_secret())])
            .json(payload)
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

        Ok(response.json().await?)
    }
}

#[async_trait]
impl AuthGateway for RestAuthGateway {
    fn subscribe(&self) -> broadcast::Receiver<Option<UserInfo>> {
        let receiver = self.events.subscribe();

        // replay so the subscriber sees the state without waiting for the
        // next transition
        let _ = self.events.send(self.current_user());

        receiver
    }

    async fn token_claims(&self, user: &UserInfo) -> Result<Claims> {
        let refresh_token = {
            let guard = self
                .session
                .read()
                .map_err(|_| anyhow!("session lock poisoned"))?;
            let tokens = guard
                .as_ref()
                .ok_or_else(|| anyhow!("no active session for {}", user.uid))?;

            if tokens.user.uid != user.uid {
                return Err(anyhow!("session does not match user {}", user.uid));
            }

            tokens.refresh_token.clone()
        };

        let url = platform::endpoint_url(&self.auth_url, "/v1/token")?;
        let payload = json!({
            "grant_type": "refresh_token",
            "refresh_token": refresh_token.expose_secret(),
        });

        let json_response = self.post_json(&url, "token_refresh", &payload).await?;

        let id_token = json_response
            .get("id_token")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Error parsing JSON response: no id_token found"))?;

        // the platform rotates refresh tokens; keep the newest one
        if let Some(rotated) = json_response.get("refresh_token").and_then(Value::as_str) {
            self.store_session(Some(SessionTokens {
                user: user.clone(),
                refresh_token: SecretString::from(rotated.to_string()),
            }))?;
        }

        decode_claims(id_token)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserInfo> {
        let url = platform::endpoint_url(&self.auth_url, "/v1/accounts:signInWithPassword")?;
        let payload = json!({
            "email": email,
            "password": password,
            "returnSecureToken": true,
        });

        let json_response = self.post_json(&url, "sign_in", &payload).await?;

        let uid = json_response
            .get("localId")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Error parsing JSON response: no localId found"))?
            .to_string();

        let email = json_response
            .get("email")
            .and_then(Value::as_str)
            .map(str::to_string);

        let refresh_token = json_response
            .get("refreshToken")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Error parsing JSON response: no refreshToken found"))?;

        let user = UserInfo { uid, email };

        self.store_session(Some(SessionTokens {
            user: user.clone(),
            refresh_token: SecretString::from(refresh_token.to_string()),
        }))?;

        let _ = self.events.send(Some(user.clone()));

        debug!(uid = %user.uid, "signed in");

        Ok(user)
    }

    async fn sign_out(&self) -> Result<()> {
        self.store_session(None)?;

        let _ = self.events.send(None);

        debug!("signed out");

        Ok(())
    }
}

/// Decodes the payload segment of a platform token. No signature check.
///
/// # Errors
/// Returns an error if the token is not three dot-separated segments or the
/// payload is not base64url-encoded JSON.
pub fn decode_claims(token: &str) -> Result<Claims> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| anyhow!("invalid token format"))?;

    let bytes = Base64UrlUnpadded::decode_vec(payload)
        .map_err(|_| anyhow!("invalid token payload encoding"))?;

    let claims: Claims = serde_json::from_slice(&bytes).context("invalid token payload")?;

    Ok(claims)
}

#[cfg(test)]
pub(crate) fn encode_token(claims: &Value) -> String {
    let header = Base64UrlUnpadded::encode_string(b"{\"alg\":\"RS256\",\"typ\":\"JWT\"}");
    let payload = Base64UrlUnpadded::encode_string(claims.to_string().as_bytes());

    format!("{header}.{payload}.sig")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_claims_reads_payload_segment() {
        let token = encode_token(&json!({
            "sub": "user-1",
            "activePlugins": ["reports", "exports"],
        }));

        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.get("sub"), Some(&Value::from("user-1")));
        assert_eq!(
            claims.get("activePlugins"),
            Some(&json!(["reports", "exports"]))
        );
    }

    #[test]
    fn decode_claims_rejects_malformed_tokens() {
        assert!(decode_claims("only-one-segment").is_err());
        assert!(decode_claims("a.!!!not-base64!!!.c").is_err());

        let not_json = format!("h.{}.s", Base64UrlUnpadded::encode_string(b"not json"));
        assert!(decode_claims(&not_json).is_err());
    }

    #[tokio::test]
    async fn subscribe_replays_signed_out_state() {
        let gateway =
            RestAuthGateway::new("http://localhost:9099", SecretString::from("k".to_string()))
                .unwrap();

        let mut events = gateway.subscribe();
        assert_eq!(events.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn token_claims_requires_an_active_session() {
        let gateway =
            RestAuthGateway::new("http://localhost:9099", SecretString::from("k".to_string()))
                .unwrap();

        let user = UserInfo {
            uid: "user-1".to_string(),
            email: None,
        };

        let err = gateway.token_claims(&user).await.unwrap_err();
        assert!(err.to_string().contains("no active session"));
    }
}
