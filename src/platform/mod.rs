//! REST plumbing for the external identity platform.
//!
//! The platform is an external collaborator: an auth subsystem (password
//! sign-in, token refresh, session-change notifications) and a document
//! store (collection queries, document insert). Everything here talks to its
//! HTTPS surface with a shared [`reqwest::Client`]; nothing reimplements the
//! platform itself.

pub mod auth;
pub mod session;
pub mod store;

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

pub(crate) fn client() -> Result<Client> {
    Ok(Client::builder().user_agent(APP_USER_AGENT).build()?)
}

/// Error message carried in a platform error body, empty string if absent.
pub(crate) fn platform_error_message(json_response: &Value) -> &str {
    json_response
        .get("error")
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("")
}

/// # Errors
/// Returns an error if `url` cannot be parsed, has no host, or uses an unsupported scheme.
pub fn endpoint_url(url: &str, path: &str) -> Result<String> {
    let url = Url::parse(url)?;

    let scheme = url.scheme();

    let host = url
        .host()
        .ok_or_else(|| anyhow!("Error parsing URL: no host specified"))?
        .to_owned();

    let port = match url.port() {
        Some(p) => p,
        None => match scheme {
            "http" => 80,
            "https" => 443,
            _ => return Err(anyhow!("Error parsing URL: unsupported scheme {scheme}")),
        },
    };

    let endpoint_url = format!("{scheme}://{host}:{port}{path}");

    debug!("endpoint URL: {}", endpoint_url);

    Ok(endpoint_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_keeps_explicit_port() {
        let url = endpoint_url("http://localhost:9099", "/v1/token").unwrap();
        assert_eq!(url, "http://localhost:9099/v1/token");
    }

    #[test]
    fn endpoint_url_fills_default_ports() {
        let https = endpoint_url("https://store.example.com", "/v1/projects").unwrap();
        assert_eq!(https, "https://store.example.com:443/v1/projects");

        let http = endpoint_url("http://store.example.com", "/v1/projects").unwrap();
        assert_eq!(http, "http://store.example.com:80/v1/projects");
    }

    #[test]
    fn endpoint_url_rejects_unsupported_scheme() {
        assert!(endpoint_url("ftp://store.example.com", "/v1").is_err());
    }

    #[test]
    fn endpoint_url_rejects_missing_host() {
        assert!(endpoint_url("mailto:user@example.com", "/v1").is_err());
    }

    #[test]
    fn platform_error_message_reads_nested_error() {
        let body = serde_json::json!({"error": {"code": 400, "message": "INVALID_PASSWORD"}});
        assert_eq!(platform_error_message(&body), "INVALID_PASSWORD");

        let empty = serde_json::json!({});
        assert_eq!(platform_error_message(&empty), "");
    }
}
