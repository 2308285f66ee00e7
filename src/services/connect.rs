// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Garmin Connect upload client.
//!
//! Handles:
//! - Resuming a stored OAuth2 session from a token directory
//! - Multipart activity uploads
//! - Conflict (409) and authorization (401/403) detection

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Token file written inside the token directory.
const OAUTH2_TOKEN_FILE: &str = "oauth2_token.json";

/// Where to find or how to obtain a session.
#[derive(Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    /// Never sent anywhere. Only selects the error reported when no stored
    /// session exists, since password login is not supported.
    pub password: Option<String>,
    pub token_dir: PathBuf,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("token_dir", &self.token_dir)
            .finish()
    }
}

/// An authenticated session.
#[derive(Clone)]
pub struct Session {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// What the upload API told us about a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadReceipt {
    pub activity_id: Option<u64>,
}

/// Upload collaborator used by the batch processor.
///
/// `upload` returns `AppError::Conflict` when the activity already exists,
/// `AppError::Authentication` when the session is rejected and
/// `AppError::Transport` for anything else.
#[allow(async_fn_in_trait)]
pub trait UploadClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session>;

    async fn upload(&self, session: &Session, file_name: &str, bytes: Vec<u8>)
        -> Result<UploadReceipt>;
}

/// OAuth2 token as stored on disk.
#[derive(Debug, Deserialize)]
struct StoredOAuth2Token {
    access_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
}

/// Garmin Connect API client.
#[derive(Clone)]
pub struct GarminConnectClient {
    http: reqwest::Client,
    base_url: String,
}

impl GarminConnectClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl UploadClient for GarminConnectClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session> {
        let token_path = credentials.token_dir.join(OAUTH2_TOKEN_FILE);
        let data = match fs::read_to_string(&token_path) {
            Ok(data) => data,
            Err(_) if credentials.username.is_some() && credentials.password.is_some() => {
                return Err(AppError::Authentication(format!(
                    "no stored session in {} and password login is not supported; \
                     create a session there first",
                    credentials.token_dir.display()
                )));
            }
            Err(e) => {
                return Err(AppError::Authentication(format!(
                    "cannot read {}: {}",
                    token_path.display(),
                    e
                )));
            }
        };
        let session = parse_session(&data)?;

        if let Some(expires_at) = session.expires_at {
            if expires_at <= Utc::now() {
                return Err(AppError::Authentication(format!(
                    "stored session expired at {}",
                    expires_at.to_rfc3339()
                )));
            }
        }

        tracing::debug!(
            token_dir = %credentials.token_dir.display(),
            username = credentials.username.as_deref().unwrap_or(""),
            "Using stored Garmin Connect session"
        );
        Ok(session)
    }

    async fn upload(
        &self,
        session: &Session,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadReceipt> {
        let url = format!("{}/upload-service/upload", self.base_url);
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| AppError::Transport(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&session.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if let Some(err) = check_status(status, &body) {
            return Err(err);
        }

        let activity_id = parse_activity_id(&body);
        tracing::debug!(status, activity_id = ?activity_id, "Upload accepted");
        Ok(UploadReceipt { activity_id })
    }
}

/// Parse a stored token file into a session.
fn parse_session(data: &str) -> Result<Session> {
    let token: StoredOAuth2Token = serde_json::from_str(data)
        .map_err(|e| AppError::Authentication(format!("invalid stored session: {}", e)))?;
    if token.access_token.trim().is_empty() {
        return Err(AppError::Authentication(
            "stored session has no access token".to_string(),
        ));
    }
    Ok(Session {
        access_token: token.access_token,
        expires_at: token
            .expires_at
            .and_then(|t| DateTime::from_timestamp(t, 0)),
    })
}

/// Map a non-success status to an error.
fn check_status(status: u16, body: &str) -> Option<AppError> {
    match status {
        200..=299 => None,
        409 => Some(AppError::Conflict),
        401 | 403 => Some(AppError::Authentication(format!(
            "Garmin Connect rejected the session (HTTP {})",
            status
        ))),
        429 => {
            tracing::warn!("Garmin Connect rate limit hit (429)");
            Some(AppError::Transport("rate limited (HTTP 429)".to_string()))
        }
        _ => Some(AppError::Transport(format!("HTTP {}: {}", status, body))),
    }
}

/// Pull the new activity id out of an upload response, if there is one.
fn parse_activity_id(body: &str) -> Option<u64> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json.pointer("/detailedImportResult/successes/0/internalId")
        .and_then(|v| v.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_status() {
        assert!(check_status(201, "").is_none());
        assert!(check_status(202, "").is_none());
        assert!(matches!(check_status(409, ""), Some(AppError::Conflict)));
        assert!(matches!(
            check_status(401, ""),
            Some(AppError::Authentication(_))
        ));
        assert!(matches!(
            check_status(500, "boom"),
            Some(AppError::Transport(msg)) if msg.contains("boom")
        ));
    }

    #[test]
    fn test_parse_activity_id() {
        let body = r#"{"detailedImportResult":{"successes":[{"internalId":12345678901}],"failures":[]}}"#;
        assert_eq!(parse_activity_id(body), Some(12345678901));
        assert_eq!(parse_activity_id(r#"{"detailedImportResult":{"successes":[]}}"#), None);
        assert_eq!(parse_activity_id("not json"), None);
    }

    #[test]
    fn test_parse_session() {
        let session = parse_session(r#"{"access_token":"abc","expires_at":4102444800}"#).unwrap();
        assert_eq!(session.access_token, "abc");
        assert!(session.expires_at.is_some());
        assert!(!format!("{:?}", session).contains("abc"));

        assert!(parse_session(r#"{"access_token":""}"#).is_err());
        assert!(parse_session("{").is_err());
    }

    #[tokio::test]
    async fn test_authenticate_without_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let client = GarminConnectClient::new("http://localhost", Duration::from_secs(1)).unwrap();
        let credentials = Credentials {
            username: Some("rider@example.com".to_string()),
            password: Some("secret".to_string()),
            token_dir: dir.path().to_path_buf(),
        };
        let err = client.authenticate(&credentials).await.unwrap_err();
        assert!(matches!(err, AppError::Authentication(ref m) if m.contains("not supported")));
        assert!(!format!("{:?}", credentials).contains("secret"));

        let without_password = Credentials {
            password: None,
            ..credentials
        };
        let err = client.authenticate(&without_password).await.unwrap_err();
        assert!(matches!(err, AppError::Authentication(ref m) if m.contains("cannot read")));
    }

    #[tokio::test]
    async fn test_authenticate_expired_token() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(OAUTH2_TOKEN_FILE),
            r#"{"access_token":"abc","expires_at":1000}"#,
        )
        .unwrap();
        let client = GarminConnectClient::new("http://localhost", Duration::from_secs(1)).unwrap();
        let credentials = Credentials {
            token_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(client.authenticate(&credentials).await.is_err());
    }
}
