//! Session lifecycle against the remote Web UI: login, liveness, reconnection.
//!
//! The session token is owned here and handed out as an opaque
//! [`SessionToken`]; no other component ever reads the cookie directly.
//! Reconnection uses a linear-growing backoff (base × attempt number) and
//! gives up after `login_retry_limit` attempts.

use std::time::Duration;

use crate::config::ServerConfig;
use crate::qbt::{ApiError, LoginReply, QbtClient, SessionToken};

/// Authentication failure surfaced to callers of [`SessionManager::ensure_valid`].
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The service rejected the credentials (`Fails.` body).
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Login succeeded at the HTTP level but no session cookie was issued.
    #[error("no session cookie issued")]
    NoSessionIssued,
    /// Could not reach the service.
    #[error(transparent)]
    Transport(#[from] ApiError),
    /// All login attempts exhausted.
    #[error("unrecoverable after {attempts} login attempts: {last}")]
    Unrecoverable {
        attempts: u32,
        #[source]
        last: Box<AuthError>,
    },
}

/// Owns the session token and the reconnection policy.
///
/// Never used concurrently with itself: the engine serializes access behind
/// a mutex, matching the scheduler's one-task-at-a-time model.
pub struct SessionManager {
    client: QbtClient,
    server: ServerConfig,
    retry_limit: u32,
    retry_base: Duration,
    token: Option<SessionToken>,
}

impl SessionManager {
    pub fn new(client: QbtClient, server: ServerConfig, retry_limit: u32, retry_base: Duration) -> Self {
        Self {
            client,
            server,
            retry_limit,
            retry_base,
            token: None,
        }
    }

    /// Current token, if a session was ever established.
    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    /// Single login attempt; on success the stored token is replaced.
    pub async fn login(&mut self) -> Result<(), AuthError> {
        let reply = self
            .client
            .login(&self.server.username, &self.server.password)
            .await?;
        let token = interpret_login(&reply)?;
        tracing::info!("logged in to {}", self.server.base_url);
        self.token = Some(token);
        Ok(())
    }

    /// Lightweight authenticated probe. Returns false on any failure, never errors.
    pub async fn check_liveness(&self) -> bool {
        match &self.token {
            Some(token) => self.client.app_version(token).await.is_ok(),
            None => false,
        }
    }

    /// Ensure a live session exists, reconnecting with backoff if needed.
    /// Returns a clone of the valid token for the caller's requests.
    pub async fn ensure_valid(&mut self) -> Result<SessionToken, AuthError> {
        if self.token.is_some() && self.check_liveness().await {
            // `token` is Some here per the guard above.
            if let Some(token) = &self.token {
                return Ok(token.clone());
            }
        }

        if self.token.is_some() {
            tracing::warn!("session expired, reconnecting to {}", self.server.base_url);
            self.token = None;
        }

        let mut last: Option<AuthError> = None;
        for attempt in 1..=self.retry_limit {
            match self.login().await {
                Ok(()) => {
                    if let Some(token) = &self.token {
                        return Ok(token.clone());
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        attempt,
                        limit = self.retry_limit,
                        error = %err,
                        "login attempt failed"
                    );
                    last = Some(err);
                    // Linear-growing delay: base × attempt (5s, 10s, 15s, …).
                    tokio::time::sleep(self.retry_base * attempt).await;
                }
            }
        }

        Err(AuthError::Unrecoverable {
            attempts: self.retry_limit,
            last: Box::new(last.unwrap_or(AuthError::NoSessionIssued)),
        })
    }

    /// Drop the stored token (e.g. after a 401/403 observed elsewhere).
    pub fn invalidate(&mut self) {
        self.token = None;
    }
}

/// Map the raw login reply to a token or a typed failure.
fn interpret_login(reply: &LoginReply) -> Result<SessionToken, AuthError> {
    if reply.body.contains("Fails") {
        return Err(AuthError::InvalidCredentials);
    }
    reply
        .set_cookies
        .iter()
        .find_map(|cookie| extract_sid(cookie))
        .map(SessionToken::new)
        .ok_or(AuthError::NoSessionIssued)
}

/// Pull the SID value out of a `Set-Cookie` header value.
fn extract_sid(cookie: &str) -> Option<String> {
    let (name, rest) = cookie.split_once('=')?;
    if name.trim() != "SID" {
        return None;
    }
    let value = rest.split(';').next().unwrap_or(rest).trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(body: &str, cookies: &[&str]) -> LoginReply {
        LoginReply {
            body: body.to_string(),
            set_cookies: cookies.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn extracts_sid_from_cookie() {
        assert_eq!(
            extract_sid("SID=abc123; HttpOnly; path=/"),
            Some("abc123".to_string())
        );
        assert_eq!(extract_sid("other=zzz; path=/"), None);
        assert_eq!(extract_sid("SID=; path=/"), None);
        assert_eq!(extract_sid("garbage"), None);
    }

    #[test]
    fn login_rejection_is_invalid_credentials() {
        let err = interpret_login(&reply("Fails.", &["SID=abc; path=/"])).unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[test]
    fn missing_cookie_is_no_session_issued() {
        let err = interpret_login(&reply("Ok.", &[])).unwrap_err();
        assert!(matches!(err, AuthError::NoSessionIssued));
    }

    #[test]
    fn successful_login_yields_token() {
        let token = interpret_login(&reply("Ok.", &["SID=abc123; path=/"])).unwrap();
        assert_eq!(token, SessionToken::new("abc123"));
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_valid_backs_off_linearly_before_giving_up() {
        // Nothing listens on port 1, so every login attempt fails.
        let client = QbtClient::new("http://127.0.0.1:1").unwrap();
        let server = ServerConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
        };
        let mut session = SessionManager::new(client, server, 5, Duration::from_secs(5));

        let start = tokio::time::Instant::now();
        let err = session.ensure_valid().await.unwrap_err();

        // Five sleeps of 5s, 10s, 15s, 20s and 25s of virtual time, one
        // after each failed attempt including the last.
        assert!(start.elapsed() >= Duration::from_secs(75));
        match err {
            AuthError::Unrecoverable { attempts, .. } => assert_eq!(attempts, 5),
            other => panic!("expected Unrecoverable, got {other}"),
        }
    }
}
