//! HTTP transport for the Web API.

use std::fmt;
use std::time::Duration;

use url::Url;

use super::model::{Torrent, TorrentProperties};

/// Transport-level failure talking to the Web API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Timeout, connection refused, DNS failure, malformed response body.
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-2xx HTTP status.
    #[error("HTTP {status} from {endpoint}")]
    Status { status: u16, endpoint: &'static str },
    #[error("invalid base URL: {0}")]
    BaseUrl(#[from] url::ParseError),
}

/// Opaque session credential (the `SID` cookie value).
///
/// Owned by the session manager; other components only ever borrow it to
/// build an authenticated request, never inspect it.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    fn cookie_header(&self) -> String {
        format!("SID={}", self.0)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never log the credential itself.
        write!(f, "SessionToken(…)")
    }
}

/// Raw outcome of `POST /api/v2/auth/login`; interpreted by the session manager.
#[derive(Debug)]
pub struct LoginReply {
    /// Response body (`Ok.` or `Fails.`).
    pub body: String,
    /// All `Set-Cookie` header values, in response order.
    pub set_cookies: Vec<String>,
}

/// Client for one qBittorrent instance.
#[derive(Debug, Clone)]
pub struct QbtClient {
    http: reqwest::Client,
    base: Url,
}

impl QbtClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base = Url::parse(base_url)?;
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self { http, base })
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path(path);
        url
    }

    /// POST credentials; no interpretation of the reply happens here.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginReply, ApiError> {
        let resp = self
            .http
            .post(self.endpoint("/api/v2/auth/login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ApiError::Status {
                status: resp.status().as_u16(),
                endpoint: "/api/v2/auth/login",
            });
        }
        let set_cookies = resp
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect();
        let body = resp.text().await?;
        Ok(LoginReply { body, set_cookies })
    }

    /// Liveness probe; returns the application version string.
    pub async fn app_version(&self, token: &SessionToken) -> Result<String, ApiError> {
        let resp = self
            .http
            .get(self.endpoint("/api/v2/app/version"))
            .header(reqwest::header::COOKIE, token.cookie_header())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ApiError::Status {
                status: resp.status().as_u16(),
                endpoint: "/api/v2/app/version",
            });
        }
        Ok(resp.text().await?)
    }

    /// Full torrent snapshot.
    pub async fn torrents(&self, token: &SessionToken) -> Result<Vec<Torrent>, ApiError> {
        let resp = self
            .http
            .get(self.endpoint("/api/v2/torrents/info"))
            .header(reqwest::header::COOKIE, token.cookie_header())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ApiError::Status {
                status: resp.status().as_u16(),
                endpoint: "/api/v2/torrents/info",
            });
        }
        Ok(resp.json().await?)
    }

    /// Supplemental per-torrent metadata (elapsed time, peer counts).
    pub async fn properties(
        &self,
        token: &SessionToken,
        hash: &str,
    ) -> Result<TorrentProperties, ApiError> {
        let mut url = self.endpoint("/api/v2/torrents/properties");
        url.query_pairs_mut().append_pair("hash", hash);
        let resp = self
            .http
            .get(url)
            .header(reqwest::header::COOKIE, token.cookie_header())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ApiError::Status {
                status: resp.status().as_u16(),
                endpoint: "/api/v2/torrents/properties",
            });
        }
        Ok(resp.json().await?)
    }

    /// Fetch a `.torrent` file from `file_url` and upload it to the remote
    /// instance as a multipart form.
    pub async fn add_torrent_from_url(
        &self,
        token: &SessionToken,
        file_url: &str,
    ) -> Result<(), ApiError> {
        let resp = self.http.get(file_url).send().await?;
        if !resp.status().is_success() {
            return Err(ApiError::Status {
                status: resp.status().as_u16(),
                endpoint: "torrent file download",
            });
        }
        let payload = resp.bytes().await?;

        let part = reqwest::multipart::Part::bytes(payload.to_vec())
            .file_name("file.torrent")
            .mime_str("application/x-bittorrent")?;
        let form = reqwest::multipart::Form::new().part("torrents", part);

        let resp = self
            .http
            .post(self.endpoint("/api/v2/torrents/add"))
            .header(reqwest::header::COOKIE, token.cookie_header())
            .multipart(form)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ApiError::Status {
                status: resp.status().as_u16(),
                endpoint: "/api/v2/torrents/add",
            });
        }
        Ok(())
    }

    pub async fn pause(&self, token: &SessionToken, hashes: &[String]) -> Result<(), ApiError> {
        self.command("/api/v2/torrents/pause", token, hashes, &[])
            .await
    }

    pub async fn resume(&self, token: &SessionToken, hashes: &[String]) -> Result<(), ApiError> {
        self.command("/api/v2/torrents/resume", token, hashes, &[])
            .await
    }

    pub async fn delete(
        &self,
        token: &SessionToken,
        hashes: &[String],
        delete_files: bool,
    ) -> Result<(), ApiError> {
        let delete_files = if delete_files { "true" } else { "false" };
        self.command(
            "/api/v2/torrents/delete",
            token,
            hashes,
            &[("deleteFiles", delete_files)],
        )
        .await
    }

    pub async fn force_start(
        &self,
        token: &SessionToken,
        hashes: &[String],
    ) -> Result<(), ApiError> {
        self.command(
            "/api/v2/torrents/setForceStart",
            token,
            hashes,
            &[("value", "true")],
        )
        .await
    }

    /// Fire-and-forget command: success is inferred from the status code only.
    async fn command(
        &self,
        path: &'static str,
        token: &SessionToken,
        hashes: &[String],
        extra: &[(&str, &str)],
    ) -> Result<(), ApiError> {
        let joined = hashes.join("|");
        let mut form: Vec<(&str, &str)> = vec![("hashes", joined.as_str())];
        form.extend_from_slice(extra);
        let resp = self
            .http
            .post(self.endpoint(path))
            .header(reqwest::header::COOKIE, token.cookie_header())
            .form(&form)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ApiError::Status {
                status: resp.status().as_u16(),
                endpoint: path,
            });
        }
        Ok(())
    }
}
