//! OAuth 2.0 installed-app flow for the YouTube Data API.
//!
//! A cached token is used while valid and refreshed when expired. Without a
//! cache the consent URL is printed and the authorization code arrives on a
//! loopback listener. PKCE protects the code exchange.

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use super::error::{is_invalid_grant, UploadError, YoutubeResult};

pub const SCOPE_UPLOAD: &str = "https://www.googleapis.com/auth/youtube.upload";
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_REVOKE_URI: &str = "https://oauth2.googleapis.com/revoke";

/// Tokens expiring within this window are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;
/// Largest redirect request accepted on the loopback listener.
const MAX_REDIRECT_REQUEST: usize = 16 * 1024;

/// OAuth client identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
}

#[derive(Debug, Deserialize)]
struct SecretsFile {
    installed: Option<SecretsEntry>,
    web: Option<SecretsEntry>,
}

#[derive(Debug, Deserialize)]
struct SecretsEntry {
    client_id: String,
    client_secret: String,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

impl ClientSecrets {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_uri: DEFAULT_AUTH_URI.to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
        }
    }

    /// Parse a Google `client_secret.json` (`installed` or `web` section).
    pub fn from_json(json: &str) -> YoutubeResult<Self> {
        let file: SecretsFile = serde_json::from_str(json).map_err(|e| {
            UploadError::MissingCredentials(format!("unreadable client secrets file: {}", e))
        })?;
        let entry = file.installed.or(file.web).ok_or_else(|| {
            UploadError::MissingCredentials(
                "client secrets file has no `installed` or `web` section".into(),
            )
        })?;
        if entry.client_id.is_empty() || entry.client_secret.is_empty() {
            return Err(UploadError::MissingCredentials(
                "client secrets file has an empty client id or secret".into(),
            ));
        }
        Ok(Self {
            client_id: entry.client_id,
            client_secret: entry.client_secret,
            auth_uri: entry.auth_uri.unwrap_or_else(|| DEFAULT_AUTH_URI.to_string()),
            token_uri: entry.token_uri.unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
        })
    }

    pub async fn load(path: &Path) -> YoutubeResult<Self> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            UploadError::MissingCredentials(format!(
                "cannot read client secrets {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }
}

/// Cached token, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl StoredToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - chrono::Duration::seconds(EXPIRY_SKEW_SECS) <= now
    }

    /// Read a cached token. A missing or corrupt file yields `None`.
    pub async fn load(path: &Path) -> Option<Self> {
        let json = tokio::fs::read_to_string(path).await.ok()?;
        match serde_json::from_str(&json) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("Ignoring unreadable token cache {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write the token cache, readable by the owner only.
    pub async fn save(&self, path: &Path) -> YoutubeResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| UploadError::Io(std::io::Error::other(e)))?;
        tokio::fs::write(path, json).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
        }
        Ok(())
    }
}

/// PKCE verifier and S256 challenge.
#[derive(Debug, Clone)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    pub fn generate() -> Self {
        // 64 hex characters, inside the 43..=128 range and the unreserved set
        let verifier = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        Self::from_verifier(verifier)
    }

    pub fn from_verifier(verifier: String) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

/// Build the consent URL.
pub fn authorization_url(
    secrets: &ClientSecrets,
    redirect_uri: &str,
    scopes: &[String],
    pkce: &Pkce,
    state: &str,
) -> YoutubeResult<String> {
    let url = Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scopes.join(" ").as_str()),
            ("code_challenge", pkce.challenge.as_str()),
            ("code_challenge_method", "S256"),
            ("state", state),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| UploadError::MissingCredentials(format!("bad auth_uri: {}", e)))?;
    Ok(url.into())
}

/// Read the authorization result from a loopback request.
///
/// Returns `None` for requests that are not the consent redirect: an empty
/// preconnect, a favicon fetch, or a code carrying another state. An
/// explicit `error` (consent denied) ends the flow.
pub fn parse_redirect_request(
    request: &str,
    expected_state: &str,
) -> Option<YoutubeResult<String>> {
    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))?;
    let url = Url::parse("http://127.0.0.1")
        .and_then(|base| base.join(target))
        .ok()?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(Err(UploadError::InvalidCredentials(format!(
            "authorization denied: {}",
            error
        ))));
    }
    if state.as_deref() != Some(expected_state) {
        if code.is_some() {
            warn!("Ignoring OAuth redirect with a mismatched state");
        }
        return None;
    }
    Some(
        code.filter(|c| !c.is_empty())
            .ok_or_else(|| UploadError::InvalidCredentials("redirect carried no code".into())),
    )
}

/// Read one request head, up to the blank line or the size limit.
async fn read_request_head(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.len() >= MAX_REDIRECT_REQUEST {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

async fn respond(stream: &mut TcpStream, status: &str, page: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        page.len(),
        page
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        debug!("Failed to answer loopback request: {}", e);
    }
    if let Err(e) = stream.shutdown().await {
        debug!("Failed to close loopback connection: {}", e);
    }
}

/// Wait for the consent redirect on `listener` and return the authorization code.
///
/// Connections are read concurrently, so an idle browser preconnect does not
/// hold up the redirect. Unrelated requests get a 404 and the wait goes on.
pub async fn receive_code(listener: TcpListener, expected_state: &str) -> YoutubeResult<String> {
    let mut pending = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (mut stream, peer) = accepted?;
                pending.spawn(async move {
                    let head = read_request_head(&mut stream).await;
                    (stream, peer, head)
                });
            }
            Some(joined) = pending.join_next() => {
                let Ok((mut stream, peer, head)) = joined else {
                    continue;
                };
                let request = match head {
                    Ok(request) => request,
                    Err(e) => {
                        debug!(%peer, "Dropped loopback connection: {}", e);
                        continue;
                    }
                };

                let Some(result) = parse_redirect_request(&request, expected_state) else {
                    debug!(%peer, "Ignoring loopback request that is not the OAuth redirect");
                    respond(&mut stream, "404 Not Found", "Not found").await;
                    continue;
                };

                debug!(%peer, "OAuth redirect received");
                let page = if result.is_ok() {
                    "Authorization complete. You can close this window."
                } else {
                    "Authorization failed. Check the terminal for details."
                };
                respond(&mut stream, "200 OK", page).await;
                return result;
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

impl TokenResponse {
    fn into_stored(self, previous_refresh: Option<String>, now: DateTime<Utc>) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: now + chrono::Duration::seconds(self.expires_in.unwrap_or(3600)),
            scope: self.scope,
        }
    }
}

/// OAuth settings.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub token_file: PathBuf,
    pub scopes: Vec<String>,
    /// Loopback port; 0 picks a free one
    pub redirect_port: u16,
    pub consent_timeout: Duration,
    pub revoke_uri: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            token_file: PathBuf::from("youtube_token.json"),
            scopes: vec![SCOPE_UPLOAD.to_string()],
            redirect_port: 0,
            consent_timeout: Duration::from_secs(300),
            revoke_uri: DEFAULT_REVOKE_URI.to_string(),
        }
    }
}

/// Produces valid access tokens, running consent when needed.
pub struct OAuthClient {
    http: Client,
    secrets: ClientSecrets,
    config: OAuthConfig,
}

impl OAuthClient {
    pub fn new(http: Client, secrets: ClientSecrets, config: OAuthConfig) -> Self {
        Self {
            http,
            secrets,
            config,
        }
    }

    /// Return a usable access token.
    pub async fn access_token(&self) -> YoutubeResult<String> {
        let now = Utc::now();
        if let Some(token) = StoredToken::load(&self.config.token_file).await {
            if !token.is_expired(now) {
                debug!("Using cached YouTube token");
                return Ok(token.access_token);
            }
            if let Some(refresh) = token.refresh_token.clone() {
                info!("Refreshing expired YouTube token");
                let fresh = self.refresh(&refresh).await?;
                fresh.save(&self.config.token_file).await?;
                return Ok(fresh.access_token);
            }
            warn!("Cached YouTube token expired without a refresh token");
        }

        let token = self.interactive_consent().await?;
        token.save(&self.config.token_file).await?;
        info!(path = %self.config.token_file.display(), "Saved YouTube token");
        Ok(token.access_token)
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> YoutubeResult<StoredToken> {
        let response = self
            .http
            .post(&self.secrets.token_uri)
            .form(&[
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_invalid_grant(&body) {
                return Err(UploadError::InvalidCredentials(
                    "refresh token expired or revoked; run with --revoke-youtube and sign in again"
                        .into(),
                ));
            }
            return Err(UploadError::from_response(status, &body));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.into_stored(Some(refresh_token.to_string()), Utc::now()))
    }

    /// Exchange an authorization code.
    pub async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> YoutubeResult<StoredToken> {
        let response = self
            .http
            .post(&self.secrets.token_uri)
            .form(&[
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
                ("code", code),
                ("code_verifier", verifier),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::from_response(status, &body));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.into_stored(None, Utc::now()))
    }

    async fn interactive_consent(&self) -> YoutubeResult<StoredToken> {
        let listener = TcpListener::bind(("127.0.0.1", self.config.redirect_port)).await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{}", port);

        let pkce = Pkce::generate();
        let state = uuid::Uuid::new_v4().simple().to_string();
        let url = authorization_url(
            &self.secrets,
            &redirect_uri,
            &self.config.scopes,
            &pkce,
            &state,
        )?;

        info!(port, "Waiting for YouTube authorization");
        eprintln!("Open this URL in a browser to authorize YouTube uploads:\n\n{}\n", url);

        let code = tokio::time::timeout(self.config.consent_timeout, receive_code(listener, &state))
            .await
            .map_err(|_| {
                UploadError::InvalidCredentials(format!(
                    "no authorization received within {}s",
                    self.config.consent_timeout.as_secs()
                ))
            })??;

        self.exchange_code(&code, &pkce.verifier, &redirect_uri).await
    }
}

/// Revoke the cached token remotely (best-effort) and delete the cache file.
///
/// Needs no client secrets, so it works when they are missing.
pub async fn revoke_cached_token(http: &Client, config: &OAuthConfig) -> YoutubeResult<bool> {
    let Some(token) = StoredToken::load(&config.token_file).await else {
        if tokio::fs::try_exists(&config.token_file).await.unwrap_or(false) {
            tokio::fs::remove_file(&config.token_file).await?;
            return Ok(true);
        }
        return Ok(false);
    };

    let revoke_token = token.refresh_token.as_deref().unwrap_or(&token.access_token);
    match http
        .post(&config.revoke_uri)
        .form(&[("token", revoke_token)])
        .send()
        .await
    {
        Ok(r) if r.status().is_success() => debug!("Token revoked remotely"),
        Ok(r) => warn!("Remote token revocation returned {}", r.status()),
        Err(e) => warn!("Remote token revocation failed: {}", e),
    }

    tokio::fs::remove_file(&config.token_file).await?;
    info!(path = %config.token_file.display(), "Deleted YouTube token cache");
    Ok(true)
}
