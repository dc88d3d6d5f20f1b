//! Desk login and authenticated requests.
//!
//! The Desk does not accept the plain password.  The web UI sends
//! `base64("b0,b1,...,b31")` where `b0..b31` are the decimal SHA-256 digest
//! bytes of `"{password}#{username}@franka"`, wrapped like MIME base64.
//! [`encode_password`] reproduces that exactly.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use pilot_types::PilotError;
use reqwest::header::COOKIE;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::endpoint::DeskEndpoint;

/// Login endpoint of the Desk admin API.
pub const LOGIN_PATH: &str = "/admin/api/login";

const PASSWORD_SALT: &str = "franka";

/// Line length of MIME base64 output.
const MIME_LINE: usize = 76;

/// Username and password for the Desk.  The password is wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    username: String,
    password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Login payload derived from this credential.
    pub fn encoded_password(&self) -> String {
        encode_password(&self.username, &self.password)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Encode a password the way the Desk login form does.
pub fn encode_password(username: &str, password: &str) -> String {
    let digest = Sha256::digest(format!("{password}#{username}@{PASSWORD_SALT}").as_bytes());
    let joined = digest
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(",");
    mime_wrap(&BASE64.encode(joined))
}

/// Split base64 text into newline-terminated lines of at most 76 chars.
fn mime_wrap(encoded: &str) -> String {
    let mut out = String::with_capacity(encoded.len() + encoded.len() / MIME_LINE + 1);
    for line in encoded.as_bytes().chunks(MIME_LINE) {
        // base64 output is pure ASCII
        out.push_str(std::str::from_utf8(line).unwrap_or_default());
        out.push('\n');
    }
    out
}

/// Authorization token issued by a successful login.
///
/// Sent as the `authorization` cookie on HTTP requests and as the
/// `authorization` header on the event-stream upgrade.  Valid for the life of
/// the process; there is no refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    fn cookie(&self) -> String {
        format!("authorization={}", self.token)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("token", &"<redacted>").finish()
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    login: &'a str,
    password: String,
}

/// HTTP client for one Desk endpoint.
pub struct DeskClient {
    endpoint: DeskEndpoint,
    http: reqwest::Client,
}

impl DeskClient {
    pub fn new(endpoint: DeskEndpoint) -> Result<Self, PilotError> {
        let http = endpoint.http_client()?;
        Ok(Self { endpoint, http })
    }

    pub fn endpoint(&self) -> &DeskEndpoint {
        &self.endpoint
    }

    /// Log in once and return the issued [`Session`].
    ///
    /// There is no timeout and no retry: a failed login is meant to abort
    /// startup.
    ///
    /// # Errors
    ///
    /// * [`PilotError::Auth`] with the response body when the Desk answers
    ///   anything but `200 OK`.
    /// * [`PilotError::Transport`] when the request cannot be sent or the body
    ///   cannot be read.
    pub async fn login(&self, credential: &Credential) -> Result<Session, PilotError> {
        let request = self.login_request(credential)?;
        let url = request.url().clone();
        debug!(%url, username = credential.username(), "logging in");
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| PilotError::Transport(format!("login request to {url}: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PilotError::Transport(format!("login response from {url}: {e}")))?;

        let session = login_outcome(status, text)?;
        info!(host = self.endpoint.host(), "login successful");
        Ok(session)
    }

    /// Send an authenticated request to `path`.
    ///
    /// # Errors
    ///
    /// [`PilotError::Connection`] carrying the response body for any status
    /// other than `200 OK`.
    pub async fn request(
        &self,
        session: &Session,
        method: Method,
        path: &str,
        json: Option<&serde_json::Value>,
    ) -> Result<String, PilotError> {
        let request = self.authed_request(session, method, path, json)?;
        let target = format!("{} {}", request.method(), request.url());
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| PilotError::Transport(format!("{target}: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PilotError::Transport(format!("{target} response: {e}")))?;
        request_outcome(status, text)
    }

    /// `POST /admin/api/login` with `{"login": <user>, "password": <encoded>}`.
    fn login_request(&self, credential: &Credential) -> Result<reqwest::Request, PilotError> {
        let url = self.endpoint.https_url(LOGIN_PATH);
        let body = LoginRequest {
            login: credential.username(),
            password: credential.encoded_password(),
        };
        self.http
            .post(&url)
            .json(&body)
            .build()
            .map_err(|e| PilotError::Transport(format!("login request to {url}: {e}")))
    }

    fn authed_request(
        &self,
        session: &Session,
        method: Method,
        path: &str,
        json: Option<&serde_json::Value>,
    ) -> Result<reqwest::Request, PilotError> {
        let url = self.endpoint.https_url(path);
        let mut builder = self
            .http
            .request(method.clone(), &url)
            .header(COOKIE, session.cookie());
        if let Some(body) = json {
            builder = builder.json(body);
        }
        builder
            .build()
            .map_err(|e| PilotError::Transport(format!("{method} {url}: {e}")))
    }
}

/// Log in to `endpoint` with a fresh client.
pub async fn authenticate(
    endpoint: DeskEndpoint,
    credential: &Credential,
) -> Result<Session, PilotError> {
    DeskClient::new(endpoint)?.login(credential).await
}

fn login_outcome(status: StatusCode, body: String) -> Result<Session, PilotError> {
    if status != StatusCode::OK {
        return Err(PilotError::Auth(format!("HTTP {status}: {body}")));
    }
    Ok(Session::new(body))
}

fn request_outcome(status: StatusCode, body: String) -> Result<String, PilotError> {
    if status != StatusCode::OK {
        return Err(PilotError::Connection(format!("HTTP {status}: {body}")));
    }
    Ok(body)
}
