//! Address and TLS trust policy of a Desk control unit.
//!
//! Control units ship with a self-signed certificate and live on a private,
//! physically controlled network.  Accepting that certificate is therefore a
//! deliberate, per-endpoint choice expressed by [`TlsTrust`]; it only ever
//! applies to clients built from a [`DeskEndpoint`].

use std::str::FromStr;

use pilot_types::PilotError;
use serde::{Deserialize, Serialize};
use tokio_tungstenite::Connector;

/// How the server certificate of a Desk endpoint is checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TlsTrust {
    /// Full certificate chain and hostname verification.
    #[default]
    Verify,
    /// Accept any certificate and any hostname.
    AcceptSelfSigned,
}

impl FromStr for TlsTrust {
    type Err = PilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "verify" => Ok(TlsTrust::Verify),
            "accept-self-signed" => Ok(TlsTrust::AcceptSelfSigned),
            other => Err(PilotError::Config(format!(
                "unknown TLS trust mode '{other}' (expected 'verify' or 'accept-self-signed')"
            ))),
        }
    }
}

impl std::fmt::Display for TlsTrust {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsTrust::Verify => write!(f, "verify"),
            TlsTrust::AcceptSelfSigned => write!(f, "accept-self-signed"),
        }
    }
}

/// A Desk web interface reachable over HTTPS and WSS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeskEndpoint {
    host: String,
    tls: TlsTrust,
}

impl DeskEndpoint {
    /// `host` is a hostname or IP, optionally with a port.  A leading
    /// `https://` and trailing slashes are tolerated.
    pub fn new(host: impl AsRef<str>, tls: TlsTrust) -> Self {
        let host = host.as_ref().trim();
        let host = host
            .strip_prefix("https://")
            .or_else(|| host.strip_prefix("http://"))
            .unwrap_or(host)
            .trim_end_matches('/');
        Self {
            host: host.to_string(),
            tls,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn tls(&self) -> TlsTrust {
        self.tls
    }

    pub fn https_url(&self, path: &str) -> String {
        format!("https://{}/{}", self.host, path.trim_start_matches('/'))
    }

    pub fn wss_url(&self, path: &str) -> String {
        format!("wss://{}/{}", self.host, path.trim_start_matches('/'))
    }

    /// HTTP client honouring this endpoint's trust policy.
    pub(crate) fn http_client(&self) -> Result<reqwest::Client, PilotError> {
        let builder = reqwest::Client::builder();
        let builder = match self.tls {
            TlsTrust::Verify => builder,
            TlsTrust::AcceptSelfSigned => builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true),
        };
        builder
            .build()
            .map_err(|e| PilotError::Transport(format!("HTTP client for {}: {e}", self.host)))
    }

    /// WebSocket TLS connector honouring this endpoint's trust policy.
    ///
    /// `None` means the default verifying connector.
    pub(crate) fn ws_connector(&self) -> Result<Option<Connector>, PilotError> {
        match self.tls {
            TlsTrust::Verify => Ok(None),
            TlsTrust::AcceptSelfSigned => {
                let tls = native_tls::TlsConnector::builder()
                    .danger_accept_invalid_certs(true)
                    .danger_accept_invalid_hostnames(true)
                    .build()
                    .map_err(|e| PilotError::Transport(format!("TLS connector: {e}")))?;
                Ok(Some(Connector::NativeTls(tls)))
            }
        }
    }
}
