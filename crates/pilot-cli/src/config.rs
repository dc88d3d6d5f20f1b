//! Bridge configuration – reads `~/.pilot/config.toml`.
//!
//! Read once at startup.  Every field can be overridden from the environment,
//! which is how launch files usually pass the robot address and credentials.

use pilot_desk::TlsTrust;
use pilot_types::PilotError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Bridge configuration stored in `~/.pilot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Hostname or IP of the robot control unit.
    #[serde(default)]
    pub host: String,

    /// Desk user name.
    #[serde(default)]
    pub username: String,

    /// Desk password (stored as plain text – restrict file permissions on
    /// `~/.pilot/config.toml`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,

    /// Certificate policy for the Desk connections.  The stock control unit
    /// needs `"accept-self-signed"`.
    #[serde(default)]
    pub tls: TlsTrust,

    /// Namespace of the five output topics.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Port of the rosbridge WebSocket server.
    #[serde(default = "default_rosbridge_port")]
    pub rosbridge_port: u16,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("username", &self.username)
            .field(
                "password",
                if self.password.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("tls", &self.tls)
            .field("topic_prefix", &self.topic_prefix)
            .field("rosbridge_port", &self.rosbridge_port)
            .finish()
    }
}

fn default_topic_prefix() -> String {
    pilot_middleware::DEFAULT_TOPIC_PREFIX.to_string()
}
fn default_rosbridge_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: String::new(),
            password: String::new(),
            tls: TlsTrust::default(),
            topic_prefix: default_topic_prefix(),
            rosbridge_port: default_rosbridge_port(),
        }
    }
}

impl Config {
    /// Reject configurations that cannot possibly log in.
    pub fn validate(&self) -> Result<(), PilotError> {
        let missing: Vec<&str> = [
            ("host", &self.host),
            ("username", &self.username),
            ("password", &self.password),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PilotError::Config(format!(
                "missing {} (set them in {} or via PILOT_* variables)",
                missing.join(", "),
                config_path().display()
            )))
        }
    }
}

/// Return the path to `~/.pilot/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".pilot").join("config.toml")
}

/// Load the config from disk and apply environment overrides.
///
/// A missing file is not an error: defaults are used and the environment
/// fills in the rest.
pub fn load() -> Result<Config, PilotError> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

/// Load the config from a specific path.  Returns `None` if the file does
/// not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, PilotError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        PilotError::Config(format!("Failed to read config at {}: {}", path.display(), e))
    })?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| PilotError::Config(format!("Failed to parse config: {}", e)))?;
    Ok(Some(cfg))
}

/// Apply `PILOT_*` overrides to `cfg`, reading variables through `var`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `PILOT_HOST` | `host` |
/// | `PILOT_USERNAME` | `username` |
/// | `PILOT_PASSWORD` | `password` |
/// | `PILOT_TLS` | `tls` |
/// | `PILOT_TOPIC_PREFIX` | `topic_prefix` |
/// | `PILOT_ROSBRIDGE_PORT` | `rosbridge_port` |
///
/// An unparsable `PILOT_TLS` is an error; an unparsable port is ignored.
pub fn apply_overrides<F>(cfg: &mut Config, var: F) -> Result<(), PilotError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = var("PILOT_HOST") {
        cfg.host = v;
    }
    if let Some(v) = var("PILOT_USERNAME") {
        cfg.username = v;
    }
    if let Some(v) = var("PILOT_PASSWORD") {
        cfg.password = v;
    }
    if let Some(v) = var("PILOT_TLS") {
        cfg.tls = v.parse()?;
    }
    if let Some(v) = var("PILOT_TOPIC_PREFIX") {
        cfg.topic_prefix = v;
    }
    if let Some(v) = var("PILOT_ROSBRIDGE_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.rosbridge_port = port;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn config_debug_redacts_password() {
        let cfg = Config {
            password: "franka123".to_string(),
            ..Config::default()
        };
        let debug_str = format!("{:?}", cfg);
        assert!(!debug_str.contains("franka123"), "password must not appear in debug output");
        assert!(debug_str.contains("<redacted>"));
    }

    #[test]
    fn config_debug_shows_not_set_for_empty_password() {
        let debug_str = format!("{:?}", Config::default());
        assert!(debug_str.contains("<not set>"));
    }

    #[test]
    fn load_parses_toml_with_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "host = \"172.16.0.2\"\nusername = \"admin\"\npassword = \"pw\"\ntls = \"accept-self-signed\"\n",
        )
        .unwrap();

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.host, "172.16.0.2");
        assert_eq!(cfg.username, "admin");
        assert_eq!(cfg.tls, TlsTrust::AcceptSelfSigned);
        assert_eq!(cfg.topic_prefix, "franka_buttons");
        assert_eq!(cfg.rosbridge_port, 9090);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn load_rejects_unknown_tls_mode() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "tls = \"yolo\"\n").unwrap();
        assert!(matches!(load_from(&path), Err(PilotError::Config(_))));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn config_path_points_to_pilot_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".pilot"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn overrides_replace_credentials_and_host() {
        let mut cfg = Config::default();
        apply_overrides(
            &mut cfg,
            env(&[
                ("PILOT_HOST", "robot.lab"),
                ("PILOT_USERNAME", "operator"),
                ("PILOT_PASSWORD", "secret"),
                ("PILOT_TLS", "accept-self-signed"),
                ("PILOT_TOPIC_PREFIX", "panda_buttons"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.host, "robot.lab");
        assert_eq!(cfg.username, "operator");
        assert_eq!(cfg.password, "secret");
        assert_eq!(cfg.tls, TlsTrust::AcceptSelfSigned);
        assert_eq!(cfg.topic_prefix, "panda_buttons");
    }

    #[test]
    fn overrides_reject_bad_tls_mode() {
        let mut cfg = Config::default();
        let result = apply_overrides(&mut cfg, env(&[("PILOT_TLS", "none")]));
        assert!(matches!(result, Err(PilotError::Config(_))));
    }

    #[test]
    fn overrides_ignore_invalid_port() {
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, env(&[("PILOT_ROSBRIDGE_PORT", "not-a-port")])).unwrap();
        assert_eq!(cfg.rosbridge_port, 9090);

        apply_overrides(&mut cfg, env(&[("PILOT_ROSBRIDGE_PORT", "9191")])).unwrap();
        assert_eq!(cfg.rosbridge_port, 9191);
    }

    #[test]
    fn validate_lists_missing_fields() {
        let cfg = Config {
            host: "robot".to_string(),
            ..Config::default()
        };
        match cfg.validate() {
            Err(PilotError::Config(msg)) => {
                assert!(msg.contains("username"));
                assert!(msg.contains("password"));
                assert!(!msg.contains("host,"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }
}
