//! Configuration system for pingkit.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $PINGKIT_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/pingkit/config.toml
//!   3. ~/.config/pingkit/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::wire::{
    EchoTemplate, WireError, DEFAULT_PAYLOAD_BYTE, DEFAULT_PAYLOAD_LEN, DEFAULT_SEQUENCE,
    MAX_PAYLOAD,
};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PingkitConfig {
    pub probe: ProbeSettings,
    pub socket: SocketSettings,
    pub protocol: ProtocolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Per-probe reply budget in milliseconds.
    pub timeout_ms: u64,
    /// Probes per destination.
    pub count: u32,
    /// Echo payload length in bytes.
    pub payload_len: usize,
    /// Filler byte repeated across the payload.
    pub payload_byte: u8,
    /// Sequence number stamped on every request.
    pub sequence: u16,
    /// Upper bound on a single name lookup.
    pub resolve_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketSettings {
    /// Privileged helper that opens raw sockets on our behalf. Empty = open directly.
    pub helper_path: PathBuf,
}

/// Protocol number and OS error guidance handed to the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// IP protocol number for the raw socket (1 = ICMP).
    pub icmp_protocol: i32,
    /// Actionable messages for socket-creation errno values.
    pub permission_hints: Vec<PermissionHint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionHint {
    pub errno: i32,
    pub hint: String,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            count: 4,
            payload_len: DEFAULT_PAYLOAD_LEN,
            payload_byte: DEFAULT_PAYLOAD_BYTE,
            sequence: DEFAULT_SEQUENCE,
            resolve_timeout_ms: 5000,
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        let root_only = "ICMP messages can only be sent from processes running as root \
                         or holding CAP_NET_RAW";
        Self {
            icmp_protocol: 1,
            permission_hints: vec![
                PermissionHint {
                    errno: 1, // EPERM
                    hint: root_only.to_string(),
                },
                PermissionHint {
                    errno: 13, // EACCES
                    hint: root_only.to_string(),
                },
                PermissionHint {
                    errno: 10013, // WSAEACCES
                    hint: "ICMP messages can only be sent by users or processes with \
                           administrator rights"
                        .to_string(),
                },
            ],
        }
    }
}

impl ProtocolConfig {
    /// Guidance for a socket-creation failure, if the errno is a known privilege error.
    pub fn permission_hint(&self, errno: i32) -> Option<&str> {
        self.permission_hints
            .iter()
            .find(|h| h.errno == errno)
            .map(|h| h.hint.as_str())
    }
}

impl ProbeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }

    /// Request template described by these settings.
    pub fn echo_template(&self) -> Result<EchoTemplate, WireError> {
        EchoTemplate::new(self.sequence, self.payload_len, self.payload_byte)
    }
}

impl SocketSettings {
    pub fn helper(&self) -> Option<&std::path::Path> {
        if self.helper_path.as_os_str().is_empty() {
            None
        } else {
            Some(&self.helper_path)
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("pingkit")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid setting {0}: {1}")]
    Invalid(&'static str, String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl PingkitConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            Self::from_toml(&path, &text)?
        } else {
            PingkitConfig::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("PINGKIT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&PingkitConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    fn from_toml(path: &std::path::Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Reject settings no probe could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe.timeout_ms == 0 {
            return Err(ConfigError::Invalid("probe.timeout_ms", "must be non-zero".into()));
        }
        if self.probe.payload_len > MAX_PAYLOAD {
            return Err(ConfigError::Invalid(
                "probe.payload_len",
                format!("{} exceeds maximum {}", self.probe.payload_len, MAX_PAYLOAD),
            ));
        }
        Ok(())
    }

    /// Apply PINGKIT_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PINGKIT_PROBE__TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                self.probe.timeout_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("PINGKIT_PROBE__COUNT") {
            if let Ok(n) = v.parse() {
                self.probe.count = n;
            }
        }
        if let Ok(v) = std::env::var("PINGKIT_PROBE__PAYLOAD_LEN") {
            if let Ok(n) = v.parse() {
                self.probe.payload_len = n;
            }
        }
        if let Ok(v) = std::env::var("PINGKIT_SOCKET__HELPER_PATH") {
            self.socket.helper_path = PathBuf::from(v);
        }
    }
}
