//! Daemon configuration.
//!
//! Loaded best-effort from `$XDG_CONFIG_HOME/hexa/daemon.toml` (missing or
//! unreadable files silently fall back to defaults; a malformed file is a
//! startup error). Parsing beyond this minimal loader is out of scope.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DaemonError, DaemonResult};

/// Top-level daemon configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HexaConfig {
    /// Seconds an orphaned or sticky pane may sit unclaimed before the
    /// daemon reaps it.
    pub orphan_timeout_secs: u64,
    /// Shell used by `create_pane` when the request doesn't specify one.
    pub default_shell: String,
    /// Override for the control socket directory (defaults to
    /// `$XDG_RUNTIME_DIR/hexa`).
    pub socket_dir: Option<PathBuf>,
}

impl Default for HexaConfig {
    fn default() -> Self {
        Self {
            orphan_timeout_secs: 24 * 60 * 60,
            default_shell: std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".into()),
            socket_dir: None,
        }
    }
}

impl HexaConfig {
    /// Load configuration from `path`, falling back to defaults if the file
    /// is absent. A present-but-malformed file is a hard error.
    pub fn load(path: &Path) -> DaemonResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no daemon config at {}, using defaults", path.display());
                return Ok(Self::default());
            },
            Err(e) => return Err(DaemonError::Io(e)),
        };
        toml::from_str(&contents).map_err(|e| DaemonError::Config(e.to_string()))
    }

    /// Default config file path: `$XDG_CONFIG_HOME/hexa/daemon.toml`, or
    /// `$HOME/.config/hexa/daemon.toml` if `XDG_CONFIG_HOME` is unset.
    pub fn default_path() -> PathBuf {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("hexa").join("daemon.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_orphan_timeout_is_24h() {
        let cfg = HexaConfig::default();
        assert_eq!(cfg.orphan_timeout_secs, 24 * 60 * 60);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let cfg = HexaConfig::load(&path).unwrap();
        assert_eq!(cfg, HexaConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.toml");
        std::fs::write(&path, "not = [valid toml").unwrap();
        assert!(HexaConfig::load(&path).is_err());
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.toml");
        std::fs::write(&path, "orphan_timeout_secs = 60\n").unwrap();
        let cfg = HexaConfig::load(&path).unwrap();
        assert_eq!(cfg.orphan_timeout_secs, 60);
        assert_eq!(cfg.default_shell, HexaConfig::default().default_shell);
    }
}
